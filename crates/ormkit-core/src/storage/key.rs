//! Row key encoding.
//!
//! Key format: `[table name][0x00][id (8 bytes, big-endian)]`
//!
//! Big-endian ids make a prefix scan over one table return rows in
//! identifier order.

/// Separator between the table name and the identifier.
const SEPARATOR: u8 = 0;

/// Size of the encoded identifier.
const ID_SIZE: usize = 8;

/// Prefix shared by every row of a table.
pub(crate) fn table_prefix(table: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(table.len() + 1);
    prefix.extend_from_slice(table.as_bytes());
    prefix.push(SEPARATOR);
    prefix
}

/// Key of one row.
pub(crate) fn row_key(table: &str, id: u64) -> Vec<u8> {
    let mut key = table_prefix(table);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Decode a big-endian `u64`.
pub(crate) fn decode_u64(bytes: &[u8]) -> Option<u64> {
    let bytes: [u8; ID_SIZE] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}
