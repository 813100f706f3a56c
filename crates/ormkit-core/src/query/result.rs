//! Materialized query results.

use std::ops::Index;

/// The rows returned by one execution of a query.
///
/// The length is that of the materialized result; no separate count query
/// is issued.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet<T> {
    items: Vec<T>,
}

impl<T> ResultSet<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get a result by position.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// The first result.
    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    /// Iterate in store order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Take the results out.
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    /// Transform every result.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ResultSet<U> {
        ResultSet::new(self.items.into_iter().map(f).collect())
    }
}

impl<T> Default for ResultSet<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> Index<usize> for ResultSet<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T> IntoIterator for ResultSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'r, T> IntoIterator for &'r ResultSet<T> {
    type Item = &'r T;
    type IntoIter = std::slice::Iter<'r, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> FromIterator<T> for ResultSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
