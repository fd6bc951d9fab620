//! Column permutations between a table's primary order and an index order

use crate::error::{Result, TdbError};

/// Maps tuples between a primary column order (e.g. `SPO`) and an index
/// column order (e.g. `POS`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    label: String,
    /// Column `i` of the index order is column `to_index[i]` of the primary order
    to_index: Vec<usize>,
}

impl ColumnMap {
    /// Build a map from column letters; `order` must be a permutation of `primary`
    pub fn new(primary: &str, order: &str) -> Result<Self> {
        let primary: Vec<char> = primary.chars().collect();
        let bad = || {
            TdbError::InvalidConfiguration(format!(
                "index order '{order}' is not a permutation of '{}'",
                primary.iter().collect::<String>()
            ))
        };
        if primary.len() != order.chars().count() {
            return Err(bad());
        }
        let mut to_index = Vec::with_capacity(primary.len());
        for c in order.chars() {
            let src = primary.iter().position(|p| *p == c).ok_or_else(bad)?;
            if to_index.contains(&src) {
                return Err(bad());
            }
            to_index.push(src);
        }
        Ok(Self {
            label: format!("{}->{order}", primary.iter().collect::<String>()),
            to_index,
        })
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.to_index.len()
    }

    /// Whether the map has no columns
    pub fn is_empty(&self) -> bool {
        self.to_index.is_empty()
    }

    /// Primary column that lands in index column `i`
    pub fn source_of(&self, i: usize) -> usize {
        self.to_index[i]
    }

    /// Primary order to index order
    pub fn map<T: Clone>(&self, tuple: &[T]) -> Vec<T> {
        self.to_index.iter().map(|&src| tuple[src].clone()).collect()
    }

    /// Index order back to primary order
    pub fn unmap<T: Clone>(&self, tuple: &[T]) -> Vec<T> {
        let mut out = tuple.to_vec();
        for (i, &src) in self.to_index.iter().enumerate() {
            out[src] = tuple[i].clone();
        }
        out
    }

    /// Label such as `SPO->POS`
    pub fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_unmap() -> Result<()> {
        let cm = ColumnMap::new("SPO", "POS")?;
        assert_eq!(cm.map(&['s', 'p', 'o']), vec!['p', 'o', 's']);
        assert_eq!(cm.unmap(&['p', 'o', 's']), vec!['s', 'p', 'o']);
        assert_eq!(cm.label(), "SPO->POS");

        let quad = ColumnMap::new("GSPO", "OSPG")?;
        let t = [1, 2, 3, 4];
        assert_eq!(quad.map(&t), vec![4, 2, 3, 1]);
        assert_eq!(quad.unmap(&quad.map(&t)), t.to_vec());
        Ok(())
    }

    #[test]
    fn test_identity() -> Result<()> {
        let cm = ColumnMap::new("SPO", "SPO")?;
        assert_eq!(cm.map(&[1, 2, 3]), vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn test_invalid_orders() {
        assert!(ColumnMap::new("SPO", "SP").is_err());
        assert!(ColumnMap::new("SPO", "SPX").is_err());
        assert!(ColumnMap::new("SPO", "SSO").is_err());
    }
}
