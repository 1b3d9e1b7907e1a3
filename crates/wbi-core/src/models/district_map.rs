//! District → risk level mapping in publication order

use std::collections::HashMap;

/// Risk level per district, iterated in the order districts were first inserted
///
/// Inserting an existing district overwrites its level but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistrictRiskMap {
    entries: Vec<(String, i64)>,
    index: HashMap<String, usize>,
}

impl DistrictRiskMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a district, returning the previous level
    pub fn insert(&mut self, name: impl Into<String>, level: i64) -> Option<i64> {
        let name = name.into();
        match self.index.get(&name) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, level)),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, level));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.index.get(name).map(|&pos| self.entries[pos].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// District names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(name, level)| (name.as_str(), *level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order() {
        let mut map = DistrictRiskMap::new();
        map.insert("Uckermark", 2);
        map.insert("Barnim", 3);
        map.insert("Prignitz", 1);

        let names: Vec<_> = map.names().collect();
        assert_eq!(names, vec!["Uckermark", "Barnim", "Prignitz"]);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("Barnim"), Some(3));
        assert_eq!(map.get("Spree-Neiße"), None);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut map = DistrictRiskMap::new();
        map.insert("Barnim", 3);
        map.insert("Havelland", 4);

        assert_eq!(map.insert("Barnim", 5), Some(3));
        assert_eq!(map.get("Barnim"), Some(5));
        assert_eq!(
            map.iter().collect::<Vec<_>>(),
            vec![("Barnim", 5), ("Havelland", 4)]
        );
    }

    #[test]
    fn test_empty() {
        let map = DistrictRiskMap::new();
        assert!(map.is_empty());
        assert!(!map.contains("Barnim"));
        assert_eq!(map.names().count(), 0);
    }
}
