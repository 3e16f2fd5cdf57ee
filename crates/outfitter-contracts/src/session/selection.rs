use indexmap::IndexSet;

/// Closet item ids picked for one purpose. Insertion order is kept only for
/// display; membership is what matters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: IndexSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `id` is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.shift_remove(id) {
            return false;
        }
        self.ids.insert(id.to_string());
        true
    }

    pub fn select(&mut self, id: &str) {
        self.ids.insert(id.to_string());
    }

    pub fn deselect(&mut self, id: &str) -> bool {
        self.ids.shift_remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::SelectionSet;

    #[test]
    fn toggle_twice_restores_set() {
        let mut selection = SelectionSet::new();
        selection.select("item-a");
        let before = selection.clone();

        assert!(selection.toggle("item-b"));
        assert!(!selection.toggle("item-b"));
        assert_eq!(selection, before);

        assert!(!selection.toggle("item-a"));
        assert!(selection.toggle("item-a"));
        assert!(selection.contains("item-a"));
    }

    #[test]
    fn ids_keep_selection_order() {
        let mut selection = SelectionSet::new();
        selection.toggle("c");
        selection.toggle("a");
        selection.toggle("b");
        selection.toggle("a");
        assert_eq!(selection.ids().collect::<Vec<_>>(), vec!["c", "b"]);
        assert!(selection.deselect("c"));
        assert!(!selection.deselect("c"));
        assert_eq!(selection.len(), 1);
    }
}
