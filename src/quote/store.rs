//! Quote options for the active adapter plus the user's selection

use crate::quote::QuoteOption;

#[derive(Debug, Clone, Default)]
pub struct QuoteStore {
    options: Vec<QuoteOption>,
    selected: usize,
}

impl QuoteStore {
    /// Replace with a fresh list; selection falls back to the first (best) option
    pub fn replace(&mut self, options: Vec<QuoteOption>) {
        self.options = options;
        self.selected = 0;
    }

    pub fn clear(&mut self) {
        self.options.clear();
        self.selected = 0;
    }

    pub fn options(&self) -> &[QuoteOption] {
        &self.options
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<&QuoteOption> {
        self.options.get(self.selected)
    }

    /// Out-of-range indices leave the selection unchanged
    pub fn select(&mut self, index: usize) -> Option<&QuoteOption> {
        if index >= self.options.len() {
            return None;
        }
        self.selected = index;
        self.options.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_quote_option;

    #[test]
    fn test_selection_defaults_to_first_and_resets_on_replace() {
        let mut store = QuoteStore::default();
        store.replace(vec![sample_quote_option("1"), sample_quote_option("2")]);
        assert_eq!(store.selected_index(), 0);

        assert!(store.select(1).is_some());
        assert_eq!(store.selected().unwrap().to_amount.format(None), "2");

        store.replace(vec![sample_quote_option("3")]);
        assert_eq!(store.selected_index(), 0);
    }

    #[test]
    fn test_out_of_range_select_is_ignored() {
        let mut store = QuoteStore::default();
        store.replace(vec![sample_quote_option("1")]);
        assert!(store.select(5).is_none());
        assert_eq!(store.selected_index(), 0);
    }
}
