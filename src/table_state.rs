//! Sort, selection and pagination state of a single table.
//!
//! Every operation is a plain state transition. The state does not know the
//! data it describes: selections are not checked against the current records
//! and `on_change_page` does not clamp. Callers only offer valid page moves.

use std::collections::HashSet;
use tracing::trace;

use crate::domain::{DashError, ROWS_PER_PAGE_OPTIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    pub fn arrow(&self) -> &'static str {
        match self {
            Order::Asc => "▲",
            Order::Desc => "▼",
        }
    }
}

/// Checkbox state of the select-all header cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    None,
    Some,
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableViewState {
    pub page: usize,
    pub rows_per_page: usize,
    pub order: Order,
    pub order_by: String,
    pub selected: Vec<String>,
}

impl TableViewState {
    pub fn new(order_by: impl Into<String>) -> Self {
        Self {
            page: 0,
            rows_per_page: ROWS_PER_PAGE_OPTIONS[0],
            order: Order::Asc,
            order_by: order_by.into(),
            selected: Vec::new(),
        }
    }

    pub fn on_sort(&mut self, field: &str) {
        let is_asc = self.order_by == field && self.order == Order::Asc;
        self.order = if is_asc { Order::Desc } else { Order::Asc };
        self.order_by = field.to_string();
        trace!("Sort by {} {:?}", self.order_by, self.order);
    }

    /// `all_ids` is the id list of the whole unfiltered data set. Record ids
    /// are unique, so the ids are stored as given.
    pub fn on_select_all_rows(&mut self, checked: bool, all_ids: Vec<String>) {
        debug_assert!(
            {
                let mut seen = HashSet::new();
                all_ids.iter().all(|id| seen.insert(id))
            },
            "duplicate row ids"
        );
        if checked {
            self.selected = all_ids;
        } else {
            self.selected.clear();
        }
    }

    pub fn on_select_row(&mut self, id: &str) {
        if let Some(pos) = self.selected.iter().position(|s| s == id) {
            self.selected.remove(pos);
        } else {
            self.selected.push(id.to_string());
        }
    }

    pub fn on_change_page(&mut self, new_page: usize) {
        self.page = new_page;
    }

    /// Parses `raw` as a base-10 row count. Values outside
    /// [`ROWS_PER_PAGE_OPTIONS`] are rejected and leave the state untouched.
    pub fn on_change_rows_per_page(&mut self, raw: &str) -> Result<(), DashError> {
        let rows = raw
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|r| ROWS_PER_PAGE_OPTIONS.contains(r))
            .ok_or_else(|| DashError::InvalidRowsPerPage(raw.to_string()))?;
        self.rows_per_page = rows;
        self.on_reset_page();
        Ok(())
    }

    pub fn on_reset_page(&mut self) {
        self.page = 0;
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|s| s == id)
    }

    pub fn selection_state(&self, row_count: usize) -> SelectionState {
        match self.selected.len() {
            0 => SelectionState::None,
            n if row_count > 0 && n >= row_count => SelectionState::All,
            _ => SelectionState::Some,
        }
    }

    /// Number of pages needed for `count` rows. Never less than one.
    pub fn page_count(&self, count: usize) -> usize {
        count.div_ceil(self.rows_per_page).max(1)
    }

    /// Index range of the current page within a view of `count` rows.
    /// Empty when the page lies past the end.
    pub fn page_range(&self, count: usize) -> std::ops::Range<usize> {
        let begin = std::cmp::min(self.page * self.rows_per_page, count);
        let end = std::cmp::min(begin + self.rows_per_page, count);
        begin..end
    }

    /// The allowed value following the current one, wrapping around.
    pub fn next_rows_per_page(&self) -> usize {
        let idx = ROWS_PER_PAGE_OPTIONS
            .iter()
            .position(|&r| r == self.rows_per_page)
            .map(|i| (i + 1) % ROWS_PER_PAGE_OPTIONS.len())
            .unwrap_or(0);
        ROWS_PER_PAGE_OPTIONS[idx]
    }
}

/// Filler rows that keep a partially filled page at full height.
/// The first page is never padded.
pub fn empty_rows(page: usize, rows_per_page: usize, count: usize) -> usize {
    if page > 0 {
        ((1 + page) * rows_per_page).saturating_sub(count)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sort_toggles_on_same_field_and_resets_on_new_one() {
        let mut state = TableViewState::new("name");
        assert_eq!(state.page, 0);
        assert_eq!(state.rows_per_page, 5);
        assert_eq!(state.order, Order::Asc);

        state.on_sort("name");
        assert_eq!(state.order, Order::Desc);
        assert_eq!(state.order_by, "name");

        state.on_sort("email");
        assert_eq!(state.order, Order::Asc);
        assert_eq!(state.order_by, "email");
    }

    #[test]
    fn sort_keeps_page_and_selection() {
        let mut state = TableViewState::new("name");
        state.on_change_page(3);
        state.on_select_row("u1");
        state.on_sort("email");
        assert_eq!(state.page, 3);
        assert_eq!(state.selected, ids(&["u1"]));
    }

    #[test]
    fn select_row_toggles_in_insertion_order() {
        let mut state = TableViewState::new("name");
        state.on_select_row("u1");
        assert_eq!(state.selected, ids(&["u1"]));
        state.on_select_row("u2");
        assert_eq!(state.selected, ids(&["u1", "u2"]));
        state.on_select_row("u1");
        assert_eq!(state.selected, ids(&["u2"]));
    }

    #[test]
    fn select_all_replaces_and_clears() {
        let mut state = TableViewState::new("name");
        state.on_select_row("stale");
        state.on_select_all_rows(true, ids(&["a", "b", "c"]));
        assert_eq!(state.selected, ids(&["a", "b", "c"]));
        assert_eq!(state.selection_state(3), SelectionState::All);
        state.on_select_all_rows(false, ids(&["a", "b", "c"]));
        assert!(state.selected.is_empty());
        assert_eq!(state.selection_state(3), SelectionState::None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "duplicate row ids")]
    fn select_all_rejects_repeated_ids() {
        let mut state = TableViewState::new("name");
        state.on_select_all_rows(true, ids(&["a", "b", "a"]));
    }

    #[test]
    fn change_page_is_not_clamped() {
        let mut state = TableViewState::new("name");
        state.on_change_page(40);
        assert_eq!(state.page, 40);
        assert!(state.page_range(12).is_empty());
    }

    #[test]
    fn rows_per_page_resets_page() {
        let mut state = TableViewState::new("name");
        state.on_change_page(7);
        state.on_change_rows_per_page("10").unwrap();
        assert_eq!(state.rows_per_page, 10);
        assert_eq!(state.page, 0);
    }

    #[test]
    fn invalid_rows_per_page_leaves_state_alone() {
        let mut state = TableViewState::new("name");
        state.on_change_page(2);
        for raw in ["abc", "", "-5", "7", "0"] {
            let res = state.on_change_rows_per_page(raw);
            assert!(matches!(res, Err(DashError::InvalidRowsPerPage(_))), "{raw}");
        }
        assert_eq!(state.rows_per_page, 5);
        assert_eq!(state.page, 2);
    }

    #[test]
    fn paging_arithmetic() {
        let mut state = TableViewState::new("name");
        assert_eq!(state.page_count(0), 1);
        assert_eq!(state.page_count(11), 3);
        state.on_change_page(2);
        assert_eq!(state.page_range(11), 10..11);
        assert_eq!(empty_rows(state.page, state.rows_per_page, 11), 4);
        assert_eq!(empty_rows(0, 5, 2), 0);
        assert_eq!(empty_rows(1, 5, 30), 0);
    }

    #[test]
    fn rows_per_page_cycles_through_options() {
        let mut state = TableViewState::new("name");
        assert_eq!(state.next_rows_per_page(), 10);
        state.on_change_rows_per_page("25").unwrap();
        assert_eq!(state.next_rows_per_page(), 5);
    }

    fn field() -> impl Strategy<Value = String> {
        prop_oneof![Just("name".to_string()), Just("email".to_string()), "[a-z]{1,6}"]
    }

    proptest! {
        /// Repeated sorting on one field alternates, starting ascending on a new field.
        #[test]
        fn same_field_alternates(start in field(), f in field(), n in 1usize..12) {
            let mut state = TableViewState::new(start);
            state.on_sort("__other__");
            for i in 0..n {
                state.on_sort(&f);
                let expected = if i % 2 == 0 { Order::Asc } else { Order::Desc };
                prop_assert_eq!(state.order, expected);
            }
        }

        #[test]
        fn switching_field_is_ascending(prior in field(), f1 in field(), f2 in field(), flips in 0usize..4) {
            prop_assume!(f1 != f2);
            let mut state = TableViewState::new(prior);
            for _ in 0..flips {
                state.on_sort(&f1);
            }
            state.on_sort(&f1);
            state.on_sort(&f2);
            prop_assert_eq!(state.order, Order::Asc);
            prop_assert_eq!(state.order_by, f2);
        }

        #[test]
        fn select_row_twice_is_identity(initial in proptest::collection::vec("[a-d][0-9]", 0..6), id in "[a-d][0-9]") {
            let mut state = TableViewState::new("name");
            for i in &initial {
                if !state.is_selected(i) {
                    state.on_select_row(i);
                }
            }
            let mut before = state.selected.clone();
            state.on_select_row(&id);
            state.on_select_row(&id);
            let mut after = state.selected.clone();
            before.sort();
            after.sort();
            prop_assert_eq!(before, after);
        }

        #[test]
        fn select_all_then_none_is_empty(all in proptest::collection::hash_set("[a-z]{2}", 0..10)) {
            let all: Vec<String> = all.into_iter().collect();
            let mut state = TableViewState::new("name");
            state.on_select_all_rows(true, all.clone());
            state.on_select_all_rows(false, all);
            prop_assert!(state.selected.is_empty());
        }

        #[test]
        fn rows_per_page_always_resets(page in 0usize..1000) {
            let mut state = TableViewState::new("name");
            state.on_change_page(page);
            prop_assert!(state.on_change_rows_per_page("10").is_ok());
            prop_assert_eq!(state.page, 0);
        }
    }
}
