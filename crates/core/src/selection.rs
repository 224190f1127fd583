//! Set-based selection over flattened display rows.
//!
//! The invariant maintained here: a header key is selected if and only if all
//! of its child keys are selected. The UI toolkit only reports raw checked
//! sets; [`apply_selection_change`] re-establishes consistency after every
//! gesture.

use std::collections::{HashMap, HashSet};

use crate::domain::display::{DisplayRow, RowKey};
use crate::domain::line_item::{LineItem, LineItemId, RequestId};
use crate::grouping::GroupIndex;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionMode {
    /// `keys` is the positive set of selected rows.
    #[default]
    Include,
    /// The selection is every non-header row except `keys`. Reserved for
    /// select-all semantics; gesture handling only ever produces include mode.
    Exclude,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionState {
    pub keys: HashSet<RowKey>,
    pub mode: SelectionMode,
}

impl SelectionState {
    pub fn select_all() -> Self {
        Self { keys: HashSet::new(), mode: SelectionMode::Exclude }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.mode = SelectionMode::Include;
    }

    pub fn is_empty(&self) -> bool {
        self.mode == SelectionMode::Include && self.keys.is_empty()
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        match self.mode {
            SelectionMode::Include => self.keys.contains(key),
            SelectionMode::Exclude => !key.is_header() && !self.keys.contains(key),
        }
    }
}

/// Child keys of every multi-item group, in display order.
fn group_children(rows: &[DisplayRow]) -> HashMap<RequestId, Vec<RowKey>> {
    let mut children: HashMap<RequestId, Vec<RowKey>> = HashMap::new();
    for row in rows {
        if row.is_group_header {
            children.entry(row.group_key.clone()).or_default();
        } else if row.sibling_count > 1 {
            children.entry(row.group_key.clone()).or_default().push(row.key.clone());
        }
    }
    children
}

/// Expands the raw checked set the UI reports into a group-consistent
/// include-mode selection.
///
/// A header present in the raw set pulls in all of its children. A header
/// that disappeared from the raw set while its children are all still
/// reported was itself unchecked, and drops its children with it; if a child
/// disappeared instead, only the header demotes. Afterwards each group's
/// header is present exactly when every child is, so selecting the last
/// unchecked child promotes the header implicitly. Keys with no matching row
/// are dropped: the underlying data can refresh between gestures, and a
/// stale key is not a fault.
pub fn apply_selection_change(
    requested: &HashSet<RowKey>,
    previous: &SelectionState,
    rows: &[DisplayRow],
) -> SelectionState {
    let known: HashSet<&RowKey> = rows.iter().map(|row| &row.key).collect();
    let children = group_children(rows);

    let mut next: HashSet<RowKey> =
        requested.iter().filter(|key| known.contains(key)).cloned().collect();

    for (group_key, group_children) in &children {
        let header = RowKey::Header(group_key.clone());
        if next.contains(&header) {
            next.extend(group_children.iter().cloned());
        } else if previous.contains(&header)
            && group_children.iter().all(|child| next.contains(child))
        {
            // The header itself was unchecked (its children are all still in
            // the raw set): the whole group collapses out. When a child was
            // unchecked instead, only the header demotion below applies.
            for child in group_children {
                next.remove(child);
            }
        }
    }

    // Promote or demote headers so the group-consistency invariant holds.
    for (group_key, group_children) in &children {
        let header = RowKey::Header(group_key.clone());
        if !group_children.is_empty() && group_children.iter().all(|child| next.contains(child)) {
            next.insert(header);
        } else {
            next.remove(&header);
        }
    }

    SelectionState { keys: next, mode: SelectionMode::Include }
}

/// Number of distinct line items the selection reaches, counting a selected
/// header as its whole group without double-counting its children.
pub fn total_selected_count(selection: &SelectionState, rows: &[DisplayRow]) -> usize {
    match selection.mode {
        SelectionMode::Include => {
            let mut counted_groups: HashSet<&RequestId> = HashSet::new();
            let mut count = 0;
            for row in rows {
                if row.is_group_header && selection.keys.contains(&row.key) {
                    count += row.sibling_count;
                    counted_groups.insert(&row.group_key);
                }
            }
            for row in rows {
                if !row.is_group_header
                    && selection.keys.contains(&row.key)
                    && !counted_groups.contains(&row.group_key)
                {
                    count += 1;
                }
            }
            count
        }
        SelectionMode::Exclude => rows
            .iter()
            .filter(|row| !row.is_group_header && !selection.keys.contains(&row.key))
            .count(),
    }
}

/// Maps the selection back to concrete line items, in display order.
///
/// A selected header expands to every item of its group (header expansion
/// wins over any transiently co-selected child, so a group never resolves to
/// a partial subset). Duplicates collapse last-write-wins into the position
/// the item first appeared at. Stale keys resolve to nothing.
pub fn resolve_target_items(
    selection: &SelectionState,
    rows: &[DisplayRow],
    index: &GroupIndex,
) -> Vec<LineItem> {
    let mut ordered: Vec<LineItem> = Vec::new();
    let mut positions: HashMap<LineItemId, usize> = HashMap::new();

    let mut push = |item: &LineItem| match positions.get(&item.item_id) {
        Some(&at) => ordered[at] = item.clone(),
        None => {
            positions.insert(item.item_id.clone(), ordered.len());
            ordered.push(item.clone());
        }
    };

    for row in rows {
        if row.is_group_header {
            if selection.contains(&row.key) {
                for item in index.group(&row.group_key).unwrap_or(&[]) {
                    push(item);
                }
            }
        } else if selection.contains(&row.key) {
            push(&row.item);
        }
    }

    ordered
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{
        apply_selection_change, resolve_target_items, total_selected_count, SelectionMode,
        SelectionState,
    };
    use crate::domain::display::{DisplayRow, RowKey};
    use crate::domain::line_item::{LineItem, LineItemId, RequestId, Status};
    use crate::grouping::{group_and_flatten, ExpansionState, GroupIndex};

    fn item(request_id: &str, item_id: &str) -> LineItem {
        crate::domain::line_item::tests::item(request_id, item_id, Status::PendingApproval)
    }

    fn fixture() -> (Vec<LineItem>, Vec<DisplayRow>, GroupIndex) {
        let items = vec![
            item("R1", "A1"),
            item("R1", "A2"),
            item("R2", "B1"),
            item("R3", "C1"),
            item("R3", "C2"),
            item("R3", "C3"),
        ];
        let rows = group_and_flatten(&items, &ExpansionState::default());
        let index = GroupIndex::build(&items);
        (items, rows, index)
    }

    fn keys(raw: &[&str]) -> HashSet<RowKey> {
        raw.iter().map(|key| key.parse().unwrap()).collect()
    }

    #[test]
    fn selecting_a_header_pulls_in_every_child() {
        let (_, rows, _) = fixture();
        let next =
            apply_selection_change(&keys(&["header-R1"]), &SelectionState::default(), &rows);

        assert_eq!(next.keys, keys(&["header-R1", "A1", "A2"]));
        assert_eq!(total_selected_count(&next, &rows), 2);
    }

    #[test]
    fn selecting_every_child_promotes_the_header() {
        let (_, rows, _) = fixture();
        let next = apply_selection_change(&keys(&["A1", "A2"]), &SelectionState::default(), &rows);

        assert!(next.keys.contains(&"header-R1".parse().unwrap()));
        assert_eq!(total_selected_count(&next, &rows), 2);
    }

    #[test]
    fn partial_child_selection_keeps_the_header_out() {
        let (_, rows, _) = fixture();
        let next = apply_selection_change(&keys(&["C1", "C3"]), &SelectionState::default(), &rows);

        assert!(!next.keys.contains(&"header-R3".parse().unwrap()));
        assert_eq!(total_selected_count(&next, &rows), 2);
    }

    #[test]
    fn unchecking_a_header_drops_the_whole_group() {
        let (_, rows, _) = fixture();
        let selected =
            apply_selection_change(&keys(&["header-R3"]), &SelectionState::default(), &rows);

        // The toolkit reports the raw set with the header gone but the child
        // checkboxes still present; unchecking the header still collapses the
        // whole group out of the selection.
        let next = apply_selection_change(&keys(&["C1", "C2", "C3"]), &selected, &rows);
        assert!(next.keys.is_empty());
    }

    #[test]
    fn unchecking_one_child_demotes_only_the_header() {
        let (_, rows, _) = fixture();
        let selected =
            apply_selection_change(&keys(&["header-R3"]), &SelectionState::default(), &rows);

        let next = apply_selection_change(&keys(&["C1", "C2"]), &selected, &rows);
        assert_eq!(next.keys, keys(&["C1", "C2"]));
    }

    #[test]
    fn group_consistency_holds_for_arbitrary_raw_sets() {
        let (_, rows, _) = fixture();
        let raw_sets: Vec<HashSet<RowKey>> = vec![
            keys(&["header-R1", "C1"]),
            keys(&["A1", "B1", "C1", "C2", "C3"]),
            keys(&["header-R1", "header-R3", "B1"]),
            keys(&["A2"]),
            keys(&[]),
        ];

        for raw in raw_sets {
            let next = apply_selection_change(&raw, &SelectionState::default(), &rows);
            for group in ["R1", "R3"] {
                let group_key = RequestId(group.to_string());
                let header = RowKey::Header(group_key.clone());
                let children: Vec<&DisplayRow> = rows
                    .iter()
                    .filter(|row| !row.is_group_header && row.group_key == group_key)
                    .collect();
                let all_selected = children.iter().all(|row| next.keys.contains(&row.key));
                assert_eq!(
                    next.keys.contains(&header),
                    all_selected,
                    "header iff all children violated for {group}"
                );
            }
        }
    }

    #[test]
    fn stale_keys_are_silently_dropped() {
        let (_, rows, index) = fixture();
        let next = apply_selection_change(
            &keys(&["GONE-1", "header-R9", "B1"]),
            &SelectionState::default(),
            &rows,
        );

        assert_eq!(next.keys, keys(&["B1"]));
        let targets = resolve_target_items(&next, &rows, &index);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].item_id, LineItemId("B1".to_string()));
    }

    #[test]
    fn header_expansion_wins_and_resolution_is_idempotent() {
        let (_, rows, index) = fixture();
        // Transient state: header and one child both present.
        let selection = SelectionState { keys: keys(&["header-R1", "A2"]), ..Default::default() };

        let first = resolve_target_items(&selection, &rows, &index);
        let second = resolve_target_items(&selection, &rows, &index);

        let ids: Vec<&str> = first.iter().map(|item| item.item_id.0.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2"], "whole group, no duplicates, display order");
        assert_eq!(first, second);
    }

    #[test]
    fn resolution_matches_selected_count() {
        let (_, rows, index) = fixture();
        let next = apply_selection_change(
            &keys(&["header-R1", "B1", "C2"]),
            &SelectionState::default(),
            &rows,
        );

        let targets = resolve_target_items(&next, &rows, &index);
        assert_eq!(targets.len(), total_selected_count(&next, &rows));
        assert_eq!(targets.len(), 4);
    }

    #[test]
    fn exclude_mode_counts_and_resolves_the_complement() {
        let (_, rows, index) = fixture();
        let mut all = SelectionState::select_all();
        assert_eq!(total_selected_count(&all, &rows), 6);

        all.keys.insert("B1".parse().unwrap());
        all.keys.insert("C2".parse().unwrap());
        assert_eq!(total_selected_count(&all, &rows), 4);

        let targets = resolve_target_items(&all, &rows, &index);
        let ids: Vec<&str> = targets.iter().map(|item| item.item_id.0.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2", "C1", "C3"]);
    }

    #[test]
    fn cleared_selection_is_empty_include_mode() {
        let mut selection = SelectionState::select_all();
        selection.clear();
        assert!(selection.is_empty());
        assert_eq!(selection.mode, SelectionMode::Include);
    }
}
