//! Grouping engine: partitions line items by request id and flattens the
//! groups into the display-ordered header + child row sequence.

use std::collections::HashMap;

use crate::domain::display::{DisplayRow, RowKey};
use crate::domain::line_item::{LineItem, RequestId};

/// Line items partitioned by request id, preserving first-seen order of both
/// the requests and the items within each request. Nothing is sorted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupIndex {
    order: Vec<RequestId>,
    groups: HashMap<RequestId, Vec<LineItem>>,
}

impl GroupIndex {
    pub fn build(items: &[LineItem]) -> Self {
        let mut index = GroupIndex::default();
        for item in items {
            let group = match index.groups.get_mut(&item.request_id) {
                Some(group) => group,
                None => {
                    index.order.push(item.request_id.clone());
                    index.groups.entry(item.request_id.clone()).or_default()
                }
            };
            group.push(item.clone());
        }
        index
    }

    pub fn group(&self, key: &RequestId) -> Option<&[LineItem]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RequestId, &[LineItem])> {
        self.order.iter().map(|key| (key, self.groups[key].as_slice()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Which multi-item groups are currently expanded. Collapsed is the default
/// for groups never toggled.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpansionState {
    expanded: HashMap<RequestId, bool>,
}

impl ExpansionState {
    pub fn is_expanded(&self, key: &RequestId) -> bool {
        self.expanded.get(key).copied().unwrap_or(false)
    }

    /// Flips one group's expansion flag. The caller re-flattens afterwards.
    pub fn toggle(&mut self, key: &RequestId) {
        let entry = self.expanded.entry(key.clone()).or_insert(false);
        *entry = !*entry;
    }

    pub fn expand(&mut self, key: &RequestId) {
        self.expanded.insert(key.clone(), true);
    }
}

/// Flattens grouped items into display order: a request with a single item
/// becomes one plain row; a request with two or more items becomes a
/// synthetic header row (carrying the first item's fields) followed by its
/// child rows, whose visibility mirrors the group's expansion flag.
pub fn group_and_flatten(items: &[LineItem], expansion: &ExpansionState) -> Vec<DisplayRow> {
    let index = GroupIndex::build(items);
    flatten_index(&index, expansion)
}

/// Same as [`group_and_flatten`] but reuses an already-built index.
pub fn flatten_index(index: &GroupIndex, expansion: &ExpansionState) -> Vec<DisplayRow> {
    let mut rows = Vec::new();

    for (group_key, group) in index.iter() {
        if group.len() == 1 {
            let item = &group[0];
            rows.push(DisplayRow {
                key: RowKey::Item(item.item_id.clone()),
                item: item.clone(),
                is_group_header: false,
                group_key: group_key.clone(),
                sibling_count: 1,
                visible: true,
            });
            continue;
        }

        let children_visible = expansion.is_expanded(group_key);
        rows.push(DisplayRow {
            key: RowKey::Header(group_key.clone()),
            item: group[0].clone(),
            is_group_header: true,
            group_key: group_key.clone(),
            sibling_count: group.len(),
            visible: true,
        });
        for item in group {
            rows.push(DisplayRow {
                key: RowKey::Item(item.item_id.clone()),
                item: item.clone(),
                is_group_header: false,
                group_key: group_key.clone(),
                sibling_count: group.len(),
                visible: children_visible,
            });
        }
    }

    rows
}
