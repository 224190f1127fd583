use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::line_item::{LineItem, LineItemId, RequestId};

/// Identity of one display row. Header keys live in a distinct namespace from
/// item keys (`header-<request id>` vs. the raw item id), so a synthetic group
/// header can never collide with a real line item in the selection set.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RowKey {
    Header(RequestId),
    Item(LineItemId),
}

const HEADER_PREFIX: &str = "header-";

impl RowKey {
    pub fn is_header(&self) -> bool {
        matches!(self, RowKey::Header(_))
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Header(request_id) => write!(f, "{HEADER_PREFIX}{}", request_id.0),
            RowKey::Item(item_id) => f.write_str(&item_id.0),
        }
    }
}

impl FromStr for RowKey {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match raw.strip_prefix(HEADER_PREFIX) {
            Some(request_id) => RowKey::Header(RequestId(request_id.to_string())),
            None => RowKey::Item(LineItemId(raw.to_string())),
        })
    }
}

/// A line item decorated for grouped-table rendering: either a real item row
/// or a synthetic group header carrying the first item's fields for column
/// display while standing for the whole group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayRow {
    pub key: RowKey,
    pub item: LineItem,
    pub is_group_header: bool,
    pub group_key: RequestId,
    pub sibling_count: usize,
    pub visible: bool,
}
