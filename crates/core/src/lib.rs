pub mod config;
pub mod domain;
pub mod errors;
pub mod grouping;
pub mod progress;
pub mod selection;

pub use domain::display::{DisplayRow, RowKey};
pub use domain::line_item::{
    Capabilities, LineItem, LineItemId, PriceEdit, RequestId, Status,
};
pub use errors::{ApplicationError, DomainError};
pub use grouping::{flatten_index, group_and_flatten, ExpansionState, GroupIndex};
pub use progress::{
    OperationKind, OperationPhase, PresenterEffect, ProgressEvent, ProgressPresenter, ToastLevel,
};
pub use selection::{
    apply_selection_change, resolve_target_items, total_selected_count, SelectionMode,
    SelectionState,
};
