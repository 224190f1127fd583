pub mod client;
pub mod dispatch;
pub mod wire;

pub use client::{ApiError, ApprovalBackend, HttpApprovalClient};
pub use dispatch::{
    BulkCommandDispatcher, BulkOutcome, CacheHandle, CommentOutcome, CommentPrompt, FlagOutcome,
    NoopCache, PriceEditOutcome, ToastSink,
};
pub use wire::{
    normalize_items, Action, ApprovalBatch, ApprovalBatchEntry, AssignCoPayload,
    AssignIrq1Payload, GroupCommentPayload, ItemComment, NormalizeReport, PriceUpdate,
    RawLineItem, StatementOfNeedRequest,
};
