//! Bulk command dispatch: turns "the user pressed Approve/Deny/Comment/Flag
//! for the current selection" into backend calls.
//!
//! Selection resolution and eligibility filtering happen client-side; the
//! backend only ever sees concrete item identity keys. Approve/deny are one
//! atomic batch each, comments collect through one modal prompt at a time,
//! and the cybersecurity flag loop continues past individual failures.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use procura_core::{
    resolve_target_items, ApplicationError, DisplayRow, DomainError, GroupIndex, LineItem,
    OperationKind, ProgressPresenter, RequestId, SelectionState, ToastLevel,
};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::client::{ApprovalBackend, ApiError};
use crate::wire::{
    Action, ApprovalBatch, AssignCoPayload, AssignIrq1Payload, GroupCommentPayload, ItemComment,
    PriceUpdate, StatementOfNeedRequest,
};

/// Modal collaborator for the comment flow. Exactly one prompt is open at a
/// time; `None` means the user cancelled and the sequence ends early.
#[async_trait]
pub trait CommentPrompt: Send + Sync {
    async fn prompt(&self, item: &LineItem) -> Option<String>;
}

/// Transient user-visible notifications.
pub trait ToastSink: Send + Sync {
    fn toast(&self, level: ToastLevel, message: &str);
}

/// Handle onto the line-item query cache; mutations invalidate it so the
/// table refetches.
pub trait CacheHandle: Send + Sync {
    fn invalidate(&self);
}

#[derive(Default)]
pub struct NoopCache;

impl CacheHandle for NoopCache {
    fn invalidate(&self) {}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BulkOutcome {
    /// Nothing in the selection was actionable; no backend call was made.
    NoEligibleItems,
    Submitted { items: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommentOutcome {
    pub submitted: usize,
    pub cancelled_early: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlagOutcome {
    pub flagged: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PriceEditOutcome {
    Accepted,
    /// The backend rejected the update; the item's price fields were
    /// restored to their pre-edit values.
    RolledBack,
}

pub struct BulkCommandDispatcher<B> {
    backend: B,
    toasts: Arc<dyn ToastSink>,
    cache: Arc<dyn CacheHandle>,
}

impl<B> BulkCommandDispatcher<B>
where
    B: ApprovalBackend,
{
    pub fn new(backend: B, toasts: Arc<dyn ToastSink>, cache: Arc<dyn CacheHandle>) -> Self {
        Self { backend, toasts, cache }
    }

    pub async fn approve(
        &self,
        selection: &mut SelectionState,
        rows: &[DisplayRow],
        index: &GroupIndex,
    ) -> Result<BulkOutcome, ApplicationError> {
        self.decide(selection, rows, index, Action::Approve).await
    }

    pub async fn deny(
        &self,
        selection: &mut SelectionState,
        rows: &[DisplayRow],
        index: &GroupIndex,
    ) -> Result<BulkOutcome, ApplicationError> {
        self.decide(selection, rows, index, Action::Deny).await
    }

    async fn decide(
        &self,
        selection: &mut SelectionState,
        rows: &[DisplayRow],
        index: &GroupIndex,
        action: Action,
    ) -> Result<BulkOutcome, ApplicationError> {
        let targets = resolve_target_items(selection, rows, index);
        let eligible: Vec<LineItem> = targets
            .into_iter()
            .filter(|item| {
                let caps = item.status.capabilities();
                match action {
                    Action::Approve => caps.can_approve,
                    Action::Deny => caps.can_deny,
                }
            })
            .collect();

        if eligible.is_empty() {
            self.toasts
                .toast(ToastLevel::Warning, "No selected items are eligible for this action.");
            return Ok(BulkOutcome::NoEligibleItems);
        }

        let (batch, verb) = match action {
            Action::Approve => (ApprovalBatch::approve(&eligible), "Approved"),
            Action::Deny => (ApprovalBatch::deny(&eligible), "Denied"),
        };
        let result = match action {
            Action::Approve => self.backend.approve_requests(&batch).await,
            Action::Deny => self.backend.deny_requests(&batch).await,
        };

        if let Err(error) = result {
            warn!(
                event_name = "dispatch.batch_rejected",
                action = ?action,
                items = batch.items.len(),
                error = %error,
                "backend rejected the batch"
            );
            let error = ApplicationError::Backend(error.to_string());
            self.toasts.toast(ToastLevel::Error, error.user_message());
            return Err(error);
        }

        info!(
            event_name = "dispatch.batch_accepted",
            action = ?action,
            items = batch.items.len(),
            "batch accepted"
        );
        self.cache.invalidate();
        selection.clear();
        self.toasts
            .toast(ToastLevel::Success, &format!("{verb} {} item(s).", batch.items.len()));
        Ok(BulkOutcome::Submitted { items: batch.items.len() })
    }

    /// Prompts for a comment per resolved item, strictly one prompt at a
    /// time, then submits the collected pairs as one bulk request per group.
    /// Cancelling a prompt ends the sequence; comments already entered are
    /// still submitted. The selection clears either way.
    pub async fn comment(
        &self,
        prompt: &dyn CommentPrompt,
        selection: &mut SelectionState,
        rows: &[DisplayRow],
        index: &GroupIndex,
    ) -> Result<CommentOutcome, ApplicationError> {
        let targets = resolve_target_items(selection, rows, index);

        let mut group_order: Vec<RequestId> = Vec::new();
        let mut by_group: HashMap<RequestId, Vec<ItemComment>> = HashMap::new();
        let mut cancelled_early = false;
        let mut submitted = 0;

        for item in &targets {
            let Some(comment) = prompt.prompt(item).await else {
                cancelled_early = true;
                break;
            };
            if !by_group.contains_key(&item.request_id) {
                group_order.push(item.request_id.clone());
            }
            by_group
                .entry(item.request_id.clone())
                .or_default()
                .push(ItemComment { item_id: item.item_id.clone(), comment });
            submitted += 1;
        }

        for group_key in group_order {
            let comments = by_group.remove(&group_key).unwrap_or_default();
            let payload = GroupCommentPayload { group_key, comments };
            if let Err(error) = self.backend.add_comments(&payload).await {
                let error = ApplicationError::Backend(error.to_string());
                self.toasts.toast(ToastLevel::Error, error.user_message());
                selection.clear();
                return Err(error);
            }
        }

        selection.clear();
        if submitted > 0 {
            self.cache.invalidate();
            self.toasts
                .toast(ToastLevel::Success, &format!("Added comments to {submitted} item(s)."));
        }
        Ok(CommentOutcome { submitted, cancelled_early })
    }

    /// Flags each resolved item individually (no batch endpoint exists),
    /// continuing past per-item failures and surfacing one aggregated toast.
    pub async fn flag_cybersecurity(
        &self,
        selection: &mut SelectionState,
        rows: &[DisplayRow],
        index: &GroupIndex,
    ) -> Result<FlagOutcome, ApplicationError> {
        let targets = resolve_target_items(selection, rows, index);
        let mut flagged = 0;
        let mut failed = 0;

        for item in &targets {
            match self.backend.flag_cyber_sec(&item.item_id).await {
                Ok(()) => flagged += 1,
                Err(error) => {
                    warn!(
                        event_name = "dispatch.flag_failed",
                        item_id = %item.item_id.0,
                        error = %error,
                        "cybersecurity flag failed; continuing"
                    );
                    failed += 1;
                }
            }
        }

        selection.clear();
        if failed == 0 {
            self.toasts.toast(
                ToastLevel::Success,
                &format!("Flagged {flagged} item(s) as cybersecurity-related."),
            );
        } else {
            self.toasts.toast(
                ToastLevel::Warning,
                &format!(
                    "Flagged {flagged} of {} item(s); {failed} failed.",
                    flagged + failed
                ),
            );
        }
        if flagged > 0 {
            self.cache.invalidate();
        }
        Ok(FlagOutcome { flagged, failed })
    }

    /// Optimistic unit-price edit: the new value is applied locally before
    /// the backend call and rolled back bit-identically if it rejects.
    pub async fn edit_unit_price(
        &self,
        row: &mut DisplayRow,
        new_unit_price: Decimal,
    ) -> Result<PriceEditOutcome, ApplicationError> {
        if row.is_group_header {
            return Err(DomainError::HeaderRowNotEditable.into());
        }

        let edit = row.item.set_unit_price(new_unit_price)?;
        let update = PriceUpdate {
            item_id: row.item.item_id.clone(),
            unit_price: row.item.unit_price,
            line_total: row.item.line_total,
        };

        match self.backend.update_prices(&update).await {
            Ok(()) => {
                self.cache.invalidate();
                Ok(PriceEditOutcome::Accepted)
            }
            Err(error) => {
                row.item.revert_price(edit);
                warn!(
                    event_name = "dispatch.price_edit_rejected",
                    item_id = %row.item.item_id.0,
                    error = %error,
                    "price edit rejected; reverted to prior values"
                );
                self.toasts
                    .toast(ToastLevel::Error, "Price update was rejected and has been reverted.");
                Ok(PriceEditOutcome::RolledBack)
            }
        }
    }

    /// Assigns the IRQ1 reference, enforcing assign-once locally before the
    /// backend call; a rejection undoes the local assignment.
    pub async fn assign_irq1(
        &self,
        item: &mut LineItem,
        irq1_id: &str,
    ) -> Result<(), ApplicationError> {
        item.assign_irq1(irq1_id)?;

        let payload =
            AssignIrq1Payload { request_id: item.request_id.clone(), irq1_id: irq1_id.to_string() };
        if let Err(error) = self.backend.assign_irq1_id(&payload).await {
            item.irq1_id = None;
            let error = ApplicationError::Backend(error.to_string());
            self.toasts.toast(ToastLevel::Error, error.user_message());
            return Err(error);
        }

        self.cache.invalidate();
        Ok(())
    }

    pub async fn assign_contracting_officer(
        &self,
        request_ids: Vec<RequestId>,
        contracting_officer: &str,
    ) -> Result<(), ApplicationError> {
        let payload = AssignCoPayload {
            request_ids,
            contracting_officer: contracting_officer.to_string(),
        };
        self.backend
            .assign_co(&payload)
            .await
            .map_err(|error| ApplicationError::Backend(error.to_string()))?;
        self.cache.invalidate();
        Ok(())
    }

    /// Fetches the statement-of-need PDF. Sets the download intent first so
    /// the progress indicator is labelled correctly when the server's START
    /// event arrives.
    pub async fn download_statement_of_need(
        &self,
        presenter: &mut ProgressPresenter,
        request_id: RequestId,
        items: Vec<LineItem>,
    ) -> Result<Vec<u8>, ApplicationError> {
        presenter.begin(OperationKind::DownloadPdf);
        let request = StatementOfNeedRequest { request_id, items };
        self.backend.download_statement_of_need(&request).await.map_err(map_api_error)
    }
}

fn map_api_error(error: ApiError) -> ApplicationError {
    match error {
        ApiError::Transport(message) => ApplicationError::Transport(message),
        other => ApplicationError::Backend(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;
    use procura_core::{
        apply_selection_change, group_and_flatten, DisplayRow, ExpansionState, GroupIndex,
        LineItem, LineItemId, OperationPhase, ProgressPresenter, RequestId, RowKey,
        SelectionState, Status, ToastLevel,
    };
    use rust_decimal::Decimal;

    use super::{
        BulkCommandDispatcher, BulkOutcome, CacheHandle, CommentPrompt, FlagOutcome,
        PriceEditOutcome, ToastSink,
    };
    use crate::client::{ApiError, ApprovalBackend};
    use crate::wire::{
        Action, ApprovalBatch, AssignCoPayload, AssignIrq1Payload, GroupCommentPayload,
        PriceUpdate, RawLineItem, StatementOfNeedRequest,
    };

    fn item(request_id: &str, item_id: &str, status: Status) -> LineItem {
        LineItem {
            request_id: RequestId(request_id.to_string()),
            item_id: LineItemId(item_id.to_string()),
            irq1_id: None,
            requester: "j.marshall".to_string(),
            budget_object_code: "3101".to_string(),
            fund: "GEN-2026".to_string(),
            location: "Records Annex".to_string(),
            quantity: 2,
            unit_price: Decimal::new(1500, 2),
            line_total: Decimal::new(3000, 2),
            description: "Binders".to_string(),
            justification: "Stock".to_string(),
            status,
            submitted_at: Utc::now(),
        }
    }

    #[derive(Default)]
    struct Script {
        approve_results: VecDeque<Result<(), ApiError>>,
        deny_results: VecDeque<Result<(), ApiError>>,
        comment_results: VecDeque<Result<(), ApiError>>,
        flag_results: VecDeque<Result<(), ApiError>>,
        price_results: VecDeque<Result<(), ApiError>>,
        irq1_results: VecDeque<Result<(), ApiError>>,
        approve_batches: Vec<ApprovalBatch>,
        deny_batches: Vec<ApprovalBatch>,
        comment_payloads: Vec<GroupCommentPayload>,
        flagged: Vec<LineItemId>,
        price_updates: Vec<PriceUpdate>,
        co_payloads: Vec<AssignCoPayload>,
        download_requests: Vec<StatementOfNeedRequest>,
    }

    #[derive(Default)]
    struct ScriptedBackend {
        script: Mutex<Script>,
    }

    impl ScriptedBackend {
        fn with(configure: impl FnOnce(&mut Script)) -> Arc<Self> {
            let backend = Self::default();
            configure(&mut backend.script.lock().unwrap());
            Arc::new(backend)
        }
    }

    #[async_trait]
    impl ApprovalBackend for ScriptedBackend {
        async fn get_approval_data(
            &self,
            _scope: Option<&RequestId>,
        ) -> Result<Vec<RawLineItem>, ApiError> {
            Ok(Vec::new())
        }

        async fn approve_requests(&self, batch: &ApprovalBatch) -> Result<(), ApiError> {
            let mut script = self.script.lock().unwrap();
            script.approve_batches.push(batch.clone());
            script.approve_results.pop_front().unwrap_or(Ok(()))
        }

        async fn deny_requests(&self, batch: &ApprovalBatch) -> Result<(), ApiError> {
            let mut script = self.script.lock().unwrap();
            script.deny_batches.push(batch.clone());
            script.deny_results.pop_front().unwrap_or(Ok(()))
        }

        async fn add_comments(&self, payload: &GroupCommentPayload) -> Result<(), ApiError> {
            let mut script = self.script.lock().unwrap();
            script.comment_payloads.push(payload.clone());
            script.comment_results.pop_front().unwrap_or(Ok(()))
        }

        async fn flag_cyber_sec(&self, item_id: &LineItemId) -> Result<(), ApiError> {
            let mut script = self.script.lock().unwrap();
            script.flagged.push(item_id.clone());
            script.flag_results.pop_front().unwrap_or(Ok(()))
        }

        async fn assign_irq1_id(&self, _payload: &AssignIrq1Payload) -> Result<(), ApiError> {
            let mut script = self.script.lock().unwrap();
            script.irq1_results.pop_front().unwrap_or(Ok(()))
        }

        async fn assign_co(&self, payload: &AssignCoPayload) -> Result<(), ApiError> {
            let mut script = self.script.lock().unwrap();
            script.co_payloads.push(payload.clone());
            Ok(())
        }

        async fn update_prices(&self, update: &PriceUpdate) -> Result<(), ApiError> {
            let mut script = self.script.lock().unwrap();
            script.price_updates.push(update.clone());
            script.price_results.pop_front().unwrap_or(Ok(()))
        }

        async fn download_statement_of_need(
            &self,
            request: &StatementOfNeedRequest,
        ) -> Result<Vec<u8>, ApiError> {
            let mut script = self.script.lock().unwrap();
            script.download_requests.push(request.clone());
            Ok(b"%PDF-1.7".to_vec())
        }
    }

    #[derive(Default)]
    struct RecordingToasts {
        messages: Mutex<Vec<(ToastLevel, String)>>,
    }

    impl ToastSink for RecordingToasts {
        fn toast(&self, level: ToastLevel, message: &str) {
            self.messages.lock().unwrap().push((level, message.to_string()));
        }
    }

    #[derive(Default)]
    struct CountingCache {
        invalidations: AtomicUsize,
    }

    impl CacheHandle for CountingCache {
        fn invalidate(&self) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct QueuedPrompt {
        replies: Mutex<VecDeque<Option<String>>>,
        prompted: Mutex<Vec<LineItemId>>,
    }

    impl QueuedPrompt {
        fn new(replies: Vec<Option<String>>) -> Self {
            Self { replies: Mutex::new(replies.into()), prompted: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl CommentPrompt for QueuedPrompt {
        async fn prompt(&self, item: &LineItem) -> Option<String> {
            self.prompted.lock().unwrap().push(item.item_id.clone());
            self.replies.lock().unwrap().pop_front().flatten()
        }
    }

    struct Harness {
        backend: Arc<ScriptedBackend>,
        dispatcher: BulkCommandDispatcher<Arc<ScriptedBackend>>,
        toasts: Arc<RecordingToasts>,
        cache: Arc<CountingCache>,
        rows: Vec<DisplayRow>,
        index: GroupIndex,
    }

    fn harness(items: Vec<LineItem>, backend: Arc<ScriptedBackend>) -> Harness {
        let toasts = Arc::new(RecordingToasts::default());
        let cache = Arc::new(CountingCache::default());
        let rows = group_and_flatten(&items, &ExpansionState::default());
        let index = GroupIndex::build(&items);
        let dispatcher =
            BulkCommandDispatcher::new(backend.clone(), toasts.clone(), cache.clone());
        Harness { backend, dispatcher, toasts, cache, rows, index }
    }

    fn select(harness: &Harness, raw: &[&str]) -> SelectionState {
        let requested = raw.iter().map(|key| key.parse::<RowKey>().unwrap()).collect();
        apply_selection_change(&requested, &SelectionState::default(), &harness.rows)
    }

    #[tokio::test]
    async fn approve_filters_out_items_past_decision() {
        let harness = harness(
            vec![item("R1", "A1", Status::NewRequest), item("R2", "B1", Status::Approved)],
            ScriptedBackend::with(|_| {}),
        );
        let mut selection = select(&harness, &["A1", "B1"]);

        let outcome = harness
            .dispatcher
            .approve(&mut selection, &harness.rows, &harness.index)
            .await
            .expect("approve should succeed");

        assert_eq!(outcome, BulkOutcome::Submitted { items: 1 });
        let batches = &harness.backend.script.lock().unwrap().approve_batches;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].items.len(), 1);
        assert_eq!(batches[0].items[0].item_id.0, "A1");
        assert!(selection.is_empty(), "selection clears after a successful batch");
        assert_eq!(harness.cache.invalidations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn approve_with_no_eligible_items_makes_no_backend_call() {
        let harness = harness(
            vec![item("R1", "A1", Status::Approved), item("R2", "B1", Status::Denied)],
            ScriptedBackend::with(|_| {}),
        );
        let mut selection = select(&harness, &["A1", "B1"]);

        let outcome = harness
            .dispatcher
            .approve(&mut selection, &harness.rows, &harness.index)
            .await
            .expect("empty eligible set is not an error");

        assert_eq!(outcome, BulkOutcome::NoEligibleItems);
        assert!(harness.backend.script.lock().unwrap().approve_batches.is_empty());
        assert!(!selection.is_empty(), "selection is kept so the user can adjust it");
        let toasts = harness.toasts.messages.lock().unwrap();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].0, ToastLevel::Warning);
    }

    #[tokio::test]
    async fn approve_backend_rejection_surfaces_one_error_and_keeps_selection() {
        let harness = harness(
            vec![item("R1", "A1", Status::PendingApproval)],
            ScriptedBackend::with(|script| {
                script
                    .approve_results
                    .push_back(Err(ApiError::Status { status: 500, message: "ledger".into() }));
            }),
        );
        let mut selection = select(&harness, &["A1"]);

        let error = harness
            .dispatcher
            .approve(&mut selection, &harness.rows, &harness.index)
            .await
            .expect_err("batch rejection propagates");

        assert!(matches!(error, procura_core::ApplicationError::Backend(_)));
        assert!(!selection.is_empty());
        assert_eq!(harness.cache.invalidations.load(Ordering::SeqCst), 0);
        let toasts = harness.toasts.messages.lock().unwrap();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].0, ToastLevel::Error);
    }

    #[tokio::test]
    async fn deny_forces_denied_target_status() {
        let harness = harness(
            vec![item("R1", "A1", Status::PendingApproval)],
            ScriptedBackend::with(|_| {}),
        );
        let mut selection = select(&harness, &["A1"]);

        harness
            .dispatcher
            .deny(&mut selection, &harness.rows, &harness.index)
            .await
            .expect("deny should succeed");

        let script = harness.backend.script.lock().unwrap();
        assert_eq!(script.deny_batches.len(), 1);
        assert_eq!(script.deny_batches[0].action, Action::Deny);
        assert_eq!(script.deny_batches[0].items[0].target_status, Status::Denied);
    }

    #[tokio::test]
    async fn selecting_a_header_approves_the_whole_group() {
        let harness = harness(
            vec![
                item("R1", "A1", Status::PendingApproval),
                item("R1", "A2", Status::NewRequest),
            ],
            ScriptedBackend::with(|_| {}),
        );
        let mut selection = select(&harness, &["header-R1"]);

        let outcome = harness
            .dispatcher
            .approve(&mut selection, &harness.rows, &harness.index)
            .await
            .expect("approve should succeed");

        assert_eq!(outcome, BulkOutcome::Submitted { items: 2 });
    }

    #[tokio::test]
    async fn comment_prompts_one_item_at_a_time_in_display_order() {
        let harness = harness(
            vec![
                item("R1", "A1", Status::PendingApproval),
                item("R1", "A2", Status::PendingApproval),
                item("R2", "B1", Status::NewRequest),
            ],
            ScriptedBackend::with(|_| {}),
        );
        let mut selection = select(&harness, &["header-R1", "B1"]);
        let prompt = QueuedPrompt::new(vec![
            Some("needs quote".to_string()),
            Some("ok".to_string()),
            Some("verify fund".to_string()),
        ]);

        let outcome = harness
            .dispatcher
            .comment(&prompt, &mut selection, &harness.rows, &harness.index)
            .await
            .expect("comments should submit");

        assert_eq!(outcome.submitted, 3);
        assert!(!outcome.cancelled_early);
        let prompted: Vec<String> =
            prompt.prompted.lock().unwrap().iter().map(|id| id.0.clone()).collect();
        assert_eq!(prompted, vec!["A1", "A2", "B1"]);

        let payloads = &harness.backend.script.lock().unwrap().comment_payloads;
        assert_eq!(payloads.len(), 2, "one bulk request per group");
        assert_eq!(payloads[0].group_key.0, "R1");
        assert_eq!(payloads[0].comments.len(), 2);
        assert_eq!(payloads[1].group_key.0, "R2");
        assert!(selection.is_empty());
    }

    #[tokio::test]
    async fn cancelling_a_prompt_ends_the_sequence_but_submits_collected_comments() {
        let harness = harness(
            vec![
                item("R1", "A1", Status::PendingApproval),
                item("R1", "A2", Status::PendingApproval),
            ],
            ScriptedBackend::with(|_| {}),
        );
        let mut selection = select(&harness, &["header-R1"]);
        let prompt = QueuedPrompt::new(vec![Some("first".to_string()), None]);

        let outcome = harness
            .dispatcher
            .comment(&prompt, &mut selection, &harness.rows, &harness.index)
            .await
            .expect("partial submission should succeed");

        assert_eq!(outcome, super::CommentOutcome { submitted: 1, cancelled_early: true });
        let payloads = &harness.backend.script.lock().unwrap().comment_payloads;
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].comments.len(), 1);
        assert!(selection.is_empty(), "selection clears even on early cancel");
    }

    #[tokio::test]
    async fn flag_loop_continues_past_failures_and_aggregates_one_toast() {
        let harness = harness(
            vec![
                item("R1", "A1", Status::PendingApproval),
                item("R2", "B1", Status::PendingApproval),
                item("R3", "C1", Status::PendingApproval),
            ],
            ScriptedBackend::with(|script| {
                script.flag_results.push_back(Ok(()));
                script
                    .flag_results
                    .push_back(Err(ApiError::Status { status: 502, message: "gw".into() }));
                script.flag_results.push_back(Ok(()));
            }),
        );
        let mut selection = select(&harness, &["A1", "B1", "C1"]);

        let outcome = harness
            .dispatcher
            .flag_cybersecurity(&mut selection, &harness.rows, &harness.index)
            .await
            .expect("flag loop never aborts");

        assert_eq!(outcome, FlagOutcome { flagged: 2, failed: 1 });
        assert_eq!(harness.backend.script.lock().unwrap().flagged.len(), 3);
        assert!(selection.is_empty(), "selection clears regardless of per-item outcomes");
        let toasts = harness.toasts.messages.lock().unwrap();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].0, ToastLevel::Warning);
        assert!(toasts[0].1.contains("2 of 3"));
    }

    #[tokio::test]
    async fn accepted_price_edit_keeps_the_total_invariant() {
        let harness = harness(
            vec![item("R1", "A1", Status::PendingApproval)],
            ScriptedBackend::with(|_| {}),
        );
        let mut row = harness.rows[0].clone();

        let outcome = harness
            .dispatcher
            .edit_unit_price(&mut row, Decimal::new(2100, 2))
            .await
            .expect("edit should be accepted");

        assert_eq!(outcome, PriceEditOutcome::Accepted);
        assert_eq!(row.item.unit_price, Decimal::new(2100, 2));
        assert_eq!(row.item.line_total, Decimal::new(4200, 2));
        let updates = &harness.backend.script.lock().unwrap().price_updates;
        assert_eq!(updates[0].line_total, Decimal::new(4200, 2));
    }

    #[tokio::test]
    async fn rejected_price_edit_rolls_back_to_bit_identical_values() {
        let harness = harness(
            vec![item("R1", "A1", Status::PendingApproval)],
            ScriptedBackend::with(|script| {
                script
                    .price_results
                    .push_back(Err(ApiError::Status { status: 409, message: "stale".into() }));
            }),
        );
        let mut row = harness.rows[0].clone();
        let before = row.item.clone();

        let outcome = harness
            .dispatcher
            .edit_unit_price(&mut row, Decimal::new(2100, 2))
            .await
            .expect("rollback is not an error");

        assert_eq!(outcome, PriceEditOutcome::RolledBack);
        assert_eq!(row.item.unit_price, before.unit_price);
        assert_eq!(row.item.line_total, before.line_total);
        let toasts = harness.toasts.messages.lock().unwrap();
        assert_eq!(toasts[0].0, ToastLevel::Error);
    }

    #[tokio::test]
    async fn header_rows_reject_price_edits() {
        let harness = harness(
            vec![
                item("R1", "A1", Status::PendingApproval),
                item("R1", "A2", Status::PendingApproval),
            ],
            ScriptedBackend::with(|_| {}),
        );
        let mut header = harness.rows[0].clone();
        assert!(header.is_group_header);

        let error = harness
            .dispatcher
            .edit_unit_price(&mut header, Decimal::ONE)
            .await
            .expect_err("headers are not editable");
        assert!(matches!(
            error,
            procura_core::ApplicationError::Domain(
                procura_core::DomainError::HeaderRowNotEditable
            )
        ));
    }

    #[tokio::test]
    async fn irq1_assignment_rolls_back_locally_when_backend_rejects() {
        let rejecting = harness(Vec::new(), ScriptedBackend::with(|script| {
            script
                .irq1_results
                .push_back(Err(ApiError::Status { status: 500, message: "down".into() }));
        }));
        let mut target = item("R1", "A1", Status::PendingApproval);

        rejecting
            .dispatcher
            .assign_irq1(&mut target, "IRQ1-31")
            .await
            .expect_err("backend rejection propagates");
        assert!(target.irq1_id.is_none(), "local assignment is undone");

        let accepting = harness(Vec::new(), ScriptedBackend::with(|_| {}));
        let mut target = item("R1", "A1", Status::PendingApproval);
        accepting.dispatcher.assign_irq1(&mut target, "IRQ1-31").await.expect("assignment lands");
        assert_eq!(target.irq1_id.as_deref(), Some("IRQ1-31"));
    }

    #[tokio::test]
    async fn download_sets_the_pdf_intent_before_the_request() {
        let harness = harness(
            vec![item("R1", "A1", Status::Approved)],
            ScriptedBackend::with(|_| {}),
        );
        let mut presenter = ProgressPresenter::default();

        let bytes = harness
            .dispatcher
            .download_statement_of_need(
                &mut presenter,
                RequestId("R1".to_string()),
                vec![item("R1", "A1", Status::Approved)],
            )
            .await
            .expect("download should succeed");

        assert_eq!(bytes, b"%PDF-1.7");
        assert_eq!(presenter.active(), Some(procura_core::OperationKind::DownloadPdf));
        assert_eq!(presenter.phase(), OperationPhase::Idle);
        assert_eq!(harness.backend.script.lock().unwrap().download_requests.len(), 1);
    }

    #[tokio::test]
    async fn contracting_officer_assignment_invalidates_the_cache() {
        let harness = harness(Vec::new(), ScriptedBackend::with(|_| {}));

        harness
            .dispatcher
            .assign_contracting_officer(vec![RequestId("R1".to_string())], "m.alvarez")
            .await
            .expect("assignment should succeed");

        assert_eq!(harness.cache.invalidations.load(Ordering::SeqCst), 1);
        assert_eq!(harness.backend.script.lock().unwrap().co_payloads.len(), 1);
    }
}
