//! Presenter state machine for long-running backend operations.
//!
//! Exactly one operation owns the visible progress indicator at a time. The
//! presenter is a pure reducer: [`ProgressPresenter::apply`] consumes one
//! server event and returns the effects the shell must perform (show or
//! update the indicator, toast, schedule the dismissal after the grace
//! delay). The transport pump drives it in server-send order.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which client-side intent currently owns the progress indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    DownloadPdf,
    SubmitRequest,
    ApprovalProcessing,
}

impl OperationKind {
    pub const fn label(self) -> &'static str {
        match self {
            OperationKind::DownloadPdf => "Downloading PDF",
            OperationKind::SubmitRequest => "Submitting request",
            OperationKind::ApprovalProcessing => "Approval request processing",
        }
    }
}

/// Server-pushed notification lifecycle events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    Start { message: String },
    Progress { percent: u8 },
    Done,
    Reset { message: Option<String> },
    UserFound { message: String },
    UserNotFound { message: String },
    ConnectionTimeout { message: String },
    Error { message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// What the shell must do in response to one applied event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresenterEffect {
    ShowIndicator { label: String },
    UpdateIndicator { percent: u8 },
    /// Keep the final frame visible for the grace delay, then call
    /// [`ProgressPresenter::finish_dismiss`].
    ScheduleDismiss { after: Duration },
    DismissIndicator,
    Toast { level: ToastLevel, message: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OperationPhase {
    #[default]
    Idle,
    Started,
    InProgress {
        percent: u8,
    },
    /// Finished; waiting out the grace delay before dismissal.
    Done,
}

#[derive(Clone, Debug)]
pub struct ProgressPresenter {
    active: Option<OperationKind>,
    phase: OperationPhase,
    grace: Duration,
}

impl Default for ProgressPresenter {
    fn default() -> Self {
        Self::new(Duration::from_millis(750))
    }
}

impl ProgressPresenter {
    pub fn new(grace: Duration) -> Self {
        Self { active: None, phase: OperationPhase::Idle, grace }
    }

    /// Records which operation the client is about to start, so the next
    /// `START` event labels the indicator correctly. The last caller before
    /// the event arrives owns the indicator.
    pub fn begin(&mut self, kind: OperationKind) {
        self.active = Some(kind);
    }

    pub fn active(&self) -> Option<OperationKind> {
        self.active
    }

    pub fn phase(&self) -> OperationPhase {
        self.phase
    }

    pub fn apply(&mut self, event: &ProgressEvent) -> Vec<PresenterEffect> {
        match event {
            ProgressEvent::Start { message } => {
                let label = match self.active {
                    Some(kind) => kind.label().to_string(),
                    None => message.clone(),
                };
                self.phase = OperationPhase::Started;
                vec![PresenterEffect::ShowIndicator { label }]
            }
            ProgressEvent::Progress { percent } => self.apply_progress(*percent),
            ProgressEvent::Done => {
                self.phase = OperationPhase::Done;
                vec![PresenterEffect::ScheduleDismiss { after: self.grace }]
            }
            ProgressEvent::Reset { message } => {
                self.active = None;
                self.phase = OperationPhase::Idle;
                let mut effects = vec![PresenterEffect::DismissIndicator];
                if let Some(message) = message {
                    effects.push(PresenterEffect::Toast {
                        level: ToastLevel::Info,
                        message: message.clone(),
                    });
                }
                effects
            }
            ProgressEvent::UserFound { message } => {
                vec![PresenterEffect::Toast { level: ToastLevel::Success, message: message.clone() }]
            }
            ProgressEvent::UserNotFound { message } => {
                vec![PresenterEffect::Toast { level: ToastLevel::Warning, message: message.clone() }]
            }
            ProgressEvent::ConnectionTimeout { message } | ProgressEvent::Error { message } => {
                vec![PresenterEffect::Toast { level: ToastLevel::Error, message: message.clone() }]
            }
        }
    }

    fn apply_progress(&mut self, percent: u8) -> Vec<PresenterEffect> {
        let incoming = percent.min(100);
        // Displayed percent is monotone within one operation; a lower frame
        // is a stale duplicate on an ordered transport and keeps the shown
        // value.
        let shown = match self.phase {
            OperationPhase::InProgress { percent: prior } => prior.max(incoming),
            _ => incoming,
        };

        if shown == 100 {
            self.phase = OperationPhase::Done;
            return vec![
                PresenterEffect::UpdateIndicator { percent: 100 },
                PresenterEffect::ScheduleDismiss { after: self.grace },
            ];
        }

        self.phase = OperationPhase::InProgress { percent: shown };
        vec![PresenterEffect::UpdateIndicator { percent: shown }]
    }

    /// Completes a scheduled dismissal once the grace delay has elapsed.
    /// A `RESET` that arrived in the meantime already cleared everything, in
    /// which case this is a no-op.
    pub fn finish_dismiss(&mut self) -> Vec<PresenterEffect> {
        if self.phase != OperationPhase::Done {
            return Vec::new();
        }

        self.active = None;
        self.phase = OperationPhase::Idle;
        vec![PresenterEffect::DismissIndicator]
    }
}
