//! Progress channel runner: owns the single shared connection, pumps server
//! events into the presenter in arrival order, and reconnects with bounded
//! exponential backoff when the transport drops.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use procura_core::{PresenterEffect, ProgressPresenter, ToastLevel};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::events::{ClientMessage, ServerMessage};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// One ordered message stream to the backend. Implementations must deliver
/// messages in server-send order; the presenter has no reordering buffer.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` signals a clean server-side close.
    ///
    /// Must be cancellation-safe: the runner drops the in-flight call at
    /// every heartbeat tick and issues a fresh one, so a cancelled call must
    /// not lose a buffered message or corrupt the stream position.
    async fn next_message(&self) -> Result<Option<ServerMessage>, TransportError>;
    async fn send(&self, message: &ClientMessage) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl ChannelTransport for NoopTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_message(&self) -> Result<Option<ServerMessage>, TransportError> {
        Ok(None)
    }

    async fn send(&self, _message: &ClientMessage) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Where presenter effects land: the shell's progress indicator and toast
/// surface.
pub trait EffectSink: Send + Sync {
    fn handle(&self, effect: PresenterEffect);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The server closed the stream cleanly.
    Closed,
    /// Reconnection attempts were exhausted; an explicit user-triggered
    /// retry is required from here.
    RetriesExhausted,
}

struct PumpFailure {
    error: TransportError,
    connected: bool,
}

pub struct ProgressChannelRunner {
    transport: Arc<dyn ChannelTransport>,
    presenter: Arc<Mutex<ProgressPresenter>>,
    effects: Arc<dyn EffectSink>,
    policy: ReconnectPolicy,
    heartbeat: Duration,
}

impl ProgressChannelRunner {
    pub fn new(
        transport: Arc<dyn ChannelTransport>,
        presenter: Arc<Mutex<ProgressPresenter>>,
        effects: Arc<dyn EffectSink>,
        policy: ReconnectPolicy,
        heartbeat: Duration,
    ) -> Self {
        Self { transport, presenter, effects, policy, heartbeat }
    }

    pub async fn run(&self) -> RunOutcome {
        let mut attempt: u32 = 0;
        loop {
            match self.connect_and_pump().await {
                Ok(()) => return RunOutcome::Closed,
                Err(failure) => {
                    // A successful connect resets the attempt counter; only
                    // consecutive failures walk towards the cap.
                    attempt = if failure.connected { 1 } else { attempt + 1 };
                    warn!(
                        attempt,
                        max_retries = self.policy.max_retries,
                        error = %failure.error,
                        "progress channel transport failed"
                    );

                    if attempt > self.policy.max_retries {
                        warn!(
                            max_retries = self.policy.max_retries,
                            "progress channel retries exhausted"
                        );
                        self.effects.handle(PresenterEffect::Toast {
                            level: ToastLevel::Error,
                            message: "Lost connection to the progress channel.".to_string(),
                        });
                        return RunOutcome::RetriesExhausted;
                    }

                    let delay = self.policy.backoff(attempt - 1);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    async fn connect_and_pump(&self) -> Result<(), PumpFailure> {
        self.transport
            .connect()
            .await
            .map_err(|error| PumpFailure { error, connected: false })?;
        info!(event_name = "channel.connected", "progress channel connected");

        let fail = |error| PumpFailure { error, connected: true };
        self.transport.send(&ClientMessage::hello()).await.map_err(fail)?;

        loop {
            let message =
                match tokio::time::timeout(self.heartbeat, self.transport.next_message()).await {
                    Err(_idle) => {
                        debug!(event_name = "channel.heartbeat", "sending idle heartbeat");
                        self.transport.send(&ClientMessage::Heartbeat).await.map_err(fail)?;
                        continue;
                    }
                    Ok(Err(error)) => return Err(fail(error)),
                    Ok(Ok(None)) => {
                        info!(event_name = "channel.closed", "progress channel stream closed");
                        let _ = self.transport.disconnect().await;
                        return Ok(());
                    }
                    Ok(Ok(Some(message))) => message,
                };

            debug!(event_name = "channel.message", message = ?message, "received channel message");
            let effects = {
                let mut presenter = self.presenter.lock().await;
                presenter.apply(&message.into_progress_event())
            };
            for effect in effects {
                self.dispatch_effect(effect);
            }
        }
    }

    fn dispatch_effect(&self, effect: PresenterEffect) {
        match effect {
            PresenterEffect::ScheduleDismiss { after } => {
                // The runner owns the grace timing: keep the final frame
                // visible, then complete the dismissal unless a RESET beat
                // us to it.
                let presenter = self.presenter.clone();
                let effects = self.effects.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let follow_ups = presenter.lock().await.finish_dismiss();
                    for follow_up in follow_ups {
                        effects.handle(follow_up);
                    }
                });
            }
            other => self.effects.handle(other),
        }
    }
}
