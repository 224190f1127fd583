use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use procura_api::ToastSink;
use procura_channel::{
    ChannelTransport, ClientMessage, EffectSink, ProgressChannelRunner, ReconnectPolicy,
    RunOutcome, ServerMessage, TransportError,
};
use procura_core::{PresenterEffect, ProgressPresenter};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::debug;

use crate::commands::CommandResult;
use crate::context::{AppContext, TerminalToasts};

/// Progress channel fed from stdin, one JSON frame per line. Lets the event
/// flow be exercised end to end by piping recorded server frames in.
struct StdinTransport {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinTransport {
    fn new() -> Self {
        Self { lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()) }
    }
}

#[async_trait]
impl ChannelTransport for StdinTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_message(&self) -> Result<Option<ServerMessage>, TransportError> {
        loop {
            let line = self
                .lines
                .lock()
                .await
                .next_line()
                .await
                .map_err(|error| TransportError::Receive(error.to_string()))?;

            let Some(line) = line else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            return ServerMessage::parse(&line)
                .map(Some)
                .map_err(|error| TransportError::Receive(error.to_string()));
        }
    }

    async fn send(&self, message: &ClientMessage) -> Result<(), TransportError> {
        debug!(event_name = "cli.watch_outbound", message = ?message, "suppressing outbound frame");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Renders presenter effects the way the desktop shell would: the indicator
/// on stderr lines, toasts through the shared toast surface.
struct TerminalEffects {
    toasts: TerminalToasts,
}

impl EffectSink for TerminalEffects {
    fn handle(&self, effect: PresenterEffect) {
        match effect {
            PresenterEffect::ShowIndicator { label } => eprintln!("[progress] {label}"),
            PresenterEffect::UpdateIndicator { percent } => eprintln!("[progress] {percent}%"),
            PresenterEffect::DismissIndicator => eprintln!("[progress] done"),
            PresenterEffect::ScheduleDismiss { .. } => {}
            PresenterEffect::Toast { level, message } => self.toasts.toast(level, &message),
        }
    }
}

pub async fn run(context: &AppContext) -> CommandResult {
    let channel = &context.config.channel;
    let presenter = Arc::new(Mutex::new(ProgressPresenter::new(Duration::from_millis(
        channel.dismiss_grace_ms,
    ))));
    let policy = ReconnectPolicy {
        max_retries: channel.reconnect_max_retries,
        base_delay_ms: channel.reconnect_base_delay_ms,
        max_delay_ms: channel.reconnect_max_delay_ms,
    };

    let runner = ProgressChannelRunner::new(
        Arc::new(StdinTransport::new()),
        presenter,
        Arc::new(TerminalEffects { toasts: TerminalToasts }),
        policy,
        Duration::from_secs(channel.heartbeat_secs),
    );

    match runner.run().await {
        RunOutcome::Closed => CommandResult::success("watch", "progress channel closed"),
        RunOutcome::RetriesExhausted => CommandResult::failure(
            "watch",
            "transport",
            "reconnect attempts exhausted; run `procura watch` again to retry",
            1,
        ),
    }
}
