use std::io::{BufRead, Write};

use async_trait::async_trait;
use procura_api::CommentPrompt;
use procura_core::LineItem;

use crate::commands::CommandResult;
use crate::context::{selection_from_keys, AppContext};

/// One modal prompt at a time on the terminal. An empty line cancels the
/// sequence; anything else is the comment for the prompted item.
struct StdinPrompt;

#[async_trait]
impl CommentPrompt for StdinPrompt {
    async fn prompt(&self, item: &LineItem) -> Option<String> {
        let mut stderr = std::io::stderr();
        let _ = write!(
            stderr,
            "comment for [{}] {} ({}), empty line to stop: ",
            item.item_id.0, item.description, item.request_id.0,
        );
        let _ = stderr.flush();

        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line).ok()?;
        if read == 0 {
            return None;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.to_string())
    }
}

pub async fn run(context: &AppContext, keys: Vec<String>) -> CommandResult {
    let (rows, index) = match context.load_table(None, true).await {
        Ok(loaded) => loaded,
        Err(error) => return CommandResult::failure("comment", "backend", error.to_string(), 1),
    };

    let mut selection = selection_from_keys(&keys, &rows);
    match context.dispatcher.comment(&StdinPrompt, &mut selection, &rows, &index).await {
        Ok(outcome) if outcome.cancelled_early => CommandResult::success(
            "comment",
            format!("stopped early; {} comment(s) were still submitted", outcome.submitted),
        ),
        Ok(outcome) => {
            CommandResult::success("comment", format!("submitted {} comment(s)", outcome.submitted))
        }
        Err(error) => CommandResult::failure("comment", "backend", error.to_string(), 1),
    }
}
