use procura_api::BulkOutcome;

use crate::commands::CommandResult;
use crate::context::{selection_from_keys, AppContext};

#[derive(Clone, Copy, Debug)]
pub enum Decision {
    Approve,
    Deny,
}

impl Decision {
    fn command(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Deny => "deny",
        }
    }
}

pub async fn run(context: &AppContext, decision: Decision, keys: Vec<String>) -> CommandResult {
    let (rows, index) = match context.load_table(None, true).await {
        Ok(loaded) => loaded,
        Err(error) => {
            return CommandResult::failure(decision.command(), "backend", error.to_string(), 1)
        }
    };

    let mut selection = selection_from_keys(&keys, &rows);
    let outcome = match decision {
        Decision::Approve => context.dispatcher.approve(&mut selection, &rows, &index).await,
        Decision::Deny => context.dispatcher.deny(&mut selection, &rows, &index).await,
    };

    match outcome {
        Ok(BulkOutcome::Submitted { items }) => CommandResult::success(
            decision.command(),
            format!("submitted {items} item(s) as one batch"),
        ),
        Ok(BulkOutcome::NoEligibleItems) => CommandResult::failure(
            decision.command(),
            "no_eligible_items",
            "no selected items are eligible for this action; nothing was submitted",
            1,
        ),
        Err(error) => {
            CommandResult::failure(decision.command(), "backend", error.to_string(), 1)
        }
    }
}
