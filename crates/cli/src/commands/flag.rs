use crate::commands::CommandResult;
use crate::context::{selection_from_keys, AppContext};

pub async fn run(context: &AppContext, keys: Vec<String>) -> CommandResult {
    let (rows, index) = match context.load_table(None, true).await {
        Ok(loaded) => loaded,
        Err(error) => return CommandResult::failure("flag", "backend", error.to_string(), 1),
    };

    let mut selection = selection_from_keys(&keys, &rows);
    match context.dispatcher.flag_cybersecurity(&mut selection, &rows, &index).await {
        Ok(outcome) if outcome.failed == 0 => CommandResult::success(
            "flag",
            format!("flagged {} item(s) as cybersecurity-related", outcome.flagged),
        ),
        Ok(outcome) => CommandResult::failure(
            "flag",
            "partial_failure",
            format!(
                "flagged {} of {} item(s); {} failed",
                outcome.flagged,
                outcome.flagged + outcome.failed,
                outcome.failed
            ),
            1,
        ),
        Err(error) => CommandResult::failure("flag", "backend", error.to_string(), 1),
    }
}
