use procura_core::RequestId;

use crate::commands::CommandResult;
use crate::context::AppContext;

pub async fn run_irq1(context: &AppContext, request: &str, irq1: &str) -> CommandResult {
    let request_id = RequestId(request.to_string());
    let (_, index) = match context.load_table(Some(&request_id), false).await {
        Ok(loaded) => loaded,
        Err(error) => {
            return CommandResult::failure("assign-irq1", "backend", error.to_string(), 1)
        }
    };

    // The reference attaches to the request; any of its items carries the
    // current assignment state.
    let Some(item) = index.group(&request_id).and_then(|group| group.first()) else {
        return CommandResult::failure(
            "assign-irq1",
            "not_found",
            format!("request `{request}` has no line items"),
            1,
        );
    };

    let mut item = item.clone();
    match context.dispatcher.assign_irq1(&mut item, irq1).await {
        Ok(()) => CommandResult::success(
            "assign-irq1",
            format!("assigned IRQ1 `{irq1}` to request `{request}`"),
        ),
        Err(error) => CommandResult::failure("assign-irq1", "backend", error.to_string(), 1),
    }
}

pub async fn run_co(context: &AppContext, requests: Vec<String>, officer: &str) -> CommandResult {
    let request_ids: Vec<RequestId> = requests.into_iter().map(RequestId).collect();
    let count = request_ids.len();

    match context.dispatcher.assign_contracting_officer(request_ids, officer).await {
        Ok(()) => CommandResult::success(
            "assign-co",
            format!("assigned `{officer}` to {count} request(s)"),
        ),
        Err(error) => CommandResult::failure("assign-co", "backend", error.to_string(), 1),
    }
}
