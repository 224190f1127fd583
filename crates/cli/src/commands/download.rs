use std::path::Path;

use procura_core::{ProgressPresenter, RequestId};

use crate::commands::CommandResult;
use crate::context::AppContext;

pub async fn run(context: &AppContext, request: &str, out: &Path) -> CommandResult {
    let request_id = RequestId(request.to_string());
    let (_, index) = match context.load_table(Some(&request_id), false).await {
        Ok(loaded) => loaded,
        Err(error) => return CommandResult::failure("download", "backend", error.to_string(), 1),
    };

    let Some(items) = index.group(&request_id).map(<[_]>::to_vec) else {
        return CommandResult::failure(
            "download",
            "not_found",
            format!("request `{request}` has no line items"),
            1,
        );
    };

    let mut presenter = ProgressPresenter::default();
    let bytes = match context
        .dispatcher
        .download_statement_of_need(&mut presenter, request_id, items)
        .await
    {
        Ok(bytes) => bytes,
        Err(error) => return CommandResult::failure("download", "backend", error.to_string(), 1),
    };

    if let Err(error) = std::fs::write(out, &bytes) {
        return CommandResult::failure(
            "download",
            "io",
            format!("could not write `{}`: {error}", out.display()),
            1,
        );
    }

    CommandResult::success(
        "download",
        format!("wrote {} byte(s) to `{}`", bytes.len(), out.display()),
    )
}
