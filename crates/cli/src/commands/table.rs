use procura_core::RequestId;

use crate::commands::CommandResult;
use crate::context::AppContext;

pub async fn run(context: &AppContext, id: Option<String>, expand: bool) -> CommandResult {
    let scope = id.map(RequestId);
    let (rows, index) = match context.load_table(scope.as_ref(), expand).await {
        Ok(loaded) => loaded,
        Err(error) => return CommandResult::failure("table", "backend", error.to_string(), 1),
    };

    if rows.is_empty() {
        return CommandResult::plain("no line items in scope");
    }

    let mut lines = Vec::new();
    lines.push(format!("{} request(s), {} row(s):", index.len(), rows.len()));
    for row in &rows {
        if !row.visible {
            continue;
        }

        let item = &row.item;
        if row.is_group_header {
            lines.push(format!(
                "[{}] {} - {} items - {} - requester {}",
                row.key, item.request_id.0, row.sibling_count, item.fund, item.requester,
            ));
        } else {
            let indent = if row.sibling_count > 1 { "    " } else { "" };
            lines.push(format!(
                "{indent}[{}] {} x{} @ {} = {} - {:?} - {}",
                row.key,
                item.description,
                item.quantity,
                item.unit_price,
                item.line_total,
                item.status,
                item.request_id.0,
            ));
        }
    }

    CommandResult::plain(lines.join("\n"))
}
