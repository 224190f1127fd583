use std::str::FromStr;

use procura_api::PriceEditOutcome;
use procura_core::RowKey;
use rust_decimal::Decimal;

use crate::commands::CommandResult;
use crate::context::AppContext;

pub async fn run(context: &AppContext, key: &str, price: &str) -> CommandResult {
    let Ok(new_unit_price) = Decimal::from_str(price) else {
        return CommandResult::failure(
            "edit-price",
            "usage",
            format!("`{price}` is not a decimal price"),
            2,
        );
    };

    let row_key = key.parse::<RowKey>().unwrap_or_else(|never| match never {});
    let (rows, _) = match context.load_table(None, true).await {
        Ok(loaded) => loaded,
        Err(error) => return CommandResult::failure("edit-price", "backend", error.to_string(), 1),
    };

    let Some(row) = rows.iter().find(|row| row.key == row_key) else {
        return CommandResult::failure(
            "edit-price",
            "not_found",
            format!("no row with key `{key}`"),
            1,
        );
    };

    let mut row = row.clone();
    match context.dispatcher.edit_unit_price(&mut row, new_unit_price).await {
        Ok(PriceEditOutcome::Accepted) => CommandResult::success(
            "edit-price",
            format!(
                "unit price for `{key}` is now {}, line total {}",
                row.item.unit_price, row.item.line_total
            ),
        ),
        Ok(PriceEditOutcome::RolledBack) => CommandResult::failure(
            "edit-price",
            "rejected",
            "the backend rejected the update; the price was reverted",
            1,
        ),
        Err(error) => CommandResult::failure("edit-price", "domain", error.to_string(), 1),
    }
}
