//! Shared wiring for the CLI commands: config, backend client, dispatcher,
//! and the fetch-normalize-flatten pipeline every table-facing command runs.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use procura_api::{
    normalize_items, ApiError, ApprovalBackend, BulkCommandDispatcher, HttpApprovalClient,
    NoopCache, ToastSink,
};
use procura_core::config::{AppConfig, LoadOptions};
use procura_core::{
    apply_selection_change, flatten_index, DisplayRow, ExpansionState, GroupIndex, RequestId,
    RowKey, SelectionState, ToastLevel,
};
use tracing::warn;

use crate::commands::CommandResult;

/// Prints transient notifications the way a desktop shell would toast them.
pub struct TerminalToasts;

impl ToastSink for TerminalToasts {
    fn toast(&self, level: ToastLevel, message: &str) {
        let prefix = match level {
            ToastLevel::Success => "ok",
            ToastLevel::Info => "info",
            ToastLevel::Warning => "warn",
            ToastLevel::Error => "error",
        };
        eprintln!("[{prefix}] {message}");
    }
}

pub struct AppContext {
    pub config: AppConfig,
    pub client: Arc<HttpApprovalClient>,
    pub dispatcher: BulkCommandDispatcher<Arc<HttpApprovalClient>>,
}

impl AppContext {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, CommandResult> {
        let config = AppConfig::load(LoadOptions { config_path, ..LoadOptions::default() })
            .map_err(|error| CommandResult::failure("startup", "config", error.to_string(), 2))?;

        let client = HttpApprovalClient::new(
            config.api.base_url.clone(),
            config.api.bearer_token.clone(),
            Duration::from_secs(config.api.timeout_secs),
        )
        .map_err(|error| CommandResult::failure("startup", "transport", error.to_string(), 2))?;
        let client = Arc::new(client);

        let dispatcher = BulkCommandDispatcher::new(
            client.clone(),
            Arc::new(TerminalToasts),
            Arc::new(NoopCache),
        );

        Ok(Self { config, client, dispatcher })
    }

    /// Fetches the table scope, normalizes it, and flattens it into display
    /// order. Data-quality findings from normalization are logged, not fatal.
    pub async fn load_table(
        &self,
        scope: Option<&RequestId>,
        expand_all: bool,
    ) -> Result<(Vec<DisplayRow>, GroupIndex), ApiError> {
        let raw = self.client.get_approval_data(scope).await?;
        let (items, report) = normalize_items(raw);
        if !report.is_clean() {
            warn!(
                event_name = "cli.table_normalization_findings",
                synthesized_keys = report.synthesized_keys.len(),
                recomputed_totals = report.recomputed_totals,
                "backend data needed normalization"
            );
        }

        let index = GroupIndex::build(&items);
        let mut expansion = ExpansionState::default();
        if expand_all {
            for (group_key, _) in index.iter() {
                expansion.expand(group_key);
            }
        }

        let rows = flatten_index(&index, &expansion);
        Ok((rows, index))
    }
}

/// Builds the working selection from command-line row keys. No keys means
/// select-all; explicit keys run through the same consistency pass the table
/// applies to checkbox gestures, so header keys pull in their children.
pub fn selection_from_keys(keys: &[String], rows: &[DisplayRow]) -> SelectionState {
    if keys.is_empty() {
        return SelectionState::select_all();
    }

    let requested: HashSet<RowKey> = keys
        .iter()
        .map(|raw| raw.parse::<RowKey>().unwrap_or_else(|never| match never {}))
        .collect();
    apply_selection_change(&requested, &SelectionState::default(), rows)
}
