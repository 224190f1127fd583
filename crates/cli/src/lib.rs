pub mod commands;
pub mod context;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use procura_core::config::{AppConfig, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "procura",
    about = "Procura approval-queue CLI",
    long_about = "Work the purchase-request approval queue: inspect the grouped line-item table, approve, deny, comment, flag, and follow live operation progress.",
    after_help = "Examples:\n  procura table --expand\n  procura approve header-REQ-104\n  procura deny ITEM-9 ITEM-12\n  procura watch"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to the config file (default: procura.toml)")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Commands that talk to the backend and need a loaded context.
    #[command(flatten)]
    Queue(QueueCommand),
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    #[command(about = "Render the grouped line-item table for all requests or one request")]
    Table {
        #[arg(help = "Restrict to one request id")]
        id: Option<String>,
        #[arg(long, help = "Expand every multi-item group to show child rows")]
        expand: bool,
    },
    #[command(about = "Approve the selected rows as one batch (no keys selects everything)")]
    Approve {
        #[arg(help = "Row keys: item ids, or `header-<request id>` for whole groups")]
        keys: Vec<String>,
    },
    #[command(about = "Deny the selected rows as one batch (no keys selects everything)")]
    Deny {
        #[arg(help = "Row keys: item ids, or `header-<request id>` for whole groups")]
        keys: Vec<String>,
    },
    #[command(about = "Prompt for a comment per selected item, one prompt at a time")]
    Comment {
        #[arg(help = "Row keys: item ids, or `header-<request id>` for whole groups")]
        keys: Vec<String>,
    },
    #[command(about = "Flag the selected items as cybersecurity-related")]
    Flag {
        #[arg(help = "Row keys: item ids, or `header-<request id>` for whole groups")]
        keys: Vec<String>,
    },
    #[command(about = "Edit one item's unit price; a backend rejection reverts it")]
    EditPrice {
        #[arg(help = "Item row key")]
        key: String,
        #[arg(help = "New unit price, e.g. 12.50")]
        price: String,
    },
    #[command(about = "Assign an IRQ1 reference to a request (one-shot; cannot be reassigned)")]
    AssignIrq1 {
        #[arg(help = "Request id")]
        request: String,
        #[arg(help = "IRQ1 reference to record")]
        irq1: String,
    },
    #[command(about = "Assign a contracting officer to one or more requests")]
    AssignCo {
        #[arg(long, help = "Contracting officer name")]
        officer: String,
        #[arg(help = "Request ids", required = true)]
        requests: Vec<String>,
    },
    #[command(about = "Download the statement-of-need PDF for a request")]
    Download {
        #[arg(help = "Request id")]
        request: String,
        #[arg(long, help = "Where to write the PDF")]
        out: PathBuf,
    },
    #[command(about = "Follow progress events from stdin (newline-delimited JSON frames)")]
    Watch,
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        LogFormat::Compact => {
            tracing_subscriber::fmt()
                .with_target(false)
                .with_max_level(log_level)
                .with_writer(std::io::stderr)
                .compact()
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_target(false)
                .with_max_level(log_level)
                .with_writer(std::io::stderr)
                .pretty()
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_target(false)
                .with_max_level(log_level)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
    }
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        // `config` inspects whatever loads, so it reports validation
        // problems instead of dying on them.
        Command::Config => commands::CommandResult {
            exit_code: 0,
            output: commands::config::run(cli.config.as_deref()),
        },
        Command::Queue(command) => {
            let context = match context::AppContext::load(cli.config.clone()) {
                Ok(context) => context,
                Err(result) => {
                    println!("{}", result.output);
                    return ExitCode::from(result.exit_code);
                }
            };
            init_logging(&context.config);
            dispatch(&context, command).await
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

async fn dispatch(
    context: &context::AppContext,
    command: QueueCommand,
) -> commands::CommandResult {
    match command {
        QueueCommand::Table { id, expand } => commands::table::run(context, id, expand).await,
        QueueCommand::Approve { keys } => {
            commands::decide::run(context, commands::decide::Decision::Approve, keys).await
        }
        QueueCommand::Deny { keys } => {
            commands::decide::run(context, commands::decide::Decision::Deny, keys).await
        }
        QueueCommand::Comment { keys } => commands::comment::run(context, keys).await,
        QueueCommand::Flag { keys } => commands::flag::run(context, keys).await,
        QueueCommand::EditPrice { key, price } => commands::price::run(context, &key, &price).await,
        QueueCommand::AssignIrq1 { request, irq1 } => {
            commands::assign::run_irq1(context, &request, &irq1).await
        }
        QueueCommand::AssignCo { officer, requests } => {
            commands::assign::run_co(context, requests, &officer).await
        }
        QueueCommand::Download { request, out } => {
            commands::download::run(context, &request, &out).await
        }
        QueueCommand::Watch => commands::watch::run(context).await,
    }
}
