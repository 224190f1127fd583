use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    procura_cli::run().await
}
