//! Novel Admin CLI binary.

use clap::Parser;
use novel_admin_cli::{Cli, init_tracing, load_settings, run};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_settings(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::from(err.exit_code());
        }
    };
    init_tracing(&config.console.log_level);

    match run(cli, config).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("error: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}
