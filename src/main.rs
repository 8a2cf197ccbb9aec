//! # regcode CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use regcode::cli::{run, Cli};
use regcode::RegError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("無法輸出結果: {e}");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            tracing::error!("{e:#}");
            // 輸入錯誤與執行失敗使用不同結束碼
            let client_error = e
                .downcast_ref::<RegError>()
                .is_some_and(RegError::is_client_error);
            ExitCode::from(if client_error { 2 } else { 1 })
        }
    }
}
