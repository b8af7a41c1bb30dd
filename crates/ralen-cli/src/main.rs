use clap::Parser;
use log::LevelFilter;

mod cli;
mod commands;
mod interactive;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let code = match cli.command {
        Some(command) => match commands::Session::open().await {
            Ok(session) => session.dispatch(command).await,
            Err(err) => commands::report_error(&err),
        },
        None => match interactive::run_shell().await {
            Ok(()) => 0,
            Err(err) => commands::report_error(&err),
        },
    };

    std::process::exit(code);
}
