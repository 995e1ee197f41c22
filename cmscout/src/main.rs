use cmscout::handlers::{
    handle_crawl, handle_detect, handle_extract, handle_hosting, handle_serve, handle_wp_api,
};
use cmscout_core::print_banner;
use colored::Colorize;
use commands::command_argument_builder;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

#[tokio::main]
async fn main() -> ExitCode {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let serving = matches!(chosen_command.subcommand(), Some(("serve", _)));

    setup_logging(quiet);

    // No banner in serve mode
    if !quiet && !serving {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        Some(("detect", primary_command)) => handle_detect(primary_command, quiet).await,
        Some(("extract", primary_command)) => handle_extract(primary_command, quiet).await,
        Some(("crawl", primary_command)) => handle_crawl(primary_command, quiet).await,
        Some(("wp-api", primary_command)) => handle_wp_api(primary_command, quiet).await,
        Some(("hosting", primary_command)) => handle_hosting(primary_command, quiet).await,
        Some(("serve", primary_command)) => handle_serve(primary_command).await,
        // No subcommand provided, just show the banner
        None => return ExitCode::SUCCESS,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `warn` with `--quiet`. Always stderr.
fn setup_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
