use colored::Colorize;
use commands::command_argument_builder;
use tracing_subscriber::EnvFilter;

mod commands;
mod handlers;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let matches = cmd.get_matches();

    let default_level = if matches.get_flag("verbose") {
        "grazer=debug,grazer_core=debug,grazer_reader=debug"
    } else {
        "grazer=info,grazer_core=info,grazer_reader=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with_writer(std::io::stderr)
        .init();

    let result = match matches.subcommand() {
        Some(("scrape", sub)) => handlers::handle_scrape(sub).await,
        Some(("resume", sub)) => handlers::handle_resume(sub).await,
        Some(("list-sessions", sub)) => handlers::handle_list_sessions(sub),
        Some(("enhance", sub)) => handlers::handle_enhance(sub).await,
        Some(("test", _)) => handlers::handle_test().await,
        Some(("clear-db", sub)) => handlers::handle_clear_db(sub),
        None => {
            let mut cmd = command_argument_builder();
            let _ = cmd.print_help();
            return;
        }
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {e:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
