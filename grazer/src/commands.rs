use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("grazer")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("grazer")
        .styles(CLAP_STYLING)
        .arg(arg!(-v --"verbose" "Enable debug-level log output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("scrape")
                .about("Crawl the sector grid and collect venue records")
                .arg(
                    arg!(-r --"region" <REGION>)
                        .required(false)
                        .help("Restrict the crawl to one region: central, east, west, north, northeast or south"),
                )
                .arg(
                    arg!(-s --"start" <N>)
                        .required(false)
                        .help("Sector position to start from (0-based, plan order)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-m --"max" <N>)
                        .required(false)
                        .help("Maximum sectors to process this run")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            command!("resume")
                .about("Continue an interrupted scrape session")
                .arg(
                    arg!([SESSION_ID])
                        .required(false)
                        .help("Session to resume; defaults to the most recent incomplete scrape session"),
                )
                .arg(
                    arg!(-m --"max" <N>)
                        .required(false)
                        .help("Maximum sectors to process this run")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            command!("list-sessions")
                .about("Show scrape and enrichment sessions")
                .arg(arg!(-a --"all" "Include completed sessions").required(false)),
        )
        .subcommand(
            command!("enhance")
                .about("Visit detail pages to fill in missing venue fields")
                .arg(
                    arg!(--"id" <ID>)
                        .required(false)
                        .help("Enrich a single record by id")
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    arg!(--"start-id" <ID>)
                        .required(false)
                        .help("Ignore the stored checkpoint and start after this record id")
                        .value_parser(clap::value_parser!(i64))
                        .conflicts_with("id"),
                )
                .arg(
                    arg!(-l --"limit" <N>)
                        .required(false)
                        .help("Maximum records to enrich this run")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-t --"threshold" <N>)
                        .required(false)
                        .help("Minimum count of missing fields for a record to qualify")
                        .value_parser(clap::value_parser!(u32)),
                ),
        )
        .subcommand(
            command!("test")
                .about("Fetch a single central sector and report what it parses, without writing anything"),
        )
        .subcommand(
            command!("clear-db")
                .about("Delete all stored venue records")
                .arg(arg!(--"sessions" "Also delete session history").required(false))
                .arg(arg!(-y --"yes" "Skip the confirmation prompt").required(false)),
        )
}
