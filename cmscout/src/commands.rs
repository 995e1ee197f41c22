use crate::CLAP_STYLING;
use clap::{arg, command};
use cmscout_core::api::HostingAction;
use cmscout_scanner::ContentType;
use std::path::PathBuf;

fn output_arg() -> clap::Arg {
    arg!(-o --"output" <PATH>)
        .required(false)
        .help("Save the output to a file (default: display to screen)")
        .value_parser(clap::value_parser!(PathBuf))
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("cmscout")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("cmscout")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(--"chrome" <PATH>)
                .required(false)
                .global(true)
                .help("Chrome/Chromium executable to drive (default: $CMSCOUT_CHROME or auto-detect)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .global(true)
                .help("HTTP request timeout in seconds")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            arg!(--"probe-timeout" <SECONDS>)
                .required(false)
                .global(true)
                .help("Admin path probe timeout in seconds")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            arg!(--"nav-timeout" <SECONDS>)
                .required(false)
                .global(true)
                .help("Browser navigation timeout in seconds")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .subcommand_required(false)
        .subcommand(
            command!("detect")
                .about("Fingerprint the CMS a site runs on")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The site to analyse")
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of sites to analyse")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(--"report")
                        .required(false)
                        .help("Print a readable report instead of JSON")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(output_arg()),
        )
        .subcommand(
            command!("extract")
                .about("Extract structured content from one page with a headless browser")
                .arg(arg!(-u --"url" <URL>).required(true).help("The page to extract"))
                .arg(
                    arg!(-c --"content-type" <TYPE>)
                        .required(false)
                        .help("Kind of content to extract")
                        .value_parser(ContentType::VARIANTS)
                        .default_value("all"),
                )
                .arg(output_arg()),
        )
        .subcommand(
            command!("crawl")
                .about("Recursively crawl a site with a headless browser")
                .arg(arg!(-u --"url" <URL>).required(true).help("The URL to start from"))
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("Maximum number of link hops, counting the start page")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("2"),
                )
                .arg(
                    arg!(--"no-bypass")
                        .required(false)
                        .help("Do not spoof a desktop browser identity")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"scope" <SCOPE>)
                        .required(false)
                        .help("How links are matched against the crawl domain")
                        .value_parser(["host", "substring"]),
                )
                .arg(
                    arg!(--"domain" <DOMAIN>)
                        .required(false)
                        .help("Domain links must belong to (default: the start URL's host)"),
                )
                .arg(
                    arg!(--"report")
                        .required(false)
                        .help("Print a readable tree report instead of JSON")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(output_arg()),
        )
        .subcommand(
            command!("wp-api")
                .about("Query the WordPress REST API of a site")
                .arg(arg!(-u --"url" <URL>).required(true).help("The WordPress site"))
                .arg(
                    arg!(-e --"endpoint" <ENDPOINT>)
                        .required(false)
                        .help("API endpoint (posts, pages, users, ...)")
                        .default_value("posts"),
                )
                .arg(output_arg()),
        )
        .subcommand(
            command!("hosting")
                .about("Query the hosting provider API (needs HOSTINGER_API_KEY)")
                .arg(
                    arg!(-a --"action" <ACTION>)
                        .required(true)
                        .help("Action to perform")
                        .value_parser(HostingAction::VARIANTS),
                )
                .arg(output_arg()),
        )
        .subcommand(
            command!("serve")
                .about("Serve every tool over line-delimited JSON-RPC on stdin/stdout"),
        )
}
