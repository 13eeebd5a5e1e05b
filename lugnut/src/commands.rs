use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("lugnut")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("lugnut")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and progress output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl the catalog brand by brand, expanding every category tree. \
                Writes one JSON file per brand.",
                )
                .arg(
                    arg!(-d --"devtools" <URL>)
                        .required(false)
                        .help("DevTools endpoint of a running browser (http:// or ws://)")
                        .default_value("http://127.0.0.1:9222"),
                )
                .arg(
                    arg!(-c --"catalog" <URL>)
                        .required(false)
                        .help("Catalog landing page that lists the brands")
                        .value_parser(clap::value_parser!(Url))
                        .default_value("https://autopiter.ru/nonoriginaldetails"),
                )
                .arg(
                    arg!(--"from" <N>)
                        .required(false)
                        .help("First brand to crawl, 1-based inclusive")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    arg!(--"to" <N>)
                        .required(false)
                        .help("Last brand to crawl, 1-based inclusive (default: through the last brand)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-o --"out" <DIR>)
                        .required(false)
                        .help("Directory for per-brand result files")
                        .default_value("./brands"),
                )
                .arg(
                    arg!(-t --"workers" <NUM_WORKERS>)
                        .required(false)
                        .help("The number of async detail-fetch workers in the worker pool.")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("8"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-part-page fetch timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("20"),
                )
                .arg(
                    arg!(--"settle-ms" <MS>)
                        .required(false)
                        .help("How long a toggled subtree may keep changing before it is abandoned")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("5000"),
                )
                .arg(
                    arg!(-s --"selectors" <PATH>)
                        .required(false)
                        .help("JSON file overriding the built-in CSS selectors")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, csv, markdown")
                        .value_parser(["text", "json", "csv", "markdown"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"output" <PATH>)
                        .required(false)
                        .help("Save the run report to a file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("report")
                .about(
                    "Rebuild a report from brand files written by an earlier crawl, without \
                touching the browser.",
                )
                .arg(
                    arg!(-o --"out" <DIR>)
                        .required(false)
                        .help("Directory the brand files were written to")
                        .default_value("./brands"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, csv, markdown")
                        .value_parser(["text", "json", "csv", "markdown"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"output" <PATH>)
                        .required(false)
                        .help("Save the report to a file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
}
