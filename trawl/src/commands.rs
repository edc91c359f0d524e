use crate::CLAP_STYLING;
use clap::{arg, command, value_parser};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("trawl")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("trawl")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and progress output").global(true))
        .arg(
            arg!(-v --"verbose" ... "Log crawler activity to stderr (-vv for debug)")
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl from one or more seed URLs, following links breadth-first up to \
                DEPTH levels.",
                )
                .arg(
                    arg!([URL])
                        .help("The seed URL to crawl (crawled alongside any --hosts-file seeds)")
                        .required_unless_present("hosts-file"),
                )
                .arg(
                    arg!([DEPTH])
                        .help("Maximum depth; 1 downloads only the seed")
                        .value_parser(value_parser!(u64).range(1..))
                        .default_value("1"),
                )
                .arg(
                    arg!([DOWNLOADERS])
                        .help("Number of concurrent downloads")
                        .value_parser(value_parser!(u64).range(1..))
                        .default_value("1"),
                )
                .arg(
                    arg!([EXTRACTORS])
                        .help("Number of concurrent link extractions")
                        .value_parser(value_parser!(u64).range(1..))
                        .default_value("1"),
                )
                .arg(
                    arg!([PER_HOST])
                        .help("Maximum concurrent downloads per host (default: unbounded)")
                        .value_parser(value_parser!(u64).range(1..)),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of seed URLs")
                        .value_parser(value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Give up on each seed after this many seconds, reporting unfinished URLs")
                        .value_parser(value_parser!(u64).range(1..)),
                )
                .arg(
                    arg!(--"request-timeout" <SECONDS>)
                        .required(false)
                        .help("HTTP request timeout in seconds")
                        .value_parser(value_parser!(u64).range(1..))
                        .default_value("10"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, csv, markdown")
                        .value_parser(["text", "json", "csv", "markdown", "md"])
                        .default_value("text"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<clap::ArgMatches, clap::Error> {
        command_argument_builder().try_get_matches_from(args)
    }

    #[test]
    fn test_command_is_well_formed() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_positionals_in_order() {
        let matches = parse(&["trawl", "crawl", "http://x/1", "3", "4", "2", "1"]).unwrap();
        let crawl = matches.subcommand_matches("crawl").unwrap();
        assert_eq!(crawl.get_one::<String>("URL").unwrap(), "http://x/1");
        assert_eq!(*crawl.get_one::<u64>("DEPTH").unwrap(), 3);
        assert_eq!(*crawl.get_one::<u64>("DOWNLOADERS").unwrap(), 4);
        assert_eq!(*crawl.get_one::<u64>("EXTRACTORS").unwrap(), 2);
        assert_eq!(*crawl.get_one::<u64>("PER_HOST").unwrap(), 1);
    }

    #[test]
    fn test_defaults() {
        let matches = parse(&["trawl", "crawl", "http://x/1"]).unwrap();
        let crawl = matches.subcommand_matches("crawl").unwrap();
        assert_eq!(*crawl.get_one::<u64>("DEPTH").unwrap(), 1);
        assert_eq!(*crawl.get_one::<u64>("DOWNLOADERS").unwrap(), 1);
        assert!(crawl.get_one::<u64>("PER_HOST").is_none());
        assert_eq!(crawl.get_one::<String>("format").unwrap(), "text");
    }

    #[test]
    fn test_zero_and_malformed_counts_are_usage_errors() {
        for args in [
            ["trawl", "crawl", "http://x/", "0"],
            ["trawl", "crawl", "http://x/", "two"],
            ["trawl", "crawl", "http://x/", "-1"],
        ] {
            let err = parse(&args).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{:?}", args);
        }
    }

    #[test]
    fn test_url_or_hosts_file_required() {
        assert!(parse(&["trawl", "crawl"]).is_err());
        assert!(parse(&["trawl", "crawl", "-H", "hosts.txt"]).is_ok());
        assert!(parse(&["trawl", "crawl", "http://x/", "-H", "hosts.txt"]).is_ok());
    }
}
