use clap::arg;
use ffcrawl_core::{DEFAULT_BASE, DEFAULT_CONTAINER_ID};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("ffcrawl")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("ffcrawl")
        .about(
            "Follows the first article link on each page, starting from START, \
            until the current article name matches TARGET. Press ^C to stop \
            early and print the trip so far.",
        )
        .arg(
            arg!([TARGET])
                .required(false)
                .help("Regex matched against article names (base URL stripped)"),
        )
        .arg(
            arg!([START])
                .required(false)
                .help("Name of the article to start from, e.g. Vehicle"),
        )
        .arg(
            arg!(-b --"base" <URL>)
                .required(false)
                .help("Base URL all article names are resolved against")
                .default_value(DEFAULT_BASE),
        )
        .arg(
            arg!(-c --"container" <ID>)
                .required(false)
                .help("id attribute of the div holding the article body")
                .default_value(DEFAULT_CONTAINER_ID)
                .conflicts_with("no-container"),
        )
        .arg(
            arg!(--"no-container")
                .required(false)
                .help("Scan the whole document instead of the article body div")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(--"any-link")
                .required(false)
                .help("Follow any unvisited link, not just top-level articles")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(-t --"timeout" <SECS>)
                .required(false)
                .help("Per-request timeout in seconds")
                .value_parser(clap::value_parser!(u64))
                .default_value("10"),
        )
        .arg(arg!(-q --"quiet" "Suppress the live progress line").required(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_are_optional_and_positional() {
        let cmd = command_argument_builder();
        let matches = cmd.try_get_matches_from(["ffcrawl", "Car", "Vehicle"]).unwrap();
        assert_eq!(matches.get_one::<String>("TARGET").unwrap(), "Car");
        assert_eq!(matches.get_one::<String>("START").unwrap(), "Vehicle");
        assert_eq!(
            matches.get_one::<String>("base").unwrap(),
            "https://en.wikipedia.org/wiki/"
        );
    }

    #[test]
    fn missing_positionals_still_parse() {
        let cmd = command_argument_builder();
        let matches = cmd.try_get_matches_from(["ffcrawl"]).unwrap();
        assert!(matches.get_one::<String>("TARGET").is_none());
        assert!(matches.get_one::<String>("START").is_none());
    }

    #[test]
    fn container_flag_conflicts_with_no_container() {
        let cmd = command_argument_builder();
        let result =
            cmd.try_get_matches_from(["ffcrawl", "Car", "Vehicle", "-c", "bodyContent", "--no-container"]);
        assert!(result.is_err());
    }
}
