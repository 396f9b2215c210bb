//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use harvester_core::config::DEFAULT_CONFIG_PATH;

/// Crawl a product catalog and harvest item pages into a delimited file.
///
/// Harvester walks the catalog pages named in a site config, follows every
/// item link, extracts the configured fields and appends one row per item.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Site configuration file (JSON)
    #[arg(short = 'C', long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Output file; rows are appended, the header is written for new files only
    #[arg(short, long, default_value = "results.txt")]
    pub output: PathBuf,

    /// Proxy list, one per line (used when the config enables proxies)
    #[arg(long, default_value = "proxies.txt")]
    pub proxies: PathBuf,

    /// Use the headless browser strategy regardless of the config
    #[arg(short, long)]
    pub browser: bool,

    /// Last catalog page to visit (overrides the config)
    #[arg(short = 'p', long, value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub max_pages: Option<u32>,

    /// Attempts per URL including the first (overrides the config)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_retries: Option<u32>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["harvester"]).unwrap();
        assert_eq!(args.config, PathBuf::from("configs/site.json"));
        assert_eq!(args.output, PathBuf::from("results.txt"));
        assert_eq!(args.proxies, PathBuf::from("proxies.txt"));
        assert!(!args.browser);
        assert_eq!(args.max_pages, None);
        assert_eq!(args.max_retries, None);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["harvester", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["harvester", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["harvester", "--quiet"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_overrides_parse() {
        let args = Args::try_parse_from([
            "harvester",
            "--config",
            "sites/shop.json",
            "--output",
            "out.csv",
            "--browser",
            "--max-pages",
            "12",
            "--max-retries",
            "5",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("sites/shop.json"));
        assert_eq!(args.output, PathBuf::from("out.csv"));
        assert!(args.browser);
        assert_eq!(args.max_pages, Some(12));
        assert_eq!(args.max_retries, Some(5));
    }

    #[test]
    fn test_cli_max_pages_zero_rejected() {
        let result = Args::try_parse_from(["harvester", "--max-pages", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_max_retries_out_of_range_rejected() {
        let result = Args::try_parse_from(["harvester", "-r", "11"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["harvester", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
