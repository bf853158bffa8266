//! Logging setup.

use eyre::Result;
use tracing_subscriber::EnvFilter;

use crate::cli::LogArgs;

/// Initialize logging based on command line arguments.
///
/// The filter is built with the following precedence:
/// 1. If `--quiet` is set, only errors are shown
/// 2. Otherwise, start with `RUST_LOG` env var if set, or a level from `-v` flags
/// 3. Apply any custom filter from `--log.filter`
pub(crate) fn init_logging(args: &LogArgs) -> Result<()> {
    let filter = build_filter(args);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if args.timestamps {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };

    result.map_err(|e| eyre::eyre!("failed to install log subscriber: {e}"))
}

fn build_filter(args: &LogArgs) -> EnvFilter {
    if args.quiet {
        return EnvFilter::new("error");
    }

    let base_level = match args.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

    if let Some(custom_filter) = &args.filter {
        for directive in custom_filter.split(',') {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("ignoring invalid log directive `{directive}`: {e}"),
            }
        }
    }

    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(quiet: bool, verbosity: u8, filter: Option<&str>) -> LogArgs {
        LogArgs {
            quiet,
            verbosity,
            timestamps: false,
            filter: filter.map(str::to_string),
        }
    }

    #[test]
    fn test_quiet_wins() {
        let filter = build_filter(&args(true, 3, Some("courier=trace")));
        let rendered = filter.to_string();
        assert!(rendered.contains("error"));
        assert!(!rendered.contains("trace"));
    }

    #[test]
    fn test_custom_directives_added() {
        let filter = build_filter(&args(false, 0, Some("courier_net_peers=trace")));
        assert!(filter.to_string().contains("courier_net_peers=trace"));
    }
}
