//! Logging configuration for the stowage node.

use eyre::Result;
use tracing_subscriber::EnvFilter;

use crate::args::LogArgs;

/// Initialize logging based on command line arguments.
///
/// The filter is built with the following precedence:
/// 1. If `--quiet` is set, only errors are shown
/// 2. Otherwise, start with `RUST_LOG` env var if set, or default to info level
/// 3. Apply verbosity flags (-v, -vv, etc.) to increase log level
/// 4. Apply any custom filter from `--log.filter`
pub fn init_logging(args: &LogArgs) -> Result<()> {
    let filter = if args.quiet {
        EnvFilter::new("error")
    } else {
        let base_level = match args.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };

        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

        if let Some(custom_filter) = &args.filter {
            for directive in custom_filter.split(',') {
                if let Ok(d) = directive.parse() {
                    filter = filter.add_directive(d);
                }
            }
        }

        filter
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time();
    if args.json {
        builder.json().init();
    } else {
        builder.init();
    }

    if !args.quiet {
        log_startup_banner();
    }

    Ok(())
}

/// Log a startup banner with the stowage logo and version
fn log_startup_banner() {
    let banner = format!(
        r#"
       _
  ___ | |_  ___  _ _ _  ___  ___  ___
 |_ -||  _|| . || | | || .'|| . || -_|
 |___||_|  |___||_____||__,||_  ||___|
                            |___|
 Storage Deal Node v{}
    "#,
        crate::version::VERSION
    );

    println!("{}", banner);
}
