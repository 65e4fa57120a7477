use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Map `-v`/`-q` to a filter directive for this crate.
pub fn level_for(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "ccooler=error";
    }
    match verbose {
        0 => "ccooler=warn",
        1 => "ccooler=info",
        2 => "ccooler=debug",
        _ => "ccooler=trace",
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over the flags.
/// Calling this twice is harmless.
pub fn init(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbose, quiet)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for() {
        assert_eq!(level_for(0, false), "ccooler=warn");
        assert_eq!(level_for(2, false), "ccooler=debug");
        assert_eq!(level_for(5, false), "ccooler=trace");
        assert_eq!(level_for(3, true), "ccooler=error");
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init(0, false);
        init(1, false);
    }
}
