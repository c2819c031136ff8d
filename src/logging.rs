//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Install a compact `fmt` subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_directive`. Calling this more
/// than once (or after another subscriber was installed) is a no-op.
pub fn init_logging(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging("warn");
        init_logging("debug");
        tracing::debug!("logging initialised");
    }
}
