//! Process-wide tracing setup.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns false if a global subscriber was already set, which makes
/// repeated calls from tests harmless.
pub fn init_tracing() -> bool {
    init_tracing_with("info")
}

/// Like `init_tracing`, with an explicit fallback directive.
pub fn init_tracing_with(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        init_tracing_with("warn");
        assert!(!init_tracing());
    }
}
