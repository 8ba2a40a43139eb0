use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber. `RUST_LOG` wins over the configured level.
/// Calling it twice is harmless.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn default_directives(level: &str) -> String {
    let level = level.trim();
    let level = if level.is_empty() { "info" } else { level };
    format!("{level},reelview={level},reqwest=warn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_level_falls_back_to_info() {
        assert_eq!(default_directives("  "), "info,reelview=info,reqwest=warn");
        assert_eq!(default_directives("debug"), "debug,reelview=debug,reqwest=warn");
    }

    #[test]
    fn init_is_idempotent() {
        init("warn");
        init("debug");
    }
}
