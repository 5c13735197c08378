//! Tracing subscriber setup from the `logging` config section.

use parley_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is not set.
fn directives(logging: &LoggingConfig, verbose: bool) -> Vec<String> {
    let level = if verbose {
        "debug".to_string()
    } else {
        logging.level.clone().unwrap_or_else(|| "info".to_string())
    };
    std::iter::once(level)
        .chain(logging.filters.iter().map(|f| f.trim().to_string()))
        .filter(|d| !d.is_empty())
        .collect()
}

fn build_filter(logging: &LoggingConfig, verbose: bool) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let mut filter = EnvFilter::try_new("info")?;
    for directive in directives(logging, verbose) {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid log filter '{directive}': {e}"))?,
        );
    }
    Ok(filter)
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level
/// and filters; `verbose` forces `debug`.
pub fn init(logging: &LoggingConfig, verbose: bool) -> anyhow::Result<()> {
    let filter = build_filter(logging, verbose)?;
    let json = logging.format.eq_ignore_ascii_case("json");
    let stdout = logging.output.eq_ignore_ascii_case("stdout");

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match (json, stdout) {
        (true, true) => builder.json().with_writer(std::io::stdout).try_init(),
        (true, false) => builder.json().with_writer(std::io::stderr).try_init(),
        (false, true) => builder.with_writer(std::io::stdout).try_init(),
        (false, false) => builder.with_writer(std::io::stderr).try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level_is_info() {
        assert_eq!(directives(&LoggingConfig::default(), false), vec!["info"]);
    }

    #[test]
    fn test_verbose_overrides_level() {
        let logging = LoggingConfig {
            level: Some("warn".into()),
            filters: vec!["parley_pipeline=trace".into(), "  ".into()],
            ..Default::default()
        };
        assert_eq!(
            directives(&logging, true),
            vec!["debug", "parley_pipeline=trace"]
        );
        assert_eq!(
            directives(&logging, false),
            vec!["warn", "parley_pipeline=trace"]
        );
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let logging = LoggingConfig {
            filters: vec!["parley=notalevel".into()],
            ..Default::default()
        };
        assert!(build_filter(&logging, false).is_err());
    }
}
