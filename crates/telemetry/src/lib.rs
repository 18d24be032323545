//! Logging bootstrap shared by the bookindex binaries.

use bookindex_kernel::{LogFormat, TelemetrySettings};
use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber described by `settings`.
///
/// `RUST_LOG` takes precedence over `settings.filter`. Returns `Ok(false)`
/// when a subscriber was already installed (tests call this repeatedly).
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<bool> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)?,
        _ => EnvFilter::try_new(&settings.filter)?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match settings.log_format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };

    if installed {
        tracing::info!(
            target: "bookindex-telemetry",
            format = ?settings.log_format,
            "telemetry initialized"
        );
    }

    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_is_an_error() {
        let settings = TelemetrySettings {
            filter: "bookindex=notalevel".to_string(),
            ..TelemetrySettings::default()
        };
        if std::env::var(EnvFilter::DEFAULT_ENV).is_err() {
            assert!(init(&settings).is_err());
        }
    }

    #[test]
    fn second_init_reports_existing_subscriber() {
        let settings = TelemetrySettings::default();
        let _ = init(&settings).unwrap();
        assert!(!init(&settings).unwrap());
    }
}
