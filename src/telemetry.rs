use super::error::TelemetryError;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over `log_level`.
pub fn init(log_level: &str) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => fallback_filter(log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

fn fallback_filter(log_level: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(log_level).map_err(|source| TelemetryError::EnvFilter {
        value: log_level.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_levels_parse() {
        assert!(fallback_filter("info").is_ok());
        assert!(fallback_filter("deal_scoring=debug,sled=warn").is_ok());
    }

    #[test]
    fn bad_level_is_reported() {
        let err = fallback_filter("deal_scoring=loudest").unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::EnvFilter { ref value, .. } if value == "deal_scoring=loudest"
        ));

        // only reachable through init when RUST_LOG leaves the fallback in charge
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(matches!(
                init("deal_scoring=loudest"),
                Err(TelemetryError::EnvFilter { .. })
            ));
        }
    }
}
