use once_cell::sync::OnceCell;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing_subscriber::EnvFilter;

static INSTALLED: OnceCell<()> = OnceCell::new();

/**
 * \brief Installs the fmt subscriber once. Honors RUST_LOG, defaults to info.
 * A subscriber installed elsewhere (tests, embedding hosts) is left alone.
 */
pub fn init(json: bool) {
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let result = if json {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .json()
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .try_init()
        };
        if let Err(err) = result {
            eprintln!("telemetry init skipped: {}", err);
        }
    });
}

/**
 * \brief Records a routine event.
 */
pub fn log_event(category: &str, message: &str) {
    tracing::info!(category, "{}", message);
}

pub fn log_error(category: &str, message: &str) {
    tracing::error!(category, "{}", message);
}

/**
 * \brief Current UTC time as RFC 3339.
 */
pub fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_rfc3339() {
        let ts = timestamp();
        assert!(ts.contains('T') && ts.ends_with('Z'), "{}", ts);
    }

    #[test]
    fn init_is_idempotent() {
        init(false);
        init(true);
        log_event("test", "still alive");
    }
}
