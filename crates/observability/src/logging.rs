//! Logging-Setup fuer Prozesse, die Voicelock-Sessions hosten
//!
//! Die Werte aus `[logging]` der Session-Konfiguration lassen sich per
//! Umgebung uebersteuern:
//! - `VL_LOG_LEVEL`: EnvFilter-Direktive, z.B. `debug` oder `info,voicelock::engine=trace`
//! - `VL_LOG_FORMAT`: `text` oder `json`
//!
//! Engine-Diagnosen laufen ueber den Target `voicelock::engine` (siehe
//! `log_sink`) und lassen sich damit getrennt filtern.

use tracing_subscriber::{fmt, EnvFilter};

pub const LEVEL_ENV: &str = "VL_LOG_LEVEL";
pub const FORMAT_ENV: &str = "VL_LOG_FORMAT";

/// Ausgabeformat der Log-Zeilen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(format: &str) -> Option<Self> {
        match format {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Wirksame Einstellung nach Anwendung der Umgebungs-Overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEinstellung {
    pub filter: String,
    pub format: LogFormat,
}

impl LogEinstellung {
    /// Konfigurierte Werte, uebersteuert durch `VL_LOG_LEVEL` / `VL_LOG_FORMAT`
    pub fn aufloesen(level: &str, format: &str) -> Self {
        Self::mit_overrides(
            level,
            format,
            std::env::var(LEVEL_ENV).ok(),
            std::env::var(FORMAT_ENV).ok(),
        )
    }

    fn mit_overrides(
        level: &str,
        format: &str,
        env_level: Option<String>,
        env_format: Option<String>,
    ) -> Self {
        let filter = env_level
            .filter(|f| EnvFilter::try_new(f).is_ok())
            .or_else(|| EnvFilter::try_new(level).is_ok().then(|| level.to_string()))
            .unwrap_or_else(|| "info".to_string());

        let format = env_format
            .as_deref()
            .and_then(LogFormat::parse)
            .or_else(|| LogFormat::parse(format))
            .unwrap_or_default();

        Self { filter, format }
    }
}

/// Installiert den globalen Subscriber.
///
/// Gibt `false` zurueck, wenn bereits einer installiert war; der bestehende
/// bleibt dann unveraendert.
pub fn logging_initialisieren(level: &str, format: &str) -> bool {
    let einstellung = LogEinstellung::aufloesen(level, format);
    let filter = EnvFilter::new(&einstellung.filter);

    let ergebnis = match einstellung.format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    match ergebnis {
        Ok(()) => {
            tracing::debug!(filter = %einstellung.filter, format = ?einstellung.format, "Logging aktiv");
            true
        }
        Err(_) => false,
    }
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    LogFormat::parse(format).is_some()
}
