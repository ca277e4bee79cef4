//! Session-Konfiguration
//!
//! Wird aus einer TOML-Datei oder einem String geladen. Alle Felder haben
//! Standardwerte, sodass Sessions ohne Konfigurationsdatei lauffaehig sind.

use std::path::Path;

use serde::{Deserialize, Serialize};
use voicelock_core::ProtocolVersion;
use voicelock_observability::logging::{log_format_gueltig, log_level_gueltig};

use crate::error::{SessionError, SessionResult};

/// Vollstaendige Session-Konfiguration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Protokoll- und Frame-Einstellungen
    pub session: SessionEinstellungen,
    /// Verhalten der Mitgliederverwaltung
    pub mitglieder: MitgliederEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Protokoll- und Frame-Einstellungen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionEinstellungen {
    /// Hoechste Protokollversion, die ausgehandelt werden darf
    pub max_protocol_version: u16,
    /// Faktor fuer die Puffergroesse, wenn keine genaue Schranke bekannt ist
    pub nicht_audio_faktor: usize,
}

impl Default for SessionEinstellungen {
    fn default() -> Self {
        Self {
            max_protocol_version: ProtocolVersion::V1.0,
            nicht_audio_faktor: 2,
        }
    }
}

/// Verhalten bei doppeltem `add_member`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplikatPolicy {
    /// Zweites `add_member` schlaegt mit `MemberAlreadyPresent` fehl
    #[default]
    Ablehnen,
    /// Der alte Decryptor wird freigegeben und ersetzt
    Ersetzen,
}

/// Mitglieder-Einstellungen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MitgliederEinstellungen {
    pub duplikat_policy: DuplikatPolicy,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: trace, debug, info, warn, error
    pub level: String,
    /// Format: text oder json
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl SessionConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: impl AsRef<Path>) -> SessionResult<Self> {
        let pfad = pfad.as_ref();
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt).map_err(|e| {
                SessionError::Konfiguration(format!("'{}': {e}", pfad.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = %pfad.display(),
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(SessionError::Konfiguration(format!(
                "Konfigurationsdatei '{}' nicht lesbar: {e}",
                pfad.display()
            ))),
        }
    }

    /// Parst und validiert eine Konfiguration im TOML-Format
    pub fn aus_toml(inhalt: &str) -> SessionResult<Self> {
        let config: Self =
            toml::from_str(inhalt).map_err(|e| SessionError::Konfiguration(e.to_string()))?;
        config.validieren()?;
        Ok(config)
    }

    /// Prueft die Werte auf Plausibilitaet
    pub fn validieren(&self) -> SessionResult<()> {
        if self.session.max_protocol_version == ProtocolVersion::DISABLED.0 {
            return Err(SessionError::Konfiguration(
                "max_protocol_version muss mindestens 1 sein".into(),
            ));
        }
        if self.session.nicht_audio_faktor == 0 {
            return Err(SessionError::Konfiguration(
                "nicht_audio_faktor muss mindestens 1 sein".into(),
            ));
        }
        if !log_level_gueltig(&self.logging.level) {
            return Err(SessionError::Konfiguration(format!(
                "Unbekanntes Log-Level '{}'",
                self.logging.level
            )));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(SessionError::Konfiguration(format!(
                "Unbekanntes Log-Format '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }

    pub fn max_protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion(self.session.max_protocol_version)
    }
}
