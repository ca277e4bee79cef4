//! Fehlertypen fuer das Kryptografie-Subsystem

use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Die Engine meldet einen nicht behebbaren internen Fehler
    #[error("Engine-Fehler: {0}")]
    EngineFault(String),

    #[error("Key Derivation fehlgeschlagen: {0}")]
    KeyDerivation(String),

    #[error("Kein Schluessel fuer Generation {generation}")]
    KeinSchluessel { generation: u32 },

    #[error("Ungueltige Schluessel-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeSchluesselLaenge { erwartet: usize, erhalten: usize },

    #[error("Ungueltige Daten: {0}")]
    UngueltigeDaten(String),

    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    #[error("Entschluesselung fehlgeschlagen: {0}")]
    Entschluesselung(String),
}

impl CryptoError {
    /// Erstellt einen Engine-Fehler aus einer beliebigen Nachricht
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::EngineFault(msg.into())
    }

    /// Gibt true zurueck wenn die Session danach unbrauchbar ist
    pub fn ist_fatal(&self) -> bool {
        matches!(self, Self::EngineFault(_))
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
