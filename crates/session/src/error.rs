//! Fehlertypen der Session-Schicht
//!
//! Frame-Fehlschlaege (falsche Epoch, Auth-Fehler, zu kleiner Puffer) sind
//! keine Fehler, sondern ein [`voicelock_crypto::FrameOutcome`] mit Status
//! `Failure`. Abgelehnte Commits/Welcomes laufen ueber die Callbacks.

use thiserror::Error;
use voicelock_core::UserId;
use voicelock_crypto::CryptoError;

/// Fehler einer E2EE-Session
#[derive(Debug, Error)]
pub enum SessionError {
    /// Die Engine meldet einen nicht behebbaren Fehler
    #[error("Engine-Fehler: {0}")]
    EngineFault(String),

    /// Nach einem Engine-Fehler nimmt die Session keine Aufrufe mehr an
    #[error("Session ist nach einem Engine-Fehler unbrauchbar")]
    Unbrauchbar,

    #[error("Session wurde bereits zerstoert")]
    Zerstoert,

    #[error("Mitglied nicht gefunden: {0}")]
    MemberNotFound(UserId),

    #[error("Mitglied bereits vorhanden: {0}")]
    MemberAlreadyPresent(UserId),

    /// Nicht-fataler Fehler der Krypto-Schicht
    #[error("Krypto-Fehler: {0}")]
    Krypto(#[source] CryptoError),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl SessionError {
    /// Gibt true zurueck wenn die Session danach unbrauchbar ist
    pub fn ist_fatal(&self) -> bool {
        matches!(self, Self::EngineFault(_))
    }
}

impl From<CryptoError> for SessionError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::EngineFault(msg) => Self::EngineFault(msg),
            andere => Self::Krypto(andere),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
