//! Ausgehende Protokoll-Nachrichten
//!
//! Der Coordinator sammelt Antworten an die Gruppe als [`AusgehendeNachricht`];
//! die Session stellt sie ohne gehaltenen Lock ueber [`ProtocolCallbacks`] zu.
//! Callbacks duerfen deshalb selbst wieder die Session aufrufen.
//! Die Transport-Schicht implementiert das Trait; [`AusgangsPuffer`] ist eine
//! fertige Implementierung, die Nachrichten sammelt, bis der Transport sie
//! abholt.

use parking_lot::Mutex;
use voicelock_core::TransitionId;

/// Senke fuer ausgehende Protokoll-Nachrichten
pub trait ProtocolCallbacks: Send + Sync {
    /// Marshalltes Commit/Welcome-Paar an die Gruppe senden
    fn send_commit_welcome(&self, commit_welcome: &[u8]);

    /// Commit/Welcome fuer `transition_id` konnte nicht angewendet werden
    fn send_invalid_commit_welcome(&self, transition_id: TransitionId);

    /// Eigenes Key-Package (erneut) veroeffentlichen
    fn send_key_package(&self, key_package: &[u8]);

    /// Bereit fuer die Ausfuehrung von `transition_id`
    fn send_ready_for_transition(&self, transition_id: TransitionId);
}

/// Eine ausgehende Nachricht
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AusgehendeNachricht {
    CommitWelcome(Vec<u8>),
    InvalidCommitWelcome(TransitionId),
    KeyPackage(Vec<u8>),
    ReadyForTransition(TransitionId),
}

impl AusgehendeNachricht {
    /// Uebergibt die Nachricht an die passende Callback-Methode
    pub fn zustellen(&self, callbacks: &dyn ProtocolCallbacks) {
        match self {
            Self::CommitWelcome(bytes) => callbacks.send_commit_welcome(bytes),
            Self::InvalidCommitWelcome(id) => callbacks.send_invalid_commit_welcome(*id),
            Self::KeyPackage(bytes) => callbacks.send_key_package(bytes),
            Self::ReadyForTransition(id) => callbacks.send_ready_for_transition(*id),
        }
    }
}

/// Sammelt ausgehende Nachrichten in Sende-Reihenfolge
#[derive(Debug, Default)]
pub struct AusgangsPuffer {
    nachrichten: Mutex<Vec<AusgehendeNachricht>>,
}

impl AusgangsPuffer {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Entnimmt alle gesammelten Nachrichten
    pub fn abholen(&self) -> Vec<AusgehendeNachricht> {
        std::mem::take(&mut *self.nachrichten.lock())
    }

    pub fn anzahl(&self) -> usize {
        self.nachrichten.lock().len()
    }

    fn push(&self, nachricht: AusgehendeNachricht) {
        self.nachrichten.lock().push(nachricht);
    }
}

impl ProtocolCallbacks for AusgangsPuffer {
    fn send_commit_welcome(&self, commit_welcome: &[u8]) {
        self.push(AusgehendeNachricht::CommitWelcome(commit_welcome.to_vec()));
    }

    fn send_invalid_commit_welcome(&self, transition_id: TransitionId) {
        self.push(AusgehendeNachricht::InvalidCommitWelcome(transition_id));
    }

    fn send_key_package(&self, key_package: &[u8]) {
        self.push(AusgehendeNachricht::KeyPackage(key_package.to_vec()));
    }

    fn send_ready_for_transition(&self, transition_id: TransitionId) {
        self.push(AusgehendeNachricht::ReadyForTransition(transition_id));
    }
}
