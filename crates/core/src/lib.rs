//! voicelock-core – Gemeinsame Typen und Ereignisse
//!
//! Stellt die Bausteine bereit, die Krypto-Schicht und Session-Orchestrierung
//! gemeinsam nutzen: ID-Newtypes, Protokoll-Sentinels, Medientypen und die
//! eingehenden Protokoll-Ereignisse.

pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use event::SessionEvent;
pub use types::{ChannelId, Codec, MediaType, ProtocolVersion, TransitionId, UserId};
