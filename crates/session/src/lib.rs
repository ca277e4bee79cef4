//! # voicelock-session
//!
//! Orchestrierung einer Ende-zu-Ende-verschluesselten Gruppen-Session:
//! haelt Mitglieder, Protokollversion und Schluesselmaterial von Encryptor und
//! Decryptoren synchron mit dem MLS-Gruppenzustand der Engine.
//!
//! ## Module
//! - `session` - `E2eeSession`, die oeffentliche API eines Calls
//! - `coordinator` - Transition-/Epoch-Zustandsmaschine
//! - `registry` - Ein Decryptor pro Mitglied (DashMap)
//! - `pipeline` - Der ausgehende Encryptor
//! - `callbacks` - Ausgehende Protokoll-Nachrichten
//! - `factory` - Erzeugt Sessions aus Engine und Konfiguration
//! - `config` - TOML-Konfiguration
//! - `error` - Fehlertypen

pub mod callbacks;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod factory;
pub mod pipeline;
pub mod registry;
pub mod session;

pub use callbacks::{AusgangsPuffer, AusgehendeNachricht, ProtocolCallbacks};
pub use config::{DuplikatPolicy, SessionConfig};
pub use coordinator::{CommitResult, PendingTransition, TransitionCoordinator, ERSTE_EPOCH};
pub use error::{SessionError, SessionResult};
pub use factory::SessionFactory;
pub use pipeline::EncryptionPipeline;
pub use registry::DecryptionRegistry;
pub use session::E2eeSession;
