//! # voicelock-crypto
//!
//! Krypto-Schicht fuer Voicelock-Sessions.
//!
//! ## Module
//! - `engine` - Capability-Traits der Krypto-Engine (Gruppen-Session, Encryptor, Decryptor)
//! - `handle` - Besitzende Handles mit garantierter Freigabe
//! - `ratchet` - Key-Ratchet-Schnittstelle und HKDF-Hash-Ratchet
//! - `frame` - Eingebauter Software-Frame-Transform (AES-256-GCM)
//! - `types` - Gemeinsame Typen (SecretBytes, FrameStatus, FrameOutcome)
//! - `error` - Fehlertypen

pub mod engine;
pub mod error;
pub mod frame;
pub mod handle;
pub mod ratchet;
pub mod types;

// Bequeme Re-Exports
pub use engine::{
    CommitOutcome, CommitWelcome, CryptoEngine, EngineResource, FrameDecryptor, FrameEncryptor,
    GroupSession,
};
pub use error::{CryptoError, CryptoResult};
pub use frame::{SoftDecryptor, SoftEncryptor};
pub use handle::{CryptoHandle, HandleKind};
pub use ratchet::{hkdf_derive, HashRatchet, KeyRatchet, SharedRatchet};
pub use types::{FrameOutcome, FrameStatus, SecretBytes};
