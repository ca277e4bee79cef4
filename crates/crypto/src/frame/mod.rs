//! Software-Frame-Transform
//!
//! Eingebaute Implementierung der Encryptor-/Decryptor-Capability auf Basis
//! von AES-256-GCM. Der Schluessel eines Frames kommt aus dem installierten
//! Key-Ratchet (Generation = oberstes Byte der Nonce).
//!
//! ## Format
//! ```text
//! [ciphertext] [tag(16)] [nonce(LEB128)] [supplemental_size(1)] [0xFA 0xFA]
//! ```

pub mod decrypt;
pub mod encrypt;
pub mod format;

pub use decrypt::SoftDecryptor;
pub use encrypt::SoftEncryptor;
pub use format::{max_ciphertext_size, SUPPLEMENTAL_BYTES, TRANSFORM_PADDING_BYTES};
