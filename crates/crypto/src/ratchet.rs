//! Key-Ratchets
//!
//! Ein Key-Ratchet liefert pro Generation einen symmetrischen Frame-Schluessel.
//! Die Gruppen-Session der Engine leitet fuer jedes Mitglied einen Ratchet aus
//! dem aktuellen Gruppenzustand ab; Encryptor und Decryptor behandeln ihn als
//! opakes Objekt.
//!
//! `HashRatchet` ist eine einfache Implementierung: jeder Generations-Schluessel
//! wird per HKDF-SHA256 aus einem Basis-Secret abgeleitet.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use hkdf::Hkdf;
use parking_lot::Mutex;
use sha2::Sha256;

use crate::error::{CryptoError, CryptoResult};
use crate::types::SecretBytes;

/// Laenge eines Frame-Schluessels (AES-256)
pub const FRAME_KEY_BYTES: usize = 32;

const RATCHET_INFO: &[u8] = b"voicelock-ratchet-v1";

/// Schnittstelle eines Key-Ratchets
pub trait KeyRatchet: Send + Sync + std::fmt::Debug {
    /// Liefert den Schluessel fuer `generation`
    fn get_key(&self, generation: u32) -> CryptoResult<SecretBytes>;

    /// Verwirft den Schluessel einer Generation endgueltig
    fn delete_key(&self, generation: u32);
}

/// Geteilter Ratchet, wie ihn die Gruppen-Session herausgibt
pub type SharedRatchet = Arc<dyn KeyRatchet>;

/// HKDF-Ableitung (SHA-256)
pub fn hkdf_derive(ikm: &[u8], salt: &[u8], info: &[u8], len: usize) -> CryptoResult<Vec<u8>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = vec![0u8; len];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(okm)
}

// ---------------------------------------------------------------------------
// HashRatchet
// ---------------------------------------------------------------------------

/// HKDF-basierter Ratchet ueber einem Basis-Secret
pub struct HashRatchet {
    base_secret: SecretBytes,
    state: Mutex<RatchetState>,
}

#[derive(Default)]
struct RatchetState {
    cache: HashMap<u32, SecretBytes>,
    geloescht: HashSet<u32>,
}

impl HashRatchet {
    pub fn new(base_secret: SecretBytes) -> Self {
        Self {
            base_secret,
            state: Mutex::new(RatchetState::default()),
        }
    }

    /// Erstellt einen geteilten Ratchet
    pub fn shared(base_secret: SecretBytes) -> SharedRatchet {
        Arc::new(Self::new(base_secret))
    }

    fn ableiten(&self, generation: u32) -> CryptoResult<SecretBytes> {
        let mut info = Vec::with_capacity(RATCHET_INFO.len() + 4);
        info.extend_from_slice(RATCHET_INFO);
        info.extend_from_slice(&generation.to_be_bytes());
        let key = hkdf_derive(self.base_secret.as_bytes(), &[], &info, FRAME_KEY_BYTES)?;
        Ok(SecretBytes::new(key))
    }
}

impl KeyRatchet for HashRatchet {
    fn get_key(&self, generation: u32) -> CryptoResult<SecretBytes> {
        let mut state = self.state.lock();
        if state.geloescht.contains(&generation) {
            return Err(CryptoError::KeinSchluessel { generation });
        }
        if let Some(key) = state.cache.get(&generation) {
            return Ok(key.clone());
        }
        let key = self.ableiten(generation)?;
        state.cache.insert(generation, key.clone());
        Ok(key)
    }

    fn delete_key(&self, generation: u32) {
        let mut state = self.state.lock();
        state.cache.remove(&generation);
        state.geloescht.insert(generation);
    }
}

impl std::fmt::Debug for HashRatchet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRatchet")
            .field("base_secret", &self.base_secret)
            .field("gecacht", &self.state.lock().cache.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
