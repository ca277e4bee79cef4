//! Frame-Entschluesselung (eingehend)
//!
//! Verifiziert Trailer und Auth-Tag eines Frames und entschluesselt ihn mit dem
//! Schluessel der Generation, die in der Nonce steckt. Im Passthrough-Modus
//! werden Frames unveraendert durchgereicht.

use std::collections::HashMap;

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce, Tag};
use voicelock_core::MediaType;

use crate::engine::{EngineResource, FrameDecryptor};
use crate::error::{CryptoError, CryptoResult};
use crate::frame::format::{full_nonce, generation_of, parse_frame};
use crate::ratchet::SharedRatchet;
use crate::types::FrameOutcome;

/// Software-Decryptor (AES-256-GCM)
#[derive(Default)]
pub struct SoftDecryptor {
    passthrough: bool,
    ratchet: Option<SharedRatchet>,
    /// Cipher pro Generation des aktuellen Ratchets
    ciphers: HashMap<u32, Aes256Gcm>,
    freigegeben: bool,
}

impl SoftDecryptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ist_passthrough(&self) -> bool {
        self.passthrough
    }

    fn cipher_fuer(&mut self, generation: u32) -> CryptoResult<&Aes256Gcm> {
        if !self.ciphers.contains_key(&generation) {
            let ratchet = self
                .ratchet
                .as_ref()
                .ok_or(CryptoError::KeinSchluessel { generation })?;
            let key = ratchet.get_key(generation)?;
            let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| {
                CryptoError::UngueltigeSchluesselLaenge {
                    erwartet: 32,
                    erhalten: key.len(),
                }
            })?;
            self.ciphers.insert(generation, cipher);
        }
        self.ciphers
            .get(&generation)
            .ok_or(CryptoError::KeinSchluessel { generation })
    }

    fn decrypt_aktiv(
        &mut self,
        media_type: MediaType,
        input: &[u8],
        output: &mut [u8],
    ) -> CryptoResult<usize> {
        let frame = parse_frame(input)
            .ok_or_else(|| CryptoError::UngueltigeDaten("Kein gueltiger Frame-Trailer".to_string()))?;
        let laenge = frame.ciphertext.len();
        if output.len() < laenge {
            return Err(CryptoError::UngueltigeDaten(format!(
                "Ausgabepuffer zu klein: {} < {}",
                output.len(),
                laenge
            )));
        }

        let aad = [media_type.as_raw() as u8];
        let nonce_bytes = full_nonce(frame.nonce);
        let tag = Tag::clone_from_slice(frame.tag);
        let cipher = self.cipher_fuer(generation_of(frame.nonce))?;

        let body = &mut output[..laenge];
        body.copy_from_slice(frame.ciphertext);
        if let Err(e) =
            cipher.decrypt_in_place_detached(AesNonce::from_slice(&nonce_bytes), &aad, body, &tag)
        {
            body.iter_mut().for_each(|b| *b = 0);
            return Err(CryptoError::Entschluesselung(e.to_string()));
        }
        Ok(laenge)
    }
}

impl EngineResource for SoftDecryptor {
    fn release(&mut self) {
        self.ratchet = None;
        self.ciphers.clear();
        self.freigegeben = true;
    }
}

impl FrameDecryptor for SoftDecryptor {
    fn set_passthrough_mode(&mut self, enabled: bool) {
        self.passthrough = enabled;
    }

    fn set_key_ratchet(&mut self, ratchet: Option<SharedRatchet>) {
        self.ratchet = ratchet;
        self.ciphers.clear();
    }

    fn max_plaintext_size(&self, _media_type: MediaType, frame_size: usize) -> usize {
        frame_size
    }

    fn decrypt(&mut self, media_type: MediaType, input: &[u8], output: &mut [u8]) -> FrameOutcome {
        if self.freigegeben {
            return FrameOutcome::failure();
        }

        if self.passthrough {
            if output.len() < input.len() {
                return FrameOutcome::failure();
            }
            output[..input.len()].copy_from_slice(input);
            return FrameOutcome::success(input.len());
        }

        match self.decrypt_aktiv(media_type, input, output) {
            Ok(geschrieben) => FrameOutcome::success(geschrieben),
            Err(e) => {
                tracing::trace!(fehler = %e, "Frame-Entschluesselung fehlgeschlagen");
                FrameOutcome::failure()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FrameEncryptor;
    use crate::frame::encrypt::SoftEncryptor;
    use crate::ratchet::HashRatchet;
    use crate::types::{FrameStatus, SecretBytes};
    use voicelock_core::Codec;

    const SSRC: u32 = 42;

    fn ratchet(seed: u8) -> SharedRatchet {
        HashRatchet::shared(SecretBytes::new(vec![seed; 32]))
    }

    fn verschluesseln(seed: u8, media_type: MediaType, plaintext: &[u8]) -> Vec<u8> {
        let mut enc = SoftEncryptor::new();
        enc.assign_ssrc_to_codec(SSRC, Codec::Opus);
        enc.set_key_ratchet(Some(ratchet(seed)));
        let mut out = vec![0u8; enc.max_ciphertext_size(media_type, plaintext.len())];
        let outcome = enc.encrypt(media_type, SSRC, plaintext, &mut out);
        assert!(outcome.ist_erfolg());
        out.truncate(outcome.bytes_written);
        out
    }

    fn aktiver_decryptor(seed: u8) -> SoftDecryptor {
        let mut dec = SoftDecryptor::new();
        dec.set_key_ratchet(Some(ratchet(seed)));
        dec
    }

    #[test]
    fn roundtrip_mit_gleichem_ratchet() {
        let plaintext = b"Hallo Opus-Audio 1234567890abcdef";
        let frame = verschluesseln(3, MediaType::Audio, plaintext);

        let mut dec = aktiver_decryptor(3);
        let mut out = vec![0u8; dec.max_plaintext_size(MediaType::Audio, frame.len())];
        let outcome = dec.decrypt(MediaType::Audio, &frame, &mut out);
        assert!(outcome.ist_erfolg());
        assert_eq!(&out[..outcome.bytes_written], plaintext);
    }

    #[test]
    fn falscher_ratchet_schlaegt_fehl() {
        let frame = verschluesseln(3, MediaType::Audio, b"Geheime Audio-Daten");
        let mut dec = aktiver_decryptor(4);
        let mut out = vec![0u8; frame.len()];
        assert_eq!(dec.decrypt(MediaType::Audio, &frame, &mut out), FrameOutcome::failure());
    }

    #[test]
    fn manipulierter_ciphertext_schlaegt_fehl() {
        let mut frame = verschluesseln(3, MediaType::Audio, b"Original-Audio");
        frame[0] ^= 0xFF;
        let mut dec = aktiver_decryptor(3);
        let mut out = vec![0u8; frame.len()];
        assert_eq!(dec.decrypt(MediaType::Audio, &frame, &mut out).status, FrameStatus::Failure);
        assert!(out.iter().all(|b| *b == 0));
    }

    #[test]
    fn falscher_medientyp_schlaegt_fehl() {
        let frame = verschluesseln(3, MediaType::Audio, b"audio");
        let mut dec = aktiver_decryptor(3);
        let mut out = vec![0u8; frame.len()];
        assert!(!dec.decrypt(MediaType::Video, &frame, &mut out).ist_erfolg());
    }

    #[test]
    fn klartext_frame_im_aktiven_modus_schlaegt_fehl() {
        let mut dec = aktiver_decryptor(3);
        let mut out = [0u8; 64];
        assert!(!dec.decrypt(MediaType::Audio, b"unverschluesselt", &mut out).ist_erfolg());
    }

    #[test]
    fn ohne_ratchet_schlaegt_fehl() {
        let frame = verschluesseln(3, MediaType::Audio, b"audio");
        let mut dec = SoftDecryptor::new();
        let mut out = vec![0u8; frame.len()];
        assert!(!dec.decrypt(MediaType::Audio, &frame, &mut out).ist_erfolg());
    }

    #[test]
    fn passthrough_reicht_durch() {
        let mut dec = SoftDecryptor::new();
        dec.set_passthrough_mode(true);
        assert!(dec.ist_passthrough());
        let mut out = [0u8; 16];
        let outcome = dec.decrypt(MediaType::Audio, b"klartext", &mut out);
        assert_eq!(outcome, FrameOutcome::success(8));
        assert_eq!(&out[..8], b"klartext");
    }

    #[test]
    fn leerer_frame_roundtrip() {
        let frame = verschluesseln(9, MediaType::Video, b"");
        let mut dec = aktiver_decryptor(9);
        let mut out = [0u8; 4];
        assert_eq!(dec.decrypt(MediaType::Video, &frame, &mut out), FrameOutcome::success(0));
    }
}
