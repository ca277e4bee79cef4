//! Frame-Verschluesselung (ausgehend)
//!
//! Im Passthrough-Modus werden Frames unveraendert kopiert. Im aktiven Modus
//! wird jeder Frame mit dem Schluessel der aktuellen Ratchet-Generation
//! verschluesselt. Die Nonce zaehlt ueber die gesamte Lebensdauer des
//! Encryptors monoton hoch, auch ueber Ratchet-Wechsel hinweg: ein erneut
//! installierter Ratchet derselben Epoch liefert denselben Schluessel.

use std::collections::HashMap;

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use voicelock_core::{Codec, MediaType, ProtocolVersion};

use crate::engine::{EngineResource, FrameEncryptor};
use crate::error::{CryptoError, CryptoResult};
use crate::frame::format::{
    ciphertext_size, full_nonce, generation_of, max_ciphertext_size, write_leb128, MAGIC_MARKER,
    SUPPLEMENTAL_BYTES, TAG_BYTES,
};
use crate::ratchet::SharedRatchet;
use crate::types::FrameOutcome;

/// Software-Encryptor (AES-256-GCM)
#[derive(Default)]
pub struct SoftEncryptor {
    passthrough: bool,
    ratchet: Option<SharedRatchet>,
    ssrc_codecs: HashMap<u32, Codec>,
    naechste_nonce: u32,
    /// Cipher der zuletzt benutzten Generation
    cipher: Option<(u32, Aes256Gcm)>,
    freigegeben: bool,
}

impl SoftEncryptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec, der einer SSRC zugeordnet wurde
    pub fn codec_for_ssrc(&self, ssrc: u32) -> Option<Codec> {
        self.ssrc_codecs.get(&ssrc).copied()
    }

    fn cipher_fuer(&mut self, generation: u32) -> CryptoResult<&Aes256Gcm> {
        let veraltet = !matches!(&self.cipher, Some((g, _)) if *g == generation);
        if veraltet {
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
            self.cipher = Some((generation, cipher));
        }
        match &self.cipher {
            Some((_, cipher)) => Ok(cipher),
            None => Err(CryptoError::KeinSchluessel { generation }),
        }
    }

    fn encrypt_aktiv(
        &mut self,
        media_type: MediaType,
        input: &[u8],
        output: &mut [u8],
    ) -> CryptoResult<usize> {
        let nonce = self.naechste_nonce;
        let naechste = nonce
            .checked_add(1)
            .ok_or_else(|| CryptoError::Verschluesselung("Nonce-Raum erschoepft".to_string()))?;
        let benoetigt = ciphertext_size(input.len(), nonce);
        if output.len() < benoetigt {
            return Err(CryptoError::UngueltigeDaten(format!(
                "Ausgabepuffer zu klein: {} < {}",
                output.len(),
                benoetigt
            )));
        }

        let aad = [media_type.as_raw() as u8];
        let nonce_bytes = full_nonce(nonce);
        let cipher = self.cipher_fuer(generation_of(nonce))?;

        let (body, trailer) = output.split_at_mut(input.len());
        body.copy_from_slice(input);
        let tag = cipher
            .encrypt_in_place_detached(AesNonce::from_slice(&nonce_bytes), &aad, body)
            .map_err(|e| CryptoError::Verschluesselung(e.to_string()))?;

        trailer[..TAG_BYTES].copy_from_slice(&tag);
        let nonce_len = write_leb128(nonce, &mut trailer[TAG_BYTES..]);
        let mut pos = TAG_BYTES + nonce_len;
        trailer[pos] = (SUPPLEMENTAL_BYTES + nonce_len) as u8;
        pos += 1;
        trailer[pos..pos + MAGIC_MARKER.len()].copy_from_slice(&MAGIC_MARKER);

        self.naechste_nonce = naechste;
        Ok(benoetigt)
    }
}

impl EngineResource for SoftEncryptor {
    fn release(&mut self) {
        self.ratchet = None;
        self.cipher = None;
        self.ssrc_codecs.clear();
        self.freigegeben = true;
    }
}

impl FrameEncryptor for SoftEncryptor {
    fn set_passthrough_mode(&mut self, enabled: bool) {
        self.passthrough = enabled;
    }

    fn set_key_ratchet(&mut self, ratchet: Option<SharedRatchet>) {
        self.ratchet = ratchet;
        self.cipher = None;
    }

    fn assign_ssrc_to_codec(&mut self, ssrc: u32, codec: Codec) {
        self.ssrc_codecs.insert(ssrc, codec);
    }

    fn protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion::V1
    }

    fn max_ciphertext_size(&self, _media_type: MediaType, frame_size: usize) -> usize {
        max_ciphertext_size(frame_size)
    }

    fn encrypt(
        &mut self,
        media_type: MediaType,
        ssrc: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> FrameOutcome {
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

        if self.ratchet.is_none() {
            tracing::trace!(ssrc, "Encrypt ohne Key-Ratchet");
            return FrameOutcome::failure();
        }

        match self.codec_for_ssrc(ssrc) {
            Some(codec) if codec != Codec::Unknown => {}
            _ => {
                tracing::trace!(ssrc, "Encrypt fuer SSRC ohne Codec-Zuordnung");
                return FrameOutcome::failure();
            }
        }

        match self.encrypt_aktiv(media_type, input, output) {
            Ok(geschrieben) => FrameOutcome::success(geschrieben),
            Err(e) => {
                tracing::trace!(ssrc, fehler = %e, "Frame-Verschluesselung fehlgeschlagen");
                FrameOutcome::failure()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
