//! Ausgehende Encryption-Pipeline
//!
//! Genau ein Encryptor pro Session. Er startet im Passthrough-Modus und wird
//! aktiv, sobald der Coordinator einen Key-Ratchet installiert. Media-Threads
//! rufen `encrypt` auf, ohne den Coordinator zu beruehren.

use std::collections::HashMap;

use parking_lot::Mutex;
use voicelock_core::{Codec, MediaType, ProtocolVersion};
use voicelock_crypto::{CryptoEngine, CryptoHandle, FrameEncryptor, FrameOutcome, SharedRatchet};
use voicelock_observability::{FrameErgebnis, FrameMetrics};

use crate::error::SessionResult;

struct PipelineZustand {
    /// `None` nach der Freigabe
    encryptor: Option<CryptoHandle<dyn FrameEncryptor>>,
    passthrough: bool,
    ssrc_pro_codec: HashMap<Codec, u32>,
}

/// Encryptor einer Session samt Modus und SSRC-Zuordnung
pub struct EncryptionPipeline {
    zustand: Mutex<PipelineZustand>,
    metriken: Option<FrameMetrics>,
}

impl EncryptionPipeline {
    /// Erzeugt den Encryptor ueber die Engine, im Passthrough-Modus
    pub fn neu(engine: &dyn CryptoEngine, metriken: Option<FrameMetrics>) -> SessionResult<Self> {
        let mut encryptor = CryptoHandle::encryptor(engine)?;
        encryptor.set_passthrough_mode(true);
        Ok(Self {
            zustand: Mutex::new(PipelineZustand {
                encryptor: Some(encryptor),
                passthrough: true,
                ssrc_pro_codec: HashMap::new(),
            }),
            metriken,
        })
    }

    /// Installiert `ratchet` und schaltet in den aktiven Modus.
    ///
    /// Ohne Ratchet schlaegt danach jedes `encrypt` fehl, bis ein Ratchet
    /// installiert wird.
    pub fn initialize(&self, ratchet: Option<SharedRatchet>) {
        let mut zustand = self.zustand.lock();
        let mit_ratchet = ratchet.is_some();
        if let Some(encryptor) = zustand.encryptor.as_mut() {
            encryptor.set_key_ratchet(ratchet);
            encryptor.set_passthrough_mode(false);
        }
        zustand.passthrough = false;
        tracing::debug!(ratchet = mit_ratchet, "Encryptor initialisiert");
    }

    /// Verwirft den Ratchet und kehrt in den Passthrough-Modus zurueck
    pub fn pass_through(&self) {
        let mut zustand = self.zustand.lock();
        if let Some(encryptor) = zustand.encryptor.as_mut() {
            encryptor.set_key_ratchet(None);
            encryptor.set_passthrough_mode(true);
        }
        zustand.passthrough = true;
        tracing::debug!("Encryptor im Passthrough-Modus");
    }

    /// Ordnet `ssrc` dem Codec zu; eine fruehere SSRC fuer den Codec wird ersetzt
    pub fn assign_transport_id(&self, codec: Codec, ssrc: u32) {
        let mut zustand = self.zustand.lock();
        if let Some(encryptor) = zustand.encryptor.as_mut() {
            encryptor.assign_ssrc_to_codec(ssrc, codec);
        }
        if let Some(alt) = zustand.ssrc_pro_codec.insert(codec, ssrc) {
            if alt != ssrc {
                tracing::debug!(?codec, alt, neu = ssrc, "SSRC-Zuordnung ersetzt");
            }
        }
    }

    /// Aktuell zugeordnete SSRC eines Codecs
    pub fn ssrc_for(&self, codec: Codec) -> Option<u32> {
        self.zustand.lock().ssrc_pro_codec.get(&codec).copied()
    }

    pub fn encrypt(
        &self,
        media_type: MediaType,
        ssrc: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> FrameOutcome {
        let mut zustand = self.zustand.lock();
        let passthrough = zustand.passthrough;
        let outcome = match zustand.encryptor.as_mut() {
            Some(encryptor) => encryptor.encrypt(media_type, ssrc, input, output),
            None => FrameOutcome::failure(),
        };
        drop(zustand);

        if let Some(metriken) = &self.metriken {
            metriken.frame_verschluesselt(media_type.label(), ergebnis(outcome, passthrough));
        }
        outcome
    }

    /// Obere Schranke fuer die Ausgabe von `encrypt`.
    ///
    /// Nach der Freigabe gibt es keinen Encryptor mehr; dann wird
    /// `frame_size` gemeldet.
    pub fn max_ciphertext_size(&self, media_type: MediaType, frame_size: usize) -> usize {
        match self.zustand.lock().encryptor.as_ref() {
            Some(encryptor) => encryptor.max_ciphertext_size(media_type, frame_size),
            None => frame_size,
        }
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        match self.zustand.lock().encryptor.as_ref() {
            Some(encryptor) => encryptor.protocol_version(),
            None => ProtocolVersion::DISABLED,
        }
    }

    pub fn ist_passthrough(&self) -> bool {
        self.zustand.lock().passthrough
    }

    /// Gibt den Encryptor frei; weitere Aufrufe sind wirkungslos
    pub fn freigeben(&self) {
        if let Some(encryptor) = self.zustand.lock().encryptor.take() {
            encryptor.close();
        }
    }

    pub fn ist_freigegeben(&self) -> bool {
        self.zustand.lock().encryptor.is_none()
    }
}

pub(crate) fn ergebnis(outcome: FrameOutcome, passthrough: bool) -> FrameErgebnis {
    match (outcome.ist_erfolg(), passthrough) {
        (false, _) => FrameErgebnis::Fehler,
        (true, true) => FrameErgebnis::Passthrough,
        (true, false) => FrameErgebnis::Erfolg,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
