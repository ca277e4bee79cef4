//! Capability-Schnittstellen der Krypto-Engine
//!
//! Die Engine wird konsumiert, nicht nachgebaut: das MLS-Gruppenprotokoll
//! (Proposals, Commits, Welcomes, Key-Packages) steckt vollstaendig hinter
//! [`GroupSession`]. Fuer den Frame-Transform bringt dieses Crate eine eigene
//! Software-Implementierung mit ([`SoftEncryptor`], [`SoftDecryptor`]), die eine
//! native Engine ersetzen kann.
//!
//! Jede Ressource hat einen expliziten Lebenszyklus: erzeugt wird sie ueber
//! [`CryptoEngine`], freigegeben genau einmal ueber [`EngineResource::release`]
//! (das uebernimmt [`crate::CryptoHandle`]).

use voicelock_core::{ChannelId, Codec, MediaType, ProtocolVersion, UserId};

use crate::error::CryptoResult;
use crate::frame::{SoftDecryptor, SoftEncryptor};
use crate::ratchet::SharedRatchet;
use crate::types::FrameOutcome;

/// Eine Engine-Ressource mit manueller Freigabe
pub trait EngineResource: Send {
    /// Gibt die Ressource frei. Wird hoechstens einmal aufgerufen; danach
    /// wird das Objekt nicht mehr benutzt.
    fn release(&mut self);
}

// ---------------------------------------------------------------------------
// Gruppen-Session
// ---------------------------------------------------------------------------

/// Ergebnis der Commit-Verarbeitung durch die Engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Der Commit hat den eigenen Gruppenzustand nicht veraendert
    Ignored,
    /// Der Commit wurde angewendet; `joined` meldet ob wir danach Mitglied sind
    Success { joined: bool },
}

/// Von der Engine erzeugtes Commit/Welcome-Paar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitWelcome {
    pub commit: Vec<u8>,
    pub welcome: Option<Vec<u8>>,
}

impl CommitWelcome {
    /// Serialisiert fuer den Transport: `commit || welcome`
    pub fn marshal(&self) -> Vec<u8> {
        let welcome_len = self.welcome.as_ref().map_or(0, Vec::len);
        let mut out = Vec::with_capacity(self.commit.len() + welcome_len);
        out.extend_from_slice(&self.commit);
        if let Some(welcome) = &self.welcome {
            out.extend_from_slice(welcome);
        }
        out
    }
}

/// MLS-Gruppen-Session der Engine
pub trait GroupSession: EngineResource {
    /// Initialisiert die Session fuer Version, Gruppe und eigenes Mitglied
    fn init(
        &mut self,
        version: ProtocolVersion,
        group_id: ChannelId,
        self_user_id: UserId,
    ) -> CryptoResult<()>;

    /// Verwirft den gesamten Gruppenzustand
    fn reset(&mut self) -> CryptoResult<()>;

    fn protocol_version(&self) -> ProtocolVersion;

    fn set_protocol_version(&mut self, version: ProtocolVersion) -> CryptoResult<()>;

    /// Setzt das Paket des externen Senders (Vertrauensanker fuer Commits/Welcomes)
    fn set_external_sender(&mut self, package: &[u8]) -> CryptoResult<()>;

    /// Verarbeitet Proposals; `None` wenn kein Commit noetig ist
    fn process_proposals(
        &mut self,
        proposals: &[u8],
        recognized_user_ids: &[UserId],
    ) -> CryptoResult<Option<CommitWelcome>>;

    fn process_commit(&mut self, commit: &[u8]) -> CryptoResult<CommitOutcome>;

    /// Verarbeitet ein Welcome; `true` wenn wir der Gruppe beigetreten sind
    fn process_welcome(
        &mut self,
        welcome: &[u8],
        recognized_user_ids: &[UserId],
    ) -> CryptoResult<bool>;

    /// Key-Ratchet eines Mitglieds im aktuellen Gruppenzustand
    fn key_ratchet(&self, user_id: UserId) -> Option<SharedRatchet>;

    /// Serialisiertes Key-Package des eigenen Mitglieds
    fn marshalled_key_package(&mut self) -> CryptoResult<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// Frame-Transform
// ---------------------------------------------------------------------------

/// Ausgehender Frame-Encryptor
pub trait FrameEncryptor: EngineResource {
    fn set_passthrough_mode(&mut self, enabled: bool);

    fn set_key_ratchet(&mut self, ratchet: Option<SharedRatchet>);

    fn assign_ssrc_to_codec(&mut self, ssrc: u32, codec: Codec);

    fn protocol_version(&self) -> ProtocolVersion;

    /// Obere Schranke der Ausgabegroesse fuer `encrypt`
    fn max_ciphertext_size(&self, media_type: MediaType, frame_size: usize) -> usize;

    fn encrypt(
        &mut self,
        media_type: MediaType,
        ssrc: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> FrameOutcome;
}

/// Eingehender Frame-Decryptor (einer pro Mitglied)
pub trait FrameDecryptor: EngineResource {
    fn set_passthrough_mode(&mut self, enabled: bool);

    fn set_key_ratchet(&mut self, ratchet: Option<SharedRatchet>);

    /// Obere Schranke der Ausgabegroesse fuer `decrypt`
    fn max_plaintext_size(&self, media_type: MediaType, frame_size: usize) -> usize;

    fn decrypt(&mut self, media_type: MediaType, input: &[u8], output: &mut [u8]) -> FrameOutcome;
}

// ---------------------------------------------------------------------------
// Engine-Fabrik
// ---------------------------------------------------------------------------

/// Erzeugt Engine-Ressourcen
pub trait CryptoEngine: Send + Sync {
    /// Hoechste von der Engine unterstuetzte Protokollversion
    fn max_supported_protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion::V1
    }

    fn create_group_session(&self) -> CryptoResult<Box<dyn GroupSession>>;

    fn create_encryptor(&self) -> CryptoResult<Box<dyn FrameEncryptor>> {
        Ok(Box::new(SoftEncryptor::new()))
    }

    fn create_decryptor(&self) -> CryptoResult<Box<dyn FrameDecryptor>> {
        Ok(Box::new(SoftDecryptor::new()))
    }
}
