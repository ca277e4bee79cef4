//! E2EE-Session eines Voice-Calls
//!
//! Buendelt Coordinator, Decryption-Registry und Encryption-Pipeline hinter
//! einer `&self`-API. Control-Plane-Aufrufe serialisieren sich am Lock des
//! Coordinators; `encrypt`/`decrypt` laufen daran vorbei und lesen nur den
//! aktuell installierten Schluessel.
//!
//! Meldet die Engine einen fatalen Fehler, nimmt die Session danach keine
//! Control-Plane-Aufrufe mehr an (`SessionError::Unbrauchbar`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use voicelock_core::{
    ChannelId, Codec, MediaType, ProtocolVersion, SessionEvent, TransitionId, UserId,
};
use voicelock_crypto::FrameOutcome;
use voicelock_observability::FrameMetrics;

use crate::callbacks::ProtocolCallbacks;
use crate::config::SessionConfig;
use crate::coordinator::{CommitResult, PendingTransition, TransitionCoordinator};
use crate::error::{SessionError, SessionResult};
use crate::pipeline::EncryptionPipeline;
use crate::registry::DecryptionRegistry;

pub struct E2eeSession {
    self_user_id: UserId,
    channel_id: ChannelId,
    max_protocol_version: ProtocolVersion,
    nicht_audio_faktor: usize,
    pipeline: Arc<EncryptionPipeline>,
    registry: Arc<DecryptionRegistry>,
    coordinator: Mutex<TransitionCoordinator>,
    callbacks: Arc<dyn ProtocolCallbacks>,
    unbrauchbar: AtomicBool,
    zerstoert: AtomicBool,
    metriken: Option<FrameMetrics>,
}

impl E2eeSession {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn neu(
        self_user_id: UserId,
        channel_id: ChannelId,
        max_protocol_version: ProtocolVersion,
        config: &SessionConfig,
        pipeline: Arc<EncryptionPipeline>,
        registry: Arc<DecryptionRegistry>,
        coordinator: TransitionCoordinator,
        callbacks: Arc<dyn ProtocolCallbacks>,
        metriken: Option<FrameMetrics>,
    ) -> Self {
        Self {
            self_user_id,
            channel_id,
            max_protocol_version,
            nicht_audio_faktor: config.session.nicht_audio_faktor,
            pipeline,
            registry,
            coordinator: Mutex::new(coordinator),
            callbacks,
            unbrauchbar: AtomicBool::new(false),
            zerstoert: AtomicBool::new(false),
            metriken,
        }
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn self_user_id(&self) -> UserId {
        self.self_user_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Aktuelle Protokollversion der Gruppen-Session
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.coordinator.lock().protocol_version()
    }

    /// Hoechste Version, die diese Session aushandeln darf
    pub fn max_protocol_version(&self) -> ProtocolVersion {
        self.max_protocol_version
    }

    pub fn pending_transition(&self, transition_id: TransitionId) -> Option<PendingTransition> {
        self.coordinator.lock().pending_transition(transition_id)
    }

    pub fn member_ids(&self) -> Vec<UserId> {
        self.registry.member_ids()
    }

    /// `Some(true)` wenn der Decryptor des Mitglieds im Passthrough ist
    pub fn member_passthrough(&self, user_id: UserId) -> Option<bool> {
        self.registry.ist_passthrough(user_id)
    }

    pub fn encryptor_passthrough(&self) -> bool {
        self.pipeline.ist_passthrough()
    }

    pub fn metriken(&self) -> Option<&FrameMetrics> {
        self.metriken.as_ref()
    }

    pub fn ist_unbrauchbar(&self) -> bool {
        self.unbrauchbar.load(Ordering::Acquire)
    }

    pub fn ist_zerstoert(&self) -> bool {
        self.zerstoert.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Mitglieder
    // -----------------------------------------------------------------------

    pub fn add_member(&self, user_id: UserId) -> SessionResult<()> {
        self.pruefen()?;
        let ergebnis = self.registry.add_member(user_id);
        self.fatal_merken(ergebnis)
    }

    /// Entfernt ein Mitglied; unbekannte IDs sind kein Fehler
    pub fn remove_member(&self, user_id: UserId) -> SessionResult<()> {
        self.pruefen()?;
        if !self.registry.remove_member(user_id) {
            tracing::debug!(user_id = %user_id, "Unbekanntes Mitglied, nichts zu entfernen");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Frames
    // -----------------------------------------------------------------------

    /// Ordnet die eigene SSRC einem Codec zu
    pub fn assign_ssrc_to_codec(&self, codec: Codec, ssrc: u32) {
        if codec == Codec::Unknown {
            tracing::debug!(ssrc, "SSRC ohne bekannten Codec ignoriert");
            return;
        }
        self.pipeline.assign_transport_id(codec, ssrc);
    }

    /// Puffergroesse fuer `encrypt`. Nur Audio hat eine genaue Schranke.
    pub fn max_encrypted_frame_size(&self, media_type: MediaType, frame_size: usize) -> usize {
        match media_type {
            MediaType::Audio => self.pipeline.max_ciphertext_size(media_type, frame_size),
            MediaType::Video => frame_size.saturating_mul(self.nicht_audio_faktor),
        }
    }

    /// Puffergroesse fuer `decrypt`; unbekannte Mitglieder bekommen die
    /// grosszuegige Schranke statt eines Fehlers.
    pub fn max_decrypted_frame_size(
        &self,
        media_type: MediaType,
        user_id: UserId,
        frame_size: usize,
    ) -> usize {
        let fallback = frame_size.saturating_mul(self.nicht_audio_faktor);
        if media_type != MediaType::Audio {
            return fallback;
        }
        self.registry
            .max_plaintext_size(user_id, media_type, frame_size)
            .unwrap_or(fallback)
    }

    /// Verschluesselt einen ausgehenden Frame; nach Engine-Fehler oder
    /// Zerstoerung immer `Failure`.
    pub fn encrypt(
        &self,
        media_type: MediaType,
        ssrc: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> FrameOutcome {
        if self.pruefen().is_err() {
            return FrameOutcome::failure();
        }
        self.pipeline.encrypt(media_type, ssrc, input, output)
    }

    pub fn encrypt_opus(&self, ssrc: u32, input: &[u8], output: &mut [u8]) -> FrameOutcome {
        self.encrypt(MediaType::Audio, ssrc, input, output)
    }

    pub fn decrypt(
        &self,
        user_id: UserId,
        media_type: MediaType,
        input: &[u8],
        output: &mut [u8],
    ) -> SessionResult<FrameOutcome> {
        self.pruefen()?;
        self.registry.decrypt(user_id, media_type, input, output)
    }

    pub fn decrypt_opus(
        &self,
        user_id: UserId,
        input: &[u8],
        output: &mut [u8],
    ) -> SessionResult<FrameOutcome> {
        self.decrypt(user_id, MediaType::Audio, input, output)
    }

    // -----------------------------------------------------------------------
    // Protokoll
    // -----------------------------------------------------------------------

    /// Initialisiert die Gruppen-Session mit der ausgehandelten Version
    pub fn on_select_protocol_ack(&self, version: ProtocolVersion) -> SessionResult<()> {
        let version = if version > self.max_protocol_version {
            tracing::warn!(
                angefragt = %version,
                maximum = %self.max_protocol_version,
                "Protokollversion ueber Maximum, begrenzt"
            );
            self.max_protocol_version
        } else {
            version
        };
        self.steuern(|c| c.on_select_protocol_ack(version))
    }

    pub fn prepare_transition(
        &self,
        transition_id: TransitionId,
        version: ProtocolVersion,
    ) -> SessionResult<()> {
        self.steuern(|c| {
            c.prepare_transition(transition_id, version);
            Ok(())
        })
    }

    pub fn execute_transition(&self, transition_id: TransitionId) -> SessionResult<()> {
        self.steuern(|c| c.execute_transition(transition_id))
    }

    pub fn prepare_epoch(&self, epoch: &str, version: ProtocolVersion) -> SessionResult<()> {
        self.steuern(|c| c.prepare_epoch(epoch, version))
    }

    pub fn on_external_sender(&self, package: &[u8]) -> SessionResult<()> {
        self.steuern(|c| c.on_external_sender(package))
    }

    pub fn on_proposals(&self, proposals: &[u8]) -> SessionResult<()> {
        self.steuern(|c| c.on_proposals(proposals))
    }

    pub fn on_commit(
        &self,
        transition_id: TransitionId,
        commit: &[u8],
    ) -> SessionResult<CommitResult> {
        self.steuern(|c| c.on_commit(transition_id, commit))
    }

    pub fn on_welcome(&self, transition_id: TransitionId, welcome: &[u8]) -> SessionResult<bool> {
        self.steuern(|c| c.on_welcome(transition_id, welcome))
    }

    /// Leitet ein eingehendes Ereignis an die passende Operation weiter
    pub fn handle_event(&self, event: &SessionEvent) -> SessionResult<()> {
        tracing::trace!(event = event.name(), "Ereignis empfangen");
        match event {
            SessionEvent::MitgliedBeigetreten { user_id } => self.add_member(*user_id),
            SessionEvent::MitgliedVerlassen { user_id } => self.remove_member(*user_id),
            SessionEvent::SsrcZugewiesen { codec, ssrc } => {
                self.assign_ssrc_to_codec(*codec, *ssrc);
                Ok(())
            }
            SessionEvent::ProtokollAck { protocol_version } => {
                self.on_select_protocol_ack(*protocol_version)
            }
            SessionEvent::TransitionVorbereiten {
                transition_id,
                protocol_version,
            } => self.prepare_transition(*transition_id, *protocol_version),
            SessionEvent::TransitionAusfuehren { transition_id } => {
                self.execute_transition(*transition_id)
            }
            SessionEvent::EpochVorbereiten {
                epoch,
                protocol_version,
            } => self.prepare_epoch(epoch, *protocol_version),
            SessionEvent::ExternerSender { paket } => self.on_external_sender(paket),
            SessionEvent::Proposals { proposals } => self.on_proposals(proposals),
            SessionEvent::Commit {
                transition_id,
                commit,
            } => self.on_commit(*transition_id, commit).map(|_| ()),
            SessionEvent::Welcome {
                transition_id,
                welcome,
            } => self.on_welcome(*transition_id, welcome).map(|_| ()),
        }
    }

    // -----------------------------------------------------------------------
    // Lebenszyklus
    // -----------------------------------------------------------------------

    /// Gibt Encryptor, alle Decryptoren und die Gruppen-Session frei.
    /// Mehrfache Aufrufe sind harmlos.
    pub fn destroy(&self) {
        if self.zerstoert.swap(true, Ordering::AcqRel) {
            return;
        }
        self.pipeline.freigeben();
        self.registry.alle_freigeben();
        self.coordinator.lock().freigeben();
        tracing::info!(
            user_id = %self.self_user_id,
            channel = %self.channel_id,
            "E2EE-Session zerstoert"
        );
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    fn pruefen(&self) -> SessionResult<()> {
        if self.ist_zerstoert() {
            return Err(SessionError::Zerstoert);
        }
        if self.ist_unbrauchbar() {
            return Err(SessionError::Unbrauchbar);
        }
        Ok(())
    }

    /// Fuehrt eine Control-Plane-Operation unter dem Coordinator-Lock aus und
    /// stellt die dabei angefallenen Antworten nach dem Loslassen zu
    fn steuern<T>(
        &self,
        operation: impl FnOnce(&mut TransitionCoordinator) -> SessionResult<T>,
    ) -> SessionResult<T> {
        self.pruefen()?;
        let (ergebnis, ausgang) = {
            let mut coordinator = self.coordinator.lock();
            let ergebnis = operation(&mut coordinator);
            (ergebnis, coordinator.ausgang_abholen())
        };
        let ergebnis = self.fatal_merken(ergebnis);
        for nachricht in &ausgang {
            nachricht.zustellen(&*self.callbacks);
        }
        ergebnis
    }

    fn fatal_merken<T>(&self, ergebnis: SessionResult<T>) -> SessionResult<T> {
        if let Err(e) = &ergebnis {
            if e.ist_fatal() {
                self.unbrauchbar.store(true, Ordering::Release);
                tracing::error!(
                    user_id = %self.self_user_id,
                    channel = %self.channel_id,
                    fehler = %e,
                    "Engine-Fehler, Session unbrauchbar"
                );
            }
        }
        ergebnis
    }
}

impl Drop for E2eeSession {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for E2eeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("E2eeSession")
            .field("self_user_id", &self.self_user_id)
            .field("channel_id", &self.channel_id)
            .field("mitglieder", &self.registry.len())
            .field("unbrauchbar", &self.ist_unbrauchbar())
            .field("zerstoert", &self.ist_zerstoert())
            .finish()
    }
}
