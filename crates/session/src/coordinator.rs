//! Transition-Coordinator – Zustandsmaschine fuer Protokollversion und Epochs
//!
//! Verarbeitet die MLS-Ereignisse der Gruppe (Proposals, Commits, Welcomes)
//! und die Transition-Opcodes des Gateways. Nach jeder Aenderung des
//! Gruppenzustands verteilt er frische Key-Ratchets an die Decryption-Registry
//! und initialisiert bei Bedarf die Encryption-Pipeline neu.
//!
//! ```text
//! Uninitialisiert -> Bootstrap -> Aktiv(v) -> Aktiv(v') -> ... -> Deaktiviert
//! ```
//!
//! Aufrufe kommen seriell vom Control-Plane-Thread; die Session haelt dafuer
//! einen Lock um den Coordinator. Media-Threads sehen nur Registry und Pipeline.
//! Antworten an die Gruppe landen im Ausgang und werden von der Session erst
//! nach dem Loslassen des Locks zugestellt.

use std::collections::HashMap;
use std::sync::Arc;

use voicelock_core::{ChannelId, ProtocolVersion, TransitionId, UserId};
use voicelock_crypto::{CommitOutcome, CryptoEngine, CryptoHandle, GroupSession};
use voicelock_observability::FrameMetrics;

use crate::callbacks::AusgehendeNachricht;
use crate::error::{SessionError, SessionResult};
use crate::pipeline::EncryptionPipeline;
use crate::registry::DecryptionRegistry;

/// Einziges Epoch-Tag, das eine Aktion ausloest
pub const ERSTE_EPOCH: &str = "1";

/// Ergebnis eines empfangenen Commits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    /// Commit hat den eigenen Gruppenzustand nicht veraendert
    Ignored,
    /// Wir sind Mitglied der neuen Gruppe
    JoinedGroup,
    /// Commit konnte nicht angewendet werden; Key-Package wurde neu gesendet
    NotJoinedGroup,
}

/// Vorbereitete Transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransition {
    pub protocol_version: ProtocolVersion,
}

pub struct TransitionCoordinator {
    engine: Arc<dyn CryptoEngine>,
    self_user_id: UserId,
    channel_id: ChannelId,
    /// `None` nach der Freigabe
    group: Option<CryptoHandle<dyn GroupSession>>,
    /// Nie mit `TransitionId::BOOTSTRAP` belegt
    pending: HashMap<TransitionId, PendingTransition>,
    pipeline: Arc<EncryptionPipeline>,
    registry: Arc<DecryptionRegistry>,
    /// Noch nicht zugestellte Antworten in Sende-Reihenfolge
    ausgang: Vec<AusgehendeNachricht>,
    metriken: Option<FrameMetrics>,
}

impl TransitionCoordinator {
    pub fn neu(
        engine: Arc<dyn CryptoEngine>,
        group: CryptoHandle<dyn GroupSession>,
        self_user_id: UserId,
        channel_id: ChannelId,
        pipeline: Arc<EncryptionPipeline>,
        registry: Arc<DecryptionRegistry>,
        metriken: Option<FrameMetrics>,
    ) -> Self {
        Self {
            engine,
            self_user_id,
            channel_id,
            group: Some(group),
            pending: HashMap::new(),
            pipeline,
            registry,
            ausgang: Vec::new(),
            metriken,
        }
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.group
            .as_ref()
            .map_or(ProtocolVersion::DISABLED, |g| g.protocol_version())
    }

    pub fn pending_transition(&self, transition_id: TransitionId) -> Option<PendingTransition> {
        self.pending.get(&transition_id).copied()
    }

    pub fn ist_freigegeben(&self) -> bool {
        self.group.is_none()
    }

    /// Entnimmt alle seit dem letzten Aufruf angefallenen Antworten
    pub fn ausgang_abholen(&mut self) -> Vec<AusgehendeNachricht> {
        std::mem::take(&mut self.ausgang)
    }

    // -----------------------------------------------------------------------
    // Protokoll-Aushandlung
    // -----------------------------------------------------------------------

    /// Initialisiert die Gruppen-Session fuer die ausgehandelte Version
    pub fn on_select_protocol_ack(&mut self, version: ProtocolVersion) -> SessionResult<()> {
        let (channel_id, self_user_id) = (self.channel_id, self.self_user_id);
        self.group_mut()?.init(version, channel_id, self_user_id)?;
        self.version_melden();
        tracing::info!(
            protocol_version = %version,
            channel = %channel_id,
            "Gruppen-Session initialisiert"
        );
        Ok(())
    }

    /// Merkt sich die Zielversion einer Transition; ueberschreibt einen alten Eintrag
    pub fn prepare_transition(&mut self, transition_id: TransitionId, version: ProtocolVersion) {
        if transition_id.ist_bootstrap() {
            tracing::debug!("Bootstrap-Transition wird nicht vorgemerkt");
            return;
        }
        let alt = self.pending.insert(
            transition_id,
            PendingTransition {
                protocol_version: version,
            },
        );
        if alt.is_some() {
            tracing::debug!(%transition_id, "Vorgemerkte Transition ueberschrieben");
        }
        tracing::debug!(%transition_id, protocol_version = %version, "Transition vorbereitet");
        self.transition_zaehlen("vorbereitet");
    }

    /// Fuehrt eine vorbereitete Transition aus.
    ///
    /// Unbekannte IDs und Transitionen auf die bereits aktive Version sind
    /// wirkungslos, damit wiederholte Aufrufe harmlos bleiben.
    pub fn execute_transition(&mut self, transition_id: TransitionId) -> SessionResult<()> {
        let Some(pending) = self.pending.remove(&transition_id) else {
            tracing::debug!(%transition_id, "Keine vorbereitete Transition, ignoriert");
            return Ok(());
        };

        let ziel = pending.protocol_version;
        let aktuell = self.protocol_version();
        if ziel == aktuell {
            tracing::debug!(%transition_id, protocol_version = %ziel, "Version unveraendert");
            return Ok(());
        }

        if ziel.ist_deaktiviert() {
            self.gruppe_zuruecksetzen()?;
            self.transition_zaehlen("deaktiviert");
        } else {
            self.group_mut()?.set_protocol_version(ziel)?;
            self.encryptor_initialisieren()?;
            self.transition_zaehlen("ausgefuehrt");
        }
        self.version_melden();
        tracing::info!(
            %transition_id,
            alt = %aktuell,
            neu = %ziel,
            "Transition ausgefuehrt"
        );
        Ok(())
    }

    /// Beginnt eine neue Epoch. Nur [`ERSTE_EPOCH`] loest etwas aus.
    pub fn prepare_epoch(&mut self, epoch: &str, version: ProtocolVersion) -> SessionResult<()> {
        if epoch != ERSTE_EPOCH {
            tracing::debug!(epoch, "Epoch ohne Aktion");
            return Ok(());
        }

        {
            let group = self.group_mut()?;
            group.reset()?;
            group.set_protocol_version(version)?;
        }
        self.encryptor_initialisieren()?;
        for user_id in self.registry.member_ids() {
            let ratchet = self.group_ref()?.key_ratchet(user_id);
            self.registry.install_ratchet(user_id, ratchet);
        }
        self.version_melden();
        self.transition_zaehlen("epoch");
        tracing::info!(protocol_version = %version, "Erste Epoch vorbereitet");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // MLS-Nachrichten
    // -----------------------------------------------------------------------

    /// Setzt den Vertrauensanker fuer spaetere Commits/Welcomes
    pub fn on_external_sender(&mut self, package: &[u8]) -> SessionResult<()> {
        self.group_mut()?.set_external_sender(package)?;
        tracing::debug!(bytes = package.len(), "Externer Sender gesetzt");
        Ok(())
    }

    /// Erzeugt aus Proposals ein Commit/Welcome-Paar und sendet es
    pub fn on_proposals(&mut self, proposals: &[u8]) -> SessionResult<()> {
        let mitglieder = self.registry.member_ids();
        let commit_welcome = self.group_mut()?.process_proposals(proposals, &mitglieder)?;
        match commit_welcome {
            Some(cw) => {
                tracing::debug!(
                    commit = cw.commit.len(),
                    welcome = cw.welcome.is_some(),
                    "Commit/Welcome erzeugt"
                );
                self.ausgang.push(AusgehendeNachricht::CommitWelcome(cw.marshal()));
            }
            None => tracing::debug!("Proposals ohne Commit"),
        }
        Ok(())
    }

    pub fn on_commit(
        &mut self,
        transition_id: TransitionId,
        commit: &[u8],
    ) -> SessionResult<CommitResult> {
        let outcome = self.group_mut()?.process_commit(commit)?;
        match outcome {
            CommitOutcome::Ignored => {
                self.pending.remove(&transition_id);
                tracing::debug!(%transition_id, "Commit ignoriert");
                Ok(CommitResult::Ignored)
            }
            CommitOutcome::Success { joined: true } => {
                self.gruppenzustand_uebernehmen(transition_id)?;
                Ok(CommitResult::JoinedGroup)
            }
            CommitOutcome::Success { joined: false } => {
                tracing::warn!(%transition_id, "Commit abgelehnt");
                self.ungueltig_melden(transition_id)?;
                Ok(CommitResult::NotJoinedGroup)
            }
        }
    }

    /// Verarbeitet ein Welcome; `true` wenn wir der Gruppe beigetreten sind
    pub fn on_welcome(&mut self, transition_id: TransitionId, welcome: &[u8]) -> SessionResult<bool> {
        let mitglieder = self.registry.member_ids();
        let beigetreten = self.group_mut()?.process_welcome(welcome, &mitglieder)?;
        if beigetreten {
            self.gruppenzustand_uebernehmen(transition_id)?;
        } else {
            tracing::warn!(%transition_id, "Welcome abgelehnt");
            self.ungueltig_melden(transition_id)?;
        }
        Ok(beigetreten)
    }

    // -----------------------------------------------------------------------
    // Freigabe
    // -----------------------------------------------------------------------

    /// Gibt die Gruppen-Session frei; weitere Aufrufe sind wirkungslos
    pub fn freigeben(&mut self) {
        self.pending.clear();
        if let Some(group) = self.group.take() {
            group.close();
        }
    }

    // -----------------------------------------------------------------------
    // Interne Pfade
    // -----------------------------------------------------------------------

    /// Gemeinsamer Abschluss nach erfolgreichem Commit oder Welcome
    fn gruppenzustand_uebernehmen(&mut self, transition_id: TransitionId) -> SessionResult<()> {
        for user_id in self.registry.member_ids() {
            if user_id == self.self_user_id {
                continue;
            }
            let ratchet = self.group_ref()?.key_ratchet(user_id);
            self.registry.install_ratchet(user_id, ratchet);
        }

        if transition_id.ist_bootstrap() {
            self.encryptor_initialisieren()?;
            self.transition_zaehlen("bootstrap");
            tracing::info!("Bootstrap-Transition abgeschlossen");
            return Ok(());
        }

        match self.pending.remove(&transition_id) {
            Some(pending) => {
                self.group_mut()?.set_protocol_version(pending.protocol_version)?;
                self.version_melden();
            }
            None => tracing::warn!(
                %transition_id,
                "Keine vorbereitete Version, behalte aktuelle Protokollversion"
            ),
        }

        let version = self.protocol_version();
        self.pending.insert(
            transition_id,
            PendingTransition {
                protocol_version: version,
            },
        );
        self.ausgang
            .push(AusgehendeNachricht::ReadyForTransition(transition_id));
        tracing::debug!(%transition_id, protocol_version = %version, "Bereit fuer Transition");
        Ok(())
    }

    fn ungueltig_melden(&mut self, transition_id: TransitionId) -> SessionResult<()> {
        self.ausgang
            .push(AusgehendeNachricht::InvalidCommitWelcome(transition_id));
        if let Some(metriken) = &self.metriken {
            metriken.invalid_commit_welcome_total.inc();
        }
        let key_package = self.group_mut()?.marshalled_key_package()?;
        self.ausgang.push(AusgehendeNachricht::KeyPackage(key_package));
        Ok(())
    }

    /// Initialisiert den Encryptor mit dem aktuellen eigenen Ratchet
    fn encryptor_initialisieren(&mut self) -> SessionResult<()> {
        let ratchet = self.group_ref()?.key_ratchet(self.self_user_id);
        if ratchet.is_none() {
            tracing::debug!("Kein eigener Ratchet, Encryptor verwirft Frames");
        }
        self.pipeline.initialize(ratchet);
        Ok(())
    }

    /// Ersetzt die Gruppen-Session durch eine frische und verwirft alle Ratchets
    fn gruppe_zuruecksetzen(&mut self) -> SessionResult<()> {
        let mut frisch = CryptoHandle::group_session(&*self.engine)?;
        frisch.init(ProtocolVersion::DISABLED, self.channel_id, self.self_user_id)?;
        if let Some(alt) = self.group.replace(frisch) {
            alt.close();
        }
        self.registry.clear_ratchets();
        self.pipeline.pass_through();
        tracing::info!("E2EE deaktiviert, Gruppenzustand zurueckgesetzt");
        Ok(())
    }

    fn group_ref(&self) -> SessionResult<&CryptoHandle<dyn GroupSession>> {
        self.group.as_ref().ok_or(SessionError::Zerstoert)
    }

    fn group_mut(&mut self) -> SessionResult<&mut CryptoHandle<dyn GroupSession>> {
        self.group.as_mut().ok_or(SessionError::Zerstoert)
    }

    fn version_melden(&self) {
        if let Some(metriken) = &self.metriken {
            metriken
                .protocol_version
                .set(i64::from(self.protocol_version().0));
        }
    }

    fn transition_zaehlen(&self, art: &str) {
        if let Some(metriken) = &self.metriken {
            metriken.transition(art);
        }
    }
}
