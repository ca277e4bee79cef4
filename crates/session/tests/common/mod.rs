//! Gemeinsame Test-Hilfen: geskriptete Gruppen-Engine mit Handle-Zaehlern
//!
//! Die Fake-Engine spielt das MLS-Protokoll nicht nach. Sie fuehrt eine
//! Epoch-Nummer und liefert pro (Epoch, Mitglied) einen deterministischen
//! `HashRatchet`, sodass der echte Software-Transform Ende-zu-Ende laeuft.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use voicelock_core::{ChannelId, Codec, MediaType, ProtocolVersion, UserId};
use voicelock_crypto::{
    CommitOutcome, CommitWelcome, CryptoEngine, CryptoError, CryptoResult, EngineResource,
    FrameDecryptor, FrameEncryptor, FrameOutcome, GroupSession, HashRatchet, SecretBytes,
    SharedRatchet, SoftDecryptor, SoftEncryptor,
};
use voicelock_observability::LogSinkRegistry;
use voicelock_session::{AusgangsPuffer, E2eeSession, SessionConfig, SessionFactory};

pub const SELBST: UserId = UserId(1000);
pub const KANAL: ChannelId = ChannelId(77);
pub const SSRC: u32 = 0x5EED;
/// Diagnosezeile der Fake-Engine fuer abgelehnte Commits
pub const COMMIT_VERWORFEN: &str = "Commit nicht angewendet";

// ---------------------------------------------------------------------------
// Zaehler
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Zaehler {
    erstellt: AtomicUsize,
    freigegeben: AtomicUsize,
}

impl Zaehler {
    fn erstellen(&self) {
        self.erstellt.fetch_add(1, Ordering::SeqCst);
    }

    fn freigeben(&self) {
        self.freigegeben.fetch_add(1, Ordering::SeqCst);
    }

    pub fn erstellt(&self) -> usize {
        self.erstellt.load(Ordering::SeqCst)
    }

    pub fn freigegeben(&self) -> usize {
        self.freigegeben.load(Ordering::SeqCst)
    }

    pub fn lebend(&self) -> usize {
        self.erstellt() - self.freigegeben()
    }
}

#[derive(Debug, Default)]
pub struct Statistik {
    pub gruppen: Zaehler,
    pub encryptoren: Zaehler,
    pub decryptoren: Zaehler,
    /// Zweite Freigabe derselben Ressource
    pub doppelt_freigegeben: AtomicUsize,
}

impl Statistik {
    pub fn lebend(&self) -> usize {
        self.gruppen.lebend() + self.encryptoren.lebend() + self.decryptoren.lebend()
    }

    pub fn doppelt(&self) -> usize {
        self.doppelt_freigegeben.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Skript
// ---------------------------------------------------------------------------

/// Steuert die Antworten der Fake-Gruppe
#[derive(Debug)]
pub struct Skript {
    pub commit: Mutex<CommitOutcome>,
    pub welcome_beitritt: AtomicBool,
    pub engine_fault_bei_commit: AtomicBool,
    /// Nach `reset` sofort Ratchets liefern (Gruppe aus einem Mitglied)
    pub ratchets_nach_reset: AtomicBool,
    pub encryptor_fehler: AtomicBool,
    pub proposals_ergebnis: Mutex<Option<CommitWelcome>>,
}

impl Default for Skript {
    fn default() -> Self {
        Self {
            commit: Mutex::new(CommitOutcome::Success { joined: true }),
            welcome_beitritt: AtomicBool::new(true),
            engine_fault_bei_commit: AtomicBool::new(false),
            ratchets_nach_reset: AtomicBool::new(true),
            encryptor_fehler: AtomicBool::new(false),
            proposals_ergebnis: Mutex::new(Some(CommitWelcome {
                commit: b"commit".to_vec(),
                welcome: Some(b"welcome".to_vec()),
            })),
        }
    }
}

impl Skript {
    pub fn commit_antwort(&self, outcome: CommitOutcome) {
        *self.commit.lock() = outcome;
    }

    pub fn setzen(flag: &AtomicBool, wert: bool) {
        flag.store(wert, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Gruppen-Sicht
// ---------------------------------------------------------------------------

/// Von aussen beobachtbarer Zustand der zuletzt erzeugten Fake-Gruppe
#[derive(Debug, Default, Clone)]
pub struct GruppenSicht {
    pub version: ProtocolVersion,
    pub channel: Option<ChannelId>,
    pub self_user: Option<UserId>,
    pub epoch: u64,
    pub etabliert: bool,
    pub externer_sender: Option<Vec<u8>>,
    pub erkannte_mitglieder: Vec<UserId>,
    pub aufrufe: Vec<&'static str>,
}

/// Deterministischer Ratchet eines Mitglieds in einer Epoch
pub fn ratchet_fuer(epoch: u64, user_id: UserId) -> SharedRatchet {
    let mut seed = vec![0xA5u8; 32];
    seed[..8].copy_from_slice(&epoch.to_le_bytes());
    seed[8..16].copy_from_slice(&user_id.inner().to_le_bytes());
    HashRatchet::shared(SecretBytes::new(seed))
}

struct FakeGruppe {
    sicht: Arc<Mutex<GruppenSicht>>,
    skript: Arc<Skript>,
    statistik: Arc<Statistik>,
    freigegeben: bool,
}

impl EngineResource for FakeGruppe {
    fn release(&mut self) {
        if self.freigegeben {
            self.statistik.doppelt_freigegeben.fetch_add(1, Ordering::SeqCst);
            return;
        }
        self.freigegeben = true;
        self.statistik.gruppen.freigeben();
    }
}

impl GroupSession for FakeGruppe {
    fn init(
        &mut self,
        version: ProtocolVersion,
        group_id: ChannelId,
        self_user_id: UserId,
    ) -> CryptoResult<()> {
        let mut sicht = self.sicht.lock();
        sicht.version = version;
        sicht.channel = Some(group_id);
        sicht.self_user = Some(self_user_id);
        sicht.aufrufe.push("init");
        Ok(())
    }

    fn reset(&mut self) -> CryptoResult<()> {
        let mut sicht = self.sicht.lock();
        sicht.epoch += 1;
        sicht.etabliert = self.skript.ratchets_nach_reset.load(Ordering::SeqCst);
        sicht.aufrufe.push("reset");
        Ok(())
    }

    fn protocol_version(&self) -> ProtocolVersion {
        self.sicht.lock().version
    }

    fn set_protocol_version(&mut self, version: ProtocolVersion) -> CryptoResult<()> {
        let mut sicht = self.sicht.lock();
        sicht.version = version;
        sicht.aufrufe.push("set_protocol_version");
        Ok(())
    }

    fn set_external_sender(&mut self, package: &[u8]) -> CryptoResult<()> {
        let mut sicht = self.sicht.lock();
        sicht.externer_sender = Some(package.to_vec());
        sicht.aufrufe.push("set_external_sender");
        Ok(())
    }

    fn process_proposals(
        &mut self,
        _proposals: &[u8],
        recognized_user_ids: &[UserId],
    ) -> CryptoResult<Option<CommitWelcome>> {
        let mut sicht = self.sicht.lock();
        sicht.erkannte_mitglieder = recognized_user_ids.to_vec();
        sicht.aufrufe.push("process_proposals");
        Ok(self.skript.proposals_ergebnis.lock().clone())
    }

    fn process_commit(&mut self, _commit: &[u8]) -> CryptoResult<CommitOutcome> {
        if self.skript.engine_fault_bei_commit.load(Ordering::SeqCst) {
            return Err(CryptoError::engine("MLS-Zustand korrupt"));
        }
        let outcome = *self.skript.commit.lock();
        let mut sicht = self.sicht.lock();
        sicht.aufrufe.push("process_commit");
        if outcome == (CommitOutcome::Success { joined: true }) {
            sicht.epoch += 1;
            sicht.etabliert = true;
        } else if outcome == (CommitOutcome::Success { joined: false }) {
            // Wie eine native Engine: Diagnosezeile ueber den globalen Sink
            LogSinkRegistry::global().dispatch(2, file!(), line!(), COMMIT_VERWORFEN);
        }
        Ok(outcome)
    }

    fn process_welcome(
        &mut self,
        _welcome: &[u8],
        recognized_user_ids: &[UserId],
    ) -> CryptoResult<bool> {
        let beitritt = self.skript.welcome_beitritt.load(Ordering::SeqCst);
        let mut sicht = self.sicht.lock();
        sicht.erkannte_mitglieder = recognized_user_ids.to_vec();
        sicht.aufrufe.push("process_welcome");
        if beitritt {
            sicht.epoch += 1;
            sicht.etabliert = true;
        }
        Ok(beitritt)
    }

    fn key_ratchet(&self, user_id: UserId) -> Option<SharedRatchet> {
        let sicht = self.sicht.lock();
        if sicht.etabliert && !sicht.version.ist_deaktiviert() {
            Some(ratchet_fuer(sicht.epoch, user_id))
        } else {
            None
        }
    }

    fn marshalled_key_package(&mut self) -> CryptoResult<Vec<u8>> {
        let mut sicht = self.sicht.lock();
        sicht.aufrufe.push("marshalled_key_package");
        let selbst = sicht.self_user.map_or(0, |u| u.inner());
        Ok(format!("key-package:{selbst}").into_bytes())
    }
}

// ---------------------------------------------------------------------------
// Zaehlende Frame-Transforms
// ---------------------------------------------------------------------------

struct ZaehlenderEncryptor {
    inner: SoftEncryptor,
    statistik: Arc<Statistik>,
    freigegeben: bool,
}

impl EngineResource for ZaehlenderEncryptor {
    fn release(&mut self) {
        if self.freigegeben {
            self.statistik.doppelt_freigegeben.fetch_add(1, Ordering::SeqCst);
            return;
        }
        self.freigegeben = true;
        self.inner.release();
        self.statistik.encryptoren.freigeben();
    }
}

impl FrameEncryptor for ZaehlenderEncryptor {
    fn set_passthrough_mode(&mut self, enabled: bool) {
        self.inner.set_passthrough_mode(enabled);
    }

    fn set_key_ratchet(&mut self, ratchet: Option<SharedRatchet>) {
        self.inner.set_key_ratchet(ratchet);
    }

    fn assign_ssrc_to_codec(&mut self, ssrc: u32, codec: Codec) {
        self.inner.assign_ssrc_to_codec(ssrc, codec);
    }

    fn protocol_version(&self) -> ProtocolVersion {
        self.inner.protocol_version()
    }

    fn max_ciphertext_size(&self, media_type: MediaType, frame_size: usize) -> usize {
        self.inner.max_ciphertext_size(media_type, frame_size)
    }

    fn encrypt(
        &mut self,
        media_type: MediaType,
        ssrc: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> FrameOutcome {
        self.inner.encrypt(media_type, ssrc, input, output)
    }
}

struct ZaehlenderDecryptor {
    inner: SoftDecryptor,
    statistik: Arc<Statistik>,
    freigegeben: bool,
}

impl EngineResource for ZaehlenderDecryptor {
    fn release(&mut self) {
        if self.freigegeben {
            self.statistik.doppelt_freigegeben.fetch_add(1, Ordering::SeqCst);
            return;
        }
        self.freigegeben = true;
        self.inner.release();
        self.statistik.decryptoren.freigeben();
    }
}

impl FrameDecryptor for ZaehlenderDecryptor {
    fn set_passthrough_mode(&mut self, enabled: bool) {
        self.inner.set_passthrough_mode(enabled);
    }

    fn set_key_ratchet(&mut self, ratchet: Option<SharedRatchet>) {
        self.inner.set_key_ratchet(ratchet);
    }

    fn max_plaintext_size(&self, media_type: MediaType, frame_size: usize) -> usize {
        self.inner.max_plaintext_size(media_type, frame_size)
    }

    fn decrypt(&mut self, media_type: MediaType, input: &[u8], output: &mut [u8]) -> FrameOutcome {
        self.inner.decrypt(media_type, input, output)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeEngine {
    pub statistik: Arc<Statistik>,
    pub skript: Arc<Skript>,
    aktuelle_gruppe: Mutex<Arc<Mutex<GruppenSicht>>>,
}

impl FakeEngine {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Schnappschuss der zuletzt erzeugten Gruppe
    pub fn gruppe(&self) -> GruppenSicht {
        self.aktuelle_gruppe.lock().lock().clone()
    }
}

impl CryptoEngine for FakeEngine {
    fn create_group_session(&self) -> CryptoResult<Box<dyn GroupSession>> {
        let sicht = Arc::new(Mutex::new(GruppenSicht::default()));
        *self.aktuelle_gruppe.lock() = Arc::clone(&sicht);
        self.statistik.gruppen.erstellen();
        Ok(Box::new(FakeGruppe {
            sicht,
            skript: Arc::clone(&self.skript),
            statistik: Arc::clone(&self.statistik),
            freigegeben: false,
        }))
    }

    fn create_encryptor(&self) -> CryptoResult<Box<dyn FrameEncryptor>> {
        if self.skript.encryptor_fehler.load(Ordering::SeqCst) {
            return Err(CryptoError::engine("Encryptor nicht verfuegbar"));
        }
        self.statistik.encryptoren.erstellen();
        Ok(Box::new(ZaehlenderEncryptor {
            inner: SoftEncryptor::new(),
            statistik: Arc::clone(&self.statistik),
            freigegeben: false,
        }))
    }

    fn create_decryptor(&self) -> CryptoResult<Box<dyn FrameDecryptor>> {
        self.statistik.decryptoren.erstellen();
        Ok(Box::new(ZaehlenderDecryptor {
            inner: SoftDecryptor::new(),
            statistik: Arc::clone(&self.statistik),
            freigegeben: false,
        }))
    }
}

// ---------------------------------------------------------------------------
// Aufbau und Frame-Hilfen
// ---------------------------------------------------------------------------

pub struct Aufbau {
    pub engine: Arc<FakeEngine>,
    pub ausgang: Arc<AusgangsPuffer>,
    pub session: E2eeSession,
}

pub fn aufbau_mit(config: SessionConfig) -> Aufbau {
    let engine = FakeEngine::neu();
    let ausgang = Arc::new(AusgangsPuffer::neu());
    let factory = SessionFactory::neu(engine.clone(), config).unwrap();
    let session = factory
        .create_session(ausgang.clone(), SELBST, KANAL)
        .unwrap();
    Aufbau {
        engine,
        ausgang,
        session,
    }
}

pub fn aufbau() -> Aufbau {
    aufbau_mit(SessionConfig::default())
}

/// Verschluesselt `plaintext` so, wie ein Mitglied mit `ratchet` es senden wuerde
pub fn frame_von(ratchet: SharedRatchet, plaintext: &[u8]) -> Vec<u8> {
    let mut enc = SoftEncryptor::new();
    enc.assign_ssrc_to_codec(1, Codec::Opus);
    enc.set_key_ratchet(Some(ratchet));
    let mut out = vec![0u8; enc.max_ciphertext_size(MediaType::Audio, plaintext.len())];
    let outcome = enc.encrypt(MediaType::Audio, 1, plaintext, &mut out);
    assert!(outcome.ist_erfolg());
    out.truncate(outcome.bytes_written);
    out
}

/// Entschluesselt einen Frame mit `ratchet`; `None` bei Fehlschlag
pub fn klartext_von(ratchet: SharedRatchet, frame: &[u8]) -> Option<Vec<u8>> {
    let mut dec = SoftDecryptor::new();
    dec.set_key_ratchet(Some(ratchet));
    let mut out = vec![0u8; frame.len()];
    let outcome = dec.decrypt(MediaType::Audio, frame, &mut out);
    outcome.ist_erfolg().then(|| {
        out.truncate(outcome.bytes_written);
        out
    })
}
