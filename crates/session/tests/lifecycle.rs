//! Integration-Tests fuer Erzeugung, Zerstoerung und Konfiguration

mod common;

use std::io::Write;
use std::sync::Arc;

use common::{aufbau, aufbau_mit, FakeEngine, Skript, COMMIT_VERWORFEN, KANAL, SELBST};
use parking_lot::Mutex;
use voicelock_core::{ProtocolVersion, SessionEvent, TransitionId, UserId};
use voicelock_crypto::{CommitOutcome, FrameStatus};
use voicelock_observability::{LogSeverity, LogSinkRegistry};
use voicelock_session::{
    AusgangsPuffer, AusgehendeNachricht, DuplikatPolicy, SessionConfig, SessionError,
    SessionFactory,
};

#[test]
fn destroy_gibt_alle_handles_genau_einmal_frei() {
    let a = aufbau();
    a.session.on_select_protocol_ack(ProtocolVersion::V1).unwrap();
    for id in 2..6 {
        a.session.add_member(UserId(id)).unwrap();
    }
    a.session.on_commit(TransitionId::BOOTSTRAP, b"commit").unwrap();

    let statistik = &a.engine.statistik;
    assert_eq!(statistik.gruppen.lebend(), 1);
    assert_eq!(statistik.encryptoren.lebend(), 1);
    assert_eq!(statistik.decryptoren.lebend(), 4);

    a.session.destroy();
    assert!(a.session.ist_zerstoert());
    assert_eq!(statistik.lebend(), 0);

    a.session.destroy();
    assert_eq!(statistik.doppelt(), 0);
}

#[test]
fn drop_zerstoert_die_session() {
    let a = aufbau();
    a.session.add_member(UserId(2)).unwrap();
    let statistik = Arc::clone(&a.engine.statistik);
    assert!(statistik.lebend() > 0);

    drop(a.session);
    assert_eq!(statistik.lebend(), 0);
    assert_eq!(statistik.doppelt(), 0);
}

#[test]
fn entfernte_mitglieder_werden_sofort_freigegeben() {
    let a = aufbau();
    a.session.add_member(UserId(2)).unwrap();
    a.session.add_member(UserId(3)).unwrap();
    a.session.remove_member(UserId(2)).unwrap();

    let decryptoren = &a.engine.statistik.decryptoren;
    assert_eq!(decryptoren.erstellt(), 2);
    assert_eq!(decryptoren.freigegeben(), 1);
}

#[test]
fn aufrufe_nach_destroy_melden_zerstoert() {
    let a = aufbau();
    a.session.add_member(UserId(2)).unwrap();
    a.session.destroy();

    assert!(matches!(
        a.session.add_member(UserId(3)),
        Err(SessionError::Zerstoert)
    ));
    assert!(matches!(
        a.session.prepare_transition(TransitionId(1), ProtocolVersion::V1),
        Err(SessionError::Zerstoert)
    ));
    assert!(matches!(
        a.session.on_commit(TransitionId(1), b"commit"),
        Err(SessionError::Zerstoert)
    ));

    let mut out = [0u8; 64];
    let outcome = a.session.encrypt_opus(1, b"frame", &mut out);
    assert_eq!(outcome.status, FrameStatus::Failure);
    assert!(a
        .session
        .decrypt_opus(UserId(2), b"frame", &mut out)
        .is_err());
    assert!(a.session.member_ids().is_empty());
}

#[test]
fn fehlgeschlagener_aufbau_leakt_keine_handles() {
    let engine = FakeEngine::neu();
    Skript::setzen(&engine.skript.encryptor_fehler, true);
    let factory = SessionFactory::neu(engine.clone(), SessionConfig::default()).unwrap();

    let fehler = factory
        .create_session(Arc::new(AusgangsPuffer::neu()), SELBST, KANAL)
        .unwrap_err();
    assert!(matches!(fehler, SessionError::EngineFault(_)));
    assert_eq!(engine.statistik.gruppen.erstellt(), 1);
    assert_eq!(engine.statistik.lebend(), 0);
}

#[test]
fn fabrik_lehnt_ungueltige_konfiguration_ab() {
    let mut config = SessionConfig::default();
    config.session.max_protocol_version = 0;
    let fehler = SessionFactory::neu(FakeEngine::neu(), config).unwrap_err();
    assert!(matches!(fehler, SessionError::Konfiguration(_)));
}

#[test]
fn doppeltes_mitglied_nach_policy() {
    let a = aufbau();
    a.session.add_member(UserId(2)).unwrap();
    assert!(matches!(
        a.session.add_member(UserId(2)),
        Err(SessionError::MemberAlreadyPresent(UserId(2)))
    ));
    assert!(!a.session.ist_unbrauchbar());

    let config = SessionConfig::aus_toml("[mitglieder]\nduplikat_policy = \"ersetzen\"\n").unwrap();
    assert_eq!(config.mitglieder.duplikat_policy, DuplikatPolicy::Ersetzen);
    let b = aufbau_mit(config);
    b.session.add_member(UserId(2)).unwrap();
    b.session.add_member(UserId(2)).unwrap();
    assert_eq!(b.session.member_ids(), vec![UserId(2)]);
    let decryptoren = &b.engine.statistik.decryptoren;
    assert_eq!(decryptoren.erstellt(), 2);
    assert_eq!(decryptoren.lebend(), 1);
}

#[test]
fn konfiguration_aus_datei() {
    let mut datei = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        datei,
        "[session]\nmax_protocol_version = 1\nnicht_audio_faktor = 3\n\n[logging]\nformat = \"json\""
    )
    .unwrap();

    let config = SessionConfig::laden(datei.path()).unwrap();
    assert_eq!(config.session.nicht_audio_faktor, 3);
    assert_eq!(config.logging.format, "json");

    let a = aufbau_mit(config);
    assert_eq!(a.session.max_encrypted_frame_size(voicelock_core::MediaType::Video, 100), 300);
}

#[test]
fn ereignisse_aus_json() {
    let a = aufbau();
    let ereignisse = [
        r#"{"typ":"protokoll_ack","protocol_version":1}"#,
        r#"{"typ":"mitglied_beigetreten","user_id":2}"#,
        r#"{"typ":"mitglied_beigetreten","user_id":3}"#,
        r#"{"typ":"ssrc_zugewiesen","codec":"opus","ssrc":4242}"#,
        r#"{"typ":"commit","transition_id":0,"commit":[1,2,3]}"#,
        r#"{"typ":"mitglied_verlassen","user_id":3}"#,
        r#"{"typ":"transition_vorbereiten","transition_id":8,"protocol_version":0}"#,
        r#"{"typ":"transition_ausfuehren","transition_id":8}"#,
    ];
    for json in ereignisse {
        let event: SessionEvent = serde_json::from_str(json).unwrap();
        a.session.handle_event(&event).unwrap();
    }

    assert_eq!(a.session.member_ids(), vec![UserId(2)]);
    assert_eq!(a.session.protocol_version(), ProtocolVersion::DISABLED);
    assert!(a.session.encryptor_passthrough());
    assert_eq!(a.session.member_passthrough(UserId(2)), Some(true));
    // Bootstrap-Commit beantwortet nichts
    assert!(a.ausgang.abholen().is_empty());
}

#[test]
fn welcome_ereignis_sendet_ready() {
    let a = aufbau();
    a.session
        .handle_event(&SessionEvent::TransitionVorbereiten {
            transition_id: TransitionId(4),
            protocol_version: ProtocolVersion::V1,
        })
        .unwrap();
    a.session
        .handle_event(&SessionEvent::Welcome {
            transition_id: TransitionId(4),
            welcome: b"welcome".to_vec(),
        })
        .unwrap();

    assert_eq!(
        a.ausgang.abholen(),
        vec![AusgehendeNachricht::ReadyForTransition(TransitionId(4))]
    );
}

#[test]
fn engine_logs_landen_im_globalen_sink() {
    let a = aufbau();
    let factory = SessionFactory::neu(FakeEngine::neu(), SessionConfig::default())
        .unwrap()
        .mit_engine_logs();
    assert!(LogSinkRegistry::global().ist_registriert());
    a.session.on_select_protocol_ack(ProtocolVersion::V1).unwrap();

    // Eigener Sink ersetzt den der Fabrik
    let gesehen = Arc::new(Mutex::new(Vec::new()));
    let zeilen = Arc::clone(&gesehen);
    let guard = LogSinkRegistry::global().register(move |record| {
        if record.message == COMMIT_VERWORFEN {
            zeilen.lock().push(record.severity);
        }
    });

    a.engine
        .skript
        .commit_antwort(CommitOutcome::Success { joined: false });
    a.session.on_commit(TransitionId(6), b"commit").unwrap();
    assert_eq!(*gesehen.lock(), vec![LogSeverity::Warning]);

    // Die Fabrik raeumt einen fremden Sink beim Drop nicht ab
    drop(factory);
    assert!(LogSinkRegistry::global().ist_registriert());
    drop(guard);
    assert!(!LogSinkRegistry::global().ist_registriert());

    // Ohne Sink bleibt die Engine-Zeile folgenlos
    a.session.on_commit(TransitionId(7), b"commit").unwrap();
    assert_eq!(gesehen.lock().len(), 1);
}

#[test]
fn logging_aus_konfiguration() {
    let config = SessionConfig::aus_toml("[logging]\nlevel = \"debug\"\nformat = \"json\"\n").unwrap();
    let factory = SessionFactory::neu(FakeEngine::neu(), config).unwrap();
    factory.logging_aktivieren();
    // Der erste Aufruf hat den Subscriber installiert
    assert!(!factory.logging_aktivieren());
}
