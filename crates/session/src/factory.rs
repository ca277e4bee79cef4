//! Session-Fabrik
//!
//! Haelt die gemeinsame Krypto-Engine und die Konfiguration und erzeugt daraus
//! einsatzbereite Sessions. Schlaegt ein Schritt beim Aufbau fehl, werden die
//! bis dahin erzeugten Handles beim Verlassen wieder freigegeben.

use std::sync::Arc;

use voicelock_core::{ChannelId, ProtocolVersion, UserId};
use voicelock_crypto::{CryptoEngine, CryptoHandle};
use voicelock_observability::{
    logging_initialisieren, tracing_sink, FrameMetrics, LogSinkGuard, LogSinkRegistry,
};

use crate::callbacks::ProtocolCallbacks;
use crate::config::SessionConfig;
use crate::coordinator::TransitionCoordinator;
use crate::error::SessionResult;
use crate::pipeline::EncryptionPipeline;
use crate::registry::DecryptionRegistry;
use crate::session::E2eeSession;

pub struct SessionFactory {
    engine: Arc<dyn CryptoEngine>,
    config: SessionConfig,
    /// Leitet Engine-Logs nach `tracing`, solange die Fabrik lebt
    log_sink: Option<LogSinkGuard<'static>>,
}

impl SessionFactory {
    /// Erstellt eine Fabrik nach Validierung der Konfiguration
    pub fn neu(engine: Arc<dyn CryptoEngine>, config: SessionConfig) -> SessionResult<Self> {
        config.validieren()?;
        Ok(Self {
            engine,
            config,
            log_sink: None,
        })
    }

    /// Registriert den `tracing`-Sink fuer Engine-Logs in der globalen Registry
    pub fn mit_engine_logs(mut self) -> Self {
        self.log_sink = Some(LogSinkRegistry::global().register(tracing_sink()));
        self
    }

    /// Installiert den globalen Subscriber nach `[logging]`. Liefert `false`,
    /// wenn der Host bereits einen eigenen installiert hat.
    pub fn logging_aktivieren(&self) -> bool {
        let logging = &self.config.logging;
        logging_initialisieren(&logging.level, &logging.format)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Hoechste Version, die Sessions dieser Fabrik aushandeln
    pub fn max_protocol_version(&self) -> ProtocolVersion {
        self.config
            .max_protocol_version()
            .min(self.engine.max_supported_protocol_version())
    }

    /// Erzeugt eine Session mit Gruppen-Session, Encryptor (Passthrough) und
    /// leerer Decryption-Registry
    pub fn create_session(
        &self,
        callbacks: Arc<dyn ProtocolCallbacks>,
        self_user_id: UserId,
        channel_id: ChannelId,
    ) -> SessionResult<E2eeSession> {
        let metriken = match FrameMetrics::neu() {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(fehler = %e, "Metriken nicht verfuegbar");
                None
            }
        };

        let group = CryptoHandle::group_session(&*self.engine)?;
        let pipeline = Arc::new(EncryptionPipeline::neu(&*self.engine, metriken.clone())?);
        let registry = Arc::new(DecryptionRegistry::neu(
            Arc::clone(&self.engine),
            self.config.mitglieder.duplikat_policy,
            metriken.clone(),
        ));
        let coordinator = TransitionCoordinator::neu(
            Arc::clone(&self.engine),
            group,
            self_user_id,
            channel_id,
            Arc::clone(&pipeline),
            Arc::clone(&registry),
            metriken.clone(),
        );

        tracing::info!(
            user_id = %self_user_id,
            channel = %channel_id,
            "E2EE-Session erstellt"
        );
        Ok(E2eeSession::neu(
            self_user_id,
            channel_id,
            self.max_protocol_version(),
            &self.config,
            pipeline,
            registry,
            coordinator,
            callbacks,
            metriken,
        ))
    }
}

impl std::fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("config", &self.config)
            .field("engine_logs", &self.log_sink.is_some())
            .finish()
    }
}
