//! Prometheus-kompatible Metriken fuer Voicelock-Sessions
//!
//! Registrierte Metriken:
//! - `voicelock_frames_encrypted_total` – Counter: Ausgehende Frames (media, ergebnis)
//! - `voicelock_frames_decrypted_total` – Counter: Eingehende Frames (media, ergebnis)
//! - `voicelock_members_active` – Gauge: Mitglieder mit Decryptor
//! - `voicelock_protocol_version` – Gauge: Aktive Protokollversion
//! - `voicelock_transitions_total` – Counter: Transitionen (art)
//! - `voicelock_invalid_commit_welcome_total` – Counter: Abgelehnte Commits/Welcomes

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Ergebnis eines Frame-Durchlaufs, als Label-Wert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameErgebnis {
    Erfolg,
    Fehler,
    Passthrough,
}

impl FrameErgebnis {
    pub fn label(self) -> &'static str {
        match self {
            Self::Erfolg => "erfolg",
            Self::Fehler => "fehler",
            Self::Passthrough => "passthrough",
        }
    }
}

/// Frame- und Transition-Metriken einer Session
#[derive(Clone)]
pub struct FrameMetrics {
    pub registry: Arc<Registry>,

    pub frames_encrypted_total: IntCounterVec,
    pub frames_decrypted_total: IntCounterVec,
    pub members_active: IntGauge,
    pub protocol_version: IntGauge,
    pub transitions_total: IntCounterVec,
    pub invalid_commit_welcome_total: IntCounter,
}

impl FrameMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        Self::mit_registry(Arc::new(Registry::new()))
    }

    /// Registriert alle Metriken in einer bestehenden Registry
    pub fn mit_registry(registry: Arc<Registry>) -> Result<Self> {
        let frames_encrypted_total = IntCounterVec::new(
            Opts::new(
                "voicelock_frames_encrypted_total",
                "Anzahl ausgehender Frames nach Medientyp und Ergebnis",
            ),
            &["media", "ergebnis"],
        )?;
        registry.register(Box::new(frames_encrypted_total.clone()))?;

        let frames_decrypted_total = IntCounterVec::new(
            Opts::new(
                "voicelock_frames_decrypted_total",
                "Anzahl eingehender Frames nach Medientyp und Ergebnis",
            ),
            &["media", "ergebnis"],
        )?;
        registry.register(Box::new(frames_decrypted_total.clone()))?;

        let members_active = IntGauge::with_opts(Opts::new(
            "voicelock_members_active",
            "Anzahl Mitglieder mit registriertem Decryptor",
        ))?;
        registry.register(Box::new(members_active.clone()))?;

        let protocol_version = IntGauge::with_opts(Opts::new(
            "voicelock_protocol_version",
            "Aktive E2EE-Protokollversion (0 = deaktiviert)",
        ))?;
        registry.register(Box::new(protocol_version.clone()))?;

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "voicelock_transitions_total",
                "Anzahl Zustandsuebergaenge nach Art",
            ),
            &["art"],
        )?;
        registry.register(Box::new(transitions_total.clone()))?;

        let invalid_commit_welcome_total = IntCounter::with_opts(Opts::new(
            "voicelock_invalid_commit_welcome_total",
            "Anzahl als ungueltig gemeldeter Commits und Welcomes",
        ))?;
        registry.register(Box::new(invalid_commit_welcome_total.clone()))?;

        Ok(Self {
            registry,
            frames_encrypted_total,
            frames_decrypted_total,
            members_active,
            protocol_version,
            transitions_total,
            invalid_commit_welcome_total,
        })
    }

    pub fn frame_verschluesselt(&self, media: &str, ergebnis: FrameErgebnis) {
        self.frames_encrypted_total
            .with_label_values(&[media, ergebnis.label()])
            .inc();
    }

    pub fn frame_entschluesselt(&self, media: &str, ergebnis: FrameErgebnis) {
        self.frames_decrypted_total
            .with_label_values(&[media, ergebnis.label()])
            .inc();
    }

    pub fn transition(&self, art: &str) {
        self.transitions_total.with_label_values(&[art]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
