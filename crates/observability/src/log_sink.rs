//! Engine-Log-Sink
//!
//! Die Krypto-Engine meldet Diagnosezeilen ueber genau einen registrierten
//! Callback. Die Registry besitzt die registrierte Closure: eine erneute
//! Registrierung ersetzt (und droppt) den Vorgaenger, der zurueckgegebene
//! Guard meldet den Sink beim Drop wieder ab.
//!
//! Engine-Adapter rufen fuer jede Diagnosezeile
//! `LogSinkRegistry::global().dispatch(..)` mit dem Rohwert der Engine auf.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

/// Schweregrad einer Engine-Logzeile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Verbose,
    Info,
    Warning,
    Error,
    None,
    Unknown,
}

impl LogSeverity {
    /// Wandelt den Rohwert der Engine um
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Verbose,
            1 => Self::Info,
            2 => Self::Warning,
            3 => Self::Error,
            4 => Self::None,
            _ => Self::Unknown,
        }
    }
}

/// Eine Logzeile der Engine
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    pub severity: LogSeverity,
    pub file: &'a str,
    pub line: u32,
    pub message: &'a str,
}

type SinkFn = dyn Fn(&LogRecord<'_>) + Send + Sync;

struct Registrierung {
    id: u64,
    sink: Arc<SinkFn>,
}

/// Registry fuer den (einzigen) Engine-Log-Sink
pub struct LogSinkRegistry {
    aktiv: RwLock<Option<Registrierung>>,
    naechste_id: AtomicU64,
}

impl LogSinkRegistry {
    pub fn new() -> Self {
        Self {
            aktiv: RwLock::new(None),
            naechste_id: AtomicU64::new(1),
        }
    }

    /// Prozessweite Registry, an die eine native Engine ihre Zeilen liefert
    pub fn global() -> &'static LogSinkRegistry {
        static GLOBAL: OnceLock<LogSinkRegistry> = OnceLock::new();
        GLOBAL.get_or_init(LogSinkRegistry::new)
    }

    /// Registriert `sink` und ersetzt einen eventuell vorhandenen Sink
    pub fn register<F>(&self, sink: F) -> LogSinkGuard<'_>
    where
        F: Fn(&LogRecord<'_>) + Send + Sync + 'static,
    {
        let id = self.naechste_id.fetch_add(1, Ordering::Relaxed);
        let vorher = self.aktiv.write().replace(Registrierung {
            id,
            sink: Arc::new(sink),
        });
        if vorher.is_some() {
            tracing::debug!(sink = id, "Engine-Log-Sink ersetzt");
        }
        LogSinkGuard { registry: self, id }
    }

    /// Entfernt den aktuell registrierten Sink
    pub fn unregister(&self) {
        self.aktiv.write().take();
    }

    pub fn ist_registriert(&self) -> bool {
        self.aktiv.read().is_some()
    }

    /// Einstiegspunkt der Engine: leitet eine Zeile an den Sink weiter
    pub fn dispatch(&self, severity: i32, file: &str, line: u32, message: &str) {
        // Sink ausserhalb des Locks aufrufen, damit er selbst registrieren darf
        let sink = match self.aktiv.read().as_ref() {
            Some(reg) => Arc::clone(&reg.sink),
            None => return,
        };
        sink(&LogRecord {
            severity: LogSeverity::from_raw(severity),
            file,
            line,
            message,
        });
    }

    fn unregister_id(&self, id: u64) {
        let mut aktiv = self.aktiv.write();
        if aktiv.as_ref().is_some_and(|reg| reg.id == id) {
            aktiv.take();
        }
    }
}

impl Default for LogSinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Haelt eine Registrierung am Leben; Drop meldet sie ab, sofern sie nicht
/// inzwischen ersetzt wurde.
#[must_use = "der Sink wird beim Drop des Guards abgemeldet"]
pub struct LogSinkGuard<'a> {
    registry: &'a LogSinkRegistry,
    id: u64,
}

impl LogSinkGuard<'_> {
    /// Meldet den Sink explizit ab
    pub fn unregister(self) {
        drop(self);
    }
}

impl Drop for LogSinkGuard<'_> {
    fn drop(&mut self) {
        self.registry.unregister_id(self.id);
    }
}

/// Standard-Sink: leitet Engine-Zeilen an `tracing` weiter
pub fn tracing_sink() -> impl Fn(&LogRecord<'_>) + Send + Sync + 'static {
    |record: &LogRecord<'_>| match record.severity {
        LogSeverity::Verbose => {
            tracing::trace!(target: "voicelock::engine", datei = record.file, zeile = record.line, "{}", record.message)
        }
        LogSeverity::Info => {
            tracing::info!(target: "voicelock::engine", datei = record.file, zeile = record.line, "{}", record.message)
        }
        LogSeverity::Warning => {
            tracing::warn!(target: "voicelock::engine", datei = record.file, zeile = record.line, "{}", record.message)
        }
        LogSeverity::Error => {
            tracing::error!(target: "voicelock::engine", datei = record.file, zeile = record.line, "{}", record.message)
        }
        LogSeverity::None => {}
        LogSeverity::Unknown => {
            tracing::debug!(target: "voicelock::engine", datei = record.file, zeile = record.line, "{}", record.message)
        }
    }
}
