//! # voicelock-observability
//!
//! Observability-Crate fuer Voicelock:
//! - Structured Logging via tracing-subscriber
//! - Registrierung des Engine-Log-Sinks (genau ein Sink, ersetzbar)
//! - Prometheus-kompatible Frame- und Transition-Metriken

pub mod log_sink;
pub mod logging;
pub mod metrics;

pub use log_sink::{tracing_sink, LogRecord, LogSeverity, LogSinkGuard, LogSinkRegistry};
pub use logging::{logging_initialisieren, LogEinstellung, LogFormat};
pub use metrics::{FrameErgebnis, FrameMetrics};
