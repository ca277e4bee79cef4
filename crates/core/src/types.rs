//! Gemeinsame Identifikations- und Protokolltypen fuer Voicelock
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen. Die reservierten
//! Sentinel-Werte (Bootstrap-Transition, deaktiviertes Protokoll) sind benannte
//! Konstanten und werden nie als rohe Zahlen verglichen.

use serde::{Deserialize, Serialize};

/// Benutzer-ID eines Call-Teilnehmers (Snowflake)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl UserId {
    /// Gibt den rohen Wert zurueck
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    // Die Engine erwartet die vorzeichenlose Dezimaldarstellung
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Kanal-ID des Voice-/Video-Calls, dient als Gruppen-ID der Engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl ChannelId {
    /// Gibt den rohen Wert zurueck
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Transitionen
// ---------------------------------------------------------------------------

/// Kennung einer ausgehandelten Protokoll-Transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionId(pub u16);

impl TransitionId {
    /// Reservierte ID fuer die initiale Bootstrap-Transition.
    ///
    /// Wird nie in der Pending-Map abgelegt und loest keine
    /// Ready-Antwort aus.
    pub const BOOTSTRAP: TransitionId = TransitionId(0);

    /// Prueft ob dies die Bootstrap-Transition ist
    pub fn ist_bootstrap(&self) -> bool {
        *self == Self::BOOTSTRAP
    }
}

impl std::fmt::Display for TransitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Protokollversion des E2EE-Protokolls (Standard: deaktiviert)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    /// Reservierter Wert: E2EE ist deaktiviert
    pub const DISABLED: ProtocolVersion = ProtocolVersion(0);

    /// Erste Version mit aktiver Verschluesselung
    pub const V1: ProtocolVersion = ProtocolVersion(1);

    /// Prueft ob diese Version das deaktivierte Protokoll bezeichnet
    pub fn ist_deaktiviert(&self) -> bool {
        *self == Self::DISABLED
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Medien
// ---------------------------------------------------------------------------

/// Art des Medien-Frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Audio = 0,
    Video = 1,
}

impl MediaType {
    /// Wandelt den Engine-Rohwert um (unbekannte Werte -> None)
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Audio),
            1 => Some(Self::Video),
            _ => None,
        }
    }

    /// Rohwert fuer die Engine
    pub fn as_raw(&self) -> i32 {
        *self as i32
    }

    /// Kurzname fuer Logs und Metrik-Labels
    pub fn label(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// Codec eines Medien-Streams (Nummerierung wie in der Engine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    Unknown = 0,
    Opus = 1,
    Vp8 = 2,
    Vp9 = 3,
    H264 = 4,
    H265 = 5,
    Av1 = 6,
}

impl Codec {
    /// Wandelt den Engine-Rohwert um
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Opus,
            2 => Self::Vp8,
            3 => Self::Vp9,
            4 => Self::H264,
            5 => Self::H265,
            6 => Self::Av1,
            _ => Self::Unknown,
        }
    }

    /// Medientyp zu dem der Codec gehoert
    pub fn media_type(&self) -> Option<MediaType> {
        match self {
            Self::Opus => Some(MediaType::Audio),
            Self::Vp8 | Self::Vp9 | Self::H264 | Self::H265 | Self::Av1 => Some(MediaType::Video),
            Self::Unknown => None,
        }
    }
}
