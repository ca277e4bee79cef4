//! Eingehende Ereignisse einer E2EE-Session
//!
//! Die Transport-Schicht (Voice-Gateway) uebersetzt ihre Opcodes in diese
//! Ereignisse und reicht sie an die Session weiter. Die JSON-Opcodes
//! (Transition, Epoch) lassen sich direkt deserialisieren; die binaeren
//! MLS-Nachrichten werden als rohe Bytes uebergeben.

use crate::types::{Codec, ProtocolVersion, TransitionId, UserId};
use serde::{Deserialize, Serialize};

/// Alle Ereignisse, die von aussen in eine Session fliessen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "typ", rename_all = "snake_case")]
pub enum SessionEvent {
    // --- Mitglieder ---
    /// Ein Teilnehmer hat den Call betreten
    MitgliedBeigetreten { user_id: UserId },
    /// Ein Teilnehmer hat den Call verlassen
    MitgliedVerlassen { user_id: UserId },
    /// Der lokale Sender nutzt `ssrc` fuer Frames des Codecs `codec`
    SsrcZugewiesen { codec: Codec, ssrc: u32 },

    // --- Protokoll-Aushandlung ---
    /// Bestaetigung der initial ausgehandelten Protokollversion
    ProtokollAck { protocol_version: ProtocolVersion },
    /// Eine Transition soll vorbereitet werden
    TransitionVorbereiten {
        transition_id: TransitionId,
        protocol_version: ProtocolVersion,
    },
    /// Eine vorbereitete Transition soll ausgefuehrt werden
    TransitionAusfuehren { transition_id: TransitionId },
    /// Eine neue Epoch beginnt (nur "1" loest eine Aktion aus)
    EpochVorbereiten {
        epoch: String,
        protocol_version: ProtocolVersion,
    },

    // --- MLS-Nachrichten ---
    /// Paket des externen Senders (Vertrauensanker der Gruppe)
    ExternerSender { paket: Vec<u8> },
    /// Proposals, fuer die ein Commit erzeugt werden soll
    Proposals { proposals: Vec<u8> },
    /// Commit, der eine Transition einleitet
    Commit {
        transition_id: TransitionId,
        commit: Vec<u8>,
    },
    /// Welcome-Nachricht fuer den Gruppenbeitritt
    Welcome {
        transition_id: TransitionId,
        welcome: Vec<u8>,
    },
}

impl SessionEvent {
    /// Kurzer Name fuer Logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::MitgliedBeigetreten { .. } => "mitglied_beigetreten",
            Self::MitgliedVerlassen { .. } => "mitglied_verlassen",
            Self::SsrcZugewiesen { .. } => "ssrc_zugewiesen",
            Self::ProtokollAck { .. } => "protokoll_ack",
            Self::TransitionVorbereiten { .. } => "transition_vorbereiten",
            Self::TransitionAusfuehren { .. } => "transition_ausfuehren",
            Self::EpochVorbereiten { .. } => "epoch_vorbereiten",
            Self::ExternerSender { .. } => "externer_sender",
            Self::Proposals { .. } => "proposals",
            Self::Commit { .. } => "commit",
            Self::Welcome { .. } => "welcome",
        }
    }
}
