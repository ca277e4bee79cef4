//! Decryption-Registry – ein Decryptor pro Gruppenmitglied
//!
//! Thread-safe durch DashMap: Beitritt und Austritt eines Mitglieds sperren
//! nur den betroffenen Shard. Jeder Eintrag hat einen eigenen Lock, der fuer
//! die Dauer eines `decrypt` gehalten wird; der Shard-Lock ist dann bereits
//! wieder frei.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use voicelock_core::{MediaType, UserId};
use voicelock_crypto::{CryptoEngine, CryptoHandle, FrameDecryptor, FrameOutcome, SharedRatchet};
use voicelock_observability::FrameMetrics;

use crate::config::DuplikatPolicy;
use crate::error::{SessionError, SessionResult};
use crate::pipeline::ergebnis;

/// Decryptor eines Mitglieds und sein Modus
struct MitgliedsKontext {
    decryptor: CryptoHandle<dyn FrameDecryptor>,
    passthrough: bool,
}

type Eintrag = Arc<Mutex<MitgliedsKontext>>;

/// Alle Decryptoren einer Session, indexiert nach UserId
pub struct DecryptionRegistry {
    engine: Arc<dyn CryptoEngine>,
    mitglieder: DashMap<UserId, Eintrag>,
    policy: DuplikatPolicy,
    metriken: Option<FrameMetrics>,
}

impl DecryptionRegistry {
    pub fn neu(
        engine: Arc<dyn CryptoEngine>,
        policy: DuplikatPolicy,
        metriken: Option<FrameMetrics>,
    ) -> Self {
        Self {
            engine,
            mitglieder: DashMap::new(),
            policy,
            metriken,
        }
    }

    /// Legt einen Decryptor im Passthrough-Modus an
    pub fn add_member(&self, user_id: UserId) -> SessionResult<()> {
        if self.policy == DuplikatPolicy::Ablehnen && self.mitglieder.contains_key(&user_id) {
            return Err(SessionError::MemberAlreadyPresent(user_id));
        }

        let mut decryptor = CryptoHandle::decryptor(&*self.engine)?;
        decryptor.set_passthrough_mode(true);
        let eintrag = Arc::new(Mutex::new(MitgliedsKontext {
            decryptor,
            passthrough: true,
        }));

        let ergebnis = match self.mitglieder.entry(user_id) {
            Entry::Occupied(mut belegt) => match self.policy {
                // Neuer Decryptor wird beim Verlassen des Scopes freigegeben
                DuplikatPolicy::Ablehnen => Err(SessionError::MemberAlreadyPresent(user_id)),
                DuplikatPolicy::Ersetzen => {
                    belegt.insert(eintrag);
                    tracing::debug!(user_id = %user_id, "Decryptor ersetzt");
                    Ok(())
                }
            },
            Entry::Vacant(frei) => {
                frei.insert(eintrag);
                tracing::debug!(user_id = %user_id, "Mitglied hinzugefuegt");
                Ok(())
            }
        };
        // Shard-Lock des Entries ist hier wieder frei
        self.gauge_aktualisieren();
        ergebnis
    }

    /// Entfernt den Decryptor; gibt false zurueck wenn das Mitglied fehlte.
    ///
    /// Ein gerade laufendes `decrypt` haelt den Eintrag noch; freigegeben
    /// wird der Decryptor, wenn es endet.
    pub fn remove_member(&self, user_id: UserId) -> bool {
        let entfernt = self.mitglieder.remove(&user_id).is_some();
        if entfernt {
            tracing::debug!(user_id = %user_id, "Mitglied entfernt");
            self.gauge_aktualisieren();
        }
        entfernt
    }

    /// Installiert einen Ratchet. `Some` schaltet in den aktiven Modus,
    /// `None` zurueck in den Passthrough. Fehlt das Mitglied, passiert nichts.
    pub fn install_ratchet(&self, user_id: UserId, ratchet: Option<SharedRatchet>) -> bool {
        let Some(eintrag) = self.eintrag(user_id) else {
            tracing::debug!(user_id = %user_id, "Ratchet fuer unbekanntes Mitglied verworfen");
            return false;
        };

        let mut kontext = eintrag.lock();
        let passthrough = ratchet.is_none();
        kontext.decryptor.set_key_ratchet(ratchet);
        kontext.decryptor.set_passthrough_mode(passthrough);
        kontext.passthrough = passthrough;
        tracing::debug!(user_id = %user_id, aktiv = !passthrough, "Ratchet installiert");
        true
    }

    /// Verwirft die Ratchets aller Mitglieder
    pub fn clear_ratchets(&self) {
        for user_id in self.member_ids() {
            self.install_ratchet(user_id, None);
        }
    }

    pub fn decrypt(
        &self,
        user_id: UserId,
        media_type: MediaType,
        input: &[u8],
        output: &mut [u8],
    ) -> SessionResult<FrameOutcome> {
        let eintrag = self
            .eintrag(user_id)
            .ok_or(SessionError::MemberNotFound(user_id))?;

        let mut kontext = eintrag.lock();
        let passthrough = kontext.passthrough;
        let outcome = kontext.decryptor.decrypt(media_type, input, output);
        drop(kontext);

        if let Some(metriken) = &self.metriken {
            metriken.frame_entschluesselt(media_type.label(), ergebnis(outcome, passthrough));
        }
        Ok(outcome)
    }

    /// Obere Schranke fuer die Ausgabe von `decrypt`; `None` fuer unbekannte Mitglieder
    pub fn max_plaintext_size(
        &self,
        user_id: UserId,
        media_type: MediaType,
        frame_size: usize,
    ) -> Option<usize> {
        let eintrag = self.eintrag(user_id)?;
        let groesse = eintrag.lock().decryptor.max_plaintext_size(media_type, frame_size);
        Some(groesse)
    }

    /// Sortierte Liste aller Mitglieder
    pub fn member_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.mitglieder.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.mitglieder.contains_key(&user_id)
    }

    /// `Some(true)` wenn der Decryptor des Mitglieds im Passthrough ist
    pub fn ist_passthrough(&self, user_id: UserId) -> Option<bool> {
        let eintrag = self.eintrag(user_id)?;
        let passthrough = eintrag.lock().passthrough;
        Some(passthrough)
    }

    pub fn len(&self) -> usize {
        self.mitglieder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mitglieder.is_empty()
    }

    /// Gibt alle Decryptoren frei
    pub fn alle_freigeben(&self) {
        let anzahl = self.mitglieder.len();
        self.mitglieder.clear();
        if anzahl > 0 {
            tracing::debug!(anzahl, "Alle Decryptoren freigegeben");
        }
        self.gauge_aktualisieren();
    }

    /// Klont den Eintrag heraus, damit der Shard-Lock sofort frei wird
    fn eintrag(&self, user_id: UserId) -> Option<Eintrag> {
        self.mitglieder.get(&user_id).map(|e| Arc::clone(e.value()))
    }

    fn gauge_aktualisieren(&self) {
        if let Some(metriken) = &self.metriken {
            metriken.members_active.set(self.mitglieder.len() as i64);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
