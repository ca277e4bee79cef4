//! Besitzende Handles auf Engine-Ressourcen
//!
//! Ein `CryptoHandle` besitzt genau eine Engine-Ressource (Gruppen-Session,
//! Encryptor oder Decryptor). Die Ressource wird beim Drop genau einmal
//! freigegeben, egal auf welchem Pfad der Besitzer endet. Handles sind weder
//! `Clone` noch teilbar.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::{CryptoEngine, EngineResource, FrameDecryptor, FrameEncryptor, GroupSession};
use crate::error::CryptoResult;

static NAECHSTE_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Art der gekapselten Ressource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    GroupSession,
    Encryptor,
    Decryptor,
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GroupSession => "group_session",
            Self::Encryptor => "encryptor",
            Self::Decryptor => "decryptor",
        };
        f.write_str(name)
    }
}

/// Besitzender Handle mit garantierter Freigabe
pub struct CryptoHandle<T: EngineResource + ?Sized> {
    resource: Box<T>,
    kind: HandleKind,
    id: u64,
}

impl<T: EngineResource + ?Sized> CryptoHandle<T> {
    /// Uebernimmt den Besitz einer frisch erzeugten Ressource
    pub fn new(resource: Box<T>, kind: HandleKind) -> Self {
        let id = NAECHSTE_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(handle = id, art = %kind, "Engine-Handle erzeugt");
        Self { resource, kind, id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// Gibt die Ressource sofort frei
    pub fn close(self) {
        drop(self);
    }
}

impl CryptoHandle<dyn GroupSession> {
    /// Erzeugt eine neue Gruppen-Session ueber die Engine
    pub fn group_session(engine: &dyn CryptoEngine) -> CryptoResult<Self> {
        Ok(Self::new(engine.create_group_session()?, HandleKind::GroupSession))
    }
}

impl CryptoHandle<dyn FrameEncryptor> {
    /// Erzeugt einen neuen Encryptor ueber die Engine
    pub fn encryptor(engine: &dyn CryptoEngine) -> CryptoResult<Self> {
        Ok(Self::new(engine.create_encryptor()?, HandleKind::Encryptor))
    }
}

impl CryptoHandle<dyn FrameDecryptor> {
    /// Erzeugt einen neuen Decryptor ueber die Engine
    pub fn decryptor(engine: &dyn CryptoEngine) -> CryptoResult<Self> {
        Ok(Self::new(engine.create_decryptor()?, HandleKind::Decryptor))
    }
}

impl<T: EngineResource + ?Sized> Deref for CryptoHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.resource
    }
}

impl<T: EngineResource + ?Sized> DerefMut for CryptoHandle<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.resource
    }
}

impl<T: EngineResource + ?Sized> Drop for CryptoHandle<T> {
    fn drop(&mut self) {
        self.resource.release();
        tracing::trace!(handle = self.id, art = %self.kind, "Engine-Handle freigegeben");
    }
}

impl<T: EngineResource + ?Sized> std::fmt::Debug for CryptoHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
