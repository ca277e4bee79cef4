//! Gemeinsame Typen fuer das Kryptografie-Subsystem

/// Sicherer Schluessel-Container (wird beim Drop genullt)
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBytes(Vec<u8>);

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED] {} bytes)", self.0.len())
    }
}

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Frame-Ergebnisse
// ---------------------------------------------------------------------------

/// Status eines Encrypt-/Decrypt-Aufrufs.
///
/// Die Engine meldet `0` fuer Erfolg und jeden anderen Wert als Fehlschlag;
/// sie unterscheidet gegenueber dem Aufrufer nicht weiter (falsche Groesse,
/// falsche Epoch, Auth-Tag ungueltig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStatus {
    Success,
    Failure,
}

impl FrameStatus {
    /// Wandelt den Rohwert der Engine um
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Success,
            _ => Self::Failure,
        }
    }

    pub fn ist_erfolg(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Ergebnis eines einzelnen Frame-Transforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    pub status: FrameStatus,
    /// Anzahl geschriebener Bytes im Ziel-Puffer (0 bei Fehlschlag)
    pub bytes_written: usize,
}

impl FrameOutcome {
    pub fn success(bytes_written: usize) -> Self {
        Self {
            status: FrameStatus::Success,
            bytes_written,
        }
    }

    pub fn failure() -> Self {
        Self {
            status: FrameStatus::Failure,
            bytes_written: 0,
        }
    }

    pub fn ist_erfolg(&self) -> bool {
        self.status.ist_erfolg()
    }
}
