//! Frame-Layout des Software-Transforms
//!
//! ```text
//! [ciphertext] [tag(16)] [nonce(LEB128, 1-5)] [supplemental_size(1)] [marker(2)]
//! ```
//!
//! `supplemental_size` zaehlt alles ab dem Tag bis einschliesslich Marker.

/// Laenge des AES-GCM Auth-Tags
pub const TAG_BYTES: usize = 16;

/// Marker am Ende jedes verschluesselten Frames
pub const MAGIC_MARKER: [u8; 2] = [0xFA, 0xFA];

/// Feste Zusatzbytes: Tag + Groessen-Byte + Marker
pub const SUPPLEMENTAL_BYTES: usize = TAG_BYTES + 1 + MAGIC_MARKER.len();

/// Reserve fuer die Nonce-Kodierung und unverschluesselte Codec-Bereiche
pub const TRANSFORM_PADDING_BYTES: usize = 56;

/// Maximale Laenge einer LEB128-kodierten u32-Nonce
pub const MAX_NONCE_BYTES: usize = 5;

/// Obere Schranke der Ausgabegroesse fuer einen Frame der Groesse `frame_size`
pub fn max_ciphertext_size(frame_size: usize) -> usize {
    frame_size + SUPPLEMENTAL_BYTES + TRANSFORM_PADDING_BYTES
}

/// Tatsaechliche Ausgabegroesse fuer Frame und Nonce
pub fn ciphertext_size(frame_size: usize, nonce: u32) -> usize {
    frame_size + SUPPLEMENTAL_BYTES + leb128_len(nonce)
}

/// Ratchet-Generation einer Nonce (oberstes Byte)
pub fn generation_of(nonce: u32) -> u32 {
    nonce >> 24
}

/// 96-Bit AES-GCM Nonce: 8 Null-Bytes + gekuerzte Nonce (LE)
pub fn full_nonce(nonce: u32) -> [u8; 12] {
    let mut bytes = [0u8; 12];
    bytes[8..12].copy_from_slice(&nonce.to_le_bytes());
    bytes
}

// ---------------------------------------------------------------------------
// LEB128
// ---------------------------------------------------------------------------

pub fn leb128_len(mut value: u32) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Schreibt `value` nach `out` und gibt die Anzahl Bytes zurueck.
/// `out` muss mindestens `leb128_len(value)` lang sein.
pub fn write_leb128(mut value: u32, out: &mut [u8]) -> usize {
    let mut i = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out[i] = byte;
            return i + 1;
        }
        out[i] = byte | 0x80;
        i += 1;
    }
}

/// Liest eine LEB128-Zahl; `None` bei Ueberlauf oder fehlendem Ende
pub fn read_leb128(bytes: &[u8]) -> Option<(u32, usize)> {
    let mut value: u64 = 0;
    for (i, byte) in bytes.iter().take(MAX_NONCE_BYTES).enumerate() {
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return u32::try_from(value).ok().map(|v| (v, i + 1));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Zerlegter verschluesselter Frame
#[derive(Debug, PartialEq, Eq)]
pub struct ParsedFrame<'a> {
    pub ciphertext: &'a [u8],
    pub tag: &'a [u8],
    pub nonce: u32,
}

/// Prueft nur den Marker am Frame-Ende
pub fn hat_marker(frame: &[u8]) -> bool {
    frame.ends_with(&MAGIC_MARKER)
}

/// Zerlegt einen Frame; `None` wenn Marker oder Trailer ungueltig sind
pub fn parse_frame(frame: &[u8]) -> Option<ParsedFrame<'_>> {
    if !hat_marker(frame) || frame.len() < SUPPLEMENTAL_BYTES + 1 {
        return None;
    }

    let size_pos = frame.len() - MAGIC_MARKER.len() - 1;
    let supplemental = usize::from(frame[size_pos]);
    if supplemental < SUPPLEMENTAL_BYTES + 1
        || supplemental > SUPPLEMENTAL_BYTES + MAX_NONCE_BYTES
        || supplemental > frame.len()
    {
        return None;
    }

    let tag_start = frame.len() - supplemental;
    let nonce_start = tag_start + TAG_BYTES;
    let nonce_bytes = &frame[nonce_start..size_pos];
    let (nonce, gelesen) = read_leb128(nonce_bytes)?;
    if gelesen != nonce_bytes.len() {
        return None;
    }

    Some(ParsedFrame {
        ciphertext: &frame[..tag_start],
        tag: &frame[tag_start..nonce_start],
        nonce,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
