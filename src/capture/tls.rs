//! TLS observed at record-header granularity: content types, record lengths, and the
//! cleartext server name of a ClientHello. Nothing is decrypted.
use crate::error::DecodeSkip;

pub const CONTENT_CHANGE_CIPHER_SPEC: u8 = 20;
pub const CONTENT_HANDSHAKE: u8 = 22;
pub const CONTENT_APPLICATION_DATA: u8 = 23;
pub const CONTENT_HEARTBEAT: u8 = 24;

const HANDSHAKE_CLIENT_HELLO: u8 = 1;
const EXTENSION_SERVER_NAME: u16 = 0;
const SERVER_NAME_HOST: u8 = 0;
const RECORD_HEADER_LEN: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsRecord {
    pub content_type: u8,
    pub length: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsSummary {
    pub records: Vec<TlsRecord>,
    /// Lowercased server name, when a ClientHello carried one.
    pub sni: Option<String>,
}

impl TlsSummary {
    pub fn application_data(&self) -> impl Iterator<Item = &TlsRecord> {
        self.records
            .iter()
            .filter(|r| r.content_type == CONTENT_APPLICATION_DATA)
    }
}

/// Splits a TCP payload into TLS records.
///
/// A record cut off by the end of the segment ends the scan without error; whatever was
/// complete before it is kept. A header that is not TLS at all, or a handshake record
/// whose ClientHello is broken, rejects the whole payload.
pub fn parse_records(payload: &[u8]) -> Result<TlsSummary, DecodeSkip> {
    let mut summary = TlsSummary::default();
    let mut pos = 0;

    while pos + RECORD_HEADER_LEN <= payload.len() {
        let content_type = payload[pos];
        if !(CONTENT_CHANGE_CIPHER_SPEC..=CONTENT_HEARTBEAT).contains(&content_type) {
            return Err(DecodeSkip::MalformedTls("unknown record content type"));
        }
        if payload[pos + 1] != 3 {
            return Err(DecodeSkip::MalformedTls("unknown record version"));
        }
        let length = u16::from_be_bytes([payload[pos + 3], payload[pos + 4]]) as usize;
        let body_start = pos + RECORD_HEADER_LEN;
        if body_start + length > payload.len() {
            break;
        }
        let body = &payload[body_start..body_start + length];

        if content_type == CONTENT_HANDSHAKE {
            if let Some(sni) = client_hello_sni(body)? {
                summary.sni = Some(sni);
            }
        }

        summary.records.push(TlsRecord {
            content_type,
            length: length as u32,
        });
        pos = body_start + length;
    }

    Ok(summary)
}

fn be16(data: &[u8], pos: usize) -> Option<usize> {
    data.get(pos..pos + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
}

/// Returns the SNI of a handshake record whose first message is a ClientHello.
/// Other handshake messages (and encrypted finished messages) yield `None`.
fn client_hello_sni(handshake: &[u8]) -> Result<Option<String>, DecodeSkip> {
    let truncated = DecodeSkip::MalformedTls("truncated ClientHello");

    if handshake.len() < 4 || handshake[0] != HANDSHAKE_CLIENT_HELLO {
        return Ok(None);
    }
    let declared = (handshake[1] as usize) << 16 | (handshake[2] as usize) << 8 | handshake[3] as usize;
    let hello = handshake
        .get(4..4 + declared)
        .ok_or_else(|| truncated.clone())?;

    // client_version(2) + random(32)
    let mut pos = 34;
    let session_id_len = *hello.get(pos).ok_or_else(|| truncated.clone())? as usize;
    pos += 1 + session_id_len;
    let cipher_suites_len = be16(hello, pos).ok_or_else(|| truncated.clone())?;
    pos += 2 + cipher_suites_len;
    let compression_len = *hello.get(pos).ok_or_else(|| truncated.clone())? as usize;
    pos += 1 + compression_len;

    // Extensions are optional in a ClientHello.
    let extensions_len = match be16(hello, pos) {
        Some(len) => len,
        None if pos <= hello.len() => return Ok(None),
        None => return Err(truncated),
    };
    pos += 2;
    let extensions = hello
        .get(pos..pos + extensions_len)
        .ok_or_else(|| truncated.clone())?;

    let mut pos = 0;
    while pos + 4 <= extensions.len() {
        let ext_type = be16(extensions, pos).ok_or_else(|| truncated.clone())? as u16;
        let ext_len = be16(extensions, pos + 2).ok_or_else(|| truncated.clone())?;
        let ext = extensions
            .get(pos + 4..pos + 4 + ext_len)
            .ok_or_else(|| truncated.clone())?;

        if ext_type == EXTENSION_SERVER_NAME {
            return server_name(ext).map(Some);
        }
        pos += 4 + ext_len;
    }

    Ok(None)
}

fn server_name(ext: &[u8]) -> Result<String, DecodeSkip> {
    let bad = DecodeSkip::MalformedTls("bad server_name extension");

    // list_len(2) name_type(1) name_len(2) name
    if ext.len() < 5 || ext[2] != SERVER_NAME_HOST {
        return Err(bad);
    }
    let name_len = be16(ext, 3).ok_or_else(|| bad.clone())?;
    let name = ext.get(5..5 + name_len).ok_or_else(|| bad.clone())?;
    if !name.is_ascii() {
        return Err(bad);
    }

    Ok(String::from_utf8_lossy(name).to_ascii_lowercase())
}
