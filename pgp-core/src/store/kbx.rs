//! The indexed/KBX keyring format: a sequence of length-prefixed
//! blobs, each checksummed, with an OpenPGP blob type that indexes
//! its embedded keyblock by key/user-id/signature record.
//!
//! See spec.md §4.8 ("Indexed blob format").

use std::io::{Read, Write};

use sha1collisiondetection::{Digest, Sha1CD};

use crate::cert::keyring::Keyring;
use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"KBXf";
const HEADER_VERSION: u8 = 0x01;
const KEY_RECORD_SIZE: u16 = 28;
const UID_RECORD_SIZE: u16 = 12;
const SIG_RECORD_SIZE: u16 = 4;
const MAX_BLOB_SIZE: usize = 5 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BlobType {
    Empty,
    Header,
    OpenPGP,
    X509,
}

impl BlobType {
    fn from_byte(b: u8) -> Result<BlobType> {
        Ok(match b {
            0 => BlobType::Empty,
            1 => BlobType::Header,
            2 => BlobType::OpenPGP,
            3 => BlobType::X509,
            other => {
                return Err(anyhow::Error::new(Error::MalformedStore(format!(
                    "unknown KBX blob type {other}"
                ))))
            }
        })
    }

    fn as_byte(self) -> u8 {
        match self {
            BlobType::Empty => 0,
            BlobType::Header => 1,
            BlobType::OpenPGP => 2,
            BlobType::X509 => 3,
        }
    }
}

/// A raw, length-and-checksum-validated blob read off disk, not yet
/// interpreted by type.
struct RawBlob {
    kind: BlobType,
    body: Vec<u8>,
}

fn read_u16(buf: &[u8], off: usize) -> Result<u16> {
    buf.get(off..off + 2)
        .map(|s| u16::from_be_bytes([s[0], s[1]]))
        .ok_or_else(|| anyhow::Error::new(Error::MalformedStore("KBX record truncated".into())))
}

fn read_u32(buf: &[u8], off: usize) -> Result<u32> {
    buf.get(off..off + 4)
        .map(|s| u32::from_be_bytes([s[0], s[1], s[2], s[3]]))
        .ok_or_else(|| anyhow::Error::new(Error::MalformedStore("KBX record truncated".into())))
}

fn read_exact_or_malformed<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut got = 0;
    while got < buf.len() {
        let n = source
            .read(&mut buf[got..])
            .map_err(|e| anyhow::Error::new(Error::Io(e)))?;
        if n == 0 {
            break;
        }
        got += n;
    }
    if got == 0 {
        Ok(false)
    } else if got == buf.len() {
        Ok(true)
    } else {
        Err(anyhow::Error::new(Error::MalformedStore(
            "KBX blob truncated mid-header".into(),
        )))
    }
}

/// Reads one length-prefixed, checksummed blob. Returns `None` at a
/// clean EOF between blobs.
fn read_blob<R: Read>(source: &mut R) -> Result<Option<RawBlob>> {
    let mut len_buf = [0u8; 4];
    if !read_exact_or_malformed(source, &mut len_buf)? {
        return Ok(None);
    }
    let total_length = u32::from_be_bytes(len_buf) as usize;
    if total_length < 5 + 20 {
        return Err(anyhow::Error::new(Error::MalformedStore(
            "KBX blob shorter than its own header and checksum".into(),
        )));
    }
    if total_length > MAX_BLOB_SIZE {
        return Err(anyhow::Error::new(Error::MalformedStore(format!(
            "KBX blob of {total_length} bytes exceeds the 5 MiB hard limit"
        ))));
    }

    let mut type_byte = [0u8; 1];
    if !read_exact_or_malformed(source, &mut type_byte)? {
        return Err(anyhow::Error::new(Error::MalformedStore(
            "KBX blob truncated before type byte".into(),
        )));
    }
    let kind = BlobType::from_byte(type_byte[0])?;

    let rest_len = total_length - 5 - 20;
    let mut rest = vec![0u8; rest_len];
    if rest_len > 0 && !read_exact_or_malformed(source, &mut rest)? {
        return Err(anyhow::Error::new(Error::MalformedStore(
            "KBX blob truncated before its declared length".into(),
        )));
    }

    let mut checksum = [0u8; 20];
    if !read_exact_or_malformed(source, &mut checksum)? {
        return Err(anyhow::Error::new(Error::MalformedStore(
            "KBX blob truncated before its trailing checksum".into(),
        )));
    }

    let mut hasher = Sha1CD::new();
    hasher.update(&len_buf);
    hasher.update(&type_byte);
    hasher.update(&rest);
    if hasher.finalize().as_slice() != &checksum[..] {
        return Err(anyhow::Error::new(Error::MalformedStore(
            "KBX blob checksum mismatch".into(),
        )));
    }

    Ok(Some(RawBlob { kind, body: rest }))
}

/// The file-creation time recorded in the header blob. Read once, at
/// its single RFC-defined offset.
#[derive(Debug, Clone, Copy)]
pub struct HeaderBlob {
    pub flags: u16,
    pub file_created_at: u32,
}

fn parse_header_blob(body: &[u8]) -> Result<HeaderBlob> {
    if body.len() < 1 + 4 + 1 + 2 + 4 {
        return Err(anyhow::Error::new(Error::MalformedStore(
            "KBX header blob too short".into(),
        )));
    }
    if body[0] != HEADER_VERSION {
        return Err(anyhow::Error::new(Error::MalformedStore(format!(
            "KBX header blob has version {}, expected 1", body[0]
        ))));
    }
    if &body[1..5] != MAGIC {
        return Err(anyhow::Error::new(Error::MalformedStore(
            "KBX header blob magic mismatch".into(),
        )));
    }
    let flags = read_u16(body, 5)?;
    // The RFC layout places a single `file_created_at` field after
    // the flags; GnuPG's own reference reads it again at an
    // overlapping offset as a leftover of an earlier format revision
    // -- that second read is not reproduced here.
    let file_created_at = read_u32(body, 7)?;
    Ok(HeaderBlob { flags, file_created_at })
}

fn serialize_header_blob(header: &HeaderBlob) -> Vec<u8> {
    let mut body = Vec::with_capacity(11);
    body.push(HEADER_VERSION);
    body.extend_from_slice(MAGIC);
    body.extend_from_slice(&header.flags.to_be_bytes());
    body.extend_from_slice(&header.file_created_at.to_be_bytes());
    body
}

struct OpenPGPBlob {
    keyblock: Vec<u8>,
}

fn parse_openpgp_blob(body: &[u8]) -> Result<OpenPGPBlob> {
    // version, flags
    if body.len() < 2 + 4 + 4 + 2 + 2 {
        return Err(anyhow::Error::new(Error::MalformedStore(
            "KBX openpgp blob too short for its fixed header".into(),
        )));
    }
    let keyblock_offset = read_u32(body, 2)? as usize;
    let keyblock_length = read_u32(body, 6)? as usize;
    let nkeys = read_u16(body, 10)?;
    let key_record_size = read_u16(body, 12)?;

    if nkeys == 0 {
        return Err(anyhow::Error::new(Error::MalformedStore(
            "KBX openpgp blob declares zero keys".into(),
        )));
    }
    if key_record_size < KEY_RECORD_SIZE {
        return Err(anyhow::Error::new(Error::MalformedStore(format!(
            "KBX key-record-size {key_record_size} is smaller than the minimum 28"
        ))));
    }

    let mut off = 14usize + nkeys as usize * key_record_size as usize;
    let serial_size = read_u16(body, off)? as usize;
    off += 2 + serial_size;

    let nuids = read_u16(body, off)?;
    off += 2;
    let uid_record_size = read_u16(body, off)?;
    off += 2;
    if uid_record_size < UID_RECORD_SIZE {
        return Err(anyhow::Error::new(Error::MalformedStore(format!(
            "KBX uid-record-size {uid_record_size} is smaller than the minimum 12"
        ))));
    }
    off += nuids as usize * uid_record_size as usize;

    let nsigs = read_u16(body, off)?;
    off += 2;
    let sig_record_size = read_u16(body, off)?;
    if sig_record_size < SIG_RECORD_SIZE {
        return Err(anyhow::Error::new(Error::MalformedStore(format!(
            "KBX sig-record-size {sig_record_size} is smaller than the minimum 4"
        ))));
    }

    let keyblock_end = keyblock_offset
        .checked_add(keyblock_length)
        .ok_or_else(|| anyhow::Error::new(Error::MalformedStore("KBX keyblock extent overflows".into())))?;
    let keyblock = body.get(keyblock_offset..keyblock_end).ok_or_else(|| {
        anyhow::Error::new(Error::MalformedStore(
            "KBX keyblock extent falls outside the blob".into(),
        ))
    })?;

    let _ = nsigs; // record count only; individual expiry records are not modeled here
    Ok(OpenPGPBlob { keyblock: keyblock.to_vec() })
}

/// Loads a keyring from a `.kbx` file. Non-OpenPGP blobs (header,
/// empty, X.509) are skipped; X.509 blobs are opaque to this crate
/// and are not round-tripped back out by [`save`] -- a keyring is an
/// OpenPGP-only view of the file.
pub fn load<R: Read>(mut source: R) -> Result<Keyring> {
    let mut keyring = Keyring::new();
    while let Some(blob) = read_blob(&mut source)? {
        match blob.kind {
            BlobType::OpenPGP => {
                let parsed = parse_openpgp_blob(&blob.body)?;
                let mut reader = buffered_reader::Memory::new(&parsed.keyblock);
                let packets = super::read_all_packets(&mut reader)?;
                for cert in super::group_into_certs(packets)? {
                    keyring.merge(cert)?;
                }
            }
            BlobType::Header | BlobType::Empty | BlobType::X509 => {}
        }
    }
    Ok(keyring)
}

fn write_blob(sink: &mut dyn Write, kind: BlobType, body: &[u8]) -> Result<()> {
    let total_length = (5 + body.len() + 20) as u32;
    let mut hasher = Sha1CD::new();
    hasher.update(&total_length.to_be_bytes());
    hasher.update(&[kind.as_byte()]);
    hasher.update(body);
    let checksum = hasher.finalize();

    sink.write_all(&total_length.to_be_bytes())
        .and_then(|_| sink.write_all(&[kind.as_byte()]))
        .and_then(|_| sink.write_all(body))
        .and_then(|_| sink.write_all(checksum.as_slice()))
        .map_err(|e| anyhow::Error::new(Error::Io(e)))
}

/// Writes every certificate in `keyring` as a single OpenPGP blob,
/// preceded by a header blob. Offsets into the keyblock's embedded
/// key/user-id records are fixed up after the keyblock itself (a flat
/// packet sequence, via [`super::write_cert_packets`]) is serialized.
pub fn save(keyring: &Keyring, sink: &mut dyn Write, file_created_at: u32) -> Result<()> {
    write_blob(sink, BlobType::Header, &serialize_header_blob(&HeaderBlob {
        flags: 0,
        file_created_at,
    }))?;

    if keyring.is_empty() {
        return Ok(());
    }

    let mut keyblock = Vec::new();
    let mut key_records: Vec<[u8; KEY_RECORD_SIZE as usize]> = Vec::new();
    for cert in keyring.certs_in_save_order() {
        super::write_cert_packets(cert, &mut keyblock)
            .map_err(|e| anyhow::Error::new(Error::Io(e)))?;
        let mut record = [0u8; KEY_RECORD_SIZE as usize];
        let fp = cert.fingerprint().as_bytes();
        let n = fp.len().min(20);
        record[..n].copy_from_slice(&fp[..n]);
        key_records.push(record);
    }

    let nkeys = key_records.len() as u16;
    let header_fixed_len = 2 + 4 + 4 + 2 + 2;
    let keys_len = nkeys as usize * KEY_RECORD_SIZE as usize;
    let trailer_len = 2 /* serial_size */ + 2 /* nuids */ + 2 /* uid_record_size */
        + 2 /* nsigs */ + 2 /* sig_record_size */
        + 1 /* ownertrust */ + 1 /* all_validity */ + 2 /* reserved */
        + 4 /* recheck_after */ + 4 /* latest_timestamp */ + 4 /* blob_created_at */;
    let keyblock_offset = header_fixed_len + keys_len + trailer_len;

    let mut body = Vec::with_capacity(keyblock_offset + keyblock.len());
    body.push(HEADER_VERSION);
    body.push(0); // flags
    body.extend_from_slice(&(keyblock_offset as u32).to_be_bytes());
    body.extend_from_slice(&(keyblock.len() as u32).to_be_bytes());
    body.extend_from_slice(&nkeys.to_be_bytes());
    body.extend_from_slice(&KEY_RECORD_SIZE.to_be_bytes());
    for record in &key_records {
        body.extend_from_slice(record);
    }
    body.extend_from_slice(&0u16.to_be_bytes()); // serial_size
    body.extend_from_slice(&0u16.to_be_bytes()); // nuids
    body.extend_from_slice(&UID_RECORD_SIZE.to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes()); // nsigs
    body.extend_from_slice(&SIG_RECORD_SIZE.to_be_bytes());
    body.push(0); // ownertrust
    body.push(0); // all_validity
    body.extend_from_slice(&0u16.to_be_bytes()); // reserved
    body.extend_from_slice(&0u32.to_be_bytes()); // recheck_after
    body.extend_from_slice(&0u32.to_be_bytes()); // latest_timestamp
    body.extend_from_slice(&file_created_at.to_be_bytes());
    body.extend_from_slice(&keyblock);

    write_blob(sink, BlobType::OpenPGP, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_blob_round_trips() {
        let header = HeaderBlob { flags: 0, file_created_at: 12345 };
        let serialized = serialize_header_blob(&header);
        let parsed = parse_header_blob(&serialized).unwrap();
        assert_eq!(parsed.file_created_at, 12345);
    }

    #[test]
    fn load_rejects_oversized_blob() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_BLOB_SIZE as u32 + 1).to_be_bytes());
        let err = read_blob(&mut std::io::Cursor::new(buf)).unwrap_err();
        assert!(format!("{err}").contains("5 MiB"));
    }

    #[test]
    fn load_of_empty_file_yields_empty_keyring() {
        let keyring = load(std::io::Cursor::new(Vec::<u8>::new())).unwrap();
        assert!(keyring.is_empty());
    }

    #[test]
    fn openpgp_blob_with_zero_keys_is_rejected() {
        let mut body = vec![0u8; 14];
        body[0] = HEADER_VERSION;
        // nkeys = 0 at offset 10
        let err = parse_openpgp_blob(&body).unwrap_err();
        assert!(format!("{err}").contains("zero keys"));
    }
}
