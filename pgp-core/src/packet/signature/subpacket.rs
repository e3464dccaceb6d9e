//! Signature subpackets (RFC 4880 §5.2.3.1, RFC 4880bis extensions).

use std::io::{self, Write};

use crate::error::{Error, Result};
use crate::fingerprint::{Fingerprint, KeyID};
use crate::types::{HashAlgorithm, KeyFlags, SymmetricAlgorithm, Timestamp};

/// A subpacket's type (RFC 4880 §5.2.3.1, plus RFC 4880bis additions).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubpacketTag {
    SignatureCreationTime,
    SignatureExpirationTime,
    ExportableCertification,
    TrustSignature,
    RegularExpression,
    Revocable,
    KeyExpirationTime,
    PreferredSymmetricAlgorithms,
    RevocationKey,
    Issuer,
    NotationData,
    PreferredHashAlgorithms,
    PreferredCompressionAlgorithms,
    KeyServerPreferences,
    PreferredKeyServer,
    PrimaryUserID,
    PolicyURI,
    KeyFlags,
    SignersUserID,
    ReasonForRevocation,
    Features,
    SignatureTarget,
    EmbeddedSignature,
    IssuerFingerprint,
    PreferredAEADAlgorithms,
    IntendedRecipient,
    Unknown(u8),
}

impl From<u8> for SubpacketTag {
    fn from(v: u8) -> Self {
        use SubpacketTag::*;
        match v & 0x7F {
            2 => SignatureCreationTime,
            3 => SignatureExpirationTime,
            4 => ExportableCertification,
            5 => TrustSignature,
            6 => RegularExpression,
            7 => Revocable,
            9 => KeyExpirationTime,
            11 => PreferredSymmetricAlgorithms,
            12 => RevocationKey,
            16 => Issuer,
            20 => NotationData,
            21 => PreferredHashAlgorithms,
            22 => PreferredCompressionAlgorithms,
            23 => KeyServerPreferences,
            24 => PreferredKeyServer,
            25 => PrimaryUserID,
            26 => PolicyURI,
            27 => SubpacketTag::KeyFlags,
            28 => SignersUserID,
            29 => ReasonForRevocation,
            30 => Features,
            31 => SignatureTarget,
            32 => EmbeddedSignature,
            33 => IssuerFingerprint,
            34 => PreferredAEADAlgorithms,
            35 => IntendedRecipient,
            other => Unknown(other),
        }
    }
}

impl From<SubpacketTag> for u8 {
    fn from(t: SubpacketTag) -> u8 {
        use SubpacketTag::*;
        match t {
            SignatureCreationTime => 2,
            SignatureExpirationTime => 3,
            ExportableCertification => 4,
            TrustSignature => 5,
            RegularExpression => 6,
            Revocable => 7,
            KeyExpirationTime => 9,
            PreferredSymmetricAlgorithms => 11,
            RevocationKey => 12,
            Issuer => 16,
            NotationData => 20,
            PreferredHashAlgorithms => 21,
            PreferredCompressionAlgorithms => 22,
            KeyServerPreferences => 23,
            PreferredKeyServer => 24,
            PrimaryUserID => 25,
            PolicyURI => 26,
            SubpacketTag::KeyFlags => 27,
            SignersUserID => 28,
            ReasonForRevocation => 29,
            Features => 30,
            SignatureTarget => 31,
            EmbeddedSignature => 32,
            IssuerFingerprint => 33,
            PreferredAEADAlgorithms => 34,
            IntendedRecipient => 35,
            Unknown(v) => v,
        }
    }
}

/// One subpacket: its type, critical-bit, and value.
#[derive(Clone, Debug, PartialEq)]
pub struct Subpacket {
    /// The subpacket's type.
    pub tag: SubpacketTag,
    /// Whether the critical bit (the high bit of the type octet) was
    /// set. Per RFC 4880 §5.2.3.1, a signature with a critical
    /// subpacket the reader does not understand must be treated as
    /// invalid; one with a non-critical unknown subpacket simply
    /// ignores it.
    pub critical: bool,
    /// The subpacket's value, interpreted where this crate
    /// understands `tag`, and raw bytes otherwise.
    pub value: SubpacketValue,
}

/// A subpacket's parsed value.
#[derive(Clone, Debug, PartialEq)]
pub enum SubpacketValue {
    SignatureCreationTime(Timestamp),
    SignatureExpirationTime(u32),
    ExportableCertification(bool),
    Revocable(bool),
    KeyExpirationTime(u32),
    PreferredSymmetricAlgorithms(Vec<SymmetricAlgorithm>),
    Issuer(KeyID),
    PreferredHashAlgorithms(Vec<HashAlgorithm>),
    PreferredCompressionAlgorithms(Vec<crate::types::CompressionAlgorithm>),
    PreferredAEADAlgorithms(Vec<crate::types::AEADAlgorithm>),
    PrimaryUserID(bool),
    KeyFlags(KeyFlags),
    ReasonForRevocation { code: u8, reason: String },
    Features(u8),
    IssuerFingerprint(Fingerprint),
    /// A subpacket type this crate does not interpret, or one whose
    /// known shape still needs byte-for-byte round-trip (e.g.
    /// `NotationData`, `EmbeddedSignature`, `PolicyURI`).
    Unparsed(Box<[u8]>),
}

/// The hashed or unhashed area of a signature packet: an ordered list
/// of subpackets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubpacketArea(pub Vec<Subpacket>);

impl SubpacketArea {
    /// An empty area.
    pub fn new() -> SubpacketArea {
        SubpacketArea(Vec::new())
    }

    /// Finds the first subpacket with the given tag.
    pub fn get(&self, tag: SubpacketTag) -> Option<&Subpacket> {
        self.0.iter().find(|s| s.tag == tag)
    }

    /// Appends a subpacket.
    pub fn push(&mut self, sp: Subpacket) {
        self.0.push(sp);
    }

    /// Parses a subpacket area of exactly `len` bytes from `data`.
    pub fn parse(data: &[u8]) -> Result<SubpacketArea> {
        let mut area = SubpacketArea::new();
        let mut pos = 0;
        while pos < data.len() {
            let (sp_len, len_octets) = parse_subpacket_length(&data[pos..])?;
            pos += len_octets;
            if pos + sp_len > data.len() {
                return Err(anyhow::Error::new(Error::MalformedPacket(
                    "subpacket length exceeds area".into(),
                )));
            }
            let sp_data = &data[pos..pos + sp_len];
            pos += sp_len;
            if sp_data.is_empty() {
                return Err(anyhow::Error::new(Error::MalformedPacket(
                    "zero-length subpacket".into(),
                )));
            }
            let tag_octet = sp_data[0];
            let critical = tag_octet & 0x80 != 0;
            let tag = SubpacketTag::from(tag_octet);
            let body = &sp_data[1..];
            let value = parse_subpacket_value(tag, body)?;
            area.push(Subpacket { tag, critical, value });
        }
        Ok(area)
    }

    /// Serializes this area's subpackets (without the 2-byte area
    /// length prefix a caller writes separately).
    pub fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        for sp in &self.0 {
            let mut body = Vec::new();
            serialize_subpacket_value(&sp.value, &mut body)?;
            let tag_octet = u8::from(sp.tag) | if sp.critical { 0x80 } else { 0 };
            let total_len = body.len() + 1;
            write_subpacket_length(w, total_len)?;
            w.write_all(&[tag_octet])?;
            w.write_all(&body)?;
        }
        Ok(())
    }

    /// The serialized size of this area, including each subpacket's
    /// own length prefix (but not the area's own 2-byte length).
    pub fn serialized_len(&self) -> usize {
        let mut buf = Vec::new();
        self.serialize(&mut buf).expect("Vec<u8> Write is infallible");
        buf.len()
    }
}

fn parse_subpacket_length(data: &[u8]) -> Result<(usize, usize)> {
    if data.is_empty() {
        return Err(anyhow::Error::new(Error::MalformedPacket(
            "truncated subpacket length".into(),
        )));
    }
    let first = data[0];
    match first {
        0..=191 => Ok((first as usize, 1)),
        192..=254 => {
            if data.len() < 2 {
                return Err(anyhow::Error::new(Error::MalformedPacket(
                    "truncated subpacket length".into(),
                )));
            }
            Ok(((first as usize - 192) * 256 + data[1] as usize + 192, 2))
        }
        255 => {
            if data.len() < 5 {
                return Err(anyhow::Error::new(Error::MalformedPacket(
                    "truncated subpacket length".into(),
                )));
            }
            let len = u32::from_be_bytes([data[1], data[2], data[3], data[4]]) as usize;
            Ok((len, 5))
        }
    }
}

fn write_subpacket_length(w: &mut dyn Write, len: usize) -> io::Result<()> {
    if len < 192 {
        w.write_all(&[len as u8])
    } else if len < 8384 {
        let len = len - 192;
        w.write_all(&[(len / 256 + 192) as u8, (len % 256) as u8])
    } else {
        let mut buf = [255u8; 5];
        buf[1..].copy_from_slice(&(len as u32).to_be_bytes());
        w.write_all(&buf)
    }
}

fn parse_subpacket_value(tag: SubpacketTag, body: &[u8]) -> Result<SubpacketValue> {
    use SubpacketTag::*;
    Ok(match tag {
        SignatureCreationTime if body.len() == 4 => {
            SubpacketValue::SignatureCreationTime(Timestamp(u32::from_be_bytes(body.try_into().unwrap())))
        }
        SignatureExpirationTime if body.len() == 4 => {
            SubpacketValue::SignatureExpirationTime(u32::from_be_bytes(body.try_into().unwrap()))
        }
        ExportableCertification if body.len() == 1 => {
            SubpacketValue::ExportableCertification(body[0] != 0)
        }
        Revocable if body.len() == 1 => SubpacketValue::Revocable(body[0] != 0),
        KeyExpirationTime if body.len() == 4 => {
            SubpacketValue::KeyExpirationTime(u32::from_be_bytes(body.try_into().unwrap()))
        }
        PreferredSymmetricAlgorithms => SubpacketValue::PreferredSymmetricAlgorithms(
            body.iter().map(|&b| SymmetricAlgorithm::from(b)).collect(),
        ),
        Issuer if body.len() == 8 => SubpacketValue::Issuer(KeyID::from_bytes(body)),
        PreferredHashAlgorithms => {
            SubpacketValue::PreferredHashAlgorithms(body.iter().map(|&b| HashAlgorithm::from(b)).collect())
        }
        PreferredCompressionAlgorithms => SubpacketValue::PreferredCompressionAlgorithms(
            body.iter().map(|&b| crate::types::CompressionAlgorithm::from(b)).collect(),
        ),
        PreferredAEADAlgorithms => SubpacketValue::PreferredAEADAlgorithms(
            body.iter().map(|&b| crate::types::AEADAlgorithm::from(b)).collect(),
        ),
        PrimaryUserID if body.len() == 1 => SubpacketValue::PrimaryUserID(body[0] != 0),
        SubpacketTag::KeyFlags if !body.is_empty() => {
            SubpacketValue::KeyFlags(KeyFlags::from_bits(body[0]))
        }
        ReasonForRevocation if !body.is_empty() => SubpacketValue::ReasonForRevocation {
            code: body[0],
            reason: String::from_utf8_lossy(&body[1..]).into_owned(),
        },
        Features if !body.is_empty() => SubpacketValue::Features(body[0]),
        IssuerFingerprint if body.len() >= 2 => {
            SubpacketValue::IssuerFingerprint(Fingerprint::from_bytes(&body[1..]))
        }
        _ => SubpacketValue::Unparsed(body.to_vec().into_boxed_slice()),
    })
}

fn serialize_subpacket_value(value: &SubpacketValue, w: &mut dyn Write) -> io::Result<()> {
    match value {
        SubpacketValue::SignatureCreationTime(t) => w.write_all(&t.0.to_be_bytes()),
        SubpacketValue::SignatureExpirationTime(t) => w.write_all(&t.to_be_bytes()),
        SubpacketValue::ExportableCertification(b) => w.write_all(&[*b as u8]),
        SubpacketValue::Revocable(b) => w.write_all(&[*b as u8]),
        SubpacketValue::KeyExpirationTime(t) => w.write_all(&t.to_be_bytes()),
        SubpacketValue::PreferredSymmetricAlgorithms(v) => {
            for a in v {
                w.write_all(&[u8::from(*a)])?;
            }
            Ok(())
        }
        SubpacketValue::Issuer(id) => w.write_all(id.as_bytes()),
        SubpacketValue::PreferredHashAlgorithms(v) => {
            for a in v {
                w.write_all(&[u8::from(*a)])?;
            }
            Ok(())
        }
        SubpacketValue::PreferredCompressionAlgorithms(v) => {
            for a in v {
                w.write_all(&[u8::from(*a)])?;
            }
            Ok(())
        }
        SubpacketValue::PreferredAEADAlgorithms(v) => {
            for a in v {
                w.write_all(&[u8::from(*a)])?;
            }
            Ok(())
        }
        SubpacketValue::PrimaryUserID(b) => w.write_all(&[*b as u8]),
        SubpacketValue::KeyFlags(f) => w.write_all(&[f.bits()]),
        SubpacketValue::ReasonForRevocation { code, reason } => {
            w.write_all(&[*code])?;
            w.write_all(reason.as_bytes())
        }
        SubpacketValue::Features(f) => w.write_all(&[*f]),
        SubpacketValue::IssuerFingerprint(fp) => {
            w.write_all(&[4])?; // version 4 fingerprint
            w.write_all(fp.as_bytes())
        }
        SubpacketValue::Unparsed(bytes) => w.write_all(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuer_round_trips() {
        let mut area = SubpacketArea::new();
        area.push(Subpacket {
            tag: SubpacketTag::Issuer,
            critical: false,
            value: SubpacketValue::Issuer(KeyID::from_bytes(&[1, 2, 3, 4, 5, 6, 7, 8])),
        });
        let mut buf = Vec::new();
        area.serialize(&mut buf).unwrap();
        let parsed = SubpacketArea::parse(&buf).unwrap();
        assert_eq!(parsed, area);
    }

    #[test]
    fn unknown_critical_round_trips_as_unparsed() {
        let data = [0x02, 100, 0xAB]; // len=2, tag=100 (unknown, non-critical), value 0xAB
        let area = SubpacketArea::parse(&data).unwrap();
        assert_eq!(area.0.len(), 1);
        assert!(!area.0[0].critical);
        assert_eq!(area.0[0].tag, SubpacketTag::Unknown(100));
    }
}
