//! The packet codec: RFC 4880's on-the-wire content types.

pub mod header;
pub mod key;
pub mod key_material;
pub mod signature;
pub mod userid;

use std::io::{self, Write};

use buffered_reader::BufferedReader;

pub use header::{BodyLength, Header, Tag};
pub use key::KeyPacket;
pub use signature::Signature;
pub use userid::{UserAttribute, UserID};

use crate::error::{Error, Result};
use crate::types::{AEADAlgorithm, CompressionAlgorithm, PublicKeyAlgorithm, SymmetricAlgorithm};

/// A packet this crate parsed structurally but does not interpret
/// further: an unrecognized tag, or a recognized tag using options
/// (an algorithm, a version) this crate does not support. Preserves
/// the tag and raw body for a byte-identical round trip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unknown {
    tag_byte: u8,
    body: Box<[u8]>,
}

impl Unknown {
    /// This packet's original tag.
    pub fn tag(&self) -> Tag {
        Tag::from(self.tag_byte)
    }

    /// The packet's raw body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// A Marker packet (RFC 4880 §5.8): obsolete, always ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marker;

/// A Trust packet (RFC 4880 §5.10): implementation-local trust data,
/// carried through verbatim but never interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trust(pub Box<[u8]>);

/// A Literal Data packet (RFC 4880 §5.9).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Literal {
    /// The data format octet (`b`inary, `t`ext, `u`tf8).
    pub format: u8,
    /// The original filename, if any.
    pub filename: Box<[u8]>,
    /// The data's creation/modification time.
    pub date: crate::types::Timestamp,
    /// The literal content.
    pub body: Box<[u8]>,
}

impl Literal {
    fn parse<C>(source: &mut dyn BufferedReader<C>, len: usize) -> Result<Literal> {
        let format = {
            let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            buf[0]
        };
        source.consume(1);
        let name_len = {
            let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            buf[0] as usize
        };
        source.consume(1);
        let filename = source
            .data_consume_hard(name_len)
            .map_err(|e| anyhow::Error::new(Error::Io(e)))?[..name_len]
            .to_vec()
            .into_boxed_slice();
        let date = crate::types::Timestamp(source.read_be_u32().map_err(|e| anyhow::Error::new(Error::Io(e)))?);

        let consumed_so_far = 1 + 1 + name_len + 4;
        if consumed_so_far > len {
            return Err(anyhow::Error::new(Error::MalformedPacket(
                "literal data packet header exceeds its declared length".into(),
            )));
        }
        let body_len = len - consumed_so_far;
        let body = source
            .data_consume_hard(body_len)
            .map_err(|e| anyhow::Error::new(Error::Io(e)))?[..body_len]
            .to_vec()
            .into_boxed_slice();

        Ok(Literal { format, filename, date, body })
    }

    fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&[self.format, self.filename.len() as u8])?;
        w.write_all(&self.filename)?;
        w.write_all(&self.date.0.to_be_bytes())?;
        w.write_all(&self.body)
    }
}

/// A Compressed Data packet (RFC 4880 §5.6): its body, once
/// decompressed with [`Self::algo`], is itself an OpenPGP packet
/// sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressedData {
    /// The compression algorithm.
    pub algo: CompressionAlgorithm,
    /// The compressed body.
    pub body: Box<[u8]>,
}

/// A One-Pass Signature packet (RFC 4880 §5.4): precedes the signed
/// data in a stream so a verifier can start hashing before having
/// seen the trailing [`Signature`] packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnePassSig {
    /// Packet version (always 3).
    pub version: u8,
    /// The kind of thing being signed.
    pub sig_type: crate::types::SignatureType,
    /// The hash algorithm that will be used.
    pub hash_algo: crate::types::HashAlgorithm,
    /// The signing key's algorithm.
    pub pk_algo: PublicKeyAlgorithm,
    /// The signing key's ID.
    pub issuer: crate::fingerprint::KeyID,
    /// Whether another one-pass signature packet (and therefore
    /// another hash context) follows before the literal data.
    pub nested: bool,
}

impl OnePassSig {
    fn parse<C>(source: &mut dyn BufferedReader<C>) -> Result<OnePassSig> {
        let buf = source.data_hard(13).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
        let version = buf[0];
        let sig_type = buf[1];
        let hash_algo = buf[2];
        let pk_algo = buf[3];
        let issuer = crate::fingerprint::KeyID::from_bytes(&buf[4..12]);
        let nested = buf[12] == 0;
        source.consume(13);
        Ok(OnePassSig {
            version,
            sig_type: crate::types::SignatureType::from(sig_type),
            hash_algo: crate::types::HashAlgorithm::from(hash_algo),
            pk_algo: PublicKeyAlgorithm::from(pk_algo),
            issuer,
            nested,
        })
    }

    fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&[
            self.version,
            u8::from(self.sig_type),
            u8::from(self.hash_algo),
            u8::from(self.pk_algo),
        ])?;
        w.write_all(self.issuer.as_bytes())?;
        w.write_all(&[if self.nested { 0 } else { 1 }])
    }
}

/// A Public-Key Encrypted Session Key packet (RFC 4880 §5.1).
#[derive(Clone, Debug, PartialEq)]
pub struct PKESK {
    /// Packet version (always 3).
    pub version: u8,
    /// The recipient key's ID (all-zero if hidden).
    pub recipient: crate::fingerprint::KeyID,
    /// The recipient key's algorithm.
    pub pk_algo: PublicKeyAlgorithm,
    /// The encrypted session key and cipher-specific checksum.
    pub esk: signature::Mpis,
}

impl PKESK {
    fn parse<C>(source: &mut dyn BufferedReader<C>) -> Result<PKESK> {
        let buf = source.data_hard(9).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
        let version = buf[0];
        let recipient = crate::fingerprint::KeyID::from_bytes(&buf[1..9]);
        source.consume(9);
        let algo_byte = {
            let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            buf[0]
        };
        source.consume(1);
        let pk_algo = PublicKeyAlgorithm::from(algo_byte);
        let esk = signature::Mpis::parse_esk(pk_algo, source)?;
        Ok(PKESK { version, recipient, pk_algo, esk })
    }

    fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&[self.version])?;
        w.write_all(self.recipient.as_bytes())?;
        w.write_all(&[u8::from(self.pk_algo)])?;
        self.esk.serialize(w)
    }
}

/// A Symmetric-Key Encrypted Session Key packet (RFC 4880 §5.3).
#[derive(Clone, Debug, PartialEq)]
pub struct SKESK {
    /// Packet version: 4 (CFB) or 5 (AEAD, RFC 4880bis).
    pub version: u8,
    /// The symmetric algorithm the (derived or encrypted) session key
    /// is for.
    pub symm_algo: SymmetricAlgorithm,
    /// v5 only: the AEAD algorithm.
    pub aead_algo: Option<AEADAlgorithm>,
    /// The S2K specifier deriving the key-encryption key.
    pub s2k: crate::mpi::S2K,
    /// v5 only: the AEAD nonce.
    pub aead_nonce: Option<Box<[u8]>>,
    /// The encrypted session key, if the S2K-derived key is not used
    /// directly as the message key (empty for v4 "no ESK" form).
    pub esk: Box<[u8]>,
}

impl SKESK {
    fn parse<C>(source: &mut dyn BufferedReader<C>, body_len: usize) -> Result<SKESK> {
        let version = {
            let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            buf[0]
        };
        source.consume(1);
        let mut consumed = 1;

        let symm_byte = {
            let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            buf[0]
        };
        source.consume(1);
        consumed += 1;
        let symm_algo = SymmetricAlgorithm::from(symm_byte);

        let aead_algo = if version == 5 {
            let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            let a = buf[0];
            source.consume(1);
            consumed += 1;
            Some(AEADAlgorithm::from(a))
        } else {
            None
        };

        let before_s2k = {
            let mut probe = Vec::new();
            probe.extend_from_slice(&[]);
            probe
        };
        let _ = before_s2k;
        let s2k = crate::mpi::S2K::parse(source)?;
        // S2K's own parse doesn't report its length, so recompute it
        // by re-serializing — acceptable since S2K parameters are
        // always small.
        let mut s2k_bytes = Vec::new();
        s2k.serialize(&mut s2k_bytes).expect("Vec<u8> Write is infallible");
        consumed += s2k_bytes.len();

        let aead_nonce = if version == 5 {
            let nonce_len = aead_algo.and_then(|a| a.nonce_size()).ok_or_else(|| {
                anyhow::Error::new(Error::UnsupportedAlgorithm("AEAD algorithm".into()))
            })?;
            let buf = source
                .data_hard(nonce_len)
                .map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            let nonce = buf[..nonce_len].to_vec().into_boxed_slice();
            source.consume(nonce_len);
            consumed += nonce_len;
            Some(nonce)
        } else {
            None
        };

        let esk_len = body_len.saturating_sub(consumed);
        let esk = source
            .data_consume_hard(esk_len)
            .map_err(|e| anyhow::Error::new(Error::Io(e)))?[..esk_len]
            .to_vec()
            .into_boxed_slice();

        Ok(SKESK { version, symm_algo, aead_algo, s2k, aead_nonce, esk })
    }

    fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&[self.version, u8::from(self.symm_algo)])?;
        if let Some(aead) = self.aead_algo {
            w.write_all(&[u8::from(aead)])?;
        }
        self.s2k.serialize(w)?;
        if let Some(nonce) = &self.aead_nonce {
            w.write_all(nonce)?;
        }
        w.write_all(&self.esk)
    }
}

/// A Symmetrically Encrypted Integrity Protected Data packet (RFC
/// 4880 §5.13): version-1 CFB+MDC encryption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SEIP {
    /// Packet version (always 1).
    pub version: u8,
    /// The encrypted body: IV-prefixed ciphertext ending in the
    /// SHA-1-protected MDC plaintext trailer, still encrypted here.
    pub body: Box<[u8]>,
}

/// A Modification Detection Code packet (RFC 4880 §5.14): a 20-byte
/// SHA-1 hash, always found as the last plaintext packet inside a
/// [`SEIP`] body and never on its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MDC(pub [u8; 20]);

/// An AEAD Encrypted Data packet (RFC 4880bis §5.16).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AED {
    /// Packet version (always 1).
    pub version: u8,
    /// The symmetric cipher the AEAD mode wraps.
    pub symm_algo: SymmetricAlgorithm,
    /// The AEAD algorithm.
    pub aead_algo: AEADAlgorithm,
    /// `log2` of the chunk size in bytes.
    pub chunk_size_octet: u8,
    /// The starting nonce (XORed with the chunk index per chunk).
    pub iv: Box<[u8]>,
    /// The chunked ciphertext, each chunk followed by its
    /// authentication tag, plus a final all-zero-length chunk's tag
    /// over the total byte count.
    pub body: Box<[u8]>,
}

/// A parsed OpenPGP packet.
///
/// Like the teacher's own packet enum, this cannot be exhaustively
/// matched: new packet types (and unsupported options on existing
/// ones) fall into [`Packet::Unknown`] rather than failing the whole
/// parse.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Packet {
    /// A packet this crate could not interpret further.
    Unknown(Unknown),
    /// A Signature packet.
    Signature(Signature),
    /// A One-Pass Signature packet.
    OnePassSig(OnePassSig),
    /// A Public-Key packet.
    PublicKey(KeyPacket),
    /// A Public-Subkey packet.
    PublicSubkey(KeyPacket),
    /// A Secret-Key packet.
    SecretKey(KeyPacket),
    /// A Secret-Subkey packet.
    SecretSubkey(KeyPacket),
    /// A Marker packet.
    Marker(Marker),
    /// A Trust packet.
    Trust(Trust),
    /// A User ID packet.
    UserID(UserID),
    /// A User Attribute packet.
    UserAttribute(UserAttribute),
    /// A Literal Data packet.
    Literal(Literal),
    /// A Compressed Data packet.
    CompressedData(CompressedData),
    /// A Public-Key Encrypted Session Key packet.
    PKESK(PKESK),
    /// A Symmetric-Key Encrypted Session Key packet.
    SKESK(SKESK),
    /// A Symmetrically Encrypted Integrity Protected Data packet.
    SEIP(SEIP),
    /// A Modification Detection Code packet.
    MDC(MDC),
    /// An AEAD Encrypted Data packet.
    AED(AED),
}

impl Packet {
    /// This packet's content tag.
    pub fn tag(&self) -> Tag {
        match self {
            Packet::Unknown(u) => u.tag(),
            Packet::Signature(_) => Tag::Signature,
            Packet::OnePassSig(_) => Tag::OnePassSig,
            Packet::PublicKey(_) => Tag::PublicKey,
            Packet::PublicSubkey(_) => Tag::PublicSubkey,
            Packet::SecretKey(_) => Tag::SecretKey,
            Packet::SecretSubkey(_) => Tag::SecretSubkey,
            Packet::Marker(_) => Tag::Marker,
            Packet::Trust(_) => Tag::Trust,
            Packet::UserID(_) => Tag::UserID,
            Packet::UserAttribute(_) => Tag::UserAttribute,
            Packet::Literal(_) => Tag::Literal,
            Packet::CompressedData(_) => Tag::CompressedData,
            Packet::PKESK(_) => Tag::PKESK,
            Packet::SKESK(_) => Tag::SKESK,
            Packet::SEIP(_) => Tag::SEIP,
            Packet::MDC(_) => Tag::MDC,
            Packet::AED(_) => Tag::AED,
        }
    }

    /// Reads one packet from `source`, consuming exactly its header
    /// and body (reassembling partial-length chunks as needed).
    ///
    /// Returns `Ok(None)` at a clean end of stream (no bytes at all
    /// before the header); a header that starts but does not
    /// complete is [`Error::MalformedPacket`] (truncation mid-header)
    /// rather than a clean EOF.
    pub fn parse<C>(source: &mut dyn BufferedReader<C>) -> Result<Option<Packet>> {
        if source.eof().map_err(|e| anyhow::Error::new(Error::Io(e)))? {
            return Ok(None);
        }

        let header = Header::parse(source)?;
        let body_bytes = match header.length {
            BodyLength::Full(len) => source
                .data_consume_hard(len as usize)
                .map_err(|e| anyhow::Error::new(Error::Io(e)))?[..len as usize]
                .to_vec(),
            BodyLength::Partial(first_chunk) => {
                header::reassemble_partial_body(source, first_chunk)?
            }
            BodyLength::Indeterminate => source
                .data_eof()
                .map_err(|e| anyhow::Error::new(Error::Io(e)))?
                .to_vec(),
        };
        if matches!(header.length, BodyLength::Indeterminate) {
            let len = body_bytes.len();
            source.consume(len);
        }

        let mut body_reader = buffered_reader::Memory::new(&body_bytes);
        let len = body_bytes.len();

        let packet = match header.tag {
            Tag::Signature => Signature::parse(&mut body_reader).map(Packet::Signature),
            Tag::OnePassSig => OnePassSig::parse(&mut body_reader).map(Packet::OnePassSig),
            Tag::PublicKey => {
                KeyPacket::parse(&mut body_reader, len, false).map(Packet::PublicKey)
            }
            Tag::PublicSubkey => {
                KeyPacket::parse(&mut body_reader, len, false).map(Packet::PublicSubkey)
            }
            Tag::SecretKey => {
                KeyPacket::parse(&mut body_reader, len, true).map(Packet::SecretKey)
            }
            Tag::SecretSubkey => {
                KeyPacket::parse(&mut body_reader, len, true).map(Packet::SecretSubkey)
            }
            Tag::Marker => Ok(Packet::Marker(Marker)),
            Tag::Trust => Ok(Packet::Trust(Trust(body_bytes.clone().into_boxed_slice()))),
            Tag::UserID => UserID::parse(&mut body_reader, len).map(Packet::UserID),
            Tag::UserAttribute => {
                UserAttribute::parse(&mut body_reader, len).map(Packet::UserAttribute)
            }
            Tag::Literal => Literal::parse(&mut body_reader, len).map(Packet::Literal),
            Tag::CompressedData => {
                let algo_byte = {
                    let buf = body_reader.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                    buf[0]
                };
                body_reader.consume(1);
                let rest = body_reader.data_eof().map_err(|e| anyhow::Error::new(Error::Io(e)))?.to_vec();
                Ok(Packet::CompressedData(CompressedData {
                    algo: CompressionAlgorithm::from(algo_byte),
                    body: rest.into_boxed_slice(),
                }))
            }
            Tag::PKESK => PKESK::parse(&mut body_reader).map(Packet::PKESK),
            Tag::SKESK => SKESK::parse(&mut body_reader, len).map(Packet::SKESK),
            Tag::SEIP => {
                let version_buf =
                    body_reader.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                let version = version_buf[0];
                body_reader.consume(1);
                let rest = body_reader.data_eof().map_err(|e| anyhow::Error::new(Error::Io(e)))?.to_vec();
                Ok(Packet::SEIP(SEIP { version, body: rest.into_boxed_slice() }))
            }
            Tag::MDC => {
                if len != 20 {
                    Err(anyhow::Error::new(Error::MalformedPacket(
                        "MDC packet must be exactly 20 bytes".into(),
                    )))
                } else {
                    let mut digest = [0u8; 20];
                    digest.copy_from_slice(&body_bytes[..20]);
                    Ok(Packet::MDC(MDC(digest)))
                }
            }
            Tag::AED => {
                let buf = body_reader.data_hard(4).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                let (version, symm, aead, chunk) = (buf[0], buf[1], buf[2], buf[3]);
                body_reader.consume(4);
                let symm_algo = SymmetricAlgorithm::from(symm);
                let aead_algo = AEADAlgorithm::from(aead);
                let nonce_len = aead_algo.nonce_size().ok_or_else(|| {
                    anyhow::Error::new(Error::UnsupportedAlgorithm("AEAD algorithm".into()))
                })?;
                let iv_buf =
                    body_reader.data_hard(nonce_len).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                let iv = iv_buf[..nonce_len].to_vec().into_boxed_slice();
                body_reader.consume(nonce_len);
                let rest = body_reader
                    .data_eof()
                    .map_err(|e| anyhow::Error::new(Error::Io(e)))?
                    .to_vec();
                Ok(Packet::AED(AED {
                    version,
                    symm_algo,
                    aead_algo,
                    chunk_size_octet: chunk,
                    iv,
                    body: rest.into_boxed_slice(),
                }))
            }
            Tag::Unknown(_) | Tag::Private(_) | Tag::SED => Err(anyhow::Error::new(
                Error::UnsupportedAlgorithm("packet tag".into()),
            )),
        };

        match packet {
            Ok(p) => Ok(Some(p)),
            Err(_) => Ok(Some(Packet::Unknown(Unknown {
                tag_byte: u8::from(header.tag),
                body: body_bytes.into_boxed_slice(),
            }))),
        }
    }

    /// Serializes this packet, including its header, to `w`. Always
    /// uses new-format framing with a definite length, matching the
    /// teacher's own serializer.
    pub fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        let mut body = Vec::new();
        match self {
            Packet::Unknown(u) => body.extend_from_slice(&u.body),
            Packet::Signature(s) => s.serialize(&mut body)?,
            Packet::OnePassSig(o) => o.serialize(&mut body)?,
            Packet::PublicKey(k) | Packet::PublicSubkey(k) => k.serialize_public(&mut body)?,
            Packet::SecretKey(k) | Packet::SecretSubkey(k) => k.serialize(&mut body)?,
            Packet::Marker(_) => body.extend_from_slice(b"PGP"),
            Packet::Trust(t) => body.extend_from_slice(&t.0),
            Packet::UserID(u) => u.serialize(&mut body)?,
            Packet::UserAttribute(u) => u.serialize(&mut body)?,
            Packet::Literal(l) => l.serialize(&mut body)?,
            Packet::CompressedData(c) => {
                body.push(u8::from(c.algo));
                body.extend_from_slice(&c.body);
            }
            Packet::PKESK(p) => p.serialize(&mut body)?,
            Packet::SKESK(s) => s.serialize(&mut body)?,
            Packet::SEIP(s) => {
                body.push(s.version);
                body.extend_from_slice(&s.body);
            }
            Packet::MDC(m) => body.extend_from_slice(&m.0),
            Packet::AED(a) => {
                body.push(a.version);
                body.push(u8::from(a.symm_algo));
                body.push(u8::from(a.aead_algo));
                body.push(a.chunk_size_octet);
                body.extend_from_slice(&a.iv);
                body.extend_from_slice(&a.body);
            }
        }
        let tag = match self {
            Packet::Unknown(u) => u.tag(),
            other => other.tag(),
        };
        header::Header::serialize_new_format(tag, body.len() as u32, w)?;
        w.write_all(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_round_trip() {
        let lit = Literal {
            format: b'b',
            filename: b"test.txt".to_vec().into_boxed_slice(),
            date: crate::types::Timestamp(12345),
            body: b"hello".to_vec().into_boxed_slice(),
        };
        let packet = Packet::Literal(lit.clone());
        let mut buf = Vec::new();
        packet.serialize(&mut buf).unwrap();

        let mut src = buffered_reader::Memory::new(&buf);
        let parsed = Packet::parse(&mut src).unwrap().unwrap();
        assert_eq!(parsed, Packet::Literal(lit));
    }

    #[test]
    fn empty_source_returns_none() {
        let buf: [u8; 0] = [];
        let mut src = buffered_reader::Memory::new(&buf);
        assert!(Packet::parse(&mut src).unwrap().is_none());
    }

    #[test]
    fn unknown_tag_round_trips_verbatim() {
        // Tag 63 (private/experimental), 1-byte old-format length.
        let buf = vec![0x80 | (63 << 2), 3, 0xAA, 0xBB, 0xCC];
        let mut src = buffered_reader::Memory::new(&buf);
        let parsed = Packet::parse(&mut src).unwrap().unwrap();
        match parsed {
            Packet::Unknown(u) => assert_eq!(u.body(), &[0xAA, 0xBB, 0xCC]),
            _ => panic!("expected Unknown"),
        }
    }
}
