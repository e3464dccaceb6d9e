//! Packet framing: content tags and header/length parsing (RFC 4880
//! §4.2, §4.3).

use std::io::{self, Write};

use buffered_reader::BufferedReader;

use crate::error::{Error, Result};

/// A packet's content tag (RFC 4880 §4.3), identifying what kind of
/// packet follows a header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Public-Key Encrypted Session Key Packet.
    PKESK,
    /// Signature Packet.
    Signature,
    /// Symmetric-Key Encrypted Session Key Packet.
    SKESK,
    /// One-Pass Signature Packet.
    OnePassSig,
    /// Secret-Key Packet.
    SecretKey,
    /// Public-Key Packet.
    PublicKey,
    /// Secret-Subkey Packet.
    SecretSubkey,
    /// Compressed Data Packet.
    CompressedData,
    /// Symmetrically Encrypted Data Packet.
    SED,
    /// Marker Packet.
    Marker,
    /// Literal Data Packet.
    Literal,
    /// Trust Packet.
    Trust,
    /// User ID Packet.
    UserID,
    /// Public-Subkey Packet.
    PublicSubkey,
    /// User Attribute Packet.
    UserAttribute,
    /// Sym. Encrypted and Integrity Protected Data Packet.
    SEIP,
    /// Modification Detection Code Packet.
    MDC,
    /// AEAD Encrypted Data Packet (RFC 4880bis).
    AED,
    /// A tag value this crate does not interpret.
    Unknown(u8),
    /// Tag values 60-63, reserved for private/experimental use.
    Private(u8),
}

impl From<u8> for Tag {
    fn from(v: u8) -> Tag {
        match v {
            1 => Tag::PKESK,
            2 => Tag::Signature,
            3 => Tag::SKESK,
            4 => Tag::OnePassSig,
            5 => Tag::SecretKey,
            6 => Tag::PublicKey,
            7 => Tag::SecretSubkey,
            8 => Tag::CompressedData,
            9 => Tag::SED,
            10 => Tag::Marker,
            11 => Tag::Literal,
            12 => Tag::Trust,
            13 => Tag::UserID,
            14 => Tag::PublicSubkey,
            17 => Tag::UserAttribute,
            18 => Tag::SEIP,
            19 => Tag::MDC,
            20 => Tag::AED,
            60..=63 => Tag::Private(v),
            other => Tag::Unknown(other),
        }
    }
}

impl From<Tag> for u8 {
    fn from(t: Tag) -> u8 {
        match t {
            Tag::PKESK => 1,
            Tag::Signature => 2,
            Tag::SKESK => 3,
            Tag::OnePassSig => 4,
            Tag::SecretKey => 5,
            Tag::PublicKey => 6,
            Tag::SecretSubkey => 7,
            Tag::CompressedData => 8,
            Tag::SED => 9,
            Tag::Marker => 10,
            Tag::Literal => 11,
            Tag::Trust => 12,
            Tag::UserID => 13,
            Tag::PublicSubkey => 14,
            Tag::UserAttribute => 17,
            Tag::SEIP => 18,
            Tag::MDC => 19,
            Tag::AED => 20,
            Tag::Unknown(v) | Tag::Private(v) => v,
        }
    }
}

/// A packet's declared body length (RFC 4880 §4.2.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyLength {
    /// The body is exactly this many bytes.
    Full(u32),
    /// The body is split into chunks; this is the size of the first
    /// one. Only new-format packets can do this.
    Partial(u32),
    /// The body runs to the end of the enclosing container (old-form
    /// indeterminate length).
    Indeterminate,
}

/// The Cipher Type Byte and parsed length that together form a
/// packet header.
#[derive(Clone, Copy, Debug)]
pub struct Header {
    /// The packet's content tag.
    pub tag: Tag,
    /// Whether this packet used old-style (RFC 1991) framing.
    pub old_format: bool,
    /// The declared body length.
    pub length: BodyLength,
}

const MAX_HEADER_ACCUMULATION: usize = 8 * 1024;

impl Header {
    /// Parses a packet header from `source`.
    pub fn parse<C>(source: &mut dyn BufferedReader<C>) -> Result<Header> {
        let ctb = {
            let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            buf[0]
        };
        source.consume(1);

        if ctb & 0x80 == 0 {
            return Err(anyhow::Error::new(Error::MalformedPacket(
                "packet tag's high bit is not set".into(),
            )));
        }

        if ctb & 0x40 != 0 {
            // New format: bits 5-0 are the tag, length follows new-style rules.
            let tag = Tag::from(ctb & 0x3F);
            let length = Self::parse_new_length(source)?;
            Ok(Header { tag, old_format: false, length })
        } else {
            // Old format: bits 5-2 are the tag, bits 1-0 select the length type.
            let tag = Tag::from((ctb >> 2) & 0x0F);
            let length_type = ctb & 0x03;
            let length = match length_type {
                0 => BodyLength::Full(Self::read_n_bytes(source, 1)? as u32),
                1 => BodyLength::Full(Self::read_n_bytes(source, 2)? as u32),
                2 => BodyLength::Full(Self::read_n_bytes(source, 4)? as u32),
                3 => BodyLength::Indeterminate,
                _ => unreachable!(),
            };
            Ok(Header { tag, old_format: true, length })
        }
    }

    fn read_n_bytes<C>(source: &mut dyn BufferedReader<C>, n: usize) -> Result<u64> {
        let buf = source.data_hard(n).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
        let mut v = 0u64;
        for &b in &buf[..n] {
            v = (v << 8) | b as u64;
        }
        source.consume(n);
        Ok(v)
    }

    fn parse_new_length<C>(source: &mut dyn BufferedReader<C>) -> Result<BodyLength> {
        let first = Self::read_n_bytes(source, 1)? as u8;
        match first {
            0..=191 => Ok(BodyLength::Full(first as u32)),
            192..=223 => {
                let second = Self::read_n_bytes(source, 1)? as u32;
                Ok(BodyLength::Full((first as u32 - 192) * 256 + second + 192))
            }
            255 => {
                let len = Self::read_n_bytes(source, 4)? as u32;
                Ok(BodyLength::Full(len))
            }
            224..=254 => {
                // Partial body length: 1 << (first & 0x1F).
                let power = first & 0x1F;
                Ok(BodyLength::Partial(1u32 << power))
            }
        }
    }

    /// Serializes this header (CTB + length octets) to `w`, always
    /// using new-format framing with a 5-octet full-length encoding —
    /// the simplest encoding this crate's writer uses, matching the
    /// teacher's own serializer's default.
    pub fn serialize_new_format(tag: Tag, len: u32, w: &mut dyn Write) -> io::Result<()> {
        let ctb = 0xC0 | u8::from(tag);
        w.write_all(&[ctb, 0xFF])?;
        w.write_all(&len.to_be_bytes())
    }

    /// Serializes a new-format partial-length chunk header (a chunk
    /// size that must be a power of two, except possibly the last
    /// chunk which uses [`Header::serialize_new_format`]).
    pub fn serialize_partial(tag: Tag, chunk_pow2: u8, w: &mut dyn Write) -> io::Result<()> {
        let ctb = 0xC0 | u8::from(tag);
        w.write_all(&[ctb, 224 | (chunk_pow2 & 0x1F)])
    }
}

/// Reassembles a new-format packet body whose length uses partial
/// chunks into a single contiguous byte stream, bounding header
/// accumulation to [`MAX_HEADER_ACCUMULATION`] to avoid a pathological
/// stream forcing unbounded length-header buffering; errors with
/// [`Error::MalformedPacket`] if exceeded.
pub fn reassemble_partial_body<C>(
    source: &mut dyn BufferedReader<C>,
    first_chunk_len: u32,
) -> Result<Vec<u8>> {
    if (first_chunk_len as usize) < 512 {
        // RFC 4880 §4.2.2.4: every chunk except the last must be at
        // least this large; the first chunk is no exception.
        return Err(anyhow::Error::new(Error::MalformedPacket(
            "first partial-length chunk is smaller than the 512-byte minimum".into(),
        )));
    }

    let mut out = Vec::new();
    let mut accumulated_header_bytes = 0usize;
    let mut chunk_len = first_chunk_len;
    loop {
        let data = source
            .data_consume_hard(chunk_len as usize)
            .map_err(|e| anyhow::Error::new(Error::Io(e)))?;
        out.extend_from_slice(&data[..chunk_len as usize]);

        let first = {
            let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            buf[0]
        };
        source.consume(1);
        accumulated_header_bytes += 1;
        if accumulated_header_bytes > MAX_HEADER_ACCUMULATION {
            return Err(anyhow::Error::new(Error::MalformedPacket(
                "partial-length chunk headers exceeded accumulation cap".into(),
            )));
        }

        match first {
            0..=191 => {
                let final_len = first as u32;
                if final_len > 0 {
                    let data = source
                        .data_consume_hard(final_len as usize)
                        .map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                    out.extend_from_slice(&data[..final_len as usize]);
                }
                break;
            }
            192..=223 => {
                let second = {
                    let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                    buf[0]
                };
                source.consume(1);
                let final_len = (first as u32 - 192) * 256 + second as u32 + 192;
                let data = source
                    .data_consume_hard(final_len as usize)
                    .map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                out.extend_from_slice(&data[..final_len as usize]);
                break;
            }
            255 => {
                let buf = source.data_hard(4).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                let final_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
                source.consume(4);
                let data = source
                    .data_consume_hard(final_len as usize)
                    .map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                out.extend_from_slice(&data[..final_len as usize]);
                break;
            }
            224..=254 => {
                chunk_len = 1u32 << (first & 0x1F);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn old_format_one_byte_length() {
        let buf = [0x80 | (11 << 2), 5];
        let mut src = buffered_reader::Memory::new(&buf);
        let h = Header::parse(&mut src).unwrap();
        assert_eq!(h.tag, Tag::Literal);
        assert!(h.old_format);
        assert_eq!(h.length, BodyLength::Full(5));
    }

    #[test]
    fn new_format_two_byte_length() {
        let buf = [0xC0 | 11, 192, 0];
        let mut src = buffered_reader::Memory::new(&buf);
        let h = Header::parse(&mut src).unwrap();
        assert_eq!(h.length, BodyLength::Full(192));
    }

    #[test]
    fn new_format_five_byte_length() {
        let buf = [0xC0 | 11, 255, 0, 0, 1, 0];
        let mut src = buffered_reader::Memory::new(&buf);
        let h = Header::parse(&mut src).unwrap();
        assert_eq!(h.length, BodyLength::Full(256));
    }

    #[test]
    fn partial_length_rejects_small_first_chunk() {
        let buf: Vec<u8> = vec![0u8; 10];
        let mut src = buffered_reader::Memory::new(&buf);
        assert!(reassemble_partial_body(&mut src, 100).is_err());
    }
}
