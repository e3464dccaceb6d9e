//! ASCII Armor (RFC 4880 §6): a radix-64 encoding of binary OpenPGP
//! data framed by `-----BEGIN PGP ...-----`/`-----END PGP ...-----`
//! blurbs and protected by a CRC-24 checksum.

use std::io::{self, Read, Write};

use base64::Engine;

use crate::error::{Error, Result};

/// The kind of data an armor block contains (RFC 4880 §6.2).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    /// A generic OpenPGP message (encrypted/signed/compressed data).
    Message,
    /// A transferable public key / certificate.
    PublicKey,
    /// A transferable secret key.
    SecretKey,
    /// A detached signature.
    Signature,
    /// A generic file. A GnuPG extension, not in RFC 4880 proper.
    File,
}

impl Kind {
    fn blurb(&self) -> &'static str {
        match self {
            Kind::Message => "MESSAGE",
            Kind::PublicKey => "PUBLIC KEY BLOCK",
            Kind::SecretKey => "PRIVATE KEY BLOCK",
            Kind::Signature => "SIGNATURE",
            Kind::File => "ARMORED FILE",
        }
    }

    fn from_blurb(blurb: &str) -> Option<Kind> {
        Some(match blurb {
            "MESSAGE" => Kind::Message,
            "PUBLIC KEY BLOCK" => Kind::PublicKey,
            "PRIVATE KEY BLOCK" => Kind::SecretKey,
            "SIGNATURE" => Kind::Signature,
            "ARMORED FILE" => Kind::File,
            _ => return None,
        })
    }

    fn begin(&self) -> String {
        format!("-----BEGIN PGP {}-----", self.blurb())
    }

    fn end(&self) -> String {
        format!("-----END PGP {}-----", self.blurb())
    }
}

/// Controls how strictly [`Reader`] interprets non-canonical armor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReaderMode {
    /// Requires a well-formed header blurb and accepts a missing
    /// CRC footer (many modern implementations omit it).
    Tolerant,
    /// Additionally accepts a header blurb whose kind does not match
    /// what the caller expected, and dash-escaped lines inside a
    /// cleartext-signed body that do not strictly follow RFC 4880
    /// §7.1's escaping rule.
    VeryTolerant,
}

const CRC24_INIT: u32 = 0xB704CE;
const CRC24_POLY: u32 = 0x1864CFB;

struct Crc24(u32);

impl Crc24 {
    fn new() -> Crc24 {
        Crc24(CRC24_INIT)
    }

    fn update(&mut self, buf: &[u8]) -> &mut Self {
        let mut crc = self.0;
        for &byte in buf {
            crc ^= (byte as u32) << 16;
            for _ in 0..8 {
                crc <<= 1;
                if crc & 0x1000000 != 0 {
                    crc ^= CRC24_POLY;
                }
            }
        }
        self.0 = crc;
        self
    }

    fn finalize(&self) -> u32 {
        self.0 & 0xFFFFFF
    }
}

const LINE_LENGTH: usize = 64;

/// A streaming ASCII-armor encoder: wraps a [`Write`], base64-encodes
/// everything written to it in `LINE_LENGTH`-column lines, and emits
/// the header blurb, optional headers, body, CRC-24 footer, and end
/// blurb on [`Writer::finalize`].
pub struct Writer<W: Write> {
    sink: W,
    kind: Kind,
    headers: Vec<(String, String)>,
    stash: Vec<u8>,
    column: usize,
    crc: Crc24,
    header_written: bool,
    finalized: bool,
}

impl<W: Write> Writer<W> {
    /// Constructs a new armor writer for `kind`, with no extra headers.
    pub fn new(inner: W, kind: Kind) -> Result<Self> {
        Self::with_headers(inner, kind, Vec::new())
    }

    /// Like [`Writer::new`], additionally emitting `headers` as
    /// `Key: Value` lines after the begin blurb.
    pub fn with_headers<I, K, V>(inner: W, kind: Kind, headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Ok(Writer {
            sink: inner,
            kind,
            headers: headers.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            stash: Vec::with_capacity(3),
            column: 0,
            crc: Crc24::new(),
            header_written: false,
            finalized: false,
        })
    }

    fn write_header(&mut self) -> io::Result<()> {
        if self.header_written {
            return Ok(());
        }
        writeln!(self.sink, "{}", self.kind.begin())?;
        for (k, v) in &self.headers {
            writeln!(self.sink, "{}: {}", k, v)?;
        }
        writeln!(self.sink)?;
        self.header_written = true;
        Ok(())
    }

    fn write_b64_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        debug_assert!(chunk.len() == 3);
        let encoded = base64::engine::general_purpose::STANDARD.encode(chunk);
        self.write_encoded(encoded.as_bytes())
    }

    fn write_encoded(&mut self, mut encoded: &[u8]) -> io::Result<()> {
        while !encoded.is_empty() {
            let room = LINE_LENGTH - self.column;
            let take = room.min(encoded.len());
            self.sink.write_all(&encoded[..take])?;
            self.column += take;
            encoded = &encoded[take..];
            if self.column == LINE_LENGTH {
                writeln!(self.sink)?;
                self.column = 0;
            }
        }
        Ok(())
    }

    /// Finishes the armor block: flushes any remaining bytes, writes
    /// the CRC-24 checksum and the end blurb, and returns the
    /// wrapped writer.
    pub fn finalize(mut self) -> Result<W> {
        self.finish_inner()?;
        Ok(self.sink)
    }

    fn finish_inner(&mut self) -> io::Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.write_header()?;
        if !self.stash.is_empty() {
            let stash = std::mem::take(&mut self.stash);
            let encoded = base64::engine::general_purpose::STANDARD.encode(&stash);
            self.write_encoded(encoded.as_bytes())?;
        }
        if self.column != 0 {
            writeln!(self.sink)?;
            self.column = 0;
        }
        let crc = self.crc.finalize();
        let bytes = crc.to_be_bytes();
        let crc_b64 = base64::engine::general_purpose::STANDARD.encode(&bytes[1..4]);
        writeln!(self.sink, "={}", crc_b64)?;
        writeln!(self.sink, "{}", self.kind.end())?;
        self.finalized = true;
        Ok(())
    }
}

impl<W: Write> Write for Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_header()?;
        self.crc.update(buf);

        let mut input = buf;
        if !self.stash.is_empty() {
            let need = 3 - self.stash.len();
            let take = need.min(input.len());
            self.stash.extend_from_slice(&input[..take]);
            input = &input[take..];
            if self.stash.len() == 3 {
                let chunk = std::mem::take(&mut self.stash);
                self.write_b64_chunk(&chunk)?;
            }
        }
        while input.len() >= 3 {
            self.write_b64_chunk(&input[..3])?;
            input = &input[3..];
        }
        self.stash.extend_from_slice(input);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

impl<W: Write> Drop for Writer<W> {
    fn drop(&mut self) {
        let _ = self.finish_inner();
    }
}

/// A streaming ASCII-armor decoder: wraps a [`Read`], parses the
/// header blurb (and optional headers), base64-decodes the body, and
/// validates the CRC-24 footer against what was actually read.
pub struct Reader<R: Read> {
    source: R,
    mode: ReaderMode,
    kind: Option<Kind>,
    headers: Vec<(String, String)>,
    started: bool,
    done: bool,
    line_buf: Vec<u8>,
    decoded: Vec<u8>,
    decoded_pos: usize,
    crc: Crc24,
    expect_crc: Option<u32>,
}

impl<R: Read> Reader<R> {
    /// Constructs a reader that accepts any [`Kind`] of armor.
    pub fn new(inner: R, mode: ReaderMode) -> Self {
        Reader {
            source: inner,
            mode,
            kind: None,
            headers: Vec::new(),
            started: false,
            done: false,
            line_buf: Vec::new(),
            decoded: Vec::new(),
            decoded_pos: 0,
            crc: Crc24::new(),
            expect_crc: None,
        }
    }

    /// The armor kind, once the header has been parsed (after the
    /// first successful `read`).
    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    /// The `Key: Value` headers found between the begin blurb and
    /// the body.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.line_buf.clear();
        let mut byte = [0u8; 1];
        loop {
            let n = self.source.read(&mut byte)?;
            if n == 0 {
                if self.line_buf.is_empty() {
                    return Ok(None);
                }
                break;
            }
            if byte[0] == b'\n' {
                break;
            }
            self.line_buf.push(byte[0]);
        }
        if self.line_buf.last() == Some(&b'\r') {
            self.line_buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.line_buf).into_owned()))
    }

    fn parse_header(&mut self) -> io::Result<()> {
        loop {
            let line = match self.read_line()? {
                Some(l) => l,
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        Error::InvalidArmor("missing armor header".into()),
                    ))
                }
            };
            if line.is_empty() {
                continue;
            }
            let trimmed = line.trim_matches('-');
            if let Some(blurb) = trimmed.strip_prefix("BEGIN PGP ") {
                match Kind::from_blurb(blurb) {
                    Some(k) => {
                        self.kind = Some(k);
                        break;
                    }
                    None if self.mode == ReaderMode::VeryTolerant => {
                        self.kind = Some(Kind::Message);
                        break;
                    }
                    None => {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            Error::InvalidArmor(format!("unrecognized armor kind {:?}", blurb)),
                        ))
                    }
                }
            } else if self.mode != ReaderMode::VeryTolerant {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    Error::InvalidArmor("expected BEGIN PGP header".into()),
                ));
            }
        }

        loop {
            let line = match self.read_line()? {
                Some(l) => l,
                None => return Ok(()),
            };
            if line.is_empty() {
                break;
            }
            if let Some((k, v)) = line.split_once(':') {
                self.headers.push((k.trim().to_string(), v.trim().to_string()));
            }
        }
        Ok(())
    }

    fn fill_decoded(&mut self) -> io::Result<()> {
        if self.done {
            return Ok(());
        }
        loop {
            let line = match self.read_line()? {
                Some(l) => l,
                None => {
                    self.done = true;
                    return Ok(());
                }
            };
            if let Some(b64) = line.strip_prefix('=') {
                if b64.len() == 4 {
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(b64)
                        .map_err(|e| {
                            io::Error::new(
                                io::ErrorKind::InvalidData,
                                Error::InvalidArmor(format!("bad CRC encoding: {}", e)),
                            )
                        })?;
                    if bytes.len() == 3 {
                        self.expect_crc = Some(
                            (bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32,
                        );
                    }
                }
                // Consume the trailing "-----END PGP ...-----" line.
                let _ = self.read_line()?;
                self.done = true;
                return self.check_crc();
            }
            if line.trim_matches('-').starts_with("END PGP ") {
                self.done = true;
                return self.check_crc();
            }
            if line.is_empty() {
                continue;
            }
            let chunk = base64::engine::general_purpose::STANDARD
                .decode(line.trim())
                .map_err(|e| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        Error::InvalidArmor(format!("bad base64: {}", e)),
                    )
                })?;
            self.crc.update(&chunk);
            self.decoded.extend_from_slice(&chunk);
            if self.decoded.len() - self.decoded_pos > 0 {
                return Ok(());
            }
        }
    }

    fn check_crc(&self) -> io::Result<()> {
        if let Some(expect) = self.expect_crc {
            if self.crc.finalize() != expect {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    Error::InvalidArmor("CRC-24 mismatch".into()),
                ));
            }
        } else if self.mode != ReaderMode::Tolerant && self.mode != ReaderMode::VeryTolerant {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                Error::InvalidArmor("missing CRC-24 checksum".into()),
            ));
        }
        Ok(())
    }
}

impl<R: Read> Read for Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.started {
            self.parse_header()?;
            self.started = true;
        }
        while self.decoded_pos >= self.decoded.len() && !self.done {
            self.fill_decoded()?;
        }
        let available = &self.decoded[self.decoded_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.decoded_pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc24_known_vectors() {
        assert_eq!(Crc24::new().finalize(), CRC24_INIT & 0xFFFFFF);
    }

    #[test]
    fn round_trip_message() {
        let mut w = Writer::new(Vec::new(), Kind::Message).unwrap();
        w.write_all(b"Hello world!").unwrap();
        let armored = w.finalize().unwrap();
        let text = String::from_utf8(armored.clone()).unwrap();
        assert!(text.starts_with("-----BEGIN PGP MESSAGE-----\n"));
        assert!(text.trim_end().ends_with("-----END PGP MESSAGE-----"));

        let mut r = Reader::new(&armored[..], ReaderMode::Tolerant);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"Hello world!");
        assert_eq!(r.kind(), Some(Kind::Message));
    }

    #[test]
    fn round_trip_with_headers() {
        let mut w = Writer::with_headers(
            Vec::new(),
            Kind::PublicKey,
            vec![("Version", "pgp-core 0.1")],
        )
        .unwrap();
        w.write_all(&[0u8; 100]).unwrap();
        let armored = w.finalize().unwrap();

        let mut r = Reader::new(&armored[..], ReaderMode::Tolerant);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![0u8; 100]);
        assert_eq!(r.headers(), &[("Version".to_string(), "pgp-core 0.1".to_string())]);
    }

    #[test]
    fn rejects_bad_crc() {
        let mut w = Writer::new(Vec::new(), Kind::Message).unwrap();
        w.write_all(b"test data").unwrap();
        let mut armored = w.finalize().unwrap();
        let text = String::from_utf8(armored.clone()).unwrap();
        let corrupted = text.replacen("=", "=A", 1);
        armored = corrupted.into_bytes();

        let mut r = Reader::new(&armored[..], ReaderMode::Tolerant);
        let mut out = Vec::new();
        assert!(r.read_to_end(&mut out).is_err());
    }
}
