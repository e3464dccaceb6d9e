//! Multi-precision integers and String-to-Key parameters.

use std::io::{self, Read, Write};

use buffered_reader::BufferedReader;

use crate::error::{Error, Result};
use crate::types::HashAlgorithm;

/// The largest bit length this crate will parse out of an MPI's
/// 16-bit length prefix, matching GnuPG/RNP's `MPI_MAX_BITS`. An MPI
/// claiming a larger size is rejected outright rather than causing an
/// oversized allocation.
pub const MAX_MPI_BITS: usize = 16384;

/// A Multi-Precision Integer (RFC 4880 §3.2): a 16-bit bit-count
/// followed by the big-endian, leading-zero-stripped value.
#[derive(Clone, PartialEq, Eq)]
pub struct MPI(Box<[u8]>);

impl MPI {
    /// Wraps already leading-zero-stripped big-endian bytes.
    pub fn new(bytes: &[u8]) -> MPI {
        let stripped = strip_leading_zeros(bytes);
        MPI(stripped.to_vec().into_boxed_slice())
    }

    /// The value's raw big-endian bytes (no leading zero byte, unless
    /// the value is zero in which case this is empty).
    pub fn value(&self) -> &[u8] {
        &self.0
    }

    /// The number of significant bits, i.e. what this MPI's length
    /// prefix would encode.
    pub fn bits(&self) -> usize {
        bit_length(&self.0)
    }

    /// Parses one MPI from `source`, enforcing [`MAX_MPI_BITS`].
    pub fn parse<C>(source: &mut dyn BufferedReader<C>) -> Result<MPI> {
        let len_bits = source.read_be_u16()
            .map_err(|e| anyhow::Error::new(Error::Io(e)))? as usize;
        if len_bits > MAX_MPI_BITS {
            return Err(anyhow::Error::new(Error::MalformedMPI(format!(
                "MPI claims {} bits, exceeds maximum of {}",
                len_bits, MAX_MPI_BITS
            ))));
        }
        let len_bytes = (len_bits + 7) / 8;
        let buf = source.data_hard(len_bytes)
            .map_err(|e| anyhow::Error::new(Error::Io(e)))?;
        let bytes = buf[..len_bytes].to_vec();
        source.consume(len_bytes);

        if len_bytes > 0 {
            let first = bytes[0];
            let expected_bits = 8 * (len_bytes - 1) + bit_length_of_byte(first);
            if expected_bits != len_bits {
                return Err(anyhow::Error::new(Error::MalformedMPI(format!(
                    "MPI length prefix {} does not match body's actual bit length {}",
                    len_bits, expected_bits
                ))));
            }
        } else if len_bits != 0 {
            return Err(anyhow::Error::new(Error::MalformedMPI(
                "MPI has zero-length body but non-zero bit-count".into(),
            )));
        }

        Ok(MPI(bytes.into_boxed_slice()))
    }

    /// Serializes this MPI's 16-bit bit-count prefix and body to `w`.
    pub fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        let bits = self.bits() as u16;
        w.write_all(&bits.to_be_bytes())?;
        w.write_all(&self.0)?;
        Ok(())
    }

    /// The on-wire size in bytes, including the 2-byte length prefix.
    pub fn serialized_len(&self) -> usize {
        2 + self.0.len()
    }
}

impl std::fmt::Debug for MPI {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "MPI({} bits)", self.bits())
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < bytes.len() && bytes[i] == 0 {
        i += 1;
    }
    &bytes[i..]
}

fn bit_length_of_byte(b: u8) -> usize {
    8 - b.leading_zeros() as usize
}

fn bit_length(bytes: &[u8]) -> usize {
    match bytes.first() {
        None => 0,
        Some(&first) => 8 * (bytes.len() - 1) + bit_length_of_byte(first),
    }
}

/// String-to-Key specifier (RFC 4880 §3.7): derives a symmetric key
/// from a passphrase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum S2K {
    /// A straight hash of the passphrase.
    Simple {
        /// Hash algorithm used to derive the key.
        hash: HashAlgorithm,
    },
    /// A hash of salt prepended to the passphrase.
    Salted {
        /// Hash algorithm used to derive the key.
        hash: HashAlgorithm,
        /// 8 bytes of salt.
        salt: [u8; 8],
    },
    /// A hash of salt and passphrase repeated to reach a target byte
    /// count, raising the cost of brute-forcing the passphrase.
    IteratedAndSalted {
        /// Hash algorithm used to derive the key.
        hash: HashAlgorithm,
        /// 8 bytes of salt.
        salt: [u8; 8],
        /// Decoded iteration byte count (the wire form is an
        /// exponentially-coded single byte; this is the expanded
        /// count of salt+passphrase bytes hashed).
        count: u32,
    },
    /// An S2K type this crate does not recognize, preserved for
    /// verbatim round-trip but unusable for key derivation.
    Unknown {
        /// The raw S2K type octet.
        s2k_type: u8,
        /// Whatever bytes followed, as far as can be determined by
        /// its advertised structure; on ambiguous unknown encodings
        /// this is empty and the remainder of the packet is
        /// unparseable.
        raw: Box<[u8]>,
    },
}

impl S2K {
    /// Decodes the single-byte exponential count encoding used by
    /// the iterated-and-salted form (RFC 4880 §3.7.1.3) into an
    /// actual byte count.
    pub fn decode_count(c: u8) -> u32 {
        (16u32 + (c as u32 & 0x0f)) << ((c as u32 >> 4) + 6)
    }

    /// Encodes a byte count to the nearest representable exponential
    /// count octet, rounding up so the derived work factor is never
    /// less than requested.
    pub fn encode_count(count: u32) -> u8 {
        for c in 0..=255u8 {
            if Self::decode_count(c) >= count {
                return c;
            }
        }
        255
    }

    /// Parses an S2K specifier from `source`.
    pub fn parse<C>(source: &mut dyn BufferedReader<C>) -> Result<S2K> {
        let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
        let s2k_type = buf[0];
        source.consume(1);

        match s2k_type {
            0 => {
                let hash = read_hash_algo(source)?;
                Ok(S2K::Simple { hash })
            }
            1 => {
                let hash = read_hash_algo(source)?;
                let salt = read_salt(source)?;
                Ok(S2K::Salted { hash, salt })
            }
            3 => {
                let hash = read_hash_algo(source)?;
                let salt = read_salt(source)?;
                let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                let count = Self::decode_count(buf[0]);
                source.consume(1);
                Ok(S2K::IteratedAndSalted { hash, salt, count })
            }
            other => Ok(S2K::Unknown { s2k_type: other, raw: Box::new([]) }),
        }
    }

    /// Serializes this S2K specifier to `w`.
    pub fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        match self {
            S2K::Simple { hash } => {
                w.write_all(&[0, u8::from(*hash)])
            }
            S2K::Salted { hash, salt } => {
                w.write_all(&[1, u8::from(*hash)])?;
                w.write_all(salt)
            }
            S2K::IteratedAndSalted { hash, salt, count } => {
                w.write_all(&[3, u8::from(*hash)])?;
                w.write_all(salt)?;
                w.write_all(&[Self::encode_count(*count)])
            }
            S2K::Unknown { s2k_type, raw } => {
                w.write_all(&[*s2k_type])?;
                w.write_all(raw)
            }
        }
    }

    /// Derives `key_len` bytes of key material from `passphrase`
    /// using the hash algorithm implied by this S2K and the backend's
    /// [`crate::crypto::Hash`] implementation.
    pub fn derive_key(
        &self,
        passphrase: &[u8],
        key_len: usize,
        hash_fn: &dyn Fn(HashAlgorithm, &[&[u8]]) -> Result<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let (hash, prefix): (HashAlgorithm, Vec<&[u8]>) = match self {
            S2K::Simple { hash } => (*hash, vec![passphrase]),
            S2K::Salted { hash, salt } => (*hash, vec![&salt[..], passphrase]),
            S2K::IteratedAndSalted { hash, salt, count } => {
                let unit_len = salt.len() + passphrase.len();
                let reps = (*count as usize).div_ceil(unit_len).max(1);
                let mut buf = Vec::with_capacity(reps * unit_len);
                for _ in 0..reps {
                    buf.extend_from_slice(salt);
                    buf.extend_from_slice(passphrase);
                }
                buf.truncate((*count as usize).max(unit_len));
                return derive_with_octet_prefix(hash, &buf, key_len, hash_fn);
            }
            S2K::Unknown { s2k_type, .. } => {
                return Err(anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                    "S2K type {}", s2k_type
                ))))
            }
        };
        let digest_size = hash.digest_size().ok_or_else(|| {
            anyhow::Error::new(Error::UnsupportedAlgorithm(format!("hash {}", hash)))
        })?;
        let n_hashes = key_len.div_ceil(digest_size).max(1);
        let mut out = Vec::with_capacity(n_hashes * digest_size);
        for i in 0..n_hashes {
            let octets = vec![0u8; i];
            let mut inputs: Vec<&[u8]> = vec![&octets];
            inputs.extend_from_slice(&prefix);
            out.extend_from_slice(&hash_fn(hash, &inputs)?);
        }
        out.truncate(key_len);
        Ok(out)
    }
}

fn derive_with_octet_prefix(
    hash: HashAlgorithm,
    material: &[u8],
    key_len: usize,
    hash_fn: &dyn Fn(HashAlgorithm, &[&[u8]]) -> Result<Vec<u8>>,
) -> Result<Vec<u8>> {
    let digest_size = hash.digest_size().ok_or_else(|| {
        anyhow::Error::new(Error::UnsupportedAlgorithm(format!("hash {}", hash)))
    })?;
    let n_hashes = key_len.div_ceil(digest_size).max(1);
    let mut out = Vec::with_capacity(n_hashes * digest_size);
    for i in 0..n_hashes {
        let octets = vec![0u8; i];
        out.extend_from_slice(&hash_fn(hash, &[&octets, material])?);
    }
    out.truncate(key_len);
    Ok(out)
}

fn read_hash_algo<C>(source: &mut dyn BufferedReader<C>) -> Result<HashAlgorithm> {
    let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
    let algo = HashAlgorithm::from(buf[0]);
    source.consume(1);
    Ok(algo)
}

fn read_salt<C>(source: &mut dyn BufferedReader<C>) -> Result<[u8; 8]> {
    let buf = source.data_hard(8).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
    let mut salt = [0u8; 8];
    salt.copy_from_slice(&buf[..8]);
    source.consume(8);
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mpi_strips_leading_zeros() {
        let m = MPI::new(&[0x00, 0x00, 0x01, 0x23]);
        assert_eq!(m.value(), &[0x01, 0x23]);
        assert_eq!(m.bits(), 9);
    }

    #[test]
    fn mpi_round_trip() {
        let m = MPI::new(&[0xff, 0x01]);
        assert_eq!(m.bits(), 16);
        let mut buf = Vec::new();
        m.serialize(&mut buf).unwrap();
        assert_eq!(buf, vec![0x00, 0x10, 0xff, 0x01]);

        let mut src = buffered_reader::Memory::new(&buf);
        let parsed = MPI::parse(&mut src).unwrap();
        assert_eq!(parsed, m);
    }

    #[test]
    fn mpi_rejects_oversized_claim() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_MPI_BITS as u16 + 8).to_be_bytes());
        let mut src = buffered_reader::Memory::new(&buf);
        assert!(MPI::parse(&mut src).is_err());
    }

    #[test]
    fn s2k_count_roundtrips_monotonically() {
        for c in 0..=255u8 {
            let count = S2K::decode_count(c);
            let re = S2K::encode_count(count);
            assert!(S2K::decode_count(re) >= count);
        }
    }

    #[test]
    fn s2k_simple_serialize_parse() {
        let s2k = S2K::Simple { hash: HashAlgorithm::SHA256 };
        let mut buf = Vec::new();
        s2k.serialize(&mut buf).unwrap();
        let mut src = buffered_reader::Memory::new(&buf);
        assert_eq!(S2K::parse(&mut src).unwrap(), s2k);
    }
}
