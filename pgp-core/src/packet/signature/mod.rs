//! Signature packets (RFC 4880 §5.2).

pub mod subpacket;

use std::io::{self, Write};

use buffered_reader::BufferedReader;

use crate::error::{Error, Result};
use crate::fingerprint::KeyID;
use crate::mpi::MPI;
use crate::types::{HashAlgorithm, PublicKeyAlgorithm, SignatureType};

pub use subpacket::{Subpacket, SubpacketArea, SubpacketTag, SubpacketValue};

/// The algorithm-shaped MPI sequence carried by a signature packet
/// or a PKESK's encrypted session key.
#[derive(Clone, Debug, PartialEq)]
pub enum Mpis {
    /// RSA signature value, or RSA-encrypted session key.
    RSA { s_or_c: MPI },
    /// DSA/ECDSA signature: `(r, s)`.
    DSA { r: MPI, s: MPI },
    /// EdDSA signature: `(R, S)`, each a fixed-width MPI-encoded
    /// value per RFC 4880bis §14.
    EdDSA { r: MPI, s: MPI },
    /// ElGamal-encrypted session key: `(g^k mod p, y^k * m mod p)`.
    ElGamal { a: MPI, b: MPI },
    /// ECDH-encrypted session key: ephemeral point `v` and the
    /// PKCS#5-padded, AES-key-wrapped session key `encoded_key`.
    ECDH { v: MPI, encoded_key: Box<[u8]> },
    /// An MPI sequence for an algorithm this crate does not
    /// interpret.
    Unknown { mpis: Vec<MPI> },
}

impl Mpis {
    /// Parses a signature value for `algo`.
    pub fn parse_signature<C>(
        algo: PublicKeyAlgorithm,
        source: &mut dyn BufferedReader<C>,
    ) -> Result<Mpis> {
        use PublicKeyAlgorithm::*;
        Ok(match algo {
            RSAEncryptSign | RSASignOnly => Mpis::RSA { s_or_c: MPI::parse(source)? },
            DSA => Mpis::DSA { r: MPI::parse(source)?, s: MPI::parse(source)? },
            ECDSA => Mpis::DSA { r: MPI::parse(source)?, s: MPI::parse(source)? },
            EdDSA => Mpis::EdDSA { r: MPI::parse(source)?, s: MPI::parse(source)? },
            _ => {
                return Err(anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                    "signature algorithm {}", algo
                ))))
            }
        })
    }

    /// Parses a PKESK encrypted session key for `algo`.
    pub fn parse_esk<C>(
        algo: PublicKeyAlgorithm,
        source: &mut dyn BufferedReader<C>,
    ) -> Result<Mpis> {
        use PublicKeyAlgorithm::*;
        Ok(match algo {
            RSAEncryptSign | RSAEncryptOnly => Mpis::RSA { s_or_c: MPI::parse(source)? },
            ElGamalEncryptOnly | ElGamalEncryptSign => {
                Mpis::ElGamal { a: MPI::parse(source)?, b: MPI::parse(source)? }
            }
            ECDH => {
                let v = MPI::parse(source)?;
                let len = {
                    let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                    buf[0] as usize
                };
                source.consume(1);
                let buf = source.data_hard(len).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                let encoded_key = buf[..len].to_vec().into_boxed_slice();
                source.consume(len);
                Mpis::ECDH { v, encoded_key }
            }
            _ => {
                return Err(anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                    "encryption algorithm {}", algo
                ))))
            }
        })
    }

    /// Serializes this value to `w`.
    pub fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        match self {
            Mpis::RSA { s_or_c } => s_or_c.serialize(w),
            Mpis::DSA { r, s } | Mpis::EdDSA { r, s } => {
                r.serialize(w)?;
                s.serialize(w)
            }
            Mpis::ElGamal { a, b } => {
                a.serialize(w)?;
                b.serialize(w)
            }
            Mpis::ECDH { v, encoded_key } => {
                v.serialize(w)?;
                w.write_all(&[encoded_key.len() as u8])?;
                w.write_all(encoded_key)
            }
            Mpis::Unknown { mpis } => {
                for m in mpis {
                    m.serialize(w)?;
                }
                Ok(())
            }
        }
    }
}

/// A signature packet (RFC 4880 §5.2).
#[derive(Clone, Debug)]
pub struct Signature {
    /// Packet version: 3 or 4.
    pub version: u8,
    /// The kind of thing being signed.
    pub sig_type: SignatureType,
    /// The signing key's algorithm.
    pub pk_algo: PublicKeyAlgorithm,
    /// The hash algorithm used.
    pub hash_algo: HashAlgorithm,
    /// v3 only: creation time and issuer key ID, carried directly in
    /// the packet rather than in subpackets.
    pub v3_creation_time_and_issuer: Option<(crate::types::Timestamp, KeyID)>,
    /// v4 only: the hashed subpacket area (covered by the signature).
    pub hashed_area: SubpacketArea,
    /// v4 only: the unhashed subpacket area (not covered).
    pub unhashed_area: SubpacketArea,
    /// The first two bytes of the digest, used as a fast mismatch
    /// check before any public-key operation.
    pub digest_prefix: [u8; 2],
    /// The signature value itself.
    pub mpis: Mpis,
}

impl Signature {
    /// Parses a signature packet body from `source`.
    pub fn parse<C>(source: &mut dyn BufferedReader<C>) -> Result<Signature> {
        let version = {
            let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            buf[0]
        };
        source.consume(1);

        if version == 3 {
            let hashed_material_len = {
                let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                buf[0]
            };
            source.consume(1);
            if hashed_material_len != 5 {
                return Err(anyhow::Error::new(Error::MalformedPacket(
                    "v3 signature hashed-material length must be 5".into(),
                )));
            }
            let sig_type = {
                let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                buf[0]
            };
            source.consume(1);
            let creation = source.read_be_u32().map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            let issuer_buf =
                source.data_hard(8).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            let issuer = KeyID::from_bytes(&issuer_buf[..8]);
            source.consume(8);

            let pk_algo_byte = {
                let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                buf[0]
            };
            source.consume(1);
            let hash_algo_byte = {
                let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                buf[0]
            };
            source.consume(1);

            let digest_prefix_buf =
                source.data_hard(2).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            let mut digest_prefix = [0u8; 2];
            digest_prefix.copy_from_slice(&digest_prefix_buf[..2]);
            source.consume(2);

            let pk_algo = PublicKeyAlgorithm::from(pk_algo_byte);
            let mpis = Mpis::parse_signature(pk_algo, source)?;

            Ok(Signature {
                version,
                sig_type: SignatureType::from(sig_type),
                pk_algo,
                hash_algo: HashAlgorithm::from(hash_algo_byte),
                v3_creation_time_and_issuer: Some((crate::types::Timestamp(creation), issuer)),
                hashed_area: SubpacketArea::new(),
                unhashed_area: SubpacketArea::new(),
                digest_prefix,
                mpis,
            })
        } else if version == 4 {
            let sig_type = {
                let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                buf[0]
            };
            source.consume(1);
            let pk_algo_byte = {
                let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                buf[0]
            };
            source.consume(1);
            let hash_algo_byte = {
                let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                buf[0]
            };
            source.consume(1);

            let hashed_len = source.read_be_u16().map_err(|e| anyhow::Error::new(Error::Io(e)))? as usize;
            let hashed_bytes = source
                .data_consume_hard(hashed_len)
                .map_err(|e| anyhow::Error::new(Error::Io(e)))?
                [..hashed_len]
                .to_vec();
            let hashed_area = SubpacketArea::parse(&hashed_bytes)?;

            let unhashed_len = source.read_be_u16().map_err(|e| anyhow::Error::new(Error::Io(e)))? as usize;
            let unhashed_bytes = source
                .data_consume_hard(unhashed_len)
                .map_err(|e| anyhow::Error::new(Error::Io(e)))?
                [..unhashed_len]
                .to_vec();
            let unhashed_area = SubpacketArea::parse(&unhashed_bytes)?;

            let digest_prefix_buf =
                source.data_hard(2).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            let mut digest_prefix = [0u8; 2];
            digest_prefix.copy_from_slice(&digest_prefix_buf[..2]);
            source.consume(2);

            let pk_algo = PublicKeyAlgorithm::from(pk_algo_byte);
            let mpis = Mpis::parse_signature(pk_algo, source)?;

            Ok(Signature {
                version,
                sig_type: SignatureType::from(sig_type),
                pk_algo,
                hash_algo: HashAlgorithm::from(hash_algo_byte),
                v3_creation_time_and_issuer: None,
                hashed_area,
                unhashed_area,
                digest_prefix,
                mpis,
            })
        } else {
            Err(anyhow::Error::new(Error::MalformedPacket(format!(
                "unsupported signature packet version {}", version
            ))))
        }
    }

    /// Serializes this signature packet's body to `w`.
    pub fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&[self.version])?;
        if self.version == 3 {
            let (creation, issuer) = self.v3_creation_time_and_issuer.as_ref()
                .expect("v3 signature missing creation time/issuer");
            w.write_all(&[5, u8::from(self.sig_type)])?;
            w.write_all(&creation.0.to_be_bytes())?;
            w.write_all(issuer.as_bytes())?;
            w.write_all(&[u8::from(self.pk_algo), u8::from(self.hash_algo)])?;
            w.write_all(&self.digest_prefix)?;
        } else {
            w.write_all(&[u8::from(self.sig_type), u8::from(self.pk_algo), u8::from(self.hash_algo)])?;
            let mut hashed = Vec::new();
            self.hashed_area.serialize(&mut hashed)?;
            w.write_all(&(hashed.len() as u16).to_be_bytes())?;
            w.write_all(&hashed)?;
            let mut unhashed = Vec::new();
            self.unhashed_area.serialize(&mut unhashed)?;
            w.write_all(&(unhashed.len() as u16).to_be_bytes())?;
            w.write_all(&unhashed)?;
            w.write_all(&self.digest_prefix)?;
        }
        self.mpis.serialize(w)
    }

    /// The "trailer" covering what a v4 signature's hash digests over
    /// beyond the hashed subpacket area: `version ‖ 0xFF ‖ u32
    /// hashed-length` (RFC 4880 §5.2.4).
    pub fn v4_trailer(&self, hashed_len: usize) -> [u8; 6] {
        let mut out = [0u8; 6];
        out[0] = self.version;
        out[1] = 0xFF;
        out[2..6].copy_from_slice(&(hashed_len as u32).to_be_bytes());
        out
    }

    /// Builds the hash input for this signature: the signature's own
    /// framing (v3: type+creation+issuer... actually v3 signing input
    /// differs; see below) and, for v4, the hashed-subpacket area and
    /// trailer, after any key/user-id prefixes the caller supplies
    /// for certification/binding signatures.
    pub fn hash_input(&self) -> Vec<u8> {
        if self.version == 3 {
            let (creation, _issuer) = self
                .v3_creation_time_and_issuer
                .as_ref()
                .expect("v3 signature missing creation time/issuer");
            let mut out = Vec::with_capacity(5);
            out.push(u8::from(self.sig_type));
            out.extend_from_slice(&creation.0.to_be_bytes());
            out
        } else {
            let mut hashed = Vec::new();
            self.hashed_area.serialize(&mut hashed).expect("Vec<u8> Write is infallible");
            let mut out = Vec::with_capacity(6 + hashed.len() + 6);
            out.push(self.version);
            out.push(u8::from(self.sig_type));
            out.push(u8::from(self.pk_algo));
            out.push(u8::from(self.hash_algo));
            out.extend_from_slice(&(hashed.len() as u16).to_be_bytes());
            out.extend_from_slice(&hashed);
            // The trailer's length field covers everything hashed so far:
            // the 6-octet header (version, type, pk-algo, hash-algo, 2-byte
            // subpacket count) plus the hashed subpacket area itself.
            out.extend_from_slice(&self.v4_trailer(6 + hashed.len()));
            out
        }
    }

    /// The issuer key ID, from the v3 fields or, for v4, from the
    /// `Issuer`/`IssuerFingerprint` subpackets (checking both areas,
    /// hashed first).
    pub fn issuer(&self) -> Option<KeyID> {
        if let Some((_, issuer)) = &self.v3_creation_time_and_issuer {
            return Some(*issuer);
        }
        for area in [&self.hashed_area, &self.unhashed_area] {
            if let Some(sp) = area.get(SubpacketTag::Issuer) {
                if let SubpacketValue::Issuer(id) = sp.value {
                    return Some(id);
                }
            }
            if let Some(sp) = area.get(SubpacketTag::IssuerFingerprint) {
                if let SubpacketValue::IssuerFingerprint(fp) = &sp.value {
                    return Some(fp.to_key_id());
                }
            }
        }
        None
    }

    /// Whether any critical subpacket in either area has a type this
    /// crate does not recognize (`Unparsed` with an `Unknown` tag) —
    /// per RFC 4880 §5.2.3.1, such a signature must be treated as
    /// invalid.
    pub fn has_unknown_critical_subpacket(&self) -> bool {
        self.hashed_area
            .0
            .iter()
            .chain(self.unhashed_area.0.iter())
            .any(|sp| sp.critical && matches!(sp.tag, SubpacketTag::Unknown(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Signature {
        Signature {
            version: 4,
            sig_type: SignatureType::Binary,
            pk_algo: PublicKeyAlgorithm::RSAEncryptSign,
            hash_algo: HashAlgorithm::SHA256,
            v3_creation_time_and_issuer: None,
            hashed_area: SubpacketArea::new(),
            unhashed_area: SubpacketArea::new(),
            digest_prefix: [0xAB, 0xCD],
            mpis: Mpis::RSA { s_or_c: MPI::new(&[1, 2, 3]) },
        }
    }

    #[test]
    fn v4_round_trip() {
        let sig = sample();
        let mut buf = Vec::new();
        sig.serialize(&mut buf).unwrap();
        let mut src = buffered_reader::Memory::new(&buf);
        let parsed = Signature::parse(&mut src).unwrap();
        assert_eq!(parsed.digest_prefix, sig.digest_prefix);
        assert_eq!(parsed.sig_type, sig.sig_type);
    }

    #[test]
    fn no_unknown_critical_by_default() {
        assert!(!sample().has_unknown_critical_subpacket());
    }

    #[test]
    fn unknown_critical_subpacket_detected() {
        let mut sig = sample();
        sig.hashed_area.push(Subpacket {
            tag: SubpacketTag::Unknown(99),
            critical: true,
            value: SubpacketValue::Unparsed(Box::new([0])),
        });
        assert!(sig.has_unknown_critical_subpacket());
    }
}
