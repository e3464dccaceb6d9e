//! Per-algorithm public and secret key material (the MPI sequences
//! that follow a key packet's version/timestamp/algorithm fields).

use std::io::{self, Write};

use buffered_reader::BufferedReader;

use crate::error::{Error, Result};
use crate::mpi::MPI;
use crate::types::{Curve, PublicKeyAlgorithm};

/// The public parameters of a key, shaped by its algorithm (RFC 4880
/// §5.5.2, RFC 6637 §9 for the ECC variants).
#[derive(Clone, Debug, PartialEq)]
pub enum PublicKeyMaterial {
    /// RSA: modulus `n`, exponent `e`.
    RSA { n: MPI, e: MPI },
    /// DSA: prime `p`, group order `q`, generator `g`, public value `y`.
    DSA { p: MPI, q: MPI, g: MPI, y: MPI },
    /// ElGamal: prime `p`, generator `g`, public value `y`.
    ElGamal { p: MPI, g: MPI, y: MPI },
    /// ECDSA/EdDSA: curve and the encoded public point.
    EC { curve: Curve, q: MPI },
    /// ECDH: curve, encoded public point, and the KDF parameters
    /// used to derive the key-wrapping key (RFC 6637 §8).
    ECDH {
        curve: Curve,
        q: MPI,
        hash: crate::types::HashAlgorithm,
        sym: crate::types::SymmetricAlgorithm,
    },
    /// Public parameters for an algorithm this crate does not
    /// interpret; the raw MPI sequence is preserved for round-trip.
    Unknown { mpis: Vec<MPI>, rest: Box<[u8]> },
}

impl PublicKeyMaterial {
    /// Parses public key material for `algo` from `source`.
    pub fn parse<C>(
        algo: PublicKeyAlgorithm,
        source: &mut dyn BufferedReader<C>,
    ) -> Result<PublicKeyMaterial> {
        use PublicKeyAlgorithm::*;
        Ok(match algo {
            RSAEncryptSign | RSAEncryptOnly | RSASignOnly => {
                let n = MPI::parse(source)?;
                let e = MPI::parse(source)?;
                PublicKeyMaterial::RSA { n, e }
            }
            DSA => {
                let p = MPI::parse(source)?;
                let q = MPI::parse(source)?;
                let g = MPI::parse(source)?;
                let y = MPI::parse(source)?;
                PublicKeyMaterial::DSA { p, q, g, y }
            }
            ElGamalEncryptOnly | ElGamalEncryptSign => {
                let p = MPI::parse(source)?;
                let g = MPI::parse(source)?;
                let y = MPI::parse(source)?;
                PublicKeyMaterial::ElGamal { p, g, y }
            }
            ECDSA | EdDSA => {
                let curve = parse_curve_oid(source)?;
                let q = MPI::parse(source)?;
                PublicKeyMaterial::EC { curve, q }
            }
            ECDH => {
                let curve = parse_curve_oid(source)?;
                let q = MPI::parse(source)?;
                let kdf_len = {
                    let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                    buf[0]
                };
                source.consume(1);
                if kdf_len != 3 {
                    return Err(anyhow::Error::new(Error::MalformedPacket(format!(
                        "ECDH KDF parameter field has unexpected length {}",
                        kdf_len
                    ))));
                }
                let buf = source.data_hard(3).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                let (reserved, hash, sym) = (buf[0], buf[1], buf[2]);
                source.consume(3);
                if reserved != 1 {
                    return Err(anyhow::Error::new(Error::MalformedPacket(
                        "ECDH KDF parameter reserved octet is not 1".into(),
                    )));
                }
                PublicKeyMaterial::ECDH {
                    curve,
                    q,
                    hash: crate::types::HashAlgorithm::from(hash),
                    sym: crate::types::SymmetricAlgorithm::from(sym),
                }
            }
            _ => {
                // Unknown algorithm: we cannot know how many MPIs
                // follow, so we cannot safely continue parsing the
                // packet. Callers fall back to an Unknown packet.
                return Err(anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                    "public key algorithm {}", algo
                ))));
            }
        })
    }

    /// Serializes this public key material to `w`.
    pub fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        match self {
            PublicKeyMaterial::RSA { n, e } => {
                n.serialize(w)?;
                e.serialize(w)
            }
            PublicKeyMaterial::DSA { p, q, g, y } => {
                p.serialize(w)?;
                q.serialize(w)?;
                g.serialize(w)?;
                y.serialize(w)
            }
            PublicKeyMaterial::ElGamal { p, g, y } => {
                p.serialize(w)?;
                g.serialize(w)?;
                y.serialize(w)
            }
            PublicKeyMaterial::EC { curve, q } => {
                serialize_curve_oid(curve, w)?;
                q.serialize(w)
            }
            PublicKeyMaterial::ECDH { curve, q, hash, sym } => {
                serialize_curve_oid(curve, w)?;
                q.serialize(w)?;
                w.write_all(&[3, 1, u8::from(*hash), u8::from(*sym)])
            }
            PublicKeyMaterial::Unknown { mpis, rest } => {
                for mpi in mpis {
                    mpi.serialize(w)?;
                }
                w.write_all(rest)
            }
        }
    }

    /// The algorithm this material belongs to, used when a `Key`
    /// needs it but only has the material at hand (e.g. for grip
    /// computation).
    pub fn public_mpis(&self) -> Vec<&[u8]> {
        match self {
            PublicKeyMaterial::RSA { n, e } => vec![n.value(), e.value()],
            PublicKeyMaterial::DSA { p, q, g, y } => {
                vec![p.value(), q.value(), g.value(), y.value()]
            }
            PublicKeyMaterial::ElGamal { p, g, y } => vec![p.value(), g.value(), y.value()],
            PublicKeyMaterial::EC { q, .. } | PublicKeyMaterial::ECDH { q, .. } => vec![q.value()],
            PublicKeyMaterial::Unknown { mpis, .. } => mpis.iter().map(|m| m.value()).collect(),
        }
    }
}

fn parse_curve_oid<C>(source: &mut dyn BufferedReader<C>) -> Result<Curve> {
    let len = {
        let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
        buf[0] as usize
    };
    source.consume(1);
    if len == 0 || len == 0xFF {
        return Err(anyhow::Error::new(Error::MalformedPacket(
            "reserved curve OID length".into(),
        )));
    }
    let buf = source.data_hard(len).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
    let oid = buf[..len].to_vec();
    source.consume(len);
    Ok(Curve::from_oid(&oid))
}

fn serialize_curve_oid(curve: &Curve, w: &mut dyn Write) -> io::Result<()> {
    let oid = curve.oid();
    w.write_all(&[oid.len() as u8])?;
    w.write_all(oid)
}

/// The secret parameters of a key, shaped by its algorithm (RFC 4880
/// §5.5.3). These are the plaintext values; on-wire they are wrapped
/// by [`super::key::SecretKeyProtection`].
#[derive(Clone, Debug, PartialEq)]
pub enum SecretKeyMaterial {
    /// RSA: private exponent `d`, primes `p`, `q`, and `u = p^-1 mod q`.
    RSA { d: MPI, p: MPI, q: MPI, u: MPI },
    /// DSA: secret exponent `x`.
    DSA { x: MPI },
    /// ElGamal: secret exponent `x`.
    ElGamal { x: MPI },
    /// ECDSA/EdDSA/ECDH: secret scalar `d`.
    EC { d: MPI },
    /// Secret parameters for an algorithm this crate does not
    /// interpret.
    Unknown { mpis: Vec<MPI> },
}

impl SecretKeyMaterial {
    /// Parses secret key material for `algo` from `source` (the
    /// *already-decrypted* plaintext MPI sequence, without the
    /// trailing checksum, which the caller strips separately).
    pub fn parse<C>(
        algo: PublicKeyAlgorithm,
        source: &mut dyn BufferedReader<C>,
    ) -> Result<SecretKeyMaterial> {
        use PublicKeyAlgorithm::*;
        Ok(match algo {
            RSAEncryptSign | RSAEncryptOnly | RSASignOnly => {
                let d = MPI::parse(source)?;
                let p = MPI::parse(source)?;
                let q = MPI::parse(source)?;
                let u = MPI::parse(source)?;
                SecretKeyMaterial::RSA { d, p, q, u }
            }
            DSA => SecretKeyMaterial::DSA { x: MPI::parse(source)? },
            ElGamalEncryptOnly | ElGamalEncryptSign => {
                SecretKeyMaterial::ElGamal { x: MPI::parse(source)? }
            }
            ECDSA | EdDSA | ECDH => SecretKeyMaterial::EC { d: MPI::parse(source)? },
            _ => {
                return Err(anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                    "public key algorithm {}", algo
                ))))
            }
        })
    }

    /// Serializes the plaintext secret MPI sequence (without
    /// checksum) to `w`.
    pub fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        match self {
            SecretKeyMaterial::RSA { d, p, q, u } => {
                d.serialize(w)?;
                p.serialize(w)?;
                q.serialize(w)?;
                u.serialize(w)
            }
            SecretKeyMaterial::DSA { x } => x.serialize(w),
            SecretKeyMaterial::ElGamal { x } => x.serialize(w),
            SecretKeyMaterial::EC { d } => d.serialize(w),
            SecretKeyMaterial::Unknown { mpis } => {
                for mpi in mpis {
                    mpi.serialize(w)?;
                }
                Ok(())
            }
        }
    }
}
