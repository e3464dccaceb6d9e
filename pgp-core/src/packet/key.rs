//! Public and secret key packets (RFC 4880 §5.5).

use std::io::{self, Write};

use buffered_reader::BufferedReader;

use crate::crypto::mem::Protected;
use crate::error::{Error, Result};
use crate::fingerprint::{Fingerprint, KeyID};
use crate::mpi::S2K;
use crate::packet::key_material::{PublicKeyMaterial, SecretKeyMaterial};
use crate::types::{PublicKeyAlgorithm, SymmetricAlgorithm, Timestamp};

/// How a secret key packet's MPI region is protected (RFC 4880
/// §5.5.3).
#[derive(Clone, Debug, PartialEq)]
pub enum SecretKeyProtection {
    /// Cleartext MPIs, trailed by a 16-bit mod-65536 checksum.
    Cleartext,
    /// Encrypted with `symm_alg` in CFB mode, trailed by a SHA-1 hash
    /// of the cleartext (S2K usage octet `0xFE`).
    Encrypted {
        symm_alg: SymmetricAlgorithm,
        s2k: S2K,
        iv: Vec<u8>,
        sha1_checksum: bool,
    },
}

/// The key packet body common to public keys, secret keys, and their
/// subkey variants (they differ only in which [`Tag`][super::header::Tag]
/// they're framed with and in whether secret material is present).
#[derive(Clone, Debug)]
pub struct KeyPacket {
    /// Packet version: 3 or 4.
    pub version: u8,
    /// Key creation time.
    pub creation_time: Timestamp,
    /// Validity period in days; only meaningful for v3 keys (v4
    /// validity is conveyed by signature subpackets instead).
    pub v3_days_valid: Option<u16>,
    /// Public-key algorithm.
    pub algo: PublicKeyAlgorithm,
    /// Public key material.
    pub public: PublicKeyMaterial,
    /// Secret key material and its protection, if this is a secret
    /// key packet.
    pub secret: Option<SecretParts>,
}

/// The encrypted-or-cleartext secret half of a secret key packet.
#[derive(Clone, Debug)]
pub struct SecretParts {
    /// How the secret material is protected.
    pub protection: SecretKeyProtection,
    /// The on-wire bytes of the (possibly encrypted) secret MPI
    /// region plus its trailing checksum/hash, exactly as read from
    /// the packet. Decrypting and validating this is
    /// [`KeyPacket::unlock`]'s job; it is kept raw here so that a key
    /// with the wrong password can still be loaded, fingerprinted,
    /// and re-serialized byte-identically.
    pub raw: Box<[u8]>,
}

impl KeyPacket {
    /// Parses a key packet body (after the tag/length header has
    /// already been consumed) of `body_len` bytes from `source`.
    /// `secret` selects whether a secret-key trailer is expected.
    pub fn parse<C>(
        source: &mut dyn BufferedReader<C>,
        body_len: usize,
        secret: bool,
    ) -> Result<KeyPacket> {
        let version = {
            let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            buf[0]
        };
        source.consume(1);

        let creation_time = Timestamp(source.read_be_u32().map_err(|e| anyhow::Error::new(Error::Io(e)))?);

        let (v3_days_valid, algo) = if version == 3 {
            let days = source.read_be_u16().map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            let algo_byte = {
                let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                buf[0]
            };
            source.consume(1);
            (Some(days), PublicKeyAlgorithm::from(algo_byte))
        } else if version == 4 {
            let algo_byte = {
                let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                buf[0]
            };
            source.consume(1);
            (None, PublicKeyAlgorithm::from(algo_byte))
        } else {
            return Err(anyhow::Error::new(Error::MalformedPacket(format!(
                "unsupported key packet version {}", version
            ))));
        };

        if version == 3 && !matches!(
            algo,
            PublicKeyAlgorithm::RSAEncryptSign
                | PublicKeyAlgorithm::RSAEncryptOnly
                | PublicKeyAlgorithm::RSASignOnly
        ) {
            return Err(anyhow::Error::new(Error::MalformedPacket(
                "v3 keys may only use RSA".into(),
            )));
        }

        let public = PublicKeyMaterial::parse(algo, source)?;

        let secret_parts = if secret {
            let s2k_usage = {
                let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                buf[0]
            };
            source.consume(1);

            let protection = match s2k_usage {
                0 => SecretKeyProtection::Cleartext,
                0xFE | 0xFF => {
                    let symm_byte = {
                        let buf = source.data_hard(1).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                        buf[0]
                    };
                    source.consume(1);
                    let symm_alg = SymmetricAlgorithm::from(symm_byte);
                    let s2k = S2K::parse(source)?;
                    let block_size = symm_alg.block_size().ok_or_else(|| {
                        anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                            "symmetric algorithm {}", symm_alg
                        )))
                    })?;
                    let iv_buf = source
                        .data_hard(block_size)
                        .map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                    let iv = iv_buf[..block_size].to_vec();
                    source.consume(block_size);
                    SecretKeyProtection::Encrypted {
                        symm_alg,
                        s2k,
                        iv,
                        sha1_checksum: s2k_usage == 0xFE,
                    }
                }
                other => {
                    return Err(anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                        "S2K usage octet {}", other
                    ))))
                }
            };

            // Everything else in the packet body is the (possibly
            // encrypted) secret MPI region plus its trailer; read it
            // verbatim rather than trying to interpret it before
            // decryption.
            let remaining = source.data_eof().map_err(|e| anyhow::Error::new(Error::Io(e)))?.len();
            let raw = source
                .data_consume_hard(remaining)
                .map_err(|e| anyhow::Error::new(Error::Io(e)))?
                .to_vec()
                .into_boxed_slice();

            Some(SecretParts { protection, raw })
        } else {
            let _ = body_len;
            None
        };

        Ok(KeyPacket {
            version,
            creation_time,
            v3_days_valid,
            algo,
            public,
            secret: secret_parts,
        })
    }

    /// Serializes the public portion of this key packet's body
    /// (version, timestamp, algorithm, MPIs — the part both public
    /// and secret key packets share) to `w`.
    pub fn serialize_public(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&[self.version])?;
        w.write_all(&self.creation_time.0.to_be_bytes())?;
        if self.version == 3 {
            w.write_all(&self.v3_days_valid.unwrap_or(0).to_be_bytes())?;
        }
        w.write_all(&[u8::from(self.algo)])?;
        self.public.serialize(w)
    }

    /// Serializes the full packet body, including the secret portion
    /// if present, to `w`.
    pub fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        self.serialize_public(w)?;
        if let Some(secret) = &self.secret {
            let usage = match &secret.protection {
                SecretKeyProtection::Cleartext => 0u8,
                SecretKeyProtection::Encrypted { sha1_checksum: true, .. } => 0xFE,
                SecretKeyProtection::Encrypted { sha1_checksum: false, .. } => 0xFF,
            };
            w.write_all(&[usage])?;
            if let SecretKeyProtection::Encrypted { symm_alg, s2k, iv, .. } = &secret.protection {
                w.write_all(&[u8::from(*symm_alg)])?;
                s2k.serialize(w)?;
                w.write_all(iv)?;
            }
            w.write_all(&secret.raw)?;
        }
        Ok(())
    }

    /// This key's v4 fingerprint ingredient: `0x99 ‖ u16 len ‖ body`
    /// where `body` is the serialized public portion — the prefix
    /// both the fingerprint digest and v4 signature hashing use (RFC
    /// 4880 §5.2.4, §12.2).
    pub fn fingerprint_prefix(&self) -> Vec<u8> {
        let mut body = Vec::new();
        self.serialize_public(&mut body).expect("Vec<u8> Write is infallible");
        let mut out = Vec::with_capacity(3 + body.len());
        out.push(0x99);
        out.extend_from_slice(&(body.len() as u16).to_be_bytes());
        out.extend_from_slice(&body);
        out
    }

    /// Computes this key's fingerprint: SHA-1 over
    /// [`KeyPacket::fingerprint_prefix`] for v4 keys; MD5 over the
    /// raw MPI bytes (no length prefix byte) for v3 keys, per RFC
    /// 4880 §12.2.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        if self.version == 4 {
            use sha1collisiondetection::{Digest, Sha1CD};
            let mut hasher = Sha1CD::new();
            hasher.update(&self.fingerprint_prefix());
            let digest = hasher.finalize();
            Ok(Fingerprint::from_bytes(&digest))
        } else {
            use md5::{Digest, Md5};
            let mut hasher = Md5::new();
            for mpi in self.public.public_mpis() {
                hasher.update(mpi);
            }
            let digest = hasher.finalize();
            Ok(Fingerprint::from_bytes(&digest))
        }
    }

    /// This key's key ID (the low 8 bytes of a v4 fingerprint, or for
    /// v3 keys the low 4 bytes of the RSA modulus).
    pub fn key_id(&self) -> Result<KeyID> {
        if self.version == 4 {
            Ok(self.fingerprint()?.to_key_id())
        } else if let PublicKeyMaterial::RSA { n, .. } = &self.public {
            let bytes = n.value();
            let n_bytes = bytes.len();
            Ok(KeyID::from_bytes(&bytes[n_bytes.saturating_sub(8)..]))
        } else {
            Err(anyhow::Error::new(Error::MalformedPacket(
                "v3 key using non-RSA algorithm".into(),
            )))
        }
    }

    /// Decrypts this key's secret material with `passphrase`,
    /// verifying its checksum/hash, and returns the parsed plaintext
    /// [`SecretKeyMaterial`]. Returns [`Error::BadPassword`] if the
    /// passphrase is wrong or the packet has no secret parts.
    pub fn unlock(
        &self,
        passphrase: &Protected,
        cipher: &dyn crate::crypto::Cipher,
        hash_fn: &dyn Fn(
            crate::types::HashAlgorithm,
            &[&[u8]],
        ) -> Result<Vec<u8>>,
    ) -> Result<SecretKeyMaterial> {
        let secret = self.secret.as_ref().ok_or_else(|| {
            anyhow::Error::new(Error::MalformedPacket("key packet has no secret material".into()))
        })?;

        let plaintext = match &secret.protection {
            SecretKeyProtection::Cleartext => {
                if secret.raw.len() < 2 {
                    return Err(anyhow::Error::new(Error::MalformedPacket(
                        "secret key material shorter than its checksum".into(),
                    )));
                }
                let (mpis, checksum) = secret.raw.split_at(secret.raw.len() - 2);
                let expected = u16::from_be_bytes([checksum[0], checksum[1]]);
                let actual = mod65536_sum(mpis);
                if expected != actual {
                    return Err(anyhow::Error::new(Error::BadPassword));
                }
                mpis.to_vec()
            }
            SecretKeyProtection::Encrypted { symm_alg, s2k, iv, sha1_checksum } => {
                let key_len = symm_alg.key_size().ok_or_else(|| {
                    anyhow::Error::new(Error::UnsupportedAlgorithm(format!("{}", symm_alg)))
                })?;
                let key = s2k.derive_key(passphrase.as_bytes(), key_len, hash_fn)?;
                let decrypted = if self.version == 3 {
                    cipher.cfb_decrypt_v3_resync(*symm_alg, &key, iv, &secret.raw)?
                } else {
                    cipher.cfb_decrypt(*symm_alg, &key, iv, &secret.raw)?
                };

                let trailer_len = if *sha1_checksum { 20 } else { 2 };
                if decrypted.len() < trailer_len {
                    return Err(anyhow::Error::new(Error::BadPassword));
                }
                let (mpis, trailer) = decrypted.split_at(decrypted.len() - trailer_len);
                let ok = if *sha1_checksum {
                    let digest = hash_fn(crate::types::HashAlgorithm::SHA1, &[mpis])?;
                    digest == trailer
                } else {
                    mod65536_sum(mpis).to_be_bytes() == trailer
                };
                if !ok {
                    return Err(anyhow::Error::new(Error::BadPassword));
                }
                mpis.to_vec()
            }
        };

        let mut reader = buffered_reader::Memory::new(&plaintext);
        SecretKeyMaterial::parse(self.algo, &mut reader)
    }

    /// Builds a fresh v4 key packet around newly generated material,
    /// with its secret part left cleartext (protect it with
    /// [`KeyPacket::protect`] before it leaves the process, per
    /// spec.md §5's secret-hygiene requirement).
    pub fn new_secret(
        algo: PublicKeyAlgorithm,
        creation_time: Timestamp,
        public: PublicKeyMaterial,
        secret: &SecretKeyMaterial,
    ) -> KeyPacket {
        let mut raw = Vec::new();
        secret.serialize(&mut raw).expect("Vec<u8> Write is infallible");
        let checksum = mod65536_sum(&raw);
        raw.extend_from_slice(&checksum.to_be_bytes());
        KeyPacket {
            version: 4,
            creation_time,
            v3_days_valid: None,
            algo,
            public,
            secret: Some(SecretParts {
                protection: SecretKeyProtection::Cleartext,
                raw: raw.into_boxed_slice(),
            }),
        }
    }

    /// Re-protects this key's secret material under `passphrase`,
    /// deriving an iterated-and-salted S2K key-encryption key and
    /// CFB-encrypting the plaintext MPIs plus a trailing SHA-1 hash
    /// (the `0xFE` usage octet form).
    pub fn protect(
        &self,
        passphrase: &Protected,
        symm_alg: SymmetricAlgorithm,
        cipher: &dyn crate::crypto::Cipher,
        rng: &dyn crate::crypto::Rng,
        hash_fn: &dyn Fn(crate::types::HashAlgorithm, &[&[u8]]) -> Result<Vec<u8>>,
    ) -> Result<KeyPacket> {
        let plaintext = self.unlock(passphrase, cipher, hash_fn).or_else(|_| {
            // Already-cleartext keys (e.g. straight from generation)
            // unlock with any passphrase since there is nothing to
            // decrypt; fall back to parsing the raw MPIs directly.
            let secret = self.secret.as_ref().ok_or_else(|| {
                anyhow::Error::new(Error::MalformedPacket("key packet has no secret material".into()))
            })?;
            match &secret.protection {
                SecretKeyProtection::Cleartext => {
                    let (mpis, _checksum) = secret.raw.split_at(secret.raw.len() - 2);
                    let mut reader = buffered_reader::Memory::new(mpis);
                    SecretKeyMaterial::parse(self.algo, &mut reader)
                }
                SecretKeyProtection::Encrypted { .. } => Err(anyhow::Error::new(Error::BadPassword)),
            }
        })?;

        let mut plain_mpis = Vec::new();
        plaintext.serialize(&mut plain_mpis).expect("Vec<u8> Write is infallible");

        let key_len = symm_alg.key_size().ok_or_else(|| {
            anyhow::Error::new(Error::UnsupportedAlgorithm(format!("{}", symm_alg)))
        })?;
        let mut salt = [0u8; 8];
        rng.fill(&mut salt)?;
        let s2k = S2K::IteratedAndSalted { hash: crate::types::HashAlgorithm::SHA256, salt, count: 65536 };
        let kek = s2k.derive_key(passphrase.as_bytes(), key_len, hash_fn)?;

        let block_size = symm_alg.block_size().ok_or_else(|| {
            anyhow::Error::new(Error::UnsupportedAlgorithm(format!("{}", symm_alg)))
        })?;
        let mut iv = vec![0u8; block_size];
        rng.fill(&mut iv)?;

        let sha1 = hash_fn(crate::types::HashAlgorithm::SHA1, &[&plain_mpis])?;
        let mut to_encrypt = plain_mpis;
        to_encrypt.extend_from_slice(&sha1);
        let encrypted = cipher.cfb_encrypt(symm_alg, &kek, &iv, &to_encrypt)?;

        Ok(KeyPacket {
            secret: Some(SecretParts {
                protection: SecretKeyProtection::Encrypted { symm_alg, s2k, iv, sha1_checksum: true },
                raw: encrypted.into_boxed_slice(),
            }),
            ..self.clone()
        })
    }
}

/// The mod-65536 checksum RFC 4880 uses for cleartext secret key
/// material and PKESK/SKESK session key framing: the sum of every
/// byte, reduced mod 2^16.
pub(crate) fn mod65536_sum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    for &b in data {
        sum = (sum + b as u32) & 0xFFFF;
    }
    sum as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpi::MPI;

    fn sample_rsa_public() -> KeyPacket {
        KeyPacket {
            version: 4,
            creation_time: Timestamp(1_000_000),
            v3_days_valid: None,
            algo: PublicKeyAlgorithm::RSAEncryptSign,
            public: PublicKeyMaterial::RSA {
                n: MPI::new(&[0x01, 0x02, 0x03]),
                e: MPI::new(&[0x01, 0x00, 0x01]),
            },
            secret: None,
        }
    }

    #[test]
    fn fingerprint_is_20_bytes_for_v4() {
        let k = sample_rsa_public();
        let fp = k.fingerprint().unwrap();
        assert_eq!(fp.as_bytes().len(), 20);
    }

    #[test]
    fn public_serialize_parse_round_trip() {
        let k = sample_rsa_public();
        let mut buf = Vec::new();
        k.serialize_public(&mut buf).unwrap();
        let mut src = buffered_reader::Memory::new(&buf);
        let parsed = KeyPacket::parse(&mut src, buf.len(), false).unwrap();
        assert_eq!(parsed.fingerprint().unwrap(), k.fingerprint().unwrap());
    }

    #[test]
    fn mod65536_sum_matches_known_value() {
        assert_eq!(mod65536_sum(&[0xFF, 0xFF, 0x02]), 512);
    }
}
