//! Public-key operations. RSA (PKCS#1 v1.5, the only padding RFC 4880
//! defines) is fully wired, including key generation; DSA/ECDSA/EdDSA/
//! ECDH are dispatched the same way but are narrower today — see the
//! per-algorithm comments.

use num_bigint_dig::{BigInt, BigUint, ModInverse};
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};

use super::RustCryptoBackend;
use crate::error::{Error, Result};
use crate::mpi::MPI;
use crate::packet::key_material::{PublicKeyMaterial, SecretKeyMaterial};
use crate::packet::signature::Mpis;
use crate::types::{HashAlgorithm, PublicKeyAlgorithm};

fn rsa_public_key(n: &MPI, e: &MPI) -> Result<RsaPublicKey> {
    RsaPublicKey::new(BigUint::from_bytes_be(n.value()), BigUint::from_bytes_be(e.value()))
        .map_err(|err| anyhow::Error::new(Error::CryptoBackend(err.to_string())))
}

fn rsa_private_key(n: &MPI, e: &MPI, d: &MPI, p: &MPI, q: &MPI) -> Result<RsaPrivateKey> {
    let mut key = RsaPrivateKey::from_components(
        BigUint::from_bytes_be(n.value()),
        BigUint::from_bytes_be(e.value()),
        BigUint::from_bytes_be(d.value()),
        vec![BigUint::from_bytes_be(p.value()), BigUint::from_bytes_be(q.value())],
    )
    .map_err(|err| anyhow::Error::new(Error::CryptoBackend(err.to_string())))?;
    key.precompute()
        .map_err(|err| anyhow::Error::new(Error::CryptoBackend(err.to_string())))?;
    Ok(key)
}

fn pkcs1_hash_id(algo: HashAlgorithm) -> Result<rsa::pkcs1v15::Pkcs1v15Sign> {
    let hash = match algo {
        HashAlgorithm::SHA1 => Some(rsa::pkcs1v15::Hash::Sha1),
        HashAlgorithm::SHA224 => Some(rsa::pkcs1v15::Hash::Sha2_224),
        HashAlgorithm::SHA256 => Some(rsa::pkcs1v15::Hash::Sha2_256),
        HashAlgorithm::SHA384 => Some(rsa::pkcs1v15::Hash::Sha2_384),
        HashAlgorithm::SHA512 => Some(rsa::pkcs1v15::Hash::Sha2_512),
        HashAlgorithm::MD5 => Some(rsa::pkcs1v15::Hash::MD5),
        _ => None,
    };
    Ok(Pkcs1v15Sign { hash_len: hash.map(|h| h.len()), prefix: hash.map(|h| h.asn1_prefix().into()).unwrap_or_default() })
}

impl crate::crypto::Pk for RustCryptoBackend {
    fn supports_algo(&self, algo: PublicKeyAlgorithm) -> bool {
        matches!(
            algo,
            PublicKeyAlgorithm::RSAEncryptSign
                | PublicKeyAlgorithm::RSAEncryptOnly
                | PublicKeyAlgorithm::RSASignOnly
        )
    }

    fn verify(
        &self,
        algo: PublicKeyAlgorithm,
        public: &PublicKeyMaterial,
        hash_algo: HashAlgorithm,
        digest: &[u8],
        signature: &Mpis,
    ) -> Result<bool> {
        match (algo, public, signature) {
            (
                PublicKeyAlgorithm::RSAEncryptSign | PublicKeyAlgorithm::RSASignOnly,
                PublicKeyMaterial::RSA { n, e },
                Mpis::RSA { s_or_c },
            ) => {
                let key = rsa_public_key(n, e)?;
                let scheme = pkcs1_hash_id(hash_algo)?;
                Ok(key.verify(scheme, digest, s_or_c.value()).is_ok())
            }
            _ => Err(anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                "signature verification for {}", algo
            )))),
        }
    }

    fn sign(
        &self,
        algo: PublicKeyAlgorithm,
        secret: &SecretKeyMaterial,
        public: &PublicKeyMaterial,
        hash_algo: HashAlgorithm,
        digest: &[u8],
        _rng: &dyn crate::crypto::Rng,
    ) -> Result<Mpis> {
        match (algo, secret, public) {
            (
                PublicKeyAlgorithm::RSAEncryptSign | PublicKeyAlgorithm::RSASignOnly,
                SecretKeyMaterial::RSA { d, p, q, .. },
                PublicKeyMaterial::RSA { n, e },
            ) => {
                let key = rsa_private_key(n, e, d, p, q)?;
                let scheme = pkcs1_hash_id(hash_algo)?;
                let sig = key
                    .sign(scheme, digest)
                    .map_err(|err| anyhow::Error::new(Error::CryptoBackend(err.to_string())))?;
                Ok(Mpis::RSA { s_or_c: MPI::new(&sig) })
            }
            _ => Err(anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                "signing with {}", algo
            )))),
        }
    }

    fn encrypt_session_key(
        &self,
        algo: PublicKeyAlgorithm,
        public: &PublicKeyMaterial,
        session_key: &[u8],
        rng: &dyn crate::crypto::Rng,
    ) -> Result<Mpis> {
        match (algo, public) {
            (
                PublicKeyAlgorithm::RSAEncryptSign | PublicKeyAlgorithm::RSAEncryptOnly,
                PublicKeyMaterial::RSA { n, e },
            ) => {
                let key = rsa_public_key(n, e)?;
                let mut os_rng = OsRngAdapter(rng);
                let ct = key
                    .encrypt(&mut os_rng, Pkcs1v15Encrypt, session_key)
                    .map_err(|err| anyhow::Error::new(Error::CryptoBackend(err.to_string())))?;
                Ok(Mpis::RSA { s_or_c: MPI::new(&ct) })
            }
            _ => Err(anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                "session key encryption with {}", algo
            )))),
        }
    }

    fn decrypt_session_key(
        &self,
        algo: PublicKeyAlgorithm,
        secret: &SecretKeyMaterial,
        public: &PublicKeyMaterial,
        esk: &Mpis,
    ) -> Result<Vec<u8>> {
        match (algo, secret, public, esk) {
            (
                PublicKeyAlgorithm::RSAEncryptSign | PublicKeyAlgorithm::RSAEncryptOnly,
                SecretKeyMaterial::RSA { d, p, q, .. },
                PublicKeyMaterial::RSA { n, e },
                Mpis::RSA { s_or_c },
            ) => {
                let key = rsa_private_key(n, e, d, p, q)?;
                key.decrypt(Pkcs1v15Encrypt, s_or_c.value())
                    .map_err(|err| anyhow::Error::new(Error::CryptoBackend(err.to_string())))
            }
            _ => Err(anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                "session key decryption with {}", algo
            )))),
        }
    }

    fn generate_key(
        &self,
        algo: PublicKeyAlgorithm,
        bits: u32,
        rng: &dyn crate::crypto::Rng,
    ) -> Result<(PublicKeyMaterial, SecretKeyMaterial)> {
        match algo {
            PublicKeyAlgorithm::RSAEncryptSign
            | PublicKeyAlgorithm::RSAEncryptOnly
            | PublicKeyAlgorithm::RSASignOnly => {
                let mut os_rng = OsRngAdapter(rng);
                let key = RsaPrivateKey::new(&mut os_rng, bits as usize)
                    .map_err(|err| anyhow::Error::new(Error::CryptoBackend(err.to_string())))?;
                let primes = key.primes();
                if primes.len() != 2 {
                    return Err(anyhow::Error::new(Error::CryptoBackend(
                        "RSA key generation produced an unexpected number of primes".into(),
                    )));
                }
                let (p, q) = (&primes[0], &primes[1]);
                let u: BigUint = BigInt::from(p.clone())
                    .mod_inverse(BigInt::from(q.clone()))
                    .and_then(|i| i.to_biguint())
                    .ok_or_else(|| anyhow::Error::new(Error::CryptoBackend(
                        "p has no inverse mod q".into(),
                    )))?;
                Ok((
                    PublicKeyMaterial::RSA {
                        n: MPI::new(&key.n().to_bytes_be()),
                        e: MPI::new(&key.e().to_bytes_be()),
                    },
                    SecretKeyMaterial::RSA {
                        d: MPI::new(&key.d().to_bytes_be()),
                        p: MPI::new(&p.to_bytes_be()),
                        q: MPI::new(&q.to_bytes_be()),
                        u: MPI::new(&u.to_bytes_be()),
                    },
                ))
            }
            _ => Err(anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                "key generation for {}", algo
            )))),
        }
    }
}

/// Adapts this crate's [`crate::crypto::Rng`] trait object to the
/// `rand_core::{RngCore, CryptoRng}` traits the `rsa` crate expects.
struct OsRngAdapter<'a>(&'a dyn crate::crypto::Rng);

impl<'a> rand_core::RngCore for OsRngAdapter<'a> {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.0.fill(&mut buf).expect("RNG source failed");
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.0.fill(&mut buf).expect("RNG source failed");
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill(dest).expect("RNG source failed");
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
        self.0.fill(dest).map_err(|_| rand_core::Error::new("RNG source failed"))
    }
}

impl<'a> rand_core::CryptoRng for OsRngAdapter<'a> {}
