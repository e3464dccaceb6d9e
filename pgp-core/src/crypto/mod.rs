//! The crypto capability interface: the core never calls a
//! cryptographic primitive directly, only through these traits, so
//! that the RustCrypto-backed implementation in [`backend::rustcrypto`]
//! can be swapped out without touching packet/key/message code.

pub mod mem;
pub mod backend;

use crate::error::Result;
use crate::types::{AEADAlgorithm, HashAlgorithm, PublicKeyAlgorithm, SymmetricAlgorithm};

pub use backend::rustcrypto::RustCryptoBackend;

/// A keyed or unkeyed cryptographic hash function.
pub trait Hash: Send + Sync {
    /// Computes the digest of the concatenation of `chunks`,
    /// avoiding an extra copy when the input is naturally split (a
    /// key body prefix, then a user ID body, for certification
    /// hashing).
    fn digest(&self, algo: HashAlgorithm, chunks: &[&[u8]]) -> Result<Vec<u8>>;
}

/// Symmetric cipher operations: CFB-mode encrypt/decrypt, the only
/// mode OpenPGP's non-AEAD packets use (RFC 4880 §13.9).
pub trait Cipher: Send + Sync {
    /// Encrypts `plaintext` with `key`/`iv` in CFB mode, one
    /// contiguous stream.
    fn cfb_encrypt(
        &self,
        algo: SymmetricAlgorithm,
        key: &[u8],
        iv: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>>;

    /// Decrypts `ciphertext` with `key`/`iv` in CFB mode, one
    /// contiguous stream (v4 secret key packets, SED/SEIP bodies).
    fn cfb_decrypt(
        &self,
        algo: SymmetricAlgorithm,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;

    /// Decrypts a v3 secret key packet's MPI region: each MPI
    /// (2-byte bit-count prefix plus body) is decrypted
    /// independently with the CFB register resynchronized to the
    /// ciphertext of the previous MPI's last block, per RFC 4880
    /// §5.5.3.
    fn cfb_decrypt_v3_resync(
        &self,
        algo: SymmetricAlgorithm,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;
}

/// AEAD (EAX/OCB) operations (RFC 4880bis §5.16).
pub trait Aead: Send + Sync {
    /// Encrypts `plaintext`, authenticating `aad`, returning
    /// ciphertext with the tag appended.
    fn seal(
        &self,
        algo: AEADAlgorithm,
        symm_algo: SymmetricAlgorithm,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>>;

    /// Decrypts and verifies `ciphertext` (tag included at the end),
    /// returning the plaintext. Fails with
    /// [`crate::Error::ManipulatedMessage`] on tag mismatch.
    fn open(
        &self,
        algo: AEADAlgorithm,
        symm_algo: SymmetricAlgorithm,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;
}

/// Public-key operations: signing, verification, session-key
/// encryption/decryption.
pub trait Pk: Send + Sync {
    /// Whether this backend implements `algo`.
    fn supports_algo(&self, algo: PublicKeyAlgorithm) -> bool;

    /// Verifies a signature over `digest` (already hashed) against
    /// `public` key material.
    fn verify(
        &self,
        algo: PublicKeyAlgorithm,
        public: &crate::packet::key_material::PublicKeyMaterial,
        hash_algo: HashAlgorithm,
        digest: &[u8],
        signature: &crate::packet::signature::Mpis,
    ) -> Result<bool>;

    /// Produces a signature over `digest` (already hashed) with
    /// `secret` key material.
    fn sign(
        &self,
        algo: PublicKeyAlgorithm,
        secret: &crate::packet::key_material::SecretKeyMaterial,
        public: &crate::packet::key_material::PublicKeyMaterial,
        hash_algo: HashAlgorithm,
        digest: &[u8],
        rng: &dyn Rng,
    ) -> Result<crate::packet::signature::Mpis>;

    /// Encrypts a session key to `public`, for a PKESK packet.
    fn encrypt_session_key(
        &self,
        algo: PublicKeyAlgorithm,
        public: &crate::packet::key_material::PublicKeyMaterial,
        session_key: &[u8],
        rng: &dyn Rng,
    ) -> Result<crate::packet::signature::Mpis>;

    /// Decrypts a PKESK's encrypted session key with `secret` key
    /// material.
    fn decrypt_session_key(
        &self,
        algo: PublicKeyAlgorithm,
        secret: &crate::packet::key_material::SecretKeyMaterial,
        public: &crate::packet::key_material::PublicKeyMaterial,
        esk: &crate::packet::signature::Mpis,
    ) -> Result<Vec<u8>>;

    /// Generates a fresh key pair for `algo`. `bits` is the modulus
    /// size for RSA and is ignored by fixed-size algorithms.
    fn generate_key(
        &self,
        algo: PublicKeyAlgorithm,
        bits: u32,
        rng: &dyn Rng,
    ) -> Result<(
        crate::packet::key_material::PublicKeyMaterial,
        crate::packet::key_material::SecretKeyMaterial,
    )>;
}

/// A cryptographically secure random number source.
pub trait Rng: Send + Sync {
    /// Fills `buf` with random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}
