//! The default crypto backend, built from pure-Rust RustCrypto
//! crates rather than a system library (the teacher links Nettle;
//! this crate follows the pack's more common Rust-ecosystem choice
//! instead — see `DESIGN.md`).

mod aead;
mod cipher;
mod hash;
mod pk;
mod rng;

/// The default, pure-Rust crypto backend. Implements
/// [`crate::crypto::Hash`], [`crate::crypto::Cipher`],
/// [`crate::crypto::Aead`], [`crate::crypto::Pk`], and
/// [`crate::crypto::Rng`]; holds no state of its own.
#[derive(Default, Debug, Clone, Copy)]
pub struct RustCryptoBackend;
