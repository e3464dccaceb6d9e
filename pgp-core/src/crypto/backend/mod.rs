//! Cryptographic backend selection. Only one backend ships today
//! ([`rustcrypto`]), but packet/key/message code never names it
//! directly — they hold `&dyn Hash`/`&dyn Cipher`/... trait objects
//! handed to them by [`crate::context::Context`].

#[cfg(feature = "crypto-rust")]
pub mod rustcrypto;

/// The hash, cipher, AEAD, public-key, and RNG capability grouped
/// together, the way a single backend crate provides all of them.
pub trait Backend: super::Hash + super::Cipher + super::Aead + super::Pk + super::Rng {}

impl<T> Backend for T where T: super::Hash + super::Cipher + super::Aead + super::Pk + super::Rng {}
