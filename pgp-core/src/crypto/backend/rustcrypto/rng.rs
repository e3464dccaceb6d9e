//! A cryptographically secure RNG source backed by the `rand` crate's
//! OS-seeded generator.

use rand::RngCore;

use super::RustCryptoBackend;
use crate::error::Result;

impl crate::crypto::Rng for RustCryptoBackend {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        rand::thread_rng().fill_bytes(buf);
        Ok(())
    }
}
