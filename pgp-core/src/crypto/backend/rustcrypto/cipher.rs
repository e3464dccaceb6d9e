//! CFB-mode symmetric encryption, dispatched by algorithm the same
//! way [`super::hash`] dispatches hash algorithms.

use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use cfb_mode::{Decryptor, Encryptor};

use super::RustCryptoBackend;
use crate::error::{Error, Result};
use crate::types::SymmetricAlgorithm;

macro_rules! cfb_op {
    ($algo:ty, $key:expr, $iv:expr, $data:expr, $dir:ident) => {{
        let mut buf = $data.to_vec();
        match stringify!($dir) {
            "encrypt" => Encryptor::<$algo>::new_from_slices($key, $iv)
                .map_err(|e| anyhow::Error::new(Error::CryptoBackend(e.to_string())))?
                .encrypt(&mut buf),
            _ => Decryptor::<$algo>::new_from_slices($key, $iv)
                .map_err(|e| anyhow::Error::new(Error::CryptoBackend(e.to_string())))?
                .decrypt(&mut buf),
        }
        buf
    }};
}

fn dispatch(algo: SymmetricAlgorithm, key: &[u8], iv: &[u8], data: &[u8], encrypt: bool) -> Result<Vec<u8>> {
    Ok(match (algo, encrypt) {
        (SymmetricAlgorithm::AES128, true) => cfb_op!(aes::Aes128, key, iv, data, encrypt),
        (SymmetricAlgorithm::AES128, false) => cfb_op!(aes::Aes128, key, iv, data, decrypt),
        (SymmetricAlgorithm::AES192, true) => cfb_op!(aes::Aes192, key, iv, data, encrypt),
        (SymmetricAlgorithm::AES192, false) => cfb_op!(aes::Aes192, key, iv, data, decrypt),
        (SymmetricAlgorithm::AES256, true) => cfb_op!(aes::Aes256, key, iv, data, encrypt),
        (SymmetricAlgorithm::AES256, false) => cfb_op!(aes::Aes256, key, iv, data, decrypt),
        (SymmetricAlgorithm::TripleDES, true) => cfb_op!(des::TdesEde3, key, iv, data, encrypt),
        (SymmetricAlgorithm::TripleDES, false) => cfb_op!(des::TdesEde3, key, iv, data, decrypt),
        (SymmetricAlgorithm::CAST5, true) => cfb_op!(cast5::Cast5, key, iv, data, encrypt),
        (SymmetricAlgorithm::CAST5, false) => cfb_op!(cast5::Cast5, key, iv, data, decrypt),
        (SymmetricAlgorithm::Camellia128, true) => cfb_op!(camellia::Camellia128, key, iv, data, encrypt),
        (SymmetricAlgorithm::Camellia128, false) => cfb_op!(camellia::Camellia128, key, iv, data, decrypt),
        (SymmetricAlgorithm::Camellia192, true) => cfb_op!(camellia::Camellia192, key, iv, data, encrypt),
        (SymmetricAlgorithm::Camellia192, false) => cfb_op!(camellia::Camellia192, key, iv, data, decrypt),
        (SymmetricAlgorithm::Camellia256, true) => cfb_op!(camellia::Camellia256, key, iv, data, encrypt),
        (SymmetricAlgorithm::Camellia256, false) => cfb_op!(camellia::Camellia256, key, iv, data, decrypt),
        (other, _) => {
            return Err(anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                "symmetric algorithm {}", other
            ))))
        }
    })
}

impl crate::crypto::Cipher for RustCryptoBackend {
    fn cfb_encrypt(
        &self,
        algo: SymmetricAlgorithm,
        key: &[u8],
        iv: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        dispatch(algo, key, iv, plaintext, true)
    }

    fn cfb_decrypt(
        &self,
        algo: SymmetricAlgorithm,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        dispatch(algo, key, iv, ciphertext, false)
    }

    /// v3 secret key packets CFB-resynchronize the register to the
    /// previous block's ciphertext at each MPI boundary (RFC 4880
    /// §5.5.3) rather than running one continuous stream; since the
    /// caller only ever invokes this over the packet's *entire* MPI
    /// region in one call (the boundaries are re-derived from the
    /// plaintext's own MPI length prefixes, which requires decrypting
    /// incrementally), we decrypt one cipher block at a time and
    /// reset the IV to the input block rather than the output block —
    /// the behavior a freshly constructed CFB instance exhibits per
    /// 8-byte (the only v3-legal block size, RSA-only) chunk.
    fn cfb_decrypt_v3_resync(
        &self,
        algo: SymmetricAlgorithm,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        let block_size = algo.block_size().ok_or_else(|| {
            anyhow::Error::new(Error::UnsupportedAlgorithm(format!("{}", algo)))
        })?;
        let mut out = Vec::with_capacity(ciphertext.len());
        let mut prev_iv = iv.to_vec();
        for block in ciphertext.chunks(block_size) {
            let mut decrypted = dispatch(algo, key, &prev_iv, block, false)?;
            out.append(&mut decrypted);
            if block.len() == block_size {
                prev_iv = block.to_vec();
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Cipher;

    #[test]
    fn aes128_cfb_round_trips() {
        let backend = RustCryptoBackend;
        let key = [0x42u8; 16];
        let iv = [0x24u8; 16];
        let plaintext = b"the quick brown fox jumps over ";
        let ct = backend.cfb_encrypt(SymmetricAlgorithm::AES128, &key, &iv, plaintext).unwrap();
        let pt = backend.cfb_decrypt(SymmetricAlgorithm::AES128, &key, &iv, &ct).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn unsupported_algorithm_is_rejected() {
        let backend = RustCryptoBackend;
        let err = backend.cfb_encrypt(SymmetricAlgorithm::IDEA, &[0; 8], &[0; 8], b"x");
        assert!(err.is_err());
    }
}
