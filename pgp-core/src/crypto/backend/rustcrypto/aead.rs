//! AEAD (EAX/OCB) dispatch for RFC 4880bis encrypted data packets.

use eax::aead::{Aead as AeadTrait, KeyInit, Payload};
use eax::Eax;
use ocb3::Ocb3;

use super::RustCryptoBackend;
use crate::error::{Error, Result};
use crate::types::{AEADAlgorithm, SymmetricAlgorithm};

macro_rules! eax_op {
    ($cipher:ty, $key:expr, $nonce:expr, $aad:expr, $data:expr, $op:ident) => {{
        let cipher = <Eax<$cipher>>::new_from_slice($key)
            .map_err(|e| anyhow::Error::new(Error::CryptoBackend(e.to_string())))?;
        cipher
            .$op(
                eax::aead::generic_array::GenericArray::from_slice($nonce),
                Payload { msg: $data, aad: $aad },
            )
            .map_err(|_| anyhow::Error::new(Error::ManipulatedMessage("AEAD tag verification failed".into())))?
    }};
}

macro_rules! ocb_op {
    ($cipher:ty, $key:expr, $nonce:expr, $aad:expr, $data:expr, $op:ident) => {{
        let cipher = <Ocb3<$cipher>>::new_from_slice($key)
            .map_err(|e| anyhow::Error::new(Error::CryptoBackend(e.to_string())))?;
        cipher
            .$op(
                ocb3::generic_array::GenericArray::from_slice($nonce),
                Payload { msg: $data, aad: $aad },
            )
            .map_err(|_| anyhow::Error::new(Error::ManipulatedMessage("AEAD tag verification failed".into())))?
    }};
}

fn symm_block_cipher_unsupported(symm_algo: SymmetricAlgorithm) -> anyhow::Error {
    anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
        "AEAD over symmetric algorithm {}", symm_algo
    )))
}

impl crate::crypto::Aead for RustCryptoBackend {
    fn seal(
        &self,
        algo: AEADAlgorithm,
        symm_algo: SymmetricAlgorithm,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        Ok(match (algo, symm_algo) {
            (AEADAlgorithm::EAX, SymmetricAlgorithm::AES128) => {
                eax_op!(aes::Aes128, key, nonce, aad, plaintext, encrypt)
            }
            (AEADAlgorithm::EAX, SymmetricAlgorithm::AES256) => {
                eax_op!(aes::Aes256, key, nonce, aad, plaintext, encrypt)
            }
            (AEADAlgorithm::OCB, SymmetricAlgorithm::AES128) => {
                ocb_op!(aes::Aes128, key, nonce, aad, plaintext, encrypt)
            }
            (AEADAlgorithm::OCB, SymmetricAlgorithm::AES256) => {
                ocb_op!(aes::Aes256, key, nonce, aad, plaintext, encrypt)
            }
            (_, other) => return Err(symm_block_cipher_unsupported(other)),
        })
    }

    fn open(
        &self,
        algo: AEADAlgorithm,
        symm_algo: SymmetricAlgorithm,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        Ok(match (algo, symm_algo) {
            (AEADAlgorithm::EAX, SymmetricAlgorithm::AES128) => {
                eax_op!(aes::Aes128, key, nonce, aad, ciphertext, decrypt)
            }
            (AEADAlgorithm::EAX, SymmetricAlgorithm::AES256) => {
                eax_op!(aes::Aes256, key, nonce, aad, ciphertext, decrypt)
            }
            (AEADAlgorithm::OCB, SymmetricAlgorithm::AES128) => {
                ocb_op!(aes::Aes128, key, nonce, aad, ciphertext, decrypt)
            }
            (AEADAlgorithm::OCB, SymmetricAlgorithm::AES256) => {
                ocb_op!(aes::Aes256, key, nonce, aad, ciphertext, decrypt)
            }
            (_, other) => return Err(symm_block_cipher_unsupported(other)),
        })
    }
}
