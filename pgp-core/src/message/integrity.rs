//! Integrity mechanisms for encrypted data packets: the CFB+MDC
//! scheme (RFC 4880 §5.13/§5.14) and chunked AEAD (RFC 4880bis §5.16).
//!
//! As spec.md §4.9 describes these, verbatim.

use crate::error::{Error, Result};
use crate::types::{AEADAlgorithm, SymmetricAlgorithm};

/// The literal two-byte trailer appended after the MDC hash input,
/// marking where the MDC packet's own header would have gone had it
/// been serialized as a separate packet (it is folded into the SEIP
/// body instead).
pub const MDC_PACKET_HEADER: [u8; 2] = [0xD3, 0x14];

/// Checks the CFB quick-reject prefix: the decrypted first
/// `block_size + 2` bytes must have bytes `[block_size-2..block_size]`
/// equal to bytes `[block_size..block_size+2]`. A mismatch means the
/// session key is wrong well before the (expensive, and in the MDC
/// case unauthenticated-until-the-end) full decryption completes.
pub fn check_cfb_prefix(decrypted_prefix: &[u8], block_size: usize) -> Result<()> {
    if decrypted_prefix.len() < block_size + 2 {
        return Err(anyhow::Error::new(Error::MalformedPacket(
            "encrypted data packet shorter than one CFB prefix block".into(),
        )));
    }
    let repeated = &decrypted_prefix[block_size - 2..block_size];
    let check = &decrypted_prefix[block_size..block_size + 2];
    if repeated != check {
        return Err(anyhow::Error::new(Error::BadPassword));
    }
    Ok(())
}

/// Computes the MDC's expected SHA-1: over the decrypted prefix, the
/// plaintext, and [`MDC_PACKET_HEADER`].
pub fn mdc_digest(
    hash: &dyn crate::crypto::Hash,
    prefix_and_plaintext: &[u8],
) -> Result<[u8; 20]> {
    let digest = hash.digest(
        crate::types::HashAlgorithm::SHA1,
        &[prefix_and_plaintext, &MDC_PACKET_HEADER],
    )?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    Ok(out)
}

/// Verifies a fully decrypted SEIP body's trailing MDC against
/// `prefix_and_plaintext` (everything before the MDC's own 22-byte
/// packet -- a 2-byte new-format header plus the 20-byte hash -- that
/// RFC 4880 requires as the stream's last plaintext packet).
pub fn verify_mdc(
    hash: &dyn crate::crypto::Hash,
    prefix_and_plaintext: &[u8],
    trailing_mdc_packet: &[u8; 22],
) -> Result<()> {
    if trailing_mdc_packet[0] != 0xD3 || trailing_mdc_packet[1] != 0x14 {
        return Err(anyhow::Error::new(Error::ManipulatedMessage(
            "trailing MDC packet header malformed".into(),
        )));
    }
    let expected = mdc_digest(hash, prefix_and_plaintext)?;
    if !crate::crypto::mem::secure_cmp(&expected, &trailing_mdc_packet[2..]) {
        return Err(anyhow::Error::new(Error::ManipulatedMessage(
            "MDC hash does not match decrypted stream".into(),
        )));
    }
    Ok(())
}

/// The 13-byte AEAD additional data for one chunk (RFC 4880bis
/// §5.16.1): `packet-tag ‖ version ‖ cipher ‖ aead ‖ chunk-size-octet
/// ‖ u64be chunk-index`.
pub fn chunk_aad(
    packet_tag: u8,
    version: u8,
    symm_algo: SymmetricAlgorithm,
    aead_algo: AEADAlgorithm,
    chunk_size_octet: u8,
    chunk_index: u64,
) -> [u8; 13] {
    let mut aad = [0u8; 13];
    aad[0] = 0xC0 | packet_tag;
    aad[1] = version;
    aad[2] = u8::from(symm_algo);
    aad[3] = u8::from(aead_algo);
    aad[4] = chunk_size_octet;
    aad[5..13].copy_from_slice(&chunk_index.to_be_bytes());
    aad
}

/// The additional data for the final, zero-length chunk that
/// authenticates the total plaintext byte count (RFC 4880bis
/// §5.16.1): the normal chunk AAD with the total length appended.
pub fn final_chunk_aad(chunk_aad: &[u8; 13], total_plaintext_len: u64) -> Vec<u8> {
    let mut out = chunk_aad.to_vec();
    out.extend_from_slice(&total_plaintext_len.to_be_bytes());
    out
}

/// The per-chunk nonce: the packet's starting IV with the low bytes
/// XORed by the big-endian chunk index.
pub fn chunk_nonce(iv: &[u8], chunk_index: u64) -> Vec<u8> {
    let mut nonce = iv.to_vec();
    let index_bytes = chunk_index.to_be_bytes();
    let n = nonce.len().min(index_bytes.len());
    for i in 0..n {
        let pos = nonce.len() - n + i;
        nonce[pos] ^= index_bytes[index_bytes.len() - n + i];
    }
    nonce
}

/// `1 << chunk_size_octet + 6` bytes, the plaintext chunk size RFC
/// 4880bis encodes in an AED/SEIPDv2 packet's chunk-size octet.
pub fn chunk_size(chunk_size_octet: u8) -> usize {
    1usize << (chunk_size_octet as u32 + 6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cfb_prefix_check_accepts_matching_repeat() {
        let mut prefix = vec![0u8; 18];
        prefix[14] = 0xAA;
        prefix[15] = 0xBB;
        prefix[16] = 0xAA;
        prefix[17] = 0xBB;
        check_cfb_prefix(&prefix, 16).unwrap();
    }

    #[test]
    fn cfb_prefix_check_rejects_mismatch() {
        let prefix = vec![0u8; 18];
        assert!(check_cfb_prefix(&[0u8; 17], 16).is_err());
        let mut bad = prefix.clone();
        bad[16] = 1;
        assert!(check_cfb_prefix(&bad, 16).is_err());
    }

    #[test]
    fn chunk_size_doubles_per_octet() {
        assert_eq!(chunk_size(0), 64);
        assert_eq!(chunk_size(1), 128);
    }

    #[test]
    fn chunk_nonce_only_touches_low_bytes() {
        let iv = vec![0xFFu8; 16];
        let nonce = chunk_nonce(&iv, 1);
        assert_eq!(&nonce[..8], &iv[..8]);
        assert_ne!(nonce[15], iv[15]);
    }
}
