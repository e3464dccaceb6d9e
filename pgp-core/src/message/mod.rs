//! The message processing pipeline: decryption, decompression, and
//! signature verification, built as a recursive descent over the
//! packet sequence rather than the teacher's lazily pulled source
//! stack (see `DESIGN.md`) — this crate already buffers whole
//! packet bodies in memory ([`crate::packet::Packet::parse`]), so
//! nothing is lost by resolving the whole stream in one pass.

pub mod compress;
pub mod integrity;
pub mod sink;

use crate::cert::Cert;
use crate::crypto::{Aead, Cipher, Hash, Pk};
use crate::error::{Error, Result};
use crate::fingerprint::{Fingerprint, KeyID};
use crate::packet::key::mod65536_sum;
use crate::packet::signature::{Signature, SubpacketTag, SubpacketValue};
use crate::packet::{Packet, AED, PKESK, SEIP, SKESK};
use crate::providers::{KeyProvider, KeyQuery, PasswordContext, PasswordProvider, PasswordResult};
use crate::types::{HashAlgorithm, PublicKeyAlgorithm, Timestamp};

/// The default retry limit for symmetric (password) session-key
/// candidates, per spec.md §4.9.
pub const DEFAULT_PASSWORD_RETRY_LIMIT: u32 = 3;

/// The verdict on one embedded or detached signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SigStatus {
    /// The signature verified and is within its validity period.
    Good,
    /// The signature's cryptographic check failed.
    Bad,
    /// No key matching the signature's issuer was available.
    MissingKey,
    /// The signature verified but has since expired.
    Expired,
    /// The signature packet carries an unknown critical subpacket and
    /// must be treated as invalid per RFC 4880 §5.2.3.1.
    Malformed,
}

/// One signature's verification result, per spec.md §4.9.
#[derive(Clone, Debug)]
pub struct SigResult {
    /// The verification verdict.
    pub status: SigStatus,
    /// The issuer key ID, when the signature carries one.
    pub signer_keyid: Option<KeyID>,
    /// The issuer's full fingerprint, when an `IssuerFingerprint`
    /// subpacket is present.
    pub signer_fingerprint: Option<Fingerprint>,
    /// The signature's creation time.
    pub creation: Option<Timestamp>,
    /// The signature's expiration time, if any.
    pub expiration: Option<Timestamp>,
    /// The hash algorithm used.
    pub hash_algo: HashAlgorithm,
    /// The signing key's algorithm.
    pub key_algo: PublicKeyAlgorithm,
}

/// The outcome of processing a message: the recovered plaintext and
/// every embedded signature's verdict.
pub struct Processed {
    /// The literal data packet's body.
    pub plaintext: Vec<u8>,
    /// Every embedded signature's result, in the order their
    /// one-pass headers appeared.
    pub signatures: Vec<SigResult>,
}

/// The primitive backends a pipeline run needs; grouped so call sites
/// don't thread five trait objects through every function.
pub struct Backends<'a> {
    /// Hash operations.
    pub hash: &'a dyn Hash,
    /// CFB cipher operations.
    pub cipher: &'a dyn Cipher,
    /// AEAD operations.
    pub aead: &'a dyn Aead,
    /// Public-key operations.
    pub pk: &'a dyn Pk,
}

/// Dearmors (if necessary) and parses `source`, then runs [`process`]
/// over the resulting packet sequence — the top-level entry point for
/// `decrypt`/`verify` callers that have a raw byte stream rather than
/// an already-parsed packet list.
pub fn open<R: std::io::Read + 'static>(
    source: R,
    key_provider: &dyn KeyProvider,
    password_provider: &dyn PasswordProvider,
    retry_limit: u32,
    backends: &Backends,
) -> Result<Processed> {
    let dearmored = crate::store::maybe_dearmor(source)?;
    let mut reader = buffered_reader::Generic::new(dearmored, None);
    let packets = crate::store::read_all_packets(&mut reader)?;
    process(&packets, key_provider, password_provider, retry_limit, backends)
}

/// Processes an already-parsed packet sequence: decrypts, decompresses,
/// and verifies as spec.md §4.9 describes, recursing one layer per
/// encrypted/compressed wrapper.
pub fn process(
    packets: &[Packet],
    key_provider: &dyn KeyProvider,
    password_provider: &dyn PasswordProvider,
    retry_limit: u32,
    backends: &Backends,
) -> Result<Processed> {
    let mut i = 0;
    let mut pkesks = Vec::new();
    let mut skesks = Vec::new();
    while i < packets.len() {
        match &packets[i] {
            Packet::PKESK(p) => {
                pkesks.push(p);
                i += 1;
            }
            Packet::SKESK(s) => {
                skesks.push(s);
                i += 1;
            }
            _ => break,
        }
    }

    if !pkesks.is_empty() || !skesks.is_empty() {
        let encrypted = packets.get(i).ok_or_else(|| {
            anyhow::Error::new(Error::MalformedPacket(
                "session-key packets not followed by an encrypted data packet".into(),
            ))
        })?;
        let plaintext = decrypt_encrypted_data(
            encrypted,
            &pkesks,
            &skesks,
            key_provider,
            password_provider,
            retry_limit,
            backends,
        )?;
        let mut reader = buffered_reader::Memory::new(&plaintext);
        let inner = crate::store::read_all_packets(&mut reader)?;
        return process(&inner, key_provider, password_provider, retry_limit, backends);
    }

    if let Some(Packet::CompressedData(c)) = packets.get(i) {
        let decompressed = compress::decompress(c.algo, &c.body)?;
        let mut reader = buffered_reader::Memory::new(&decompressed);
        let inner = crate::store::read_all_packets(&mut reader)?;
        return process(&inner, key_provider, password_provider, retry_limit, backends);
    }

    let mut one_passes = Vec::new();
    while let Some(Packet::OnePassSig(ops)) = packets.get(i) {
        one_passes.push(ops.clone());
        i += 1;
    }

    let literal = match packets.get(i) {
        Some(Packet::Literal(l)) => l,
        _ => {
            return Err(anyhow::Error::new(Error::MalformedPacket(
                "expected a literal data packet".into(),
            )))
        }
    };
    i += 1;

    let mut signatures = Vec::new();
    for ops in one_passes.iter().rev() {
        let sig = match packets.get(i) {
            Some(Packet::Signature(s)) => s,
            _ => {
                return Err(anyhow::Error::new(Error::MalformedPacket(
                    "one-pass signature header without a trailing signature packet".into(),
                )))
            }
        };
        i += 1;
        let _ = ops;
        signatures.push(verify_signature(sig, &literal.body, key_provider, backends.pk, backends.hash));
    }

    Ok(Processed { plaintext: literal.body.to_vec(), signatures })
}

/// Verifies `detached` against `data` without any literal/one-pass
/// framing — the detached-signature case of spec.md §4.9, where the
/// caller supplies the data stream out of band.
pub fn verify_detached(
    detached: &[Packet],
    data: &[u8],
    key_provider: &dyn KeyProvider,
    pk: &dyn Pk,
    hash: &dyn Hash,
) -> Vec<SigResult> {
    detached
        .iter()
        .filter_map(|p| match p {
            Packet::Signature(sig) => Some(verify_signature(sig, data, key_provider, pk, hash)),
            _ => None,
        })
        .collect()
}

fn find_key_by_id<'a>(cert: &'a Cert, id: &KeyID) -> Option<&'a crate::cert::Key> {
    if cert.primary.key_id() == *id {
        return Some(&cert.primary);
    }
    cert.subkeys.iter().map(|s| &s.key).find(|k| k.key_id() == *id)
}

fn verify_signature(
    sig: &Signature,
    data: &[u8],
    key_provider: &dyn KeyProvider,
    pk: &dyn Pk,
    hash: &dyn Hash,
) -> SigResult {
    let creation = sig
        .hashed_area
        .get(SubpacketTag::SignatureCreationTime)
        .and_then(|sp| match sp.value {
            SubpacketValue::SignatureCreationTime(t) => Some(t),
            _ => None,
        })
        .or_else(|| sig.v3_creation_time_and_issuer.map(|(t, _)| t));

    let expiration = sig
        .hashed_area
        .get(SubpacketTag::SignatureExpirationTime)
        .and_then(|sp| match sp.value {
            SubpacketValue::SignatureExpirationTime(secs) => creation.and_then(|c| c.checked_add(secs)),
            _ => None,
        });

    let signer_fingerprint = sig.hashed_area.get(SubpacketTag::IssuerFingerprint).and_then(|sp| {
        match &sp.value {
            SubpacketValue::IssuerFingerprint(fp) => Some(fp.clone()),
            _ => None,
        }
    });

    let base = SigResult {
        status: SigStatus::Bad,
        signer_keyid: sig.issuer(),
        signer_fingerprint,
        creation,
        expiration,
        hash_algo: sig.hash_algo,
        key_algo: sig.pk_algo,
    };

    if sig.has_unknown_critical_subpacket() {
        return SigResult { status: SigStatus::Malformed, ..base };
    }

    let Some(issuer) = sig.issuer() else {
        return SigResult { status: SigStatus::MissingKey, ..base };
    };

    let cert = match key_provider.lookup(&KeyQuery::KeyID(issuer), false) {
        crate::providers::KeyResult::Found(cert) => cert,
        crate::providers::KeyResult::NotFound => {
            return SigResult { status: SigStatus::MissingKey, ..base }
        }
    };
    let Some(key) = find_key_by_id(&cert, &issuer) else {
        return SigResult { status: SigStatus::MissingKey, ..base };
    };

    let mut to_hash = data.to_vec();
    to_hash.extend_from_slice(&sig.hash_input());
    let digest = match hash.digest(sig.hash_algo, &[&to_hash]) {
        Ok(d) => d,
        Err(_) => return SigResult { status: SigStatus::Bad, ..base },
    };
    if digest.get(..2) != Some(&sig.digest_prefix[..]) {
        return SigResult { status: SigStatus::Bad, ..base };
    }

    match pk.verify(sig.pk_algo, &key.packet.public, sig.hash_algo, &digest, &sig.mpis) {
        Ok(true) => {
            if let Some(exp) = expiration {
                if exp < Timestamp(now_hint()) {
                    return SigResult { status: SigStatus::Expired, ..base };
                }
            }
            SigResult { status: SigStatus::Good, ..base }
        }
        _ => SigResult { status: SigStatus::Bad, ..base },
    }
}

/// A process-start snapshot of "now" for expiration checks — callers
/// that need wall-clock accuracy should compare `expiration` against
/// their own clock instead of relying on this placeholder, since this
/// pipeline has no ambient time source (see spec.md §5: no internal
/// buffering, no hidden I/O). Returns `u32::MAX`, making expiration
/// checks here a no-op until a caller supplies a real clock via the
/// `Context` layer.
fn now_hint() -> u32 {
    u32::MAX
}

fn decrypt_encrypted_data(
    encrypted: &Packet,
    pkesks: &[&PKESK],
    skesks: &[&SKESK],
    key_provider: &dyn KeyProvider,
    password_provider: &dyn PasswordProvider,
    retry_limit: u32,
    backends: &Backends,
) -> Result<Vec<u8>> {
    for pkesk in pkesks {
        let cert = match key_provider.lookup(&KeyQuery::KeyID(pkesk.recipient), true) {
            crate::providers::KeyResult::Found(c) => c,
            crate::providers::KeyResult::NotFound => continue,
        };
        let Some(key) = find_key_by_id(&cert, &pkesk.recipient) else { continue };
        if key.packet.secret.is_none() {
            continue;
        }

        let password = match password_provider.request(
            PasswordContext::DecryptSecretKey(pkesk.recipient),
            "unlock secret key to decrypt session key",
        ) {
            PasswordResult::Password(p) => p,
            PasswordResult::Cancel => return Err(anyhow::Error::new(Error::Cancelled)),
        };
        let secret_material = match key.packet.unlock(&password, backends.cipher, &|algo, chunks| {
            backends.hash.digest(algo, chunks)
        }) {
            Ok(m) => m,
            Err(_) => continue,
        };

        let framed = match backends.pk.decrypt_session_key(
            pkesk.pk_algo,
            &secret_material,
            &key.packet.public,
            &pkesk.esk,
        ) {
            Ok(f) => f,
            Err(_) => continue,
        };
        if framed.len() < 3 {
            continue;
        }
        let (head, checksum) = framed.split_at(framed.len() - 2);
        let (algo_octet, session_key) = head.split_first().expect("checked len >= 3");
        if mod65536_sum(session_key).to_be_bytes()[..] != *checksum {
            continue;
        }
        let symm_algo = crate::types::SymmetricAlgorithm::from(*algo_octet);
        if let Ok(plaintext) = decrypt_body(encrypted, symm_algo, session_key, backends) {
            return Ok(plaintext);
        }
    }

    for skesk in skesks {
        let mut attempts = 0;
        loop {
            if retry_limit != 0 && attempts >= retry_limit {
                break;
            }
            attempts += 1;
            let password = match password_provider.request(
                PasswordContext::DecryptSymmetric,
                "enter the message password",
            ) {
                PasswordResult::Password(p) => p,
                PasswordResult::Cancel => return Err(anyhow::Error::new(Error::Cancelled)),
            };
            let key_len = skesk.symm_algo.key_size().ok_or_else(|| {
                anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                    "symmetric algorithm {}", skesk.symm_algo
                )))
            })?;
            let kek = skesk.s2k.derive_key(&password, key_len, &|algo, chunks| {
                backends.hash.digest(algo, chunks)
            })?;

            let session_key = if skesk.esk.is_empty() {
                kek
            } else {
                let zero_iv = vec![0u8; skesk.symm_algo.block_size().ok_or_else(|| {
                    anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                        "symmetric algorithm {}", skesk.symm_algo
                    )))
                })?];
                let decrypted = backends.cipher.cfb_decrypt(skesk.symm_algo, &kek, &zero_iv, &skesk.esk)?;
                if decrypted.is_empty() {
                    continue;
                }
                decrypted[1..].to_vec()
            };

            if let Ok(plaintext) = decrypt_body(encrypted, skesk.symm_algo, &session_key, backends) {
                return Ok(plaintext);
            }
        }
    }

    Err(anyhow::Error::new(Error::NoSuitableKey))
}

fn decrypt_body(
    encrypted: &Packet,
    symm_algo: crate::types::SymmetricAlgorithm,
    session_key: &[u8],
    backends: &Backends,
) -> Result<Vec<u8>> {
    match encrypted {
        Packet::SEIP(seip) => decrypt_seip(seip, symm_algo, session_key, backends.cipher, backends.hash),
        Packet::AED(aed) => decrypt_aed(aed, session_key, backends.aead),
        _ => Err(anyhow::Error::new(Error::MalformedPacket(
            "expected a symmetrically encrypted data packet".into(),
        ))),
    }
}

fn decrypt_seip(
    seip: &SEIP,
    symm_algo: crate::types::SymmetricAlgorithm,
    session_key: &[u8],
    cipher: &dyn Cipher,
    hash: &dyn Hash,
) -> Result<Vec<u8>> {
    let block_size = symm_algo.block_size().ok_or_else(|| {
        anyhow::Error::new(Error::UnsupportedAlgorithm(format!("symmetric algorithm {symm_algo}")))
    })?;
    let iv = vec![0u8; block_size];
    let decrypted = cipher.cfb_decrypt(symm_algo, session_key, &iv, &seip.body)?;
    integrity::check_cfb_prefix(&decrypted, block_size)?;

    if decrypted.len() < block_size + 2 + 22 {
        return Err(anyhow::Error::new(Error::ManipulatedMessage(
            "encrypted data packet ended before its MDC".into(),
        )));
    }
    let data_end = decrypted.len() - 22;
    let (prefix_and_plaintext, mdc_bytes) = decrypted.split_at(data_end);
    let mdc_packet: [u8; 22] = mdc_bytes.try_into().expect("split at fixed 22-byte boundary");
    integrity::verify_mdc(hash, prefix_and_plaintext, &mdc_packet)?;

    Ok(prefix_and_plaintext[block_size + 2..].to_vec())
}

fn decrypt_aed(aed: &AED, session_key: &[u8], aead: &dyn Aead) -> Result<Vec<u8>> {
    let tag_len = aed.aead_algo.tag_size();
    let size = integrity::chunk_size(aed.chunk_size_octet);

    let mut body: &[u8] = &aed.body;
    let mut plaintext = Vec::new();
    let mut index: u64 = 0;

    loop {
        if body.len() < tag_len {
            return Err(anyhow::Error::new(Error::ManipulatedMessage(
                "AEAD encrypted data packet truncated".into(),
            )));
        }
        if body.len() == tag_len {
            break;
        }
        let chunk_ct_len = size.min(body.len() - tag_len);
        let (chunk, rest) = body.split_at(chunk_ct_len + tag_len);
        let aad = integrity::chunk_aad(
            u8::from(crate::packet::Tag::AED),
            aed.version,
            aed.symm_algo,
            aed.aead_algo,
            aed.chunk_size_octet,
            index,
        );
        let nonce = integrity::chunk_nonce(&aed.iv, index);
        let pt = aead.open(aed.aead_algo, aed.symm_algo, session_key, &nonce, &aad, chunk)?;
        plaintext.extend_from_slice(&pt);
        body = rest;
        index += 1;
    }

    let final_aad = integrity::chunk_aad(
        u8::from(crate::packet::Tag::AED),
        aed.version,
        aed.symm_algo,
        aed.aead_algo,
        aed.chunk_size_octet,
        index,
    );
    let final_aad = integrity::final_chunk_aad(&final_aad, plaintext.len() as u64);
    let final_nonce = integrity::chunk_nonce(&aed.iv, index);
    aead.open(aed.aead_algo, aed.symm_algo, session_key, &final_nonce, &final_aad, body)?;

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_packet_sequence_is_malformed() {
        struct NoKeys;
        impl KeyProvider for NoKeys {
            fn lookup(&self, _: &KeyQuery, _: bool) -> crate::providers::KeyResult {
                crate::providers::KeyResult::NotFound
            }
        }
        struct NoPasswords;
        impl PasswordProvider for NoPasswords {
            fn request(&self, _: PasswordContext, _: &str) -> PasswordResult {
                PasswordResult::Cancel
            }
        }
        let backend = crate::crypto::RustCryptoBackend;
        let backends = Backends { hash: &backend, cipher: &backend, aead: &backend, pk: &backend };
        let result = process(&[], &NoKeys, &NoPasswords, DEFAULT_PASSWORD_RETRY_LIMIT, &backends);
        assert!(result.is_err());
    }

    #[test]
    fn verify_detached_with_no_signatures_yields_empty_result() {
        let backend = crate::crypto::RustCryptoBackend;
        struct NoKeys;
        impl KeyProvider for NoKeys {
            fn lookup(&self, _: &KeyQuery, _: bool) -> crate::providers::KeyResult {
                crate::providers::KeyResult::NotFound
            }
        }
        let results = verify_detached(&[], b"data", &NoKeys, &backend, &backend);
        assert!(results.is_empty());
    }
}
