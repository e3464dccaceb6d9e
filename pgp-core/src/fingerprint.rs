//! Key identifiers: fingerprints, key IDs, and the grip.

use std::fmt;

use crate::types::PublicKeyAlgorithm;

/// A v4/v5 fingerprint: the SHA-1 (v4) or SHA-256 (v5) digest of the
/// key's public-key packet body, per RFC 4880 §12.2.
///
/// v3 keys have no fingerprint in this sense (their "fingerprint" is
/// an MD5 digest of the MPIs only); this type stores whatever digest
/// the key version actually defines, keyed by length.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Box<[u8]>);

impl Fingerprint {
    /// Wraps a raw digest. Does not validate the length; callers
    /// construct this from a key packet's own digest computation.
    pub fn from_bytes(bytes: &[u8]) -> Fingerprint {
        Fingerprint(bytes.to_vec().into_boxed_slice())
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The low 8 bytes (v4) or low 4 bytes (v3, via key ID
    /// derivation elsewhere) used to form a [`KeyID`].
    pub fn to_key_id(&self) -> KeyID {
        let n = self.0.len();
        if n >= 8 {
            KeyID::from_bytes(&self.0[n - 8..])
        } else {
            KeyID::from_bytes(&self.0)
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

/// The low 64 bits of a v4 fingerprint (or, for v3 keys, the low 32
/// bits of the RSA modulus), per RFC 4880 §12.2.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyID([u8; 8]);

impl KeyID {
    /// Wraps 8 raw bytes. If fewer than 8 are given (a v3 short key
    /// ID), they are right-aligned and zero-padded on the left.
    pub fn from_bytes(bytes: &[u8]) -> KeyID {
        let mut id = [0u8; 8];
        let n = bytes.len().min(8);
        id[8 - n..].copy_from_slice(&bytes[bytes.len() - n..]);
        KeyID(id)
    }

    /// The raw 8 bytes.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Whether `self`'s low 4 bytes match `prefix`'s low 4 bytes —
    /// the "short key ID" half match. This is exposed only through
    /// [`crate::cert::keyring::Keyring::lookup_by_key_id_prefix`], never
    /// implicitly by [`crate::cert::keyring::Keyring::lookup_by_key_id`],
    /// since short-ID collisions are a known forgery vector.
    pub fn matches_prefix(&self, prefix: &KeyID) -> bool {
        self.0[4..] == prefix.0[4..]
    }
}

impl fmt::Display for KeyID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for KeyID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "KeyID({})", self)
    }
}

/// Either a full fingerprint or a (possibly short) key ID — the two
/// ways OpenPGP data references a key (signature issuer subpackets,
/// PKESK recipient fields, user-facing key specifiers).
///
/// `PartialEq`/`aliases` deliberately do *not* form a transitive
/// equivalence: two `KeyHandle::KeyID`s that match under
/// [`KeyID::matches_prefix`] are considered aliases of each other for
/// lookup purposes, but a `KeyID` is never equal to a `Fingerprint`
/// even when one is derived from the other, because the `KeyID` alone
/// cannot prove the fingerprint it is a suffix of.
#[derive(Clone, Debug)]
pub enum KeyHandle {
    /// A full fingerprint.
    Fingerprint(Fingerprint),
    /// A (possibly short) key ID.
    KeyID(KeyID),
}

impl KeyHandle {
    /// The key ID implied by this handle (the low 8 bytes of a
    /// fingerprint, or the key ID itself).
    pub fn key_id(&self) -> KeyID {
        match self {
            KeyHandle::Fingerprint(fp) => fp.to_key_id(),
            KeyHandle::KeyID(id) => *id,
        }
    }

    /// Whether `self` and `other` could refer to the same key: equal
    /// fingerprints, equal key IDs, or a key ID that is a suffix of
    /// the other's implied key ID.
    pub fn aliases(&self, other: &KeyHandle) -> bool {
        match (self, other) {
            (KeyHandle::Fingerprint(a), KeyHandle::Fingerprint(b)) => a == b,
            _ => self.key_id().matches_prefix(&other.key_id())
                && other.key_id().matches_prefix(&self.key_id()),
        }
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KeyHandle::Fingerprint(fp) => fp.fmt(f),
            KeyHandle::KeyID(id) => id.fmt(f),
        }
    }
}

/// Computes a GnuPG-compatible "grip": a SHA-1 digest over the key
/// material's S-expression form, used by GnuPG's secret key store to
/// identify a key independent of OpenPGP fingerprint versioning.
///
/// Grounded in `original_source`'s `key-provider.c`/KBX blob format,
/// which key the secret-key-on-disk association by grip rather than
/// by fingerprint.
pub fn compute_grip(
    algo: PublicKeyAlgorithm,
    mpis: &[&[u8]],
) -> Result<[u8; 20], crate::error::Error> {
    use sha1collisiondetection::{Digest, Sha1CD};

    // GnuPG's grip is the SHA-1 of an S-expression built from the
    // algorithm's public parameters in a fixed order; we reproduce
    // that ordering for the algorithm families this crate supports.
    let names: &[&str] = match algo {
        PublicKeyAlgorithm::RSAEncryptSign
        | PublicKeyAlgorithm::RSAEncryptOnly
        | PublicKeyAlgorithm::RSASignOnly => &["n", "e"],
        PublicKeyAlgorithm::DSA => &["p", "q", "g", "y"],
        PublicKeyAlgorithm::ElGamalEncryptOnly
        | PublicKeyAlgorithm::ElGamalEncryptSign => &["p", "g", "y"],
        PublicKeyAlgorithm::ECDSA | PublicKeyAlgorithm::EdDSA => &["q"],
        PublicKeyAlgorithm::ECDH => &["q"],
        _ => {
            return Err(crate::error::Error::UnsupportedAlgorithm(format!(
                "grip computation for {}",
                algo
            )))
        }
    };
    if names.len() != mpis.len() {
        return Err(crate::error::Error::MalformedMPI(
            "grip: parameter/name count mismatch".into(),
        ));
    }

    let mut hasher = Sha1CD::new();
    for (name, value) in names.iter().zip(mpis.iter()) {
        let mut v = value.to_vec();
        // GnuPG's libgcrypt mpi->sexp conversion prepends a zero byte
        // when the high bit of the leading byte is set, so the value
        // is unambiguously read back as unsigned.
        if !v.is_empty() && v[0] & 0x80 != 0 {
            v.insert(0, 0);
        }
        let entry = format!("(1:{}{}:", name, v.len());
        hasher.update(entry.as_bytes());
        hasher.update(&v);
        hasher.update(b")");
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(digest.as_slice());
    Ok(out)
}
