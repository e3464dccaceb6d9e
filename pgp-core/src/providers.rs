//! Caller-supplied collaborators the message pipeline consults for
//! secrets and keys, per spec.md §4.10.

use crate::cert::Cert;
use crate::crypto::mem::Protected;
use crate::fingerprint::{Fingerprint, KeyID};

/// Why the pipeline is asking for a password, surfaced so a caller can
/// build an informative prompt.
#[derive(Clone, Debug)]
pub enum PasswordContext {
    /// Decrypting a symmetrically-encrypted (SK-ESK) session.
    DecryptSymmetric,
    /// Unlocking a secret key's protected material to decrypt a
    /// session key.
    DecryptSecretKey(KeyID),
    /// Protecting newly generated secret key material.
    ProtectSecretKey(KeyID),
    /// Unlocking a secret key to produce a signature.
    Sign(KeyID),
}

/// The result of asking a [`PasswordProvider`]: either a password to
/// try, or the caller's decision to give up.
pub enum PasswordResult {
    /// Try this password.
    Password(Protected),
    /// Abort the current operation with [`crate::error::Error::Cancelled`].
    Cancel,
}

/// Supplies passwords for secret-key unlocking and symmetric
/// decryption, invoked synchronously from the pipeline.
pub trait PasswordProvider: Send + Sync {
    /// Requests a password for `context`; `hint` is a human-readable
    /// prompt (e.g. a user ID) the caller may surface.
    fn request(&self, context: PasswordContext, hint: &str) -> PasswordResult;
}

/// A query presented to a [`KeyProvider`]: one of the four ways
/// OpenPGP data references a key, plus whether secret material is
/// required.
#[derive(Clone, Debug)]
pub enum KeyQuery {
    /// By key ID (the low 8 bytes of a fingerprint).
    KeyID(KeyID),
    /// By full fingerprint.
    Fingerprint(Fingerprint),
    /// By GnuPG-style grip.
    Grip([u8; 20]),
    /// By a user ID pattern (hex key ID or regular expression, as
    /// [`crate::cert::keyring::Keyring::lookup_by_user_id`] interprets it).
    UserID(String),
}

/// The result of asking a [`KeyProvider`] for a key.
pub enum KeyResult {
    /// The matching certificate.
    Found(Cert),
    /// No certificate satisfies the query.
    NotFound,
}

/// Supplies certificates by query, invoked synchronously from the
/// pipeline (recipient lookup during encryption, signer/decryption key
/// lookup during verification/decryption).
pub trait KeyProvider: Send + Sync {
    /// Looks up a key matching `query`. `need_secret` indicates the
    /// caller requires usable secret key material, not just a public
    /// certificate.
    fn lookup(&self, query: &KeyQuery, need_secret: bool) -> KeyResult;
}

/// A [`KeyProvider`] backed by an in-memory [`crate::cert::keyring::Keyring`],
/// the common case for a library embedder that has already loaded its
/// key stores.
pub struct KeyringProvider<'a> {
    keyring: &'a crate::cert::keyring::Keyring,
}

impl<'a> KeyringProvider<'a> {
    /// Wraps `keyring` as a [`KeyProvider`].
    pub fn new(keyring: &'a crate::cert::keyring::Keyring) -> KeyringProvider<'a> {
        KeyringProvider { keyring }
    }
}

impl<'a> KeyProvider for KeyringProvider<'a> {
    fn lookup(&self, query: &KeyQuery, need_secret: bool) -> KeyResult {
        let found = match query {
            KeyQuery::KeyID(id) => self.keyring.lookup_by_key_id(id),
            KeyQuery::Fingerprint(fp) => self.keyring.lookup_by_fingerprint(fp),
            KeyQuery::Grip(grip) => self.keyring.lookup_by_grip(grip),
            KeyQuery::UserID(pattern) => self
                .keyring
                .lookup_by_user_id(pattern)
                .ok()
                .and_then(|v| v.into_iter().next()),
        };
        match found {
            Some(cert) if !need_secret || cert.primary.packet.secret.is_some() => {
                KeyResult::Found(cert.clone())
            }
            _ => KeyResult::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysCancel;
    impl PasswordProvider for AlwaysCancel {
        fn request(&self, _context: PasswordContext, _hint: &str) -> PasswordResult {
            PasswordResult::Cancel
        }
    }

    #[test]
    fn provider_can_cancel() {
        let provider = AlwaysCancel;
        assert!(matches!(
            provider.request(PasswordContext::DecryptSymmetric, "test"),
            PasswordResult::Cancel
        ));
    }

    #[test]
    fn keyring_provider_reports_not_found_on_empty_keyring() {
        let keyring = crate::cert::keyring::Keyring::new();
        let provider = KeyringProvider::new(&keyring);
        let id = KeyID::from_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(matches!(
            provider.lookup(&KeyQuery::KeyID(id), false),
            KeyResult::NotFound
        ));
    }
}
