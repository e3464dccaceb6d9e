//! An in-memory collection of certificates with lookup indices (RFC
//! 4880 §11, §12.2) and merge semantics over the set as a whole.

use std::collections::HashMap;

use regex::RegexBuilder;

use crate::cert::Cert;
use crate::error::{Error, Result};
use crate::fingerprint::{Fingerprint, KeyID};

/// A collection of certificates indexed for lookup by key ID,
/// fingerprint, grip, and user ID pattern.
///
/// The grip index is populated lazily via [`Keyring::set_grip`] (grip
/// computation needs the key's algorithm-specific MPI layout, which
/// lives in [`crate::crypto::Pk`]-adjacent code, not here) rather than
/// at `add` time.
#[derive(Default)]
pub struct Keyring {
    certs: Vec<Cert>,
    by_fingerprint: HashMap<Fingerprint, usize>,
    by_key_id: HashMap<KeyID, usize>,
    by_grip: HashMap<[u8; 20], usize>,
}

impl Keyring {
    /// An empty keyring.
    pub fn new() -> Keyring {
        Keyring::default()
    }

    /// The number of certificates held.
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Whether the keyring holds no certificates.
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Adds `cert`, indexing it by fingerprint and key ID (primary and
    /// every subkey).
    pub fn add(&mut self, cert: Cert) {
        let idx = self.certs.len();
        self.index(&cert, idx);
        self.certs.push(cert);
    }

    fn index(&mut self, cert: &Cert, idx: usize) {
        self.by_fingerprint.insert(cert.primary.fingerprint.clone(), idx);
        self.by_key_id.insert(cert.primary.key_id(), idx);
        for sub in &cert.subkeys {
            self.by_key_id.insert(sub.key.key_id(), idx);
        }
    }

    /// Records `grip` as identifying the primary key at `fingerprint`,
    /// for [`Keyring::lookup_by_grip`].
    pub fn set_grip(&mut self, fingerprint: &Fingerprint, grip: [u8; 20]) {
        if let Some(&idx) = self.by_fingerprint.get(fingerprint) {
            self.by_grip.insert(grip, idx);
        }
    }

    /// Removes the certificate with this fingerprint, if present, and
    /// returns it.
    pub fn remove(&mut self, fingerprint: &Fingerprint) -> Option<Cert> {
        let idx = self.by_fingerprint.remove(fingerprint)?;
        let cert = self.certs.remove(idx);
        self.reindex_after_removal(idx);
        Some(cert)
    }

    fn reindex_after_removal(&mut self, removed: usize) {
        self.by_fingerprint.clear();
        self.by_key_id.clear();
        self.by_grip.retain(|_, idx| {
            if *idx > removed {
                *idx -= 1;
            }
            *idx != removed
        });
        for (idx, cert) in self.certs.iter().enumerate() {
            self.by_fingerprint.insert(cert.primary.fingerprint.clone(), idx);
            self.by_key_id.insert(cert.primary.key_id(), idx);
            for sub in &cert.subkeys {
                self.by_key_id.insert(sub.key.key_id(), idx);
            }
        }
    }

    /// Merges `cert` into the matching existing certificate (by
    /// fingerprint), or adds it as new.
    pub fn merge(&mut self, cert: Cert) -> Result<()> {
        if let Some(&idx) = self.by_fingerprint.get(&cert.primary.fingerprint) {
            self.certs[idx].merge(cert)?;
            let merged = self.certs[idx].clone();
            self.index(&merged, idx);
        } else {
            self.add(cert);
        }
        Ok(())
    }

    /// Exact key ID lookup; per spec.md §4.7, falls back to a
    /// low-4-byte half match only when no exact match exists.
    pub fn lookup_by_key_id(&self, id: &KeyID) -> Option<&Cert> {
        if let Some(&idx) = self.by_key_id.get(id) {
            return self.certs.get(idx);
        }
        self.lookup_by_key_id_prefix(id)
    }

    /// Low-4-byte ("short key ID") half match. Exposed separately from
    /// [`Keyring::lookup_by_key_id`] so callers that need the
    /// stronger exact-match guarantee can opt out of this collision-
    /// prone fallback.
    pub fn lookup_by_key_id_prefix(&self, prefix: &KeyID) -> Option<&Cert> {
        self.by_key_id
            .iter()
            .find(|(id, _)| id.matches_prefix(prefix))
            .and_then(|(_, &idx)| self.certs.get(idx))
    }

    /// Exact fingerprint lookup.
    pub fn lookup_by_fingerprint(&self, fp: &Fingerprint) -> Option<&Cert> {
        self.by_fingerprint.get(fp).and_then(|&idx| self.certs.get(idx))
    }

    /// Exact grip lookup.
    pub fn lookup_by_grip(&self, grip: &[u8; 20]) -> Option<&Cert> {
        self.by_grip.get(grip).and_then(|&idx| self.certs.get(idx))
    }

    /// Looks up by a hex key ID first; if `pattern` does not parse as
    /// one, treats it as a case-insensitive extended regular
    /// expression matched against each certificate's user IDs.
    pub fn lookup_by_user_id(&self, pattern: &str) -> Result<Vec<&Cert>> {
        if let Some(id) = parse_hex_key_id(pattern) {
            return Ok(self.lookup_by_key_id(&id).into_iter().collect());
        }

        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| anyhow::Error::new(Error::MalformedStore(format!("bad user-id pattern: {}", e))))?;

        Ok(self
            .certs
            .iter()
            .filter(|cert| {
                cert.userids.iter().any(|b| {
                    b.user_id
                        .as_ref()
                        .map(|u| re.is_match(&u.to_string_lossy()))
                        .unwrap_or(false)
                })
            })
            .collect())
    }

    /// A lazy sequence of `(key-id, fingerprint, grip)` strings, one
    /// per certificate, filtered by `filter`.
    pub fn iterate<'a>(
        &'a self,
        filter: impl Fn(&Cert) -> bool + 'a,
    ) -> impl Iterator<Item = (KeyID, Fingerprint)> + 'a {
        self.certs
            .iter()
            .filter(move |c| filter(c))
            .map(|c| (c.primary.key_id(), c.primary.fingerprint.clone()))
    }

    /// All certificates, in a stable order: primaries sorted by
    /// fingerprint ascending (per spec.md §4.7's `save` ordering).
    pub fn certs_in_save_order(&self) -> Vec<&Cert> {
        let mut v: Vec<&Cert> = self.certs.iter().collect();
        v.sort_by(|a, b| a.primary.fingerprint.as_bytes().cmp(b.primary.fingerprint.as_bytes()));
        v
    }
}

fn parse_hex_key_id(s: &str) -> Option<KeyID> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.len() != 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let mut bytes = [0u8; 8];
    for i in 0..8 {
        bytes[i] = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(KeyID::from_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_key_id_with_and_without_prefix() {
        let expected = KeyID::from_bytes(&[0xAA; 8]);
        assert_eq!(parse_hex_key_id("AAAAAAAAAAAAAAAA"), Some(expected));
        assert_eq!(parse_hex_key_id("0xAAAAAAAAAAAAAAAA"), Some(expected));
        assert_eq!(parse_hex_key_id("not a key id"), None);
    }

    #[test]
    fn empty_keyring_reports_empty() {
        let kr = Keyring::new();
        assert!(kr.is_empty());
        assert_eq!(kr.len(), 0);
    }
}
