//! Key entities (`Cert`) and their merge semantics (RFC 4880 §11.1,
//! §11.2).

pub mod keyring;

use crate::error::Result;
use crate::fingerprint::{Fingerprint, KeyID};
use crate::packet::signature::Signature;
use crate::packet::{KeyPacket, UserAttribute, UserID};

/// A single key (primary or subkey) together with the identifiers
/// derived from it.
#[derive(Clone, Debug)]
pub struct Key {
    /// The underlying packet (public material, and secret material
    /// when present).
    pub packet: KeyPacket,
    /// The key's fingerprint, cached at construction since every
    /// lookup path needs it.
    pub fingerprint: Fingerprint,
    /// Whether this key's binding (for a subkey) or self-signature
    /// (for a primary) has been checked and found valid. Set by
    /// [`Cert::revalidate`]; a freshly parsed `Cert` starts `false`.
    pub valid: bool,
}

impl Key {
    /// Wraps a parsed key packet, computing its fingerprint.
    pub fn new(packet: KeyPacket) -> Result<Key> {
        let fingerprint = packet.fingerprint()?;
        Ok(Key { packet, fingerprint, valid: false })
    }

    /// The key ID (the fingerprint's low 8 bytes, or the v3
    /// derivation).
    pub fn key_id(&self) -> KeyID {
        self.fingerprint.to_key_id()
    }
}

/// A User ID together with the certifications made over it.
#[derive(Clone, Debug, Default)]
pub struct UserIDBinding {
    /// The User ID packet.
    pub user_id: Option<UserID>,
    /// Certification signatures (and revocations) over this user ID,
    /// in the order encountered.
    pub signatures: Vec<Signature>,
    /// Whether at least one certification verified against the
    /// primary key. Set by [`Cert::revalidate`].
    pub valid: bool,
}

/// A User Attribute together with the certifications made over it.
#[derive(Clone, Debug, Default)]
pub struct UserAttributeBinding {
    /// The User Attribute packet.
    pub user_attribute: Option<UserAttribute>,
    /// Certification signatures (and revocations) over this
    /// attribute.
    pub signatures: Vec<Signature>,
}

/// A subkey together with its binding signature(s).
#[derive(Clone, Debug)]
pub struct SubkeyBinding {
    /// The subkey itself.
    pub key: Key,
    /// Binding (and revocation) signatures over this subkey, in the
    /// order encountered.
    pub signatures: Vec<Signature>,
}

/// An OpenPGP certificate: a primary key, its user IDs/attributes and
/// their certifications, its direct-key signatures, and its subkeys —
/// the arena-owned collection every higher-level operation (keyring,
/// message processing) addresses by fingerprint rather than by
/// pointer.
#[derive(Clone, Debug)]
pub struct Cert {
    /// The primary key.
    pub primary: Key,
    /// User IDs bound to the primary, each with its certifications.
    pub userids: Vec<UserIDBinding>,
    /// User attributes bound to the primary.
    pub user_attributes: Vec<UserAttributeBinding>,
    /// Signatures made directly over the primary key (not over a
    /// user ID/attribute): direct-key signatures and key revocations.
    pub direct_signatures: Vec<Signature>,
    /// Subkeys, each with its own binding signature(s).
    pub subkeys: Vec<SubkeyBinding>,
}

impl Cert {
    /// Constructs a bare certificate around a freshly parsed primary
    /// key, with no user IDs, signatures, or subkeys yet attached.
    pub fn new(primary: KeyPacket) -> Result<Cert> {
        Ok(Cert {
            primary: Key::new(primary)?,
            userids: Vec::new(),
            user_attributes: Vec::new(),
            direct_signatures: Vec::new(),
            subkeys: Vec::new(),
        })
    }

    /// This certificate's identity: the primary key's fingerprint.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.primary.fingerprint
    }

    /// Re-validates every user ID and subkey binding against the
    /// primary key, setting each component's `valid` bit.
    ///
    /// A component with no signature that verifies is left invalid
    /// rather than rejected outright — per spec.md §4.7, `load` never
    /// throws on a cryptographically bad component.
    pub fn revalidate(&mut self, pk: &dyn crate::crypto::Pk) {
        let primary_material = self.primary.packet.public.clone();

        for binding in &mut self.userids {
            let Some(uid) = &binding.user_id else { continue };
            binding.valid = binding.signatures.iter().any(|sig| {
                verify_binding(pk, &primary_material, &uid.hash_prefix(), sig).unwrap_or(false)
            });
        }
        self.primary.valid = self.userids.iter().any(|b| b.valid);

        for sub in &mut self.subkeys {
            let hash_input = subkey_binding_hash_input(&self.primary, &sub.key);
            sub.key.valid = sub
                .signatures
                .iter()
                .any(|sig| verify_binding(pk, &primary_material, &hash_input, sig).unwrap_or(false));
        }
    }

    /// Merges `other` into `self` (both must share a fingerprint).
    ///
    /// Per spec.md §4.6: user IDs are unioned by exact packet-body
    /// equality, certification signatures by SHA-1 over the
    /// signature's canonical (serialized) body, direct-key
    /// signatures/revocations are unioned, subkeys are unioned by
    /// fingerprint, and secret key material on either side wins over
    /// a public-only counterpart.
    pub fn merge(&mut self, other: Cert) -> Result<()> {
        if self.primary.fingerprint != other.primary.fingerprint {
            return Err(anyhow::Error::new(crate::error::Error::MalformedPacket(
                "cannot merge certificates with different fingerprints".into(),
            )));
        }

        if other.primary.packet.secret.is_some() && self.primary.packet.secret.is_none() {
            self.primary.packet.secret = other.primary.packet.secret;
        }

        merge_userid_bindings(&mut self.userids, other.userids)?;
        merge_user_attribute_bindings(&mut self.user_attributes, other.user_attributes)?;
        merge_signatures(&mut self.direct_signatures, other.direct_signatures)?;

        for other_sub in other.subkeys {
            match self
                .subkeys
                .iter_mut()
                .find(|s| s.key.fingerprint == other_sub.key.fingerprint)
            {
                Some(existing) => {
                    if other_sub.key.packet.secret.is_some() && existing.key.packet.secret.is_none()
                    {
                        existing.key.packet.secret = other_sub.key.packet.secret;
                    }
                    merge_signatures(&mut existing.signatures, other_sub.signatures)?;
                }
                None => self.subkeys.push(other_sub),
            }
        }

        Ok(())
    }
}

fn signature_identity(sig: &Signature) -> Result<[u8; 20]> {
    use sha1collisiondetection::{Digest, Sha1CD};
    let mut body = Vec::new();
    sig.serialize(&mut body).expect("Vec<u8> Write is infallible");
    let mut hasher = Sha1CD::new();
    hasher.update(&body);
    let digest = hasher.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(digest.as_slice());
    Ok(out)
}

fn merge_signatures(into: &mut Vec<Signature>, from: Vec<Signature>) -> Result<()> {
    let mut seen: std::collections::HashSet<[u8; 20]> =
        into.iter().map(signature_identity).collect::<Result<_>>()?;
    for sig in from {
        let id = signature_identity(&sig)?;
        if seen.insert(id) {
            into.push(sig);
        }
    }
    Ok(())
}

fn merge_userid_bindings(
    into: &mut Vec<UserIDBinding>,
    from: Vec<UserIDBinding>,
) -> Result<()> {
    for other in from {
        let Some(other_uid) = &other.user_id else { continue };
        match into
            .iter_mut()
            .find(|b| b.user_id.as_ref().map(|u| u.as_bytes()) == Some(other_uid.as_bytes()))
        {
            Some(existing) => merge_signatures(&mut existing.signatures, other.signatures)?,
            None => into.push(other),
        }
    }
    Ok(())
}

fn merge_user_attribute_bindings(
    into: &mut Vec<UserAttributeBinding>,
    from: Vec<UserAttributeBinding>,
) -> Result<()> {
    for other in from {
        let Some(other_ua) = &other.user_attribute else { continue };
        match into.iter_mut().find(|b| {
            b.user_attribute.as_ref().map(|u| u.as_bytes()) == Some(other_ua.as_bytes())
        }) {
            Some(existing) => merge_signatures(&mut existing.signatures, other.signatures)?,
            None => into.push(other),
        }
    }
    Ok(())
}

fn verify_binding(
    pk: &dyn crate::crypto::Pk,
    primary: &crate::packet::key_material::PublicKeyMaterial,
    hash_input: &[u8],
    sig: &Signature,
) -> Result<bool> {
    let digest = compute_digest(hash_input, sig)?;
    pk.verify(sig.pk_algo, primary, sig.hash_algo, &digest, &sig.mpis)
}

fn compute_digest(hash_input: &[u8], sig: &Signature) -> Result<Vec<u8>> {
    use sha1collisiondetection::{Digest, Sha1CD};
    // Only SHA-1 is wired up here; other hash algorithms go through
    // the full crypto::Hash trait once a backend is selected by the
    // caller (see `Context::verify`), so this path is a convenience
    // for SHA-1-signed legacy material only.
    if sig.hash_algo != crate::types::HashAlgorithm::SHA1 {
        return Err(anyhow::Error::new(crate::error::Error::UnsupportedAlgorithm(
            "revalidate() only hashes with SHA-1 directly; use Context::verify for other algorithms".into(),
        )));
    }
    let mut hasher = Sha1CD::new();
    hasher.update(hash_input);
    hasher.update(&sig.hash_input());
    let digest = hasher.finalize();
    Ok(digest.as_slice().to_vec())
}

fn subkey_binding_hash_input(primary: &Key, subkey: &Key) -> Vec<u8> {
    let mut out = primary.packet.fingerprint_prefix();
    out.extend_from_slice(&subkey.packet.fingerprint_prefix());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_signatures_is_a_noop_on_empty_input() {
        let mut into: Vec<Signature> = Vec::new();
        let from: Vec<Signature> = Vec::new();
        merge_signatures(&mut into, from).unwrap();
        assert!(into.is_empty());
    }
}
