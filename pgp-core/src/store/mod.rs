//! On-disk keyring formats: a flat packet sequence ([`flat`]) and a
//! record-oriented indexed blob file ([`kbx`]).

pub mod flat;
pub mod kbx;

use std::io::Read;

use buffered_reader::BufferedReader;

use crate::error::Result;
use crate::packet::{Packet, Tag, UserAttribute, UserID};

/// Which component a packet following a primary key attaches to —
/// shared by both on-disk formats' packet-sequence grouping, since
/// both lay out a key's packets in the same canonical RFC 4880 order:
/// primary, direct-key sigs, `(user-id, cert-sigs+)*`, `(subkey,
/// binding-sigs+)*`.
enum Attachment {
    Primary,
    UserID(usize),
    UserAttribute(usize),
    Subkey(usize),
}

/// Groups a flat sequence of packets into [`crate::cert::Cert`]s,
/// splitting on each Public/Secret-Key packet.
pub(crate) fn group_into_certs(packets: Vec<Packet>) -> Result<Vec<crate::cert::Cert>> {
    let mut certs = Vec::new();
    let mut current: Option<crate::cert::Cert> = None;
    let mut attach_to = Attachment::Primary;

    for packet in packets {
        match packet {
            Packet::PublicKey(k) | Packet::SecretKey(k) => {
                if let Some(cert) = current.take() {
                    certs.push(cert);
                }
                current = Some(crate::cert::Cert::new(k)?);
                attach_to = Attachment::Primary;
            }
            Packet::PublicSubkey(k) | Packet::SecretSubkey(k) => {
                let Some(cert) = current.as_mut() else { continue };
                cert.subkeys.push(crate::cert::SubkeyBinding {
                    key: crate::cert::Key::new(k)?,
                    signatures: Vec::new(),
                });
                attach_to = Attachment::Subkey(cert.subkeys.len() - 1);
            }
            Packet::UserID(uid) => {
                let Some(cert) = current.as_mut() else { continue };
                cert.userids.push(crate::cert::UserIDBinding {
                    user_id: Some(uid),
                    signatures: Vec::new(),
                    valid: false,
                });
                attach_to = Attachment::UserID(cert.userids.len() - 1);
            }
            Packet::UserAttribute(ua) => {
                let Some(cert) = current.as_mut() else { continue };
                cert.user_attributes.push(crate::cert::UserAttributeBinding {
                    user_attribute: Some(ua),
                    signatures: Vec::new(),
                });
                attach_to = Attachment::UserAttribute(cert.user_attributes.len() - 1);
            }
            Packet::Signature(sig) => {
                let Some(cert) = current.as_mut() else { continue };
                match attach_to {
                    Attachment::Primary => cert.direct_signatures.push(sig),
                    Attachment::UserID(i) => cert.userids[i].signatures.push(sig),
                    Attachment::UserAttribute(i) => cert.user_attributes[i].signatures.push(sig),
                    Attachment::Subkey(i) => cert.subkeys[i].signatures.push(sig),
                }
            }
            // Marker, Trust, Literal, compressed/encrypted data, and
            // unknown packets do not belong in a keyring packet
            // sequence; skip rather than fail the whole load, per
            // spec.md §4.7's "never throws on cryptographic failure
            // of individual keys" spirit extended to structural noise.
            _ => {}
        }
    }
    if let Some(cert) = current.take() {
        certs.push(cert);
    }
    Ok(certs)
}

/// Serializes `cert`'s packets in the canonical order: primary,
/// direct-key sigs, `(user-id, cert-sigs+)*`, `(subkey,
/// binding-sigs+)*`.
pub(crate) fn write_cert_packets(cert: &crate::cert::Cert, w: &mut dyn std::io::Write) -> std::io::Result<()> {
    let primary_tag = if cert.primary.packet.secret.is_some() { Tag::SecretKey } else { Tag::PublicKey };
    write_key_packet(primary_tag, &cert.primary.packet, w)?;
    for sig in &cert.direct_signatures {
        Packet::Signature(sig.clone()).serialize(w)?;
    }
    for binding in &cert.userids {
        if let Some(uid) = &binding.user_id {
            Packet::UserID(uid.clone()).serialize(w)?;
        }
        for sig in &binding.signatures {
            Packet::Signature(sig.clone()).serialize(w)?;
        }
    }
    for binding in &cert.user_attributes {
        if let Some(ua) = &binding.user_attribute {
            Packet::UserAttribute(ua.clone()).serialize(w)?;
        }
        for sig in &binding.signatures {
            Packet::Signature(sig.clone()).serialize(w)?;
        }
    }
    for sub in &cert.subkeys {
        let tag = if sub.key.packet.secret.is_some() { Tag::SecretSubkey } else { Tag::PublicSubkey };
        write_key_packet(tag, &sub.key.packet, w)?;
        for sig in &sub.signatures {
            Packet::Signature(sig.clone()).serialize(w)?;
        }
    }
    Ok(())
}

fn write_key_packet(tag: Tag, key: &crate::packet::KeyPacket, w: &mut dyn std::io::Write) -> std::io::Result<()> {
    let packet = match tag {
        Tag::SecretKey => Packet::SecretKey(key.clone()),
        Tag::SecretSubkey => Packet::SecretSubkey(key.clone()),
        Tag::PublicSubkey => Packet::PublicSubkey(key.clone()),
        _ => Packet::PublicKey(key.clone()),
    };
    packet.serialize(w)
}

/// Reads every packet out of `source` until EOF.
pub(crate) fn read_all_packets<C>(source: &mut dyn BufferedReader<C>) -> Result<Vec<Packet>> {
    let mut packets = Vec::new();
    while let Some(packet) = Packet::parse(source)? {
        packets.push(packet);
    }
    Ok(packets)
}

/// Wraps `source` in [`crate::armor::Reader`] if it looks armored
/// (starts with `-----`), otherwise passes it through unchanged.
pub(crate) fn maybe_dearmor<R: Read + 'static>(mut source: R) -> Result<Box<dyn Read>> {
    let mut probe = [0u8; 5];
    let mut got = 0;
    while got < probe.len() {
        let n = source.read(&mut probe[got..]).map_err(|e| anyhow::Error::new(crate::error::Error::Io(e)))?;
        if n == 0 {
            break;
        }
        got += n;
    }
    let prefix = std::io::Cursor::new(probe[..got].to_vec());
    let chained = prefix.chain(source);
    if &probe[..got] == b"-----" {
        Ok(Box::new(crate::armor::Reader::new(chained, crate::armor::ReaderMode::VeryTolerant)))
    } else {
        Ok(Box::new(chained))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_into_certs_splits_on_primary_key() {
        let certs = group_into_certs(Vec::new()).unwrap();
        assert!(certs.is_empty());
    }
}
