//! The flat keyring format: a bare sequence of OpenPGP packets, in
//! canonical per-certificate order, optionally ASCII-armored.

use std::io::{Read, Write};

use buffered_reader::Generic;

use crate::armor::{Kind, Writer};
use crate::cert::keyring::Keyring;
use crate::error::Result;

/// Loads a keyring from a flat packet sequence. `source` may be raw
/// binary or ASCII-armored (`PUBLIC KEY BLOCK` / `PRIVATE KEY BLOCK`);
/// armor is detected automatically.
///
/// Per spec.md §4.7, a component that fails to parse or verify does
/// not abort the whole load: [`super::group_into_certs`] only ever
/// splits on recognized packet boundaries, and [`Keyring::merge`]
/// unions components rather than rejecting a whole certificate.
pub fn load<R: Read + 'static>(source: R) -> Result<Keyring> {
    let dearmored = super::maybe_dearmor(source)?;
    let mut reader = Generic::new(dearmored, None);
    let packets = super::read_all_packets(&mut reader)?;
    let certs = super::group_into_certs(packets)?;

    let mut keyring = Keyring::new();
    for cert in certs {
        keyring.merge(cert)?;
    }
    Ok(keyring)
}

/// Writes every certificate in `keyring` as a flat packet sequence, in
/// stable fingerprint order. When `armor_kind` is given, the output is
/// wrapped in ASCII armor of that kind (typically [`Kind::PublicKey`]
/// or [`Kind::SecretKey`]).
pub fn save(keyring: &Keyring, sink: &mut dyn Write, armor_kind: Option<Kind>) -> Result<()> {
    match armor_kind {
        Some(kind) => {
            let mut writer = Writer::new(&mut *sink, kind)?;
            for cert in keyring.certs_in_save_order() {
                super::write_cert_packets(cert, &mut writer)
                    .map_err(|e| anyhow::Error::new(crate::error::Error::Io(e)))?;
            }
            writer.finalize()?;
        }
        None => {
            for cert in keyring.certs_in_save_order() {
                super::write_cert_packets(cert, sink)
                    .map_err(|e| anyhow::Error::new(crate::error::Error::Io(e)))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_yields_empty_keyring() {
        let keyring = load(std::io::Cursor::new(Vec::<u8>::new())).unwrap();
        assert!(keyring.is_empty());
    }

    #[test]
    fn save_of_empty_keyring_writes_nothing() {
        let keyring = Keyring::new();
        let mut out = Vec::new();
        save(&keyring, &mut out, None).unwrap();
        assert!(out.is_empty());
    }
}
