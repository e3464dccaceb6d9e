//! Push-writer stages for producing OpenPGP messages: a sink-side
//! mirror of the read-side pipeline in [`super`], built the way the
//! teacher's `serialize::stream` stacks `Encryptor`/`Signer`/
//! `Compressor`/`LiteralWriter` writers, each owning the sink beneath
//! it and unwound in last-in-first-out order by `finalize()`.
//!
//! Unlike the teacher's fully incremental stack, each stage here
//! buffers what passes through it and does its real work (framing,
//! compressing, encrypting, hashing and signing) once, in
//! `finalize()`. [`crate::crypto::Hash::digest`] is itself a one-shot
//! operation over whole buffers, not an incremental context, so a
//! truly streaming stack would gain nothing here.

use std::io::{self, Write};

use crate::crypto::{Aead, Cipher, Hash, Pk, Rng};
use crate::error::{Error, Result};
use crate::fingerprint::KeyID;
use crate::packet::key_material::{PublicKeyMaterial, SecretKeyMaterial};
use crate::packet::signature::{Signature, SubpacketArea, SubpacketValue};
use crate::packet::signature::subpacket::{Subpacket, SubpacketTag};
use crate::packet::{self, CompressedData, Literal, Packet, AED, PKESK, SEIP, SKESK};
use crate::types::{
    AEADAlgorithm, CompressionAlgorithm, HashAlgorithm, PublicKeyAlgorithm, SignatureType,
    SymmetricAlgorithm, Timestamp,
};

use super::compress;
use super::integrity;

/// Wraps written plaintext in a Literal Data packet on [`Self::finalize`].
pub struct LiteralWriter<W: Write> {
    inner: W,
    format: u8,
    filename: Vec<u8>,
    date: Timestamp,
    buffer: Vec<u8>,
}

impl<W: Write> LiteralWriter<W> {
    /// Starts a literal data stage writing to `inner`. `format` is the
    /// content-type octet (`b'b'`/`b't'`/`b'u'`); `filename` and
    /// `date` are the packet's metadata fields.
    pub fn new(inner: W, format: u8, filename: &[u8], date: Timestamp) -> LiteralWriter<W> {
        LiteralWriter { inner, format, filename: filename.to_vec(), date, buffer: Vec::new() }
    }

    /// Frames the buffered plaintext as a Literal Data packet and
    /// writes it to the inner sink, returning the sink for the next
    /// stage to finalize.
    pub fn finalize(mut self) -> Result<W> {
        let packet = Packet::Literal(Literal {
            format: self.format,
            filename: self.filename.into_boxed_slice(),
            date: self.date,
            body: self.buffer.into_boxed_slice(),
        });
        packet.serialize(&mut self.inner).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for LiteralWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Compresses what passes through it into a Compressed Data packet on
/// [`Self::finalize`].
pub struct Compressor<W: Write> {
    inner: W,
    algo: CompressionAlgorithm,
    buffer: Vec<u8>,
}

impl<W: Write> Compressor<W> {
    /// Starts a compression stage writing to `inner` with `algo`.
    pub fn new(inner: W, algo: CompressionAlgorithm) -> Compressor<W> {
        Compressor { inner, algo, buffer: Vec::new() }
    }

    /// Compresses the buffered body (the packet stream the inner
    /// stage produced) and writes the Compressed Data packet through.
    pub fn finalize(mut self) -> Result<W> {
        let compressed = compress::compress(self.algo, &self.buffer)?;
        let packet = Packet::CompressedData(CompressedData {
            algo: self.algo,
            body: compressed.into_boxed_slice(),
        });
        packet.serialize(&mut self.inner).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for Compressor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One recipient for session-key encryption: either a public key to
/// wrap the session key for (a PKESK) or a password to derive a
/// key-encryption key from (an SKESK).
pub enum Recipient<'a> {
    /// Public-key recipient: key ID, algorithm, and public material.
    PublicKey { key_id: KeyID, algo: PublicKeyAlgorithm, public: &'a PublicKeyMaterial },
    /// Password recipient: an S2K specifier is generated fresh per
    /// recipient and the password is used to derive its
    /// key-encryption key.
    Password(crate::crypto::mem::Protected),
}

/// How encrypted bodies should be protected.
pub enum Protection {
    /// RFC 4880 §5.13 CFB+MDC.
    Mdc,
    /// RFC 4880bis §5.16 chunked AEAD.
    Aead { algo: AEADAlgorithm, chunk_size_octet: u8 },
}

/// Generates a session key, wraps it for each recipient as PKESK/SKESK
/// packets written to `sink`, and encrypts what is subsequently
/// written to the returned [`Encryptor`] under that session key.
///
/// This is the encrypt-side counterpart of the decrypt pipeline's
/// session-key resolution in [`super::open`]: the ESK packets precede
/// the encrypted data packet in the stream, exactly mirroring the
/// order a reader expects.
pub struct Encryptor<W: Write> {
    inner: W,
    symm_algo: SymmetricAlgorithm,
    session_key: Vec<u8>,
    protection: Protection,
    cipher: Box<dyn Cipher>,
    aead: Box<dyn Aead>,
    rng: Box<dyn Rng>,
    buffer: Vec<u8>,
}

impl<W: Write> Encryptor<W> {
    /// Writes one PKESK/SKESK packet per `recipients` to `sink`,
    /// generates a fresh session key for `symm_algo`, and returns an
    /// `Encryptor` that will frame everything subsequently written to
    /// it as a [`SEIP`] or [`AED`] packet (per `protection`) once
    /// finalized.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut inner: W,
        recipients: &[Recipient],
        symm_algo: SymmetricAlgorithm,
        protection: Protection,
        pk: &dyn Pk,
        cipher: Box<dyn Cipher>,
        aead: Box<dyn Aead>,
        rng: Box<dyn Rng>,
    ) -> Result<Encryptor<W>> {
        let key_len = symm_algo.key_size().ok_or_else(|| {
            anyhow::Error::new(Error::UnsupportedAlgorithm(format!("symmetric algorithm {symm_algo}")))
        })?;
        let mut session_key = vec![0u8; key_len];
        rng.fill(&mut session_key)?;

        for recipient in recipients {
            match recipient {
                Recipient::PublicKey { key_id, algo, public } => {
                    let mut framed = vec![u8::from(symm_algo)];
                    framed.extend_from_slice(&session_key);
                    framed.extend_from_slice(&crate::packet::key::mod65536_sum(&session_key).to_be_bytes());
                    let esk = pk.encrypt_session_key(*algo, public, &framed, rng.as_ref())?;
                    let packet = Packet::PKESK(PKESK {
                        version: 3,
                        recipient: *key_id,
                        pk_algo: *algo,
                        esk,
                    });
                    packet.serialize(&mut inner).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                }
                Recipient::Password(password) => {
                    let mut salt = [0u8; 8];
                    rng.fill(&mut salt)?;
                    let s2k = crate::mpi::S2K::IteratedAndSalted {
                        hash: HashAlgorithm::SHA256,
                        salt,
                        count: 65536,
                    };
                    let kek = s2k.derive_key(password, key_len, &|algo, chunks| {
                        let hash = crate::crypto::backend::rustcrypto::RustCryptoBackend;
                        crate::crypto::Hash::digest(&hash, algo, chunks)
                    })?;

                    let mut plain = vec![u8::from(symm_algo)];
                    plain.extend_from_slice(&session_key);
                    let zero_iv = vec![0u8; symm_algo.block_size().ok_or_else(|| {
                        anyhow::Error::new(Error::UnsupportedAlgorithm(format!("symmetric algorithm {symm_algo}")))
                    })?];
                    let esk = cipher.cfb_encrypt(symm_algo, &kek, &zero_iv, &plain)?;

                    let packet = Packet::SKESK(SKESK {
                        version: 4,
                        symm_algo,
                        aead_algo: None,
                        s2k,
                        aead_nonce: None,
                        esk: esk.into_boxed_slice(),
                    });
                    packet.serialize(&mut inner).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
                }
            }
        }

        Ok(Encryptor {
            inner,
            symm_algo,
            session_key,
            protection,
            cipher,
            aead,
            rng,
            buffer: Vec::new(),
        })
    }

    /// Encrypts the buffered plaintext and writes the framed
    /// [`SEIP`]/[`AED`] packet through to the inner sink.
    pub fn finalize(mut self) -> Result<W> {
        match self.protection {
            Protection::Mdc => {
                let block_size = self.symm_algo.block_size().ok_or_else(|| {
                    anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
                        "symmetric algorithm {}", self.symm_algo
                    )))
                })?;
                let mut prefix = vec![0u8; block_size + 2];
                self.rng.fill(&mut prefix[..block_size])?;
                prefix[block_size] = prefix[block_size - 2];
                prefix[block_size + 1] = prefix[block_size - 1];

                let mut plaintext = prefix;
                plaintext.extend_from_slice(&self.buffer);

                let hash = crate::crypto::backend::rustcrypto::RustCryptoBackend;
                let mdc = integrity::mdc_digest(&hash, &plaintext)?;
                plaintext.extend_from_slice(&integrity::MDC_PACKET_HEADER);
                plaintext.extend_from_slice(&mdc);

                let iv = vec![0u8; block_size];
                let ciphertext = self.cipher.cfb_encrypt(self.symm_algo, &self.session_key, &iv, &plaintext)?;
                let packet = Packet::SEIP(SEIP { version: 1, body: ciphertext.into_boxed_slice() });
                packet.serialize(&mut self.inner).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            }
            Protection::Aead { algo, chunk_size_octet } => {
                let nonce_len = algo.nonce_size().ok_or_else(|| {
                    anyhow::Error::new(Error::UnsupportedAlgorithm("AEAD algorithm".into()))
                })?;
                let mut iv = vec![0u8; nonce_len];
                self.rng.fill(&mut iv)?;

                let size = integrity::chunk_size(chunk_size_octet);
                let mut body = Vec::new();
                let total_len = self.buffer.len() as u64;
                let mut index: u64 = 0;
                for chunk in self.buffer.chunks(size) {
                    let aad = integrity::chunk_aad(
                        u8::from(packet::Tag::AED), 1, self.symm_algo, algo, chunk_size_octet, index,
                    );
                    let nonce = integrity::chunk_nonce(&iv, index);
                    let sealed = self.aead.seal(algo, self.symm_algo, &self.session_key, &nonce, &aad, chunk)?;
                    body.extend_from_slice(&sealed);
                    index += 1;
                }
                let final_aad = integrity::chunk_aad(
                    u8::from(packet::Tag::AED), 1, self.symm_algo, algo, chunk_size_octet, index,
                );
                let final_aad = integrity::final_chunk_aad(&final_aad, total_len);
                let final_nonce = integrity::chunk_nonce(&iv, index);
                let final_tag = self.aead.seal(algo, self.symm_algo, &self.session_key, &final_nonce, &final_aad, &[])?;
                body.extend_from_slice(&final_tag);

                let packet = Packet::AED(AED {
                    version: 1,
                    symm_algo: self.symm_algo,
                    aead_algo: algo,
                    chunk_size_octet,
                    iv: iv.into_boxed_slice(),
                    body: body.into_boxed_slice(),
                });
                packet.serialize(&mut self.inner).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            }
        }
        Ok(self.inner)
    }
}

impl<W: Write> Write for Encryptor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One signer: the secret key material, its public counterpart (for
/// the issuer/algorithm fields), and the key ID to record as the
/// issuer.
pub struct Signer<W: Write> {
    inner: W,
    signers: Vec<SignerKey>,
    hash_algo: HashAlgorithm,
    sig_type: SignatureType,
    creation: Timestamp,
    buffer: Vec<u8>,
}

/// A single signing key, passed to [`Signer::new`].
pub struct SignerKey {
    /// The key ID recorded as the `Issuer` subpacket.
    pub key_id: KeyID,
    /// The signing algorithm.
    pub algo: PublicKeyAlgorithm,
    /// The secret key material.
    pub secret: SecretKeyMaterial,
    /// The public key material (needed by some `Pk::sign`
    /// implementations, e.g. to recover curve parameters).
    pub public: PublicKeyMaterial,
}

impl<W: Write> Signer<W> {
    /// Starts a signing stage writing to `inner`: plaintext passed
    /// through [`Write::write`] is hashed as it is forwarded
    /// unmodified, and on [`Self::finalize`] one trailing [`Signature`]
    /// packet per entry in `signers` is appended.
    pub fn new(
        inner: W,
        signers: Vec<SignerKey>,
        hash_algo: HashAlgorithm,
        sig_type: SignatureType,
        creation: Timestamp,
    ) -> Signer<W> {
        Signer { inner, signers, hash_algo, sig_type, creation, buffer: Vec::new() }
    }

    /// Hashes the buffered plaintext once per signer, signs it, and
    /// writes the resulting Signature packet(s) to the inner sink
    /// after forwarding all of the plaintext itself.
    pub fn finalize(mut self, pk: &dyn Pk, rng: &dyn Rng) -> Result<W> {
        self.inner.write_all(&self.buffer).map_err(|e| anyhow::Error::new(Error::Io(e)))?;

        let hash = crate::crypto::backend::rustcrypto::RustCryptoBackend;
        for signer in &self.signers {
            let mut hashed_area = SubpacketArea::new();
            hashed_area.push(Subpacket {
                tag: SubpacketTag::SignatureCreationTime,
                critical: false,
                value: SubpacketValue::SignatureCreationTime(self.creation),
            });
            hashed_area.push(Subpacket {
                tag: SubpacketTag::Issuer,
                critical: false,
                value: SubpacketValue::Issuer(signer.key_id),
            });

            let mut sig = Signature {
                version: 4,
                sig_type: self.sig_type,
                pk_algo: signer.algo,
                hash_algo: self.hash_algo,
                v3_creation_time_and_issuer: None,
                hashed_area,
                unhashed_area: SubpacketArea::new(),
                digest_prefix: [0, 0],
                mpis: crate::packet::signature::Mpis::Unknown { mpis: Vec::new() },
            };

            let mut to_hash = sig.hash_input();
            to_hash.splice(0..0, self.buffer.iter().copied());
            let digest = Hash::digest(&hash, self.hash_algo, &[&to_hash])?;
            sig.digest_prefix.copy_from_slice(&digest[..2]);
            sig.mpis = pk.sign(signer.algo, &signer.secret, &signer.public, self.hash_algo, &digest, rng)?;

            Packet::Signature(sig)
                .serialize(&mut self.inner)
                .map_err(|e| anyhow::Error::new(Error::Io(e)))?;
        }
        Ok(self.inner)
    }
}

impl<W: Write> Write for Signer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_writer_frames_on_finalize() {
        let out = Vec::new();
        let mut lw = LiteralWriter::new(out, b'b', b"test.txt", Timestamp(0));
        lw.write_all(b"hello").unwrap();
        let out = lw.finalize().unwrap();

        let mut src = buffered_reader::Memory::new(&out);
        let parsed = Packet::parse(&mut src).unwrap().unwrap();
        match parsed {
            Packet::Literal(l) => assert_eq!(&*l.body, b"hello"),
            _ => panic!("expected Literal"),
        }
    }

    #[test]
    fn compressor_round_trips_through_decompress() {
        let out = Vec::new();
        let mut c = Compressor::new(out, CompressionAlgorithm::Uncompressed);
        c.write_all(b"payload").unwrap();
        let out = c.finalize().unwrap();

        let mut src = buffered_reader::Memory::new(&out);
        let parsed = Packet::parse(&mut src).unwrap().unwrap();
        match parsed {
            Packet::CompressedData(c) => assert_eq!(&*c.body, b"payload"),
            _ => panic!("expected CompressedData"),
        }
    }
}
