//! The crate's outermost surface: a single [`Context`] bundling a
//! configuration, a working keyring, and the crypto/password/key
//! providers every other module only sees through a trait object.
//!
//! Callers open a `Context`, point it at a keyring (or build one up
//! in memory), and drive `encrypt`/`decrypt`/`sign`/`verify` and the
//! key-management operations through it. Most operations report
//! their outcome as a single [`Status`], matching the
//! no-exceptions-in-the-design contract of the API this crate
//! implements; `verify` and the key-generation operations return a
//! `(Status, data)` pair since they inherently produce data no sink
//! parameter is a natural home for, and `key_iterate` returns a bare
//! iterator, since enumeration cannot itself fail.
use std::io::{Read, Write};

use crate::armor::{self, Kind as ArmorKind};
use crate::cert::keyring::Keyring;
use crate::cert::{Cert, Key};
use crate::crypto::mem::Protected;
use crate::crypto::{Hash, Pk, RustCryptoBackend};
use crate::error::Error;
use crate::fingerprint::{Fingerprint, KeyID};
use crate::io::{Input, Output};
use crate::message::sink::{Compressor, Encryptor, LiteralWriter, Protection, Recipient, SignerKey};
use crate::message::{self, Backends, SigResult, SigStatus};
use crate::packet::key::KeyPacket;
use crate::packet::key_material::{PublicKeyMaterial, SecretKeyMaterial};
use crate::packet::signature::subpacket::{Subpacket, SubpacketTag};
use crate::packet::signature::{Signature, SubpacketArea, SubpacketValue};
use crate::packet::{OnePassSig, Packet, UserID};
use crate::providers::{KeyProvider, KeyringProvider, PasswordProvider};
use crate::types::{
    AEADAlgorithm, CompressionAlgorithm, HashAlgorithm, KeyFlags, PublicKeyAlgorithm,
    SignatureType, SymmetricAlgorithm, Timestamp,
};

/// Which on-disk container a keyring path uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyringFormat {
    /// A flat, optionally armored packet sequence ([`crate::store::flat`]).
    Flat,
    /// GnuPG's `.kbx` keybox ([`crate::store::kbx`]).
    Kbx,
}

/// A log callback: level plus a pre-formatted message, called
/// alongside this crate's internal use of the `log` facade.
pub type LogSink = Box<dyn Fn(log::Level, &str) + Send + Sync>;

/// Settings a [`Context`] is constructed from: keyring locations and
/// default algorithm choices, matching the parameters spec.md's
/// operations otherwise leave to sensible defaults.
pub struct Config {
    /// Path to the public keyring, if persisted to disk.
    pub public_keyring_path: Option<std::path::PathBuf>,
    /// Path to the secret keyring, if persisted separately (the
    /// traditional pubring/secring split; see [`Context::reload`]).
    pub secret_keyring_path: Option<std::path::PathBuf>,
    /// Container format both paths above use.
    pub keyring_format: KeyringFormat,
    /// Default cipher for `encrypt`/`key_protect` when the caller
    /// doesn't specify one.
    pub default_cipher: SymmetricAlgorithm,
    /// Default hash algorithm for `sign`/certifications.
    pub default_hash: HashAlgorithm,
    /// Default compression algorithm; `Uncompressed` disables it
    /// without special-casing the writer stack.
    pub default_compression: CompressionAlgorithm,
    /// Default AEAD algorithm, used only when a caller asks for AEAD
    /// protection instead of MDC.
    pub default_aead_algo: AEADAlgorithm,
    /// `log2` chunk size for AEAD, per RFC 4880bis §5.16.1.
    pub default_aead_chunk_size_octet: u8,
    /// RSA modulus size for `key_generate_primary`/`key_generate_subkey`.
    pub rsa_key_bits: u32,
    /// How many times `decrypt` re-prompts for a password before
    /// giving up on a given SKESK candidate.
    pub password_retry_limit: u32,
    /// Called for diagnostic messages produced while processing an
    /// operation. `None` disables it without disabling the `log`
    /// facade's own output.
    pub log_sink: Option<LogSink>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            public_keyring_path: None,
            secret_keyring_path: None,
            keyring_format: KeyringFormat::Flat,
            default_cipher: SymmetricAlgorithm::AES256,
            default_hash: HashAlgorithm::SHA256,
            default_compression: CompressionAlgorithm::Uncompressed,
            default_aead_algo: AEADAlgorithm::OCB,
            default_aead_chunk_size_octet: 12,
            rsa_key_bits: 3072,
            password_retry_limit: message::DEFAULT_PASSWORD_RETRY_LIMIT,
            log_sink: None,
        }
    }
}

/// The outcome of a [`Context`] operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// The operation completed as requested.
    Ok,
    /// A caller-supplied parameter was invalid (an unsupported
    /// algorithm combination, an empty recipient list, ...).
    BadParameters,
    /// Input data did not parse as OpenPGP material.
    BadFormat,
    /// The operation (or an algorithm it needs) isn't implemented by
    /// the active crypto backend.
    NotSupported,
    /// A password did not unlock the secret key material or session
    /// key it was tried against.
    BadPassword,
    /// No key matching the request exists in the working keyring.
    KeyNotFound,
    /// Keys exist but none are usable for the requested operation.
    NoSuitableKey,
    /// Decryption failed for a reason other than a bad password.
    DecryptFailed,
    /// A signature's cryptographic check failed.
    SignatureInvalid,
    /// A signature verified but its validity period has elapsed.
    SignatureExpired,
    /// An MDC or AEAD integrity check failed.
    MdcMismatch,
    /// Input ended before a complete OpenPGP structure was read.
    Truncated,
    /// Underlying I/O failure.
    Io,
    /// Allocation or resource exhaustion.
    OutOfMemory,
    /// A caller-supplied provider declined to continue.
    Cancelled,
}

impl Status {
    /// Maps an internal [`Error`] to the caller-facing variant.
    ///
    /// [`Error::NoSuitableKey`] maps to [`Status::NoSuitableKey`], not
    /// [`Status::KeyNotFound`]: `KeyNotFound` has no `Error`
    /// counterpart and is synthesized directly by the key-management
    /// operations that look a fingerprint up before doing anything
    /// else.
    pub fn from_error(err: &Error) -> Status {
        match err {
            Error::MalformedPacket(_)
            | Error::MalformedMPI(_)
            | Error::MalformedStore(_)
            | Error::InvalidArmor(_) => Status::BadFormat,
            Error::BadPassword => Status::BadPassword,
            Error::ManipulatedMessage(_) => Status::MdcMismatch,
            Error::NoSuitableKey => Status::NoSuitableKey,
            Error::Cancelled => Status::Cancelled,
            Error::UnsupportedAlgorithm(_) => Status::NotSupported,
            Error::Io(io_err) => {
                if io_err.kind() == std::io::ErrorKind::UnexpectedEof {
                    Status::Truncated
                } else {
                    Status::Io
                }
            }
            Error::CryptoBackend(_) => Status::DecryptFailed,
        }
    }
}

fn overall_status(sigs: &[SigResult]) -> Status {
    if sigs.iter().any(|s| matches!(s.status, SigStatus::Bad | SigStatus::Malformed)) {
        Status::SignatureInvalid
    } else if sigs.iter().any(|s| s.status == SigStatus::Expired) {
        Status::SignatureExpired
    } else {
        Status::Ok
    }
}

fn io_err(e: std::io::Error) -> anyhow::Error {
    anyhow::Error::new(Error::Io(e))
}

/// Passes written bytes through, optionally armoring them, so
/// `encrypt`/`sign` can build one concrete writer stack whether or
/// not the caller asked for armor.
enum MaybeArmored<W: Write> {
    Armored(armor::Writer<W>),
    Plain(W),
}

impl<W: Write> MaybeArmored<W> {
    fn new(inner: W, armored: bool, kind: ArmorKind) -> crate::error::Result<MaybeArmored<W>> {
        if armored {
            Ok(MaybeArmored::Armored(armor::Writer::new(inner, kind)?))
        } else {
            Ok(MaybeArmored::Plain(inner))
        }
    }

    fn finalize(self) -> crate::error::Result<W> {
        match self {
            MaybeArmored::Armored(w) => w.finalize(),
            MaybeArmored::Plain(w) => Ok(w),
        }
    }
}

impl<W: Write> Write for MaybeArmored<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            MaybeArmored::Armored(w) => w.write(buf),
            MaybeArmored::Plain(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            MaybeArmored::Armored(w) => w.flush(),
            MaybeArmored::Plain(w) => w.flush(),
        }
    }
}

/// One signer `encrypt`/`sign` should produce a signature from: which
/// key (by fingerprint) and the password to unlock its secret
/// material, if protected.
pub struct Signatory {
    /// The signing key's fingerprint (must resolve to a cert holding
    /// secret key material in the working keyring).
    pub fingerprint: Fingerprint,
    /// The password to unlock the secret key, if it is protected.
    pub password: Option<Protected>,
}

/// One recipient for `encrypt`: a certificate to encrypt to, or a
/// bare password for symmetric-only encryption.
pub enum EncryptRecipient {
    /// Encrypt the session key to this certificate's
    /// encryption-capable subkey (or primary, if it has none).
    Key(Fingerprint),
    /// Derive a key-encryption key from this password instead.
    Password(Protected),
}

/// Options for [`Context::encrypt`].
pub struct EncryptOptions {
    /// Wrap the output in ASCII armor.
    pub armor: bool,
    /// Symmetric cipher; `None` uses [`Config::default_cipher`].
    pub cipher: Option<SymmetricAlgorithm>,
    /// Compression algorithm; `None` uses [`Config::default_compression`].
    pub compression: Option<CompressionAlgorithm>,
    /// If set, protect with chunked AEAD instead of CFB+MDC.
    pub aead_algo: Option<AEADAlgorithm>,
    /// `log2` AEAD chunk size; `None` uses
    /// [`Config::default_aead_chunk_size_octet`].
    pub aead_chunk_bits: Option<u8>,
    /// The literal packet's filename field.
    pub filename: Vec<u8>,
    /// The literal packet's timestamp field.
    pub mtime: Timestamp,
    /// Sign the plaintext before encrypting it: one one-pass header
    /// per entry, innermost (last-verified) signer listed last.
    pub signers: Vec<Signatory>,
    /// Hash algorithm for `signers`; `None` uses [`Config::default_hash`].
    pub hash: Option<HashAlgorithm>,
}

impl Default for EncryptOptions {
    fn default() -> EncryptOptions {
        EncryptOptions {
            armor: true,
            cipher: None,
            compression: None,
            aead_algo: None,
            aead_chunk_bits: None,
            filename: Vec::new(),
            mtime: Timestamp::ZERO,
            signers: Vec::new(),
            hash: None,
        }
    }
}

/// Options for [`Context::sign`].
pub struct SignOptions {
    /// Wrap the output in ASCII armor.
    pub armor: bool,
    /// Produce a detached signature (just the signature packets)
    /// rather than wrapping the data in a literal packet.
    pub detached: bool,
    /// Hash algorithm; `None` uses [`Config::default_hash`].
    pub hash: Option<HashAlgorithm>,
    /// The signature's creation time.
    pub creation: Timestamp,
}

impl Default for SignOptions {
    fn default() -> SignOptions {
        SignOptions { armor: true, detached: false, hash: None, creation: Timestamp::ZERO }
    }
}

/// Parameters for [`Context::key_generate_primary`]/
/// [`Context::key_generate_subkey`].
pub struct KeyGenParams {
    /// The algorithm to generate.
    pub algo: PublicKeyAlgorithm,
    /// Capability flags to record on the binding/direct-key signature.
    pub flags: KeyFlags,
    /// Creation timestamp.
    pub creation: Timestamp,
    /// Expiration, as seconds after creation; `0` means no expiration.
    pub expiration_secs: u32,
}

/// A single on-disk or in-memory OpenPGP engine session: a working
/// keyring plus the configuration and providers every operation
/// needs.
pub struct Context {
    config: Config,
    keyring: Keyring,
    backend: RustCryptoBackend,
    password_provider: Box<dyn PasswordProvider>,
}

impl Context {
    /// Opens a context, loading the configured keyring(s), if any
    /// path is set. A missing or unreadable keyring starts the
    /// context with an empty working set; a caller that cares should
    /// call [`Context::reload`] itself and check its [`Status`].
    pub fn new(config: Config, password_provider: Box<dyn PasswordProvider>) -> Context {
        let mut ctx =
            Context { config, keyring: Keyring::new(), backend: RustCryptoBackend, password_provider };
        let _ = ctx.reload();
        ctx
    }

    fn log(&self, level: log::Level, msg: &str) {
        match level {
            log::Level::Error => log::error!("{msg}"),
            log::Level::Warn => log::warn!("{msg}"),
            log::Level::Info => log::info!("{msg}"),
            log::Level::Debug => log::debug!("{msg}"),
            log::Level::Trace => log::trace!("{msg}"),
        }
        if let Some(sink) = &self.config.log_sink {
            sink(level, msg);
        }
    }

    fn status_of(&self, err: &anyhow::Error) -> Status {
        let status = match err.downcast_ref::<Error>() {
            Some(e) => Status::from_error(e),
            None => Status::Io,
        };
        self.log(log::Level::Warn, &err.to_string());
        status
    }

    /// Re-reads the configured keyring path(s) into the working set,
    /// replacing whatever was there. In-memory-only certs added since
    /// the last load/save are discarded — callers that want to keep
    /// them should export them first.
    pub fn reload(&mut self) -> Status {
        match self.reload_inner() {
            Ok(()) => Status::Ok,
            Err(e) => self.status_of(&e),
        }
    }

    fn reload_inner(&mut self) -> crate::error::Result<()> {
        let mut keyring = Keyring::new();
        if let Some(path) = self.config.public_keyring_path.clone() {
            if path.exists() {
                for cert in self.load_ring(&path)?.certs_in_save_order() {
                    keyring.merge(cert.clone())?;
                }
            }
        }
        if let Some(path) = self.config.secret_keyring_path.clone() {
            if path.exists() {
                for cert in self.load_ring(&path)?.certs_in_save_order() {
                    keyring.merge(cert.clone())?;
                }
            }
        }
        self.keyring = keyring;
        Ok(())
    }

    fn load_ring(&self, path: &std::path::Path) -> crate::error::Result<Keyring> {
        let file = std::fs::File::open(path).map_err(io_err)?;
        match self.config.keyring_format {
            KeyringFormat::Flat => crate::store::flat::load(file),
            KeyringFormat::Kbx => crate::store::kbx::load(file),
        }
    }

    fn persist(&self) -> crate::error::Result<()> {
        if let Some(path) = &self.config.public_keyring_path {
            let public_only: Vec<Cert> =
                self.keyring.certs_in_save_order().into_iter().cloned().map(strip_secret).collect();
            self.save_ring(path, &public_only)?;
        }
        if let Some(path) = &self.config.secret_keyring_path {
            let with_secrets: Vec<Cert> = self
                .keyring
                .certs_in_save_order()
                .into_iter()
                .filter(|c| {
                    c.primary.packet.secret.is_some()
                        || c.subkeys.iter().any(|s| s.key.packet.secret.is_some())
                })
                .cloned()
                .collect();
            self.save_ring(path, &with_secrets)?;
        }
        Ok(())
    }

    fn save_ring(&self, path: &std::path::Path, certs: &[Cert]) -> crate::error::Result<()> {
        let mut ring = Keyring::new();
        for cert in certs {
            ring.merge(cert.clone())?;
        }
        let mut file = std::fs::File::create(path).map_err(io_err)?;
        match self.config.keyring_format {
            KeyringFormat::Flat => crate::store::flat::save(&ring, &mut file, None),
            KeyringFormat::Kbx => crate::store::kbx::save(&ring, &mut file, self.now()),
        }
    }

    fn now(&self) -> u32 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    }

    /// The working keyring, as it currently stands in memory.
    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    fn with_key_provider<T>(&self, f: impl FnOnce(&dyn KeyProvider) -> T) -> T {
        let provider = KeyringProvider::new(&self.keyring);
        f(&provider)
    }

    fn backends(&self) -> Backends {
        Backends { hash: &self.backend, cipher: &self.backend, aead: &self.backend, pk: &self.backend }
    }

    fn resolve_signer(&self, signatory: &Signatory) -> crate::error::Result<SignerKey> {
        let cert = self
            .keyring
            .lookup_by_fingerprint(&signatory.fingerprint)
            .ok_or_else(|| anyhow::Error::new(Error::NoSuitableKey))?;
        let key = std::iter::once(&cert.primary)
            .chain(cert.subkeys.iter().map(|s| &s.key))
            .find(|k| k.packet.algo.for_signing() && k.packet.secret.is_some())
            .ok_or_else(|| anyhow::Error::new(Error::NoSuitableKey))?;
        let password = signatory.password.clone().unwrap_or_else(|| Protected::new(Vec::new()));
        let secret =
            key.packet.unlock(&password, &self.backend, &|algo, chunks| self.backend.digest(algo, chunks))?;
        Ok(SignerKey { key_id: key.key_id(), algo: key.packet.algo, secret, public: key.packet.public.clone() })
    }

    fn resolve_encryption_recipient(&self, fingerprint: &Fingerprint) -> crate::error::Result<Recipient<'_>> {
        let cert = self
            .keyring
            .lookup_by_fingerprint(fingerprint)
            .ok_or_else(|| anyhow::Error::new(Error::NoSuitableKey))?;
        let key = std::iter::once(&cert.primary)
            .chain(cert.subkeys.iter().map(|s| &s.key))
            .find(|k| k.packet.algo.for_encryption())
            .ok_or_else(|| anyhow::Error::new(Error::NoSuitableKey))?;
        Ok(Recipient::PublicKey { key_id: key.key_id(), algo: key.packet.algo, public: &key.packet.public })
    }

    /// Builds a single signature's hashed area (creation time plus
    /// issuer) and signs `digest_input`, the exact bytes
    /// `Signature::hash_input` says should be hashed for this
    /// signature, appended to whatever data the signature covers.
    ///
    /// Mirrors [`crate::message::sink::Signer::finalize`]'s per-signer
    /// digest computation, without requiring a streaming `Write`
    /// stack: used for both message signatures (`data` is the
    /// plaintext) and certifications (`data` is the relevant
    /// fingerprint/UserID hash prefix).
    #[allow(clippy::too_many_arguments)]
    fn build_signature(
        &self,
        data: &[u8],
        algo: PublicKeyAlgorithm,
        secret: &SecretKeyMaterial,
        public: &PublicKeyMaterial,
        issuer: KeyID,
        hash_algo: HashAlgorithm,
        sig_type: SignatureType,
        mut hashed_area: SubpacketArea,
        creation: Timestamp,
    ) -> crate::error::Result<Signature> {
        hashed_area.push(Subpacket {
            tag: SubpacketTag::SignatureCreationTime,
            critical: false,
            value: SubpacketValue::SignatureCreationTime(creation),
        });
        hashed_area.push(Subpacket {
            tag: SubpacketTag::Issuer,
            critical: false,
            value: SubpacketValue::Issuer(issuer),
        });
        let mut sig = Signature {
            version: 4,
            sig_type,
            pk_algo: algo,
            hash_algo,
            v3_creation_time_and_issuer: None,
            hashed_area,
            unhashed_area: SubpacketArea::new(),
            digest_prefix: [0, 0],
            mpis: crate::packet::signature::Mpis::Unknown { mpis: Vec::new() },
        };
        let mut to_hash = data.to_vec();
        to_hash.extend_from_slice(&sig.hash_input());
        let digest = self.backend.digest(hash_algo, &[&to_hash])?;
        sig.digest_prefix.copy_from_slice(&digest[..2]);
        sig.mpis = self.backend.sign(algo, secret, public, hash_algo, &digest, &self.backend)?;
        Ok(sig)
    }

    /// Signs `data` once per entry in `signers`, in the same order
    /// they were given.
    fn sign_packets(
        &self,
        data: &[u8],
        signers: &[SignerKey],
        hash_algo: HashAlgorithm,
        sig_type: SignatureType,
        creation: Timestamp,
    ) -> crate::error::Result<Vec<Signature>> {
        signers
            .iter()
            .map(|signer| {
                self.build_signature(
                    data,
                    signer.algo,
                    &signer.secret,
                    &signer.public,
                    signer.key_id,
                    hash_algo,
                    sig_type,
                    SubpacketArea::new(),
                    creation,
                )
            })
            .collect()
    }

    // ---- encrypt/decrypt/sign/verify -----------------------------------

    /// Encrypts (and optionally signs) `input`, writing the OpenPGP
    /// message to `output`. At least one entry in `recipients` must
    /// resolve to a usable key or password.
    pub fn encrypt(
        &self,
        mut input: Input,
        output: Output,
        recipients: &[EncryptRecipient],
        options: &EncryptOptions,
    ) -> Status {
        if recipients.is_empty() {
            return Status::BadParameters;
        }
        match self.encrypt_inner(&mut input, output, recipients, options) {
            Ok(()) => Status::Ok,
            Err(e) => self.status_of(&e),
        }
    }

    fn encrypt_inner(
        &self,
        input: &mut Input,
        mut output: Output,
        recipients: &[EncryptRecipient],
        options: &EncryptOptions,
    ) -> crate::error::Result<()> {
        let mut plaintext = Vec::new();
        input.read_to_end(&mut plaintext).map_err(io_err)?;

        let wire_recipients = recipients
            .iter()
            .map(|r| match r {
                EncryptRecipient::Key(fp) => self.resolve_encryption_recipient(fp),
                EncryptRecipient::Password(p) => Ok(Recipient::Password(p.clone())),
            })
            .collect::<crate::error::Result<Vec<_>>>()?;

        let resolved_signers =
            options.signers.iter().map(|s| self.resolve_signer(s)).collect::<crate::error::Result<Vec<_>>>()?;

        let cipher = options.cipher.unwrap_or(self.config.default_cipher);
        let compression = options.compression.unwrap_or(self.config.default_compression);
        let hash_algo = options.hash.unwrap_or(self.config.default_hash);
        let protection = match options.aead_algo {
            Some(algo) => Protection::Aead {
                algo,
                chunk_size_octet: options.aead_chunk_bits.unwrap_or(self.config.default_aead_chunk_size_octet),
            },
            None => Protection::Mdc,
        };

        let signatures = if resolved_signers.is_empty() {
            Vec::new()
        } else {
            self.sign_packets(&plaintext, &resolved_signers, hash_algo, SignatureType::Binary, options.mtime)?
        };

        let mut buffer = Vec::new();
        {
            let armored = MaybeArmored::new(&mut buffer, options.armor, ArmorKind::Message)?;
            let encryptor = Encryptor::new(
                armored,
                &wire_recipients,
                cipher,
                protection,
                &self.backend,
                Box::new(self.backend),
                Box::new(self.backend),
                Box::new(self.backend),
            )?;
            let mut compressor = Compressor::new(encryptor, compression);

            for (idx, signer) in resolved_signers.iter().enumerate() {
                let nested = idx + 1 != resolved_signers.len();
                let ops = Packet::OnePassSig(OnePassSig {
                    version: 3,
                    sig_type: SignatureType::Binary,
                    hash_algo,
                    pk_algo: signer.algo,
                    issuer: signer.key_id,
                    nested,
                });
                ops.serialize(&mut compressor).map_err(io_err)?;
            }

            let mut literal = LiteralWriter::new(compressor, b'b', &options.filename, options.mtime);
            literal.write_all(&plaintext).map_err(io_err)?;
            let mut compressor = literal.finalize()?;

            for sig in signatures.iter().rev() {
                Packet::Signature(sig.clone()).serialize(&mut compressor).map_err(io_err)?;
            }

            let encryptor = compressor.finalize()?;
            let armored = encryptor.finalize()?;
            armored.finalize()?;
        }
        output.write_all(&buffer).map_err(io_err)
    }

    /// Decrypts `input` (dearmoring first if necessary), writing the
    /// recovered plaintext to `output`. Embedded signatures, if any,
    /// are not verified — use [`Context::verify`] when the signature
    /// status matters.
    pub fn decrypt(&self, input: Input, mut output: Output) -> Status {
        match self.decrypt_inner(input) {
            Ok(processed) => match output.write_all(&processed.plaintext) {
                Ok(()) => Status::Ok,
                Err(e) => self.status_of(&io_err(e)),
            },
            Err(e) => self.status_of(&e),
        }
    }

    fn decrypt_inner(&self, input: Input) -> crate::error::Result<message::Processed> {
        let backends = self.backends();
        self.with_key_provider(|kp| {
            message::open(input, kp, self.password_provider.as_ref(), self.config.password_retry_limit, &backends)
        })
    }

    /// Verifies `input` against `detached`, if given, or as an inline
    /// (literal + one-pass + trailing signature) message otherwise,
    /// writing the recovered data to `output` and returning every
    /// embedded/detached signature's result alongside the overall
    /// status.
    pub fn verify(&self, input: Input, output: Output, detached: Option<Input>) -> (Status, Vec<SigResult>) {
        match self.verify_inner(input, output, detached) {
            Ok((status, sigs)) => (status, sigs),
            Err(e) => (self.status_of(&e), Vec::new()),
        }
    }

    fn verify_inner(
        &self,
        mut input: Input,
        mut output: Output,
        detached: Option<Input>,
    ) -> crate::error::Result<(Status, Vec<SigResult>)> {
        match detached {
            Some(sig_input) => {
                let mut data = Vec::new();
                input.read_to_end(&mut data).map_err(io_err)?;
                let dearmored = crate::store::maybe_dearmor(sig_input)?;
                let mut reader = buffered_reader::Generic::new(dearmored, None);
                let packets = crate::store::read_all_packets(&mut reader)?;
                let results = self.with_key_provider(|kp| {
                    message::verify_detached(&packets, &data, kp, &self.backend, &self.backend)
                });
                output.write_all(&data).map_err(io_err)?;
                let status = overall_status(&results);
                Ok((status, results))
            }
            None => {
                let processed = self.decrypt_inner(input)?;
                output.write_all(&processed.plaintext).map_err(io_err)?;
                let status = overall_status(&processed.signatures);
                Ok((status, processed.signatures))
            }
        }
    }

    /// Signs `input`, writing either the wrapped (literal + one-pass +
    /// trailing signature) message, or, if `options.detached` is set,
    /// a bare signature packet sequence, to `output`.
    pub fn sign(&self, mut input: Input, output: Output, signers: &[Signatory], options: &SignOptions) -> Status {
        if signers.is_empty() {
            return Status::BadParameters;
        }
        match self.sign_inner(&mut input, output, signers, options) {
            Ok(()) => Status::Ok,
            Err(e) => self.status_of(&e),
        }
    }

    fn sign_inner(
        &self,
        input: &mut Input,
        mut output: Output,
        signers: &[Signatory],
        options: &SignOptions,
    ) -> crate::error::Result<()> {
        let mut plaintext = Vec::new();
        input.read_to_end(&mut plaintext).map_err(io_err)?;

        let resolved =
            signers.iter().map(|s| self.resolve_signer(s)).collect::<crate::error::Result<Vec<_>>>()?;
        let hash_algo = options.hash.unwrap_or(self.config.default_hash);
        let signatures =
            self.sign_packets(&plaintext, &resolved, hash_algo, SignatureType::Binary, options.creation)?;

        let mut buffer = Vec::new();
        {
            let kind = if options.detached { ArmorKind::Signature } else { ArmorKind::Message };
            let mut armored = MaybeArmored::new(&mut buffer, options.armor, kind)?;

            if options.detached {
                for sig in &signatures {
                    Packet::Signature(sig.clone()).serialize(&mut armored).map_err(io_err)?;
                }
            } else {
                let mut compressor = Compressor::new(&mut armored, CompressionAlgorithm::Uncompressed);

                for (idx, signer) in resolved.iter().enumerate() {
                    let nested = idx + 1 != resolved.len();
                    let ops = Packet::OnePassSig(OnePassSig {
                        version: 3,
                        sig_type: SignatureType::Binary,
                        hash_algo,
                        pk_algo: signer.algo,
                        issuer: signer.key_id,
                        nested,
                    });
                    ops.serialize(&mut compressor).map_err(io_err)?;
                }

                let mut literal = LiteralWriter::new(compressor, b'b', b"", options.creation);
                literal.write_all(&plaintext).map_err(io_err)?;
                let mut compressor = literal.finalize()?;

                for sig in signatures.iter().rev() {
                    Packet::Signature(sig.clone()).serialize(&mut compressor).map_err(io_err)?;
                }
                let _ = compressor;
            }
            armored.finalize()?;
        }
        output.write_all(&buffer).map_err(io_err)
    }

    // ---- key management -------------------------------------------------

    /// Generates a fresh primary key with a direct-key self-signature
    /// recording `params.flags`, adds it to the working keyring, and
    /// persists it, protecting its secret material with `password` if
    /// given.
    pub fn key_generate_primary(
        &mut self,
        params: &KeyGenParams,
        password: Option<&Protected>,
    ) -> (Status, Option<Fingerprint>) {
        match self.key_generate_primary_inner(params, password) {
            Ok(fp) => (Status::Ok, Some(fp)),
            Err(e) => (self.status_of(&e), None),
        }
    }

    fn key_generate_primary_inner(
        &mut self,
        params: &KeyGenParams,
        password: Option<&Protected>,
    ) -> crate::error::Result<Fingerprint> {
        let (public, secret) = self.backend.generate_key(params.algo, self.config.rsa_key_bits, &self.backend)?;
        let packet = KeyPacket::new_secret(params.algo, params.creation, public.clone(), &secret);
        let mut cert = Cert::new(packet)?;
        let issuer = cert.primary.key_id();
        let hash_prefix = cert.primary.packet.fingerprint_prefix();

        let mut hashed_area = SubpacketArea::new();
        hashed_area.push(Subpacket {
            tag: SubpacketTag::KeyFlags,
            critical: false,
            value: SubpacketValue::KeyFlags(params.flags),
        });
        if params.expiration_secs != 0 {
            hashed_area.push(Subpacket {
                tag: SubpacketTag::KeyExpirationTime,
                critical: false,
                value: SubpacketValue::KeyExpirationTime(params.expiration_secs),
            });
        }

        let sig = self.build_signature(
            &hash_prefix,
            params.algo,
            &secret,
            &public,
            issuer,
            self.config.default_hash,
            SignatureType::DirectKey,
            hashed_area,
            params.creation,
        )?;
        cert.direct_signatures.push(sig);

        if let Some(pw) = password {
            cert.primary.packet = cert.primary.packet.protect(
                pw,
                self.config.default_cipher,
                &self.backend,
                &self.backend,
                &|algo, chunks| self.backend.digest(algo, chunks),
            )?;
        }

        let fingerprint = cert.fingerprint().clone();
        self.keyring.merge(cert)?;
        self.persist()?;
        Ok(fingerprint)
    }

    /// Generates a fresh subkey bound to `primary` with a subkey
    /// binding signature recording `params.flags`, and persists it.
    pub fn key_generate_subkey(
        &mut self,
        primary: &Fingerprint,
        params: &KeyGenParams,
        primary_password: Option<&Protected>,
        subkey_password: Option<&Protected>,
    ) -> Status {
        match self.key_generate_subkey_inner(primary, params, primary_password, subkey_password) {
            Ok(()) => Status::Ok,
            Err(e) => self.status_of(&e),
        }
    }

    fn key_generate_subkey_inner(
        &mut self,
        primary_fp: &Fingerprint,
        params: &KeyGenParams,
        primary_password: Option<&Protected>,
        subkey_password: Option<&Protected>,
    ) -> crate::error::Result<()> {
        let mut cert = self
            .keyring
            .lookup_by_fingerprint(primary_fp)
            .ok_or_else(|| anyhow::Error::new(Error::NoSuitableKey))?
            .clone();
        if cert.primary.packet.secret.is_none() {
            return Err(anyhow::Error::new(Error::NoSuitableKey));
        }
        let pw = primary_password.cloned().unwrap_or_else(|| Protected::new(Vec::new()));
        let primary_secret_material =
            cert.primary.packet.unlock(&pw, &self.backend, &|algo, chunks| self.backend.digest(algo, chunks))?;

        let (public, secret) = self.backend.generate_key(params.algo, self.config.rsa_key_bits, &self.backend)?;
        let mut subkey_packet = KeyPacket::new_secret(params.algo, params.creation, public.clone(), &secret);

        let subkey_key = Key::new(subkey_packet.clone())?;
        let mut hash_prefix = cert.primary.packet.fingerprint_prefix();
        hash_prefix.extend_from_slice(&subkey_key.packet.fingerprint_prefix());

        let mut hashed_area = SubpacketArea::new();
        hashed_area.push(Subpacket {
            tag: SubpacketTag::KeyFlags,
            critical: false,
            value: SubpacketValue::KeyFlags(params.flags),
        });
        if params.expiration_secs != 0 {
            hashed_area.push(Subpacket {
                tag: SubpacketTag::KeyExpirationTime,
                critical: false,
                value: SubpacketValue::KeyExpirationTime(params.expiration_secs),
            });
        }

        let primary_public = cert.primary.packet.public.clone();
        let sig = self.build_signature(
            &hash_prefix,
            cert.primary.packet.algo,
            &primary_secret_material,
            &primary_public,
            cert.primary.key_id(),
            self.config.default_hash,
            SignatureType::SubkeyBinding,
            hashed_area,
            params.creation,
        )?;

        if let Some(pw) = subkey_password {
            subkey_packet = subkey_packet.protect(
                pw,
                self.config.default_cipher,
                &self.backend,
                &self.backend,
                &|algo, chunks| self.backend.digest(algo, chunks),
            )?;
        }

        cert.subkeys.push(crate::cert::SubkeyBinding { key: Key::new(subkey_packet)?, signatures: vec![sig] });
        self.keyring.merge(cert)?;
        self.persist()?;
        Ok(())
    }

    /// Adds a User ID to `fingerprint`'s certificate with a
    /// certification self-signature, and persists it.
    #[allow(clippy::too_many_arguments)]
    pub fn key_add_userid(
        &mut self,
        fingerprint: &Fingerprint,
        uid: &[u8],
        hash_algo: Option<HashAlgorithm>,
        flags: KeyFlags,
        expiration_secs: u32,
        primary_uid: bool,
        password: Option<&Protected>,
    ) -> Status {
        match self.key_add_userid_inner(fingerprint, uid, hash_algo, flags, expiration_secs, primary_uid, password) {
            Ok(()) => Status::Ok,
            Err(e) => self.status_of(&e),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn key_add_userid_inner(
        &mut self,
        fingerprint: &Fingerprint,
        uid: &[u8],
        hash_algo: Option<HashAlgorithm>,
        flags: KeyFlags,
        expiration_secs: u32,
        primary_uid: bool,
        password: Option<&Protected>,
    ) -> crate::error::Result<()> {
        let mut cert = self
            .keyring
            .lookup_by_fingerprint(fingerprint)
            .ok_or_else(|| anyhow::Error::new(Error::NoSuitableKey))?
            .clone();
        let pw = password.cloned().unwrap_or_else(|| Protected::new(Vec::new()));
        let secret = cert.primary.packet.unlock(&pw, &self.backend, &|algo, chunks| self.backend.digest(algo, chunks))?;

        let user_id = UserID::from_bytes(uid);
        let mut hash_prefix = cert.primary.packet.fingerprint_prefix();
        hash_prefix.extend_from_slice(&user_id.hash_prefix());

        let mut hashed_area = SubpacketArea::new();
        hashed_area.push(Subpacket {
            tag: SubpacketTag::KeyFlags,
            critical: false,
            value: SubpacketValue::KeyFlags(flags),
        });
        if primary_uid {
            hashed_area.push(Subpacket {
                tag: SubpacketTag::PrimaryUserID,
                critical: false,
                value: SubpacketValue::PrimaryUserID(true),
            });
        }
        if expiration_secs != 0 {
            hashed_area.push(Subpacket {
                tag: SubpacketTag::KeyExpirationTime,
                critical: false,
                value: SubpacketValue::KeyExpirationTime(expiration_secs),
            });
        }

        let hash_algo = hash_algo.unwrap_or(self.config.default_hash);
        let primary_public = cert.primary.packet.public.clone();
        let sig = self.build_signature(
            &hash_prefix,
            cert.primary.packet.algo,
            &secret,
            &primary_public,
            cert.primary.key_id(),
            hash_algo,
            SignatureType::PositiveCertification,
            hashed_area,
            Timestamp(self.now()),
        )?;

        cert.userids.push(crate::cert::UserIDBinding { user_id: Some(user_id), signatures: vec![sig], valid: true });
        self.keyring.merge(cert)?;
        self.persist()?;
        Ok(())
    }

    /// Re-protects `fingerprint`'s secret key material (primary and
    /// every subkey) under `new_password`, and persists the result.
    pub fn key_protect(&mut self, fingerprint: &Fingerprint, new_password: &Protected) -> Status {
        match self.rekey_protection(fingerprint, |ctx, packet| {
            packet.protect(new_password, ctx.config.default_cipher, &ctx.backend, &ctx.backend, &|algo, chunks| {
                ctx.backend.digest(algo, chunks)
            })
        }) {
            Ok(()) => Status::Ok,
            Err(e) => self.status_of(&e),
        }
    }

    /// Strips protection from `fingerprint`'s secret key material
    /// (unlocking with `old_password`), storing it cleartext, and
    /// persists the result. Prefer `key_protect` over leaving
    /// material unprotected any longer than necessary.
    pub fn key_unprotect(&mut self, fingerprint: &Fingerprint, old_password: &Protected) -> Status {
        match self.rekey_protection(fingerprint, |ctx, packet| {
            let secret = packet.unlock(old_password, &ctx.backend, &|algo, chunks| ctx.backend.digest(algo, chunks))?;
            Ok(KeyPacket::new_secret(packet.algo, packet.creation_time, packet.public.clone(), &secret))
        }) {
            Ok(()) => Status::Ok,
            Err(e) => self.status_of(&e),
        }
    }

    fn rekey_protection(
        &mut self,
        fingerprint: &Fingerprint,
        f: impl Fn(&Context, &KeyPacket) -> crate::error::Result<KeyPacket>,
    ) -> crate::error::Result<()> {
        let mut cert = self
            .keyring
            .lookup_by_fingerprint(fingerprint)
            .ok_or_else(|| anyhow::Error::new(Error::NoSuitableKey))?
            .clone();
        if cert.primary.packet.secret.is_some() {
            cert.primary.packet = f(self, &cert.primary.packet)?;
        }
        for sub in &mut cert.subkeys {
            if sub.key.packet.secret.is_some() {
                sub.key.packet = f(self, &sub.key.packet)?;
            }
        }
        self.keyring.merge(cert)?;
        self.persist()
    }

    /// Verifies that `password` unlocks `fingerprint`'s secret key
    /// material without persisting anything — the read-only
    /// counterpart of `key_protect`/`key_unprotect`, useful for
    /// confirming a password before an operation that will need it.
    pub fn key_unlock(&self, fingerprint: &Fingerprint, password: &Protected) -> Status {
        match self.key_unlock_inner(fingerprint, password) {
            Ok(()) => Status::Ok,
            Err(e) => self.status_of(&e),
        }
    }

    fn key_unlock_inner(&self, fingerprint: &Fingerprint, password: &Protected) -> crate::error::Result<()> {
        let cert = self
            .keyring
            .lookup_by_fingerprint(fingerprint)
            .ok_or_else(|| anyhow::Error::new(Error::NoSuitableKey))?;
        cert.primary.packet.unlock(password, &self.backend, &|algo, chunks| self.backend.digest(algo, chunks))?;
        Ok(())
    }

    /// Confirms `fingerprint`'s secret key material is currently
    /// protected (not stored cleartext). All secret material this
    /// crate persists is protected by construction; `key_lock` exists
    /// so a caller that ran `key_unlock`-then-used-the-key can assert
    /// it left the key the way it found it, without a corresponding
    /// on-disk mutation of its own.
    pub fn key_lock(&self, fingerprint: &Fingerprint) -> Status {
        let Some(cert) = self.keyring.lookup_by_fingerprint(fingerprint) else {
            return Status::KeyNotFound;
        };
        match &cert.primary.packet.secret {
            Some(secret) if !matches!(secret.protection, crate::packet::key::SecretKeyProtection::Cleartext) => {
                Status::Ok
            }
            Some(_) => Status::BadParameters,
            None => Status::NoSuitableKey,
        }
    }

    /// Serializes `fingerprint`'s certificate to `output`, including
    /// secret key material only if `secret` is true (in which case the
    /// caller is responsible for what becomes of the material once it
    /// leaves the process).
    pub fn key_export(&self, fingerprint: &Fingerprint, mut output: Output, armored: bool, secret: bool) -> Status {
        let Some(cert) = self.keyring.lookup_by_fingerprint(fingerprint) else {
            return Status::KeyNotFound;
        };
        let cert = if secret { cert.clone() } else { strip_secret(cert.clone()) };
        let kind = if secret { ArmorKind::SecretKey } else { ArmorKind::PublicKey };

        let mut buffer = Vec::new();
        if let Err(e) = crate::store::write_cert_packets(&cert, &mut buffer) {
            return self.status_of(&io_err(e));
        }

        let write_result = if armored {
            self.write_armored(&buffer, kind, &mut output)
        } else {
            output.write_all(&buffer).map_err(io_err)
        };
        match write_result {
            Ok(()) => Status::Ok,
            Err(e) => self.status_of(&e),
        }
    }

    fn write_armored(&self, body: &[u8], kind: ArmorKind, output: &mut Output) -> crate::error::Result<()> {
        let mut armored_buf = Vec::new();
        let mut writer = armor::Writer::new(&mut armored_buf, kind)?;
        writer.write_all(body).map_err(io_err)?;
        writer.finalize()?;
        output.write_all(&armored_buf).map_err(io_err)
    }

    /// Reads certificates (armored or binary) from `input`, merging
    /// each into the working keyring, and persists the result.
    pub fn key_import(&mut self, input: Input) -> Status {
        match self.key_import_inner(input) {
            Ok(()) => Status::Ok,
            Err(e) => self.status_of(&e),
        }
    }

    fn key_import_inner(&mut self, input: Input) -> crate::error::Result<()> {
        let dearmored = crate::store::maybe_dearmor(input)?;
        let mut reader = buffered_reader::Generic::new(dearmored, None);
        let packets = crate::store::read_all_packets(&mut reader)?;
        let certs = crate::store::group_into_certs(packets)?;
        for mut cert in certs {
            cert.revalidate(&self.backend);
            self.keyring.merge(cert)?;
        }
        self.persist()
    }

    /// Enumerates every certificate in the working keyring as
    /// `(key ID, fingerprint)` pairs. Returns a bare iterator (not a
    /// [`Status`]) since enumeration over an already-loaded keyring
    /// cannot itself fail.
    pub fn key_iterate(&self) -> impl Iterator<Item = (KeyID, Fingerprint)> + '_ {
        self.keyring.iterate(|_| true)
    }
}

fn strip_secret(mut cert: Cert) -> Cert {
    cert.primary.packet.secret = None;
    for sub in &mut cert.subkeys {
        sub.key.packet.secret = None;
    }
    cert
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysCancelPasswords;
    impl PasswordProvider for AlwaysCancelPasswords {
        fn request(
            &self,
            _context: crate::providers::PasswordContext,
            _hint: &str,
        ) -> crate::providers::PasswordResult {
            crate::providers::PasswordResult::Cancel
        }
    }

    fn test_context() -> Context {
        Context::new(Config::default(), Box::new(AlwaysCancelPasswords))
    }

    #[test]
    fn status_from_error_maps_bad_password() {
        assert_eq!(Status::from_error(&Error::BadPassword), Status::BadPassword);
    }

    #[test]
    fn status_from_error_maps_unsupported_algorithm() {
        assert_eq!(Status::from_error(&Error::UnsupportedAlgorithm("x".into())), Status::NotSupported);
    }

    #[test]
    fn fresh_context_has_empty_keyring() {
        let ctx = test_context();
        assert!(ctx.keyring().is_empty());
    }

    #[test]
    fn encrypt_with_no_recipients_is_bad_parameters() {
        let ctx = test_context();
        let data = b"abc".to_vec();
        let input = Input::from_memory(&data);
        let mut out = Vec::new();
        let output = Output::to_memory(&mut out);
        let status = ctx.encrypt(input, output, &[], &EncryptOptions::default());
        assert_eq!(status, Status::BadParameters);
    }

    #[test]
    fn sign_with_no_signers_is_bad_parameters() {
        let ctx = test_context();
        let data = b"abc".to_vec();
        let input = Input::from_memory(&data);
        let mut out = Vec::new();
        let output = Output::to_memory(&mut out);
        let status = ctx.sign(input, output, &[], &SignOptions::default());
        assert_eq!(status, Status::BadParameters);
    }

    #[test]
    fn generate_primary_and_export_round_trips_packets() {
        let mut ctx = test_context();
        let params = KeyGenParams {
            algo: PublicKeyAlgorithm::RSAEncryptSign,
            flags: KeyFlags::CERTIFY | KeyFlags::SIGN,
            creation: Timestamp(0),
            expiration_secs: 0,
        };
        let (status, fp) = ctx.key_generate_primary(&params, None);
        assert_eq!(status, Status::Ok);
        let fp = fp.expect("fingerprint on success");
        assert!(ctx.keyring().lookup_by_fingerprint(&fp).is_some());

        let mut out = Vec::new();
        let output = Output::to_memory(&mut out);
        let status = ctx.key_export(&fp, output, false, false);
        assert_eq!(status, Status::Ok);
        assert!(!out.is_empty());
    }

    #[test]
    fn key_lock_reports_not_found_for_unknown_fingerprint() {
        let ctx = test_context();
        let fp = Fingerprint::from_bytes(&[0u8; 20]);
        assert_eq!(ctx.key_lock(&fp), Status::KeyNotFound);
    }
}
