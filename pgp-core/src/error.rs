//! The library's closed error enumeration.
//!
//! Internal code threads `anyhow::Error` through `?` (see
//! [`Result`]) so that context can be layered on with
//! `.context(...)` as it propagates; `Error` is the set of variants
//! that a caller can usefully match on, and is what `anyhow::Error`
//! ultimately downcasts to at an API boundary such as
//! [`crate::context::Context`].

use thiserror::Error as ThisError;

/// The crate's `Result` alias: fallible internal operations return
/// this, not a bare `Error`, so that `.context("...")` can attach
/// human-readable detail without inventing a new variant per call
/// site.
pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// Something went wrong parsing, validating, or operating on OpenPGP
/// data.
#[derive(ThisError, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A packet, subpacket, or MPI was truncated or otherwise did not
    /// parse according to its framing rules.
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    /// An MPI exceeded the maximum permitted bit length, or its
    /// length-prefix did not match its body.
    #[error("Malformed MPI: {0}")]
    MalformedMPI(String),

    /// A keyring on-disk container (flat or KBX) violated its format
    /// invariants.
    #[error("Malformed keyring store: {0}")]
    MalformedStore(String),

    /// Armor framing (the `-----BEGIN ... -----` header, the
    /// radix-64 body, or the CRC-24 checksum) did not parse or did
    /// not match.
    #[error("Invalid ASCII armor: {0}")]
    InvalidArmor(String),

    /// A passphrase-derived or session key failed to decrypt protected
    /// secret key material or an SEIP/AED payload (checksum, SHA-1
    /// hash, or AEAD tag mismatch).
    #[error("Incorrect password")]
    BadPassword,

    /// An MDC or AEAD integrity check failed.
    #[error("Message integrity check failed: {0}")]
    ManipulatedMessage(String),

    /// No key was found that could decrypt a PKESK/SKESK, verify a
    /// signature, or otherwise satisfy the requested operation.
    #[error("No suitable key found")]
    NoSuitableKey,

    /// The caller's [`crate::providers::PasswordProvider`] or
    /// [`crate::providers::KeyProvider`] declined to continue.
    #[error("Operation cancelled")]
    Cancelled,

    /// An algorithm identifier is recognized but not implemented by
    /// the active crypto backend.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Underlying I/O failure reading or writing a stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for backend (RustCrypto) primitive failures that
    /// do not map to a more specific variant above.
    #[error("Cryptographic operation failed: {0}")]
    CryptoBackend(String),
}

impl Error {
    /// True for errors that indicate the input was simply wrong (bad
    /// password, failed integrity check, ...) as opposed to a bug or
    /// resource failure — used by [`crate::context::Status`] to
    /// decide whether an operation's failure is "expected" and
    /// therefore loggable at `info` rather than `error` level.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Error::BadPassword
                | Error::ManipulatedMessage(_)
                | Error::NoSuitableKey
                | Error::Cancelled
                | Error::MalformedPacket(_)
                | Error::MalformedMPI(_)
                | Error::MalformedStore(_)
                | Error::InvalidArmor(_)
        )
    }
}
