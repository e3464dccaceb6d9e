//! An OpenPGP (RFC 4880 / RFC 4880bis) implementation: packet codec,
//! ASCII armor, key and keyring model, and a streaming
//! message-processing pipeline (encryption, decryption, signing,
//! verification).
//!
//! The crate is organized, leaves first, the way the wire format
//! builds up:
//!
//! - [`mpi`] and [`types`]: the primitive values (MPIs, S2K,
//!   algorithm identifiers) every higher layer encodes.
//! - [`armor`]: the optional ASCII-armor framing around a packet
//!   stream.
//! - [`packet`]: the packet codec itself — headers, keys, signatures,
//!   user IDs, and the remaining content packets.
//! - [`cert`]: the key entity model built out of packets (a primary
//!   key, its subkeys, user IDs, and signatures) and a collection of
//!   certificates with lookup indices.
//! - [`store`]: the two on-disk keyring container formats.
//! - [`crypto`]: the capability interface primitive operations are
//!   consumed through, plus the default RustCrypto-backed
//!   implementation.
//! - [`message`]: the pull/push pipeline that stacks the above into
//!   a working OpenPGP message processor.
//! - [`providers`] and [`context`]: the public, caller-facing API.

#![warn(missing_docs)]

pub mod error;
pub mod types;
pub mod fingerprint;
pub mod mpi;
pub mod armor;
pub mod io;
pub mod packet;
pub mod cert;
pub mod store;
pub mod crypto;
pub mod message;
pub mod providers;
pub mod context;

pub use error::{Error, Result};
