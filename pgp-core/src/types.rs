//! Algorithm identifiers and other small, `Copy` value types used
//! throughout the packet and key codecs.

use std::fmt;

macro_rules! algorithm_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $value:expr, )*
            Unknown($other:ident),
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )*
            /// An algorithm identifier this crate does not (yet) know
            /// the name of.  Round-trips byte-for-byte.
            Unknown(u8),
        }

        impl From<u8> for $name {
            fn from(b: u8) -> Self {
                match b {
                    $( $value => $name::$variant, )*
                    $other => $name::Unknown($other),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(a: $name) -> u8 {
                match a {
                    $( $name::$variant => $value, )*
                    $name::Unknown(b) => b,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match self {
                    $( $name::$variant => f.write_str(stringify!($variant)), )*
                    $name::Unknown(b) => write!(f, "Unknown({})", b),
                }
            }
        }
    }
}

algorithm_enum! {
    /// Public-key algorithm identifiers (RFC 4880 §9.1, RFC 6637).
    pub enum PublicKeyAlgorithm {
        RSAEncryptSign => 1,
        RSAEncryptOnly => 2,
        RSASignOnly => 3,
        ElGamalEncryptOnly => 16,
        DSA => 17,
        ECDH => 18,
        ECDSA => 19,
        ElGamalEncryptSign => 20,
        EdDSA => 22,
        Unknown(u8),
    }
}

impl PublicKeyAlgorithm {
    /// Whether this algorithm can be used to make signatures.
    pub fn for_signing(&self) -> bool {
        use PublicKeyAlgorithm::*;
        matches!(self, RSAEncryptSign | RSASignOnly | DSA | ECDSA | EdDSA
                 | ElGamalEncryptSign)
    }

    /// Whether this algorithm can be used to encrypt session keys.
    pub fn for_encryption(&self) -> bool {
        use PublicKeyAlgorithm::*;
        matches!(self, RSAEncryptSign | RSAEncryptOnly | ElGamalEncryptOnly
                 | ElGamalEncryptSign | ECDH)
    }

    /// Whether this algorithm is permitted to certify (and thus to be
    /// a primary key): every signing-capable algorithm is, per RFC
    /// 4880 §5.5.2.
    pub fn for_certification(&self) -> bool {
        self.for_signing()
    }
}

algorithm_enum! {
    /// Symmetric cipher algorithm identifiers (RFC 4880 §9.2).
    pub enum SymmetricAlgorithm {
        Plaintext => 0,
        IDEA => 1,
        TripleDES => 2,
        CAST5 => 3,
        Blowfish => 4,
        AES128 => 7,
        AES192 => 8,
        AES256 => 9,
        Twofish => 10,
        Camellia128 => 11,
        Camellia192 => 12,
        Camellia256 => 13,
        Unknown(u8),
    }
}

impl SymmetricAlgorithm {
    /// The cipher's block size in bytes, or `None` if unknown/stream.
    pub fn block_size(&self) -> Option<usize> {
        use SymmetricAlgorithm::*;
        match self {
            Plaintext => None,
            IDEA | TripleDES | CAST5 | Blowfish => Some(8),
            AES128 | AES192 | AES256 | Twofish
                | Camellia128 | Camellia192 | Camellia256 => Some(16),
            Unknown(_) => None,
        }
    }

    /// The cipher's key size in bytes, or `None` if unknown.
    pub fn key_size(&self) -> Option<usize> {
        use SymmetricAlgorithm::*;
        match self {
            Plaintext => Some(0),
            IDEA | CAST5 | Blowfish | AES128 | Camellia128 => Some(16),
            TripleDES | AES192 | Camellia192 => Some(24),
            AES256 | Twofish | Camellia256 => Some(32),
            Unknown(_) => None,
        }
    }
}

algorithm_enum! {
    /// Hash algorithm identifiers (RFC 4880 §9.4).
    pub enum HashAlgorithm {
        MD5 => 1,
        SHA1 => 2,
        RipeMD160 => 3,
        SHA256 => 8,
        SHA384 => 9,
        SHA512 => 10,
        SHA224 => 11,
        Unknown(u8),
    }
}

impl HashAlgorithm {
    /// The digest length in bytes, or `None` if unknown.
    pub fn digest_size(&self) -> Option<usize> {
        use HashAlgorithm::*;
        match self {
            MD5 => Some(16),
            SHA1 | RipeMD160 => Some(20),
            SHA224 => Some(28),
            SHA256 => Some(32),
            SHA384 => Some(48),
            SHA512 => Some(64),
            Unknown(_) => None,
        }
    }
}

algorithm_enum! {
    /// Compression algorithm identifiers (RFC 4880 §9.3).
    pub enum CompressionAlgorithm {
        Uncompressed => 0,
        Zip => 1,
        Zlib => 2,
        BZip2 => 3,
        Unknown(u8),
    }
}

algorithm_enum! {
    /// AEAD algorithm identifiers (RFC 4880bis).
    pub enum AEADAlgorithm {
        EAX => 1,
        OCB => 2,
        Unknown(u8),
    }
}

impl AEADAlgorithm {
    /// The nonce length in bytes.
    pub fn nonce_size(&self) -> Option<usize> {
        match self {
            AEADAlgorithm::EAX => Some(16),
            AEADAlgorithm::OCB => Some(15),
            AEADAlgorithm::Unknown(_) => None,
        }
    }

    /// The authentication tag length in bytes (both defined modes
    /// use 16-byte tags).
    pub fn tag_size(&self) -> usize { 16 }
}

algorithm_enum! {
    /// Signature type identifiers (RFC 4880 §5.2.1).
    pub enum SignatureType {
        Binary => 0x00,
        Text => 0x01,
        Standalone => 0x02,
        GenericCertification => 0x10,
        PersonaCertification => 0x11,
        CasualCertification => 0x12,
        PositiveCertification => 0x13,
        SubkeyBinding => 0x18,
        PrimaryKeyBinding => 0x19,
        DirectKey => 0x1f,
        KeyRevocation => 0x20,
        SubkeyRevocation => 0x28,
        CertificationRevocation => 0x30,
        Timestamp => 0x40,
        ThirdPartyConfirmation => 0x50,
        Unknown(u8),
    }
}

impl SignatureType {
    /// Whether this signature type certifies a user ID/attribute.
    pub fn is_certification(&self) -> bool {
        use SignatureType::*;
        matches!(self, GenericCertification | PersonaCertification
                 | CasualCertification | PositiveCertification)
    }
}

/// Elliptic curve identifiers, named by OID (RFC 6637, RFC 4880bis).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Curve {
    /// NIST P-256.
    NistP256,
    /// NIST P-384.
    NistP384,
    /// NIST P-521.
    NistP521,
    /// Ed25519 (signing).
    Ed25519,
    /// Curve25519 (ECDH).
    Cv25519,
    /// An OID this crate does not recognize.
    Unknown(Box<[u8]>),
}

impl Curve {
    /// The curve's OID, DER-encoded (without the 0x06 tag/length
    /// prefix — just the object identifier octets, as OpenPGP stores
    /// it prefixed with its own length byte).
    pub fn oid(&self) -> &[u8] {
        match self {
            Curve::NistP256 => &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07],
            Curve::NistP384 => &[0x2B, 0x81, 0x04, 0x00, 0x22],
            Curve::NistP521 => &[0x2B, 0x81, 0x04, 0x00, 0x23],
            Curve::Ed25519 => &[0x2B, 0x06, 0x01, 0x04, 0x01, 0xDA, 0x47, 0x0F, 0x01],
            Curve::Cv25519 => &[0x2B, 0x06, 0x01, 0x04, 0x01, 0x97, 0x55, 0x01, 0x05, 0x01],
            Curve::Unknown(oid) => oid,
        }
    }

    /// Parses a curve from its OID octets.
    pub fn from_oid(oid: &[u8]) -> Curve {
        match oid {
            [0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07] => Curve::NistP256,
            [0x2B, 0x81, 0x04, 0x00, 0x22] => Curve::NistP384,
            [0x2B, 0x81, 0x04, 0x00, 0x23] => Curve::NistP521,
            [0x2B, 0x06, 0x01, 0x04, 0x01, 0xDA, 0x47, 0x0F, 0x01] => Curve::Ed25519,
            [0x2B, 0x06, 0x01, 0x04, 0x01, 0x97, 0x55, 0x01, 0x05, 0x01] => Curve::Cv25519,
            other => Curve::Unknown(other.to_vec().into_boxed_slice()),
        }
    }

    /// The field size in bits, used to size MPI-encoded points.
    pub fn field_bits(&self) -> Option<usize> {
        match self {
            Curve::NistP256 => Some(256),
            Curve::NistP384 => Some(384),
            Curve::NistP521 => Some(521),
            Curve::Ed25519 | Curve::Cv25519 => Some(256),
            Curve::Unknown(_) => None,
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Curve::NistP256 => f.write_str("NIST P-256"),
            Curve::NistP384 => f.write_str("NIST P-384"),
            Curve::NistP521 => f.write_str("NIST P-521"),
            Curve::Ed25519 => f.write_str("Ed25519"),
            Curve::Cv25519 => f.write_str("Curve25519"),
            Curve::Unknown(oid) => write!(f, "unknown curve {:?}", oid),
        }
    }
}

macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $repr:ty {
            $( const $flag:ident = $value:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub struct $name($repr);

        impl $name {
            $( #[allow(missing_docs)] pub const $flag: $name = $name($value); )*

            /// The empty flag set.
            pub const fn empty() -> Self { $name(0) }

            /// Constructs a flag set from its raw on-wire byte(s).
            pub fn from_bits(bits: $repr) -> Self { $name(bits) }

            /// Returns the raw on-wire representation.
            pub fn bits(&self) -> $repr { self.0 }

            /// Whether `other`'s bits are all set in `self`.
            pub fn contains(&self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Unions `other` into `self`.
            pub fn insert(&mut self, other: Self) { self.0 |= other.0; }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self { $name(self.0 | rhs.0) }
        }
    }
}

bitflags_like! {
    /// Key capability flags (RFC 4880 §5.2.3.21, the "Key Flags"
    /// signature subpacket).
    pub struct KeyFlags: u8 {
        const CERTIFY = 0x01;
        const SIGN = 0x02;
        const ENCRYPT_COMMS = 0x04;
        const ENCRYPT_STORAGE = 0x08;
        const SPLIT = 0x10;
        const AUTHENTICATE = 0x20;
        const SHARED = 0x80;
    }
}

/// A 32-bit OpenPGP timestamp: seconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u32);

impl Timestamp {
    /// The zero timestamp, used by some subpackets to mean "no
    /// expiration"/"not set".
    pub const ZERO: Timestamp = Timestamp(0);

    /// Adds a duration in seconds, returning `None` on overflow; per
    /// spec.md §4.5, overflow is treated the same as "expired", so
    /// callers should map `None` to an already-past time rather than
    /// propagating an error.
    pub fn checked_add(&self, secs: u32) -> Option<Timestamp> {
        self.0.checked_add(secs).map(Timestamp)
    }
}

impl From<Timestamp> for std::time::SystemTime {
    fn from(t: Timestamp) -> Self {
        std::time::UNIX_EPOCH + std::time::Duration::from_secs(t.0 as u64)
    }
}

impl From<std::time::SystemTime> for Timestamp {
    fn from(t: std::time::SystemTime) -> Self {
        let secs = t.duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Timestamp(secs.min(u32::MAX as u64) as u32)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
