//! Fixed-size domain newtypes shared across every component.
//!
//! Small `Copy` newtypes around byte arrays, each computed via a single
//! associated function rather than scattering raw `[u8; N]` through the
//! codebase.

use std::fmt;

/// Length in bytes of a BLAKE3 digest.
pub const HASH_LEN: usize = 32;
/// Length in bytes of a compressed secp256k1 public key.
pub const PUBLIC_KEY_LEN: usize = 33;
/// Length in bytes of a compact ECDSA signature with recovery id.
pub const SIGNATURE_LEN: usize = 65;

/// A 32-byte BLAKE3 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// Computes the BLAKE3 digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn zero() -> Self {
        Self([0u8; HASH_LEN])
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != HASH_LEN {
            return None;
        }
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(bytes);
        Some(Self(out))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// 32-byte BLAKE3 hash of a compressed public key, used for peer/DHT routing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub [u8; HASH_LEN]);

impl NodeId {
    /// Derives a node id from a compressed public key, per the data model:
    /// `NodeID := BLAKE3(compressed_pubkey)`.
    pub fn from_public_key(pubkey: &PublicKey) -> Self {
        Self(*blake3::hash(&pubkey.0).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", hex::encode(self.0))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// 33-byte compressed secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return None;
        }
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(bytes);
        Some(Self(out))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

/// 65-byte compact ECDSA signature (64-byte r||s plus a 1-byte recovery id).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_LEN]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != SIGNATURE_LEN {
            return None;
        }
        let mut out = [0u8; SIGNATURE_LEN];
        out.copy_from_slice(bytes);
        Some(Self(out))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}
