//! Hashing primitives for signed messages and ENS names

use crate::address::Address;
use crate::constants::ETHEREUM_MESSAGE_PREFIX;
use crate::signature::{verify, Signature};
use crate::utils::{hex_str_to_bytes, keccak256};

/// EIP-191 personal message digest:
/// `keccak256("\x19Ethereum Signed Message:\n" ++ len(message) ++ message)`
/// where the length is written in decimal.
///
/// ```rust
/// use veracity::hash::hash_message;
/// use veracity::utils::bytes_to_hex_str;
/// assert_eq!(
///     bytes_to_hex_str(&hash_message(b"hello world")),
///     "d9eba16ed0ecae432b71fe008c98cc872bb4cc214d3220a36f365326cf807d68"
/// );
/// ```
pub fn hash_message(message: &[u8]) -> [u8; 32] {
    let mut data = Vec::with_capacity(ETHEREUM_MESSAGE_PREFIX.len() + 20 + message.len());
    data.extend_from_slice(ETHEREUM_MESSAGE_PREFIX.as_bytes());
    data.extend_from_slice(message.len().to_string().as_bytes());
    data.extend_from_slice(message);
    keccak256(&data)
}

/// True when `signature` is `address` signing `message` as a personal message
pub fn verify_message(address: &Address, message: &[u8], signature: &Signature) -> bool {
    verify(address, &hash_message(message), signature)
}

/// A label written as `[<64 hex chars>]` is already hashed
fn encoded_labelhash(label: &str) -> Option<[u8; 32]> {
    let inner = label.strip_prefix('[')?.strip_suffix(']')?;
    if inner.len() != 64 {
        return None;
    }
    let bytes = hex_str_to_bytes(inner).ok()?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Some(out)
}

/// keccak256 of a single ENS label, the empty label hashes to zero
pub fn labelhash(label: &str) -> [u8; 32] {
    if label.is_empty() {
        return [0u8; 32];
    }
    encoded_labelhash(label).unwrap_or_else(|| keccak256(label.as_bytes()))
}

/// ENS namehash, folds label hashes from the top level domain down.
/// Names are expected to be normalized already.
pub fn namehash(name: &str) -> [u8; 32] {
    let mut node = [0u8; 32];
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let mut data = [0u8; 64];
        data[..32].copy_from_slice(&node);
        data[32..].copy_from_slice(&labelhash(label));
        node = keccak256(&data);
    }
    node
}
