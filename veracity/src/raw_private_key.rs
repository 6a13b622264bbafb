//! An unvalidated private key, the bootstrap step towards a [`PrivateKey`](crate::PrivateKey).

use crate::address::Address;
use crate::context::SECP256K1;
use crate::error::Error;
use crate::utils::{hex_str_to_bytes, keccak256};
use secp256k1::{PublicKey, SecretKey};
use std::str::FromStr;

/// Derives the address owning an uncompressed public key, the low 20 bytes of
/// the keccak256 of the 64 coordinate bytes
pub(crate) fn public_key_to_address(uncompressed: &[u8; 65]) -> Result<Address, Error> {
    if uncompressed[1..].iter().all(|b| *b == 0) {
        return Err(Error::ZeroPrivKey);
    }
    let digest = keccak256(&uncompressed[1..]);
    Address::from_slice(&digest[12..])
}

/// 32 bytes that may or may not be a valid secp256k1 scalar
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash)]
pub struct RawPrivateKey([u8; 32]);

impl FromStr for RawPrivateKey {
    type Err = Error;

    /// Parses 64 hex characters, optionally prefixed with `0x`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(Error::InvalidPrivKeyLength {
                got: s.len(),
                expected: 64,
            });
        }
        let bytes = hex_str_to_bytes(s)?;
        let mut res = [0x0u8; 32];
        res.copy_from_slice(&bytes);
        Ok(RawPrivateKey(res))
    }
}

impl From<[u8; 32]> for RawPrivateKey {
    fn from(val: [u8; 32]) -> RawPrivateKey {
        RawPrivateKey(val)
    }
}

impl RawPrivateKey {
    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Validates the scalar and derives the address of its public key,
    /// see the Ethereum Yellow Paper Appendix F.
    pub fn to_address(self) -> Result<Address, Error> {
        let sk = SecretKey::from_byte_array(&self.0).map_err(Error::DecodePrivKey)?;
        let pkey = SECP256K1.with(|object| {
            let secp256k1 = object.borrow();
            PublicKey::from_secret_key(&secp256k1, &sk).serialize_uncompressed()
        });
        public_key_to_address(&pkey)
    }
}

#[test]
fn zero_private_key() {
    // zero is not a valid scalar
    let key: RawPrivateKey = [0u8; 32].into();
    assert!(matches!(key.to_address(), Err(Error::DecodePrivKey(_))));
}

#[test]
fn key_above_curve_order() {
    let key: RawPrivateKey = [0xffu8; 32].into();
    assert!(key.to_address().is_err());
}

#[test]
fn parse_lengths() {
    assert!(matches!(
        "abcdef".parse::<RawPrivateKey>(),
        Err(Error::InvalidPrivKeyLength {
            got: 6,
            expected: 64
        })
    ));
    let key: RawPrivateKey = "0x4646464646464646464646464646464646464646464646464646464646464646"
        .parse()
        .unwrap();
    assert_eq!(key.to_bytes(), [0x46; 32]);
}
