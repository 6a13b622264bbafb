use crate::address::Address;
use crate::constants::{secpk1n, secpk1n_half, MAX_CHAIN_ID};
use crate::context::SECP256K1;
use crate::error::Error;
use crate::raw_private_key::public_key_to_address;
use crate::utils::{bytes_to_hex_str, hex_str_to_bytes, to_array};
use num256::Uint256;
use num_traits::{ToPrimitive, Zero};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::Message;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display};
use std::str::FromStr;

/// A recoverable secp256k1 signature.
///
/// `y_parity` is the recovery bit, the legacy `v` value is `27 + y_parity`
/// and an EIP-155 `v` additionally folds in the chain id. Signatures produced
/// by [`PrivateKey`](crate::PrivateKey) are always in low-s form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub r: Uint256,
    pub s: Uint256,
    pub y_parity: bool,
}

impl Signature {
    pub fn new(y_parity: bool, r: Uint256, s: Uint256) -> Signature {
        Signature { r, s, y_parity }
    }

    pub fn get_r(&self) -> Uint256 {
        self.r
    }

    pub fn get_s(&self) -> Uint256 {
        self.s
    }

    /// The pre EIP-155 v value, 27 or 28
    pub fn v(&self) -> u8 {
        27 + self.y_parity as u8
    }

    /// v as written into a replay protected legacy transaction, chain ids
    /// at or above `MAX_CHAIN_ID` are rejected
    pub fn eip155_v(&self, chain_id: Uint256) -> Result<Uint256, Error> {
        if chain_id >= MAX_CHAIN_ID.into() {
            return Err(Error::InvalidNetworkId);
        }
        Ok(chain_id * Uint256::from(2u8) + Uint256::from(35u8 + u8::from(self.y_parity)))
    }

    /// Splits a legacy v value into the recovery bit and the chain id it
    /// commits to, if any. Accepts 0, 1, 27, 28 and EIP-155 values.
    pub fn parse_v(v: Uint256) -> Result<(bool, Option<Uint256>), Error> {
        match v.to_u8() {
            Some(0) | Some(27) => return Ok((false, None)),
            Some(1) | Some(28) => return Ok((true, None)),
            _ => {}
        }
        if v < 35u8.into() {
            return Err(Error::InvalidV);
        }
        let offset = v - 35u8.into();
        let chain_id = offset / 2u8.into();
        let parity = offset - chain_id * 2u8.into();
        Ok((!parity.is_zero(), Some(chain_id)))
    }

    pub fn is_low_s(&self) -> bool {
        self.s <= secpk1n_half()
    }

    /// Moves `s` into the lower half of the curve order, flipping the
    /// recovery bit to match. A low-s signature is returned unchanged, as is
    /// an `s` outside the curve order which no normalization can repair.
    pub fn normalize(self) -> Signature {
        if self.is_low_s() || self.s >= secpk1n() {
            return self;
        }
        Signature {
            r: self.r,
            s: secpk1n() - self.s,
            y_parity: !self.y_parity,
        }
    }

    /// Like is_valid() but returns a reason
    pub fn error_check(&self) -> Result<(), Error> {
        if self.r >= secpk1n() || self.r.is_zero() {
            return Err(Error::InvalidR);
        }
        if !self.is_low_s() || self.s.is_zero() {
            return Err(Error::InvalidS);
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.error_check().is_ok()
    }

    /// The 65 byte `r ++ s ++ v` form with v as 27 or 28
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut result = [0x00u8; 65];
        result[0..32].copy_from_slice(&self.r.to_be_bytes());
        result[32..64].copy_from_slice(&self.s.to_be_bytes());
        result[64] = self.v();
        result
    }

    /// Parses the 65 byte `r ++ s ++ v` form, v may be a recovery bit, 27/28
    /// or a single byte EIP-155 value
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 65 {
            return Err(Error::InvalidSignatureLength { got: bytes.len() });
        }
        let (y_parity, _) = Signature::parse_v(bytes[64].into())?;
        Ok(Signature {
            r: Uint256::from_be_bytes(&bytes[0..32]),
            s: Uint256::from_be_bytes(&bytes[32..64]),
            y_parity,
        })
    }

    /// EIP-2098 compact form, the recovery bit is stored in the top bit of `s`
    pub fn to_compact(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r.to_be_bytes());
        out[32..].copy_from_slice(&self.s.to_be_bytes());
        if self.y_parity {
            out[32] |= 0x80;
        }
        out
    }

    pub fn from_compact(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 64 {
            return Err(Error::InvalidSignatureLength { got: bytes.len() });
        }
        let mut s: [u8; 32] = to_array(&bytes[32..])?;
        let y_parity = s[0] & 0x80 != 0;
        s[0] &= 0x7f;
        Ok(Signature {
            r: Uint256::from_be_bytes(&bytes[..32]),
            s: s.into(),
            y_parity,
        })
    }

    /// Recovers the address that produced this signature over `hash`
    pub fn recover(&self, hash: &[u8]) -> Result<Address, Error> {
        let digest: [u8; 32] =
            to_array(hash).map_err(|_| Error::InvalidHashLength { got: hash.len() })?;
        let msg = Message::from_digest(digest);
        let recovery_id = if self.y_parity {
            RecoveryId::One
        } else {
            RecoveryId::Zero
        };
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&self.r.to_be_bytes());
        compact[32..].copy_from_slice(&self.s.to_be_bytes());
        let sig = RecoverableSignature::from_compact(&compact, recovery_id)
            .map_err(Error::ParseRecoverableSignature)?;
        let pkey = SECP256K1.with(|object| -> Result<_, Error> {
            let secp256k1 = object.borrow();
            let pkey = secp256k1
                .recover_ecdsa(&msg, &sig)
                .map_err(Error::RecoverSignature)?;
            Ok(pkey.serialize_uncompressed())
        });
        match pkey {
            Ok(pkey) => public_key_to_address(&pkey),
            Err(e) => {
                debug!("Public key recovery failed {e}");
                Err(e)
            }
        }
    }
}

/// Recovers the signer of a 32 byte digest
pub fn recover_address(digest: &[u8], signature: &Signature) -> Result<Address, Error> {
    signature.recover(digest)
}

/// True when `signature` over `digest` was produced by `address`. High-s
/// signatures and any recovery failure count as a mismatch.
pub fn verify(address: &Address, digest: &[u8], signature: &Signature) -> bool {
    if let Err(e) = signature.error_check() {
        debug!("Rejecting signature in verify {e}");
        return false;
    }
    match signature.recover(digest) {
        Ok(recovered) => recovered == *address,
        Err(_) => false,
    }
}

impl Display for Signature {
    /// `0x` followed by 130 hex characters, `r ++ s ++ v`
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", bytes_to_hex_str(&self.to_bytes()))
    }
}

impl FromStr for Signature {
    type Err = Error;

    /// Accepts the 65 byte form or the 64 byte EIP-2098 form, with or without `0x`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex_str_to_bytes(s)?;
        match bytes.len() {
            64 => Signature::from_compact(&bytes),
            _ => Signature::from_bytes(&bytes),
        }
    }
}

impl fmt::LowerHex for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            write!(f, "0x")?;
        }
        write!(f, "{}", bytes_to_hex_str(&self.to_bytes()))
    }
}

impl fmt::UpperHex for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            write!(f, "0x")?;
        }
        write!(f, "{}", bytes_to_hex_str(&self.to_bytes()).to_uppercase())
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Signature, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
