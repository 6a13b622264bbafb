//! A module to simplify ABI encoding
//!
//! For simplicity, it is based on tokens. You have to specify a list of
//! tokens and they will be automatically encoded, either against an explicit
//! parameter list or with the layout inferred from the tokens themselves.
//!
//! Additionally there are helpers to help deal with deriving function
//! selectors and event topics, packing values the way `abi.encodePacked`
//! does, and building or reading calldata, return data, revert data, logs and
//! deploy data from a human readable definition.

mod decode;
mod encode;
mod item;
mod packed;
mod selector;
mod types;

pub use decode::{decode_parameters, decode_types};
pub use encode::{encode_call, encode_parameters, encode_tokens, encode_types};
pub(crate) use encode::{fits_int, fits_uint};
pub use item::{
    decode_deploy_data, decode_error_result, decode_event_log, decode_function_data,
    decode_function_result, encode_deploy_data, encode_error_result, encode_event_topics,
    encode_function_data, encode_function_result,
};
pub use packed::encode_packed;
pub use selector::{canonical_signature, derive_method_id, derive_signature};
pub use types::{AbiParameter, AbiType};

use crate::address::Address;
use num256::Uint256;

/// A token represents a value of parameter of the contract call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbiToken {
    /// Unsigned integer of any width up to 256 bits
    Uint(Uint256),
    /// Signed integer stored as its 256 bit two's complement, see [`AbiToken::int_from_i128`]
    Int(Uint256),
    Address(Address),
    Bool(bool),
    /// Fixed size `bytesN`, the length is N
    Bytes(Vec<u8>),
    /// Dynamic `bytes`
    UnboundedBytes(Vec<u8>),
    String(String),
    /// Dynamic array `T[]`
    Dynamic(Vec<AbiToken>),
    /// Fixed size array `T[k]`
    FixedArray(Vec<AbiToken>),
    /// Tuple, a struct in Solidity
    Struct(Vec<AbiToken>),
}

impl AbiToken {
    /// Sign extends `value` into a 256 bit two's complement `Int`
    pub fn int_from_i128(value: i128) -> AbiToken {
        let fill = if value < 0 { 0xff } else { 0x00 };
        let mut word = [fill; 32];
        word[16..].copy_from_slice(&value.to_be_bytes());
        AbiToken::Int(word.into())
    }

    /// The value of an `Int` token if it fits in an i128
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            AbiToken::Int(v) => {
                let word: [u8; 32] = (*v).into();
                let fill = if word[16] & 0x80 != 0 { 0xff } else { 0x00 };
                if word[..16].iter().any(|b| *b != fill) {
                    return None;
                }
                let mut low = [0u8; 16];
                low.copy_from_slice(&word[16..]);
                Some(i128::from_be_bytes(low))
            }
            _ => None,
        }
    }

    /// The type this token encodes as when no parameter list is given.
    /// Array element types are taken from the first element.
    pub fn abi_type(&self) -> AbiType {
        match self {
            AbiToken::Uint(_) => AbiType::Uint(256),
            AbiToken::Int(_) => AbiType::Int(256),
            AbiToken::Address(_) => AbiType::Address,
            AbiToken::Bool(_) => AbiType::Bool,
            AbiToken::Bytes(b) => AbiType::FixedBytes(b.len()),
            AbiToken::UnboundedBytes(_) => AbiType::Bytes,
            AbiToken::String(_) => AbiType::String,
            AbiToken::Dynamic(items) => AbiType::Array(Box::new(element_type(items))),
            AbiToken::FixedArray(items) => {
                AbiType::FixedArray(Box::new(element_type(items)), items.len())
            }
            AbiToken::Struct(members) => {
                AbiType::Tuple(members.iter().map(|m| m.abi_type()).collect())
            }
        }
    }
}

fn element_type(items: &[AbiToken]) -> AbiType {
    match items.first() {
        Some(first) => first.abi_type(),
        // an empty array encodes the same whatever its element type
        None => AbiType::Uint(256),
    }
}

impl From<u8> for AbiToken {
    fn from(v: u8) -> AbiToken {
        AbiToken::Uint(v.into())
    }
}

impl From<u32> for AbiToken {
    fn from(v: u32) -> AbiToken {
        AbiToken::Uint(v.into())
    }
}

impl From<u64> for AbiToken {
    fn from(v: u64) -> AbiToken {
        AbiToken::Uint(v.into())
    }
}

impl From<Uint256> for AbiToken {
    fn from(v: Uint256) -> AbiToken {
        AbiToken::Uint(v)
    }
}

impl From<bool> for AbiToken {
    fn from(v: bool) -> AbiToken {
        AbiToken::Bool(v)
    }
}

impl From<Address> for AbiToken {
    fn from(v: Address) -> AbiToken {
        AbiToken::Address(v)
    }
}

impl From<&str> for AbiToken {
    fn from(v: &str) -> AbiToken {
        AbiToken::String(v.to_string())
    }
}

impl From<[u8; 32]> for AbiToken {
    fn from(v: [u8; 32]) -> AbiToken {
        AbiToken::Bytes(v.to_vec())
    }
}

#[test]
fn signed_helpers() {
    for v in [0i128, 1, -1, 69, -420, i128::MAX, i128::MIN] {
        assert_eq!(AbiToken::int_from_i128(v).as_i128(), Some(v));
    }
    let minus_one: [u8; 32] = match AbiToken::int_from_i128(-1) {
        AbiToken::Int(v) => v.into(),
        _ => unreachable!(),
    };
    assert_eq!(minus_one, [0xff; 32]);
    // 2^255 does not fit
    let mut big = [0u8; 32];
    big[0] = 0x80;
    big[31] = 0x01;
    assert_eq!(AbiToken::Int(big.into()).as_i128(), None);
}
