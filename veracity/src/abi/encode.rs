use super::selector::derive_method_id;
use super::types::{AbiParameter, AbiType};
use super::AbiToken;
use crate::error::Error;
use crate::utils::right_pad_to_word;
use num256::Uint256;

fn mismatch(abi_type: &AbiType) -> Error {
    Error::AbiTypeMismatch {
        expected: abi_type.to_string(),
    }
}

fn usize_word(value: usize) -> [u8; 32] {
    Uint256::from(value).to_be_bytes()
}

/// The bytes above the low `bits` bits of a word
fn high_bytes(word: &[u8; 32], bits: usize) -> &[u8] {
    &word[..32 - bits / 8]
}

pub(crate) fn fits_uint(word: &[u8; 32], bits: usize) -> bool {
    high_bytes(word, bits).iter().all(|b| *b == 0)
}

/// True when the word is the sign extension of an `intN`
pub(crate) fn fits_int(word: &[u8; 32], bits: usize) -> bool {
    let sign_byte = word[32 - bits / 8];
    let fill = if sign_byte & 0x80 != 0 { 0xff } else { 0x00 };
    high_bytes(word, bits).iter().all(|b| *b == fill)
}

fn length_prefixed(data: &[u8]) -> Vec<u8> {
    let mut out = usize_word(data.len()).to_vec();
    out.extend(right_pad_to_word(data));
    out
}

/// Encodes one value, static values produce exactly `head_size()` bytes
pub(super) fn encode_value(abi_type: &AbiType, token: &AbiToken) -> Result<Vec<u8>, Error> {
    let out_of_range = || Error::AbiValueOutOfRange {
        abi_type: abi_type.to_string(),
    };
    match (abi_type, token) {
        (AbiType::Uint(bits), AbiToken::Uint(value)) => {
            let word = value.to_be_bytes();
            if !fits_uint(&word, *bits) {
                return Err(out_of_range());
            }
            Ok(word.to_vec())
        }
        (AbiType::Int(bits), AbiToken::Int(value)) => {
            let word = value.to_be_bytes();
            if !fits_int(&word, *bits) {
                return Err(out_of_range());
            }
            Ok(word.to_vec())
        }
        (AbiType::Address, AbiToken::Address(address)) => Ok(address.to_word().to_vec()),
        (AbiType::Bool, AbiToken::Bool(value)) => {
            let mut word = [0u8; 32];
            word[31] = *value as u8;
            Ok(word.to_vec())
        }
        (AbiType::FixedBytes(size), AbiToken::Bytes(bytes)) => {
            if !(1..=32).contains(size) {
                return Err(Error::UnsupportedAbiType(abi_type.to_string()));
            }
            if bytes.len() != *size {
                return Err(Error::AbiBytesSizeMismatch {
                    expected: *size,
                    got: bytes.len(),
                });
            }
            Ok(right_pad_to_word(bytes))
        }
        (AbiType::Bytes, AbiToken::UnboundedBytes(bytes)) => Ok(length_prefixed(bytes)),
        (AbiType::String, AbiToken::String(s)) => Ok(length_prefixed(s.as_bytes())),
        (AbiType::Array(inner), AbiToken::Dynamic(items)) => {
            let mut out = usize_word(items.len()).to_vec();
            out.extend(encode_sequence(
                std::iter::repeat(inner.as_ref()).take(items.len()),
                items,
            )?);
            Ok(out)
        }
        (AbiType::FixedArray(inner, len), AbiToken::FixedArray(items)) => {
            if items.len() != *len {
                return Err(Error::AbiLengthMismatch {
                    expected: *len,
                    got: items.len(),
                });
            }
            encode_sequence(std::iter::repeat(inner.as_ref()).take(*len), items)
        }
        (AbiType::Tuple(members), AbiToken::Struct(items)) => {
            if items.len() != members.len() {
                return Err(Error::AbiLengthMismatch {
                    expected: members.len(),
                    got: items.len(),
                });
            }
            encode_sequence(members.iter(), items)
        }
        _ => Err(mismatch(abi_type)),
    }
}

/// Head/tail layout of a sequence, offsets are relative to the start of the head
fn encode_sequence<'a>(
    types: impl Iterator<Item = &'a AbiType> + Clone,
    tokens: &[AbiToken],
) -> Result<Vec<u8>, Error> {
    let head_size: usize = types.clone().map(|t| t.head_size()).sum();
    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();
    for (abi_type, token) in types.zip(tokens) {
        let encoded = encode_value(abi_type, token)?;
        if abi_type.is_dynamic() {
            head.extend(usize_word(head_size + tail.len()));
            tail.extend(encoded);
        } else {
            head.extend(encoded);
        }
    }
    head.extend(tail);
    Ok(head)
}

/// Encodes `tokens` against explicit types
pub fn encode_types(types: &[AbiType], tokens: &[AbiToken]) -> Result<Vec<u8>, Error> {
    if types.len() != tokens.len() {
        return Err(Error::AbiLengthMismatch {
            expected: types.len(),
            got: tokens.len(),
        });
    }
    encode_sequence(types.iter(), tokens)
}

/// Encodes `values` as the parameters `params`, checking every value against its type
pub fn encode_parameters(params: &[AbiParameter], values: &[AbiToken]) -> Result<Vec<u8>, Error> {
    let types = params
        .iter()
        .map(|p| p.abi_type())
        .collect::<Result<Vec<AbiType>, Error>>()?;
    encode_types(&types, values)
}

/// Encodes tokens with the layout implied by the tokens themselves
pub fn encode_tokens(tokens: &[AbiToken]) -> Result<Vec<u8>, Error> {
    let types: Vec<AbiType> = tokens.iter().map(|t| t.abi_type()).collect();
    encode_types(&types, tokens)
}

/// A contract call payload, the method id followed by the encoded arguments
///
/// ```rust
/// use veracity::abi::{encode_call, AbiToken};
/// let payload = encode_call(
///     "transfer(address,uint256)",
///     &["0x0000000000000000000000000000000000000001".parse::<veracity::Address>().unwrap().into(), 69u8.into()],
/// )
/// .unwrap();
/// assert_eq!(payload.len(), 4 + 64);
/// ```
pub fn encode_call(sig: &str, tokens: &[AbiToken]) -> Result<Vec<u8>, Error> {
    let mut out = derive_method_id(sig)?.to_vec();
    out.extend(encode_tokens(tokens)?);
    Ok(out)
}
