use super::encode::{fits_int, fits_uint};
use super::types::AbiType;
use super::AbiToken;
use crate::error::Error;
use crate::utils::right_pad_to_word;

/// Packs one value. Array elements keep their 32 byte word form, except
/// strings and bytes which are always written raw.
fn packed_value(abi_type: &AbiType, token: &AbiToken, in_array: bool) -> Result<Vec<u8>, Error> {
    let out_of_range = || Error::AbiValueOutOfRange {
        abi_type: abi_type.to_string(),
    };
    match (abi_type, token) {
        (AbiType::Uint(bits), AbiToken::Uint(value)) => {
            let word = value.to_be_bytes();
            if !fits_uint(&word, *bits) {
                return Err(out_of_range());
            }
            Ok(packed_word(&word, *bits, in_array))
        }
        (AbiType::Int(bits), AbiToken::Int(value)) => {
            let word = value.to_be_bytes();
            if !fits_int(&word, *bits) {
                return Err(out_of_range());
            }
            Ok(packed_word(&word, *bits, in_array))
        }
        (AbiType::Address, AbiToken::Address(address)) => Ok(if in_array {
            address.to_word().to_vec()
        } else {
            address.as_bytes().to_vec()
        }),
        (AbiType::Bool, AbiToken::Bool(value)) => Ok(packed_word(&[*value as u8; 1], 8, in_array)),
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
            Ok(if in_array {
                right_pad_to_word(bytes)
            } else {
                bytes.clone()
            })
        }
        (AbiType::Bytes, AbiToken::UnboundedBytes(bytes)) => Ok(bytes.clone()),
        (AbiType::String, AbiToken::String(s)) => Ok(s.as_bytes().to_vec()),
        (AbiType::Array(inner), AbiToken::Dynamic(items)) => packed_elements(inner, items),
        (AbiType::FixedArray(inner, len), AbiToken::FixedArray(items)) => {
            if items.len() != *len {
                return Err(Error::AbiLengthMismatch {
                    expected: *len,
                    got: items.len(),
                });
            }
            packed_elements(inner, items)
        }
        (AbiType::Tuple(_), _) => Err(Error::UnsupportedAbiType(abi_type.to_string())),
        _ => Err(Error::AbiTypeMismatch {
            expected: abi_type.to_string(),
        }),
    }
}

/// The low `bits` of a big endian value, or the value left padded to a word inside arrays
fn packed_word(value: &[u8], bits: usize, in_array: bool) -> Vec<u8> {
    let width = if in_array { 32 } else { bits / 8 };
    let mut out = vec![0u8; width.saturating_sub(value.len())];
    out.extend_from_slice(&value[value.len().saturating_sub(width)..]);
    out
}

fn packed_elements(inner: &AbiType, items: &[AbiToken]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    for item in items {
        out.extend(packed_value(inner, item, true)?);
    }
    Ok(out)
}

/// Solidity's `abi.encodePacked`, values are concatenated in their minimal
/// width with no offsets or lengths. Tuples have no packed form.
///
/// ```rust
/// use veracity::abi::{encode_packed, AbiToken, AbiType};
/// let types: Vec<AbiType> = vec!["string".parse().unwrap(), "uint16".parse().unwrap()];
/// let packed = encode_packed(&types, &["hi".into(), 0x0102u32.into()]).unwrap();
/// assert_eq!(packed, vec![b'h', b'i', 0x01, 0x02]);
/// ```
pub fn encode_packed(types: &[AbiType], tokens: &[AbiToken]) -> Result<Vec<u8>, Error> {
    if types.len() != tokens.len() {
        return Err(Error::AbiLengthMismatch {
            expected: types.len(),
            got: tokens.len(),
        });
    }
    let mut out = Vec::new();
    for (abi_type, token) in types.iter().zip(tokens) {
        out.extend(packed_value(abi_type, token, false)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::error::ErrorKind;
    use crate::utils::{bytes_to_hex_str, hex_str_to_bytes};

    fn packed(kinds: &[&str], tokens: &[AbiToken]) -> Result<String, Error> {
        let types = kinds
            .iter()
            .map(|k| k.parse())
            .collect::<Result<Vec<AbiType>, Error>>()?;
        encode_packed(&types, tokens).map(|out| bytes_to_hex_str(&out))
    }

    fn vitalik() -> Address {
        "0xd8da6bf26964af9d7eed9e03e53415d37aa96045".parse().unwrap()
    }

    #[test]
    fn integers_use_their_width() {
        assert_eq!(packed(&["uint8"], &[200u8.into()]).unwrap(), "c8");
        assert_eq!(
            packed(&["uint48"], &[20123120u32.into()]).unwrap(),
            "000001330df0"
        );
        assert_eq!(
            packed(&["int8"], &[AbiToken::int_from_i128(-121)]).unwrap(),
            "87"
        );
        assert_eq!(
            packed(&["int48"], &[AbiToken::int_from_i128(-1212311)]).unwrap(),
            "ffffffed8069"
        );
        assert_eq!(
            packed(&["int128"], &[AbiToken::int_from_i128(-121231231211)]).unwrap(),
            "ffffffffffffffffffffffe3c60e3715"
        );
        assert_eq!(
            packed(&["uint8"], &[256u32.into()]).unwrap_err().kind(),
            ErrorKind::InvalidFormat
        );
    }

    #[test]
    fn scalars_and_raw_data() {
        assert_eq!(
            packed(&["address"], &[vitalik().into()]).unwrap(),
            "d8da6bf26964af9d7eed9e03e53415d37aa96045"
        );
        assert_eq!(
            packed(&["string"], &["hello world".into()]).unwrap(),
            "68656c6c6f20776f726c64"
        );
        assert_eq!(packed(&["bool"], &[true.into()]).unwrap(), "01");
        assert_eq!(
            packed(
                &["bytes2", "bytes"],
                &[
                    AbiToken::Bytes(vec![0xab, 0xcd]),
                    AbiToken::UnboundedBytes(hex_str_to_bytes("0x010203").unwrap())
                ]
            )
            .unwrap(),
            "abcd010203"
        );
        assert_eq!(
            packed(
                &["address", "string", "uint16"],
                &[vitalik().into(), "hi".into(), 1u8.into()]
            )
            .unwrap(),
            "d8da6bf26964af9d7eed9e03e53415d37aa9604568690001"
        );
    }

    #[test]
    fn array_elements_are_words() {
        assert_eq!(
            packed(
                &["string[]"],
                &[AbiToken::Dynamic(vec!["hello".into(), "world".into()])]
            )
            .unwrap(),
            "68656c6c6f776f726c64"
        );
        let zeros = "00".repeat(28);
        assert_eq!(
            packed(
                &["bytes4[2]"],
                &[AbiToken::FixedArray(vec![
                    AbiToken::Bytes(vec![0xde, 0xad, 0xbe, 0xef]),
                    AbiToken::Bytes(vec![0xca, 0xfe, 0xba, 0xbe]),
                ])]
            )
            .unwrap(),
            format!("deadbeef{zeros}cafebabe{zeros}")
        );
        assert_eq!(
            packed(
                &["uint8[]", "bool[]"],
                &[
                    AbiToken::Dynamic(vec![1u8.into()]),
                    AbiToken::Dynamic(vec![true.into()])
                ]
            )
            .unwrap(),
            format!("{}01{}01", "00".repeat(31), "00".repeat(31))
        );
        assert_eq!(
            packed(&["address[]"], &[AbiToken::Dynamic(vec![vitalik().into()])]).unwrap(),
            format!("{}d8da6bf26964af9d7eed9e03e53415d37aa96045", "00".repeat(12))
        );
    }

    #[test]
    fn packed_rejects() {
        assert_eq!(
            packed(&["(uint8,bool)"], &[AbiToken::Struct(vec![1u8.into(), true.into()])])
                .unwrap_err()
                .kind(),
            ErrorKind::UnsupportedType
        );
        assert_eq!(
            packed(&["uint8", "bool"], &[1u8.into()]).unwrap_err().kind(),
            ErrorKind::DataSize
        );
        assert_eq!(
            packed(&["bytes4"], &[AbiToken::Bytes(vec![1, 2])]).unwrap_err().kind(),
            ErrorKind::DataSize
        );
        assert_eq!(
            packed(&["bytes4[2]"], &[AbiToken::FixedArray(vec![AbiToken::Bytes(vec![0; 4])])])
                .unwrap_err()
                .kind(),
            ErrorKind::DataSize
        );
        assert!(matches!(
            packed(&["string"], &[true.into()]),
            Err(Error::AbiTypeMismatch { .. })
        ));
    }
}
