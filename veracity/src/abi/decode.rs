use super::encode::{fits_int, fits_uint};
use super::types::{AbiParameter, AbiType};
use super::AbiToken;
use crate::address::Address;
use crate::error::Error;
use num256::Uint256;

fn read_word(data: &[u8], pos: usize) -> Result<[u8; 32], Error> {
    let end = pos.checked_add(32).filter(|end| *end <= data.len());
    match end {
        Some(end) => {
            let mut word = [0u8; 32];
            word.copy_from_slice(&data[pos..end]);
            Ok(word)
        }
        None => Err(Error::AbiDataSizeTooSmall {
            expected: pos.saturating_add(32),
            got: data.len(),
        }),
    }
}

/// Reads an offset or length word, anything that does not fit in the
/// input cannot point inside it
fn read_usize(data: &[u8], pos: usize) -> Result<usize, Error> {
    let word = read_word(data, pos)?;
    let too_big = || Error::AbiOffsetOutOfBounds {
        offset: usize::MAX,
        len: data.len(),
    };
    if word[..24].iter().any(|b| *b != 0) {
        return Err(too_big());
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(low)).map_err(|_| too_big())
}

fn length_prefixed(data: &[u8]) -> Result<&[u8], Error> {
    let len = read_usize(data, 0)?;
    let available = data.len() - 32;
    if len > available {
        return Err(Error::AbiDataSizeTooSmall {
            expected: len.saturating_add(32),
            got: data.len(),
        });
    }
    Ok(&data[32..32 + len])
}

/// Decodes one value starting at the beginning of `data`
pub(super) fn decode_value(abi_type: &AbiType, data: &[u8]) -> Result<AbiToken, Error> {
    let out_of_range = || Error::AbiValueOutOfRange {
        abi_type: abi_type.to_string(),
    };
    match abi_type {
        AbiType::Uint(bits) => {
            let word = read_word(data, 0)?;
            if !fits_uint(&word, *bits) {
                return Err(out_of_range());
            }
            Ok(AbiToken::Uint(Uint256::from_be_bytes(&word)))
        }
        AbiType::Int(bits) => {
            let word = read_word(data, 0)?;
            if !fits_int(&word, *bits) {
                return Err(out_of_range());
            }
            Ok(AbiToken::Int(Uint256::from_be_bytes(&word)))
        }
        AbiType::Address => {
            let word = read_word(data, 0)?;
            Address::from_word(&word)
                .map(AbiToken::Address)
                .ok_or_else(out_of_range)
        }
        AbiType::Bool => {
            let word = read_word(data, 0)?;
            if word[..31].iter().any(|b| *b != 0) || word[31] > 1 {
                return Err(out_of_range());
            }
            Ok(AbiToken::Bool(word[31] == 1))
        }
        AbiType::FixedBytes(size) => {
            if !(1..=32).contains(size) {
                return Err(Error::UnsupportedAbiType(abi_type.to_string()));
            }
            let word = read_word(data, 0)?;
            Ok(AbiToken::Bytes(word[..*size].to_vec()))
        }
        AbiType::Bytes => Ok(AbiToken::UnboundedBytes(length_prefixed(data)?.to_vec())),
        AbiType::String => {
            let bytes = length_prefixed(data)?;
            Ok(AbiToken::String(std::str::from_utf8(bytes)?.to_string()))
        }
        AbiType::Array(inner) => {
            let len = read_usize(data, 0)?;
            let body = &data[32..];
            // every element takes at least one head slot
            let needed = len.saturating_mul(inner.head_size().max(1));
            if needed > body.len() {
                return Err(Error::AbiDataSizeTooSmall {
                    expected: needed.saturating_add(32),
                    got: data.len(),
                });
            }
            let items = decode_sequence(std::iter::repeat(inner.as_ref()).take(len), body)?;
            Ok(AbiToken::Dynamic(items))
        }
        AbiType::FixedArray(inner, len) => {
            let items = decode_sequence(std::iter::repeat(inner.as_ref()).take(*len), data)?;
            Ok(AbiToken::FixedArray(items))
        }
        AbiType::Tuple(members) => Ok(AbiToken::Struct(decode_sequence(members.iter(), data)?)),
    }
}

/// Reads a head/tail encoded sequence, dynamic offsets are relative to
/// the start of `region`
fn decode_sequence<'a>(
    types: impl Iterator<Item = &'a AbiType> + Clone,
    region: &[u8],
) -> Result<Vec<AbiToken>, Error> {
    let head_size = types
        .clone()
        .fold(0usize, |acc, t| acc.saturating_add(t.head_size()));
    if head_size > region.len() {
        return Err(Error::AbiDataSizeTooSmall {
            expected: head_size,
            got: region.len(),
        });
    }
    let mut out = Vec::new();
    let mut pos = 0;
    for abi_type in types {
        if abi_type.is_dynamic() {
            let offset = read_usize(region, pos)?;
            if offset >= region.len() {
                return Err(Error::AbiOffsetOutOfBounds {
                    offset,
                    len: region.len(),
                });
            }
            out.push(decode_value(abi_type, &region[offset..])?);
        } else {
            out.push(decode_value(abi_type, &region[pos..])?);
        }
        pos += abi_type.head_size();
    }
    Ok(out)
}

/// Decodes `data` as values of `types`
pub fn decode_types(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiToken>, Error> {
    if types.is_empty() {
        return Ok(Vec::new());
    }
    if data.is_empty() {
        return Err(Error::AbiZeroData);
    }
    decode_sequence(types.iter(), data)
}

/// Decodes `data` against a parameter list, usually the outputs of a
/// function or the non indexed inputs of an event
pub fn decode_parameters(params: &[AbiParameter], data: &[u8]) -> Result<Vec<AbiToken>, Error> {
    let types = params
        .iter()
        .map(|p| p.abi_type())
        .collect::<Result<Vec<AbiType>, Error>>()?;
    decode_types(&types, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::encode_types;
    use crate::utils::{get_fuzz_bytes, hex_str_to_bytes};
    use rand::thread_rng;
    use std::time::{Duration, Instant};

    const FUZZ_TIME: Duration = Duration::from_secs(10);

    fn types(kinds: &[&str]) -> Vec<AbiType> {
        kinds.iter().map(|k| k.parse().unwrap()).collect()
    }

    fn word(hex: &str) -> String {
        format!("{hex:0>64}")
    }

    #[test]
    fn decode_solidity_docs_example() {
        let data = hex_str_to_bytes(
            &[
                word("123"),
                word("80"),
                "3132333435363738393000000000000000000000000000000000000000000000".to_string(),
                word("e0"),
                word("2"),
                word("456"),
                word("789"),
                word("d"),
                "48656c6c6f2c20776f726c642100000000000000000000000000000000000000".to_string(),
            ]
            .concat(),
        )
        .unwrap();
        let out = decode_types(&types(&["uint256", "uint32[]", "bytes10", "bytes"]), &data).unwrap();
        assert_eq!(
            out,
            vec![
                0x123u32.into(),
                AbiToken::Dynamic(vec![0x456u32.into(), 0x789u32.into()]),
                AbiToken::Bytes(b"1234567890".to_vec()),
                AbiToken::UnboundedBytes(b"Hello, world!".to_vec()),
            ]
        );
    }

    #[test]
    fn decode_what_was_encoded() {
        let t = types(&[
            "(address,string[],int16)",
            "bytes32[2]",
            "uint256[][]",
            "bool",
            "string",
        ]);
        let tokens = vec![
            AbiToken::Struct(vec![
                Address::from([0xab; 20]).into(),
                AbiToken::Dynamic(vec!["alpha".into(), "".into(), "gamma".into()]),
                AbiToken::int_from_i128(-2),
            ]),
            AbiToken::FixedArray(vec![[1u8; 32].into(), [2u8; 32].into()]),
            AbiToken::Dynamic(vec![
                AbiToken::Dynamic(vec![]),
                AbiToken::Dynamic(vec![5u8.into(), 6u8.into()]),
            ]),
            true.into(),
            "a string longer than a single thirty two byte word".into(),
        ];
        let encoded = encode_types(&t, &tokens).unwrap();
        assert_eq!(decode_types(&t, &encoded).unwrap(), tokens);
    }

    #[test]
    fn decode_against_json_parameters() {
        let params: Vec<AbiParameter> = serde_json::from_str(
            r#"[{"name": "balance", "type": "uint256"}, {"name": "ok", "type": "bool"}]"#,
        )
        .unwrap();
        let data = hex_str_to_bytes(&[word("3e8"), word("1")].concat()).unwrap();
        assert_eq!(
            decode_parameters(&params, &data).unwrap(),
            vec![AbiToken::from(1000u32), true.into()]
        );
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(decode_types(&[], &[]).unwrap(), vec![]);
        assert!(matches!(
            decode_types(&types(&["uint256"]), &[]),
            Err(Error::AbiZeroData)
        ));
        assert!(matches!(
            decode_types(&types(&["uint256", "uint256"]), &[0u8; 32]),
            Err(Error::AbiDataSizeTooSmall {
                expected: 64,
                got: 32
            })
        ));
    }

    #[test]
    fn rejects_bad_offsets_and_lengths() {
        // offset pointing past the end
        let data = hex_str_to_bytes(&word("40")).unwrap();
        assert!(matches!(
            decode_types(&types(&["bytes"]), &data),
            Err(Error::AbiOffsetOutOfBounds { offset: 64, len: 32 })
        ));
        // offset that does not fit in 64 bits
        let data = hex_str_to_bytes(&"ff".repeat(32)).unwrap();
        assert!(matches!(
            decode_types(&types(&["string"]), &data),
            Err(Error::AbiOffsetOutOfBounds { .. })
        ));
        // length larger than the remaining data
        let data = hex_str_to_bytes(&[word("20"), word("21"), "00".repeat(32)].concat()).unwrap();
        assert!(matches!(
            decode_types(&types(&["bytes"]), &data),
            Err(Error::AbiDataSizeTooSmall { .. })
        ));
        // an array claiming a huge element count must not allocate
        let data = hex_str_to_bytes(&[word("20"), word("ffffffffffff")].concat()).unwrap();
        assert!(matches!(
            decode_types(&types(&["uint256[]"]), &data),
            Err(Error::AbiDataSizeTooSmall { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let data = hex_str_to_bytes(&word("2")).unwrap();
        assert!(matches!(
            decode_types(&types(&["bool"]), &data),
            Err(Error::AbiValueOutOfRange { .. })
        ));
        let data = hex_str_to_bytes(&word("100")).unwrap();
        assert!(matches!(
            decode_types(&types(&["uint8"]), &data),
            Err(Error::AbiValueOutOfRange { .. })
        ));
        let data = hex_str_to_bytes(&word(&format!("01{}", "00".repeat(20)))).unwrap();
        assert!(matches!(
            decode_types(&types(&["address"]), &data),
            Err(Error::AbiValueOutOfRange { .. })
        ));
        // int8 -1 is sign extended, a bare 0xff is not
        let data = hex_str_to_bytes(&"ff".repeat(32)).unwrap();
        assert_eq!(
            decode_types(&types(&["int8"]), &data).unwrap()[0].as_i128(),
            Some(-1)
        );
        let data = hex_str_to_bytes(&word("ff")).unwrap();
        assert!(decode_types(&types(&["int8"]), &data).is_err());
    }

    #[test]
    fn rejects_invalid_utf8() {
        let data = hex_str_to_bytes(&[word("20"), word("2"), format!("{:0<64}", "c328")].concat())
            .unwrap();
        assert!(matches!(
            decode_types(&types(&["string"]), &data),
            Err(Error::InvalidUtf8(_))
        ));
    }

    #[test]
    fn fuzz_abi_decode() {
        let t = types(&["uint8", "bytes", "(string,address)[]", "int64[2]"]);
        let start = Instant::now();
        let mut rng = thread_rng();
        while Instant::now() - start < FUZZ_TIME {
            let bytes = get_fuzz_bytes(&mut rng);
            // must never panic, successful decodes must be well typed
            if let Ok(tokens) = decode_types(&t, &bytes) {
                assert!(encode_types(&t, &tokens).is_ok());
            }
        }
    }
}
