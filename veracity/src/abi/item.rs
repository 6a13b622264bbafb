//! Calldata, return data, revert data, logs and deploy data built from a
//! human readable definition such as
//! `function transfer(address to, uint256 amount) returns (bool)`

use super::decode::{decode_types, decode_value};
use super::encode::{encode_types, encode_value};
use super::selector::{parse_item, AbiItem};
use super::types::AbiType;
use super::AbiToken;
use crate::error::Error;
use crate::utils::keccak256;

/// Solidity's built in revert reasons, tried after the caller's own errors
const BUILTIN_ERRORS: [&str; 2] = ["Error(string)", "Panic(uint256)"];

fn selector(item: &AbiItem) -> [u8; 4] {
    let digest = keccak256(item.canonical().as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

fn split_selector(data: &[u8]) -> Result<([u8; 4], &[u8]), Error> {
    if data.len() < 4 {
        return Err(Error::AbiDataSizeTooSmall {
            expected: 4,
            got: data.len(),
        });
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&data[..4]);
    Ok((selector, &data[4..]))
}

/// The selector followed by `args` encoded against the declared inputs
pub fn encode_function_data(sig: &str, args: &[AbiToken]) -> Result<Vec<u8>, Error> {
    let item = parse_item(sig)?;
    let mut out = selector(&item).to_vec();
    out.extend(encode_types(&item.inputs, args)?);
    Ok(out)
}

/// Decodes calldata for `sig`, the selector has to match
pub fn decode_function_data(sig: &str, data: &[u8]) -> Result<Vec<AbiToken>, Error> {
    let item = parse_item(sig)?;
    let (found, args) = split_selector(data)?;
    if found != selector(&item) {
        debug!("Calldata selector does not belong to {}", item.canonical());
        return Err(Error::AbiSelectorNotFound { selector: found });
    }
    decode_types(&item.inputs, args)
}

/// Return data for a definition with a `returns (...)` clause
pub fn encode_function_result(sig: &str, values: &[AbiToken]) -> Result<Vec<u8>, Error> {
    encode_types(&parse_item(sig)?.outputs, values)
}

pub fn decode_function_result(sig: &str, data: &[u8]) -> Result<Vec<AbiToken>, Error> {
    decode_types(&parse_item(sig)?.outputs, data)
}

/// Revert data for a custom error, laid out like calldata
pub fn encode_error_result(sig: &str, args: &[AbiToken]) -> Result<Vec<u8>, Error> {
    encode_function_data(sig, args)
}

/// Finds the error among `errors`, `Error(string)` and `Panic(uint256)`
/// whose selector starts `data` and decodes its arguments. The canonical
/// signature of the match is returned with them.
///
/// ```rust
/// use veracity::abi::{decode_error_result, encode_error_result, AbiToken};
/// let revert = encode_error_result("Error(string)", &["Not enough".into()]).unwrap();
/// let (error, args) = decode_error_result(&[], &revert).unwrap();
/// assert_eq!(error, "Error(string)");
/// assert_eq!(args, vec![AbiToken::from("Not enough")]);
/// ```
pub fn decode_error_result(
    errors: &[&str],
    data: &[u8],
) -> Result<(String, Vec<AbiToken>), Error> {
    let (found, args) = split_selector(data)?;
    for sig in errors.iter().chain(BUILTIN_ERRORS.iter()) {
        let item = parse_item(sig)?;
        if selector(&item) == found {
            let values = decode_types(&item.inputs, args)?;
            return Ok((item.canonical(), values));
        }
    }
    Err(Error::AbiSelectorNotFound { selector: found })
}

/// Topic for one indexed value, dynamic values are stored as their keccak256
fn topic(abi_type: &AbiType, token: &AbiToken) -> Result<[u8; 32], Error> {
    match (abi_type, token) {
        (AbiType::String, AbiToken::String(s)) => Ok(keccak256(s.as_bytes())),
        (AbiType::Bytes, AbiToken::UnboundedBytes(b)) => Ok(keccak256(b)),
        (AbiType::Array(_) | AbiType::FixedArray(..) | AbiType::Tuple(_), _) => {
            Err(Error::UnsupportedAbiType(abi_type.to_string()))
        }
        _ => {
            let word = encode_value(abi_type, token)?;
            let mut out = [0u8; 32];
            out.copy_from_slice(&word);
            Ok(out)
        }
    }
}

/// Log filter topics for an event. The first topic is the event signature,
/// the rest follow the indexed inputs in order with `None` matching any
/// value. Inputs past the end of `args` are left open.
pub fn encode_event_topics(
    sig: &str,
    args: &[Option<AbiToken>],
) -> Result<Vec<Option<[u8; 32]>>, Error> {
    let item = parse_item(sig)?;
    let indexed: Vec<&AbiType> = item
        .inputs
        .iter()
        .zip(&item.indexed)
        .filter_map(|(t, is_indexed)| is_indexed.then_some(t))
        .collect();
    if args.len() > indexed.len() {
        return Err(Error::AbiLengthMismatch {
            expected: indexed.len(),
            got: args.len(),
        });
    }
    let mut topics = vec![Some(keccak256(item.canonical().as_bytes()))];
    for (i, abi_type) in indexed.into_iter().enumerate() {
        match args.get(i) {
            Some(Some(token)) => topics.push(Some(topic(abi_type, token)?)),
            _ => topics.push(None),
        }
    }
    Ok(topics)
}

/// Decodes a log into the event's inputs in declaration order.
///
/// Indexed values come from the topics after the signature. Indexed strings,
/// bytes, arrays and tuples only survive as their hash and are returned as a
/// `bytes32` token. The other inputs are decoded from `data`.
pub fn decode_event_log(
    sig: &str,
    topics: &[[u8; 32]],
    data: &[u8],
) -> Result<Vec<AbiToken>, Error> {
    let item = parse_item(sig)?;
    let expected = keccak256(item.canonical().as_bytes());
    if topics.first() != Some(&expected) {
        debug!("Log is not a {} event", item.canonical());
        return Err(Error::AbiEventSignatureMismatch { expected });
    }
    let indexed_count = item.indexed.iter().filter(|i| **i).count();
    if topics.len() - 1 != indexed_count {
        return Err(Error::AbiTopicsMismatch {
            expected: indexed_count,
            got: topics.len() - 1,
        });
    }

    let unindexed: Vec<AbiType> = item
        .inputs
        .iter()
        .zip(&item.indexed)
        .filter(|(_, is_indexed)| !**is_indexed)
        .map(|(t, _)| t.clone())
        .collect();
    let mut values = decode_types(&unindexed, data)?.into_iter();
    let mut indexed_topics = topics[1..].iter();

    let mut out = Vec::with_capacity(item.inputs.len());
    for (abi_type, is_indexed) in item.inputs.iter().zip(&item.indexed) {
        let value = if *is_indexed {
            let topic = indexed_topics.next().ok_or(Error::AbiTopicsMismatch {
                expected: indexed_count,
                got: topics.len() - 1,
            })?;
            match abi_type {
                AbiType::String
                | AbiType::Bytes
                | AbiType::Array(_)
                | AbiType::FixedArray(..)
                | AbiType::Tuple(_) => AbiToken::Bytes(topic.to_vec()),
                _ => decode_value(abi_type, topic)?,
            }
        } else {
            values.next().ok_or(Error::AbiZeroData)?
        };
        out.push(value);
    }
    Ok(out)
}

/// Contract creation data, the bytecode followed by the constructor arguments
pub fn encode_deploy_data(
    bytecode: &[u8],
    constructor: &str,
    args: &[AbiToken],
) -> Result<Vec<u8>, Error> {
    let item = parse_item(constructor)?;
    let mut out = bytecode.to_vec();
    out.extend(encode_types(&item.inputs, args)?);
    Ok(out)
}

pub fn decode_deploy_data(
    bytecode: &[u8],
    constructor: &str,
    data: &[u8],
) -> Result<Vec<AbiToken>, Error> {
    let item = parse_item(constructor)?;
    let args = data
        .strip_prefix(bytecode)
        .ok_or(Error::AbiBytecodeMismatch)?;
    decode_types(&item.inputs, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::error::ErrorKind;
    use crate::utils::{bytes_to_hex_str, hex_str_to_bytes};
    use num256::Uint256;

    const TRANSFER: &str = "event Transfer(address indexed from, address indexed to, uint256 value)";

    fn word(hex: &str) -> String {
        format!("{hex:0>64}")
    }

    fn word_bytes(hex: &str) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&hex_str_to_bytes(&word(hex)).unwrap());
        out
    }

    #[test]
    fn function_data() {
        let sig = "function transfer(address to, uint256 amount) external returns (bool)";
        let to = Address::from([0x11; 20]);
        let data = encode_function_data(sig, &[to.into(), 69u8.into()]).unwrap();
        assert_eq!(
            bytes_to_hex_str(&data),
            format!("a9059cbb{}{}", word(&"11".repeat(20)), word("45"))
        );
        assert_eq!(
            decode_function_data(sig, &data).unwrap(),
            vec![AbiToken::from(to), 69u8.into()]
        );

        // arguments are checked against the declared inputs
        assert!(matches!(
            encode_function_data(sig, &[to.into(), true.into()]),
            Err(Error::AbiTypeMismatch { .. })
        ));

        let approve = encode_function_data("approve(address,uint256)", &[to.into(), 1u8.into()])
            .unwrap();
        match decode_function_data(sig, &approve) {
            Err(Error::AbiSelectorNotFound { selector }) => {
                assert_eq!(selector, [0x09, 0x5e, 0xa7, 0xb3])
            }
            other => panic!("expected a selector error, got {other:?}"),
        }
        assert_eq!(
            decode_function_data(sig, &[0xa9, 0x05]).unwrap_err().kind(),
            ErrorKind::DataSize
        );
    }

    #[test]
    fn function_result() {
        let sig = "function getReserves() view returns (uint112 reserve0, uint112 reserve1, bool)";
        let values: Vec<AbiToken> = vec![1000u32.into(), 7u8.into(), true.into()];
        let data = encode_function_result(sig, &values).unwrap();
        assert_eq!(
            bytes_to_hex_str(&data),
            [word("3e8"), word("7"), word("1")].concat()
        );
        assert_eq!(decode_function_result(sig, &data).unwrap(), values);

        // no returns clause decodes to nothing
        assert_eq!(
            decode_function_result("function poke()", &data).unwrap(),
            Vec::<AbiToken>::new()
        );
        assert_eq!(
            decode_function_result(sig, &[]).unwrap_err().kind(),
            ErrorKind::DataSize
        );
        assert_eq!(
            decode_function_result("function f() returns (uint8)", &hex_str_to_bytes(&word("100")).unwrap())
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidFormat
        );
    }

    #[test]
    fn error_results() {
        let revert = hex_str_to_bytes(
            &[
                "08c379a0".to_string(),
                word("20"),
                word("a"),
                "4e6f7420656e6f75676800000000000000000000000000000000000000000000".to_string(),
            ]
            .concat(),
        )
        .unwrap();
        assert_eq!(
            encode_error_result("Error(string)", &["Not enough".into()]).unwrap(),
            revert
        );
        let custom = "error InsufficientBalance(uint256 available, uint256 required)";
        assert_eq!(
            decode_error_result(&[custom], &revert).unwrap(),
            ("Error(string)".to_string(), vec![AbiToken::from("Not enough")])
        );

        let panic = hex_str_to_bytes(&format!("4e487b71{}", word("11"))).unwrap();
        assert_eq!(
            decode_error_result(&[], &panic).unwrap(),
            ("Panic(uint256)".to_string(), vec![AbiToken::from(0x11u8)])
        );

        let data = encode_error_result(custom, &[1u8.into(), 2u8.into()]).unwrap();
        assert_eq!(
            decode_error_result(&[custom], &data).unwrap(),
            (
                "InsufficientBalance(uint256,uint256)".to_string(),
                vec![AbiToken::from(1u8), 2u8.into()]
            )
        );
        assert!(matches!(
            decode_error_result(&[], &data),
            Err(Error::AbiSelectorNotFound { .. })
        ));
    }

    #[test]
    fn event_topics() {
        let from = Address::from([0xaa; 20]);
        let transfer =
            word_bytes("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");
        assert_eq!(
            encode_event_topics(TRANSFER, &[Some(from.into())]).unwrap(),
            vec![Some(transfer), Some(from.to_word()), None]
        );
        assert_eq!(
            encode_event_topics(TRANSFER, &[]).unwrap(),
            vec![Some(transfer), None, None]
        );
        assert_eq!(
            encode_event_topics(TRANSFER, &[None, None, Some(1u8.into())])
                .unwrap_err()
                .kind(),
            ErrorKind::DataSize
        );

        let named = "event Named(string indexed name, bytes indexed blob)";
        let topics = encode_event_topics(
            named,
            &[
                Some("hello".into()),
                Some(AbiToken::UnboundedBytes(vec![1, 2, 3])),
            ],
        )
        .unwrap();
        assert_eq!(topics[1], Some(keccak256(b"hello")));
        assert_eq!(topics[2], Some(keccak256(&[1, 2, 3])));

        assert_eq!(
            encode_event_topics(
                "event Batch(uint256[] indexed ids)",
                &[Some(AbiToken::Dynamic(vec![]))]
            )
            .unwrap_err()
            .kind(),
            ErrorKind::UnsupportedType
        );
    }

    #[test]
    fn event_log() {
        let from = Address::from([0xaa; 20]);
        let to = Address::from([0xbb; 20]);
        let topics: Vec<[u8; 32]> =
            encode_event_topics(TRANSFER, &[Some(from.into()), Some(to.into())])
                .unwrap()
                .into_iter()
                .flatten()
                .collect();
        let data = hex_str_to_bytes(&word("3e8")).unwrap();
        assert_eq!(
            decode_event_log(TRANSFER, &topics, &data).unwrap(),
            vec![AbiToken::from(from), to.into(), AbiToken::Uint(Uint256::from(1000u32))]
        );

        let approval = encode_event_topics(
            "event Approval(address indexed owner, address indexed spender, uint256 value)",
            &[Some(from.into()), Some(to.into())],
        )
        .unwrap()
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
        assert!(matches!(
            decode_event_log(TRANSFER, &approval, &data),
            Err(Error::AbiEventSignatureMismatch { .. })
        ));
        assert!(matches!(
            decode_event_log(TRANSFER, &[], &data),
            Err(Error::AbiEventSignatureMismatch { .. })
        ));
        assert!(matches!(
            decode_event_log(TRANSFER, &topics[..2], &data),
            Err(Error::AbiTopicsMismatch {
                expected: 2,
                got: 1
            })
        ));
        assert_eq!(
            decode_event_log(TRANSFER, &topics, &[]).unwrap_err().kind(),
            ErrorKind::DataSize
        );
    }

    #[test]
    fn indexed_dynamic_values_stay_hashed() {
        let sig = "event Registered(string indexed name, uint8 indexed level, string note)";
        let topics: Vec<[u8; 32]> =
            encode_event_topics(sig, &[Some("alice".into()), Some(3u8.into())])
                .unwrap()
                .into_iter()
                .flatten()
                .collect();
        let data = hex_str_to_bytes(
            &[
                word("20"),
                word("2"),
                "6869000000000000000000000000000000000000000000000000000000000000".to_string(),
            ]
            .concat(),
        )
        .unwrap();
        assert_eq!(
            decode_event_log(sig, &topics, &data).unwrap(),
            vec![
                AbiToken::Bytes(keccak256(b"alice").to_vec()),
                3u8.into(),
                "hi".into()
            ]
        );
    }

    #[test]
    fn deploy_data() {
        let bytecode = hex_str_to_bytes("0x6080604052").unwrap();
        let constructor = "constructor(address owner, uint256 supply)";
        let owner = Address::from([0x22; 20]);
        let data =
            encode_deploy_data(&bytecode, constructor, &[owner.into(), 5u8.into()]).unwrap();
        assert_eq!(
            bytes_to_hex_str(&data),
            format!("6080604052{}{}", word(&"22".repeat(20)), word("5"))
        );
        assert_eq!(
            decode_deploy_data(&bytecode, constructor, &data).unwrap(),
            vec![AbiToken::from(owner), 5u8.into()]
        );
        assert!(matches!(
            decode_deploy_data(&[0x60, 0x60], constructor, &data),
            Err(Error::AbiBytecodeMismatch)
        ));
        assert_eq!(
            encode_deploy_data(&bytecode, "constructor()", &[]).unwrap(),
            bytecode
        );
    }
}
