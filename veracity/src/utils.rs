use crate::error::Error;
use sha3::{Digest, Keccak256};
use std::str;

/// A function that takes a hexadecimal representation of bytes
/// back into a stream of bytes.
pub fn hex_str_to_bytes(s: &str) -> Result<Vec<u8>, Error> {
    let s = match s.strip_prefix("0x") {
        Some(s) => s,
        None => s,
    };
    let bytes = s
        .as_bytes()
        .chunks(2)
        .map::<Result<u8, Error>, _>(|ch| {
            let str = str::from_utf8(ch)?;
            let byte = u8::from_str_radix(str, 16)?;

            Ok(byte)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(bytes)
}

/// Lowercase hex without a prefix
pub fn bytes_to_hex_str(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:0>2x?}"))
        .fold(String::new(), |acc, x| acc + &x)
}

/// Same as [`bytes_to_hex_str`] with a leading `0x`
pub fn bytes_to_data(bytes: &[u8]) -> String {
    format!("0x{}", bytes_to_hex_str(bytes))
}

/// keccak256 of the input as a fixed array
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

/// Pad bytes with zeros at the start.
pub fn zpad(bytes: &[u8], len: usize) -> Vec<u8> {
    if bytes.len() >= len {
        return bytes.to_vec();
    }
    let mut pad = vec![0u8; len - bytes.len()];
    pad.extend(bytes);
    pad
}

/// Pad bytes with zeros at the end up to the next multiple of 32
pub fn right_pad_to_word(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    let rem = out.len() % 32;
    if rem != 0 {
        out.extend(vec![0u8; 32 - rem]);
    }
    out
}

/// Copies a slice into a fixed array, failing with the expected and actual
/// lengths when they differ
pub fn to_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], Error> {
    if bytes.len() != N {
        return Err(Error::AbiBytesSizeMismatch {
            expected: N,
            got: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Random byte strings for decoder fuzzing, lengths are skewed
/// towards small inputs so that prefixes are hit often
#[cfg(test)]
pub fn get_fuzz_bytes(rng: &mut rand::rngs::ThreadRng) -> Vec<u8> {
    use rand::Rng;
    let range = match rng.gen_range(0..4u8) {
        0 => 1..8,
        1 => 1..64,
        2 => 1..512,
        _ => 1..4096,
    };
    let size: usize = rng.gen_range(range);
    let mut out = vec![0u8; size];
    rng.fill(&mut out[..]);
    out
}

#[test]
fn decode_bytes() {
    assert_eq!(
        hex_str_to_bytes("deadbeef").expect("Unable to decode"),
        [222, 173, 190, 239]
    );
}

#[test]
fn decode_odd_amount_of_bytes() {
    assert_eq!(hex_str_to_bytes("f").unwrap(), vec![15]);
}

#[test]
fn bytes_raises_decode_error() {
    let e = hex_str_to_bytes("\u{012345}deadbeef").unwrap_err();

    match e {
        Error::InvalidUtf8(_) => {}
        _ => panic!(),
    };
}

#[test]
fn bytes_raises_parse_error() {
    let e = hex_str_to_bytes("Lorem ipsum").unwrap_err();
    match e {
        Error::InvalidHex(_) => {}
        _ => panic!(),
    }
}

#[test]
fn parse_prefixed_empty() {
    assert_eq!(hex_str_to_bytes("0x").unwrap(), Vec::<u8>::new());
}

#[test]
fn encode_bytes() {
    assert_eq!(bytes_to_hex_str(&[0xf]), "0f".to_owned());
    assert_eq!(bytes_to_hex_str(&[0xff]), "ff".to_owned());
    assert_eq!(bytes_to_data(&[0xde, 0xad, 0xbe, 0xef]), "0xdeadbeef");
}

#[test]
fn verify_zpad() {
    assert_eq!(zpad(&[1, 2, 3, 4], 8), [0, 0, 0, 0, 1, 2, 3, 4]);
    assert_eq!(zpad(&[1, 2, 3, 4], 2), [1, 2, 3, 4]);
}

#[test]
fn verify_right_pad() {
    assert_eq!(right_pad_to_word(&[]).len(), 0);
    assert_eq!(right_pad_to_word(&[1]).len(), 32);
    assert_eq!(right_pad_to_word(&[7u8; 32]).len(), 32);
    assert_eq!(right_pad_to_word(&[7u8; 33]).len(), 64);
}

#[test]
fn empty_keccak() {
    assert_eq!(
        bytes_to_hex_str(&keccak256(&[])),
        "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
    );
}
