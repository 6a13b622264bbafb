//! RLP encoder and decoder, transactions are encoded via rlp whereas contract calls are encoded with the Ethereum ABI
//! transactions include contract calls so this is the outer wrapper for any ABI encoded value
//!
//! Encoding always produces the canonical form and decoding only accepts it, so every
//! value has exactly one byte representation.
//! https://ethereum.org/en/developers/docs/data-structures-and-encoding/rlp/

use crate::{Address, Error};
use num256::Uint256;

/// Lists nested deeper than this are rejected instead of recursing further
const MAX_DEPTH: usize = 256;

/// Intermediate representation for RLP serialization and deserialization
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RlpToken {
    List(Vec<RlpToken>),
    /// conceptually a string is just an arbitrary set of data, integers are
    /// stored here big endian with their leading zero bytes removed
    String(Vec<u8>),
}

impl RlpToken {
    /// The empty string, encodes as 0x80 and is the canonical integer zero
    pub fn empty() -> RlpToken {
        RlpToken::String(Vec::new())
    }

    /// Borrows the byte content of a String token
    /// returns an Error if the enum is the list variant
    pub fn as_bytes(&self) -> Result<&[u8], Error> {
        match self {
            RlpToken::String(b) => Ok(b),
            RlpToken::List(_) => Err(Error::DeserializeRlp),
        }
    }

    /// Returns the byte content of String types
    /// returns an Error if the enum is the list variant
    pub fn get_byte_content(&self) -> Result<Vec<u8>, Error> {
        self.as_bytes().map(|b| b.to_vec())
    }

    pub fn as_list(&self) -> Result<&[RlpToken], Error> {
        match self {
            RlpToken::List(v) => Ok(v),
            RlpToken::String(_) => Err(Error::DeserializeRlp),
        }
    }

    /// Returns the list content of a List type RLP token, returns an Error
    /// for the String variant
    pub fn get_list_content(&self) -> Result<Vec<RlpToken>, Error> {
        self.as_list().map(|l| l.to_vec())
    }

    /// Reads a canonical unsigned integer of at most 32 bytes
    pub fn to_uint(&self) -> Result<Uint256, Error> {
        let bytes = self.as_bytes()?;
        check_integer(bytes, 32)?;
        Ok(Uint256::from_be_bytes(bytes))
    }

    /// Reads a canonical unsigned integer of at most 8 bytes
    pub fn to_u64(&self) -> Result<u64, Error> {
        let bytes = self.as_bytes()?;
        check_integer(bytes, 8)?;
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }
}

fn check_integer(bytes: &[u8], max: usize) -> Result<(), Error> {
    if bytes.len() > max {
        return Err(Error::RlpIntegerTooLarge {
            got: bytes.len(),
            max,
        });
    }
    if bytes.first() == Some(&0) {
        return Err(Error::NonCanonicalInteger);
    }
    Ok(())
}

// trim leading zero bytes of a provided array
fn trim_leading_zero_bytes(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|b| *b != 0) {
        Some(i) => &bytes[i..],
        None => &[],
    }
}

impl From<Uint256> for RlpToken {
    fn from(value: Uint256) -> Self {
        RlpToken::String(trim_leading_zero_bytes(&value.to_be_bytes()).to_vec())
    }
}

impl From<&Uint256> for RlpToken {
    fn from(value: &Uint256) -> Self {
        (*value).into()
    }
}

impl From<u64> for RlpToken {
    fn from(value: u64) -> Self {
        RlpToken::String(trim_leading_zero_bytes(&value.to_be_bytes()).to_vec())
    }
}

impl From<u8> for RlpToken {
    fn from(value: u8) -> Self {
        u64::from(value).into()
    }
}

impl From<bool> for RlpToken {
    fn from(value: bool) -> Self {
        u64::from(value).into()
    }
}

impl From<Address> for RlpToken {
    fn from(value: Address) -> Self {
        RlpToken::String(value.as_bytes().to_vec())
    }
}

impl From<&Address> for RlpToken {
    fn from(value: &Address) -> Self {
        RlpToken::String(value.as_bytes().to_vec())
    }
}

impl From<&[u8]> for RlpToken {
    fn from(value: &[u8]) -> Self {
        RlpToken::String(value.to_vec())
    }
}

impl From<Vec<u8>> for RlpToken {
    fn from(value: Vec<u8>) -> Self {
        RlpToken::String(value)
    }
}

fn encode_length(len: usize, short_offset: u8, out: &mut Vec<u8>) {
    if len <= 55 {
        out.push(short_offset + len as u8);
    } else {
        // long form, encode the length of the length then the length
        let len_bytes = len.to_be_bytes();
        let encoded_len = trim_leading_zero_bytes(&len_bytes);
        out.push(short_offset + 55 + encoded_len.len() as u8);
        out.extend_from_slice(encoded_len);
    }
}

/// Appends the canonical encoding of `token` to `out`
pub fn encode_into(token: &RlpToken, out: &mut Vec<u8>) {
    match token {
        RlpToken::String(bytes) => {
            if bytes.len() == 1 && bytes[0] < 0x80 {
                // a single low byte is its own encoding
                out.push(bytes[0]);
            } else {
                encode_length(bytes.len(), 0x80, out);
                out.extend_from_slice(bytes);
            }
        }
        RlpToken::List(items) => {
            let mut payload = Vec::new();
            for item in items {
                encode_into(item, &mut payload);
            }
            encode_length(payload.len(), 0xc0, out);
            out.extend(payload);
        }
    }
}

/// Canonical encoding of a single item
pub fn encode_rlp(token: &RlpToken) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(token, &mut out);
    out
}

/// Takes RLP token structs and packs the values into a single rlp
/// encoded byte array, tokens are encoded back to back
pub fn pack_rlp(input: Vec<RlpToken>) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    for token in input.iter() {
        encode_into(token, &mut out);
    }
    out
}

/// Where an item's payload sits within the input
struct Header {
    list: bool,
    offset: usize,
    len: usize,
}

fn read_length(input: &[u8], len_of_len: usize) -> Result<usize, Error> {
    if input.len() < len_of_len {
        return Err(Error::RlpTruncated {
            needed: len_of_len,
            available: input.len(),
        });
    }
    let len_bytes = &input[..len_of_len];
    if len_bytes[0] == 0 {
        // redundant length-of-length byte
        return Err(Error::NonCanonicalRlp);
    }
    if len_of_len > (usize::BITS / 8) as usize {
        return Err(Error::RlpIntegerTooLarge {
            got: len_of_len,
            max: (usize::BITS / 8) as usize,
        });
    }
    let len = len_bytes
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
    if len <= 55 {
        // long form used where the short form would have sufficed
        return Err(Error::NonCanonicalRlp);
    }
    Ok(len)
}

fn decode_header(input: &[u8]) -> Result<Header, Error> {
    let first = match input.first() {
        Some(b) => *b,
        None => {
            return Err(Error::RlpTruncated {
                needed: 1,
                available: 0,
            })
        }
    };
    let header = match first {
        0x00..=0x7f => Header {
            list: false,
            offset: 0,
            len: 1,
        },
        0x80..=0xb7 => {
            let len = (first - 0x80) as usize;
            if len == 1 {
                if let Some(b) = input.get(1) {
                    if *b < 0x80 {
                        // should have been encoded as the byte itself
                        return Err(Error::NonCanonicalRlp);
                    }
                }
            }
            Header {
                list: false,
                offset: 1,
                len,
            }
        }
        0xb8..=0xbf => {
            let len_of_len = (first - 0xb7) as usize;
            Header {
                list: false,
                offset: 1 + len_of_len,
                len: read_length(&input[1..], len_of_len)?,
            }
        }
        0xc0..=0xf7 => Header {
            list: true,
            offset: 1,
            len: (first - 0xc0) as usize,
        },
        0xf8..=0xff => {
            let len_of_len = (first - 0xf7) as usize;
            Header {
                list: true,
                offset: 1 + len_of_len,
                len: read_length(&input[1..], len_of_len)?,
            }
        }
    };
    let end = header.offset.checked_add(header.len);
    match end {
        Some(end) if end <= input.len() => Ok(header),
        _ => Err(Error::RlpTruncated {
            needed: header.offset.saturating_add(header.len),
            available: input.len(),
        }),
    }
}

fn decode_item(input: &[u8], depth: usize) -> Result<(RlpToken, usize), Error> {
    if depth > MAX_DEPTH {
        debug!("Rejecting RLP nested more than {MAX_DEPTH} levels deep");
        return Err(Error::DeserializeRlp);
    }
    let header = decode_header(input)?;
    let end = header.offset + header.len;
    let payload = &input[header.offset..end];
    if !header.list {
        return Ok((RlpToken::String(payload.to_vec()), end));
    }
    let mut items = Vec::new();
    let mut position = 0;
    while position < payload.len() {
        let (item, used) = decode_item(&payload[position..], depth + 1)?;
        items.push(item);
        position += used;
    }
    Ok((RlpToken::List(items), end))
}

/// Decodes the first item of `input`, returning it along with the bytes that follow it
pub fn decode_rlp_prefix(input: &[u8]) -> Result<(RlpToken, &[u8]), Error> {
    let (token, used) = decode_item(input, 0)?;
    Ok((token, &input[used..]))
}

/// Decodes exactly one item, any trailing bytes are an error
pub fn decode_rlp(input: &[u8]) -> Result<RlpToken, Error> {
    let (token, rest) = decode_rlp_prefix(input)?;
    if !rest.is_empty() {
        debug!("Rejecting RLP with {} trailing bytes", rest.len());
        return Err(Error::TrailingRlpBytes {
            remaining: rest.len(),
        });
    }
    Ok(token)
}

/// Unpacks RLP encoded bytes into a series of tokens, the inverse of [`pack_rlp`]
pub fn unpack_rlp(input: &[u8]) -> Result<Vec<RlpToken>, Error> {
    if input.is_empty() {
        return Err(Error::RlpTruncated {
            needed: 1,
            available: 0,
        });
    }
    let mut out = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        let (token, remaining) = decode_rlp_prefix(rest)?;
        out.push(token);
        rest = remaining;
    }
    Ok(out)
}
