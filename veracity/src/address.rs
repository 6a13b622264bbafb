use crate::cache::LruCache;
use crate::error::Error;
use crate::rlp::RlpToken;
use crate::utils::{bytes_to_hex_str, hex_str_to_bytes, keccak256};
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use std::fmt;
use std::str::FromStr;

/// Memoizes EIP-55 checksums, keyed by address
pub type ChecksumCache = LruCache<Address, String>;

/// Representation of an Ethereum address.
///
/// Address is usually derived from a `PrivateKey`, or converted from its
/// textual representation.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// Get raw bytes of the address.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; 20] {
        self.0
    }

    /// Creates an address from a slice that must be exactly 20 bytes long
    pub fn from_slice(data: &[u8]) -> Result<Address, Error> {
        if data.len() != 20 {
            return Err(Error::InvalidAddressLength {
                got: data.len(),
                expected: 20,
            });
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(data);
        Ok(Address(out))
    }

    /// Decodes an address that was embedded in an RLP string
    pub fn from_rlp_data(token: &RlpToken) -> Result<Address, Error> {
        Address::from_slice(token.as_bytes()?)
    }

    /// Takes the low 20 bytes of a 32 byte ABI word, the upper 12 must be zero
    pub fn from_word(word: &[u8; 32]) -> Option<Address> {
        if word[..12].iter().any(|b| *b != 0) {
            return None;
        }
        Address::from_slice(&word[12..]).ok()
    }

    /// Left pads the address into a 32 byte ABI word
    pub fn to_word(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[12..].copy_from_slice(&self.0);
        out
    }

    /// EIP-55 mixed case representation, with a 0x prefix
    pub fn to_checksum(&self) -> String {
        let lower = bytes_to_hex_str(&self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Same as [`Address::to_checksum`] but looks the result up in `cache` first
    pub fn to_checksum_cached(&self, cache: &ChecksumCache) -> String {
        cache.get_or_insert_with(*self, || self.to_checksum())
    }

    /// Parses like `FromStr` but validates mixed case input against checksums
    /// memoized in `cache`
    pub fn parse_cached(s: &str, cache: &ChecksumCache) -> Result<Address, Error> {
        let (address, hex) = parse_unchecked(s)?;
        if needs_checksum(hex) && address.to_checksum_cached(cache)[2..] != *hex {
            return Err(Error::InvalidEip55);
        }
        Ok(address)
    }
}

/// Returns the address along with the hex digits it was parsed from
fn parse_unchecked(s: &str) -> Result<(Address, &str), Error> {
    let hex = match s.strip_prefix("0x") {
        Some(h) => h,
        None => s,
    };
    if hex.len() != 40 {
        return Err(Error::InvalidAddressLength {
            got: hex.len() / 2,
            expected: 20,
        });
    }
    let bytes = hex_str_to_bytes(hex)?;
    Ok((Address::from_slice(&bytes)?, hex))
}

/// All lowercase or all uppercase input carries no checksum
fn needs_checksum(hex: &str) -> bool {
    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
    has_lower && has_upper
}

impl From<[u8; 20]> for Address {
    fn from(val: [u8; 20]) -> Address {
        Address(val)
    }
}

impl FromStr for Address {
    type Err = Error;

    /// Parses a string into a valid Ethereum address.
    ///
    /// # Supported formats
    ///
    /// * `0x` prefixed address
    /// * Raw bytes of an address represented by a bytes as an hexadecimal.
    ///
    /// Mixed case input must carry a valid EIP-55 checksum.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use std::str::FromStr;
    /// use veracity::Address;
    /// Address::from_str("0x0102030405060708090a0b0c0d0e0f1011121314").unwrap();
    /// Address::from_str("0102030405060708090a0b0c0d0e0f1011121314").unwrap();
    /// let _address: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap();
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, hex) = parse_unchecked(s)?;
        if needs_checksum(hex) && address.to_checksum()[2..] != *hex {
            return Err(Error::InvalidEip55);
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_checksum())
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            write!(f, "0x")?;
        }
        write!(f, "{}", bytes_to_hex_str(&self.0))
    }
}

impl fmt::UpperHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            write!(f, "0x")?;
        }
        write!(f, "{}", bytes_to_hex_str(&self.0).to_uppercase())
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Address, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[test]
#[should_panic]
fn decode_invalid_length() {
    "123".parse::<Address>().unwrap();
}

#[test]
#[should_panic]
fn decode_invalid_character() {
    "\u{012345}123456789012345678901234567890123456"
        .parse::<Address>()
        .unwrap();
}

#[test]
fn decode() {
    let address: Address = "1234567890123456789012345678901234567890"
        .parse::<Address>()
        .unwrap();

    assert_eq!(
        address,
        Address::from([
            0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0x78,
            0x90, 0x12, 0x34, 0x56, 0x78, 0x90
        ])
    );
}

#[test]
fn handle_prefixed() {
    let address: Address = "0x000000000000000000000000000b9331677e6ebf"
        .parse()
        .unwrap();
    assert_eq!(
        address,
        Address::from([
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x0b, 0x93, 0x31, 0x67, 0x7e, 0x6e, 0xbf
        ])
    );
}

#[test]
fn address_less_than_20_bytes() {
    assert!("0b9331677e6ebf".parse::<Address>().is_err());
}

#[test]
fn hashed() {
    // One of the use cases for Address could be a key in a HashMap to store some
    // additional values per address.
    use std::collections::HashMap;
    let a = Address::from_str("0x000000000000000000000000000b9331677e6ebf").unwrap();
    let b = Address::from_str("0x00000000000000000000000000000000deadbeef").unwrap();
    let mut map = HashMap::new();
    map.insert(a, "Foo");
    map.insert(b, "Bar");

    assert_eq!(map.get(&a).unwrap(), &"Foo");
    assert_eq!(map.get(&b).unwrap(), &"Bar");
}

#[test]
fn ordered() {
    let a = Address::from_str("0x000000000000000000000000000000000000000a").unwrap();
    let b = Address::from_str("0x000000000000000000000000000000000000000b").unwrap();
    let c = Address::from_str("0x000000000000000000000000000000000000000c").unwrap();
    assert!(c > b);
    assert!(b > a);
    assert_ne!(a, c);
}

#[test]
fn to_hex() {
    let address: Address = "1234567890123456789abcdef678901234567890"
        .parse::<Address>()
        .unwrap();

    assert_eq!(
        format!("{address:x}"),
        "1234567890123456789abcdef678901234567890",
    );
    assert_eq!(
        format!("{address:#x}"),
        "0x1234567890123456789abcdef678901234567890",
    );
    assert_eq!(
        format!("{address:#X}"),
        "0x1234567890123456789ABCDEF678901234567890",
    );
}

#[test]
fn eip55_vectors() {
    // vectors from the EIP-55 text
    let vectors = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];
    for v in vectors {
        let address: Address = v.parse().unwrap();
        assert_eq!(address.to_checksum(), v);
        assert_eq!(address.to_string(), v);
        // case insensitive forms are accepted without a checksum
        let lower: Address = v.to_lowercase().parse().unwrap();
        assert_eq!(lower, address);
    }
}

#[test]
fn eip55_rejects_bad_checksum() {
    let res = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAeD".parse::<Address>();
    assert!(matches!(res, Err(Error::InvalidEip55)));
}

#[test]
fn cached_checksum() {
    let cache = ChecksumCache::new(2);
    let a: Address = "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359".parse().unwrap();
    assert_eq!(
        a.to_checksum_cached(&cache),
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359"
    );
    assert_eq!(cache.len(), 1);
    let parsed =
        Address::parse_cached("0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359", &cache).unwrap();
    assert_eq!(parsed, a);
    assert_eq!(cache.len(), 1);
    assert!(Address::parse_cached("0xFb6916095ca1df60bB79Ce92cE3Ea74c37c5d359", &cache).is_err());
}

#[test]
fn serde_checksum_string() {
    let a: Address = "0xdbf03b407c01e7cd3cbea99509d93f8dddc8c6fb".parse().unwrap();
    let j = serde_json::to_string(&a).unwrap();
    assert_eq!(j, r#""0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB""#);
    let back: Address = serde_json::from_str(&j).unwrap();
    assert_eq!(back, a);
}

#[test]
fn abi_word() {
    let a: Address = "0x00000000000000000000000000000000deadbeef".parse().unwrap();
    let word = a.to_word();
    assert_eq!(Address::from_word(&word), Some(a));
    let mut dirty = word;
    dirty[0] = 1;
    assert_eq!(Address::from_word(&dirty), None);
}
