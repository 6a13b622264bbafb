//! Solidity ABI type descriptors and the JSON parameter shape they are read from.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// A Solidity type as far as the ABI layout is concerned
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbiType {
    /// `uintN`, the width in bits
    Uint(usize),
    /// `intN`, the width in bits
    Int(usize),
    Address,
    Bool,
    /// `bytesN` for N in 1..=32
    FixedBytes(usize),
    Bytes,
    String,
    /// `T[]`
    Array(Box<AbiType>),
    /// `T[k]`
    FixedArray(Box<AbiType>, usize),
    /// `(T1,T2,...)`
    Tuple(Vec<AbiType>),
}

impl AbiType {
    /// Dynamic types are stored in the tail and referenced by an offset in the head
    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiType::Bytes | AbiType::String | AbiType::Array(_) => true,
            AbiType::FixedArray(inner, _) => inner.is_dynamic(),
            AbiType::Tuple(members) => members.iter().any(|m| m.is_dynamic()),
            _ => false,
        }
    }

    /// Bytes this type occupies in the head of the enclosing sequence
    pub fn head_size(&self) -> usize {
        if self.is_dynamic() {
            return 32;
        }
        match self {
            AbiType::FixedArray(inner, len) => inner.head_size().saturating_mul(*len),
            AbiType::Tuple(members) => members.iter().map(|m| m.head_size()).sum(),
            _ => 32,
        }
    }

    /// Applies array suffixes such as `[]`, `[2]` or `[][3]` from left to right
    pub(crate) fn with_suffix(mut self, suffix: &str) -> Result<AbiType, Error> {
        let mut rest = suffix.trim();
        while !rest.is_empty() {
            let close = match (rest.starts_with('['), rest.find(']')) {
                (true, Some(close)) => close,
                _ => return Err(Error::UnsupportedAbiType(suffix.to_string())),
            };
            let size = rest[1..close].trim();
            self = if size.is_empty() {
                AbiType::Array(Box::new(self))
            } else {
                let size: usize = size
                    .parse()
                    .map_err(|_| Error::UnsupportedAbiType(suffix.to_string()))?;
                AbiType::FixedArray(Box::new(self), size)
            };
            rest = &rest[close + 1..];
        }
        Ok(self)
    }
}

/// Splits on commas that are not nested inside parentheses
pub(crate) fn split_top_level(s: &str) -> Result<Vec<&str>, Error> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(Error::UnsupportedAbiType(s.to_string()));
                }
            }
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(Error::UnsupportedAbiType(s.to_string()));
    }
    parts.push(&s[start..]);
    Ok(parts)
}

/// Index of the parenthesis closing the one at `open`
pub(crate) fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0;
    for (i, c) in s[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_width(digits: &str, default: usize, valid: impl Fn(usize) -> bool) -> Option<usize> {
    if digits.is_empty() {
        return Some(default);
    }
    if digits.starts_with('0') {
        return None;
    }
    digits.parse().ok().filter(|w| valid(*w))
}

fn parse_elementary(s: &str) -> Result<AbiType, Error> {
    let unsupported = || Error::UnsupportedAbiType(s.to_string());
    let bits = |w: usize| w % 8 == 0 && (8..=256).contains(&w);
    match s {
        "address" => return Ok(AbiType::Address),
        "bool" => return Ok(AbiType::Bool),
        "string" => return Ok(AbiType::String),
        "bytes" => return Ok(AbiType::Bytes),
        // an address followed by a selector
        "function" => return Ok(AbiType::FixedBytes(24)),
        _ => {}
    }
    if let Some(w) = s.strip_prefix("uint") {
        return parse_width(w, 256, bits)
            .map(AbiType::Uint)
            .ok_or_else(unsupported);
    }
    if let Some(w) = s.strip_prefix("int") {
        return parse_width(w, 256, bits)
            .map(AbiType::Int)
            .ok_or_else(unsupported);
    }
    if let Some(w) = s.strip_prefix("bytes") {
        if w.is_empty() {
            return Err(unsupported());
        }
        return parse_width(w, 0, |n| (1..=32).contains(&n))
            .map(AbiType::FixedBytes)
            .ok_or_else(unsupported);
    }
    Err(unsupported())
}

impl FromStr for AbiType {
    type Err = Error;

    /// Parses type strings like `uint256`, `(address,bytes)[]` or `tuple(uint8,string)[2]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.ends_with(']') {
            let open = s
                .rfind('[')
                .ok_or_else(|| Error::UnsupportedAbiType(s.to_string()))?;
            let inner: AbiType = s[..open].parse()?;
            return inner.with_suffix(&s[open..]);
        }
        let tuple_body = s.strip_prefix("tuple").unwrap_or(s);
        if tuple_body.starts_with('(') {
            if matching_paren(tuple_body, 0) != Some(tuple_body.len() - 1) {
                return Err(Error::UnsupportedAbiType(s.to_string()));
            }
            let inside = &tuple_body[1..tuple_body.len() - 1];
            if inside.trim().is_empty() {
                return Ok(AbiType::Tuple(Vec::new()));
            }
            let members = split_top_level(inside)?
                .into_iter()
                .map(|m| m.parse())
                .collect::<Result<Vec<AbiType>, Error>>()?;
            return Ok(AbiType::Tuple(members));
        }
        parse_elementary(s)
    }
}

impl fmt::Display for AbiType {
    /// The canonical form used in signatures and EIP-712 type strings
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AbiType::Uint(bits) => write!(f, "uint{bits}"),
            AbiType::Int(bits) => write!(f, "int{bits}"),
            AbiType::Address => write!(f, "address"),
            AbiType::Bool => write!(f, "bool"),
            AbiType::FixedBytes(size) => write!(f, "bytes{size}"),
            AbiType::Bytes => write!(f, "bytes"),
            AbiType::String => write!(f, "string"),
            AbiType::Array(inner) => write!(f, "{inner}[]"),
            AbiType::FixedArray(inner, len) => write!(f, "{inner}[{len}]"),
            AbiType::Tuple(members) => {
                write!(f, "(")?;
                for (i, m) in members.iter().enumerate() {
                    if i != 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{m}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A typed slot in a parameter list, in the JSON ABI shape
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AbiParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<AbiParameter>>,
}

impl AbiParameter {
    pub fn new(kind: &str) -> AbiParameter {
        AbiParameter {
            name: None,
            kind: kind.to_string(),
            components: None,
        }
    }

    pub fn named(name: &str, kind: &str) -> AbiParameter {
        AbiParameter {
            name: Some(name.to_string()),
            kind: kind.to_string(),
            components: None,
        }
    }

    /// A `tuple` parameter, `kind` may carry array suffixes such as `tuple[]`
    pub fn tuple(kind: &str, components: Vec<AbiParameter>) -> AbiParameter {
        AbiParameter {
            name: None,
            kind: kind.to_string(),
            components: Some(components),
        }
    }

    /// Resolves the type string, taking tuple members from `components`
    pub fn abi_type(&self) -> Result<AbiType, Error> {
        match self.kind.strip_prefix("tuple") {
            Some(suffix) if !suffix.starts_with('(') => {
                let components = self
                    .components
                    .as_ref()
                    .ok_or_else(|| Error::UnsupportedAbiType(self.kind.clone()))?;
                let members = components
                    .iter()
                    .map(|c| c.abi_type())
                    .collect::<Result<Vec<AbiType>, Error>>()?;
                AbiType::Tuple(members).with_suffix(suffix)
            }
            _ => self.kind.parse(),
        }
    }
}
