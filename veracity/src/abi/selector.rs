use super::types::{matching_paren, split_top_level, AbiType};
use crate::error::Error;
use crate::utils::keccak256;

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Pulls the type out of a parameter declaration such as
/// `(uint256,address)[] calldata orders` or `address indexed from`
fn parameter_type(param: &str) -> Result<AbiType, Error> {
    let param = param.trim();
    let invalid = || Error::InvalidAbiSignature(param.to_string());
    let body = param.strip_prefix("tuple").unwrap_or(param);
    if !body.starts_with('(') {
        let type_str = param.split_whitespace().next().ok_or_else(invalid)?;
        return type_str.parse();
    }
    let close = matching_paren(body, 0).ok_or_else(invalid)?;
    let inside = &body[1..close];
    let mut members = Vec::new();
    if !inside.trim().is_empty() {
        for member in split_top_level(inside)? {
            members.push(parameter_type(member)?);
        }
    }
    // array suffixes directly follow the closing parenthesis
    let after = &body[close + 1..];
    let suffix_len = after
        .find(|c: char| !(c == '[' || c == ']' || c.is_ascii_digit()))
        .unwrap_or(after.len());
    AbiType::Tuple(members).with_suffix(&after[..suffix_len])
}

/// A function, event or error definition reduced to its types
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AbiItem {
    pub(crate) name: String,
    pub(crate) inputs: Vec<AbiType>,
    /// Parallel to `inputs`, true for `indexed` event parameters
    pub(crate) indexed: Vec<bool>,
    /// Types after `returns`, empty when there is no return clause
    pub(crate) outputs: Vec<AbiType>,
}

impl AbiItem {
    pub(crate) fn canonical(&self) -> String {
        let types: Vec<String> = self.inputs.iter().map(|t| t.to_string()).collect();
        format!("{}({})", self.name, types.join(","))
    }
}

/// The words of a declaration that follow its type
fn declaration_rest(param: &str) -> &str {
    let body = param.strip_prefix("tuple").unwrap_or(param);
    if body.starts_with('(') {
        match matching_paren(body, 0) {
            Some(close) => &body[close + 1..],
            None => "",
        }
    } else {
        param.split_once(char::is_whitespace).map_or("", |(_, rest)| rest)
    }
}

fn parameter_list(inside: &str) -> Result<Vec<&str>, Error> {
    if inside.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_top_level(inside)
}

/// Parses a bare signature such as `transfer(address,uint256)` or a full
/// definition like `function balanceOf(address owner) view returns (uint256)`
pub(crate) fn parse_item(sig: &str) -> Result<AbiItem, Error> {
    let invalid = || Error::InvalidAbiSignature(sig.to_string());
    let mut s = sig.trim();
    for keyword in ["function ", "event ", "error "] {
        if let Some(rest) = s.strip_prefix(keyword) {
            s = rest.trim_start();
        }
    }
    let open = s.find('(').ok_or_else(invalid)?;
    let name = s[..open].trim();
    if !is_identifier(name) {
        return Err(invalid());
    }
    let close = matching_paren(s, open).ok_or_else(invalid)?;
    let mut inputs = Vec::new();
    let mut indexed = Vec::new();
    for param in parameter_list(&s[open + 1..close]).map_err(|_| invalid())? {
        inputs.push(parameter_type(param)?);
        indexed.push(
            declaration_rest(param.trim())
                .split_whitespace()
                .any(|word| word == "indexed"),
        );
    }

    let mut outputs = Vec::new();
    let modifiers = &s[close + 1..];
    if let Some(pos) = modifiers.find("returns") {
        let returns = modifiers[pos + "returns".len()..].trim_start();
        if !returns.starts_with('(') {
            return Err(invalid());
        }
        let end = matching_paren(returns, 0).ok_or_else(invalid)?;
        for param in parameter_list(&returns[1..end]).map_err(|_| invalid())? {
            outputs.push(parameter_type(param)?);
        }
    }
    Ok(AbiItem {
        name: name.to_string(),
        inputs,
        indexed,
        outputs,
    })
}

/// Reduces a signature or a full definition to the canonical `name(type1,type2)` form.
///
/// Parameter names, `indexed`, data locations, visibility, return values and
/// whitespace are dropped, `uint`/`int` become `uint256`/`int256` and tuples are
/// written out positionally.
pub fn canonical_signature(sig: &str) -> Result<String, Error> {
    Ok(parse_item(sig)?.canonical())
}

/// Computes the four byte function selector, the first 4 bytes of the
/// keccak256 of the canonical signature
///
/// ```rust
/// use veracity::abi::derive_method_id;
/// assert_eq!(derive_method_id("transfer(address,uint256)").unwrap(), [0xa9, 0x05, 0x9c, 0xbb]);
/// ```
pub fn derive_method_id(sig: &str) -> Result<[u8; 4], Error> {
    let digest = derive_signature(sig)?;
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    Ok(out)
}

/// Computes the full 32 byte keccak256 of the canonical signature, for events
/// this is the first log topic
pub fn derive_signature(sig: &str) -> Result<[u8; 32], Error> {
    let canonical = canonical_signature(sig)?;
    trace!("Canonical signature {canonical}");
    Ok(keccak256(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bytes_to_hex_str;

    #[test]
    fn simple_selectors() {
        assert_eq!(
            bytes_to_hex_str(&derive_method_id("transfer(address,uint256)").unwrap()),
            "a9059cbb"
        );
        assert_eq!(
            bytes_to_hex_str(&derive_method_id("balanceOf(address)").unwrap()),
            "70a08231"
        );
        assert_eq!(
            bytes_to_hex_str(&derive_method_id("totalSupply()").unwrap()),
            "18160ddd"
        );
        assert_eq!(
            bytes_to_hex_str(&derive_method_id("approve(address,uint256)").unwrap()),
            "095ea7b3"
        );
    }

    #[test]
    fn definitions_are_canonicalized() {
        assert_eq!(
            canonical_signature(
                "function transfer(address to, uint amount) external returns (bool)"
            )
            .unwrap(),
            "transfer(address,uint256)"
        );
        assert_eq!(
            derive_method_id("function  transfer( address  to ,uint256 amount )").unwrap(),
            derive_method_id("transfer(address,uint256)").unwrap()
        );
        assert_eq!(
            canonical_signature(
                "function fill((address maker, uint256[] amounts) calldata order, bytes memory sig)"
            )
            .unwrap(),
            "fill((address,uint256[]),bytes)"
        );
        assert_eq!(
            canonical_signature("batch(tuple(uint8,string)[2] items)").unwrap(),
            "batch((uint8,string)[2])"
        );
    }

    #[test]
    fn event_topic() {
        assert_eq!(
            bytes_to_hex_str(
                &derive_signature(
                    "event Transfer(address indexed from, address indexed to, uint256 value)"
                )
                .unwrap()
            ),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn definitions_keep_indexed_and_returns() {
        let item = parse_item(
            "event Swap(address indexed sender, (uint256 a, bool b) indexed pair, string memo)",
        )
        .unwrap();
        assert_eq!(item.name, "Swap");
        assert_eq!(item.indexed, vec![true, true, false]);
        assert!(item.outputs.is_empty());

        let item =
            parse_item("function getReserves() external view returns (uint112 r0, uint112, uint32)")
                .unwrap();
        assert!(item.inputs.is_empty());
        assert_eq!(
            item.outputs,
            vec![AbiType::Uint(112), AbiType::Uint(112), AbiType::Uint(32)]
        );

        let item = parse_item("constructor(address owner, uint256 supply)").unwrap();
        assert_eq!(item.canonical(), "constructor(address,uint256)");
        assert!(parse_item("function f() returns bool").is_err());
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["transfer", "(address)", "1abc(uint256)", "f(uint7)", "f(address"] {
            assert!(canonical_signature(bad).is_err(), "{bad}");
        }
    }
}
