//! EIP-712 typed structured data hashing
//!
//! The typed data is read from the JSON shape wallets exchange
//! (`eth_signTypedData_v4`), message values stay `serde_json::Value` and are
//! checked against their declared types while they are encoded.

use crate::abi::{fits_int, fits_uint, AbiType};
use crate::address::Address;
use crate::constants::EIP712_PREFIX;
use crate::error::Error;
use crate::signature::{verify, Signature};
use crate::utils::{bytes_to_data, hex_str_to_bytes, keccak256, right_pad_to_word, to_array};
use num256::Uint256;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

const DOMAIN_TYPE: &str = "EIP712Domain";

/// Struct definitions by type name
pub type Types = BTreeMap<String, Vec<TypedDataField>>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TypedDataField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TypedDataField {
    pub fn new(name: &str, kind: &str) -> TypedDataField {
        TypedDataField {
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }
}

/// The EIP-712 domain, every field is optional and only the present ones
/// take part in the domain separator
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_uint",
        deserialize_with = "deserialize_opt_uint"
    )]
    pub chain_id: Option<Uint256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<Address>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_word",
        deserialize_with = "deserialize_opt_word"
    )]
    pub salt: Option<[u8; 32]>,
}

fn serialize_opt_uint<S: Serializer>(v: &Option<Uint256>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(v) => s.serialize_str(&v.to_string()),
        None => s.serialize_none(),
    }
}

fn deserialize_opt_uint<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Uint256>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(v) => value_to_uint(&v).map(Some).map_err(serde::de::Error::custom),
    }
}

fn serialize_opt_word<S: Serializer>(v: &Option<[u8; 32]>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(v) => s.serialize_str(&bytes_to_data(v)),
        None => s.serialize_none(),
    }
}

fn deserialize_opt_word<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[u8; 32]>, D::Error> {
    match Option::<String>::deserialize(d)? {
        None => Ok(None),
        Some(s) => hex_str_to_bytes(&s)
            .and_then(|b| to_array(&b))
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl Eip712Domain {
    /// The `EIP712Domain` struct definition implied by the present fields
    pub fn fields(&self) -> Vec<TypedDataField> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push(TypedDataField::new("name", "string"));
        }
        if self.version.is_some() {
            fields.push(TypedDataField::new("version", "string"));
        }
        if self.chain_id.is_some() {
            fields.push(TypedDataField::new("chainId", "uint256"));
        }
        if self.verifying_contract.is_some() {
            fields.push(TypedDataField::new("verifyingContract", "address"));
        }
        if self.salt.is_some() {
            fields.push(TypedDataField::new("salt", "bytes32"));
        }
        fields
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(name) = &self.name {
            map.insert("name".into(), Value::String(name.clone()));
        }
        if let Some(version) = &self.version {
            map.insert("version".into(), Value::String(version.clone()));
        }
        if let Some(chain_id) = &self.chain_id {
            map.insert("chainId".into(), Value::String(chain_id.to_string()));
        }
        if let Some(contract) = &self.verifying_contract {
            map.insert("verifyingContract".into(), Value::String(contract.to_checksum()));
        }
        if let Some(salt) = &self.salt {
            map.insert("salt".into(), Value::String(bytes_to_data(salt)));
        }
        Value::Object(map)
    }
}

/// A complete `eth_signTypedData_v4` payload
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    pub types: Types,
    pub primary_type: String,
    #[serde(default)]
    pub domain: Eip712Domain,
    #[serde(default)]
    pub message: Value,
}

impl FromStr for TypedData {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}

fn invalid(reason: String) -> Error {
    debug!("Rejected typed data: {reason}");
    Error::InvalidTypedData(reason)
}

/// Strips array suffixes, `Person[][2]` becomes `Person`
fn base_type(kind: &str) -> &str {
    match kind.find('[') {
        Some(i) => &kind[..i],
        None => kind,
    }
}

fn collect_dependencies(kind: &str, types: &Types, found: &mut BTreeSet<String>) {
    let base = base_type(kind);
    if found.contains(base) {
        return;
    }
    if let Some(fields) = types.get(base) {
        found.insert(base.to_string());
        for field in fields {
            collect_dependencies(&field.kind, types, found);
        }
    }
}

/// `Primary(type name,...)` followed by every referenced struct sorted by name
pub fn encode_type(primary_type: &str, types: &Types) -> Result<String, Error> {
    if !types.contains_key(primary_type) {
        return Err(invalid(format!("unknown type {primary_type}")));
    }
    let mut deps = BTreeSet::new();
    collect_dependencies(primary_type, types, &mut deps);
    deps.remove(primary_type);

    let mut out = String::new();
    for name in std::iter::once(primary_type).chain(deps.iter().map(|d| d.as_str())) {
        let fields = types
            .get(name)
            .ok_or_else(|| invalid(format!("unknown type {name}")))?;
        let members: Vec<String> = fields
            .iter()
            .map(|f| format!("{} {}", f.kind, f.name))
            .collect();
        out.push_str(&format!("{}({})", name, members.join(",")));
    }
    Ok(out)
}

pub fn type_hash(primary_type: &str, types: &Types) -> Result<[u8; 32], Error> {
    let encoded = encode_type(primary_type, types)?;
    trace!("EIP-712 type {encoded}");
    Ok(keccak256(encoded.as_bytes()))
}

/// Reads an unsigned integer from a JSON number, a decimal string or a `0x` hex string
fn value_to_uint(value: &Value) -> Result<Uint256, Error> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(Uint256::from)
            .ok_or_else(|| invalid(format!("{n} is not an unsigned integer"))),
        Value::String(s) if s.starts_with("0x") => {
            let bytes = hex_str_to_bytes(s)?;
            if bytes.len() > 32 {
                return Err(invalid(format!("{s} does not fit in 256 bits")));
            }
            Ok(Uint256::from_be_bytes(&bytes))
        }
        Value::String(s) => {
            Uint256::from_str(s).map_err(|_| invalid(format!("{s} is not an unsigned integer")))
        }
        other => Err(invalid(format!("{other} is not an integer"))),
    }
}

/// Two's complement negation of a 256 bit word
fn negate(word: [u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry = true;
    for i in (0..32).rev() {
        let (byte, overflow) = (!word[i]).overflowing_add(carry as u8);
        out[i] = byte;
        carry = overflow;
    }
    out
}

/// Reads a signed integer as its 256 bit two's complement word
fn value_to_int_word(value: &Value) -> Result<[u8; 32], Error> {
    if let Value::Number(n) = value {
        if let Some(i) = n.as_i64() {
            let fill = if i < 0 { 0xff } else { 0x00 };
            let mut word = [fill; 32];
            word[24..].copy_from_slice(&i.to_be_bytes());
            return Ok(word);
        }
    }
    if let Value::String(s) = value {
        if let Some(magnitude) = s.strip_prefix('-') {
            let word = value_to_uint(&Value::String(magnitude.to_string()))?.to_be_bytes();
            // the most negative value is its own negation
            if word[0] & 0x80 != 0 && word[1..].iter().any(|b| *b != 0) {
                return Err(invalid(format!("{s} does not fit in 256 bits")));
            }
            return Ok(negate(word));
        }
    }
    let word = value_to_uint(value)?.to_be_bytes();
    if word[0] & 0x80 != 0 {
        return Err(invalid(format!("{value} does not fit in int256")));
    }
    Ok(word)
}

fn value_to_bytes(value: &Value) -> Result<Vec<u8>, Error> {
    match value {
        Value::String(s) => hex_str_to_bytes(s),
        other => Err(invalid(format!("{other} is not a hex string"))),
    }
}

/// Encodes an atomic value into its ABI word
fn encode_atomic(kind: &str, value: &Value) -> Result<[u8; 32], Error> {
    let abi_type: AbiType = kind.parse()?;
    let out_of_range = || Error::AbiValueOutOfRange {
        abi_type: kind.to_string(),
    };
    match abi_type {
        AbiType::Address => match value {
            Value::String(s) => Ok(s.parse::<Address>()?.to_word()),
            other => Err(invalid(format!("{other} is not an address"))),
        },
        AbiType::Bool => match value {
            Value::Bool(b) => {
                let mut word = [0u8; 32];
                word[31] = *b as u8;
                Ok(word)
            }
            other => Err(invalid(format!("{other} is not a bool"))),
        },
        AbiType::Uint(bits) => {
            let word = value_to_uint(value)?.to_be_bytes();
            if !fits_uint(&word, bits) {
                return Err(out_of_range());
            }
            Ok(word)
        }
        AbiType::Int(bits) => {
            let word = value_to_int_word(value)?;
            if !fits_int(&word, bits) {
                return Err(out_of_range());
            }
            Ok(word)
        }
        AbiType::FixedBytes(size) => {
            let bytes = value_to_bytes(value)?;
            if bytes.len() != size {
                return Err(Error::AbiBytesSizeMismatch {
                    expected: size,
                    got: bytes.len(),
                });
            }
            to_array(&right_pad_to_word(&bytes))
        }
        _ => Err(Error::UnsupportedAbiType(kind.to_string())),
    }
}

/// The 32 byte value a single field contributes to `encodeData`
fn encode_field(kind: &str, value: &Value, types: &Types) -> Result<[u8; 32], Error> {
    if types.contains_key(kind) {
        if value.is_null() {
            return Ok([0u8; 32]);
        }
        return hash_struct(kind, value, types);
    }
    if kind.ends_with(']') {
        let open = kind
            .rfind('[')
            .ok_or_else(|| Error::UnsupportedAbiType(kind.to_string()))?;
        let inner = &kind[..open];
        let size = &kind[open + 1..kind.len() - 1];
        let items = value
            .as_array()
            .ok_or_else(|| invalid(format!("{kind} value is not an array")))?;
        if !size.is_empty() {
            let expected: usize = size
                .parse()
                .map_err(|_| Error::UnsupportedAbiType(kind.to_string()))?;
            if items.len() != expected {
                return Err(Error::AbiLengthMismatch {
                    expected,
                    got: items.len(),
                });
            }
        }
        let mut encoded = Vec::with_capacity(items.len() * 32);
        for item in items {
            encoded.extend_from_slice(&encode_field(inner, item, types)?);
        }
        return Ok(keccak256(&encoded));
    }
    match kind {
        "string" => match value {
            Value::String(s) => Ok(keccak256(s.as_bytes())),
            other => Err(invalid(format!("{other} is not a string"))),
        },
        "bytes" => Ok(keccak256(&value_to_bytes(value)?)),
        _ => encode_atomic(kind, value),
    }
}

/// `typeHash ++ encodeData(value)` for a struct
pub fn encode_data(primary_type: &str, data: &Value, types: &Types) -> Result<Vec<u8>, Error> {
    let fields = types
        .get(primary_type)
        .ok_or_else(|| invalid(format!("unknown type {primary_type}")))?;
    let object = data
        .as_object()
        .ok_or_else(|| invalid(format!("{primary_type} value is not an object")))?;
    let mut out = Vec::with_capacity(32 * (fields.len() + 1));
    out.extend_from_slice(&type_hash(primary_type, types)?);
    for field in fields {
        let value = object
            .get(&field.name)
            .ok_or_else(|| Error::TypedDataMissingField {
                struct_name: primary_type.to_string(),
                field: field.name.clone(),
            })?;
        out.extend_from_slice(&encode_field(&field.kind, value, types)?);
    }
    Ok(out)
}

pub fn hash_struct(primary_type: &str, data: &Value, types: &Types) -> Result<[u8; 32], Error> {
    Ok(keccak256(&encode_data(primary_type, data, types)?))
}

/// Types with the `EIP712Domain` definition filled in from the domain when
/// the payload does not declare it
fn types_with_domain(typed_data: &TypedData) -> Types {
    let mut types = typed_data.types.clone();
    types
        .entry(DOMAIN_TYPE.to_string())
        .or_insert_with(|| typed_data.domain.fields());
    types
}

/// The domain separator
pub fn hash_domain(typed_data: &TypedData) -> Result<[u8; 32], Error> {
    let types = types_with_domain(typed_data);
    hash_struct(DOMAIN_TYPE, &typed_data.domain.to_value(), &types)
}

/// `keccak256(0x1901 ++ domainSeparator ++ hashStruct(message))`, the struct
/// hash is left out when the primary type is the domain itself
pub fn hash_typed_data(typed_data: &TypedData) -> Result<[u8; 32], Error> {
    let types = types_with_domain(typed_data);
    let domain_separator = hash_struct(DOMAIN_TYPE, &typed_data.domain.to_value(), &types)?;
    let mut data = Vec::with_capacity(66);
    data.extend_from_slice(&EIP712_PREFIX);
    data.extend_from_slice(&domain_separator);
    if typed_data.primary_type != DOMAIN_TYPE {
        data.extend_from_slice(&hash_struct(
            &typed_data.primary_type,
            &typed_data.message,
            &types,
        )?);
    }
    Ok(keccak256(&data))
}

/// True when `signature` over the typed data digest was produced by `address`
pub fn verify_typed_data(
    address: &Address,
    typed_data: &TypedData,
    signature: &Signature,
) -> Result<bool, Error> {
    Ok(verify(address, &hash_typed_data(typed_data)?, signature))
}
