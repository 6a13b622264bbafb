use crate::utils::bytes_to_hex_str;
use num256::Uint256;
use std::fmt;
use std::num::ParseIntError;
use std::str::Utf8Error;

/// Coarse classification of every [`Error`], lets callers branch on the
/// category of a failure without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A length did not match what the encoding requires
    DataSize,
    /// Bytes or text that are not a valid (canonical) encoding
    InvalidFormat,
    /// An ABI type name or transaction type byte this crate does not know
    UnsupportedType,
    /// Malformed signature or failed public key recovery
    SignatureInvalid,
    /// A chain id that differs from the one expected
    ChainMismatch,
    /// `max_fee_per_gas` below `max_priority_fee_per_gas`
    FeeCapTooLow,
    /// Transaction fields belonging to more than one transaction type
    AmbiguousTransactionType,
}

/// Custom error implementation that describes possible
/// error states.
///
/// This is shared by a whole crate.
#[derive(Debug)]
pub enum Error {
    InvalidHex(ParseIntError),
    InvalidUtf8(Utf8Error),
    InvalidAddressLength {
        got: usize,
        expected: usize,
    },
    InvalidEip55,
    InvalidPrivKeyLength {
        got: usize,
        expected: usize,
    },
    DecodePrivKey(secp256k1::Error),
    ZeroPrivKey,
    InvalidHashLength {
        got: usize,
    },
    InvalidSignatureLength {
        got: usize,
    },
    InvalidV,
    InvalidR,
    InvalidS,
    ParseRecoverableSignature(secp256k1::Error),
    RecoverSignature(secp256k1::Error),
    NoSignature,
    /// Input ended before the item it announced
    RlpTruncated {
        needed: usize,
        available: usize,
    },
    /// A list where a string was expected or the other way around
    DeserializeRlp,
    NonCanonicalRlp,
    TrailingRlpBytes {
        remaining: usize,
    },
    NonCanonicalInteger,
    RlpIntegerTooLarge {
        got: usize,
        max: usize,
    },
    UnsupportedAbiType(String),
    InvalidAbiSignature(String),
    AbiZeroData,
    AbiDataSizeTooSmall {
        expected: usize,
        got: usize,
    },
    AbiOffsetOutOfBounds {
        offset: usize,
        len: usize,
    },
    AbiLengthMismatch {
        expected: usize,
        got: usize,
    },
    AbiBytesSizeMismatch {
        expected: usize,
        got: usize,
    },
    AbiTypeMismatch {
        expected: String,
    },
    AbiValueOutOfRange {
        abi_type: String,
    },
    /// No candidate signature has this four byte selector
    AbiSelectorNotFound {
        selector: [u8; 4],
    },
    /// The first log topic is missing or is not the event signature
    AbiEventSignatureMismatch {
        expected: [u8; 32],
    },
    AbiTopicsMismatch {
        expected: usize,
        got: usize,
    },
    /// Deploy data does not start with the expected creation code
    AbiBytecodeMismatch,
    InvalidTypedData(String),
    TypedDataMissingField {
        struct_name: String,
        field: String,
    },
    Json(serde_json::Error),
    UnknownTxType(u8),
    TxFieldCount {
        tx_type: &'static str,
        expected: &'static [usize],
        got: usize,
    },
    MissingField {
        tx_type: &'static str,
        field: &'static str,
    },
    InvalidNetworkId,
    ChainMismatch {
        expected: Uint256,
        got: Uint256,
    },
    FeeCapTooLow {
        max_fee_per_gas: Uint256,
        max_priority_fee_per_gas: Uint256,
    },
    AmbiguousTransactionType {
        fields: Vec<&'static str>,
    },
    FeeOverflow {
        field: &'static str,
    },
    InvalidVersionedHash {
        index: usize,
        version: u8,
    },
    EmptyBlobData,
    BlobSizeTooLarge {
        max: usize,
        got: usize,
    },
    InvalidBlobLength {
        got: usize,
    },
    InvalidBlobFieldElement {
        blob: usize,
        element: usize,
    },
    BlobLengthHeader {
        declared: u64,
        available: usize,
    },
    Kzg(String),
    InvalidWrappedSignature(&'static str),
    ChainSerializer(String),
}

impl Error {
    /// Maps this error onto its [`ErrorKind`]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAddressLength { .. }
            | Error::InvalidPrivKeyLength { .. }
            | Error::InvalidHashLength { .. }
            | Error::RlpTruncated { .. }
            | Error::TrailingRlpBytes { .. }
            | Error::RlpIntegerTooLarge { .. }
            | Error::AbiZeroData
            | Error::AbiDataSizeTooSmall { .. }
            | Error::AbiOffsetOutOfBounds { .. }
            | Error::AbiLengthMismatch { .. }
            | Error::AbiBytesSizeMismatch { .. }
            | Error::AbiTopicsMismatch { .. }
            | Error::TxFieldCount { .. }
            | Error::EmptyBlobData
            | Error::BlobSizeTooLarge { .. }
            | Error::InvalidBlobLength { .. }
            | Error::BlobLengthHeader { .. } => ErrorKind::DataSize,
            Error::InvalidHex(_)
            | Error::InvalidUtf8(_)
            | Error::InvalidEip55
            | Error::DecodePrivKey(_)
            | Error::ZeroPrivKey
            | Error::DeserializeRlp
            | Error::NonCanonicalRlp
            | Error::NonCanonicalInteger
            | Error::InvalidAbiSignature(_)
            | Error::AbiTypeMismatch { .. }
            | Error::AbiValueOutOfRange { .. }
            | Error::AbiSelectorNotFound { .. }
            | Error::AbiEventSignatureMismatch { .. }
            | Error::AbiBytecodeMismatch
            | Error::InvalidTypedData(_)
            | Error::TypedDataMissingField { .. }
            | Error::Json(_)
            | Error::MissingField { .. }
            | Error::FeeOverflow { .. }
            | Error::InvalidVersionedHash { .. }
            | Error::InvalidBlobFieldElement { .. }
            | Error::Kzg(_)
            | Error::InvalidWrappedSignature(_)
            | Error::ChainSerializer(_) => ErrorKind::InvalidFormat,
            Error::UnsupportedAbiType(_) | Error::UnknownTxType(_) => ErrorKind::UnsupportedType,
            Error::InvalidSignatureLength { .. }
            | Error::InvalidV
            | Error::InvalidR
            | Error::InvalidS
            | Error::ParseRecoverableSignature(_)
            | Error::RecoverSignature(_)
            | Error::NoSignature => ErrorKind::SignatureInvalid,
            Error::InvalidNetworkId | Error::ChainMismatch { .. } => ErrorKind::ChainMismatch,
            Error::FeeCapTooLow { .. } => ErrorKind::FeeCapTooLow,
            Error::AmbiguousTransactionType { .. } => ErrorKind::AmbiguousTransactionType,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHex(_) => write!(f, "Invalid hex character"),
            Error::InvalidUtf8(_) => write!(f, "Failed to parse bytes as utf8"),
            Error::InvalidAddressLength { got, expected } => {
                write!(f, "Invalid address length, got {got}, expected {expected}")
            }
            Error::InvalidEip55 => write!(f, "Invalid EIP-55 Address encoding"),
            Error::InvalidPrivKeyLength { got, expected } => write!(
                f,
                "Invalid private key length, got {got} expected {expected}"
            ),
            Error::DecodePrivKey(_) => write!(f, "Failed to decode private key"),
            Error::ZeroPrivKey => write!(f, "Zero priv key cannot sign"),
            Error::InvalidHashLength { got } => {
                write!(f, "Signing digest must be 32 bytes, got {got}")
            }
            Error::InvalidSignatureLength { got } => {
                write!(f, "Signature should be exactly 65 bytes long, got {got}")
            }
            Error::InvalidV => write!(f, "Invalid V value"),
            Error::InvalidR => write!(f, "Invalid R value"),
            Error::InvalidS => write!(f, "Invalid S value"),
            Error::ParseRecoverableSignature(_) => {
                write!(f, "Failed to parse recoverable signature")
            }
            Error::RecoverSignature(_) => write!(f, "Failed to recover signature"),
            Error::NoSignature => write!(f, "This transaction does not have a signature attached"),
            Error::RlpTruncated { needed, available } => write!(
                f,
                "RLP item needs {needed} bytes but only {available} are available"
            ),
            Error::DeserializeRlp => write!(f, "failed to deserialize using RLP-encoding"),
            Error::NonCanonicalRlp => write!(f, "RLP input is not canonically encoded"),
            Error::TrailingRlpBytes { remaining } => {
                write!(f, "{remaining} unexpected bytes after RLP item")
            }
            Error::NonCanonicalInteger => write!(f, "RLP integer has leading zero bytes"),
            Error::RlpIntegerTooLarge { got, max } => {
                write!(f, "RLP integer is {got} bytes, at most {max} allowed")
            }
            Error::UnsupportedAbiType(t) => write!(f, "Unsupported ABI type {t}"),
            Error::InvalidAbiSignature(s) => write!(f, "Invalid function or event signature {s}"),
            Error::AbiZeroData => write!(f, "Cannot decode zero data (\"0x\") with ABI parameters"),
            Error::AbiDataSizeTooSmall { expected, got } => write!(
                f,
                "ABI data too small, needs at least {expected} bytes, got {got}"
            ),
            Error::AbiOffsetOutOfBounds { offset, len } => write!(
                f,
                "ABI offset {offset} is out of bounds for data of length {len}"
            ),
            Error::AbiLengthMismatch { expected, got } => {
                write!(f, "ABI length mismatch, expected {expected} got {got}")
            }
            Error::AbiBytesSizeMismatch { expected, got } => write!(
                f,
                "Fixed bytes size mismatch, expected bytes{expected} got {got} bytes"
            ),
            Error::AbiTypeMismatch { expected } => {
                write!(f, "ABI value does not match type {expected}")
            }
            Error::AbiValueOutOfRange { abi_type } => {
                write!(f, "Value out of range for ABI type {abi_type}")
            }
            Error::AbiSelectorNotFound { selector } => write!(
                f,
                "No signature matches selector 0x{}",
                bytes_to_hex_str(selector)
            ),
            Error::AbiEventSignatureMismatch { expected } => write!(
                f,
                "First log topic is not the event signature 0x{}",
                bytes_to_hex_str(expected)
            ),
            Error::AbiTopicsMismatch { expected, got } => {
                write!(f, "Event has {expected} indexed inputs but the log has {got} topics for them")
            }
            Error::AbiBytecodeMismatch => write!(f, "Deploy data does not start with the bytecode"),
            Error::InvalidTypedData(reason) => write!(f, "Invalid EIP-712 typed data: {reason}"),
            Error::TypedDataMissingField { struct_name, field } => {
                write!(f, "Typed data struct {struct_name} is missing field {field}")
            }
            Error::Json(e) => write!(f, "Invalid JSON value {e}"),
            Error::UnknownTxType(t) => write!(f, "Unknown transaction type {t:#04x}"),
            Error::TxFieldCount {
                tx_type,
                expected,
                got,
            } => write!(
                f,
                "{tx_type} transaction has {got} fields, expected one of {expected:?}"
            ),
            Error::MissingField { tx_type, field } => {
                write!(f, "{tx_type} transaction requires field {field}")
            }
            Error::InvalidNetworkId => write!(f, "Invalid network id"),
            Error::ChainMismatch { expected, got } => {
                write!(f, "Chain id mismatch, expected {expected} got {got}")
            }
            Error::FeeCapTooLow {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => write!(
                f,
                "max_fee_per_gas {max_fee_per_gas} is lower than max_priority_fee_per_gas {max_priority_fee_per_gas}"
            ),
            Error::AmbiguousTransactionType { fields } => write!(
                f,
                "Fields {fields:?} belong to different transaction types"
            ),
            Error::FeeOverflow { field } => {
                write!(f, "{field} times the gas limit does not fit in 256 bits")
            }
            Error::InvalidVersionedHash { index, version } => write!(
                f,
                "Blob versioned hash {index} has version {version:#04x}, expected 0x01"
            ),
            Error::EmptyBlobData => write!(f, "Blob data is empty"),
            Error::BlobSizeTooLarge { max, got } => {
                write!(f, "Blob data is {got} bytes, at most {max} fit in a transaction")
            }
            Error::InvalidBlobLength { got } => write!(f, "Blob has invalid length {got}"),
            Error::InvalidBlobFieldElement { blob, element } => write!(
                f,
                "Field element {element} of blob {blob} is outside the scalar field"
            ),
            Error::BlobLengthHeader {
                declared,
                available,
            } => write!(
                f,
                "Blob header declares {declared} bytes but only {available} are present"
            ),
            Error::Kzg(e) => write!(f, "KZG backend error: {e}"),
            Error::InvalidWrappedSignature(reason) => {
                write!(f, "Invalid wrapped signature: {reason}")
            }
            Error::ChainSerializer(e) => write!(f, "Chain serializer error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DecodePrivKey(inner) => Some(inner),
            Error::ParseRecoverableSignature(inner) => Some(inner),
            Error::RecoverSignature(inner) => Some(inner),
            Error::InvalidHex(inner) => Some(inner),
            Error::InvalidUtf8(inner) => Some(inner),
            Error::Json(inner) => Some(inner),
            _ => None,
        }
    }
}

impl From<Utf8Error> for Error {
    fn from(e: Utf8Error) -> Self {
        Error::InvalidUtf8(e)
    }
}

impl From<ParseIntError> for Error {
    fn from(e: ParseIntError) -> Self {
        Error::InvalidHex(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

#[test]
fn kinds_are_stable() {
    assert_eq!(Error::AbiZeroData.kind(), ErrorKind::DataSize);
    assert_eq!(Error::NonCanonicalRlp.kind(), ErrorKind::InvalidFormat);
    assert_eq!(Error::UnknownTxType(0x05).kind(), ErrorKind::UnsupportedType);
    assert_eq!(
        Error::InvalidSignatureLength { got: 64 }.kind(),
        ErrorKind::SignatureInvalid
    );
    assert_eq!(
        Error::FeeCapTooLow {
            max_fee_per_gas: 1u8.into(),
            max_priority_fee_per_gas: 2u8.into()
        }
        .kind(),
        ErrorKind::FeeCapTooLow
    );
    assert_eq!(
        Error::AmbiguousTransactionType {
            fields: vec!["gas_price", "max_fee_per_gas"]
        }
        .kind(),
        ErrorKind::AmbiguousTransactionType
    );
}

#[test]
fn display_carries_context() {
    let e = Error::TxFieldCount {
        tx_type: "eip1559",
        expected: &[9, 12],
        got: 4,
    };
    assert_eq!(
        e.to_string(),
        "eip1559 transaction has 4 fields, expected one of [9, 12]"
    );
    assert_eq!(
        Error::UnknownTxType(0x7f).to_string(),
        "Unknown transaction type 0x7f"
    );
}
