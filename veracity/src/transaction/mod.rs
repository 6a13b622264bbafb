//! Typed transaction envelopes, legacy through EIP-7702
//!
//! Every envelope is `typeByte ++ rlp(fields)` except legacy transactions
//! which are a bare RLP list, so their first byte is always at least `0xc0`.
//! Decoding dispatches on that first byte through a static envelope table.

mod authorization;
mod chain;
mod request;

pub use authorization::{Authorization, SignedAuthorization};
pub use chain::{
    CeloFeeCurrencySerializer, Chain, ChainSerializer, ChainTransaction, DepositTransaction,
    OpDepositSerializer, CELO_CIP64_TX_TYPE, OP_DEPOSIT_TX_TYPE,
};
pub use request::TransactionRequest;

use crate::address::Address;
use crate::blob::BlobSidecars;
use crate::constants::{
    EIP1559_TX_TYPE, EIP2930_TX_TYPE, EIP4844_TX_TYPE, EIP7702_TX_TYPE, LEGACY_TX_MIN_PREFIX,
    MAX_CHAIN_ID, VERSIONED_HASH_VERSION_KZG,
};
use crate::error::Error;
use crate::private_key::PrivateKey;
use crate::rlp::{decode_rlp, encode_rlp, RlpToken};
use crate::signature::Signature;
use crate::utils::{bytes_to_data, bytes_to_hex_str, hex_str_to_bytes, keccak256, to_array};
use authorization::{authorization_list_from_rlp, authorization_list_to_rlp};
use num256::Uint256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display};

/// Storage slots of one contract that the transaction declares it will touch
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct AccessListItem {
    pub address: Address,
    #[serde(serialize_with = "serialize_words", deserialize_with = "deserialize_words")]
    pub storage_keys: Vec<[u8; 32]>,
}

fn serialize_words<S: Serializer>(words: &[[u8; 32]], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(words.iter().map(|w| bytes_to_data(w)))
}

fn deserialize_words<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<[u8; 32]>, D::Error> {
    Vec::<String>::deserialize(d)?
        .iter()
        .map(|s| hex_str_to_bytes(s).and_then(|b| to_array(&b)))
        .collect::<Result<_, _>>()
        .map_err(serde::de::Error::custom)
}

impl AccessListItem {
    fn to_rlp(&self) -> RlpToken {
        RlpToken::List(vec![
            self.address.into(),
            RlpToken::List(
                self.storage_keys
                    .iter()
                    .map(|k| k.as_slice().into())
                    .collect(),
            ),
        ])
    }

    fn from_rlp(token: &RlpToken) -> Result<AccessListItem, Error> {
        let pair = token.as_list()?;
        if pair.len() != 2 {
            return Err(Error::DeserializeRlp);
        }
        let storage_keys = pair[1]
            .as_list()?
            .iter()
            .map(|key| to_array(key.as_bytes()?))
            .collect::<Result<_, _>>()?;
        Ok(AccessListItem {
            address: Address::from_rlp_data(&pair[0])?,
            storage_keys,
        })
    }
}

fn access_list_to_rlp(list: &[AccessListItem]) -> RlpToken {
    RlpToken::List(list.iter().map(|item| item.to_rlp()).collect())
}

fn words_to_rlp(words: &[[u8; 32]]) -> RlpToken {
    RlpToken::List(words.iter().map(|w| w.as_slice().into()).collect())
}

fn to_to_rlp(to: &Option<Address>) -> RlpToken {
    match to {
        Some(address) => address.into(),
        None => RlpToken::empty(),
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Legacy,
    Eip2930,
    Eip1559,
    Eip4844,
    Eip7702,
}

impl TransactionType {
    /// The EIP-2718 type byte, legacy transactions have none
    pub fn type_byte(&self) -> Option<u8> {
        match self {
            TransactionType::Legacy => None,
            TransactionType::Eip2930 => Some(EIP2930_TX_TYPE),
            TransactionType::Eip1559 => Some(EIP1559_TX_TYPE),
            TransactionType::Eip4844 => Some(EIP4844_TX_TYPE),
            TransactionType::Eip7702 => Some(EIP7702_TX_TYPE),
        }
    }

    pub fn from_type_byte(byte: u8) -> Result<TransactionType, Error> {
        ENVELOPES
            .iter()
            .find(|e| e.tx_type.type_byte() == Some(byte))
            .map(|e| e.tx_type)
            .ok_or_else(|| {
                debug!("Unknown transaction type byte {byte:#04x}");
                Error::UnknownTxType(byte)
            })
    }

    pub fn name(&self) -> &'static str {
        self.envelope().name
    }

    fn envelope(&self) -> &'static Envelope {
        match self {
            TransactionType::Legacy => &ENVELOPES[0],
            TransactionType::Eip2930 => &ENVELOPES[1],
            TransactionType::Eip1559 => &ENVELOPES[2],
            TransactionType::Eip4844 => &ENVELOPES[3],
            TransactionType::Eip7702 => &ENVELOPES[4],
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Codec rules for one envelope, `field_counts` holds the unsigned and
/// signed list lengths. `check` enforces the field rules that hold before
/// the envelope is serialized and after it is decoded.
struct Envelope {
    tx_type: TransactionType,
    name: &'static str,
    field_counts: [usize; 2],
    parse: fn(&mut Fields) -> Result<Transaction, Error>,
    check: fn(&Transaction) -> Result<(), Error>,
}

static ENVELOPES: [Envelope; 5] = [
    Envelope {
        tx_type: TransactionType::Legacy,
        name: "legacy",
        field_counts: [6, 9],
        parse: parse_legacy,
        check: check_legacy,
    },
    Envelope {
        tx_type: TransactionType::Eip2930,
        name: "eip2930",
        field_counts: [8, 11],
        parse: parse_eip2930,
        check: check_access_list,
    },
    Envelope {
        tx_type: TransactionType::Eip1559,
        name: "eip1559",
        field_counts: [9, 12],
        parse: parse_eip1559,
        check: check_fee_market,
    },
    Envelope {
        tx_type: TransactionType::Eip4844,
        name: "eip4844",
        field_counts: [11, 14],
        parse: parse_eip4844,
        check: check_blob,
    },
    Envelope {
        tx_type: TransactionType::Eip7702,
        name: "eip7702",
        field_counts: [10, 13],
        parse: parse_eip7702,
        check: check_set_code,
    },
];

impl Envelope {
    fn decode(&'static self, token: &RlpToken) -> Result<Transaction, Error> {
        let items = token.as_list()?;
        if !self.field_counts.contains(&items.len()) {
            debug!("{} list with {} fields", self.name, items.len());
            return Err(Error::TxFieldCount {
                tx_type: self.name,
                expected: &self.field_counts,
                got: items.len(),
            });
        }
        let mut fields = Fields {
            tx_type: self.name,
            items: items.iter(),
        };
        let tx = (self.parse)(&mut fields)?;
        (self.check)(&tx)?;
        Ok(tx)
    }
}

/// Cursor over the decoded fields of one envelope
struct Fields<'a> {
    tx_type: &'static str,
    items: std::slice::Iter<'a, RlpToken>,
}

impl<'a> Fields<'a> {
    fn next(&mut self, field: &'static str) -> Result<&'a RlpToken, Error> {
        self.items.next().ok_or(Error::MissingField {
            tx_type: self.tx_type,
            field,
        })
    }

    fn uint(&mut self, field: &'static str) -> Result<Uint256, Error> {
        self.next(field)?.to_uint()
    }

    fn bytes(&mut self, field: &'static str) -> Result<Vec<u8>, Error> {
        self.next(field)?.get_byte_content()
    }

    fn address(&mut self, field: &'static str) -> Result<Address, Error> {
        Address::from_rlp_data(self.next(field)?)
    }

    /// The empty string is contract creation
    fn to(&mut self) -> Result<Option<Address>, Error> {
        let bytes = self.next("to")?.as_bytes()?;
        if bytes.is_empty() {
            Ok(None)
        } else {
            Address::from_slice(bytes).map(Some)
        }
    }

    fn access_list(&mut self) -> Result<Vec<AccessListItem>, Error> {
        self.next("access_list")?
            .as_list()?
            .iter()
            .map(AccessListItem::from_rlp)
            .collect()
    }

    fn words(&mut self, field: &'static str) -> Result<Vec<[u8; 32]>, Error> {
        self.next(field)?
            .as_list()?
            .iter()
            .map(|w| to_array(w.as_bytes()?))
            .collect()
    }

    fn authorization_list(&mut self) -> Result<Vec<SignedAuthorization>, Error> {
        authorization_list_from_rlp(self.next("authorization_list")?)
    }

    /// Trailing `[yParity, r, s]` of a typed envelope, if present
    fn signature(&mut self) -> Result<Option<Signature>, Error> {
        if self.items.len() == 0 {
            return Ok(None);
        }
        let y_parity = match self.next("y_parity")?.to_u64()? {
            0 => false,
            1 => true,
            _ => return Err(Error::InvalidV),
        };
        Ok(Some(Signature::new(
            y_parity,
            self.uint("r")?,
            self.uint("s")?,
        )))
    }
}

fn parse_legacy(f: &mut Fields) -> Result<Transaction, Error> {
    let nonce = f.uint("nonce")?;
    let gas_price = f.uint("gas_price")?;
    let gas_limit = f.uint("gas_limit")?;
    let to = f.to()?;
    let value = f.uint("value")?;
    let data = f.bytes("data")?;
    let (chain_id, signature) = if f.items.len() == 0 {
        (None, None)
    } else {
        let v = f.uint("v")?;
        let r = f.next("r")?;
        let s = f.next("s")?;
        if r.as_bytes()?.is_empty() && s.as_bytes()?.is_empty() {
            // unsigned EIP-155 payload, v carries the chain id
            (Some(v), None)
        } else if v < 27u8.into() {
            // a bare recovery bit would re-encode as 27 or 28
            debug!("Legacy transaction with v {v}");
            return Err(Error::InvalidV);
        } else {
            let (y_parity, chain_id) = Signature::parse_v(v)?;
            (
                chain_id,
                Some(Signature::new(y_parity, r.to_uint()?, s.to_uint()?)),
            )
        }
    };
    Ok(Transaction::Legacy {
        nonce,
        gas_price,
        gas_limit,
        to,
        value,
        data,
        chain_id,
        signature,
    })
}

fn parse_eip2930(f: &mut Fields) -> Result<Transaction, Error> {
    Ok(Transaction::Eip2930 {
        chain_id: f.uint("chain_id")?,
        nonce: f.uint("nonce")?,
        gas_price: f.uint("gas_price")?,
        gas_limit: f.uint("gas_limit")?,
        to: f.to()?,
        value: f.uint("value")?,
        data: f.bytes("data")?,
        access_list: f.access_list()?,
        signature: f.signature()?,
    })
}

fn parse_eip1559(f: &mut Fields) -> Result<Transaction, Error> {
    Ok(Transaction::Eip1559 {
        chain_id: f.uint("chain_id")?,
        nonce: f.uint("nonce")?,
        max_priority_fee_per_gas: f.uint("max_priority_fee_per_gas")?,
        max_fee_per_gas: f.uint("max_fee_per_gas")?,
        gas_limit: f.uint("gas_limit")?,
        to: f.to()?,
        value: f.uint("value")?,
        data: f.bytes("data")?,
        access_list: f.access_list()?,
        signature: f.signature()?,
    })
}

fn parse_eip4844(f: &mut Fields) -> Result<Transaction, Error> {
    Ok(Transaction::Eip4844 {
        chain_id: f.uint("chain_id")?,
        nonce: f.uint("nonce")?,
        max_priority_fee_per_gas: f.uint("max_priority_fee_per_gas")?,
        max_fee_per_gas: f.uint("max_fee_per_gas")?,
        gas_limit: f.uint("gas_limit")?,
        to: f.address("to")?,
        value: f.uint("value")?,
        data: f.bytes("data")?,
        access_list: f.access_list()?,
        max_fee_per_blob_gas: f.uint("max_fee_per_blob_gas")?,
        blob_versioned_hashes: f.words("blob_versioned_hashes")?,
        sidecars: None,
        signature: f.signature()?,
    })
}

fn parse_eip7702(f: &mut Fields) -> Result<Transaction, Error> {
    Ok(Transaction::Eip7702 {
        chain_id: f.uint("chain_id")?,
        nonce: f.uint("nonce")?,
        max_priority_fee_per_gas: f.uint("max_priority_fee_per_gas")?,
        max_fee_per_gas: f.uint("max_fee_per_gas")?,
        gas_limit: f.uint("gas_limit")?,
        to: f.address("to")?,
        value: f.uint("value")?,
        data: f.bytes("data")?,
        access_list: f.access_list()?,
        authorization_list: f.authorization_list()?,
        signature: f.signature()?,
    })
}

fn check_legacy(tx: &Transaction) -> Result<(), Error> {
    match tx {
        Transaction::Legacy {
            chain_id: Some(chain_id),
            ..
        } if *chain_id >= MAX_CHAIN_ID.into() => {
            debug!("Legacy chain id {chain_id} out of range");
            Err(Error::InvalidNetworkId)
        }
        _ => Ok(()),
    }
}

fn check_access_list(_tx: &Transaction) -> Result<(), Error> {
    Ok(())
}

fn check_fee_market(tx: &Transaction) -> Result<(), Error> {
    match tx.fee_caps() {
        Some((max_fee_per_gas, max_priority_fee_per_gas))
            if max_fee_per_gas < max_priority_fee_per_gas =>
        {
            Err(Error::FeeCapTooLow {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            })
        }
        _ => Ok(()),
    }
}

fn check_blob(tx: &Transaction) -> Result<(), Error> {
    check_fee_market(tx)?;
    if let Transaction::Eip4844 {
        blob_versioned_hashes,
        ..
    } = tx
    {
        if blob_versioned_hashes.is_empty() {
            return Err(Error::MissingField {
                tx_type: "eip4844",
                field: "blob_versioned_hashes",
            });
        }
        if let Some((index, hash)) = blob_versioned_hashes
            .iter()
            .enumerate()
            .find(|(_, hash)| hash[0] != VERSIONED_HASH_VERSION_KZG)
        {
            return Err(Error::InvalidVersionedHash {
                index,
                version: hash[0],
            });
        }
    }
    Ok(())
}

fn check_set_code(tx: &Transaction) -> Result<(), Error> {
    check_fee_market(tx)?;
    match tx {
        Transaction::Eip7702 {
            authorization_list, ..
        } if authorization_list.is_empty() => Err(Error::MissingField {
            tx_type: "eip7702",
            field: "authorization_list",
        }),
        _ => Ok(()),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Transaction {
    /// The original Ethereum transaction format, will always start with a byte >=0xc0
    Legacy {
        /// Replay prevention counter, this must be the last nonce successfully on the
        /// chain plus one
        nonce: Uint256,
        /// The price of gas for this transaction, total spend will be price * limit with no
        /// refund for actual utilization
        gas_price: Uint256,
        gas_limit: Uint256,
        /// `None` deploys `data` as a new contract
        to: Option<Address>,
        value: Uint256,
        /// Encoded contract call or contract creation
        data: Vec<u8>,
        /// EIP-155 replay protection, folded into `v` once signed
        chain_id: Option<Uint256>,
        signature: Option<Signature>,
    },
    /// Legacy fee market with an access list
    Eip2930 {
        chain_id: Uint256,
        nonce: Uint256,
        gas_price: Uint256,
        gas_limit: Uint256,
        to: Option<Address>,
        value: Uint256,
        data: Vec<u8>,
        /// Addresses and storage slots warmed up front, access within this
        /// set is cheaper in terms of gas
        access_list: Vec<AccessListItem>,
        signature: Option<Signature>,
    },
    Eip1559 {
        chain_id: Uint256,
        nonce: Uint256,
        max_priority_fee_per_gas: Uint256,
        max_fee_per_gas: Uint256,
        gas_limit: Uint256,
        to: Option<Address>,
        value: Uint256,
        data: Vec<u8>,
        access_list: Vec<AccessListItem>,
        signature: Option<Signature>,
    },
    /// Blob carrying transaction, can not create contracts
    Eip4844 {
        chain_id: Uint256,
        nonce: Uint256,
        max_priority_fee_per_gas: Uint256,
        max_fee_per_gas: Uint256,
        gas_limit: Uint256,
        to: Address,
        value: Uint256,
        data: Vec<u8>,
        access_list: Vec<AccessListItem>,
        max_fee_per_blob_gas: Uint256,
        blob_versioned_hashes: Vec<[u8; 32]>,
        /// Only carried by the network form, never part of the signed payload
        sidecars: Option<BlobSidecars>,
        signature: Option<Signature>,
    },
    /// Set code transaction, can not create contracts
    Eip7702 {
        chain_id: Uint256,
        nonce: Uint256,
        max_priority_fee_per_gas: Uint256,
        max_fee_per_gas: Uint256,
        gas_limit: Uint256,
        to: Address,
        value: Uint256,
        data: Vec<u8>,
        access_list: Vec<AccessListItem>,
        authorization_list: Vec<SignedAuthorization>,
        signature: Option<Signature>,
    },
}

/// Hex of the canonical encoding. A transaction that fails its envelope
/// checks has no encoding and displays the reason instead.
impl Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.to_bytes() {
            Ok(bytes) => write!(f, "0x{}", bytes_to_hex_str(&bytes)),
            Err(e) => write!(f, "invalid {} transaction: {e}", self.transaction_type()),
        }
    }
}

impl fmt::LowerHex for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = match self.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => return write!(f, "invalid {} transaction: {e}", self.transaction_type()),
        };
        if f.alternate() {
            write!(f, "0x")?;
        }
        write!(f, "{}", bytes_to_hex_str(&bytes))
    }
}

impl fmt::UpperHex for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = match self.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => return write!(f, "invalid {} transaction: {e}", self.transaction_type()),
        };
        if f.alternate() {
            write!(f, "0x")?;
        }
        write!(f, "{}", bytes_to_hex_str(&bytes).to_uppercase())
    }
}

impl Serialize for Transaction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bytes = self
            .to_bytes()
            .map_err(<S::Error as serde::ser::Error>::custom)?;
        serializer.serialize_str(&format!("0x{}", bytes_to_hex_str(&bytes)))
    }
}

impl Transaction {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            Transaction::Legacy { .. } => TransactionType::Legacy,
            Transaction::Eip2930 { .. } => TransactionType::Eip2930,
            Transaction::Eip1559 { .. } => TransactionType::Eip1559,
            Transaction::Eip4844 { .. } => TransactionType::Eip4844,
            Transaction::Eip7702 { .. } => TransactionType::Eip7702,
        }
    }

    pub fn get_signature(&self) -> Option<Signature> {
        match self {
            Transaction::Legacy { signature, .. }
            | Transaction::Eip2930 { signature, .. }
            | Transaction::Eip1559 { signature, .. }
            | Transaction::Eip4844 { signature, .. }
            | Transaction::Eip7702 { signature, .. } => *signature,
        }
    }

    fn set_signature(&mut self, sig: Option<Signature>) {
        match self {
            Transaction::Legacy { signature, .. }
            | Transaction::Eip2930 { signature, .. }
            | Transaction::Eip1559 { signature, .. }
            | Transaction::Eip4844 { signature, .. }
            | Transaction::Eip7702 { signature, .. } => *signature = sig,
        }
    }

    /// `None` only for a legacy transaction without replay protection
    pub fn get_chain_id(&self) -> Option<Uint256> {
        match self {
            Transaction::Legacy { chain_id, .. } => *chain_id,
            Transaction::Eip2930 { chain_id, .. }
            | Transaction::Eip1559 { chain_id, .. }
            | Transaction::Eip4844 { chain_id, .. }
            | Transaction::Eip7702 { chain_id, .. } => Some(*chain_id),
        }
    }

    pub fn get_nonce(&self) -> Uint256 {
        match self {
            Transaction::Legacy { nonce, .. }
            | Transaction::Eip2930 { nonce, .. }
            | Transaction::Eip1559 { nonce, .. }
            | Transaction::Eip4844 { nonce, .. }
            | Transaction::Eip7702 { nonce, .. } => *nonce,
        }
    }

    pub fn get_gas_limit(&self) -> Uint256 {
        match self {
            Transaction::Legacy { gas_limit, .. }
            | Transaction::Eip2930 { gas_limit, .. }
            | Transaction::Eip1559 { gas_limit, .. }
            | Transaction::Eip4844 { gas_limit, .. }
            | Transaction::Eip7702 { gas_limit, .. } => *gas_limit,
        }
    }

    pub fn get_to(&self) -> Option<Address> {
        match self {
            Transaction::Legacy { to, .. }
            | Transaction::Eip2930 { to, .. }
            | Transaction::Eip1559 { to, .. } => *to,
            Transaction::Eip4844 { to, .. } | Transaction::Eip7702 { to, .. } => Some(*to),
        }
    }

    pub fn get_value(&self) -> Uint256 {
        match self {
            Transaction::Legacy { value, .. }
            | Transaction::Eip2930 { value, .. }
            | Transaction::Eip1559 { value, .. }
            | Transaction::Eip4844 { value, .. }
            | Transaction::Eip7702 { value, .. } => *value,
        }
    }

    pub fn data_ref(&self) -> &[u8] {
        match self {
            Transaction::Legacy { data, .. }
            | Transaction::Eip2930 { data, .. }
            | Transaction::Eip1559 { data, .. }
            | Transaction::Eip4844 { data, .. }
            | Transaction::Eip7702 { data, .. } => data,
        }
    }

    /// `(max_fee_per_gas, max_priority_fee_per_gas)` of the fee market
    /// envelopes
    fn fee_caps(&self) -> Option<(Uint256, Uint256)> {
        match self {
            Transaction::Legacy { .. } | Transaction::Eip2930 { .. } => None,
            Transaction::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                ..
            }
            | Transaction::Eip4844 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                ..
            }
            | Transaction::Eip7702 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                ..
            } => Some((*max_fee_per_gas, *max_priority_fee_per_gas)),
        }
    }

    /// Runs the envelope's field checks, every encoding path calls this
    /// first. Fails with `FeeCapTooLow` when the fee cap is below the tip,
    /// with `MissingField` for an empty blob hash or authorization list,
    /// with `InvalidVersionedHash` for a hash without the KZG version byte
    /// and with `InvalidNetworkId` for an out of range legacy chain id.
    pub fn validate(&self) -> Result<(), Error> {
        (self.transaction_type().envelope().check)(self)
    }

    /// Signature, sender recovery, nonce and fee sanity checks
    pub fn is_valid(&self) -> bool {
        if self.validate().is_err() {
            return false;
        }
        if let Some(sig) = self.get_signature() {
            if !sig.is_valid() || self.sender().is_err() {
                return false;
            }
        }

        // EIP-2681 limits nonces to 2^64-1
        if self.get_nonce() >= Uint256::from(u64::MAX) {
            return false;
        }

        // the gas price times the gas limit can not overflow or the tx is invalid
        match self {
            Transaction::Legacy {
                gas_limit,
                gas_price,
                ..
            }
            | Transaction::Eip2930 {
                gas_limit,
                gas_price,
                ..
            } => gas_limit.checked_mul(**gas_price).is_some(),
            Transaction::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                gas_limit,
                ..
            }
            | Transaction::Eip4844 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                gas_limit,
                ..
            }
            | Transaction::Eip7702 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                gas_limit,
                ..
            } => {
                gas_limit.checked_mul(**max_fee_per_gas).is_some()
                    && max_priority_fee_per_gas <= max_fee_per_gas
            }
        }
    }

    /// The unsigned field list shared by the signed and unsigned forms,
    /// legacy fields stop before the EIP-155 trio
    fn rlp_fields(&self) -> Vec<RlpToken> {
        match self {
            Transaction::Legacy {
                nonce,
                gas_price,
                gas_limit,
                to,
                value,
                data,
                ..
            } => vec![
                nonce.into(),
                gas_price.into(),
                gas_limit.into(),
                to_to_rlp(to),
                value.into(),
                data.as_slice().into(),
            ],
            Transaction::Eip2930 {
                chain_id,
                nonce,
                gas_price,
                gas_limit,
                to,
                value,
                data,
                access_list,
                ..
            } => vec![
                chain_id.into(),
                nonce.into(),
                gas_price.into(),
                gas_limit.into(),
                to_to_rlp(to),
                value.into(),
                data.as_slice().into(),
                access_list_to_rlp(access_list),
            ],
            Transaction::Eip1559 {
                chain_id,
                nonce,
                max_priority_fee_per_gas,
                max_fee_per_gas,
                gas_limit,
                to,
                value,
                data,
                access_list,
                ..
            } => vec![
                chain_id.into(),
                nonce.into(),
                max_priority_fee_per_gas.into(),
                max_fee_per_gas.into(),
                gas_limit.into(),
                to_to_rlp(to),
                value.into(),
                data.as_slice().into(),
                access_list_to_rlp(access_list),
            ],
            Transaction::Eip4844 {
                chain_id,
                nonce,
                max_priority_fee_per_gas,
                max_fee_per_gas,
                gas_limit,
                to,
                value,
                data,
                access_list,
                max_fee_per_blob_gas,
                blob_versioned_hashes,
                ..
            } => vec![
                chain_id.into(),
                nonce.into(),
                max_priority_fee_per_gas.into(),
                max_fee_per_gas.into(),
                gas_limit.into(),
                to.into(),
                value.into(),
                data.as_slice().into(),
                access_list_to_rlp(access_list),
                max_fee_per_blob_gas.into(),
                words_to_rlp(blob_versioned_hashes),
            ],
            Transaction::Eip7702 {
                chain_id,
                nonce,
                max_priority_fee_per_gas,
                max_fee_per_gas,
                gas_limit,
                to,
                value,
                data,
                access_list,
                authorization_list,
                ..
            } => vec![
                chain_id.into(),
                nonce.into(),
                max_priority_fee_per_gas.into(),
                max_fee_per_gas.into(),
                gas_limit.into(),
                to.into(),
                value.into(),
                data.as_slice().into(),
                access_list_to_rlp(access_list),
                authorization_list_to_rlp(authorization_list),
            ],
        }
    }

    /// Field list with the signature, or the EIP-155 placeholder, appended
    fn rlp_list(&self, signature: Option<&Signature>) -> Result<RlpToken, Error> {
        let mut fields = self.rlp_fields();
        match (self, signature) {
            (Transaction::Legacy { chain_id, .. }, Some(sig)) => {
                let v = match chain_id {
                    Some(chain_id) => sig.eip155_v(*chain_id)?,
                    None => sig.v().into(),
                };
                fields.push(v.into());
                fields.push(sig.r.into());
                fields.push(sig.s.into());
            }
            (
                Transaction::Legacy {
                    chain_id: Some(chain_id),
                    ..
                },
                None,
            ) => {
                fields.push(chain_id.into());
                fields.push(RlpToken::empty());
                fields.push(RlpToken::empty());
            }
            (Transaction::Legacy { chain_id: None, .. }, None) => {}
            (_, Some(sig)) => {
                fields.push(sig.y_parity.into());
                fields.push(sig.r.into());
                fields.push(sig.s.into());
            }
            (_, None) => {}
        }
        Ok(RlpToken::List(fields))
    }

    fn encode(&self, signature: Option<&Signature>) -> Result<Vec<u8>, Error> {
        self.validate()?;
        let body = encode_rlp(&self.rlp_list(signature)?);
        Ok(match self.transaction_type().type_byte() {
            Some(type_byte) => {
                let mut out = Vec::with_capacity(body.len() + 1);
                out.push(type_byte);
                out.extend_from_slice(&body);
                out
            }
            None => body,
        })
    }

    /// The canonical encoding, signed when a signature is attached. Fails
    /// when the envelope checks of [`Transaction::validate`] do.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        self.encode(self.get_signature().as_ref())
    }

    /// The form broadcast to peers, identical to [`Transaction::to_bytes`]
    /// except for a blob transaction with sidecars attached which becomes
    /// `0x03 ++ rlp([tx, blobs, commitments, proofs])`
    pub fn to_network_bytes(&self) -> Result<Vec<u8>, Error> {
        match self {
            Transaction::Eip4844 {
                sidecars: Some(sidecars),
                ..
            } => {
                self.validate()?;
                let [blobs, commitments, proofs] = sidecars.to_rlp();
                let wrapper = RlpToken::List(vec![
                    self.rlp_list(self.get_signature().as_ref())?,
                    blobs,
                    commitments,
                    proofs,
                ]);
                let mut out = vec![EIP4844_TX_TYPE];
                out.extend_from_slice(&encode_rlp(&wrapper));
                Ok(out)
            }
            _ => self.to_bytes(),
        }
    }

    /// The bytes a signature commits to
    pub fn signing_payload(&self) -> Result<Vec<u8>, Error> {
        self.encode(None)
    }

    pub fn signing_hash(&self) -> Result<[u8; 32], Error> {
        Ok(keccak256(&self.signing_payload()?))
    }

    /// Signs the transaction. For a legacy transaction `network_id` turns on
    /// EIP-155 replay protection, for typed transactions it must agree with
    /// the chain id already present. Nothing is signed when the envelope
    /// checks fail.
    pub fn sign(&self, key: &PrivateKey, network_id: Option<u64>) -> Result<Transaction, Error> {
        let mut tx = self.clone();
        if let Some(network_id) = network_id {
            if !(1..MAX_CHAIN_ID).contains(&network_id) {
                return Err(Error::InvalidNetworkId);
            }
            match &mut tx {
                Transaction::Legacy { chain_id, .. } => *chain_id = Some(network_id.into()),
                typed => typed.verify_chain_id(network_id.into())?,
            }
        }
        let signature = key.sign_hash(&tx.signing_hash()?)?;
        tx.set_signature(Some(signature));
        Ok(tx)
    }

    /// Recovers the account that signed this transaction
    pub fn sender(&self) -> Result<Address, Error> {
        let sig = self.get_signature().ok_or(Error::NoSignature)?;
        sig.error_check()?;
        sig.recover(&self.signing_hash()?)
    }

    /// Transaction hash, keccak256 of the canonical encoding
    pub fn hash(&self) -> Result<[u8; 32], Error> {
        Ok(keccak256(&self.to_bytes()?))
    }

    /// Fails with `ChainMismatch` when this transaction commits to a
    /// different chain. A legacy transaction without a chain id is valid
    /// everywhere.
    pub fn verify_chain_id(&self, expected: Uint256) -> Result<(), Error> {
        match self.get_chain_id() {
            Some(got) if got != expected => Err(Error::ChainMismatch { expected, got }),
            _ => Ok(()),
        }
    }

    /// Decodes any standard envelope, signed or unsigned, including the
    /// blob network wrapper
    pub fn decode_from_rlp(raw_rlp_bytes: &[u8]) -> Result<Self, Error> {
        let first = *raw_rlp_bytes.first().ok_or(Error::DeserializeRlp)?;
        if first >= LEGACY_TX_MIN_PREFIX {
            trace!("Decoding legacy envelope");
            return TransactionType::Legacy
                .envelope()
                .decode(&decode_rlp(raw_rlp_bytes)?);
        }

        let envelope = TransactionType::from_type_byte(first)?.envelope();
        trace!("Decoding {} envelope", envelope.name);
        let token = decode_rlp(&raw_rlp_bytes[1..])?;
        if envelope.tx_type == TransactionType::Eip4844 {
            if let RlpToken::List(items) = &token {
                if let [inner @ RlpToken::List(_), blobs, commitments, proofs] = items.as_slice() {
                    return decode_blob_wrapper(envelope, inner, blobs, commitments, proofs);
                }
            }
        }
        envelope.decode(&token)
    }

    /// Encodes through the chain's serializer when it handles this
    /// transaction, otherwise with the standard codec
    pub fn serialize_for_chain(&self, chain: &Chain) -> Result<Vec<u8>, Error> {
        chain.serialize(&ChainTransaction::Standard(self.clone()))
    }

    /// Decodes through the chain's serializer when it recognises the
    /// envelope, otherwise with the standard codec. Standard transactions
    /// must carry the chain's id.
    pub fn parse_for_chain(raw: &[u8], chain: &Chain) -> Result<ChainTransaction, Error> {
        chain.parse(raw)
    }
}

fn decode_blob_wrapper(
    envelope: &'static Envelope,
    inner: &RlpToken,
    blobs: &RlpToken,
    commitments: &RlpToken,
    proofs: &RlpToken,
) -> Result<Transaction, Error> {
    let mut tx = envelope.decode(inner)?;
    let decoded = BlobSidecars::from_rlp(blobs, commitments, proofs)?;
    if let Transaction::Eip4844 {
        blob_versioned_hashes,
        sidecars,
        ..
    } = &mut tx
    {
        let hashes = decoded.versioned_hashes();
        if hashes != *blob_versioned_hashes {
            debug!(
                "Sidecars commit to {} hashes that do not match the transaction",
                hashes.len()
            );
            return Err(Error::DeserializeRlp);
        }
        *sidecars = Some(decoded);
    }
    Ok(tx)
}
