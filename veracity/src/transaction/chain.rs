//! Per-chain envelope capabilities
//!
//! A [`Chain`] may carry a [`ChainSerializer`] that claims extra envelope
//! types. The standard codec handles everything the serializer declines.

use super::{Fields, Transaction};
use crate::address::Address;
use crate::error::Error;
use crate::private_key::PrivateKey;
use crate::rlp::{decode_rlp, encode_rlp, RlpToken};
use crate::signature::Signature;
use crate::utils::{keccak256, to_array};
use num256::Uint256;
use std::fmt;
use std::sync::Arc;

/// Type byte of the OP-stack deposit transaction
pub const OP_DEPOSIT_TX_TYPE: u8 = 0x7e;
/// Type byte of the Celo CIP-64 fee currency transaction
pub const CELO_CIP64_TX_TYPE: u8 = 0x7b;

/// A transaction in either the standard representation or one owned by a
/// chain serializer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainTransaction {
    Standard(Transaction),
    Custom {
        type_byte: u8,
        /// Unsigned field list
        fields: Vec<RlpToken>,
        signature: Option<Signature>,
    },
}

impl ChainTransaction {
    pub fn type_byte(&self) -> Option<u8> {
        match self {
            ChainTransaction::Standard(tx) => tx.transaction_type().type_byte(),
            ChainTransaction::Custom { type_byte, .. } => Some(*type_byte),
        }
    }

    pub fn signature(&self) -> Option<Signature> {
        match self {
            ChainTransaction::Standard(tx) => tx.get_signature(),
            ChainTransaction::Custom { signature, .. } => *signature,
        }
    }
}

/// Envelope codec supplied by a chain. Every method returns `None` for
/// transactions the chain leaves to the standard codec.
pub trait ChainSerializer: Send + Sync {
    /// Unsigned field list of a transaction this chain encodes itself
    fn format(&self, tx: &ChainTransaction) -> Option<Vec<RlpToken>>;

    /// `typeByte ++ rlp(fields ++ [yParity, r, s])`
    fn serialize(&self, tx: &ChainTransaction, signature: Option<&Signature>) -> Option<Vec<u8>> {
        let type_byte = match tx {
            ChainTransaction::Custom { type_byte, .. } => *type_byte,
            ChainTransaction::Standard(_) => return None,
        };
        let mut fields = self.format(tx)?;
        if let Some(sig) = signature {
            fields.push(sig.y_parity.into());
            fields.push(sig.r.into());
            fields.push(sig.s.into());
        }
        let mut out = vec![type_byte];
        out.extend_from_slice(&encode_rlp(&RlpToken::List(fields)));
        Some(out)
    }

    fn parse(&self, raw: &[u8]) -> Option<Result<ChainTransaction, Error>>;

    /// Chain id a transaction owned by this serializer commits to, `None`
    /// for envelopes without one
    fn chain_id(&self, _tx: &ChainTransaction) -> Option<Uint256> {
        None
    }
}

/// A chain descriptor, only the parts the codec consumes
#[derive(Clone, Serialize, Deserialize)]
pub struct Chain {
    pub id: u64,
    pub name: String,
    #[serde(skip)]
    pub serializers: Option<Arc<dyn ChainSerializer>>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("serializers", &self.serializers.is_some())
            .finish()
    }
}

impl Chain {
    pub fn new(id: u64, name: &str) -> Chain {
        Chain {
            id,
            name: name.to_string(),
            serializers: None,
        }
    }

    pub fn with_serializers(mut self, serializers: Arc<dyn ChainSerializer>) -> Chain {
        self.serializers = Some(serializers);
        self
    }

    fn encode(
        &self,
        tx: &ChainTransaction,
        signature: Option<&Signature>,
    ) -> Result<Vec<u8>, Error> {
        if let Some(bytes) = self
            .serializers
            .as_ref()
            .and_then(|s| s.serialize(tx, signature))
        {
            return Ok(bytes);
        }
        match tx {
            ChainTransaction::Standard(tx) => tx.encode(signature),
            ChainTransaction::Custom { type_byte, .. } => Err(Error::ChainSerializer(format!(
                "{} has no serializer for type {type_byte:#04x}",
                self.name
            ))),
        }
    }

    /// Encodes with the attached signature, if any
    pub fn serialize(&self, tx: &ChainTransaction) -> Result<Vec<u8>, Error> {
        self.encode(tx, tx.signature().as_ref())
    }

    pub fn signing_hash(&self, tx: &ChainTransaction) -> Result<[u8; 32], Error> {
        Ok(keccak256(&self.encode(tx, None)?))
    }

    /// Signs for this chain, standard transactions get its id as their
    /// network id
    pub fn sign(&self, tx: &ChainTransaction, key: &PrivateKey) -> Result<ChainTransaction, Error> {
        match tx {
            ChainTransaction::Standard(inner) => Ok(ChainTransaction::Standard(
                inner.sign(key, Some(self.id))?,
            )),
            ChainTransaction::Custom {
                type_byte, fields, ..
            } => {
                self.verify_custom_chain_id(tx)?;
                let signature = key.sign_hash(&self.signing_hash(tx)?)?;
                Ok(ChainTransaction::Custom {
                    type_byte: *type_byte,
                    fields: fields.clone(),
                    signature: Some(signature),
                })
            }
        }
    }

    pub fn sender(&self, tx: &ChainTransaction) -> Result<Address, Error> {
        match tx {
            ChainTransaction::Standard(inner) => inner.sender(),
            ChainTransaction::Custom { signature, .. } => {
                let sig = signature.ok_or(Error::NoSignature)?;
                sig.error_check()?;
                sig.recover(&self.signing_hash(tx)?)
            }
        }
    }

    /// Decodes with the serializer first, then the standard codec. Both
    /// must commit to this chain when they carry a chain id.
    pub fn parse(&self, raw: &[u8]) -> Result<ChainTransaction, Error> {
        if let Some(parsed) = self.serializers.as_ref().and_then(|s| s.parse(raw)) {
            trace!("{} serializer claimed the envelope", self.name);
            let tx = parsed?;
            self.verify_custom_chain_id(&tx)?;
            return Ok(tx);
        }
        let tx = Transaction::decode_from_rlp(raw)?;
        tx.verify_chain_id(self.id.into())?;
        Ok(ChainTransaction::Standard(tx))
    }

    fn verify_custom_chain_id(&self, tx: &ChainTransaction) -> Result<(), Error> {
        let got = match self.serializers.as_ref().and_then(|s| s.chain_id(tx)) {
            Some(got) => got,
            None => return Ok(()),
        };
        let expected: Uint256 = self.id.into();
        if got != expected {
            debug!("{} got a transaction for chain {got}", self.name);
            return Err(Error::ChainMismatch { expected, got });
        }
        Ok(())
    }
}

/// Decodes `typeByte ++ rlp(list)` when the first byte matches, checking the
/// list length against the allowed counts
fn decode_envelope(
    raw: &[u8],
    type_byte: u8,
    name: &'static str,
    counts: &'static [usize],
) -> Option<Result<Vec<RlpToken>, Error>> {
    if raw.first() != Some(&type_byte) {
        return None;
    }
    Some(decode_rlp(&raw[1..]).and_then(|token| {
        let items = token.get_list_content()?;
        if !counts.contains(&items.len()) {
            return Err(Error::TxFieldCount {
                tx_type: name,
                expected: counts,
                got: items.len(),
            });
        }
        Ok(items)
    }))
}

fn custom_fields(tx: &ChainTransaction, wanted: u8) -> Option<&[RlpToken]> {
    match tx {
        ChainTransaction::Custom {
            type_byte, fields, ..
        } if *type_byte == wanted => Some(fields),
        _ => None,
    }
}

/// OP-stack deposit, minted by the L1 bridge and never signed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DepositTransaction {
    pub source_hash: [u8; 32],
    pub from: Address,
    /// `None` deploys `data` as a contract
    pub to: Option<Address>,
    pub mint: Uint256,
    pub value: Uint256,
    pub gas: u64,
    pub is_system_tx: bool,
    pub data: Vec<u8>,
}

impl DepositTransaction {
    fn to_fields(&self) -> Vec<RlpToken> {
        vec![
            self.source_hash.as_slice().into(),
            self.from.into(),
            super::to_to_rlp(&self.to),
            self.mint.into(),
            self.value.into(),
            self.gas.into(),
            self.is_system_tx.into(),
            self.data.as_slice().into(),
        ]
    }

    fn from_fields(fields: &[RlpToken]) -> Result<DepositTransaction, Error> {
        let mut f = Fields {
            tx_type: "op deposit",
            items: fields.iter(),
        };
        let source_hash = to_array(f.next("source_hash")?.as_bytes()?)?;
        let from = f.address("from")?;
        let to = f.to()?;
        let mint = f.uint("mint")?;
        let value = f.uint("value")?;
        let gas = f.next("gas")?.to_u64()?;
        let is_system_tx = match f.next("is_system_tx")?.to_u64()? {
            0 => false,
            1 => true,
            _ => return Err(Error::DeserializeRlp),
        };
        let data = f.bytes("data")?;
        Ok(DepositTransaction {
            source_hash,
            from,
            to,
            mint,
            value,
            gas,
            is_system_tx,
            data,
        })
    }

    pub fn to_chain_transaction(&self) -> ChainTransaction {
        ChainTransaction::Custom {
            type_byte: OP_DEPOSIT_TX_TYPE,
            fields: self.to_fields(),
            signature: None,
        }
    }

    pub fn from_chain_transaction(tx: &ChainTransaction) -> Result<DepositTransaction, Error> {
        let fields = custom_fields(tx, OP_DEPOSIT_TX_TYPE)
            .ok_or(Error::UnknownTxType(tx.type_byte().unwrap_or(0)))?;
        DepositTransaction::from_fields(fields)
    }

    pub fn hash(&self) -> [u8; 32] {
        let mut raw = vec![OP_DEPOSIT_TX_TYPE];
        raw.extend_from_slice(&encode_rlp(&RlpToken::List(self.to_fields())));
        keccak256(&raw)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OpDepositSerializer;

impl ChainSerializer for OpDepositSerializer {
    fn format(&self, tx: &ChainTransaction) -> Option<Vec<RlpToken>> {
        custom_fields(tx, OP_DEPOSIT_TX_TYPE).map(|f| f.to_vec())
    }

    /// Deposits carry no signature, one passed in is dropped
    fn serialize(&self, tx: &ChainTransaction, _signature: Option<&Signature>) -> Option<Vec<u8>> {
        let mut out = vec![OP_DEPOSIT_TX_TYPE];
        out.extend_from_slice(&encode_rlp(&RlpToken::List(self.format(tx)?)));
        Some(out)
    }

    fn parse(&self, raw: &[u8]) -> Option<Result<ChainTransaction, Error>> {
        let items = decode_envelope(raw, OP_DEPOSIT_TX_TYPE, "op deposit", &[8])?;
        Some(items.and_then(|items| {
            DepositTransaction::from_fields(&items).map(|d| d.to_chain_transaction())
        }))
    }
}

/// Celo CIP-64, an EIP-1559 transaction paying gas in an ERC-20 token
#[derive(Clone, Copy, Debug, Default)]
pub struct CeloFeeCurrencySerializer;

impl CeloFeeCurrencySerializer {
    /// Turns an unsigned EIP-1559 transaction into a CIP-64 one
    pub fn from_eip1559(tx: &Transaction, fee_currency: Address) -> Result<ChainTransaction, Error> {
        if !matches!(tx, Transaction::Eip1559 { .. }) {
            return Err(Error::ChainSerializer(format!(
                "cip64 needs an eip1559 transaction, got {}",
                tx.transaction_type()
            )));
        }
        tx.validate()?;
        let mut fields = tx.rlp_fields();
        fields.push(fee_currency.into());
        Ok(ChainTransaction::Custom {
            type_byte: CELO_CIP64_TX_TYPE,
            fields,
            signature: None,
        })
    }

    pub fn fee_currency(tx: &ChainTransaction) -> Option<Address> {
        custom_fields(tx, CELO_CIP64_TX_TYPE)
            .and_then(|f| f.get(9))
            .and_then(|t| Address::from_rlp_data(t).ok())
    }
}

impl ChainSerializer for CeloFeeCurrencySerializer {
    fn format(&self, tx: &ChainTransaction) -> Option<Vec<RlpToken>> {
        custom_fields(tx, CELO_CIP64_TX_TYPE).map(|f| f.to_vec())
    }

    fn chain_id(&self, tx: &ChainTransaction) -> Option<Uint256> {
        custom_fields(tx, CELO_CIP64_TX_TYPE)
            .and_then(|f| f.first())
            .and_then(|t| t.to_uint().ok())
    }

    fn parse(&self, raw: &[u8]) -> Option<Result<ChainTransaction, Error>> {
        let items = decode_envelope(raw, CELO_CIP64_TX_TYPE, "celo cip64", &[10, 13])?;
        Some(items.and_then(|mut items| {
            let signature = {
                let mut f = Fields {
                    tx_type: "celo cip64",
                    items: items[10..].iter(),
                };
                f.signature()?
            };
            items.truncate(10);
            items[0].to_uint()?;
            let max_priority_fee_per_gas = items[2].to_uint()?;
            let max_fee_per_gas = items[3].to_uint()?;
            if max_fee_per_gas < max_priority_fee_per_gas {
                return Err(Error::FeeCapTooLow {
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                });
            }
            Address::from_rlp_data(&items[9])?;
            Ok(ChainTransaction::Custom {
                type_byte: CELO_CIP64_TX_TYPE,
                fields: items,
                signature,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bytes_to_hex_str;

    fn key() -> PrivateKey {
        "4646464646464646464646464646464646464646464646464646464646464646"
            .parse()
            .unwrap()
    }

    fn to() -> Address {
        "0x3535353535353535353535353535353535353535".parse().unwrap()
    }

    fn eip1559(chain_id: u64) -> Transaction {
        Transaction::Eip1559 {
            chain_id: chain_id.into(),
            nonce: 1u8.into(),
            max_priority_fee_per_gas: 1_000_000_000u64.into(),
            max_fee_per_gas: 2_000_000_000u64.into(),
            gas_limit: 21_000u32.into(),
            to: Some(to()),
            value: 0u8.into(),
            data: Vec::new(),
            access_list: Vec::new(),
            signature: None,
        }
    }

    fn deposit() -> DepositTransaction {
        DepositTransaction {
            source_hash: [0xab; 32],
            from: to(),
            to: None,
            mint: 1_000u32.into(),
            value: 1_000u32.into(),
            gas: 100_000,
            is_system_tx: false,
            data: vec![0x60, 0x00],
        }
    }

    #[test]
    fn deposit_round_trip() {
        let chain = Chain::new(10, "OP Mainnet").with_serializers(Arc::new(OpDepositSerializer));
        let tx = deposit().to_chain_transaction();
        let raw = chain.serialize(&tx).unwrap();
        assert_eq!(raw[0], OP_DEPOSIT_TX_TYPE);
        assert_eq!(keccak256(&raw), deposit().hash());

        let parsed = Transaction::parse_for_chain(&raw, &chain).unwrap();
        assert_eq!(parsed, tx);
        assert_eq!(
            DepositTransaction::from_chain_transaction(&parsed).unwrap(),
            deposit()
        );
    }

    #[test]
    fn deposit_rejects_bad_lists() {
        let chain = Chain::new(10, "OP Mainnet").with_serializers(Arc::new(OpDepositSerializer));
        let mut raw = vec![OP_DEPOSIT_TX_TYPE];
        raw.extend_from_slice(&encode_rlp(&RlpToken::List(vec![1u8.into(); 3])));
        assert!(matches!(
            chain.parse(&raw),
            Err(Error::TxFieldCount {
                tx_type: "op deposit",
                got: 3,
                ..
            })
        ));
    }

    #[test]
    fn standard_transactions_fall_through() {
        let chain = Chain::new(10, "OP Mainnet").with_serializers(Arc::new(OpDepositSerializer));
        let signed = eip1559(10).sign(&key(), None).unwrap();
        let raw = signed.serialize_for_chain(&chain).unwrap();
        assert_eq!(raw, signed.to_bytes().unwrap());
        assert_eq!(
            Transaction::parse_for_chain(&raw, &chain).unwrap(),
            ChainTransaction::Standard(signed)
        );

        let other = eip1559(1).sign(&key(), None).unwrap();
        assert!(matches!(
            Transaction::parse_for_chain(&other.to_bytes().unwrap(), &chain),
            Err(Error::ChainMismatch { .. })
        ));
    }

    #[test]
    fn chain_sign_sets_network_id() {
        let chain = Chain::new(1, "Ethereum");
        let legacy = Transaction::Legacy {
            nonce: 0u8.into(),
            gas_price: 1u8.into(),
            gas_limit: 21_000u32.into(),
            to: Some(Address::default()),
            value: 0u8.into(),
            data: Vec::new(),
            chain_id: None,
            signature: None,
        };
        let signed = chain
            .sign(&ChainTransaction::Standard(legacy), &key())
            .unwrap();
        assert_eq!(
            bytes_to_hex_str(&chain.serialize(&signed).unwrap()),
            "f85f8001825208940000000000000000000000000000000000000000808026a0d5bbfde146b60d7fad0bd6f5c456acf032a762f60023a625a36bbfd1e535effaa060f4785ab6564fc4af83e16f3ae5c4de9a3faa80d961f510e6864f0e2841edb4"
        );
        assert_eq!(chain.sender(&signed).unwrap(), key().to_address());
    }

    #[test]
    fn celo_sign_and_parse() {
        let chain = Chain::new(42220, "Celo").with_serializers(Arc::new(CeloFeeCurrencySerializer));
        let fee_currency: Address = "0x765de816845861e75a25fca122bb6898b8b1282a".parse().unwrap();
        let tx = CeloFeeCurrencySerializer::from_eip1559(&eip1559(42220), fee_currency).unwrap();
        let signed = chain.sign(&tx, &key()).unwrap();
        let raw = chain.serialize(&signed).unwrap();
        assert_eq!(raw[0], CELO_CIP64_TX_TYPE);

        let parsed = chain.parse(&raw).unwrap();
        assert_eq!(parsed, signed);
        assert_eq!(
            CeloFeeCurrencySerializer::fee_currency(&parsed),
            Some(fee_currency)
        );
        assert_eq!(chain.sender(&parsed).unwrap(), key().to_address());

        // unsigned form parses too
        let unsigned = chain.parse(&chain.serialize(&tx).unwrap()).unwrap();
        assert_eq!(unsigned, tx);
    }

    #[test]
    fn celo_checks_chain_id_and_fees() {
        let celo = Chain::new(42220, "Celo").with_serializers(Arc::new(CeloFeeCurrencySerializer));
        let alfajores =
            Chain::new(44787, "Celo Alfajores").with_serializers(Arc::new(CeloFeeCurrencySerializer));
        let fee_currency: Address = "0x765de816845861e75a25fca122bb6898b8b1282a".parse().unwrap();
        let tx = CeloFeeCurrencySerializer::from_eip1559(&eip1559(42220), fee_currency).unwrap();
        let raw = celo.serialize(&celo.sign(&tx, &key()).unwrap()).unwrap();

        assert!(matches!(
            alfajores.parse(&raw),
            Err(Error::ChainMismatch { got, .. }) if got == Uint256::from(42220u32)
        ));
        assert!(matches!(
            alfajores.sign(&tx, &key()),
            Err(Error::ChainMismatch { .. })
        ));

        // a fee cap below the tip is refused on both sides
        let mut low = eip1559(42220);
        if let Transaction::Eip1559 {
            max_fee_per_gas, ..
        } = &mut low
        {
            *max_fee_per_gas = 1u8.into();
        }
        assert!(matches!(
            CeloFeeCurrencySerializer::from_eip1559(&low, fee_currency),
            Err(Error::FeeCapTooLow { .. })
        ));
        let mut fields = low.rlp_fields();
        fields.push(fee_currency.into());
        let mut raw = vec![CELO_CIP64_TX_TYPE];
        raw.extend_from_slice(&encode_rlp(&RlpToken::List(fields)));
        assert!(matches!(
            celo.parse(&raw),
            Err(Error::FeeCapTooLow { .. })
        ));
    }

    #[test]
    fn custom_without_serializer_fails() {
        let chain = Chain::new(1, "Ethereum");
        let tx = deposit().to_chain_transaction();
        assert!(matches!(
            chain.serialize(&tx),
            Err(Error::ChainSerializer(_))
        ));
        assert!(matches!(
            chain.parse(&[OP_DEPOSIT_TX_TYPE, 0xc0]),
            Err(Error::UnknownTxType(OP_DEPOSIT_TX_TYPE))
        ));
    }

    #[test]
    fn chain_descriptor_from_json() {
        let chain: Chain = serde_json::from_str(r#"{"id":8453,"name":"Base"}"#).unwrap();
        assert_eq!(chain.id, 8453);
        assert!(chain.serializers.is_none());
        assert_eq!(
            format!("{chain:?}"),
            r#"Chain { id: 8453, name: "Base", serializers: false }"#
        );
    }
}
