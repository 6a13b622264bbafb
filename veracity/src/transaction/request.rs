//! Loose transaction parameters, type inference and pre-serialize checks

use super::{AccessListItem, SignedAuthorization, Transaction, TransactionType};
use crate::address::Address;
use crate::blob::BlobSidecars;
use crate::constants::VERSIONED_HASH_VERSION_KZG;
use crate::error::Error;
use num256::Uint256;
use num_traits::Zero;

/// Every transaction field as optional, the shape an RPC caller hands over
/// before the envelope is known
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionRequest {
    /// Explicit envelope, must agree with the fields present
    pub tx_type: Option<TransactionType>,
    pub chain_id: Option<Uint256>,
    pub nonce: Option<Uint256>,
    pub gas_price: Option<Uint256>,
    pub max_fee_per_gas: Option<Uint256>,
    pub max_priority_fee_per_gas: Option<Uint256>,
    pub gas_limit: Option<Uint256>,
    pub to: Option<Address>,
    pub value: Option<Uint256>,
    pub data: Option<Vec<u8>>,
    pub access_list: Option<Vec<AccessListItem>>,
    pub max_fee_per_blob_gas: Option<Uint256>,
    pub blob_versioned_hashes: Option<Vec<[u8; 32]>>,
    pub sidecars: Option<BlobSidecars>,
    pub authorization_list: Option<Vec<SignedAuthorization>>,
}

impl TransactionRequest {
    fn fee_market_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.max_fee_per_gas.is_some() {
            out.push("maxFeePerGas");
        }
        if self.max_priority_fee_per_gas.is_some() {
            out.push("maxPriorityFeePerGas");
        }
        out
    }

    fn blob_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.max_fee_per_blob_gas.is_some() {
            out.push("maxFeePerBlobGas");
        }
        if self.blob_versioned_hashes.is_some() {
            out.push("blobVersionedHashes");
        }
        if self.sidecars.is_some() {
            out.push("sidecars");
        }
        out
    }

    fn authorization_fields(&self) -> Vec<&'static str> {
        if self.authorization_list.is_some() {
            vec!["authorizationList"]
        } else {
            Vec::new()
        }
    }

    /// Type indicating fields present that `tx_type` can not carry
    fn foreign_fields(&self, tx_type: TransactionType) -> Vec<&'static str> {
        let mut out = Vec::new();
        let gas_price = self.gas_price.is_some();
        let access_list = self.access_list.is_some();
        match tx_type {
            TransactionType::Legacy => {
                if access_list {
                    out.push("accessList");
                }
                out.extend(self.fee_market_fields());
                out.extend(self.blob_fields());
                out.extend(self.authorization_fields());
            }
            TransactionType::Eip2930 => {
                out.extend(self.fee_market_fields());
                out.extend(self.blob_fields());
                out.extend(self.authorization_fields());
            }
            TransactionType::Eip1559 => {
                if gas_price {
                    out.push("gasPrice");
                }
                out.extend(self.blob_fields());
                out.extend(self.authorization_fields());
            }
            TransactionType::Eip4844 => {
                if gas_price {
                    out.push("gasPrice");
                }
                out.extend(self.authorization_fields());
            }
            TransactionType::Eip7702 => {
                if gas_price {
                    out.push("gasPrice");
                }
                out.extend(self.blob_fields());
            }
        }
        out
    }

    /// Picks the envelope from the fields present. Indicators that belong
    /// to incompatible envelopes are an error rather than a priority order.
    pub fn infer_type(&self) -> Result<TransactionType, Error> {
        let fee_market = self.fee_market_fields();
        let blob = self.blob_fields();
        let authorization = self.authorization_fields();

        let mut conflicts = Vec::new();
        if self.gas_price.is_some()
            && !(fee_market.is_empty() && blob.is_empty() && authorization.is_empty())
        {
            conflicts.push("gasPrice");
            conflicts.extend(&fee_market);
            conflicts.extend(&blob);
            conflicts.extend(&authorization);
        } else if !blob.is_empty() && !authorization.is_empty() {
            conflicts.extend(&blob);
            conflicts.extend(&authorization);
        }
        if !conflicts.is_empty() {
            debug!("Conflicting transaction type fields {conflicts:?}");
            return Err(Error::AmbiguousTransactionType { fields: conflicts });
        }

        let inferred = if !authorization.is_empty() {
            TransactionType::Eip7702
        } else if !blob.is_empty() {
            TransactionType::Eip4844
        } else if !fee_market.is_empty() {
            TransactionType::Eip1559
        } else if self.access_list.is_some() {
            TransactionType::Eip2930
        } else {
            TransactionType::Legacy
        };

        match self.tx_type {
            None => Ok(inferred),
            Some(explicit) => {
                let foreign = self.foreign_fields(explicit);
                if foreign.is_empty() {
                    Ok(explicit)
                } else {
                    let mut fields = vec!["type"];
                    fields.extend(foreign);
                    Err(Error::AmbiguousTransactionType { fields })
                }
            }
        }
    }

    /// Versioned hashes given directly or derived from the sidecars, the
    /// two must agree when both are present
    fn versioned_hashes(&self) -> Result<Vec<[u8; 32]>, Error> {
        let derived = self.sidecars.as_ref().map(|s| s.versioned_hashes());
        let hashes = match (&self.blob_versioned_hashes, derived) {
            (Some(given), Some(derived)) => {
                if let Some(index) = (0..given.len().max(derived.len()))
                    .find(|i| given.get(*i) != derived.get(*i))
                {
                    return Err(Error::InvalidVersionedHash {
                        index,
                        version: given.get(index).map(|h| h[0]).unwrap_or(0),
                    });
                }
                given.clone()
            }
            (Some(given), None) => given.clone(),
            (None, Some(derived)) => derived,
            (None, None) => Vec::new(),
        };
        if hashes.is_empty() {
            return Err(Error::MissingField {
                tx_type: TransactionType::Eip4844.name(),
                field: "blobVersionedHashes",
            });
        }
        for (index, hash) in hashes.iter().enumerate() {
            if hash[0] != VERSIONED_HASH_VERSION_KZG {
                return Err(Error::InvalidVersionedHash {
                    index,
                    version: hash[0],
                });
            }
        }
        Ok(hashes)
    }

    /// Checks required fields and fee sanity for the inferred envelope
    pub fn validate(&self) -> Result<TransactionType, Error> {
        let tx_type = self.infer_type()?;
        let tx_type_name = tx_type.name();
        let required = |value: bool, field: &'static str| {
            if value {
                Ok(())
            } else {
                Err(Error::MissingField {
                    tx_type: tx_type_name,
                    field,
                })
            }
        };

        required(self.gas_limit.is_some(), "gasLimit")?;
        match self.chain_id {
            Some(chain_id) if chain_id.is_zero() => return Err(Error::InvalidNetworkId),
            None if tx_type != TransactionType::Legacy => {
                return Err(Error::MissingField {
                    tx_type: tx_type_name,
                    field: "chainId",
                })
            }
            _ => {}
        }
        let gas_limit = self.gas_limit.unwrap_or_else(Uint256::zero);

        match tx_type {
            TransactionType::Legacy | TransactionType::Eip2930 => {
                required(self.gas_price.is_some(), "gasPrice")?;
                let gas_price = self.gas_price.unwrap_or_else(Uint256::zero);
                if gas_limit.checked_mul(*gas_price).is_none() {
                    return Err(Error::FeeOverflow { field: "gasPrice" });
                }
            }
            TransactionType::Eip1559 | TransactionType::Eip4844 | TransactionType::Eip7702 => {
                let (max_fee_per_gas, max_priority_fee_per_gas) =
                    match (self.max_fee_per_gas, self.max_priority_fee_per_gas) {
                        (Some(max), Some(priority)) => (max, priority),
                        (None, _) => {
                            return Err(Error::MissingField {
                                tx_type: tx_type_name,
                                field: "maxFeePerGas",
                            })
                        }
                        (_, None) => {
                            return Err(Error::MissingField {
                                tx_type: tx_type_name,
                                field: "maxPriorityFeePerGas",
                            })
                        }
                    };
                if max_fee_per_gas < max_priority_fee_per_gas {
                    return Err(Error::FeeCapTooLow {
                        max_fee_per_gas,
                        max_priority_fee_per_gas,
                    });
                }
                if gas_limit.checked_mul(*max_fee_per_gas).is_none() {
                    return Err(Error::FeeOverflow {
                        field: "maxFeePerGas",
                    });
                }
            }
        }

        match tx_type {
            TransactionType::Eip4844 => {
                required(self.to.is_some(), "to")?;
                required(self.max_fee_per_blob_gas.is_some(), "maxFeePerBlobGas")?;
                self.versioned_hashes()?;
            }
            TransactionType::Eip7702 => {
                required(self.to.is_some(), "to")?;
                let authorizations = self.authorization_list.as_deref().unwrap_or_default();
                required(!authorizations.is_empty(), "authorizationList")?;
            }
            _ => {}
        }
        Ok(tx_type)
    }

    /// Validates, then assembles the unsigned transaction. Omitted nonce and
    /// value are zero, omitted data and access list are empty.
    pub fn build(&self) -> Result<Transaction, Error> {
        let tx_type = self.validate()?;
        let nonce = self.nonce.unwrap_or_else(Uint256::zero);
        let gas_limit = self.gas_limit.unwrap_or_else(Uint256::zero);
        let value = self.value.unwrap_or_else(Uint256::zero);
        let data = self.data.clone().unwrap_or_default();
        let access_list = self.access_list.clone().unwrap_or_default();
        let chain_id = self.chain_id.unwrap_or_else(Uint256::zero);
        let gas_price = self.gas_price.unwrap_or_else(Uint256::zero);
        let max_fee_per_gas = self.max_fee_per_gas.unwrap_or_else(Uint256::zero);
        let max_priority_fee_per_gas = self.max_priority_fee_per_gas.unwrap_or_else(Uint256::zero);
        let to = self.to.unwrap_or_default();

        trace!("Building {tx_type} transaction");
        Ok(match tx_type {
            TransactionType::Legacy => Transaction::Legacy {
                nonce,
                gas_price,
                gas_limit,
                to: self.to,
                value,
                data,
                chain_id: self.chain_id,
                signature: None,
            },
            TransactionType::Eip2930 => Transaction::Eip2930 {
                chain_id,
                nonce,
                gas_price,
                gas_limit,
                to: self.to,
                value,
                data,
                access_list,
                signature: None,
            },
            TransactionType::Eip1559 => Transaction::Eip1559 {
                chain_id,
                nonce,
                max_priority_fee_per_gas,
                max_fee_per_gas,
                gas_limit,
                to: self.to,
                value,
                data,
                access_list,
                signature: None,
            },
            TransactionType::Eip4844 => Transaction::Eip4844 {
                chain_id,
                nonce,
                max_priority_fee_per_gas,
                max_fee_per_gas,
                gas_limit,
                to,
                value,
                data,
                access_list,
                max_fee_per_blob_gas: self.max_fee_per_blob_gas.unwrap_or_else(Uint256::zero),
                blob_versioned_hashes: self.versioned_hashes()?,
                sidecars: self.sidecars.clone(),
                signature: None,
            },
            TransactionType::Eip7702 => Transaction::Eip7702 {
                chain_id,
                nonce,
                max_priority_fee_per_gas,
                max_fee_per_gas,
                gas_limit,
                to,
                value,
                data,
                access_list,
                authorization_list: self.authorization_list.clone().unwrap_or_default(),
                signature: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::tests::MockKzg;
    use crate::transaction::Authorization;
    use crate::utils::bytes_to_hex_str;
    use crate::PrivateKey;
    use num_traits::Bounded;

    fn key() -> PrivateKey {
        "4646464646464646464646464646464646464646464646464646464646464646"
            .parse()
            .unwrap()
    }

    fn to() -> Address {
        "0x3535353535353535353535353535353535353535".parse().unwrap()
    }

    fn base() -> TransactionRequest {
        TransactionRequest {
            chain_id: Some(1u8.into()),
            gas_limit: Some(21_000u32.into()),
            to: Some(to()),
            ..Default::default()
        }
    }

    fn blob_hash() -> [u8; 32] {
        let mut hash = [0x11u8; 32];
        hash[0] = VERSIONED_HASH_VERSION_KZG;
        hash
    }

    #[test]
    fn infers_each_type() {
        let legacy = TransactionRequest {
            gas_price: Some(1u8.into()),
            ..base()
        };
        assert_eq!(legacy.infer_type().unwrap(), TransactionType::Legacy);

        let access = TransactionRequest {
            access_list: Some(Vec::new()),
            ..legacy.clone()
        };
        assert_eq!(access.infer_type().unwrap(), TransactionType::Eip2930);

        let fee_market = TransactionRequest {
            max_fee_per_gas: Some(2u8.into()),
            access_list: Some(Vec::new()),
            ..base()
        };
        assert_eq!(fee_market.infer_type().unwrap(), TransactionType::Eip1559);

        let blob = TransactionRequest {
            max_fee_per_blob_gas: Some(1u8.into()),
            ..fee_market.clone()
        };
        assert_eq!(blob.infer_type().unwrap(), TransactionType::Eip4844);

        let auth = TransactionRequest {
            authorization_list: Some(Vec::new()),
            ..fee_market
        };
        assert_eq!(auth.infer_type().unwrap(), TransactionType::Eip7702);

        assert_eq!(
            TransactionRequest::default().infer_type().unwrap(),
            TransactionType::Legacy
        );
    }

    #[test]
    fn conflicting_fields_are_ambiguous() {
        let req = TransactionRequest {
            gas_price: Some(1u8.into()),
            max_fee_per_gas: Some(2u8.into()),
            ..base()
        };
        match req.infer_type() {
            Err(Error::AmbiguousTransactionType { fields }) => {
                assert_eq!(fields, vec!["gasPrice", "maxFeePerGas"])
            }
            other => panic!("unexpected {other:?}"),
        }

        let req = TransactionRequest {
            blob_versioned_hashes: Some(vec![blob_hash()]),
            authorization_list: Some(Vec::new()),
            ..base()
        };
        match req.infer_type() {
            Err(Error::AmbiguousTransactionType { fields }) => {
                assert_eq!(fields, vec!["blobVersionedHashes", "authorizationList"])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn explicit_type_must_agree() {
        let req = TransactionRequest {
            tx_type: Some(TransactionType::Eip1559),
            gas_price: Some(1u8.into()),
            ..base()
        };
        match req.infer_type() {
            Err(Error::AmbiguousTransactionType { fields }) => {
                assert_eq!(fields, vec!["type", "gasPrice"])
            }
            other => panic!("unexpected {other:?}"),
        }

        // a legacy field set may be sent as an access list transaction
        let req = TransactionRequest {
            tx_type: Some(TransactionType::Eip2930),
            gas_price: Some(1u8.into()),
            ..base()
        };
        assert_eq!(req.infer_type().unwrap(), TransactionType::Eip2930);
        assert!(matches!(
            req.build().unwrap(),
            Transaction::Eip2930 { ref access_list, .. } if access_list.is_empty()
        ));
    }

    #[test]
    fn fee_cap_below_tip_is_rejected() {
        let req = TransactionRequest {
            max_fee_per_gas: Some(1u8.into()),
            max_priority_fee_per_gas: Some(2u8.into()),
            ..base()
        };
        assert!(matches!(
            req.build(),
            Err(Error::FeeCapTooLow { .. })
        ));
    }

    #[test]
    fn missing_and_invalid_fields() {
        let req = TransactionRequest {
            max_fee_per_gas: Some(2u8.into()),
            ..base()
        };
        assert!(matches!(
            req.validate(),
            Err(Error::MissingField {
                tx_type: "eip1559",
                field: "maxPriorityFeePerGas"
            })
        ));

        let req = TransactionRequest {
            chain_id: None,
            access_list: Some(Vec::new()),
            gas_price: Some(1u8.into()),
            ..base()
        };
        assert!(matches!(
            req.validate(),
            Err(Error::MissingField {
                field: "chainId",
                ..
            })
        ));

        let req = TransactionRequest {
            chain_id: Some(0u8.into()),
            gas_price: Some(1u8.into()),
            ..base()
        };
        assert!(matches!(req.validate(), Err(Error::InvalidNetworkId)));

        let req = TransactionRequest {
            gas_price: Some(Uint256::max_value()),
            ..base()
        };
        assert!(matches!(
            req.validate(),
            Err(Error::FeeOverflow { field: "gasPrice" })
        ));

        let req = TransactionRequest {
            max_fee_per_gas: Some(2u8.into()),
            max_priority_fee_per_gas: Some(1u8.into()),
            authorization_list: Some(Vec::new()),
            ..base()
        };
        assert!(matches!(
            req.validate(),
            Err(Error::MissingField {
                field: "authorizationList",
                ..
            })
        ));
    }

    #[test]
    fn blob_hash_checks() {
        let mut bad = blob_hash();
        bad[0] = 0x02;
        let req = TransactionRequest {
            max_fee_per_gas: Some(2u8.into()),
            max_priority_fee_per_gas: Some(1u8.into()),
            max_fee_per_blob_gas: Some(1u8.into()),
            blob_versioned_hashes: Some(vec![blob_hash(), bad]),
            ..base()
        };
        assert!(matches!(
            req.validate(),
            Err(Error::InvalidVersionedHash {
                index: 1,
                version: 0x02
            })
        ));

        let empty = TransactionRequest {
            blob_versioned_hashes: Some(Vec::new()),
            ..req.clone()
        };
        assert!(matches!(
            empty.validate(),
            Err(Error::MissingField {
                field: "blobVersionedHashes",
                ..
            })
        ));

        let no_to = TransactionRequest {
            to: None,
            blob_versioned_hashes: Some(vec![blob_hash()]),
            ..req
        };
        assert!(matches!(
            no_to.validate(),
            Err(Error::MissingField { field: "to", .. })
        ));
    }

    #[test]
    fn build_matches_hand_written_transaction() {
        let req = TransactionRequest {
            nonce: Some(1u8.into()),
            max_priority_fee_per_gas: Some(1_000_000_000u64.into()),
            max_fee_per_gas: Some(2_000_000_000u64.into()),
            value: Some(1_000_000_000_000_000_000u64.into()),
            ..base()
        };
        let signed = req.build().unwrap().sign(&key(), Some(1)).unwrap();
        assert_eq!(
            bytes_to_hex_str(&signed.hash().unwrap()),
            "c504b87439b974d2a19d1bb84fd7f82e794222fe71704541b2c7d586551b70c0"
        );
    }

    #[test]
    fn build_blob_from_sidecars() {
        let sidecars = BlobSidecars::from_data(b"calldata is expensive", &MockKzg).unwrap();
        let req = TransactionRequest {
            max_fee_per_gas: Some(2u8.into()),
            max_priority_fee_per_gas: Some(1u8.into()),
            max_fee_per_blob_gas: Some(1u8.into()),
            sidecars: Some(sidecars.clone()),
            ..base()
        };
        let tx = req.build().unwrap();
        match &tx {
            Transaction::Eip4844 {
                blob_versioned_hashes,
                sidecars: Some(attached),
                ..
            } => {
                assert_eq!(*blob_versioned_hashes, sidecars.versioned_hashes());
                assert_eq!(*attached, sidecars);
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut wrong = sidecars.versioned_hashes();
        wrong[0][31] ^= 1;
        let mismatched = TransactionRequest {
            blob_versioned_hashes: Some(wrong),
            ..req
        };
        assert!(matches!(
            mismatched.validate(),
            Err(Error::InvalidVersionedHash { index: 0, .. })
        ));
    }

    #[test]
    fn build_set_code_transaction() {
        let authorization = key()
            .sign_authorization(Authorization::new(1u8.into(), to(), 5))
            .unwrap();
        let req = TransactionRequest {
            nonce: Some(4u8.into()),
            max_priority_fee_per_gas: Some(1_000_000_000u64.into()),
            max_fee_per_gas: Some(2_000_000_000u64.into()),
            gas_limit: Some(50_000u32.into()),
            authorization_list: Some(vec![authorization]),
            ..base()
        };
        let tx = req.build().unwrap();
        assert_eq!(tx.transaction_type(), TransactionType::Eip7702);
        assert_eq!(
            bytes_to_hex_str(&tx.signing_hash().unwrap()),
            "18b2c97b719ce1aa8ded1b5395b063425e6102f4b5c319fa7cbb7d761c80dea4"
        );
    }
}
