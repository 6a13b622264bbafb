//! EIP-7702 set code authorizations

use crate::address::Address;
use crate::constants::EIP7702_AUTHORIZATION_MAGIC;
use crate::error::Error;
use crate::rlp::{encode_rlp, RlpToken};
use crate::signature::Signature;
use crate::utils::keccak256;
use num256::Uint256;

/// Permission for `address`'s code to run in the signing account. A chain id
/// of zero is valid on every chain.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub chain_id: Uint256,
    pub address: Address,
    pub nonce: u64,
}

impl Authorization {
    pub fn new(chain_id: Uint256, address: Address, nonce: u64) -> Authorization {
        Authorization {
            chain_id,
            address,
            nonce,
        }
    }

    fn rlp_fields(&self) -> Vec<RlpToken> {
        vec![
            self.chain_id.into(),
            self.address.into(),
            self.nonce.into(),
        ]
    }

    /// `keccak256(0x05 ++ rlp([chainId, address, nonce]))`
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut data = vec![EIP7702_AUTHORIZATION_MAGIC];
        data.extend_from_slice(&encode_rlp(&RlpToken::List(self.rlp_fields())));
        keccak256(&data)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SignedAuthorization {
    #[serde(flatten)]
    pub authorization: Authorization,
    pub signature: Signature,
}

impl SignedAuthorization {
    /// The account that granted this authorization
    pub fn recover_authority(&self) -> Result<Address, Error> {
        self.signature.recover(&self.authorization.signing_hash())
    }

    /// `[chainId, address, nonce, yParity, r, s]` as carried by a 0x04 transaction
    pub fn to_rlp(&self) -> RlpToken {
        let mut fields = self.authorization.rlp_fields();
        fields.push(self.signature.y_parity.into());
        fields.push(self.signature.r.into());
        fields.push(self.signature.s.into());
        RlpToken::List(fields)
    }

    pub fn from_rlp(token: &RlpToken) -> Result<SignedAuthorization, Error> {
        let fields = token.as_list()?;
        if fields.len() != 6 {
            debug!("Authorization tuple with {} fields", fields.len());
            return Err(Error::DeserializeRlp);
        }
        let y_parity = match fields[3].to_u64()? {
            0 => false,
            1 => true,
            _ => return Err(Error::InvalidV),
        };
        Ok(SignedAuthorization {
            authorization: Authorization {
                chain_id: fields[0].to_uint()?,
                address: Address::from_rlp_data(&fields[1])?,
                nonce: fields[2].to_u64()?,
            },
            signature: Signature::new(y_parity, fields[4].to_uint()?, fields[5].to_uint()?),
        })
    }
}

pub(crate) fn authorization_list_to_rlp(list: &[SignedAuthorization]) -> RlpToken {
    RlpToken::List(list.iter().map(|a| a.to_rlp()).collect())
}

pub(crate) fn authorization_list_from_rlp(
    token: &RlpToken,
) -> Result<Vec<SignedAuthorization>, Error> {
    token
        .as_list()?
        .iter()
        .map(SignedAuthorization::from_rlp)
        .collect()
}
