//! Signature envelopes for accounts that do not have their code yet
//!
//! ERC-6492 wraps a signature with the factory call that deploys the signing
//! contract, ERC-8010 wraps it with the EIP-7702 authorization that delegates
//! the signing account. Both are recognised by a 32 byte magic suffix.

use crate::abi::{decode_types, encode_types, AbiToken, AbiType};
use crate::address::Address;
use crate::constants::{ERC6492_MAGIC_SUFFIX, ERC8010_MAGIC_SUFFIX};
use crate::error::Error;
use crate::signature::Signature;
use crate::transaction::{Authorization, SignedAuthorization};
use num256::Uint256;
use num_traits::ToPrimitive;
use subtle::ConstantTimeEq;

fn has_suffix(data: &[u8], magic: &[u8; 32]) -> bool {
    if data.len() < magic.len() {
        return false;
    }
    data[data.len() - magic.len()..].ct_eq(&magic[..]).into()
}

/// An ERC-6492 signature split into its parts, `factory` and
/// `factory_data` are `None` for a signature that was not wrapped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc6492Signature {
    pub factory: Option<Address>,
    pub factory_data: Option<Vec<u8>>,
    pub signature: Vec<u8>,
}

fn erc6492_types() -> [AbiType; 3] {
    [AbiType::Address, AbiType::Bytes, AbiType::Bytes]
}

/// `abi.encode(factory, factoryCalldata, signature) ++ magic`
pub fn wrap_erc6492(
    factory: Address,
    factory_data: &[u8],
    signature: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut out = encode_types(
        &erc6492_types(),
        &[
            AbiToken::Address(factory),
            AbiToken::UnboundedBytes(factory_data.to_vec()),
            AbiToken::UnboundedBytes(signature.to_vec()),
        ],
    )?;
    out.extend_from_slice(&ERC6492_MAGIC_SUFFIX);
    Ok(out)
}

pub fn is_erc6492_signature(signature: &[u8]) -> bool {
    has_suffix(signature, &ERC6492_MAGIC_SUFFIX)
}

pub fn unwrap_erc6492(signature: &[u8]) -> Result<Erc6492Signature, Error> {
    if !is_erc6492_signature(signature) {
        return Ok(Erc6492Signature {
            factory: None,
            factory_data: None,
            signature: signature.to_vec(),
        });
    }
    let body = &signature[..signature.len() - ERC6492_MAGIC_SUFFIX.len()];
    let mut tokens = decode_types(&erc6492_types(), body)?.into_iter();
    match (tokens.next(), tokens.next(), tokens.next()) {
        (
            Some(AbiToken::Address(factory)),
            Some(AbiToken::UnboundedBytes(factory_data)),
            Some(AbiToken::UnboundedBytes(signature)),
        ) => Ok(Erc6492Signature {
            factory: Some(factory),
            factory_data: Some(factory_data),
            signature,
        }),
        _ => Err(Error::InvalidWrappedSignature("erc6492 body")),
    }
}

/// An ERC-8010 signature split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc8010Signature {
    pub authorization: SignedAuthorization,
    /// Contract to call before verifying, `None` when the envelope carries the zero address
    pub to: Option<Address>,
    pub data: Option<Vec<u8>>,
    pub signature: Vec<u8>,
}

fn erc8010_types() -> [AbiType; 3] {
    [
        AbiType::Tuple(vec![
            AbiType::Uint(256),
            AbiType::Address,
            AbiType::Uint(256),
            AbiType::Uint(8),
            AbiType::Uint(256),
            AbiType::Uint(256),
        ]),
        AbiType::Address,
        AbiType::Bytes,
    ]
}

/// `signature ++ abi.encode(authorization, to, data) ++ uint256(len) ++ magic`
/// where `len` is the byte length of the encoded suffix
pub fn wrap_erc8010(
    signature: &[u8],
    authorization: &SignedAuthorization,
    to: Option<Address>,
    data: Option<&[u8]>,
) -> Result<Vec<u8>, Error> {
    let auth = &authorization.authorization;
    let sig = &authorization.signature;
    let suffix = encode_types(
        &erc8010_types(),
        &[
            AbiToken::Struct(vec![
                AbiToken::Uint(auth.chain_id),
                AbiToken::Address(auth.address),
                AbiToken::Uint(auth.nonce.into()),
                AbiToken::Uint(u8::from(sig.y_parity).into()),
                AbiToken::Uint(sig.r),
                AbiToken::Uint(sig.s),
            ]),
            AbiToken::Address(to.unwrap_or_default()),
            AbiToken::UnboundedBytes(data.unwrap_or_default().to_vec()),
        ],
    )?;
    let mut out = Vec::with_capacity(signature.len() + suffix.len() + 64);
    out.extend_from_slice(signature);
    out.extend_from_slice(&suffix);
    out.extend_from_slice(&Uint256::from(suffix.len()).to_be_bytes());
    out.extend_from_slice(&ERC8010_MAGIC_SUFFIX);
    Ok(out)
}

pub fn is_erc8010_signature(signature: &[u8]) -> bool {
    signature.len() >= 64 && has_suffix(signature, &ERC8010_MAGIC_SUFFIX)
}

fn authorization_from_token(token: AbiToken) -> Result<SignedAuthorization, Error> {
    let members = match token {
        AbiToken::Struct(members) => members,
        _ => return Err(Error::InvalidWrappedSignature("erc8010 authorization")),
    };
    match members.as_slice() {
        [AbiToken::Uint(chain_id), AbiToken::Address(address), AbiToken::Uint(nonce), AbiToken::Uint(y_parity), AbiToken::Uint(r), AbiToken::Uint(s)] =>
        {
            let nonce = nonce
                .to_u64()
                .ok_or(Error::InvalidWrappedSignature("erc8010 nonce"))?;
            let y_parity = match y_parity.to_u8() {
                Some(0) => false,
                Some(1) => true,
                _ => return Err(Error::InvalidV),
            };
            Ok(SignedAuthorization {
                authorization: Authorization::new(*chain_id, *address, nonce),
                signature: Signature::new(y_parity, *r, *s),
            })
        }
        _ => Err(Error::InvalidWrappedSignature("erc8010 authorization")),
    }
}

pub fn unwrap_erc8010(signature: &[u8]) -> Result<Erc8010Signature, Error> {
    if !is_erc8010_signature(signature) {
        return Err(Error::InvalidWrappedSignature("missing erc8010 suffix"));
    }
    let end = signature.len() - 64;
    let suffix_len = Uint256::from_be_bytes(&signature[end..end + 32])
        .to_usize()
        .filter(|len| *len <= end)
        .ok_or(Error::InvalidWrappedSignature("erc8010 suffix length"))?;
    let start = end - suffix_len;
    let mut tokens = decode_types(&erc8010_types(), &signature[start..end])?.into_iter();
    match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(auth), Some(AbiToken::Address(to)), Some(AbiToken::UnboundedBytes(data))) => {
            Ok(Erc8010Signature {
                authorization: authorization_from_token(auth)?,
                to: if to == Address::default() {
                    None
                } else {
                    Some(to)
                },
                data: if data.is_empty() { None } else { Some(data) },
                signature: signature[..start].to_vec(),
            })
        }
        _ => Err(Error::InvalidWrappedSignature("erc8010 body")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{hash_message, verify_message};
    use crate::utils::{bytes_to_hex_str, hex_str_to_bytes};
    use crate::PrivateKey;

    fn key() -> PrivateKey {
        "4646464646464646464646464646464646464646464646464646464646464646"
            .parse()
            .unwrap()
    }

    #[test]
    fn erc6492_layout_and_round_trip() {
        let factory: Address = "0x3535353535353535353535353535353535353535".parse().unwrap();
        let calldata = hex_str_to_bytes("0xdeadbeef").unwrap();
        let signature = key().sign_ethereum_msg(b"hello").unwrap().to_bytes();

        let wrapped = wrap_erc6492(factory, &calldata, &signature).unwrap();
        assert!(is_erc6492_signature(&wrapped));
        assert!(!is_erc6492_signature(&signature));
        assert_eq!(
            bytes_to_hex_str(&wrapped[wrapped.len() - 32..]),
            "6492".repeat(16)
        );
        // head: factory, offset 0x60, offset 0xa0
        assert_eq!(&wrapped[12..32], factory.as_bytes());
        assert_eq!(wrapped[63], 0x60);
        assert_eq!(wrapped[95], 0xa0);

        let parts = unwrap_erc6492(&wrapped).unwrap();
        assert_eq!(parts.factory, Some(factory));
        assert_eq!(parts.factory_data, Some(calldata));
        assert_eq!(parts.signature, signature.to_vec());
    }

    #[test]
    fn erc6492_passes_plain_signatures_through() {
        let signature = key().sign_ethereum_msg(b"hello").unwrap().to_bytes();
        let parts = unwrap_erc6492(&signature).unwrap();
        assert_eq!(parts.factory, None);
        assert_eq!(parts.factory_data, None);
        assert_eq!(parts.signature, signature.to_vec());
    }

    #[test]
    fn erc8010_round_trip() {
        let key = key();
        let delegation: Address = "0x3535353535353535353535353535353535353535".parse().unwrap();
        let authorization = key
            .sign_authorization(Authorization::new(1u8.into(), delegation, 3))
            .unwrap();
        let signature = key.sign_ethereum_msg(b"hello").unwrap();

        let wrapped = wrap_erc8010(&signature.to_bytes(), &authorization, None, None).unwrap();
        assert!(is_erc8010_signature(&wrapped));
        assert!(!is_erc6492_signature(&wrapped));
        // static tuple of six words, to, data offset, data length
        let suffix_len = 32 * 9;
        assert_eq!(wrapped.len(), 65 + suffix_len + 64);
        assert_eq!(
            Uint256::from_be_bytes(&wrapped[65 + suffix_len..65 + suffix_len + 32]),
            Uint256::from(suffix_len)
        );

        let parts = unwrap_erc8010(&wrapped).unwrap();
        assert_eq!(parts.authorization, authorization);
        assert_eq!(parts.to, None);
        assert_eq!(parts.data, None);
        assert_eq!(parts.authorization.recover_authority().unwrap(), key.to_address());
        let inner = Signature::from_bytes(&parts.signature).unwrap();
        assert!(verify_message(&key.to_address(), b"hello", &inner));
        assert_eq!(inner.recover(&hash_message(b"hello")).unwrap(), key.to_address());
    }

    #[test]
    fn erc8010_with_call() {
        let key = key();
        let authorization = key
            .sign_authorization(Authorization::new(0u8.into(), Address::default(), 0))
            .unwrap();
        let to: Address = "0x3535353535353535353535353535353535353535".parse().unwrap();
        let data = vec![0xaa; 40];
        let wrapped = wrap_erc8010(&[1, 2, 3], &authorization, Some(to), Some(&data)).unwrap();
        let parts = unwrap_erc8010(&wrapped).unwrap();
        assert_eq!(parts.to, Some(to));
        assert_eq!(parts.data, Some(data));
        assert_eq!(parts.signature, vec![1, 2, 3]);
    }

    #[test]
    fn erc8010_rejects_bad_lengths() {
        assert!(unwrap_erc8010(&[0u8; 10]).is_err());
        let mut forged = vec![0xffu8; 32];
        forged.extend_from_slice(&ERC8010_MAGIC_SUFFIX);
        assert!(matches!(
            unwrap_erc8010(&forged),
            Err(Error::InvalidWrappedSignature(_))
        ));
    }
}
