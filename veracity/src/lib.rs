//! # Introduction
//! Veracity is the encoding and signing core of an Ethereum client, written in pure Rust.
//!
//! ## Features
//! * RLP and ABI codecs with strict canonical decoding
//! * Legacy, EIP-2930, EIP-1559, EIP-4844 and EIP-7702 transaction envelopes
//! * Pluggable per-chain envelope serializers
//! * Personal message and EIP-712 typed data signing, low-s signatures
//! * EIP-7702 authorizations, ERC-6492 and ERC-8010 wrapped signatures
//! * Blob packing with an injected KZG backend
//!
//! ## Getting started
//! Here's an example lifetime of an Alice-to-Bob Ethereum transaction made with Veracity:
//! ```rust
//! use veracity::{Address, PrivateKey, Transaction, TransactionRequest};
//!
//! // A helper for filling the keys
//! let alices_key = PrivateKey::from_slice(&[0x46; 32]).unwrap();
//! let bobs_key = PrivateKey::from_slice(&[0x47; 32]).unwrap();
//!
//! // The envelope is inferred from the fee fields
//! let tx = TransactionRequest {
//!     chain_id: Some(1u8.into()),
//!     max_fee_per_gas: Some(2_000_000_000u64.into()),
//!     max_priority_fee_per_gas: Some(1_000_000_000u64.into()),
//!     gas_limit: Some(21_000u32.into()),
//!     to: Some(bobs_key.to_address()),
//!     value: Some(100u32.into()),
//!     ..Default::default()
//! }
//! .build()
//! .unwrap();
//!
//! let tx_signed: Transaction = tx.sign(&alices_key, None).unwrap();
//! assert!(tx_signed.is_valid());
//!
//! // You can always derive the sender from a signed transaction
//! let sender: Address = tx_signed.sender().unwrap();
//! assert_eq!(sender, alices_key.to_address());
//!
//! // and get the same transaction back from its raw bytes
//! let raw = tx_signed.to_bytes().unwrap();
//! assert_eq!(Transaction::decode_from_rlp(&raw).unwrap(), tx_signed);
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

extern crate num_traits;
extern crate secp256k1;
extern crate serde;
extern crate sha3;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;
extern crate num256;

pub mod abi;
pub mod address;
pub mod blob;
pub mod cache;
pub mod constants;
mod context;
pub mod error;
pub mod hash;
pub mod private_key;
mod raw_private_key;
pub mod rlp;
pub mod signature;
pub mod transaction;
pub mod typed_data;
pub mod utils;
pub mod wrapped_signature;

pub use address::Address;
pub use error::{Error, ErrorKind};
pub use num256::Uint256;
pub use private_key::PrivateKey;
pub use signature::Signature;
pub use transaction::{
    AccessListItem, Authorization, Chain, ChainSerializer, ChainTransaction, SignedAuthorization,
    Transaction, TransactionRequest, TransactionType,
};
pub use typed_data::TypedData;
