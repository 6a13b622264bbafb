extern crate serde_json;
#[macro_use]
extern crate serde_derive;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use veracity::error::ErrorKind;
use veracity::utils::{bytes_to_data, hex_str_to_bytes};
use veracity::{Address, Transaction, TransactionType, Uint256};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TransactionFixture {
    name: String,
    #[serde(rename = "type")]
    tx_type: TransactionType,
    raw: String,
    chain_id: Option<u64>,
    sender: Address,
    signing_hash: Option<String>,
    hash: Option<String>,
}

#[derive(Deserialize, Debug)]
struct InvalidFixture {
    name: String,
    raw: String,
    kind: String,
}

fn get_fixtures_path() -> PathBuf {
    let mut path = Path::new(env!("CARGO_MANIFEST_DIR")).to_path_buf();
    path.push("tests");
    path.push("fixtures");
    path
}

fn load_fixture<T: serde::de::DeserializeOwned>(name: &str) -> Vec<T> {
    let mut path = get_fixtures_path();
    path.push(name);
    let file = File::open(&path).unwrap_or_else(|_| panic!("Could not open file {path:?}"));
    serde_json::from_reader(BufReader::new(file))
        .unwrap_or_else(|e| panic!("Unable to deserialize {path:?}: {e}"))
}

#[test]
fn valid_transactions() {
    let _ = env_logger::builder().is_test(true).try_init();
    let fixtures: Vec<TransactionFixture> = load_fixture("transactions.json");
    assert!(!fixtures.is_empty());
    for fixture in fixtures {
        let raw = hex_str_to_bytes(&fixture.raw).unwrap();
        let tx = Transaction::decode_from_rlp(&raw)
            .unwrap_or_else(|e| panic!("{} failed to decode: {e}", fixture.name));

        assert_eq!(tx.transaction_type(), fixture.tx_type, "{}", fixture.name);
        assert_eq!(tx.to_bytes().unwrap(), raw, "{} did not re-encode", fixture.name);
        assert_eq!(
            tx.get_chain_id(),
            fixture.chain_id.map(Uint256::from),
            "{}",
            fixture.name
        );
        assert_eq!(tx.sender().unwrap(), fixture.sender, "{}", fixture.name);
        assert!(tx.is_valid(), "{} is not valid", fixture.name);
        if let Some(signing_hash) = &fixture.signing_hash {
            assert_eq!(&bytes_to_data(&tx.signing_hash().unwrap()), signing_hash, "{}", fixture.name);
        }
        if let Some(hash) = &fixture.hash {
            assert_eq!(&bytes_to_data(&tx.hash().unwrap()), hash, "{}", fixture.name);
        }
        assert_eq!(tx.to_string(), fixture.raw, "{}", fixture.name);
    }
}

#[test]
fn invalid_transactions() {
    let fixtures: Vec<InvalidFixture> = load_fixture("invalid_transactions.json");
    for fixture in fixtures {
        let raw = hex_str_to_bytes(&fixture.raw).unwrap();
        let err = match Transaction::decode_from_rlp(&raw) {
            Ok(tx) => panic!("{} decoded to {tx:?}", fixture.name),
            Err(e) => e,
        };
        let expected = match fixture.kind.as_str() {
            "DataSize" => ErrorKind::DataSize,
            "InvalidFormat" => ErrorKind::InvalidFormat,
            "UnsupportedType" => ErrorKind::UnsupportedType,
            "SignatureInvalid" => ErrorKind::SignatureInvalid,
            "ChainMismatch" => ErrorKind::ChainMismatch,
            "FeeCapTooLow" => ErrorKind::FeeCapTooLow,
            other => panic!("unknown kind {other}"),
        };
        assert_eq!(err.kind(), expected, "{}: {err}", fixture.name);
    }
}

#[test]
fn tampered_signature_changes_sender() {
    let fixtures: Vec<TransactionFixture> = load_fixture("transactions.json");
    let fixture = &fixtures[0];
    let mut raw = hex_str_to_bytes(&fixture.raw).unwrap();
    // last byte of s
    let last = raw.len() - 1;
    raw[last] ^= 0x01;
    let tx = Transaction::decode_from_rlp(&raw).unwrap();
    match tx.sender() {
        Ok(sender) => assert_ne!(sender, fixture.sender),
        Err(e) => assert_eq!(e.kind(), ErrorKind::SignatureInvalid),
    }
}
