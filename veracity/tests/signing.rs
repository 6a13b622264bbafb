extern crate serde_json;
#[macro_use]
extern crate serde_derive;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use veracity::hash::{hash_message, namehash, verify_message};
use veracity::typed_data::{hash_typed_data, verify_typed_data};
use veracity::utils::{bytes_to_data, keccak256};
use veracity::wrapped_signature::{
    is_erc6492_signature, is_erc8010_signature, unwrap_erc6492, unwrap_erc8010, wrap_erc6492,
    wrap_erc8010,
};
use veracity::{Address, Authorization, PrivateKey, Signature, TypedData};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypedDataFixture {
    signer: Address,
    digest: String,
    signature: Signature,
    typed_data: TypedData,
}

fn load_typed_data_fixture() -> TypedDataFixture {
    let mut path = Path::new(env!("CARGO_MANIFEST_DIR")).to_path_buf();
    path.push("tests");
    path.push("fixtures");
    path.push("typed_data.json");
    let file = File::open(&path).unwrap_or_else(|_| panic!("Could not open file {path:?}"));
    serde_json::from_reader(BufReader::new(file)).unwrap()
}

fn key() -> PrivateKey {
    PrivateKey::from_slice(&[0x46; 32]).unwrap()
}

#[test]
fn typed_data_fixture() {
    let fixture = load_typed_data_fixture();
    assert_eq!(
        bytes_to_data(&hash_typed_data(&fixture.typed_data).unwrap()),
        fixture.digest
    );
    assert!(verify_typed_data(&fixture.signer, &fixture.typed_data, &fixture.signature).unwrap());

    let cow = PrivateKey::from_bytes(keccak256(b"cow")).unwrap();
    assert_eq!(cow.to_address(), fixture.signer);
    assert_eq!(
        cow.sign_typed_data(&fixture.typed_data).unwrap(),
        fixture.signature
    );
    assert!(!verify_typed_data(&key().to_address(), &fixture.typed_data, &fixture.signature).unwrap());
}

#[test]
fn personal_message_round_trip() {
    let key = key();
    let signature = key.sign_ethereum_msg(b"hello world").unwrap();
    assert!(signature.is_low_s());
    assert!(verify_message(&key.to_address(), b"hello world", &signature));
    assert!(!verify_message(&key.to_address(), b"hello world!", &signature));

    let parsed: Signature = signature.to_string().parse().unwrap();
    assert_eq!(parsed, signature);
    assert_eq!(
        parsed.recover(&hash_message(b"hello world")).unwrap(),
        key.to_address()
    );
}

#[test]
fn counterfactual_signature_round_trip() {
    let key = key();
    let signature = key.sign_ethereum_msg(b"hello world").unwrap().to_bytes();
    let factory: Address = "0x3535353535353535353535353535353535353535".parse().unwrap();

    let wrapped = wrap_erc6492(factory, &[0xde, 0xad, 0xbe, 0xef], &signature).unwrap();
    assert!(is_erc6492_signature(&wrapped));
    let inner = unwrap_erc6492(&wrapped).unwrap();
    assert_eq!(inner.factory, Some(factory));
    let inner = Signature::from_bytes(&inner.signature).unwrap();
    assert!(verify_message(&key.to_address(), b"hello world", &inner));
}

#[test]
fn delegated_signature_round_trip() {
    let key = key();
    let delegation: Address = "0x3535353535353535353535353535353535353535".parse().unwrap();
    let authorization = key
        .sign_authorization(Authorization::new(1u8.into(), delegation, 0))
        .unwrap();
    let signature = key.sign_ethereum_msg(b"hello world").unwrap().to_bytes();

    let wrapped = wrap_erc8010(&signature, &authorization, None, None).unwrap();
    assert!(is_erc8010_signature(&wrapped));
    let parts = unwrap_erc8010(&wrapped).unwrap();
    assert_eq!(parts.authorization.recover_authority().unwrap(), key.to_address());
    assert_eq!(parts.signature, signature.to_vec());
}

#[test]
fn ens_namehash() {
    assert_eq!(namehash(""), [0u8; 32]);
    assert_eq!(
        bytes_to_data(&namehash("eth")),
        "0x93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae"
    );
    assert_eq!(
        bytes_to_data(&namehash("foo.eth")),
        "0xde9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f"
    );
}
