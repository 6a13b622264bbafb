use crate::address::Address;
use crate::context::SECP256K1;
use crate::error::Error;
use crate::hash::hash_message;
use crate::raw_private_key::RawPrivateKey;
use crate::signature::Signature;
use crate::transaction::{Authorization, SignedAuthorization};
use crate::typed_data::{hash_typed_data, TypedData};
use crate::utils::{bytes_to_hex_str, keccak256, to_array};
use num256::Uint256;
use secp256k1::ecdsa::RecoveryId;
use secp256k1::{Message, SecretKey};
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use std::fmt::{self, Debug, Display};
use std::str::FromStr;

/// Representation of an Ethereum private key.
///
/// A key is validated on construction and caches its address. Every
/// signature it produces is in low-s form.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash)]
pub struct PrivateKey {
    key: [u8; 32],
    address: Address,
}

impl FromStr for PrivateKey {
    type Err = Error;

    /// Parses 64 hex characters, optionally prefixed with `0x`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: RawPrivateKey = s.parse()?;
        PrivateKey::from_raw(raw)
    }
}

impl TryFrom<[u8; 32]> for PrivateKey {
    type Error = Error;
    fn try_from(val: [u8; 32]) -> Result<PrivateKey, Error> {
        PrivateKey::from_bytes(val)
    }
}

impl PrivateKey {
    fn from_raw(raw: RawPrivateKey) -> Result<PrivateKey, Error> {
        let address = raw.to_address()?;
        Ok(PrivateKey {
            key: raw.to_bytes(),
            address,
        })
    }

    /// Validates 32 bytes as a secp256k1 scalar
    pub fn from_bytes(bytes: [u8; 32]) -> Result<PrivateKey, Error> {
        PrivateKey::from_raw(bytes.into())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<PrivateKey, Error> {
        if bytes.len() != 32 {
            return Err(Error::InvalidPrivKeyLength {
                got: bytes.len(),
                expected: 32,
            });
        }
        PrivateKey::from_bytes(to_array(bytes)?)
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.key
    }

    /// The address controlled by this key
    ///
    /// ```rust
    /// use veracity::PrivateKey;
    /// let private_key: PrivateKey = "c85ef7d79691fe79573b1a7064c19c1a9819ebdbd1faaab1a8ec92344438aaf4".parse().unwrap();
    /// assert_eq!(
    ///     private_key.to_address().to_string(),
    ///     "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"
    /// );
    /// ```
    pub fn to_address(self) -> Address {
        self.address
    }

    /// Signs a 32 byte digest.
    ///
    /// The result is normalized to low-s, the recovery bit follows the
    /// normalization.
    ///
    /// ```rust
    /// use veracity::PrivateKey;
    /// use veracity::utils::keccak256;
    /// let private_key: PrivateKey = "0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f1e".parse().unwrap();
    /// let hash = keccak256(b"Hello, world!");
    /// let signature = private_key.sign_hash(&hash).unwrap();
    /// assert!(signature.is_valid());
    /// ```
    pub fn sign_hash(&self, data: &[u8]) -> Result<Signature, Error> {
        let digest: [u8; 32] =
            to_array(data).map_err(|_| Error::InvalidHashLength { got: data.len() })?;
        let sk = SecretKey::from_byte_array(&self.key).map_err(Error::DecodePrivKey)?;
        let msg = Message::from_digest(digest);
        let (recovery_id, compact) = SECP256K1.with(|object| {
            let context = object.borrow();
            context.sign_ecdsa_recoverable(&msg, &sk).serialize_compact()
        });
        let y_parity = match recovery_id {
            RecoveryId::Zero | RecoveryId::Two => false,
            RecoveryId::One | RecoveryId::Three => true,
        };
        let r = Uint256::from_be_bytes(&compact[0..32]);
        let s = Uint256::from_be_bytes(&compact[32..64]);
        Ok(Signature::new(y_parity, r, s).normalize())
    }

    /// Signs the keccak256 of `data` without any prefix.
    ///
    /// This does not prevent the signed data from being a valid transaction,
    /// prefer [`sign_ethereum_msg`](#method.sign_ethereum_msg). Use with caution!
    pub fn sign_insecure_msg(&self, data: &[u8]) -> Result<Signature, Error> {
        self.sign_hash(&keccak256(data))
    }

    /// Signs `data` as an EIP-191 personal message, see [`hash_message`]
    ///
    /// ```rust
    /// use veracity::PrivateKey;
    /// let private_key: PrivateKey = "0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f1e".parse().unwrap();
    /// let signature = private_key.sign_ethereum_msg(b"Hello, world!").unwrap();
    /// assert!(veracity::hash::verify_message(&private_key.to_address(), b"Hello, world!", &signature));
    /// ```
    pub fn sign_ethereum_msg(&self, data: &[u8]) -> Result<Signature, Error> {
        self.sign_hash(&hash_message(data))
    }

    /// Signs the EIP-712 digest of `typed_data`
    pub fn sign_typed_data(&self, typed_data: &TypedData) -> Result<Signature, Error> {
        self.sign_hash(&hash_typed_data(typed_data)?)
    }

    /// Signs an EIP-7702 authorization for this key's account
    pub fn sign_authorization(
        &self,
        authorization: Authorization,
    ) -> Result<SignedAuthorization, Error> {
        let signature = self.sign_hash(&authorization.signing_hash())?;
        Ok(SignedAuthorization {
            authorization,
            signature,
        })
    }
}

impl Display for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", bytes_to_hex_str(&self.to_bytes()))
    }
}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // keys stay out of logs
        write!(f, "PrivateKey({})", self.address)
    }
}

impl Serialize for PrivateKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D>(deserializer: D) -> Result<PrivateKey, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::LowerHex for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            write!(f, "0x")?;
        }
        write!(f, "{}", bytes_to_hex_str(&self.to_bytes()))
    }
}

impl fmt::UpperHex for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            write!(f, "0x")?;
        }
        write!(f, "{}", bytes_to_hex_str(&self.to_bytes()).to_uppercase())
    }
}

#[test]
fn too_short() {
    assert!(matches!(
        PrivateKey::from_str("abcdef"),
        Err(Error::InvalidPrivKeyLength { .. })
    ));
    assert!(matches!(
        PrivateKey::from_slice(&[1u8; 31]),
        Err(Error::InvalidPrivKeyLength {
            got: 31,
            expected: 32
        })
    ));
}

#[test]
fn invalid_data() {
    let key = "\u{012345}c85ef7d79691fe79573b1a7064c19c1a9819ebdbd1faaab1a8ec92344438";
    assert_eq!(key.len(), 64);
    assert!(PrivateKey::from_str(key).is_err());
}

#[test]
fn parse_address_1() {
    // https://github.com/ethereum/tests/blob/b44cea1cccf1e4b63a05d1ca9f70f2063f28da6d/BasicTests/txtest.json
    let key: PrivateKey = "c85ef7d79691fe79573b1a7064c19c1a9819ebdbd1faaab1a8ec92344438aaf4"
        .parse()
        .unwrap();
    assert_eq!(
        key.to_bytes(),
        [
            0xc8, 0x5e, 0xf7, 0xd7, 0x96, 0x91, 0xfe, 0x79, 0x57, 0x3b, 0x1a, 0x70, 0x64, 0xc1,
            0x9c, 0x1a, 0x98, 0x19, 0xeb, 0xdb, 0xd1, 0xfa, 0xaa, 0xb1, 0xa8, 0xec, 0x92, 0x34,
            0x44, 0x38, 0xaa, 0xf4
        ]
    );

    // geth account import <(echo c85ef7d79691fe79573b1a7064c19c1a9819ebdbd1faaab1a8ec92344438aaf4)
    assert_eq!(
        bytes_to_hex_str(key.to_address().as_bytes()),
        "cd2a3d9f938e13cd947ec05abc7fe734df8dd826"
    );
}

#[test]
fn parse_address_2() {
    let key: PrivateKey = "c87f65ff3f271bf5dc8643484f66b200109caffe4bf98c4cb393dc35740b28c0"
        .parse()
        .unwrap();
    // geth account import <(echo c87f65ff3f271bf5dc8643484f66b200109caffe4bf98c4cb393dc35740b28c0)
    assert_eq!(
        bytes_to_hex_str(key.to_address().as_bytes()),
        "13978aee95f38490e9769c39b2773ed763d9cd5f"
    );
}

#[test]
fn to_upper_and_lower_hex() {
    let key: PrivateKey = "c87f65ff3f271bf5dc8643484f66b200109caffe4bf98c4cb393dc35740b28c0"
        .parse()
        .unwrap();
    assert_eq!(
        format!("{key:X}"),
        "C87F65FF3F271BF5DC8643484F66B200109CAFFE4BF98C4CB393DC35740B28C0"
    );
    assert_eq!(
        format!("{key:#x}"),
        "0xc87f65ff3f271bf5dc8643484f66b200109caffe4bf98c4cb393dc35740b28c0"
    );
    // Debug never prints the secret
    assert!(!format!("{key:?}").contains("c87f65ff"));
}

#[test]
fn sign_message() {
    let key: PrivateKey = "c87f65ff3f271bf5dc8643484f66b200109caffe4bf98c4cb393dc35740b28c0"
        .parse()
        .unwrap();

    let hash = keccak256(b"Hello, world!");

    let sig = key.sign_hash(&hash).unwrap();
    assert_eq!(sig.v(), 27);
    assert_eq!(
        sig.get_r(),
        "60846573560682549108588594828362990367411621835316234394067988873897934296519"
            .parse()
            .unwrap()
    );
    assert_eq!(
        sig.get_s(),
        "38796436849307511461301231459196686786518980571289303247679628937607287361713"
            .parse()
            .unwrap()
    );

    let sig_2 = key.sign_insecure_msg(b"Hello, world!").unwrap();
    assert_eq!(sig, sig_2);

    // Recover address using just a signature
    let recovered = sig
        .recover(&hash)
        .expect("Unable to recover address from a signature");
    assert_eq!(recovered, key.to_address());

    assert!(matches!(
        key.sign_hash(&hash[..16]),
        Err(Error::InvalidHashLength { got: 16 })
    ));
}

#[test]
fn generate_ethereum_signature() {
    let private_key: PrivateKey =
        "0xc5e8f61d1ab959b397eecc0a37a6517b8e67a0e7cf1f4bce5591f3ed80199122"
            .parse()
            .unwrap();
    let address: Address = "0xc783df8a850f42e7f7e57013759c285caa701eb6"
        .parse()
        .unwrap();
    let checkpoint =
        crate::utils::hex_str_to_bytes("0x666f6f0000000000000000000000000000000000000000000000000000000000636865636b706f696e7400000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000a000000000000000000000000000000000000000000000000000000000000001200000000000000000000000000000000000000000000000000000000000000003000000000000000000000000c783df8a850f42e7f7e57013759c285caa701eb6000000000000000000000000ead9c93b79ae7c1591b1fb5323bd777e86e150d4000000000000000000000000e5904695748fe4a84b40b3fc79de2277660bd1d300000000000000000000000000000000000000000000000000000000000000030000000000000000000000000000000000000000000000000000000000000d050000000000000000000000000000000000000000000000000000000000000d050000000000000000000000000000000000000000000000000000000000000d05")
            .unwrap();
    let sig: Signature = "0xe108a7776de6b87183b0690484a74daef44aa6daf907e91abaf7bbfa426ae7706b12e0bd44ef7b0634710d99c2d81087a2f39e075158212343a3b2948ecf33d01c".parse().unwrap();

    assert_eq!(private_key.to_address(), address);

    // the checkpoint is signed as the personal message of its hash
    let generated_sig = private_key
        .sign_ethereum_msg(&keccak256(&checkpoint))
        .unwrap();
    assert_eq!(sig, generated_sig)
}

#[test]
fn serialize_to_json() {
    let unsafe_key: PrivateKey = "0101010101010101010101010101010101010101010101010101010101010101"
        .parse()
        .unwrap();
    let j = serde_json::to_string(&unsafe_key).unwrap();
    assert_eq!(
        j,
        r#""0x0101010101010101010101010101010101010101010101010101010101010101""#
    );
    let recovered_key: PrivateKey = serde_json::from_str(&j).unwrap();
    assert_eq!(unsafe_key, recovered_key);
}

#[test]
fn signatures_are_low_s() {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    for _ in 0..64 {
        let key = match PrivateKey::from_bytes(rng.gen()) {
            Ok(key) => key,
            Err(_) => continue,
        };
        let digest: [u8; 32] = rng.gen();
        let sig = key.sign_hash(&digest).unwrap();
        assert!(sig.is_valid());
        assert_eq!(sig.normalize(), sig);
        assert_eq!(sig.recover(&digest).unwrap(), key.to_address());
    }
}
