use num256::Uint256;

const SECPK1N_BYTES: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// Order of the secp256k1 curve
pub fn secpk1n() -> Uint256 {
    Uint256::from_be_bytes(&SECPK1N_BYTES)
}

/// Upper bound for a low-s signature
pub fn secpk1n_half() -> Uint256 {
    secpk1n() / 2u8.into()
}

/// Prefix of every EIP-712 digest
pub const EIP712_PREFIX: [u8; 2] = [0x19, 0x01];

/// Prefix of an EIP-191 personal message, followed by the decimal byte length
pub const ETHEREUM_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Domain separator byte for EIP-7702 authorization digests
pub const EIP7702_AUTHORIZATION_MAGIC: u8 = 0x05;

pub const EIP2930_TX_TYPE: u8 = 0x01;
pub const EIP1559_TX_TYPE: u8 = 0x02;
pub const EIP4844_TX_TYPE: u8 = 0x03;
pub const EIP7702_TX_TYPE: u8 = 0x04;

/// Exclusive upper bound on EIP-155 chain ids, keeps `chainId * 2 + 36`
/// within a signed 64 bit integer
pub const MAX_CHAIN_ID: u64 = 9_223_372_036_854_775_790;

/// Any first byte at or above this value starts an RLP list, making the
/// envelope a legacy transaction
pub const LEGACY_TX_MIN_PREFIX: u8 = 0xc0;

pub const BYTES_PER_FIELD_ELEMENT: usize = 32;
pub const FIELD_ELEMENTS_PER_BLOB: usize = 4096;
pub const BYTES_PER_BLOB: usize = BYTES_PER_FIELD_ELEMENT * FIELD_ELEMENTS_PER_BLOB;
/// Payload bytes per field element, the top byte is kept zero
pub const USABLE_BYTES_PER_FIELD_ELEMENT: usize = BYTES_PER_FIELD_ELEMENT - 1;
pub const USABLE_BYTES_PER_BLOB: usize = USABLE_BYTES_PER_FIELD_ELEMENT * FIELD_ELEMENTS_PER_BLOB;
/// Big endian u64 byte length written in front of the blob payload
pub const BLOB_LENGTH_HEADER_BYTES: usize = 8;
pub const MAX_BLOBS_PER_TRANSACTION: usize = 6;
pub const BYTES_PER_COMMITMENT: usize = 48;
pub const BYTES_PER_PROOF: usize = 48;
pub const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;

/// Suffix of ERC-6492 counterfactual signatures
pub const ERC6492_MAGIC_SUFFIX: [u8; 32] = [
    0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92,
    0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92,
];

/// Suffix of ERC-8010 pre-delegated signatures
pub const ERC8010_MAGIC_SUFFIX: [u8; 32] = [
    0x80, 0x10, 0x80, 0x10, 0x80, 0x10, 0x80, 0x10, 0x80, 0x10, 0x80, 0x10, 0x80, 0x10, 0x80, 0x10,
    0x80, 0x10, 0x80, 0x10, 0x80, 0x10, 0x80, 0x10, 0x80, 0x10, 0x80, 0x10, 0x80, 0x10, 0x80, 0x10,
];

/// Entries held by a cache built with `Default`
pub const DEFAULT_CACHE_CAPACITY: usize = 8192;

#[test]
fn curve_order() {
    assert_eq!(
        secpk1n(),
        "115792089237316195423570985008687907852837564279074904382605163141518161494337"
            .parse()
            .unwrap()
    );
    assert_eq!(BYTES_PER_BLOB, 131_072);
}
