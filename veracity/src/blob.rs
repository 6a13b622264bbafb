//! EIP-4844 blob packing and sidecars
//!
//! Arbitrary bytes are packed into blobs as a stream of 31 byte chunks, one
//! per 32 byte field element whose top byte stays zero so every element is
//! below the BLS12-381 modulus. The stream starts with an 8 byte big endian
//! length so trailing padding can be dropped when unpacking.
//!
//! Commitments and proofs come from a [`Kzg`] backend supplied by the caller.

use crate::constants::{
    BLOB_LENGTH_HEADER_BYTES, BYTES_PER_BLOB, BYTES_PER_COMMITMENT, BYTES_PER_FIELD_ELEMENT,
    BYTES_PER_PROOF, FIELD_ELEMENTS_PER_BLOB, MAX_BLOBS_PER_TRANSACTION,
    USABLE_BYTES_PER_BLOB, USABLE_BYTES_PER_FIELD_ELEMENT, VERSIONED_HASH_VERSION_KZG,
};
use crate::error::Error;
use crate::rlp::RlpToken;
use sha2::{Digest, Sha256};
use std::fmt;

/// 4096 field elements of 32 bytes
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Blob(Box<[u8]>);

impl Blob {
    fn zeroed() -> Blob {
        Blob(vec![0u8; BYTES_PER_BLOB].into_boxed_slice())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Blob, Error> {
        if bytes.len() != BYTES_PER_BLOB {
            return Err(Error::InvalidBlobLength { got: bytes.len() });
        }
        Ok(Blob(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn field_element(&self, index: usize) -> &[u8] {
        let start = index * BYTES_PER_FIELD_ELEMENT;
        &self.0[start..start + BYTES_PER_FIELD_ELEMENT]
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let used = self.0.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        write!(f, "Blob({used} bytes used)")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KzgCommitment(pub [u8; BYTES_PER_COMMITMENT]);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KzgProof(pub [u8; BYTES_PER_PROOF]);

/// A KZG backend over BLS12-381 with the Ethereum trusted setup loaded
pub trait Kzg {
    fn blob_to_commitment(&self, blob: &Blob) -> Result<KzgCommitment, Error>;

    fn compute_blob_proof(&self, blob: &Blob, commitment: &KzgCommitment)
        -> Result<KzgProof, Error>;

    fn verify_blob_proof(
        &self,
        blob: &Blob,
        commitment: &KzgCommitment,
        proof: &KzgProof,
    ) -> Result<bool, Error>;

    /// Backends with a real batch check should override this
    fn verify_blob_proof_batch(
        &self,
        blobs: &[Blob],
        commitments: &[KzgCommitment],
        proofs: &[KzgProof],
    ) -> Result<bool, Error> {
        if blobs.len() != commitments.len() || blobs.len() != proofs.len() {
            return Ok(false);
        }
        for ((blob, commitment), proof) in blobs.iter().zip(commitments).zip(proofs) {
            if !self.verify_blob_proof(blob, commitment, proof)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// `0x01 ++ sha256(commitment)[1..]`
pub fn commitment_to_versioned_hash(commitment: &KzgCommitment) -> [u8; 32] {
    let mut hash: [u8; 32] = Sha256::digest(commitment.0).into();
    hash[0] = VERSIONED_HASH_VERSION_KZG;
    hash
}

/// Largest payload that fits in a single transaction's blobs
pub fn max_blob_data_size() -> usize {
    MAX_BLOBS_PER_TRANSACTION * USABLE_BYTES_PER_BLOB - BLOB_LENGTH_HEADER_BYTES
}

/// Packs `data` into as few blobs as it needs, the last blob is zero padded
pub fn to_blobs(data: &[u8]) -> Result<Vec<Blob>, Error> {
    if data.is_empty() {
        return Err(Error::EmptyBlobData);
    }
    if data.len() > max_blob_data_size() {
        return Err(Error::BlobSizeTooLarge {
            max: max_blob_data_size(),
            got: data.len(),
        });
    }

    let mut stream = Vec::with_capacity(BLOB_LENGTH_HEADER_BYTES + data.len());
    stream.extend_from_slice(&(data.len() as u64).to_be_bytes());
    stream.extend_from_slice(data);

    let mut blobs = Vec::new();
    for payload in stream.chunks(USABLE_BYTES_PER_BLOB) {
        let mut blob = Blob::zeroed();
        for (i, chunk) in payload.chunks(USABLE_BYTES_PER_FIELD_ELEMENT).enumerate() {
            // byte 0 of every element stays zero
            let start = i * BYTES_PER_FIELD_ELEMENT + 1;
            blob.0[start..start + chunk.len()].copy_from_slice(chunk);
        }
        blobs.push(blob);
    }
    trace!("Packed {} bytes into {} blobs", data.len(), blobs.len());
    Ok(blobs)
}

/// Reverses [`to_blobs`]
pub fn from_blobs(blobs: &[Blob]) -> Result<Vec<u8>, Error> {
    if blobs.is_empty() {
        return Err(Error::EmptyBlobData);
    }
    let mut stream = Vec::with_capacity(blobs.len() * USABLE_BYTES_PER_BLOB);
    for (blob_index, blob) in blobs.iter().enumerate() {
        for element in 0..FIELD_ELEMENTS_PER_BLOB {
            let bytes = blob.field_element(element);
            if bytes[0] != 0 {
                debug!("Blob {blob_index} element {element} has a non zero top byte");
                return Err(Error::InvalidBlobFieldElement {
                    blob: blob_index,
                    element,
                });
            }
            stream.extend_from_slice(&bytes[1..]);
        }
    }

    let mut header = [0u8; BLOB_LENGTH_HEADER_BYTES];
    header.copy_from_slice(&stream[..BLOB_LENGTH_HEADER_BYTES]);
    let declared = u64::from_be_bytes(header);
    let available = stream.len() - BLOB_LENGTH_HEADER_BYTES;
    match usize::try_from(declared) {
        Ok(len) if len <= available => {
            Ok(stream[BLOB_LENGTH_HEADER_BYTES..BLOB_LENGTH_HEADER_BYTES + len].to_vec())
        }
        _ => Err(Error::BlobLengthHeader {
            declared,
            available,
        }),
    }
}

/// A blob with its commitment and proof, the data that travels next to a
/// 0x03 transaction on the network
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlobSidecar {
    pub blob: Blob,
    pub commitment: KzgCommitment,
    pub proof: KzgProof,
}

impl BlobSidecar {
    pub fn versioned_hash(&self) -> [u8; 32] {
        commitment_to_versioned_hash(&self.commitment)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlobSidecars(pub Vec<BlobSidecar>);

impl BlobSidecars {
    /// Commits to and proves every blob
    pub fn from_blobs(blobs: Vec<Blob>, kzg: &dyn Kzg) -> Result<BlobSidecars, Error> {
        let mut sidecars = Vec::with_capacity(blobs.len());
        for blob in blobs {
            let commitment = kzg.blob_to_commitment(&blob)?;
            let proof = kzg.compute_blob_proof(&blob, &commitment)?;
            sidecars.push(BlobSidecar {
                blob,
                commitment,
                proof,
            });
        }
        Ok(BlobSidecars(sidecars))
    }

    /// Packs `data` with [`to_blobs`] then builds the sidecars
    pub fn from_data(data: &[u8], kzg: &dyn Kzg) -> Result<BlobSidecars, Error> {
        BlobSidecars::from_blobs(to_blobs(data)?, kzg)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn blobs(&self) -> Vec<Blob> {
        self.0.iter().map(|s| s.blob.clone()).collect()
    }

    pub fn versioned_hashes(&self) -> Vec<[u8; 32]> {
        self.0.iter().map(|s| s.versioned_hash()).collect()
    }

    /// Batch checks every proof, a failed check is an error
    pub fn verify(&self, kzg: &dyn Kzg) -> Result<(), Error> {
        let blobs = self.blobs();
        let commitments: Vec<KzgCommitment> = self.0.iter().map(|s| s.commitment).collect();
        let proofs: Vec<KzgProof> = self.0.iter().map(|s| s.proof).collect();
        if kzg.verify_blob_proof_batch(&blobs, &commitments, &proofs)? {
            Ok(())
        } else {
            Err(Error::Kzg("blob proof verification failed".to_string()))
        }
    }

    /// The `[blobs, commitments, proofs]` lists of the network wrapper
    pub(crate) fn to_rlp(&self) -> [RlpToken; 3] {
        [
            RlpToken::List(self.0.iter().map(|s| s.blob.as_bytes().into()).collect()),
            RlpToken::List(self.0.iter().map(|s| s.commitment.0.to_vec().into()).collect()),
            RlpToken::List(self.0.iter().map(|s| s.proof.0.to_vec().into()).collect()),
        ]
    }

    pub(crate) fn from_rlp(
        blobs: &RlpToken,
        commitments: &RlpToken,
        proofs: &RlpToken,
    ) -> Result<BlobSidecars, Error> {
        let blobs = blobs.as_list()?;
        let commitments = commitments.as_list()?;
        let proofs = proofs.as_list()?;
        if blobs.len() != commitments.len() || blobs.len() != proofs.len() {
            debug!(
                "Sidecar lists disagree, {} blobs {} commitments {} proofs",
                blobs.len(),
                commitments.len(),
                proofs.len()
            );
            return Err(Error::DeserializeRlp);
        }
        let mut sidecars = Vec::with_capacity(blobs.len());
        for ((blob, commitment), proof) in blobs.iter().zip(commitments).zip(proofs) {
            sidecars.push(BlobSidecar {
                blob: Blob::from_slice(blob.as_bytes()?)?,
                commitment: KzgCommitment(crate::utils::to_array(commitment.as_bytes()?)?),
                proof: KzgProof(crate::utils::to_array(proof.as_bytes()?)?),
            });
        }
        Ok(BlobSidecars(sidecars))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::Rng;

    /// Stand in backend, commits to the sha256 of the blob
    pub(crate) struct MockKzg;

    fn widen(hash: [u8; 32]) -> [u8; 48] {
        let mut out = [0u8; 48];
        out[..32].copy_from_slice(&hash);
        out[32..].copy_from_slice(&hash[..16]);
        out
    }

    impl Kzg for MockKzg {
        fn blob_to_commitment(&self, blob: &Blob) -> Result<KzgCommitment, Error> {
            Ok(KzgCommitment(widen(Sha256::digest(blob.as_bytes()).into())))
        }

        fn compute_blob_proof(
            &self,
            _blob: &Blob,
            commitment: &KzgCommitment,
        ) -> Result<KzgProof, Error> {
            Ok(KzgProof(widen(Sha256::digest(commitment.0).into())))
        }

        fn verify_blob_proof(
            &self,
            blob: &Blob,
            commitment: &KzgCommitment,
            proof: &KzgProof,
        ) -> Result<bool, Error> {
            Ok(self.blob_to_commitment(blob)? == *commitment
                && self.compute_blob_proof(blob, commitment)? == *proof)
        }
    }

    #[test]
    fn small_payload() {
        let blobs = to_blobs(b"hello blobs").unwrap();
        assert_eq!(blobs.len(), 1);
        let bytes = blobs[0].as_bytes();
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..9], &11u64.to_be_bytes());
        assert_eq!(&bytes[9..20], b"hello blobs");
        assert!(bytes[20..].iter().all(|b| *b == 0));
        assert_eq!(from_blobs(&blobs).unwrap(), b"hello blobs".to_vec());
    }

    #[test]
    fn multi_blob_round_trip() {
        let mut rng = rand::thread_rng();
        let data: Vec<u8> = (0..USABLE_BYTES_PER_BLOB * 2 + 1000)
            .map(|_| rng.gen())
            .collect();
        let blobs = to_blobs(&data).unwrap();
        assert_eq!(blobs.len(), 3);
        for blob in &blobs {
            for element in 0..FIELD_ELEMENTS_PER_BLOB {
                assert_eq!(blob.field_element(element)[0], 0);
            }
        }
        assert_eq!(from_blobs(&blobs).unwrap(), data);
    }

    #[test]
    fn size_limits() {
        assert!(matches!(to_blobs(&[]), Err(Error::EmptyBlobData)));
        assert!(from_blobs(&[]).is_err());
        let exact = vec![7u8; max_blob_data_size()];
        assert_eq!(to_blobs(&exact).unwrap().len(), MAX_BLOBS_PER_TRANSACTION);
        let over = vec![7u8; max_blob_data_size() + 1];
        assert!(matches!(
            to_blobs(&over),
            Err(Error::BlobSizeTooLarge { .. })
        ));
    }

    #[test]
    fn rejects_bad_blobs() {
        let mut blobs = to_blobs(b"marker").unwrap();
        blobs[0].0[32 * 5] = 1;
        assert!(matches!(
            from_blobs(&blobs),
            Err(Error::InvalidBlobFieldElement {
                blob: 0,
                element: 5
            })
        ));

        let mut blobs = to_blobs(b"marker").unwrap();
        blobs[0].0[1..9].copy_from_slice(&u64::MAX.to_be_bytes());
        assert!(matches!(
            from_blobs(&blobs),
            Err(Error::BlobLengthHeader { .. })
        ));

        assert!(matches!(
            Blob::from_slice(&[0u8; 100]),
            Err(Error::InvalidBlobLength { got: 100 })
        ));
    }

    #[test]
    fn sidecars() {
        let sidecars = BlobSidecars::from_data(&[0xab; 200_000], &MockKzg).unwrap();
        assert_eq!(sidecars.len(), 2);
        sidecars.verify(&MockKzg).unwrap();
        for hash in sidecars.versioned_hashes() {
            assert_eq!(hash[0], VERSIONED_HASH_VERSION_KZG);
        }
        assert_eq!(from_blobs(&sidecars.blobs()).unwrap(), vec![0xab; 200_000]);

        let mut tampered = sidecars.clone();
        tampered.0[1].proof.0[0] ^= 1;
        assert!(matches!(tampered.verify(&MockKzg), Err(Error::Kzg(_))));
    }

    #[test]
    fn versioned_hash() {
        let commitment = KzgCommitment([0u8; 48]);
        let mut expected: [u8; 32] = Sha256::digest([0u8; 48]).into();
        expected[0] = 0x01;
        assert_eq!(commitment_to_versioned_hash(&commitment), expected);
    }
}
