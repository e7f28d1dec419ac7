//! Chain parameters and the consensus backend consulted during verification.

use crate::core::block::{Block, Sealed, Unsealed};
use crate::storage::txpool::TXPOOL_CAPACITY;
use crate::types::encoding::Encode;
use crate::types::hash::{HASH_LEN, Hash};
use ledger_derive::{BinaryCodec, Error};

/// Reward credited to a block's coinbase on development chains.
pub const DEFAULT_BLOCK_REWARD: u128 = 16;

/// Chain identifier used by [`ChainParams::dev`].
pub const DEV_CHAIN_ID: u32 = 1;

/// Consensus family identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BinaryCodec)]
pub enum ConsensusKind {
    /// Hash-based proof of work: a block hash needs `difficulty_bits` leading zero bits.
    ProofOfWork { difficulty_bits: u32 },
}

/// Chain-wide parameters injected into block building and verification.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct ChainParams {
    /// Chain identifier carried by every header and transaction.
    pub chain_id: u32,
    /// Amount credited to the coinbase of every block, genesis included.
    pub block_reward: u128,
    /// Consensus family and its tuning.
    pub consensus: ConsensusKind,
    /// Maximum number of pending transactions held by the pool.
    pub txpool_capacity: usize,
}

impl ChainParams {
    /// Returns deterministic development chain parameters.
    pub fn dev() -> Self {
        Self {
            chain_id: DEV_CHAIN_ID,
            block_reward: DEFAULT_BLOCK_REWARD,
            consensus: ConsensusKind::ProofOfWork { difficulty_bits: 4 },
            txpool_capacity: TXPOOL_CAPACITY,
        }
    }

    /// Domain-separated digest of the encoded parameters.
    ///
    /// Two nodes with different parameters never agree on this value.
    pub fn hash(&self) -> Hash {
        let mut h = Hash::sha3();
        h.update(b"CHAIN_PARAMS");
        self.encode(&mut h);
        h.finalize()
    }

    /// Builds the proof-of-work backend described by these parameters.
    pub fn proof_of_work(&self) -> ProofOfWork {
        match self.consensus {
            ConsensusKind::ProofOfWork { difficulty_bits } => {
                ProofOfWork::new(self.chain_id, difficulty_bits)
            }
        }
    }
}

/// Reasons the consensus backend rejects a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("block belongs to chain {actual}, expected {expected}")]
    ChainIdMismatch { expected: u32, actual: u32 },
    #[error("block {hash} has fewer than {difficulty_bits} leading zero bits")]
    InsufficientWork { hash: Hash, difficulty_bits: u32 },
    #[error("no nonce satisfies a difficulty of {0} bits")]
    NonceExhausted(u32),
}

/// Validates consensus-specific header fields.
///
/// Implementations must be thread-safe so the same backend can serve block
/// building and verification concurrently.
pub trait Consensus: Send + Sync {
    /// Fills consensus fields of a block about to be sealed, such as the nonce.
    ///
    /// Runs after the transaction set is final, since it depends on the block hash.
    fn prepare_block(&self, block: &mut Block<Unsealed>) -> Result<(), ConsensusError>;

    /// Checks the consensus fields of a sealed block.
    fn verify_block(&self, block: &Block<Sealed>) -> Result<(), ConsensusError>;
}

/// Leading-zero-bits proof of work over the block hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofOfWork {
    chain_id: u32,
    difficulty_bits: u32,
}

impl ProofOfWork {
    pub fn new(chain_id: u32, difficulty_bits: u32) -> Self {
        Self {
            chain_id,
            difficulty_bits,
        }
    }

    pub fn difficulty_bits(&self) -> u32 {
        self.difficulty_bits
    }

    pub fn meets_difficulty(&self, hash: &Hash) -> bool {
        hash.leading_zero_bits() >= self.difficulty_bits
    }

    /// Searches nonces upward from the block's current one until its hash
    /// meets the difficulty, then leaves the winning nonce on the block.
    pub fn mine(&self, block: &mut Block<Unsealed>) -> Result<u64, ConsensusError> {
        if self.difficulty_bits as usize > HASH_LEN * 8 {
            return Err(ConsensusError::NonceExhausted(self.difficulty_bits));
        }

        let start = block.nonce();
        let mut nonce = start;

        loop {
            block.set_nonce(nonce);
            if self.meets_difficulty(&block.hash_preview()) {
                return Ok(nonce);
            }

            nonce = nonce.wrapping_add(1);
            if nonce == start {
                return Err(ConsensusError::NonceExhausted(self.difficulty_bits));
            }
        }
    }
}

impl Consensus for ProofOfWork {
    fn prepare_block(&self, block: &mut Block<Unsealed>) -> Result<(), ConsensusError> {
        self.mine(block).map(|_| ())
    }

    fn verify_block(&self, block: &Block<Sealed>) -> Result<(), ConsensusError> {
        if block.chain_id() != self.chain_id {
            return Err(ConsensusError::ChainIdMismatch {
                expected: self.chain_id,
                actual: block.chain_id(),
            });
        }

        if !self.meets_difficulty(&block.hash()) {
            return Err(ConsensusError::InsufficientWork {
                hash: block.hash(),
                difficulty_bits: self.difficulty_bits,
            });
        }

        Ok(())
    }
}
