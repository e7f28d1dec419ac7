//! Blocks and their lifecycle.
//!
//! A block is built as a [`Block<Unsealed>`]: header fields and transactions can
//! still change. [`Block::seal`] runs the state transition once, fixes the
//! state root and hash, and turns it into a [`Block<Sealed>`], which has no
//! mutators at all. Receivers rebuild sealed blocks from the wire and confirm
//! them with [`Block::verify`].

use crate::core::blockchain::{BlockId, BlockStore};
use crate::core::consensus::{Consensus, ConsensusError};
use crate::core::state_transition::{self, RejectedTransaction, StateTransition};
use crate::core::transaction::{Transaction, TransactionError};
use crate::network::message::{BlockData, Message, MessageType};
use crate::storage::state::StateError;
use crate::storage::trie::Trie;
use crate::storage::txpool::TxPool;
use crate::types::address::Address;
use crate::types::encoding::{DecodeError, Encode};
use crate::types::hash::Hash;
use crate::{debug, error, info, warn};
use ledger_derive::{BinaryCodec, Error};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors raised while linking, sealing or verifying a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("invalid block hash: header has {expected}, computed {actual}")]
    InvalidBlockHash { expected: Hash, actual: Hash },
    #[error("invalid block state root: header has {expected}, computed {actual}")]
    InvalidBlockStateRoot { expected: Hash, actual: Hash },
    #[error("consensus rejected block: {0}")]
    Consensus(ConsensusError),
    #[error("transaction {index} ({hash}) is invalid: {source}")]
    InvalidTransaction {
        index: usize,
        hash: Hash,
        source: TransactionError,
    },
    #[error("coinbase reward failed: {0}")]
    Reward(StateError),
    #[error("parent block {0} has no post-execution state to fork")]
    ParentStateUnavailable(Hash),
    #[error("block has no base state; link it to a parent first")]
    Unlinked,
    #[error("parent block {0} is unknown")]
    UnknownParent(Hash),
    #[error("no block stored under handle {0}")]
    UnknownBlock(BlockId),
    #[error("block {0} is already stored")]
    DuplicateBlock(Hash),
}

impl From<ConsensusError> for BlockError {
    fn from(err: ConsensusError) -> Self {
        BlockError::Consensus(err)
    }
}

/// Lifecycle marker for a block still under construction.
#[derive(Debug)]
pub struct Unsealed;

/// Lifecycle marker for a block whose hash and state root are fixed.
#[derive(Debug)]
pub struct Sealed;

mod private {
    pub trait Stage {}
    impl Stage for super::Unsealed {}
    impl Stage for super::Sealed {}
}

/// Implemented by [`Unsealed`] and [`Sealed`] only.
pub trait Lifecycle: private::Stage {}
impl Lifecycle for Unsealed {}
impl Lifecycle for Sealed {}

/// Block header. Its fields only change through an unsealed [`Block`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, BinaryCodec)]
pub struct Header {
    /// Digest of the block inputs; zero until sealed.
    hash: Hash,
    parent_hash: Hash,
    /// Root of the state trie after reward and execution; zero until sealed.
    state_root: Hash,
    /// Consumed by the consensus backend.
    nonce: u64,
    /// Receives the block reward.
    coinbase: Address,
    /// Seconds since the Unix epoch.
    timestamp: i64,
    chain_id: u32,
}

impl Header {
    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn parent_hash(&self) -> Hash {
        self.parent_hash
    }

    pub fn state_root(&self) -> Hash {
        self.state_root
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn coinbase(&self) -> Address {
        self.coinbase
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn chain_id(&self) -> u32 {
        self.chain_id
    }

    pub fn to_message(&self) -> Message {
        Message::from_payload(MessageType::Header, self)
    }

    pub fn from_message(message: &Message) -> Result<Self, DecodeError> {
        message.decode_payload(MessageType::Header)
    }
}

/// A block of ordered transactions committing to a state root.
///
/// `S` is the lifecycle stage: [`Unsealed`] while being built, [`Sealed`] once
/// its hash and state root are fixed.
pub struct Block<S: Lifecycle> {
    header: Header,
    transactions: Vec<Transaction>,

    /// Distance from genesis, resolved when linked.
    height: u64,
    /// Handle of the parent in the owning [`BlockStore`].
    parent: Option<BlockId>,

    /// State the transition starts from: supplied for genesis, forked from the
    /// parent otherwise.
    base_state: Option<Trie>,
    base_txs: Trie,
    /// Post-execution tries, present once sealed locally or verified.
    state_trie: Option<Trie>,
    txs_trie: Option<Trie>,

    tx_pool: Arc<TxPool>,
    verified: bool,
    _stage: PhantomData<S>,
}

/// Digest over parent hash, nonce, coinbase, timestamp and transaction hashes.
///
/// The state root is not an input: the hash commits to what went into the
/// block, not to what came out.
pub fn hash_block<S: Lifecycle>(block: &Block<S>) -> Hash {
    hash_inputs(&block.header, &block.transactions)
}

fn hash_inputs(header: &Header, transactions: &[Transaction]) -> Hash {
    let mut h = Hash::sha3();
    header.parent_hash.encode(&mut h);
    header.nonce.encode(&mut h);
    header.coinbase.encode(&mut h);
    header.timestamp.encode(&mut h);
    for tx in transactions {
        tx.hash().encode(&mut h);
    }
    h.finalize()
}

/// Runs the coinbase reward and the block's transactions against a fork of its
/// base state.
///
/// Neither the block nor its base tries are modified.
pub fn hash_block_state_root<S: Lifecycle>(
    block: &Block<S>,
    reward: u128,
) -> Result<StateTransition, BlockError> {
    let base = block.base_state.as_ref().ok_or(BlockError::Unlinked)?;
    let transition = state_transition::compute_state_root(
        base,
        &block.base_txs,
        block.header.chain_id,
        &block.header.coinbase,
        &block.transactions,
        reward,
    )
    .map_err(BlockError::Reward)?;

    debug!(
        "state root of block {}: {} -> {}",
        block.header.hash,
        base.root_hash(),
        transition.state_root
    );
    Ok(transition)
}

impl<S: Lifecycle> Block<S> {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn parent_hash(&self) -> Hash {
        self.header.parent_hash
    }

    pub fn nonce(&self) -> u64 {
        self.header.nonce
    }

    pub fn coinbase(&self) -> Address {
        self.header.coinbase
    }

    pub fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    pub fn chain_id(&self) -> u32 {
        self.header.chain_id
    }

    /// Distance from genesis. Only meaningful once linked.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Handle of the parent block, once linked.
    pub fn parent(&self) -> Option<BlockId> {
        self.parent
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn tx_pool(&self) -> &Arc<TxPool> {
        &self.tx_pool
    }

    /// Attaches this block to `parent_id` in `store`.
    ///
    /// Returns `Ok(false)` without touching the block if the parent's hash is
    /// not this block's parent hash. On success the parent's post-execution
    /// tries are forked into this block's base state and heights are resolved
    /// along the ancestor chain: the walk stops at the first ancestor with a
    /// positive height (or at a root), then every block between it and this one
    /// is renumbered from that height.
    pub fn link_parent_block(
        &mut self,
        store: &mut BlockStore,
        parent_id: BlockId,
    ) -> Result<bool, BlockError> {
        let parent = store.get(parent_id).ok_or(BlockError::UnknownBlock(parent_id))?;
        if parent.hash() != self.header.parent_hash {
            return Ok(false);
        }

        let (Some(state), Some(txs)) = (parent.state_trie(), parent.txs_trie()) else {
            return Err(BlockError::ParentStateUnavailable(parent.hash()));
        };
        let (base_state, base_txs) = (state.clone(), txs.clone());

        info!(
            "linking block {} to parent {}",
            self.header.hash,
            parent.hash()
        );

        // Resolve the whole ancestor path before committing anything.
        let mut depth: u64 = 1;
        let mut ancestor_height = self.height;
        let mut path = Vec::new();
        if self.height == 0 {
            let mut cursor = Some(parent_id);
            while let Some(id) = cursor {
                let ancestor = store.get(id).ok_or(BlockError::UnknownBlock(id))?;
                path.push(id);
                depth += 1;
                ancestor_height = ancestor.height;
                if ancestor.height > 0 {
                    break;
                }
                cursor = ancestor.parent;
            }
        }

        self.base_state = Some(base_state);
        self.base_txs = base_txs;
        self.parent = Some(parent_id);

        if depth > 1 {
            depth -= 1;
            self.height = ancestor_height + depth;

            for id in path {
                if depth <= 1 {
                    break;
                }
                depth -= 1;
                if let Some(ancestor) = store.get_mut(id) {
                    ancestor.height = ancestor_height + depth;
                }
            }
        }

        Ok(true)
    }

    fn return_to_pool(&self, rejected: &[RejectedTransaction]) {
        for r in rejected {
            warn!(
                "transaction {} excluded from block: {}",
                r.transaction.hash(),
                r.error
            );
            if !self.tx_pool.put(r.transaction.clone()) {
                warn!(
                    "transaction pool refused returned transaction {}",
                    r.transaction.hash()
                );
            }
        }
    }
}

impl Block<Unsealed> {
    /// Creates an unsealed block stamped with the current time.
    ///
    /// `base_state` is the pre-execution state for a genesis block. Other blocks
    /// pass `None` and receive their parent's state through
    /// [`Block::link_parent_block`].
    pub fn new(
        chain_id: u32,
        coinbase: Address,
        parent_hash: Hash,
        nonce: u64,
        base_state: Option<Trie>,
        txs_trie: Trie,
        tx_pool: Arc<TxPool>,
    ) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Self {
            header: Header {
                hash: Hash::zero(),
                parent_hash,
                state_root: Hash::zero(),
                nonce,
                coinbase,
                timestamp,
                chain_id,
            },
            transactions: Vec::new(),
            height: 0,
            parent: None,
            base_state,
            base_txs: txs_trie,
            state_trie: None,
            txs_trie: None,
            tx_pool,
            verified: false,
            _stage: PhantomData,
        }
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.header.nonce = nonce;
    }

    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.header.timestamp = timestamp;
    }

    /// Appends transactions in order. No deduplication against the chain.
    pub fn add_transactions(&mut self, txs: impl IntoIterator<Item = Transaction>) -> &mut Self {
        self.transactions.extend(txs);
        self
    }

    /// The hash this block would get if sealed now.
    pub fn hash_preview(&self) -> Hash {
        hash_block(self)
    }

    /// Drops every transaction that fails to execute and hands it back to the
    /// pool. Survivors keep their relative order.
    ///
    /// Returns how many transactions were removed.
    pub fn execute_transactions(&mut self, reward: u128) -> Result<usize, BlockError> {
        let transition = hash_block_state_root(self, reward)?;
        let removed = transition.rejected.len();
        if removed > 0 {
            self.return_to_pool(&transition.rejected);
            self.transactions = transition.included;
        }
        Ok(removed)
    }

    /// Computes the state root and hash, and freezes the block.
    ///
    /// Transactions that fail are excluded first, so the hash always covers
    /// the transactions that actually executed. Call
    /// [`Block::execute_transactions`] before mining when the nonce must stay
    /// valid.
    pub fn seal(mut self, reward: u128) -> Result<Block<Sealed>, BlockError> {
        let transition = hash_block_state_root(&self, reward)?;
        if !transition.rejected.is_empty() {
            self.return_to_pool(&transition.rejected);
            self.transactions = transition.included;
        }

        self.header.hash = hash_block(&self);
        self.header.state_root = transition.state_root;

        Ok(Block {
            header: self.header,
            transactions: self.transactions,
            height: self.height,
            parent: self.parent,
            base_state: self.base_state,
            base_txs: self.base_txs,
            state_trie: Some(transition.state_trie),
            txs_trie: Some(transition.txs_trie),
            tx_pool: self.tx_pool,
            verified: false,
            _stage: PhantomData,
        })
    }
}

impl Block<Sealed> {
    pub fn hash(&self) -> Hash {
        self.header.hash
    }

    pub fn state_root(&self) -> Hash {
        self.header.state_root
    }

    /// Post-execution state, if sealed locally or already verified.
    pub fn state_trie(&self) -> Option<&Trie> {
        self.state_trie.as_ref()
    }

    pub fn txs_trie(&self) -> Option<&Trie> {
        self.txs_trie.as_ref()
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Checks consensus fields, recomputes the hash and checks every
    /// transaction's signature and chain.
    pub fn verify_hash<C: Consensus + ?Sized>(&self, consensus: &C) -> Result<(), BlockError> {
        consensus.verify_block(self)?;

        let wanted = hash_block(self);
        if wanted != self.header.hash {
            error!("invalid block hash: {}, wanted {}", self, wanted);
            return Err(BlockError::InvalidBlockHash {
                expected: self.header.hash,
                actual: wanted,
            });
        }

        for (index, tx) in self.transactions.iter().enumerate() {
            tx.verify()
                .map_err(|source| BlockError::InvalidTransaction {
                    index,
                    hash: tx.hash(),
                    source,
                })?;
        }

        Ok(())
    }

    /// Replays the block on a fork of its base state and compares roots.
    ///
    /// Pure: repeated calls return the same result and never reward the
    /// coinbase twice. A transaction that fails on replay makes the block
    /// invalid, since sealing only keeps transactions that executed.
    pub fn verify_state_root(&self, reward: u128) -> Result<StateTransition, BlockError> {
        let transition = hash_block_state_root(self, reward)?;

        if let Some(r) = transition.rejected.into_iter().next() {
            return Err(BlockError::InvalidTransaction {
                index: r.index,
                hash: r.transaction.hash(),
                source: r.error,
            });
        }

        if transition.state_root != self.header.state_root {
            error!(
                "invalid block state root: {}, wanted {}",
                self, transition.state_root
            );
            return Err(BlockError::InvalidBlockStateRoot {
                expected: self.header.state_root,
                actual: transition.state_root,
            });
        }

        Ok(StateTransition {
            rejected: Vec::new(),
            ..transition
        })
    }

    /// [`Block::verify_hash`] then [`Block::verify_state_root`].
    ///
    /// A block received without post-execution state adopts the recomputed
    /// one. A block that already has it keeps its own.
    pub fn verify<C: Consensus + ?Sized>(
        &mut self,
        consensus: &C,
        reward: u128,
    ) -> Result<(), BlockError> {
        self.verify_hash(consensus)?;
        let transition = self.verify_state_root(reward)?;

        if self.state_trie.is_none() {
            self.state_trie = Some(transition.state_trie);
            self.txs_trie = Some(transition.txs_trie);
        }
        self.verified = true;
        Ok(())
    }

    pub fn to_data(&self) -> BlockData {
        BlockData {
            header: self.header,
            transactions: self.transactions.clone(),
        }
    }

    pub fn to_message(&self) -> Message {
        Message::from_payload(MessageType::Block, &self.to_data())
    }

    /// Rebuilds a received block. It stays unverified and unlinked until
    /// [`Block::link_parent_block`] and [`Block::verify`] run.
    pub fn from_data(data: BlockData, tx_pool: Arc<TxPool>) -> Self {
        Self {
            header: data.header,
            transactions: data.transactions,
            height: 0,
            parent: None,
            base_state: None,
            base_txs: Trie::new(),
            state_trie: None,
            txs_trie: None,
            tx_pool,
            verified: false,
            _stage: PhantomData,
        }
    }

    pub fn from_message(message: &Message, tx_pool: Arc<TxPool>) -> Result<Self, DecodeError> {
        let data: BlockData = message.decode_payload(MessageType::Block)?;
        Ok(Self::from_data(data, tx_pool))
    }
}

impl<S: Lifecycle> fmt::Display for Block<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block {{height: {}, hash: {}, parent_hash: {}, state_root: {}, nonce: {}, timestamp: {}}}",
            self.height,
            self.header.hash,
            self.header.parent_hash,
            self.header.state_root,
            self.header.nonce,
            self.header.timestamp
        )
    }
}

impl<S: Lifecycle> fmt::Debug for Block<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("header", &self.header)
            .field("transactions", &self.transactions.len())
            .field("height", &self.height)
            .field("parent", &self.parent)
            .field("verified", &self.verified)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::consensus::ProofOfWork;
    use crate::crypto::key_pair::PrivateKey;
    use crate::storage::state::AccountState;
    use crate::utils::test_utils::utils::{TEST_CHAIN_ID, funded_trie, new_transfer, random_hash};

    const REWARD: u128 = 16;

    fn pool() -> Arc<TxPool> {
        Arc::new(TxPool::new(None))
    }

    fn no_work() -> ProofOfWork {
        ProofOfWork::new(TEST_CHAIN_ID, 0)
    }

    fn unsealed(
        parent_hash: Hash,
        base_state: Option<Trie>,
        pool: &Arc<TxPool>,
    ) -> Block<Unsealed> {
        let mut block = Block::new(
            TEST_CHAIN_ID,
            Address([0xC0; 20]),
            parent_hash,
            0,
            base_state,
            Trie::new(),
            pool.clone(),
        );
        block.set_timestamp(1_700_000_000);
        block
    }

    /// Stores a sealed genesis over `state` and returns its handle.
    fn store_genesis(store: &mut BlockStore, state: Trie, pool: &Arc<TxPool>) -> BlockId {
        let genesis = unsealed(Hash::zero(), Some(state), pool).seal(REWARD).unwrap();
        store.insert(genesis).unwrap()
    }

    #[test]
    fn new_block_is_unsealed_and_empty() {
        let block = unsealed(random_hash(), None, &pool());
        assert!(block.transactions().is_empty());
        assert_eq!(block.header().hash(), Hash::zero());
        assert_eq!(block.header().state_root(), Hash::zero());
        assert_eq!(block.height(), 0);
        assert_eq!(block.parent(), None);
    }

    #[test]
    fn new_block_uses_wall_clock() {
        let block = Block::new(
            TEST_CHAIN_ID,
            Address::zero(),
            Hash::zero(),
            0,
            None,
            Trie::new(),
            pool(),
        );
        assert!(block.timestamp() > 1_600_000_000);
    }

    #[test]
    fn hash_is_deterministic() {
        let pool = pool();
        let key = PrivateKey::new();
        let parent = random_hash();
        let txs = vec![new_transfer(&key, 1, 1), new_transfer(&key, 2, 1)];

        let mut a = unsealed(parent, None, &pool);
        a.add_transactions(txs.clone());
        let mut b = unsealed(parent, None, &pool);
        b.add_transactions(txs);

        assert_eq!(hash_block(&a), hash_block(&b));
        assert_eq!(hash_block(&a), hash_block(&a));
    }

    #[test]
    fn hash_changes_with_every_input() {
        let pool = pool();
        let key = PrivateKey::new();
        let parent = random_hash();
        let txs = vec![new_transfer(&key, 1, 1), new_transfer(&key, 2, 1)];

        let mut base = unsealed(parent, None, &pool);
        base.add_transactions(txs.clone());
        let reference = hash_block(&base);

        let mut other = unsealed(random_hash(), None, &pool);
        other.add_transactions(txs.clone());
        assert_ne!(hash_block(&other), reference, "parent hash");

        base.set_nonce(1);
        assert_ne!(hash_block(&base), reference, "nonce");
        base.set_nonce(0);

        base.set_timestamp(base.timestamp() + 1);
        assert_ne!(hash_block(&base), reference, "timestamp");

        let mut other = Block::new(
            TEST_CHAIN_ID,
            Address([0xC1; 20]),
            parent,
            0,
            None,
            Trie::new(),
            pool.clone(),
        );
        other.set_timestamp(1_700_000_000);
        other.add_transactions(txs.clone());
        assert_ne!(hash_block(&other), reference, "coinbase");

        let mut reordered = unsealed(parent, None, &pool);
        reordered.add_transactions(txs.into_iter().rev());
        assert_ne!(hash_block(&reordered), reference, "transaction order");
    }

    #[test]
    fn hash_ignores_chain_id() {
        let pool = pool();
        let parent = random_hash();
        let a = unsealed(parent, None, &pool);
        let mut b = Block::new(
            TEST_CHAIN_ID + 1,
            Address([0xC0; 20]),
            parent,
            0,
            None,
            Trie::new(),
            pool.clone(),
        );
        b.set_timestamp(a.timestamp());
        assert_eq!(hash_block(&a), hash_block(&b));
    }

    #[test]
    fn seal_fixes_hash_and_state_root() {
        let pool = pool();
        let key = PrivateKey::new();
        let state = funded_trie(&[(key.public_key().address(), 100)]);

        let mut block = unsealed(Hash::zero(), Some(state.clone()), &pool);
        block.add_transactions([new_transfer(&key, 1, 30)]);
        let preview = block.hash_preview();

        let sealed = block.seal(REWARD).unwrap();
        assert_eq!(sealed.hash(), preview);
        assert_eq!(sealed.state_root(), sealed.state_trie().unwrap().root_hash());
        assert_ne!(sealed.state_root(), state.root_hash());
        assert!(!sealed.is_verified());
    }

    #[test]
    fn seal_without_base_state_fails() {
        let block = unsealed(random_hash(), None, &pool());
        assert_eq!(block.seal(REWARD).unwrap_err(), BlockError::Unlinked);
    }

    #[test]
    fn seal_excludes_failing_transactions() {
        let pool = pool();
        let key = PrivateKey::new();
        let state = funded_trie(&[(key.public_key().address(), 100)]);

        let good = new_transfer(&key, 1, 10);
        let bad = new_transfer(&key, 9, 10);
        let mut block = unsealed(Hash::zero(), Some(state), &pool);
        block.add_transactions([good.clone(), bad.clone()]);

        let sealed = block.seal(REWARD).unwrap();
        assert_eq!(sealed.transactions(), &[good]);
        assert_eq!(pool.transactions(), vec![bad]);
        assert_eq!(sealed.verify_hash(&no_work()), Ok(()));
    }

    #[test]
    fn execute_transactions_removes_failing_and_returns_it() {
        let pool = pool();
        let key = PrivateKey::new();
        let state = funded_trie(&[(key.public_key().address(), 100)]);

        let t1 = new_transfer(&key, 1, 10);
        let t2 = new_transfer(&key, 2, 10);
        let failing = new_transfer(&key, 2, 500);
        let t3 = new_transfer(&key, 3, 10);

        let mut block = unsealed(Hash::zero(), Some(state), &pool);
        block.add_transactions([t1.clone(), t2.clone(), failing.clone(), t3.clone()]);
        let pooled_before = pool.len();

        assert_eq!(block.execute_transactions(REWARD), Ok(1));
        assert_eq!(block.transactions(), &[t1, t2, t3]);
        assert_eq!(pool.len(), pooled_before + 1);
        assert!(pool.contains(&failing.hash()));
    }

    #[test]
    fn execute_transactions_keeps_valid_set() {
        let pool = pool();
        let key = PrivateKey::new();
        let state = funded_trie(&[(key.public_key().address(), 100)]);
        let txs = vec![new_transfer(&key, 1, 10), new_transfer(&key, 2, 10)];

        let mut block = unsealed(Hash::zero(), Some(state), &pool);
        block.add_transactions(txs.clone());

        assert_eq!(block.execute_transactions(REWARD), Ok(0));
        assert_eq!(block.transactions(), txs.as_slice());
        assert!(pool.is_empty());
    }

    #[test]
    fn verify_state_root_is_repeatable() {
        let pool = pool();
        let key = PrivateKey::new();
        let state = funded_trie(&[(key.public_key().address(), 100)]);

        let mut block = unsealed(Hash::zero(), Some(state), &pool);
        block.add_transactions([new_transfer(&key, 1, 10)]);
        let sealed = block.seal(REWARD).unwrap();
        let live_root = sealed.state_trie().unwrap().root_hash();

        let first = sealed.verify_state_root(REWARD).unwrap();
        let second = sealed.verify_state_root(REWARD).unwrap();
        assert_eq!(first.state_root, sealed.state_root());
        assert_eq!(second.state_root, sealed.state_root());
        assert_eq!(sealed.state_trie().unwrap().root_hash(), live_root);
    }

    #[test]
    fn verify_state_root_detects_wrong_root() {
        let pool = pool();
        let mut sealed = unsealed(Hash::zero(), Some(Trie::new()), &pool).seal(REWARD).unwrap();
        let actual = sealed.state_root();
        let forged = random_hash();
        sealed.header.state_root = forged;

        assert_eq!(
            sealed.verify_state_root(REWARD).unwrap_err(),
            BlockError::InvalidBlockStateRoot {
                expected: forged,
                actual
            }
        );
    }

    #[test]
    fn verify_state_root_depends_on_reward() {
        let sealed = unsealed(Hash::zero(), Some(Trie::new()), &pool()).seal(REWARD).unwrap();
        assert!(matches!(
            sealed.verify_state_root(REWARD + 1),
            Err(BlockError::InvalidBlockStateRoot { .. })
        ));
    }

    #[test]
    fn verify_hash_detects_wrong_hash() {
        let mut sealed = unsealed(Hash::zero(), Some(Trie::new()), &pool()).seal(REWARD).unwrap();
        let actual = sealed.hash();
        sealed.header.nonce += 1;

        assert_eq!(
            sealed.verify_hash(&no_work()).unwrap_err(),
            BlockError::InvalidBlockHash {
                expected: actual,
                actual: hash_block(&sealed),
            }
        );
    }

    #[test]
    fn verify_hash_detects_bad_signature() {
        let pool = pool();
        let key = PrivateKey::new();
        let state = funded_trie(&[(key.public_key().address(), 100)]);
        let mut block = unsealed(Hash::zero(), Some(state), &pool);
        block.add_transactions([new_transfer(&key, 1, 10)]);
        let mut sealed = block.seal(REWARD).unwrap();

        // the hash excludes signatures, so only the signature check can catch this
        sealed.transactions[0].signature = PrivateKey::new().sign(b"forged");
        let tx_hash = sealed.transactions[0].hash();

        assert_eq!(
            sealed.verify_hash(&no_work()).unwrap_err(),
            BlockError::InvalidTransaction {
                index: 0,
                hash: tx_hash,
                source: TransactionError::InvalidSignature,
            }
        );
    }

    #[test]
    fn verify_surfaces_consensus_error_first() {
        let mut sealed = unsealed(Hash::zero(), Some(Trie::new()), &pool()).seal(REWARD).unwrap();
        let other_chain = ProofOfWork::new(TEST_CHAIN_ID + 1, 0);

        assert_eq!(
            sealed.verify(&other_chain, REWARD).unwrap_err(),
            BlockError::Consensus(ConsensusError::ChainIdMismatch {
                expected: TEST_CHAIN_ID + 1,
                actual: TEST_CHAIN_ID
            })
        );
        assert!(!sealed.is_verified());
    }

    #[test]
    fn verify_marks_block_verified() {
        let mut sealed = unsealed(Hash::zero(), Some(Trie::new()), &pool()).seal(REWARD).unwrap();
        let root = sealed.state_trie().unwrap().root_hash();

        sealed.verify(&no_work(), REWARD).unwrap();
        sealed.verify(&no_work(), REWARD).unwrap();
        assert!(sealed.is_verified());
        assert_eq!(sealed.state_trie().unwrap().root_hash(), root);
    }

    #[test]
    fn coinbase_gains_exactly_the_reward() {
        let pool = pool();
        let mut store = BlockStore::new();
        let coinbase = Address([0xC0; 20]);
        let genesis = store_genesis(&mut store, funded_trie(&[(coinbase, 5)]), &pool);
        let parent_balance = store
            .get(genesis)
            .and_then(|b| b.state_trie())
            .unwrap()
            .account_or_default(&coinbase)
            .unwrap()
            .balance();

        let mut child = unsealed(store.get(genesis).unwrap().hash(), None, &pool);
        assert_eq!(child.link_parent_block(&mut store, genesis), Ok(true));
        let sealed = child.seal(REWARD).unwrap();

        let balance = sealed
            .state_trie()
            .unwrap()
            .account_or_default(&coinbase)
            .unwrap()
            .balance();
        assert_eq!(balance, parent_balance + REWARD);
    }

    #[test]
    fn link_sets_parent_and_height() {
        let pool = pool();
        let mut store = BlockStore::new();
        let genesis = store_genesis(&mut store, Trie::new(), &pool);
        let genesis_hash = store.get(genesis).unwrap().hash();

        let mut child = unsealed(genesis_hash, None, &pool);
        assert_eq!(child.link_parent_block(&mut store, genesis), Ok(true));
        assert_eq!(child.parent(), Some(genesis));
        assert_eq!(child.height(), store.get(genesis).unwrap().height() + 1);
        assert_eq!(
            child.base_state.as_ref().map(Trie::root_hash),
            store.get(genesis).unwrap().state_trie().map(Trie::root_hash)
        );
    }

    #[test]
    fn link_with_wrong_parent_hash_changes_nothing() {
        let pool = pool();
        let mut store = BlockStore::new();
        let genesis = store_genesis(&mut store, Trie::new(), &pool);

        let mut child = unsealed(random_hash(), None, &pool);
        assert_eq!(child.link_parent_block(&mut store, genesis), Ok(false));
        assert!(child.base_state.is_none());
        assert_eq!(child.parent(), None);
        assert_eq!(child.height(), 0);
        assert_eq!(store.get(genesis).unwrap().height(), 0);
    }

    #[test]
    fn link_fork_is_isolated_from_parent() {
        let pool = pool();
        let key = PrivateKey::new();
        let mut store = BlockStore::new();
        let genesis = store_genesis(
            &mut store,
            funded_trie(&[(key.public_key().address(), 100)]),
            &pool,
        );
        let genesis_hash = store.get(genesis).unwrap().hash();
        let parent_root = store.get(genesis).unwrap().state_root();

        let mut left = unsealed(genesis_hash, None, &pool);
        left.link_parent_block(&mut store, genesis).unwrap();
        left.add_transactions([new_transfer(&key, 1, 40)]);
        let left = left.seal(REWARD).unwrap();

        let mut right = unsealed(genesis_hash, None, &pool);
        right.link_parent_block(&mut store, genesis).unwrap();
        right.add_transactions([new_transfer(&key, 1, 60)]);
        let right = right.seal(REWARD).unwrap();

        assert_ne!(left.state_root(), right.state_root());
        assert_eq!(
            store.get(genesis).unwrap().state_trie().unwrap().root_hash(),
            parent_root
        );
    }

    #[test]
    fn link_to_parent_without_state_fails() {
        let pool = pool();
        let mut store = BlockStore::new();
        let genesis = store_genesis(&mut store, Trie::new(), &pool);

        let mut child = unsealed(store.get(genesis).unwrap().hash(), None, &pool);
        child.link_parent_block(&mut store, genesis).unwrap();
        let child = child.seal(REWARD).unwrap();

        // received over the wire: no post-execution state until verified
        let received = Block::from_data(child.to_data(), pool.clone());
        let received_hash = received.hash();
        let received = store.insert(received).unwrap();

        let mut grandchild = unsealed(received_hash, None, &pool);
        assert_eq!(
            grandchild.link_parent_block(&mut store, received),
            Err(BlockError::ParentStateUnavailable(received_hash))
        );
        assert_eq!(grandchild.parent(), None);
    }

    #[test]
    fn link_resolves_unfinalized_ancestor_heights() {
        let pool = pool();
        let mut store = BlockStore::new();
        let genesis = store_genesis(&mut store, Trie::new(), &pool);
        let genesis_block = store.get(genesis).unwrap();
        let (genesis_hash, genesis_state) = (
            genesis_block.hash(),
            genesis_block.state_trie().cloned(),
        );

        // A points at genesis but its height was never resolved
        let mut a = unsealed(genesis_hash, genesis_state, &pool);
        a.parent = Some(genesis);
        let a = a.seal(REWARD).unwrap();
        let a_hash = a.hash();
        let a = store.insert(a).unwrap();
        assert_eq!(store.get(a).unwrap().height(), 0);

        let mut b = unsealed(a_hash, None, &pool);
        assert_eq!(b.link_parent_block(&mut store, a), Ok(true));

        assert_eq!(store.get(genesis).unwrap().height(), 0);
        assert_eq!(store.get(a).unwrap().height(), 1);
        assert_eq!(b.height(), 2);
    }

    #[test]
    fn link_stops_at_first_resolved_ancestor() {
        let pool = pool();
        let mut store = BlockStore::new();
        let genesis = store_genesis(&mut store, Trie::new(), &pool);

        let mut parent = genesis;
        for _ in 0..3 {
            let mut block = unsealed(store.get(parent).unwrap().hash(), None, &pool);
            block.link_parent_block(&mut store, parent).unwrap();
            parent = store.insert(block.seal(REWARD).unwrap()).unwrap();
        }
        assert_eq!(store.get(parent).unwrap().height(), 3);

        let mut tip = unsealed(store.get(parent).unwrap().hash(), None, &pool);
        tip.link_parent_block(&mut store, parent).unwrap();
        assert_eq!(tip.height(), 4);
    }

    #[test]
    fn link_with_unknown_handle_fails() {
        let mut store = BlockStore::new();
        let missing = {
            let mut other = BlockStore::new();
            store_genesis(&mut other, Trie::new(), &pool())
        };
        let mut block = unsealed(random_hash(), None, &pool());
        assert_eq!(
            block.link_parent_block(&mut store, missing),
            Err(BlockError::UnknownBlock(missing))
        );
    }

    #[test]
    fn link_through_missing_ancestor_changes_nothing() {
        let pool = pool();
        let dangling = {
            let mut other = BlockStore::new();
            store_genesis(&mut other, Trie::new(), &pool);
            let orphan = unsealed(random_hash(), Some(Trie::new()), &pool);
            other.insert(orphan.seal(REWARD).unwrap()).unwrap()
        };

        let mut store = BlockStore::new();
        let mut a = unsealed(random_hash(), Some(Trie::new()), &pool);
        a.parent = Some(dangling);
        let a = a.seal(REWARD).unwrap();
        let a_hash = a.hash();
        let a = store.insert(a).unwrap();

        let mut b = unsealed(a_hash, None, &pool);
        assert_eq!(
            b.link_parent_block(&mut store, a),
            Err(BlockError::UnknownBlock(dangling))
        );
        assert_eq!(b.parent(), None);
        assert_eq!(b.height(), 0);
        assert!(b.base_state.is_none());
        assert_eq!(store.get(a).unwrap().height(), 0);
    }

    #[test]
    fn received_block_verifies_after_linking() {
        let pool = pool();
        let key = PrivateKey::new();
        let mut store = BlockStore::new();
        let genesis = store_genesis(
            &mut store,
            funded_trie(&[(key.public_key().address(), 100)]),
            &pool,
        );

        let mut block = unsealed(store.get(genesis).unwrap().hash(), None, &pool);
        block.link_parent_block(&mut store, genesis).unwrap();
        block.add_transactions([new_transfer(&key, 1, 10)]);
        let built = block.seal(REWARD).unwrap();

        let mut received = Block::from_message(&built.to_message(), pool.clone()).unwrap();
        assert_eq!(received.verify(&no_work(), REWARD), Err(BlockError::Unlinked));

        assert_eq!(received.link_parent_block(&mut store, genesis), Ok(true));
        received.verify(&no_work(), REWARD).unwrap();
        assert!(received.is_verified());
        assert_eq!(
            received.state_trie().map(Trie::root_hash),
            Some(built.state_root())
        );
    }

    #[test]
    fn received_block_with_unexecutable_transaction_is_invalid() {
        let pool = pool();
        let key = PrivateKey::new();
        let mut store = BlockStore::new();
        let genesis = store_genesis(&mut store, Trie::new(), &pool);

        // sealed against a funded base, replayed against an empty one
        let mut block = unsealed(
            store.get(genesis).unwrap().hash(),
            Some(funded_trie(&[(key.public_key().address(), 100)])),
            &pool,
        );
        let tx = new_transfer(&key, 1, 10);
        block.add_transactions([tx.clone()]);
        let built = block.seal(REWARD).unwrap();

        let mut received = Block::from_data(built.to_data(), pool.clone());
        received.link_parent_block(&mut store, genesis).unwrap();
        assert!(matches!(
            received.verify(&no_work(), REWARD),
            Err(BlockError::InvalidTransaction { index: 0, hash, .. }) if hash == tx.hash()
        ));
    }

    #[test]
    fn wire_round_trip_preserves_header_and_transactions() {
        let pool = pool();
        let key = PrivateKey::new();
        let state = funded_trie(&[(key.public_key().address(), 100)]);
        let mut block = unsealed(random_hash(), Some(state), &pool);
        block.set_nonce(u64::MAX);
        block.set_timestamp(-1);
        block.add_transactions([new_transfer(&key, 1, 10)]);
        let sealed = block.seal(REWARD).unwrap();

        let decoded = Block::from_message(&sealed.to_message(), pool.clone()).unwrap();
        assert_eq!(decoded.header(), sealed.header());
        assert_eq!(decoded.transactions(), sealed.transactions());
        assert!(decoded.state_trie().is_none());

        let header = Header::from_message(&sealed.header().to_message()).unwrap();
        assert_eq!(&header, sealed.header());
        assert_eq!(header.nonce(), u64::MAX);
        assert_eq!(header.timestamp(), -1);
    }

    #[test]
    fn wire_rejects_mismatched_message() {
        let sealed = unsealed(Hash::zero(), Some(Trie::new()), &pool()).seal(REWARD).unwrap();
        assert_eq!(
            Block::from_message(&sealed.header().to_message(), pool()).unwrap_err(),
            DecodeError::UnexpectedMessage {
                expected: "Block",
                actual: "Header"
            }
        );
        assert_eq!(
            Header::from_message(&sealed.to_message()).unwrap_err(),
            DecodeError::UnexpectedMessage {
                expected: "Header",
                actual: "Block"
            }
        );
    }
}
