//! Block arena and the chain façade that builds and accepts blocks.

use crate::core::block::{Block, BlockError, Sealed, Unsealed};
use crate::core::consensus::{ChainParams, Consensus, ProofOfWork};
use crate::core::transaction::Transaction;
use crate::storage::trie::Trie;
use crate::storage::txpool::TxPool;
use crate::types::address::Address;
use crate::types::hash::Hash;
use crate::{info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Handle of a block inside a [`BlockStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

impl BlockId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Append-only arena of sealed blocks with a hash index.
///
/// Blocks refer to their parent by [`BlockId`], so the ancestor chain is a
/// walk over this arena rather than a chain of references.
#[derive(Default)]
pub struct BlockStore {
    blocks: Vec<Block<Sealed>>,
    index: HashMap<Hash, BlockId>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `block`. A block whose hash is already stored is rejected.
    pub fn insert(&mut self, block: Block<Sealed>) -> Result<BlockId, BlockError> {
        let hash = block.hash();
        if self.index.contains_key(&hash) {
            return Err(BlockError::DuplicateBlock(hash));
        }

        let id = BlockId(self.blocks.len());
        self.blocks.push(block);
        self.index.insert(hash, id);
        Ok(id)
    }

    pub fn get(&self, id: BlockId) -> Option<&Block<Sealed>> {
        self.blocks.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: BlockId) -> Option<&mut Block<Sealed>> {
        self.blocks.get_mut(id.0)
    }

    pub fn id_of(&self, hash: &Hash) -> Option<BlockId> {
        self.index.get(hash).copied()
    }

    pub fn get_by_hash(&self, hash: &Hash) -> Option<&Block<Sealed>> {
        self.id_of(hash).and_then(|id| self.get(id))
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.index.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Owns the block arena, the shared pool and the consensus backend.
///
/// Generic over the consensus backend for zero-cost dispatch.
pub struct Blockchain<C: Consensus> {
    params: ChainParams,
    consensus: C,
    tx_pool: Arc<TxPool>,
    store: BlockStore,
    genesis: BlockId,
}

impl Blockchain<ProofOfWork> {
    /// Creates a chain with the proof-of-work backend configured in `params`.
    pub fn new(params: ChainParams, genesis_state: Trie) -> Result<Self, BlockError> {
        let consensus = params.proof_of_work();
        Self::with_consensus(params, consensus, genesis_state)
    }
}

impl<C: Consensus> Blockchain<C> {
    /// Seals a genesis block over `genesis_state` and stores it at height 0.
    ///
    /// The genesis block has a zero parent hash, a zero coinbase and a zero
    /// timestamp, so equal parameters and state always give the same genesis.
    pub fn with_consensus(
        params: ChainParams,
        consensus: C,
        genesis_state: Trie,
    ) -> Result<Self, BlockError> {
        let tx_pool = Arc::new(TxPool::new(Some(params.txpool_capacity)));

        let mut genesis = Block::new(
            params.chain_id,
            Address::zero(),
            Hash::zero(),
            0,
            Some(genesis_state),
            Trie::new(),
            tx_pool.clone(),
        );
        genesis.set_timestamp(0);
        let genesis = genesis.seal(params.block_reward)?;

        info!(
            "Initializing blockchain with genesis block: hash={} state_root={} chain_id={}",
            genesis.hash(),
            genesis.state_root(),
            params.chain_id
        );

        let mut store = BlockStore::new();
        let genesis = store.insert(genesis)?;

        Ok(Self {
            params,
            consensus,
            tx_pool,
            store,
            genesis,
        })
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn consensus(&self) -> &C {
        &self.consensus
    }

    pub fn tx_pool(&self) -> &Arc<TxPool> {
        &self.tx_pool
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn genesis(&self) -> BlockId {
        self.genesis
    }

    pub fn get(&self, id: BlockId) -> Option<&Block<Sealed>> {
        self.store.get(id)
    }

    pub fn get_by_hash(&self, hash: &Hash) -> Option<&Block<Sealed>> {
        self.store.get_by_hash(hash)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.store.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Creates an empty unsealed block on top of `parent`, already linked.
    pub fn new_block(
        &mut self,
        parent: BlockId,
        coinbase: Address,
    ) -> Result<Block<Unsealed>, BlockError> {
        let parent_hash = self
            .store
            .get(parent)
            .ok_or(BlockError::UnknownBlock(parent))?
            .hash();

        let mut block = Block::new(
            self.params.chain_id,
            coinbase,
            parent_hash,
            0,
            None,
            Trie::new(),
            self.tx_pool.clone(),
        );
        block.link_parent_block(&mut self.store, parent)?;
        Ok(block)
    }

    /// Builds, mines and seals a block on top of `parent` from up to `max_txs`
    /// pooled transactions.
    ///
    /// Failing transactions go back to the pool before mining, so the nonce
    /// found by the backend stays valid through sealing. If any step fails,
    /// every transaction still held by the block is put back. The block is
    /// returned, not stored; see [`Blockchain::insert_sealed`].
    pub fn build_block(
        &mut self,
        parent: BlockId,
        coinbase: Address,
        max_txs: usize,
    ) -> Result<Block<Sealed>, BlockError> {
        let reward = self.params.block_reward;
        let mut block = self.new_block(parent, coinbase)?;
        block.add_transactions(self.tx_pool.take(max_txs));

        let prepared = match block.execute_transactions(reward) {
            Ok(_) => self.consensus.prepare_block(&mut block).map_err(BlockError::from),
            Err(err) => Err(err),
        };
        if let Err(err) = prepared {
            self.restore_to_pool(block.transactions());
            return Err(err);
        }

        let pending: Vec<Transaction> = block.transactions().iter().cloned().collect();
        block.seal(reward).inspect_err(|_| self.restore_to_pool(&pending))
    }

    /// Puts back transactions taken for a block that was never built.
    fn restore_to_pool(&self, transactions: &[Transaction]) {
        for tx in transactions {
            if !self.tx_pool.put(tx.clone()) {
                warn!("transaction pool refused restored transaction {}", tx.hash());
            }
        }
    }

    /// Stores a block sealed by this node.
    pub fn insert_sealed(&mut self, block: Block<Sealed>) -> Result<BlockId, BlockError> {
        let id = self.store.insert(block)?;
        if let Some(block) = self.store.get(id) {
            info!("stored block {block}");
        }
        Ok(id)
    }

    /// Links a received block to its stored parent, verifies it and stores it.
    pub fn accept(&mut self, mut block: Block<Sealed>) -> Result<BlockId, BlockError> {
        if self.store.contains(&block.hash()) {
            return Err(BlockError::DuplicateBlock(block.hash()));
        }

        let parent = self
            .store
            .id_of(&block.parent_hash())
            .ok_or(BlockError::UnknownParent(block.parent_hash()))?;
        block.link_parent_block(&mut self.store, parent)?;
        block.verify(&self.consensus, self.params.block_reward)?;

        info!("accepted block {block}");
        self.store.insert(block)
    }
}
