//! Pure block state transition: coinbase reward followed by transaction replay.
//!
//! Nothing here touches a block. Callers hand in the pre-execution tries and get
//! back freshly forked post-execution tries, so computing a state root twice
//! never applies the reward twice.

use crate::core::transaction::{Transaction, TransactionError};
use crate::storage::state::{AccountState, StateError};
use crate::storage::trie::Trie;
use crate::types::address::Address;
use crate::types::hash::Hash;

/// A transaction that failed execution, with its position in the input list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTransaction {
    pub index: usize,
    pub transaction: Transaction,
    pub error: TransactionError,
}

/// Result of applying a block's reward and transactions to its base state.
#[derive(Debug)]
pub struct StateTransition {
    /// Root of `state_trie`.
    pub state_root: Hash,
    pub state_trie: Trie,
    pub txs_trie: Trie,
    /// Transactions that executed, in their original relative order.
    pub included: Vec<Transaction>,
    pub rejected: Vec<RejectedTransaction>,
}

/// Credits `reward` to the coinbase account, creating it if absent.
pub fn reward_coinbase(
    state: &mut Trie,
    coinbase: &Address,
    reward: u128,
) -> Result<(), StateError> {
    let mut account = state.account_or_default(coinbase)?;
    account.credit(reward)?;
    state.set_account(coinbase, &account)
}

/// Executes `transactions` in order, skipping the ones that fail.
///
/// Transactions bound to another chain are rejected without running. A failed
/// transaction leaves both tries untouched, so the included set replayed on
/// its own reproduces the same state.
pub fn execute_transactions(
    state: &mut Trie,
    txs: &mut Trie,
    chain_id: u32,
    transactions: &[Transaction],
) -> (Vec<Transaction>, Vec<RejectedTransaction>) {
    let mut included = Vec::with_capacity(transactions.len());
    let mut rejected = Vec::new();

    for (index, tx) in transactions.iter().enumerate() {
        let result = if tx.chain_id == chain_id {
            tx.execute(state, txs)
        } else {
            Err(TransactionError::ChainIdMismatch {
                expected: chain_id,
                actual: tx.chain_id,
            })
        };

        match result {
            Ok(()) => included.push(tx.clone()),
            Err(error) => rejected.push(RejectedTransaction {
                index,
                transaction: tx.clone(),
                error,
            }),
        }
    }

    (included, rejected)
}

/// Forks the base tries, rewards the coinbase, then executes `transactions`.
///
/// A reward failure aborts the whole computation; the forks are dropped and
/// no partially rewarded state escapes.
pub fn compute_state_root(
    base_state: &Trie,
    base_txs: &Trie,
    chain_id: u32,
    coinbase: &Address,
    transactions: &[Transaction],
    reward: u128,
) -> Result<StateTransition, StateError> {
    let mut state_trie = base_state.clone();
    let mut txs_trie = base_txs.clone();

    reward_coinbase(&mut state_trie, coinbase, reward)?;
    let (included, rejected) =
        execute_transactions(&mut state_trie, &mut txs_trie, chain_id, transactions);

    Ok(StateTransition {
        state_root: state_trie.root_hash(),
        state_trie,
        txs_trie,
        included,
        rejected,
    })
}
