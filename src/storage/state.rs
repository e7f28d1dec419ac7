//! Account records on top of a [`Trie`].

use crate::core::account::{Account, AccountError};
use crate::storage::trie::{Trie, TrieError};
use crate::types::address::Address;
use crate::types::encoding::{Decode, DecodeError, Encode};
use ledger_derive::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("{0}")]
    Trie(TrieError),
    #[error("{0}")]
    Account(AccountError),
    #[error("corrupt account record for {address}: {source}")]
    CorruptAccount {
        address: Address,
        source: DecodeError,
    },
}

impl From<TrieError> for StateError {
    fn from(err: TrieError) -> Self {
        StateError::Trie(err)
    }
}

impl From<AccountError> for StateError {
    fn from(err: AccountError) -> Self {
        StateError::Account(err)
    }
}

/// Typed access to the account records kept in a state trie.
pub trait AccountState {
    /// Returns the account stored for `address`, or `None` if it has no record.
    fn get_account(&self, address: &Address) -> Result<Option<Account>, StateError>;

    /// Writes the account record for `address`.
    fn set_account(&mut self, address: &Address, account: &Account) -> Result<(), StateError>;

    /// Returns the stored account, or an empty one if `address` has no record.
    fn account_or_default(&self, address: &Address) -> Result<Account, StateError> {
        Ok(self.get_account(address)?.unwrap_or_default())
    }
}

impl AccountState for Trie {
    fn get_account(&self, address: &Address) -> Result<Option<Account>, StateError> {
        let Some(bytes) = self.get(&address.state_key())? else {
            return Ok(None);
        };

        Account::from_bytes(&bytes)
            .map(Some)
            .map_err(|source| StateError::CorruptAccount {
                address: *address,
                source,
            })
    }

    fn set_account(&mut self, address: &Address, account: &Account) -> Result<(), StateError> {
        self.put(address.state_key(), account.to_vec())?;
        Ok(())
    }
}
