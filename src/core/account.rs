use ledger_derive::{BinaryCodec, Error};

/// Errors raised by balance arithmetic on an account record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: u128, required: u128 },
    #[error("balance overflow")]
    BalanceOverflow,
    #[error("nonce overflow")]
    NonceOverflow,
}

/// Account record stored in the state trie under [`Address::state_key`].
///
/// An address with no record reads as [`Account::default`]: zero balance and
/// zero nonce.
///
/// [`Address::state_key`]: crate::types::address::Address::state_key
#[derive(BinaryCodec, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Account {
    /// Number of transactions executed from this account.
    nonce: u64,
    /// Spendable balance in the native currency.
    balance: u128,
}

impl Account {
    pub fn new(balance: u128) -> Self {
        Self { nonce: 0, balance }
    }

    pub fn balance(&self) -> u128 {
        self.balance
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn credit(&mut self, amount: u128) -> Result<(), AccountError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(AccountError::BalanceOverflow)?;
        Ok(())
    }

    pub fn debit(&mut self, amount: u128) -> Result<(), AccountError> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(AccountError::InsufficientBalance {
                balance: self.balance,
                required: amount,
            })?;
        Ok(())
    }

    pub fn bump_nonce(&mut self) -> Result<(), AccountError> {
        self.nonce = self.nonce.checked_add(1).ok_or(AccountError::NonceOverflow)?;
        Ok(())
    }
}
