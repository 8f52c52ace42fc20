// 6.1 custody.rs: the engine's only window onto balances. escrow collateral in, pay value out,
// mint or burn the difference between payout and locked cost. every movement goes through the
// ledger's own custody account; the engine never names it.

use std::fmt::Debug;
use std::sync::Arc;

use crate::token::{LedgerError, Token};
use crate::types::{AccountId, Quote};

pub trait BalanceLedger: Send + Sync + Debug {
    /// Account holding escrowed collateral, fees and liquidation pots.
    fn custodian(&self) -> AccountId;

    /// Move `amount` from `from` into custody.
    fn escrow(&self, from: AccountId, amount: Quote) -> Result<(), LedgerError>;

    /// Move `amount` out of custody to `to`.
    fn payout(&self, to: AccountId, amount: Quote) -> Result<(), LedgerError>;

    /// Mint `amount` into custody.
    fn mint(&self, amount: Quote) -> Result<(), LedgerError>;

    /// Burn `amount` out of custody.
    fn burn(&self, amount: Quote) -> Result<(), LedgerError>;
}

/// BalanceLedger over a Token. the custodian account holds escrowed collateral and needs the
/// minter and burner roles on the token.
#[derive(Debug, Clone)]
pub struct TokenCustody {
    token: Arc<Token>,
    custodian: AccountId,
}

impl TokenCustody {
    pub fn new(token: Arc<Token>, custodian: AccountId) -> Self {
        Self { token, custodian }
    }

    pub fn token(&self) -> &Arc<Token> {
        &self.token
    }

    pub fn held(&self) -> Quote {
        self.token.balance_of(self.custodian)
    }
}

impl BalanceLedger for TokenCustody {
    fn custodian(&self) -> AccountId {
        self.custodian
    }

    fn escrow(&self, from: AccountId, amount: Quote) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        self.token.transfer(from, self.custodian, amount)
    }

    fn payout(&self, to: AccountId, amount: Quote) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        self.token.transfer(self.custodian, to, amount)
    }

    fn mint(&self, amount: Quote) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        self.token.mint(self.custodian, self.custodian, amount)
    }

    fn burn(&self, amount: Quote) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        self.token.burn(self.custodian, self.custodian, amount)
    }
}
