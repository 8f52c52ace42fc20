// 6.0: in-memory balance token. balances, total supply, and role-gated mint/burn.
// the collateral manager only ever touches it through the BalanceLedger adapter in custody.rs.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::types::{AccountId, Quote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Minter,
    Burner,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient balance for {account:?}: need {required}, have {available}")]
    InsufficientBalance {
        account: AccountId,
        required: Quote,
        available: Quote,
    },
    #[error("only minter")]
    OnlyMinter,
    #[error("only burner")]
    OnlyBurner,
    #[error("only admin")]
    OnlyAdmin,
}

#[derive(Debug, Default)]
struct TokenState {
    balances: HashMap<AccountId, Quote>,
    total_supply: Quote,
    roles: HashMap<Role, HashSet<AccountId>>,
}

impl TokenState {
    fn has_role(&self, role: Role, account: AccountId) -> bool {
        self.roles.get(&role).is_some_and(|members| members.contains(&account))
    }

    fn balance(&self, account: AccountId) -> Quote {
        self.balances.get(&account).copied().unwrap_or_else(Quote::zero)
    }

    fn debit(&mut self, account: AccountId, amount: Quote) -> Result<(), LedgerError> {
        let available = self.balance(account);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account,
                required: amount,
                available,
            });
        }
        self.balances.insert(account, available.saturating_sub(amount));
        Ok(())
    }

    fn credit(&mut self, account: AccountId, amount: Quote) {
        let balance = self.balance(account).add(amount);
        self.balances.insert(account, balance);
    }
}

/// Fungible token with admin, minter and burner roles.
#[derive(Debug)]
pub struct Token {
    symbol: String,
    state: RwLock<TokenState>,
}

impl Token {
    /// New token with `admin` holding the admin role.
    pub fn new(symbol: impl Into<String>, admin: AccountId) -> Self {
        let mut state = TokenState::default();
        state.roles.entry(Role::Admin).or_default().insert(admin);
        Self {
            symbol: symbol.into(),
            state: RwLock::new(state),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn balance_of(&self, account: AccountId) -> Quote {
        self.state.read().balance(account)
    }

    pub fn total_supply(&self) -> Quote {
        self.state.read().total_supply
    }

    pub fn has_role(&self, role: Role, account: AccountId) -> bool {
        self.state.read().has_role(role, account)
    }

    pub fn grant_role(&self, caller: AccountId, role: Role, account: AccountId) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        if !state.has_role(Role::Admin, caller) {
            return Err(LedgerError::OnlyAdmin);
        }
        state.roles.entry(role).or_default().insert(account);
        Ok(())
    }

    pub fn revoke_role(&self, caller: AccountId, role: Role, account: AccountId) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        if !state.has_role(Role::Admin, caller) {
            return Err(LedgerError::OnlyAdmin);
        }
        if let Some(members) = state.roles.get_mut(&role) {
            members.remove(&account);
        }
        Ok(())
    }

    pub fn mint(&self, caller: AccountId, to: AccountId, amount: Quote) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        if !state.has_role(Role::Minter, caller) {
            return Err(LedgerError::OnlyMinter);
        }
        state.credit(to, amount);
        state.total_supply = state.total_supply.add(amount);
        Ok(())
    }

    pub fn burn(&self, caller: AccountId, from: AccountId, amount: Quote) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        if !state.has_role(Role::Burner, caller) {
            return Err(LedgerError::OnlyBurner);
        }
        state.debit(from, amount)?;
        state.total_supply = state.total_supply.saturating_sub(amount);
        Ok(())
    }

    pub fn transfer(&self, from: AccountId, to: AccountId, amount: Quote) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        state.debit(from, amount)?;
        state.credit(to, amount);
        Ok(())
    }

    /// Moves `transfer_amount` from the caller to `to` and burns `burn_amount` of the
    /// caller's balance in one step. caller needs the burner role.
    pub fn transfer_burn(
        &self,
        caller: AccountId,
        to: AccountId,
        transfer_amount: Quote,
        burn_amount: Quote,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        if !state.has_role(Role::Burner, caller) {
            return Err(LedgerError::OnlyBurner);
        }
        state.debit(caller, transfer_amount.add(burn_amount))?;
        state.credit(to, transfer_amount);
        state.total_supply = state.total_supply.saturating_sub(burn_amount);
        Ok(())
    }

    /// Sum of all balances. equals total supply unless something is broken.
    pub fn balances_total(&self) -> Decimal {
        self.state.read().balances.values().map(|q| q.value()).sum()
    }
}
