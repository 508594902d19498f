use std::collections::HashMap;

use ethers::types::{Address, U256};

use super::error::TokenError;

pub const TOKEN_DECIMALS: u8 = 18;

/// ERC-20 token state. Launched tokens are owned by their bonding curve,
/// which is the only account allowed to mint and burn.
#[derive(Debug, Clone, Default)]
pub struct Erc20 {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
    pub owner: Address,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

impl Erc20 {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, owner: Address) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals: TOKEN_DECIMALS,
            owner,
            ..Self::default()
        }
    }

    pub fn balance_of(&self, owner: Address) -> U256 {
        self.balances.get(&owner).copied().unwrap_or_default()
    }

    fn write_balance(&mut self, owner: Address, amount: U256) {
        self.balances.insert(owner, amount);
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((owner, spender), amount);
    }

    pub fn transfer(
        &mut self,
        sender: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        let sender_balance = self.balance_of(sender);
        if sender_balance < amount {
            return Err(TokenError::InsufficientBalance);
        }
        self.write_balance(sender, sender_balance - amount);
        let recipient_balance = self.balance_of(recipient);
        let updated = recipient_balance
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        self.write_balance(recipient, updated);
        Ok(())
    }

    /// Move `amount` from `owner` to `recipient` on `spender`'s allowance.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        let current_allowance = self.allowance(owner, spender);
        if current_allowance < amount {
            return Err(TokenError::InsufficientAllowance);
        }
        self.transfer(owner, recipient, amount)?;
        self.approve(owner, spender, current_allowance - amount);
        Ok(())
    }

    pub fn mint(&mut self, caller: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        if caller != self.owner {
            return Err(TokenError::Unauthorized);
        }
        self.credit(to, amount)
    }

    pub fn burn(&mut self, caller: Address, from: Address, amount: U256) -> Result<(), TokenError> {
        if caller != self.owner {
            return Err(TokenError::Unauthorized);
        }
        self.debit(from, amount)
    }

    /// Unrestricted mint backing wrapped-native deposits.
    pub fn credit(&mut self, to: Address, amount: U256) -> Result<(), TokenError> {
        let balance = self.balance_of(to);
        let total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        self.write_balance(to, balance + amount);
        self.total_supply = total_supply;
        Ok(())
    }

    /// Unrestricted burn backing wrapped-native withdrawals.
    pub fn debit(&mut self, from: Address, amount: U256) -> Result<(), TokenError> {
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(TokenError::InsufficientBalance);
        }
        self.write_balance(from, balance - amount);
        self.total_supply -= amount;
        Ok(())
    }
}
