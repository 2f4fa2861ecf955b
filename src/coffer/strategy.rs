//! Strategy capability boundary and a hold-in-place reference strategy
use odra::casper_types::U256;
use odra::prelude::*;
use odra::ContractRef;

use super::asset::AssetKind;
use crate::errors::VaultError;
use crate::token::Cep18TokenContractRef;

/// Surface the vault requires from a yield strategy.
///
/// The identity getters must echo the asset the strategy was built for;
/// the registry and `set_strategy` refuse a strategy whose answers differ
/// from the asset being bound.
#[odra::external_contract]
pub trait CofferStrategy {
    /// Kind of the base asset the strategy accepts
    fn token_kind(&self) -> AssetKind;

    /// Token contract of the base asset (None for Native)
    fn token_contract(&self) -> Option<Address>;

    /// Sub id of the base asset
    fn token_sub_id(&self) -> u64;

    /// Funds currently under the strategy's control, in underlying units
    fn current_balance(&self) -> U256;

    /// Notifies the strategy that `amount` was pushed to it for investment
    fn invest(&mut self, amount: U256);

    /// Returns up to `amount` to the vault, reporting what actually moved
    fn divest(&mut self, amount: U256) -> U256;

    /// Unwinds everything back to the vault, reporting what actually moved
    fn exit(&mut self) -> U256;
}

/// Reference strategy that simply sits on the tokens it is given.
/// Profit is whatever lands on its balance from the outside; the `leak`
/// entry point simulates losses in test environments.
#[odra::module]
pub struct SimpleStrategy {
    /// Vault allowed to drive invest/divest/exit
    coffer: Var<Address>,
    /// CEP-18 token this strategy is bound to
    token: Var<Address>,
    /// Deployer, allowed to leak funds in tests
    admin: Var<Address>,
}

#[odra::module]
impl SimpleStrategy {
    /// Binds the strategy to a vault and a CEP-18 token
    pub fn init(&mut self, coffer: Address, token: Address) {
        self.coffer.set(coffer);
        self.token.set(token);
        self.admin.set(self.env().caller());
    }

    /// Kind of the base asset
    pub fn token_kind(&self) -> AssetKind {
        AssetKind::External
    }

    /// Token contract of the base asset
    pub fn token_contract(&self) -> Option<Address> {
        self.token.get()
    }

    /// Sub id of the base asset
    pub fn token_sub_id(&self) -> u64 {
        0
    }

    /// Tokens currently held by the strategy
    pub fn current_balance(&self) -> U256 {
        let token = self.token.get_or_revert_with(VaultError::TransferFailed);
        let token_ref = Cep18TokenContractRef::new(self.env(), token);
        token_ref.balance_of(Address::from(self.env().self_address()))
    }

    /// Accepts funds the vault already pushed; nothing to do for holding
    pub fn invest(&mut self, _amount: U256) {
        self.only_coffer();
    }

    /// Sends up to `amount` back to the vault
    pub fn divest(&mut self, amount: U256) -> U256 {
        self.only_coffer();
        let held = self.current_balance();
        let actual = if amount < held { amount } else { held };
        self.send_to_coffer(actual);
        actual
    }

    /// Unwinds the whole position back to the vault
    pub fn exit(&mut self) -> U256 {
        self.only_coffer();
        let held = self.current_balance();
        self.send_to_coffer(held);
        held
    }

    /// Test hook: moves tokens out of the strategy to simulate a loss
    pub fn leak(&mut self, to: Address, amount: U256) {
        let caller = self.env().caller();
        let admin = self.admin.get_or_revert_with(VaultError::Unauthorized);
        if caller != admin {
            self.env().revert(VaultError::Unauthorized);
        }
        let token = self.token.get_or_revert_with(VaultError::TransferFailed);
        let mut token_ref = Cep18TokenContractRef::new(self.env(), token);
        token_ref.transfer(to, amount);
    }

    fn send_to_coffer(&mut self, amount: U256) {
        if amount.is_zero() {
            return;
        }
        let coffer = self.coffer.get_or_revert_with(VaultError::Unauthorized);
        let token = self.token.get_or_revert_with(VaultError::TransferFailed);
        let mut token_ref = Cep18TokenContractRef::new(self.env(), token);
        token_ref.transfer(coffer, amount);
    }

    fn only_coffer(&self) {
        let caller = self.env().caller();
        let coffer = self.coffer.get_or_revert_with(VaultError::Unauthorized);
        if caller != coffer {
            self.env().revert(VaultError::Unauthorized);
        }
    }
}
