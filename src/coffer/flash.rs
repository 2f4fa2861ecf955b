//! Flash loan borrower boundary and a repaying mock
use odra::casper_types::U256;
use odra::prelude::*;
use odra::ContractRef;

use crate::errors::VaultError;
use crate::token::Cep18TokenContractRef;

/// Callback surface a flash loan borrower must expose.
/// The vault pushes the principal first and calls back afterwards;
/// by the time the callback returns, principal plus fee must be back
/// in vault custody.
#[odra::external_contract]
pub trait FlashBorrower {
    /// Single-asset loan callback
    fn on_flash_loan(&mut self, sender: Address, asset_id: u32, amount: U256, fee: U256, data: Vec<u8>);

    /// Batched loan callback; arrays are index-aligned
    fn on_batch_flash_loan(
        &mut self,
        sender: Address,
        asset_ids: Vec<u32>,
        amounts: Vec<U256>,
        fees: Vec<U256>,
        data: Vec<u8>,
    );
}

/// Borrower used by the test suite. Repays principal plus fee from its own
/// token balance, or withholds the fee when told to misbehave.
#[odra::module]
pub struct FlashBorrowerMock {
    /// Vault to repay
    coffer: Var<Address>,
    /// Token the loans are denominated in
    token: Var<Address>,
    /// When false, repay only the principal
    pay_fee: Var<bool>,
}

#[odra::module]
impl FlashBorrowerMock {
    /// Binds the borrower to a vault and a token
    pub fn init(&mut self, coffer: Address, token: Address) {
        self.coffer.set(coffer);
        self.token.set(token);
        self.pay_fee.set(true);
    }

    /// Toggles fee repayment for shortfall tests
    pub fn set_pay_fee(&mut self, pay_fee: bool) {
        self.pay_fee.set(pay_fee);
    }

    /// Repays the loan, with or without the fee
    pub fn on_flash_loan(&mut self, _sender: Address, _asset_id: u32, amount: U256, fee: U256, _data: Vec<u8>) {
        self.repay(amount, fee);
    }

    /// Repays every leg of a batched loan
    pub fn on_batch_flash_loan(
        &mut self,
        _sender: Address,
        _asset_ids: Vec<u32>,
        amounts: Vec<U256>,
        fees: Vec<U256>,
        _data: Vec<u8>,
    ) {
        for (i, amount) in amounts.iter().enumerate() {
            self.repay(*amount, fees[i]);
        }
    }

    fn repay(&mut self, amount: U256, fee: U256) {
        let coffer = self.coffer.get_or_revert_with(VaultError::TransferFailed);
        let token = self.token.get_or_revert_with(VaultError::TransferFailed);
        let owed = if self.pay_fee.get_or_default() {
            amount + fee
        } else {
            amount
        };
        let mut token_ref = Cep18TokenContractRef::new(self.env(), token);
        token_ref.transfer(coffer, owed);
    }
}
