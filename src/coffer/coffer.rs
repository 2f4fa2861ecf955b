//! Coffer - the multi-asset custodial vault contract
//!
//! Coordinates the asset registry, the per-asset rebase ledger, account
//! share balances, strategy delegation, flash loans and call batching.
//! Conversions round in favor of the vault; every stored quantity is capped
//! at 128 bits and arithmetic fails closed.

use odra::casper_types::{U256, U512};
use odra::prelude::*;
use odra::ContractRef;

use super::asset::{commit_ready, Asset, AssetKind, StrategyData};
use super::batch::CofferCall;
use super::flash::FlashBorrowerContractRef;
use super::minted::MintedTokenLedgerContractRef;
use super::strategy::CofferStrategyContractRef;
use crate::errors::VaultError;
use crate::events::*;
use crate::math::{flash_fee, Rebase, MAX_TARGET_PERCENTAGE, MINIMUM_SHARE_BALANCE, STRATEGY_DELAY};
use crate::token::Cep18TokenContractRef;

/// The vault contract
#[odra::module]
pub struct Coffer {
    /// Vault admin (None once renounced)
    admin: Var<Option<Address>>,
    /// Queued admin for the two-step transfer
    pending_admin: Var<Address>,
    /// Block time the pending admin was queued; 0 when none
    pending_admin_since: Var<u64>,
    /// Internally-minted token hub allowed to register assets
    token_hub: Var<Address>,
    /// Number of registered assets; ids are 1-based
    asset_count: Var<u32>,
    /// Asset id -> asset
    assets: Mapping<u32, Asset>,
    /// Dedupe index: full identity tuple -> asset id
    ids: Mapping<(AssetKind, Option<Address>, Option<Address>, u64), u32>,
    /// Asset id -> elastic/base pair
    totals: Mapping<u32, Rebase>,
    /// (asset id, account) -> shares
    balances: Mapping<(u32, Address), U256>,
    /// (owner, operator) -> operator may act on all of owner's balances
    operator_approvals: Mapping<(Address, Address), bool>,
    /// Contracts trusted to act for any account
    trusted_delegates: Mapping<Address, bool>,
    /// Asset id -> strategy state
    strategy_data: Mapping<u32, StrategyData>,
}

#[odra::module]
impl Coffer {
    /// Initializes the vault. The caller becomes admin and the fixed
    /// wrapped-native asset is allocated as id 1.
    pub fn init(&mut self) {
        let caller = self.env().caller();
        self.admin.set(Some(caller));
        self.pending_admin_since.set(0);
        self.asset_count.set(0);

        self.register_internal(AssetKind::Native, None, None, 0);
    }

    // ========================================
    // Asset registry
    // ========================================

    /// Registers an External asset and returns its id. Identical tuples
    /// are idempotent and return the existing id without an event.
    pub fn register_asset(
        &mut self,
        kind: AssetKind,
        contract_address: Address,
        strategy: Option<Address>,
        sub_id: u64,
    ) -> u32 {
        match kind {
            // the wrapped-native asset is fixed at init; internally-minted
            // assets only enter through the token hub
            AssetKind::Native | AssetKind::InternallyMinted => {
                self.env().revert(VaultError::InvalidTokenKind)
            }
            AssetKind::External => {
                if sub_id != 0 {
                    self.env().revert(VaultError::SubIdNotAllowed);
                }
                if !contract_address.is_contract() {
                    self.env().revert(VaultError::NotAToken);
                }
            }
        }

        self.check_strategy(&kind, &Some(contract_address), sub_id, &strategy);
        self.register_internal(kind, Some(contract_address), strategy, sub_id)
    }

    /// Registers an InternallyMinted asset; only the token hub may call
    pub fn register_minted_asset(&mut self, sub_id: u64, strategy: Option<Address>) -> u32 {
        let caller = self.env().caller();
        let hub = self.token_hub.get_or_revert_with(VaultError::Unauthorized);
        if caller != hub {
            self.env().revert(VaultError::Unauthorized);
        }

        let kind = AssetKind::InternallyMinted;
        self.check_strategy(&kind, &Some(hub), sub_id, &strategy);
        self.register_internal(kind, Some(hub), strategy, sub_id)
    }

    // ========================================
    // Balance ledger
    // ========================================

    /// Deposits underlying and credits shares to `to`.
    ///
    /// Exactly one of `amount`/`share` must be nonzero; the other is derived
    /// with vault-favoring rounding. With `from` set to the vault itself the
    /// call skims tokens already sitting in custody instead of pulling.
    /// Returns the settled (amount, share) pair.
    #[odra(payable)]
    pub fn deposit(&mut self, asset_id: u32, from: Address, to: Address, amount: U256, share: U256) -> (U256, U256) {
        let caller = self.env().caller();
        let mut value = self.env().attached_value();
        match self.try_deposit(caller, asset_id, from, to, amount, share, &mut value) {
            Ok(settled) => settled,
            Err(error) => self.env().revert(error),
        }
    }

    /// Burns shares from `from` and sends underlying to `to`.
    /// Returns the settled (amount, share) pair.
    pub fn withdraw(&mut self, asset_id: u32, from: Address, to: Address, amount: U256, share: U256) -> (U256, U256) {
        let caller = self.env().caller();
        match self.try_withdraw(caller, asset_id, from, to, amount, share) {
            Ok(settled) => settled,
            Err(error) => self.env().revert(error),
        }
    }

    /// Moves shares between accounts; the rebase pair is untouched
    pub fn transfer(&mut self, asset_id: u32, from: Address, to: Address, share: U256) {
        let caller = self.env().caller();
        if let Err(error) = self.try_transfer(caller, asset_id, from, to, share) {
            self.env().revert(error);
        }
    }

    /// Moves shares from one account to many, leg by leg, all-or-nothing
    pub fn batch_transfer(&mut self, asset_id: u32, from: Address, tos: Vec<Address>, shares: Vec<U256>) {
        if tos.len() != shares.len() {
            self.env().revert(VaultError::LengthMismatch);
        }
        let caller = self.env().caller();
        for (i, to) in tos.iter().enumerate() {
            if let Err(error) = self.try_transfer(caller, asset_id, from, *to, shares[i]) {
                self.env().revert(error);
            }
        }
    }

    /// Moves shares of several assets to one recipient, all-or-nothing
    pub fn transfer_multiple(&mut self, asset_ids: Vec<u32>, from: Address, to: Address, shares: Vec<U256>) {
        if asset_ids.len() != shares.len() {
            self.env().revert(VaultError::LengthMismatch);
        }
        let caller = self.env().caller();
        for (i, asset_id) in asset_ids.iter().enumerate() {
            if let Err(error) = self.try_transfer(caller, *asset_id, from, to, shares[i]) {
                self.env().revert(error);
            }
        }
    }

    /// Grants or revokes an operator's rights over all of the caller's
    /// balances
    pub fn set_approval_for_all(&mut self, operator: Address, approved: bool) {
        let owner = self.env().caller();
        self.operator_approvals.set(&(owner, operator), approved);
        self.env().emit_event(ApprovalForAll {
            owner,
            operator,
            approved,
        });
    }

    /// Trusts or untrusts a delegate contract; admin only
    pub fn set_trusted_delegate(&mut self, delegate: Address, trusted: bool) {
        self.only_admin();
        self.trusted_delegates.set(&delegate, trusted);
        self.env().emit_event(TrustedDelegateSet { delegate, trusted });
    }

    /// Sets the internally-minted token hub; admin only
    pub fn set_token_hub(&mut self, hub: Address) {
        self.only_admin();
        self.token_hub.set(hub);
    }

    // ========================================
    // Strategy manager
    // ========================================

    /// Queues or commits a strategy switch; admin only.
    ///
    /// The first call records the proposal and starts the timelock. Calling
    /// again with the same address after the delay commits: the previous
    /// strategy is fully exited (absorbing its final profit or loss) and the
    /// new one becomes active with a zeroed balance. A different address
    /// restarts the pending record; committing early reverts `TooEarly`.
    pub fn set_strategy(&mut self, asset_id: u32, strategy: Option<Address>) {
        self.only_admin();
        let asset = match self.load_asset(asset_id) {
            Ok(asset) => asset,
            Err(error) => self.env().revert(error),
        };
        if asset.kind == AssetKind::Native {
            // raw CSPR is never delegated
            self.env().revert(VaultError::InvalidTokenKind);
        }

        let mut data = self.strategy_data.get(&asset_id).unwrap_or_default();
        let now = self.env().get_block_time();

        if !data.is_queued(&strategy) {
            data.queue(strategy, now);
            self.strategy_data.set(&asset_id, data);
            self.env().emit_event(StrategyQueued { asset_id, strategy });
            return;
        }

        if !commit_ready(data.queued_at, STRATEGY_DELAY, now) {
            self.env().revert(VaultError::TooEarly);
        }

        self.check_strategy(&asset.kind, &asset.contract_address, asset.sub_id, &strategy);

        if let Some(old) = data.active {
            let returned = CofferStrategyContractRef::new(self.env(), old).exit();
            self.absorb_delta(asset_id, returned, data.balance);
        }

        data.commit();
        self.strategy_data.set(&asset_id, data);
        self.env().emit_event(StrategySet { asset_id, strategy });
    }

    /// Sets the invest target as a percentage of elastic; admin only
    pub fn set_strategy_target_percentage(&mut self, asset_id: u32, target_percentage: u8) {
        self.only_admin();
        if target_percentage > MAX_TARGET_PERCENTAGE {
            self.env().revert(VaultError::TargetTooHigh);
        }
        let mut data = self.strategy_data.get(&asset_id).unwrap_or_default();
        data.target_percentage = target_percentage;
        self.strategy_data.set(&asset_id, data);
        self.env().emit_event(StrategyTargetPercentage {
            asset_id,
            target_percentage,
        });
    }

    /// Reconciles the strategy's reported balance against the vault's
    /// record, socializing the delta into elastic, and optionally moves
    /// funds toward the target allocation. Callable by anyone.
    pub fn harvest(&mut self, asset_id: u32, rebalance: bool, max_change_amount: U256) {
        if let Err(error) = self.try_harvest(asset_id, rebalance, max_change_amount) {
            self.env().revert(error);
        }
    }

    // ========================================
    // Flash loans
    // ========================================

    /// Lends `amount` to `receiver` within the transaction. The borrower
    /// callback must bring custody back to at least the pre-loan balance
    /// plus the fee; everything returned beyond the snapshot is credited
    /// to the asset's elastic.
    pub fn flash_loan(&mut self, borrower: Address, receiver: Address, asset_id: u32, amount: U256, data: Vec<u8>) {
        let caller = self.env().caller();
        let asset = match self.load_asset(asset_id) {
            Ok(asset) => asset,
            Err(error) => self.env().revert(error),
        };
        if asset.kind == AssetKind::Native {
            // flash loans are offered on token assets only
            self.env().revert(VaultError::InvalidTokenKind);
        }

        let fee = flash_fee(amount);
        let pre = match self.custody_balance(&asset) {
            Ok(balance) => balance,
            Err(error) => self.env().revert(error),
        };
        self.push_custody(&asset, receiver, amount);

        FlashBorrowerContractRef::new(self.env(), borrower).on_flash_loan(caller, asset_id, amount, fee, data);

        if let Err(error) = self.settle_flash_loan(&asset, asset_id, pre, fee) {
            self.env().revert(error);
        }
        self.env().emit_event(FlashLoaned {
            borrower,
            receiver,
            asset_id,
            amount,
            fee,
        });
    }

    /// Runs several flash loans behind a single borrower callback.
    /// Repayment is verified per asset after the callback returns.
    pub fn batch_flash_loan(
        &mut self,
        borrower: Address,
        receivers: Vec<Address>,
        asset_ids: Vec<u32>,
        amounts: Vec<U256>,
        data: Vec<u8>,
    ) {
        if receivers.len() != asset_ids.len() || asset_ids.len() != amounts.len() {
            self.env().revert(VaultError::LengthMismatch);
        }
        let caller = self.env().caller();

        let mut fees = Vec::with_capacity(amounts.len());
        let mut loaded = Vec::with_capacity(amounts.len());
        // one custody snapshot and one owed-fee total per distinct asset,
        // all taken before any principal leaves custody; legs sharing an
        // asset settle together so none can hide behind another's repayment
        let mut settlements: Vec<(u32, Asset, U256, U256)> = Vec::new();
        for (i, asset_id) in asset_ids.iter().enumerate() {
            let asset = match self.load_asset(*asset_id) {
                Ok(asset) => asset,
                Err(error) => self.env().revert(error),
            };
            if asset.kind == AssetKind::Native {
                self.env().revert(VaultError::InvalidTokenKind);
            }
            let fee = flash_fee(amounts[i]);
            match settlements.iter_mut().find(|entry| entry.0 == *asset_id) {
                Some(entry) => {
                    entry.3 = entry
                        .3
                        .checked_add(fee)
                        .unwrap_or_revert_with(&self.env(), VaultError::Overflow);
                }
                None => {
                    let pre = match self.custody_balance(&asset) {
                        Ok(balance) => balance,
                        Err(error) => self.env().revert(error),
                    };
                    settlements.push((*asset_id, asset.clone(), pre, fee));
                }
            }
            fees.push(fee);
            loaded.push(asset);
        }
        for (i, asset) in loaded.iter().enumerate() {
            self.push_custody(asset, receivers[i], amounts[i]);
        }

        FlashBorrowerContractRef::new(self.env(), borrower).on_batch_flash_loan(
            caller,
            asset_ids.clone(),
            amounts.clone(),
            fees.clone(),
            data,
        );

        for (asset_id, asset, pre, owed_fees) in settlements {
            if let Err(error) = self.settle_flash_loan(&asset, asset_id, pre, owed_fees) {
                self.env().revert(error);
            }
        }
        for (i, asset_id) in asset_ids.iter().enumerate() {
            self.env().emit_event(FlashLoaned {
                borrower,
                receiver: receivers[i],
                asset_id: *asset_id,
                amount: amounts[i],
                fee: fees[i],
            });
        }
    }

    // ========================================
    // Batch executor
    // ========================================

    /// Executes the calls in order. With `revert_on_fail` the first failing
    /// call aborts everything; otherwise failures are recorded and skipped.
    /// Attached native value funds the first deposit that needs it.
    #[odra(payable)]
    pub fn batch(&mut self, calls: Vec<CofferCall>, revert_on_fail: bool) -> Vec<bool> {
        let caller = self.env().caller();
        let mut value = self.env().attached_value();
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            let outcome = match call {
                CofferCall::Deposit {
                    asset_id,
                    from,
                    to,
                    amount,
                    share,
                } => self
                    .try_deposit(caller, asset_id, from, to, amount, share, &mut value)
                    .map(|_| ()),
                CofferCall::Withdraw {
                    asset_id,
                    from,
                    to,
                    amount,
                    share,
                } => self
                    .try_withdraw(caller, asset_id, from, to, amount, share)
                    .map(|_| ()),
                CofferCall::Transfer {
                    asset_id,
                    from,
                    to,
                    share,
                } => self.try_transfer(caller, asset_id, from, to, share),
                CofferCall::Harvest {
                    asset_id,
                    rebalance,
                    max_change_amount,
                } => self.try_harvest(asset_id, rebalance, max_change_amount),
            };
            match outcome {
                Ok(()) => results.push(true),
                Err(error) => {
                    if revert_on_fail {
                        self.env().revert(error);
                    }
                    results.push(false);
                }
            }
        }
        results
    }

    // ========================================
    // Admin ownership (two-step)
    // ========================================

    /// Hands admin rights over, either directly (None renounces) or by
    /// queueing a pending admin who must claim
    pub fn transfer_admin(&mut self, new_admin: Option<Address>, direct: bool) {
        self.only_admin();
        let caller = self.env().caller();

        if direct {
            self.admin.set(new_admin);
            self.pending_admin_since.set(0);
            self.env().emit_event(AdminChanged {
                previous_admin: Some(caller),
                new_admin,
            });
        } else {
            let pending = new_admin.unwrap_or_revert_with(&self.env(), VaultError::NotPendingOwner);
            self.pending_admin.set(pending);
            self.pending_admin_since.set(self.env().get_block_time());
        }
    }

    /// Completes a queued admin transfer; only the pending admin may claim
    pub fn claim_admin(&mut self) {
        let caller = self.env().caller();
        let queued_at = self.pending_admin_since.get_or_default();
        if !commit_ready(queued_at, 0, self.env().get_block_time())
            || self.pending_admin.get() != Some(caller)
        {
            self.env().revert(VaultError::NotPendingOwner);
        }

        let previous_admin = self.admin.get_or_default();
        self.admin.set(Some(caller));
        self.pending_admin_since.set(0);
        self.env().emit_event(AdminChanged {
            previous_admin,
            new_admin: Some(caller),
        });
    }

    // ========================================
    // View functions
    // ========================================

    /// Converts an amount to shares at the asset's current rate
    pub fn to_share(&self, asset_id: u32, amount: U256, round_up: bool) -> U256 {
        let total = self.totals.get(&asset_id).unwrap_or_default();
        match total.to_share(amount, round_up) {
            Ok(share) => share,
            Err(error) => self.env().revert(error),
        }
    }

    /// Converts shares to an amount at the asset's current rate
    pub fn to_amount(&self, asset_id: u32, share: U256, round_up: bool) -> U256 {
        let total = self.totals.get(&asset_id).unwrap_or_default();
        match total.to_amount(share, round_up) {
            Ok(amount) => amount,
            Err(error) => self.env().revert(error),
        }
    }

    /// Elastic/base pair of an asset
    pub fn totals(&self, asset_id: u32) -> Rebase {
        self.totals.get(&asset_id).unwrap_or_default()
    }

    /// Share balance of an account
    pub fn balance_of(&self, asset_id: u32, owner: Address) -> U256 {
        self.balances.get(&(asset_id, owner)).unwrap_or_default()
    }

    /// Registered asset by id
    pub fn asset(&self, asset_id: u32) -> Option<Asset> {
        self.assets.get(&asset_id)
    }

    /// Id for an identity tuple; 0 when unregistered
    pub fn asset_id_of(
        &self,
        kind: AssetKind,
        contract_address: Option<Address>,
        strategy: Option<Address>,
        sub_id: u64,
    ) -> u32 {
        self.ids
            .get(&(kind, contract_address, strategy, sub_id))
            .unwrap_or_default()
    }

    /// Number of registered assets
    pub fn asset_count(&self) -> u32 {
        self.asset_count.get_or_default()
    }

    /// Strategy state of an asset
    pub fn strategy_data(&self, asset_id: u32) -> StrategyData {
        self.strategy_data.get(&asset_id).unwrap_or_default()
    }

    /// Operator approval state
    pub fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.operator_approvals.get(&(owner, operator)).unwrap_or_default()
    }

    /// Current admin
    pub fn admin(&self) -> Option<Address> {
        self.admin.get_or_default()
    }

    /// Pending admin, if a transfer is queued
    pub fn get_pending_admin(&self) -> Option<Address> {
        if self.pending_admin_since.get_or_default() == 0 {
            return None;
        }
        self.pending_admin.get()
    }

    /// Registered token hub
    pub fn token_hub(&self) -> Option<Address> {
        self.token_hub.get()
    }
}

// Internal mechanics. Everything mutating returns Result so the batch
// executor can run best-effort without partial application of a leg.
impl Coffer {
    fn try_deposit(
        &mut self,
        caller: Address,
        asset_id: u32,
        from: Address,
        to: Address,
        amount_in: U256,
        share_in: U256,
        value: &mut U512,
    ) -> Result<(U256, U256), VaultError> {
        let asset = self.load_asset(asset_id)?;
        self.ensure_allowed(caller, from)?;
        if amount_in.is_zero() == share_in.is_zero() {
            return Err(VaultError::InvalidAmount);
        }

        let mut total = self.totals.get(&asset_id).unwrap_or_default();
        let (amount, share) = if share_in.is_zero() {
            // depositing by amount mints rounded-down shares
            (amount_in, total.to_share(amount_in, false)?)
        } else {
            // depositing by share costs a rounded-up amount
            (total.to_amount(share_in, true)?, share_in)
        };
        total.add(amount, share)?;

        // every fallible custody check runs before the first ledger write,
        // so a leg skipped by the best-effort batch leaves no state behind
        let vault = Address::from(self.env().self_address());
        let skim = from == vault;
        match asset.kind {
            AssetKind::Native => {
                if skim {
                    if U512::from(total.elastic.as_u128()) > self.env().self_balance() {
                        return Err(VaultError::SkimTooMuch);
                    }
                } else {
                    let needed = U512::from(amount.as_u128());
                    if *value < needed {
                        return Err(VaultError::NotEnoughNative);
                    }
                    *value -= needed;
                }
            }
            AssetKind::External | AssetKind::InternallyMinted => {
                if skim {
                    let accounted = self.vault_held(asset_id, &total);
                    let held = self.custody_balance(&asset)?;
                    if held < accounted {
                        return Err(VaultError::SkimTooMuch);
                    }
                }
            }
        }

        let balance = self.balances.get(&(asset_id, to)).unwrap_or_default();
        self.balances.set(&(asset_id, to), balance + share);
        self.totals.set(&asset_id, total);

        // the pull runs last; a token that fails here aborts the whole
        // transaction instead of leaving credited shares behind
        if !skim {
            self.pull_custody(&asset, from, amount);
        }

        self.env().emit_event(Deposited {
            asset_id,
            from,
            to,
            amount,
            share,
        });
        Ok((amount, share))
    }

    fn try_withdraw(
        &mut self,
        caller: Address,
        asset_id: u32,
        from: Address,
        to: Address,
        amount_in: U256,
        share_in: U256,
    ) -> Result<(U256, U256), VaultError> {
        let asset = self.load_asset(asset_id)?;
        self.ensure_allowed(caller, from)?;
        if amount_in.is_zero() == share_in.is_zero() {
            return Err(VaultError::InvalidAmount);
        }

        let mut total = self.totals.get(&asset_id).unwrap_or_default();
        let (amount, share) = if share_in.is_zero() {
            // withdrawing by amount burns rounded-up shares
            (amount_in, total.to_share(amount_in, true)?)
        } else {
            // withdrawing by share returns a rounded-down amount
            (total.to_amount(share_in, false)?, share_in)
        };

        let balance = self.balances.get(&(asset_id, from)).unwrap_or_default();
        if balance < share {
            return Err(VaultError::Underflow);
        }
        total.sub(amount, share)?;
        if !total.base.is_zero() && total.base < U256::from(MINIMUM_SHARE_BALANCE) {
            return Err(VaultError::CannotEmpty);
        }
        // a native push is the one custody failure detectable up front;
        // checking it here keeps failed best-effort legs free of writes
        if asset.kind == AssetKind::Native && self.env().self_balance() < U512::from(amount.as_u128()) {
            return Err(VaultError::NativeTransferFailed);
        }

        self.balances.set(&(asset_id, from), balance - share);
        self.totals.set(&asset_id, total);

        self.push_custody(&asset, to, amount);

        self.env().emit_event(Withdrawn {
            asset_id,
            from,
            to,
            amount,
            share,
        });
        Ok((amount, share))
    }

    fn try_transfer(
        &mut self,
        caller: Address,
        asset_id: u32,
        from: Address,
        to: Address,
        share: U256,
    ) -> Result<(), VaultError> {
        self.load_asset(asset_id)?;
        self.ensure_allowed(caller, from)?;

        let from_balance = self.balances.get(&(asset_id, from)).unwrap_or_default();
        if from_balance < share {
            return Err(VaultError::Underflow);
        }
        self.balances.set(&(asset_id, from), from_balance - share);
        let to_balance = self.balances.get(&(asset_id, to)).unwrap_or_default();
        self.balances.set(&(asset_id, to), to_balance + share);

        self.env().emit_event(SharesTransferred {
            asset_id,
            from,
            to,
            share,
        });
        Ok(())
    }

    fn try_harvest(&mut self, asset_id: u32, rebalance: bool, max_change_amount: U256) -> Result<(), VaultError> {
        let asset = self.load_asset(asset_id)?;
        let mut data = self.strategy_data.get(&asset_id).unwrap_or_default();
        let strategy = data.active.ok_or(VaultError::StrategyNotSet)?;

        let mut strategy_ref = CofferStrategyContractRef::new(self.env(), strategy);
        let reported = strategy_ref.current_balance();

        let mut total = self.totals.get(&asset_id).unwrap_or_default();
        if reported > data.balance {
            let profit = reported - data.balance;
            total.add_elastic(profit)?;
            self.env().emit_event(StrategyProfit {
                asset_id,
                amount: profit,
            });
        } else if reported < data.balance {
            // losses are absorbed, not disputed
            let loss = data.balance - reported;
            total.sub_elastic(loss)?;
            self.env().emit_event(StrategyLoss {
                asset_id,
                amount: loss,
            });
        }
        data.balance = reported;

        if rebalance {
            let target = total.elastic * U256::from(data.target_percentage) / U256::from(100u8);
            if reported < target {
                let mut amount_in = target - reported;
                if !max_change_amount.is_zero() && amount_in > max_change_amount {
                    amount_in = max_change_amount;
                }
                self.push_custody(&asset, strategy, amount_in);
                strategy_ref.invest(amount_in);
                data.balance += amount_in;
                self.env().emit_event(StrategyInvested {
                    asset_id,
                    amount: amount_in,
                });
            } else if reported > target {
                let mut amount_out = reported - target;
                if !max_change_amount.is_zero() && amount_out > max_change_amount {
                    amount_out = max_change_amount;
                }
                let actual = strategy_ref.divest(amount_out);
                data.balance = data.balance.checked_sub(actual).ok_or(VaultError::Underflow)?;
                self.env().emit_event(StrategyDivested {
                    asset_id,
                    amount: actual,
                });
            }
        }

        self.strategy_data.set(&asset_id, data);
        self.totals.set(&asset_id, total);
        Ok(())
    }

    /// Moves underlying from `from` into custody. Runs after the ledger
    /// writes; every failure reverts so credited shares can never outlive
    /// a failed pull. Native value is already in the contract purse by the
    /// time this runs.
    fn pull_custody(&mut self, asset: &Asset, from: Address, amount: U256) {
        let vault = Address::from(self.env().self_address());
        match asset.kind {
            AssetKind::Native => {}
            AssetKind::External => {
                let token = asset
                    .contract_address
                    .unwrap_or_revert_with(&self.env(), VaultError::NotAToken);
                let mut token_ref = Cep18TokenContractRef::new(self.env(), token);
                if !token_ref.transfer_from(from, vault, amount) {
                    self.env().revert(VaultError::TransferFailed);
                }
            }
            AssetKind::InternallyMinted => {
                let hub = asset
                    .contract_address
                    .unwrap_or_revert_with(&self.env(), VaultError::NotAToken);
                let mut hub_ref = MintedTokenLedgerContractRef::new(self.env(), hub);
                if !hub_ref.transfer_from(from, vault, asset.sub_id, amount) {
                    self.env().revert(VaultError::TransferFailed);
                }
            }
        }
    }

    /// Moves underlying out of custody to `to`; failures revert so ledger
    /// writes can never outlive a failed transfer
    fn push_custody(&mut self, asset: &Asset, to: Address, amount: U256) {
        if amount.is_zero() {
            return;
        }
        let vault = Address::from(self.env().self_address());
        match asset.kind {
            AssetKind::Native => {
                let needed = U512::from(amount.as_u128());
                if self.env().self_balance() < needed {
                    self.env().revert(VaultError::NativeTransferFailed);
                }
                self.env().transfer_tokens(&to, &needed);
            }
            AssetKind::External => {
                let token = asset
                    .contract_address
                    .unwrap_or_revert_with(&self.env(), VaultError::NotAToken);
                let mut token_ref = Cep18TokenContractRef::new(self.env(), token);
                if !token_ref.transfer(to, amount) {
                    self.env().revert(VaultError::TransferFailed);
                }
            }
            AssetKind::InternallyMinted => {
                let hub = asset
                    .contract_address
                    .unwrap_or_revert_with(&self.env(), VaultError::NotAToken);
                let mut hub_ref = MintedTokenLedgerContractRef::new(self.env(), hub);
                if !hub_ref.transfer_from(vault, to, asset.sub_id, amount) {
                    self.env().revert(VaultError::TransferFailed);
                }
            }
        }
    }

    /// Portion of elastic the vault itself holds: everything not under
    /// the active strategy
    fn vault_held(&self, asset_id: u32, total: &Rebase) -> U256 {
        let data = self.strategy_data.get(&asset_id).unwrap_or_default();
        total.elastic.saturating_sub(data.balance)
    }

    /// Token-level custody balance, used by the skim and flash loan checks
    fn custody_balance(&self, asset: &Asset) -> Result<U256, VaultError> {
        let vault = Address::from(self.env().self_address());
        match asset.kind {
            // flash loans are offered on token assets only
            AssetKind::Native => Err(VaultError::InvalidTokenKind),
            AssetKind::External => {
                let token = asset.contract_address.ok_or(VaultError::NotAToken)?;
                Ok(Cep18TokenContractRef::new(self.env(), token).balance_of(vault))
            }
            AssetKind::InternallyMinted => {
                let hub = asset.contract_address.ok_or(VaultError::NotAToken)?;
                Ok(MintedTokenLedgerContractRef::new(self.env(), hub).balance_of(vault, asset.sub_id))
            }
        }
    }

    /// Post-callback repayment check against the pre-loan custody snapshot,
    /// so unaccounted surplus sitting in custody can never pay a borrower's
    /// way. Everything returned beyond the snapshot (fee plus any
    /// over-repayment) is socialized into elastic.
    fn settle_flash_loan(&mut self, asset: &Asset, asset_id: u32, pre: U256, fees: U256) -> Result<(), VaultError> {
        let post = self.custody_balance(asset)?;
        let owed = pre.checked_add(fees).ok_or(VaultError::Overflow)?;
        if post < owed {
            return Err(VaultError::WrongAmount);
        }
        let mut total = self.totals.get(&asset_id).unwrap_or_default();
        total.add_elastic(post - pre)?;
        self.totals.set(&asset_id, total);
        Ok(())
    }

    /// Exit settlement on a strategy switch: the difference between what
    /// the strategy returned and what the vault last recorded is profit
    /// or loss, socialized like a harvest
    fn absorb_delta(&mut self, asset_id: u32, returned: U256, recorded: U256) {
        let mut total = self.totals.get(&asset_id).unwrap_or_default();
        if returned >= recorded {
            let profit = returned - recorded;
            if !profit.is_zero() {
                if let Err(error) = total.add_elastic(profit) {
                    self.env().revert(error);
                }
                self.env().emit_event(StrategyProfit {
                    asset_id,
                    amount: profit,
                });
            }
        } else {
            let loss = recorded - returned;
            if let Err(error) = total.sub_elastic(loss) {
                self.env().revert(error);
            }
            self.env().emit_event(StrategyLoss {
                asset_id,
                amount: loss,
            });
        }
        self.totals.set(&asset_id, total);
    }

    fn register_internal(
        &mut self,
        kind: AssetKind,
        contract_address: Option<Address>,
        strategy: Option<Address>,
        sub_id: u64,
    ) -> u32 {
        let key = (kind.clone(), contract_address, strategy, sub_id);
        if let Some(existing) = self.ids.get(&key) {
            return existing;
        }

        let asset_id = self.asset_count.get_or_default() + 1;
        self.asset_count.set(asset_id);
        self.assets.set(
            &asset_id,
            Asset {
                kind: kind.clone(),
                contract_address,
                strategy,
                sub_id,
            },
        );
        self.ids.set(&key, asset_id);

        self.env().emit_event(AssetRegistered {
            asset_id,
            kind,
            contract_address,
            strategy,
            sub_id,
        });
        asset_id
    }

    /// Reverts `StrategyMismatch` unless the strategy reports the exact
    /// asset identity it is being bound to
    fn check_strategy(
        &self,
        kind: &AssetKind,
        contract_address: &Option<Address>,
        sub_id: u64,
        strategy: &Option<Address>,
    ) {
        if let Some(strategy) = strategy {
            let strategy_ref = CofferStrategyContractRef::new(self.env(), *strategy);
            if strategy_ref.token_kind() != *kind
                || strategy_ref.token_contract() != *contract_address
                || strategy_ref.token_sub_id() != sub_id
            {
                self.env().revert(VaultError::StrategyMismatch);
            }
        }
    }

    fn load_asset(&self, asset_id: u32) -> Result<Asset, VaultError> {
        if asset_id == 0 || asset_id > self.asset_count.get_or_default() {
            return Err(VaultError::AssetNotRegistered);
        }
        self.assets.get(&asset_id).ok_or(VaultError::AssetNotRegistered)
    }

    fn ensure_allowed(&self, caller: Address, from: Address) -> Result<(), VaultError> {
        if caller == from {
            return Ok(());
        }
        // the vault itself as `from` marks a skim deposit; anyone may
        // credit unaccounted surplus
        if from == Address::from(self.env().self_address()) {
            return Ok(());
        }
        if self.operator_approvals.get(&(from, caller)).unwrap_or_default() {
            return Ok(());
        }
        if self.trusted_delegates.get(&caller).unwrap_or_default() {
            return Ok(());
        }
        Err(VaultError::NotApproved)
    }

    fn only_admin(&self) {
        let caller = self.env().caller();
        if self.admin.get_or_default() != Some(caller) {
            self.env().revert(VaultError::Unauthorized);
        }
    }
}
