//! Internally-minted token hub
//!
//! The hub keeps the balance ledger for tokens the protocol mints itself.
//! Creating a token registers a matching InternallyMinted asset with the
//! vault; minting is gated on a per-token owner with a two-phase ownership
//! transfer (direct, or pending plus claim).
use odra::casper_types::U256;
use odra::prelude::*;
use odra::ContractRef;

use super::asset::commit_ready;
use super::coffer::CofferContractRef;
use crate::errors::VaultError;
use crate::events::{TokenCreated, TokenOwnershipTransferred, TokenTransferSingle};
use crate::math::fits_128;

/// Custody surface the vault uses to move internally-minted tokens
#[odra::external_contract]
pub trait MintedTokenLedger {
    /// Balance of `owner` for `token_id`
    fn balance_of(&self, owner: Address, token_id: u64) -> U256;

    /// Moves tokens; callable by the holder or the vault
    fn transfer_from(&mut self, from: Address, to: Address, token_id: u64, amount: U256) -> bool;

    /// Mints new tokens to `to`; token-owner gated
    fn mint(&mut self, token_id: u64, to: Address, amount: U256);

    /// Burns tokens from `from`
    fn burn(&mut self, token_id: u64, from: Address, amount: U256);
}

/// Metadata of an internally-minted token
#[odra::odra_type]
pub struct MintedToken {
    /// Token name
    pub name: String,
    /// Token symbol
    pub symbol: String,
    /// Token decimals
    pub decimals: u8,
}

/// Token hub contract
#[odra::module]
pub struct TokenHub {
    /// Vault the hub registers assets with
    coffer: Var<Address>,
    /// Token metadata: token_id -> info
    tokens: Mapping<u64, MintedToken>,
    /// Token owners: token_id -> owner (None once renounced)
    owners: Mapping<u64, Option<Address>>,
    /// Pending owners for two-phase transfers
    pending_owners: Mapping<u64, Address>,
    /// Block time each pending transfer was queued
    pending_since: Mapping<u64, u64>,
    /// Balances: (token_id, holder) -> amount
    balances: Mapping<(u64, Address), U256>,
    /// Total supply per token
    total_supplies: Mapping<u64, U256>,
    /// Number of tokens created
    token_count: Var<u64>,
}

#[odra::module]
impl TokenHub {
    /// Binds the hub to its vault
    pub fn init(&mut self, coffer: Address) {
        self.coffer.set(coffer);
        self.token_count.set(0);
    }

    /// Creates a token, registers its vault asset and returns the token id.
    /// The caller becomes the token owner.
    pub fn create_token(&mut self, name: String, symbol: String, decimals: u8) -> u64 {
        let caller = self.env().caller();
        let token_id = self.token_count.get_or_default() + 1;
        self.token_count.set(token_id);

        self.tokens.set(
            &token_id,
            MintedToken {
                name: name.clone(),
                symbol: symbol.clone(),
                decimals,
            },
        );
        self.owners.set(&token_id, Some(caller));

        let coffer = self.coffer.get_or_revert_with(VaultError::Unauthorized);
        let mut coffer_ref = CofferContractRef::new(self.env(), coffer);
        coffer_ref.register_minted_asset(token_id, None);

        self.env().emit_event(TokenCreated {
            creator: caller,
            name,
            symbol,
            decimals,
            token_id,
        });

        token_id
    }

    /// Mints tokens to `to`; only the token owner may mint
    pub fn mint(&mut self, token_id: u64, to: Address, amount: U256) {
        let caller = self.env().caller();
        self.only_token_owner(token_id, caller);

        let supply = self.total_supplies.get(&token_id).unwrap_or_default();
        let new_supply = supply
            .checked_add(amount)
            .unwrap_or_revert_with(&self.env(), VaultError::Overflow);
        if !fits_128(new_supply) {
            self.env().revert(VaultError::Overflow);
        }
        self.total_supplies.set(&token_id, new_supply);

        let balance = self.balances.get(&(token_id, to)).unwrap_or_default();
        self.balances.set(&(token_id, to), balance + amount);

        self.env().emit_event(TokenTransferSingle {
            operator: caller,
            from: None,
            to: Some(to),
            token_id,
            amount,
        });
    }

    /// Burns tokens from `from`; holders may burn their own balance,
    /// the token owner may burn anyone's
    pub fn burn(&mut self, token_id: u64, from: Address, amount: U256) {
        let caller = self.env().caller();
        if caller != from {
            self.only_token_owner(token_id, caller);
        }

        let balance = self.balances.get(&(token_id, from)).unwrap_or_default();
        if balance < amount {
            self.env().revert(VaultError::Underflow);
        }
        self.balances.set(&(token_id, from), balance - amount);

        let supply = self.total_supplies.get(&token_id).unwrap_or_default();
        self.total_supplies.set(&token_id, supply - amount);

        self.env().emit_event(TokenTransferSingle {
            operator: caller,
            from: Some(from),
            to: None,
            token_id,
            amount,
        });
    }

    /// Moves tokens between holders; the vault may move any holder's
    /// balance (it is the custody layer), everyone else only their own
    pub fn transfer_from(&mut self, from: Address, to: Address, token_id: u64, amount: U256) -> bool {
        let caller = self.env().caller();
        let coffer = self.coffer.get_or_revert_with(VaultError::Unauthorized);
        if caller != from && caller != coffer {
            self.env().revert(VaultError::NotApproved);
        }

        let from_balance = self.balances.get(&(token_id, from)).unwrap_or_default();
        if from_balance < amount {
            self.env().revert(VaultError::Underflow);
        }
        self.balances.set(&(token_id, from), from_balance - amount);

        let to_balance = self.balances.get(&(token_id, to)).unwrap_or_default();
        self.balances.set(&(token_id, to), to_balance + amount);

        self.env().emit_event(TokenTransferSingle {
            operator: caller,
            from: Some(from),
            to: Some(to),
            token_id,
            amount,
        });
        true
    }

    /// Transfers token ownership, either directly or by queueing a pending
    /// owner who must claim. Direct transfer to `None` renounces.
    pub fn transfer_ownership(&mut self, token_id: u64, new_owner: Option<Address>, direct: bool) {
        let caller = self.env().caller();
        self.only_token_owner(token_id, caller);

        if direct {
            self.owners.set(&token_id, new_owner);
            self.pending_since.set(&token_id, 0);
            self.env().emit_event(TokenOwnershipTransferred {
                token_id,
                previous_owner: Some(caller),
                new_owner,
            });
        } else {
            let pending = new_owner.unwrap_or_revert_with(&self.env(), VaultError::NotPendingOwner);
            self.pending_owners.set(&token_id, pending);
            self.pending_since.set(&token_id, self.env().get_block_time());
        }
    }

    /// Completes a pending ownership transfer; only the pending owner
    /// may claim
    pub fn claim_ownership(&mut self, token_id: u64) {
        let caller = self.env().caller();
        let queued_at = self.pending_since.get(&token_id).unwrap_or_default();
        let pending = self.pending_owners.get(&token_id);
        // ownership claims carry no delay; the predicate only requires
        // that a transfer was actually queued
        if !commit_ready(queued_at, 0, self.env().get_block_time()) || pending != Some(caller) {
            self.env().revert(VaultError::NotPendingOwner);
        }

        let previous = self.owners.get(&token_id).unwrap_or_default();
        self.owners.set(&token_id, Some(caller));
        self.pending_since.set(&token_id, 0);

        self.env().emit_event(TokenOwnershipTransferred {
            token_id,
            previous_owner: previous,
            new_owner: Some(caller),
        });
    }

    /// Balance of `owner` for `token_id`
    pub fn balance_of(&self, owner: Address, token_id: u64) -> U256 {
        self.balances.get(&(token_id, owner)).unwrap_or_default()
    }

    /// Total supply of a token
    pub fn total_supply(&self, token_id: u64) -> U256 {
        self.total_supplies.get(&token_id).unwrap_or_default()
    }

    /// Current owner of a token
    pub fn owner(&self, token_id: u64) -> Option<Address> {
        self.owners.get(&token_id).unwrap_or_default()
    }

    /// Pending owner, if a transfer is queued
    pub fn pending_owner(&self, token_id: u64) -> Option<Address> {
        if self.pending_since.get(&token_id).unwrap_or_default() == 0 {
            return None;
        }
        self.pending_owners.get(&token_id)
    }

    /// Metadata of a token
    pub fn token_info(&self, token_id: u64) -> Option<MintedToken> {
        self.tokens.get(&token_id)
    }

    /// Number of tokens created so far
    pub fn token_count(&self) -> u64 {
        self.token_count.get_or_default()
    }

    fn only_token_owner(&self, token_id: u64, caller: Address) {
        let owner = self.owners.get(&token_id).unwrap_or_default();
        if owner != Some(caller) {
            self.env().revert(VaultError::Unauthorized);
        }
    }
}
