//! Event definitions for the Coffer vault
use odra::prelude::*;
use odra::casper_types::U256;

use crate::coffer::asset::AssetKind;

/// Event emitted when a new asset id is allocated
#[odra::event]
pub struct AssetRegistered {
    /// Allocated asset id (1-based)
    pub asset_id: u32,
    /// Asset kind
    pub kind: AssetKind,
    /// Token contract backing the asset, if any
    pub contract_address: Option<Address>,
    /// Strategy recorded at registration, if any
    pub strategy: Option<Address>,
    /// Sub id (internally-minted token id; 0 for External)
    pub sub_id: u64,
}

/// Event emitted when underlying is deposited and shares minted
#[odra::event]
pub struct Deposited {
    /// Asset id
    pub asset_id: u32,
    /// Account the underlying was pulled from
    pub from: Address,
    /// Account credited with shares
    pub to: Address,
    /// Underlying amount
    pub amount: U256,
    /// Shares minted
    pub share: U256,
}

/// Event emitted when shares are burned and underlying withdrawn
#[odra::event]
pub struct Withdrawn {
    /// Asset id
    pub asset_id: u32,
    /// Account debited of shares
    pub from: Address,
    /// Recipient of the underlying
    pub to: Address,
    /// Underlying amount
    pub amount: U256,
    /// Shares burned
    pub share: U256,
}

/// Event emitted when shares move between accounts
#[odra::event]
pub struct SharesTransferred {
    /// Asset id
    pub asset_id: u32,
    /// Sender
    pub from: Address,
    /// Recipient
    pub to: Address,
    /// Shares moved
    pub share: U256,
}

/// Event emitted when an operator approval changes
#[odra::event]
pub struct ApprovalForAll {
    /// Account granting rights
    pub owner: Address,
    /// Operator receiving rights
    pub operator: Address,
    /// New approval state
    pub approved: bool,
}

/// Event emitted when the admin trusts or untrusts a delegate contract
#[odra::event]
pub struct TrustedDelegateSet {
    /// Delegate contract
    pub delegate: Address,
    /// New trust state
    pub trusted: bool,
}

/// Event emitted when a strategy switch is queued
#[odra::event]
pub struct StrategyQueued {
    /// Asset id
    pub asset_id: u32,
    /// Proposed strategy (None exits to no strategy)
    pub strategy: Option<Address>,
}

/// Event emitted when a queued strategy switch commits
#[odra::event]
pub struct StrategySet {
    /// Asset id
    pub asset_id: u32,
    /// Now-active strategy
    pub strategy: Option<Address>,
}

/// Event emitted when the investment target changes
#[odra::event]
pub struct StrategyTargetPercentage {
    /// Asset id
    pub asset_id: u32,
    /// New target, percent of elastic
    pub target_percentage: u8,
}

/// Event emitted when funds move from the vault into the strategy
#[odra::event]
pub struct StrategyInvested {
    /// Asset id
    pub asset_id: u32,
    /// Amount moved
    pub amount: U256,
}

/// Event emitted when funds move from the strategy back to the vault
#[odra::event]
pub struct StrategyDivested {
    /// Asset id
    pub asset_id: u32,
    /// Amount actually returned
    pub amount: U256,
}

/// Event emitted when a harvest absorbs a strategy profit
#[odra::event]
pub struct StrategyProfit {
    /// Asset id
    pub asset_id: u32,
    /// Profit credited to elastic
    pub amount: U256,
}

/// Event emitted when a harvest absorbs a strategy loss
#[odra::event]
pub struct StrategyLoss {
    /// Asset id
    pub asset_id: u32,
    /// Loss debited from elastic
    pub amount: U256,
}

/// Event emitted after a successful flash loan
#[odra::event]
pub struct FlashLoaned {
    /// Borrower contract that received the callback
    pub borrower: Address,
    /// Recipient of the loaned funds
    pub receiver: Address,
    /// Asset id
    pub asset_id: u32,
    /// Principal lent
    pub amount: U256,
    /// Fee charged
    pub fee: U256,
}

/// Event emitted when vault admin rights change hands
#[odra::event]
pub struct AdminChanged {
    /// Previous admin
    pub previous_admin: Option<Address>,
    /// New admin (None after renouncement)
    pub new_admin: Option<Address>,
}

/// Event emitted when the token hub creates a new internally-minted token
#[odra::event]
pub struct TokenCreated {
    /// Creator, initial token owner
    pub creator: Address,
    /// Token name
    pub name: String,
    /// Token symbol
    pub symbol: String,
    /// Token decimals
    pub decimals: u8,
    /// Hub-local token id, also the asset sub id
    pub token_id: u64,
}

/// Event emitted on every internally-minted token balance change
#[odra::event]
pub struct TokenTransferSingle {
    /// Caller that triggered the move
    pub operator: Address,
    /// Debited account (None on mint)
    pub from: Option<Address>,
    /// Credited account (None on burn)
    pub to: Option<Address>,
    /// Token id
    pub token_id: u64,
    /// Amount moved
    pub amount: U256,
}

/// Event emitted when an internally-minted token changes owner
#[odra::event]
pub struct TokenOwnershipTransferred {
    /// Token id
    pub token_id: u64,
    /// Previous owner
    pub previous_owner: Option<Address>,
    /// New owner (None on renouncement)
    pub new_owner: Option<Address>,
}

/// Event emitted when LP-style test tokens move (CEP-18 Transfer)
#[odra::event]
pub struct Transfer {
    /// From address
    pub from: Address,
    /// To address
    pub to: Address,
    /// Amount transferred
    pub value: U256,
}

/// Event emitted when a CEP-18 approval is granted
#[odra::event]
pub struct Approval {
    /// Owner address
    pub owner: Address,
    /// Spender address
    pub spender: Address,
    /// Amount approved
    pub value: U256,
}
