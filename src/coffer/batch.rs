//! Typed call encoding for the atomic batch executor
use odra::casper_types::U256;
use odra::prelude::*;

/// One internal call inside a `batch` invocation.
///
/// The executor dispatches each variant against the vault in array order,
/// with the batch caller as the acting account. Attached native value is
/// consumed by the first deposit that needs it.
#[odra::odra_type]
pub enum CofferCall {
    /// Deposit into an asset; one of amount/share must be zero
    Deposit {
        /// Asset id
        asset_id: u32,
        /// Account the underlying is pulled from
        from: Address,
        /// Account credited with shares
        to: Address,
        /// Underlying amount (0 when share-driven)
        amount: U256,
        /// Target share count (0 when amount-driven)
        share: U256,
    },
    /// Withdraw from an asset; one of amount/share must be zero
    Withdraw {
        /// Asset id
        asset_id: u32,
        /// Account debited of shares
        from: Address,
        /// Recipient of the underlying
        to: Address,
        /// Underlying amount (0 when share-driven)
        amount: U256,
        /// Shares to burn (0 when amount-driven)
        share: U256,
    },
    /// Move shares between accounts
    Transfer {
        /// Asset id
        asset_id: u32,
        /// Sender
        from: Address,
        /// Recipient
        to: Address,
        /// Shares to move
        share: U256,
    },
    /// Reconcile a strategy and optionally rebalance
    Harvest {
        /// Asset id
        asset_id: u32,
        /// Move funds toward the target percentage
        rebalance: bool,
        /// Cap on the invest/divest leg; 0 means uncapped
        max_change_amount: U256,
    },
}
