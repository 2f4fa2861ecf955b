//! Asset identity and per-asset strategy bookkeeping
use odra::casper_types::U256;
use odra::prelude::*;

/// How the vault custodies an asset's underlying
#[odra::odra_type]
pub enum AssetKind {
    /// Raw CSPR held by the vault itself; one fixed asset created at init
    Native,
    /// CEP-18 token moved through the token adapter
    External,
    /// Token ledger kept by the registered token hub
    InternallyMinted,
}

/// Registered asset. Immutable once allocated; the full tuple
/// (kind, contract, strategy, sub id) is the dedupe key.
#[odra::odra_type]
pub struct Asset {
    /// Asset kind
    pub kind: AssetKind,
    /// Backing token contract (None for Native)
    pub contract_address: Option<Address>,
    /// Strategy recorded at registration time, part of the identity
    pub strategy: Option<Address>,
    /// Internally-minted token id; 0 for External and Native
    pub sub_id: u64,
}

/// Per-asset strategy state.
///
/// `queued_at == 0` means nothing is pending. `balance` is the vault's
/// last-known view of the funds the active strategy holds; harvest compares
/// it against the strategy's reported balance to detect profit or loss.
#[odra::odra_type]
#[derive(Default)]
pub struct StrategyData {
    /// Active strategy, if any
    pub active: Option<Address>,
    /// Queued replacement (None queues an exit to no strategy)
    pub pending: Option<Address>,
    /// Block time the pending entry was queued; 0 when nothing is queued
    pub queued_at: u64,
    /// Invest target as a percentage of elastic
    pub target_percentage: u8,
    /// Last-known strategy holdings
    pub balance: U256,
}

/// Shared predicate for the two-step "propose then commit" pattern.
/// The strategy switch uses it with the protocol delay; token-ownership
/// claims use it with no delay.
pub fn commit_ready(queued_at: u64, delay: u64, now: u64) -> bool {
    queued_at != 0 && now >= queued_at.saturating_add(delay)
}

impl StrategyData {
    /// Records a proposed strategy, restarting the clock on every call
    pub fn queue(&mut self, strategy: Option<Address>, now: u64) {
        self.pending = strategy;
        self.queued_at = now;
    }

    /// True when the queued entry matches `strategy`
    pub fn is_queued(&self, strategy: &Option<Address>) -> bool {
        self.queued_at != 0 && self.pending == *strategy
    }

    /// Activates the pending strategy and clears the queue and balance
    pub fn commit(&mut self) {
        self.active = self.pending;
        self.pending = None;
        self.queued_at = 0;
        self.balance = U256::zero();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::STRATEGY_DELAY;

    #[test]
    fn test_commit_ready_needs_a_queue_entry() {
        assert!(!commit_ready(0, STRATEGY_DELAY, STRATEGY_DELAY * 10));
    }

    #[test]
    fn test_commit_ready_waits_for_delay() {
        let queued_at = 1_000;
        assert!(!commit_ready(queued_at, STRATEGY_DELAY, queued_at + STRATEGY_DELAY - 1));
        assert!(commit_ready(queued_at, STRATEGY_DELAY, queued_at + STRATEGY_DELAY));
    }

    #[test]
    fn test_zero_delay_commits_immediately() {
        assert!(commit_ready(5, 0, 5));
    }

    #[test]
    fn test_queue_restarts_pending_record() {
        let mut data = StrategyData::default();
        data.queue(None, 100);
        assert!(data.is_queued(&None));

        data.queue(None, 250);
        assert_eq!(data.queued_at, 250);

        data.commit();
        assert_eq!(data.active, None);
        assert_eq!(data.queued_at, 0);
        assert_eq!(data.balance, U256::zero());
    }
}
