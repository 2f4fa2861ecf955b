//! Rebase conversion math for the Coffer vault
//! Implements the elastic/base share price with vault-favoring rounding
use odra::casper_types::U256;
use odra::prelude::*;

use crate::errors::VaultError;

/// Smallest share total an asset may be left with, other than zero.
/// Withdrawing into the open interval (0, MINIMUM_SHARE_BALANCE) is refused
/// so a dust residue can never corrupt the share price.
pub const MINIMUM_SHARE_BALANCE: u128 = 1000;

/// Flash loan fee numerator (5 bps)
pub const FLASH_LOAN_FEE: u128 = 50;

/// Flash loan fee denominator
pub const FLASH_FEE_PRECISION: u128 = 100_000;

/// Delay between queueing a strategy switch and committing it.
/// Casper block time is in milliseconds.
pub const STRATEGY_DELAY: u64 = 14 * 24 * 60 * 60 * 1000;

/// Upper bound for the strategy investment target
pub const MAX_TARGET_PERCENTAGE: u8 = 95;

/// Per-asset elastic/base pair.
/// `elastic` is the total underlying amount the shares represent,
/// `base` the total shares outstanding.
#[odra::odra_type]
#[derive(Default)]
pub struct Rebase {
    /// Total underlying amount
    pub elastic: U256,
    /// Total shares outstanding
    pub base: U256,
}

/// True when the value fits the 128-bit storage bound
pub fn fits_128(value: U256) -> bool {
    value.bits() <= 128
}

impl Rebase {
    /// Converts an underlying amount to shares.
    ///
    /// Bootstrap: with no shares outstanding the rate is 1:1.
    /// Otherwise `share = amount * base / elastic`, rounded up on a nonzero
    /// remainder when `round_up` is set. The intermediate product is checked
    /// at 256 bits; stored quantities are capped at 128 bits elsewhere, so
    /// the product of two in-range values cannot overflow, but caller-supplied
    /// amounts are arbitrary and must fail closed.
    pub fn to_share(&self, amount: U256, round_up: bool) -> Result<U256, VaultError> {
        if self.base.is_zero() {
            return Ok(amount);
        }
        if self.elastic.is_zero() {
            return Err(VaultError::DivisionByZero);
        }
        let product = amount.checked_mul(self.base).ok_or(VaultError::Overflow)?;
        let mut share = product / self.elastic;
        if round_up && !(product % self.elastic).is_zero() {
            share += U256::one();
        }
        Ok(share)
    }

    /// Converts shares to an underlying amount.
    ///
    /// Symmetric to [`Rebase::to_share`]: `amount = share * elastic / base`,
    /// 1:1 when no shares are outstanding.
    pub fn to_amount(&self, share: U256, round_up: bool) -> Result<U256, VaultError> {
        if self.base.is_zero() {
            return Ok(share);
        }
        let product = share.checked_mul(self.elastic).ok_or(VaultError::Overflow)?;
        let mut amount = product / self.base;
        if round_up && !(product % self.base).is_zero() {
            amount += U256::one();
        }
        Ok(amount)
    }

    /// Adds a deposit to both totals, failing closed past the 128-bit bound
    pub fn add(&mut self, amount: U256, share: U256) -> Result<(), VaultError> {
        let elastic = self.elastic.checked_add(amount).ok_or(VaultError::Overflow)?;
        let base = self.base.checked_add(share).ok_or(VaultError::Overflow)?;
        if !fits_128(elastic) || !fits_128(base) {
            return Err(VaultError::Overflow);
        }
        self.elastic = elastic;
        self.base = base;
        Ok(())
    }

    /// Removes a withdrawal from both totals
    pub fn sub(&mut self, amount: U256, share: U256) -> Result<(), VaultError> {
        self.elastic = self.elastic.checked_sub(amount).ok_or(VaultError::Underflow)?;
        self.base = self.base.checked_sub(share).ok_or(VaultError::Underflow)?;
        Ok(())
    }

    /// Grows elastic only (strategy profit, flash fee)
    pub fn add_elastic(&mut self, amount: U256) -> Result<(), VaultError> {
        let elastic = self.elastic.checked_add(amount).ok_or(VaultError::Overflow)?;
        if !fits_128(elastic) {
            return Err(VaultError::Overflow);
        }
        self.elastic = elastic;
        Ok(())
    }

    /// Shrinks elastic only (strategy loss)
    pub fn sub_elastic(&mut self, amount: U256) -> Result<(), VaultError> {
        self.elastic = self.elastic.checked_sub(amount).ok_or(VaultError::Underflow)?;
        Ok(())
    }
}

/// Flash loan fee for a principal: `amount * 50 / 100_000`
pub fn flash_fee(amount: U256) -> U256 {
    amount * U256::from(FLASH_LOAN_FEE) / U256::from(FLASH_FEE_PRECISION)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rebase(elastic: u128, base: u128) -> Rebase {
        Rebase {
            elastic: U256::from(elastic),
            base: U256::from(base),
        }
    }

    #[test]
    fn test_bootstrap_is_one_to_one() {
        let fresh = Rebase::default();
        assert_eq!(fresh.to_share(U256::from(1000), false).unwrap(), U256::from(1000));
        assert_eq!(fresh.to_share(U256::from(1000), true).unwrap(), U256::from(1000));
        assert_eq!(fresh.to_amount(U256::from(1000), false).unwrap(), U256::from(1000));
    }

    #[test]
    fn test_conversion_example() {
        // elastic=1300, base=1000: 1000 shares are worth 1300, and a 130
        // deposit mints floor(130 * 1000 / 1300) = 100 shares
        let r = rebase(1300, 1000);
        assert_eq!(r.to_amount(U256::from(1000), false).unwrap(), U256::from(1300));
        assert_eq!(r.to_share(U256::from(130), false).unwrap(), U256::from(100));
    }

    #[test]
    fn test_rounding_direction() {
        // elastic=1660, base=1000 (the original's 166% rate)
        let r = rebase(1660, 1000);
        // 1000 * 1000 / 1660 = 602.4096
        assert_eq!(r.to_share(U256::from(1000), false).unwrap(), U256::from(602));
        assert_eq!(r.to_share(U256::from(1000), true).unwrap(), U256::from(603));
        // no remainder: round_up must not add one
        assert_eq!(r.to_amount(U256::from(1000), false).unwrap(), U256::from(1660));
        assert_eq!(r.to_amount(U256::from(1000), true).unwrap(), U256::from(1660));
    }

    #[test]
    fn test_round_trip_never_gains() {
        let r = rebase(1300, 1000);
        for amount in [1u128, 7, 99, 130, 1299, 1301] {
            let share = r.to_share(U256::from(amount), false).unwrap();
            let back = r.to_amount(share, false).unwrap();
            assert!(back <= U256::from(amount));
        }
    }

    #[test]
    fn test_wide_product_overflow_fails_closed() {
        let r = rebase(1, u128::MAX);
        assert_eq!(r.to_share(U256::MAX, false), Err(VaultError::Overflow));
    }

    #[test]
    fn test_add_rejects_past_128_bits() {
        let mut r = rebase(u128::MAX, u128::MAX);
        assert_eq!(r.add(U256::one(), U256::zero()), Err(VaultError::Overflow));
        // state unchanged after the failure
        assert_eq!(r.elastic, U256::from(u128::MAX));
    }

    #[test]
    fn test_sub_underflow() {
        let mut r = rebase(100, 100);
        assert_eq!(r.sub(U256::from(101), U256::from(100)), Err(VaultError::Underflow));
    }

    #[test]
    fn test_zero_elastic_with_shares_fails_closed() {
        let r = rebase(0, 1000);
        assert_eq!(r.to_share(U256::from(10), false), Err(VaultError::DivisionByZero));
    }

    #[test]
    fn test_flash_fee() {
        assert_eq!(flash_fee(U256::from(10_000u64)), U256::from(5));
        assert_eq!(flash_fee(U256::from(100_000u64)), U256::from(50));
        // fees round down
        assert_eq!(flash_fee(U256::from(1999u64)), U256::zero());
    }
}
