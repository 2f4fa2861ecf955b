//! Error definitions for the Coffer vault
use odra::prelude::*;

/// Custom errors for the vault and its satellite contracts
#[odra::odra_error]
pub enum VaultError {
    /// Caller has no rights over the `from` account
    NotApproved = 1,

    /// Registered address is not a deployed contract
    NotAToken = 2,

    /// Strategy reports a different base asset than the one registered
    StrategyMismatch = 3,

    /// Arithmetic result exceeds the 128-bit storage bound
    Overflow = 4,

    /// Arithmetic underflow (insufficient balance or totals)
    Underflow = 5,

    /// Division by zero in a share conversion
    DivisionByZero = 6,

    /// Withdrawal would leave a dust share total between 0 and the minimum
    CannotEmpty = 7,

    /// Skim deposit claims more than the unaccounted surplus
    SkimTooMuch = 8,

    /// Strategy switch attempted before the timelock elapsed
    TooEarly = 9,

    /// Flash loan repayment short of principal plus fee
    WrongAmount = 10,

    /// Token adapter transfer failed
    TransferFailed = 11,

    /// Native CSPR transfer failed
    NativeTransferFailed = 12,

    /// Asset id 0 or beyond the registered range
    AssetNotRegistered = 13,

    /// Asset kind not allowed for this operation
    InvalidTokenKind = 14,

    /// External assets carry no sub id
    SubIdNotAllowed = 15,

    /// Exactly one of amount/share must be nonzero
    InvalidAmount = 16,

    /// Parallel array arguments differ in length
    LengthMismatch = 17,

    /// Attached CSPR does not cover the native deposit
    NotEnoughNative = 18,

    /// Harvest or rebalance requires an active strategy
    StrategyNotSet = 19,

    /// Strategy target percentage above the allowed maximum
    TargetTooHigh = 20,

    /// Caller is not the admin / token owner
    Unauthorized = 21,

    /// Caller is not the pending owner
    NotPendingOwner = 22,
}

/// Custom errors for the test CEP-18 token
#[odra::odra_error]
pub enum TokenError {
    /// Insufficient allowance for transfer
    InsufficientAllowance = 100,

    /// Insufficient balance for operation
    InsufficientBalance = 101,
}
