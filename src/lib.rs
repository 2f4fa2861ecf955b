#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]
extern crate alloc;

pub mod errors;
pub mod events;
pub mod math;

// CEP-18 adapter (External asset kind) and test token
pub mod token;

// The vault: asset registry, rebase ledger, balances, strategies,
// flash loans and call batching
pub mod coffer;
