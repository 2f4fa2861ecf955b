//! Coffer: share-based multi-asset vault
//!
//! The `Coffer` contract tracks, per registered asset, an elastic/base rebase
//! pair and per-account share balances. Idle funds can be delegated to a
//! yield strategy behind a timelocked switch, lent out within a transaction
//! as flash loans, and driven through an atomic call batcher.

pub mod asset;
pub mod batch;
pub mod coffer;
pub mod flash;
pub mod minted;
pub mod strategy;


pub use asset::{Asset, AssetKind, StrategyData};
pub use batch::CofferCall;
pub use coffer::Coffer;
