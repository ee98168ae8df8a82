//! Nullable infrastructure for deterministic testing.
//!
//! The wallet core reaches the outside world through two traits:
//! `LedgerGateway` for the ledger node and `KeyStorage` for key files. This
//! crate provides in-memory implementations of both that:
//! - Behave deterministically and can be steered programmatically
//! - Never touch the filesystem or network
//! - Are safe to share across threads
//!
//! Usage: hand them to `Client::new` in place of `RpcGateway` and
//! `FileKeyStorage`.

pub mod key_storage;
pub mod ledger;

pub use key_storage::NullKeyStorage;
pub use ledger::NullLedger;
