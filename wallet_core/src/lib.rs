//! Wallet core library for Kin.
//!
//! Everything a wallet application needs below its UI:
//! - Encrypted key storage and the key lifecycle ([`KeyStore`])
//! - Confirmed and pending balances per account ([`Account`])
//! - Transfer signing, submission, and status polling
//! - The account registry for one network ([`Client`])
//!
//! Each query has a blocking form, a completion-callback form (`*_with`),
//! and an awaitable form (`*_async`).

pub mod account;
pub mod client;
pub mod completion;
pub mod config;
pub mod error;
pub mod gateway;
pub mod keyfile;
pub mod keystore;
pub mod logging;
pub mod rpc_gateway;
pub mod storage;
pub mod transfer;

pub use account::Account;
pub use client::Client;
pub use completion::Dispatcher;
pub use config::{FundingPolicy, NetworkConfig, WalletConfig};
pub use error::KinError;
pub use gateway::LedgerGateway;
pub use keyfile::{KdfParams, KeyFile};
pub use keystore::{KeyLease, KeyStore, StoredAccount, UnlockedKey};
pub use logging::{init_logging, LogFormat};
pub use rpc_gateway::RpcGateway;
pub use storage::{FileKeyStorage, KeyStorage};
pub use transfer::{SignedTransfer, Transfer};
