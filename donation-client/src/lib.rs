//! Donation Platform Thin Client
//!
//! Connects a wallet identity to the remote donation ledger, NFT receipt
//! registry and token ledger, and talks to them over JSON-RPC.
//!
//! ## Security Model
//!
//! - Signing keys never leave the client; every request is signed locally
//! - Delegated sessions expire and are discarded once expired
//! - The persisted session is encrypted under a user passphrase
//! - Disconnecting drops the identity; later calls are anonymous

pub mod agent;
pub mod amount;
pub mod board;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod principal;
pub mod rpc;
pub mod services;
pub mod session;
pub mod types;

pub mod commands;

pub use agent::Agent;
pub use board::CampaignBoard;
pub use client::{DonationClient, DonationReceipt};
pub use config::{ClientConfig, Network};
pub use error::ClientError;
pub use identity::{Delegation, Identity};
pub use principal::{Account, Principal};
pub use rpc::{HttpTransport, Transport, TransportError};
pub use session::{AuthMode, Session, SessionError, SessionHandle};
