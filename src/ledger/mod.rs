// Ledger module - transaction model, the network client seam, and an
// in-memory devnet that executes the escrow program semantics

mod client;
mod devnet;
mod transaction;

pub use client::*;
pub use devnet::*;
pub use transaction::*;
