// Escrow module - the transaction orchestration core: minting, deployment,
// price control, purchases, and teardown of per-patent escrow programs

mod contract;
mod deployer;
mod factory;
mod price;
mod purchase;
mod teardown;

pub use contract::*;
pub use deployer::*;
pub use factory::*;
pub use price::*;
pub use purchase::*;
pub use teardown::*;
