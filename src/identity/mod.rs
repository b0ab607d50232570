// Identity module - account addresses, wallet keypairs, and the signer seam

mod address;
mod keypair;
mod session;
mod signer;

pub use address::*;
pub use keypair::*;
pub use session::*;
pub use signer::*;
