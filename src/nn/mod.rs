//! Neural-network policy using tch-rs (PyTorch bindings).
//!
//! Only available with the `rl-nn` feature.

mod network;
mod policy;

pub use network::{ActionHead, ActorCritic};
pub use policy::{soft_update, TchPolicy};
