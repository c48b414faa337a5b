//! Stack builders.
//!
//! Each builder is a plain function from typed settings and the handles of
//! earlier stacks to a finished [`Stack`](crate::stack::Stack). Builders
//! declare their own dependency edges; the [`App`](crate::app::App) wires
//! them together in order.

pub mod bastion;
pub mod network;
pub mod private;

pub use bastion::{build_bastion_stack, BastionStack};
pub use network::{build_network_stack, NetworkStack};
pub use private::{build_private_stack, PrivateStack};
