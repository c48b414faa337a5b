//! Typed building blocks the stacks are assembled from.
//!
//! Each submodule knows how to declare one kind of infrastructure into a
//! [`Stack`](crate::stack::Stack). None of them decide which stack a resource
//! lands in; that is the job of [`crate::stacks`].

pub mod compute;
pub mod iam;
pub mod network;
pub mod security;
pub mod user_data;

pub use compute::{InstanceSpec, InstanceTokens, InstanceType, KeyPairRef, MachineImage, SubnetSelection};
pub use iam::PolicyStatement;
pub use network::{Ipv4Cidr, NetworkHandle, SubnetType, VpcLookup, VpcSpec};
pub use security::{Peer, Port, SecurityGroupHandle, SecurityGroupSpec};
pub use user_data::{BootScript, UserData, UserDataFormat};
