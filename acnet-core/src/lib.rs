#![warn(missing_docs)]
//! Backend-independent building blocks of the actor and critic networks.
//!
//! This crate holds the pieces that do not depend on a tensor library:
//!
//! * [`ActorConfig`] and [`CriticConfig`], the construction parameters of the networks,
//! * [`Init`], the weight initialization schemes sampled from an explicit random generator,
//! * [`ModelError`], the errors raised on invalid configurations and mismatched inputs,
//! * [`shape`], dimension checks shared by every backend.
pub mod error;
pub mod init;
pub mod shape;

mod config;
pub use config::{ActorConfig, CriticConfig};
pub use error::ModelError;
pub use init::{kaiming_std, Init};
