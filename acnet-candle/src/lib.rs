//! Actor and critic networks implemented with [candle](https://crates.io/crates/candle-core).
//!
//! [`Actor`] maps a batch of states to a batch of actions squashed into `(-1, 1)`.
//! [`Critic`] maps a batch of `(state, action)` pairs to one value per sample.
//! Both normalize the state with batch normalization, use leaky ReLU hidden
//! layers and are initialized deterministically from the seed in their
//! configuration.
//!
//! ```no_run
//! use acnet_candle::{Actor, Critic, ActorConfig, CriticConfig};
//! use candle_core::{Device, Tensor};
//!
//! # fn main() -> anyhow::Result<()> {
//! let actor = Actor::build(ActorConfig::new(4, 2), Device::Cpu)?;
//! let critic = Critic::build(CriticConfig::new(4, 2), Device::Cpu)?;
//!
//! let state = Tensor::randn(0f32, 1f32, (8, 4), &Device::Cpu)?;
//! let action = actor.forward(&state)?;
//! let value = critic.forward(&state, &action)?;
//! assert_eq!(value.dims(), &[8, 1]);
//! # Ok(())
//! # }
//! ```
mod actor;
mod critic;
pub mod layers;
pub mod model;
pub mod util;
pub use acnet_core::{ActorConfig, CriticConfig, ModelError};
pub use actor::Actor;
pub use critic::Critic;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl Device {
    /// Opens the corresponding [`candle_core::Device`].
    pub fn build(self) -> Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(n) => Ok(candle_core::Device::new_cuda(n)?),
        }
    }
}

impl TryFrom<&candle_core::Device> for Device {
    type Error = anyhow::Error;

    fn try_from(device: &candle_core::Device) -> Result<Self> {
        match device.location() {
            candle_core::DeviceLocation::Cpu => Ok(Self::Cpu),
            candle_core::DeviceLocation::Cuda { gpu_id } => Ok(Self::Cuda(gpu_id)),
            location => bail!("Unsupported device: {:?}", location),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_device_roundtrip_cpu() -> Result<()> {
        let device = Device::Cpu.build()?;
        assert!(device.is_cpu());
        assert_eq!(Device::try_from(&device)?, Device::Cpu);
        Ok(())
    }
}
