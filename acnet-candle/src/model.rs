//! Interface of the networks.
//!
//! [`SubModel1`] is implemented by networks taking a single input ([`Actor`](crate::Actor)),
//! [`SubModel2`] by networks taking two inputs ([`Critic`](crate::Critic)).
//! Both share [`Parameterized`], which gives an external training loop access to the
//! trainable variables and to the train/eval switch.
use anyhow::Result;
use candle_core::{Device, Var};
use candle_nn::VarMap;
use rand::Rng;
use std::path::{Path, PathBuf};

/// A network owning its trainable variables.
pub trait Parameterized {
    /// Trainable variables, keyed by layer name (`"fc1.weight"`, `"bn.bias"`, ...).
    ///
    /// Running statistics of batch normalization are not included.
    fn varmap(&self) -> &VarMap;

    /// Returns the trainable variables, e.g. to attach an optimizer.
    fn vars(&self) -> Vec<Var> {
        self.varmap().all_vars()
    }

    /// Switches between training mode (batch statistics) and evaluation mode
    /// (running statistics) of batch normalization.
    fn set_train(&mut self, train: bool);

    /// Returns `true` in training mode.
    fn is_train(&self) -> bool;

    /// Saves parameters and running statistics.
    fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf>;

    /// Loads parameters and running statistics saved with [`Parameterized::save`].
    fn load(&mut self, path: impl AsRef<Path>) -> Result<()>;
}

/// Network with a single input.
pub trait SubModel1: Parameterized + Sized {
    /// Configuration from which [`SubModel1`] is constructed.
    type Config;

    /// Input of the [`SubModel1`].
    type Input;

    /// Output of the [`SubModel1`].
    type Output;

    /// Builds [`SubModel1`], drawing the initial weights from the seed in the configuration.
    fn build(config: Self::Config, device: Device) -> Result<Self>;

    /// Builds [`SubModel1`], drawing the initial weights from `rng`.
    fn build_with_rng<R: Rng + ?Sized>(config: Self::Config, device: Device, rng: &mut R) -> Result<Self>;

    /// A generalized forward function.
    fn forward(&self, input: &Self::Input) -> Result<Self::Output>;
}

/// Network with two inputs.
///
/// The difference from [`SubModel1`] is that this trait takes two inputs.
pub trait SubModel2: Parameterized + Sized {
    /// Configuration from which [`SubModel2`] is constructed.
    type Config;

    /// Input of the [`SubModel2`].
    type Input1;

    /// Input of the [`SubModel2`].
    type Input2;

    /// Output of the [`SubModel2`].
    type Output;

    /// Builds [`SubModel2`], drawing the initial weights from the seed in the configuration.
    fn build(config: Self::Config, device: Device) -> Result<Self>;

    /// Builds [`SubModel2`], drawing the initial weights from `rng`.
    fn build_with_rng<R: Rng + ?Sized>(config: Self::Config, device: Device, rng: &mut R) -> Result<Self>;

    /// A generalized forward function.
    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Result<Self::Output>;
}
