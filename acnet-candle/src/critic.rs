//! Action-value network.
use crate::{
    layers::{check_dtype, leaky_relu, linear, StateNorm},
    model::{Parameterized, SubModel2},
    util::{copy_vars, load_vars, save_vars},
};
use acnet_core::{
    shape::{check_matrix, check_same_batch},
    CriticConfig, Init,
};
use anyhow::Result;
use candle_core::{Device, Module, Tensor, D};
use candle_nn::{Linear, VarMap};
use log::{info, trace};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::{Path, PathBuf};

/// Critic estimating the value of a state-action pair.
///
/// ```text
/// state -> bn -> fcs1 -> leaky ReLU ─┐
///                                     cat -> fc2 -> leaky ReLU -> fc3 -> leaky ReLU -> fc4
/// action ────────────────────────────┘
/// ```
///
/// The action enters after the first hidden layer, concatenated behind the
/// state features. The output layer `fc4` keeps the default initialization of
/// affine layers while `fc3` gets the small uniform one.
pub struct Critic {
    config: CriticConfig,
    device: Device,
    varmap: VarMap,
    buffers: VarMap,
    train: bool,

    bn: StateNorm,
    fcs1: Linear,
    fc2: Linear,
    fc3: Linear,
    fc4: Linear,
}

impl Critic {
    /// Constructs [`Critic`] with weights drawn from a generator seeded with `config.seed`.
    pub fn build(config: CriticConfig, device: Device) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        Self::build_with_rng(config, device, &mut rng)
    }

    /// Constructs [`Critic`] with weights drawn from `rng`.
    ///
    /// `config.seed` is ignored.
    pub fn build_with_rng<R: Rng + ?Sized>(
        config: CriticConfig,
        device: Device,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;
        let varmap = VarMap::new();
        let buffers = VarMap::new();
        let kaiming = Init::KaimingNormal {
            negative_slope: config.leakage,
        };
        let in_dim2 = config.fc1 + config.action_size;

        let bn = StateNorm::build(config.state_size, "bn", &varmap, &buffers, &device)?;
        let fcs1 = linear(config.state_size, config.fc1, "fcs1", kaiming, &varmap, rng, &device)?;
        let fc2 = linear(in_dim2, config.fc2, "fc2", kaiming, &varmap, rng, &device)?;
        let fc3 = linear(config.fc2, config.fc3, "fc3", Init::final_layer(), &varmap, rng, &device)?;
        let fc4 = linear(config.fc3, 1, "fc4", Init::FanInUniform, &varmap, rng, &device)?;
        info!(
            "Build critic: {} -> {} (+{}) -> {} -> {} -> 1, leakage = {}",
            config.state_size, config.fc1, config.action_size, config.fc2, config.fc3, config.leakage
        );

        Ok(Self {
            config,
            device,
            varmap,
            buffers,
            train: true,
            bn,
            fcs1,
            fc2,
            fc3,
            fc4,
        })
    }

    /// Returns values for a batch of states and actions.
    ///
    /// The inputs have shapes `(batch_size, state_size)` and `(batch_size, action_size)`;
    /// the output has shape `(batch_size, 1)`.
    pub fn forward(&self, state: &Tensor, action: &Tensor) -> Result<Tensor> {
        check_dtype("state", state)?;
        check_dtype("action", action)?;
        let n_states = check_matrix("state", state.dims(), self.config.state_size)?;
        let n_actions = check_matrix("action", action.dims(), self.config.action_size)?;
        let batch_size = check_same_batch(n_states, n_actions)?;
        trace!("Critic::forward, batch_size = {}", batch_size);

        let leakage = self.config.leakage;
        let state = state.to_device(&self.device)?;
        let action = action.to_device(&self.device)?;
        let xs = self.bn.forward_t(&state, self.train)?;
        let xs = leaky_relu(&self.fcs1.forward(&xs)?, leakage)?;
        let xs = Tensor::cat(&[&xs, &action], D::Minus1)?;
        let xs = leaky_relu(&self.fc2.forward(&xs)?, leakage)?;
        let xs = leaky_relu(&self.fc3.forward(&xs)?, leakage)?;
        let xs = self.fc4.forward(&xs)?;
        debug_assert_eq!(xs.dims(), &[batch_size, 1]);
        Ok(xs)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CriticConfig {
        &self.config
    }

    /// Returns the device holding the variables.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Running statistics of batch normalization, keyed by name.
    pub fn buffers(&self) -> &VarMap {
        &self.buffers
    }

    /// Returns an independent copy with the same weights and running statistics.
    pub fn try_clone(&self) -> Result<Self> {
        let mut critic = Self::build(self.config.clone(), self.device.clone())?;
        copy_vars(&critic.varmap, &self.varmap)?;
        copy_vars(&critic.buffers, &self.buffers)?;
        critic.train = self.train;
        Ok(critic)
    }
}

impl Parameterized for Critic {
    fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    fn set_train(&mut self, train: bool) {
        self.train = train;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = save_vars(&[&self.varmap, &self.buffers], path)?;
        info!("Save critic to {:?}", path);
        Ok(path)
    }

    fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        load_vars(&[&self.varmap, &self.buffers], &path, &self.device)?;
        info!("Load critic from {:?}", path.as_ref());
        Ok(())
    }
}

impl SubModel2 for Critic {
    type Config = CriticConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    fn build(config: Self::Config, device: Device) -> Result<Self> {
        Critic::build(config, device)
    }

    fn build_with_rng<R: Rng + ?Sized>(config: Self::Config, device: Device, rng: &mut R) -> Result<Self> {
        Critic::build_with_rng(config, device, rng)
    }

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Result<Self::Output> {
        Critic::forward(self, input1, input2)
    }
}
