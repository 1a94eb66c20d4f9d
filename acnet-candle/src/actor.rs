//! Deterministic policy network.
use crate::{
    layers::{check_dtype, leaky_relu, linear, StateNorm},
    model::{Parameterized, SubModel1},
    util::{copy_vars, load_vars, save_vars},
};
use acnet_core::{shape::check_matrix, ActorConfig, Init};
use anyhow::Result;
use candle_core::{Device, Module, Tensor};
use candle_nn::{Linear, VarMap};
use log::{info, trace};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::{Path, PathBuf};

/// Deterministic policy mapping states to actions in `(-1, 1)`.
///
/// `state -> bn -> fc1 -> leaky ReLU -> fc2 -> leaky ReLU -> fc3 -> tanh`
///
/// The network starts in training mode, where batch normalization uses the
/// statistics of the batch and therefore needs at least two samples.
pub struct Actor {
    config: ActorConfig,
    device: Device,
    varmap: VarMap,
    buffers: VarMap,
    train: bool,

    bn: StateNorm,
    fc1: Linear,
    fc2: Linear,
    fc3: Linear,
}

impl Actor {
    /// Constructs [`Actor`] with weights drawn from a generator seeded with `config.seed`.
    pub fn build(config: ActorConfig, device: Device) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        Self::build_with_rng(config, device, &mut rng)
    }

    /// Constructs [`Actor`] with weights drawn from `rng`.
    ///
    /// `config.seed` is ignored.
    pub fn build_with_rng<R: Rng + ?Sized>(
        config: ActorConfig,
        device: Device,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;
        let varmap = VarMap::new();
        let buffers = VarMap::new();
        let kaiming = Init::KaimingNormal {
            negative_slope: config.leakage,
        };

        let bn = StateNorm::build(config.state_size, "bn", &varmap, &buffers, &device)?;
        let fc1 = linear(config.state_size, config.fc1, "fc1", kaiming, &varmap, rng, &device)?;
        let fc2 = linear(config.fc1, config.fc2, "fc2", kaiming, &varmap, rng, &device)?;
        let fc3 = linear(
            config.fc2,
            config.action_size,
            "fc3",
            Init::final_layer(),
            &varmap,
            rng,
            &device,
        )?;
        info!(
            "Build actor: {} -> {} -> {} -> {}, leakage = {}",
            config.state_size, config.fc1, config.fc2, config.action_size, config.leakage
        );

        Ok(Self {
            config,
            device,
            varmap,
            buffers,
            train: true,
            bn,
            fc1,
            fc2,
            fc3,
        })
    }

    /// Returns actions for a `(batch_size, state_size)` batch of states.
    ///
    /// The output has shape `(batch_size, action_size)`.
    pub fn forward(&self, state: &Tensor) -> Result<Tensor> {
        check_dtype("state", state)?;
        let batch_size = check_matrix("state", state.dims(), self.config.state_size)?;
        trace!("Actor::forward, batch_size = {}", batch_size);

        let leakage = self.config.leakage;
        let xs = state.to_device(&self.device)?;
        let xs = self.bn.forward_t(&xs, self.train)?;
        let xs = leaky_relu(&self.fc1.forward(&xs)?, leakage)?;
        let xs = leaky_relu(&self.fc2.forward(&xs)?, leakage)?;
        let xs = self.fc3.forward(&xs)?.tanh()?;
        debug_assert_eq!(xs.dims(), &[batch_size, self.config.action_size]);
        Ok(xs)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ActorConfig {
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
        let mut actor = Self::build(self.config.clone(), self.device.clone())?;
        copy_vars(&actor.varmap, &self.varmap)?;
        copy_vars(&actor.buffers, &self.buffers)?;
        actor.train = self.train;
        Ok(actor)
    }
}

impl Parameterized for Actor {
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
        info!("Save actor to {:?}", path);
        Ok(path)
    }

    fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        load_vars(&[&self.varmap, &self.buffers], &path, &self.device)?;
        info!("Load actor from {:?}", path.as_ref());
        Ok(())
    }
}

impl SubModel1 for Actor {
    type Config = ActorConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn build(config: Self::Config, device: Device) -> Result<Self> {
        Actor::build(config, device)
    }

    fn build_with_rng<R: Rng + ?Sized>(config: Self::Config, device: Device, rng: &mut R) -> Result<Self> {
        Actor::build_with_rng(config, device, rng)
    }

    fn forward(&self, input: &Self::Input) -> Result<Self::Output> {
        Actor::forward(self, input)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use acnet_core::{init::FINAL_LAYER_BOUND, kaiming_std, ModelError};
    use candle_core::DType;

    fn small_config() -> ActorConfig {
        ActorConfig::new(4, 2).fc1(32).fc2(16)
    }

    fn weight(actor: &Actor, name: &str) -> Result<Vec<f32>> {
        let data = actor.varmap().data().lock().unwrap();
        Ok(data[name].as_tensor().flatten_all()?.to_vec1()?)
    }

    #[test]
    fn test_layer_shapes() -> Result<()> {
        let actor = Actor::build(ActorConfig::new(6, 3), Device::Cpu)?;
        let data = actor.varmap().data().lock().unwrap();
        assert_eq!(data["fc1.weight"].dims(), &[256, 6]);
        assert_eq!(data["fc2.weight"].dims(), &[128, 256]);
        assert_eq!(data["fc3.weight"].dims(), &[3, 128]);
        assert_eq!(data["fc3.bias"].dims(), &[3]);
        assert_eq!(data["bn.weight"].dims(), &[6]);
        Ok(())
    }

    #[test]
    fn test_vars_exclude_running_stats() -> Result<()> {
        let actor = Actor::build(small_config(), Device::Cpu)?;
        // bn.{weight,bias} + 3 * {weight,bias}
        assert_eq!(actor.vars().len(), 8);
        assert_eq!(actor.buffers().all_vars().len(), 2);
        Ok(())
    }

    #[test]
    fn test_init_schemes() -> Result<()> {
        let actor = Actor::build(ActorConfig::new(8, 2), Device::Cpu)?;

        let w3 = weight(&actor, "fc3.weight")?;
        assert!(w3.iter().all(|w| w.abs() <= FINAL_LAYER_BOUND as f32));

        // fc2 has 128 * 256 weights, enough for a tight estimate of the spread.
        let w2 = weight(&actor, "fc2.weight")?;
        let n = w2.len() as f64;
        let std = (w2.iter().map(|w| (*w as f64).powi(2)).sum::<f64>() / n).sqrt();
        let expected = kaiming_std(0.01, 256);
        assert!((std - expected).abs() < 0.05 * expected);
        Ok(())
    }

    #[test]
    fn test_leakage_drives_init_and_activation() -> Result<()> {
        let actor = Actor::build(ActorConfig::new(8, 2).leakage(0.2), Device::Cpu)?;
        let w2 = weight(&actor, "fc2.weight")?;
        let n = w2.len() as f64;
        let std = (w2.iter().map(|w| (*w as f64).powi(2)).sum::<f64>() / n).sqrt();
        let expected = kaiming_std(0.2, 256);
        assert!((std - expected).abs() < 0.01 * expected);

        // One unit per layer with unit weights and zero biases: a negative input
        // is scaled by the slope at both leaky ReLUs.
        let forward = |leakage: f64| -> Result<f32> {
            let mut actor = Actor::build(ActorConfig::new(1, 1).fc1(1).fc2(1).leakage(leakage), Device::Cpu)?;
            actor.set_train(false);
            {
                let data = actor.varmap().data().lock().unwrap();
                for name in ["fc1", "fc2", "fc3"] {
                    let w = &data[&format!("{}.weight", name)];
                    w.set(&w.ones_like()?)?;
                    let b = &data[&format!("{}.bias", name)];
                    b.set(&b.zeros_like()?)?;
                }
            }
            let y: Vec<Vec<f32>> = actor
                .forward(&Tensor::new(&[[-2f32]], &Device::Cpu)?)?
                .to_vec2()?;
            Ok(y[0][0])
        };

        let x = -2.0 / (1.0 + crate::layers::BN_EPS).sqrt();
        let expected = (x * 0.2 * 0.2).tanh() as f32;
        let y = forward(0.2)?;
        assert!((y - expected).abs() < 1e-5);
        assert!((y - forward(0.01)?).abs() > 1e-2);
        Ok(())
    }

    #[test]
    fn test_output_in_open_interval() -> Result<()> {
        let actor = Actor::build(small_config(), Device::Cpu)?;
        let state = Tensor::randn(0f32, 3f32, (16, 4), &Device::Cpu)?;
        let action = actor.forward(&state)?;
        assert_eq!(action.dims(), &[16, 2]);

        let vs: Vec<f32> = action.flatten_all()?.to_vec1()?;
        assert!(vs.iter().all(|v| *v > -1.0 && *v < 1.0));
        Ok(())
    }

    #[test]
    fn test_same_seed_same_weights() -> Result<()> {
        let a1 = Actor::build(small_config(), Device::Cpu)?;
        let a2 = Actor::build(small_config(), Device::Cpu)?;
        for name in ["fc1.weight", "fc1.bias", "fc2.weight", "fc3.weight", "fc3.bias"] {
            assert_eq!(weight(&a1, name)?, weight(&a2, name)?);
        }
        Ok(())
    }

    #[test]
    fn test_different_seeds_small_distinct_final_weights() -> Result<()> {
        let a1 = Actor::build(small_config().seed(1), Device::Cpu)?;
        let a2 = Actor::build(small_config().seed(2), Device::Cpu)?;
        let w1 = weight(&a1, "fc3.weight")?;
        let w2 = weight(&a2, "fc3.weight")?;
        let bound = FINAL_LAYER_BOUND as f32;
        assert!(w1.iter().chain(w2.iter()).all(|w| w.abs() <= bound));
        assert_ne!(w1, w2);
        Ok(())
    }

    #[test]
    fn test_build_with_rng_ignores_config_seed() -> Result<()> {
        let a1 = Actor::build_with_rng(small_config().seed(1), Device::Cpu, &mut StdRng::seed_from_u64(9))?;
        let a2 = Actor::build_with_rng(small_config().seed(2), Device::Cpu, &mut StdRng::seed_from_u64(9))?;
        assert_eq!(weight(&a1, "fc1.weight")?, weight(&a2, "fc1.weight")?);
        Ok(())
    }

    #[test]
    fn test_shape_mismatch() -> Result<()> {
        let actor = Actor::build(small_config(), Device::Cpu)?;

        let err = actor
            .forward(&Tensor::zeros((8, 5), DType::F32, &Device::Cpu)?)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ModelError>(),
            Some(&ModelError::DimensionMismatch {
                input: "state",
                axis: 1,
                expected: 4,
                actual: 5
            })
        );

        let err = actor
            .forward(&Tensor::zeros(4, DType::F32, &Device::Cpu)?)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::RankMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_single_sample() -> Result<()> {
        let mut actor = Actor::build(small_config(), Device::Cpu)?;
        let state = Tensor::ones((1, 4), DType::F32, &Device::Cpu)?;

        let err = actor.forward(&state).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::DegenerateBatch { batch_size: 1, .. })
        ));

        actor.set_train(false);
        assert_eq!(actor.forward(&state)?.dims(), &[1, 2]);
        Ok(())
    }

    #[test]
    fn test_try_clone_is_independent() -> Result<()> {
        let actor = Actor::build(small_config(), Device::Cpu)?;
        let copy = actor.try_clone()?;
        assert_eq!(weight(&actor, "fc2.weight")?, weight(&copy, "fc2.weight")?);

        // Mutating the copy leaves the source actor untouched.
        let data = copy.varmap().data().lock().unwrap();
        let w = &data["fc2.weight"];
        w.set(&w.zeros_like()?)?;
        drop(data);
        assert!(weight(&actor, "fc2.weight")?.iter().any(|v| *v != 0.0));
        Ok(())
    }
}
