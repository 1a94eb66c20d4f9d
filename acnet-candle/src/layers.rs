//! Layers shared by the actor and the critic.
use acnet_core::{
    shape::{check_batch_norm, check_matrix},
    Init, ModelError,
};
use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Shape, Tensor, Var};
use candle_nn::{BatchNorm, Linear, ModuleT, VarBuilder, VarMap};
use log::trace;
use rand::Rng;

/// Epsilon added to the variance in batch normalization.
pub const BN_EPS: f64 = 1e-5;

/// Creates a variable in `varmap` with values drawn by `init`.
///
/// An existing variable of the same name is replaced.
pub fn init_var<R: Rng + ?Sized>(
    varmap: &VarMap,
    name: &str,
    shape: impl Into<Shape>,
    fan_in: usize,
    init: Init,
    rng: &mut R,
    device: &Device,
) -> Result<()> {
    let shape: Shape = shape.into();
    let values = init.sample(rng, fan_in, shape.elem_count())?;
    let t = Tensor::from_vec(values, shape, device)?;
    let var = Var::from_tensor(&t)?;
    varmap
        .data()
        .lock()
        .map_err(|_| anyhow!("Lock on variables is poisoned"))?
        .insert(name.to_string(), var);
    Ok(())
}

/// Creates an affine layer `in_dim -> out_dim` named `name`.
///
/// The weight is drawn with `weight_init`, the bias with [`Init::FanInUniform`].
/// Weight is drawn before bias, and the order of calls fixes which random
/// numbers each layer gets.
pub fn linear<R: Rng + ?Sized>(
    in_dim: usize,
    out_dim: usize,
    name: &str,
    weight_init: Init,
    varmap: &VarMap,
    rng: &mut R,
    device: &Device,
) -> Result<Linear> {
    init_var(
        varmap,
        &format!("{}.weight", name),
        (out_dim, in_dim),
        in_dim,
        weight_init,
        rng,
        device,
    )?;
    init_var(
        varmap,
        &format!("{}.bias", name),
        out_dim,
        in_dim,
        Init::FanInUniform,
        rng,
        device,
    )?;

    // Picks up the variables created above.
    let vb = VarBuilder::from_varmap(varmap, DType::F32, device);
    Ok(candle_nn::linear(in_dim, out_dim, vb.pp(name))?)
}

/// Leaky ReLU with the given negative slope.
pub fn leaky_relu(xs: &Tensor, negative_slope: f64) -> Result<Tensor> {
    Ok(candle_nn::ops::leaky_relu(xs, negative_slope)?)
}

/// Returns an error if `xs` does not hold `f32` values.
pub fn check_dtype(input: &'static str, xs: &Tensor) -> Result<(), ModelError> {
    if xs.dtype() != DType::F32 {
        return Err(ModelError::DTypeMismatch {
            input,
            expected: format!("{:?}", DType::F32),
            actual: format!("{:?}", xs.dtype()),
        });
    }
    Ok(())
}

/// Batch normalization over the features of a `(batch_size, num_features)` state batch.
///
/// The scale and shift are trainable and live in the parameter [`VarMap`];
/// the running statistics live in a separate buffer [`VarMap`] so that they
/// are never handed to an optimizer.
pub struct StateNorm {
    num_features: usize,
    bn: BatchNorm,
}

impl StateNorm {
    /// Creates the layer named `name`: scale 1, shift 0, running mean 0, running variance 1.
    pub fn build(
        num_features: usize,
        name: &str,
        varmap: &VarMap,
        buffers: &VarMap,
        device: &Device,
    ) -> Result<Self> {
        let vb = VarBuilder::from_varmap(varmap, DType::F32, device).pp(name);
        let vb_buffers = VarBuilder::from_varmap(buffers, DType::F32, device).pp(name);
        let weight = vb.get_with_hints(num_features, "weight", candle_nn::Init::Const(1.))?;
        let bias = vb.get_with_hints(num_features, "bias", candle_nn::Init::Const(0.))?;
        let running_mean =
            vb_buffers.get_with_hints(num_features, "running_mean", candle_nn::Init::Const(0.))?;
        let running_var =
            vb_buffers.get_with_hints(num_features, "running_var", candle_nn::Init::Const(1.))?;
        let bn = BatchNorm::new(num_features, running_mean, running_var, weight, bias, BN_EPS)?;

        Ok(Self { num_features, bn })
    }

    /// Normalizes `xs`.
    ///
    /// In training mode the batch statistics are used and the running statistics
    /// are updated, which needs at least two samples. In evaluation mode the
    /// running statistics are used and any batch size is accepted.
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let batch_size = check_matrix("state", xs.dims(), self.num_features)?;
        check_batch_norm("state", batch_size, train)?;
        trace!("StateNorm::forward_t(train = {}), batch_size = {}", train, batch_size);
        Ok(self.bn.forward_t(xs, train)?)
    }

    /// Running mean of the features.
    pub fn running_mean(&self) -> &Tensor {
        self.bn.running_mean()
    }

    /// Running variance of the features.
    pub fn running_var(&self) -> &Tensor {
        self.bn.running_var()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::Module;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_linear_variable_names() -> Result<()> {
        let varmap = VarMap::new();
        let mut rng = StdRng::seed_from_u64(0);
        let layer = linear(3, 5, "fc1", Init::FanInUniform, &varmap, &mut rng, &Device::Cpu)?;

        let mut names: Vec<String> = varmap.data().lock().unwrap().keys().cloned().collect();
        names.sort();
        assert_eq!(names, vec!["fc1.bias".to_string(), "fc1.weight".to_string()]);
        assert_eq!(layer.weight().dims(), &[5, 3]);

        let ys = layer.forward(&Tensor::zeros((2, 3), DType::F32, &Device::Cpu)?)?;
        assert_eq!(ys.dims(), &[2, 5]);
        Ok(())
    }

    #[test]
    fn test_linear_uses_sampled_values() -> Result<()> {
        let varmap = VarMap::new();
        let mut rng = StdRng::seed_from_u64(0);
        let layer = linear(16, 4, "fc", Init::final_layer(), &varmap, &mut rng, &Device::Cpu)?;

        let max = layer.weight().abs()?.flatten_all()?.max(0)?.to_scalar::<f32>()?;
        assert!(max <= 3e-3);
        Ok(())
    }

    #[test]
    fn test_leaky_relu() -> Result<()> {
        let xs = Tensor::new(&[-2f32, -0.5, 0.0, 1.5], &Device::Cpu)?;
        let ys: Vec<f32> = leaky_relu(&xs, 0.1)?.to_vec1()?;
        let expected = [-0.2f32, -0.05, 0.0, 1.5];
        for (y, e) in ys.iter().zip(expected.iter()) {
            assert!((y - e).abs() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_check_dtype() -> Result<()> {
        let xs = Tensor::zeros((2, 2), DType::F64, &Device::Cpu)?;
        assert!(matches!(
            check_dtype("state", &xs),
            Err(ModelError::DTypeMismatch { input: "state", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_state_norm_train_normalizes_batch() -> Result<()> {
        let varmap = VarMap::new();
        let buffers = VarMap::new();
        let bn = StateNorm::build(2, "bn", &varmap, &buffers, &Device::Cpu)?;

        let xs = Tensor::new(&[[1f32, 10.], [3., 20.], [5., 30.], [7., 40.]], &Device::Cpu)?;
        let ys = bn.forward_t(&xs, true)?;

        // Zero mean per feature.
        let mean: Vec<f32> = ys.mean(0)?.to_vec1()?;
        assert!(mean.iter().all(|m| m.abs() < 1e-5));

        // Unit (biased) variance per feature.
        let var: Vec<f32> = ys.sqr()?.mean(0)?.to_vec1()?;
        assert!(var.iter().all(|v| (v - 1.0).abs() < 1e-3));

        // Running mean moved from 0 towards the batch mean by the momentum.
        let rm: Vec<f32> = bn.running_mean().to_vec1()?;
        assert!((rm[0] - 0.4).abs() < 1e-5);
        assert!((rm[1] - 2.5).abs() < 1e-5);

        Ok(())
    }

    #[test]
    fn test_state_norm_rejects_single_sample_in_train_mode() -> Result<()> {
        let varmap = VarMap::new();
        let buffers = VarMap::new();
        let bn = StateNorm::build(3, "bn", &varmap, &buffers, &Device::Cpu)?;
        let xs = Tensor::ones((1, 3), DType::F32, &Device::Cpu)?;

        let err = bn.forward_t(&xs, true).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ModelError>(),
            Some(&ModelError::DegenerateBatch {
                input: "state",
                batch_size: 1
            })
        );

        // Evaluation mode uses the running statistics: (1 - 0) / sqrt(1 + eps).
        let ys: Vec<Vec<f32>> = bn.forward_t(&xs, false)?.to_vec2()?;
        assert!(ys[0].iter().all(|y| (y - 1.0).abs() < 1e-4));
        Ok(())
    }

    #[test]
    fn test_state_norm_keeps_running_stats_out_of_parameters() -> Result<()> {
        let varmap = VarMap::new();
        let buffers = VarMap::new();
        let _bn = StateNorm::build(3, "bn", &varmap, &buffers, &Device::Cpu)?;

        let mut params: Vec<String> = varmap.data().lock().unwrap().keys().cloned().collect();
        params.sort();
        let mut bufs: Vec<String> = buffers.data().lock().unwrap().keys().cloned().collect();
        bufs.sort();
        assert_eq!(params, vec!["bn.bias", "bn.weight"]);
        assert_eq!(bufs, vec!["bn.running_mean", "bn.running_var"]);
        Ok(())
    }
}
