//! Utilities.
use anyhow::{anyhow, bail, Result};
use candle_core::{Device, Tensor, WithDType};
use candle_nn::VarMap;
use log::trace;
use ndarray::ArrayD;
use num_traits::AsPrimitive;
use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

/// Copies the values of variables in `src` to the variables of the same names in `dest`.
///
/// Every variable of `dest` must exist in `src` with the same shape.
pub fn copy_vars(dest: &VarMap, src: &VarMap) -> Result<()> {
    let dest = dest
        .data()
        .lock()
        .map_err(|_| anyhow!("Lock on destination variables is poisoned"))?;
    let src = src
        .data()
        .lock()
        .map_err(|_| anyhow!("Lock on source variables is poisoned"))?;

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .ok_or_else(|| anyhow!("Variable {} is missing in the source", k_dest))?;
        v_dest.set(v_src.as_tensor())?;
    }
    trace!("Copied {} variables", dest.len());

    Ok(())
}

/// Saves the variables of all `varmaps` into a single safetensors file.
///
/// The extension of `path` is replaced with `safetensors`. Variable names must be
/// unique across the maps.
pub fn save_vars(varmaps: &[&VarMap], path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut path = PathBuf::from(path.as_ref());
    path.set_extension("safetensors");

    let mut tensors: HashMap<String, Tensor> = HashMap::new();
    for varmap in varmaps.iter() {
        let data = varmap
            .data()
            .lock()
            .map_err(|_| anyhow!("Lock on variables is poisoned"))?;
        for (k, v) in data.iter() {
            if tensors.insert(k.clone(), v.as_tensor().clone()).is_some() {
                bail!("Variable {} appears twice", k);
            }
        }
    }
    candle_core::safetensors::save(&tensors, &path)?;

    Ok(path)
}

/// Loads the variables of all `varmaps` from a file written by [`save_vars`].
///
/// The extension of `path` is replaced with `safetensors`. If a variable is missing
/// in the file or differs in shape or dtype, an error is returned and no variable
/// is modified.
pub fn load_vars(varmaps: &[&VarMap], path: impl AsRef<Path>, device: &Device) -> Result<()> {
    let mut path = PathBuf::from(path.as_ref());
    path.set_extension("safetensors");
    let tensors = candle_core::safetensors::load(&path, device)?;

    let datas = varmaps
        .iter()
        .map(|varmap| {
            varmap
                .data()
                .lock()
                .map_err(|_| anyhow!("Lock on variables is poisoned"))
        })
        .collect::<Result<Vec<_>>>()?;

    // Nothing is written unless every variable has a matching tensor.
    for data in datas.iter() {
        for (k, v) in data.iter() {
            let t = tensors
                .get(k)
                .ok_or_else(|| anyhow!("Variable {} is missing in {:?}", k, path))?;
            if t.dims() != v.dims() || t.dtype() != v.dtype() {
                bail!(
                    "Variable {} is {:?} {:?} in {:?}, expected {:?} {:?}",
                    k,
                    t.dtype(),
                    t.dims(),
                    path,
                    v.dtype(),
                    v.dims()
                );
            }
        }
    }

    let mut n = 0;
    for data in datas.iter() {
        for (k, v) in data.iter() {
            v.set(&tensors[k])?;
            n += 1;
        }
    }
    trace!("Loaded {} variables from {:?}", n, path);

    Ok(())
}

/// Returns the standard deviation of a tensor.
pub fn std(t: &Tensor) -> Result<f32> {
    Ok(t.broadcast_sub(&t.mean_all()?)?
        .powf(2f64)?
        .mean_all()?
        .sqrt()?
        .to_vec0::<f32>()?)
}

/// Returns the mean and standard deviation of the variables, keyed by `<name>_mean` and `<name>_std`.
pub fn param_stats(varmap: &VarMap) -> Result<BTreeMap<String, f32>> {
    let mut stats = BTreeMap::new();
    let data = varmap
        .data()
        .lock()
        .map_err(|_| anyhow!("Lock on variables is poisoned"))?;

    for (k, v) in data.iter() {
        let m: f32 = v.mean_all()?.to_vec0()?;
        stats.insert(format!("{}_mean", &k), m);

        let s: f32 = std(v.as_tensor())?;
        stats.insert(format!("{}_std", &k), s);
    }

    Ok(stats)
}

/// Converts an array into a tensor on `device`.
pub fn arrayd_to_tensor<T1, T2>(a: &ArrayD<T1>, add_batch_dim: bool, device: &Device) -> Result<Tensor>
where
    T1: AsPrimitive<T2>,
    T2: WithDType,
{
    let shape = a.shape().to_vec();
    let v = a.iter().map(|e| e.as_()).collect::<Vec<T2>>();
    let t = Tensor::from_vec(v, shape, device)?;

    match add_batch_dim {
        true => Ok(t.unsqueeze(0)?),
        false => Ok(t),
    }
}

/// Converts a tensor into an array.
pub fn tensor_to_arrayd<T>(t: &Tensor, delete_batch_dim: bool) -> Result<ArrayD<T>>
where
    T: WithDType,
{
    let shape = match delete_batch_dim {
        false => t.dims().to_vec(),
        true => {
            if t.dims().first() != Some(&1) {
                bail!("Cannot delete batch dimension of a tensor of shape {:?}", t.dims());
            }
            t.dims()[1..].to_vec()
        }
    };
    let v: Vec<T> = t.flatten_all()?.to_vec1()?;

    Ok(ndarray::Array1::<T>::from(v).into_shape(ndarray::IxDyn(&shape))?)
}
