//! Weight initialization schemes.
//!
//! Every scheme draws from a random generator handed in by the caller, so two
//! networks built with generators seeded identically get identical weights and
//! no state is shared between networks.
use crate::ModelError;
use log::trace;
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

/// Bound of the small uniform initialization of the last layers.
pub const FINAL_LAYER_BOUND: f64 = 3e-3;

/// Returns the standard deviation of Kaiming normal initialization in fan-in mode
/// for a leaky ReLU with the given negative slope.
///
/// `std = sqrt(2 / ((1 + negative_slope^2) * fan_in))`
pub fn kaiming_std(negative_slope: f64, fan_in: usize) -> f64 {
    let gain = (2.0 / (1.0 + negative_slope * negative_slope)).sqrt();
    gain / (fan_in as f64).sqrt()
}

/// Initialization scheme of a parameter tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Init {
    /// Normal distribution with zero mean scaled by the fan-in and the negative slope
    /// of the following leaky ReLU (He et al., 2015).
    KaimingNormal {
        /// Negative slope of the leaky ReLU.
        negative_slope: f64,
    },

    /// Uniform distribution on the closed interval `[lo, hi]`.
    Uniform {
        /// Lower bound.
        lo: f64,
        /// Upper bound.
        hi: f64,
    },

    /// Uniform distribution on `[-1/sqrt(fan_in), 1/sqrt(fan_in))`.
    ///
    /// This is the default initialization of affine layers, used for biases and
    /// for layers without a dedicated scheme.
    FanInUniform,
}

impl Init {
    /// Uniform distribution on `[-FINAL_LAYER_BOUND, FINAL_LAYER_BOUND]`.
    pub fn final_layer() -> Self {
        Self::Uniform {
            lo: -FINAL_LAYER_BOUND,
            hi: FINAL_LAYER_BOUND,
        }
    }

    /// Draws `n` values for a tensor whose fan-in is `fan_in`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        fan_in: usize,
        n: usize,
    ) -> Result<Vec<f32>, ModelError> {
        if fan_in == 0 {
            return Err(ModelError::InvalidConfig("fan_in must be positive".into()));
        }
        trace!("Sample {} values with {:?}, fan_in = {}", n, self, fan_in);

        match *self {
            Self::KaimingNormal { negative_slope } => {
                let std = kaiming_std(negative_slope, fan_in) as f32;
                let dist = Normal::new(0f32, std)
                    .map_err(|e| ModelError::InvalidConfig(format!("{}", e)))?;
                Ok(dist.sample_iter(rng).take(n).collect())
            }
            Self::Uniform { lo, hi } => {
                // Bounds and their width must stay finite in f32.
                let (lo32, hi32) = (lo as f32, hi as f32);
                if !(lo32.is_finite() && hi32.is_finite() && (hi32 - lo32).is_finite()) || lo > hi {
                    return Err(ModelError::InvalidConfig(format!(
                        "invalid uniform bounds [{}, {}]",
                        lo, hi
                    )));
                }
                let dist = Uniform::new_inclusive(lo32, hi32);
                Ok(dist.sample_iter(rng).take(n).collect())
            }
            Self::FanInUniform => {
                let bound = 1.0 / (fan_in as f32).sqrt();
                let dist = Uniform::new(-bound, bound);
                Ok(dist.sample_iter(rng).take(n).collect())
            }
        }
    }
}
