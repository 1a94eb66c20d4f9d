//! Configurations of the actor and critic networks.
use crate::ModelError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

fn check_size(name: &str, v: usize) -> Result<(), ModelError> {
    if v == 0 {
        return Err(ModelError::InvalidConfig(format!("{} must be positive", name)));
    }
    Ok(())
}

fn check_leakage(v: f64) -> Result<(), ModelError> {
    if !v.is_finite() || v < 0.0 {
        return Err(ModelError::InvalidConfig(format!(
            "leakage must be a finite non-negative number, got {}",
            v
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of the actor network.
///
/// The hidden layers are chained as `state_size -> fc1 -> fc2 -> action_size`.
pub struct ActorConfig {
    /// Number of features of a state.
    pub state_size: usize,

    /// Number of components of an action.
    pub action_size: usize,

    /// Width of the first hidden layer.
    #[serde(default = "default_fc1")]
    pub fc1: usize,

    /// Width of the second hidden layer.
    #[serde(default = "default_fc2")]
    pub fc2: usize,

    /// Negative slope of the leaky ReLU, shared by initialization and activation.
    #[serde(default = "default_leakage")]
    pub leakage: f64,

    /// Seed of the random generator used for weight initialization.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_fc1() -> usize {
    256
}

fn default_fc2() -> usize {
    128
}

fn default_fc3() -> usize {
    128
}

fn default_leakage() -> f64 {
    0.01
}

fn default_seed() -> u64 {
    123
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            state_size: 0,
            action_size: 0,
            fc1: default_fc1(),
            fc2: default_fc2(),
            leakage: default_leakage(),
            seed: default_seed(),
        }
    }
}

impl ActorConfig {
    /// Creates a configuration with default hidden widths, leakage and seed.
    pub fn new(state_size: usize, action_size: usize) -> Self {
        Self {
            state_size,
            action_size,
            ..Self::default()
        }
    }

    /// Sets the number of state features.
    pub fn state_size(mut self, v: usize) -> Self {
        self.state_size = v;
        self
    }

    /// Sets the number of action components.
    pub fn action_size(mut self, v: usize) -> Self {
        self.action_size = v;
        self
    }

    /// Sets the width of the first hidden layer.
    pub fn fc1(mut self, v: usize) -> Self {
        self.fc1 = v;
        self
    }

    /// Sets the width of the second hidden layer.
    pub fn fc2(mut self, v: usize) -> Self {
        self.fc2 = v;
        self
    }

    /// Sets the negative slope of the leaky ReLU.
    pub fn leakage(mut self, v: f64) -> Self {
        self.leakage = v;
        self
    }

    /// Sets the seed for weight initialization.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Checks that every size is positive and the leakage is usable.
    pub fn validate(&self) -> Result<(), ModelError> {
        check_size("state_size", self.state_size)?;
        check_size("action_size", self.action_size)?;
        check_size("fc1", self.fc1)?;
        check_size("fc2", self.fc2)?;
        check_leakage(self.leakage)
    }

    /// Loads [`ActorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ActorConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of the critic network.
///
/// The action joins the state features right after the first hidden layer,
/// so the second layer takes `fc1 + action_size` inputs.
pub struct CriticConfig {
    /// Number of features of a state.
    pub state_size: usize,

    /// Number of components of an action.
    pub action_size: usize,

    /// Width of the first hidden layer (state features only).
    #[serde(default = "default_fc1")]
    pub fc1: usize,

    /// Width of the second hidden layer.
    #[serde(default = "default_fc2")]
    pub fc2: usize,

    /// Width of the third hidden layer.
    #[serde(default = "default_fc3")]
    pub fc3: usize,

    /// Negative slope of the leaky ReLU, shared by initialization and activation.
    #[serde(default = "default_leakage")]
    pub leakage: f64,

    /// Seed of the random generator used for weight initialization.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            state_size: 0,
            action_size: 0,
            fc1: default_fc1(),
            fc2: default_fc2(),
            fc3: default_fc3(),
            leakage: default_leakage(),
            seed: default_seed(),
        }
    }
}

impl CriticConfig {
    /// Creates a configuration with default hidden widths, leakage and seed.
    pub fn new(state_size: usize, action_size: usize) -> Self {
        Self {
            state_size,
            action_size,
            ..Self::default()
        }
    }

    /// Sets the number of state features.
    pub fn state_size(mut self, v: usize) -> Self {
        self.state_size = v;
        self
    }

    /// Sets the number of action components.
    pub fn action_size(mut self, v: usize) -> Self {
        self.action_size = v;
        self
    }

    /// Sets the width of the first hidden layer.
    pub fn fc1(mut self, v: usize) -> Self {
        self.fc1 = v;
        self
    }

    /// Sets the width of the second hidden layer.
    pub fn fc2(mut self, v: usize) -> Self {
        self.fc2 = v;
        self
    }

    /// Sets the width of the third hidden layer.
    pub fn fc3(mut self, v: usize) -> Self {
        self.fc3 = v;
        self
    }

    /// Sets the negative slope of the leaky ReLU.
    pub fn leakage(mut self, v: f64) -> Self {
        self.leakage = v;
        self
    }

    /// Sets the seed for weight initialization.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Checks that every size is positive and the leakage is usable.
    pub fn validate(&self) -> Result<(), ModelError> {
        check_size("state_size", self.state_size)?;
        check_size("action_size", self.action_size)?;
        check_size("fc1", self.fc1)?;
        check_size("fc2", self.fc2)?;
        check_size("fc3", self.fc3)?;
        check_leakage(self.leakage)
    }

    /// Constructs [`CriticConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`CriticConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
