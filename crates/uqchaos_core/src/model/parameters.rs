//! Uncertain parameters and their marginal distributions

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Marginal distribution of a single uncertain parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Marginal {
    Uniform {
        min: f64,
        max: f64,
    },
    Normal {
        mean: f64,
        std_dev: f64,
    },
    /// `ln(x) ~ Normal(location, scale)`
    LogNormal {
        location: f64,
        scale: f64,
    },
    Gamma {
        shape: f64,
        rate: f64,
    },
    /// Beta distribution stretched onto `[min, max]`
    Beta {
        alpha: f64,
        beta: f64,
        #[serde(default)]
        min: f64,
        #[serde(default = "one")]
        max: f64,
    },
    Triangular {
        min: f64,
        mode: f64,
        max: f64,
    },
    Exponential {
        rate: f64,
    },
}

fn one() -> f64 {
    1.0
}

impl Marginal {
    pub const STANDARD_NORMAL: Marginal = Marginal::Normal {
        mean: 0.0,
        std_dev: 1.0,
    };

    /// Uniform distribution spanning `nominal * (1 ± interval / 2)`.
    #[must_use]
    pub fn uniform_interval(nominal: f64, interval: f64) -> Self {
        let half = (nominal * interval / 2.0).abs();
        Marginal::Uniform {
            min: nominal - half,
            max: nominal + half,
        }
    }

    /// Normal distribution centred on `nominal` with `std_dev = |nominal| * interval`.
    #[must_use]
    pub fn normal_interval(nominal: f64, interval: f64) -> Self {
        Marginal::Normal {
            mean: nominal,
            std_dev: (nominal * interval).abs(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Marginal::Uniform { .. } => "uniform",
            Marginal::Normal { .. } => "normal",
            Marginal::LogNormal { .. } => "lognormal",
            Marginal::Gamma { .. } => "gamma",
            Marginal::Beta { .. } => "beta",
            Marginal::Triangular { .. } => "triangular",
            Marginal::Exponential { .. } => "exponential",
        }
    }
}

/// A named model parameter.
///
/// Parameters without a distribution are certain: the model always sees
/// their nominal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub distribution: Option<Marginal>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            distribution: None,
        }
    }

    pub fn uncertain(name: impl Into<String>, value: f64, distribution: Marginal) -> Self {
        Self {
            name: name.into(),
            value,
            distribution: Some(distribution),
        }
    }

    pub fn is_uncertain(&self) -> bool {
        self.distribution.is_some()
    }
}

/// Ordered collection of model parameters.
///
/// Order matters: uncertain parameters appear in this order as node columns
/// and in sensitivity vectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub parameters: Vec<Parameter>,
    /// Correlation matrix over the uncertain parameters, in their order
    #[serde(default)]
    pub correlation: Option<Vec<Vec<f64>>>,
}

impl ParameterSet {
    pub fn new(parameters: Vec<Parameter>) -> Result<Self, ConfigError> {
        let set = Self {
            parameters,
            correlation: None,
        };
        set.validate()?;
        Ok(set)
    }

    #[must_use]
    pub fn with_correlation(mut self, correlation: Vec<Vec<f64>>) -> Self {
        self.correlation = Some(correlation);
        self
    }

    /// Check that names are unique
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, param) in self.parameters.iter().enumerate() {
            if self.parameters[..i].iter().any(|p| p.name == param.name) {
                return Err(ConfigError::DuplicateParameter(param.name.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn uncertain(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.is_uncertain())
    }

    pub fn uncertain_names(&self) -> Vec<String> {
        self.uncertain().map(|p| p.name.clone()).collect()
    }

    /// Assignment of every parameter to its nominal value
    pub fn nominal(&self) -> ParameterAssignment {
        ParameterAssignment {
            values: self
                .parameters
                .iter()
                .map(|p| (p.name.clone(), p.value))
                .collect(),
        }
    }
}

/// Concrete values handed to the model for one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterAssignment {
    pub values: Vec<(String, f64)>,
}

impl ParameterAssignment {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Override (or append) a value
    pub fn set(&mut self, name: &str, value: f64) {
        match self.values.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.values.push((name.to_string(), value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }
}
