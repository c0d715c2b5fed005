//! Unit-group configuration and data statistics
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::model::CovarianceKind;

/// Weighted arc between two states of a unit
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct ArcConfig {
    pub start_id: usize,
    pub end_id: usize,
    pub trans_prob: f64,
}

impl ArcConfig {
    #[inline]
    pub fn new(start_id: usize, end_id: usize, trans_prob: f64) -> Self {
        ArcConfig {
            start_id,
            end_id,
            trans_prob,
        }
    }
}

/// Units sharing one topology and one kind of emission
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct UnitGroupConfig {
    pub group_name: String,
    pub n_units: usize,
    pub n_normal_per_state: usize,
    #[cfg_attr(feature = "serde1", serde(default))]
    pub cov_type: CovarianceKind,
    pub topology: Vec<ArcConfig>,
}

impl UnitGroupConfig {
    /// Number of emitting states of the group's units
    pub fn n_states(&self) -> usize {
        self.topology
            .iter()
            .map(|arc| arc.end_id)
            .max()
            .map_or(0, |final_id| final_id.saturating_sub(1))
    }
}

/// Configuration of a phone loop.
///
/// # Example
///
/// ```
/// use beer::config::PhoneLoopConfig;
///
/// let conf = PhoneLoopConfig::from_yaml_str(
///     r#"
/// - group_name: speech-unit
///   n_units: 10
///   n_normal_per_state: 2
///   topology:
///     - {start_id: 0, end_id: 1, trans_prob: 1.0}
///     - {start_id: 1, end_id: 1, trans_prob: 0.5}
///     - {start_id: 1, end_id: 2, trans_prob: 0.5}
/// "#,
/// )
/// .unwrap();
///
/// let (idx, group) = conf.find_group("speech-unit").unwrap();
/// assert_eq!(idx, 0);
/// assert_eq!(group.n_states(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(transparent))]
pub struct PhoneLoopConfig {
    pub groups: Vec<UnitGroupConfig>,
}

/// Global mean and variance of the training features
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct DataStats {
    pub mean: Vec<f64>,
    pub var: Vec<f64>,
}

#[derive(Debug)]
pub enum ConfigError {
    /// No group has the requested name
    NoMatchingGroup(String),
    /// The configuration has no unit group
    NoGroups,
    #[cfg(feature = "serde1")]
    Yaml(serde_yaml::Error),
    #[cfg(feature = "serde1")]
    Json(serde_json::Error),
}

impl PhoneLoopConfig {
    #[cfg(feature = "serde1")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let conf: PhoneLoopConfig =
            serde_yaml::from_str(yaml).map_err(ConfigError::Yaml)?;
        if conf.groups.is_empty() {
            return Err(ConfigError::NoGroups);
        }
        Ok(conf)
    }

    /// Index and configuration of the group called `name`
    pub fn find_group(
        &self,
        name: &str,
    ) -> Result<(usize, &UnitGroupConfig), ConfigError> {
        self.groups
            .iter()
            .enumerate()
            .find(|(_, group)| group.group_name == name)
            .ok_or_else(|| ConfigError::NoMatchingGroup(name.to_owned()))
    }
}

impl DataStats {
    #[cfg(feature = "serde1")]
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Json)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            #[cfg(feature = "serde1")]
            Self::Yaml(err) => Some(err),
            #[cfg(feature = "serde1")]
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingGroup(name) => {
                write!(f, "no unit group matching \"{name}\"")
            }
            Self::NoGroups => write!(f, "configuration has no unit group"),
            #[cfg(feature = "serde1")]
            Self::Yaml(err) => write!(f, "invalid YAML configuration: {err}"),
            #[cfg(feature = "serde1")]
            Self::Json(err) => write!(f, "invalid JSON statistics: {err}"),
        }
    }
}
