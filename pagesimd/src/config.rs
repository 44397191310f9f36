//! Simulation configuration

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default chance that a generated reference is out of range
pub const DEFAULT_ILLEGAL_PROBABILITY: f64 = 0.1;

/// Largest number of workloads in one run
pub const MAX_WORKLOADS: u32 = 100;

/// Largest virtual address space, in pages
pub const MAX_ADDRESS_SPACE: u32 = 25;

/// Configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("at least one workload is required")]
    NoWorkloads,

    #[error("{0} workloads requested, at most {MAX_WORKLOADS} are supported")]
    TooManyWorkloads(u32),

    #[error("the virtual address space must hold at least one page")]
    EmptyAddressSpace,

    #[error("address space of {0} pages exceeds the limit of {MAX_ADDRESS_SPACE}")]
    AddressSpaceTooLarge(u32),

    #[error("at least one physical frame is required")]
    NoFrames,

    #[error("illegal reference probability {0} is outside [0, 1]")]
    InvalidProbability(f64),
}

/// Simulation configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Number of workloads (k)
    pub workloads: u32,
    /// Pages in the virtual address space (m)
    pub address_space: u32,
    /// Physical frames (f)
    pub frames: u32,
    /// Chance that a generated reference is illegal, when m > mi
    pub illegal_probability: f64,
    /// Seed for reference generation; `None` draws from OS entropy
    pub seed: Option<u64>,
    /// Delay between consecutive workload starts
    pub stagger: Duration,
    /// Where to write the diagnostic stream as JSON lines
    pub trace_path: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            workloads: 4,
            address_space: 8,
            frames: 8,
            illegal_probability: DEFAULT_ILLEGAL_PROBABILITY,
            seed: None,
            stagger: Duration::ZERO,
            trace_path: None,
        }
    }
}

impl SimConfig {
    /// Creates a configuration for `workloads` workloads, `address_space`
    /// virtual pages and `frames` physical frames
    pub fn new(workloads: u32, address_space: u32, frames: u32) -> Self {
        Self {
            workloads,
            address_space,
            frames,
            ..Self::default()
        }
    }

    pub fn with_illegal_probability(mut self, probability: f64) -> Self {
        self.illegal_probability = probability;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn with_trace_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace_path = Some(path.into());
        self
    }

    /// Checks the configuration before anything is started
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workloads == 0 {
            return Err(ConfigError::NoWorkloads);
        }
        if self.workloads > MAX_WORKLOADS {
            return Err(ConfigError::TooManyWorkloads(self.workloads));
        }
        if self.address_space == 0 {
            return Err(ConfigError::EmptyAddressSpace);
        }
        if self.address_space > MAX_ADDRESS_SPACE {
            return Err(ConfigError::AddressSpaceTooLarge(self.address_space));
        }
        if self.frames == 0 {
            return Err(ConfigError::NoFrames);
        }
        if !(0.0..=1.0).contains(&self.illegal_probability) {
            return Err(ConfigError::InvalidProbability(self.illegal_probability));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.illegal_probability, 0.1);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_builders() {
        let config = SimConfig::new(3, 5, 2)
            .with_seed(7)
            .with_stagger(Duration::from_millis(250))
            .with_illegal_probability(0.0)
            .with_trace_path("result.jsonl");

        assert_eq!(config.workloads, 3);
        assert_eq!(config.address_space, 5);
        assert_eq!(config.frames, 2);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.stagger, Duration::from_millis(250));
        assert_eq!(config.trace_path, Some(PathBuf::from("result.jsonl")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_counts_rejected() {
        assert_eq!(
            SimConfig::new(0, 4, 2).validate(),
            Err(ConfigError::NoWorkloads)
        );
        assert_eq!(
            SimConfig::new(1, 0, 2).validate(),
            Err(ConfigError::EmptyAddressSpace)
        );
        assert_eq!(
            SimConfig::new(1, 4, 0).validate(),
            Err(ConfigError::NoFrames)
        );
    }

    #[test]
    fn test_oversized_runs_rejected() {
        assert_eq!(
            SimConfig::new(1, u32::MAX, 1).validate(),
            Err(ConfigError::AddressSpaceTooLarge(u32::MAX))
        );
        assert_eq!(
            SimConfig::new(1, MAX_ADDRESS_SPACE + 1, 1).validate(),
            Err(ConfigError::AddressSpaceTooLarge(MAX_ADDRESS_SPACE + 1))
        );
        assert_eq!(
            SimConfig::new(MAX_WORKLOADS + 1, 4, 1).validate(),
            Err(ConfigError::TooManyWorkloads(MAX_WORKLOADS + 1))
        );
        assert!(SimConfig::new(MAX_WORKLOADS, MAX_ADDRESS_SPACE, 1)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_probability_range() {
        let config = SimConfig::new(1, 4, 2);
        assert!(config.clone().with_illegal_probability(1.0).validate().is_ok());
        assert_eq!(
            config.clone().with_illegal_probability(1.5).validate(),
            Err(ConfigError::InvalidProbability(1.5))
        );
        assert!(matches!(
            config.with_illegal_probability(f64::NAN).validate(),
            Err(ConfigError::InvalidProbability(_))
        ));
    }
}
