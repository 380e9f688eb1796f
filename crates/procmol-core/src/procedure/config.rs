use super::random::RandomSource;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid parameter '{0}': {1}")]
    InvalidParameter(&'static str, String),
}

/// What the host loop does when an iteration fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failed iteration and return its error.
    #[default]
    Abort,
    /// Log the failure, count it and carry on with the next iteration.
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub iterations: u64,
    pub seed: Option<u64>,
    pub prefix: String,
    pub failure_policy: FailurePolicy,
}

impl RunConfig {
    /// The random source for a run: seeded when a seed was given, otherwise from entropy.
    pub fn random_source(&self) -> RandomSource {
        match self.seed {
            Some(seed) => RandomSource::seeded(seed),
            None => RandomSource::from_entropy(),
        }
    }
}

#[derive(Default)]
pub struct RunConfigBuilder {
    iterations: Option<u64>,
    seed: Option<u64>,
    prefix: Option<String>,
    failure_policy: Option<FailurePolicy>,
}

impl RunConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iterations(mut self, iterations: u64) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<RunConfig, ConfigError> {
        let iterations = self
            .iterations
            .ok_or(ConfigError::MissingParameter("iterations"))?;
        if iterations == 0 {
            return Err(ConfigError::InvalidParameter(
                "iterations",
                "at least one iteration is required".to_string(),
            ));
        }
        Ok(RunConfig {
            iterations,
            seed: self.seed,
            prefix: self.prefix.unwrap_or_default(),
            failure_policy: self.failure_policy.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterations_are_required() {
        let result = RunConfigBuilder::new().seed(7).build();
        assert_eq!(result, Err(ConfigError::MissingParameter("iterations")));
    }

    #[test]
    fn zero_iterations_are_rejected() {
        let result = RunConfigBuilder::new().iterations(0).build();
        assert!(matches!(result, Err(ConfigError::InvalidParameter("iterations", _))));
    }

    #[test]
    fn optional_parameters_take_defaults() {
        let config = RunConfigBuilder::new().iterations(10).build().unwrap();
        assert_eq!(config.iterations, 10);
        assert_eq!(config.seed, None);
        assert_eq!(config.prefix, "");
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn seeded_runs_draw_the_same_numbers() {
        let config = RunConfigBuilder::new()
            .iterations(1)
            .seed(42)
            .prefix("RDF")
            .failure_policy(FailurePolicy::Continue)
            .build()
            .unwrap();
        let (mut a, mut b) = (config.random_source(), config.random_source());
        assert_eq!(a.uniform(), b.uniform());
        assert_eq!(config.prefix, "RDF");
    }
}
