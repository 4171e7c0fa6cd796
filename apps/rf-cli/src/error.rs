//! Top-level error for the command line.

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Profile error: {0}")]
    Profile(#[from] rf_profile::ProfileError),

    #[error("Run error: {0}")]
    Runner(#[from] rf_runner::RunnerError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] rf_sim::SimError),

    #[error("Results error: {0}")]
    Results(#[from] rf_results::ResultsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Usage(String),
}

pub type CliResult<T> = Result<T, CliError>;
