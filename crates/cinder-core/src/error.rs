//! Error types for Cinder

use thiserror::Error;

/// The main error type for Cinder operations
#[derive(Debug, Error)]
pub enum CinderError {
    #[error("System registered twice: {0}")]
    DuplicateSystem(String),

    #[error("Failed to resolve dependency: {dependency} for system: {system}")]
    UnresolvedDependency { dependency: String, system: String },

    #[error("System {0} cannot depend on itself")]
    SelfDependency(String),

    #[error("System of type {0} not found")]
    SystemNotFound(String),

    #[error("Resource of type {0} not found")]
    ResourceNotFound(String),

    #[error("Dependency slot {0} read before wiring")]
    UnwiredDependency(String),

    #[error("System {0} is already borrowed")]
    SystemBusy(String),

    #[error("System {system} failed: {source}")]
    SystemFault {
        system: String,
        #[source]
        source: Box<CinderError>,
    },

    #[error("Invalid simulation speed: {0}")]
    InvalidSpeed(f64),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl CinderError {
    /// Wrap an error raised inside a system hook with the system's name.
    pub fn in_system(system: impl Into<String>, source: CinderError) -> Self {
        CinderError::SystemFault {
            system: system.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error is a startup configuration fault
    pub fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            CinderError::DuplicateSystem(_)
                | CinderError::UnresolvedDependency { .. }
                | CinderError::SelfDependency(_)
                | CinderError::Config(_)
        )
    }
}

/// Result type alias for Cinder operations
pub type Result<T> = std::result::Result<T, CinderError>;

impl From<toml::de::Error> for CinderError {
    fn from(err: toml::de::Error) -> Self {
        CinderError::TomlParse(err.to_string())
    }
}
