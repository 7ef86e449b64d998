//! Application configuration management.
//!
//! Provides typed configuration loaded from environment variables with
//! validation. Configuration is read once at startup; a missing required
//! value or a malformed value is fatal before the service starts serving.

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL database connection URL
    pub database_url: String,

    /// Base URL the producer dispatches tasks to
    pub consumer_address: String,

    /// Log level filter (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,

    /// Number of tasks the producer generates before draining
    pub max_backlog: u32,

    /// Port the consumer's dispatch endpoint binds to
    pub consumer_port: u16,

    /// Port the producer's metrics endpoint binds to
    pub producer_port: u16,

    /// Port the consumer's Prometheus endpoint binds to
    pub prometheus_port: u16,

    /// Admission control settings
    pub admission: AdmissionConfig,

    /// Maximum number of connections in the database pool
    pub pool_max_size: usize,
}

/// Token-bucket admission control configuration.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Steady-state admission rate in tasks per second
    pub rate: f64,

    /// Maximum tasks admitted instantaneously
    pub burst: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            burst: 5,
        }
    }
}

/// Configuration loading error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Configuration error for '{}': {}",
            self.field, self.message
        )
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `DATABASE_URL`: PostgreSQL connection string
    /// - `CONSUMER_ADDRESS`: base URL of the consumer's dispatch endpoint
    ///
    /// Optional environment variables:
    /// - `LOG_LEVEL`: log filter (default: info)
    /// - `MAX_BACKLOG`: producer send count (default: 100)
    /// - `CONSUMER_PORT`: dispatch endpoint port (default: 8085)
    /// - `PRODUCER_PORT`: producer metrics port (default: 9091)
    /// - `PROMETHEUS_PORT`: consumer metrics port (default: 9092)
    /// - `ADMISSION_RATE`: tokens per second (default: 1.0)
    /// - `ADMISSION_BURST`: bucket capacity (default: 5)
    /// - `POOL_MAX_SIZE`: max pool connections (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError {
            field: "DATABASE_URL".to_string(),
            message: "Required environment variable not set".to_string(),
        })?;

        let consumer_address = std::env::var("CONSUMER_ADDRESS").map_err(|_| ConfigError {
            field: "CONSUMER_ADDRESS".to_string(),
            message: "Required environment variable not set".to_string(),
        })?;

        let config = Self {
            database_url,
            consumer_address,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            max_backlog: parse_env_or("MAX_BACKLOG", 100)?,
            consumer_port: parse_env_or("CONSUMER_PORT", 8085)?,
            producer_port: parse_env_or("PRODUCER_PORT", 9091)?,
            prometheus_port: parse_env_or("PROMETHEUS_PORT", 9092)?,
            admission: AdmissionConfig {
                rate: parse_env_or("ADMISSION_RATE", 1.0)?,
                burst: parse_env_or("ADMISSION_BURST", 5)?,
            },
            pool_max_size: parse_env_or("POOL_MAX_SIZE", 10)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.is_empty() {
            return Err(ConfigError {
                field: "DATABASE_URL".to_string(),
                message: "Cannot be empty".to_string(),
            });
        }

        if !self.consumer_address.starts_with("http://")
            && !self.consumer_address.starts_with("https://")
        {
            return Err(ConfigError {
                field: "CONSUMER_ADDRESS".to_string(),
                message: "Must start with http:// or https://".to_string(),
            });
        }

        if self.max_backlog == 0 {
            return Err(ConfigError {
                field: "MAX_BACKLOG".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if !(self.admission.rate > 0.0) {
            return Err(ConfigError {
                field: "ADMISSION_RATE".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.admission.burst == 0 {
            return Err(ConfigError {
                field: "ADMISSION_BURST".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.pool_max_size == 0 {
            return Err(ConfigError {
                field: "POOL_MAX_SIZE".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Parse an environment variable or return a default value.
fn parse_env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(val) => val.parse().map_err(|_| ConfigError {
            field: name.to_string(),
            message: format!("Invalid value '{}', expected a valid number", val),
        }),
        Err(_) => Ok(default),
    }
}
