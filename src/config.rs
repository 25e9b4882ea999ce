//! Configuration types for metric builders and buffer pools.
//!
//! Configuration sources are merged with figment, in order (later sources
//! override earlier):
//! 1. Default values
//! 2. Config files (in order added)
//! 3. Environment variables
//! 4. Programmatic overrides
//! 5. CLI arguments (via [`ConfigLoader::with_cli_args`])

use std::path::Path;

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pool::BufferPool;

/// Default maximum metric name length in bytes.
pub const DEFAULT_MAX_NAME_LEN: usize = 256;
/// Default maximum label name length in bytes.
pub const DEFAULT_MAX_LABEL_NAME_LEN: usize = 128;
/// Default maximum label value length in bytes.
pub const DEFAULT_MAX_LABEL_VALUE_LEN: usize = 1024;

/// Default number of idle buffers a pool keeps around.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;
/// Initial capacity of a freshly allocated buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64;
/// Buffers that grew beyond this are dropped on release instead of pooled.
pub const DEFAULT_MAX_RETAINED_CAPACITY: usize = 64 * 1024;

/// Length limits applied while building a metric.
///
/// A limit of zero means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Limits {
    /// Maximum metric name length in bytes (default: 256)
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,

    /// Maximum label name length in bytes (default: 128)
    #[serde(default = "default_max_label_name_len")]
    pub max_label_name_len: usize,

    /// Maximum label value length in bytes (default: 1024)
    #[serde(default = "default_max_label_value_len")]
    pub max_label_value_len: usize,
}

fn default_max_name_len() -> usize {
    DEFAULT_MAX_NAME_LEN
}

fn default_max_label_name_len() -> usize {
    DEFAULT_MAX_LABEL_NAME_LEN
}

fn default_max_label_value_len() -> usize {
    DEFAULT_MAX_LABEL_VALUE_LEN
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_name_len: DEFAULT_MAX_NAME_LEN,
            max_label_name_len: DEFAULT_MAX_LABEL_NAME_LEN,
            max_label_value_len: DEFAULT_MAX_LABEL_VALUE_LEN,
        }
    }
}

impl Limits {
    /// Limits with every check disabled.
    pub const fn unlimited() -> Self {
        Self {
            max_name_len: 0,
            max_label_name_len: 0,
            max_label_value_len: 0,
        }
    }

    /// Returns `true` if `len` is over `max`. A zero `max` never trips.
    #[inline]
    pub(crate) fn exceeds(max: usize, len: usize) -> bool {
        max > 0 && len > max
    }
}

/// Configuration for a [`BufferPool`] and the builders it hands out.
///
/// This struct can be deserialized from TOML, YAML, JSON, or environment variables
/// using figment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuilderConfig {
    /// Length limits given to every builder acquired from the pool
    #[serde(default)]
    pub limits: Limits,

    /// Maximum number of idle buffers kept by the pool (default: 1024)
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// Capacity of newly allocated buffers (default: 64)
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Largest buffer capacity the pool will retain (default: 64 KiB)
    #[serde(default = "default_max_retained_capacity")]
    pub max_retained_capacity: usize,

    /// Prefix of the pool's own prometheus metrics (default: "metric_builder")
    #[serde(default = "default_metrics_prefix")]
    pub metrics_prefix: String,
}

fn default_pool_capacity() -> usize {
    DEFAULT_POOL_CAPACITY
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_max_retained_capacity() -> usize {
    DEFAULT_MAX_RETAINED_CAPACITY
}

fn default_metrics_prefix() -> String {
    "metric_builder".to_string()
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            pool_capacity: default_pool_capacity(),
            buffer_capacity: default_buffer_capacity(),
            max_retained_capacity: default_max_retained_capacity(),
            metrics_prefix: default_metrics_prefix(),
        }
    }
}

impl BuilderConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the effective capacity of a new buffer.
    ///
    /// A zero `buffer_capacity` would hand out zero-capacity buffers, which the
    /// pool treats as absent, so it falls back to the default.
    pub fn effective_buffer_capacity(&self) -> usize {
        if self.buffer_capacity == 0 {
            DEFAULT_BUFFER_CAPACITY
        } else {
            self.buffer_capacity
        }
    }
}

/// Layered loader for [`BuilderConfig`].
///
/// # Examples
///
/// ```ignore
/// use metric_builder::ConfigLoader;
///
/// let pool = ConfigLoader::new()
///     .file("metrics.toml")
///     .env_prefix("METRIC")
///     .max_label_value_len(256)
///     .build_pool()?;
/// ```
pub struct ConfigLoader {
    figment: Figment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("figment", &self.figment)
            .finish()
    }
}

impl ConfigLoader {
    /// Create a new loader seeded with default configuration.
    pub fn new() -> Self {
        Self {
            figment: Figment::from(Serialized::defaults(BuilderConfig::default())),
        }
    }

    /// Add a configuration file.
    ///
    /// Supports TOML, YAML, and JSON formats (detected by extension).
    /// Files are merged in the order they are added.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        self.figment = match extension.to_lowercase().as_str() {
            "yaml" | "yml" => self.figment.merge(Yaml::file(path)),
            "json" => self.figment.merge(Json::file(path)),
            // Default to TOML
            _ => self.figment.merge(Toml::file(path)),
        };
        self
    }

    /// Add environment variables with a prefix.
    ///
    /// Variables are expected as `{PREFIX}_{KEY}`, with `__` separating nested
    /// keys, e.g. `METRIC_POOL_CAPACITY` or `METRIC_LIMITS__MAX_NAME_LEN`.
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.figment = self
            .figment
            .merge(Env::prefixed(&format!("{prefix}_")).split("__"));
        self
    }

    /// Set the maximum metric name length in bytes (0 = unlimited).
    pub fn max_name_len(mut self, len: usize) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("limits.max_name_len", len));
        self
    }

    /// Set the maximum label name length in bytes (0 = unlimited).
    pub fn max_label_name_len(mut self, len: usize) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("limits.max_label_name_len", len));
        self
    }

    /// Set the maximum label value length in bytes (0 = unlimited).
    pub fn max_label_value_len(mut self, len: usize) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("limits.max_label_value_len", len));
        self
    }

    /// Set how many idle buffers the pool keeps.
    ///
    /// Buffers released while the pool is full are dropped, so an undersized
    /// pool still works, it just allocates more.
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("pool_capacity", capacity));
        self
    }

    /// Set the capacity of newly allocated buffers.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("buffer_capacity", capacity));
        self
    }

    /// Set the largest buffer capacity the pool retains on release.
    pub fn max_retained_capacity(mut self, capacity: usize) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("max_retained_capacity", capacity));
        self
    }

    /// Set the prefix of the pool's own prometheus metrics.
    pub fn metrics_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("metrics_prefix", prefix.into()));
        self
    }

    /// Apply CLI argument overrides.
    ///
    /// Only the values present in `args` are applied.
    pub fn with_cli_args(mut self, args: &MetricArgs) -> Self {
        if let Some(len) = args.metric_max_name_len {
            self = self.max_name_len(len);
        }
        if let Some(len) = args.metric_max_label_name_len {
            self = self.max_label_name_len(len);
        }
        if let Some(len) = args.metric_max_label_value_len {
            self = self.max_label_value_len(len);
        }
        if let Some(capacity) = args.metric_pool_capacity {
            self = self.pool_capacity(capacity);
        }
        if let Some(capacity) = args.metric_buffer_capacity {
            self = self.buffer_capacity(capacity);
        }
        self
    }

    /// Extract the merged configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::Config`](crate::MetricError::Config) if a source
    /// can't be read or a value has the wrong type.
    pub fn load(&self) -> Result<BuilderConfig> {
        let config: BuilderConfig = self.figment.extract().map_err(Box::new)?;
        Ok(config)
    }

    /// Extract the configuration and build a pool from it.
    pub fn build_pool(&self) -> Result<BufferPool> {
        Ok(BufferPool::from_config(&self.load()?))
    }
}

/// CLI arguments for metric builder configuration.
///
/// Use with clap's `Parser` derive macro and apply them with
/// [`ConfigLoader::with_cli_args`].
///
/// # Examples
///
/// ```ignore
/// use clap::Parser;
/// use metric_builder::{ConfigLoader, MetricArgs};
///
/// #[derive(Parser)]
/// struct MyArgs {
///     #[command(flatten)]
///     metric: MetricArgs,
/// }
///
/// let args = MyArgs::parse();
/// let pool = ConfigLoader::new().with_cli_args(&args.metric).build_pool()?;
/// ```
#[derive(Debug, Default, Clone, clap::Args)]
pub struct MetricArgs {
    /// Maximum metric name length in bytes (0 = unlimited)
    #[arg(long)]
    pub metric_max_name_len: Option<usize>,

    /// Maximum label name length in bytes (0 = unlimited)
    #[arg(long)]
    pub metric_max_label_name_len: Option<usize>,

    /// Maximum label value length in bytes (0 = unlimited)
    #[arg(long)]
    pub metric_max_label_value_len: Option<usize>,

    /// Number of idle buffers kept by the pool
    #[arg(long)]
    pub metric_pool_capacity: Option<usize>,

    /// Capacity of newly allocated buffers
    #[arg(long)]
    pub metric_buffer_capacity: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BuilderConfig::default();
        assert_eq!(config.limits.max_name_len, 256);
        assert_eq!(config.limits.max_label_name_len, 128);
        assert_eq!(config.limits.max_label_value_len, 1024);
        assert_eq!(config.pool_capacity, 1024);
        assert_eq!(config.buffer_capacity, 64);
        assert_eq!(config.metrics_prefix, "metric_builder");
    }

    #[test]
    fn test_limits_exceeds() {
        assert!(!Limits::exceeds(0, 10_000));
        assert!(!Limits::exceeds(4, 4));
        assert!(Limits::exceeds(4, 5));
    }

    #[test]
    fn test_effective_buffer_capacity() {
        let mut config = BuilderConfig::default();
        assert_eq!(config.effective_buffer_capacity(), 64);

        config.buffer_capacity = 0;
        assert_eq!(config.effective_buffer_capacity(), 64);

        config.buffer_capacity = 512;
        assert_eq!(config.effective_buffer_capacity(), 512);
    }

    #[test]
    fn test_deserialize_config() {
        let toml = r#"
            pool_capacity = 16
            buffer_capacity = 128
            metrics_prefix = "myapp"

            [limits]
            max_name_len = 64
            max_label_value_len = 0
        "#;

        let config: BuilderConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.pool_capacity, 16);
        assert_eq!(config.buffer_capacity, 128);
        assert_eq!(config.metrics_prefix, "myapp");
        assert_eq!(config.limits.max_name_len, 64);
        // Missing fields keep their defaults
        assert_eq!(config.limits.max_label_name_len, 128);
        assert_eq!(config.limits.max_label_value_len, 0);
        assert_eq!(config.max_retained_capacity, DEFAULT_MAX_RETAINED_CAPACITY);
    }

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, BuilderConfig::default());
    }

    #[test]
    fn test_loader_programmatic_override() {
        let config = ConfigLoader::new()
            .max_name_len(32)
            .max_label_name_len(16)
            .max_label_value_len(8)
            .pool_capacity(4)
            .metrics_prefix("myapp")
            .load()
            .unwrap();

        assert_eq!(config.limits.max_name_len, 32);
        assert_eq!(config.limits.max_label_name_len, 16);
        assert_eq!(config.limits.max_label_value_len, 8);
        assert_eq!(config.pool_capacity, 4);
        assert_eq!(config.metrics_prefix, "myapp");
    }

    #[test]
    fn test_loader_cli_args() {
        let args = MetricArgs {
            metric_max_name_len: Some(100),
            metric_max_label_name_len: None,
            metric_max_label_value_len: Some(0),
            metric_pool_capacity: Some(8),
            metric_buffer_capacity: None,
        };

        let config = ConfigLoader::new()
            .max_name_len(10)
            .buffer_capacity(256)
            .with_cli_args(&args)
            .load()
            .unwrap();

        // CLI args override programmatic values
        assert_eq!(config.limits.max_name_len, 100);
        assert_eq!(config.limits.max_label_value_len, 0);
        assert_eq!(config.pool_capacity, 8);
        // Untouched by CLI
        assert_eq!(config.limits.max_label_name_len, 128);
        assert_eq!(config.buffer_capacity, 256);
    }

    #[test]
    fn test_loader_file_then_env_then_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "metrics.toml",
                r#"
                    pool_capacity = 7

                    [limits]
                    max_name_len = 20
                    max_label_value_len = 9
                "#,
            )?;
            jail.set_env("MBTEST_POOL_CAPACITY", 3);
            jail.set_env("MBTEST_LIMITS__MAX_NAME_LEN", 5);

            let config = ConfigLoader::new()
                .file("metrics.toml")
                .env_prefix("MBTEST")
                .load()
                .map_err(|e| e.to_string())?;
            // Env wins over the file
            assert_eq!(config.pool_capacity, 3);
            assert_eq!(config.limits.max_name_len, 5);
            // File wins over defaults
            assert_eq!(config.limits.max_label_value_len, 9);
            assert_eq!(config.limits.max_label_name_len, 128);

            let config = ConfigLoader::new()
                .file("metrics.toml")
                .env_prefix("MBTEST")
                .max_name_len(40)
                .load()
                .map_err(|e| e.to_string())?;
            // Programmatic override wins over env
            assert_eq!(config.limits.max_name_len, 40);
            assert_eq!(config.pool_capacity, 3);
            Ok(())
        });
    }

    #[test]
    fn test_loader_yaml_and_json_files() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "metrics.yaml",
                "pool_capacity: 7\nlimits:\n  max_label_value_len: 9\n",
            )?;
            jail.create_file(
                "metrics.json",
                r#"{ "buffer_capacity": 128, "limits": { "max_label_value_len": 11 } }"#,
            )?;

            let config = ConfigLoader::new()
                .file("metrics.yaml")
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.pool_capacity, 7);
            assert_eq!(config.limits.max_label_value_len, 9);

            // Later files override earlier ones
            let config = ConfigLoader::new()
                .file("metrics.yaml")
                .file("metrics.json")
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.pool_capacity, 7);
            assert_eq!(config.buffer_capacity, 128);
            assert_eq!(config.limits.max_label_value_len, 11);
            Ok(())
        });
    }

    #[test]
    fn test_loader_env_type_error() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MBTEST_POOL_CAPACITY", "lots");
            let err = ConfigLoader::new().env_prefix("MBTEST").load().unwrap_err();
            assert!(matches!(err, crate::MetricError::Config(_)));
            Ok(())
        });
    }

    #[test]
    fn test_loader_missing_file_is_ignored() {
        let config = ConfigLoader::new()
            .file("does-not-exist.toml")
            .load()
            .unwrap();
        assert_eq!(config, BuilderConfig::default());
    }
}
