//! Dashboard configuration.
//!
//! The built-in defaults live in `config/default.toml` and are embedded at
//! compile time. User files are merged key-by-key over the defaults, so an
//! override file only lists what it changes.

use std::ops::RangeInclusive;
use std::path::Path;

use density_map_cluster::PartitionConfig;
use density_map_cluster_models::{DensityThresholds, LinkageMethod};
use density_map_dataset::TableSchema;
use density_map_features::FeatureRequest;
use density_map_geojoin::JoinMode;
use serde::{Deserialize, Serialize};

const DEFAULT_TOML: &str = include_str!("../config/default.toml");

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing failed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed.
    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Values parse but are inconsistent.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

/// Column and key names of the input files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSettings {
    /// Area key column of the population table.
    pub id_column: String,
    /// Centroid latitude column.
    pub latitude_column: String,
    /// Centroid longitude column.
    pub longitude_column: String,
    /// `GeoJSON` property holding the area key.
    pub geometry_key: String,
}

impl DatasetSettings {
    /// The table schema these settings describe.
    #[must_use]
    pub fn schema(&self) -> TableSchema {
        TableSchema {
            id_column: self.id_column.clone(),
            latitude_column: self.latitude_column.clone(),
            longitude_column: self.longitude_column.clone(),
        }
    }
}

/// k-means settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSettings {
    /// Seed for every k-means run.
    pub seed: u64,
    /// Lloyd iteration cap.
    pub max_iter: usize,
    /// Seeded k-means++ restarts per cluster count.
    pub n_init: usize,
    /// Cluster count selected initially.
    pub default_k: usize,
    /// Smallest k on the elbow and silhouette charts.
    pub k_min: usize,
    /// Largest k on the elbow and silhouette charts.
    pub k_max: usize,
    /// Density cutoffs for k-means runs.
    pub thresholds: DensityThresholds,
}

impl PartitionSettings {
    /// Chart range `k_min..=k_max`.
    #[must_use]
    pub const fn k_range(&self) -> RangeInclusive<usize> {
        self.k_min..=self.k_max
    }

    /// k-means parameters for `k` clusters seeded by `seed`.
    #[must_use]
    pub const fn kmeans(&self, k: usize, seed: u64) -> PartitionConfig {
        PartitionConfig::new(k, seed)
            .with_max_iter(self.max_iter)
            .with_n_init(self.n_init)
    }
}

/// Agglomerative clustering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalSettings {
    /// Linkage selected initially.
    pub linkage: LinkageMethod,
    /// Methods compared on the diagnostics charts.
    pub methods: Vec<LinkageMethod>,
    /// Cluster count selected initially.
    pub default_k: usize,
    /// Smallest k on the silhouette charts.
    pub k_min: usize,
    /// Largest k on the silhouette charts.
    pub k_max: usize,
    /// Density cutoffs for hierarchical runs.
    pub thresholds: DensityThresholds,
}

impl HierarchicalSettings {
    /// Chart range `k_min..=k_max`.
    #[must_use]
    pub const fn k_range(&self) -> RangeInclusive<usize> {
        self.k_min..=self.k_max
    }
}

/// Geometry join settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoJoinSettings {
    /// What to do with boundaries that have no data row.
    pub mode: JoinMode,
}

/// Run cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Maximum cached runs; `0` disables caching.
    pub capacity: usize,
}

/// Full dashboard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Input file layout.
    pub dataset: DatasetSettings,
    /// Feature selection.
    pub features: FeatureRequest,
    /// k-means settings.
    pub partition: PartitionSettings,
    /// Agglomerative settings.
    pub hierarchical: HierarchicalSettings,
    /// Join settings.
    pub geojoin: GeoJoinSettings,
    /// Cache settings.
    pub cache: CacheSettings,
}

impl Default for DashboardConfig {
    /// The embedded defaults.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML fails to parse. It is a compile-time
    /// constant, so a failure is a development error caught by the tests.
    fn default() -> Self {
        toml::from_str(DEFAULT_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded default config: {e}"))
    }
}

impl DashboardConfig {
    /// Parses `overrides` and merges them over the embedded defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if either document fails to parse or the
    /// merged configuration is invalid.
    pub fn from_toml_str(overrides: &str) -> Result<Self, ConfigError> {
        let mut base: toml::Table = DEFAULT_TOML.parse()?;
        let overrides: toml::Table = overrides.parse()?;
        merge_tables(&mut base, overrides);

        let config: Self = toml::Value::Table(base).try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Reads an override file and merges it over the embedded defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let body = std::fs::read_to_string(path)?;
        log::info!("Loading dashboard configuration from {}", path.display());
        Self::from_toml_str(&body)
    }

    /// Serializes the configuration back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        if self.features.years.is_empty() && !self.features.include_coordinates {
            return invalid("features select no columns".to_string());
        }
        let p = &self.partition;
        if p.k_min == 0 || p.k_min > p.k_max {
            return invalid(format!("partition k range {}..={} is empty", p.k_min, p.k_max));
        }
        if p.default_k < 2 {
            return invalid(format!("partition default_k must be >= 2, got {}", p.default_k));
        }
        if p.max_iter == 0 {
            return invalid("partition max_iter must be positive".to_string());
        }
        if p.n_init == 0 {
            return invalid("partition n_init must be positive".to_string());
        }
        let h = &self.hierarchical;
        if h.k_min < 2 || h.k_min > h.k_max {
            return invalid(format!(
                "hierarchical k range {}..={} must start at 2 or more",
                h.k_min, h.k_max
            ));
        }
        if h.default_k == 0 {
            return invalid("hierarchical default_k must be positive".to_string());
        }
        if h.methods.is_empty() {
            return invalid("hierarchical methods list is empty".to_string());
        }
        Ok(())
    }
}

/// Recursively overlays `overrides` onto `base`; non-table values replace.
fn merge_tables(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
