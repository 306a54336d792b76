//! Dashboard session state: the loaded dataset, the configuration, cached
//! run results, and the result currently on screen.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use density_map_cluster_models::LinkageMethod;
use density_map_dataset::Dataset;

use crate::{
    Algorithm, Cut, DashboardConfig, Diagnostics, PipelineError, RunParams, RunResult, Stage,
    StageResultExt as _, run,
};

/// Cache key of a run. Floats are compared by bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunKey {
    dataset_version: u64,
    year: i32,
    algorithm: AlgorithmKey,
    thresholds: (u64, u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AlgorithmKey {
    Partition {
        k: usize,
        seed: u64,
        max_iter: usize,
        n_init: usize,
    },
    Hierarchical {
        linkage: LinkageMethod,
        cut: CutKey,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CutKey {
    Clusters(usize),
    Distance(u64),
}

impl RunKey {
    /// Key of `params` run against `dataset_version` under `config`.
    #[must_use]
    pub const fn new(dataset_version: u64, config: &DashboardConfig, params: &RunParams) -> Self {
        let algorithm = match params.algorithm {
            Algorithm::Partition { k, seed } => AlgorithmKey::Partition {
                k,
                seed,
                max_iter: config.partition.max_iter,
                n_init: config.partition.n_init,
            },
            Algorithm::Hierarchical { linkage, cut } => AlgorithmKey::Hierarchical {
                linkage,
                cut: match cut {
                    Cut::Clusters(k) => CutKey::Clusters(k),
                    Cut::Distance(t) => CutKey::Distance(t.to_bits()),
                },
            },
        };
        Self {
            dataset_version,
            year: params.year,
            algorithm,
            thresholds: params.thresholds.key_bits(),
        }
    }
}

/// One user's dashboard state.
///
/// Results are shared as [`Arc`]s and never mutated; a new selection either
/// hits the cache or runs the pipeline. The displayed result is only
/// replaced when a run succeeds.
pub struct Session {
    dataset: Arc<Dataset>,
    config: DashboardConfig,
    cache: VecDeque<(RunKey, Arc<RunResult>)>,
    current: Option<Arc<RunResult>>,
    diagnostics: Option<(u64, Arc<Diagnostics>)>,
}

impl Session {
    /// Starts a session over an already loaded dataset.
    #[must_use]
    pub fn new(dataset: Dataset, config: DashboardConfig) -> Self {
        Self {
            dataset: Arc::new(dataset),
            config,
            cache: VecDeque::new(),
            current: None,
            diagnostics: None,
        }
    }

    /// Loads the dataset named by `config` and starts a session over it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] at [`Stage::Load`] if either file fails to
    /// load.
    pub fn open(
        table_path: &Path,
        geometry_path: &Path,
        config: DashboardConfig,
    ) -> Result<Self, PipelineError> {
        let dataset = Dataset::from_files(
            table_path,
            geometry_path,
            &config.dataset.schema(),
            &config.dataset.geometry_key,
        )
        .at(Stage::Load)?;
        Ok(Self::new(dataset, config))
    }

    /// The loaded dataset.
    #[must_use]
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// The result currently displayed.
    #[must_use]
    pub fn current(&self) -> Option<&Arc<RunResult>> {
        self.current.as_ref()
    }

    /// Number of cached results.
    #[must_use]
    pub fn cached_runs(&self) -> usize {
        self.cache.len()
    }

    /// Applies a selection and makes its result current.
    ///
    /// # Errors
    ///
    /// Returns the [`PipelineError`] of a failed run; the current result is
    /// left as it was.
    pub fn select(&mut self, params: RunParams) -> Result<Arc<RunResult>, PipelineError> {
        let key = RunKey::new(self.dataset.version(), &self.config, &params);

        let result = if let Some(hit) = self.take_cached(&key) {
            log::debug!("Run cache hit for {key:?}");
            hit
        } else {
            let result = Arc::new(run(&self.dataset, &self.config, &params)?);
            self.insert(key, Arc::clone(&result));
            result
        };

        self.current = Some(Arc::clone(&result));
        Ok(result)
    }

    /// Model-selection charts for the current dataset, computed on first use.
    ///
    /// # Errors
    ///
    /// Returns the [`PipelineError`] of a failed computation.
    pub fn diagnostics(&mut self) -> Result<Arc<Diagnostics>, PipelineError> {
        let version = self.dataset.version();
        if let Some((_, diagnostics)) = self.diagnostics.as_ref().filter(|(v, _)| *v == version) {
            return Ok(Arc::clone(diagnostics));
        }
        let diagnostics = Arc::new(Diagnostics::compute(&self.dataset, &self.config)?);
        self.diagnostics = Some((version, Arc::clone(&diagnostics)));
        Ok(diagnostics)
    }

    /// Swaps in a new dataset, dropping every cached and displayed result.
    pub fn replace_dataset(&mut self, dataset: Dataset) {
        log::info!(
            "Replacing dataset (version {} -> {})",
            self.dataset.version(),
            dataset.version()
        );
        self.dataset = Arc::new(dataset);
        self.clear();
        self.current = None;
    }

    /// Swaps in a new configuration, dropping cached results. The displayed
    /// result stays until the next selection.
    pub fn set_config(&mut self, config: DashboardConfig) {
        self.config = config;
        self.clear();
    }

    fn clear(&mut self) {
        self.cache.clear();
        self.diagnostics = None;
    }

    /// Removes a hit and reinserts it as most recently used.
    fn take_cached(&mut self, key: &RunKey) -> Option<Arc<RunResult>> {
        let position = self.cache.iter().position(|(k, _)| k == key)?;
        let entry = self.cache.remove(position)?;
        let result = Arc::clone(&entry.1);
        self.cache.push_back(entry);
        Some(result)
    }

    fn insert(&mut self, key: RunKey, result: Arc<RunResult>) {
        let capacity = self.config.cache.capacity;
        if capacity == 0 {
            return;
        }
        while self.cache.len() >= capacity {
            self.cache.pop_front();
        }
        self.cache.push_back((key, result));
    }
}
