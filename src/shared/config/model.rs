use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub merge: MergeConfig,
    pub memory: MemoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Files smaller than this carry no usable data
    pub min_file_bytes: u64,
    /// Inputs above this size get the smaller chunk size and a reclaim pass afterwards
    pub large_file_bytes: u64,
    pub chunk_size: usize,
    pub large_file_chunk_size: usize,
    /// Record writer flushes and asks for a memory check every N records
    pub flush_every_records: usize,
    /// Records kept (first N) from a dataset that has to be capped
    pub record_cap: usize,
    /// Estimated in-memory size of a parsed input relative to its size on disk
    pub expansion_factor: f64,
    /// Share of available system memory one batch may use
    pub memory_budget_fraction: f64,
    pub max_files_per_batch: usize,
    pub output_prefix: String,
    pub resume: bool,
    /// Capacity the read scratch buffer may keep between files
    pub scratch_retain_bytes: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            min_file_bytes: 100,
            large_file_bytes: 50 * 1024 * 1024,
            chunk_size: 100,
            large_file_chunk_size: 25,
            flush_every_records: 200,
            record_cap: 2000,
            expansion_factor: 2.5,
            memory_budget_fraction: 0.20,
            max_files_per_batch: 100,
            output_prefix: "merged_spectra".to_string(),
            resume: true,
            scratch_retain_bytes: 8 * 1024 * 1024,
        }
    }
}

impl MergeConfig {
    pub fn chunk_size_for(&self, file_bytes: u64) -> usize {
        if self.is_large(file_bytes) {
            self.large_file_chunk_size.max(1)
        } else {
            self.chunk_size.max(1)
        }
    }

    pub fn is_large(&self, file_bytes: u64) -> bool {
        file_bytes > self.large_file_bytes
    }
}

/// Pressure thresholds. Percentages are of total system memory in use.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub moderate_system_percent: f64,
    pub high_system_percent: f64,
    pub critical_system_percent: f64,
    pub moderate_growth_mb: u64,
    pub high_growth_mb: u64,
    pub high_process_rss_mb: u64,
    pub critical_available_mb: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            moderate_system_percent: 60.0,
            high_system_percent: 75.0,
            critical_system_percent: 85.0,
            moderate_growth_mb: 300,
            high_growth_mb: 500,
            high_process_rss_mb: 800,
            critical_available_mb: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: String,
    pub stdout_level: String,
    pub file_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            stdout_level: "info".to_string(),
            file_level: "debug".to_string(),
        }
    }
}

use std::env;

pub fn load_settings() -> Result<Settings, config::ConfigError> {
    let config_path = env::var("SPECTRA_MERGE_CONFIG").unwrap_or_else(|_| "config".to_string());
    load_settings_from(&config_path)
}

pub fn load_settings_from(config_path: &str) -> Result<Settings, config::ConfigError> {
    let settings: Settings = config::Config::builder()
        .add_source(config::File::with_name(config_path).required(false))
        .add_source(
            config::Environment::with_prefix("SPECTRA_MERGE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    Ok(settings)
}
