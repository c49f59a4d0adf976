use crate::{
    config::{ParserConfig, TranslationUnit},
    errors::{ExtractError, ParserError},
    metrics::ParserMetrics,
    model::CodeModel,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Information about a successfully parsed unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSummary {
    /// Path to the source file
    pub file_path: PathBuf,

    /// Position in the run's deterministic unit order
    pub unit_index: usize,

    /// Ingested because another unit included it
    pub included: bool,

    /// Entities built from this unit before merging
    pub entity_count: usize,

    /// Time taken to parse and build this unit
    #[serde(with = "duration_serde")]
    pub parse_time: Duration,

    /// Number of lines in the file
    pub line_count: usize,

    /// File size in bytes
    pub byte_count: usize,
}

// Helper module for serializing Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: u64 = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Result of an extraction run: the model plus per-unit outcomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub model: CodeModel,

    /// Information about each successfully parsed unit
    pub units: Vec<UnitSummary>,

    /// Units that failed to parse (path, error message)
    pub failed_units: Vec<(PathBuf, String)>,

    pub metrics: ParserMetrics,
}

impl Extraction {
    /// Total number of units processed (success + failure)
    pub fn total_units(&self) -> usize {
        self.units.len() + self.failed_units.len()
    }

    /// Success rate (0.0 to 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_units() == 0 {
            0.0
        } else {
            self.units.len() as f64 / self.total_units() as f64
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed_units.is_empty() && self.model.diagnostics().is_empty()
    }
}

/// Core trait of a C++ model extractor
///
/// Implementations turn a set of translation units into one merged
/// [`CodeModel`]. Per-unit failures are reported in
/// [`Extraction::failed_units`]; only strict mode turns them into an
/// [`ExtractError`].
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to support parallel parsing.
pub trait ModelExtractor: Send + Sync {
    /// Returns supported file extensions (e.g., [".cpp", ".h"])
    fn file_extensions(&self) -> &[&str];

    /// Extract and merge a list of translation units
    ///
    /// **Note on Metrics**: This method updates extractor metrics. Use
    /// `metrics()` to retrieve statistics afterwards.
    fn extract_units(&self, units: &[TranslationUnit]) -> Result<Extraction, ExtractError>;

    /// Extract a single in-memory source
    ///
    /// `file_path` is the logical path used for locations and for resolving
    /// quoted includes.
    fn extract_source(&self, source: &str, file_path: &Path) -> Result<Extraction, ExtractError> {
        self.extract_units(&[TranslationUnit::in_memory(file_path, source)])
    }

    /// Extract files from disk, each with the shared compiler configuration
    fn extract_files(&self, paths: &[PathBuf]) -> Result<Extraction, ExtractError> {
        let units: Vec<TranslationUnit> = paths
            .iter()
            .map(|p| TranslationUnit::new(p.clone()))
            .collect();
        self.extract_units(&units)
    }

    /// Extract every matching file below a directory
    fn extract_directory(&self, dir: &Path) -> Result<Extraction, ExtractError> {
        let paths = self.discover_files(dir)?;
        self.extract_files(&paths)
    }

    /// Discover parseable files in a directory
    ///
    /// Default implementation walks the directory, filters by extension and
    /// sorts the result so unit order does not depend on the file system.
    fn discover_files(&self, dir: &Path) -> Result<Vec<PathBuf>, ParserError> {
        use std::fs;

        let mut files = Vec::new();
        let extensions = self.file_extensions();

        fn walk_dir(
            dir: &Path,
            extensions: &[&str],
            files: &mut Vec<PathBuf>,
        ) -> Result<(), ParserError> {
            if !dir.is_dir() {
                return Ok(());
            }

            for entry in
                fs::read_dir(dir).map_err(|e| ParserError::IoError(dir.to_path_buf(), e))?
            {
                let entry = entry.map_err(|e| ParserError::IoError(dir.to_path_buf(), e))?;
                let path = entry.path();

                if path.is_dir() {
                    walk_dir(&path, extensions, files)?;
                } else if let Some(ext) = path.extension() {
                    let ext_str = format!(".{}", ext.to_string_lossy().to_ascii_lowercase());
                    if extensions.contains(&ext_str.as_str()) {
                        files.push(path);
                    }
                }
            }

            Ok(())
        }

        walk_dir(dir, extensions, &mut files)?;
        files.sort();
        Ok(files)
    }

    /// Check if this extractor can handle the given file
    ///
    /// Default implementation checks file extension.
    fn can_parse(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_str = format!(".{}", ext.to_string_lossy().to_ascii_lowercase());
            self.file_extensions().contains(&ext_str.as_str())
        } else {
            false
        }
    }

    /// Get extractor configuration
    fn config(&self) -> &ParserConfig;

    /// Get accumulated metrics
    fn metrics(&self) -> ParserMetrics;

    /// Reset metrics
    ///
    /// Clears accumulated metrics. Useful for benchmarking.
    fn reset_metrics(&mut self);
}
