use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// C++ language standard presented to the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LanguageStandard {
    Cxx98,
    Cxx11,
    Cxx14,
    #[default]
    Cxx17,
    Cxx20,
    Cxx23,
}

impl LanguageStandard {
    /// Value of the predefined `__cplusplus` macro
    pub fn cplusplus_value(&self) -> i64 {
        match self {
            LanguageStandard::Cxx98 => 199711,
            LanguageStandard::Cxx11 => 201103,
            LanguageStandard::Cxx14 => 201402,
            LanguageStandard::Cxx17 => 201703,
            LanguageStandard::Cxx20 => 202002,
            LanguageStandard::Cxx23 => 202302,
        }
    }
}

/// Which `#include` directives are followed and ingested as additional units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IncludePolicy {
    /// Only the listed units are ingested
    #[default]
    None,
    /// Quoted includes, resolved against the including file's directory and the include paths
    Local,
    /// Quoted and angled includes
    All,
}

/// Compiler configuration shared by every unit of a run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompilerConfig {
    pub include_paths: Vec<PathBuf>,

    /// Preprocessor defines; `None` means defined without a value
    pub defines: BTreeMap<String, Option<String>>,

    pub standard: LanguageStandard,
}

impl CompilerConfig {
    pub fn with_include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    pub fn with_define(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.defines.insert(name.into(), value.map(str::to_string));
        self
    }

    pub fn with_standard(mut self, standard: LanguageStandard) -> Self {
        self.standard = standard;
        self
    }

    /// Layer per-unit flags over this configuration
    pub fn layered(&self, flags: &CompileFlags) -> CompilerConfig {
        let mut merged = self.clone();
        merged
            .include_paths
            .extend(flags.include_paths.iter().cloned());
        for (name, value) in &flags.defines {
            merged.defines.insert(name.clone(), value.clone());
        }
        for name in &flags.undefines {
            merged.defines.remove(name);
        }
        merged
    }
}

/// Per-unit include/define configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompileFlags {
    pub include_paths: Vec<PathBuf>,
    pub defines: BTreeMap<String, Option<String>>,
    pub undefines: Vec<String>,
}

/// One translation unit to ingest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub path: PathBuf,

    /// In-memory contents used instead of reading `path`
    pub contents: Option<String>,

    pub flags: CompileFlags,
}

impl TranslationUnit {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            contents: None,
            flags: CompileFlags::default(),
        }
    }

    pub fn in_memory(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: Some(contents.into()),
            flags: CompileFlags::default(),
        }
    }

    pub fn with_define(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.flags
            .defines
            .insert(name.into(), value.map(str::to_string));
        self
    }

    pub fn with_include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.flags.include_paths.push(path.into());
        self
    }
}

/// Configuration for extractor behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    pub compiler: CompilerConfig,

    /// Abort the whole run on the first unit that fails to parse
    pub strict: bool,

    /// Keep extracting from trees that contain syntax errors, reporting
    /// each error as a diagnostic instead of failing the unit
    pub tolerant: bool,

    pub follow_includes: IncludePolicy,

    /// Maximum file size to parse (in bytes)
    /// Files larger than this fail with `FileTooLarge`
    pub max_file_size: usize,

    /// Timeout per unit (None = no timeout)
    #[serde(with = "duration_option")]
    pub timeout_per_file: Option<Duration>,

    /// Parse units on a worker pool
    pub parallel: bool,

    /// Number of parallel workers (None = rayon default)
    pub parallel_workers: Option<usize>,

    /// Associate and parse documentation comments
    pub include_docs: bool,

    /// Only `///`, `//!`, `/**` and `/*!` comments are candidates for documentation
    pub doc_comments_only: bool,

    /// Do not emit private members
    pub skip_private: bool,
}

// Helper module for serializing Duration
mod duration_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => d.as_secs().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            compiler: CompilerConfig::default(),
            strict: false,
            tolerant: false,
            follow_includes: IncludePolicy::None,
            max_file_size: 10 * 1024 * 1024, // 10 MB
            timeout_per_file: Some(Duration::from_secs(30)),
            parallel: true,
            parallel_workers: None,
            include_docs: true,
            doc_comments_only: false,
            skip_private: false,
        }
    }
}

impl ParserConfig {
    /// Create config for fast extraction (no documentation)
    pub fn fast() -> Self {
        Self {
            include_docs: false,
            ..Default::default()
        }
    }

    /// Create config where any unit failure aborts the run
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }

    pub fn with_compiler(mut self, compiler: CompilerConfig) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_tolerant(mut self, tolerant: bool) -> Self {
        self.tolerant = tolerant;
        self
    }

    pub fn with_follow_includes(mut self, policy: IncludePolicy) -> Self {
        self.follow_includes = policy;
        self
    }

    /// Enable parallel parsing
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set maximum file size
    pub fn with_max_file_size(mut self, size: usize) -> Self {
        self.max_file_size = size;
        self
    }
}
