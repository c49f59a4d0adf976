use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metrics collected during extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserMetrics {
    /// Total units attempted to parse, followed includes included
    pub units_attempted: usize,

    /// Units successfully parsed
    pub units_succeeded: usize,

    /// Units that failed parsing
    pub units_failed: usize,

    /// Total time spent parsing and building
    #[serde(with = "duration_serde")]
    pub total_parse_time: Duration,

    /// Entities created by the builder, before merging
    pub total_entities: usize,

    /// Entities in the merged model
    pub merged_entities: usize,

    pub merge_conflicts: usize,

    pub comment_warnings: usize,
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

impl Default for ParserMetrics {
    fn default() -> Self {
        Self {
            units_attempted: 0,
            units_succeeded: 0,
            units_failed: 0,
            total_parse_time: Duration::ZERO,
            total_entities: 0,
            merged_entities: 0,
            merge_conflicts: 0,
            comment_warnings: 0,
        }
    }
}

impl ParserMetrics {
    /// Success rate (0.0 to 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.units_attempted == 0 {
            0.0
        } else {
            self.units_succeeded as f64 / self.units_attempted as f64
        }
    }

    /// Average parse time per unit
    pub fn avg_parse_time(&self) -> Duration {
        if self.units_succeeded == 0 {
            Duration::ZERO
        } else {
            self.total_parse_time / self.units_succeeded as u32
        }
    }

    /// Average entities per unit
    pub fn avg_entities_per_unit(&self) -> f64 {
        if self.units_succeeded == 0 {
            0.0
        } else {
            self.total_entities as f64 / self.units_succeeded as f64
        }
    }

    /// Merge another metrics object into this one
    pub fn merge(&mut self, other: &ParserMetrics) {
        self.units_attempted += other.units_attempted;
        self.units_succeeded += other.units_succeeded;
        self.units_failed += other.units_failed;
        self.total_parse_time += other.total_parse_time;
        self.total_entities += other.total_entities;
        self.merged_entities += other.merged_entities;
        self.merge_conflicts += other.merge_conflicts;
        self.comment_warnings += other.comment_warnings;
    }
}
