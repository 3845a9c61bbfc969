//! Transform stage.
//!
//! - Classify: HDI tier, income bracket, dominant energy, CO2 filter
//! - Dimension: deduplicate natural keys and assign surrogate keys
//! - Fact: join the classified sources and resolve foreign keys
//! - Health: vaccination and mortality star schema
//! - Pipeline: extract, transform, validate, load

pub mod classify;
pub mod dimension;
pub mod fact;
pub mod health;
pub mod pipeline;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::logs::{log_success, log_warning_indent};

pub use classify::{dominant_energy, Brackets, CO2_MIN_YEAR};
pub use dimension::{build_dimensions, Dimension, Dimensions, SurrogateKey};
pub use fact::{assemble_facts, Classified, FactRow};
pub use pipeline::*;

/// Rows silently excluded for data-quality reasons, by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    counts: BTreeMap<&'static str, usize>,
}

impl DropCounts {
    pub fn add(&mut self, reason: &'static str, n: usize) {
        if n > 0 {
            *self.counts.entry(reason).or_default() += n;
        }
    }

    pub fn get(&self, reason: &str) -> usize {
        self.counts.get(reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.counts.iter().map(|(r, n)| (*r, *n))
    }

    pub fn log(&self) {
        if self.counts.is_empty() {
            log_success("No rows dropped");
            return;
        }
        for (reason, n) in self.iter() {
            log_warning_indent(format!("{} rows dropped ({})", n, reason), 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_counts_accumulate() {
        let mut drops = DropCounts::default();
        drops.add("hdi: missing value", 2);
        drops.add("hdi: missing value", 3);
        drops.add("co2: before 1990", 0);

        assert_eq!(drops.get("hdi: missing value"), 5);
        assert_eq!(drops.get("co2: before 1990"), 0);
        assert_eq!(drops.total(), 5);
        assert_eq!(drops.iter().count(), 1);
    }
}
