//! Classification rules: HDI tier, income bracket, dominant energy source,
//! and the CO2 year filter.
//!
//! The scalar rules ([`Brackets::classify`], [`dominant_energy`]) are pure
//! and total over well-formed input. The table-level functions read a
//! [`RawTable`], drop rows lacking the required measure and count each drop
//! in [`DropCounts`].

use std::collections::HashSet;

use crate::error::{ConfigError, ConfigResult, ExtractResult};
use crate::extract::sources::{field, CO2, ENERGY, GDP, HDI};
use crate::extract::RawTable;
use crate::models::{
    Co2Record, EnergyMix, EnergyRecord, EnergySource, HdiRecord, IncomeCategory, IncomeRecord,
    HdiTier, Label,
};

use super::DropCounts;

/// First year kept by [`filter_co2`].
pub const CO2_MIN_YEAR: i32 = 1990;

/// Share a group must strictly exceed to dominate the energy mix.
const MAJORITY: f64 = 0.5;

// =============================================================================
// Brackets
// =============================================================================

/// Labeled lower bounds partitioning `[0, inf)` into left-closed,
/// right-open intervals. Bounds are kept sorted ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct Brackets<L: Label> {
    bounds: Vec<(L, f64)>,
}

impl<L: Label> Brackets<L> {
    /// Build from an unordered `label -> lower bound` table.
    ///
    /// The lowest bound must be exactly 0, every bound finite and each
    /// label used once. Equal bounds are allowed; the label sorted last
    /// owns the interval.
    pub fn from_bounds(
        table: &'static str,
        pairs: impl IntoIterator<Item = (L, f64)>,
    ) -> ConfigResult<Self> {
        let invalid = |message: String| ConfigError::InvalidBrackets { table, message };

        let mut bounds: Vec<(L, f64)> = pairs.into_iter().collect();
        if bounds.is_empty() {
            return Err(invalid("no brackets".to_string()));
        }

        let mut seen = HashSet::new();
        for (label, bound) in &bounds {
            if !seen.insert(*label) {
                return Err(invalid(format!("label {:?} listed twice", label)));
            }
            if !bound.is_finite() || *bound < 0.0 {
                return Err(invalid(format!("bound {} for {:?} is not a finite value >= 0", bound, label)));
            }
        }

        bounds.sort_by(|a, b| a.1.total_cmp(&b.1));
        if bounds[0].1 != 0.0 {
            return Err(invalid(format!("lowest bound is {}, expected 0", bounds[0].1)));
        }

        Ok(Self { bounds })
    }

    /// Build from bounds already sorted ascending, starting at 0, each label
    /// once. Used for built-in tables only.
    pub(crate) fn from_sorted(bounds: Vec<(L, f64)>) -> Self {
        debug_assert!(bounds.first().is_some_and(|b| b.1 == 0.0));
        debug_assert!(bounds.windows(2).all(|w| w[0].1 <= w[1].1));
        Self { bounds }
    }

    /// Classify a value. `None` for NaN or values below 0.
    pub fn classify(&self, value: f64) -> Option<L> {
        if value.is_nan() || value < 0.0 {
            return None;
        }
        self.bounds
            .iter()
            .rev()
            .find(|(_, lower)| value >= *lower)
            .map(|(label, _)| *label)
    }

    /// `(label, lower, upper)` triples in ascending order; the last upper
    /// bound is infinite.
    pub fn intervals(&self) -> Vec<(L, f64, f64)> {
        self.bounds
            .iter()
            .enumerate()
            .map(|(i, (label, lower))| {
                let upper = self.bounds.get(i + 1).map_or(f64::INFINITY, |next| next.1);
                (*label, *lower, upper)
            })
            .collect()
    }
}

// =============================================================================
// Scalar rules
// =============================================================================

/// Dominant electricity source by ratio-of-totals majority.
///
/// Groups: fossil = coal + oil + gas, nuclear, renewable = hydro + solar +
/// wind + bioenergy + other renewables. Missing columns count as zero.
/// Returns `None` only when every column is missing; a zero total or no
/// group above 50% yields [`EnergySource::Mix`].
pub fn dominant_energy(mix: &EnergyMix) -> Option<EnergySource> {
    if mix.is_empty() {
        return None;
    }

    let v = |x: Option<f64>| x.unwrap_or(0.0);
    let fossil = v(mix.coal) + v(mix.oil) + v(mix.gas);
    let nuclear = v(mix.nuclear);
    let renewable =
        v(mix.hydro) + v(mix.solar) + v(mix.wind) + v(mix.bioenergy) + v(mix.other_renewables);
    let total: f64 = mix.columns().iter().map(|c| v(*c)).sum();

    if total <= 0.0 {
        return Some(EnergySource::Mix);
    }

    let source = if fossil / total > MAJORITY {
        EnergySource::Fossil
    } else if nuclear / total > MAJORITY {
        EnergySource::Nuclear
    } else if renewable / total > MAJORITY {
        EnergySource::Renewable
    } else {
        EnergySource::Mix
    };
    Some(source)
}

// =============================================================================
// Table-level stages
// =============================================================================

/// Attach a development tier to every HDI row with a value.
pub fn categorize_hdi(
    table: &RawTable,
    brackets: &Brackets<HdiTier>,
    drops: &mut DropCounts,
) -> ExtractResult<Vec<HdiRecord>> {
    let cols = HDI.bind(table)?;
    let hdi_col = cols.index(field::HDI)?;

    let mut records = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let Some(key) = cols.row_key(row) else {
            drops.add("hdi: missing Entity or Year", 1);
            continue;
        };
        let Some(hdi) = table.float(row, hdi_col) else {
            drops.add("hdi: missing value", 1);
            continue;
        };
        match brackets.classify(hdi) {
            Some(tier) => records.push(HdiRecord { key, hdi, tier }),
            None => drops.add("hdi: outside [0, inf)", 1),
        }
    }
    Ok(records)
}

/// Attach an income bracket to every GDP row with a value.
pub fn categorize_income(
    table: &RawTable,
    brackets: &Brackets<IncomeCategory>,
    drops: &mut DropCounts,
) -> ExtractResult<Vec<IncomeRecord>> {
    let cols = GDP.bind(table)?;
    let gdp_col = cols.index(field::GDP_PER_CAPITA)?;

    let mut records = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let Some(key) = cols.row_key(row) else {
            drops.add("gdp: missing Entity or Year", 1);
            continue;
        };
        let Some(gdp_per_capita) = table.float(row, gdp_col) else {
            drops.add("gdp: missing value", 1);
            continue;
        };
        match brackets.classify(gdp_per_capita) {
            Some(category) => records.push(IncomeRecord { key, gdp_per_capita, category }),
            None => drops.add("gdp: outside [0, inf)", 1),
        }
    }
    Ok(records)
}

/// Reduce every energy row to `(key, dominant source)`.
pub fn determine_primary_energy(
    table: &RawTable,
    drops: &mut DropCounts,
) -> ExtractResult<Vec<EnergyRecord>> {
    let cols = ENERGY.bind(table)?;
    let coal = cols.index(field::COAL)?;
    let oil = cols.index(field::OIL)?;
    let gas = cols.index(field::GAS)?;
    let nuclear = cols.index(field::NUCLEAR)?;
    let hydro = cols.index(field::HYDRO)?;
    let solar = cols.index(field::SOLAR)?;
    let wind = cols.index(field::WIND)?;
    let bioenergy = cols.index(field::BIOENERGY)?;
    let other = cols.index(field::OTHER_RENEWABLES)?;

    let mut records = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let Some(key) = cols.row_key(row) else {
            drops.add("energy: missing Entity or Year", 1);
            continue;
        };
        let mix = EnergyMix {
            coal: table.float(row, coal),
            oil: table.float(row, oil),
            gas: table.float(row, gas),
            nuclear: table.float(row, nuclear),
            hydro: table.float(row, hydro),
            solar: table.float(row, solar),
            wind: table.float(row, wind),
            bioenergy: table.float(row, bioenergy),
            other_renewables: table.float(row, other),
        };
        match dominant_energy(&mix) {
            Some(source) => records.push(EnergyRecord { key, source }),
            None => drops.add("energy: every technology missing", 1),
        }
    }
    Ok(records)
}

/// Keep CO2 rows with a value and `Year >= 1990`.
pub fn filter_co2(table: &RawTable, drops: &mut DropCounts) -> ExtractResult<Vec<Co2Record>> {
    let cols = CO2.bind(table)?;
    let co2_col = cols.index(field::CO2_PER_CAPITA)?;

    let mut records = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let Some(key) = cols.row_key(row) else {
            drops.add("co2: missing Entity or Year", 1);
            continue;
        };
        let Some(co2_per_capita) = table.float(row, co2_col) else {
            drops.add("co2: missing value", 1);
            continue;
        };
        if key.year < CO2_MIN_YEAR {
            drops.add("co2: before 1990", 1);
            continue;
        }
        records.push(Co2Record { key, co2_per_capita });
    }
    Ok(records)
}
