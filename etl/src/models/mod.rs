//! Domain models shared by every stage.
//!
//! - [`RowKey`] - natural key `(Entity, Code, Year)` of a raw indicator row
//! - [`CountryKey`] - natural key `(Entity, Code)` of the country dimension
//! - [`HdiTier`], [`IncomeCategory`], [`EnergySource`] - categorical labels
//! - classified records produced by [`crate::transform::classify`]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Natural keys
// =============================================================================

/// Country display name plus stable code. Aggregate regions have no code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountryKey {
    pub entity: String,
    pub code: Option<String>,
}

/// Natural key of one raw indicator row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowKey {
    pub entity: String,
    pub code: Option<String>,
    pub year: i32,
}

impl RowKey {
    pub fn new(entity: impl Into<String>, code: Option<&str>, year: i32) -> Self {
        Self {
            entity: entity.into(),
            code: code.map(String::from),
            year,
        }
    }

    pub fn country(&self) -> CountryKey {
        CountryKey {
            entity: self.entity.clone(),
            code: self.code.clone(),
        }
    }
}

// =============================================================================
// Categorical labels
// =============================================================================

/// Enumerated label with a canonical string form.
pub trait Label: Copy + Eq + std::hash::Hash + fmt::Debug + 'static {
    /// Every variant, in declaration order.
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    fn parse_label(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.as_str() == s)
    }
}

/// Label parsing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} label '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownLabel {}

macro_rules! label_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl Label for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$name as Label>::parse_label(s).ok_or_else(|| UnknownLabel {
                    kind: $kind,
                    value: s.to_string(),
                })
            }
        }
    };
}

label_enum!(
    /// UN human development tier.
    HdiTier, "HDI tier" {
        Faible => "Faible",
        Moyen => "Moyen",
        Eleve => "Eleve",
        TresEleve => "Tres_eleve",
    }
);

label_enum!(
    /// Income bracket derived from GDP per capita.
    IncomeCategory, "income category" {
        Pauvres => "pauvres",
        MoyenInferieur => "moyen_inferieur",
        MoyenSup => "moyen_sup",
        Riche => "riche",
    }
);

label_enum!(
    /// Dominant electricity source of a country-year.
    EnergySource, "energy source" {
        Fossil => "fossil",
        Nuclear => "nuclear",
        Renewable => "renewable",
        Mix => "mix",
    }
);

// =============================================================================
// Classified records
// =============================================================================

/// HDI row with its development tier.
#[derive(Debug, Clone, PartialEq)]
pub struct HdiRecord {
    pub key: RowKey,
    pub hdi: f64,
    pub tier: HdiTier,
}

/// GDP row with its income bracket.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomeRecord {
    pub key: RowKey,
    pub gdp_per_capita: f64,
    pub category: IncomeCategory,
}

/// Energy row reduced to its dominant source.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyRecord {
    pub key: RowKey,
    pub source: EnergySource,
}

/// CO2 row kept by the year filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Co2Record {
    pub key: RowKey,
    pub co2_per_capita: f64,
}

/// Electricity production per technology (TWh). `None` means missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyMix {
    pub coal: Option<f64>,
    pub oil: Option<f64>,
    pub gas: Option<f64>,
    pub nuclear: Option<f64>,
    pub hydro: Option<f64>,
    pub solar: Option<f64>,
    pub wind: Option<f64>,
    pub bioenergy: Option<f64>,
    pub other_renewables: Option<f64>,
}

impl EnergyMix {
    /// All technology columns in catalogue order.
    pub fn columns(&self) -> [Option<f64>; 9] {
        [
            self.coal,
            self.oil,
            self.gas,
            self.nuclear,
            self.hydro,
            self.solar,
            self.wind,
            self.bioenergy,
            self.other_renewables,
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.columns().iter().all(Option::is_none)
    }
}
