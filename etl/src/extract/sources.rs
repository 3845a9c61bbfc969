//! Static catalogue of raw sources.
//!
//! Each [`SourceSchema`] maps canonical field names to the exact column
//! names found in the source files (units included). Stages look columns
//! up by canonical field only, so a renamed raw column fails at
//! [`SourceSchema::bind`] instead of deep inside a transform.

use std::collections::HashSet;

use crate::error::{ExtractError, ExtractResult};
use crate::models::RowKey;

use super::RawTable;

/// Canonical field names.
pub mod field {
    pub const ENTITY: &str = "entity";
    pub const CODE: &str = "code";
    pub const YEAR: &str = "year";

    pub const HDI: &str = "hdi";
    pub const GDP_PER_CAPITA: &str = "gdp_per_capita";
    pub const CO2_PER_CAPITA: &str = "co2_per_capita";

    pub const COAL: &str = "coal";
    pub const OIL: &str = "oil";
    pub const GAS: &str = "gas";
    pub const NUCLEAR: &str = "nuclear";
    pub const HYDRO: &str = "hydro";
    pub const SOLAR: &str = "solar";
    pub const WIND: &str = "wind";
    pub const BIOENERGY: &str = "bioenergy";
    pub const OTHER_RENEWABLES: &str = "other_renewables";

    pub const HEPB3: &str = "HEPB3";
    pub const DTP3: &str = "DTP3";
    pub const POL3: &str = "POL3";
    pub const MCV1: &str = "MCV1";
    pub const HIB3: &str = "HIB3";
    pub const RCV1: &str = "RCV1";
    pub const ROTAC: &str = "ROTAC";
    pub const POPULATION: &str = "population";
    pub const MORTALITY_RATE: &str = "mortality_rate";
}

/// Canonical field to raw column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub field: &'static str,
    pub column: &'static str,
}

const fn map(field: &'static str, column: &'static str) -> FieldMapping {
    FieldMapping { field, column }
}

/// A raw source: key, default file name and field mapping.
#[derive(Debug, Clone, Copy)]
pub struct SourceSchema {
    pub key: &'static str,
    pub file_name: &'static str,
    pub fields: &'static [FieldMapping],
}

const KEY_FIELDS: [&str; 3] = [field::ENTITY, field::CODE, field::YEAR];

// =============================================================================
// Socio-economic indicators
// =============================================================================

pub static HDI: SourceSchema = SourceSchema {
    key: "hdi",
    file_name: "human-development-index.csv",
    fields: &[
        map(field::ENTITY, "Entity"),
        map(field::CODE, "Code"),
        map(field::YEAR, "Year"),
        map(field::HDI, "Human Development Index"),
    ],
};

pub static ENERGY: SourceSchema = SourceSchema {
    key: "energy",
    file_name: "electricity-prod-source-stacked.csv",
    fields: &[
        map(field::ENTITY, "Entity"),
        map(field::CODE, "Code"),
        map(field::YEAR, "Year"),
        map(field::COAL, "Electricity from coal - TWh"),
        map(field::OIL, "Electricity from oil - TWh"),
        map(field::GAS, "Electricity from gas - TWh"),
        map(field::NUCLEAR, "Electricity from nuclear - TWh"),
        map(field::HYDRO, "Electricity from hydro - TWh"),
        map(field::SOLAR, "Electricity from solar - TWh"),
        map(field::WIND, "Electricity from wind - TWh"),
        map(field::BIOENERGY, "Electricity from bioenergy - TWh"),
        map(field::OTHER_RENEWABLES, "Other renewables excluding bioenergy - TWh"),
    ],
};

pub static GDP: SourceSchema = SourceSchema {
    key: "gdp",
    file_name: "gdp-per-capita-worldbank.csv",
    fields: &[
        map(field::ENTITY, "Entity"),
        map(field::CODE, "Code"),
        map(field::YEAR, "Year"),
        map(field::GDP_PER_CAPITA, "GDP per capita"),
    ],
};

pub static CO2: SourceSchema = SourceSchema {
    key: "co2",
    file_name: "co-emissions-per-capita.csv",
    fields: &[
        map(field::ENTITY, "Entity"),
        map(field::CODE, "Code"),
        map(field::YEAR, "Year"),
        map(field::CO2_PER_CAPITA, "Annual CO₂ emissions (per capita)"),
    ],
};

// =============================================================================
// Health metrics
// =============================================================================

const VACCINATION_FIELDS: &[FieldMapping] = &[
    map(field::ENTITY, "Entity"),
    map(field::CODE, "Code"),
    map(field::YEAR, "Year"),
    map(
        field::HEPB3,
        "Number of one-year-olds vaccinated with three doses of Hepatitis B containing vaccine (HEPB3)",
    ),
    map(
        field::DTP3,
        "Number of one-year-olds vaccinated with three doses of combined diphtheria, tetanus toxoid and pertussis- containing vaccine (DTP3)",
    ),
    map(
        field::POL3,
        "Number of one-year-olds vaccinated with the third dose of either oral or inactivated polio vaccine (POL3)",
    ),
    map(field::POPULATION, "Population - Sex: all - Age: 0 - Variant: estimates"),
    map(
        field::MCV1,
        "Number of one-year-olds vaccinated with the first dose of measles-containing vaccine (MCV1)",
    ),
    map(
        field::HIB3,
        "Number of one-year-olds vaccinated with three doses of Haemophilus influenzae type b containing vaccine (HIB3)",
    ),
    map(
        field::RCV1,
        "Number of one-year-olds vaccinated with one dose of rubella-containing vaccine (RCV1)",
    ),
    map(
        field::ROTAC,
        "Number of one-year-olds vaccinated with the final recommended dose (2nd or 3rd) of rotavirus vaccine (ROTAC)",
    ),
];

pub static VACCINATION_INDIA: SourceSchema = SourceSchema {
    key: "vaccination_india",
    file_name: "vaccnation-1year-india.csv",
    fields: VACCINATION_FIELDS,
};

pub static VACCINATION_BRAZIL: SourceSchema = SourceSchema {
    key: "vaccination_brazil",
    file_name: "vaccnation-1year-brazil.csv",
    fields: VACCINATION_FIELDS,
};

pub static MORTALITY: SourceSchema = SourceSchema {
    key: "mortality",
    file_name: "child-mortality.csv",
    fields: &[
        map(field::ENTITY, "Entity"),
        map(field::CODE, "Code"),
        map(field::YEAR, "Year"),
        map(field::MORTALITY_RATE, "Under-five mortality rate"),
    ],
};

/// Every source known to the pipeline.
pub static CATALOGUE: [&SourceSchema; 7] = [
    &HDI,
    &ENERGY,
    &GDP,
    &CO2,
    &VACCINATION_INDIA,
    &VACCINATION_BRAZIL,
    &MORTALITY,
];

impl SourceSchema {
    /// Raw column for a canonical field.
    pub fn column(&self, field: &str) -> Option<&'static str> {
        self.fields.iter().find(|m| m.field == field).map(|m| m.column)
    }

    /// Resolve every mapped column against a table's headers.
    pub fn bind<'a>(&self, table: &'a RawTable) -> ExtractResult<BoundColumns<'a>> {
        let mut indices = Vec::with_capacity(self.fields.len());
        for mapping in self.fields {
            indices.push((mapping.field, table.column(mapping.column)?));
        }

        let mut bound = BoundColumns {
            table,
            indices,
            entity: 0,
            code: 0,
            year: 0,
        };
        bound.entity = bound.index(field::ENTITY)?;
        bound.code = bound.index(field::CODE)?;
        bound.year = bound.index(field::YEAR)?;
        Ok(bound)
    }

    /// Catalogue sanity: key fields present, no field or column mapped twice.
    pub fn check(&self) -> ExtractResult<()> {
        let mismatch = |column: &str| ExtractError::SchemaMismatch {
            table: self.key.to_string(),
            column: column.to_string(),
        };

        for key in KEY_FIELDS {
            if self.column(key).is_none() {
                return Err(mismatch(key));
            }
        }

        let mut fields = HashSet::new();
        let mut columns = HashSet::new();
        for m in self.fields {
            if !fields.insert(m.field) || !columns.insert(m.column) {
                return Err(mismatch(m.column));
            }
        }
        Ok(())
    }
}

/// Check the whole catalogue.
pub fn check_catalogue() -> ExtractResult<()> {
    CATALOGUE.iter().try_for_each(|schema| schema.check())
}

/// Column indices of one source resolved against one table.
#[derive(Debug)]
pub struct BoundColumns<'a> {
    table: &'a RawTable,
    indices: Vec<(&'static str, usize)>,
    entity: usize,
    code: usize,
    year: usize,
}

impl<'a> BoundColumns<'a> {
    /// Index of a canonical field.
    pub fn index(&self, field: &str) -> ExtractResult<usize> {
        self.indices
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, idx)| *idx)
            .ok_or_else(|| ExtractError::SchemaMismatch {
                table: self.table.name.clone(),
                column: field.to_string(),
            })
    }

    /// Natural key of a row; `None` when Entity or Year is missing.
    pub fn row_key(&self, row: usize) -> Option<RowKey> {
        let entity = self.table.text(row, self.entity)?;
        let year = i32::try_from(self.table.int(row, self.year)?).ok()?;
        Some(RowKey::new(entity, self.table.text(row, self.code), year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_is_consistent() {
        assert!(check_catalogue().is_ok());
    }

    #[test]
    fn test_check_rejects_duplicate_column() {
        static BROKEN: SourceSchema = SourceSchema {
            key: "broken",
            file_name: "broken.csv",
            fields: &[
                map(field::ENTITY, "Entity"),
                map(field::CODE, "Code"),
                map(field::YEAR, "Year"),
                map(field::HDI, "Year"),
            ],
        };
        assert!(BROKEN.check().is_err());
    }

    #[test]
    fn test_column_lookup() {
        assert_eq!(CO2.column(field::CO2_PER_CAPITA), Some("Annual CO₂ emissions (per capita)"));
        assert_eq!(CO2.column(field::HDI), None);
    }

    #[test]
    fn test_row_key_missing_code() {
        let table = RawTable::from_csv(
            "hdi",
            "Entity,Code,Year,Human Development Index\nWorld,,2000,0.64\n,FRA,2000,0.9\n",
        )
        .unwrap();
        let cols = HDI.bind(&table).unwrap();

        let key = cols.row_key(0).unwrap();
        assert_eq!(key.entity, "World");
        assert_eq!(key.code, None);
        assert!(cols.row_key(1).is_none());
    }

    #[test]
    fn test_bind_reports_missing_column() {
        let table = RawTable::from_csv("hdi", "Entity,Year,Human Development Index\nFrance,2000,0.9\n").unwrap();
        let err = HDI.bind(&table).unwrap_err();
        match err {
            ExtractError::SchemaMismatch { table, column } => {
                assert_eq!(table, "hdi");
                assert_eq!(column, "Code");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
