//! Health metrics star schema: vaccination coverage and child mortality.
//!
//! Vaccination sources are concatenated, then LEFT joined with mortality on
//! `(Entity, Code, Year)`, so a vaccination row without mortality data keeps
//! a null `mortality_rate`. Country and year dimensions come from the merged
//! rows; measures may be null, foreign keys never are.

use std::collections::HashMap;

use crate::error::ExtractResult;
use crate::extract::sources::{field, MORTALITY, VACCINATION_INDIA};
use crate::extract::RawTable;
use crate::load::{Cell, Table, DIM_COUNTRY, DIM_YEAR, FACT_HEALTH_METRICS};
use crate::models::{CountryKey, RowKey};

use super::dimension::{country_cells, Dimension, SurrogateKey};
use super::DropCounts;

/// One-year-olds vaccinated, per vaccine, plus the age-0 population.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VaccineDoses {
    pub hepb3: Option<f64>,
    pub dtp3: Option<f64>,
    pub pol3: Option<f64>,
    pub mcv1: Option<f64>,
    pub hib3: Option<f64>,
    pub rcv1: Option<f64>,
    pub rotac: Option<f64>,
    pub population: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VaccinationRecord {
    pub key: RowKey,
    pub doses: VaccineDoses,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MortalityRecord {
    pub key: RowKey,
    pub mortality_rate: Option<f64>,
}

/// Vaccination row after the mortality join.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthRow {
    pub key: RowKey,
    pub doses: VaccineDoses,
    pub mortality_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthFact {
    pub country_id: SurrogateKey,
    pub year_id: SurrogateKey,
    pub mortality_rate: Option<f64>,
    pub doses: VaccineDoses,
}

/// Concatenate vaccination tables in the given order.
pub fn combine_vaccinations(
    tables: &[&RawTable],
    drops: &mut DropCounts,
) -> ExtractResult<Vec<VaccinationRecord>> {
    let mut records = Vec::new();
    for table in tables {
        let cols = VACCINATION_INDIA.bind(table)?;
        let hepb3 = cols.index(field::HEPB3)?;
        let dtp3 = cols.index(field::DTP3)?;
        let pol3 = cols.index(field::POL3)?;
        let mcv1 = cols.index(field::MCV1)?;
        let hib3 = cols.index(field::HIB3)?;
        let rcv1 = cols.index(field::RCV1)?;
        let rotac = cols.index(field::ROTAC)?;
        let population = cols.index(field::POPULATION)?;

        for row in 0..table.len() {
            let Some(key) = cols.row_key(row) else {
                drops.add("vaccination: missing Entity or Year", 1);
                continue;
            };
            let doses = VaccineDoses {
                hepb3: table.float(row, hepb3),
                dtp3: table.float(row, dtp3),
                pol3: table.float(row, pol3),
                mcv1: table.float(row, mcv1),
                hib3: table.float(row, hib3),
                rcv1: table.float(row, rcv1),
                rotac: table.float(row, rotac),
                population: table.float(row, population),
            };
            records.push(VaccinationRecord { key, doses });
        }
    }
    Ok(records)
}

pub fn read_mortality(table: &RawTable, drops: &mut DropCounts) -> ExtractResult<Vec<MortalityRecord>> {
    let cols = MORTALITY.bind(table)?;
    let rate = cols.index(field::MORTALITY_RATE)?;

    let mut records = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        match cols.row_key(row) {
            Some(key) => records.push(MortalityRecord {
                key,
                mortality_rate: table.float(row, rate),
            }),
            None => drops.add("mortality: missing Entity or Year", 1),
        }
    }
    Ok(records)
}

/// Left join vaccinations with mortality.
pub fn merge_health(vaccinations: &[VaccinationRecord], mortality: &[MortalityRecord]) -> Vec<HealthRow> {
    let mut index: HashMap<&RowKey, Vec<Option<f64>>> = HashMap::new();
    for record in mortality {
        index.entry(&record.key).or_default().push(record.mortality_rate);
    }

    let mut rows = Vec::with_capacity(vaccinations.len());
    for v in vaccinations {
        match index.get(&v.key) {
            Some(rates) => {
                for rate in rates {
                    rows.push(HealthRow { key: v.key.clone(), doses: v.doses, mortality_rate: *rate });
                }
            }
            None => rows.push(HealthRow { key: v.key.clone(), doses: v.doses, mortality_rate: None }),
        }
    }
    rows
}

/// Dimensions and facts of the health schema.
#[derive(Debug, Clone)]
pub struct HealthStar {
    pub countries: Dimension<CountryKey>,
    pub years: Dimension<i32>,
    pub facts: Vec<HealthFact>,
}

pub fn build_health_star(rows: &[HealthRow]) -> HealthStar {
    let countries = Dimension::from_keys(rows.iter().map(|r| r.key.country()));
    let years = Dimension::from_keys(rows.iter().map(|r| r.key.year));

    let facts = rows
        .iter()
        .filter_map(|r| {
            Some(HealthFact {
                country_id: countries.lookup(&r.key.country())?,
                year_id: years.lookup(&r.key.year)?,
                mortality_rate: r.mortality_rate,
                doses: r.doses,
            })
        })
        .collect();

    HealthStar { countries, years, facts }
}

impl HealthStar {
    /// Output tables in load order.
    pub fn to_tables(&self) -> Vec<Table> {
        let mut fact_table = Table::new(&FACT_HEALTH_METRICS);
        fact_table.rows = self
            .facts
            .iter()
            .map(|f| {
                vec![
                    Cell::Int(i64::from(f.country_id)),
                    Cell::Int(i64::from(f.year_id)),
                    Cell::from(f.mortality_rate),
                    Cell::from(f.doses.hepb3),
                    Cell::from(f.doses.dtp3),
                    Cell::from(f.doses.pol3),
                    Cell::from(f.doses.mcv1),
                    Cell::from(f.doses.hib3),
                    Cell::from(f.doses.rcv1),
                    Cell::from(f.doses.rotac),
                ]
            })
            .collect();

        vec![
            self.countries.to_table(&DIM_COUNTRY, country_cells),
            self.years.to_table(&DIM_YEAR, |year| vec![Cell::Int(i64::from(*year))]),
            fact_table,
        ]
    }
}
