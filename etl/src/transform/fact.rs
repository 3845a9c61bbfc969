//! Fact table assembly.
//!
//! 1. Inner join HDI, CO2, GDP and energy rows on `(Entity, Code, Year)`.
//! 2. Resolve each natural key to its dimension's surrogate key.
//! 3. Keep the five foreign keys and the three measures.
//! 4. Drop rows with an unresolved key or a missing measure.

use std::collections::HashMap;

use crate::load::{Cell, Table, FAIT_SOCIOECONOMIQUE};
use crate::models::{Co2Record, EnergyRecord, HdiRecord, IncomeRecord, RowKey};

use super::dimension::{Dimensions, SurrogateKey};
use super::DropCounts;

/// Classified and filtered sources, input of the fact assembly.
#[derive(Debug, Clone, Default)]
pub struct Classified {
    pub hdi: Vec<HdiRecord>,
    pub energy: Vec<EnergyRecord>,
    pub gdp: Vec<IncomeRecord>,
    pub co2: Vec<Co2Record>,
}

/// One fully resolved country-year.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub id_pays: SurrogateKey,
    pub id_annee: SurrogateKey,
    pub id_revenu: SurrogateKey,
    pub id_energie_principale: SurrogateKey,
    pub id_niveau_developpement: SurrogateKey,
    pub hdi: f64,
    pub emissions_co2_par_habitant: f64,
    pub pib_par_habitant: f64,
}

/// A joined row before key resolution.
struct Joined<'a> {
    hdi: &'a HdiRecord,
    co2: &'a Co2Record,
    gdp: &'a IncomeRecord,
    energy: &'a EnergyRecord,
}

fn index_by_key<'a, T>(
    records: &'a [T],
    key: impl Fn(&'a T) -> &'a RowKey,
) -> HashMap<&'a RowKey, Vec<&'a T>> {
    let mut index: HashMap<&'a RowKey, Vec<&'a T>> = HashMap::new();
    for record in records {
        index.entry(key(record)).or_default().push(record);
    }
    index
}

/// Inner join on the natural key, HDI order preserved. Duplicate keys in a
/// source multiply like a relational join.
fn join<'a>(sources: &'a Classified, drops: &mut DropCounts) -> Vec<Joined<'a>> {
    let co2 = index_by_key(&sources.co2, |r| &r.key);
    let gdp = index_by_key(&sources.gdp, |r| &r.key);
    let energy = index_by_key(&sources.energy, |r| &r.key);

    let mut joined = Vec::new();
    for hdi in &sources.hdi {
        let (Some(co2s), Some(gdps), Some(energies)) =
            (co2.get(&hdi.key), gdp.get(&hdi.key), energy.get(&hdi.key))
        else {
            drops.add("fact: country-year missing from a source", 1);
            continue;
        };

        for &co2 in co2s {
            for &gdp in gdps {
                for &energy in energies {
                    joined.push(Joined { hdi, co2, gdp, energy });
                }
            }
        }
    }
    joined
}

fn resolve(row: &Joined<'_>, dims: &Dimensions) -> Option<FactRow> {
    let fact = FactRow {
        id_pays: dims.pays.lookup(&row.hdi.key.country())?,
        id_annee: dims.temps.lookup(&row.hdi.key.year)?,
        id_revenu: dims.revenus.lookup(&row.gdp.category)?,
        id_energie_principale: dims.energy.lookup(&row.energy.source)?,
        id_niveau_developpement: dims.dev_humain.lookup(&row.hdi.tier)?,
        hdi: row.hdi.hdi,
        emissions_co2_par_habitant: row.co2.co2_per_capita,
        pib_par_habitant: row.gdp.gdp_per_capita,
    };

    let measures = [fact.hdi, fact.emissions_co2_par_habitant, fact.pib_par_habitant];
    measures.iter().all(|m| m.is_finite()).then_some(fact)
}

/// Join, resolve and filter into fact rows.
pub fn assemble_facts(sources: &Classified, dims: &Dimensions, drops: &mut DropCounts) -> Vec<FactRow> {
    join(sources, drops)
        .iter()
        .filter_map(|row| {
            let fact = resolve(row, dims);
            if fact.is_none() {
                drops.add("fact: unresolved key or missing measure", 1);
            }
            fact
        })
        .collect()
}

/// Render fact rows as the fact output table.
pub fn facts_table(facts: &[FactRow]) -> Table {
    let mut table = Table::new(&FAIT_SOCIOECONOMIQUE);
    table.rows = facts
        .iter()
        .map(|f| {
            vec![
                Cell::Int(i64::from(f.id_pays)),
                Cell::Int(i64::from(f.id_annee)),
                Cell::Int(i64::from(f.id_revenu)),
                Cell::Int(i64::from(f.id_energie_principale)),
                Cell::Int(i64::from(f.id_niveau_developpement)),
                Cell::Float(f.hdi),
                Cell::Float(f.emissions_co2_par_habitant),
                Cell::Float(f.pib_par_habitant),
            ]
        })
        .collect();
    table
}
