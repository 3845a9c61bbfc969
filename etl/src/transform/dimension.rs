//! Dimension tables: deduplicated natural keys with dense surrogate keys.
//!
//! Keys are assigned 1..=N in first-seen order. They are stable within a
//! run and across runs only while the input row order is unchanged.

use std::collections::HashMap;
use std::hash::Hash;

use crate::load::{
    Cell, Table, TableSpec, DIMENSION_DEVELOPPEMENT, DIMENSION_ENERGY, DIMENSION_PAYS,
    DIMENSION_REVENUS, DIMENSION_TEMPS,
};
use crate::models::{
    CountryKey, EnergyRecord, EnergySource, HdiRecord, HdiTier, IncomeCategory, IncomeRecord,
    Label,
};

pub type SurrogateKey = u32;

/// Distinct natural keys in first-seen order.
#[derive(Debug, Clone)]
pub struct Dimension<K> {
    keys: Vec<K>,
    index: HashMap<K, SurrogateKey>,
}

impl<K: Eq + Hash + Clone> Dimension<K> {
    pub fn from_keys<I: IntoIterator<Item = K>>(keys: I) -> Self {
        let mut dim = Self {
            keys: Vec::new(),
            index: HashMap::new(),
        };
        for key in keys {
            if !dim.index.contains_key(&key) {
                let id = dim.keys.len() as SurrogateKey + 1;
                dim.index.insert(key.clone(), id);
                dim.keys.push(key);
            }
        }
        dim
    }

    pub fn lookup(&self, key: &K) -> Option<SurrogateKey> {
        self.index.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// `(surrogate key, natural key)` pairs, keys ascending.
    pub fn iter(&self) -> impl Iterator<Item = (SurrogateKey, &K)> {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, k)| (i as SurrogateKey + 1, k))
    }

    /// Render as an output table, one row per key.
    pub fn to_table(&self, spec: &'static TableSpec, cells: impl Fn(&K) -> Vec<Cell>) -> Table {
        let mut table = Table::new(spec);
        for (id, key) in self.iter() {
            let mut row = vec![Cell::Int(i64::from(id))];
            row.extend(cells(key));
            table.rows.push(row);
        }
        table
    }
}

/// Country rendered as `(entity, code)` cells.
pub fn country_cells(key: &CountryKey) -> Vec<Cell> {
    vec![Cell::Text(key.entity.clone()), Cell::from(key.code.clone())]
}

fn label_cells<L: Label>(label: &L) -> Vec<Cell> {
    vec![Cell::Text(label.as_str().to_string())]
}

/// The five dimensions of the socio-economic star schema.
#[derive(Debug, Clone)]
pub struct Dimensions {
    pub pays: Dimension<CountryKey>,
    pub temps: Dimension<i32>,
    pub energy: Dimension<EnergySource>,
    pub dev_humain: Dimension<HdiTier>,
    pub revenus: Dimension<IncomeCategory>,
}

/// Build every dimension from the classified rows.
///
/// Country, time and development level come from the HDI rows, energy from
/// the energy rows and income from the GDP rows.
pub fn build_dimensions(
    hdi: &[HdiRecord],
    energy: &[EnergyRecord],
    gdp: &[IncomeRecord],
) -> Dimensions {
    Dimensions {
        pays: Dimension::from_keys(hdi.iter().map(|r| r.key.country())),
        temps: Dimension::from_keys(hdi.iter().map(|r| r.key.year)),
        energy: Dimension::from_keys(energy.iter().map(|r| r.source)),
        dev_humain: Dimension::from_keys(hdi.iter().map(|r| r.tier)),
        revenus: Dimension::from_keys(gdp.iter().map(|r| r.category)),
    }
}

impl Dimensions {
    /// Output tables in load order.
    pub fn to_tables(&self) -> Vec<Table> {
        vec![
            self.pays.to_table(&DIMENSION_PAYS, country_cells),
            self.temps
                .to_table(&DIMENSION_TEMPS, |year| vec![Cell::Int(i64::from(*year))]),
            self.energy.to_table(&DIMENSION_ENERGY, label_cells),
            self.dev_humain.to_table(&DIMENSION_DEVELOPPEMENT, label_cells),
            self.revenus.to_table(&DIMENSION_REVENUS, label_cells),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RowKey;

    #[test]
    fn test_dense_keys_one_per_distinct() {
        let dim = Dimension::from_keys(vec![2001, 2000, 2001, 1999, 2000]);

        assert_eq!(dim.len(), 3);
        let mut ids: Vec<SurrogateKey> = dim.iter().map(|(id, _)| id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);

        // Every distinct key resolves, to one id each
        let mut resolved: Vec<SurrogateKey> =
            [1999, 2000, 2001].iter().map(|y| dim.lookup(y).unwrap()).collect();
        resolved.sort();
        assert_eq!(resolved, vec![1, 2, 3]);
        assert_eq!(dim.lookup(&1850), None);
    }

    #[test]
    fn test_empty_dimension() {
        let dim = Dimension::<i32>::from_keys(Vec::new());
        assert!(dim.is_empty());
        assert_eq!(dim.to_table(&DIMENSION_TEMPS, |_| vec![]).len(), 0);
    }

    #[test]
    fn test_country_dimension_distinguishes_code() {
        let keys = vec![
            CountryKey { entity: "World".into(), code: None },
            CountryKey { entity: "World".into(), code: Some("OWID_WRL".into()) },
            CountryKey { entity: "World".into(), code: None },
        ];
        assert_eq!(Dimension::from_keys(keys).len(), 2);
    }

    #[test]
    fn test_build_dimensions_sources() {
        let hdi = vec![
            HdiRecord { key: RowKey::new("France", Some("FRA"), 2000), hdi: 0.85, tier: HdiTier::TresEleve },
            HdiRecord { key: RowKey::new("France", Some("FRA"), 2001), hdi: 0.86, tier: HdiTier::TresEleve },
            HdiRecord { key: RowKey::new("Chad", Some("TCD"), 2000), hdi: 0.3, tier: HdiTier::Faible },
        ];
        let energy = vec![EnergyRecord { key: RowKey::new("France", Some("FRA"), 2000), source: EnergySource::Nuclear }];
        let gdp = vec![IncomeRecord {
            key: RowKey::new("Qatar", Some("QAT"), 2000),
            gdp_per_capita: 90000.0,
            category: IncomeCategory::Riche,
        }];

        let dims = build_dimensions(&hdi, &energy, &gdp);
        assert_eq!(dims.pays.len(), 2);
        assert_eq!(dims.temps.len(), 2);
        assert_eq!(dims.dev_humain.len(), 2);
        assert_eq!(dims.energy.len(), 1);
        assert_eq!(dims.revenus.len(), 1);

        let tables = dims.to_tables();
        assert_eq!(tables.len(), 5);
        assert_eq!(tables[0].rows[0][1], Cell::Text("France".into()));
        assert_eq!(tables[0].rows[0][2], Cell::Text("FRA".into()));
        assert_eq!(tables[2].rows[0][1], Cell::Text("nuclear".into()));
    }
}
