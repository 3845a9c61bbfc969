//! Output tables and sinks.
//!
//! Every output table is declared statically as a [`TableSpec`]: file name
//! for the CSV sink, display column names, lower-case relational column
//! names in their fixed order, SQL types, primary and foreign keys.
//! Sinks fan out over tables: a failing table is reported in the
//! [`LoadReport`] and the remaining tables are still attempted.

pub mod csv_sink;
pub mod postgres;

use serde::Serialize;

use crate::error::PipelineResult;
use crate::logs::{log_error, log_success};

pub use csv_sink::{read_back, CsvSink};
pub use postgres::PostgresSink;

/// One cell of an output row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl Cell {
    /// Null, or a NaN float.
    pub fn is_null(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// CSV rendering; null is the empty field.
    pub fn render(&self) -> String {
        match self {
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Null => String::new(),
        }
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Null, Cell::Float)
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        value.map_or(Cell::Null, Cell::Text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Double,
    Text,
}

impl SqlType {
    pub fn ddl(&self) -> &'static str {
        match self {
            SqlType::Integer => "BIGINT",
            SqlType::Double => "DOUBLE PRECISION",
            SqlType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    /// Header in CSV output
    pub display: &'static str,
    /// Relational column name
    pub sql: &'static str,
    pub ty: SqlType,
    pub nullable: bool,
}

const fn col(display: &'static str, sql: &'static str, ty: SqlType, nullable: bool) -> ColumnSpec {
    ColumnSpec { display, sql, ty, nullable }
}

#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    /// Relational column in the referencing table
    pub column: &'static str,
    /// Referenced table (relational name); its key column has the same name
    pub references: &'static str,
}

#[derive(Debug)]
pub struct TableSpec {
    /// Relational table name
    pub name: &'static str,
    /// File written by the CSV sink
    pub file_name: &'static str,
    pub columns: &'static [ColumnSpec],
    /// Surrogate key column of a dimension
    pub primary_key: Option<&'static str>,
    pub foreign_keys: &'static [ForeignKey],
}

impl TableSpec {
    pub fn column_index(&self, sql: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.sql == sql)
    }

    /// Name used in logs and file-oriented messages.
    pub fn display_name(&self) -> &'static str {
        self.file_name.trim_end_matches(".csv")
    }
}

use SqlType::{Double, Integer, Text};

// =============================================================================
// Socio-economic star schema
// =============================================================================

pub static DIMENSION_PAYS: TableSpec = TableSpec {
    name: "dimension_pays",
    file_name: "Dimension_Pays.csv",
    columns: &[
        col("ID_Pays", "id_pays", Integer, false),
        col("Entity", "entity", Text, false),
        col("Code", "code", Text, true),
    ],
    primary_key: Some("id_pays"),
    foreign_keys: &[],
};

pub static DIMENSION_TEMPS: TableSpec = TableSpec {
    name: "dimension_temps",
    file_name: "Dimension_Temps.csv",
    columns: &[
        col("ID_Annee", "id_annee", Integer, false),
        col("Year", "year", Integer, false),
    ],
    primary_key: Some("id_annee"),
    foreign_keys: &[],
};

pub static DIMENSION_ENERGY: TableSpec = TableSpec {
    name: "dimension_energy",
    file_name: "Dimension_Energy.csv",
    columns: &[
        col("ID_energie_principale", "id_energie_principale", Integer, false),
        col("energie_principale", "energie_principale", Text, false),
    ],
    primary_key: Some("id_energie_principale"),
    foreign_keys: &[],
};

pub static DIMENSION_DEVELOPPEMENT: TableSpec = TableSpec {
    name: "dimension_developpement_humain",
    file_name: "Dimension_Developpement_Humain.csv",
    columns: &[
        col("ID_niveau_developpement", "id_niveau_developpement", Integer, false),
        col("niveau_developpement", "niveau_developpement", Text, false),
    ],
    primary_key: Some("id_niveau_developpement"),
    foreign_keys: &[],
};

pub static DIMENSION_REVENUS: TableSpec = TableSpec {
    name: "dimension_revenus",
    file_name: "Dimension_Revenus.csv",
    columns: &[
        col("ID_Revenu", "id_revenu", Integer, false),
        col("categorie_revenu", "categorie_revenu", Text, false),
    ],
    primary_key: Some("id_revenu"),
    foreign_keys: &[],
};

pub static FAIT_SOCIOECONOMIQUE: TableSpec = TableSpec {
    name: "fait_socioeconomique",
    file_name: "Fait_SocioEconomique.csv",
    columns: &[
        col("ID_Pays", "id_pays", Integer, false),
        col("ID_Annee", "id_annee", Integer, false),
        col("ID_Revenu", "id_revenu", Integer, false),
        col("ID_energie_principale", "id_energie_principale", Integer, false),
        col("ID_niveau_developpement", "id_niveau_developpement", Integer, false),
        col("HDI", "hdi", Double, false),
        col("Emissions_CO2_par_habitant", "emissions_co2_par_habitant", Double, false),
        col("PIB_par_habitant", "pib_par_habitant", Double, false),
    ],
    primary_key: None,
    foreign_keys: &[
        ForeignKey { column: "id_pays", references: "dimension_pays" },
        ForeignKey { column: "id_annee", references: "dimension_temps" },
        ForeignKey { column: "id_revenu", references: "dimension_revenus" },
        ForeignKey { column: "id_energie_principale", references: "dimension_energy" },
        ForeignKey { column: "id_niveau_developpement", references: "dimension_developpement_humain" },
    ],
};

// =============================================================================
// Health metrics star schema
// =============================================================================

pub static DIM_COUNTRY: TableSpec = TableSpec {
    name: "dim_country",
    file_name: "dim_country.csv",
    columns: &[
        col("country_id", "country_id", Integer, false),
        col("Entity", "entity", Text, false),
        col("Code", "code", Text, true),
    ],
    primary_key: Some("country_id"),
    foreign_keys: &[],
};

pub static DIM_YEAR: TableSpec = TableSpec {
    name: "dim_year",
    file_name: "dim_year.csv",
    columns: &[
        col("year_id", "year_id", Integer, false),
        col("Year", "year", Integer, false),
    ],
    primary_key: Some("year_id"),
    foreign_keys: &[],
};

pub static FACT_HEALTH_METRICS: TableSpec = TableSpec {
    name: "fact_health_metrics",
    file_name: "fact_health_metrics.csv",
    columns: &[
        col("country_id", "country_id", Integer, false),
        col("year_id", "year_id", Integer, false),
        col("mortality_rate", "mortality_rate", Double, true),
        col("HEPB3", "hepb3", Double, true),
        col("DTP3", "dtp3", Double, true),
        col("POL3", "pol3", Double, true),
        col("MCV1", "mcv1", Double, true),
        col("HIB3", "hib3", Double, true),
        col("RCV1", "rcv1", Double, true),
        col("ROTAC", "rotac", Double, true),
    ],
    primary_key: None,
    foreign_keys: &[
        ForeignKey { column: "country_id", references: "dim_country" },
        ForeignKey { column: "year_id", references: "dim_year" },
    ],
};

/// An output table ready for a sink.
#[derive(Debug, Clone)]
pub struct Table {
    pub spec: &'static TableSpec,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(spec: &'static TableSpec) -> Self {
        Self { spec, rows: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column by relational name.
    pub fn column_values(&self, sql: &str) -> Option<impl Iterator<Item = &Cell>> {
        let idx = self.spec.column_index(sql)?;
        Some(self.rows.iter().filter_map(move |row| row.get(idx)))
    }
}

// =============================================================================
// Load reporting
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TableWrite {
    pub table: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableFailure {
    pub table: String,
    pub error: String,
}

/// Per-table outcome of one load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub sink: String,
    pub written: Vec<TableWrite>,
    pub failed: Vec<TableFailure>,
}

impl LoadReport {
    pub fn new(sink: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            written: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn record_written(&mut self, spec: &TableSpec, rows: usize) {
        log_success(format!("{}: {} rows", spec.display_name(), rows));
        self.written.push(TableWrite {
            table: spec.display_name().to_string(),
            rows,
        });
    }

    pub fn record_failure(&mut self, spec: &TableSpec, error: impl std::fmt::Display) {
        log_error(format!("{}: {}", spec.display_name(), error));
        self.failed.push(TableFailure {
            table: spec.display_name().to_string(),
            error: error.to_string(),
        });
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// =============================================================================
// Sink selection
// =============================================================================

/// Where a run persists its tables.
#[derive(Debug, Clone)]
pub enum Sink {
    Csv(CsvSink),
    Postgres(PostgresSink),
}

impl Sink {
    /// Persist tables in order. Dimensions must precede facts.
    pub async fn load(&self, tables: &[Table]) -> PipelineResult<LoadReport> {
        match self {
            Sink::Csv(sink) => sink.load(tables),
            Sink::Postgres(sink) => sink.load(tables).await,
        }
    }
}
