//! PostgreSQL sink.
//!
//! One pool per load, closed when the load ends whatever the per-table
//! outcomes. Each table is created if missing (with its primary and foreign
//! keys), truncated, then filled with batched inserts using the explicit
//! lower-case column list of its [`TableSpec`]. The statements of one table
//! run in a single transaction: a table that fails keeps its previous rows.

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};

use crate::config::DatabaseConfig;
use crate::error::{PipelineResult, SinkError, SinkResult};
use crate::logs::log_info;

use super::{Cell, LoadReport, SqlType, Table, TableSpec};

/// Rows per INSERT statement; keeps bind parameters well under 65535.
const BATCH_SIZE: usize = 1000;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("Invalid identifier pattern"));

fn ident(name: &str) -> SinkResult<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(SinkError::InvalidIdentifier(name.to_string()))
    }
}

type Statement = QueryBuilder<'static, Postgres>;

#[derive(Debug, Clone)]
pub struct PostgresSink {
    config: DatabaseConfig,
}

impl PostgresSink {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    /// Create, truncate and fill every table, in order.
    ///
    /// Failing to connect is fatal; a failure on one table is reported and
    /// the remaining tables are still attempted.
    pub async fn load(&self, tables: &[Table]) -> PipelineResult<LoadReport> {
        log_info(format!("Connecting to {}", self.config.display_target()));
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(self.config.connect_options())
            .await
            .map_err(SinkError::from)?;

        let mut report = LoadReport::new("postgres");
        for table in tables {
            match write_table(&pool, table).await {
                Ok(rows) => report.record_written(table.spec, rows),
                Err(e) => report.record_failure(table.spec, e),
            }
        }

        pool.close().await;
        Ok(report)
    }
}

async fn write_table(pool: &PgPool, table: &Table) -> SinkResult<usize> {
    let statements = plan_table(table, BATCH_SIZE)?;

    // Dropping an uncommitted transaction rolls it back
    let mut tx = pool.begin().await?;
    for mut statement in statements {
        statement.build().execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(table.len())
}

/// Every statement that loads one table, in execution order: create,
/// truncate, then one INSERT per batch of rows.
///
/// Built in full before anything is sent, so an invalid identifier never
/// reaches the database.
fn plan_table(table: &Table, batch_size: usize) -> SinkResult<Vec<Statement>> {
    let mut statements = vec![
        QueryBuilder::new(create_table_sql(table.spec)?),
        QueryBuilder::new(truncate_sql(table.spec)?),
    ];

    for chunk in table.rows.chunks(batch_size.max(1)) {
        let mut builder = insert_builder(table.spec)?;
        builder.push_values(chunk, |mut b, row| {
            for (cell, column) in row.iter().zip(table.spec.columns) {
                match (cell, column.ty) {
                    (Cell::Int(v), _) => {
                        b.push_bind(*v);
                    }
                    (Cell::Float(v), _) => {
                        b.push_bind(*v);
                    }
                    (Cell::Text(s), _) => {
                        b.push_bind(s.clone());
                    }
                    (Cell::Null, SqlType::Integer) => {
                        b.push_bind(None::<i64>);
                    }
                    (Cell::Null, SqlType::Double) => {
                        b.push_bind(None::<f64>);
                    }
                    (Cell::Null, SqlType::Text) => {
                        b.push_bind(None::<String>);
                    }
                }
            }
        });
        statements.push(builder);
    }
    Ok(statements)
}

/// `CREATE TABLE IF NOT EXISTS` with keys.
pub fn create_table_sql(spec: &TableSpec) -> SinkResult<String> {
    let mut parts = Vec::with_capacity(spec.columns.len() + spec.foreign_keys.len());
    for column in spec.columns {
        let mut def = format!("{} {}", ident(column.sql)?, column.ty.ddl());
        if spec.primary_key == Some(column.sql) {
            def.push_str(" PRIMARY KEY");
        } else if !column.nullable {
            def.push_str(" NOT NULL");
        }
        parts.push(def);
    }
    for fk in spec.foreign_keys {
        parts.push(format!(
            "FOREIGN KEY ({col}) REFERENCES {table} ({col})",
            col = ident(fk.column)?,
            table = ident(fk.references)?,
        ));
    }
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        ident(spec.name)?,
        parts.join(", ")
    ))
}

/// Empties a table; CASCADE also empties facts referencing a dimension.
pub fn truncate_sql(spec: &TableSpec) -> SinkResult<String> {
    Ok(format!("TRUNCATE TABLE {} CASCADE", ident(spec.name)?))
}

fn insert_builder(spec: &TableSpec) -> SinkResult<Statement> {
    let columns = spec
        .columns
        .iter()
        .map(|c| ident(c.sql))
        .collect::<SinkResult<Vec<_>>>()?;
    Ok(QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        ident(spec.name)?,
        columns.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::{DIMENSION_PAYS, DIM_YEAR, FAIT_SOCIOECONOMIQUE};

    #[test]
    fn test_dimension_ddl() {
        let sql = create_table_sql(&DIMENSION_PAYS).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS dimension_pays \
             (id_pays BIGINT PRIMARY KEY, entity TEXT NOT NULL, code TEXT)"
        );
    }

    #[test]
    fn test_fact_ddl_has_foreign_keys() {
        let sql = create_table_sql(&FAIT_SOCIOECONOMIQUE).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS fait_socioeconomique (id_pays BIGINT NOT NULL"));
        assert!(sql.contains("hdi DOUBLE PRECISION NOT NULL"));
        assert!(sql.contains("FOREIGN KEY (id_revenu) REFERENCES dimension_revenus (id_revenu)"));
        assert_eq!(sql.matches("FOREIGN KEY").count(), 5);
    }

    #[test]
    fn test_insert_column_order() {
        let builder = insert_builder(&FAIT_SOCIOECONOMIQUE).unwrap();
        assert_eq!(
            builder.sql(),
            "INSERT INTO fait_socioeconomique (id_pays, id_annee, id_revenu, id_energie_principale, \
             id_niveau_developpement, hdi, emissions_co2_par_habitant, pib_par_habitant) "
        );
    }

    #[test]
    fn test_identifier_guard() {
        assert!(ident("dim_country").is_ok());
        assert!(ident("Dim_Country").is_err());
        assert!(ident("x; DROP TABLE y").is_err());
    }

    #[test]
    fn test_plan_orders_statements_and_batches_rows() {
        let mut table = Table::new(&DIM_YEAR);
        table.rows = (1..=5).map(|i| vec![Cell::Int(i), Cell::Int(1999 + i)]).collect();

        let plan = plan_table(&table, 2).unwrap();
        assert_eq!(plan.len(), 2 + 3);
        assert!(plan[0].sql().starts_with("CREATE TABLE IF NOT EXISTS dim_year"));
        assert_eq!(plan[1].sql(), "TRUNCATE TABLE dim_year CASCADE");
        assert!(plan[2..].iter().all(|s| s.sql().starts_with("INSERT INTO dim_year (year_id, year) VALUES")));
    }

    #[test]
    fn test_plan_of_empty_table_still_truncates() {
        let plan = plan_table(&Table::new(&DIM_YEAR), BATCH_SIZE).unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_plan_rejects_bad_identifier_before_any_statement() {
        static BAD: TableSpec = TableSpec {
            name: "Bad Table",
            file_name: "bad.csv",
            columns: &[],
            primary_key: None,
            foreign_keys: &[],
        };
        assert!(matches!(plan_table(&Table::new(&BAD), BATCH_SIZE), Err(SinkError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_truncate_sql() {
        assert_eq!(truncate_sql(&DIMENSION_PAYS).unwrap(), "TRUNCATE TABLE dimension_pays CASCADE");
    }
}
