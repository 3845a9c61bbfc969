//! CSV file sink.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ExtractResult, PipelineResult, SinkError, SinkResult};
use crate::extract::read_csv_file;
use crate::logs::log_info;

use super::{Cell, LoadReport, SqlType, Table, TableSpec};

/// Writes each table to `<output_dir>/<file_name>`.
#[derive(Debug, Clone)]
pub struct CsvSink {
    output_dir: PathBuf,
}

impl CsvSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Replace the output directory with the given tables.
    ///
    /// Destructive: the output directory and everything in it is removed
    /// and recreated before the first table is written. Callers run the
    /// validation gate first so a failed run never clears previous output.
    /// A table that fails to write is reported and the others are still
    /// written.
    pub fn load(&self, tables: &[Table]) -> PipelineResult<LoadReport> {
        self.reset_output_dir().map_err(SinkError::from)?;
        log_info(format!("Writing {} tables to {}", tables.len(), self.output_dir.display()));

        let mut report = LoadReport::new("csv");
        for table in tables {
            match self.write_table(table) {
                Ok(rows) => report.record_written(table.spec, rows),
                Err(e) => report.record_failure(table.spec, e),
            }
        }
        Ok(report)
    }

    fn reset_output_dir(&self) -> std::io::Result<()> {
        if self.output_dir.exists() {
            fs::remove_dir_all(&self.output_dir)?;
        }
        fs::create_dir_all(&self.output_dir)
    }

    fn write_table(&self, table: &Table) -> SinkResult<usize> {
        let path = self.output_dir.join(table.spec.file_name);
        let mut writer = csv::Writer::from_path(&path)?;

        writer.write_record(table.spec.columns.iter().map(|c| c.display))?;
        for row in &table.rows {
            writer.write_record(row.iter().map(Cell::render))?;
        }
        writer.flush().map_err(SinkError::Io)?;
        Ok(table.len())
    }
}

/// Read a table written by [`CsvSink`] back into typed cells.
pub fn read_back(dir: &Path, spec: &'static TableSpec) -> ExtractResult<Table> {
    let raw = read_csv_file(spec.display_name(), &dir.join(spec.file_name))?;

    let mut indices = Vec::with_capacity(spec.columns.len());
    for column in spec.columns {
        indices.push(raw.column(column.display)?);
    }

    let mut table = Table::new(spec);
    for row in 0..raw.len() {
        let cells = spec
            .columns
            .iter()
            .zip(&indices)
            .map(|(column, &idx)| match column.ty {
                SqlType::Integer => raw.int(row, idx).map_or(Cell::Null, Cell::Int),
                SqlType::Double => raw.float(row, idx).map_or(Cell::Null, Cell::Float),
                SqlType::Text => raw.text(row, idx).map_or(Cell::Null, |s| Cell::Text(s.to_string())),
            })
            .collect();
        table.rows.push(cells);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::{DIM_COUNTRY, DIM_YEAR, FACT_HEALTH_METRICS};
    use crate::validation::validate_star;

    fn sample_tables() -> Vec<Table> {
        let mut country = Table::new(&DIM_COUNTRY);
        country.rows = vec![
            vec![Cell::Int(1), Cell::Text("India".into()), Cell::Text("IND".into())],
            vec![Cell::Int(2), Cell::Text("Korea, Republic of".into()), Cell::Null],
        ];
        let mut year = Table::new(&DIM_YEAR);
        year.rows = vec![vec![Cell::Int(1), Cell::Int(2019)]];

        let mut fact = Table::new(&FACT_HEALTH_METRICS);
        for country_id in [1, 2] {
            let mut row = vec![Cell::Int(country_id), Cell::Int(1), Cell::Float(3.25)];
            row.extend(std::iter::repeat(Cell::Null).take(7));
            fact.rows.push(row);
        }
        vec![country, year, fact]
    }

    #[test]
    fn test_round_trip_preserves_rows_and_keys() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output");
        let tables = sample_tables();

        let report = CsvSink::new(&out).load(&tables).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.written.len(), 3);

        let read: Vec<Table> = [&DIM_COUNTRY, &DIM_YEAR, &FACT_HEALTH_METRICS]
            .into_iter()
            .map(|spec| read_back(&out, spec).unwrap())
            .collect();

        for (before, after) in tables.iter().zip(&read) {
            assert_eq!(before.len(), after.len());
        }
        assert_eq!(read[0].rows[1][1], Cell::Text("Korea, Republic of".into()));
        assert_eq!(read[0].rows[1][2], Cell::Null);
        assert_eq!(read[2].rows[0][2], Cell::Float(3.25));
        assert!(validate_star(&read).is_ok());
    }

    #[test]
    fn test_load_overwrites_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.csv"), "old").unwrap();

        CsvSink::new(&out).load(&sample_tables()).unwrap();

        assert!(!out.join("stale.csv").exists());
        assert!(out.join("dim_country.csv").exists());
    }

    #[test]
    fn test_header_uses_display_names() {
        let dir = tempfile::tempdir().unwrap();
        CsvSink::new(dir.path()).load(&sample_tables()).unwrap();

        let content = fs::read_to_string(dir.path().join("fact_health_metrics.csv")).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(
            header,
            "country_id,year_id,mortality_rate,HEPB3,DTP3,POL3,MCV1,HIB3,RCV1,ROTAC"
        );
    }

    #[test]
    fn test_failed_table_does_not_stop_siblings() {
        static UNWRITABLE: TableSpec = TableSpec {
            name: "unwritable",
            file_name: "no/such/dir/unwritable.csv",
            columns: &[],
            primary_key: None,
            foreign_keys: &[],
        };
        let dir = tempfile::tempdir().unwrap();
        let mut year = Table::new(&DIM_YEAR);
        year.rows = vec![vec![Cell::Int(1), Cell::Int(2019)]];

        let report = CsvSink::new(dir.path())
            .load(&[Table::new(&UNWRITABLE), year])
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].table, "no/such/dir/unwritable");
        assert_eq!(report.written.len(), 1);
        assert!(dir.path().join("dim_year.csv").exists());
    }

    #[test]
    fn test_read_back_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_back(dir.path(), &DIM_YEAR).is_err());
    }
}
