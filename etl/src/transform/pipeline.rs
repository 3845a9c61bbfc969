//! End-to-end runs: extract, transform, validate, load.
//!
//! Every input is read and checked before any output is touched, and the
//! validation gate runs before the sink, so a failed run leaves previous
//! output in place.
//!
//! # Example
//!
//! ```rust,ignore
//! use starschema::{run_socioeconomic, CsvSink, EtlConfig, Sink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EtlConfig::from_env()?;
//!     let sink = Sink::Csv(CsvSink::new(&config.output_dir));
//!     let summary = run_socioeconomic(&config, &sink).await?;
//!     println!("{} tables written", summary.report.written.len());
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::{EtlConfig, Thresholds};
use crate::error::PipelineResult;
use crate::extract::sources::check_catalogue;
use crate::extract::{Extractor, HealthSources, SocioEconomicSources};
use crate::load::{LoadReport, Sink, Table};
use crate::logs::{log_info, log_info_indent, log_success};
use crate::validation::validate_star;

use super::classify::{categorize_hdi, categorize_income, determine_primary_energy, filter_co2};
use super::dimension::build_dimensions;
use super::fact::{assemble_facts, facts_table, Classified};
use super::health::{build_health_star, combine_vaccinations, merge_health, read_mortality};
use super::DropCounts;

/// Tables of one star schema, dimensions first, plus the rows dropped on
/// the way.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub tables: Vec<Table>,
    pub drops: DropCounts,
}

/// Outcome of a complete run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub schema: &'static str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub drops: DropCounts,
    pub report: LoadReport,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.report.is_complete()
    }
}

/// Classify the indicator sources and assemble the socio-economic star.
pub fn transform_socioeconomic(
    sources: &SocioEconomicSources,
    thresholds: &Thresholds,
) -> PipelineResult<TransformOutput> {
    let mut drops = DropCounts::default();

    log_info("🔄 Classifying indicators...");
    let classified = Classified {
        hdi: categorize_hdi(&sources.hdi, &thresholds.hdi, &mut drops)?,
        energy: determine_primary_energy(&sources.energy, &mut drops)?,
        gdp: categorize_income(&sources.gdp, &thresholds.income, &mut drops)?,
        co2: filter_co2(&sources.co2, &mut drops)?,
    };
    log_info_indent(
        format!(
            "hdi {} / energy {} / gdp {} / co2 {}",
            classified.hdi.len(),
            classified.energy.len(),
            classified.gdp.len(),
            classified.co2.len()
        ),
        1,
    );

    log_info("📦 Building dimensions and facts...");
    let dims = build_dimensions(&classified.hdi, &classified.energy, &classified.gdp);
    let facts = assemble_facts(&classified, &dims, &mut drops);
    log_success(format!("{} fact rows", facts.len()));

    let mut tables = dims.to_tables();
    tables.push(facts_table(&facts));
    Ok(TransformOutput { tables, drops })
}

/// Merge vaccinations with mortality and assemble the health star.
pub fn transform_health(sources: &HealthSources) -> PipelineResult<TransformOutput> {
    let mut drops = DropCounts::default();

    log_info("🔄 Merging vaccination and mortality...");
    let vaccinations = combine_vaccinations(
        &[&sources.vaccination_india, &sources.vaccination_brazil],
        &mut drops,
    )?;
    let mortality = read_mortality(&sources.mortality, &mut drops)?;
    let rows = merge_health(&vaccinations, &mortality);

    let star = build_health_star(&rows);
    log_success(format!(
        "{} countries, {} years, {} fact rows",
        star.countries.len(),
        star.years.len(),
        star.facts.len()
    ));
    Ok(TransformOutput { tables: star.to_tables(), drops })
}

/// Build and load the socio-economic star schema.
pub async fn run_socioeconomic(config: &EtlConfig, sink: &Sink) -> PipelineResult<RunSummary> {
    let started_at = Utc::now();
    check_catalogue()?;

    log_info(format!("📖 Reading sources from {}", config.input_dir.display()));
    let sources = Extractor::new(&config.input_dir).extract_socioeconomic()?;
    let output = transform_socioeconomic(&sources, &config.thresholds)?;

    finish("socioeconomic", started_at, output, sink).await
}

/// Build and load the health metrics star schema.
pub async fn run_health(config: &EtlConfig, sink: &Sink) -> PipelineResult<RunSummary> {
    let started_at = Utc::now();
    check_catalogue()?;

    log_info(format!("📖 Reading sources from {}", config.input_dir.display()));
    let sources = Extractor::new(&config.input_dir).extract_health()?;
    let output = transform_health(&sources)?;

    finish("health", started_at, output, sink).await
}

async fn finish(
    schema: &'static str,
    started_at: DateTime<Utc>,
    output: TransformOutput,
    sink: &Sink,
) -> PipelineResult<RunSummary> {
    output.drops.log();

    log_info("✔️  Checking referential integrity...");
    validate_star(&output.tables)?;
    log_success("Star schema is consistent");

    let report = sink.load(&output.tables).await?;

    Ok(RunSummary {
        run_id: Uuid::new_v4(),
        schema,
        started_at,
        finished_at: Utc::now(),
        drops: output.drops,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractError, PipelineError};
    use crate::extract::sources::{SourceSchema, CO2, ENERGY, GDP, HDI, MORTALITY, VACCINATION_BRAZIL, VACCINATION_INDIA};
    use crate::load::{
        read_back, Cell, CsvSink, DIMENSION_DEVELOPPEMENT, DIMENSION_ENERGY, DIMENSION_PAYS,
        DIMENSION_REVENUS, DIMENSION_TEMPS, DIM_COUNTRY, FACT_HEALTH_METRICS, FAIT_SOCIOECONOMIQUE,
    };
    use std::fs;
    use std::path::Path;

    fn write_source(dir: &Path, schema: &SourceSchema, rows: &[&str]) {
        let header = schema
            .fields
            .iter()
            .map(|m| format!("\"{}\"", m.column))
            .collect::<Vec<_>>()
            .join(",");
        let mut content = header;
        for row in rows {
            content.push('\n');
            content.push_str(row);
        }
        content.push('\n');
        fs::write(dir.join(schema.file_name), content).unwrap();
    }

    fn socioeconomic_inputs(dir: &Path) {
        write_source(
            dir,
            &HDI,
            &[
                "France,FRA,2000,0.85",
                "Chad,TCD,2000,0.30",
                "Peru,PER,2000,0.68",
                "Peru,PER,2001,",
            ],
        );
        write_source(
            dir,
            &ENERGY,
            &[
                "France,FRA,2000,10,2,5,400,60,0,1,2,0",
                "Chad,TCD,2000,0,0,0,0,0,0,0,0,0",
                "Peru,PER,2000,2,3,10,0,20,0,0,1,0",
            ],
        );
        write_source(
            dir,
            &GDP,
            &["France,FRA,2000,25000", "Chad,TCD,2000,900", "Peru,PER,2000,6000"],
        );
        // Peru 2000 has no CO2 row and is excluded from the fact table
        write_source(
            dir,
            &CO2,
            &["France,FRA,1985,8.0", "France,FRA,2000,6.0", "Chad,TCD,2000,0.1"],
        );
    }

    fn config_for(input: &Path, output: &Path) -> EtlConfig {
        EtlConfig {
            input_dir: input.to_path_buf(),
            output_dir: output.to_path_buf(),
            thresholds: Thresholds::canonical(),
        }
    }

    #[tokio::test]
    async fn test_socioeconomic_run_to_csv() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        socioeconomic_inputs(input.path());

        let config = config_for(input.path(), output.path());
        let sink = Sink::Csv(CsvSink::new(&config.output_dir));
        let summary = run_socioeconomic(&config, &sink).await.unwrap();

        assert!(summary.is_complete());
        assert_eq!(summary.report.written.len(), 6);
        assert_eq!(summary.drops.get("hdi: missing value"), 1);
        assert_eq!(summary.drops.get("co2: before 1990"), 1);
        assert_eq!(summary.drops.get("fact: country-year missing from a source"), 1);

        let facts = read_back(output.path(), &FAIT_SOCIOECONOMIQUE).unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts.rows[0][5], Cell::Float(0.85));

        // Peru is still a country of the HDI source
        let pays = read_back(output.path(), &DIMENSION_PAYS).unwrap();
        assert_eq!(pays.len(), 3);

        let star: Vec<Table> = [
            &DIMENSION_PAYS,
            &DIMENSION_TEMPS,
            &DIMENSION_ENERGY,
            &DIMENSION_DEVELOPPEMENT,
            &DIMENSION_REVENUS,
            &FAIT_SOCIOECONOMIQUE,
        ]
        .into_iter()
        .map(|spec| read_back(output.path(), spec).unwrap())
        .collect();
        assert!(validate_star(&star).is_ok());
    }

    #[test]
    fn test_transform_socioeconomic_dominant_sources() {
        let input = tempfile::tempdir().unwrap();
        socioeconomic_inputs(input.path());
        let sources = Extractor::new(input.path()).extract_socioeconomic().unwrap();

        let output = transform_socioeconomic(&sources, &Thresholds::canonical()).unwrap();
        let energy = &output.tables[2];
        let labels: Vec<&Cell> = energy.rows.iter().map(|r| &r[1]).collect();
        assert_eq!(
            labels,
            vec![
                &Cell::Text("nuclear".into()),
                &Cell::Text("mix".into()),
                &Cell::Text("renewable".into()),
            ]
        );
        assert!(validate_star(&output.tables).is_ok());
    }

    #[tokio::test]
    async fn test_missing_input_leaves_output_untouched() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        socioeconomic_inputs(input.path());
        fs::remove_file(input.path().join(CO2.file_name)).unwrap();
        fs::write(output.path().join("previous.csv"), "kept").unwrap();

        let config = config_for(input.path(), output.path());
        let sink = Sink::Csv(CsvSink::new(&config.output_dir));
        let err = run_socioeconomic(&config, &sink).await.unwrap_err();

        assert!(matches!(err, PipelineError::Extract(ExtractError::MissingInput { .. })));
        assert!(output.path().join("previous.csv").exists());
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_fatal() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        socioeconomic_inputs(input.path());
        fs::write(input.path().join(GDP.file_name), "Entity,Code,Year,GDP\nFrance,FRA,2000,1\n").unwrap();

        let config = config_for(input.path(), output.path());
        let sink = Sink::Csv(CsvSink::new(&config.output_dir));
        let err = run_socioeconomic(&config, &sink).await.unwrap_err();
        assert!(matches!(err, PipelineError::Extract(ExtractError::SchemaMismatch { .. })));
    }

    #[tokio::test]
    async fn test_health_run_to_csv() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_source(
            input.path(),
            &VACCINATION_INDIA,
            &["India,IND,2019,1,2,3,4,5,6,7,8", "India,IND,2020,1,2,3,4,5,6,7,8"],
        );
        write_source(input.path(), &VACCINATION_BRAZIL, &["Brazil,BRA,2019,1,2,3,4,5,6,7,8"]);
        write_source(
            input.path(),
            &MORTALITY,
            &["India,IND,2019,3.4", "Brazil,BRA,2019,1.4", "Peru,PER,2019,1.3"],
        );

        let config = config_for(input.path(), output.path());
        let sink = Sink::Csv(CsvSink::new(&config.output_dir));
        let summary = run_health(&config, &sink).await.unwrap();
        assert!(summary.is_complete());
        assert_eq!(summary.schema, "health");

        let countries = read_back(output.path(), &DIM_COUNTRY).unwrap();
        assert_eq!(countries.len(), 2);

        let facts = read_back(output.path(), &FACT_HEALTH_METRICS).unwrap();
        assert_eq!(facts.len(), 3);
        assert_eq!(facts.rows[0][2], Cell::Float(3.4));
        assert_eq!(facts.rows[1][2], Cell::Null);
    }
}
