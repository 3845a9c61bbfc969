//! Raw source extraction with encoding and delimiter auto-detection.
//!
//! Reads each CSV source into a [`RawTable`]. No transformation happens
//! here beyond decoding and splitting; the field-mapping tables in
//! [`sources`] are checked against the headers right after reading.

pub mod sources;

use std::path::{Path, PathBuf};

use crate::error::{ExtractError, ExtractResult};
use crate::logs::{log_info_indent, log_success, log_warning};
use sources::SourceSchema;

/// One raw source held in memory.
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Source key (`hdi`, `energy`, ...)
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Detected or assumed encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
}

impl RawTable {
    /// Parse already-decoded CSV content, detecting the delimiter.
    pub fn from_csv(name: impl Into<String>, content: &str) -> ExtractResult<Self> {
        parse_content(name.into(), content, "utf-8".to_string())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a header, or SchemaMismatch.
    pub fn column(&self, name: &str) -> ExtractResult<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ExtractError::SchemaMismatch {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    /// Non-empty cell text.
    pub fn text(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Numeric cell; empty, `NaN` and unparsable cells are missing.
    pub fn float(&self, row: usize, col: usize) -> Option<f64> {
        self.text(row, col)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| !v.is_nan())
    }

    /// Integer cell; accepts integral floats such as `2000.0`.
    pub fn int(&self, row: usize, col: usize) -> Option<i64> {
        let s = self.text(row, col)?;
        s.parse::<i64>().ok().or_else(|| {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && v.fract() == 0.0)
                .map(|v| v as i64)
        })
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes with the given encoding label.
///
/// Unknown labels fall back to UTF-8; bytes that are not UTF-8 under an
/// unknown label are an encoding error.
pub fn decode_content(bytes: &[u8], encoding: &str) -> ExtractResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => encoding_rs::UTF_8.decode(bytes).0,
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0
        }
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => enc.decode(bytes).0,
            None => {
                return String::from_utf8(bytes.to_vec()).map_err(|e| {
                    ExtractError::Encoding(format!("unsupported encoding '{}': {}", other, e))
                })
            }
        },
    };
    Ok(decoded.into_owned())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

fn parse_content(name: String, content: &str, encoding: String) -> ExtractResult<RawTable> {
    if content.trim().is_empty() {
        return Err(ExtractError::EmptyFile(name));
    }

    let delimiter = detect_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(record.iter().map(String::from).collect());
    }

    Ok(RawTable {
        name,
        headers,
        rows,
        encoding,
        delimiter,
    })
}

/// Read a CSV file with encoding and delimiter auto-detection.
pub fn read_csv_file(name: impl Into<String>, path: &Path) -> ExtractResult<RawTable> {
    let bytes = std::fs::read(path)?;
    let encoding = detect_encoding(&bytes);
    let content = decode_content(&bytes, &encoding)?;
    parse_content(name.into(), &content, encoding)
}

/// The four socio-economic indicator sources.
#[derive(Debug, Clone)]
pub struct SocioEconomicSources {
    pub hdi: RawTable,
    pub energy: RawTable,
    pub gdp: RawTable,
    pub co2: RawTable,
}

/// Vaccination and mortality sources of the health dataset.
#[derive(Debug, Clone)]
pub struct HealthSources {
    pub vaccination_india: RawTable,
    pub vaccination_brazil: RawTable,
    pub mortality: RawTable,
}

/// Loads named sources from an input directory.
#[derive(Debug, Clone)]
pub struct Extractor {
    input_dir: PathBuf,
}

impl Extractor {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
        }
    }

    pub fn path_of(&self, schema: &SourceSchema) -> PathBuf {
        self.input_dir.join(schema.file_name)
    }

    /// Fail with MissingInput unless every source file exists.
    pub fn require_all(&self, schemas: &[&SourceSchema]) -> ExtractResult<()> {
        for schema in schemas {
            let path = self.path_of(schema);
            if !path.is_file() {
                return Err(ExtractError::MissingInput {
                    source_name: schema.key.to_string(),
                    path,
                });
            }
        }
        Ok(())
    }

    /// Read one source and check its field mapping against the headers.
    pub fn read(&self, schema: &SourceSchema) -> ExtractResult<RawTable> {
        self.require_all(&[schema])?;
        let path = self.path_of(schema);
        let table = read_csv_file(schema.key, &path)?;
        schema.bind(&table)?;
        if table.is_empty() {
            log_warning(format!("{}: header only, no data rows", schema.file_name));
        }

        log_info_indent(
            format!(
                "{}: {} rows ({}, '{}')",
                schema.file_name,
                table.len(),
                table.encoding,
                format_delimiter(table.delimiter)
            ),
            1,
        );
        Ok(table)
    }

    pub fn extract_socioeconomic(&self) -> ExtractResult<SocioEconomicSources> {
        self.require_all(&[&sources::HDI, &sources::ENERGY, &sources::GDP, &sources::CO2])?;

        let extracted = SocioEconomicSources {
            hdi: self.read(&sources::HDI)?,
            energy: self.read(&sources::ENERGY)?,
            gdp: self.read(&sources::GDP)?,
            co2: self.read(&sources::CO2)?,
        };
        log_success("Extracted 4 indicator sources");
        Ok(extracted)
    }

    pub fn extract_health(&self) -> ExtractResult<HealthSources> {
        self.require_all(&[
            &sources::VACCINATION_INDIA,
            &sources::VACCINATION_BRAZIL,
            &sources::MORTALITY,
        ])?;

        let extracted = HealthSources {
            vaccination_india: self.read(&sources::VACCINATION_INDIA)?,
            vaccination_brazil: self.read(&sources::VACCINATION_BRAZIL)?,
            mortality: self.read(&sources::MORTALITY)?,
        };
        log_success("Extracted 3 health sources");
        Ok(extracted)
    }
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
