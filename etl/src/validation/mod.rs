//! Referential integrity gate run before any table is loaded.
//!
//! Checks, for a set of output tables:
//!
//! - every row has one cell per declared column
//! - non-nullable columns hold no null or NaN
//! - each dimension's surrogate keys are a permutation of `1..=N`
//! - each fact foreign key exists in the referenced dimension
//!
//! A failure here is a pipeline defect, not a data-quality drop, and
//! aborts the run.

use std::collections::{HashMap, HashSet};

use crate::error::{IntegrityError, IntegrityResult};
use crate::load::Table;

/// Validate a complete star schema.
pub fn validate_star(tables: &[Table]) -> IntegrityResult<()> {
    for table in tables {
        check_cells(table)?;
    }

    let mut keys: HashMap<&str, HashSet<i64>> = HashMap::new();
    for table in tables {
        if let Some(pk) = table.spec.primary_key {
            keys.insert(table.spec.name, check_dense_keys(table, pk)?);
        }
    }

    for table in tables {
        check_foreign_keys(table, &keys)?;
    }
    Ok(())
}

fn check_cells(table: &Table) -> IntegrityResult<()> {
    let spec = table.spec;
    for (row_idx, row) in table.rows.iter().enumerate() {
        if row.len() != spec.columns.len() {
            return Err(IntegrityError::Arity {
                table: spec.display_name().to_string(),
                row: row_idx,
                expected: spec.columns.len(),
                found: row.len(),
            });
        }
        for (cell, column) in row.iter().zip(spec.columns) {
            if !column.nullable && cell.is_null() {
                return Err(IntegrityError::NullValue {
                    table: spec.display_name().to_string(),
                    row: row_idx,
                    column: column.display.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Surrogate keys must be exactly `{1, ..., N}` with no repeats.
fn check_dense_keys(table: &Table, pk: &str) -> IntegrityResult<HashSet<i64>> {
    let name = table.spec.display_name();
    let non_dense = |message: String| IntegrityError::NonDenseKeys {
        table: name.to_string(),
        message,
    };

    let values = table
        .column_values(pk)
        .ok_or_else(|| non_dense(format!("no key column {}", pk)))?;

    let n = table.len() as i64;
    let mut seen = HashSet::with_capacity(table.len());
    for cell in values {
        let id = cell
            .as_int()
            .ok_or_else(|| non_dense(format!("non-integer key {:?}", cell)))?;
        if id < 1 || id > n {
            return Err(non_dense(format!("key {} outside 1..={}", id, n)));
        }
        if !seen.insert(id) {
            return Err(non_dense(format!("key {} repeated", id)));
        }
    }
    Ok(seen)
}

fn check_foreign_keys(table: &Table, keys: &HashMap<&str, HashSet<i64>>) -> IntegrityResult<()> {
    let spec = table.spec;
    for fk in spec.foreign_keys {
        let referenced = keys.get(fk.references).ok_or_else(|| IntegrityError::UnknownDimension {
            table: spec.display_name().to_string(),
            dimension: fk.references.to_string(),
        })?;
        let Some(idx) = spec.column_index(fk.column) else {
            continue;
        };
        let display = spec.columns[idx].display;

        for (row_idx, row) in table.rows.iter().enumerate() {
            let value = match row[idx].as_int() {
                Some(v) => v,
                None if row[idx].is_null() => {
                    return Err(IntegrityError::NullValue {
                        table: spec.display_name().to_string(),
                        row: row_idx,
                        column: display.to_string(),
                    })
                }
                None => i64::MIN,
            };
            if !referenced.contains(&value) {
                return Err(IntegrityError::DanglingForeignKey {
                    table: spec.display_name().to_string(),
                    row: row_idx,
                    column: display.to_string(),
                    value,
                    dimension: fk.references.to_string(),
                });
            }
        }
    }
    Ok(())
}
