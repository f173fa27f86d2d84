//! field/weighting-potential file format
//!
//! parses and writes the ASCII grid files of SPEC_FULL.md section 6: a `##`
//! header line, then rows ordered outer loop over r, inner loop over z, with
//! a blank line between r blocks

use crate::error::SimError;
use std::fs;
use std::io::Write;
use std::path::Path;

/// one row of a field file: r(mm) z(mm) V(V) |E|(V/cm) E_r(V/cm) E_z(V/cm)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldFileRow {
    pub r: f64,
    pub z: f64,
    pub v: f64,
    pub e_mag: f64,
    pub e_r: f64,
    pub e_z: f64,
}

/// one row of a weighting-potential file: r(mm) z(mm) WP in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WpFileRow {
    pub r: f64,
    pub z: f64,
    pub wp: f64,
}

/// parses a field file
///
/// # Arguments
/// - `path`: `&Path`
///
/// # Returns
/// `Result<Vec<FieldFileRow>, SimError>`
///
/// # Errors
/// - the file cannot be read (`SimError::IoError`)
/// - a data line does not have exactly six columns (`SimError::MalformedTable`)
pub fn parse_field_file(path: &Path) -> Result<Vec<FieldFileRow>, SimError> {
    let text = fs::read_to_string(path)
        .map_err(|e| SimError::IoError(format!("reading {}: {e}", path.display())))?;

    let mut rows = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("##") {
            continue;
        }
        let values = parse_columns(line, lineno, 6)?;
        rows.push(FieldFileRow {
            r: values[0],
            z: values[1],
            v: values[2],
            e_mag: values[3],
            e_r: values[4],
            e_z: values[5],
        });
    }
    Ok(rows)
}

/// writes a field file in the format `parse_field_file` reads back
///
/// # Arguments
/// - `path`: `&Path`
/// - `rows`: `&[FieldFileRow]`, already ordered outer loop over r, inner loop over z
///
/// # Returns
/// `Result<(), SimError>`
///
/// # Errors
/// - the file cannot be created or written (`SimError::IoError`)
pub fn write_field_file(path: &Path, rows: &[FieldFileRow]) -> Result<(), SimError> {
    let mut file = fs::File::create(path)
        .map_err(|e| SimError::IoError(format!("creating {}: {e}", path.display())))?;

    writeln!(file, "## r(mm) z(mm) V(V) |E|(V/cm) Er(V/cm) Ez(V/cm)")
        .map_err(|e| SimError::IoError(e.to_string()))?;

    let mut last_r: Option<f64> = None;
    for row in rows {
        if let Some(r) = last_r {
            if r != row.r {
                writeln!(file).map_err(|e| SimError::IoError(e.to_string()))?;
            }
        }
        writeln!(
            file,
            "{} {} {} {} {} {}",
            row.r, row.z, row.v, row.e_mag, row.e_r, row.e_z
        )
        .map_err(|e| SimError::IoError(e.to_string()))?;
        last_r = Some(row.r);
    }

    Ok(())
}

/// parses a weighting-potential file
///
/// # Arguments
/// - `path`: `&Path`
///
/// # Returns
/// `Result<Vec<WpFileRow>, SimError>`
///
/// # Errors
/// - the file cannot be read (`SimError::IoError`)
/// - a data line does not have exactly three columns (`SimError::MalformedTable`)
pub fn parse_wp_file(path: &Path) -> Result<Vec<WpFileRow>, SimError> {
    let text = fs::read_to_string(path)
        .map_err(|e| SimError::IoError(format!("reading {}: {e}", path.display())))?;

    let mut rows = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("##") {
            continue;
        }
        let values = parse_columns(line, lineno, 3)?;
        rows.push(WpFileRow {
            r: values[0],
            z: values[1],
            wp: values[2],
        });
    }
    Ok(rows)
}

/// writes a weighting-potential file in the format `parse_wp_file` reads back
///
/// # Arguments
/// - `path`: `&Path`
/// - `rows`: `&[WpFileRow]`, already ordered outer loop over r, inner loop over z
///
/// # Returns
/// `Result<(), SimError>`
///
/// # Errors
/// - the file cannot be created or written (`SimError::IoError`)
pub fn write_wp_file(path: &Path, rows: &[WpFileRow]) -> Result<(), SimError> {
    let mut file = fs::File::create(path)
        .map_err(|e| SimError::IoError(format!("creating {}: {e}", path.display())))?;

    writeln!(file, "## r(mm) z(mm) WP").map_err(|e| SimError::IoError(e.to_string()))?;

    let mut last_r: Option<f64> = None;
    for row in rows {
        if let Some(r) = last_r {
            if r != row.r {
                writeln!(file).map_err(|e| SimError::IoError(e.to_string()))?;
            }
        }
        writeln!(file, "{} {} {}", row.r, row.z, row.wp)
            .map_err(|e| SimError::IoError(e.to_string()))?;
        last_r = Some(row.r);
    }

    Ok(())
}

fn parse_columns(line: &str, lineno: usize, expected: usize) -> Result<Vec<f64>, SimError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != expected {
        return Err(SimError::MalformedTable(format!(
            "line {}: expected {expected} columns, found {}",
            lineno + 1,
            tokens.len()
        )));
    }
    tokens
        .iter()
        .map(|t| {
            t.parse::<f64>().map_err(|_| {
                SimError::MalformedTable(format!("line {}: invalid float {t:?}", lineno + 1))
            })
        })
        .collect()
}
