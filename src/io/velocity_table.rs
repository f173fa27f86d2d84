//! velocity-table file format
//!
//! parses the line-oriented drift-velocity table of SPEC_FULL.md section 6:
//! rows of seven floats (E, v_e100, v_e110, v_e111, v_h100, v_h110, v_h111),
//! ascending in E, followed by an `e ...` and an `h ...` summary line each
//! carrying the four Omar-Reggiani coefficients for that carrier

use crate::error::SimError;
use crate::velocity::{MobilityParams, Row};
use std::fs;
use std::path::Path;

/// parses a velocity-table file
///
/// # Arguments
/// - `path`: `&Path`
///
/// # Returns
/// `Result<(Vec<Row>, MobilityParams, MobilityParams), SimError>`, electron
/// params first, then hole params
///
/// # Errors
/// - the file cannot be read (`SimError::IoError`)
/// - a data row does not have exactly seven columns, or a summary line does
///   not have exactly four columns following its `e`/`h` tag
///   (`SimError::MalformedTable`)
/// - the `e` or `h` summary line is missing (`SimError::MalformedTable`)
pub fn parse_velocity_table(
    path: &Path,
) -> Result<(Vec<Row>, MobilityParams, MobilityParams), SimError> {
    let text = fs::read_to_string(path)
        .map_err(|e| SimError::IoError(format!("reading {}: {e}", path.display())))?;

    let mut rows = Vec::new();
    let mut electron_params: Option<MobilityParams> = None;
    let mut hole_params: Option<MobilityParams> = None;

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();

        match tokens[0].to_ascii_lowercase().as_str() {
            "e" | "h" => {
                let values = parse_floats(&tokens[1..], lineno, 4)?;
                let params = MobilityParams {
                    mu0_1: values[0],
                    p: values[1],
                    v_sat: values[2],
                    theta: values[3],
                };
                if tokens[0].eq_ignore_ascii_case("e") {
                    electron_params = Some(params);
                } else {
                    hole_params = Some(params);
                }
            }
            _ => {
                let values = parse_floats(&tokens, lineno, 7)?;
                rows.push(Row {
                    e: values[0],
                    v_e100: values[1],
                    v_e110: values[2],
                    v_e111: values[3],
                    v_h100: values[4],
                    v_h110: values[5],
                    v_h111: values[6],
                });
            }
        }
    }

    let electron_params = electron_params.ok_or_else(|| {
        SimError::MalformedTable("missing electron (e) summary line".into())
    })?;
    let hole_params =
        hole_params.ok_or_else(|| SimError::MalformedTable("missing hole (h) summary line".into()))?;

    Ok((rows, electron_params, hole_params))
}

fn parse_floats(tokens: &[&str], lineno: usize, expected: usize) -> Result<Vec<f64>, SimError> {
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
