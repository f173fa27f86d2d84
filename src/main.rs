//! driver binary crate
//!
//! thin field-solver CLI: parse a handful of flags by hand, load a
//! `Config`, run the relaxation solver, and write the field/weighting-
//! potential tables for the signal stage to load back later

use anyhow::{anyhow, Result};
use hpge_field_sim::config::Config;
use hpge_field_sim::io::field_file::{write_field_file, write_wp_file, FieldFileRow, WpFileRow};
use hpge_field_sim::solver::{solve_bias, solve_weighting, BiasSolution, WeightingSolution};
use std::path::PathBuf;

struct Flags {
    config_path: PathBuf,
    bias_override: Option<f64>,
    verbosity_override: Option<u8>,
    write_override: Option<bool>,
}

/// hand-rolled parser for `-c <config>` `-b <bias_volts>` `-w {0|1|2}` `-p {0|1}`
///
/// # Arguments
/// - `args`: `&[String]`, excluding the program name
///
/// # Returns
/// `Result<Flags, anyhow::Error>`
///
/// # Errors
/// - `-c` is missing, or any flag's value is missing or fails to parse
fn parse_flags(args: &[String]) -> Result<Flags> {
    let mut config_path = None;
    let mut bias_override = None;
    let mut verbosity_override = None;
    let mut write_override = None;

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = args
            .get(i + 1)
            .ok_or_else(|| anyhow!("flag {flag} is missing its value"))?;

        match flag {
            "-c" => config_path = Some(PathBuf::from(value)),
            "-b" => {
                bias_override = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| anyhow!("-b: '{value}' is not a valid bias in volts"))?,
                )
            }
            "-w" => {
                verbosity_override = Some(
                    value
                        .parse::<u8>()
                        .map_err(|_| anyhow!("-w: '{value}' must be 0, 1, or 2"))?,
                )
            }
            "-p" => {
                write_override = Some(match value.as_str() {
                    "0" => false,
                    "1" => true,
                    _ => return Err(anyhow!("-p: '{value}' must be 0 or 1")),
                })
            }
            other => return Err(anyhow!("unrecognized flag {other}")),
        }
        i += 2;
    }

    Ok(Flags {
        config_path: config_path.ok_or_else(|| anyhow!("-c <config> is required"))?,
        bias_override,
        verbosity_override,
        write_override,
    })
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// main driver function
///
/// # Returns
/// `Result<(), anyhow::Error>`
///
/// # Errors
/// - flag parsing, config loading, or writing the output tables fails
fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let flags = match parse_flags(&args) {
        Ok(flags) => flags,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(flags) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    Ok(())
}

fn run(flags: Flags) -> Result<()> {
    let mut config = Config::from_path(&flags.config_path)?;

    if let Some(bias) = flags.bias_override {
        config.xtal_hv = bias;
    }
    if let Some(verbosity) = flags.verbosity_override {
        config.verbosity_level = verbosity;
    }
    if let Some(write) = flags.write_override {
        config.write_field = write;
        config.write_wp = write;
    }

    init_logging(config.verbosity_level);

    let geometry = config.into_geometry()?;

    let bias_solution = solve_bias(
        &geometry,
        config.xtal_hv,
        config.impurity_z0,
        config.impurity_gradient,
        config.xtal_grid,
        config.max_iterations,
    );

    let weighting_solution = solve_weighting(
        &geometry,
        config.xtal_grid,
        config.max_iterations,
        Some(&bias_solution.undepleted),
    );

    if config.write_field {
        let rows = field_rows(&bias_solution);
        write_field_file(std::path::Path::new(&config.field_name), &rows)?;
    }

    if config.write_wp {
        let rows = wp_rows(&weighting_solution, config.xtal_grid);
        write_wp_file(std::path::Path::new(&config.wp_name), &rows)?;
    }

    Ok(())
}

fn field_rows(solution: &BiasSolution) -> Vec<FieldFileRow> {
    let nr = solution.potential.nr();
    let nz = solution.potential.nz();
    let h = solution.h;

    let mut rows = Vec::with_capacity(nr * nz);
    for i in 0..nr {
        for k in 0..nz {
            let e_r = solution.e_r[(i, k)];
            let e_z = solution.e_z[(i, k)];
            rows.push(FieldFileRow {
                r: i as f64 * h,
                z: k as f64 * h,
                v: solution.potential[(i, k)],
                e_mag: (e_r * e_r + e_z * e_z).sqrt(),
                e_r,
                e_z,
            });
        }
    }
    rows
}

fn wp_rows(solution: &WeightingSolution, h: f64) -> Vec<WpFileRow> {
    let nr = solution.potential.nr();
    let nz = solution.potential.nz();

    let mut rows = Vec::with_capacity(nr * nz);
    for i in 0..nr {
        for k in 0..nz {
            rows.push(WpFileRow {
                r: i as f64 * h,
                z: k as f64 * h,
                wp: solution.potential[(i, k)],
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    /// tests that a bare `-c` flag with no value is rejected
    ///
    /// # Errors
    /// - a dangling `-c` flag does not produce an error
    #[test]
    fn rejects_flag_with_missing_value() {
        let args = vec!["-c".to_string()];
        assert!(parse_flags(&args).is_err());
    }

    /// tests that a well-formed flag set parses into the expected overrides
    ///
    /// # Errors
    /// - a recognized flag's value is not reflected in the parsed `Flags`
    #[test]
    fn parses_all_flags() {
        let args = vec![
            "-c".to_string(),
            "config.txt".to_string(),
            "-b".to_string(),
            "3000".to_string(),
            "-w".to_string(),
            "2".to_string(),
            "-p".to_string(),
            "1".to_string(),
        ];
        let flags = parse_flags(&args).unwrap();
        assert_eq!(flags.config_path, PathBuf::from("config.txt"));
        assert_eq!(flags.bias_override, Some(3000.0));
        assert_eq!(flags.verbosity_override, Some(2));
        assert_eq!(flags.write_override, Some(true));
    }

    /// tests that an unrecognized flag is rejected
    ///
    /// # Errors
    /// - an unknown flag does not produce an error
    #[test]
    fn rejects_unrecognized_flag() {
        let args = vec!["-x".to_string(), "1".to_string()];
        assert!(parse_flags(&args).is_err());
    }
}
