//! config module
//!
//! parses the whitespace `key value` configuration file into a `Config`,
//! the flat struct `Setup::new` consumes to build a `Geometry` and the
//! solver/drift/signal parameters

use crate::error::SimError;
use crate::geometry::Geometry;
use log::warn;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// `Config` struct
///
/// one field per recognized configuration key; string fields hold output
/// file paths, everything else is numeric or boolean
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub verbosity_level: u8,

    pub xtal_length: f64,
    pub xtal_radius: f64,
    pub top_bullet_radius: f64,
    pub bottom_bullet_radius: f64,
    pub pc_length: f64,
    pub pc_radius: f64,
    pub bulletize_pc: bool,
    pub taper_length: f64,
    pub wrap_around_radius: f64,
    pub ditch_depth: f64,
    pub ditch_thickness: f64,
    pub li_thickness: f64,

    pub xtal_grid: f64,
    pub impurity_z0: f64,
    pub impurity_gradient: f64,
    pub xtal_hv: f64,
    pub max_iterations: u64,

    pub write_field: bool,
    pub write_wp: bool,
    pub drift_name: String,
    pub field_name: String,
    pub wp_name: String,

    pub xtal_temp: f64,
    pub preamp_tau: f64,
    pub time_steps_calc: usize,
    pub step_time_calc: f64,
    pub step_time_out: f64,
    pub charge_cloud_size: f64,
    pub use_diffusion: bool,
}

/// one recognized key plus the closure that parses and stores its value
struct KeySpec {
    key: &'static str,
    apply: fn(&mut Config, &str) -> Result<(), SimError>,
}

fn parse_f64(key: &str, value: &str) -> Result<f64, SimError> {
    value
        .parse::<f64>()
        .map_err(|_| SimError::ConfigError(format!("{key}: cannot parse '{value}' as a number")))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, SimError> {
    value
        .parse::<u64>()
        .map_err(|_| SimError::ConfigError(format!("{key}: cannot parse '{value}' as an integer")))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, SimError> {
    value
        .parse::<usize>()
        .map_err(|_| SimError::ConfigError(format!("{key}: cannot parse '{value}' as an integer")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, SimError> {
    match value {
        "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        _ => Err(SimError::ConfigError(format!(
            "{key}: '{value}' is not a recognized boolean"
        ))),
    }
}

const KEYS: &[KeySpec] = &[
    KeySpec {
        key: "verbosity_level",
        apply: |c, v| {
            c.verbosity_level = parse_u64("verbosity_level", v)? as u8;
            Ok(())
        },
    },
    KeySpec {
        key: "xtal_length",
        apply: |c, v| {
            c.xtal_length = parse_f64("xtal_length", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "xtal_radius",
        apply: |c, v| {
            c.xtal_radius = parse_f64("xtal_radius", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "top_bullet_radius",
        apply: |c, v| {
            c.top_bullet_radius = parse_f64("top_bullet_radius", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "bottom_bullet_radius",
        apply: |c, v| {
            c.bottom_bullet_radius = parse_f64("bottom_bullet_radius", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "pc_length",
        apply: |c, v| {
            c.pc_length = parse_f64("pc_length", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "pc_radius",
        apply: |c, v| {
            c.pc_radius = parse_f64("pc_radius", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "bulletize_PC",
        apply: |c, v| {
            c.bulletize_pc = parse_bool("bulletize_PC", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "taper_length",
        apply: |c, v| {
            c.taper_length = parse_f64("taper_length", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "wrap_around_radius",
        apply: |c, v| {
            c.wrap_around_radius = parse_f64("wrap_around_radius", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "ditch_depth",
        apply: |c, v| {
            c.ditch_depth = parse_f64("ditch_depth", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "ditch_thickness",
        apply: |c, v| {
            c.ditch_thickness = parse_f64("ditch_thickness", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "Li_thickness",
        apply: |c, v| {
            c.li_thickness = parse_f64("Li_thickness", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "xtal_grid",
        apply: |c, v| {
            c.xtal_grid = parse_f64("xtal_grid", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "impurity_z0",
        apply: |c, v| {
            c.impurity_z0 = parse_f64("impurity_z0", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "impurity_gradient",
        apply: |c, v| {
            c.impurity_gradient = parse_f64("impurity_gradient", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "xtal_HV",
        apply: |c, v| {
            c.xtal_hv = parse_f64("xtal_HV", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "max_iterations",
        apply: |c, v| {
            c.max_iterations = parse_u64("max_iterations", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "write_field",
        apply: |c, v| {
            c.write_field = parse_bool("write_field", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "write_WP",
        apply: |c, v| {
            c.write_wp = parse_bool("write_WP", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "drift_name",
        apply: |c, v| {
            c.drift_name = v.to_string();
            Ok(())
        },
    },
    KeySpec {
        key: "field_name",
        apply: |c, v| {
            c.field_name = v.to_string();
            Ok(())
        },
    },
    KeySpec {
        key: "wp_name",
        apply: |c, v| {
            c.wp_name = v.to_string();
            Ok(())
        },
    },
    KeySpec {
        key: "xtal_temp",
        apply: |c, v| {
            c.xtal_temp = parse_f64("xtal_temp", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "preamp_tau",
        apply: |c, v| {
            c.preamp_tau = parse_f64("preamp_tau", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "time_steps_calc",
        apply: |c, v| {
            c.time_steps_calc = parse_usize("time_steps_calc", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "step_time_calc",
        apply: |c, v| {
            c.step_time_calc = parse_f64("step_time_calc", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "step_time_out",
        apply: |c, v| {
            c.step_time_out = parse_f64("step_time_out", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "charge_cloud_size",
        apply: |c, v| {
            c.charge_cloud_size = parse_f64("charge_cloud_size", v)?;
            Ok(())
        },
    },
    KeySpec {
        key: "use_diffusion",
        apply: |c, v| {
            c.use_diffusion = parse_bool("use_diffusion", v)?;
            Ok(())
        },
    },
];

/// keys without which `Config::validate` cannot build a usable simulation
const REQUIRED_KEYS: &[&str] = &[
    "xtal_length",
    "xtal_radius",
    "pc_length",
    "pc_radius",
    "xtal_HV",
    "impurity_z0",
];

impl Default for Config {
    fn default() -> Config {
        Config {
            verbosity_level: 0,
            xtal_length: 0.0,
            xtal_radius: 0.0,
            top_bullet_radius: 0.0,
            bottom_bullet_radius: 0.0,
            pc_length: 0.0,
            pc_radius: 0.0,
            bulletize_pc: false,
            taper_length: 0.0,
            wrap_around_radius: 0.0,
            ditch_depth: 0.0,
            ditch_thickness: 0.0,
            li_thickness: 0.0,
            xtal_grid: 0.5,
            impurity_z0: 0.0,
            impurity_gradient: 0.0,
            xtal_hv: 0.0,
            max_iterations: crate::constants::DEFAULT_MAX_ITERATIONS,
            write_field: false,
            write_wp: false,
            drift_name: String::new(),
            field_name: String::new(),
            wp_name: String::new(),
            xtal_temp: crate::constants::REF_TEMP,
            preamp_tau: 0.0,
            time_steps_calc: 4096,
            step_time_calc: 1.0,
            step_time_out: 1.0,
            charge_cloud_size: 0.0,
            use_diffusion: false,
        }
    }
}

impl Config {
    /// parses a configuration from an already-open reader
    ///
    /// # Arguments
    /// - `reader`: `impl Read`
    ///
    /// # Returns
    /// `Result<Config, SimError>`
    ///
    /// # Errors
    /// - a line fails to split into exactly a key and a value
    /// - a recognized key's value fails to parse for that key's type
    /// - a required key (see `REQUIRED_KEYS`) is never set
    pub fn from_reader(reader: impl Read) -> Result<Config, SimError> {
        let mut config = Config::default();
        let mut seen = std::collections::HashSet::new();

        for (lineno, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let mut parts = line.splitn(2, char::is_whitespace);
            let key = parts.next().unwrap_or("").trim();
            let value = parts.next().unwrap_or("").trim();
            if key.is_empty() || value.is_empty() {
                return Err(SimError::ConfigError(format!(
                    "line {}: expected 'key value', found '{line}'",
                    lineno + 1
                )));
            }

            match KEYS.iter().find(|spec| spec.key == key) {
                Some(spec) => {
                    (spec.apply)(&mut config, value)?;
                    seen.insert(key);
                }
                None => warn!("line {}: unrecognized config key '{key}' ignored", lineno + 1),
            }
        }

        for required in REQUIRED_KEYS {
            if !seen.contains(required) {
                return Err(SimError::ConfigError(format!(
                    "missing required key '{required}'"
                )));
            }
        }

        Ok(config)
    }

    /// parses a configuration file from disk
    ///
    /// # Arguments
    /// - `path`: `&Path`
    ///
    /// # Returns
    /// `Result<Config, SimError>`
    ///
    /// # Errors
    /// - the file cannot be opened (`SimError::IoError`)
    /// - see `Config::from_reader`
    pub fn from_path(path: &Path) -> Result<Config, SimError> {
        let file = File::open(path)?;
        Config::from_reader(file)
    }

    /// cross-checks the bias/impurity sign convention and the geometry
    /// invariants, without yet constructing a `Geometry`
    ///
    /// # Returns
    /// `Result<(), SimError>`
    ///
    /// # Errors
    /// - `xtal_HV` and `impurity_z0` share a sign (both p-type or both
    ///   n-type conventions require opposite signs)
    pub fn validate(&self) -> Result<(), SimError> {
        if self.xtal_hv != 0.0
            && self.impurity_z0 != 0.0
            && self.xtal_hv.signum() == self.impurity_z0.signum()
        {
            return Err(SimError::ConfigError(format!(
                "xtal_HV ({}) and impurity_z0 ({}) must have opposite signs",
                self.xtal_hv, self.impurity_z0
            )));
        }
        Ok(())
    }

    /// builds the immutable `Geometry` this configuration describes
    ///
    /// # Returns
    /// `Result<Geometry, SimError>`
    ///
    /// # Errors
    /// - `Config::validate` fails
    /// - `Geometry::new` rejects the resulting dimensions
    pub fn into_geometry(&self) -> Result<Geometry, SimError> {
        self.validate()?;
        Geometry::new(
            self.xtal_length,
            self.xtal_radius,
            self.top_bullet_radius,
            self.pc_length,
            self.pc_radius,
            self.taper_length,
            self.wrap_around_radius,
            self.ditch_depth,
            self.ditch_thickness,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn minimal_body() -> &'static str {
        "xtal_length 50.5\n\
         xtal_radius 34.5\n\
         pc_length 2.1\n\
         pc_radius 1.4\n\
         xtal_HV 2500\n\
         impurity_z0 -0.318\n"
    }

    /// tests that a well-formed config with all required keys parses
    ///
    /// # Errors
    /// - a recognized field does not match the value written in the body
    #[test]
    fn parses_minimal_config() {
        let cfg = Config::from_reader(Cursor::new(minimal_body())).unwrap();
        assert_eq!(cfg.xtal_length, 50.5);
        assert_eq!(cfg.pc_radius, 1.4);
        assert_eq!(cfg.impurity_z0, -0.318);
    }

    /// tests that comments and blank lines are tolerated
    ///
    /// # Errors
    /// - a comment or blank line is mistaken for a key/value pair
    #[test]
    fn tolerates_comments_and_blank_lines() {
        let body = format!("# a comment\n\n{}\n  # trailing\n", minimal_body());
        let cfg = Config::from_reader(Cursor::new(body)).unwrap();
        assert_eq!(cfg.xtal_radius, 34.5);
    }

    /// tests that an unrecognized key is tolerated, not fatal
    ///
    /// # Errors
    /// - an unknown key causes `from_reader` to fail instead of warning
    #[test]
    fn tolerates_unknown_key() {
        let body = format!("{}\nsome_future_key 7\n", minimal_body());
        let cfg = Config::from_reader(Cursor::new(body)).unwrap();
        assert_eq!(cfg.xtal_length, 50.5);
    }

    /// tests that a missing required key is a fatal config error
    ///
    /// # Errors
    /// - omitting `xtal_HV` does not return `SimError::ConfigError`
    #[test]
    fn missing_required_key_is_fatal() {
        let body = "xtal_length 50.5\nxtal_radius 34.5\npc_length 2.1\npc_radius 1.4\nimpurity_z0 -0.318\n";
        let err = Config::from_reader(Cursor::new(body)).unwrap_err();
        assert!(matches!(err, SimError::ConfigError(_)));
    }

    /// tests that same-sign bias and impurity are rejected
    ///
    /// # Errors
    /// - `validate` accepts a bias/impurity pair sharing a sign
    #[test]
    fn rejects_same_sign_bias_and_impurity() {
        let body = minimal_body().replace("impurity_z0 -0.318", "impurity_z0 0.318");
        let cfg = Config::from_reader(Cursor::new(body)).unwrap();
        assert!(cfg.validate().is_err());
    }

    /// tests that a valid config builds a Geometry
    ///
    /// # Errors
    /// - `into_geometry` fails for a self-consistent minimal config
    #[test]
    fn builds_geometry() {
        let cfg = Config::from_reader(Cursor::new(minimal_body())).unwrap();
        assert!(cfg.into_geometry().is_ok());
    }
}
