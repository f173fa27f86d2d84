//! velocity module
//!
//! tabulated, temperature-corrected, anisotropic charge-carrier drift velocity
//! as a function of local electric field

use crate::constants::{MAX_TEMP, MIN_TEMP, REF_TEMP};
use crate::error::SimError;
use crate::helpers::vec3::Vec3;
use crate::io::velocity_table::parse_velocity_table;
use std::path::Path;

/// `Carrier` enum
///
/// distinguishes which half of the velocity table a query draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    Electron,
    Hole,
}

/// `MobilityParams` struct
///
/// per-carrier Omar-Reggiani coefficients loaded from a table's summary line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MobilityParams {
    /// (cm^2 / V*s) low-field mobility at T = 1 K
    pub mu0_1: f64,

    /// temperature exponent in mu0(T) = mu0(1) * T^p
    pub p: f64,

    /// (mm/ns) saturation velocity
    pub v_sat: f64,

    /// (K) Debye temperature, carried through from the table file but not
    /// consumed by the beta -> 1 limit of the Omar-Reggiani correction used here
    pub theta: f64,
}

/// `Row` struct
///
/// one measured row of the velocity table: field magnitude plus the raw
/// <100>/<110>/<111> velocities for both carriers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Row {
    /// (V/cm) field magnitude
    pub e: f64,

    pub v_e100: f64,
    pub v_e110: f64,
    pub v_e111: f64,
    pub v_h100: f64,
    pub v_h110: f64,
    pub v_h111: f64,
}

impl Row {
    fn raw(&self, carrier: Carrier) -> (f64, f64, f64) {
        match carrier {
            Carrier::Electron => (self.v_e100, self.v_e110, self.v_e111),
            Carrier::Hole => (self.v_h100, self.v_h110, self.v_h111),
        }
    }
}

/// per-row anisotropy coefficients and the slope to the next row, so that
/// in-range interpolation is one multiply-add per coefficient
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Derived {
    /// coefficient of the sin^2(2phi)*sin^4(theta) azimuthal term, equal to v100 - v110
    c: f64,

    /// coefficient of the sin^4(theta) term; the sin^2(theta) term's coefficient is -b,
    /// forced by the cubic-symmetry constraint that theta=pi/2, phi=0 must reproduce v100
    b: f64,

    /// slope of `b` to the next row's `b`, per V/cm
    slope_b: f64,

    /// slope of `c` to the next row's `c`, per V/cm
    slope_c: f64,

    /// slope of the raw v100 velocity to the next row's v100, per V/cm
    slope_v100: f64,
}

/// `VelocityTable` struct
///
/// an ordered, field-indexed table of anisotropic carrier drift velocities
#[derive(Debug, Clone)]
pub struct VelocityTable {
    rows: Vec<Row>,
    electron_params: MobilityParams,
    hole_params: MobilityParams,
    electron_derived: Vec<Derived>,
    hole_derived: Vec<Derived>,
}

impl VelocityTable {
    /// `VelocityTable` constructor
    ///
    /// # Arguments
    /// - `rows`: `Vec<Row>` strictly ascending in `e`, anchored at `e == 0`
    /// - `electron_params`: `MobilityParams`
    /// - `hole_params`: `MobilityParams`
    ///
    /// # Returns
    /// `Result<VelocityTable, SimError>`
    ///
    /// # Errors
    /// - `rows` is empty, not anchored at `e == 0`, or not strictly ascending
    pub fn new(
        rows: Vec<Row>,
        electron_params: MobilityParams,
        hole_params: MobilityParams,
    ) -> Result<VelocityTable, SimError> {
        if rows.is_empty() {
            return Err(SimError::MalformedTable("table has no rows".into()));
        }
        if rows[0].e != 0.0 {
            return Err(SimError::MalformedTable(
                "table is not anchored at E = 0".into(),
            ));
        }
        for pair in rows.windows(2) {
            if pair[1].e <= pair[0].e {
                return Err(SimError::MalformedTable(format!(
                    "table rows must be strictly ascending in E, found {} then {}",
                    pair[0].e, pair[1].e
                )));
            }
        }

        let electron_derived = Self::prepare(&rows, Carrier::Electron);
        let hole_derived = Self::prepare(&rows, Carrier::Hole);

        Ok(VelocityTable {
            rows,
            electron_params,
            hole_params,
            electron_derived,
            hole_derived,
        })
    }

    /// loads a velocity table from the line-oriented file format of SPEC_FULL.md section 6
    ///
    /// # Arguments
    /// - `path`: `&Path` path to the table file
    ///
    /// # Returns
    /// `Result<VelocityTable, SimError>`
    ///
    /// # Errors
    /// - the file cannot be read (`SimError::IoError`)
    /// - the file is structurally invalid (`SimError::MalformedTable`)
    pub fn load(path: &Path) -> Result<VelocityTable, SimError> {
        let (rows, electron_params, hole_params) = parse_velocity_table(path)?;
        Self::new(rows, electron_params, hole_params)
    }

    /// closed-form inversion of the three axis measurements into (a, b, c)
    /// coefficients, under the cubic-symmetry constraint that the <100>-type
    /// direction (theta = pi/2, phi = 0) must reproduce v100 exactly, which
    /// forces a = -b; see DESIGN.md for the full derivation
    fn prepare(rows: &[Row], carrier: Carrier) -> Vec<Derived> {
        let mut derived: Vec<Derived> = rows
            .iter()
            .map(|row| {
                let (v100, v110, v111) = row.raw(carrier);
                let c = v100 - v110;
                let a = 4.5 * (v100 - v111) - 2.0 * (v100 - v110);
                let b = -a;
                Derived {
                    c,
                    b,
                    slope_b: 0.0,
                    slope_c: 0.0,
                    slope_v100: 0.0,
                }
            })
            .collect();

        for i in 0..derived.len().saturating_sub(1) {
            let de = rows[i + 1].e - rows[i].e;
            let (v100_lo, _, _) = rows[i].raw(carrier);
            let (v100_hi, _, _) = rows[i + 1].raw(carrier);
            derived[i].slope_b = (derived[i + 1].b - derived[i].b) / de;
            derived[i].slope_c = (derived[i + 1].c - derived[i].c) / de;
            derived[i].slope_v100 = (v100_hi - v100_lo) / de;
        }

        derived
    }

    /// rescales every row's velocities to a new operating temperature using the
    /// Omar-Reggiani mobility-saturation model in its beta -> 1 limit
    ///
    /// # Arguments
    /// - `&mut self`
    /// - `temp_k`: f64 target temperature in kelvin
    ///
    /// # Returns
    /// `Result<(), SimError>`
    ///
    /// # Errors
    /// - `temp_k` falls outside [77, 110] K (`SimError::OutOfTemperatureRange`)
    pub fn correct(&mut self, temp_k: f64) -> Result<(), SimError> {
        if !(MIN_TEMP..=MAX_TEMP).contains(&temp_k) {
            return Err(SimError::OutOfTemperatureRange(temp_k));
        }

        for row in self.rows.iter_mut() {
            if row.e == 0.0 {
                continue;
            }
            let scale_e = velocity_ratio(row.e, &self.electron_params, temp_k);
            let scale_h = velocity_ratio(row.e, &self.hole_params, temp_k);
            row.v_e100 *= scale_e;
            row.v_e110 *= scale_e;
            row.v_e111 *= scale_e;
            row.v_h100 *= scale_h;
            row.v_h110 *= scale_h;
            row.v_h111 *= scale_h;
        }

        self.electron_derived = Self::prepare(&self.rows, Carrier::Electron);
        self.hole_derived = Self::prepare(&self.rows, Carrier::Hole);

        Ok(())
    }

    /// queries the anisotropic drift velocity for a carrier at a local field
    ///
    /// # Arguments
    /// - `&self`
    /// - `charge`: f64 sign determines the carrier (positive => hole, negative => electron)
    /// - `field`: `Vec3` local electric field, (V/cm)
    ///
    /// # Returns
    /// `Result<Vec3, SimError>`, drift velocity in mm/ns
    ///
    /// # Errors
    /// - `|field|` exceeds the table's last row (`SimError::OutOfField`)
    pub fn drift_velocity(&self, charge: f64, field: Vec3) -> Result<Vec3, SimError> {
        let e_mag = field.norm();
        if e_mag == 0.0 {
            return Ok(Vec3::default());
        }

        let carrier = if charge > 0.0 {
            Carrier::Hole
        } else {
            Carrier::Electron
        };

        let last = self.rows.last().expect("table is non-empty by construction");
        if e_mag > last.e {
            return Err(SimError::OutOfField {
                r: field.r(),
                z: field.z,
            });
        }

        let idx = self.bracket(e_mag);
        let delta = e_mag - self.rows[idx].e;
        let derived = match carrier {
            Carrier::Electron => &self.electron_derived[idx],
            Carrier::Hole => &self.hole_derived[idx],
        };
        let (v100_row, _, _) = self.rows[idx].raw(carrier);

        let v100 = v100_row + delta * derived.slope_v100;
        let b = derived.b + delta * derived.slope_b;
        let c = derived.c + delta * derived.slope_c;
        let a = -b;

        let theta = field.theta();
        let phi = field.phi();
        let sin2theta = theta.sin().powi(2);
        let sin4theta = sin2theta * sin2theta;
        let sin2_2phi = (2.0 * phi).sin().powi(2);

        let v_scalar = v100 - a * sin2theta - b * sin4theta - c * sin2_2phi * sin4theta;

        let sign = if charge > 0.0 { 1.0 } else { -1.0 };
        let direction = field * (1.0 / e_mag);
        Ok(direction * (v_scalar * sign))
    }

    /// binary-searches for the row index `i` such that `rows[i].e <= e_mag <= rows[i+1].e`
    fn bracket(&self, e_mag: f64) -> usize {
        let last_lo = self.rows.len().saturating_sub(2);
        match self
            .rows
            .binary_search_by(|row| row.e.partial_cmp(&e_mag).unwrap())
        {
            Ok(i) => i.min(last_lo),
            Err(i) => i.saturating_sub(1).min(last_lo),
        }
    }
}

/// Omar-Reggiani velocity-saturation model in its beta -> 1 limit, divided by
/// its own value at the table's reference temperature
fn velocity_ratio(e: f64, params: &MobilityParams, temp_k: f64) -> f64 {
    let model = |t: f64| -> f64 {
        let mu0 = params.mu0_1 * t.powf(params.p);
        (mu0 * e) / (1.0 + (mu0 * e) / params.v_sat)
    };

    let reference = model(REF_TEMP);
    if reference == 0.0 {
        1.0
    } else {
        model(temp_k) / reference
    }
}
