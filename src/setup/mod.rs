//! setup module
//!
//! `Setup` is the facade a caller constructs once per loaded field: it owns
//! the `FieldStore` and `VelocityTable` a drift/signal call needs and
//! exposes the per-event `get_signal` operation, building a fresh
//! `DriftIntegrator`/`SignalGenerator` pair on each call so two events can
//! run from independent `Setup` instances without sharing mutable state

use crate::config::Config;
use crate::drift::DriftIntegrator;
use crate::error::SimError;
use crate::field::store::FieldStore;
use crate::geometry::Geometry;
use crate::helpers::vec3::Vec3;
use crate::signal::SignalGenerator;
use crate::velocity::VelocityTable;
use log::debug;
use std::path::Path;

/// `Setup` struct
///
/// owns the loaded field/velocity data and the per-event parameters derived
/// from a `Config`
pub struct Setup {
    geometry: Geometry,
    field: FieldStore,
    velocity: VelocityTable,
    n_calc: usize,
    n_out: usize,
    dt_calc: f64,
    dt_out: f64,
    preamp_tau: f64,
    charge_cloud_size: f64,
    use_diffusion: bool,
    temp_k: f64,
}

impl Setup {
    /// `Setup` constructor
    ///
    /// # Arguments
    /// - `config`: `&Config`
    /// - `field_path`: `&Path` previously solved E-field table
    /// - `wp_path`: `Option<&Path>` previously solved weighting-potential table
    /// - `velocity_path`: `&Path` drift-velocity table
    ///
    /// # Returns
    /// `Result<Setup, anyhow::Error>`
    ///
    /// # Errors
    /// - `config.into_geometry()` rejects the geometry
    /// - the velocity table fails to load, or `xtal_temp` is out of the
    ///   Omar-Reggiani correction range
    /// - the field or weighting-potential tables fail to load
    pub fn new(
        config: &Config,
        field_path: &Path,
        wp_path: Option<&Path>,
        velocity_path: &Path,
    ) -> Result<Setup, anyhow::Error> {
        let geometry = config.into_geometry()?;

        let mut velocity = VelocityTable::load(velocity_path)?;
        velocity.correct(config.xtal_temp)?;

        let field = FieldStore::load(field_path, wp_path)?;

        let n_out = ((config.time_steps_calc as f64 * config.step_time_calc
            / config.step_time_out)
            .round() as usize)
            .max(1);

        Ok(Setup {
            geometry,
            field,
            velocity,
            n_calc: config.time_steps_calc,
            n_out,
            dt_calc: config.step_time_calc,
            dt_out: config.step_time_out,
            preamp_tau: config.preamp_tau,
            charge_cloud_size: config.charge_cloud_size,
            use_diffusion: config.use_diffusion,
            temp_k: config.xtal_temp,
        })
    }

    /// drifts both carriers from `start` and returns the fully processed
    /// output pulse
    ///
    /// # Arguments
    /// - `start`: `Vec3` (mm) event position
    ///
    /// # Returns
    /// `Result<Vec<f64>, SimError>`, length `n_out`
    ///
    /// # Errors
    /// - the hole drift fails; see `SignalGenerator::get_signal`
    pub fn get_signal(&self, start: Vec3) -> Result<Vec<f64>, SimError> {
        let generator = self.signal_generator();
        generator.get_signal(start)
    }

    /// drifts both carriers from `start` and returns their raw position
    /// traces, for diagnostic output
    ///
    /// # Arguments
    /// - `start`: `Vec3` (mm) event position
    ///
    /// # Returns
    /// `Result<(Vec<Vec3>, Option<Vec<Vec3>>), SimError>`, hole trace
    /// always present, electron trace `None` if its drift failed
    ///
    /// # Errors
    /// - the hole drift fails
    pub fn drift_traces(&self, start: Vec3) -> Result<(Vec<Vec3>, Option<Vec<Vec3>>), SimError> {
        let integrator = self.drift_integrator();
        let hole = integrator.make_signal(start, 1.0)?;
        let electron = match integrator.make_signal(start, -1.0) {
            Ok(result) => Some(result.trace),
            Err(err) => {
                debug!("electron drift from {start} failed: {err}");
                None
            }
        };
        Ok((hole.trace, electron))
    }

    fn drift_integrator(&self) -> DriftIntegrator<'_> {
        DriftIntegrator::new(
            &self.geometry,
            &self.field,
            &self.velocity,
            self.n_calc,
            self.dt_calc,
            self.charge_cloud_size,
            self.use_diffusion,
            self.temp_k,
        )
    }

    fn signal_generator(&self) -> SignalGenerator<'_> {
        SignalGenerator::new(
            self.drift_integrator(),
            self.n_calc,
            self.n_out,
            self.dt_calc,
            self.dt_out,
            self.preamp_tau,
            self.charge_cloud_size,
            self.use_diffusion,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::field_file::{write_field_file, FieldFileRow};

    fn write_velocity_table(path: &Path) {
        use std::io::Write;
        let mut f = std::fs::File::create(path).unwrap();
        writeln!(f, "0.0 0.0 0.0 0.0 0.0 0.0 0.0").unwrap();
        writeln!(f, "1.0e5 0.1 0.095 0.09 0.08 0.078 0.076").unwrap();
        writeln!(f, "e 4.0e7 -1.68 0.1 80.0").unwrap();
        writeln!(f, "h 4.0e7 -1.68 0.1 80.0").unwrap();
    }

    fn write_flat_field(path: &Path) {
        let mut rows = Vec::new();
        for i in 0..40 {
            for k in 0..60 {
                rows.push(FieldFileRow {
                    r: i as f64,
                    z: k as f64,
                    v: 0.0,
                    e_mag: 0.0,
                    e_r: 0.0,
                    e_z: 100.0,
                });
            }
        }
        write_field_file(path, &rows).unwrap();
    }

    fn minimal_config() -> Config {
        let mut cfg = Config::default();
        cfg.xtal_length = 50.5;
        cfg.xtal_radius = 34.5;
        cfg.pc_length = 2.1;
        cfg.pc_radius = 1.4;
        cfg.xtal_hv = 2500.0;
        cfg.impurity_z0 = -0.318;
        cfg.xtal_temp = 90.0;
        cfg.time_steps_calc = 50;
        cfg.step_time_calc = 1.0;
        cfg.step_time_out = 1.0;
        cfg.preamp_tau = 30.0;
        cfg.charge_cloud_size = 0.05;
        cfg
    }

    /// tests that `Setup::new` loads successfully from on-disk tables
    ///
    /// # Errors
    /// - a self-consistent config and matching tables fail to build a `Setup`
    #[test]
    fn builds_from_tables() {
        let dir = tempfile::tempdir().unwrap();
        let field_path = dir.path().join("field.dat");
        let velocity_path = dir.path().join("velocity.dat");
        write_flat_field(&field_path);
        write_velocity_table(&velocity_path);

        let config = minimal_config();
        let setup = Setup::new(&config, &field_path, None, &velocity_path).unwrap();

        let result = setup.get_signal(Vec3::new(0.0, 0.0, 25.0));
        assert!(result.is_ok());
    }

    /// tests that a start point outside the detector is rejected end to end
    ///
    /// # Errors
    /// - a point outside the crystal does not return `OutsideDetector`
    #[test]
    fn rejects_event_outside_detector() {
        let dir = tempfile::tempdir().unwrap();
        let field_path = dir.path().join("field.dat");
        let velocity_path = dir.path().join("velocity.dat");
        write_flat_field(&field_path);
        write_velocity_table(&velocity_path);

        let config = minimal_config();
        let setup = Setup::new(&config, &field_path, None, &velocity_path).unwrap();

        let err = setup.get_signal(Vec3::new(0.0, 0.0, 60.0)).unwrap_err();
        assert!(matches!(err, SimError::OutsideDetector { .. }));
    }
}
