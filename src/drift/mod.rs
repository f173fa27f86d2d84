//! charge-drift integrator
//!
//! propagates a point charge through the precomputed E-field, recording its
//! trace and the induced-charge increments it leaves on the point contact via
//! the Shockley-Ramo theorem

use crate::constants::{BOLTZMANN, ELEC_CHARGE, WP_NEAR_BUDGET, WP_SATURATED, WP_STEP_FLOOR};
use crate::error::SimError;
use crate::field::store::FieldStore;
use crate::geometry::Geometry;
use crate::helpers::vec3::Vec3;
use crate::velocity::VelocityTable;

/// why a drift trace stopped advancing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// the carrier left the loaded field grid
    LeftField,
    /// the weighting potential saturated or nearly stopped changing near an
    /// electrode
    LowField,
    /// the step budget (`n_calc`) was exhausted while still in a high-field
    /// region
    ExhaustedSteps,
}

/// outcome of one `make_signal` call for a single carrier
#[derive(Debug, Clone)]
pub struct DriftResult {
    /// per-step induced-charge increment, length `n_calc`
    pub signal: Vec<f64>,
    /// recorded Cartesian positions, one per step taken
    pub trace: Vec<Vec3>,
    /// why the trace stopped
    pub stop_reason: StopReason,
    /// (mm/ns) speed latched at the second step, used by the post-processor
    /// to size the Gaussian convolution kernel
    pub initial_vel: f64,
    /// (mm^2) final charge-cloud size, grown by diffusion if enabled
    pub final_cloud_sq: f64,
    /// (mm/ns) speed at the last step taken
    pub final_vel: f64,
}

/// a no-op trapping hook: called once per step, mutates nothing
fn no_trapping(_p: Vec3, _charge: f64, _dt: f64) {}

/// `DriftIntegrator` struct
///
/// owns references to the field/velocity data a drift call needs plus the
/// per-call step budget and charge-cloud parameters
pub struct DriftIntegrator<'a> {
    geometry: &'a Geometry,
    field: &'a FieldStore,
    velocity: &'a VelocityTable,
    n_calc: usize,
    dt: f64,
    charge_cloud_size: f64,
    use_diffusion: bool,
    temp_k: f64,
    charge_trapping: Box<dyn Fn(Vec3, f64, f64)>,
}

impl<'a> DriftIntegrator<'a> {
    /// `DriftIntegrator` constructor
    ///
    /// # Arguments
    /// - `geometry`: `&Geometry`
    /// - `field`: `&FieldStore`
    /// - `velocity`: `&VelocityTable`
    /// - `n_calc`: `usize` number of drift steps budgeted per event
    /// - `dt`: `f64` (ns) per-step time increment
    /// - `charge_cloud_size`: `f64` (mm) initial charge-cloud radius
    /// - `use_diffusion`: `bool` whether to grow the cloud size with a
    ///   thermal-diffusion term
    /// - `temp_k`: `f64` (K) crystal temperature, used by the diffusion term
    ///
    /// # Returns
    /// `DriftIntegrator<'a>`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        geometry: &'a Geometry,
        field: &'a FieldStore,
        velocity: &'a VelocityTable,
        n_calc: usize,
        dt: f64,
        charge_cloud_size: f64,
        use_diffusion: bool,
        temp_k: f64,
    ) -> DriftIntegrator<'a> {
        DriftIntegrator {
            geometry,
            field,
            velocity,
            n_calc,
            dt,
            charge_cloud_size,
            use_diffusion,
            temp_k,
            charge_trapping: Box::new(no_trapping),
        }
    }

    /// drifts a single carrier from `start` under the field, accumulating
    /// the Shockley-Ramo induced-charge signal on the point contact
    ///
    /// # Arguments
    /// - `start`: `Vec3` (mm) starting position
    /// - `charge`: `f64` signed elementary-charge multiple (negative for
    ///   electrons, positive for holes)
    ///
    /// # Returns
    /// `Result<DriftResult, SimError>`
    ///
    /// # Errors
    /// - `start` is outside the active detector volume (`SimError::OutsideDetector`)
    /// - step 0 is outside the loaded field grid (`SimError::OutOfField`)
    /// - the collecting carrier exhausts `n_calc` steps while still in a
    ///   high-field region (`SimError::Truncated`)
    pub fn make_signal(&self, start: Vec3, charge: f64) -> Result<DriftResult, SimError> {
        if !self.geometry.inside_xyz(start.x, start.y, start.z) {
            return Err(SimError::OutsideDetector {
                x: start.x,
                y: start.y,
                z: start.z,
            });
        }

        let mut signal = vec![0.0_f64; self.n_calc];
        let mut trace = Vec::with_capacity(self.n_calc);

        let mut p = start;
        let mut w_prev = self.field.wpotential_at(p)?;

        let mut final_cloud_sq = self.charge_cloud_size * self.charge_cloud_size;
        let mut initial_vel = 0.0_f64;
        let mut last_velocity = Vec3::default();
        let mut last_speed = 0.0_f64;

        let mut stop_reason = StopReason::ExhaustedSteps;
        let mut steps_taken = 0usize;

        for t in 0..self.n_calc {
            let field = match self.field.efield_at(p) {
                Ok(e) => e,
                Err(_) => {
                    stop_reason = StopReason::LeftField;
                    break;
                }
            };

            let v = match self.velocity.drift_velocity(charge, field) {
                Ok(v) => v,
                Err(_) => {
                    stop_reason = StopReason::LeftField;
                    break;
                }
            };

            (self.charge_trapping)(p, charge, self.dt);
            trace.push(p);
            steps_taken = t + 1;

            let speed = v.norm();
            if t == 1 {
                initial_vel = speed;
                final_cloud_sq = self.charge_cloud_size * self.charge_cloud_size;
            } else if t > 1 && self.use_diffusion && last_speed > 0.0 {
                let ratio = speed / last_speed;
                final_cloud_sq =
                    final_cloud_sq * ratio * ratio + diffusion_variance(self.temp_k, self.dt);
            }

            if t + 2 == self.n_calc && (charge.signum() > 0.0 || w_prev > WP_NEAR_BUDGET) {
                stop_reason = StopReason::LowField;
                break;
            }

            let next_p = p + v * self.dt;
            let w = match self.field.wpotential_at(next_p) {
                Ok(w) => w,
                Err(_) => {
                    stop_reason = StopReason::LeftField;
                    break;
                }
            };

            signal[t] += charge * (w - w_prev);

            if w >= WP_SATURATED && (w - w_prev).abs() < WP_STEP_FLOOR {
                stop_reason = StopReason::LowField;
                break;
            }

            w_prev = w;
            p = next_p;
            last_velocity = v;
            last_speed = speed;
        }

        if steps_taken == self.n_calc {
            stop_reason = StopReason::ExhaustedSteps;
        }

        if stop_reason == StopReason::ExhaustedSteps && charge.signum() > 0.0 {
            return Err(SimError::Truncated(steps_taken));
        }

        if stop_reason == StopReason::LeftField && steps_taken > 0 && last_speed > 0.0 {
            self.extrapolate_tail(
                &mut signal,
                &mut trace,
                p,
                last_velocity,
                w_prev,
                charge,
                steps_taken,
            );
        }

        Ok(DriftResult {
            signal,
            trace,
            stop_reason,
            initial_vel,
            final_cloud_sq,
            final_vel: last_speed,
        })
    }

    /// continues a trace in a straight line after it left the field grid,
    /// smearing the remaining weighting-potential change linearly toward
    /// the nearer electrode value over the remaining steps
    #[allow(clippy::too_many_arguments)]
    fn extrapolate_tail(
        &self,
        signal: &mut [f64],
        trace: &mut Vec<Vec3>,
        mut p: Vec3,
        direction: Vec3,
        w_last: f64,
        charge: f64,
        steps_taken: usize,
    ) {
        let remaining = self.n_calc - steps_taken;
        if remaining == 0 {
            return;
        }

        let target = if w_last > 0.3 { 1.0 } else { 0.0 };
        let dw_per_step = (target - w_last) / remaining as f64;

        for t in steps_taken..self.n_calc {
            p = p + direction * self.dt;
            if !self.geometry.inside_xyz(p.x, p.y, p.z) {
                break;
            }
            trace.push(p);
            signal[t] += charge * dw_per_step;
        }
    }
}

/// thermal-diffusion variance growth per step, Einstein relation scaled to
/// (mm/ns)-consistent units
fn diffusion_variance(temp_k: f64, dt: f64) -> f64 {
    let thermal_voltage = BOLTZMANN * temp_k / ELEC_CHARGE;
    2.0 * thermal_voltage * dt * 1e-6
}
