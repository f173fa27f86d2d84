//! post-processing pipeline
//!
//! turns the two carriers' induced-charge increments into the detector's
//! final, downsampled, RC-shaped output pulse: Gaussian charge-cloud
//! convolution, output-rate downsampling, then a single-pole preamp response

use crate::drift::{DriftIntegrator, DriftResult};
use crate::error::SimError;
use crate::helpers::vec3::Vec3;
use log::debug;

/// `SignalGenerator` struct
///
/// wraps a `DriftIntegrator` with the charge-cloud and output-rate
/// parameters needed to turn a pair of carrier traces into one pulse
pub struct SignalGenerator<'a> {
    drift: DriftIntegrator<'a>,
    n_calc: usize,
    n_out: usize,
    dt_calc: f64,
    dt_out: f64,
    preamp_tau: f64,
    charge_cloud_size: f64,
    use_diffusion: bool,
}

impl<'a> SignalGenerator<'a> {
    /// `SignalGenerator` constructor
    ///
    /// # Arguments
    /// - `drift`: `DriftIntegrator<'a>` already configured with `n_calc`/`dt_calc`
    /// - `n_calc`: `usize` drift-step budget (matches the integrator's own)
    /// - `n_out`: `usize` length of the downsampled output pulse
    /// - `dt_calc`: `f64` (ns) drift-step size
    /// - `dt_out`: `f64` (ns) output-sample size
    /// - `preamp_tau`: `f64` (ns) preamp RC time constant
    /// - `charge_cloud_size`: `f64` (mm) initial charge-cloud radius
    /// - `use_diffusion`: `bool`
    ///
    /// # Returns
    /// `SignalGenerator<'a>`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        drift: DriftIntegrator<'a>,
        n_calc: usize,
        n_out: usize,
        dt_calc: f64,
        dt_out: f64,
        preamp_tau: f64,
        charge_cloud_size: f64,
        use_diffusion: bool,
    ) -> SignalGenerator<'a> {
        SignalGenerator {
            drift,
            n_calc,
            n_out,
            dt_calc,
            dt_out,
            preamp_tau,
            charge_cloud_size,
            use_diffusion,
        }
    }

    /// drifts both carriers from `start`, superposes their induced-charge
    /// traces, and runs the convolution / downsample / RC pipeline
    ///
    /// # Arguments
    /// - `start`: `Vec3` (mm) event position
    ///
    /// # Returns
    /// `Result<Vec<f64>, SimError>`, length `n_out`
    ///
    /// # Errors
    /// - the hole drift fails (`start` outside the detector, outside the
    ///   field, or truncated in a high-field region); electron failure alone
    ///   is swallowed and logged at `debug`
    pub fn get_signal(&self, start: Vec3) -> Result<Vec<f64>, SimError> {
        let hole = self.drift.make_signal(start, 1.0)?;
        let electron = match self.drift.make_signal(start, -1.0) {
            Ok(result) => Some(result),
            Err(err) => {
                debug!("electron drift from {start} failed, omitting its contribution: {err}");
                None
            }
        };

        let mut raw = vec![0.0_f64; self.n_calc];
        for (t, slot) in raw.iter_mut().enumerate() {
            *slot += hole.signal.get(t).copied().unwrap_or(0.0);
            if let Some(electron) = &electron {
                *slot += electron.signal.get(t).copied().unwrap_or(0.0);
            }
        }

        let mut charge = vec![0.0_f64; self.n_calc];
        let mut acc = 0.0_f64;
        for (t, slot) in charge.iter_mut().enumerate() {
            acc += raw[t];
            *slot = acc;
        }

        let sigma = self.sigma(&hole);
        if sigma > 1.0 {
            gaussian_convolve(&mut charge, sigma);
        }

        let mut out = downsample(&charge, self.n_out);
        rc_integrate(&out.clone(), &mut out, self.preamp_tau, self.dt_out);
        Ok(out)
    }

    /// effective Gaussian convolution width, in output samples, for the
    /// collecting carrier (holes, by this crate's sign convention)
    fn sigma(&self, hole: &DriftResult) -> f64 {
        if self.use_diffusion {
            if hole.final_vel <= 0.0 {
                return 0.0;
            }
            hole.final_cloud_sq.sqrt() / (self.dt_calc * hole.final_vel)
        } else {
            if hole.initial_vel <= 0.0 {
                return 0.0;
            }
            self.charge_cloud_size / (self.dt_calc * hole.initial_vel)
        }
    }
}

/// smears `charge` in place with a symmetric Gaussian kernel, per-position
/// normalized, using progressively larger shifts out to `2*sigma`
fn gaussian_convolve(charge: &mut [f64], sigma: f64) {
    let n = charge.len();
    if n == 0 {
        return;
    }

    let source = charge.to_vec();
    let fwhm_sigma = sigma / 2.355;
    let step = ((sigma / 2.355 / 5.0).floor() as usize).max(1);

    let mut sum = vec![1.0_f64; n];
    let mut tmp = source.clone();

    let mut k = step;
    while (k as f64) <= 2.0 * sigma {
        let weight = -((k as f64 / fwhm_sigma).powi(2));
        let weight = weight.exp();
        for j in 0..n {
            if j >= k {
                tmp[j] += weight * source[j - k];
                sum[j] += weight;
            }
            if j + k < n {
                tmp[j] += weight * source[j + k];
                sum[j] += weight;
            }
        }
        k += step;
    }

    for j in 0..n {
        charge[j] = tmp[j] / sum[j];
    }
}

/// averages contiguous runs of `charge.len() / out_len` samples
fn downsample(charge: &[f64], out_len: usize) -> Vec<f64> {
    if out_len == 0 {
        return Vec::new();
    }
    let n = charge.len();
    let c = (n / out_len).max(1);

    let mut out = Vec::with_capacity(out_len);
    for j in 0..out_len {
        let start = j * c;
        if start >= n {
            out.push(*charge.last().unwrap_or(&0.0));
            continue;
        }
        let end = (start + c).min(n);
        out.push(charge[start..end].iter().sum::<f64>() / (end - start) as f64);
    }
    out
}

/// single-pole preamp response
///
/// # Arguments
/// - `input`: `&[f64]`
/// - `output`: `&mut [f64]`, same length as `input`; may alias `input`
/// - `tau`: `f64` (ns) preamp time constant
/// - `dt`: `f64` (ns) sample spacing of `input`/`output`
///
/// # Returns
///
/// # Errors
pub fn rc_integrate(input: &[f64], output: &mut [f64], tau: f64, dt: f64) {
    let n = input.len().min(output.len());
    if n == 0 {
        return;
    }

    if tau < 0.1 * dt {
        let mut prev = 0.0_f64;
        for j in 0..n {
            let cur = input[j];
            output[j] = prev;
            prev = cur;
        }
        return;
    }

    let alpha = 1.0 - (-dt / tau).exp();
    let mut y_prev = 0.0_f64;
    let mut x_prev = 0.0_f64;
    for j in 0..n {
        let x_cur = input[j];
        let y_cur = y_prev + alpha * (x_prev - y_prev);
        output[j] = y_cur;
        y_prev = y_cur;
        x_prev = x_cur;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// tests the single-time-constant step response invariant
    ///
    /// # Errors
    /// - the output one time constant into a unit step is not within
    ///   1e-3 of 1 - 1/e
    #[test]
    fn rc_integrate_step_response_at_one_tau() {
        let input = vec![1.0_f64; 4];
        let mut output = vec![0.0_f64; 4];
        rc_integrate(&input, &mut output, 1.0, 1.0);
        assert!((output[1] - (1.0 - std::f64::consts::E.recip())).abs() < 1e-3);
    }

    /// tests the two scenario sample values for a slower time constant
    ///
    /// # Errors
    /// - sample 1 or sample 2 deviates from the closed-form exponential value
    #[test]
    fn rc_integrate_matches_known_samples() {
        let input = vec![1.0_f64; 4];
        let mut output = vec![0.0_f64; 4];
        rc_integrate(&input, &mut output, 30.0, 10.0);
        assert!((output[1] - 0.283).abs() < 1e-3);
        assert!((output[2] - 0.487).abs() < 1e-3);
    }

    /// tests that an aliased in-place call matches a separate-buffer call
    ///
    /// # Errors
    /// - the aliased and non-aliased outputs differ
    #[test]
    fn rc_integrate_tolerates_aliasing() {
        let input = vec![0.2, 0.9, 0.4, -0.1, 0.3];
        let mut separate = vec![0.0_f64; input.len()];
        rc_integrate(&input, &mut separate, 5.0, 2.0);

        let mut inplace = input.clone();
        let source = inplace.clone();
        rc_integrate(&source, &mut inplace, 5.0, 2.0);

        for (a, b) in separate.iter().zip(inplace.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    /// tests that a fast time constant degenerates into a one-sample shift
    ///
    /// # Errors
    /// - the output is not simply the input delayed by one sample
    #[test]
    fn rc_integrate_fast_tau_shifts_by_one_sample() {
        let input = vec![1.0, 2.0, 3.0];
        let mut output = vec![0.0_f64; 3];
        rc_integrate(&input, &mut output, 0.01, 10.0);
        assert_eq!(output, vec![0.0, 1.0, 2.0]);
    }

    /// tests that downsampling averages contiguous runs
    ///
    /// # Errors
    /// - a downsampled bucket is not the mean of its source samples
    #[test]
    fn downsample_averages_contiguous_runs() {
        let charge: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let out = downsample(&charge, 5);
        assert_eq!(out.len(), 5);
        assert!((out[0] - 0.5).abs() < 1e-12);
        assert!((out[4] - 8.5).abs() < 1e-12);
    }

    /// tests that Gaussian smoothing preserves a flat signal exactly
    ///
    /// # Errors
    /// - smoothing a constant array changes its value
    #[test]
    fn gaussian_convolve_preserves_constant_signal() {
        let mut charge = vec![3.0_f64; 40];
        gaussian_convolve(&mut charge, 4.0);
        for v in charge {
            assert!((v - 3.0).abs() < 1e-9);
        }
    }
}
