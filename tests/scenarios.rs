//! end-to-end scenarios exercising the pipeline documented in SPEC_FULL.md
//! section 8: config -> relaxation solve -> table round-trip -> drift/signal

use hpge_field_sim::config::Config;
use hpge_field_sim::error::SimError;
use hpge_field_sim::helpers::vec3::Vec3;
use hpge_field_sim::io::field_file::{write_field_file, write_wp_file, FieldFileRow, WpFileRow};
use hpge_field_sim::setup::Setup;
use hpge_field_sim::solver::{solve_bias, solve_weighting};
use std::io::Write;

fn scenario_config() -> Config {
    let mut cfg = Config::default();
    cfg.xtal_length = 50.5;
    cfg.xtal_radius = 34.5;
    cfg.pc_length = 2.1;
    cfg.pc_radius = 1.4;
    cfg.xtal_hv = 2500.0;
    cfg.impurity_z0 = -0.318;
    cfg.impurity_gradient = 0.025;
    cfg.xtal_grid = 0.5;
    cfg.xtal_temp = 90.0;
    cfg.time_steps_calc = 400;
    cfg.step_time_calc = 1.0;
    cfg.step_time_out = 1.0;
    cfg.preamp_tau = 30.0;
    cfg.charge_cloud_size = 0.05;
    cfg
}

fn write_velocity_table(path: &std::path::Path) {
    let mut f = std::fs::File::create(path).unwrap();
    writeln!(f, "0.0 0.0 0.0 0.0 0.0 0.0 0.0").unwrap();
    writeln!(f, "1.0e3 0.070 0.068 0.066 0.063 0.060 0.058").unwrap();
    writeln!(f, "1.0e5 0.100 0.095 0.090 0.080 0.078 0.076").unwrap();
    writeln!(f, "e 4.0e7 -1.68 0.1 80.0").unwrap();
    writeln!(f, "h 4.0e7 -1.68 0.1 80.0").unwrap();
}

/// scenario 1: the bias solve for this geometry converges within the
/// default iteration ceiling and leaves the crystal fully depleted
#[test]
fn scenario_1_bias_solve_converges_fully_depleted() {
    let cfg = scenario_config();
    let geometry = cfg.into_geometry().unwrap();

    let solution = solve_bias(
        &geometry,
        cfg.xtal_hv,
        cfg.impurity_z0,
        cfg.impurity_gradient,
        cfg.xtal_grid,
        cfg.max_iterations,
    );

    assert!(solution.report.converged);
    assert!(solution.report.iterations <= cfg.max_iterations);
    assert_eq!(solution.report.pinched_pixels, 0);
}

/// scenario 2: a point-contact event's signal rises to 1.0 within tolerance
/// and is monotone non-decreasing
#[test]
fn scenario_2_signal_reaches_unity_monotonically() {
    let cfg = scenario_config();
    let geometry = cfg.into_geometry().unwrap();

    let bias = solve_bias(
        &geometry,
        cfg.xtal_hv,
        cfg.impurity_z0,
        cfg.impurity_gradient,
        cfg.xtal_grid,
        cfg.max_iterations,
    );
    let weighting = solve_weighting(
        &geometry,
        cfg.xtal_grid,
        cfg.max_iterations,
        Some(&bias.undepleted),
    );

    let dir = tempfile::tempdir().unwrap();
    let field_path = dir.path().join("field.dat");
    let wp_path = dir.path().join("wp.dat");
    let velocity_path = dir.path().join("velocity.dat");

    write_field_file(&field_path, &field_rows(&bias)).unwrap();
    write_wp_file(&wp_path, &wp_rows(&weighting, bias.h)).unwrap();
    write_velocity_table(&velocity_path);

    let setup = Setup::new(&cfg, &field_path, Some(&wp_path), &velocity_path).unwrap();
    let signal = setup.get_signal(Vec3::new(0.0, 0.0, 25.0)).unwrap();

    let last = *signal.last().unwrap();
    assert!((last - 1.0).abs() <= 0.005, "final signal {last} not within 0.005 of 1.0");

    for pair in signal.windows(2) {
        assert!(pair[1] + 1e-9 >= pair[0], "signal decreased: {} then {}", pair[0], pair[1]);
    }
}

/// scenario 3: a start point outside the detector is rejected before anything
/// is written
#[test]
fn scenario_3_outside_detector_start_point_rejected() {
    let cfg = scenario_config();
    let geometry = cfg.into_geometry().unwrap();

    let bias = solve_bias(
        &geometry,
        cfg.xtal_hv,
        cfg.impurity_z0,
        cfg.impurity_gradient,
        cfg.xtal_grid,
        cfg.max_iterations,
    );
    let weighting = solve_weighting(
        &geometry,
        cfg.xtal_grid,
        cfg.max_iterations,
        Some(&bias.undepleted),
    );

    let dir = tempfile::tempdir().unwrap();
    let field_path = dir.path().join("field.dat");
    let wp_path = dir.path().join("wp.dat");
    let velocity_path = dir.path().join("velocity.dat");

    write_field_file(&field_path, &field_rows(&bias)).unwrap();
    write_wp_file(&wp_path, &wp_rows(&weighting, bias.h)).unwrap();
    write_velocity_table(&velocity_path);

    let setup = Setup::new(&cfg, &field_path, Some(&wp_path), &velocity_path).unwrap();
    let err = setup.get_signal(Vec3::new(0.0, 0.0, 60.0)).unwrap_err();
    assert!(matches!(err, SimError::OutsideDetector { .. }));
}

/// scenario 4: the preamp RC response matches the closed-form exponential
/// step response at the documented sample points
#[test]
fn scenario_4_rc_step_response_matches_worked_example() {
    use hpge_field_sim::signal::rc_integrate;

    let input = vec![1.0; 5];
    let mut output = vec![0.0; 5];
    rc_integrate(&input, &mut output, 30.0, 10.0);

    assert!((output[1] - 0.283).abs() < 1e-3);
    assert!((output[2] - 0.487).abs() < 1e-3);
}

/// scenario 5: a table with a duplicate E row fails to load
#[test]
fn scenario_5_duplicate_field_row_is_malformed() {
    use hpge_field_sim::velocity::VelocityTable;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("velocity.dat");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "0.0 0.0 0.0 0.0 0.0 0.0 0.0").unwrap();
    writeln!(f, "1.0e5 0.1 0.095 0.09 0.08 0.078 0.076").unwrap();
    writeln!(f, "1.0e5 0.1 0.095 0.09 0.08 0.078 0.076").unwrap();
    writeln!(f, "e 4.0e7 -1.68 0.1 80.0").unwrap();
    writeln!(f, "h 4.0e7 -1.68 0.1 80.0").unwrap();
    drop(f);

    let err = VelocityTable::load(&path).unwrap_err();
    assert!(matches!(err, SimError::MalformedTable(_)));
}

/// scenario 6: a purely axial field on the axis returns a purely axial
/// velocity whose sign follows the carrier
#[test]
fn scenario_6_axial_query_on_axis() {
    use hpge_field_sim::velocity::VelocityTable;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("velocity.dat");
    write_velocity_table(&path);
    let table = VelocityTable::load(&path).unwrap();

    let field = Vec3::new(0.0, 0.0, 5000.0);
    let hole_v = table.drift_velocity(1.0, field).unwrap();
    assert_eq!(hole_v.x, 0.0);
    assert_eq!(hole_v.y, 0.0);
    assert!(hole_v.z > 0.0);

    let electron_v = table.drift_velocity(-1.0, field).unwrap();
    assert_eq!(electron_v.x, 0.0);
    assert_eq!(electron_v.y, 0.0);
    assert!(electron_v.z < 0.0);
}

/// ambient scenario 8: an unrecognized config key is tolerated with a warning
#[test]
fn ambient_8_unknown_key_is_tolerated() {
    let text = "xtal_length 50.5\nxtal_radius 34.5\npc_length 2.1\npc_radius 1.4\n\
                xtal_HV 2500.0\nimpurity_z0 -0.318\nsome_future_key 42\n";
    let cfg = Config::from_reader(text.as_bytes()).unwrap();
    assert_eq!(cfg.xtal_length, 50.5);
}

/// ambient scenario 9: a missing required key is a fatal config error
#[test]
fn ambient_9_missing_required_key_is_fatal() {
    let text = "xtal_length 50.5\nxtal_radius 34.5\npc_length 2.1\npc_radius 1.4\n\
                impurity_z0 -0.318\n";
    let err = Config::from_reader(text.as_bytes()).unwrap_err();
    assert!(matches!(err, SimError::ConfigError(_)));
}

/// ambient scenario 10: a round-tripped field file reproduces the original
/// grid exactly at the formatted precision
#[test]
fn ambient_10_field_file_round_trip() {
    use hpge_field_sim::io::field_file::parse_field_file;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("field.dat");

    let rows = vec![
        FieldFileRow { r: 0.0, z: 0.0, v: 0.0, e_mag: 0.0, e_r: 0.0, e_z: 0.0 },
        FieldFileRow { r: 0.0, z: 0.5, v: 12.5, e_mag: 4.0, e_r: 0.0, e_z: 4.0 },
        FieldFileRow { r: 0.5, z: 0.0, v: 3.25, e_mag: 2.0, e_r: 2.0, e_z: 0.0 },
    ];
    write_field_file(&path, &rows).unwrap();
    let parsed = parse_field_file(&path).unwrap();
    assert_eq!(parsed, rows);
}

fn field_rows(solution: &hpge_field_sim::solver::BiasSolution) -> Vec<FieldFileRow> {
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

fn wp_rows(solution: &hpge_field_sim::solver::WeightingSolution, h: f64) -> Vec<WpFileRow> {
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
