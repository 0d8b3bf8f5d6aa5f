//! Penalty cascade tests on the synthetic county

mod common;

use common::{build_model, config, distance_table, exact_solver, FIRE};
use polleq_algo::{
    ede_from_objective, optimize, solve_model, solve_with_penalties, verify_solution,
    CascadeStage,
};
use tempfile::tempdir;

fn fire_config() -> polleq_core::RunConfig {
    let mut cfg = config();
    cfg.beta = -1.0;
    cfg.penalized_sites = vec![FIRE.to_string()];
    cfg
}

#[test]
fn fire_stations_are_used_only_when_they_pay_off() {
    let cfg = fire_config();
    let base = build_model(&distance_table(), &cfg);
    let settings = exact_solver();

    let model1 = solve_model(&base, &settings).expect("model 1");
    let excluding = base.excluding_penalized().expect("model 2 setup");
    let model2 = solve_model(&excluding, &settings).expect("model 2");
    assert!(verify_solution(&excluding, &model2).is_empty());
    assert!(model2.open_penalized(&excluding).is_empty());

    let dir = tempdir().unwrap();
    let log = dir.path().join("fire.penalty.log");
    let outcome = solve_with_penalties(&base, &settings, Some(&log)).expect("cascade");
    assert_eq!(outcome.stage, CascadeStage::Penalized);
    let penalty = outcome.penalty.expect("penalty");
    assert!(penalty > 0.0);
    assert!(verify_solution(&outcome.model, &outcome.solution).is_empty());

    let selected1 = model1.open_penalized(&base).len();
    let selected3 = outcome.solution.open_penalized(&outcome.model).len();
    assert!(selected1 >= 1);
    assert!(selected3 <= selected1);

    // assignment part of the objective: base <= penalized <= excluding
    let tol = 1e-6;
    assert!(model1.base_objective <= outcome.solution.base_objective + tol);
    assert!(outcome.solution.base_objective <= model2.base_objective + tol);

    let kp1 = ede_from_objective(model1.objective, cfg.beta, base.params.alpha);
    assert!((outcome.kp1 - kp1).abs() < 1e-6 * kp1);
    let kp2 = outcome.kp2.expect("kp2");
    assert!((penalty * selected1 as f64 - (kp2 - kp1)).abs() < 1e-6 * kp2);

    let text = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("model 1"));
    assert!(lines[1].contains(&format!("penalty {penalty}")));
    assert!(lines[2].starts_with("model 3"));
}

#[test]
fn zero_beta_cascade_keeps_the_exponential_penalty() {
    let mut cfg = fire_config();
    cfg.beta = 0.0;
    let base = build_model(&distance_table(), &cfg);
    let settings = exact_solver();

    let model1 = solve_model(&base, &settings).expect("model 1");
    assert!(!model1.open_penalized(&base).is_empty());

    let outcome = solve_with_penalties(&base, &settings, None).expect("cascade");
    assert_eq!(outcome.stage, CascadeStage::Penalized);
    assert!(outcome.penalty.expect("penalty") >= 0.0);
    // -α·β·penalty is 0, so penalty sits at 0 and penalty_exp at exp(0)
    let (penalty, penalty_exp) = outcome.solution.penalty_values.expect("penalty variables");
    assert!(penalty.abs() < 1e-6);
    assert!((penalty_exp - 1.0).abs() < 1e-6);
    assert!((outcome.solution.objective - model1.objective).abs() < 1e-6 * model1.objective);
    assert!(
        (outcome.solution.objective - outcome.solution.base_objective).abs()
            < 1e-6 * model1.objective
    );
    assert!(verify_solution(&outcome.model, &outcome.solution).is_empty());
}

#[test]
fn penalty_term_is_inert_when_no_penalized_site_opens() {
    // the optimum opens no 2020 polling place, so penalizing them changes nothing
    let mut cfg = config();
    cfg.beta = -1.0;
    cfg.penalized_sites = vec!["polling_2020".to_string()];
    let base = build_model(&distance_table(), &cfg);
    let settings = exact_solver();

    let model1 = solve_model(&base, &settings).expect("model 1");
    assert!(model1.open_penalized(&base).is_empty());
    let kp1 = ede_from_objective(model1.objective, cfg.beta, base.params.alpha);

    let penalized = base.with_penalty(250.0, kp1);
    let model3 = solve_model(&penalized, &settings).expect("model 3");
    assert!((model3.objective - model1.objective).abs() < 1e-6 * model1.objective);

    let outcome = solve_with_penalties(&base, &settings, None).expect("cascade");
    assert_eq!(outcome.stage, CascadeStage::Base);
    assert!((outcome.solution.objective - model1.objective).abs() < 1e-6 * model1.objective);
}

#[test]
fn optimize_reports_the_penalty() {
    let cfg = fire_config();
    let outcome = optimize(&cfg, &distance_table(), &exact_solver(), None).expect("run");
    assert_eq!(outcome.stage, CascadeStage::Penalized);
    assert!(outcome.penalty.unwrap() > 0.0);
    assert!(outcome.violations.is_empty());
    let record = outcome.record(&cfg);
    assert_eq!(record.penalty, outcome.penalty);
    assert_eq!(record.config_id, cfg.config_id());
    assert_eq!(record.solve_status, "Optimal");
    assert_eq!(record.gap, outcome.gap);
    assert!(record.gap.expect("gap") < 1e-6);
    assert!(record.best_bound.expect("bound") <= record.objective + 1e-9);
}
