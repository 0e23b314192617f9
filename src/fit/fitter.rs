//! MAP fitting of the decomposable model.
//!
//! On the scaled target `y_s = y / max|y|` we minimize
//!
//! ```text
//! Σ (y_s − g ∘ (1 + X_Lβ_L) ∘ (1 + X_Wβ_W))² + Σ λ_θ θ² + Σ λ_β β²
//! ```
//!
//! where `g = Aθ` is the piecewise-linear trend (`A = [t, 1, (t − s_j)+]`),
//! `X_L`/`X_W` the level and weekly columns of the design and
//! `λ = 1 / prior_scale²`.
//!
//! `(θ, β)` are solved jointly by Levenberg-Marquardt: each iteration
//! linearizes the product around the current parameters and hands the damped
//! penalized least squares step to the `Optimizer`. Accepted steps never
//! raise the objective. The iteration is deterministic: same observations and
//! config give bit-identical parameters.

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::domain::{Factor, ModelConfig, Observation};
use crate::error::{ForecastError, Result};
use crate::features::{FeatureBuilder, HistoryStats, HolidayCalendar};
use crate::fit::{Optimizer, changepoint_positions};
use crate::math::{hinge, std_dev};
use crate::models::{Components, FittedModel, MODEL_SCHEMA_VERSION, TimeScale, TrainingWindow, TrendParams};

/// Fit one site's model on `observations` (any order, unique dates).
pub fn fit_model(
    site_id: &str,
    observations: &[Observation],
    config: &ModelConfig,
    calendar: &HolidayCalendar,
    optimizer: &dyn Optimizer,
    clock: &dyn Clock,
) -> Result<FittedModel> {
    config.validate()?;
    if observations.is_empty() {
        return Err(ForecastError::EmptyTrainingSet);
    }
    if observations.len() < 2 {
        return Err(ForecastError::InsufficientHistory(format!(
            "site {site_id}: need at least 2 observations, got {}",
            observations.len()
        )));
    }

    let mut obs = observations.to_vec();
    obs.sort_by_key(|o| o.date);
    if let Some(dup) = obs.windows(2).find(|w| w[0].date == w[1].date) {
        return Err(ForecastError::InvalidRequest(format!(
            "site {site_id}: duplicate observation for {}",
            dup[0].date
        )));
    }

    let y: Vec<f64> = obs.iter().map(|o| f64::from(o.visitors)).collect();
    if std_dev(&y).unwrap_or(0.0) <= 0.0 {
        return Err(ForecastError::DegenerateSeries(format!(
            "site {site_id}: visitor count is constant over {} days",
            y.len()
        )));
    }
    let y_scale = y.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));

    let history = HistoryStats::from_observations(&obs)?;
    let rows = FeatureBuilder::new(&history, calendar).historical(&obs);

    let n = obs.len();
    let start = history.start_date;
    let end = history.end_date;
    let time = TimeScale {
        start,
        span_days: (end - start).num_days() as f64,
    };
    let ts: Vec<f64> = obs.iter().map(|o| time.t(o.date)).collect();
    let changepoints = changepoint_positions(&ts, config.n_changepoints, config.changepoint_range);

    let mut components = Components::for_training(config, calendar, &rows);
    let p = components.width();
    let mut x = DMatrix::<f64>::zeros(n, p);
    let mut buf = vec![0.0; p];
    for (i, row) in rows.iter().enumerate() {
        components.fill_design_row(row, &mut buf);
        for (j, v) in buf.iter().enumerate() {
            x[(i, j)] = *v;
        }
    }
    let beta_penalties = components.penalties();

    let c = changepoints.len();
    let a = DMatrix::<f64>::from_fn(n, 2 + c, |i, j| match j {
        0 => ts[i],
        1 => 1.0,
        _ => hinge(ts[i], changepoints[j - 2]),
    });
    let trend_lambda = 1.0 / (config.trend_prior_scale * config.trend_prior_scale);
    let delta_lambda = 1.0 / (config.changepoint_prior_scale * config.changepoint_prior_scale);
    let mut theta_penalties = vec![trend_lambda, trend_lambda];
    theta_penalties.extend(std::iter::repeat_n(delta_lambda, c));

    let ys = DVector::from_iterator(n, y.iter().map(|v| v / y_scale));

    let factors = components.column_factors();
    let problem = Problem {
        a: &a,
        x: &x,
        ys: &ys,
        factors: &factors,
        penalties: theta_penalties.into_iter().chain(beta_penalties).collect(),
    };
    let solution = minimize(&problem, config, optimizer)
        .map_err(|e| match e {
            ForecastError::ConvergenceFailure(msg) => {
                ForecastError::ConvergenceFailure(format!("site {site_id}: {msg}"))
            }
            other => other,
        })?;

    components.set_coefficients(solution.beta.as_slice());
    let trend = TrendParams {
        k: solution.theta[0],
        m: solution.theta[1],
        deltas: solution.theta.iter().skip(2).copied().collect(),
        changepoints,
    };
    let sigma_obs = (solution.sse / n as f64).sqrt();
    let fit_timestamp = clock.now();

    info!(
        site = site_id,
        points = n,
        start = %start,
        end = %end,
        iterations = solution.iterations,
        sigma_obs,
        fit_timestamp = %fit_timestamp,
        "model fit complete"
    );

    Ok(FittedModel {
        schema_version: MODEL_SCHEMA_VERSION,
        site_id: site_id.to_string(),
        config: config.clone(),
        calendar: calendar.clone(),
        time,
        y_scale,
        trend,
        components,
        sigma_obs,
        window: TrainingWindow {
            start,
            end,
            points: n,
        },
        history,
        fit_timestamp,
        iterations: solution.iterations,
    })
}

/// Fit using only observations dated on or before `cutoff`.
pub fn fit_until(
    site_id: &str,
    observations: &[Observation],
    cutoff: NaiveDate,
    config: &ModelConfig,
    calendar: &HolidayCalendar,
    optimizer: &dyn Optimizer,
    clock: &dyn Clock,
) -> Result<FittedModel> {
    let training: Vec<Observation> = observations
        .iter()
        .filter(|o| o.date <= cutoff)
        .cloned()
        .collect();
    fit_model(site_id, &training, config, calendar, optimizer, clock)
}

struct Solution {
    theta: DVector<f64>,
    beta: DVector<f64>,
    sse: f64,
    iterations: usize,
}

/// Damping relative to the mean squared Jacobian column norm.
const INITIAL_DAMPING: f64 = 1e-3;
const MIN_DAMPING: f64 = 1e-12;
/// Damping increases tried before a step counts as stalled.
const MAX_DAMPING_STEPS: usize = 24;

/// The penalized least squares problem on the scaled target.
struct Problem<'a> {
    a: &'a DMatrix<f64>,
    x: &'a DMatrix<f64>,
    ys: &'a DVector<f64>,
    factors: &'a [Factor],
    /// Trend penalties followed by multiplier penalties.
    penalties: Vec<f64>,
}

/// The model evaluated at one parameter vector `[θ, β]`.
struct State {
    params: DVector<f64>,
    trend: DVector<f64>,
    level: DVector<f64>,
    weekly: DVector<f64>,
    sse: f64,
    objective: f64,
}

impl Problem<'_> {
    fn trend_width(&self) -> usize {
        self.a.ncols()
    }

    fn evaluate(&self, params: DVector<f64>) -> State {
        let n = self.ys.len();
        let k = self.trend_width();
        let theta = params.rows(0, k).into_owned();
        let trend = self.a * &theta;

        let mut level = DVector::<f64>::from_element(n, 1.0);
        let mut weekly = DVector::<f64>::from_element(n, 1.0);
        for (j, factor) in self.factors.iter().enumerate() {
            let b = params[k + j];
            if b == 0.0 {
                continue;
            }
            let out = match factor {
                Factor::Level => &mut level,
                Factor::Weekly => &mut weekly,
            };
            for i in 0..n {
                out[i] += self.x[(i, j)] * b;
            }
        }

        let sse: f64 = (0..n)
            .map(|i| (self.ys[i] - trend[i] * level[i] * weekly[i]).powi(2))
            .sum();
        let objective = sse + penalty(&params, &self.penalties);
        State {
            params,
            trend,
            level,
            weekly,
            sse,
            objective,
        }
    }

    /// Jacobian of `trend ∘ level ∘ weekly` with respect to `[θ, β]`.
    fn jacobian(&self, s: &State) -> DMatrix<f64> {
        let k = self.trend_width();
        DMatrix::<f64>::from_fn(self.ys.len(), k + self.factors.len(), |i, j| {
            if j < k {
                return self.a[(i, j)] * s.level[i] * s.weekly[i];
            }
            let other = match self.factors[j - k] {
                Factor::Level => s.weekly[i],
                Factor::Weekly => s.level[i],
            };
            self.x[(i, j - k)] * s.trend[i] * other
        })
    }

    /// One damped Gauss-Newton step from `s`.
    ///
    /// Minimizes `‖r − Jδ‖² + Σ λ(p + δ)² + μ‖δ‖²` through the ridge solver by
    /// substituting `δ = u − c` with `c = λp / (λ + μ)`, which turns both
    /// penalties into a single `(λ + μ)‖u‖²`.
    fn step(
        &self,
        s: &State,
        jac: &DMatrix<f64>,
        residual: &DVector<f64>,
        mu: f64,
        optimizer: &dyn Optimizer,
    ) -> Result<DVector<f64>> {
        let shift = DVector::<f64>::from_iterator(
            s.params.len(),
            s.params.iter().zip(&self.penalties).map(|(p, l)| {
                let denom = l + mu;
                if denom > 0.0 { l * p / denom } else { 0.0 }
            }),
        );
        let damped: Vec<f64> = self.penalties.iter().map(|l| l + mu).collect();
        let target = residual + jac * &shift;
        let u = optimizer.solve(jac, &target, &damped)?;
        Ok(&s.params + u - shift)
    }
}

/// Levenberg-Marquardt over `[θ, β]` jointly, starting from the trend-only
/// fit. Steps that raise the objective are retried with more damping.
fn minimize(problem: &Problem<'_>, config: &ModelConfig, optimizer: &dyn Optimizer) -> Result<Solution> {
    let budget = config.optimizer.max_iterations;
    let tol = config.optimizer.tolerance;
    let ys = problem.ys;
    let k = problem.trend_width();

    let theta0 = optimizer.solve(problem.a, ys, &problem.penalties[..k])?;
    let mut start = DVector::<f64>::zeros(problem.penalties.len());
    start.rows_mut(0, k).copy_from(&theta0);
    let mut state = problem.evaluate(start);
    if !state.objective.is_finite() {
        return Err(ForecastError::ConvergenceFailure(
            "objective is non-finite at the starting point".to_string(),
        ));
    }

    let mut damping = INITIAL_DAMPING;
    for iter in 1..=budget {
        let jac = problem.jacobian(&state);
        let residual = DVector::<f64>::from_fn(ys.len(), |i, _| {
            ys[i] - state.trend[i] * state.level[i] * state.weekly[i]
        });
        let scale = jac.norm_squared() / jac.ncols().max(1) as f64;

        let mut accepted = None;
        for attempt in 0..MAX_DAMPING_STEPS {
            let params = problem.step(&state, &jac, &residual, damping * scale, optimizer)?;
            let candidate = problem.evaluate(params);
            if candidate.objective.is_finite() && candidate.objective <= state.objective {
                damping = (damping / 3.0).max(MIN_DAMPING);
                accepted = Some((candidate, attempt));
                break;
            }
            damping *= 4.0;
        }

        let Some((next, attempt)) = accepted else {
            debug!(iteration = iter, objective = state.objective, "no damped step lowers the objective");
            return Ok(state.into_solution(k, iter));
        };

        let decrease = state.objective - next.objective;
        state = next;
        debug!(iteration = iter, objective = state.objective, sse = state.sse, damping, "damped step");

        if attempt == 0 && decrease <= tol * state.objective.abs().max(f64::MIN_POSITIVE) {
            return Ok(state.into_solution(k, iter));
        }
    }

    Err(ForecastError::ConvergenceFailure(format!(
        "objective did not stabilize within {budget} iterations (tolerance {tol})"
    )))
}

impl State {
    fn into_solution(self, trend_width: usize, iterations: usize) -> Solution {
        let theta = self.params.rows(0, trend_width).into_owned();
        let beta = self.params.rows(trend_width, self.params.len() - trend_width).into_owned();
        Solution {
            theta,
            beta,
            sse: self.sse,
            iterations,
        }
    }
}

fn penalty(coef: &DVector<f64>, lambdas: &[f64]) -> f64 {
    coef.iter().zip(lambdas.iter()).map(|(c, l)| l * c * c).sum()
}
