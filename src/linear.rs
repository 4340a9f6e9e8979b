//! L2-regularised linear models fitted with L-BFGS.
//!
//! Both losses share the objective `0.5 * ||w||^2 + C * sum(loss(t_i * (x_i . w + b)))`
//! with targets `t_i` in {-1, +1} and an unpenalised intercept `b`.

use crate::error::{MvpaError, Result};
use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

const LBFGS_MEMORY: usize = 7;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum Loss {
    /// log(1 + exp(-m))
    Logistic,
    /// max(0, 1 - m)^2
    SquaredHinge,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    pub c: f64,
    pub max_iterations: u64,
    pub tolerance: f64,
}

/// One fitted binary decision function
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryUnit {
    pub weights: Array1<f64>,
    pub intercept: f64,
}

impl BinaryUnit {
    pub fn decision(&self, row: ArrayView1<f64>) -> f64 {
        row.dot(&self.weights) + self.intercept
    }
}

pub fn sigmoid(v: f64) -> f64 {
    if v >= 0.0 {
        1.0 / (1.0 + (-v).exp())
    } else {
        let e = v.exp();
        e / (1.0 + e)
    }
}

// log(1 + exp(-m)) without overflow
fn softplus_neg(m: f64) -> f64 {
    if m > 0.0 {
        (-m).exp().ln_1p()
    } else {
        -m + m.exp().ln_1p()
    }
}

struct LinearObjective<'a, 't> {
    x: ArrayView2<'a, f64>,
    targets: &'t [f64],
    c: f64,
    loss: Loss,
}

impl LinearObjective<'_, '_> {
    fn split<'p>(&self, p: &'p [f64]) -> (ArrayView1<'p, f64>, f64) {
        let d = self.x.ncols();
        (ArrayView1::from(&p[..d]), p[d])
    }

    fn margins(&self, p: &[f64]) -> Vec<f64> {
        let (w, b) = self.split(p);
        self.x.rows().into_iter()
            .zip(self.targets.iter())
            .map(|(row, &t)| t * (row.dot(&w) + b))
            .collect()
    }
}

impl CostFunction for LinearObjective<'_, '_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, p: &Self::Param) -> std::result::Result<Self::Output, ArgminError> {
        let (w, _) = self.split(p);
        let data_term: f64 = self.margins(p).into_iter()
            .map(|m| match self.loss {
                Loss::Logistic => softplus_neg(m),
                Loss::SquaredHinge => (1.0 - m).max(0.0).powi(2),
            })
            .sum();
        Ok(0.5 * w.dot(&w) + self.c * data_term)
    }
}

impl Gradient for LinearObjective<'_, '_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, p: &Self::Param) -> std::result::Result<Self::Gradient, ArgminError> {
        let d = self.x.ncols();
        let mut grad = vec![0.0; d + 1];
        grad[..d].copy_from_slice(&p[..d]);

        for ((row, &t), m) in self.x.rows().into_iter().zip(self.targets.iter()).zip(self.margins(p)) {
            // d loss / d decision
            let coef = match self.loss {
                Loss::Logistic => -t * sigmoid(-m),
                Loss::SquaredHinge => -2.0 * t * (1.0 - m).max(0.0),
            } * self.c;
            if coef == 0.0 { continue }
            for (g, &v) in grad[..d].iter_mut().zip(row.iter()) {
                *g += coef * v;
            }
            grad[d] += coef;
        }
        Ok(grad)
    }
}

/// Fits one binary decision function, `positive[i]` tells whether row i is the +1 class.
pub fn fit_binary(x: ArrayView2<f64>, positive: &[bool], loss: Loss, settings: &SolverSettings) -> Result<BinaryUnit> {
    let d = x.ncols();
    let targets: Vec<f64> = positive.iter().map(|&p| if p { 1.0 } else { -1.0 }).collect();
    let problem = LinearObjective { x, targets: &targets, c: settings.c, loss };

    let linesearch: MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64> = MoreThuenteLineSearch::new();
    let solver: LBFGS<_, Vec<f64>, Vec<f64>, f64> = LBFGS::new(linesearch, LBFGS_MEMORY)
        .with_tolerance_grad(settings.tolerance)
        .and_then(|s| s.with_tolerance_cost(settings.tolerance))
        .map_err(|e| MvpaError::InvalidParam(e.to_string()))?;

    let res = Executor::new(problem, solver)
        .configure(|state| state.param(vec![0.0; d + 1]).max_iters(settings.max_iterations))
        .run()
        .map_err(|e| MvpaError::Convergence(format!("{:?} solver failed: {}", loss, e)))?;

    let state = res.state();
    if let TerminationStatus::Terminated(TerminationReason::MaxItersReached) = state.get_termination_status() {
        return Err(MvpaError::Convergence(format!(
            "{:?} objective still decreasing after {} iterations (tolerance {:e})",
            loss, settings.max_iterations, settings.tolerance
        )));
    }

    let best = state.get_best_param()
        .ok_or_else(|| MvpaError::Convergence("solver returned no parameters".to_string()))?;
    if best.iter().any(|v| !v.is_finite()) {
        return Err(MvpaError::Convergence("solver diverged to non-finite parameters".to_string()));
    }

    Ok(BinaryUnit {
        weights: Array1::from(best[..d].to_vec()),
        intercept: best[d],
    })
}
