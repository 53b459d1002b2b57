//! Ground-truth recovery harness.
//!
//! Runs a real [`PreferenceSession`] against a simulated participant whose
//! choices follow the probit model around a known score vector, then
//! measures how well the posterior means recover that vector.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::choice_model::normal_cdf;
use crate::config::{SelectorConfig, SessionConfig};
use crate::error::{ConfigurationError, PreferenceError, ValidationError};
use crate::session::PreferenceSession;

/// Rank correlation a run must exceed to count as a successful recovery.
pub const RECOVERY_RHO_TARGET: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryCase {
    pub n_items: usize,
    /// Trial cap for the simulated session.
    pub trials: usize,
    /// Std dev of the simulated participant's probit noise. 0.0 makes the
    /// participant always pick the truly better item.
    pub noise: f64,
    pub selector: SelectorConfig,
    /// Fixed ground truth; drawn from N(0, 1) when absent.
    pub truth: Option<Vec<f64>>,
}

impl Default for RecoveryCase {
    fn default() -> Self {
        Self {
            n_items: 8,
            trials: 50,
            noise: 0.1,
            selector: SelectorConfig::default(),
            truth: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryReport {
    pub true_scores: Vec<f64>,
    pub true_ranking: Vec<usize>,
    pub recovered_ranking: Vec<usize>,
    pub spearman_rho: f64,
    pub kendall_tau: f64,
    /// Fraction of truly-ordered pairs whose posterior means agree in sign.
    pub pairwise_accuracy: f64,
    pub trials_used: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoverySummary {
    pub runs: usize,
    pub mean_spearman: f64,
    pub mean_kendall: f64,
    pub passing_fraction: f64,
}

pub fn evaluate_recovery(
    case: &RecoveryCase,
    rng: &mut impl Rng,
) -> Result<RecoveryReport, PreferenceError> {
    if !case.noise.is_finite() {
        return Err(ConfigurationError::NonFinite { field: "noise" }.into());
    }
    let truth = match &case.truth {
        Some(t) if t.len() != case.n_items => {
            return Err(ValidationError::DimensionMismatch {
                field: "truth",
                expected: case.n_items,
                actual: t.len(),
            }
            .into());
        }
        Some(t) if t.iter().any(|v| !v.is_finite()) => {
            return Err(ValidationError::NonFinite { field: "truth" }.into());
        }
        Some(t) => t.clone(),
        None => (0..case.n_items)
            .map(|_| sample_normal(&mut *rng, 0.0, 1.0))
            .collect(),
    };

    let config = SessionConfig::new(case.n_items)
        .with_max_trials(case.trials)
        .with_selector(case.selector);
    let mut session = PreferenceSession::new(config)?;
    let results =
        session.run_to_completion(|i, j| simulate_choice(&mut *rng, &truth, i, j, case.noise))?;

    let report = RecoveryReport {
        true_ranking: ranking_desc(&truth),
        recovered_ranking: results.ranking,
        spearman_rho: spearman_rho(&truth, &results.preferences),
        kendall_tau: kendall_tau_b(&truth, &results.preferences),
        pairwise_accuracy: pairwise_accuracy(&truth, &results.preferences),
        trials_used: results.trials_completed,
        converged: results.converged,
        true_scores: truth,
    };
    tracing::debug!(
        n_items = case.n_items,
        spearman = report.spearman_rho,
        kendall = report.kendall_tau,
        "recovery run finished"
    );
    Ok(report)
}

pub fn summarize(reports: &[RecoveryReport]) -> RecoverySummary {
    let runs = reports.len();
    if runs == 0 {
        return RecoverySummary {
            runs,
            mean_spearman: 0.0,
            mean_kendall: 0.0,
            passing_fraction: 0.0,
        };
    }
    let n = runs as f64;
    let passing = reports
        .iter()
        .filter(|r| r.spearman_rho > RECOVERY_RHO_TARGET)
        .count();
    RecoverySummary {
        runs,
        mean_spearman: reports.iter().map(|r| r.spearman_rho).sum::<f64>() / n,
        mean_kendall: reports.iter().map(|r| r.kendall_tau).sum::<f64>() / n,
        passing_fraction: passing as f64 / n,
    }
}

/// Simulated participant: picks `i` with probability `Φ((t_i - t_j) / noise)`.
pub fn simulate_choice(
    rng: &mut impl Rng,
    truth: &[f64],
    i: usize,
    j: usize,
    noise: f64,
) -> usize {
    let diff = truth[i] - truth[j];
    let p_first = if noise > 0.0 {
        normal_cdf(diff / noise)
    } else if diff >= 0.0 {
        1.0
    } else {
        0.0
    };
    if rng.gen::<f64>() < p_first {
        i
    } else {
        j
    }
}

pub fn sample_normal(rng: &mut impl Rng, mean: f64, std: f64) -> f64 {
    if std <= 0.0 {
        return mean;
    }
    let u1: f64 = rng.gen::<f64>().max(1e-12);
    let u2: f64 = rng.gen::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + z0 * std
}

fn ranking_desc(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

fn pairwise_accuracy(truth: &[f64], estimate: &[f64]) -> f64 {
    let n = truth.len().min(estimate.len());
    let mut ordered = 0usize;
    let mut agree = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            let dt = truth[i] - truth[j];
            if dt == 0.0 {
                continue;
            }
            ordered += 1;
            let de = estimate[i] - estimate[j];
            if dt * de > 0.0 {
                agree += 1;
            }
        }
    }
    if ordered == 0 {
        1.0
    } else {
        agree as f64 / ordered as f64
    }
}

pub fn kendall_tau_b(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n != y.len() || n < 2 {
        return 0.0;
    }

    let mut concordant = 0f64;
    let mut discordant = 0f64;
    let mut ties_x = 0f64;
    let mut ties_y = 0f64;

    for i in 0..n {
        for j in (i + 1)..n {
            let dx = x[i] - x[j];
            let dy = y[i] - y[j];
            if dx == 0.0 && dy == 0.0 {
                continue;
            } else if dx == 0.0 {
                ties_x += 1.0;
            } else if dy == 0.0 {
                ties_y += 1.0;
            } else if (dx > 0.0) == (dy > 0.0) {
                concordant += 1.0;
            } else {
                discordant += 1.0;
            }
        }
    }

    let denom = ((concordant + discordant + ties_x) * (concordant + discordant + ties_y)).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        (concordant - discordant) / denom
    }
}

/// Pearson correlation of average ranks.
pub fn spearman_rho(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n != y.len() || n < 2 {
        return 0.0;
    }
    let rx = ranks_with_ties(x);
    let ry = ranks_with_ties(y);

    let mean_x = rx.iter().sum::<f64>() / n as f64;
    let mean_y = ry.iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut den_x = 0.0;
    let mut den_y = 0.0;
    for (a, b) in rx.iter().zip(&ry) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        num += dx * dy;
        den_x += dx * dx;
        den_y += dy * dy;
    }

    if den_x == 0.0 || den_y == 0.0 {
        0.0
    } else {
        num / (den_x.sqrt() * den_y.sqrt())
    }
}

fn ranks_with_ties(scores: &[f64]) -> Vec<f64> {
    let n = scores.len();
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0usize;
    while start < n {
        let score = scores[indices[start]];
        let mut end = start + 1;
        while end < n && scores[indices[end]] == score {
            end += 1;
        }
        let avg_rank = (start + end - 1) as f64 / 2.0;
        for &idx in &indices[start..end] {
            ranks[idx] = avg_rank;
        }
        start = end;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rank_correlations_on_known_orders() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert!((spearman_rho(&x, &[10.0, 20.0, 30.0, 40.0]) - 1.0).abs() < 1e-12);
        assert!((spearman_rho(&x, &[4.0, 3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
        assert!((kendall_tau_b(&x, &[1.0, 3.0, 2.0, 4.0]) - 4.0 / 6.0).abs() < 1e-12);
        assert_eq!(spearman_rho(&x, &[1.0, 1.0, 1.0, 1.0]), 0.0);
    }

    #[test]
    fn ties_share_average_rank() {
        assert_eq!(ranks_with_ties(&[3.0, 1.0, 3.0, 2.0]), vec![2.5, 0.0, 2.5, 1.0]);
    }

    #[test]
    fn noiseless_chooser_picks_the_better_item() {
        let mut rng = StdRng::seed_from_u64(1);
        let truth = [0.0, 1.0];
        for _ in 0..20 {
            assert_eq!(simulate_choice(&mut rng, &truth, 0, 1, 0.0), 1);
            assert_eq!(simulate_choice(&mut rng, &truth, 1, 0, 0.0), 1);
        }
    }

    #[test]
    fn pairwise_accuracy_skips_true_ties() {
        assert_eq!(pairwise_accuracy(&[1.0, 1.0, 0.0], &[0.3, 0.2, 0.1]), 1.0);
        assert_eq!(pairwise_accuracy(&[2.0, 1.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn rejects_truth_of_wrong_length() {
        let case = RecoveryCase {
            n_items: 4,
            truth: Some(vec![0.0, 1.0]),
            ..RecoveryCase::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            evaluate_recovery(&case, &mut rng),
            Err(PreferenceError::Validation(ValidationError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn well_separated_truth_is_recovered() {
        let case = RecoveryCase {
            n_items: 6,
            trials: 50,
            noise: 0.1,
            selector: SelectorConfig::new(0.1, 0.1).unwrap(),
            truth: Some(vec![2.0, -1.0, 0.5, -2.0, 1.0, 0.0]),
        };
        let mut rng = StdRng::seed_from_u64(7);
        let report = evaluate_recovery(&case, &mut rng).unwrap();
        assert_eq!(report.trials_used, 50);
        assert_eq!(report.true_ranking, vec![0, 4, 2, 5, 1, 3]);
        assert!(report.spearman_rho > RECOVERY_RHO_TARGET, "{report:?}");
    }

    #[test]
    fn summary_averages_runs() {
        let base = RecoveryReport {
            true_scores: vec![],
            true_ranking: vec![],
            recovered_ranking: vec![],
            spearman_rho: 1.0,
            kendall_tau: 1.0,
            pairwise_accuracy: 1.0,
            trials_used: 10,
            converged: false,
        };
        let low = RecoveryReport {
            spearman_rho: 0.5,
            kendall_tau: 0.2,
            ..base.clone()
        };
        let summary = summarize(&[base, low]);
        assert_eq!(summary.runs, 2);
        assert!((summary.mean_spearman - 0.75).abs() < 1e-12);
        assert!((summary.passing_fraction - 0.5).abs() < 1e-12);
    }
}
