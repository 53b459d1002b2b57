//! Session quality checks: attention items and minimum trial counts.

use std::fmt;

use serde::Serialize;

use crate::config::QualityCriteria;
use crate::error::ConfigurationError;
use crate::session::ChoiceRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExclusionReason {
    LowTrials { completed: usize, required: usize },
    LowAttention { rate: f64, required: f64 },
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowTrials {
                completed,
                required,
            } => write!(f, "low_trials:{completed}<{required}"),
            Self::LowAttention { rate, required } => {
                write!(f, "low_attention:{rate:.2}<{required:.2}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub attention_checks: usize,
    pub attention_correct: usize,
    /// Fraction correct; 1.0 when no attention item was ever presented.
    pub attention_rate: f64,
    pub attention_passed: bool,
    pub exclusion_reasons: Vec<ExclusionReason>,
}

impl QualityReport {
    pub fn excluded(&self) -> bool {
        !self.exclusion_reasons.is_empty()
    }
}

/// Score a choice log against `criteria`.
///
/// A trial is an attention check when either presented item is listed in
/// `attention_items`; the correct answer is the listed item (the first
/// presented one if both are listed).
pub fn evaluate_quality(
    choices: &[ChoiceRecord],
    trials_completed: usize,
    criteria: &QualityCriteria,
) -> Result<QualityReport, ConfigurationError> {
    criteria.validate()?;

    let marked = |item: usize| criteria.attention_items.contains(&item);
    let mut checks = 0usize;
    let mut correct = 0usize;
    for c in choices {
        let a_marked = marked(c.item_a);
        if !a_marked && !marked(c.item_b) {
            continue;
        }
        checks += 1;
        let expected = if a_marked { c.item_a } else { c.item_b };
        if c.winner == expected {
            correct += 1;
        }
    }

    let rate = if checks > 0 {
        correct as f64 / checks as f64
    } else {
        1.0
    };
    let passed = rate >= criteria.attention_min_rate;

    let mut reasons = Vec::new();
    if trials_completed < criteria.min_trials {
        reasons.push(ExclusionReason::LowTrials {
            completed: trials_completed,
            required: criteria.min_trials,
        });
    }
    if checks > 0 && !passed {
        reasons.push(ExclusionReason::LowAttention {
            rate,
            required: criteria.attention_min_rate,
        });
    }
    if !reasons.is_empty() {
        tracing::warn!(
            reasons = ?reasons.iter().map(ToString::to_string).collect::<Vec<_>>(),
            attention_rate = rate,
            "session flagged for exclusion"
        );
    }

    Ok(QualityReport {
        attention_checks: checks,
        attention_correct: correct,
        attention_rate: rate,
        attention_passed: passed,
        exclusion_reasons: reasons,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(trial: usize, a: usize, b: usize, winner: usize) -> ChoiceRecord {
        ChoiceRecord {
            trial,
            item_a: a,
            item_b: b,
            winner,
            response_time_ms: Some(1200),
        }
    }

    #[test]
    fn no_attention_items_always_passes() {
        let choices = vec![choice(1, 0, 1, 0), choice(2, 1, 2, 2)];
        let report = evaluate_quality(&choices, 2, &QualityCriteria::default()).unwrap();
        assert_eq!(report.attention_checks, 0);
        assert_eq!(report.attention_rate, 1.0);
        assert!(report.attention_passed);
        assert!(!report.excluded());
    }

    #[test]
    fn attention_rate_counts_marked_winners() {
        let criteria = QualityCriteria {
            attention_items: vec![3],
            ..QualityCriteria::default()
        };
        let choices = vec![
            choice(1, 3, 0, 3),
            choice(2, 1, 3, 1),
            choice(3, 0, 1, 0),
            choice(4, 2, 3, 2),
        ];
        let report = evaluate_quality(&choices, 4, &criteria).unwrap();
        assert_eq!(report.attention_checks, 3);
        assert_eq!(report.attention_correct, 1);
        assert!(!report.attention_passed);
        assert_eq!(
            report.exclusion_reasons,
            vec![ExclusionReason::LowAttention {
                rate: 1.0 / 3.0,
                required: 0.75
            }]
        );
        assert_eq!(report.exclusion_reasons[0].to_string(), "low_attention:0.33<0.75");
    }

    #[test]
    fn short_sessions_are_flagged() {
        let criteria = QualityCriteria {
            min_trials: 10,
            ..QualityCriteria::default()
        };
        let report = evaluate_quality(&[choice(1, 0, 1, 1)], 1, &criteria).unwrap();
        assert_eq!(
            report.exclusion_reasons,
            vec![ExclusionReason::LowTrials {
                completed: 1,
                required: 10
            }]
        );
        assert_eq!(report.exclusion_reasons[0].to_string(), "low_trials:1<10");
    }

    #[test]
    fn first_presented_wins_when_both_marked() {
        let criteria = QualityCriteria {
            attention_items: vec![0, 1],
            attention_min_rate: 1.0,
            ..QualityCriteria::default()
        };
        let report = evaluate_quality(&[choice(1, 1, 0, 1)], 1, &criteria).unwrap();
        assert_eq!(report.attention_correct, 1);
        assert!(report.attention_passed);
    }
}
