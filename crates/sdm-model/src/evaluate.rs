//! Held-out evaluation and threshold selection.

use crate::LogisticModel;
use sdm_data::{FeatureTable, Label};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during evaluation.
#[derive(Debug, Error)]
pub enum EvalError {
    /// One of the groups has no rows.
    #[error("No held-out {0:?} rows to evaluate")]
    EmptyGroup(Label),

    /// Table bands differ from the model's.
    #[error("Model expects bands {expected:?} but the table has {found:?}")]
    BandMismatch {
        /// Model band names.
        expected: Vec<String>,
        /// Table band names.
        found: Vec<String>,
    },

    /// A predicted score is NaN or infinite.
    #[error("Non-finite predicted probability")]
    NonFiniteScore,
}

/// Rule for picking the classification threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ThresholdCriterion {
    /// Maximise sensitivity + specificity.
    #[default]
    MaxSpecSens,
    /// Minimise |sensitivity - specificity|.
    EqualSensSpec,
    /// Highest threshold that keeps every presence.
    NoOmission,
}

impl ThresholdCriterion {
    /// Name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdCriterion::MaxSpecSens => "max_spec_sens",
            ThresholdCriterion::EqualSensSpec => "equal_sens_spec",
            ThresholdCriterion::NoOmission => "no_omission",
        }
    }
}

impl fmt::Display for ThresholdCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdCriterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "max_spec_sens" | "spec_sens" => Ok(ThresholdCriterion::MaxSpecSens),
            "equal_sens_spec" => Ok(ThresholdCriterion::EqualSensSpec),
            "no_omission" => Ok(ThresholdCriterion::NoOmission),
            other => Err(format!(
                "unknown threshold criterion '{}' (expected max_spec_sens, equal_sens_spec or no_omission)",
                other
            )),
        }
    }
}

/// Confusion matrix at a threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Confusion {
    /// Presence predicted as presence.
    pub true_positives: usize,
    /// Background predicted as presence.
    pub false_positives: usize,
    /// Presence predicted as background.
    pub false_negatives: usize,
    /// Background predicted as background.
    pub true_negatives: usize,
}

impl Confusion {
    /// Fraction of presence rows predicted as presence.
    pub fn sensitivity(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_negatives,
        )
    }

    /// Fraction of background rows predicted as background.
    pub fn specificity(&self) -> f64 {
        ratio(
            self.true_negatives,
            self.true_negatives + self.false_positives,
        )
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Result of evaluating a model on held-out rows.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Evaluation {
    /// Criterion used to pick the threshold.
    pub criterion: ThresholdCriterion,
    /// Selected probability threshold.
    pub threshold: f64,
    /// Sensitivity at the threshold.
    pub sensitivity: f64,
    /// Specificity at the threshold.
    pub specificity: f64,
    /// True skill statistic, sensitivity + specificity - 1.
    pub tss: f64,
    /// Area under the ROC curve.
    pub auc: f64,
    /// Confusion matrix at the threshold.
    pub confusion: Confusion,
    /// Held-out presence rows.
    pub presence_count: usize,
    /// Held-out background rows.
    pub background_count: usize,
}

/// Evaluate `model` on separate presence and background tables.
pub fn evaluate(
    model: &LogisticModel,
    presence: &FeatureTable,
    background: &FeatureTable,
    criterion: ThresholdCriterion,
) -> Result<Evaluation, EvalError> {
    for table in [presence, background] {
        if table.band_names() != model.band_names() {
            return Err(EvalError::BandMismatch {
                expected: model.band_names().to_vec(),
                found: table.band_names().to_vec(),
            });
        }
    }
    let evaluation = evaluate_scores(
        &model.predict_table(presence),
        &model.predict_table(background),
        criterion,
    )?;

    tracing::info!(
        threshold = evaluation.threshold,
        sensitivity = evaluation.sensitivity,
        specificity = evaluation.specificity,
        auc = evaluation.auc,
        %criterion,
        "Selected threshold"
    );
    Ok(evaluation)
}

/// Evaluate `model` on a mixed held-out table, split by label.
pub fn evaluate_held_out(
    model: &LogisticModel,
    test: &FeatureTable,
    criterion: ThresholdCriterion,
) -> Result<Evaluation, EvalError> {
    evaluate(
        model,
        &test.with_label(Label::Presence),
        &test.with_label(Label::Background),
        criterion,
    )
}

/// Evaluate predicted presence probabilities directly.
///
/// Candidate thresholds are the distinct scores; a row counts as predicted
/// presence when its score is at least the threshold. Ties between
/// candidates go to the lowest threshold.
pub fn evaluate_scores(
    presence: &[f64],
    background: &[f64],
    criterion: ThresholdCriterion,
) -> Result<Evaluation, EvalError> {
    if presence.is_empty() {
        return Err(EvalError::EmptyGroup(Label::Presence));
    }
    if background.is_empty() {
        return Err(EvalError::EmptyGroup(Label::Background));
    }
    if presence.iter().chain(background).any(|s| !s.is_finite()) {
        return Err(EvalError::NonFiniteScore);
    }

    let mut p_sorted = presence.to_vec();
    let mut b_sorted = background.to_vec();
    p_sorted.sort_by(f64::total_cmp);
    b_sorted.sort_by(f64::total_cmp);

    let mut candidates: Vec<f64> = p_sorted.iter().chain(&b_sorted).copied().collect();
    candidates.sort_by(f64::total_cmp);
    candidates.dedup();

    let confusion_at = |t: f64| {
        let fn_ = p_sorted.partition_point(|&s| s < t);
        let tn = b_sorted.partition_point(|&s| s < t);
        Confusion {
            true_positives: p_sorted.len() - fn_,
            false_positives: b_sorted.len() - tn,
            false_negatives: fn_,
            true_negatives: tn,
        }
    };

    // Sensitivity and specificity share the denominator n_pres * n_bg, so
    // both criteria compare exact integer numerators.
    let n_presence = p_sorted.len() as i128;
    let n_background = b_sorted.len() as i128;
    let mut best: Option<(f64, Confusion, i128)> = None;
    for &t in &candidates {
        let confusion = confusion_at(t);
        let tp = confusion.true_positives as i128 * n_background;
        let tn = confusion.true_negatives as i128 * n_presence;
        let (score, better) = match criterion {
            ThresholdCriterion::MaxSpecSens => {
                let score = tp + tn;
                (score, best.map_or(true, |(_, _, s)| score > s))
            }
            ThresholdCriterion::EqualSensSpec => {
                let score = -(tp - tn).abs();
                (score, best.map_or(true, |(_, _, s)| score > s))
            }
            // Sensitivity falls as the threshold rises, so the last candidate
            // with no omitted presence is the highest one.
            ThresholdCriterion::NoOmission => (tp, confusion.false_negatives == 0),
        };
        if better {
            best = Some((t, confusion, score));
        }
    }

    // Candidates include the lowest score, where every row is predicted
    // presence, so a threshold is always found.
    let (threshold, confusion) = best
        .map(|(t, c, _)| (t, c))
        .unwrap_or_else(|| (candidates[0], confusion_at(candidates[0])));
    let sensitivity = confusion.sensitivity();
    let specificity = confusion.specificity();

    Ok(Evaluation {
        criterion,
        threshold,
        sensitivity,
        specificity,
        tss: sensitivity + specificity - 1.0,
        auc: auc(&p_sorted, &b_sorted),
        confusion,
        presence_count: presence.len(),
        background_count: background.len(),
    })
}

/// Mann-Whitney AUC with ties counted as one half. Inputs must be sorted.
fn auc(presence: &[f64], background: &[f64]) -> f64 {
    let pairs = presence.len() as f64 * background.len() as f64;
    let wins: f64 = presence
        .iter()
        .map(|&p| {
            let below = background.partition_point(|&b| b < p);
            let not_above = background.partition_point(|&b| b <= p);
            below as f64 + 0.5 * (not_above - below) as f64
        })
        .sum();
    wins / pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perfect_ranking() {
        let eval = evaluate_scores(
            &[0.7, 0.8, 0.9],
            &[0.1, 0.2, 0.3, 0.4],
            ThresholdCriterion::MaxSpecSens,
        )
        .unwrap();
        assert_eq!(eval.threshold, 0.7);
        assert_eq!(eval.sensitivity, 1.0);
        assert_eq!(eval.specificity, 1.0);
        assert_eq!(eval.tss, 1.0);
        assert_eq!(eval.auc, 1.0);
        assert_eq!(
            eval.confusion,
            Confusion {
                true_positives: 3,
                false_positives: 0,
                false_negatives: 0,
                true_negatives: 4,
            }
        );
        assert_eq!(eval.presence_count, 3);
        assert_eq!(eval.background_count, 4);
    }

    #[test]
    fn test_max_spec_sens_overlap() {
        // t = 0.3: sens 4/4, spec 2/4 -> 1.5
        // t = 0.5: sens 3/4, spec 3/4 -> 1.5
        // t = 0.6: sens 2/4, spec 4/4 -> 1.5
        // Three-way tie, lowest threshold wins.
        let eval = evaluate_scores(
            &[0.5, 0.6, 0.8, 0.3],
            &[0.1, 0.2, 0.55, 0.3],
            ThresholdCriterion::MaxSpecSens,
        )
        .unwrap();
        assert_eq!(eval.threshold, 0.3);
        assert_relative_eq!(eval.sensitivity, 1.0);
        assert_relative_eq!(eval.specificity, 0.5);
        assert_relative_eq!(eval.tss, 0.5);
    }

    #[test]
    fn test_max_spec_sens_exact_tie() {
        // t = 0.2: sens 2/2, spec 2/6; t = 0.3: sens 1/2, spec 5/6.
        // Both sum to 4/3, though 1.0 + 1/3 < 0.5 + 5/6 in floating point.
        let eval = evaluate_scores(
            &[0.2, 0.3],
            &[0.1, 0.1, 0.2, 0.2, 0.2, 0.3],
            ThresholdCriterion::MaxSpecSens,
        )
        .unwrap();
        assert_eq!(eval.threshold, 0.2);
        assert_eq!(eval.confusion.true_positives, 2);
        assert_eq!(eval.confusion.true_negatives, 2);
    }

    #[test]
    fn test_no_omission() {
        let eval = evaluate_scores(
            &[0.5, 0.6, 0.8, 0.3],
            &[0.1, 0.2, 0.55, 0.3],
            ThresholdCriterion::NoOmission,
        )
        .unwrap();
        assert_eq!(eval.threshold, 0.3);
        assert_eq!(eval.sensitivity, 1.0);
        assert_eq!(eval.confusion.false_negatives, 0);
        // 0.3 background counts as predicted presence at t = 0.3
        assert_relative_eq!(eval.specificity, 0.5);
    }

    #[test]
    fn test_equal_sens_spec() {
        let eval = evaluate_scores(
            &[0.5, 0.6, 0.8, 0.3],
            &[0.1, 0.2, 0.55, 0.3],
            ThresholdCriterion::EqualSensSpec,
        )
        .unwrap();
        assert_eq!(eval.threshold, 0.5);
        assert_relative_eq!(eval.sensitivity, eval.specificity);
    }

    #[test]
    fn test_auc_with_ties() {
        // Pairs: (0.5 vs 0.5) tie, (0.5 vs 0.2) win, (0.9 vs both) wins
        let eval =
            evaluate_scores(&[0.5, 0.9], &[0.5, 0.2], ThresholdCriterion::default()).unwrap();
        assert_relative_eq!(eval.auc, 3.5 / 4.0);

        let eval = evaluate_scores(&[0.4; 3], &[0.4; 5], ThresholdCriterion::default()).unwrap();
        assert_relative_eq!(eval.auc, 0.5);
        assert_eq!(eval.threshold, 0.4);
    }

    #[test]
    fn test_threshold_in_unit_interval() {
        let presence = [0.91, 0.35, 0.66, 0.72, 0.12];
        let background = [0.05, 0.44, 0.27, 0.61, 0.09, 0.33];
        for criterion in [
            ThresholdCriterion::MaxSpecSens,
            ThresholdCriterion::EqualSensSpec,
            ThresholdCriterion::NoOmission,
        ] {
            let eval = evaluate_scores(&presence, &background, criterion).unwrap();
            assert!((0.0..=1.0).contains(&eval.threshold), "{}", criterion);
        }
    }

    #[test]
    fn test_empty_groups() {
        assert!(matches!(
            evaluate_scores(&[], &[0.1], ThresholdCriterion::default()),
            Err(EvalError::EmptyGroup(Label::Presence))
        ));
        assert!(matches!(
            evaluate_scores(&[0.1], &[], ThresholdCriterion::default()),
            Err(EvalError::EmptyGroup(Label::Background))
        ));
        assert!(matches!(
            evaluate_scores(&[f64::NAN], &[0.1], ThresholdCriterion::default()),
            Err(EvalError::NonFiniteScore)
        ));
    }

    #[test]
    fn test_criterion_parsing() {
        assert_eq!(
            "max_spec_sens".parse::<ThresholdCriterion>().unwrap(),
            ThresholdCriterion::MaxSpecSens
        );
        assert_eq!(
            "equal-sens-spec".parse::<ThresholdCriterion>().unwrap(),
            ThresholdCriterion::EqualSensSpec
        );
        assert_eq!(
            ThresholdCriterion::NoOmission.to_string().parse::<ThresholdCriterion>(),
            Ok(ThresholdCriterion::NoOmission)
        );
        assert!("kappa".parse::<ThresholdCriterion>().is_err());
    }
}
