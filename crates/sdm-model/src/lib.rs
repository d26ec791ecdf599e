//! # sdm-model
//!
//! Presence/background modelling with a binomial generalised linear model.
//!
//! This crate fits a logistic regression of presence (1) against background
//! (0) on the environmental values of a feature table, selects a
//! classification threshold on held-out rows, and projects the fitted model
//! onto raster stacks.
//!
//! ## Features
//!
//! - **Model Fitting**: Maximum likelihood logistic regression with Wald
//!   statistics for every coefficient
//! - **Evaluation**: Threshold selection (max sensitivity + specificity and
//!   alternatives), confusion matrix, TSS and AUC
//! - **Prediction**: Probability surfaces over a raster stack and binary
//!   suitability maps

mod evaluate;
mod logistic;
mod predict;

pub use evaluate::{
    evaluate, evaluate_held_out, evaluate_scores, Confusion, EvalError, Evaluation,
    ThresholdCriterion,
};
pub use logistic::{
    fit_logistic, fit_logistic_with_config, Coefficient, FitConfig, FitError, LogisticModel,
    INTERCEPT_NAME,
};
pub use predict::{
    classify, predict_surface, SuitabilitySummary, PredictError, PROBABILITY_BAND,
    SUITABILITY_BAND,
};
