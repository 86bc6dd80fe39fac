//! Outcome model: a fitted linear map from rating features to expected goals
//! (and optionally win/draw/loss probabilities).
//!
//! The pipeline only sees the [`OutcomeModel`] trait, so the coefficient file
//! can be replaced by any other fitted model with the same feature/output shape.

pub mod training;

use crate::error::PredictorError;
use crate::models::OutcomeProbabilities;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bumped whenever the serialized layout of [`LinearModel`] changes
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Shape of the feature vector a model expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// `[home_rating, away_rating]`
    EloPair,
    /// `[home_rating, away_rating, home_rating - away_rating]`
    EloPairWithDiff,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        match self {
            FeatureSet::EloPair => 2,
            FeatureSet::EloPairWithDiff => 3,
        }
    }

    pub fn features(&self, home_rating: f64, away_rating: f64) -> Vec<f64> {
        match self {
            FeatureSet::EloPair => vec![home_rating, away_rating],
            FeatureSet::EloPairWithDiff => {
                vec![home_rating, away_rating, home_rating - away_rating]
            }
        }
    }
}

/// Shape of the output vector a model produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSet {
    /// `[home_goals, away_goals]`
    Goals,
    /// `[win_prob, draw_prob, loss_prob, home_goals, away_goals]`
    OutcomeAndGoals,
}

impl OutputSet {
    pub fn len(&self) -> usize {
        match self {
            OutputSet::Goals => 2,
            OutputSet::OutcomeAndGoals => 5,
        }
    }

    /// Positions of the home and away goal outputs
    pub fn goal_indices(&self) -> (usize, usize) {
        match self {
            OutputSet::Goals => (0, 1),
            OutputSet::OutcomeAndGoals => (3, 4),
        }
    }

    pub fn interpret(&self, outputs: &[f64]) -> Result<ModelOutput, PredictorError> {
        if outputs.len() != self.len() {
            return Err(PredictorError::Model(format!(
                "expected {} outputs, got {}",
                self.len(),
                outputs.len()
            )));
        }

        let (home, away) = self.goal_indices();
        let probabilities = match self {
            OutputSet::Goals => None,
            OutputSet::OutcomeAndGoals => Some(OutcomeProbabilities {
                home_win: outputs[0],
                draw: outputs[1],
                away_win: outputs[2],
            }),
        };

        Ok(ModelOutput {
            expected_home_goals: outputs[home],
            expected_away_goals: outputs[away],
            probabilities,
        })
    }
}

/// Model outputs with names attached
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub expected_home_goals: f64,
    pub expected_away_goals: f64,
    pub probabilities: Option<OutcomeProbabilities>,
}

/// Anything that maps a fixed-shape feature vector to a fixed-shape output vector
pub trait OutcomeModel: Send + Sync {
    fn feature_set(&self) -> FeatureSet;

    fn output_set(&self) -> OutputSet;

    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, PredictorError>;
}

/// Expected goals rounded for display: nearest whole goal, never negative.
/// The same rule applies to both sides.
pub fn round_goals(expected: f64) -> u32 {
    expected.round().max(0.0) as u32
}

/// Serialized coefficient set: one weight row and one intercept per output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub version: u32,
    pub feature_set: FeatureSet,
    pub output_set: OutputSet,
    pub weights: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub training_samples: usize,
}

impl LinearModel {
    pub fn new(
        feature_set: FeatureSet,
        output_set: OutputSet,
        weights: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
    ) -> Result<Self, PredictorError> {
        let model = Self {
            version: MODEL_FORMAT_VERSION,
            feature_set,
            output_set,
            weights,
            intercepts,
            trained_at: None,
            training_samples: 0,
        };
        model.validate()?;
        Ok(model)
    }

    /// Check the version and that the coefficient shapes agree with the declared sets
    pub fn validate(&self) -> Result<(), PredictorError> {
        if self.version != MODEL_FORMAT_VERSION {
            return Err(PredictorError::Model(format!(
                "unsupported model format version {} (expected {})",
                self.version, MODEL_FORMAT_VERSION
            )));
        }
        if self.weights.len() != self.output_set.len()
            || self.intercepts.len() != self.output_set.len()
        {
            return Err(PredictorError::Model(format!(
                "{:?} needs {} outputs, found {} weight rows and {} intercepts",
                self.output_set,
                self.output_set.len(),
                self.weights.len(),
                self.intercepts.len()
            )));
        }
        if let Some(row) = self
            .weights
            .iter()
            .find(|row| row.len() != self.feature_set.len())
        {
            return Err(PredictorError::Model(format!(
                "{:?} needs {} weights per output, found {}",
                self.feature_set,
                self.feature_set.len(),
                row.len()
            )));
        }
        let all_finite = self
            .weights
            .iter()
            .flatten()
            .chain(self.intercepts.iter())
            .all(|w| w.is_finite());
        if !all_finite {
            return Err(PredictorError::Model(
                "model coefficients must be finite".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file {}", path.display()))?;
        let model: LinearModel =
            serde_json::from_str(&json).context("Failed to deserialize model")?;
        model.validate()?;
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize model")?;
        std::fs::write(path, json).context("Failed to write model file")?;
        Ok(())
    }
}

impl OutcomeModel for LinearModel {
    fn feature_set(&self) -> FeatureSet {
        self.feature_set
    }

    fn output_set(&self) -> OutputSet {
        self.output_set
    }

    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, PredictorError> {
        if features.len() != self.feature_set.len() {
            return Err(PredictorError::Model(format!(
                "expected {} features, got {}",
                self.feature_set.len(),
                features.len()
            )));
        }

        Ok(self
            .weights
            .iter()
            .zip(&self.intercepts)
            .map(|(row, intercept)| {
                intercept + row.iter().zip(features).map(|(w, x)| w * x).sum::<f64>()
            })
            .collect())
    }
}
