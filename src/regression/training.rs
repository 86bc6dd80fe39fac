use super::{round_goals, FeatureSet, LinearModel, OutcomeModel, OutputSet};
use crate::error::PredictorError;
use crate::models::{MatchRecord, RatingSnapshot};
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

/// One in this many merged rows is held out for evaluation (an 80/20 split)
const TEST_SHARE: usize = 5;

/// Shuffle seed, fixed so retraining on the same data gives the same split
const SPLIT_SEED: u64 = 42;

/// Pivots smaller than this fraction of the largest diagonal entry are treated as zero
const SINGULAR_TOLERANCE: f64 = 1e-9;

/// A historical match with both teams' ratings attached
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub home_rating: f64,
    pub away_rating: f64,
    pub home_goals: f64,
    pub away_goals: f64,
}

impl TrainingRow {
    fn targets(&self, output_set: OutputSet) -> Vec<f64> {
        match output_set {
            OutputSet::Goals => vec![self.home_goals, self.away_goals],
            OutputSet::OutcomeAndGoals => {
                let (win, draw, loss) = if self.home_goals > self.away_goals {
                    (1.0, 0.0, 0.0)
                } else if self.home_goals < self.away_goals {
                    (0.0, 0.0, 1.0)
                } else {
                    (0.0, 1.0, 0.0)
                };
                vec![win, draw, loss, self.home_goals, self.away_goals]
            }
        }
    }
}

/// Hold-out accuracy of a fitted model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationMetrics {
    /// R² averaged uniformly over every output
    pub r2: f64,
    pub mae_home_goals: f64,
    pub mae_away_goals: f64,
    /// Same metrics with goal outputs passed through [`round_goals`]
    pub r2_rounded: f64,
    pub mae_home_goals_rounded: f64,
    pub mae_away_goals_rounded: f64,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub model: LinearModel,
    pub train_samples: usize,
    pub test_samples: usize,
    pub test_metrics: Option<EvaluationMetrics>,
}

/// Attach current ratings to each match; matches involving an unrated team are dropped
pub fn merge_matches_with_ratings(
    matches: &[MatchRecord],
    snapshot: &RatingSnapshot,
) -> Vec<TrainingRow> {
    let rows: Vec<TrainingRow> = matches
        .iter()
        .filter_map(|m| {
            let home = snapshot.get(&m.home_key)?;
            let away = snapshot.get(&m.away_key)?;
            Some(TrainingRow {
                home_rating: f64::from(home.rating),
                away_rating: f64::from(away.rating),
                home_goals: f64::from(m.home_goals),
                away_goals: f64::from(m.away_goals),
            })
        })
        .collect();

    let dropped = matches.len() - rows.len();
    if dropped > 0 {
        warn!("Dropped {} matches with no rating for one of the teams", dropped);
    }
    rows
}

/// Seeded shuffle, then hold out a fifth of the rows (rounded up) for testing
pub fn split_train_test(rows: &[TrainingRow]) -> (Vec<TrainingRow>, Vec<TrainingRow>) {
    let mut shuffled = rows.to_vec();
    let mut rng = rand::rngs::StdRng::seed_from_u64(SPLIT_SEED);
    shuffled.shuffle(&mut rng);

    let n_test = rows.len().div_ceil(TEST_SHARE);
    let train = shuffled.split_off(n_test);
    (train, shuffled)
}

/// Fit an ordinary least squares model for each output column.
///
/// Features are centred before solving the normal equations, which keeps the
/// system well conditioned for Elo-sized inputs; the intercept is recovered
/// from the means afterwards. Returns `(weights, intercepts)` with one weight
/// row per output.
pub fn fit_least_squares(
    features: &[Vec<f64>],
    targets: &[Vec<f64>],
) -> Result<(Vec<Vec<f64>>, Vec<f64>), PredictorError> {
    let n = features.len();
    if n == 0 || targets.len() != n {
        return Err(PredictorError::Model(
            "need the same, non-zero number of feature and target rows".to_string(),
        ));
    }
    let p = features[0].len();
    let k = targets[0].len();
    if features.iter().any(|f| f.len() != p) || targets.iter().any(|t| t.len() != k) {
        return Err(PredictorError::Model("ragged training data".to_string()));
    }
    if n <= p {
        return Err(PredictorError::Model(format!(
            "need more than {} samples to fit {} features, got {}",
            p, p, n
        )));
    }

    let x_mean = column_means(features);
    let y_mean = column_means(targets);

    // Gram matrix XᵀX and right-hand sides Xᵀy over centred data
    let mut gram = vec![vec![0.0; p]; p];
    let mut rhs = vec![vec![0.0; k]; p];
    for (x, y) in features.iter().zip(targets) {
        let xc: Vec<f64> = x.iter().zip(&x_mean).map(|(v, m)| v - m).collect();
        let yc: Vec<f64> = y.iter().zip(&y_mean).map(|(v, m)| v - m).collect();
        for (i, xi) in xc.iter().enumerate() {
            for (g, xj) in gram[i].iter_mut().zip(&xc) {
                *g += xi * xj;
            }
            for (r, yj) in rhs[i].iter_mut().zip(&yc) {
                *r += xi * yj;
            }
        }
    }

    // solution[i][j] = weight of feature i for output j
    let solution = solve_linear_system(gram, rhs)?;

    let weights: Vec<Vec<f64>> = (0..k)
        .map(|j| (0..p).map(|i| solution[i][j]).collect())
        .collect();
    let intercepts: Vec<f64> = (0..k)
        .map(|j| y_mean[j] - (0..p).map(|i| weights[j][i] * x_mean[i]).sum::<f64>())
        .collect();

    Ok((weights, intercepts))
}

fn column_means(rows: &[Vec<f64>]) -> Vec<f64> {
    let width = rows[0].len();
    let n = rows.len() as f64;
    (0..width)
        .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n)
        .collect()
}

/// Solve `a · x = b` for every column of `b` by Gaussian elimination with partial pivoting
fn solve_linear_system(
    mut a: Vec<Vec<f64>>,
    mut b: Vec<Vec<f64>>,
) -> Result<Vec<Vec<f64>>, PredictorError> {
    let n = a.len();
    let scale = (0..n).map(|i| a[i][i].abs()).fold(0.0, f64::max);
    if scale == 0.0 {
        return Err(PredictorError::Model(
            "features have zero variance".to_string(),
        ));
    }

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot_row][col].abs() <= SINGULAR_TOLERANCE * scale {
            return Err(PredictorError::Model(
                "features are linearly dependent; the system is singular".to_string(),
            ));
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        let pivot_a = a[col].clone();
        let pivot_b = b[col].clone();
        for row in (col + 1)..n {
            let factor = a[row][col] / pivot_a[col];
            if factor == 0.0 {
                continue;
            }
            for (value, pivot) in a[row].iter_mut().zip(&pivot_a).skip(col) {
                *value -= factor * pivot;
            }
            for (value, pivot) in b[row].iter_mut().zip(&pivot_b) {
                *value -= factor * pivot;
            }
        }
    }

    let width = b[0].len();
    let mut x = vec![vec![0.0; width]; n];
    for row in (0..n).rev() {
        for c in 0..width {
            let tail: f64 = ((row + 1)..n).map(|j| a[row][j] * x[j][c]).sum();
            x[row][c] = (b[row][c] - tail) / a[row][row];
        }
    }
    Ok(x)
}

/// Fit a model on merged rows and score it on the held-out fifth
pub fn train_model(
    rows: &[TrainingRow],
    output_set: OutputSet,
) -> Result<TrainingReport, PredictorError> {
    let (train, test) = split_train_test(rows);
    let feature_set = FeatureSet::EloPair;

    let features: Vec<Vec<f64>> = train
        .iter()
        .map(|r| feature_set.features(r.home_rating, r.away_rating))
        .collect();
    let targets: Vec<Vec<f64>> = train.iter().map(|r| r.targets(output_set)).collect();

    let (weights, intercepts) = fit_least_squares(&features, &targets)?;
    let mut model = LinearModel::new(feature_set, output_set, weights, intercepts)?;
    model.trained_at = Some(Utc::now());
    model.training_samples = train.len();

    let test_metrics = if test.is_empty() {
        None
    } else {
        Some(evaluate(&model, &test)?)
    };

    if let Some(metrics) = &test_metrics {
        info!(
            "Trained on {} matches, tested on {}: R² {:.4}, MAE home {:.4}, MAE away {:.4}",
            train.len(),
            test.len(),
            metrics.r2,
            metrics.mae_home_goals,
            metrics.mae_away_goals
        );
    }

    Ok(TrainingReport {
        model,
        train_samples: train.len(),
        test_samples: test.len(),
        test_metrics,
    })
}

/// Score any outcome model against rows with known results
pub fn evaluate(
    model: &dyn OutcomeModel,
    rows: &[TrainingRow],
) -> Result<EvaluationMetrics, PredictorError> {
    if rows.is_empty() {
        return Err(PredictorError::DataUnavailable(
            "no rows to evaluate".to_string(),
        ));
    }

    let output_set = model.output_set();
    let (home_idx, away_idx) = output_set.goal_indices();

    let actual: Vec<Vec<f64>> = rows.iter().map(|r| r.targets(output_set)).collect();
    let predicted = rows
        .iter()
        .map(|r| {
            model.predict(
                &model
                    .feature_set()
                    .features(r.home_rating, r.away_rating),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    let rounded: Vec<Vec<f64>> = predicted
        .iter()
        .map(|p| {
            let mut p = p.clone();
            p[home_idx] = f64::from(round_goals(p[home_idx]));
            p[away_idx] = f64::from(round_goals(p[away_idx]));
            p
        })
        .collect();

    Ok(EvaluationMetrics {
        r2: r2_uniform(&actual, &predicted),
        mae_home_goals: mean_absolute_error(&actual, &predicted, home_idx),
        mae_away_goals: mean_absolute_error(&actual, &predicted, away_idx),
        r2_rounded: r2_uniform(&actual, &rounded),
        mae_home_goals_rounded: mean_absolute_error(&actual, &rounded, home_idx),
        mae_away_goals_rounded: mean_absolute_error(&actual, &rounded, away_idx),
    })
}

/// Coefficient of determination per output, averaged.
/// A constant column scores 1.0 when predicted exactly and 0.0 otherwise.
fn r2_uniform(actual: &[Vec<f64>], predicted: &[Vec<f64>]) -> f64 {
    let outputs = actual[0].len();
    let n = actual.len() as f64;
    let total: f64 = (0..outputs)
        .map(|j| {
            let mean = actual.iter().map(|a| a[j]).sum::<f64>() / n;
            let ss_tot: f64 = actual.iter().map(|a| (a[j] - mean).powi(2)).sum();
            let ss_res: f64 = actual
                .iter()
                .zip(predicted)
                .map(|(a, p)| (a[j] - p[j]).powi(2))
                .sum();
            if ss_tot == 0.0 {
                if ss_res == 0.0 {
                    1.0
                } else {
                    0.0
                }
            } else {
                1.0 - ss_res / ss_tot
            }
        })
        .sum();
    total / outputs as f64
}

fn mean_absolute_error(actual: &[Vec<f64>], predicted: &[Vec<f64>], idx: usize) -> f64 {
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a[idx] - p[idx]).abs())
        .sum();
    total / actual.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{normalize_team_key, TeamRating};

    /// Goals generated exactly from a known linear rule
    fn synthetic_rows(count: usize) -> Vec<TrainingRow> {
        (0..count)
            .map(|i| {
                let home = 1700.0 + (i * 13 % 300) as f64;
                let away = 1650.0 + (i * 37 % 350) as f64;
                TrainingRow {
                    home_rating: home,
                    away_rating: away,
                    home_goals: 1.5 + 0.004 * (home - 1800.0) - 0.003 * (away - 1800.0),
                    away_goals: 1.2 - 0.002 * (home - 1800.0) + 0.0035 * (away - 1800.0),
                }
            })
            .collect()
    }

    #[test]
    fn test_fit_recovers_exact_coefficients() {
        let rows = synthetic_rows(60);
        let features: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| vec![r.home_rating, r.away_rating])
            .collect();
        let targets: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| vec![r.home_goals, r.away_goals])
            .collect();

        let (weights, intercepts) = fit_least_squares(&features, &targets).unwrap();

        assert!((weights[0][0] - 0.004).abs() < 1e-9);
        assert!((weights[0][1] + 0.003).abs() < 1e-9);
        assert!((weights[1][0] + 0.002).abs() < 1e-9);
        assert!((weights[1][1] - 0.0035).abs() < 1e-9);
        assert!((intercepts[0] - (1.5 - 7.2 + 5.4)).abs() < 1e-6);
        assert!((intercepts[1] - (1.2 + 3.6 - 6.3)).abs() < 1e-6);
    }

    #[test]
    fn test_fit_rejects_collinear_features() {
        let features: Vec<Vec<f64>> = synthetic_rows(30)
            .iter()
            .map(|r| vec![r.home_rating, r.away_rating, r.home_rating - r.away_rating])
            .collect();
        let targets: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();

        assert!(matches!(
            fit_least_squares(&features, &targets),
            Err(PredictorError::Model(_))
        ));
    }

    #[test]
    fn test_fit_rejects_too_few_samples() {
        let features = vec![vec![1800.0, 1700.0], vec![1900.0, 1750.0]];
        let targets = vec![vec![1.0], vec![2.0]];
        assert!(fit_least_squares(&features, &targets).is_err());
    }

    #[test]
    fn test_split_train_test() {
        let rows = synthetic_rows(10);
        let (train, test) = split_train_test(&rows);
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        // Every row lands in exactly one side
        for row in &rows {
            let count = train.iter().chain(&test).filter(|r| *r == row).count();
            assert_eq!(count, 1);
        }

        // Same seed, same split
        let (train_again, test_again) = split_train_test(&rows);
        assert_eq!(train, train_again);
        assert_eq!(test, test_again);
    }

    #[test]
    fn test_split_is_not_positional() {
        let rows = synthetic_rows(100);
        let (_, test) = split_train_test(&rows);
        assert_eq!(test.len(), 20);

        let every_fifth: Vec<TrainingRow> = rows.iter().skip(4).step_by(5).cloned().collect();
        assert_ne!(test, every_fifth);
        assert_ne!(test, rows[..20].to_vec());
    }

    #[test]
    fn test_split_rounds_test_size_up() {
        let (train, test) = split_train_test(&synthetic_rows(7));
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 5);
        assert!(split_train_test(&[]).1.is_empty());
    }

    #[test]
    fn test_train_model_scores_perfect_fit() {
        let report = train_model(&synthetic_rows(50), OutputSet::Goals).unwrap();
        assert_eq!(report.train_samples, 40);
        assert_eq!(report.test_samples, 10);
        assert_eq!(report.model.training_samples, 40);

        let metrics = report.test_metrics.unwrap();
        assert!(metrics.r2 > 0.999999);
        assert!(metrics.mae_home_goals < 1e-6);
        assert!(metrics.mae_away_goals < 1e-6);
        assert!(metrics.mae_home_goals_rounded <= 0.5);
    }

    #[test]
    fn test_train_outcome_model_shape() {
        let rows: Vec<TrainingRow> = synthetic_rows(40)
            .into_iter()
            .map(|mut r| {
                r.home_goals = r.home_goals.round().max(0.0);
                r.away_goals = r.away_goals.round().max(0.0);
                r
            })
            .collect();

        let report = train_model(&rows, OutputSet::OutcomeAndGoals).unwrap();
        assert_eq!(report.model.weights.len(), 5);
        assert_eq!(report.model.intercepts.len(), 5);
        assert_eq!(report.model.feature_set, FeatureSet::EloPair);
    }

    #[test]
    fn test_merge_drops_unrated_teams() {
        let now = Utc::now();
        let rating = |name: &str, rating: i32| TeamRating {
            name: name.to_string(),
            key: normalize_team_key(name),
            rating,
            last_update: now,
        };
        let snapshot = RatingSnapshot::new(
            vec![rating("Arsenal", 1950), rating("Chelsea", 1820)],
            now,
        );
        let record = |home: &str, away: &str| MatchRecord {
            season: "2023/24".to_string(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_key: normalize_team_key(home),
            away_key: normalize_team_key(away),
            home_goals: 2,
            away_goals: 1,
        };

        let rows = merge_matches_with_ratings(
            &[record("Arsenal", "Chelsea"), record("Arsenal", "Luton")],
            &snapshot,
        );

        assert_eq!(
            rows,
            vec![TrainingRow {
                home_rating: 1950.0,
                away_rating: 1820.0,
                home_goals: 2.0,
                away_goals: 1.0,
            }]
        );
    }
}
