use crate::models::{DecimalOdds, OutcomeProbabilities};

/// Rating points per factor of ten in win expectancy
const ELO_SCALE: f64 = 400.0;

/// Draw probability between evenly rated teams
const BASE_DRAW_PROB: f64 = 0.30;

/// Standard Elo win expectancy for the home side
/// E = 1 / (1 + 10^(-diff / 400))
pub fn win_expectancy(elo_diff: f64) -> f64 {
    1.0 / (1.0 + 10_f64.powf(-elo_diff / ELO_SCALE))
}

/// Draw probability, 0.30 at equal ratings and decaying with the gap
pub fn draw_probability(elo_diff: f64) -> f64 {
    BASE_DRAW_PROB * (-elo_diff.abs() / ELO_SCALE).exp()
}

/// Win/draw/loss probabilities from the home-minus-away rating difference.
///
/// P_home = E_home - P_draw / 2 and P_away = 1 - P_home - P_draw. Past a gap of
/// roughly 575 points the raw underdog probability dips below zero, because the
/// Elo tail shrinks faster than the draw term; the underdog is clamped to zero
/// and the favourite takes 1 - P_draw, so the three still sum to one.
pub fn outcome_probabilities(elo_diff: f64) -> OutcomeProbabilities {
    let draw = draw_probability(elo_diff);
    let home_win = win_expectancy(elo_diff) - 0.5 * draw;
    let away_win = 1.0 - home_win - draw;

    if away_win < 0.0 {
        OutcomeProbabilities {
            home_win: 1.0 - draw,
            draw,
            away_win: 0.0,
        }
    } else if home_win < 0.0 {
        OutcomeProbabilities {
            home_win: 0.0,
            draw,
            away_win: 1.0 - draw,
        }
    } else {
        OutcomeProbabilities {
            home_win,
            draw,
            away_win,
        }
    }
}

/// Convert a probability to decimal odds; zero probability gives infinite odds
pub fn probability_to_decimal_odds(prob: f64) -> f64 {
    if prob > 0.0 {
        1.0 / prob
    } else {
        f64::INFINITY
    }
}

pub fn decimal_odds(probs: &OutcomeProbabilities) -> DecimalOdds {
    DecimalOdds {
        home_win: probability_to_decimal_odds(probs.home_win),
        draw: probability_to_decimal_odds(probs.draw),
        away_win: probability_to_decimal_odds(probs.away_win),
    }
}

/// Render the betting odds block shown under a prediction
pub fn betting_odds_lines(odds: &DecimalOdds) -> Vec<String> {
    vec![
        "--- Betting Odds (Decimal Format) ---".to_string(),
        format!("Home Win Odds: {:.2}", odds.home_win),
        format!("Draw Odds: {:.2}", odds.draw),
        format!("Away Win Odds: {:.2}", odds.away_win),
    ]
}

/// Round to two decimal places for display, passing infinities through
pub fn round2(value: f64) -> f64 {
    if value.is_finite() {
        (value * 100.0).round() / 100.0
    } else {
        value
    }
}
