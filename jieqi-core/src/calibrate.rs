//! Turn a raw evaluation into advantage bands and win/draw/loss odds.
//!
//! All functions take the score from red's point of view. Callers holding a
//! side-to-move score normalise with [`red_perspective`] first.

use serde::{Deserialize, Serialize};

use crate::piece::Side;

/// Tunable constants. Every field has a default so a partial TOML table
/// is enough.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub decisive_threshold: i32,
    pub slight_threshold: i32,
    pub squash_scale: f64,
    pub squash_amplitude: f64,
    pub percent_floor: f64,
    pub percent_ceiling: f64,
    pub draw_ceiling: f64,
    pub draw_floor: f64,
    pub draw_phase_plies: f64,
    pub draw_score_scale: f64,
    pub logistic_scale: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            decisive_threshold: 200,
            slight_threshold: 50,
            squash_scale: 400.0,
            squash_amplitude: 50.0,
            percent_floor: 5.0,
            percent_ceiling: 95.0,
            draw_ceiling: 0.35,
            draw_floor: 0.02,
            draw_phase_plies: 120.0,
            draw_score_scale: 400.0,
            logistic_scale: 200.0,
        }
    }
}

impl CalibrationConfig {
    /// Check that every bound is usable: finite, positive scales, and
    /// floors not above their ceilings.
    pub fn validate(&self) -> Result<(), String> {
        let named = [
            ("squash_scale", self.squash_scale),
            ("squash_amplitude", self.squash_amplitude),
            ("percent_floor", self.percent_floor),
            ("percent_ceiling", self.percent_ceiling),
            ("draw_ceiling", self.draw_ceiling),
            ("draw_floor", self.draw_floor),
            ("draw_phase_plies", self.draw_phase_plies),
            ("draw_score_scale", self.draw_score_scale),
            ("logistic_scale", self.logistic_scale),
        ];
        if let Some((name, value)) = named.iter().find(|(_, v)| !v.is_finite()) {
            return Err(format!("{name} must be finite, got {value}"));
        }
        let scales = [
            ("squash_scale", self.squash_scale),
            ("draw_phase_plies", self.draw_phase_plies),
            ("draw_score_scale", self.draw_score_scale),
            ("logistic_scale", self.logistic_scale),
        ];
        if let Some((name, value)) = scales.iter().find(|(_, v)| *v <= 0.0) {
            return Err(format!("{name} must be positive, got {value}"));
        }
        if self.percent_floor > self.percent_ceiling {
            return Err(format!(
                "percent_floor {} is above percent_ceiling {}",
                self.percent_floor, self.percent_ceiling
            ));
        }
        if self.draw_floor > self.draw_ceiling {
            return Err(format!(
                "draw_floor {} is above draw_ceiling {}",
                self.draw_floor, self.draw_ceiling
            ));
        }
        if self.slight_threshold > self.decisive_threshold {
            return Err(format!(
                "slight_threshold {} is above decisive_threshold {}",
                self.slight_threshold, self.decisive_threshold
            ));
        }
        Ok(())
    }
}

/// Negate a side-to-move score when black is to move.
#[inline]
pub fn red_perspective(score: i32, side_to_move: Side) -> i32 {
    match side_to_move {
        Side::Red => score,
        Side::Black => score.saturating_neg(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvantageLevel {
    Balanced,
    Slight,
    Decisive,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Advantage {
    pub level: AdvantageLevel,
    /// Favoured side; None when balanced.
    pub side: Option<Side>,
    /// Red's display percentage.
    pub percentage: f64,
    pub label: String,
}

/// Band the score and compute red's display percentage.
pub fn advantage(score: i32, config: &CalibrationConfig) -> Advantage {
    let magnitude = score.unsigned_abs();
    let level = if magnitude > config.decisive_threshold.unsigned_abs() {
        AdvantageLevel::Decisive
    } else if magnitude > config.slight_threshold.unsigned_abs() {
        AdvantageLevel::Slight
    } else {
        AdvantageLevel::Balanced
    };
    let side = match level {
        AdvantageLevel::Balanced => None,
        _ if score > 0 => Some(Side::Red),
        _ => Some(Side::Black),
    };
    let label = match (level, side) {
        (AdvantageLevel::Slight, Some(side)) => format!("{} is slightly better", title(side)),
        (AdvantageLevel::Decisive, Some(side)) => {
            format!("{} holds a decisive advantage", title(side))
        }
        _ => "Balanced".to_string(),
    };
    Advantage {
        level,
        side,
        percentage: percentage(score, config),
        label,
    }
}

fn title(side: Side) -> &'static str {
    match side {
        Side::Red => "Red",
        Side::Black => "Black",
    }
}

/// `50 + amplitude * tanh(score / scale)`, clamped to the display band.
pub fn percentage(score: i32, config: &CalibrationConfig) -> f64 {
    let raw = 50.0 + config.squash_amplitude * (f64::from(score) / config.squash_scale).tanh();
    raw.clamp(config.percent_floor, config.percent_ceiling)
}

/// Outcome probabilities for red.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Wdl {
    pub win: f64,
    pub draw: f64,
    pub loss: f64,
}

impl Wdl {
    /// Win probability for `side`.
    pub fn for_side(&self, side: Side) -> f64 {
        match side {
            Side::Red => self.win,
            Side::Black => self.loss,
        }
    }
}

#[inline]
fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Draw mass shrinks with game progress and with the size of the score;
/// the rest splits logistically between win and loss.
pub fn win_draw_loss(score: i32, move_count: usize, config: &CalibrationConfig) -> Wdl {
    let plies = move_count as f64;
    let magnitude = f64::from(score).abs();
    let decay = (-plies / config.draw_phase_plies).exp() * (-magnitude / config.draw_score_scale).exp();
    let draw = (config.draw_floor + (config.draw_ceiling - config.draw_floor) * decay).clamp(0.0, 1.0);

    let share = logistic(f64::from(score) / config.logistic_scale);
    let rest = 1.0 - draw;
    let (win, loss) = (rest * share, rest * (1.0 - share));

    let total = win + draw + loss;
    if total <= 0.0 || !total.is_finite() {
        return Wdl {
            win: 0.0,
            draw: 1.0,
            loss: 0.0,
        };
    }
    Wdl {
        win: win / total,
        draw: draw / total,
        loss: loss / total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_zero_score_balanced() {
        let config = CalibrationConfig::default();
        let adv = advantage(0, &config);
        assert_eq!(adv.level, AdvantageLevel::Balanced);
        assert_eq!(adv.side, None);
        assert_eq!(adv.percentage, 50.0);
        assert_eq!(adv.label, "Balanced");

        let wdl = win_draw_loss(0, 0, &config);
        assert!((wdl.win - wdl.loss).abs() < 1e-12);
    }

    #[test]
    fn test_large_score_decisive_and_clamped() {
        let config = CalibrationConfig::default();
        let adv = advantage(1000, &config);
        assert_eq!(adv.level, AdvantageLevel::Decisive);
        assert_eq!(adv.side, Some(Side::Red));
        assert_eq!(adv.percentage, config.percent_ceiling);

        let adv = advantage(-1000, &config);
        assert_eq!(adv.side, Some(Side::Black));
        assert_eq!(adv.percentage, config.percent_floor);
        assert_eq!(adv.label, "Black holds a decisive advantage");

        let wdl = win_draw_loss(1000, 0, &config);
        assert!(wdl.draw < config.draw_floor + 0.03);
        assert!(wdl.win > 0.9);
    }

    #[test]
    fn test_bands() {
        let config = CalibrationConfig::default();
        assert_eq!(advantage(50, &config).level, AdvantageLevel::Balanced);
        assert_eq!(advantage(51, &config).level, AdvantageLevel::Slight);
        assert_eq!(advantage(200, &config).level, AdvantageLevel::Slight);
        assert_eq!(advantage(201, &config).level, AdvantageLevel::Decisive);
        assert_eq!(advantage(-120, &config).label, "Black is slightly better");
        assert_eq!(advantage(i32::MIN, &config).level, AdvantageLevel::Decisive);
    }

    #[test]
    fn test_percentage_monotonic_and_side_passes_balanced() {
        let config = CalibrationConfig::default();
        let mut last = f64::NEG_INFINITY;
        let mut last_side = Some(Side::Black);
        for score in -2000..=2000 {
            let adv = advantage(score, &config);
            assert!(adv.percentage >= last, "score {score}");
            last = adv.percentage;
            if adv.side == Some(Side::Red) {
                assert_ne!(last_side, Some(Side::Black), "score {score}");
            }
            last_side = adv.side;
        }
    }

    #[test]
    fn test_red_perspective() {
        assert_eq!(red_perspective(120, Side::Red), 120);
        assert_eq!(red_perspective(120, Side::Black), -120);
        assert_eq!(red_perspective(i32::MIN, Side::Black), i32::MAX);
    }

    #[test]
    fn test_draw_decays_with_progress() {
        let config = CalibrationConfig::default();
        let early = win_draw_loss(30, 0, &config);
        let late = win_draw_loss(30, 200, &config);
        assert!(early.draw > late.draw);
        assert!((early.draw - (0.02 + 0.33 * (-30.0f64 / 400.0).exp())).abs() < 1e-9);
    }

    #[test]
    fn test_wdl_normalised() {
        let config = CalibrationConfig::default();
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..2000 {
            let score = rng.random_range(-30_000..=30_000);
            let moves = rng.random_range(0..400);
            let wdl = win_draw_loss(score, moves, &config);
            assert!((wdl.win + wdl.draw + wdl.loss - 1.0).abs() < 1e-6);
            for p in [wdl.win, wdl.draw, wdl.loss] {
                assert!((0.0..=1.0).contains(&p));
            }
        }
    }

    #[test]
    fn test_for_side() {
        let wdl = win_draw_loss(300, 10, &CalibrationConfig::default());
        assert_eq!(wdl.for_side(Side::Red), wdl.win);
        assert_eq!(wdl.for_side(Side::Black), wdl.loss);
    }

    #[test]
    fn test_validate() {
        assert_eq!(CalibrationConfig::default().validate(), Ok(()));

        let inverted = CalibrationConfig {
            percent_floor: 95.0,
            percent_ceiling: 5.0,
            ..CalibrationConfig::default()
        };
        assert!(inverted.validate().unwrap_err().contains("percent_floor"));

        let nan = CalibrationConfig {
            percent_ceiling: f64::NAN,
            ..CalibrationConfig::default()
        };
        assert!(nan.validate().unwrap_err().contains("finite"));

        let flat = CalibrationConfig {
            logistic_scale: 0.0,
            ..CalibrationConfig::default()
        };
        assert!(flat.validate().unwrap_err().contains("positive"));

        let draws = CalibrationConfig {
            draw_floor: 0.5,
            draw_ceiling: 0.1,
            ..CalibrationConfig::default()
        };
        assert!(draws.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CalibrationConfig = serde_json::from_str(r#"{"slight_threshold": 80}"#).unwrap();
        assert_eq!(config.slight_threshold, 80);
        assert_eq!(config.decisive_threshold, 200);
    }
}
