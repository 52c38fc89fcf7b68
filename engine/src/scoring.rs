//! Star rating, accuracy, bonus and reward evaluation.
//!
//! Pure functions over the finished tallies; nothing here holds engine
//! state.  Each game variant brings its own [`ScoringConfig`].

use crate::sexp::format_event;

// ── Config ─────────────────────────────────────────────────

/// How a tier combines its accuracy and time gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Both gates must pass.
    All,
    /// Either gate passing is enough.
    Any,
}

impl Gate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "all" | "and" => Some(Self::All),
            "any" | "or" => Some(Self::Any),
            _ => None,
        }
    }
}

/// One star tier.
#[derive(Debug, Clone, PartialEq)]
pub struct StarTier {
    pub stars: u8,
    /// Accuracy in [0, 1] the tier requires.
    pub min_accuracy: f64,
    /// Finish strictly under this time (ms); `None` means no time gate.
    pub max_elapsed_ms: Option<f64>,
    pub gate: Gate,
}

impl StarTier {
    pub fn new(stars: u8, min_accuracy: f64, max_elapsed_ms: Option<f64>, gate: Gate) -> Self {
        Self {
            stars,
            min_accuracy,
            max_elapsed_ms,
            gate,
        }
    }

    fn passes(&self, accuracy: f64, elapsed_ms: f64) -> bool {
        let accurate = accuracy >= self.min_accuracy;
        match (self.gate, self.max_elapsed_ms) {
            (_, None) => accurate,
            (Gate::All, Some(max)) => accurate && elapsed_ms < max,
            (Gate::Any, Some(max)) => accurate || elapsed_ms < max,
        }
    }

    fn to_sexp(&self) -> String {
        format!(
            "(:stars {} :min-accuracy {:.2} :max-elapsed-ms {} :gate :{})",
            self.stars,
            self.min_accuracy,
            self.max_elapsed_ms
                .map(|m| format!("{:.0}", m))
                .unwrap_or_else(|| "nil".to_string()),
            self.gate.as_str(),
        )
    }
}

/// Bonus for finishing under par: `floor(par_s − elapsed_s) × points`,
/// never negative.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBonus {
    pub par_ms: f64,
    pub points_per_second: i64,
}

impl TimeBonus {
    pub fn points(&self, elapsed_ms: f64) -> i64 {
        let seconds_left = ((self.par_ms - elapsed_ms) / 1000.0).floor();
        if seconds_left <= 0.0 {
            return 0;
        }
        seconds_left as i64 * self.points_per_second
    }
}

/// Coins and XP paid out for a finished level.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardConfig {
    pub base_coins: i64,
    pub coins_per_star: i64,
    /// One extra coin per this many points of final score; 0 disables.
    pub score_per_coin: i64,
    pub base_xp: i64,
    pub xp_per_star: i64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            base_coins: 10,
            coins_per_star: 15,
            score_per_coin: 10,
            base_xp: 20,
            xp_per_star: 10,
        }
    }
}

impl RewardConfig {
    fn to_sexp(&self) -> String {
        format!(
            "(:base-coins {} :coins-per-star {} :score-per-coin {} :base-xp {} :xp-per-star {})",
            self.base_coins, self.coins_per_star, self.score_per_coin, self.base_xp, self.xp_per_star,
        )
    }
}

/// Per-variant scoring thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Tiers tried highest stars first.
    pub tiers: Vec<StarTier>,
    /// Stars awarded when no tier passes.
    pub min_stars: u8,
    pub time_bonus: Option<TimeBonus>,
    /// `floor(accuracy × accuracy_bonus)` added to the final score.
    pub accuracy_bonus: i64,
    pub rewards: RewardConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                StarTier::new(3, 0.9, Some(60_000.0), Gate::All),
                StarTier::new(2, 0.7, Some(90_000.0), Gate::All),
            ],
            min_stars: 1,
            time_bonus: None,
            accuracy_bonus: 0,
            rewards: RewardConfig::default(),
        }
    }
}

impl ScoringConfig {
    /// Drag-to-match thresholds.
    pub fn matching() -> Self {
        Self {
            tiers: vec![
                StarTier::new(3, 0.9, Some(60_000.0), Gate::All),
                StarTier::new(2, 0.7, Some(90_000.0), Gate::Any),
            ],
            min_stars: 1,
            time_bonus: Some(TimeBonus {
                par_ms: 300_000.0,
                points_per_second: 2,
            }),
            accuracy_bonus: 0,
            rewards: RewardConfig::default(),
        }
    }

    /// Card-pair thresholds; accuracy here is move efficiency.
    pub fn memory() -> Self {
        Self {
            tiers: vec![
                StarTier::new(3, 0.8, Some(60_000.0), Gate::All),
                StarTier::new(2, 0.5, Some(90_000.0), Gate::Any),
            ],
            min_stars: 1,
            time_bonus: Some(TimeBonus {
                par_ms: 300_000.0,
                points_per_second: 2,
            }),
            accuracy_bonus: 100,
            rewards: RewardConfig::default(),
        }
    }

    /// Sentence-ordering thresholds.
    pub fn sentence() -> Self {
        Self {
            tiers: vec![
                StarTier::new(3, 0.9, Some(70_000.0), Gate::All),
                StarTier::new(2, 0.7, None, Gate::All),
            ],
            min_stars: 1,
            time_bonus: Some(TimeBonus {
                par_ms: 200_000.0,
                points_per_second: 1,
            }),
            accuracy_bonus: 0,
            rewards: RewardConfig::default(),
        }
    }

    /// Body-part thresholds.
    pub fn body_parts() -> Self {
        Self {
            tiers: vec![
                StarTier::new(3, 1.0, None, Gate::All),
                StarTier::new(2, 0.7, None, Gate::All),
            ],
            min_stars: 1,
            time_bonus: None,
            accuracy_bonus: 0,
            rewards: RewardConfig::default(),
        }
    }

    pub fn config_sexp(&self) -> String {
        let tiers: Vec<String> = self.tiers.iter().map(|t| t.to_sexp()).collect();
        let bonus = match &self.time_bonus {
            Some(b) => format!("(:par-ms {:.0} :points-per-second {})", b.par_ms, b.points_per_second),
            None => "nil".to_string(),
        };
        format!(
            "(:tiers ({}) :min-stars {} :time-bonus {} :accuracy-bonus {} :rewards {})",
            tiers.join(" "),
            self.min_stars,
            bonus,
            self.accuracy_bonus,
            self.rewards.to_sexp(),
        )
    }
}

// ── Evaluation ─────────────────────────────────────────────

/// Stars, accuracy and bonuses for one finished level.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub stars: u8,
    pub accuracy: f64,
    pub time_bonus: i64,
    pub accuracy_bonus: i64,
}

/// `total / (total + mistakes)`; a level with nothing attempted is 1.0.
pub fn accuracy(mistakes: u32, total_units: u32) -> f64 {
    let denom = total_units as f64 + mistakes as f64;
    if denom <= 0.0 {
        return 1.0;
    }
    total_units as f64 / denom
}

/// Evaluate a finished level.
pub fn evaluate(mistakes: u32, total_units: u32, elapsed_ms: f64, config: &ScoringConfig) -> Evaluation {
    let accuracy = accuracy(mistakes, total_units);
    let mut tiers: Vec<&StarTier> = config.tiers.iter().collect();
    tiers.sort_by(|a, b| b.stars.cmp(&a.stars));
    let stars = tiers
        .iter()
        .find(|t| t.passes(accuracy, elapsed_ms))
        .map(|t| t.stars)
        .unwrap_or(config.min_stars)
        .max(config.min_stars)
        .min(3);
    let time_bonus = config
        .time_bonus
        .as_ref()
        .map(|b| b.points(elapsed_ms))
        .unwrap_or(0);
    let accuracy_bonus = (accuracy * config.accuracy_bonus as f64).floor() as i64;
    Evaluation {
        stars,
        accuracy,
        time_bonus,
        accuracy_bonus,
    }
}

/// Totals paid out for one finished level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rewards {
    pub coins: i64,
    pub xp: i64,
}

impl Rewards {
    pub fn to_sexp(&self) -> String {
        format!("(:coins {} :xp {})", self.coins, self.xp)
    }
}

/// Rewards for a final star count and score.  A negative score earns no
/// score coins.
pub fn rewards(stars: u8, score: i64, config: &RewardConfig) -> Rewards {
    let stars = stars as i64;
    let score_coins = if config.score_per_coin > 0 {
        score.max(0) / config.score_per_coin
    } else {
        0
    };
    Rewards {
        coins: config.base_coins + stars * config.coins_per_star + score_coins,
        xp: config.base_xp + stars * config.xp_per_star,
    }
}

// ── Result ─────────────────────────────────────────────────

/// Final record of one play session.  Built once, never changed.
#[derive(Debug, Clone, PartialEq)]
pub struct GameResult {
    pub score: i64,
    pub stars: u8,
    pub elapsed_ms: u64,
    pub mistakes: u32,
    pub accuracy: f64,
}

impl GameResult {
    /// Combine the running score with an evaluation.
    pub fn new(score: i64, mistakes: u32, elapsed_ms: f64, eval: &Evaluation) -> Self {
        Self {
            score: (score + eval.time_bonus + eval.accuracy_bonus).max(0),
            stars: eval.stars,
            elapsed_ms: elapsed_ms.max(0.0) as u64,
            mistakes,
            accuracy: eval.accuracy,
        }
    }

    pub fn to_sexp(&self) -> String {
        format_event(
            "complete",
            &[
                ("score", &self.score.to_string()),
                ("stars", &self.stars.to_string()),
                ("elapsed-ms", &self.elapsed_ms.to_string()),
                ("mistakes", &self.mistakes.to_string()),
                ("accuracy", &format!("{:.3}", self.accuracy)),
            ],
        )
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(0, 4), 1.0);
        assert_eq!(accuracy(0, 0), 1.0);
        assert!((accuracy(1, 3) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_fast_is_three_stars() {
        let e = evaluate(0, 4, 30_000.0, &ScoringConfig::matching());
        assert_eq!(e.stars, 3);
        assert_eq!(e.accuracy, 1.0);
        assert_eq!(e.time_bonus, 540);
    }

    #[test]
    fn test_matching_any_gate() {
        // Poor accuracy but fast: the 2-star tier passes on time alone.
        let e = evaluate(4, 4, 50_000.0, &ScoringConfig::matching());
        assert_eq!(e.stars, 2);
        // Poor and slow.
        let e = evaluate(4, 4, 200_000.0, &ScoringConfig::matching());
        assert_eq!(e.stars, 1);
    }

    #[test]
    fn test_default_all_gate() {
        let e = evaluate(0, 4, 95_000.0, &ScoringConfig::default());
        assert_eq!(e.stars, 1);
        let e = evaluate(1, 4, 80_000.0, &ScoringConfig::default());
        assert_eq!(e.stars, 2);
    }

    #[test]
    fn test_time_gate_is_strict() {
        let e = evaluate(0, 4, 60_000.0, &ScoringConfig::default());
        assert_eq!(e.stars, 2);
    }

    #[test]
    fn test_time_bonus_floor_and_clamp() {
        let b = TimeBonus {
            par_ms: 200_000.0,
            points_per_second: 1,
        };
        assert_eq!(b.points(10_500.0), 189);
        assert_eq!(b.points(199_999.0), 0);
        assert_eq!(b.points(500_000.0), 0);
    }

    #[test]
    fn test_memory_accuracy_bonus() {
        // 3 pairs in 4 moves: efficiency 0.75.
        let e = evaluate(1, 3, 40_000.0, &ScoringConfig::memory());
        assert_eq!(e.accuracy_bonus, 75);
        assert_eq!(e.stars, 2);
    }

    #[test]
    fn test_sentence_untimed_second_tier() {
        let e = evaluate(1, 4, 500_000.0, &ScoringConfig::sentence());
        assert_eq!(e.stars, 2);
        assert_eq!(e.time_bonus, 0);
    }

    #[test]
    fn test_min_stars() {
        let mut config = ScoringConfig::body_parts();
        config.min_stars = 0;
        assert_eq!(evaluate(9, 1, 0.0, &config).stars, 0);
        config.min_stars = 1;
        assert_eq!(evaluate(9, 1, 0.0, &config).stars, 1);
    }

    #[test]
    fn test_tiers_sorted_by_stars() {
        let config = ScoringConfig {
            tiers: vec![
                StarTier::new(2, 0.0, None, Gate::All),
                StarTier::new(3, 0.9, None, Gate::All),
            ],
            ..ScoringConfig::default()
        };
        assert_eq!(evaluate(0, 2, 0.0, &config).stars, 3);
    }

    #[test]
    fn test_rewards() {
        let config = RewardConfig::default();
        assert_eq!(rewards(3, 940, &config), Rewards { coins: 149, xp: 50 });
        assert_eq!(rewards(1, 0, &config), Rewards { coins: 25, xp: 30 });
        // Partial tens are dropped.
        assert_eq!(rewards(2, 19, &config).coins, 41);

        let flat = RewardConfig {
            score_per_coin: 0,
            ..RewardConfig::default()
        };
        assert_eq!(rewards(3, 940, &flat).coins, 55);
        assert!(ScoringConfig::memory().config_sexp().contains(":rewards (:base-coins 10"));
    }

    #[test]
    fn test_game_result() {
        let e = evaluate(0, 4, 30_000.0, &ScoringConfig::matching());
        let r = GameResult::new(400, 0, 30_000.0, &e);
        assert_eq!(r.score, 940);
        assert_eq!(r.stars, 3);
        assert_eq!(r.elapsed_ms, 30_000);
        assert!(r.to_sexp().contains(":stars 3"));
    }
}
