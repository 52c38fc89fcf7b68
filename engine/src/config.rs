//! Engine configuration: gesture thresholds, per-variant overrides and
//! the driver tick.
//!
//! Defaults come from the built-in presets.  A config file is a plist
//! applied on top, key by key, the same way the IPC `*-config` handlers
//! patch live state:
//!
//! ```text
//! (:tick-ms 16
//!  :gesture (:pinch-threshold 0.06 :smoothing 0.4)
//!  :matching (:base-points 100 :stars ((3 0.9 60000 all) (2 0.7 90000 any)))
//!  :body-parts (:required-hold-ms 1200 :gesture (:enabled nil)))
//! ```

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context};
use lexpr::Value;
use tracing::debug;

use crate::gesture::GestureConfig;
use crate::scoring::{Gate, StarTier, TimeBonus};
use crate::sexp::{atom_string, get_bool, get_float, get_int, get_value, list_items, number};
use crate::variant::{VariantConfig, VariantKind};

/// Driver tick when nothing else is configured (ms).
pub const DEFAULT_TICK_MS: u64 = 16;

/// Top-level engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Engine-wide gesture settings.
    pub gesture: GestureConfig,
    /// Per-variant settings, seeded from the presets.
    pub variants: BTreeMap<VariantKind, VariantConfig>,
    /// Frame/tick period for the driver loop (ms).
    pub tick_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gesture: GestureConfig::default(),
            variants: VariantKind::ALL
                .iter()
                .map(|k| (*k, VariantConfig::preset(*k)))
                .collect(),
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

impl EngineConfig {
    /// Settings for one variant.
    pub fn variant(&self, kind: VariantKind) -> VariantConfig {
        self.variants
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| VariantConfig::preset(kind))
    }

    /// Gesture settings in effect while `kind` runs.
    pub fn gesture_for(&self, kind: VariantKind) -> GestureConfig {
        self.variants
            .get(&kind)
            .and_then(|v| v.gesture.clone())
            .unwrap_or_else(|| self.gesture.clone())
    }

    /// Parse a config plist and apply it on top of the current values.
    pub fn apply_str(&mut self, text: &str) -> anyhow::Result<()> {
        let value = lexpr::from_str(text).context("config is not a valid s-expression")?;
        self.apply_sexp(&value)
    }

    /// Apply a parsed config plist.  Keys that are absent keep their
    /// current values.
    pub fn apply_sexp(&mut self, value: &Value) -> anyhow::Result<()> {
        if !matches!(value, Value::Cons(_) | Value::Null) {
            bail!("config must be a plist, got {}", value);
        }
        if let Some(tick) = get_int(value, "tick-ms") {
            if tick <= 0 {
                bail!(":tick-ms must be positive, got {}", tick);
            }
            self.tick_ms = tick as u64;
        }
        if let Some(g) = get_value(value, "gesture") {
            apply_gesture(&mut self.gesture, g).context("in :gesture")?;
        }
        for kind in VariantKind::ALL {
            if let Some(v) = get_value(value, kind.as_str()) {
                let entry = self
                    .variants
                    .entry(kind)
                    .or_insert_with(|| VariantConfig::preset(kind));
                let base_gesture = self.gesture.clone();
                apply_variant(entry, v, &base_gesture).with_context(|| format!("in :{}", kind))?;
                debug!("config: applied overrides for {}", kind);
            }
        }
        Ok(())
    }

    pub fn config_sexp(&self) -> String {
        let gesture = self.gesture.config_sexp();
        let variants: Vec<String> = self
            .variants
            .iter()
            .map(|(k, v)| format!(":{} {}", k, v.config_sexp()))
            .collect();
        format!(
            "(:tick-ms {} :gesture {} {})",
            self.tick_ms,
            gesture,
            variants.join(" ")
        )
    }
}

fn apply_gesture(config: &mut GestureConfig, value: &Value) -> anyhow::Result<()> {
    if let Some(enabled) = get_bool(value, "enabled") {
        config.enabled = enabled;
    }
    if let Some(smoothing) = get_float(value, "smoothing") {
        if !(smoothing > 0.0 && smoothing <= 1.0) {
            bail!(":smoothing must be in (0, 1], got {}", smoothing);
        }
        config.smoothing = smoothing as f32;
    }
    if let Some(pinch) = get_float(value, "pinch-threshold") {
        config.pinch_threshold = pinch as f32;
    }
    if let Some(release) = get_value(value, "release-threshold") {
        config.release_threshold = number(release).map(|r| r as f32);
    }
    if let Some(vis) = get_float(value, "visibility-threshold") {
        config.visibility_threshold = vis as f32;
    }
    if let Some(depth) = get_bool(value, "use-depth") {
        config.use_depth = depth;
    }
    if let Some(mirror) = get_bool(value, "mirror-x") {
        config.mirror_x = mirror;
    }
    if let Some(w) = get_float(value, "viewport-width") {
        config.viewport_width = w as f32;
    }
    if let Some(h) = get_float(value, "viewport-height") {
        config.viewport_height = h as f32;
    }
    if config.release_threshold() < config.pinch_threshold {
        bail!(
            "release threshold {} is below pinch threshold {}",
            config.release_threshold(),
            config.pinch_threshold
        );
    }
    Ok(())
}

fn apply_variant(config: &mut VariantConfig, value: &Value, base_gesture: &GestureConfig) -> anyhow::Result<()> {
    if let Some(points) = get_int(value, "base-points") {
        config.matching.base_points = points;
    }
    if let Some(penalty) = get_int(value, "penalty-points") {
        config.matching.penalty_points = penalty.max(0);
    }
    if let Some(delay) = get_float(value, "reveal-eval-delay-ms") {
        config.matching.reveal_eval_delay_ms = delay.max(0.0);
    }
    if let Some(delay) = get_float(value, "reveal-revert-delay-ms") {
        config.matching.reveal_revert_delay_ms = delay.max(0.0);
    }

    if let Some(stars) = get_value(value, "stars") {
        config.scoring.tiers = list_items(stars)
            .into_iter()
            .map(parse_tier)
            .collect::<anyhow::Result<Vec<_>>>()
            .context("in :stars")?;
    }
    if let Some(min) = get_int(value, "min-stars") {
        config.scoring.min_stars = min.clamp(0, 3) as u8;
    }
    if let Some(bonus) = get_value(value, "time-bonus") {
        config.scoring.time_bonus = parse_time_bonus(bonus)?;
    }
    if let Some(bonus) = get_int(value, "accuracy-bonus") {
        config.scoring.accuracy_bonus = bonus;
    }
    if let Some(r) = get_value(value, "rewards") {
        let rewards = &mut config.scoring.rewards;
        if let Some(n) = get_int(r, "base-coins") {
            rewards.base_coins = n.max(0);
        }
        if let Some(n) = get_int(r, "coins-per-star") {
            rewards.coins_per_star = n.max(0);
        }
        if let Some(n) = get_int(r, "score-per-coin") {
            rewards.score_per_coin = n.max(0);
        }
        if let Some(n) = get_int(r, "base-xp") {
            rewards.base_xp = n.max(0);
        }
        if let Some(n) = get_int(r, "xp-per-star") {
            rewards.xp_per_star = n.max(0);
        }
    }

    if let Some(hold) = get_float(value, "required-hold-ms") {
        config.pose.required_hold_ms = hold.max(0.0);
    }
    if let Some(prox) = get_float(value, "proximity-threshold") {
        config.pose.proximity_threshold = prox as f32;
    }
    if let Some(vis) = get_float(value, "visibility-threshold") {
        config.pose.visibility_threshold = vis as f32;
    }
    if let Some(offset) = get_float(value, "head-line-offset") {
        config.pose.head_line_offset = offset as f32;
    }
    if let Some(relaxed) = get_float(value, "head-relaxed-distance") {
        config.pose.head_relaxed_distance = relaxed as f32;
    }

    if let Some(g) = get_value(value, "gesture") {
        let mut gesture = config.gesture.clone().unwrap_or_else(|| base_gesture.clone());
        apply_gesture(&mut gesture, g).context("in :gesture")?;
        config.gesture = Some(gesture);
    }
    Ok(())
}

/// `(stars min-accuracy max-elapsed-ms [gate])`; `nil` disables the time
/// gate.
fn parse_tier(value: &Value) -> anyhow::Result<StarTier> {
    let items = list_items(value);
    if items.len() < 2 {
        bail!("star tier needs (stars accuracy [ms] [gate]), got {}", value);
    }
    let stars = number(items[0]).ok_or_else(|| anyhow!("tier stars must be a number"))? as i64;
    if !(0..=3).contains(&stars) {
        bail!("tier stars must be 0-3, got {}", stars);
    }
    let accuracy = number(items[1]).ok_or_else(|| anyhow!("tier accuracy must be a number"))?;
    let max_elapsed = items.get(2).and_then(|v| number(v));
    let gate = match items.get(3) {
        Some(g) => {
            let name = atom_string(g);
            Gate::from_str(&name).ok_or_else(|| anyhow!("unknown gate: {}", name))?
        }
        None => Gate::All,
    };
    Ok(StarTier::new(stars as u8, accuracy, max_elapsed, gate))
}

/// `(par-ms points-per-second)` or `nil`.
fn parse_time_bonus(value: &Value) -> anyhow::Result<Option<TimeBonus>> {
    let items = list_items(value);
    match items.as_slice() {
        [] => Ok(None),
        [par, pps] => Ok(Some(TimeBonus {
            par_ms: number(par).ok_or_else(|| anyhow!("time bonus par must be a number"))?,
            points_per_second: number(pps).ok_or_else(|| anyhow!("time bonus points must be a number"))? as i64,
        })),
        _ => bail!("time bonus needs (par-ms points-per-second), got {}", value),
    }
}
