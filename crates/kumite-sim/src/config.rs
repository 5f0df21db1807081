//! Match configuration.
//!
//! [`MatchConfig`] groups every tunable the clock, round machine and pacer
//! read. All sections deserialize with defaults for missing fields, so a
//! partial JSON document is enough:
//!
//! ```
//! use kumite_sim::config::MatchConfig;
//!
//! let config = MatchConfig::from_json_str(r#"{ "match_wins": 3, "timing": { "round_time": -1 } }"#)
//!     .unwrap();
//! assert_eq!(config.match_wins, 3);
//! assert_eq!(config.timing.round_time, -1);
//! assert_eq!(config.pacer.target_fps, 60);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Configuration rejected by [`MatchConfig::validate`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("failed to parse match config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A timing value is outside its allowed range.
    #[error("timing '{field}' must be {expected}, got {value}")]
    Timing {
        field: &'static str,
        expected: &'static str,
        value: i32,
    },

    /// A speed value is outside `(0, 10]` or the clamp range is inverted.
    #[error("speed '{field}' out of range: {value}")]
    Speed { field: &'static str, value: f64 },

    /// The pacer target rate must be positive.
    #[error("target_fps must be positive, got {0}")]
    TargetFps(u32),

    /// A count that must be non-zero was zero.
    #[error("'{0}' must be greater than zero")]
    Zero(&'static str),
}

// ---------------------------------------------------------------------------
// RoundTiming
// ---------------------------------------------------------------------------

/// Round lifecycle durations, in logic ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundTiming {
    /// Ticks before the announcer starts.
    pub start_waittime: i32,
    /// Ticks between the fight-start transition and control being granted.
    pub ctrl_time: i32,
    /// Round timer in ticks. `-1` means infinite.
    pub round_time: i32,
    /// Post-outcome ticks during which players may still act.
    pub over_waittime: i32,
    /// Ticks after the lock before win poses start.
    pub over_wintime: i32,
    /// Ticks from the lock to the end of the round.
    pub over_time: i32,
    /// KO slow-motion duration.
    pub slow_time: i32,
    /// KO shutter flash duration.
    pub shutter_time: i32,
    /// Fade-in at round start.
    pub fadein_time: i32,
    /// Fade-out before the round ends. Must not exceed `over_time`.
    pub fadeout_time: i32,
    /// Longest wait for fighters to reach a terminal pose before the lock is
    /// forced.
    pub waitdown_time: i32,
}

impl Default for RoundTiming {
    fn default() -> Self {
        Self {
            start_waittime: 30,
            ctrl_time: 30,
            round_time: 99 * 60,
            over_waittime: 45,
            over_wintime: 45,
            over_time: 210,
            slow_time: 60,
            shutter_time: 15,
            fadein_time: 30,
            fadeout_time: 30,
            waitdown_time: 300,
        }
    }
}

impl RoundTiming {
    /// Initial intro counter for a fresh round.
    pub fn intro_start(&self) -> i32 {
        self.start_waittime + self.ctrl_time + 1
    }

    /// Intro value at which win poses are locked in.
    pub fn lock_boundary(&self) -> i32 {
        -self.over_waittime
    }

    /// Intro value at which the round is over.
    pub fn over_boundary(&self) -> i32 {
        -(self.over_waittime + self.over_time)
    }

    /// Intro value at which the fade-out starts.
    pub fn fadeout_boundary(&self) -> i32 {
        self.over_boundary() + self.fadeout_time
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let at_least = |field, value: i32, min: i32, expected| {
            if value < min {
                Err(ConfigError::Timing {
                    field,
                    expected,
                    value,
                })
            } else {
                Ok(())
            }
        };
        at_least("start_waittime", self.start_waittime, 0, ">= 0")?;
        at_least("ctrl_time", self.ctrl_time, 1, ">= 1")?;
        at_least("round_time", self.round_time, -1, ">= -1")?;
        at_least("over_waittime", self.over_waittime, 1, ">= 1")?;
        at_least("over_wintime", self.over_wintime, 0, ">= 0")?;
        at_least("over_time", self.over_time, 1, ">= 1")?;
        at_least("slow_time", self.slow_time, 0, ">= 0")?;
        at_least("shutter_time", self.shutter_time, 0, ">= 0")?;
        at_least("fadein_time", self.fadein_time, 0, ">= 0")?;
        at_least("fadeout_time", self.fadeout_time, 0, ">= 0")?;
        at_least("waitdown_time", self.waitdown_time, 0, ">= 0")?;
        if self.fadeout_time > self.over_time {
            return Err(ConfigError::Timing {
                field: "fadeout_time",
                expected: "<= over_time",
                value: self.fadeout_time,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// KoRules
// ---------------------------------------------------------------------------

/// Team-mode KO rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KoRules {
    /// In Simul mode, a human-controlled side loses when its leader falls.
    pub lose_simul: bool,
    /// In Tag mode, a side loses when its leader falls.
    pub lose_tag: bool,
}

// ---------------------------------------------------------------------------
// SpeedConfig
// ---------------------------------------------------------------------------

/// Game speed and slow motion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Logic ticks per render frame at normal play.
    pub game_speed: f64,
    /// Multiplier while KO slow motion is running.
    pub slow_speed: f64,
    /// Lower clamp for the effective step.
    pub min_speed: f64,
    /// Upper clamp for the effective step.
    pub max_speed: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            game_speed: 1.0,
            slow_speed: 0.25,
            min_speed: 0.01,
            max_speed: 10.0,
        }
    }
}

impl SpeedConfig {
    /// Step size to request from the clock for the next call.
    ///
    /// `accel` is the debug fast-forward multiplier (1.0 when unused).
    pub fn effective_speed(&self, slowtime: i32, accel: f64) -> f64 {
        let mut speed = self.game_speed * accel;
        if slowtime > 0 {
            speed *= self.slow_speed;
        }
        speed.clamp(self.min_speed, self.max_speed)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let in_range = |field, value: f64| {
            if value > 0.0 && value <= 10.0 {
                Ok(())
            } else {
                Err(ConfigError::Speed { field, value })
            }
        };
        in_range("game_speed", self.game_speed)?;
        in_range("slow_speed", self.slow_speed)?;
        in_range("min_speed", self.min_speed)?;
        in_range("max_speed", self.max_speed)?;
        if self.min_speed > self.max_speed {
            return Err(ConfigError::Speed {
                field: "min_speed",
                value: self.min_speed,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PacerConfig
// ---------------------------------------------------------------------------

/// Wall-clock pacing thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerConfig {
    /// Presented frames per second.
    pub target_fps: u32,
    /// Sleep window slack on top of one frame.
    pub sleep_slack_ms: u64,
    /// Lateness still treated as on time.
    pub late_tolerance_ms: u64,
    /// Lateness past which the schedule is re-anchored to now.
    pub resync_threshold_ms: u64,
    /// Gap since the last presented frame that counts as a stall.
    pub stall_threshold_ms: u64,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            sleep_slack_ms: 2,
            late_tolerance_ms: 17,
            resync_threshold_ms: 150,
            stall_threshold_ms: 250,
        }
    }
}

impl PacerConfig {
    /// Duration of one presented frame.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.target_fps.max(1)))
    }
}

// ---------------------------------------------------------------------------
// MatchConfig
// ---------------------------------------------------------------------------

/// Everything a match needs to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub timing: RoundTiming,
    pub ko: KoRules,
    pub speed: SpeedConfig,
    pub pacer: PacerConfig,
    /// Round wins needed to take the match.
    pub match_wins: u32,
    /// Drawn rounds allowed before the match is called.
    pub max_draw_games: u32,
    /// Capacity of the loader-to-main-thread task queue.
    pub task_queue_capacity: usize,
    /// Loader status poll interval.
    pub loader_poll_interval_ms: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            timing: RoundTiming::default(),
            ko: KoRules::default(),
            speed: SpeedConfig::default(),
            pacer: PacerConfig::default(),
            match_wins: 2,
            max_draw_games: 1,
            task_queue_capacity: 32_768,
            loader_poll_interval_ms: 10,
        }
    }
}

impl MatchConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing.validate()?;
        self.speed.validate()?;
        if self.pacer.target_fps == 0 {
            return Err(ConfigError::TargetFps(self.pacer.target_fps));
        }
        if self.match_wins == 0 {
            return Err(ConfigError::Zero("match_wins"));
        }
        if self.task_queue_capacity == 0 {
            return Err(ConfigError::Zero("task_queue_capacity"));
        }
        if self.loader_poll_interval_ms == 0 {
            return Err(ConfigError::Zero("loader_poll_interval_ms"));
        }
        Ok(())
    }

    /// Loader poll interval as a [`Duration`].
    pub fn loader_poll_interval(&self) -> Duration {
        Duration::from_millis(self.loader_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        MatchConfig::default().validate().unwrap();
    }

    #[test]
    fn boundaries_follow_timing() {
        let timing = RoundTiming::default();
        assert_eq!(timing.intro_start(), 61);
        assert_eq!(timing.lock_boundary(), -45);
        assert_eq!(timing.over_boundary(), -255);
        assert_eq!(timing.fadeout_boundary(), -225);
    }

    #[test]
    fn slow_motion_scales_speed() {
        let speed = SpeedConfig::default();
        assert_eq!(speed.effective_speed(0, 1.0), 1.0);
        assert_eq!(speed.effective_speed(10, 1.0), 0.25);
        assert_eq!(speed.effective_speed(0, 100.0), 10.0);
        assert_eq!(speed.effective_speed(10, 0.001), 0.01);
    }

    #[test]
    fn zero_ctrl_time_rejected() {
        let json = r#"{ "timing": { "ctrl_time": 0 } }"#;
        let err = MatchConfig::from_json_str(json).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Timing {
                field: "ctrl_time",
                ..
            }
        ));
    }

    #[test]
    fn fadeout_longer_than_over_time_rejected() {
        let mut config = MatchConfig::default();
        config.timing.fadeout_time = config.timing.over_time + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_fps_rejected() {
        let mut config = MatchConfig::default();
        config.pacer.target_fps = 0;
        assert!(matches!(config.validate(), Err(ConfigError::TargetFps(0))));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            MatchConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
