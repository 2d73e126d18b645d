use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::app::{AggregatorConfig, HubConfig, PipelineConfig, RankingConfig, TrendThresholds};
use crate::error::ConfigError;

/// Longest accepted activity window (30 days)
const MAX_WINDOW_SECS: u64 = 30 * 24 * 3600;
/// Longest accepted clock-skew tolerance
const MAX_TOLERANCE_SECS: u64 = 24 * 3600;
/// Longest accepted tick, heartbeat, metrics or demo interval
const MAX_INTERVAL_SECS: u64 = 24 * 3600;
const MAX_LIVENESS_MULTIPLIER: u32 = 1_000;

/// Which score function the aggregator uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    /// Plain weighted sum of events in the window
    Weighted,
    /// Weighted sum with linear age decay across the window
    Decaying,
}

impl FromStr for ScoringMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weighted" => Ok(ScoringMode::Weighted),
            "decaying" | "decay" => Ok(ScoringMode::Decaying),
            _ => Err(format!("Unknown scoring mode: {}", s)),
        }
    }
}

/// Simulated event source settings
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub enabled: bool,
    pub batch_size: usize,
    pub batch_interval: Duration,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            batch_size: 5,
            batch_interval: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub intake_capacity: usize,
    pub scoring_mode: ScoringMode,
    pub aggregator: AggregatorConfig,
    pub trend: TrendThresholds,
    pub ranking: RankingConfig,
    pub hub: HubConfig,
    pub pipeline: PipelineConfig,
    pub metrics_interval: Duration,
    /// Secret for verifying ingestion signatures (HMAC-SHA256)
    pub webhook_secret: Option<String>,
    /// Per-IP ingestion rate limit; `None` disables it
    pub ingest_rate_per_second: Option<u64>,
    pub ingest_rate_burst: u32,
    pub demo: DemoConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            intake_capacity: 1024,
            scoring_mode: ScoringMode::Decaying,
            aggregator: AggregatorConfig::default(),
            trend: TrendThresholds::default(),
            ranking: RankingConfig::default(),
            hub: HubConfig::default(),
            pipeline: PipelineConfig::default(),
            metrics_interval: Duration::from_secs(5),
            webhook_secret: None,
            ingest_rate_per_second: None,
            ingest_rate_burst: 20,
            demo: DemoConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();
        let tick_secs: u64 = var_or("TICK_INTERVAL_SECS", 5)?;
        let min_velocity_span = bounded_secs("TICK_INTERVAL_SECS", tick_secs, MAX_INTERVAL_SECS)?;
        let tick_interval = Duration::from_secs(tick_secs);
        let heartbeat_secs: u64 = var_or("HEARTBEAT_INTERVAL_SECS", 30)?;
        let rate: u64 = var_or("INGEST_RATE_PER_SECOND", 0)?;

        let config = Self {
            port: var_or("PORT", defaults.port)?,
            intake_capacity: var_or("INTAKE_CAPACITY", defaults.intake_capacity)?,
            scoring_mode: var_or("SCORING_MODE", defaults.scoring_mode)?,
            aggregator: AggregatorConfig {
                window: bounded_secs(
                    "WINDOW_SECS",
                    var_or("WINDOW_SECS", 3600)?,
                    MAX_WINDOW_SECS,
                )?,
                timestamp_tolerance: bounded_secs(
                    "TIMESTAMP_TOLERANCE_SECS",
                    var_or("TIMESTAMP_TOLERANCE_SECS", 300)?,
                    MAX_TOLERANCE_SECS,
                )?,
                dedup_capacity: var_or("DEDUP_CAPACITY", defaults.aggregator.dedup_capacity)?,
                min_velocity_span,
                velocity_lookback_ticks: var_or(
                    "VELOCITY_LOOKBACK_TICKS",
                    defaults.aggregator.velocity_lookback_ticks,
                )?,
                momentum_threshold: var_or(
                    "MOMENTUM_THRESHOLD",
                    defaults.aggregator.momentum_threshold,
                )?,
            },
            trend: TrendThresholds {
                quiet_score: var_or("TREND_QUIET_SCORE", defaults.trend.quiet_score)?,
                high_score: var_or("TREND_HIGH_SCORE", defaults.trend.high_score)?,
                very_high_score: var_or("TREND_VERY_HIGH_SCORE", defaults.trend.very_high_score)?,
                rising_velocity: var_or("TREND_RISING_VELOCITY", defaults.trend.rising_velocity)?,
                falling_velocity: var_or(
                    "TREND_FALLING_VELOCITY",
                    defaults.trend.falling_velocity,
                )?,
                persistence_ticks: var_or(
                    "TREND_PERSISTENCE_TICKS",
                    defaults.trend.persistence_ticks,
                )?,
                large_jump: var_or("TREND_LARGE_JUMP", defaults.trend.large_jump)?,
            },
            ranking: RankingConfig {
                top_n: var_or("TOP_N", defaults.ranking.top_n)?,
            },
            hub: HubConfig {
                send_queue_capacity: var_or(
                    "SEND_QUEUE_CAPACITY",
                    defaults.hub.send_queue_capacity,
                )?,
                max_connections: var_or("MAX_CONNECTIONS", defaults.hub.max_connections)?,
                heartbeat_interval: Duration::from_secs(heartbeat_secs),
                liveness_multiplier: var_or(
                    "LIVENESS_MULTIPLIER",
                    defaults.hub.liveness_multiplier,
                )?,
            },
            pipeline: PipelineConfig { tick_interval },
            metrics_interval: Duration::from_secs(var_or("METRICS_INTERVAL_SECS", 5)?),
            webhook_secret: env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
            ingest_rate_per_second: (rate > 0).then_some(rate),
            ingest_rate_burst: var_or("INGEST_RATE_BURST", defaults.ingest_rate_burst)?,
            demo: DemoConfig {
                enabled: var_or("DEMO_MODE", false)?,
                batch_size: var_or("DEMO_BATCH_SIZE", defaults.demo.batch_size)?,
                batch_interval: Duration::from_secs(var_or("DEMO_BATCH_INTERVAL_SECS", 8)?),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Type/range checks only; the values themselves are tuning knobs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.port > 0, "PORT", "must be non-zero")?;
        ensure(self.intake_capacity > 0, "INTAKE_CAPACITY", "must be at least 1")?;
        ensure(
            self.aggregator.window > chrono::Duration::zero(),
            "WINDOW_SECS",
            "must be positive",
        )?;
        ensure(
            self.aggregator.window.num_seconds() <= MAX_WINDOW_SECS as i64,
            "WINDOW_SECS",
            &format!("must be at most {} seconds", MAX_WINDOW_SECS),
        )?;
        ensure(
            self.aggregator.timestamp_tolerance >= chrono::Duration::zero(),
            "TIMESTAMP_TOLERANCE_SECS",
            "must not be negative",
        )?;
        ensure(
            self.aggregator.timestamp_tolerance.num_seconds() <= MAX_TOLERANCE_SECS as i64,
            "TIMESTAMP_TOLERANCE_SECS",
            &format!("must be at most {} seconds", MAX_TOLERANCE_SECS),
        )?;
        ensure(
            self.aggregator.min_velocity_span > chrono::Duration::zero(),
            "TICK_INTERVAL_SECS",
            "must be positive",
        )?;
        ensure(
            self.aggregator.dedup_capacity > 0,
            "DEDUP_CAPACITY",
            "must be at least 1",
        )?;
        ensure(
            self.aggregator.velocity_lookback_ticks >= 1,
            "VELOCITY_LOOKBACK_TICKS",
            "must be at least 1",
        )?;
        ensure(
            non_negative(self.aggregator.momentum_threshold),
            "MOMENTUM_THRESHOLD",
            "must be a finite value >= 0",
        )?;

        let t = &self.trend;
        for (key, value) in [
            ("TREND_QUIET_SCORE", t.quiet_score),
            ("TREND_HIGH_SCORE", t.high_score),
            ("TREND_VERY_HIGH_SCORE", t.very_high_score),
            ("TREND_RISING_VELOCITY", t.rising_velocity),
            ("TREND_FALLING_VELOCITY", t.falling_velocity),
            ("TREND_LARGE_JUMP", t.large_jump),
        ] {
            ensure(non_negative(value), key, "must be a finite value >= 0")?;
        }
        ensure(
            t.quiet_score <= t.high_score && t.high_score <= t.very_high_score,
            "TREND_HIGH_SCORE",
            "score thresholds must satisfy quiet <= high <= very_high",
        )?;
        ensure(
            t.persistence_ticks >= 1,
            "TREND_PERSISTENCE_TICKS",
            "must be at least 1",
        )?;

        ensure(self.ranking.top_n > 0, "TOP_N", "must be at least 1")?;
        ensure(
            self.hub.send_queue_capacity > 0,
            "SEND_QUEUE_CAPACITY",
            "must be at least 1",
        )?;
        ensure(self.hub.max_connections > 0, "MAX_CONNECTIONS", "must be at least 1")?;
        ensure(
            !self.hub.heartbeat_interval.is_zero(),
            "HEARTBEAT_INTERVAL_SECS",
            "must be positive",
        )?;
        ensure(
            (1..=MAX_LIVENESS_MULTIPLIER).contains(&self.hub.liveness_multiplier),
            "LIVENESS_MULTIPLIER",
            &format!("must be between 1 and {}", MAX_LIVENESS_MULTIPLIER),
        )?;
        for (key, interval) in [
            ("HEARTBEAT_INTERVAL_SECS", self.hub.heartbeat_interval),
            ("TICK_INTERVAL_SECS", self.pipeline.tick_interval),
            ("METRICS_INTERVAL_SECS", self.metrics_interval),
            ("DEMO_BATCH_INTERVAL_SECS", self.demo.batch_interval),
        ] {
            ensure(
                interval.as_secs() <= MAX_INTERVAL_SECS,
                key,
                &format!("must be at most {} seconds", MAX_INTERVAL_SECS),
            )?;
        }
        ensure(
            !self.pipeline.tick_interval.is_zero(),
            "TICK_INTERVAL_SECS",
            "must be positive",
        )?;
        ensure(
            !self.metrics_interval.is_zero(),
            "METRICS_INTERVAL_SECS",
            "must be positive",
        )?;
        ensure(
            self.ingest_rate_burst > 0,
            "INGEST_RATE_BURST",
            "must be at least 1",
        )?;
        if self.demo.enabled {
            ensure(self.demo.batch_size > 0, "DEMO_BATCH_SIZE", "must be at least 1")?;
            ensure(
                !self.demo.batch_interval.is_zero(),
                "DEMO_BATCH_INTERVAL_SECS",
                "must be positive",
            )?;
        }
        Ok(())
    }

    /// Check if ingestion signature verification is enabled
    pub fn signature_required(&self) -> bool {
        self.webhook_secret.is_some()
    }
}

fn var_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Parse { key, value: raw }),
        _ => Ok(default),
    }
}

/// Seconds as a `chrono::Duration`, refusing values past `max`
fn bounded_secs(key: &'static str, secs: u64, max: u64) -> Result<chrono::Duration, ConfigError> {
    ensure(secs <= max, key, &format!("must be at most {} seconds", max))?;
    Ok(chrono::Duration::seconds(secs as i64))
}

fn ensure(condition: bool, key: &'static str, reason: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key,
            reason: reason.to_string(),
        })
    }
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ranking.top_n, 10);
        assert_eq!(config.hub.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.hub.liveness_multiplier, 2);
        assert_eq!(config.metrics_interval, Duration::from_secs(5));
    }

    #[test]
    fn zero_top_n_is_rejected() {
        let mut config = Config::default();
        config.ranking.top_n = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { key: "TOP_N", .. })
        ));
    }

    #[test]
    fn nan_threshold_is_rejected() {
        let mut config = Config::default();
        config.trend.large_jump = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_score_thresholds_are_rejected() {
        let mut config = Config::default();
        config.trend.high_score = 100.0;
        config.trend.very_high_score = 50.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        assert!(matches!(
            bounded_secs("WINDOW_SECS", u64::MAX, MAX_WINDOW_SECS),
            Err(ConfigError::OutOfRange { key: "WINDOW_SECS", .. })
        ));
        assert_eq!(
            bounded_secs("WINDOW_SECS", 3600, MAX_WINDOW_SECS).unwrap(),
            chrono::Duration::hours(1)
        );

        let mut config = Config::default();
        config.aggregator.window = chrono::Duration::days(365);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { key: "WINDOW_SECS", .. })
        ));

        let mut config = Config::default();
        config.hub.liveness_multiplier = u32::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { key: "LIVENESS_MULTIPLIER", .. })
        ));

        let mut config = Config::default();
        config.hub.heartbeat_interval = Duration::from_secs(u64::MAX);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { key: "HEARTBEAT_INTERVAL_SECS", .. })
        ));
    }

    #[test]
    fn scoring_mode_from_str() {
        assert_eq!(
            "weighted".parse::<ScoringMode>().unwrap(),
            ScoringMode::Weighted
        );
        assert_eq!(
            "DECAYING".parse::<ScoringMode>().unwrap(),
            ScoringMode::Decaying
        );
        assert!("linear".parse::<ScoringMode>().is_err());
    }

    #[test]
    fn var_or_parses_and_falls_back() {
        std::env::set_var("REPOPULSE_TEST_PORT_VALUE", "9090");
        assert_eq!(var_or::<u16>("REPOPULSE_TEST_PORT_VALUE", 1).unwrap(), 9090);
        assert_eq!(var_or::<u16>("REPOPULSE_TEST_UNSET_VALUE", 7).unwrap(), 7);

        std::env::set_var("REPOPULSE_TEST_BAD_VALUE", "not-a-number");
        assert!(matches!(
            var_or::<u16>("REPOPULSE_TEST_BAD_VALUE", 1),
            Err(ConfigError::Parse { .. })
        ));
    }
}
