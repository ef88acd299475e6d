use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::infra::retry::RetryPolicy;

/// Timers, economics and retry bounds for the arena runtime.
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Delay before an under-filled pool gets a synthetic participant
    pub backfill_delay: Duration,
    pub turn_duration: Duration,
    /// How long a mismatched pair stays face up before the turn passes
    pub reveal_hold: Duration,
    pub reconnect_grace: Duration,
    pub lifelines: u8,
    /// Platform cut in basis points of the gross entry fees
    pub platform_cut_bps: u32,
    pub board_pairs: usize,
    pub matching_interval: Duration,
    pub queue_ttl: Duration,
    pub settlement_sweep_interval: Duration,
    pub bot_autoplay: bool,
    pub bot_provider: String,
    /// Bonus granted to a standby account that cannot cover an entry fee
    pub standby_topup: i64,
    pub retry: RetryPolicy,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            backfill_delay: Duration::from_secs(30),
            turn_duration: Duration::from_secs(15),
            reveal_hold: Duration::from_secs(1),
            reconnect_grace: Duration::from_secs(20),
            lifelines: 3,
            platform_cut_bps: 1_000,
            board_pairs: 8,
            matching_interval: Duration::from_secs(2),
            queue_ttl: Duration::from_secs(600),
            settlement_sweep_interval: Duration::from_secs(10),
            bot_autoplay: true,
            bot_provider: crate::ai::RecallPlayer::NAME.to_string(),
            standby_topup: 1_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl ArenaConfig {
    /// Defaults overridden by `ARENA_*` environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        let d = Self::default();
        let retry = RetryPolicy::new(
            parse_var("ARENA_RETRY_MAX_ATTEMPTS", d.retry.max_attempts)?,
            parse_var("ARENA_RETRY_BASE_MS", d.retry.base_delay_ms)?,
            parse_var("ARENA_RETRY_MAX_MS", d.retry.max_delay_ms)?,
            parse_var("ARENA_RETRY_JITTER", d.retry.jitter_pct)?,
            millis_var("ARENA_RETRY_ATTEMPT_TIMEOUT_MS", d.retry.attempt_timeout)?,
        );

        let cfg = Self {
            backfill_delay: millis_var("ARENA_BACKFILL_DELAY_MS", d.backfill_delay)?,
            turn_duration: millis_var("ARENA_TURN_MS", d.turn_duration)?,
            reveal_hold: millis_var("ARENA_REVEAL_HOLD_MS", d.reveal_hold)?,
            reconnect_grace: millis_var("ARENA_RECONNECT_GRACE_MS", d.reconnect_grace)?,
            lifelines: parse_var("ARENA_LIFELINES", d.lifelines)?,
            platform_cut_bps: parse_var("ARENA_PLATFORM_CUT_BPS", d.platform_cut_bps)?,
            board_pairs: parse_var("ARENA_BOARD_PAIRS", d.board_pairs)?,
            matching_interval: millis_var("ARENA_MATCHING_INTERVAL_MS", d.matching_interval)?,
            queue_ttl: millis_var("ARENA_QUEUE_TTL_MS", d.queue_ttl)?,
            settlement_sweep_interval: millis_var(
                "ARENA_SETTLEMENT_SWEEP_MS",
                d.settlement_sweep_interval,
            )?,
            bot_autoplay: parse_var("ARENA_BOT_AUTOPLAY", d.bot_autoplay)?,
            bot_provider: env::var("ARENA_BOT_PROVIDER").unwrap_or(d.bot_provider),
            standby_topup: parse_var("ARENA_STANDBY_TOPUP", d.standby_topup)?,
            retry,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Timers long enough that tests drive every expiry explicitly.
    pub fn for_tests() -> Self {
        let hour = Duration::from_secs(3_600);
        Self {
            backfill_delay: hour,
            turn_duration: hour,
            reveal_hold: hour,
            reconnect_grace: hour,
            matching_interval: hour,
            settlement_sweep_interval: hour,
            bot_autoplay: false,
            retry: RetryPolicy::new(5, 1, 5, 0.0, Duration::from_secs(10)),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.lifelines == 0 {
            return Err(AppError::config("ARENA_LIFELINES must be at least 1"));
        }
        if self.platform_cut_bps > 10_000 {
            return Err(AppError::config("ARENA_PLATFORM_CUT_BPS must be <= 10000"));
        }
        if !(1..=256).contains(&self.board_pairs) {
            return Err(AppError::config("ARENA_BOARD_PAIRS must be between 1 and 256"));
        }
        if crate::ai::by_name(&self.bot_provider).is_none() {
            return Err(AppError::config(format!(
                "ARENA_BOT_PROVIDER '{}' is not a registered provider",
                self.bot_provider
            )));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{name} has an invalid value: '{raw}'"))),
        Err(_) => Ok(default),
    }
}

fn millis_var(name: &str, default: Duration) -> Result<Duration, AppError> {
    parse_var(name, default.as_millis() as u64).map(Duration::from_millis)
}
