//! # Runner configuration.
//!
//! Provides [`Config`], the centralized settings for the task runner, its event
//! bus, and the event cache.
//!
//! ## Sentinel values
//! - `cache_ttl = 0s` → cached events never expire (only the capacity bound applies)
//! - `retain_completed = 0` → finished handles are dropped right after completion

use std::time::Duration;

use crate::error::RuntimeError;

/// Global configuration for the task runner.
///
/// ## Field semantics
/// - `bus_capacity`: per-group broadcast ring size (min 1; clamped)
/// - `cache_capacity`: cached events per subscriber group (min 1; clamped)
/// - `cache_ttl`: lifetime of a cached event (`0s` = no expiry)
/// - `queue_capacity`: dispatcher command queue size (min 1; clamped)
/// - `retain_completed`: finished handles kept for `get`/`wait` (`0` = none)
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of each subscriber group's broadcast channel.
    ///
    /// Live subscribers lagging behind more than `bus_capacity` events skip the
    /// oldest ones (a warning is logged).
    pub bus_capacity: usize,

    /// Maximum number of cached events per subscriber group.
    ///
    /// Once exceeded, the oldest events are evicted first.
    pub cache_capacity: usize,

    /// Lifetime of a cached event.
    pub cache_ttl: Duration,

    /// Capacity of the dispatcher's command queue.
    pub queue_capacity: usize,

    /// Number of finished task handles retained for inspection.
    pub retain_completed: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    ///
    /// | Env Var                          | Default  |
    /// |----------------------------------|----------|
    /// | `CHANNEL_TASKS_BUS_CAPACITY`     | `1024`   |
    /// | `CHANNEL_TASKS_CACHE_CAPACITY`   | `128`    |
    /// | `CHANNEL_TASKS_CACHE_TTL_SECS`   | `86400`  |
    /// | `CHANNEL_TASKS_QUEUE_CAPACITY`   | `1024`   |
    /// | `CHANNEL_TASKS_RETAIN_COMPLETED` | `1024`   |
    pub fn from_env() -> Result<Self, RuntimeError> {
        let defaults = Self::default();
        Ok(Self {
            bus_capacity: env_or("CHANNEL_TASKS_BUS_CAPACITY", defaults.bus_capacity)?,
            cache_capacity: env_or("CHANNEL_TASKS_CACHE_CAPACITY", defaults.cache_capacity)?,
            cache_ttl: Duration::from_secs(env_or(
                "CHANNEL_TASKS_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
            queue_capacity: env_or("CHANNEL_TASKS_QUEUE_CAPACITY", defaults.queue_capacity)?,
            retain_completed: env_or(
                "CHANNEL_TASKS_RETAIN_COMPLETED",
                defaults.retain_completed,
            )?,
        })
    }

    /// Returns the cache TTL as an `Option`.
    ///
    /// - `None` → no expiry
    /// - `Some(d)` → events older than `d` are purged
    #[inline]
    pub fn cache_ttl(&self) -> Option<Duration> {
        if self.cache_ttl == Duration::ZERO {
            None
        } else {
            Some(self.cache_ttl)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a cache capacity clamped to a minimum of 1.
    #[inline]
    pub fn cache_capacity_clamped(&self) -> usize {
        self.cache_capacity.max(1)
    }

    /// Returns a queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `cache_capacity = 128`
    /// - `cache_ttl = 24h`
    /// - `queue_capacity = 1024`
    /// - `retain_completed = 1024`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            cache_capacity: 128,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            queue_capacity: 1024,
            retain_completed: 1024,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, RuntimeError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RuntimeError::InvalidConfig { key, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        let mut cfg = Config::default();
        assert_eq!(cfg.cache_ttl(), Some(Duration::from_secs(86_400)));

        cfg.cache_ttl = Duration::ZERO;
        cfg.bus_capacity = 0;
        cfg.cache_capacity = 0;
        cfg.queue_capacity = 0;
        assert_eq!(cfg.cache_ttl(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.cache_capacity_clamped(), 1);
        assert_eq!(cfg.queue_capacity_clamped(), 1);
    }

    #[test]
    fn env_fallback_and_parse_failure() {
        assert_eq!(env_or::<usize>("CHANNEL_TASKS_TEST_UNSET", 7).unwrap(), 7);

        // Key is private to this test; no other test reads it.
        unsafe { std::env::set_var("CHANNEL_TASKS_TEST_BAD", "many") };
        let err = env_or::<usize>("CHANNEL_TASKS_TEST_BAD", 7).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::InvalidConfig {
                key: "CHANNEL_TASKS_TEST_BAD",
                value: "many".into()
            }
        );
        unsafe { std::env::remove_var("CHANNEL_TASKS_TEST_BAD") };
    }
}
