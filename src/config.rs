//! # Worker pool configuration.
//!
//! [`WorkerConfig`] carries the pool's tunables: cycle pacing, pool sizing,
//! slot-table capacity, launch confirmation bound, and shutdown grace.
//!
//! Each key has a [`ReloadClass`]: keys marked [`ReloadClass::ReloadOnSignal`]
//! may change while workers run (picked up on the next reconfigure wake), keys
//! marked [`ReloadClass::RestartRequired`] are read once at pool start and
//! never re-applied.
//!
//! [`ConfigSource`] is the seam through which running workers re-read
//! configuration; [`MemorySource`] is the in-process implementation.
//!
//! # Example
//! ```
//! use bgvisor::WorkerConfig;
//!
//! let mut cfg = WorkerConfig::default();
//! cfg.sleep_interval_ms = 250;
//! cfg.worker_count = 4;
//!
//! assert!(cfg.validate().is_ok());
//! ```

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ConfigError;

/// Upper bound for millisecond-valued keys, mirroring the classic int-valued
/// knobs these map to.
const MAX_MS: i64 = i32::MAX as i64;

/// Inclusive bounds for pool sizing keys.
const WORKERS_MIN: i64 = 1;
const WORKERS_MAX: i64 = 50;

/// How long a reconfigure wake waits for the source before giving up and
/// keeping the previous values.
pub const RELOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// When a configuration key takes effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReloadClass {
    /// Re-read while workers run; applied on the next reconfigure wake.
    ReloadOnSignal,
    /// Read once at pool start; changing it requires a restart.
    RestartRequired,
}

/// Configuration for a worker pool.
///
/// Millisecond fields deliberately stay raw integers (the shape they are
/// registered and reloaded in); use the [`Duration`] accessors when driving
/// timers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Idle wait between work cycles, in milliseconds. Reload-on-signal.
    pub sleep_interval_ms: u64,
    /// Number of workers the supervisor registers at pool start. Restart-required.
    pub worker_count: u32,
    /// Capacity of the host's slot table (static and dynamic workers share it).
    /// Restart-required.
    pub max_workers: u32,
    /// Upper bound on waiting for a launched worker's start confirmation, in
    /// milliseconds. Restart-required.
    pub start_timeout_ms: u64,
    /// How long shutdown waits for workers to stop before reporting them
    /// stuck, in milliseconds. Restart-required.
    pub grace_ms: u64,
}

impl Default for WorkerConfig {
    /// Provides the default configuration:
    /// - `sleep_interval_ms = 10`
    /// - `worker_count = 1`
    /// - `max_workers = 8`
    /// - `start_timeout_ms = 30_000`
    /// - `grace_ms = 5_000`
    fn default() -> Self {
        Self {
            sleep_interval_ms: 10,
            worker_count: 1,
            max_workers: 8,
            start_timeout_ms: 30_000,
            grace_ms: 5_000,
        }
    }
}

impl WorkerConfig {
    /// Checks every key against its permitted range.
    ///
    /// Returns the first violation found; on any error the caller must keep
    /// its previous values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        range(
            "sleep_interval_ms",
            self.sleep_interval_ms as i64,
            1,
            MAX_MS,
        )?;
        range(
            "worker_count",
            i64::from(self.worker_count),
            WORKERS_MIN,
            WORKERS_MAX,
        )?;
        range(
            "max_workers",
            i64::from(self.max_workers),
            WORKERS_MIN,
            WORKERS_MAX,
        )?;
        range("start_timeout_ms", self.start_timeout_ms as i64, 1, MAX_MS)?;
        range("grace_ms", self.grace_ms as i64, 0, MAX_MS)?;
        Ok(())
    }

    /// Copies the reload-on-signal keys of `fresh` into `self`, leaving
    /// restart-required keys untouched.
    ///
    /// Callers validate `fresh` first; this method only transfers values.
    pub fn apply_reload(&mut self, fresh: &WorkerConfig) {
        self.sleep_interval_ms = fresh.sleep_interval_ms;
    }

    /// Returns the reload class of a known key, or `None` for unknown keys.
    ///
    /// # Example
    /// ```
    /// use bgvisor::{ReloadClass, WorkerConfig};
    ///
    /// assert_eq!(
    ///     WorkerConfig::reload_class("sleep_interval_ms"),
    ///     Some(ReloadClass::ReloadOnSignal),
    /// );
    /// assert_eq!(
    ///     WorkerConfig::reload_class("worker_count"),
    ///     Some(ReloadClass::RestartRequired),
    /// );
    /// ```
    pub fn reload_class(key: &str) -> Option<ReloadClass> {
        match key {
            "sleep_interval_ms" => Some(ReloadClass::ReloadOnSignal),
            "worker_count" | "max_workers" | "start_timeout_ms" | "grace_ms" => {
                Some(ReloadClass::RestartRequired)
            }
            _ => None,
        }
    }

    /// Idle wait between cycles as a [`Duration`].
    pub fn sleep_interval(&self) -> Duration {
        Duration::from_millis(self.sleep_interval_ms)
    }

    /// Launch confirmation bound as a [`Duration`].
    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    /// Shutdown grace as a [`Duration`].
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

fn range(key: &'static str, value: i64, min: i64, max: i64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            key,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// # Source of configuration snapshots.
///
/// Workers re-read configuration through this seam when a reconfigure request
/// wakes them. Implementations produce a complete snapshot; the consumer
/// validates it and applies only the reload-on-signal keys.
///
/// A source must never block indefinitely on its own account; the consumer
/// additionally bounds every read with [`load_with_timeout`].
#[async_trait]
pub trait ConfigSource: Send + Sync + 'static {
    /// Produces a fresh configuration snapshot.
    async fn load(&self) -> Result<WorkerConfig, ConfigError>;
}

/// # In-process configuration source.
///
/// Holds a [`WorkerConfig`] behind a lock so tests and embedders can change
/// values between reloads. Workers see a change only after they process a
/// reconfigure request.
#[derive(Debug)]
pub struct MemorySource {
    current: RwLock<WorkerConfig>,
}

impl MemorySource {
    /// Creates a source seeded with `config`.
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            current: RwLock::new(config),
        }
    }

    /// Replaces the stored snapshot.
    ///
    /// Running workers keep their current values until their next reconfigure
    /// wake.
    pub fn set(&self, config: WorkerConfig) {
        let mut cur = self.current.write().unwrap_or_else(|e| e.into_inner());
        *cur = config;
    }

    /// Returns a copy of the stored snapshot.
    pub fn get(&self) -> WorkerConfig {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new(WorkerConfig::default())
    }
}

#[async_trait]
impl ConfigSource for MemorySource {
    async fn load(&self) -> Result<WorkerConfig, ConfigError> {
        Ok(self.get())
    }
}

/// Reads a snapshot from `source`, bounded by `timeout`.
///
/// A source that does not answer in time fails this reload attempt with
/// [`ConfigError::ReloadTimeout`]; the caller keeps its previous values.
pub async fn load_with_timeout(
    source: &dyn ConfigSource,
    timeout: Duration,
) -> Result<WorkerConfig, ConfigError> {
    match tokio::time::timeout(timeout, source.load()).await {
        Ok(res) => res,
        Err(_) => Err(ConfigError::ReloadTimeout { timeout }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(WorkerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_sleep_interval() {
        let cfg = WorkerConfig {
            sleep_interval_ms: 0,
            ..WorkerConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange {
                key: "sleep_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_worker_count_outside_bounds() {
        for bad in [0u32, 51] {
            let cfg = WorkerConfig {
                worker_count: bad,
                ..WorkerConfig::default()
            };
            assert!(matches!(
                cfg.validate(),
                Err(ConfigError::OutOfRange {
                    key: "worker_count",
                    ..
                })
            ));
        }
        for ok in [1u32, 50] {
            let cfg = WorkerConfig {
                worker_count: ok,
                ..WorkerConfig::default()
            };
            assert!(cfg.validate().is_ok());
        }
    }

    #[test]
    fn test_apply_reload_touches_only_signal_keys() {
        let mut cur = WorkerConfig::default();
        let fresh = WorkerConfig {
            sleep_interval_ms: 500,
            worker_count: 7,
            max_workers: 9,
            start_timeout_ms: 1,
            grace_ms: 1,
        };

        cur.apply_reload(&fresh);

        assert_eq!(cur.sleep_interval_ms, 500);
        assert_eq!(cur.worker_count, WorkerConfig::default().worker_count);
        assert_eq!(cur.max_workers, WorkerConfig::default().max_workers);
        assert_eq!(
            cur.start_timeout_ms,
            WorkerConfig::default().start_timeout_ms
        );
        assert_eq!(cur.grace_ms, WorkerConfig::default().grace_ms);
    }

    #[test]
    fn test_reload_class_mapping() {
        assert_eq!(
            WorkerConfig::reload_class("sleep_interval_ms"),
            Some(ReloadClass::ReloadOnSignal)
        );
        for key in ["worker_count", "max_workers", "start_timeout_ms", "grace_ms"] {
            assert_eq!(
                WorkerConfig::reload_class(key),
                Some(ReloadClass::RestartRequired)
            );
        }
        assert_eq!(WorkerConfig::reload_class("naptime"), None);
    }

    #[tokio::test]
    async fn test_memory_source_roundtrip() {
        let source = MemorySource::default();
        let mut cfg = source.load().await.unwrap();
        assert_eq!(cfg.sleep_interval_ms, 10);

        cfg.sleep_interval_ms = 42;
        source.set(cfg);
        assert_eq!(source.load().await.unwrap().sleep_interval_ms, 42);
    }

    #[tokio::test]
    async fn test_load_with_timeout_reports_slow_source() {
        struct Stuck;

        #[async_trait]
        impl ConfigSource for Stuck {
            async fn load(&self) -> Result<WorkerConfig, ConfigError> {
                std::future::pending().await
            }
        }

        let res = load_with_timeout(&Stuck, Duration::from_millis(10)).await;
        assert!(matches!(res, Err(ConfigError::ReloadTimeout { .. })));
    }
}
