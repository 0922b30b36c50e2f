//! Coordinator configuration. Loaded by `farmd` from a TOML file,
//! overridden by environment variables and CLI flags, the same
//! file-then-env-then-flag precedence the reference client applies to its
//! own settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A daily time-of-day window during which tasks must not start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForbiddenZone {
    pub start_hour: u32,
    pub duration_hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub time_zone: chrono_tz::Tz,
    pub forbidden_zones: Vec<ForbiddenZone>,
    pub beep_threshold_count: u32,
    #[serde(with = "humantime_secs")]
    pub scheduler_period: Duration,
    #[serde(with = "humantime_secs")]
    pub poller_period: Duration,
    #[serde(with = "humantime_secs")]
    pub dispatch_period: Duration,
    #[serde(with = "humantime_secs")]
    pub http_connect_timeout: Duration,
    #[serde(with = "humantime_secs")]
    pub http_read_timeout: Duration,
    pub operator_bind_addr: String,
    /// Root directory program files are read from before upload, mirroring
    /// the reference system's `MEDIA_ROOT` (sliced output and ready-made
    /// programs are both stored as paths relative to this root).
    pub program_storage_dir: PathBuf,
}

impl Configuration {
    pub const DEFAULT_SCHEDULER_PERIOD: Duration = Duration::from_secs(10);
    pub const DEFAULT_POLLER_PERIOD: Duration = Duration::from_secs(2);
    pub const DEFAULT_DISPATCH_PERIOD: Duration = Duration::from_secs(1);
    pub const DEFAULT_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_HTTP_READ_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_BEEP_THRESHOLD_COUNT: u32 = 5;
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            time_zone: chrono_tz::UTC,
            forbidden_zones: Vec::new(),
            beep_threshold_count: Self::DEFAULT_BEEP_THRESHOLD_COUNT,
            scheduler_period: Self::DEFAULT_SCHEDULER_PERIOD,
            poller_period: Self::DEFAULT_POLLER_PERIOD,
            dispatch_period: Self::DEFAULT_DISPATCH_PERIOD,
            http_connect_timeout: Self::DEFAULT_HTTP_CONNECT_TIMEOUT,
            http_read_timeout: Self::DEFAULT_HTTP_READ_TIMEOUT,
            operator_bind_addr: "127.0.0.1:8090".to_string(),
            program_storage_dir: PathBuf::from("media"),
        }
    }
}

mod humantime_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
