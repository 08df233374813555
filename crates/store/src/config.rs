use std::{env, time::Duration};

/// Default table name.
pub const DEFAULT_TABLE: &str = "Sessions";

/// Default interval between expiry sweeps (15 minutes).
pub const DEFAULT_CHECK_EXPIRATION_INTERVAL: Duration = Duration::from_millis(15 * 60 * 1000);

/// Default session lifetime when the payload carries no expiry (24 hours).
pub const DEFAULT_EXPIRATION: Duration = Duration::from_millis(24 * 60 * 60 * 1000);

/// Store options.
#[derive(Clone)]
pub struct StoreConfig {
    /// Secret used to encrypt payloads. Required.
    pub secret: Option<String>,
    /// Table name override (default: `Sessions`).
    pub table: Option<String>,
    /// Interval between expiry sweeps. Zero disables the sweeper.
    pub check_expiration_interval: Duration,
    /// Session lifetime used when the payload has no `cookie.expires`.
    pub expiration: Duration,
    /// Turn `touch` into a no-op.
    pub disable_touch: bool,
    /// Emit diagnostic events at the store's extension points.
    pub debug: bool,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("table", &self.table)
            .field("check_expiration_interval", &self.check_expiration_interval)
            .field("expiration", &self.expiration)
            .field("disable_touch", &self.disable_touch)
            .field("debug", &self.debug)
            .finish()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            secret: None,
            table: None,
            check_expiration_interval: DEFAULT_CHECK_EXPIRATION_INTERVAL,
            expiration: DEFAULT_EXPIRATION,
            disable_touch: false,
            debug: false,
        }
    }
}

impl StoreConfig {
    /// Load from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SESSION_SECRET`: Secret used to encrypt session data (required by the store)
    /// - `SESSION_TABLE`: Table name (default: `Sessions`)
    /// - `SESSION_CHECK_EXPIRATION_INTERVAL_MS`: Sweep interval in ms, `0` or negative disables (default: 900000)
    /// - `SESSION_EXPIRATION_MS`: Session lifetime in ms (default: 86400000)
    /// - `SESSION_DISABLE_TOUCH`: `true`/`1` to disable touch (default: false)
    /// - `SESSION_DEBUG`: `true`/`1` to enable diagnostic events (default: false)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            secret: lookup("SESSION_SECRET").filter(|s| !s.is_empty()),
            table: lookup("SESSION_TABLE").filter(|s| !s.is_empty()),
            check_expiration_interval: lookup("SESSION_CHECK_EXPIRATION_INTERVAL_MS")
                .and_then(|v| v.parse::<i64>().ok())
                .map(millis_or_zero)
                .unwrap_or(defaults.check_expiration_interval),
            expiration: lookup("SESSION_EXPIRATION_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.expiration),
            disable_touch: lookup("SESSION_DISABLE_TOUCH")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.disable_touch),
            debug: lookup("SESSION_DEBUG")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.debug),
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_check_expiration_interval(mut self, interval: Duration) -> Self {
        self.check_expiration_interval = interval;
        self
    }

    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn with_disable_touch(mut self, disable_touch: bool) -> Self {
        self.disable_touch = disable_touch;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Table name to use, falling back to the default.
    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(DEFAULT_TABLE)
    }

    /// Whether the expiry sweeper should run.
    pub fn sweeper_enabled(&self) -> bool {
        !self.check_expiration_interval.is_zero()
    }
}

fn millis_or_zero(ms: i64) -> Duration {
    u64::try_from(ms)
        .map(Duration::from_millis)
        .unwrap_or(Duration::ZERO)
}

fn parse_flag(value: &str) -> bool {
    value == "true" || value == "1"
}
