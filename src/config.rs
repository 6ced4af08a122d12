use std::time::Duration;

/// Runtime configuration, read once at startup.
///
/// Every knob has a development default so the server can run without any
/// environment set up. `LOCK_TTL_SECONDS` and `SWEEP_INTERVAL_SECONDS` are
/// whole seconds; tests construct `Config` directly with millisecond
/// durations instead.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub jwt_secret: String,
    /// How long a seat hold stays valid before it expires.
    pub lock_ttl: Duration,
    /// How often the background sweep looks for expired holds.
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            port: env_parse("PORT", defaults.port),
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            lock_ttl: Duration::from_secs(env_parse(
                "LOCK_TTL_SECONDS",
                defaults.lock_ttl.as_secs(),
            )),
            sweep_interval: Duration::from_secs(env_parse(
                "SWEEP_INTERVAL_SECONDS",
                defaults.sweep_interval.as_secs(),
            )),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            jwt_secret: "dev-secret-change-in-production".to_string(),
            lock_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}
