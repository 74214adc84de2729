use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// 存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend {}", other)),
        }
    }
}

/// 限流规则，形如 "10 per hour" 或 "10/hour"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub limit: u64,
    pub window: Duration,
}

impl RateLimitRule {
    pub fn new(limit: u64, window: Duration) -> Self {
        Self { limit, window }
    }

    /// 逗号或分号分隔的多条规则
    pub fn parse_list(s: &str) -> Result<Vec<Self>, String> {
        s.split([',', ';'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for RateLimitRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (count, unit) = s
            .split_once(" per ")
            .or_else(|| s.split_once('/'))
            .ok_or_else(|| format!("expected \"N per unit\", got {:?}", s))?;

        let limit = count
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid limit {:?}: {}", count, e))?;
        if limit == 0 {
            return Err("limit must be positive".to_string());
        }

        // 支持 "2 hours" 这样的写法
        let unit = unit.trim();
        let (multiplier, unit) = match unit.split_once(' ') {
            Some((n, u)) => (
                n.parse::<u64>()
                    .map_err(|e| format!("invalid window {:?}: {}", unit, e))?,
                u.trim(),
            ),
            None => (1, unit),
        };
        let seconds = match unit.trim_end_matches('s') {
            "second" | "sec" => 1,
            "minute" | "min" => 60,
            "hour" => 3600,
            "day" => 86400,
            other => return Err(format!("unknown time unit {:?}", other)),
        };

        Ok(Self::new(limit, Duration::from_secs(seconds * multiplier)))
    }
}

impl fmt::Display for RateLimitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.window.as_secs();
        let (n, unit) = if secs % 86400 == 0 {
            (secs / 86400, "day")
        } else if secs % 3600 == 0 {
            (secs / 3600, "hour")
        } else if secs % 60 == 0 {
            (secs / 60, "minute")
        } else {
            (secs, "second")
        };
        write!(f, "{} per {} {}", self.limit, n, unit)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub database_url: String,
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub debug: bool,
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_minutes: i64,
    pub cache_prefix: String,
    pub cache_default_expire_secs: u64,
    pub rate_limit_default: Vec<RateLimitRule>,
    pub rate_limit_recipes: Vec<RateLimitRule>,
    pub bcrypt_cost: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Memory,
            database_url: String::new(),
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 9000,
            debug: true,
            jwt_secret: "local-development-secret".to_string(),
            jwt_algorithm: Algorithm::HS256,
            access_token_expire_minutes: 60,
            refresh_token_expire_minutes: 1440,
            cache_prefix: "cache:".to_string(),
            cache_default_expire_secs: 3600,
            rate_limit_default: vec![
                RateLimitRule::new(200, Duration::from_secs(86400)),
                RateLimitRule::new(50, Duration::from_secs(3600)),
            ],
            rate_limit_recipes: vec![RateLimitRule::new(10, Duration::from_secs(3600))],
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

fn optional<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(var) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::Missing(var))
}

fn rules(var: &'static str, default: Vec<RateLimitRule>) -> Result<Vec<RateLimitRule>, ConfigError> {
    match env::var(var) {
        Ok(value) => RateLimitRule::parse_list(&value).map_err(|reason| ConfigError::Invalid {
            var,
            value,
            reason,
        }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let defaults = Config::default();

        let storage_backend = optional("STORAGE_BACKEND", StorageBackend::Postgres)?;
        let database_url = match storage_backend {
            StorageBackend::Postgres => required("DATABASE_URL")?,
            StorageBackend::Memory => env::var("DATABASE_URL").unwrap_or_default(),
        };
        let debug = optional("APP_DEBUG", false)?;
        // 生产环境必须显式配置 Redis
        let redis_url = if debug {
            env::var("REDIS_URL").unwrap_or(defaults.redis_url)
        } else {
            required("REDIS_URL")?
        };

        let jwt_algorithm = optional("JWT_ALGORITHM", Algorithm::HS256)?;
        if !matches!(
            jwt_algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(ConfigError::Invalid {
                var: "JWT_ALGORITHM",
                value: format!("{:?}", jwt_algorithm),
                reason: "only symmetric HS* algorithms are supported".to_string(),
            });
        }

        Ok(Config {
            storage_backend,
            database_url,
            redis_url,
            server_host: optional("SERVER_HOST", defaults.server_host)?,
            server_port: optional("SERVER_PORT", defaults.server_port)?,
            debug,
            jwt_secret: required("JWT_SECRET")?,
            jwt_algorithm,
            access_token_expire_minutes: optional(
                "ACCESS_TOKEN_EXPIRE_MINUTES",
                defaults.access_token_expire_minutes,
            )?,
            refresh_token_expire_minutes: optional(
                "REFRESH_TOKEN_EXPIRE_MINUTES",
                defaults.refresh_token_expire_minutes,
            )?,
            cache_prefix: optional("CACHE_PREFIX", defaults.cache_prefix)?,
            cache_default_expire_secs: optional(
                "CACHE_DEFAULT_EXPIRE",
                defaults.cache_default_expire_secs,
            )?,
            rate_limit_default: rules("RATE_LIMIT_DEFAULT", defaults.rate_limit_default)?,
            rate_limit_recipes: rules("RATE_LIMIT_RECIPES", defaults.rate_limit_recipes)?,
            bcrypt_cost: optional("BCRYPT_COST", defaults.bcrypt_cost)?,
        })
    }

    pub fn cache_default_expire(&self) -> Duration {
        Duration::from_secs(self.cache_default_expire_secs)
    }

    /// 调试模式下关闭缓存
    pub fn cache_enabled(&self) -> bool {
        !self.debug
    }

    pub fn rate_limit_enabled(&self) -> bool {
        !self.debug
    }
}
