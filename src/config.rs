use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::auth::resolver::LookupStrategy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub oauth: OAuthConfig,

    pub payment: VnPayConfig,

    pub scheduler: SchedulerConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/bistro.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on the refresh-token cookie.
    /// Off by default so plain-HTTP local setups work; enable behind TLS.
    pub secure_cookies: bool,

    /// Path the refresh-token cookie is scoped to.
    pub refresh_cookie_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            secure_cookies: false,
            refresh_cookie_path: "/api/auth".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// Order in which a login identifier is matched against stored accounts.
    pub lookup_strategies: Vec<LookupStrategy>,

    pub jwt: JwtConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            lookup_strategies: LookupStrategy::DEFAULT_ORDER.to_vec(),
            jwt: JwtConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// HMAC secret for HS256. Override with `BISTRO_JWT_SECRET`.
    pub secret: String,

    pub access_ttl_seconds: i64,

    pub refresh_ttl_seconds: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "change-me".to_string(),
            access_ttl_seconds: 15 * 60,
            refresh_ttl_seconds: 7 * 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Where the browser lands after a federated login; tokens are appended as query params.
    pub success_redirect_url: String,

    /// Where the browser lands when federated login fails; `error` is appended.
    pub failure_redirect_url: String,

    /// Shared secret the provider adapter sends in `x-oauth-adapter-token` when it
    /// reports a completed login. Empty disables the callback.
    /// Override with `BISTRO_OAUTH_ADAPTER_TOKEN`.
    pub adapter_token: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            success_redirect_url: "http://localhost:3000/oauth2/redirect".to_string(),
            failure_redirect_url: "http://localhost:3000/login".to_string(),
            adapter_token: String::new(),
        }
    }
}

/// Merchant settings for the VNPay gateway. Built once and handed to the signer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VnPayConfig {
    pub pay_url: String,

    pub return_url: String,

    /// Merchant terminal code. Override with `BISTRO_VNPAY_TMN_CODE`.
    pub tmn_code: String,

    /// Shared HMAC secret. Override with `BISTRO_VNPAY_HASH_SECRET`.
    pub hash_secret: String,

    pub version: String,

    pub command: String,

    pub currency: String,

    pub locale: String,

    pub order_type: String,

    /// Minutes until the payment link expires
    pub expire_minutes: i64,
}

impl Default for VnPayConfig {
    fn default() -> Self {
        Self {
            pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "http://localhost:8080/api/payments/vnpay/return".to_string(),
            tmn_code: String::new(),
            hash_secret: String::new(),
            version: "2.1.0".to_string(),
            command: "pay".to_string(),
            currency: "VND".to_string(),
            locale: "vn".to_string(),
            order_type: "other".to_string(),
            expire_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    /// Six-field cron (sec min hour dom mon dow)
    pub role_seed_cron: String,

    pub discount_refresh_cron: String,

    pub registration_cleanup_cron: String,

    /// Pending registrations older than this are purged
    pub registration_ttl_hours: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            role_seed_cron: "0 0 3 * * *".to_string(),
            discount_refresh_cron: "0 */5 * * * *".to_string(),
            registration_cleanup_cron: "0 0 * * * *".to_string(),
            registration_ttl_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub json_logs: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "bistro".to_string());

        Self {
            metrics_enabled: true,
            json_logs: false,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // A missing .env is normal outside development
        let _ = dotenvy::dotenv();

        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    /// Secrets are usually injected by the environment rather than committed to config.toml.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("BISTRO_DATABASE_URL") {
            self.general.database_path = url;
        }
        if let Some(secret) = lookup("BISTRO_JWT_SECRET") {
            self.security.jwt.secret = secret;
        }
        if let Some(token) = lookup("BISTRO_OAUTH_ADAPTER_TOKEN") {
            self.oauth.adapter_token = token;
        }
        if let Some(code) = lookup("BISTRO_VNPAY_TMN_CODE") {
            self.payment.tmn_code = code;
        }
        if let Some(secret) = lookup("BISTRO_VNPAY_HASH_SECRET") {
            self.payment.hash_secret = secret;
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("bistro").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".bistro").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.security.jwt.secret.len() < 32 {
            anyhow::bail!("JWT secret must be at least 32 bytes (set BISTRO_JWT_SECRET)");
        }

        if self.security.jwt.access_ttl_seconds <= 0 || self.security.jwt.refresh_ttl_seconds <= 0
        {
            anyhow::bail!("JWT token lifetimes must be positive");
        }

        if self.security.lookup_strategies.is_empty() {
            anyhow::bail!("At least one identity lookup strategy is required");
        }

        url::Url::parse(&self.oauth.success_redirect_url)
            .context("Invalid oauth.success_redirect_url")?;
        url::Url::parse(&self.oauth.failure_redirect_url)
            .context("Invalid oauth.failure_redirect_url")?;

        // `bistro housekeeping` purges with this TTL even when the scheduler is off
        if self.scheduler.registration_ttl_hours <= 0 {
            anyhow::bail!("Registration TTL must be > 0 hours");
        }

        if self.scheduler.enabled {
            for (name, expr) in [
                ("role_seed_cron", &self.scheduler.role_seed_cron),
                ("discount_refresh_cron", &self.scheduler.discount_refresh_cron),
                ("registration_cleanup_cron", &self.scheduler.registration_cleanup_cron),
            ] {
                let fields = expr.split_whitespace().count();
                if !(6..=7).contains(&fields) {
                    anyhow::bail!("scheduler.{name} must be a 6 or 7 field cron expression");
                }
            }
        }

        Ok(())
    }
}
