use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub gateway: GatewayDefaults,
    pub refresh: RefreshConfig,
    pub webhook: WebhookConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Gateway used when neither the clinic nor the global store entry is set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayDefaults {
    pub url: String,
    pub api_key: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub period_secs: u64,
    pub notice_clear_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub port: u16,
    pub enable_cors: bool,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub config_dir: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Gateway overrides
        if let Ok(v) = env::var("WAHA_DEFAULT_URL") {
            self.gateway.url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("WAHA_DEFAULT_API_KEY") {
            self.gateway.api_key = v;
        }
        if let Ok(v) = env::var("WAHA_REQUEST_TIMEOUT_SECS") {
            self.gateway.request_timeout_secs = v.parse().unwrap_or(self.gateway.request_timeout_secs);
        }

        // Refresh overrides
        if let Ok(v) = env::var("WAHA_REFRESH_SECS") {
            self.refresh.period_secs = v.parse().unwrap_or(self.refresh.period_secs);
        }
        if let Ok(v) = env::var("WAHA_NOTICE_CLEAR_SECS") {
            self.refresh.notice_clear_secs = v.parse().unwrap_or(self.refresh.notice_clear_secs);
        }

        // Webhook overrides
        if let Ok(v) = env::var("WAHA_WEBHOOK_PORT").or_else(|_| env::var("PORT")) {
            self.webhook.port = v.parse().unwrap_or(self.webhook.port);
        }
        if let Ok(v) = env::var("WAHA_WEBHOOK_ENABLE_CORS") {
            self.webhook.enable_cors = v.parse().unwrap_or(self.webhook.enable_cors);
        }

        // Store overrides
        if let Ok(v) = env::var("WAHA_CONFIG_DIR") {
            self.store.config_dir = Some(v);
        }

        self
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh.period_secs.max(1))
    }

    pub fn notice_clear_delay(&self) -> Duration {
        Duration::from_secs(self.refresh.notice_clear_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.request_timeout_secs)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            gateway: GatewayDefaults {
                url: "http://localhost:3000".to_string(),
                api_key: String::new(),
                request_timeout_secs: 30,
            },
            refresh: RefreshConfig {
                period_secs: 3 * 60, // 3 minutes
                notice_clear_secs: 5,
            },
            webhook: WebhookConfig {
                port: 8080,
                enable_cors: true,
                enable_request_logging: true,
            },
            store: StoreConfig { config_dir: None },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            gateway: GatewayDefaults {
                url: "http://localhost:3000".to_string(),
                api_key: String::new(),
                request_timeout_secs: 15,
            },
            refresh: RefreshConfig {
                period_secs: 3 * 60,
                notice_clear_secs: 5,
            },
            webhook: WebhookConfig {
                port: 8080,
                enable_cors: true,
                enable_request_logging: true,
            },
            store: StoreConfig { config_dir: None },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            gateway: GatewayDefaults {
                url: "http://localhost:3000".to_string(),
                api_key: String::new(),
                request_timeout_secs: 10,
            },
            refresh: RefreshConfig {
                period_secs: 3 * 60,
                notice_clear_secs: 5,
            },
            webhook: WebhookConfig {
                port: 8080,
                enable_cors: false,
                enable_request_logging: false,
            },
            store: StoreConfig { config_dir: None },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
