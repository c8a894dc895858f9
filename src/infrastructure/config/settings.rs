use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub templates: TemplateSettings,
    #[serde(default)]
    pub branding: BrandingConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub fcm: FcmConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Expected `X-API-Key` value; unset disables the check
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL; unset selects in-memory stores
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisConfig {
    /// Redis URL, required by the redis queue backend
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// "memory" (default) or "redis"
    #[serde(default = "default_queue_backend")]
    pub backend: String,
    /// Redis list holding pending delivery tasks
    #[serde(default = "default_queue_key")]
    pub redis_key: String,
    /// Attempts per task before it is dropped
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Number of concurrent delivery workers
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    #[serde(default = "default_retry_initial_delay")]
    pub retry_initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
    /// Blocking pop timeout for the redis backend
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
}

/// Where the service is deployed; selects production or staging mailboxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentEnvironment {
    #[serde(alias = "prod")]
    Production,
    #[serde(alias = "stage")]
    Staging,
    #[default]
    #[serde(alias = "dev")]
    Development,
}

impl DeploymentEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, DeploymentEnvironment::Production)
    }
}

/// Fixed mailboxes used when building email envelopes.
///
/// Each production mailbox is paired with the staging one that replaces it
/// outside production.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub environment: DeploymentEnvironment,
    /// CC for admin-broadcast sends in production
    #[serde(default)]
    pub management_list: Vec<String>,
    /// BCC for escalation-required templates in production
    #[serde(default)]
    pub higher_management_list: Vec<String>,
    /// CC for report broadcasts in production
    #[serde(default)]
    pub report_list: Vec<String>,
    /// Replaces every list outside production; BCC of admin broadcasts
    #[serde(default)]
    pub staging_list: Vec<String>,
    pub partner_confirmation_address: String,
    pub partner_confirmation_address_staging: String,
    /// Recipient used when the resolved primary has no address
    pub operations_fallback_address: String,
    pub operations_fallback_address_staging: String,
}

/// Additions to the built-in template registry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateSettings {
    #[serde(default)]
    pub concern_person: Vec<String>,
    #[serde(default)]
    pub company_admin: Vec<String>,
    #[serde(default)]
    pub exceptional: Vec<String>,
    #[serde(default)]
    pub permission_bypass: Vec<String>,
    #[serde(default)]
    pub escalation_required: Vec<String>,
    /// Replaces the built-in list when non-empty
    #[serde(default)]
    pub disqualifying_sources: Vec<String>,
}

/// Site constants injected into every email as macros
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrandingConfig {
    #[serde(default)]
    pub app_url: String,
    #[serde(default)]
    pub app_url_hire: String,
    #[serde(default)]
    pub fb_url: String,
    #[serde(default)]
    pub tw_url: String,
    #[serde(default)]
    pub insta_url: String,
    #[serde(default)]
    pub linkedin_url: String,
    #[serde(default)]
    pub youtube_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// SMTP relay host; unset disables email sending
    pub host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    pub from_name: Option<String>,
    /// Use STARTTLS (true) or implicit TLS (false)
    #[serde(default = "default_true")]
    pub starttls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmConfig {
    /// FCM server key; unset disables push sending
    pub server_key: Option<String>,
    #[serde(default = "default_fcm_endpoint")]
    pub endpoint: String,
    pub click_url: Option<String>,
    #[serde(default = "default_fcm_sound")]
    pub sound: String,
    pub badge: Option<u32>,
    #[serde(default = "default_fcm_timeout")]
    pub timeout_seconds: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300 // 5 minutes
}

fn default_queue_backend() -> String {
    "memory".to_string()
}

fn default_queue_key() -> String {
    "notifications:delivery".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_worker_concurrency() -> usize {
    4
}

fn default_retry_initial_delay() -> u64 {
    500
}

fn default_retry_max_delay() -> u64 {
    60_000 // 1 minute
}

fn default_poll_timeout() -> u64 {
    5
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "no-reply@localhost".to_string()
}

fn default_true() -> bool {
    true
}

fn default_fcm_endpoint() -> String {
    "https://fcm.googleapis.com/fcm/send".to_string()
}

fn default_fcm_sound() -> String {
    "default".to_string()
}

fn default_fcm_timeout() -> u64 {
    10
}

/// Map RUN_MODE onto a deployment environment name
fn environment_for_run_mode(run_mode: &str) -> &'static str {
    match run_mode {
        "production" | "prod" => "production",
        "staging" | "stage" => "staging",
        _ => "development",
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8082)?
            .set_default("delivery.environment", environment_for_run_mode(&run_mode))?
            .set_default("delivery.partner_confirmation_address", "")?
            .set_default("delivery.partner_confirmation_address_staging", "")?
            .set_default("delivery.operations_fallback_address", "")?
            .set_default("delivery.operations_fallback_address_staging", "")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // NOTIFY_SERVER__PORT, NOTIFY_DATABASE__URL, NOTIFY_DELIVERY__STAGING_LIST, etc.
            .add_source(
                Environment::with_prefix("NOTIFY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("delivery.management_list")
                    .with_list_parse_key("delivery.higher_management_list")
                    .with_list_parse_key("delivery.report_list")
                    .with_list_parse_key("delivery.staging_list")
                    .with_list_parse_key("templates.concern_person")
                    .with_list_parse_key("templates.company_admin")
                    .with_list_parse_key("templates.exceptional")
                    .with_list_parse_key("templates.permission_bypass")
                    .with_list_parse_key("templates.escalation_required")
                    .with_list_parse_key("templates.disqualifying_sources"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: default_queue_backend(),
            redis_key: default_queue_key(),
            max_attempts: default_max_attempts(),
            worker_concurrency: default_worker_concurrency(),
            retry_initial_delay_ms: default_retry_initial_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            poll_timeout_seconds: default_poll_timeout(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_smtp_port(),
            username: None,
            password: None,
            from_address: default_from_address(),
            from_name: None,
            starttls: true,
        }
    }
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            server_key: None,
            endpoint: default_fcm_endpoint(),
            click_url: None,
            sound: default_fcm_sound(),
            badge: None,
            timeout_seconds: default_fcm_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8082);

        let queue = QueueConfig::default();
        assert_eq!(queue.backend, "memory");
        assert_eq!(queue.max_attempts, 5);
    }

    #[test]
    fn test_environment_for_run_mode() {
        assert_eq!(environment_for_run_mode("prod"), "production");
        assert_eq!(environment_for_run_mode("test"), "development");
    }

    #[test]
    fn test_environment_aliases() {
        let env: DeploymentEnvironment = serde_json::from_str("\"prod\"").unwrap();
        assert!(env.is_production());

        let env: DeploymentEnvironment = serde_json::from_str("\"development\"").unwrap();
        assert!(!env.is_production());
    }

    #[test]
    fn test_delivery_config_lists_default_empty() {
        let delivery: DeliveryConfig = serde_json::from_value(serde_json::json!({
            "partner_confirmation_address": "partners@example.com",
            "partner_confirmation_address_staging": "partners-stage@example.com",
            "operations_fallback_address": "ops@example.com",
            "operations_fallback_address_staging": "ops-stage@example.com"
        }))
        .unwrap();

        assert!(delivery.management_list.is_empty());
        assert_eq!(delivery.environment, DeploymentEnvironment::Development);
    }
}
