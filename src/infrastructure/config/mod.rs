mod settings;

pub use settings::{
    ApiConfig, BrandingConfig, DatabaseConfig, DeliveryConfig, DeploymentEnvironment, FcmConfig,
    LoggingConfig, QueueConfig, RedisConfig, ServerConfig, Settings, SmtpConfig, TemplateSettings,
};
