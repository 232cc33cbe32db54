use std::env;

use crate::error::ConfigError;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub authority: AuthorityConfig,
    pub operator: OperatorConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

// Настройки приложения
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

// Настройки удалённого сервиса сканирования
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

// Данные оператора и устройства
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    pub token: Option<String>,
    pub operator_id: Option<String>,
    pub device_info: String,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_seconds: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let operator = OperatorConfig {
            token: optional_var("SCAN_OPERATOR_TOKEN"),
            operator_id: optional_var("SCAN_OPERATOR_ID"),
            device_info: env::var("SCAN_DEVICE_INFO")
                .unwrap_or_else(|_| format!("ticket-scanner/{}", env!("CARGO_PKG_VERSION"))),
        };
        if operator.token.is_none() && operator.operator_id.is_none() {
            return Err(ConfigError::Missing("SCAN_OPERATOR_TOKEN or SCAN_OPERATOR_ID"));
        }

        Ok(Config {
            app: AppConfig {
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "ticket_scanner=info".to_string()),
                log_format: match env::var("LOG_FORMAT").as_deref() {
                    Ok("json") => LogFormat::Json,
                    Ok("pretty") | Err(_) => LogFormat::Pretty,
                    Ok(other) => {
                        return Err(ConfigError::Invalid {
                            var: "LOG_FORMAT",
                            value: other.to_string(),
                        })
                    }
                },
            },
            authority: AuthorityConfig {
                base_url: env::var("SCAN_API_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .map_err(|_| ConfigError::Missing("SCAN_API_URL"))?,
                timeout_seconds: parse_var("SCAN_API_TIMEOUT_SECONDS", 30)?,
            },
            operator,
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: parse_var("CIRCUIT_BREAKER_FAILURE_THRESHOLD", 5)?,
                timeout_seconds: parse_var("CIRCUIT_BREAKER_TIMEOUT_SECONDS", 60)?,
            },
        })
    }
}

// Пустая строка считается отсутствующим значением
fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: name,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
