use std::net::IpAddr;
use std::time::Duration;

use ipnet::IpNet;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub storage: StorageBackend,
    pub identity: IdentityBackend,
    pub token_ttl: chrono::Duration,
    pub max_body_size: usize,
    pub trusted_proxies: Vec<IpNet>,
    pub log_level: String,
    pub provisioning_timeout: Duration,
    pub bootstrap: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdentityBackend {
    Local,
    Hosted { url: String, service_key: String },
}

#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let jwt_secret = env_required("JWT_SECRET")?;

        let storage = match env_or("STAFFDESK_STORAGE", "postgres").as_str() {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => return Err(format!("Invalid STAFFDESK_STORAGE: {other}")),
        };
        let database_url = match storage {
            StorageBackend::Postgres => Some(env_required("DATABASE_URL")?),
            StorageBackend::Memory => std::env::var("DATABASE_URL").ok(),
        };

        let identity = match env_or("STAFFDESK_IDENTITY", "local").as_str() {
            "local" => IdentityBackend::Local,
            "hosted" => IdentityBackend::Hosted {
                url: env_required("STAFFDESK_IDENTITY_URL")?,
                service_key: env_required("STAFFDESK_IDENTITY_SERVICE_KEY")?,
            },
            other => return Err(format!("Invalid STAFFDESK_IDENTITY: {other}")),
        };

        let host: IpAddr = env_or("STAFFDESK_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid STAFFDESK_HOST: {e}"))?;

        let port: u16 = env_or("STAFFDESK_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid STAFFDESK_PORT: {e}"))?;

        let token_ttl_minutes: i64 = env_or("STAFFDESK_TOKEN_TTL_MINUTES", "60")
            .parse()
            .map_err(|e| format!("Invalid STAFFDESK_TOKEN_TTL_MINUTES: {e}"))?;

        let max_body_size: usize = env_or("STAFFDESK_MAX_BODY_SIZE", "65536")
            .parse()
            .map_err(|e| format!("Invalid STAFFDESK_MAX_BODY_SIZE: {e}"))?;

        let trusted_proxies = parse_proxies(&env_or("STAFFDESK_TRUSTED_PROXIES", ""))?;

        let log_level = env_or("STAFFDESK_LOG_LEVEL", "info");

        let provisioning_timeout: u64 = env_or("STAFFDESK_PROVISIONING_TIMEOUT_SECS", "10")
            .parse()
            .map_err(|e| format!("Invalid STAFFDESK_PROVISIONING_TIMEOUT_SECS: {e}"))?;

        let bootstrap = match (
            std::env::var("STAFFDESK_BOOTSTRAP_EMAIL").ok(),
            std::env::var("STAFFDESK_BOOTSTRAP_PASSWORD").ok(),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            storage,
            identity,
            token_ttl: chrono::Duration::minutes(token_ttl_minutes),
            max_body_size,
            trusted_proxies,
            log_level,
            provisioning_timeout: Duration::from_secs(provisioning_timeout),
            bootstrap,
        })
    }

    /// In-memory configuration for tests and local experiments.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Config {
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            storage: StorageBackend::Memory,
            identity: IdentityBackend::Local,
            token_ttl: chrono::Duration::minutes(60),
            max_body_size: 65536,
            trusted_proxies: Vec::new(),
            log_level: "info".to_string(),
            provisioning_timeout: Duration::from_secs(10),
            bootstrap: None,
        }
    }
}

fn parse_proxies(raw: &str) -> Result<Vec<IpNet>, String> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|e| format!("Invalid STAFFDESK_TRUSTED_PROXIES entry '{s}': {e}"))
        })
        .collect()
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trusted_proxies_accept_cidrs_and_skip_blanks() {
        let nets = parse_proxies("10.0.0.0/8, ,192.168.1.0/24").unwrap();
        assert_eq!(nets.len(), 2);
        assert!(parse_proxies("").unwrap().is_empty());
    }

    #[test]
    fn bad_proxy_entry_names_the_variable() {
        let err = parse_proxies("not-a-net").unwrap_err();
        assert!(err.contains("STAFFDESK_TRUSTED_PROXIES"));
    }
}
