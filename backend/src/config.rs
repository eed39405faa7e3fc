use std::env;
use std::net::SocketAddr;

use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} is invalid: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Connection settings for the data store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database: DatabaseConfig,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    ///
    /// `DATABASE_URL` wins when present. Otherwise the URL is assembled from
    /// `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASS` and `DB_NAME`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = match lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            Some(url) => url,
            None => {
                let host = lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string());
                let port = lookup("DB_PORT").unwrap_or_else(|| "5432".to_string());
                port.parse::<u16>().map_err(|_| ConfigError::Invalid {
                    name: "DB_PORT",
                    value: port.clone(),
                })?;
                let user = lookup("DB_USER").ok_or(ConfigError::Missing("DB_USER"))?;
                let pass = lookup("DB_PASS").ok_or(ConfigError::Missing("DB_PASS"))?;
                let name = lookup("DB_NAME").ok_or(ConfigError::Missing("DB_NAME"))?;
                postgres_url(&host, &port, &user, &pass, &name)?
            }
        };

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "DB_MAX_CONNECTIONS",
                value: raw,
            })?,
            None => 5,
        };

        let bind_addr = match lookup("BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "BIND_ADDR",
                value: raw,
            })?,
            None => SocketAddr::from(([127, 0, 0, 1], 3000)),
        };

        Ok(Self {
            database: DatabaseConfig {
                url,
                max_connections,
            },
            bind_addr,
        })
    }
}

/// Credentials are percent-encoded into the userinfo part.
fn postgres_url(
    host: &str,
    port: &str,
    user: &str,
    pass: &str,
    name: &str,
) -> Result<String, ConfigError> {
    let mut url = Url::parse(&format!("postgres://{}:{}/{}", host, port, name)).map_err(|_| {
        ConfigError::Invalid {
            name: "DB_HOST",
            value: host.to_string(),
        }
    })?;
    url.set_username(user).map_err(|_| ConfigError::Invalid {
        name: "DB_USER",
        value: user.to_string(),
    })?;
    url.set_password(Some(pass)).map_err(|_| ConfigError::Invalid {
        name: "DB_PASS",
        value: "<hidden>".to_string(),
    })?;
    Ok(url.to_string())
}
