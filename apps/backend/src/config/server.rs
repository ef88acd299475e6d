use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let host = env::var("ARENA_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = match env::var("ARENA_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::config(format!("ARENA_PORT is not a port: '{raw}'")))?,
            Err(_) => 3001,
        };
        Ok(Self { host, port })
    }
}
