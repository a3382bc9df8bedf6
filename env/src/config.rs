//! Configuration of the application

use std::path::PathBuf;

use serde::Deserialize;
use tracing::info;

pub const DEFAULT_TCP_PORT: u16 = 5556;
pub const DEFAULT_UDP_PORT: u16 = 5555;
pub const DEFAULT_NAME: &str = "quiznet";

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_udp_port() -> u16 {
    DEFAULT_UDP_PORT
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_bank_file() -> PathBuf {
    "questions.json".into()
}

fn default_accounts_file() -> PathBuf {
    "accounts.txt".into()
}

fn default_slowest_penalty() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_bank_file")]
    pub bank_file: PathBuf,
    #[serde(default = "default_accounts_file")]
    pub accounts_file: PathBuf,
    /// Battle-mode rule: the slowest non-skipping answerer loses a life
    /// even on a correct answer.
    #[serde(default = "default_slowest_penalty")]
    pub slowest_penalty: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tcp_port: DEFAULT_TCP_PORT,
            udp_port: DEFAULT_UDP_PORT,
            name: DEFAULT_NAME.to_string(),
            bank_file: default_bank_file(),
            accounts_file: default_accounts_file(),
            slowest_penalty: true,
        }
    }
}

impl Config {
    pub async fn from_path(path: &PathBuf) -> Result<Config, String> {
        info!("Load configuration: {:?}", path);
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Config file not readable: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("Invalid config file: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.tcp_port, 5556);
        assert_eq!(config.udp_port, 5555);
        assert_eq!(config.name, "quiznet");
        assert!(config.slowest_penalty);
    }

    #[test]
    fn test_overrides() {
        let config: Config = toml::from_str(
            "tcp_port = 7000\nname = \"salle-204\"\nslowest_penalty = false\n",
        )
        .unwrap();
        assert_eq!(config.tcp_port, 7000);
        assert_eq!(config.name, "salle-204");
        assert!(!config.slowest_penalty);
    }
}
