use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: d_host(), port: d_port() }
    }
}

fn d_host() -> String {
    "127.0.0.1".into()
}

fn d_port() -> u16 {
    3000
}
