//! Runtime settings, read from `THREADS_*` environment variables
//! (a `.env` file is loaded first) over built-in defaults.

use serde::Deserialize;
use tb_core::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub page_size: u32,
    pub static_dir: String,
}

impl Settings {
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("database_url", "sqlite:threads.db")?
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080_i64)?
            .set_default("max_connections", 5_i64)?
            .set_default("page_size", i64::from(DEFAULT_PAGE_SIZE))?
            .set_default("static_dir", "./static")?
            .add_source(config::Environment::with_prefix("THREADS").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}
