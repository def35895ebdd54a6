//! Process configuration, loaded from the environment.

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub port: u16,
    /// Cap `M` on the emitted sequence length before the expanded view stops,
    /// default 100.
    pub sequence_cap: usize,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./rotation.db".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let sequence_cap = std::env::var("SEQUENCE_CAP")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(100);

        let log_filter = std::env::var("LOG_FILTER")
            .unwrap_or_else(|_| "rotation_engine=debug,tower_http=debug".to_string());

        Ok(Self {
            database_path,
            port,
            sequence_cap,
            log_filter,
        })
    }
}
