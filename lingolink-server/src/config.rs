use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub chat_base_url: String,
    pub chat_api_key: Option<String>,
    pub chat_api_secret: Option<String>,
}

impl Config {
    /// Reads configuration from the environment (a `.env` file is honored
    /// when `dotenv::dotenv()` has been called first).
    pub fn from_env() -> Self {
        Self {
            port: dotenv::var("PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(8000),
            data_dir: dotenv::var("DATA_DIR")
                .unwrap_or_else(|_| "lingolink-data".to_owned())
                .into(),
            chat_base_url: dotenv::var("CHAT_API_URL")
                .unwrap_or_else(|_| "https://chat.example.com/v1".to_owned()),
            chat_api_key: dotenv::var("CHAT_API_KEY").ok(),
            chat_api_secret: dotenv::var("CHAT_API_SECRET").ok(),
        }
    }
}
