use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub upload_folder: PathBuf,
    pub host: String,
    pub port: u16,
    /// Unset means notifications are only logged.
    pub notify_webhook_url: Option<String>,
    pub notify_timeout: Duration,
    /// Name and email of the chief editor created on first start.
    pub chief_editor: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://paperflow.db".to_string());
        let database_max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let upload_folder = base_dir.join(
            std::env::var("UPLOAD_FOLDER").unwrap_or_else(|_| "uploads".to_string())
        );

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5001".to_string())
            .parse()
            .unwrap_or(5001);

        let notify_webhook_url = std::env::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let notify_timeout = Duration::from_secs(
            std::env::var("NOTIFY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        );

        let chief_editor = match (
            std::env::var("CHIEF_EDITOR_NAME"),
            std::env::var("CHIEF_EDITOR_EMAIL"),
        ) {
            (Ok(name), Ok(email)) => Some((name, email)),
            (Err(_), Ok(email)) => Some(("Chief Editor".to_string(), email)),
            (Ok(_), Err(_)) => {
                return Err("CHIEF_EDITOR_EMAIL must be set with CHIEF_EDITOR_NAME".into())
            }
            (Err(_), Err(_)) => None,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            upload_folder,
            host,
            port,
            notify_webhook_url,
            notify_timeout,
            chief_editor,
        })
    }
}
