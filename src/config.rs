use anyhow::{Result, anyhow};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, sourced from environment variables with a small
/// flag loop on top for the two values people override most often.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    pub api_token: Option<String>,
    pub gemini_api_key: String,
    pub model_id: String,
    pub data_dir: PathBuf,
    pub mail_endpoint: String,
    pub mail_api_key: String,
    pub mail_from: String,
    pub max_tool_rounds: usize,
    pub text_chunk_delay: Duration,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let gemini_api_key = env_opt("GEMINI_API_KEY")
            .ok_or_else(|| anyhow!("GEMINI_API_KEY is required to talk to the model"))?;

        let data_dir = env_opt("INNKEEPER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));

        let api_port = match env_opt("INNKEEPER_API_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| anyhow!("INNKEEPER_API_PORT is not a valid port: {}", raw))?,
            None => 17870,
        };

        let max_tool_rounds = match env_opt("INNKEEPER_MAX_TOOL_ROUNDS") {
            Some(raw) => raw
                .parse()
                .map_err(|_| anyhow!("INNKEEPER_MAX_TOOL_ROUNDS is not a number: {}", raw))?,
            None => 5,
        };

        let text_chunk_delay = match env_opt("INNKEEPER_TEXT_DELAY_MS") {
            Some(raw) => Duration::from_millis(
                raw.parse()
                    .map_err(|_| anyhow!("INNKEEPER_TEXT_DELAY_MS is not a number: {}", raw))?,
            ),
            None => Duration::from_millis(25),
        };

        Ok(Self {
            api_host: env_opt("INNKEEPER_API_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            api_port,
            api_token: env_opt("INNKEEPER_API_TOKEN"),
            gemini_api_key,
            model_id: env_opt("INNKEEPER_MODEL").unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            data_dir,
            mail_endpoint: env_opt("MAIL_ENDPOINT")
                .unwrap_or_else(|| "https://api.resend.com/emails".to_string()),
            mail_api_key: env_opt("MAIL_API_KEY").unwrap_or_default(),
            mail_from: env_opt("MAIL_FROM")
                .unwrap_or_else(|| "reports@innkeeper.local".to_string()),
            max_tool_rounds,
            text_chunk_delay,
        })
    }

    /// Command-line flags win over the environment.
    pub fn apply_flags(mut self, args: &[String]) -> Self {
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--api-port" => {
                    if i + 1 < args.len() {
                        self.api_port = args[i + 1].parse().unwrap_or(self.api_port);
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                "--api-host" => {
                    if i + 1 < args.len() {
                        self.api_host = args[i + 1].clone();
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        }
        self
    }
}
