use config::Config;
use lazy_static::lazy_static;
use serde::Deserialize;
use std::{env, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub email_max_age_days: i64,
    pub reply_sweep_schedule: String,
    pub follow_up_tick_schedule: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutomationLimits {
    pub max_send_attempts: i32,
    pub backoff_base_secs: i64,
    pub backoff_cap_secs: i64,
    pub max_concurrent_sends: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendLimits {
    pub rate_limit_per_sec: usize,
    pub refill_interval_ms: usize,
    pub refill_amount: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SafetyConfig {
    pub blocked_sender_keywords: Vec<String>,
    pub blocked_sender_domains: Vec<String>,
    pub auto_generated_subject_phrases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    settings: Settings,
    automation: AutomationLimits,
    send_limits: SendLimits,
    safety: SafetyConfig,
}

#[derive(Debug)]
pub struct ServerConfig {
    pub settings: Settings,
    pub automation: AutomationLimits,
    pub send_limits: SendLimits,
    pub safety: SafetyConfig,
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Server Config:\n{:?}\n\nAutomation: {:?}\n\nSend Limits: {:?}\n\nSafety:\n{}",
            self.settings,
            self.automation,
            self.send_limits,
            self.safety
                .blocked_sender_keywords
                .iter()
                .chain(self.safety.blocked_sender_domains.iter())
                .cloned()
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

lazy_static! {
    pub static ref cfg: ServerConfig = {
        let root = env::var("APP_DIR").unwrap_or_else(|_| {
            let dir =
                env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR or APP_DIR is required");
            let dir = Path::new(&dir).parent().unwrap().display().to_string();
            format!("{}/config", dir)
        });
        let path = format!("{root}/config.toml");
        let cfg_file: ConfigFile = Config::builder()
            .add_source(config::File::with_name(&path))
            .build()
            .expect("config.toml is required")
            .try_deserialize()
            .expect("config.toml is invalid");

        let ConfigFile {
            settings,
            automation,
            send_limits,
            safety,
        } = cfg_file;

        ServerConfig {
            settings,
            automation,
            send_limits,
            safety,
        }
    };
}
