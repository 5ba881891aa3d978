use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const CONTENT_TYPE_PDF: &str = "application/pdf";
pub const CONTENT_TYPE_PPT: &str = "application/vnd.ms-powerpoint";
pub const CONTENT_TYPE_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_notifier_capacity")]
    pub notifier_capacity: usize,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_upload_directory() -> String {
    "uploads".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_content_types() -> Vec<String> {
    vec![
        CONTENT_TYPE_PDF.to_string(),
        CONTENT_TYPE_PPT.to_string(),
        CONTENT_TYPE_PPTX.to_string(),
    ]
}

fn default_max_concurrent_jobs() -> usize {
    num_cpus::get()
}

fn default_notifier_capacity() -> usize {
    64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            upload_directory: default_upload_directory(),
            database_path: None,
            max_file_size_bytes: default_max_file_size(),
            allowed_content_types: default_allowed_content_types(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            notifier_capacity: default_notifier_capacity(),
            log_format: LogFormat::default(),
            ai: AiConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Database location, falling back to `~/.deckscore/data/deckscore.db`.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(path)),
            None => crate::db::default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Settings for the OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Corpus characters sent to the model; the rest is cut with a marker.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "llama3-8b-8192".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_input_chars() -> usize {
    24_000
}

fn default_api_key_env_var() -> Option<String> {
    Some("GROQ_API_KEY".to_string())
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_input_chars: default_max_input_chars(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Document formats the upload pipeline recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Pptx,
    /// Legacy binary PowerPoint. Recognised so it can be reported, never read.
    Ppt,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "pptx" => Some(Self::Pptx),
            "ppt" => Some(Self::Ppt),
            _ => None,
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        // Drop parameters such as "; charset=binary".
        let essence = content_type.split(';').next().unwrap_or("").trim();
        match essence.to_lowercase().as_str() {
            CONTENT_TYPE_PDF => Some(Self::Pdf),
            CONTENT_TYPE_PPTX => Some(Self::Pptx),
            CONTENT_TYPE_PPT => Some(Self::Ppt),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Pptx => "pptx",
            Self::Ppt => "ppt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => CONTENT_TYPE_PDF,
            Self::Pptx => CONTENT_TYPE_PPTX,
            Self::Ppt => CONTENT_TYPE_PPT,
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "PDF"),
            Self::Pptx => write!(f, "PPTX"),
            Self::Ppt => write!(f, "PPT"),
        }
    }
}
