use crate::config::Config;

pub struct PipelineConfig {
    pub allowed_content_types: Vec<String>,
    pub max_file_size_bytes: u64,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            allowed_content_types: config
                .allowed_content_types
                .iter()
                .map(|ct| ct.to_lowercase())
                .collect(),
            max_file_size_bytes: config.max_file_size_bytes,
        }
    }

    pub fn allows(&self, content_type: &str) -> bool {
        let essence = content_type.split(';').next().unwrap_or("").trim().to_lowercase();
        self.allowed_content_types.iter().any(|ct| *ct == essence)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
