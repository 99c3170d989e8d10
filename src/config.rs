use crate::model::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_csv_dictionary_path")]
    pub csv_dictionary_path: String,
    #[serde(default = "default_brand_groups_path")]
    pub brand_groups_path: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Минимальная длина чисто цифровых артикулов.
    #[serde(default = "default_min_article_len_digits")]
    pub min_article_len_digits: usize,
    /// Минимальная длина артикулов с буквами.
    #[serde(default = "default_min_article_len_alphanum")]
    pub min_article_len_alphanum: usize,
    #[serde(default = "default_normalizer_cache_size")]
    pub normalizer_cache_size: usize,
}

fn default_database_path() -> String {
    "data.db".to_string()
}

fn default_csv_dictionary_path() -> String {
    "data/articles_dictionary.csv".to_string()
}

fn default_brand_groups_path() -> String {
    "data/brand_groups.json".to_string()
}

fn default_batch_size() -> usize {
    1000
}

fn default_max_workers() -> usize {
    8
}

fn default_min_article_len_digits() -> usize {
    3
}

fn default_min_article_len_alphanum() -> usize {
    4
}

fn default_normalizer_cache_size() -> usize {
    10_000
}

impl Default for AppConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("empty config must deserialize")
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_apply_for_missing_fields() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"batch_size": 50}"#).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.min_article_len_digits, 3);
        assert_eq!(config.min_article_len_alphanum, 4);
        assert_eq!(config.normalizer_cache_size, 10_000);
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            load_config("/nonexistent/config.json"),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn malformed_file_is_reported() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"batch_size = 50").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
