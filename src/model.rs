// Core structs: Advertisement, ResolvedParts, RunStats + error taxonomy
use thiserror::Error;

/// Сырое объявление из источника данных.
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub ad_id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub characteristic: Option<String>,
}

impl Advertisement {
    /// Склеивает все текстовые поля объявления в одну строку.
    pub fn text_raw(&self) -> String {
        [&self.title, &self.description, &self.characteristic]
            .iter()
            .map(|f| f.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Per-advertisement extraction record, persisted by the result sink.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParts {
    pub ad_id: i64,
    pub text_clean: String,
    pub first_article: Option<String>,
    pub brand_near_first_article: Option<String>,
    pub all_articles: Vec<String>,
    pub all_brands: Vec<String>,
}

/// Aggregate statistics for one extraction run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub total_processed: u64,
    /// Ads where at least one article was resolved.
    pub articles_found: u64,
    /// Ads where at least one brand name matched.
    pub brands_found: u64,
    pub total_saved: u64,
    pub save_errors: u64,
    pub processing_secs: f64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("dictionary file not found: {0}")]
    NotFound(String),
    #[error("failed to read dictionary: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed dictionary row: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum MatcherBuildError {
    #[error("failed to compile pattern automaton: {0}")]
    Build(#[from] aho_corasick::BuildError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to encode result field: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dictionary(#[from] DictionaryError),
    #[error(transparent)]
    Matcher(#[from] MatcherBuildError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("automatons are not built; call build_automatons() first")]
    NotBuilt,
}
