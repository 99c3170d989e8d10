// CSV dictionary loading: (id, article, brand) rows -> brand -> article set
use crate::brands::BrandGroupMapper;
use crate::model::DictionaryError;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    pub total_rows: u64,
    pub valid_articles: u64,
    pub skipped_empty: u64,
    pub skipped_short: u64,
    pub skipped_malformed: u64,
}

/// Словарь артикулов: канонический бренд -> множество артикулов.
/// Строится один раз при старте и далее не изменяется.
#[derive(Debug, Default)]
pub struct ArticleDictionary {
    pub brand_articles: HashMap<String, HashSet<String>>,
    pub stats: LoadStats,
}

impl ArticleDictionary {
    pub fn brand_count(&self) -> usize {
        self.brand_articles.len()
    }

    pub fn brands(&self) -> HashSet<String> {
        self.brand_articles.keys().cloned().collect()
    }
}

/// Загрузчик CSV-словаря. Бренды канонизируются через [`BrandGroupMapper`],
/// артикулы проходят проверку минимальной длины.
pub struct DictionaryLoader {
    csv_path: PathBuf,
    /// Минимальная длина чисто цифровых артикулов.
    min_len_digits: usize,
    /// Минимальная длина артикулов, содержащих буквы.
    min_len_alphanum: usize,
}

impl DictionaryLoader {
    pub fn new(csv_path: impl AsRef<Path>, min_len_digits: usize, min_len_alphanum: usize) -> Self {
        Self {
            csv_path: csv_path.as_ref().to_path_buf(),
            min_len_digits,
            min_len_alphanum,
        }
    }

    /// Читает словарь построчно и собирает структуру бренд -> артикулы.
    /// Короткие и пустые артикулы не ошибки: они считаются и пропускаются.
    pub fn load(&self, mapper: &BrandGroupMapper) -> Result<ArticleDictionary, DictionaryError> {
        let started = Instant::now();

        if !self.csv_path.exists() {
            return Err(DictionaryError::NotFound(
                self.csv_path.display().to_string(),
            ));
        }

        info!("Loading article dictionary from {}", self.csv_path.display());

        let file = File::open(&self.csv_path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let mut dictionary = ArticleDictionary::default();

        for record in reader.records() {
            let record = record?;
            dictionary.stats.total_rows += 1;

            // Формат строки: id, артикул, бренд
            let (article, brand) = match (record.get(1), record.get(2)) {
                (Some(article), Some(brand)) => (article.trim(), brand.trim().to_uppercase()),
                _ => {
                    dictionary.stats.skipped_malformed += 1;
                    continue;
                }
            };

            if !self.validate_article(article, &mut dictionary.stats) {
                continue;
            }

            let canonical_brand = mapper.map_brand(&brand);
            dictionary
                .brand_articles
                .entry(canonical_brand)
                .or_default()
                .insert(article.to_string());
            dictionary.stats.valid_articles += 1;
        }

        info!(
            "Dictionary loaded in {:.2}s: rows={}, valid={}, brands={}, skipped_empty={}, skipped_short={}",
            started.elapsed().as_secs_f64(),
            dictionary.stats.total_rows,
            dictionary.stats.valid_articles,
            dictionary.brand_count(),
            dictionary.stats.skipped_empty,
            dictionary.stats.skipped_short,
        );

        if dictionary.brand_articles.is_empty() {
            warn!("Dictionary is empty; nothing will ever match");
        }

        Ok(dictionary)
    }

    fn validate_article(&self, article: &str, stats: &mut LoadStats) -> bool {
        if article.is_empty() {
            stats.skipped_empty += 1;
            return false;
        }

        let has_letters = article.chars().any(|ch| ch.is_alphabetic());
        let min_length = if has_letters {
            self.min_len_alphanum
        } else {
            self.min_len_digits
        };

        if article.chars().count() < min_length {
            stats.skipped_short += 1;
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn empty_mapper() -> BrandGroupMapper {
        // unloaded mapper: every brand passes through uppercased
        BrandGroupMapper::new("/nonexistent/brand_groups.json")
    }

    fn load_csv(content: &str) -> ArticleDictionary {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let loader = DictionaryLoader::new(file.path(), 3, 4);
        loader.load(&empty_mapper()).unwrap()
    }

    #[test]
    fn loads_brand_to_articles() {
        let dict = load_csv("id,article,brand\n1,YA123,yamaha\n2,YA456,YAMAHA\n3,HO789,Honda\n");
        assert_eq!(dict.brand_count(), 2);
        assert!(dict.brand_articles["YAMAHA"].contains("YA123"));
        assert!(dict.brand_articles["YAMAHA"].contains("YA456"));
        assert!(dict.brand_articles["HONDA"].contains("HO789"));
        assert_eq!(dict.stats.valid_articles, 3);
    }

    #[test]
    fn validation_minimum_lengths() {
        // "12" pure digits below 3, "A1"/"A12" alphanumeric below 4
        let dict = load_csv("id,article,brand\n1,12,X\n2,A1,X\n3,A12,X\n4,A123,X\n5,123,X\n");
        let articles = &dict.brand_articles["X"];
        assert!(!articles.contains("12"));
        assert!(!articles.contains("A1"));
        assert!(!articles.contains("A12"));
        assert!(articles.contains("A123"));
        assert!(articles.contains("123"));
        assert_eq!(dict.stats.skipped_short, 3);
        assert_eq!(dict.stats.valid_articles, 2);
    }

    #[test]
    fn empty_articles_are_counted() {
        let dict = load_csv("id,article,brand\n1,,X\n2,ABCD,X\n");
        assert_eq!(dict.stats.skipped_empty, 1);
        assert_eq!(dict.stats.valid_articles, 1);
    }

    #[test]
    fn short_rows_are_skipped() {
        let dict = load_csv("id,article,brand\n1,ABCD\n2,EFGH,X\n");
        assert_eq!(dict.stats.skipped_malformed, 1);
        assert_eq!(dict.stats.valid_articles, 1);
    }

    #[test]
    fn duplicate_article_within_brand_is_stored_once() {
        let dict = load_csv("id,article,brand\n1,YA123,YAMAHA\n2,YA123,YAMAHA\n");
        assert_eq!(dict.brand_articles["YAMAHA"].len(), 1);
    }

    #[test]
    fn same_code_under_two_brands_is_kept_in_both() {
        let dict = load_csv("id,article,brand\n1,AB1234,YAMAHA\n2,AB1234,HONDA\n");
        assert!(dict.brand_articles["YAMAHA"].contains("AB1234"));
        assert!(dict.brand_articles["HONDA"].contains("AB1234"));
    }

    #[test]
    fn synonyms_are_canonicalized() {
        let mut groups = NamedTempFile::new().unwrap();
        groups
            .write_all(br#"{"BRP": ["LYNX", "SKI-DOO"]}"#)
            .unwrap();
        let mut mapper = BrandGroupMapper::new(groups.path());
        mapper.load().unwrap();

        let mut csv_file = NamedTempFile::new().unwrap();
        csv_file
            .write_all(b"id,article,brand\n1,LX1000,lynx\n2,SD2000,Ski-Doo\n")
            .unwrap();
        let loader = DictionaryLoader::new(csv_file.path(), 3, 4);
        let dict = loader.load(&mapper).unwrap();

        assert_eq!(dict.brand_count(), 1);
        assert!(dict.brand_articles["BRP"].contains("LX1000"));
        assert!(dict.brand_articles["BRP"].contains("SD2000"));
    }

    #[test]
    fn missing_file_is_fatal() {
        let loader = DictionaryLoader::new("/nonexistent/articles.csv", 3, 4);
        assert!(matches!(
            loader.load(&empty_mapper()),
            Err(DictionaryError::NotFound(_))
        ));
    }
}
