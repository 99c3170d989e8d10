// Matcher module: automaton compilation and the cascade search engine.

pub mod cascade;

pub use cascade::{CascadeSearchEngine, SearchResult, SearchStats};

use crate::model::MatcherBuildError;
use aho_corasick::AhoCorasick;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

/// Multi-pattern matcher: one compiled Aho-Corasick automaton plus a payload
/// table indexed by pattern id. The default (standard) match kind is kept;
/// overlapping iteration requires it.
pub struct PatternMatcher<V> {
    automaton: AhoCorasick,
    values: Vec<V>,
}

impl<V> PatternMatcher<V> {
    /// Compiles the matcher from `(pattern, value)` pairs. Empty patterns are
    /// dropped; an empty entry set yields a matcher that matches nothing.
    pub fn build<I>(entries: I) -> Result<Self, MatcherBuildError>
    where
        I: IntoIterator<Item = (String, V)>,
    {
        let mut patterns = Vec::new();
        let mut values = Vec::new();
        for (pattern, value) in entries {
            if pattern.is_empty() {
                continue;
            }
            patterns.push(pattern);
            values.push(value);
        }

        let automaton = AhoCorasick::new(&patterns)?;
        Ok(Self { automaton, values })
    }

    /// Reports every occurrence of every pattern as `(start_offset, value)`.
    /// Search text is normalizer-produced ASCII, so byte offsets equal
    /// character positions.
    pub fn find_overlapping<'a>(
        &'a self,
        text: &'a str,
    ) -> impl Iterator<Item = (usize, &'a V)> + 'a {
        self.automaton
            .find_overlapping_iter(text)
            .map(|mat| (mat.start(), &self.values[mat.pattern().as_usize()]))
    }

    pub fn pattern_count(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Payload of an article pattern: the code together with the brand the
/// dictionary associates it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleEntry {
    pub article: String,
    pub brand: String,
}

/// Автомат брендов: паттерн совпадает со значением.
pub type BrandMatcher = PatternMatcher<String>;
/// Автомат артикулов одного бренда.
pub type ArticleMatcher = PatternMatcher<ArticleEntry>;

#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub brands_count: usize,
    pub articles_count: usize,
    pub build_secs: f64,
}

/// Построитель автоматов поиска из словаря артикулов.
pub struct AutomatonBuilder {
    pub stats: BuildStats,
}

impl AutomatonBuilder {
    pub fn new() -> Self {
        Self {
            stats: BuildStats::default(),
        }
    }

    /// Компилирует автомат брендов: каждый бренд ищется как есть.
    pub fn build_brand_matcher(
        &mut self,
        brands: &HashSet<String>,
    ) -> Result<BrandMatcher, MatcherBuildError> {
        let started = Instant::now();
        info!("Building brand automaton: {} patterns", brands.len());

        let matcher = PatternMatcher::build(
            brands.iter().map(|brand| (brand.clone(), brand.clone())),
        )?;

        self.stats.brands_count = matcher.pattern_count();
        info!(
            "Brand automaton built in {:.2}s",
            started.elapsed().as_secs_f64()
        );
        Ok(matcher)
    }

    /// Компилирует автомат артикулов одного бренда. Дубликаты внутри бренда
    /// вставляются один раз.
    pub fn build_article_matcher(
        &mut self,
        brand: &str,
        articles: &HashSet<String>,
    ) -> Result<ArticleMatcher, MatcherBuildError> {
        debug!("Building article automaton for {brand}: {} codes", articles.len());

        let mut inserted = HashSet::new();
        let matcher = PatternMatcher::build(articles.iter().filter_map(|article| {
            if article.is_empty() || !inserted.insert(article.as_str()) {
                return None;
            }
            Some((
                article.clone(),
                ArticleEntry {
                    article: article.clone(),
                    brand: brand.to_string(),
                },
            ))
        }))?;

        self.stats.articles_count += matcher.pattern_count();
        Ok(matcher)
    }

    /// Компилирует автоматы для всех брендов словаря; бренды без артикулов
    /// автомата не получают и на втором этапе каскада не ищутся.
    pub fn build_all(
        &mut self,
        brand_articles: &HashMap<String, HashSet<String>>,
    ) -> Result<HashMap<String, ArticleMatcher>, MatcherBuildError> {
        let started = Instant::now();
        info!("Building article automatons for {} brands", brand_articles.len());

        let mut matchers = HashMap::new();
        for (brand, articles) in brand_articles {
            if articles.is_empty() {
                continue;
            }
            matchers.insert(brand.clone(), self.build_article_matcher(brand, articles)?);
        }

        self.stats.build_secs = started.elapsed().as_secs_f64();
        info!(
            "Built {} article automatons in {:.2}s, {} codes total",
            matchers.len(),
            self.stats.build_secs,
            self.stats.articles_count
        );
        Ok(matchers)
    }
}

impl Default for AutomatonBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn brand_matcher_maps_pattern_to_itself() {
        let mut builder = AutomatonBuilder::new();
        let matcher = builder
            .build_brand_matcher(&set(&["YAMAHA", "HONDA"]))
            .unwrap();

        let hits: Vec<_> = matcher.find_overlapping("FILTR YAMAHA ORIGINAL").collect();
        assert_eq!(hits, vec![(6, &"YAMAHA".to_string())]);
    }

    #[test]
    fn empty_pattern_set_matches_nothing() {
        let mut builder = AutomatonBuilder::new();
        let matcher = builder.build_brand_matcher(&HashSet::new()).unwrap();
        assert!(matcher.is_empty());
        assert_eq!(matcher.find_overlapping("ANY TEXT AT ALL").count(), 0);
    }

    #[test]
    fn empty_brand_strings_are_dropped() {
        let mut builder = AutomatonBuilder::new();
        let matcher = builder.build_brand_matcher(&set(&["", "HONDA"])).unwrap();
        assert_eq!(matcher.pattern_count(), 1);
    }

    #[test]
    fn article_matcher_carries_code_and_brand() {
        let mut builder = AutomatonBuilder::new();
        let matcher = builder
            .build_article_matcher("YAMAHA", &set(&["YA123"]))
            .unwrap();

        let hits: Vec<_> = matcher.find_overlapping("ARTIKUL YA123").collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 8);
        assert_eq!(
            hits[0].1,
            &ArticleEntry {
                article: "YA123".into(),
                brand: "YAMAHA".into()
            }
        );
    }

    #[test]
    fn overlapping_matches_are_all_reported() {
        let mut builder = AutomatonBuilder::new();
        let matcher = builder
            .build_article_matcher("X", &set(&["AB12", "AB123"]))
            .unwrap();

        let mut codes: Vec<_> = matcher
            .find_overlapping("CODE AB123 HERE")
            .map(|(start, entry)| (start, entry.article.clone()))
            .collect();
        codes.sort();
        assert_eq!(codes, vec![(5, "AB12".into()), (5, "AB123".into())]);
    }

    #[test]
    fn build_all_skips_brands_without_articles() {
        let mut builder = AutomatonBuilder::new();
        let mut dict = HashMap::new();
        dict.insert("YAMAHA".to_string(), set(&["YA123"]));
        dict.insert("EMPTY".to_string(), HashSet::new());

        let matchers = builder.build_all(&dict).unwrap();
        assert!(matchers.contains_key("YAMAHA"));
        assert!(!matchers.contains_key("EMPTY"));
        assert_eq!(builder.stats.articles_count, 1);
    }
}
