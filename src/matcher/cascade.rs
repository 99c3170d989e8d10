// Каскадный поиск: сначала бренды, затем артикулы только найденных брендов.
use crate::matcher::{ArticleMatcher, BrandMatcher};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Per-call search statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub brands_found: usize,
    pub articles_found: usize,
    pub search_time_ms: u64,
}

/// Результат каскадного поиска по одному тексту.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    /// Первый артикул по позиции в тексте.
    pub first_article: Option<String>,
    /// Бренд первого артикула ИЗ СЛОВАРЯ, не ближайший по тексту.
    pub brand_near_first_article: Option<String>,
    /// Все найденные артикулы в порядке позиций (повторы допустимы).
    pub all_articles: Vec<String>,
    /// Все бренды, чьё имя встретилось в тексте, отсортированы.
    pub all_brands: Vec<String>,
    pub stats: SearchStats,
}

/// Engine-level running totals. Shared by reference across worker tasks;
/// relaxed ordering is enough, the numbers are monitoring-only.
#[derive(Debug, Default)]
pub struct EngineTotals {
    searches: AtomicU64,
    brands_found: AtomicU64,
    articles_found: AtomicU64,
    time_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TotalsSnapshot {
    pub searches: u64,
    pub brands_found: u64,
    pub articles_found: u64,
    pub time_ms: u64,
}

impl EngineTotals {
    fn record(&self, stats: &SearchStats) {
        self.searches.fetch_add(1, Ordering::Relaxed);
        self.brands_found
            .fetch_add(stats.brands_found as u64, Ordering::Relaxed);
        self.articles_found
            .fetch_add(stats.articles_found as u64, Ordering::Relaxed);
        self.time_ms.fetch_add(stats.search_time_ms, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TotalsSnapshot {
        TotalsSnapshot {
            searches: self.searches.load(Ordering::Relaxed),
            brands_found: self.brands_found.load(Ordering::Relaxed),
            articles_found: self.articles_found.load(Ordering::Relaxed),
            time_ms: self.time_ms.load(Ordering::Relaxed),
        }
    }
}

/// Движок каскадного поиска. После [`set_matchers`](Self::set_matchers)
/// автоматы только читаются, поэтому движок можно разделять между
/// потоками без блокировок.
pub struct CascadeSearchEngine {
    brand_matcher: Option<BrandMatcher>,
    article_matchers: HashMap<String, ArticleMatcher>,
    totals: EngineTotals,
}

impl CascadeSearchEngine {
    pub fn new() -> Self {
        Self {
            brand_matcher: None,
            article_matchers: HashMap::new(),
            totals: EngineTotals::default(),
        }
    }

    /// Устанавливает скомпилированные автоматы из [`AutomatonBuilder`].
    pub fn set_matchers(
        &mut self,
        brand_matcher: BrandMatcher,
        article_matchers: HashMap<String, ArticleMatcher>,
    ) {
        debug!(
            "Matchers installed: {} brands, {} article automatons",
            brand_matcher.pattern_count(),
            article_matchers.len()
        );
        self.brand_matcher = Some(brand_matcher);
        self.article_matchers = article_matchers;
    }

    /// Этап 1: все вхождения брендов с позициями.
    fn search_brands(&self, text: &str) -> HashMap<String, Vec<usize>> {
        let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
        let Some(matcher) = &self.brand_matcher else {
            return positions;
        };

        for (start, brand) in matcher.find_overlapping(text) {
            positions.entry(brand.clone()).or_default().push(start);
        }
        positions
    }

    /// Этап 2: артикулы только найденных брендов.
    fn search_articles(
        &self,
        text: &str,
        found_brands: &[&String],
    ) -> Vec<(usize, String, String)> {
        let mut matches = Vec::new();

        for brand in found_brands {
            let Some(matcher) = self.article_matchers.get(*brand) else {
                debug!("No article automaton for brand {brand}");
                continue;
            };

            for (start, entry) in matcher.find_overlapping(text) {
                matches.push((start, entry.article.clone(), entry.brand.clone()));
            }
        }

        // Первый артикул определяется позицией; вторичный ключ по коду
        // делает порядок при равных позициях детерминированным.
        matches.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        matches
    }

    /// Основной метод каскадного поиска по нормализованному тексту.
    pub fn search(&self, text: &str) -> SearchResult {
        let started = Instant::now();
        let mut result = SearchResult::default();

        if self.brand_matcher.is_none() {
            warn!("Brand automaton is not installed; returning empty result");
            return result;
        }

        let brand_positions = self.search_brands(text);
        let mut found_brands: Vec<&String> = brand_positions.keys().collect();
        found_brands.sort();

        result.all_brands = found_brands.iter().map(|b| b.to_string()).collect();
        result.stats.brands_found = found_brands.len();

        if found_brands.is_empty() {
            debug!("No brands in text, skipping article search");
            result.stats.search_time_ms = started.elapsed().as_millis() as u64;
            self.totals.record(&result.stats);
            return result;
        }

        let articles = self.search_articles(text, &found_brands);

        if let Some((_, first_article, first_brand)) = articles.first() {
            result.first_article = Some(first_article.clone());
            result.brand_near_first_article = Some(first_brand.clone());
        }
        result.all_articles = articles.iter().map(|(_, article, _)| article.clone()).collect();
        result.stats.articles_found = articles.len();

        result.stats.search_time_ms = started.elapsed().as_millis() as u64;
        self.totals.record(&result.stats);

        debug!(
            "Search done in {}ms: brands={}, articles={}",
            result.stats.search_time_ms,
            result.stats.brands_found,
            result.stats.articles_found
        );
        result
    }

    /// Накопленная статистика движка за время работы.
    pub fn totals(&self) -> TotalsSnapshot {
        self.totals.snapshot()
    }
}

impl Default for CascadeSearchEngine {
    fn default() -> Self {
        Self::new()
    }
}
