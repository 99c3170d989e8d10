// Main extraction engine: dictionary -> automatons -> batched cascade search.
use crate::config::AppConfig;
use crate::brands::BrandGroupMapper;
use crate::dictionary::{ArticleDictionary, DictionaryLoader};
use crate::matcher::{AutomatonBuilder, CascadeSearchEngine};
use crate::model::{Advertisement, EngineError, ResolvedParts, RunStats};
use crate::normalizer::TextNormalizer;
use crate::storage::{AdSource, ResultSink};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Orchestrates the full extraction cycle. The build phase
/// ([`load_dictionary`](Self::load_dictionary) then
/// [`build_automatons`](Self::build_automatons)) must complete before
/// [`process`](Self::process); the compiled matchers are then shared
/// read-only across worker tasks.
pub struct ExtractionEngine {
    config: AppConfig,
    normalizer: Arc<TextNormalizer>,
    dictionary: Option<ArticleDictionary>,
    cascade: Option<Arc<CascadeSearchEngine>>,
    stats: RunStats,
}

impl ExtractionEngine {
    pub fn new(config: AppConfig) -> Self {
        let normalizer = Arc::new(TextNormalizer::new(config.normalizer_cache_size));
        Self {
            config,
            normalizer,
            dictionary: None,
            cascade: None,
            stats: RunStats::default(),
        }
    }

    /// Загрузка словаря артикулов и групп брендов.
    pub fn load_dictionary(&mut self) -> Result<(), EngineError> {
        let mut mapper = BrandGroupMapper::new(&self.config.brand_groups_path);
        mapper.load()?;

        let loader = DictionaryLoader::new(
            &self.config.csv_dictionary_path,
            self.config.min_article_len_digits,
            self.config.min_article_len_alphanum,
        );
        let dictionary = loader.load(&mapper)?;

        info!(
            "Dictionary ready: {} brands, {} articles",
            dictionary.brand_count(),
            dictionary.stats.valid_articles
        );
        self.dictionary = Some(dictionary);
        Ok(())
    }

    /// Построение автоматов поиска. Автоматы всегда строятся заново из
    /// словаря текущего запуска; кеширование между запусками отсутствует.
    pub fn build_automatons(&mut self) -> Result<(), EngineError> {
        let dictionary = self.dictionary.as_ref().ok_or(EngineError::NotBuilt)?;

        let mut builder = AutomatonBuilder::new();
        let brand_matcher = builder.build_brand_matcher(&dictionary.brands())?;
        let article_matchers = builder.build_all(&dictionary.brand_articles)?;

        let mut cascade = CascadeSearchEngine::new();
        cascade.set_matchers(brand_matcher, article_matchers);
        self.cascade = Some(Arc::new(cascade));
        Ok(())
    }

    /// Основной цикл: выбирает необработанные объявления батчами, ищет
    /// артикулы и сохраняет результаты. Ошибка сохранения одного батча не
    /// останавливает обработку остальных.
    pub async fn process<S, K>(
        &mut self,
        source: &S,
        sink: &K,
        limit: Option<u64>,
    ) -> Result<RunStats, EngineError>
    where
        S: AdSource,
        K: ResultSink,
    {
        let cascade = self.cascade.clone().ok_or(EngineError::NotBuilt)?;
        let started = Instant::now();

        let mut total = source.count_unprocessed().await?;
        if let Some(limit) = limit {
            total = total.min(limit);
        }
        info!(
            "Starting extraction: {} ads to process (batch_size={}, workers={})",
            total, self.config.batch_size, self.config.max_workers
        );

        let mut last_id = i64::MIN;
        let mut batch_num = 0u64;

        loop {
            let remaining = match limit {
                Some(limit) => limit.saturating_sub(self.stats.total_processed) as usize,
                None => self.config.batch_size,
            };
            let batch_limit = remaining.min(self.config.batch_size);
            if batch_limit == 0 {
                break;
            }

            let batch = source.fetch_unprocessed_batch(last_id, batch_limit).await?;
            if batch.is_empty() {
                break;
            }
            batch_num += 1;
            last_id = batch.last().map(|ad| ad.ad_id).unwrap_or(last_id);

            let records = self.process_batch(batch, &cascade).await;

            self.stats.total_processed += records.len() as u64;
            for record in &records {
                if record.first_article.is_some() {
                    self.stats.articles_found += 1;
                }
                if !record.all_brands.is_empty() {
                    self.stats.brands_found += 1;
                }
            }

            match sink.save_results(&records).await {
                Ok(saved) => self.stats.total_saved += saved as u64,
                Err(e) => {
                    // Частичное сохранение лучше полного отказа.
                    error!("Failed to save batch {batch_num}: {e}");
                    self.stats.save_errors += records.len() as u64;
                }
            }

            if batch_num % 10 == 0 {
                let elapsed = started.elapsed().as_secs_f64();
                let speed = self.stats.total_processed as f64 / elapsed.max(f64::EPSILON);
                info!(
                    "Progress: {}/{} ({speed:.1} ads/sec)",
                    self.stats.total_processed, total
                );
            }
        }

        self.stats.processing_secs = started.elapsed().as_secs_f64();

        let totals = cascade.totals();
        info!(
            "Extraction finished in {:.1}s: processed={}, with_articles={}, with_brands={}, saved={}, save_errors={}",
            self.stats.processing_secs,
            self.stats.total_processed,
            self.stats.articles_found,
            self.stats.brands_found,
            self.stats.total_saved,
            self.stats.save_errors
        );
        info!(
            "Cascade totals: searches={}, brands={}, articles={}, time={}ms",
            totals.searches, totals.brands_found, totals.articles_found, totals.time_ms
        );

        Ok(self.stats.clone())
    }

    /// Обрабатывает один батч, распределяя объявления между рабочими задачами.
    async fn process_batch(
        &self,
        ads: Vec<Advertisement>,
        cascade: &Arc<CascadeSearchEngine>,
    ) -> Vec<ResolvedParts> {
        let batch_len = ads.len();
        let chunk_size = batch_len.div_ceil(self.config.max_workers.max(1)).max(1);

        let tasks: Vec<_> = ads
            .chunks(chunk_size)
            .map(|chunk| {
                let chunk = chunk.to_vec();
                let cascade = Arc::clone(cascade);
                let normalizer = Arc::clone(&self.normalizer);
                tokio::task::spawn_blocking(move || {
                    chunk
                        .into_iter()
                        .map(|ad| resolve_ad(ad, &normalizer, &cascade))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut records = Vec::with_capacity(batch_len);
        for joined in join_all(tasks).await {
            match joined {
                Ok(mut chunk_records) => records.append(&mut chunk_records),
                Err(e) => error!("Worker task failed: {e}"),
            }
        }
        records
    }
}

/// Нормализует текст объявления и выполняет каскадный поиск.
fn resolve_ad(
    ad: Advertisement,
    normalizer: &TextNormalizer,
    cascade: &CascadeSearchEngine,
) -> ResolvedParts {
    let text_clean = normalizer.normalize_for_search(&ad.text_raw());
    let search = cascade.search(&text_clean);

    ResolvedParts {
        ad_id: ad.ad_id,
        text_clean,
        first_article: search.first_article,
        brand_near_first_article: search.brand_near_first_article,
        all_articles: search.all_articles,
        all_brands: search.all_brands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SharedStorage, SqliteStorage};
    use tempfile::tempdir;

    fn test_config(dir: &std::path::Path) -> AppConfig {
        let csv_path = dir.join("articles.csv");
        std::fs::write(
            &csv_path,
            "id,article,brand\n1,YA123,yamaha\n2,HO789,honda\n3,LX1000,lynx\n",
        )
        .unwrap();

        let groups_path = dir.join("brand_groups.json");
        std::fs::write(&groups_path, r#"{"BRP": ["LYNX"]}"#).unwrap();

        AppConfig {
            database_path: dir.join("test.db").display().to_string(),
            csv_dictionary_path: csv_path.display().to_string(),
            brand_groups_path: groups_path.display().to_string(),
            batch_size: 2,
            max_workers: 2,
            ..AppConfig::default()
        }
    }

    fn seed_ads(storage: &SqliteStorage) {
        let ads = [
            (1, "Продаю фильтр YAMAHA, артикул YA123, оригинал"),
            (2, "Запчасти honda HO789 и немного текста"),
            (3, "Объявление без брендов и артикулов"),
            (4, "Гусеница LYNX LX1000 новая"),
        ];
        for (ad_id, title) in ads {
            storage
                .insert_advertisement(&Advertisement {
                    ad_id,
                    title: Some(title.to_string()),
                    description: None,
                    characteristic: None,
                })
                .unwrap();
        }
    }

    #[tokio::test]
    async fn full_extraction_cycle() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        let storage = SqliteStorage::new(&config.database_path).unwrap();
        seed_ads(&storage);
        let shared = SharedStorage::new(storage);

        let mut engine = ExtractionEngine::new(config);
        engine.load_dictionary().unwrap();
        engine.build_automatons().unwrap();

        let stats = engine.process(&shared, &shared, None).await.unwrap();
        assert_eq!(stats.total_processed, 4);
        assert_eq!(stats.total_saved, 4);
        assert_eq!(stats.save_errors, 0);
        // ads 1 and 2 carry both a brand and an article; ad 4 mentions LYNX
        // but the brand automaton only knows the canonical BRP spelling
        assert_eq!(stats.articles_found, 2);
        assert_eq!(stats.brands_found, 2);

        let guard = shared.lock().await;
        let first = guard.get_resolved(1).unwrap().unwrap();
        assert_eq!(first.first_article.as_deref(), Some("YA123"));
        assert_eq!(first.brand_near_first_article.as_deref(), Some("YAMAHA"));

        // LYNX is canonicalized to BRP during dictionary load, so the
        // brand automaton only knows BRP, while the ad says LYNX
        let lynx = guard.get_resolved(4).unwrap().unwrap();
        assert_eq!(lynx.first_article, None);
        assert!(lynx.all_brands.is_empty());

        let untouched = guard.get_resolved(3).unwrap().unwrap();
        assert_eq!(untouched.first_article, None);
        assert!(untouched.all_brands.is_empty());
        assert_eq!(guard.count_unprocessed().unwrap(), 0);
    }

    #[tokio::test]
    async fn limit_caps_processing() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        let storage = SqliteStorage::new(&config.database_path).unwrap();
        seed_ads(&storage);
        let shared = SharedStorage::new(storage);

        let mut engine = ExtractionEngine::new(config);
        engine.load_dictionary().unwrap();
        engine.build_automatons().unwrap();

        let stats = engine.process(&shared, &shared, Some(3)).await.unwrap();
        assert_eq!(stats.total_processed, 3);
        assert_eq!(shared.lock().await.count_unprocessed().unwrap(), 1);
    }

    #[tokio::test]
    async fn process_before_build_is_refused() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        let storage = SqliteStorage::new(&config.database_path).unwrap();
        let shared = SharedStorage::new(storage);

        let mut engine = ExtractionEngine::new(config);
        let result = engine.process(&shared, &shared, None).await;
        assert!(matches!(result, Err(EngineError::NotBuilt)));
    }

    #[test]
    fn build_before_load_is_refused() {
        let mut engine = ExtractionEngine::new(AppConfig::default());
        assert!(matches!(
            engine.build_automatons(),
            Err(EngineError::NotBuilt)
        ));
    }
}
