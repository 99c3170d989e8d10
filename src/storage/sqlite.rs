use crate::model::{Advertisement, ResolvedParts, StorageError};
use chrono::Utc;
use rusqlite::{params, Connection, Row};

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Создаёт новое хранилище, открывая соединение к БД и выполняя миграции
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS advertisements (
                ad_id INTEGER PRIMARY KEY,
                title TEXT,
                description TEXT,
                characteristic TEXT
            );

            CREATE TABLE IF NOT EXISTS parts_resolved (
                ad_id INTEGER PRIMARY KEY,
                text_clean TEXT NOT NULL DEFAULT '',
                first_article TEXT,
                brand_near_first_article TEXT,
                all_articles TEXT NOT NULL DEFAULT '[]',
                all_brands TEXT NOT NULL DEFAULT '[]',
                processed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_parts_resolved_first_article
                ON parts_resolved(first_article);
            CREATE INDEX IF NOT EXISTS idx_parts_resolved_brand
                ON parts_resolved(brand_near_first_article);
            ",
        )?;

        Ok(Self { conn })
    }

    /// Сохраняет объявление в таблице advertisements.
    pub fn insert_advertisement(&self, ad: &Advertisement) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO advertisements (ad_id, title, description, characteristic)
             VALUES (?1, ?2, ?3, ?4)",
            params![&ad.ad_id, &ad.title, &ad.description, &ad.characteristic],
        )?;
        Ok(())
    }

    pub fn count_advertisements(&self) -> Result<u64, StorageError> {
        let count =
            self.conn
                .query_row("SELECT COUNT(*) FROM advertisements", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_resolved(&self) -> Result<u64, StorageError> {
        let count =
            self.conn
                .query_row("SELECT COUNT(*) FROM parts_resolved", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Количество объявлений, для которых ещё нет результата.
    pub fn count_unprocessed(&self) -> Result<u64, StorageError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM advertisements a
             WHERE NOT EXISTS (SELECT 1 FROM parts_resolved r WHERE r.ad_id = a.ad_id)",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Возвращает очередной батч необработанных объявлений.
    /// Пагинация по ключу: ad_id строго больше переданного.
    pub fn fetch_unprocessed_batch(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<Advertisement>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.ad_id, a.title, a.description, a.characteristic
             FROM advertisements a
             WHERE a.ad_id > ?1
               AND NOT EXISTS (SELECT 1 FROM parts_resolved r WHERE r.ad_id = a.ad_id)
             ORDER BY a.ad_id
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![after_id, limit as i64], |row| {
            Self::map_advertisement(row)
        })?;

        let mut ads = Vec::new();
        for ad in rows {
            ads.push(ad?);
        }
        Ok(ads)
    }

    /// Сохраняет (вставляет или обновляет) батч результатов одной транзакцией.
    /// Списки артикулов и брендов хранятся как JSON-текст.
    pub fn save_results(&mut self, records: &[ResolvedParts]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }

        let processed_at = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO parts_resolved (
                    ad_id, text_clean, first_article, brand_near_first_article,
                    all_articles, all_brands, processed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for record in records {
                stmt.execute(params![
                    &record.ad_id,
                    &record.text_clean,
                    &record.first_article,
                    &record.brand_near_first_article,
                    serde_json::to_string(&record.all_articles)?,
                    serde_json::to_string(&record.all_brands)?,
                    &processed_at,
                ])?;
            }
        }
        tx.commit()?;

        Ok(records.len())
    }

    /// Читает сохранённый результат по идентификатору объявления.
    pub fn get_resolved(&self, ad_id: i64) -> Result<Option<ResolvedParts>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT ad_id, text_clean, first_article, brand_near_first_article,
                    all_articles, all_brands
             FROM parts_resolved WHERE ad_id = ?1",
        )?;

        let mut rows = stmt.query(params![ad_id])?;
        match rows.next()? {
            Some(row) => {
                let all_articles: String = row.get(4)?;
                let all_brands: String = row.get(5)?;
                Ok(Some(ResolvedParts {
                    ad_id: row.get(0)?,
                    text_clean: row.get(1)?,
                    first_article: row.get(2)?,
                    brand_near_first_article: row.get(3)?,
                    all_articles: serde_json::from_str(&all_articles)?,
                    all_brands: serde_json::from_str(&all_brands)?,
                }))
            }
            None => Ok(None),
        }
    }

    fn map_advertisement(row: &Row) -> Result<Advertisement, rusqlite::Error> {
        Ok(Advertisement {
            ad_id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            characteristic: row.get(3)?,
        })
    }
}
