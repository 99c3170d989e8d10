// Группировка брендов-синонимов: ski-doo = SKIDOO = SKI DOO -> BRP
use crate::model::ConfigError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Ключ сравнения бренда: UPPER + удаление дефисов и пробелов.
pub fn brand_comparison_key(brand: &str) -> String {
    brand
        .to_uppercase()
        .chars()
        .filter(|ch| *ch != '-' && *ch != ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Maps raw brand labels to their canonical spelling, driven by a JSON file
/// of the form `{"BRP": ["LYNX", "CAN-AM", "SKI-DOO"]}`.
///
/// The canonical name is not implicitly a synonym of itself; list it if the
/// dictionary contains it verbatim.
pub struct BrandGroupMapper {
    config_path: PathBuf,
    groups: HashMap<String, Vec<String>>,
    synonym_to_canonical: HashMap<String, String>,
}

impl BrandGroupMapper {
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            groups: HashMap::new(),
            synonym_to_canonical: HashMap::new(),
        }
    }

    /// Загружает конфигурацию групп брендов и строит обратный индекс.
    pub fn load(&mut self) -> Result<(), ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(
                self.config_path.display().to_string(),
            ));
        }

        let content = fs::read_to_string(&self.config_path)?;
        self.groups = serde_json::from_str(&content)?;
        self.rebuild_reverse_index();

        info!(
            "Loaded {} brand groups ({} synonyms) from {}",
            self.group_count(),
            self.synonym_count(),
            self.config_path.display()
        );
        Ok(())
    }

    fn rebuild_reverse_index(&mut self) {
        self.synonym_to_canonical.clear();
        for (canonical, synonyms) in &self.groups {
            for synonym in synonyms {
                self.synonym_to_canonical
                    .insert(brand_comparison_key(synonym), canonical.to_uppercase());
            }
        }
    }

    /// Возвращает канонический бренд; неизвестные бренды проходят без замены,
    /// только в верхнем регистре.
    pub fn map_brand(&self, brand: &str) -> String {
        if brand.is_empty() {
            return String::new();
        }

        match self.synonym_to_canonical.get(&brand_comparison_key(brand)) {
            Some(canonical) => canonical.clone(),
            None => brand.to_uppercase().trim().to_string(),
        }
    }

    /// Полная перезагрузка таблицы из того же файла.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        info!("Reloading brand groups configuration");
        self.load()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn synonym_count(&self) -> usize {
        self.synonym_to_canonical.len()
    }
}
