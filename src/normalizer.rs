// Нормализация текстов объявлений для поиска артикулов
use parking_lot::Mutex;
use std::collections::HashMap;

/// Замена кириллицы на латиницу: артикулы пишут смешанными алфавитами.
/// Таблица регистрозависимая; мягкий и твёрдый знаки удаляются.
fn transliterate_char(ch: char) -> Option<&'static str> {
    let latin = match ch {
        'А' => "A", 'В' => "B", 'Е' => "E", 'К' => "K", 'М' => "M", 'Н' => "H",
        'О' => "O", 'Р' => "P", 'С' => "C", 'Т' => "T", 'У' => "Y", 'Х' => "X",
        'Я' => "Y", 'И' => "I", 'Й' => "I", 'Ю' => "U", 'Ё' => "E", 'Ч' => "C",
        'Ш' => "S", 'Щ' => "S", 'Ж' => "Z", 'З' => "Z", 'Ц' => "C", 'Ь' => "", 'Ъ' => "",
        'Г' => "G", 'Д' => "D", 'Л' => "L", 'П' => "P", 'Ф' => "F", 'Б' => "B",
        'а' => "a", 'б' => "b", 'в' => "v", 'г' => "g", 'д' => "d", 'е' => "e",
        'ё' => "e", 'ж' => "z", 'з' => "z", 'и' => "i", 'й' => "i", 'к' => "k",
        'л' => "l", 'м' => "m", 'н' => "n", 'о' => "o", 'п' => "p", 'р' => "r",
        'с' => "s", 'т' => "t", 'у' => "u", 'ф' => "f", 'х' => "x", 'ц' => "c",
        'ч' => "c", 'ш' => "s", 'щ' => "s", 'ъ' => "", 'ы' => "y", 'ь' => "",
        'э' => "e", 'ю' => "u", 'я' => "y",
        _ => return None,
    };
    Some(latin)
}

fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match transliterate_char(ch) {
            Some(latin) => out.push_str(latin),
            None => out.push(ch),
        }
    }
    out
}

fn normalize(text: &str, keep_hyphens: bool) -> String {
    if text.is_empty() {
        return String::new();
    }

    // Транслитерация строго ДО приведения к верхнему регистру.
    let upper = transliterate(text).to_uppercase();

    let cleaned: String = upper
        .chars()
        .map(|ch| {
            if ch == '-' {
                if keep_hyphens { '-' } else { ' ' }
            } else if ch.is_ascii_alphanumeric() || ch.is_whitespace() {
                ch
            } else {
                ' '
            }
        })
        .collect();

    // Схлопываем пробельные последовательности в одиночные пробелы и обрезаем края.
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical uppercase ASCII form used by the cascade search. Hyphens become
/// spaces so that `ABC-123` and `ABC 123` match identically.
pub fn normalize_for_search(text: &str) -> String {
    normalize(text, false)
}

/// Same pipeline, but hyphens survive into the output. Used for values that
/// go to the database in their display form.
pub fn normalize_for_storage(text: &str) -> String {
    normalize(text, true)
}

/// Memoizing wrapper around [`normalize_for_search`]. The cache never holds
/// more than `capacity` entries; on overflow it is flushed wholesale.
pub struct TextNormalizer {
    capacity: usize,
    cache: Mutex<HashMap<String, String>>,
}

impl TextNormalizer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn normalize_for_search(&self, text: &str) -> String {
        if let Some(hit) = self.cache.lock().get(text) {
            return hit.clone();
        }

        let normalized = normalize_for_search(text);

        let mut cache = self.cache.lock();
        if cache.len() >= self.capacity {
            cache.clear();
        }
        cache.insert(text.to_owned(), normalized.clone());
        normalized
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().len()
    }
}
