//! Translation catalogs: one flat JSON object per language under `i18n/`,
//! with English as the fallback for missing files, keys and empty values.

use crate::assets::AssetSource;
use crate::prefs::{Preferences, DEFAULT_LANG};
use crate::site;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub type Catalog = HashMap<String, String>;

/// An element carrying a `data-i18n` key and its current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub key: String,
    pub text: String,
}

impl TextNode {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self { key: key.into(), text: text.into() }
    }
}

pub struct Translator {
    assets: Arc<dyn AssetSource>,
    pathname: String,
    cache: Mutex<HashMap<String, Arc<Catalog>>>,
    prefs: Option<Arc<Preferences>>,
}

impl Translator {
    pub fn new(assets: Arc<dyn AssetSource>, pathname: impl Into<String>) -> Self {
        Self { assets, pathname: pathname.into(), cache: Mutex::new(HashMap::new()), prefs: None }
    }

    /// Remember the applied language in the preference store.
    pub fn with_preferences(mut self, prefs: Arc<Preferences>) -> Self {
        self.prefs = Some(prefs);
        self
    }

    /// Page-relative URL of a catalog, e.g. `../i18n/de.json` from a subdirectory page.
    pub fn catalog_url(&self, lang: &str) -> String {
        format!("{}i18n/{}.json", site::base_path(&self.pathname), lang)
    }

    /// Loads and caches a catalog. Missing or unreadable files yield `None` and are retried next time.
    pub async fn load(&self, lang: &str) -> Option<Arc<Catalog>> {
        if let Some(c) = self.cache.lock().ok().and_then(|m| m.get(lang).cloned()) {
            return Some(c);
        }
        let path = site::resolve(&self.pathname, &self.catalog_url(lang));
        let text = match self.assets.fetch(&path).await {
            Ok(Some(t)) => t,
            Ok(None) => {
                eprintln!("⚠️  [i18n] Translation file not found for: {}", lang);
                return None;
            }
            Err(e) => {
                eprintln!("⚠️  [i18n] Error loading translations for {}: {}", lang, e);
                return None;
            }
        };
        let catalog = match parse_catalog(&text) {
            Some(c) => Arc::new(c),
            None => {
                eprintln!("⚠️  [i18n] {} is not a flat JSON object", path);
                return None;
            }
        };
        if let Ok(mut m) = self.cache.lock() {
            m.insert(lang.to_string(), catalog.clone());
        }
        Some(catalog)
    }

    /// Looks `key` up in `lang`, then English. Empty strings count as missing.
    pub async fn translate(&self, lang: &str, key: &str) -> Option<String> {
        let (primary, fallback) = self.catalogs(lang).await;
        lookup(primary.as_deref(), fallback.as_deref(), key).map(str::to_string)
    }

    async fn catalogs(&self, lang: &str) -> (Option<Arc<Catalog>>, Option<Arc<Catalog>>) {
        let en = self.load(DEFAULT_LANG).await;
        let primary = if lang == DEFAULT_LANG { en.clone() } else { self.load(lang).await };
        (primary, en)
    }

    /// Rewrites every node that has a translation; nodes without one keep their
    /// existing (English) text. Returns how many nodes changed.
    pub async fn apply_translations(&self, lang: &str, nodes: &mut [TextNode]) -> usize {
        let (primary, fallback) = self.catalogs(lang).await;
        let mut changed = 0;
        for node in nodes.iter_mut() {
            if let Some(text) = lookup(primary.as_deref(), fallback.as_deref(), &node.key) {
                if node.text != text {
                    node.text = text.to_string();
                    changed += 1;
                }
            }
        }
        if let Some(prefs) = &self.prefs {
            if let Err(e) = prefs.set_language(lang) {
                eprintln!("⚠️  Could not save language preference: {}", e);
            }
        }
        changed
    }
}

fn lookup<'a>(primary: Option<&'a Catalog>, fallback: Option<&'a Catalog>, key: &str) -> Option<&'a str> {
    let hit = |c: Option<&'a Catalog>| c.and_then(|c| c.get(key)).map(String::as_str).filter(|s| !s.is_empty());
    hit(primary).or_else(|| hit(fallback))
}

/// Non-string values are skipped rather than failing the whole file.
fn parse_catalog(text: &str) -> Option<Catalog> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Object(map) => Some(
            map.into_iter()
                .filter_map(|(k, v)| match v {
                    Value::String(s) => Some((k, s)),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_fall_through_to_english() {
        let de: Catalog = [("a".to_string(), String::new()), ("b".to_string(), "Bee".to_string())].into();
        let en: Catalog = [("a".to_string(), "Ay".to_string())].into();
        assert_eq!(lookup(Some(&de), Some(&en), "a"), Some("Ay"));
        assert_eq!(lookup(Some(&de), Some(&en), "b"), Some("Bee"));
        assert_eq!(lookup(Some(&de), Some(&en), "c"), None);
        assert_eq!(lookup(None, Some(&en), "a"), Some("Ay"));
    }

    #[test]
    fn catalog_parsing_skips_non_strings() {
        let c = parse_catalog(r#"{"a":"x","n":3,"o":{"k":"v"}}"#).unwrap();
        assert_eq!(c.len(), 1);
        assert!(parse_catalog("[1,2]").is_none());
    }
}
