//! Translations — synchronous key lookup with locale fallback.
//!
//! Views read strings via `t("key")` or `t("key?name=value")`; query params
//! are interpolated into `{name}` placeholders.
//!
//! # Example
//!
//! ```ignore
//! let i18n = Translations::new("en");
//! i18n.insert("en", "greeting", "Hello, {name}");
//! i18n.insert("hi", "greeting", "नमस्ते, {name}");
//! assert_eq!(i18n.t("greeting?name=Asha"), "Hello, Asha");
//! i18n.set_locale("hi");
//! assert_eq!(i18n.t("greeting?name=Asha"), "नमस्ते, Asha");
//! ```
//!
//! Lookup order: current locale, then the fallback locale, then the key
//! itself.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::error::TranslationError;

// ── QueryParams ──

/// Parsed query string: `count=3&name=alice`.
#[derive(Debug, Clone)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Parse a query string (without the leading `?`).
    pub fn parse(query: &str) -> Self {
        Self(
            query
                .split('&')
                .filter(|s| !s.is_empty())
                .filter_map(|pair| {
                    let (k, v) = pair.split_once('=')?;
                    Some((k.to_string(), v.to_string()))
                })
                .collect(),
        )
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace every `{name}` in `template` with the matching param.
    /// Placeholders without a param are left as they are.
    pub fn interpolate(&self, template: &str) -> String {
        let mut out = template.to_string();
        for (k, v) in &self.0 {
            out = out.replace(&format!("{{{}}}", k), v);
        }
        out
    }
}

// ── Translations ──

type Dictionary = HashMap<String, String>;

pub struct Translations {
    dictionaries: RwLock<HashMap<String, Dictionary>>,
    locale: RwLock<String>,
    fallback: String,
}

impl Translations {
    /// Empty catalog with `locale` active and English fallback.
    pub fn new(locale: &str) -> Self {
        Self::with_fallback(locale, "en")
    }

    pub fn with_fallback(locale: &str, fallback: &str) -> Self {
        Self {
            dictionaries: RwLock::new(HashMap::new()),
            locale: RwLock::new(locale.to_string()),
            fallback: fallback.to_string(),
        }
    }

    /// Catalog pre-filled with the explorer's built-in English and Hindi strings.
    pub fn builtin(locale: &str) -> Self {
        let i18n = Self::new(locale);
        i18n.extend("en", BUILTIN_EN.iter().copied());
        i18n.extend("hi", BUILTIN_HI.iter().copied());
        i18n
    }

    pub fn insert(&self, locale: &str, key: &str, text: &str) {
        self.dictionaries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(locale.to_string())
            .or_default()
            .insert(key.to_string(), text.to_string());
    }

    pub fn extend<'a>(&self, locale: &str, entries: impl IntoIterator<Item = (&'a str, &'a str)>) {
        let mut dictionaries = self
            .dictionaries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let dictionary = dictionaries.entry(locale.to_string()).or_default();
        for (key, text) in entries {
            dictionary.insert(key.to_string(), text.to_string());
        }
    }

    /// Load every `{locale}.json` file in `dir`. Nested objects are flattened
    /// with `.` (`{"nav": {"home": "Home"}}` becomes `nav.home`). Returns the
    /// number of strings loaded.
    pub fn load_dir(&self, dir: &Path) -> Result<usize, TranslationError> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(locale) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path)?;
            let value: Value =
                serde_json::from_str(&text).map_err(|source| TranslationError::Parse {
                    file: path.display().to_string(),
                    source,
                })?;

            let mut flat = Vec::new();
            flatten("", &value, &mut flat);
            loaded += flat.len();
            self.extend(locale, flat.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            debug!(locale, strings = flat.len(), "translations loaded");
        }
        Ok(loaded)
    }

    /// Translate `url` (`"key"` or `"key?name=value"`).
    pub fn t(&self, url: &str) -> String {
        let (key, query) = split_url(url);
        let params = if query.is_empty() {
            QueryParams::empty()
        } else {
            QueryParams::parse(query)
        };

        let locale = self.locale();
        let dictionaries = self
            .dictionaries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let text = dictionaries
            .get(&locale)
            .and_then(|d| d.get(key))
            .or_else(|| dictionaries.get(&self.fallback).and_then(|d| d.get(key)))
            .map(String::as_str)
            .unwrap_or(key);
        params.interpolate(text)
    }

    pub fn set_locale(&self, locale: &str) {
        *self.locale.write().unwrap_or_else(PoisonError::into_inner) = locale.to_string();
    }

    pub fn locale(&self) -> String {
        self.locale
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Locales that have at least one string, sorted.
    pub fn locales(&self) -> Vec<String> {
        let mut locales: Vec<String> = self
            .dictionaries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        locales.sort();
        locales
    }
}

/// Split `"key?query"` into `("key", "query")`.
fn split_url(url: &str) -> (&str, &str) {
    match url.find('?') {
        Some(idx) => (&url[..idx], &url[idx + 1..]),
        None => (url, ""),
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten(&key, v, out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        // Numbers and booleans are kept as text; arrays and null are skipped.
        Value::Number(n) => out.push((prefix.to_string(), n.to_string())),
        Value::Bool(b) => out.push((prefix.to_string(), b.to_string())),
        Value::Array(_) | Value::Null => {}
    }
}

const BUILTIN_EN: &[(&str, &str)] = &[
    ("title", "Indian Ocean ARGO AI Agent"),
    ("subtitle", "Advanced Oceanographic Analysis with Real ARGO Float Data"),
    (
        "query_placeholder",
        "Ask about Arabian Sea temperature, Bay of Bengal salinity, monsoon patterns...",
    ),
    ("search_button", "Analyze Ocean Data"),
    ("loading", "Analyzing oceanographic data..."),
    ("nav.home", "Home"),
    ("nav.dashboard", "Dashboard"),
    ("nav.chat", "Chat"),
    ("nav.explorer", "Explorer"),
    ("status.online", "Back online"),
    ("status.offline", "You are offline. Some features are unavailable."),
    ("status.api_down", "Backend unavailable: {reason}"),
];

const BUILTIN_HI: &[(&str, &str)] = &[
    ("title", "हिंद महासागर ARGO एआई एजेंट"),
    (
        "subtitle",
        "वास्तविक ARGO फ्लोट डेटा के साथ उन्नत समुद्री विज्ञान विश्लेषण",
    ),
    (
        "query_placeholder",
        "अरब सागर के तापमान, बंगाल की खाड़ी लवणता के बारे में पूछें...",
    ),
    ("search_button", "समुद्री डेटा का विश्लेषण करें"),
    ("loading", "समुद्री विज्ञान डेटा का विश्लेषण कर रहे हैं..."),
];
