use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use storefront_core::config::{AppConfig, LoadOptions, LogFormat};
use toml::Value;

use crate::commands::{load_config, CommandResult};

const COMMAND: &str = "config";

#[derive(Debug, Serialize)]
struct ConfigValue {
    key: &'static str,
    value: String,
    source: String,
}

/// Reports every effective setting with the layer it came from.
pub fn run() -> CommandResult {
    let config = match load_config(COMMAND, LoadOptions::default()) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let values = effective_entries(&config)
        .into_iter()
        .map(|(key, value, env_keys)| ConfigValue {
            key,
            value,
            source: field_source(
                key,
                env_keys,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        })
        .collect::<Vec<_>>();

    CommandResult::success_with_serialized(
        COMMAND,
        "effective config (source precedence: env > file > default)",
        &values,
    )
}

fn effective_entries(config: &AppConfig) -> Vec<ConfigEntry> {
    let settings = &config.recommendations;
    let log_format = match config.logging.format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    };

    vec![
        entry("database.url", config.database.url.clone(), &["STOREFRONT_DATABASE_URL"]),
        entry(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["STOREFRONT_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["STOREFRONT_DATABASE_TIMEOUT_SECS"],
        ),
        entry(
            "recommendations.history_window",
            settings.history_window.to_string(),
            &["STOREFRONT_RECOMMENDATIONS_HISTORY_WINDOW"],
        ),
        entry(
            "recommendations.favorite_category_limit",
            settings.favorite_category_limit.to_string(),
            &["STOREFRONT_RECOMMENDATIONS_FAVORITE_CATEGORY_LIMIT"],
        ),
        entry(
            "recommendations.category_pool",
            settings.category_affinity.pool.to_string(),
            &[],
        ),
        entry(
            "recommendations.category_weight",
            settings.category_affinity.weight.to_string(),
            &[],
        ),
        entry(
            "recommendations.wishlist_pool",
            settings.wishlist_adjacency.pool.to_string(),
            &[],
        ),
        entry(
            "recommendations.wishlist_weight",
            settings.wishlist_adjacency.weight.to_string(),
            &[],
        ),
        entry(
            "recommendations.purchase_pool",
            settings.purchase_adjacency.pool.to_string(),
            &[],
        ),
        entry(
            "recommendations.purchase_weight",
            settings.purchase_adjacency.weight.to_string(),
            &[],
        ),
        entry(
            "recommendations.popularity_measure",
            settings.popularity_measure.as_str().to_string(),
            &["STOREFRONT_RECOMMENDATIONS_POPULARITY_MEASURE"],
        ),
        entry(
            "recommendations.homepage_limit",
            settings.homepage_limit.to_string(),
            &["STOREFRONT_RECOMMENDATIONS_HOMEPAGE_LIMIT"],
        ),
        entry(
            "recommendations.product_page_limit",
            settings.product_page_limit.to_string(),
            &["STOREFRONT_RECOMMENDATIONS_PRODUCT_PAGE_LIMIT"],
        ),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["STOREFRONT_LOGGING_LEVEL", "STOREFRONT_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            log_format.to_string(),
            &["STOREFRONT_LOGGING_FORMAT", "STOREFRONT_LOG_FORMAT"],
        ),
    ]
}

type ConfigEntry = (&'static str, String, &'static [&'static str]);

fn entry(key_path: &'static str, value: String, env_keys: &'static [&'static str]) -> ConfigEntry {
    (key_path, value, env_keys)
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("storefront.toml"), PathBuf::from("config/storefront.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    toml::from_str::<Value>(&raw).ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

#[cfg(test)]
mod tests {
    use storefront_core::config::AppConfig;

    use super::{contains_path, effective_entries, field_source};

    #[test]
    fn nested_keys_are_found_in_toml_documents() {
        let doc: toml::Value =
            toml::from_str("[recommendations]\nhomepage_limit = 4\n").expect("parse toml");

        assert!(contains_path(&doc, "recommendations.homepage_limit"));
        assert!(!contains_path(&doc, "recommendations.product_page_limit"));
        assert!(!contains_path(&doc, "database.url"));
    }

    #[test]
    fn every_recommendation_knob_is_listed() {
        let entries = effective_entries(&AppConfig::default());
        let keys = entries.iter().map(|(key, _, _)| *key).collect::<Vec<_>>();

        assert_eq!(keys.len(), 16);
        assert!(keys.contains(&"recommendations.popularity_measure"));
    }

    #[test]
    fn file_keys_are_attributed_to_the_file() {
        let doc: toml::Value =
            toml::from_str("[recommendations]\nhomepage_limit = 4\n").expect("parse toml");
        let path = std::path::Path::new("storefront.toml");

        assert_eq!(
            field_source("recommendations.homepage_limit", &[], Some(&doc), Some(path)),
            "file (storefront.toml)"
        );
        assert_eq!(
            field_source("recommendations.product_page_limit", &[], Some(&doc), Some(path)),
            "default"
        );
    }
}
