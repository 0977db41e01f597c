use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::interaction::PopularityMeasure;
use crate::recommend::RecommendationSettings;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub recommendations: RecommendationSettings,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub popularity_measure: Option<PopularityMeasure>,
    pub homepage_limit: Option<usize>,
    pub product_page_limit: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://storefront.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            recommendations: RecommendationSettings::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl std::str::FromStr for PopularityMeasure {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "distinct_viewers" => Ok(Self::DistinctViewers),
            "total_views" => Ok(Self::TotalViews),
            other => Err(ConfigError::Validation(format!(
                "unsupported popularity measure `{other}` (expected distinct_viewers|total_views)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("storefront.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(recommendations) = patch.recommendations {
            let settings = &mut self.recommendations;
            if let Some(history_window) = recommendations.history_window {
                settings.history_window = history_window;
            }
            if let Some(limit) = recommendations.favorite_category_limit {
                settings.favorite_category_limit = limit;
            }
            if let Some(pool) = recommendations.category_pool {
                settings.category_affinity.pool = pool;
            }
            if let Some(pool) = recommendations.wishlist_pool {
                settings.wishlist_adjacency.pool = pool;
            }
            if let Some(pool) = recommendations.purchase_pool {
                settings.purchase_adjacency.pool = pool;
            }
            if let Some(weight) = recommendations.category_weight {
                settings.category_affinity.weight = weight;
            }
            if let Some(weight) = recommendations.wishlist_weight {
                settings.wishlist_adjacency.weight = weight;
            }
            if let Some(weight) = recommendations.purchase_weight {
                settings.purchase_adjacency.weight = weight;
            }
            if let Some(measure) = recommendations.popularity_measure {
                settings.popularity_measure = measure;
            }
            if let Some(limit) = recommendations.homepage_limit {
                settings.homepage_limit = limit;
            }
            if let Some(limit) = recommendations.product_page_limit {
                settings.product_page_limit = limit;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("STOREFRONT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("STOREFRONT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("STOREFRONT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("STOREFRONT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let settings = &mut self.recommendations;
        if let Some(value) = read_env("STOREFRONT_RECOMMENDATIONS_HISTORY_WINDOW") {
            settings.history_window =
                parse_usize("STOREFRONT_RECOMMENDATIONS_HISTORY_WINDOW", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_RECOMMENDATIONS_FAVORITE_CATEGORY_LIMIT") {
            settings.favorite_category_limit =
                parse_usize("STOREFRONT_RECOMMENDATIONS_FAVORITE_CATEGORY_LIMIT", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_RECOMMENDATIONS_POPULARITY_MEASURE") {
            settings.popularity_measure = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "STOREFRONT_RECOMMENDATIONS_POPULARITY_MEASURE".to_string(),
                    value: value.clone(),
                }
            })?;
        }
        if let Some(value) = read_env("STOREFRONT_RECOMMENDATIONS_HOMEPAGE_LIMIT") {
            settings.homepage_limit =
                parse_usize("STOREFRONT_RECOMMENDATIONS_HOMEPAGE_LIMIT", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_RECOMMENDATIONS_PRODUCT_PAGE_LIMIT") {
            settings.product_page_limit =
                parse_usize("STOREFRONT_RECOMMENDATIONS_PRODUCT_PAGE_LIMIT", &value)?;
        }

        let log_level =
            read_env("STOREFRONT_LOGGING_LEVEL").or_else(|| read_env("STOREFRONT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STOREFRONT_LOGGING_FORMAT").or_else(|| read_env("STOREFRONT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(measure) = overrides.popularity_measure {
            self.recommendations.popularity_measure = measure;
        }
        if let Some(limit) = overrides.homepage_limit {
            self.recommendations.homepage_limit = limit;
        }
        if let Some(limit) = overrides.product_page_limit {
            self.recommendations.product_page_limit = limit;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_recommendations(&self.recommendations)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("storefront.toml"), PathBuf::from("config/storefront.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_recommendations(settings: &RecommendationSettings) -> Result<(), ConfigError> {
    if settings.history_window == 0 {
        return Err(ConfigError::Validation(
            "recommendations.history_window must be greater than zero".to_string(),
        ));
    }

    if settings.favorite_category_limit == 0 {
        return Err(ConfigError::Validation(
            "recommendations.favorite_category_limit must be greater than zero".to_string(),
        ));
    }

    let tiers = [
        ("category", settings.category_affinity),
        ("wishlist", settings.wishlist_adjacency),
        ("purchase", settings.purchase_adjacency),
    ];
    for (name, tier) in tiers {
        if tier.pool == 0 {
            return Err(ConfigError::Validation(format!(
                "recommendations.{name}_pool must be greater than zero"
            )));
        }
        if tier.weight == 0 {
            return Err(ConfigError::Validation(format!(
                "recommendations.{name}_weight must be greater than zero"
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    recommendations: Option<RecommendationsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationsPatch {
    history_window: Option<usize>,
    favorite_category_limit: Option<usize>,
    category_pool: Option<usize>,
    wishlist_pool: Option<usize>,
    purchase_pool: Option<usize>,
    category_weight: Option<u32>,
    wishlist_weight: Option<u32>,
    purchase_weight: Option<u32>,
    popularity_measure: Option<PopularityMeasure>,
    homepage_limit: Option<usize>,
    product_page_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
