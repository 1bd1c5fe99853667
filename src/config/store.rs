//! The dynamic config store (§4.7): defaults → file → DB overlay, typed
//! get/set, and subscriber notification.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sqlx::sqlite::{SqlitePoolOptions, SqliteQueryResult};
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::defaults;
use crate::config::error::ConfigError;
use crate::config::file::{parse_config_file, write_config_file};

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<String>),
    None,
}

impl ConfigValue {
    pub fn typename(&self) -> &'static str {
        match self {
            ConfigValue::Int(_) => "int",
            ConfigValue::Float(_) => "float",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Str(_) => "string",
            ConfigValue::List(_) => "list",
            ConfigValue::None => "none",
        }
    }

    fn encode(&self) -> String {
        match self {
            ConfigValue::Int(i) => i.to_string(),
            ConfigValue::Float(f) => f.to_string(),
            ConfigValue::Bool(b) => b.to_string(),
            ConfigValue::Str(s) => s.clone(),
            ConfigValue::List(items) => items.join(","),
            ConfigValue::None => String::new(),
        }
    }

    fn decode(typename: &str, raw: &str) -> Result<Self, ConfigError> {
        Ok(match typename {
            "int" => ConfigValue::Int(
                raw.parse().map_err(|_| ConfigError::ParseError(raw.to_string()))?,
            ),
            "float" => ConfigValue::Float(
                raw.parse().map_err(|_| ConfigError::ParseError(raw.to_string()))?,
            ),
            "bool" => ConfigValue::Bool(
                raw.parse().map_err(|_| ConfigError::ParseError(raw.to_string()))?,
            ),
            "string" => ConfigValue::Str(raw.to_string()),
            "list" => ConfigValue::List(
                raw.split(',').filter(|s| !s.is_empty()).map(|s| s.to_string()).collect(),
            ),
            "none" => ConfigValue::None,
            other => return Err(ConfigError::UnknownType(other.to_string())),
        })
    }
}

struct Entry {
    value: ConfigValue,
    category: String,
}

type Subscriber = Box<dyn Fn(&ConfigValue) + Send + Sync>;

pub struct ConfigStore {
    pool: SqlitePool,
    config_file_path: Option<PathBuf>,
    cache: RwLock<HashMap<String, Entry>>,
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl ConfigStore {
    /// Opens (creating if absent) the params DB, overlays the legacy config
    /// file if one is given, then overlays persisted DB rows, and finally
    /// regenerates the config file from the merged result (§4.7.1).
    pub async fn open(
        db_path: impl AsRef<Path>,
        config_file_path: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let pool = SqlitePoolOptions::new()
            .connect(&format!("sqlite://{}?mode=rwc", db_path.as_ref().display()))
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS config (
                param TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                typename TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        let mut cache = HashMap::new();
        for default in defaults::catalog() {
            cache.insert(
                default.name.to_string(),
                Entry { value: default.value, category: default.category.to_string() },
            );
        }

        if let Some(path) = &config_file_path {
            if let Ok(contents) = tokio::fs::read_to_string(path).await {
                for (name, value) in parse_config_file(&contents)? {
                    let category = cache
                        .get(&name)
                        .map(|e| e.category.clone())
                        .unwrap_or_else(|| "Custom".to_string());
                    cache.insert(name, Entry { value, category });
                }
            }
        }

        let rows = sqlx::query("SELECT param, value, typename FROM config").fetch_all(&pool).await?;
        for row in rows {
            let name: String = row.get("param");
            let raw: String = row.get("value");
            let typename: String = row.get("typename");
            let value = ConfigValue::decode(&typename, &raw)?;
            let category = cache
                .get(&name)
                .map(|e| e.category.clone())
                .unwrap_or_else(|| "Custom".to_string());
            cache.insert(name, Entry { value, category });
        }

        let store = Self {
            pool,
            config_file_path,
            cache: RwLock::new(cache),
            subscribers: Mutex::new(HashMap::new()),
        };
        store.regenerate_config_file().await;
        info!("config store opened with {} params", store.cache.read().await.len());
        Ok(store)
    }

    pub async fn get_param(&self, name: &str) -> Option<ConfigValue> {
        self.cache.read().await.get(name).map(|e| e.value.clone())
    }

    /// Sets `name` to `value`. When `persist` is true the change is written
    /// to the sqlite table and the on-disk config file is regenerated before
    /// subscribers are notified.
    pub async fn set_param(
        &self,
        name: &str,
        value: ConfigValue,
        persist: bool,
    ) -> Result<(), ConfigError> {
        {
            let mut cache = self.cache.write().await;
            let category = cache
                .get(name)
                .map(|e| e.category.clone())
                .unwrap_or_else(|| "Custom".to_string());
            cache.insert(name.to_string(), Entry { value: value.clone(), category });
        }

        if persist {
            self.persist_row(name, &value).await?;
            self.regenerate_config_file().await;
        }

        self.notify(name, &value);
        Ok(())
    }

    async fn persist_row(&self, name: &str, value: &ConfigValue) -> Result<SqliteQueryResult, ConfigError> {
        sqlx::query(
            "INSERT INTO config (param, value, typename) VALUES (?, ?, ?)
             ON CONFLICT(param) DO UPDATE SET value = excluded.value, typename = excluded.typename",
        )
        .bind(name)
        .bind(value.encode())
        .bind(value.typename())
        .execute(&self.pool)
        .await
        .map_err(ConfigError::from)
    }

    async fn regenerate_config_file(&self) {
        let Some(path) = &self.config_file_path else { return };
        let cache = self.cache.read().await;
        let entries: Vec<(String, ConfigValue, String)> = cache
            .iter()
            .map(|(name, entry)| (name.clone(), entry.value.clone(), entry.category.clone()))
            .collect();
        drop(cache);
        let rendered = write_config_file(&entries);
        if let Err(err) = tokio::fs::write(path, rendered).await {
            warn!("failed to regenerate config file at {}: {err}", path.display());
        }
    }

    /// Registers `callback` to run synchronously whenever `param` changes.
    pub fn subscribe(&self, param: impl Into<String>, callback: Subscriber) {
        self.subscribers.lock().unwrap().entry(param.into()).or_default().push(callback);
    }

    fn notify(&self, name: &str, value: &ConfigValue) {
        let subscribers = self.subscribers.lock().unwrap();
        if let Some(callbacks) = subscribers.get(name) {
            debug!("notifying {} subscriber(s) of {name} change", callbacks.len());
            for callback in callbacks {
                callback(value);
            }
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn set_then_get_round_trips_and_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("params.db");
        let config_path = dir.path().join("lydian.conf");

        let store = ConfigStore::open(&db_path, Some(config_path.clone())).await.unwrap();
        store.set_param("LYDIAN_PORT", ConfigValue::Int(6000), true).await.unwrap();
        assert_eq!(store.get_param("LYDIAN_PORT").await, Some(ConfigValue::Int(6000)));
        store.close().await;

        let reopened = ConfigStore::open(&db_path, Some(config_path.clone())).await.unwrap();
        assert_eq!(reopened.get_param("LYDIAN_PORT").await, Some(ConfigValue::Int(6000)));

        let rendered = tokio::fs::read_to_string(&config_path).await.unwrap();
        assert!(rendered.contains("LYDIAN_PORT = 6000"));
    }

    #[tokio::test]
    async fn subscriber_is_notified_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("params.db"), None).await.unwrap();
        let seen = Arc::new(AtomicBool::new(false));
        let seen_clone = seen.clone();
        store.subscribe(
            "LOG_LEVEL",
            Box::new(move |_value| seen_clone.store(true, Ordering::SeqCst)),
        );
        store.set_param("LOG_LEVEL", ConfigValue::Str("DEBUG".into()), false).await.unwrap();
        assert!(seen.load(Ordering::SeqCst));
    }
}
