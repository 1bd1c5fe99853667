//! Crash-safe rules store: sqlite-backed, mirrored by an in-memory cache that
//! is authoritative for reads once `load_from_db` has run (§4.6).

use std::collections::HashMap;
use std::sync::Arc;

use lydian_traffic::{RuleState, TrafficRule};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::RulesError;

pub struct RulesStore {
    pool: SqlitePool,
    cache: Arc<RwLock<HashMap<String, TrafficRule>>>,
}

impl RulesStore {
    /// Opens (creating if absent) the sqlite database at `db_path` and loads
    /// every persisted rule into the in-memory cache.
    pub async fn open(db_path: &str) -> Result<Self, RulesError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rules (
                ruleid TEXT PRIMARY KEY,
                reqid TEXT NOT NULL,
                state TEXT NOT NULL,
                payload TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        let store = Self {
            pool,
            cache: Arc::new(RwLock::new(HashMap::new())),
        };
        store.load_from_db().await?;
        Ok(store)
    }

    /// Reloads the in-memory cache from the database, discarding any
    /// uncommitted in-memory state. Called at boot and available for
    /// recovery after a detected inconsistency.
    pub async fn load_from_db(&self) -> Result<(), RulesError> {
        let rows = sqlx::query("SELECT payload FROM rules").fetch_all(&self.pool).await?;
        let mut cache = self.cache.write().await;
        cache.clear();
        for row in rows {
            let payload: String = row.try_get("payload")?;
            match serde_json::from_str::<TrafficRule>(&payload) {
                Ok(rule) => {
                    cache.insert(rule.ruleid.clone(), rule);
                }
                Err(err) => warn!("dropping unparseable rule row during load: {err}"),
            }
        }
        debug!("loaded {} rules from db", cache.len());
        Ok(())
    }

    /// Adds or replaces a rule. Persists before updating the cache so a
    /// crash between the two still leaves the rule recoverable on restart.
    pub async fn add(&self, rule: TrafficRule) -> Result<(), RulesError> {
        let payload = serde_json::to_string(&rule)?;
        sqlx::query(
            "INSERT INTO rules (ruleid, reqid, state, payload) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(ruleid) DO UPDATE SET reqid = excluded.reqid, state = excluded.state, payload = excluded.payload",
        )
        .bind(&rule.ruleid)
        .bind(&rule.reqid)
        .bind(rule.state.to_string())
        .bind(&payload)
        .execute(&self.pool)
        .await?;

        self.cache.write().await.insert(rule.ruleid.clone(), rule);
        Ok(())
    }

    pub async fn add_all(&self, rules: Vec<TrafficRule>) -> Result<(), RulesError> {
        for rule in rules {
            self.add(rule).await?;
        }
        Ok(())
    }

    pub async fn get(&self, ruleid: &str) -> Option<TrafficRule> {
        self.cache.read().await.get(ruleid).cloned()
    }

    pub async fn is_enabled(&self, ruleid: &str) -> Result<bool, RulesError> {
        self.get(ruleid)
            .await
            .map(|r| r.enabled())
            .ok_or_else(|| RulesError::NotFound(ruleid.to_string()))
    }

    pub async fn enable(&self, ruleid: &str) -> Result<(), RulesError> {
        self.set_state(ruleid, RuleState::Active).await
    }

    pub async fn disable(&self, ruleid: &str) -> Result<(), RulesError> {
        self.set_state(ruleid, RuleState::Inactive).await
    }

    async fn set_state(&self, ruleid: &str, state: RuleState) -> Result<(), RulesError> {
        sqlx::query("UPDATE rules SET state = ?1 WHERE ruleid = ?2")
            .bind(state.to_string())
            .bind(ruleid)
            .execute(&self.pool)
            .await?;

        let mut cache = self.cache.write().await;
        match cache.get_mut(ruleid) {
            Some(rule) => {
                rule.state = state;
                Ok(())
            }
            None => Err(RulesError::NotFound(ruleid.to_string())),
        }
    }

    pub async fn delete_by_ruleid(&self, ruleid: &str) -> Result<(), RulesError> {
        sqlx::query("DELETE FROM rules WHERE ruleid = ?1")
            .bind(ruleid)
            .execute(&self.pool)
            .await?;
        self.cache.write().await.remove(ruleid);
        Ok(())
    }

    pub async fn delete_by_reqid(&self, reqid: &str) -> Result<(), RulesError> {
        sqlx::query("DELETE FROM rules WHERE reqid = ?1")
            .bind(reqid)
            .execute(&self.pool)
            .await?;
        self.cache
            .write()
            .await
            .retain(|_, rule| rule.reqid != reqid);
        Ok(())
    }

    /// All rules currently marked `ACTIVE`, used to re-add tasks on boot.
    pub async fn active_rules(&self) -> Vec<TrafficRule> {
        self.cache
            .read()
            .await
            .values()
            .filter(|r| r.enabled())
            .cloned()
            .collect()
    }

    pub async fn rules_for_reqid(&self, reqid: &str) -> Vec<TrafficRule> {
        self.cache
            .read()
            .await
            .values()
            .filter(|r| r.reqid == reqid)
            .cloned()
            .collect()
    }

    pub async fn all(&self) -> Vec<TrafficRule> {
        self.cache.read().await.values().cloned().collect()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lydian_traffic::{Protocol, TrafficRuleBuilder};

    fn sample_rule(id: &str, reqid: &str) -> TrafficRule {
        TrafficRuleBuilder::new(id, reqid)
            .src("10.0.0.1")
            .dst("10.0.0.2")
            .protocol(Protocol::Tcp)
            .port(9465)
            .build()
    }

    async fn temp_store() -> (RulesStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.db");
        let store = RulesStore::open(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let (store, _dir) = temp_store().await;
        store.add(sample_rule("r1", "req1")).await.unwrap();
        let fetched = store.get("r1").await.unwrap();
        assert_eq!(fetched.dst, "10.0.0.2");
    }

    #[tokio::test]
    async fn survives_reload_from_db() {
        let (store, dir) = temp_store().await;
        store.add(sample_rule("r1", "req1")).await.unwrap();
        drop(store);

        let path = dir.path().join("rules.db");
        let reopened = RulesStore::open(path.to_str().unwrap()).await.unwrap();
        assert!(reopened.get("r1").await.is_some());
    }

    #[tokio::test]
    async fn enable_disable_flip_state() {
        let (store, _dir) = temp_store().await;
        store.add(sample_rule("r1", "req1")).await.unwrap();
        store.disable("r1").await.unwrap();
        assert!(!store.is_enabled("r1").await.unwrap());
        store.enable("r1").await.unwrap();
        assert!(store.is_enabled("r1").await.unwrap());
    }

    #[tokio::test]
    async fn delete_by_reqid_removes_all_matching_rules() {
        let (store, _dir) = temp_store().await;
        store.add(sample_rule("r1", "req1")).await.unwrap();
        store.add(sample_rule("r2", "req1")).await.unwrap();
        store.add(sample_rule("r3", "req2")).await.unwrap();
        store.delete_by_reqid("req1").await.unwrap();
        assert_eq!(store.all().await.len(), 1);
    }
}
