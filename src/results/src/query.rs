//! Filtered reads and latency aggregation over the local `traffic` table (§4.9).

use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use lydian_traffic::TrafficRecord;

use crate::error::ResultsError;

/// `STATS_QUERY_LATENCY`: back-dates ranges to absorb cross-host clock skew.
pub const STATS_QUERY_LATENCY_SECS: i64 = 15;

#[derive(Debug, Default, Clone)]
pub struct ResultFilter {
    pub reqid: Option<String>,
    pub ruleid: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub protocol: Option<String>,
    pub result: Option<bool>,
    pub timestamp_range: Option<(i64, i64)>,
}

impl ResultFilter {
    pub fn for_reqid(reqid: impl Into<String>) -> Self {
        Self {
            reqid: Some(reqid.into()),
            ..Default::default()
        }
    }

    /// Widens an explicit range by `STATS_QUERY_LATENCY_SECS` on both ends.
    pub fn with_skew_absorbing_range(mut self, start: i64, end: i64) -> Self {
        self.timestamp_range = Some((start - STATS_QUERY_LATENCY_SECS, end + STATS_QUERY_LATENCY_SECS));
        self
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        let mut first = true;
        macro_rules! clause {
            ($cond:expr, $body:block) => {
                if $cond {
                    builder.push(if first { " WHERE " } else { " AND " });
                    first = false;
                    $body
                }
            };
        }
        clause!(self.reqid.is_some(), {
            builder.push("reqid = ");
            builder.push_bind(self.reqid.clone().unwrap());
        });
        clause!(self.ruleid.is_some(), {
            builder.push("ruleid = ");
            builder.push_bind(self.ruleid.clone().unwrap());
        });
        clause!(self.source.is_some(), {
            builder.push("source = ");
            builder.push_bind(self.source.clone().unwrap());
        });
        clause!(self.destination.is_some(), {
            builder.push("destination = ");
            builder.push_bind(self.destination.clone().unwrap());
        });
        clause!(self.protocol.is_some(), {
            builder.push("protocol = ");
            builder.push_bind(self.protocol.clone().unwrap());
        });
        clause!(self.result.is_some(), {
            builder.push("result = ");
            builder.push_bind(self.result.unwrap());
        });
        clause!(self.timestamp_range.is_some(), {
            let (start, end) = self.timestamp_range.unwrap();
            builder.push("timestamp BETWEEN ");
            builder.push_bind(start);
            builder.push(" AND ");
            builder.push_bind(end);
        });
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrafficStats {
    pub count: i64,
    pub avg_latency: f64,
    pub min_latency: f64,
    pub max_latency: f64,
    pub pass_count: i64,
    pub fail_count: i64,
}

impl TrafficStats {
    pub fn pass_percent(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.pass_count as f64 / self.count as f64) * 100.0
        }
    }

    pub fn fail_percent(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.fail_count as f64 / self.count as f64) * 100.0
        }
    }
}

pub struct ResultsQuery {
    pool: SqlitePool,
}

impl ResultsQuery {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn records(&self, filter: &ResultFilter) -> Result<Vec<TrafficRecord>, ResultsError> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT timestamp, reqid, ruleid, source, destination, protocol, port, expected, result, latency, error FROM traffic",
        );
        filter.push_where(&mut builder);
        builder.push(" ORDER BY timestamp ASC");
        let rows = builder.build_query_as::<TrafficRecord>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Deletes every recorded row for `reqid`, used by the results RPC
    /// namespace's `DeleteRecord` to purge a request's history ahead of a rerun.
    pub async fn delete_by_reqid(&self, reqid: &str) -> Result<u64, ResultsError> {
        let result = sqlx::query("DELETE FROM traffic WHERE reqid = ?")
            .bind(reqid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn stats(&self, filter: &ResultFilter) -> Result<TrafficStats, ResultsError> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) AS count,
                    COALESCE(AVG(latency), 0.0) AS avg_latency,
                    COALESCE(MIN(latency), 0.0) AS min_latency,
                    COALESCE(MAX(latency), 0.0) AS max_latency,
                    COALESCE(SUM(CASE WHEN result THEN 1 ELSE 0 END), 0) AS pass_count,
                    COALESCE(SUM(CASE WHEN result THEN 0 ELSE 1 END), 0) AS fail_count
             FROM traffic",
        );
        filter.push_where(&mut builder);
        let row = builder.build().fetch_one(&self.pool).await?;

        Ok(TrafficStats {
            count: row.try_get("count")?,
            avg_latency: row.try_get("avg_latency")?,
            min_latency: row.try_get("min_latency")?,
            max_latency: row.try_get("max_latency")?,
            pass_count: row.try_get("pass_count")?,
            fail_count: row.try_get("fail_count")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lydian_recorder::SqliteSink;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    async fn seeded_pool() -> SqlitePool {
        let options = SqliteConnectOptions::new().filename(":memory:").create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        let sink = SqliteSink::new(pool.clone()).await.unwrap();
        let records = [
            ("req1", "r1", true, 1.5, 10),
            ("req1", "r2", false, 3.5, 20),
            ("req2", "r3", true, 2.0, 30),
        ];
        for (reqid, ruleid, result, latency, ts) in records {
            use lydian_traffic::TrafficRecord;
            use lydian_recorder::TrafficSink;
            sink.write(&TrafficRecord {
                timestamp: ts,
                reqid: reqid.into(),
                ruleid: ruleid.into(),
                source: "a".into(),
                destination: "b".into(),
                protocol: "TCP".into(),
                port: 1,
                expected: true,
                result,
                latency,
                error: String::new(),
            })
            .await
            .unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn filters_by_reqid_and_aggregates_latency() {
        let pool = seeded_pool().await;
        let query = ResultsQuery::new(pool);
        let filter = ResultFilter::for_reqid("req1");

        let records = query.records(&filter).await.unwrap();
        assert_eq!(records.len(), 2);

        let stats = query.stats(&filter).await.unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.pass_count, 1);
        assert_eq!(stats.fail_count, 1);
        assert_eq!(stats.min_latency, 1.5);
        assert_eq!(stats.max_latency, 3.5);
        assert_eq!(stats.pass_percent(), 50.0);
    }

    #[tokio::test]
    async fn delete_by_reqid_removes_only_matching_rows() {
        let pool = seeded_pool().await;
        let query = ResultsQuery::new(pool);
        let deleted = query.delete_by_reqid("req1").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(query.records(&ResultFilter::default()).await.unwrap().len(), 1);
    }
}
