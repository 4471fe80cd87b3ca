use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{info, warn};

use super::{ApplicationRepository, DeviceRepository};
use crate::error::{PushError, Result};
use crate::model::{Application, Device, DeviceFilter, PushSettings};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS push_applications (
    id            TEXT PRIMARY KEY,
    name          TEXT,
    push_settings JSONB
);

CREATE TABLE IF NOT EXISTS push_devices (
    id           TEXT PRIMARY KEY,
    app_id       TEXT NOT NULL,
    device_type  TEXT NOT NULL,
    device_token TEXT NOT NULL,
    user_id      TEXT,
    app_version  TEXT,
    status       TEXT,
    subscriptions TEXT[] NOT NULL DEFAULT '{}',
    created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    modified_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_push_devices_token ON push_devices (device_token);
CREATE INDEX IF NOT EXISTS idx_push_devices_user ON push_devices (user_id);
"#;

/// PostgreSQL 存储
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    id: String,
    name: Option<String>,
    push_settings: Option<Json<PushSettings>>,
}

#[derive(sqlx::FromRow)]
struct DeviceRow {
    id: String,
    app_id: String,
    device_type: String,
    device_token: String,
    user_id: Option<String>,
    app_version: Option<String>,
    status: Option<String>,
    subscriptions: Vec<String>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl TryFrom<DeviceRow> for Device {
    type Error = PushError;

    fn try_from(row: DeviceRow) -> Result<Self> {
        let device_type = row
            .device_type
            .parse()
            .map_err(|e| PushError::Store(format!("device {}: {}", row.id, e)))?;

        Ok(Device {
            id: row.id,
            app_id: row.app_id,
            device_type,
            device_token: row.device_token,
            user_id: row.user_id,
            app_version: row.app_version,
            status: row.status,
            subscriptions: row.subscriptions,
            created_at: row.created_at,
            modified_at: row.modified_at,
        })
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| PushError::Store(format!("Failed to connect to database: {}", e)))?;

        info!("[PUSH STORE] Connected to PostgreSQL (max_connections={})", max_connections);
        Ok(Self { pool })
    }

    /// 创建推送相关表（幂等）
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

fn separator(qb: &mut QueryBuilder<'_, Postgres>, first: &mut bool) {
    qb.push(if *first { " WHERE " } else { " AND " });
    *first = false;
}

/// 追加 WHERE 子句；所有条件以 AND 连接
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &DeviceFilter) {
    let mut first = true;

    if let Some(app_id) = &filter.app_id {
        separator(qb, &mut first);
        qb.push("app_id = ").push_bind(app_id.clone());
    }
    if let Some(device_type) = filter.device_type {
        separator(qb, &mut first);
        qb.push("device_type = ").push_bind(device_type.as_str());
    }
    if let Some(token) = &filter.device_token {
        separator(qb, &mut first);
        qb.push("device_token = ").push_bind(token.clone());
    }
    if let Some(user_id) = &filter.user_id {
        separator(qb, &mut first);
        qb.push("user_id = ").push_bind(user_id.clone());
    }
    if let Some(app_version) = &filter.app_version {
        separator(qb, &mut first);
        qb.push("app_version = ").push_bind(app_version.clone());
    }
    if let Some(status) = &filter.status {
        separator(qb, &mut first);
        qb.push("status = ").push_bind(status.clone());
    }
    if let Some(topic) = &filter.subscription {
        separator(qb, &mut first);
        qb.push_bind(topic.clone()).push(" = ANY(subscriptions)");
    }
}

/// 转换查询结果；无法解析的行（例如未知的 device_type）跳过并告警，不影响其他设备
fn into_devices(rows: Vec<DeviceRow>) -> Vec<Device> {
    rows.into_iter()
        .filter_map(|row| match Device::try_from(row) {
            Ok(device) => Some(device),
            Err(e) => {
                warn!("[PUSH STORE] Skipping unreadable device row: {}", e);
                None
            }
        })
        .collect()
}

const DEVICE_COLUMNS: &str = "SELECT id, app_id, device_type, device_token, user_id, app_version, \
     status, subscriptions, created_at, modified_at FROM push_devices";

#[async_trait]
impl ApplicationRepository for PgStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            "SELECT id, name, push_settings FROM push_applications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PushError::Store(format!("查询应用失败: {}", e)))?;

        Ok(row.map(|row| Application {
            id: row.id,
            name: row.name,
            push_settings: row.push_settings.map(|json| json.0),
        }))
    }
}

#[async_trait]
impl DeviceRepository for PgStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Device>> {
        let mut qb = QueryBuilder::<Postgres>::new(DEVICE_COLUMNS);
        qb.push(" WHERE id = ").push_bind(id.to_string());

        let row = qb
            .build_query_as::<DeviceRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PushError::Store(format!("查询设备失败: {}", e)))?;

        row.map(Device::try_from).transpose()
    }

    async fn find(&self, filter: &DeviceFilter) -> Result<Vec<Device>> {
        let mut qb = QueryBuilder::<Postgres>::new(DEVICE_COLUMNS);
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at, id");

        let rows = qb
            .build_query_as::<DeviceRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PushError::Store(format!("查询设备失败: {}", e)))?;

        Ok(into_devices(rows))
    }

    async fn delete_where(&self, filter: &DeviceFilter) -> Result<u64> {
        if filter.is_empty() {
            return Err(PushError::InvalidRequest(
                "refusing to delete devices with an empty filter".to_string(),
            ));
        }

        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM push_devices");
        push_filter(&mut qb, filter);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| PushError::Store(format!("删除设备失败: {}", e)))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, device_type: &str) -> DeviceRow {
        let now = Utc::now();
        DeviceRow {
            id: id.to_string(),
            app_id: "app".to_string(),
            device_type: device_type.to_string(),
            device_token: format!("token-{}", id),
            user_id: Some("u".to_string()),
            app_version: None,
            status: None,
            subscriptions: vec![],
            created_at: now,
            modified_at: now,
        }
    }

    #[test]
    fn test_unreadable_rows_are_skipped() {
        let devices = into_devices(vec![
            row("d1", "ios"),
            row("d2", "blackberry"),
            row("d3", "android"),
        ]);

        let ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d3"]);
        assert_eq!(devices[1].device_type, crate::model::DeviceType::Android);
    }

    #[test]
    fn test_unreadable_row_by_id_is_store_error() {
        let err = Device::try_from(row("d2", "blackberry")).unwrap_err();
        assert!(matches!(err, PushError::Store(_)));
    }
}
