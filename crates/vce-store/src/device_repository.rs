//! Device state repository (§4.7): per-field strategy table splitting
//! reads/writes between an in-process memory tier and two distributed
//! key shapes (`device:{id}:{field}` and `device:{id}:_state_json`).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use vce_core::domain::{field_strategy, Alarm, FieldStrategy};
use vce_core::error::CoreError;
use vce_core::ports::DeviceRepository;

use crate::error::StoreError;

const ALARMS_FIELD: &str = "alarms";

/// Redis-backed implementation. The memory tier is a plain per-instance
/// map (not shared across repository instances, per §3's ownership
/// note); the distributed tier is shared via the cloned
/// `ConnectionManager`.
pub struct RedisDeviceRepository {
    conn: ConnectionManager,
    memory: Arc<Mutex<HashMap<String, HashMap<String, String>>>>,
}

impl RedisDeviceRepository {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            memory: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn individual_key(device_id: &str, field: &str) -> String {
        format!("device:{device_id}:{field}")
    }

    fn json_key(device_id: &str) -> String {
        format!("device:{device_id}:_state_json")
    }

    async fn get_memory_fields(
        &self,
        device_id: &str,
        fields: &[&str],
    ) -> HashMap<String, Option<String>> {
        let memory = self.memory.lock().await;
        let device = memory.get(device_id);
        fields
            .iter()
            .map(|f| {
                (
                    (*f).to_string(),
                    device.and_then(|d| d.get(*f)).cloned(),
                )
            })
            .collect()
    }

    async fn set_memory_fields(&self, device_id: &str, fields: &HashMap<String, String>) {
        let mut memory = self.memory.lock().await;
        let device = memory.entry(device_id.to_string()).or_default();
        for (k, v) in fields {
            device.insert(k.clone(), v.clone());
        }
    }

    async fn get_individual_fields(
        &self,
        device_id: &str,
        fields: &[&str],
    ) -> Result<HashMap<String, Option<String>>, StoreError> {
        let mut conn = self.conn.clone();
        let mut out = HashMap::new();
        for field in fields {
            let key = Self::individual_key(device_id, field);
            let value: Option<String> = conn.get(&key).await?;
            out.insert((*field).to_string(), value);
        }
        Ok(out)
    }

    async fn set_individual_fields(
        &self,
        device_id: &str,
        fields: &HashMap<String, String>,
    ) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for (field, value) in fields {
            pipe.set(Self::individual_key(device_id, field), value);
        }
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn load_alarms(&self, device_id: &str) -> Result<Vec<Alarm>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::json_key(device_id)).await?;
        match raw {
            Some(s) => serde_json::from_str(&s).map_err(|e| StoreError::Unparseable {
                field: ALARMS_FIELD.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn save_alarms(&self, device_id: &str, alarms: &[Alarm]) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let serialized = serde_json::to_string(alarms).map_err(|e| StoreError::Unparseable {
            field: ALARMS_FIELD.to_string(),
            reason: e.to_string(),
        })?;
        let _: () = conn.set(Self::json_key(device_id), serialized).await?;
        Ok(())
    }
}

#[async_trait]
impl DeviceRepository for RedisDeviceRepository {
    async fn get_fields(
        &self,
        device_id: &str,
        fields: &[&str],
    ) -> Result<HashMap<String, Option<String>>, CoreError> {
        let mut memory_fields = Vec::new();
        let mut individual_fields = Vec::new();
        let mut wants_json = false;

        for &field in fields {
            match field_strategy(field) {
                FieldStrategy::Memory => memory_fields.push(field),
                FieldStrategy::DistributedIndividual => individual_fields.push(field),
                FieldStrategy::DistributedJson => wants_json = true,
            }
        }

        let mut out = self.get_memory_fields(device_id, &memory_fields).await;
        out.extend(
            self.get_individual_fields(device_id, &individual_fields)
                .await
                .map_err(StoreError::from)
                .map_err(CoreError::from)?,
        );
        if wants_json {
            let alarms = self.load_alarms(device_id).await?;
            out.insert(
                ALARMS_FIELD.to_string(),
                serde_json::to_string(&alarms).ok(),
            );
        }
        Ok(out)
    }

    async fn set_fields(
        &self,
        device_id: &str,
        fields: HashMap<String, String>,
    ) -> Result<(), CoreError> {
        let mut memory = HashMap::new();
        let mut individual = HashMap::new();

        for (field, value) in fields {
            match field_strategy(&field) {
                FieldStrategy::Memory => {
                    memory.insert(field, value);
                }
                FieldStrategy::DistributedIndividual => {
                    individual.insert(field, value);
                }
                FieldStrategy::DistributedJson => {
                    // Alarms are mutated through the dedicated alarm
                    // operations below, never through a raw set_fields
                    // call, so a direct write here would bypass
                    // validation; log and skip.
                    tracing::warn!(field = %field, "ignoring raw write to a JSON-tiered field");
                }
            }
        }

        self.set_memory_fields(device_id, &memory).await;
        self.set_individual_fields(device_id, &individual)
            .await
            .map_err(CoreError::from)?;
        Ok(())
    }

    async fn add_alarm(&self, device_id: &str, alarm: Alarm) -> Result<(), CoreError> {
        alarm.validate().map_err(CoreError::internal)?;
        let mut alarms = self.load_alarms(device_id).await?;
        alarms.retain(|a| a.id != alarm.id);
        alarms.push(alarm);
        self.save_alarms(device_id, &alarms).await?;
        Ok(())
    }

    async fn update_alarm(&self, device_id: &str, alarm: Alarm) -> Result<(), CoreError> {
        alarm.validate().map_err(CoreError::internal)?;
        let mut alarms = self.load_alarms(device_id).await?;
        alarms.retain(|a| a.id != alarm.id);
        alarms.push(alarm);
        self.save_alarms(device_id, &alarms).await?;
        Ok(())
    }

    async fn del_alarm(&self, device_id: &str, alarm_id: &str) -> Result<(), CoreError> {
        let mut alarms = self.load_alarms(device_id).await?;
        alarms.retain(|a| a.id != alarm_id);
        self.save_alarms(device_id, &alarms).await?;
        Ok(())
    }

    async fn get_valid_alarms(&self, device_id: &str) -> Result<Vec<Alarm>, CoreError> {
        let alarms = self.load_alarms(device_id).await?;
        let now = Utc::now();
        Ok(alarms.into_iter().filter(|a| !a.is_expired(now)).collect())
    }
}
