//! Pure in-memory doubles for [`DeviceRepository`] and
//! [`ConnectionRegistry`], used by this crate's own tests and by
//! `vce-gateway`'s integration tests (gated behind the `test-utils`
//! feature so production builds never link it by accident).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use vce_core::domain::{field_strategy, Alarm, FieldStrategy};
use vce_core::error::CoreError;
use vce_core::ports::{ConnectionRegistry, DeviceRepository};

#[derive(Default)]
pub struct MemoryDeviceRepository {
    fields: Arc<Mutex<HashMap<String, HashMap<String, String>>>>,
    alarms: Arc<Mutex<HashMap<String, Vec<Alarm>>>>,
}

impl MemoryDeviceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceRepository for MemoryDeviceRepository {
    async fn get_fields(
        &self,
        device_id: &str,
        fields: &[&str],
    ) -> Result<HashMap<String, Option<String>>, CoreError> {
        let store = self.fields.lock().await;
        let device = store.get(device_id);
        Ok(fields
            .iter()
            .map(|f| {
                let strategy = field_strategy(f);
                let value = if matches!(strategy, FieldStrategy::DistributedJson) {
                    None
                } else {
                    device.and_then(|d| d.get(*f)).cloned()
                };
                ((*f).to_string(), value)
            })
            .collect())
    }

    async fn set_fields(
        &self,
        device_id: &str,
        fields: HashMap<String, String>,
    ) -> Result<(), CoreError> {
        let mut store = self.fields.lock().await;
        let device = store.entry(device_id.to_string()).or_default();
        for (k, v) in fields {
            if !matches!(field_strategy(&k), FieldStrategy::DistributedJson) {
                device.insert(k, v);
            }
        }
        Ok(())
    }

    async fn add_alarm(&self, device_id: &str, alarm: Alarm) -> Result<(), CoreError> {
        alarm.validate().map_err(CoreError::internal)?;
        let mut store = self.alarms.lock().await;
        let list = store.entry(device_id.to_string()).or_default();
        list.retain(|a| a.id != alarm.id);
        list.push(alarm);
        Ok(())
    }

    async fn update_alarm(&self, device_id: &str, alarm: Alarm) -> Result<(), CoreError> {
        self.add_alarm(device_id, alarm).await
    }

    async fn del_alarm(&self, device_id: &str, alarm_id: &str) -> Result<(), CoreError> {
        let mut store = self.alarms.lock().await;
        if let Some(list) = store.get_mut(device_id) {
            list.retain(|a| a.id != alarm_id);
        }
        Ok(())
    }

    async fn get_valid_alarms(&self, device_id: &str) -> Result<Vec<Alarm>, CoreError> {
        let store = self.alarms.lock().await;
        let now = Utc::now();
        Ok(store
            .get(device_id)
            .map(|list| list.iter().filter(|a| !a.is_expired(now)).cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryConnectionRegistry {
    routes: Arc<Mutex<HashMap<String, String>>>,
    published: Arc<Mutex<Vec<(String, String, Vec<u8>)>>>,
}

impl MemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<(String, String, Vec<u8>)> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl ConnectionRegistry for MemoryConnectionRegistry {
    async fn register(&self, uid: &str, server_id: &str) -> Result<(), CoreError> {
        self.routes
            .lock()
            .await
            .insert(uid.to_string(), server_id.to_string());
        Ok(())
    }

    async fn unregister(&self, uid: &str) -> Result<(), CoreError> {
        self.routes.lock().await.remove(uid);
        Ok(())
    }

    async fn lookup(&self, uid: &str) -> Result<Option<String>, CoreError> {
        Ok(self.routes.lock().await.get(uid).cloned())
    }

    async fn publish_to_server(
        &self,
        server_id: &str,
        uid: &str,
        payload: &[u8],
    ) -> Result<(), CoreError> {
        self.published
            .lock()
            .await
            .push((server_id.to_string(), uid.to_string(), payload.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vce_core::domain::AlarmKind;

    #[tokio::test]
    async fn memory_tier_fields_roundtrip() {
        let repo = MemoryDeviceRepository::new();
        let mut updates = HashMap::new();
        updates.insert("volume".to_string(), "42".to_string());
        repo.set_fields("dev-1", updates).await.unwrap();
        let fetched = repo.get_fields("dev-1", &["volume"]).await.unwrap();
        assert_eq!(fetched.get("volume").unwrap().as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn expired_one_shot_alarms_are_filtered() {
        let repo = MemoryDeviceRepository::new();
        let past = Utc::now() - Duration::hours(1);
        repo.add_alarm("dev-1", Alarm::one_shot("a1".into(), past, None))
            .await
            .unwrap();
        let future = Utc::now() + Duration::hours(1);
        repo.add_alarm("dev-1", Alarm::one_shot("a2".into(), future, None))
            .await
            .unwrap();
        let valid = repo.get_valid_alarms("dev-1").await.unwrap();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].id, "a2");
    }

    #[tokio::test]
    async fn periodic_alarms_are_always_valid() {
        let repo = MemoryDeviceRepository::new();
        let alarm = Alarm::periodic(
            "a1".into(),
            chrono::NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            vec![],
            None,
        );
        assert_eq!(alarm.kind, AlarmKind::Periodic);
        repo.add_alarm("dev-1", alarm).await.unwrap();
        let valid = repo.get_valid_alarms("dev-1").await.unwrap();
        assert_eq!(valid.len(), 1);
    }

    #[tokio::test]
    async fn connection_registry_lookup_after_register() {
        let registry = MemoryConnectionRegistry::new();
        registry.register("uid-1", "server-a").await.unwrap();
        assert_eq!(
            registry.lookup("uid-1").await.unwrap().as_deref(),
            Some("server-a")
        );
        registry.unregister("uid-1").await.unwrap();
        assert_eq!(registry.lookup("uid-1").await.unwrap(), None);
    }
}
