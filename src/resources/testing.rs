//! In-memory fulfillment API used by tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::fulfillment::{ApiResult, Object, Resource, ResourceService};

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<(String, String), serde_json::Value>,
    states: HashMap<String, VecDeque<String>>,
    failures: HashMap<(String, &'static str), ApiError>,
    calls: Vec<String>,
    next_ids: HashMap<&'static str, u32>,
}

/// Fulfillment API fake serving every collection.
///
/// Each `get` on a collection reports the next scripted state, repeating the
/// last one once the script runs out. An empty state removes the status.
/// IDs are numbered per collection: `clusters-1`, `hosts-1`, ...
#[derive(Debug, Default)]
pub struct FakeFulfillment {
    inner: Mutex<Inner>,
}

impl FakeFulfillment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the states reported by `get` on a collection.
    pub fn script(&self, collection: &str, states: &[&str]) {
        let mut inner = self.inner.lock().unwrap();
        inner.states.insert(
            collection.to_string(),
            states.iter().map(|s| (*s).to_string()).collect(),
        );
    }

    /// Makes the next `op` ("create", "get", "update", "delete") on a
    /// collection fail.
    pub fn fail_next(&self, collection: &str, op: &'static str, error: ApiError) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures.insert((collection.to_string(), op), error);
    }

    /// Stores an object as if it had been created earlier.
    pub fn insert(&self, collection: &str, id: &str, object: serde_json::Value) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .objects
            .insert((collection.to_string(), id.to_string()), object);
    }

    /// Returns the recorded calls, e.g. `"create clusters"`.
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Returns the stored object, if any.
    pub fn stored(&self, collection: &str, id: &str) -> Option<serde_json::Value> {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    fn begin(&self, collection: &str, op: &'static str, id: Option<&str>) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let call = match id {
            Some(id) => format!("{op} {collection}/{id}"),
            None => format!("{op} {collection}"),
        };
        inner.calls.push(call);
        match inner.failures.remove(&(collection.to_string(), op)) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn next_state(inner: &mut Inner, collection: &str) -> Option<String> {
        let states = inner.states.get_mut(collection)?;
        if states.len() > 1 {
            states.pop_front()
        } else {
            states.front().cloned()
        }
    }

    fn with_state(mut object: serde_json::Value, state: Option<String>) -> serde_json::Value {
        match state {
            Some(state) if state.is_empty() => {
                if let Some(map) = object.as_object_mut() {
                    map.remove("status");
                }
            }
            Some(state) => {
                object["status"]["state"] = serde_json::Value::String(state);
            }
            None => {}
        }
        object
    }
}

fn decode<K: Resource>(value: serde_json::Value) -> ApiResult<Object<K>> {
    serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse {
        message: e.to_string(),
    })
}

fn not_found(collection: &str, id: &str) -> ApiError {
    ApiError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl<K: Resource> ResourceService<K> for FakeFulfillment {
    async fn create(&self, object: &Object<K>) -> ApiResult<Object<K>> {
        self.begin(K::COLLECTION, "create", None)?;
        let mut inner = self.inner.lock().unwrap();
        let next_id = inner.next_ids.entry(K::COLLECTION).or_default();
        *next_id += 1;
        let id = format!("{}-{next_id}", K::COLLECTION);

        let mut value = serde_json::to_value(object).unwrap();
        value["id"] = serde_json::Value::String(id.clone());
        inner
            .objects
            .insert((K::COLLECTION.to_string(), id), value.clone());
        decode::<K>(value)
    }

    async fn get(&self, id: &str) -> ApiResult<Object<K>> {
        self.begin(K::COLLECTION, "get", Some(id))?;
        let mut inner = self.inner.lock().unwrap();
        let value = inner
            .objects
            .get(&(K::COLLECTION.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| not_found(K::COLLECTION, id))?;
        let state = Self::next_state(&mut inner, K::COLLECTION);
        decode::<K>(Self::with_state(value, state))
    }

    async fn update(&self, object: &Object<K>) -> ApiResult<Object<K>> {
        self.begin(K::COLLECTION, "update", Some(&object.id))?;
        let mut inner = self.inner.lock().unwrap();
        let key = (K::COLLECTION.to_string(), object.id.clone());
        let stored = inner
            .objects
            .get_mut(&key)
            .ok_or_else(|| not_found(K::COLLECTION, &object.id))?;

        let update = serde_json::to_value(object).unwrap();
        stored["spec"] = update["spec"].clone();
        if let Some(metadata) = update.get("metadata") {
            stored["metadata"] = metadata.clone();
        }
        let value = stored.clone();
        decode::<K>(value)
    }

    async fn delete(&self, id: &str) -> ApiResult<()> {
        self.begin(K::COLLECTION, "delete", Some(id))?;
        let mut inner = self.inner.lock().unwrap();
        inner
            .objects
            .remove(&(K::COLLECTION.to_string(), id.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(K::COLLECTION, id))
    }
}

mod tests {
    use super::*;
    use crate::fulfillment::{ClusterSpec, HostSpec, RemoteObject};
    use crate::resources::{Cluster, Host};

    #[tokio::test]
    async fn test_ids_are_numbered_per_collection() {
        let service = FakeFulfillment::new();

        let host = RemoteObject::new("", None, HostSpec::default());
        let host = ResourceService::<Host>::create(&service, &host).await.unwrap();
        let cluster = RemoteObject::new("", None, ClusterSpec::default());
        let cluster = ResourceService::<Cluster>::create(&service, &cluster)
            .await
            .unwrap();

        assert_eq!(host.id, "hosts-1");
        assert_eq!(cluster.id, "clusters-1");
    }
}
