//! # Redis
//!
//! RAM database backing the document store in production.
//!
//! ## Layout
//!
//! - One hash per document at `collection:id`, each field JSON-encoded
//! - One set per collection holding the ids, for bounded scans
//! - Integer fields encode as bare digits, so `HINCRBY` stays atomic
//! - Voter-set membership goes through a Lua script: decode the array,
//!   reject if present, append and write back, all in one server call
//!
//! ## Sizing
//!
//! - Questions are a few hundred bytes each; thousands fit in a few MB
//! - Scans walk the id set sorted, so two scans with no writes in between
//!   see the same documents

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde_json::Value;

use super::{DocumentStore, FieldUpdate, Fields, Order, StoreError, sort_documents};

const ADD_TO_SET: &str = r#"
local raw = redis.call('HGET', KEYS[1], ARGV[1])
local members
if raw then
    members = cjson.decode(raw)
else
    members = {}
end
for _, v in ipairs(members) do
    if v == ARGV[2] then
        return 0
    end
end
table.insert(members, ARGV[2])
redis.call('HSET', KEYS[1], ARGV[1], cjson.encode(members))
return 1
"#;

pub struct RedisStore {
    connection: ConnectionManager,
    add_to_set: Script,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Self {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(100));

        let client = Client::open(redis_url).unwrap();
        let connection = client
            .get_connection_manager_with_config(config)
            .await
            .unwrap();

        Self {
            connection,
            add_to_set: Script::new(ADD_TO_SET),
        }
    }

    fn doc_key(collection: &str, id: &str) -> String {
        format!("{collection}:{id}")
    }

    async fn known(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let exists: bool = connection.sismember(collection, id).await?;

        if exists {
            Ok(())
        } else {
            Err(StoreError::Missing {
                collection: collection.to_string(),
                id: id.to_string(),
            })
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(error: redis::RedisError) -> Self {
        Self::Backend(Box::new(error))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::Backend(Box::new(error))
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn create(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let pairs: Vec<(String, String)> = fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();

        redis::pipe()
            .atomic()
            .hset_multiple(Self::doc_key(collection, id), &pairs)
            .ignore()
            .sadd(collection, id)
            .ignore()
            .query_async::<()>(&mut connection)
            .await?;

        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Fields>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: HashMap<String, String> =
            connection.hgetall(Self::doc_key(collection, id)).await?;

        if raw.is_empty() {
            return Ok(None);
        }

        let mut fields = Fields::new();
        for (name, value) in raw {
            fields.insert(name, serde_json::from_str(&value)?);
        }

        Ok(Some(fields))
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[(&str, Value)],
        order_by: Option<(&str, Order)>,
        limit: Option<usize>,
    ) -> Result<Vec<Fields>, StoreError> {
        let mut connection = self.connection.clone();
        let mut ids: Vec<String> = connection.smembers(collection).await?;
        ids.sort();

        let mut matches = Vec::new();
        for id in ids {
            let Some(fields) = self.get(collection, &id).await? else {
                continue;
            };

            if filters.iter().all(|(name, value)| fields.get(*name) == Some(value)) {
                matches.push(fields);

                // sorted scans see every match before the bound applies
                if order_by.is_none() && limit.is_some_and(|limit| matches.len() >= limit) {
                    break;
                }
            }
        }

        if let Some((field, order)) = order_by {
            sort_documents(&mut matches, field, order);
        }
        if let Some(limit) = limit {
            matches.truncate(limit);
        }

        Ok(matches)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        updates: &[(&str, FieldUpdate)],
    ) -> Result<(), StoreError> {
        self.known(collection, id).await?;

        let mut connection = self.connection.clone();
        let key = Self::doc_key(collection, id);

        for (name, update) in updates {
            match update {
                FieldUpdate::Set(value) => {
                    let _: () = connection.hset(&key, *name, value.to_string()).await?;
                }
                FieldUpdate::Increment(delta) => {
                    let _: () = connection.hincr(&key, *name, *delta).await?;
                }
            }
        }

        Ok(())
    }

    async fn add_to_set(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        member: &str,
    ) -> Result<bool, StoreError> {
        self.known(collection, id).await?;

        let mut connection = self.connection.clone();
        let added: i64 = self
            .add_to_set
            .key(Self::doc_key(collection, id))
            .arg(field)
            .arg(member)
            .invoke_async(&mut connection)
            .await?;

        Ok(added == 1)
    }
}
