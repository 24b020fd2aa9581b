//! Realtime-database REST backend.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{Snapshot, Store, StoreError};
use crate::config::StoreCredentials;

/// Store backed by a realtime database's REST endpoint.
///
/// Every path maps to `{database_url}/{path}.json`. Appends are `POST`,
/// overwrites are `PUT`, reads and queries are `GET` with the database's
/// `orderBy`/`startAt`/`limitToLast` query parameters. The credential token
/// rides along as the `auth` parameter.
pub struct RestStore {
    base_url: String,
    auth_token: String,
    client: Client,
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

impl RestStore {
    /// Creates a store client.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the HTTP client cannot be built.
    pub fn new(credentials: &StoreCredentials, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: credentials.database_url.trim_end_matches('/').to_string(),
            auth_token: credentials.auth_token.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    fn send(&self, path: &str, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.query(&[("auth", &self.auth_token)]).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    fn query(&self, path: &str, params: &[(&str, String)]) -> Result<Snapshot, StoreError> {
        let request = self.client.get(self.url(path)).query(params);
        let body: Value = self.send(path, request)?.json()?;
        debug!(path, "store query");
        snapshot_from(body)
    }
}

/// Converts a query response into a snapshot. The database answers `null`
/// for an empty result.
fn snapshot_from(body: Value) -> Result<Snapshot, StoreError> {
    match body {
        Value::Null => Ok(Snapshot::new()),
        Value::Object(children) => Ok(children.into_iter().collect()),
        other => Err(StoreError::Backend(format!(
            "expected an object of children, got {other}"
        ))),
    }
}

/// Query parameter values are JSON-encoded: strings keep their quotes.
fn order_by_param(order_by: &str) -> String {
    Value::String(order_by.to_string()).to_string()
}

impl Store for RestStore {
    fn append(&self, path: &str, record: &Value) -> Result<String, StoreError> {
        let request = self.client.post(self.url(path)).json(record);
        let pushed: PushResponse = self.send(path, request)?.json()?;
        Ok(pushed.name)
    }

    fn overwrite(&self, path: &str, record: &Value) -> Result<(), StoreError> {
        let request = self.client.put(self.url(path)).json(record);
        self.send(path, request)?;
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let request = self.client.get(self.url(path));
        let body: Value = self.send(path, request)?.json()?;
        Ok(match body {
            Value::Null => None,
            value => Some(value),
        })
    }

    fn query_range(
        &self,
        path: &str,
        order_by: &str,
        start: &Value,
    ) -> Result<Snapshot, StoreError> {
        self.query(
            path,
            &[
                ("orderBy", order_by_param(order_by)),
                ("startAt", start.to_string()),
            ],
        )
    }

    fn query_last(&self, path: &str, order_by: &str, n: usize) -> Result<Snapshot, StoreError> {
        self.query(
            path,
            &[
                ("orderBy", order_by_param(order_by)),
                ("limitToLast", n.to_string()),
            ],
        )
    }
}
