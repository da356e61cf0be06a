//! Remote blob store backend over HTTP.
//!
//! Objects live at `{base}/objects/{key}`. Listing is paginated:
//! `GET {base}/objects?prefix=..&cursor=..` returns `{ "keys": [..], "cursor": ".." }`
//! until the cursor is absent. The store offers no conditional put, so
//! index allocation against it is best-effort.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use riskwatch_core::{Error, Result};
use serde::Deserialize;
use tracing::debug;

use crate::backend::StorageBackend;

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    cursor: Option<String>,
}

pub struct RemoteBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteBackend {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Config(format!("blob client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/objects/{}", self.base_url, key)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.header("Authorization", format!("Bearer {}", token)),
            None => req,
        }
    }
}

fn storage_err(op: &str, key: &str, e: impl std::fmt::Display) -> Error {
    Error::Storage(format!("{} '{}': {}", op, key, e))
}

#[async_trait]
impl StorageBackend for RemoteBackend {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let len = bytes.len();
        let resp = self
            .authorize(self.client.put(self.object_url(key)))
            .header("Content-Type", "application/json")
            .body(bytes)
            .send()
            .await
            .map_err(|e| storage_err("put", key, e))?;
        if !resp.status().is_success() {
            return Err(storage_err("put", key, format!("status {}", resp.status())));
        }
        debug!("blob put {} ({} bytes)", key, len);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let resp = self
            .authorize(self.client.get(self.object_url(key)))
            .send()
            .await
            .map_err(|e| storage_err("get", key, e))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let bytes = resp.bytes().await.map_err(|e| storage_err("get", key, e))?;
                Ok(Some(bytes.to_vec()))
            }
            s => Err(storage_err("get", key, format!("status {}", s))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let url = format!("{}/objects", self.base_url);
        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![("prefix", prefix.to_string())];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }
            let resp = self
                .authorize(self.client.get(&url))
                .query(&query)
                .send()
                .await
                .map_err(|e| storage_err("list", prefix, e))?;
            if !resp.status().is_success() {
                return Err(storage_err("list", prefix, format!("status {}", resp.status())));
            }
            let page: ListPage = resp
                .json()
                .await
                .map_err(|e| storage_err("list", prefix, e))?;
            keys.extend(page.keys.into_iter().filter(|k| k.starts_with(prefix)));
            match page.cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use blob_server::BlobServer;

    #[test]
    fn test_object_url_trims_trailing_slash() {
        let remote = RemoteBackend::new("https://blob.example.com/store/", None).unwrap();
        assert_eq!(
            remote.object_url("daily/2025-03-01.json"),
            "https://blob.example.com/store/objects/daily/2025-03-01.json"
        );
    }

    #[test]
    fn test_list_page_decoding() {
        let page: ListPage = serde_json::from_str(r#"{"keys":["daily/a.json"]}"#).unwrap();
        assert_eq!(page.keys.len(), 1);
        assert!(page.cursor.is_none());
    }

    /// Minimal blob server: pages listings two keys at a time.
    mod blob_server {
        use std::collections::BTreeMap;
        use std::sync::Arc;

        use axum::body::Bytes;
        use axum::extract::{Path, Query, State};
        use axum::http::{HeaderMap, StatusCode};
        use axum::routing::get;
        use axum::{Json, Router};
        use parking_lot::Mutex;
        use serde::Deserialize;

        const PAGE_SIZE: usize = 2;

        #[derive(Default)]
        pub struct BlobServer {
            pub objects: Mutex<BTreeMap<String, Vec<u8>>>,
            pub list_calls: Mutex<usize>,
            pub auth: Mutex<Vec<String>>,
        }

        #[derive(Deserialize)]
        struct ListQuery {
            prefix: String,
            cursor: Option<String>,
        }

        fn record_auth(server: &BlobServer, headers: &HeaderMap) {
            if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
                server.auth.lock().push(value.to_string());
            }
        }

        async fn list_objects(
            State(server): State<Arc<BlobServer>>,
            headers: HeaderMap,
            Query(query): Query<ListQuery>,
        ) -> Json<serde_json::Value> {
            record_auth(&server, &headers);
            *server.list_calls.lock() += 1;
            let matching: Vec<String> = server
                .objects
                .lock()
                .keys()
                .filter(|k| k.starts_with(&query.prefix))
                .cloned()
                .collect();
            let start: usize = query.cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
            let end = (start + PAGE_SIZE).min(matching.len());
            let cursor = (end < matching.len()).then(|| end.to_string());
            Json(serde_json::json!({ "keys": &matching[start..end], "cursor": cursor }))
        }

        async fn get_object(
            State(server): State<Arc<BlobServer>>,
            headers: HeaderMap,
            Path(key): Path<String>,
        ) -> (StatusCode, Vec<u8>) {
            record_auth(&server, &headers);
            if key.starts_with("broken/") {
                return (StatusCode::INTERNAL_SERVER_ERROR, Vec::new());
            }
            match server.objects.lock().get(&key) {
                Some(bytes) => (StatusCode::OK, bytes.clone()),
                None => (StatusCode::NOT_FOUND, Vec::new()),
            }
        }

        async fn put_object(
            State(server): State<Arc<BlobServer>>,
            headers: HeaderMap,
            Path(key): Path<String>,
            body: Bytes,
        ) -> StatusCode {
            record_auth(&server, &headers);
            server.objects.lock().insert(key, body.to_vec());
            StatusCode::OK
        }

        /// Serve on an ephemeral port and return the base URL.
        pub async fn spawn(server: Arc<BlobServer>) -> String {
            let app = Router::new()
                .route("/objects", get(list_objects))
                .route("/objects/{*key}", get(get_object).put(put_object))
                .with_state(server);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{}", addr)
        }
    }

    async fn remote_with_server() -> (Arc<BlobServer>, RemoteBackend) {
        let server = Arc::new(BlobServer::default());
        let base = blob_server::spawn(server.clone()).await;
        let remote = RemoteBackend::new(&base, Some("secret".into())).unwrap();
        (server, remote)
    }

    #[tokio::test]
    async fn test_list_follows_cursor_across_pages() {
        let (server, remote) = remote_with_server().await;
        {
            let mut objects = server.objects.lock();
            for i in [4usize, 0, 2, 1, 3] {
                objects.insert(format!("daily/2025-03-01/runs/{:03}.json", i), b"{}".to_vec());
            }
            objects.insert("intraday/2025-03-01/0910.json".into(), b"{}".to_vec());
        }

        let keys = remote.list("daily/").await.unwrap();
        assert_eq!(keys.len(), 5);
        assert_eq!(keys[0], "daily/2025-03-01/runs/000.json");
        assert_eq!(keys[4], "daily/2025-03-01/runs/004.json");
        assert_eq!(*server.list_calls.lock(), 3);
        assert!(server.auth.lock().iter().all(|a| a == "Bearer secret"));
    }

    #[tokio::test]
    async fn test_get_missing_object_is_none() {
        let (_server, remote) = remote_with_server().await;
        assert!(remote.get("daily/2025-03-01.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (server, remote) = remote_with_server().await;
        remote
            .put("daily/2025-03-01.json", b"{\"runCount\":1}".to_vec())
            .await
            .unwrap();
        assert!(server.objects.lock().contains_key("daily/2025-03-01.json"));
        let bytes = remote.get("daily/2025-03-01.json").await.unwrap().unwrap();
        assert_eq!(bytes, b"{\"runCount\":1}".to_vec());
    }

    #[tokio::test]
    async fn test_server_error_is_storage_error() {
        let (_server, remote) = remote_with_server().await;
        let err = remote.get("broken/x.json").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
