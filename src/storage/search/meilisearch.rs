//! Meilisearch search backend.
//!
//! Talks to a Meilisearch server over its REST API with a blocking `reqwest`
//! client. Every mutating endpoint enqueues an asynchronous task; the backend
//! waits for the task to reach a terminal status so that callers observe a
//! completed write or a typed failure.
//!
//! # Deadlines
//!
//! | Bound | Applies to |
//! |-------|-----------|
//! | `request_timeout_ms` | each HTTP request, including task polls |
//! | `connect_timeout_ms` | TCP/TLS connect |
//! | `task_timeout_ms` | total wait for an enqueued task to finish |
//!
//! A call never blocks longer than roughly
//! `request_timeout_ms + task_timeout_ms + request_timeout_ms`.

use crate::models::Document;
use crate::storage::traits::{BackendHealth, IndexError, IndexResult, SearchBackend};
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Error code Meilisearch reports when creating an index that already exists.
const INDEX_ALREADY_EXISTS: &str = "index_already_exists";

/// Timeouts for [`MeilisearchBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeilisearchTimeouts {
    /// Per-request timeout in milliseconds. Raised to 1 if zero.
    pub request_timeout_ms: u64,
    /// Connect timeout in milliseconds. Raised to 1 if zero.
    pub connect_timeout_ms: u64,
    /// Maximum wait for an enqueued task in milliseconds.
    pub task_timeout_ms: u64,
    /// Delay between task status polls in milliseconds.
    pub poll_interval_ms: u64,
}

impl MeilisearchTimeouts {
    /// Raises zero request and connect bounds to 1ms. There is no unbounded
    /// setting.
    #[must_use]
    pub const fn clamped(self) -> Self {
        Self {
            request_timeout_ms: if self.request_timeout_ms == 0 { 1 } else { self.request_timeout_ms },
            connect_timeout_ms: if self.connect_timeout_ms == 0 { 1 } else { self.connect_timeout_ms },
            ..self
        }
    }
}

impl Default for MeilisearchTimeouts {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            connect_timeout_ms: 2_000,
            task_timeout_ms: 10_000,
            poll_interval_ms: 50,
        }
    }
}

/// Meilisearch-backed [`SearchBackend`].
#[derive(Debug)]
pub struct MeilisearchBackend {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    timeouts: MeilisearchTimeouts,
}

/// Reference to an enqueued task.
#[derive(Debug, Deserialize)]
struct TaskRef {
    #[serde(rename = "taskUid")]
    task_uid: u64,
}

/// Task status as returned by `GET /tasks/{uid}`.
#[derive(Debug, Deserialize)]
struct TaskView {
    status: String,
    #[serde(default)]
    error: Option<ApiError>,
}

impl TaskView {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }

    fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}

/// Error body attached to rejected requests and failed tasks.
#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Document>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
}

/// Builds the HTTP client, falling back to defaults if the builder fails.
fn build_http_client(timeouts: &MeilisearchTimeouts) -> Client {
    let builder = Client::builder()
        .timeout(Duration::from_millis(timeouts.request_timeout_ms))
        .connect_timeout(Duration::from_millis(timeouts.connect_timeout_ms));

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build Meilisearch HTTP client: {err}");
        Client::new()
    })
}

impl MeilisearchBackend {
    /// Creates a backend for the server at `base_url`.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeouts: MeilisearchTimeouts,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let timeouts = timeouts.clamped();
        Self {
            client: build_http_client(&timeouts),
            base_url,
            api_key,
            timeouts,
        }
    }

    /// Returns the server base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }

    fn send(&self, operation: &'static str, builder: RequestBuilder) -> IndexResult<Response> {
        builder.send().map_err(|e| self.transport_error(operation, &e))
    }

    fn transport_error(&self, operation: &'static str, err: &reqwest::Error) -> IndexError {
        if err.is_timeout() {
            IndexError::Timeout {
                operation,
                timeout_ms: self.timeouts.request_timeout_ms,
            }
        } else {
            IndexError::Unreachable {
                operation,
                cause: err.to_string(),
            }
        }
    }

    /// Reads a non-success response into a `Rejected` error.
    fn rejected(operation: &'static str, response: Response) -> (IndexError, ApiError) {
        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        let api = serde_json::from_str::<ApiError>(&body).unwrap_or_else(|_| ApiError {
            message: body,
            code: String::new(),
        });
        let err = IndexError::Rejected {
            operation,
            status,
            message: api.message.clone(),
        };
        (err, api)
    }

    fn decode<T: serde::de::DeserializeOwned>(
        operation: &'static str,
        response: Response,
    ) -> IndexResult<T> {
        response.json().map_err(|e| IndexError::Decode {
            operation,
            cause: e.to_string(),
        })
    }

    /// Sends a mutating request and returns the uid of the task it enqueued.
    fn enqueue(&self, operation: &'static str, builder: RequestBuilder) -> IndexResult<u64> {
        let response = self.send(operation, builder)?;
        if !response.status().is_success() {
            return Err(Self::rejected(operation, response).0);
        }
        Self::decode::<TaskRef>(operation, response).map(|task| task.task_uid)
    }

    /// Polls a task until it reaches a terminal status or the task deadline.
    fn wait_for_task(&self, operation: &'static str, task_uid: u64) -> IndexResult<TaskView> {
        let deadline = Instant::now() + Duration::from_millis(self.timeouts.task_timeout_ms);
        let poll_interval = Duration::from_millis(self.timeouts.poll_interval_ms.max(1));

        loop {
            let response =
                self.send(operation, self.request(Method::GET, &format!("/tasks/{task_uid}")))?;
            if !response.status().is_success() {
                return Err(Self::rejected(operation, response).0);
            }
            let task: TaskView = Self::decode(operation, response)?;
            if task.is_terminal() {
                return Ok(task);
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(operation, task_uid, status = %task.status, "Task wait deadline elapsed");
                return Err(IndexError::Timeout {
                    operation,
                    timeout_ms: self.timeouts.task_timeout_ms,
                });
            }
            std::thread::sleep(poll_interval.min(deadline - now));
        }
    }

    /// Enqueues a task and requires it to succeed.
    fn run_task(&self, operation: &'static str, builder: RequestBuilder) -> IndexResult<()> {
        let task_uid = self.enqueue(operation, builder)?;
        let task = self.wait_for_task(operation, task_uid)?;
        if task.status == "succeeded" {
            Ok(())
        } else {
            if let Some(error) = &task.error {
                tracing::debug!(operation, task_uid, code = %error.code, message = %error.message, "Task did not succeed");
            }
            Err(IndexError::TaskFailed {
                operation,
                task_uid,
                status: task.status,
            })
        }
    }

    fn collection_exists(&self, name: &str) -> IndexResult<bool> {
        const OPERATION: &str = "ensure_collection_exists";
        let response = self.send(OPERATION, self.request(Method::GET, &format!("/indexes/{name}")))?;
        match response.status().as_u16() {
            404 => Ok(false),
            s if (200..300).contains(&s) => Ok(true),
            _ => Err(Self::rejected(OPERATION, response).0),
        }
    }

    fn clear_collection(&self, collection: &str) -> IndexResult<()> {
        self.run_task(
            "replace_all_documents",
            self.request(Method::DELETE, &format!("/indexes/{collection}/documents")),
        )
    }

    fn add_documents(
        &self,
        operation: &'static str,
        collection: &str,
        documents: &[Document],
    ) -> IndexResult<()> {
        self.run_task(
            operation,
            self.request(
                Method::POST,
                &format!(
                    "/indexes/{collection}/documents?primaryKey={}",
                    crate::models::PRIMARY_KEY
                ),
            )
            .json(documents),
        )
    }
}

impl SearchBackend for MeilisearchBackend {
    fn name(&self) -> &'static str {
        "meilisearch"
    }

    #[instrument(skip(self), fields(backend = "meilisearch"))]
    fn ensure_collection_exists(&self, name: &str, primary_key: &str) -> IndexResult<bool> {
        const OPERATION: &str = "ensure_collection_exists";
        if self.collection_exists(name)? {
            return Ok(false);
        }

        let builder = self
            .request(Method::POST, "/indexes")
            .json(&json!({ "uid": name, "primaryKey": primary_key }));
        let response = self.send(OPERATION, builder)?;
        if !response.status().is_success() {
            let (err, api) = Self::rejected(OPERATION, response);
            return if api.code == INDEX_ALREADY_EXISTS {
                Ok(false)
            } else {
                Err(err)
            };
        }

        let task_uid = Self::decode::<TaskRef>(OPERATION, response)?.task_uid;
        let task = self.wait_for_task(OPERATION, task_uid)?;
        match (task.status.as_str(), task.error_code()) {
            ("succeeded", _) => {
                tracing::info!(collection = name, primary_key, "Created search collection");
                Ok(true)
            },
            ("failed", Some(INDEX_ALREADY_EXISTS)) => Ok(false),
            _ => Err(IndexError::TaskFailed {
                operation: OPERATION,
                task_uid,
                status: task.status,
            }),
        }
    }

    #[instrument(skip(self, documents), fields(backend = "meilisearch", count = documents.len()))]
    fn replace_all_documents(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> IndexResult<usize> {
        self.clear_collection(collection)?;
        if documents.is_empty() {
            return Ok(0);
        }
        self.add_documents("replace_all_documents", collection, documents)?;
        Ok(documents.len())
    }

    fn upsert_documents(&self, collection: &str, documents: &[Document]) -> IndexResult<()> {
        if documents.is_empty() {
            return Ok(());
        }
        self.add_documents("upsert_documents", collection, documents)
    }

    fn delete_documents(&self, collection: &str, ids: &[i64]) -> IndexResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.run_task(
            "delete_documents",
            self.request(
                Method::POST,
                &format!("/indexes/{collection}/documents/delete-batch"),
            )
            .json(ids),
        )
    }

    fn delete_document(&self, collection: &str, id: i64) -> IndexResult<()> {
        self.run_task(
            "delete_document",
            self.request(
                Method::DELETE,
                &format!("/indexes/{collection}/documents/{id}"),
            ),
        )
    }

    fn search(&self, collection: &str, query: &str) -> IndexResult<Vec<Document>> {
        const OPERATION: &str = "search";
        let builder = self
            .request(Method::POST, &format!("/indexes/{collection}/search"))
            .json(&json!({ "q": query }));
        let response = self.send(OPERATION, builder)?;
        if !response.status().is_success() {
            return Err(Self::rejected(OPERATION, response).0);
        }
        Self::decode::<SearchResponse>(OPERATION, response).map(|r| r.hits)
    }

    fn health(&self) -> BackendHealth {
        let response = match self.request(Method::GET, "/health").send() {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Meilisearch health returned error status");
                return BackendHealth::Unavailable;
            },
            Err(e) => {
                tracing::debug!(error = %e, "Meilisearch health check failed");
                return BackendHealth::Unavailable;
            },
        };
        response
            .json::<HealthResponse>()
            .map_or(BackendHealth::Unknown(String::new()), |h| {
                BackendHealth::from_status(&h.status)
            })
    }
}
