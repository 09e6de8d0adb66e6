//! Search Backend HTTP Client
//!
//! Thin client over the backend's REST API, covering the three surfaces
//! leakstore needs:
//!
//! - **Query**: term search over the bucket index namespace (`bucket-*`),
//!   bounded by a hit limit
//! - **Scan**: cursor-paged retrieval of every hit for a term, for result
//!   sets too large for a single response
//! - **Admin**: index existence, creation, bulk copy, alias swapping and
//!   deletion; the building blocks of index migration
//!
//! Read requests are retried per the client's [`RetryPolicy`]; a scan
//! retries from its current cursor, never from the beginning. Admin
//! mutations are single-attempt: a failed write inside a migration step
//! surfaces immediately so the operator resumes deliberately instead of the
//! client blindly reapplying it.
//!
//! ## Query shape
//!
//! A term search matches documents whose stored `fragment` equals the term
//! exactly AND whose `tld` equals the term's derived key. The second clause
//! narrows the candidate set cheaply before the exact match runs:
//!
//! ```text
//! { "bool": { "must": [
//!     { "term": { "tld.keyword":      "com"           } },
//!     { "term": { "fragment.keyword": "mail.acme.com" } }
//! ] } }
//! ```
//!
//! Both clauses target the `.keyword` sub-fields: the comparison must be
//! against the exact stored string, and querying the analyzed text fields
//! instead would tokenize the term and match documents it merely shares
//! words with.

use std::collections::VecDeque;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use leakstore_core::{derive_tld, SearchHit};

use crate::config::{Auth, SearchConfig};
use crate::error::{Result, SearchError};
use crate::retry::{retry_with_backoff, RetryPolicy};

/// Index pattern covering every bucket index.
const BUCKET_PATTERN: &str = "bucket-*";

/// How long the backend keeps a scan cursor alive between pages.
const SCROLL_KEEPALIVE: &str = "2m";

/// Client for one search backend.
pub struct SearchClient {
    http: reqwest::Client,
    config: SearchConfig,
    retry: RetryPolicy,
}

impl SearchClient {
    pub fn new(config: SearchConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.ignore_ssl)
            .build()
            .map_err(|e| SearchError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url(), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth {
            Some(Auth::ApiKey { key }) => request.header("Authorization", format!("ApiKey {key}")),
            Some(Auth::Credentials { username, password }) => {
                request.basic_auth(username, Some(password))
            }
            None => request,
        }
    }

    /// Query matching documents whose stored fragment equals `term` exactly,
    /// pre-filtered on the derived key.
    pub fn term_query(term: &str) -> Value {
        json!({
            "bool": {
                "must": [
                    { "term": { "tld.keyword": derive_tld(term) } },
                    { "term": { "fragment.keyword": term } }
                ]
            }
        })
    }

    /// Search the bucket namespace for `term`, returning at most `limit`
    /// hits.
    pub async fn search(&self, term: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let body = json!({
            "size": limit,
            "query": Self::term_query(term),
        });
        let path = format!("{BUCKET_PATTERN}/_search");
        let response = retry_with_backoff(&self.retry, || self.post_json(&path, &body)).await?;

        let hits = parse_hits(&response)?;
        tracing::debug!(term = %term, hits = hits.len(), "search completed");
        Ok(hits)
    }

    /// Start a cursor-paged scan over every hit for `term`.
    pub async fn scan(&self, term: &str, page_size: usize) -> Result<Scan<'_>> {
        let body = json!({
            "size": page_size,
            "query": Self::term_query(term),
        });
        let path = format!("{BUCKET_PATTERN}/_search?scroll={SCROLL_KEEPALIVE}");
        let response = retry_with_backoff(&self.retry, || self.post_json(&path, &body)).await?;

        let buffer: VecDeque<SearchHit> = parse_hits(&response)?.into();
        let total = response
            .pointer("/hits/total/value")
            .and_then(Value::as_u64);
        let cursor = response
            .get("_scroll_id")
            .and_then(Value::as_str)
            .map(String::from);
        let exhausted = buffer.is_empty();

        tracing::debug!(term = %term, total = ?total, "scan started");
        Ok(Scan {
            transport: self,
            cursor,
            buffer,
            exhausted,
            total,
        })
    }

    // ------------------------------------------------------------------
    // Admin surface
    // ------------------------------------------------------------------

    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        let exists = retry_with_backoff(&self.retry, || async {
            let response = self
                .authorize(self.http.head(self.url(index)))
                .send()
                .await?;
            match response.status().as_u16() {
                200 => Ok(true),
                404 => Ok(false),
                status => Err(SearchError::Backend {
                    status,
                    body: String::new(),
                }),
            }
        })
        .await?;
        Ok(exists)
    }

    /// Create `index` with the given settings and mappings body.
    ///
    /// A create that races or repeats against an existing index surfaces as
    /// [`SearchError::AlreadyExists`] so callers can resume.
    pub async fn create_index(&self, index: &str, body: &Value) -> Result<()> {
        let response = self
            .authorize(self.http.put(self.url(index)).json(body))
            .send()
            .await?;
        check_response(response).await.map(|_| ())
    }

    /// Copy every document of `source` into `dest` and return the number of
    /// documents copied. Blocks until the backend finishes the copy.
    pub async fn reindex(&self, source: &str, dest: &str) -> Result<u64> {
        let body = json!({
            "source": { "index": source },
            "dest": { "index": dest },
        });
        let response = self
            .post_json("_reindex?wait_for_completion=true", &body)
            .await?;

        response
            .get("total")
            .and_then(Value::as_u64)
            .ok_or_else(|| SearchError::InvalidResponse("reindex response lacks total".into()))
    }

    /// Apply a batch of alias actions in one request. The backend applies
    /// the whole batch atomically, so a remove+add pair never leaves the
    /// alias dangling.
    pub async fn update_aliases(&self, actions: &[Value]) -> Result<()> {
        let body = json!({ "actions": actions });
        self.post_json("_aliases", &body).await.map(|_| ())
    }

    pub async fn delete_index(&self, index: &str) -> Result<()> {
        let response = self
            .authorize(self.http.delete(self.url(index)))
            .send()
            .await?;
        check_response(response).await.map(|_| ())
    }

    /// Names of all indices matching `pattern`, sorted.
    pub async fn list_indices(&self, pattern: &str) -> Result<Vec<String>> {
        let response = retry_with_backoff(&self.retry, || async {
            let response = self
                .authorize(
                    self.http
                        .get(self.url(&format!("_cat/indices/{pattern}")))
                        .query(&[("format", "json"), ("h", "index")]),
                )
                .send()
                .await?;
            check_response(response).await
        })
        .await?;

        #[derive(Deserialize)]
        struct Row {
            index: String,
        }
        let rows: Vec<Row> = serde_json::from_value(response)?;
        let mut names: Vec<String> = rows.into_iter().map(|r| r.index).collect();
        names.sort();
        Ok(names)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .authorize(self.http.post(self.url(path)).json(body))
            .send()
            .await?;
        check_response(response).await
    }
}

/// Transport seam for cursor paging. Kept narrow so a scan's paging and
/// retry behavior can be driven against a fake backend.
#[async_trait]
trait ScrollTransport: Send + Sync {
    fn retry(&self) -> &RetryPolicy;

    /// Fetch the page the cursor in `body` points at.
    async fn next_page(&self, body: &Value) -> Result<Value>;

    /// Drop the cursor named in `body` on the backend.
    async fn release(&self, body: &Value) -> Result<()>;
}

#[async_trait]
impl ScrollTransport for SearchClient {
    fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    async fn next_page(&self, body: &Value) -> Result<Value> {
        self.post_json("_search/scroll", body).await
    }

    async fn release(&self, body: &Value) -> Result<()> {
        let response = self
            .authorize(self.http.delete(self.url("_search/scroll")).json(body))
            .send()
            .await?;
        check_response(response).await.map(|_| ())
    }
}

/// Cursor-paged scan over one term's full result set.
///
/// Holds the backend-side cursor; a failed page fetch is retried from the
/// same cursor, so no hit is skipped or duplicated across retries.
pub struct Scan<'a> {
    transport: &'a dyn ScrollTransport,
    cursor: Option<String>,
    buffer: VecDeque<SearchHit>,
    exhausted: bool,
    total: Option<u64>,
}

impl Scan<'_> {
    /// Total hit count the backend reported at scan start, if it did.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Next hit, fetching the next page when the buffer runs dry. Returns
    /// `Ok(None)` once the result set is exhausted.
    pub async fn next_hit(&mut self) -> Result<Option<SearchHit>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_next_page().await?;
        }
        Ok(self.buffer.pop_front())
    }

    async fn fetch_next_page(&mut self) -> Result<()> {
        let cursor = match &self.cursor {
            Some(c) => c.clone(),
            None => {
                self.exhausted = true;
                return Ok(());
            }
        };

        let body = json!({
            "scroll": SCROLL_KEEPALIVE,
            "scroll_id": cursor,
        });
        let transport = self.transport;
        let response = retry_with_backoff(transport.retry(), || transport.next_page(&body)).await?;

        self.buffer = parse_hits(&response)?.into();
        self.cursor = response
            .get("_scroll_id")
            .and_then(Value::as_str)
            .map(String::from);
        if self.buffer.is_empty() {
            self.exhausted = true;
            self.release_cursor().await;
        }
        Ok(())
    }

    /// Drain the remaining hits into a bounded channel, ending the stream
    /// by dropping the sender. Returns the number of hits forwarded; stops
    /// early if the receiver goes away.
    pub async fn forward(mut self, tx: tokio::sync::mpsc::Sender<SearchHit>) -> Result<u64> {
        let mut forwarded = 0u64;
        while let Some(hit) = self.next_hit().await? {
            if tx.send(hit).await.is_err() {
                self.release_cursor().await;
                break;
            }
            forwarded += 1;
        }
        Ok(forwarded)
    }

    /// Release the cursor without consuming the rest of the result set.
    pub async fn close(mut self) {
        self.release_cursor().await;
    }

    /// Tell the backend to drop the cursor. Best effort; an expired cursor
    /// is cleaned up server-side anyway.
    async fn release_cursor(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            let body = json!({ "scroll_id": cursor });
            if let Err(e) = self.transport.release(&body).await {
                tracing::debug!(error = %e, "failed to release scan cursor");
            }
        }
    }
}

/// Stored source payload of one hit.
#[derive(Deserialize)]
struct HitSource {
    part: u32,
    offset: u64,
    #[serde(default)]
    fragment: String,
    #[serde(default)]
    tld: String,
}

/// Extract hits from a search or scroll response body.
fn parse_hits(response: &Value) -> Result<Vec<SearchHit>> {
    let raw = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::InvalidResponse("response lacks hits.hits".into()))?;

    let mut hits = Vec::with_capacity(raw.len());
    for item in raw {
        let index = item
            .get("_index")
            .and_then(Value::as_str)
            .ok_or_else(|| SearchError::InvalidResponse("hit lacks _index".into()))?;
        let source = item
            .get("_source")
            .cloned()
            .ok_or_else(|| SearchError::InvalidResponse("hit lacks _source".into()))?;
        let source: HitSource = serde_json::from_value(source)?;
        hits.push(SearchHit {
            index: index.to_string(),
            part: source.part,
            offset: source.offset,
            fragment: source.fragment,
            tld: source.tld,
        });
    }
    Ok(hits)
}

/// Map a response to its parsed JSON body, or to the error taxonomy.
async fn check_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if status.is_success() {
        let body = response.text().await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        return Ok(serde_json::from_str(&body)?);
    }

    let body = response.text().await.unwrap_or_default();
    if status.as_u16() == 400 && body.contains("resource_already_exists_exception") {
        return Err(SearchError::AlreadyExists(body));
    }
    Err(SearchError::Backend {
        status: status.as_u16(),
        body,
    })
}
