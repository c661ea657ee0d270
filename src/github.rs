use anyhow::{Context, Result, bail};
use futures::future::try_join_all;
use reqwest::{Client, header};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::window::FetchWindow;

static BASE: &str = "https://api.github.com";

/// Bounds single-request latency only; termination never depends on it once
/// a Link header is available.
pub const COMMITS_PER_PAGE: usize = 100;

/// Result of one fetch cycle. A superseded query resolves `Cancelled`
/// silently instead of erroring.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Flattened pages in page order. May end with an API rejection
    /// sentinel object; triage sorts that out.
    Complete(Vec<Value>),
    Cancelled,
}

#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
}

impl GitHubClient {
    pub fn new(token: Option<&str>) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("changelog-digest/0.1"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(t) = token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {t}"))?,
            );
        }
        let client = Client::builder().default_headers(headers).build()?;
        Ok(GitHubClient { client })
    }

    /// Retrieves every page of commits in `window`, concatenated in page
    /// order. Resolves `Cancelled` as soon as `cancel` flips.
    pub async fn fetch_commits(
        &self,
        owner: &str,
        repo: &str,
        window: &FetchWindow,
        per_page: usize,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<FetchOutcome> {
        let first = tokio::select! {
            _ = cancelled(&mut cancel) => return Ok(FetchOutcome::Cancelled),
            resp = self.commits_page(owner, repo, window, per_page, 1) => resp?,
        };

        let link = first
            .headers()
            .get(header::LINK)
            .and_then(|h| h.to_str().ok())
            .map(str::to_owned);
        let status = first.status();

        let body = tokio::select! {
            _ = cancelled(&mut cancel) => return Ok(FetchOutcome::Cancelled),
            body = first.json::<Value>() => body.context("Failed to parse commits page as JSON")?,
        };

        let mut records = match classify_body(body)? {
            PageBody::Sentinel(sentinel) => {
                debug!("API rejected the query with HTTP {status}");
                return Ok(FetchOutcome::Complete(vec![sentinel]));
            }
            PageBody::Records(records) => records,
        };

        match link {
            // No Link header: either everything fit on one page, or the
            // endpoint gave us no pagination signal and we fall back to the
            // short-page heuristic.
            None => {
                if records.len() >= per_page {
                    self.fetch_sequential(owner, repo, window, per_page, &mut cancel, &mut records)
                        .await?;
                }
            }
            Some(link) => {
                let Some(last_page) = parse_last_page(&link) else {
                    bail!("pagination Link header is missing the rel=\"last\" relation: {link}");
                };
                debug!("Link header reports {last_page} pages");
                if last_page > 1 {
                    let remaining = (2..=last_page)
                        .map(|page| self.commits_page_body(owner, repo, window, per_page, page));
                    let pages = tokio::select! {
                        _ = cancelled(&mut cancel) => return Ok(FetchOutcome::Cancelled),
                        pages = try_join_all(remaining) => pages?,
                    };
                    for body in pages {
                        match classify_body(body)? {
                            PageBody::Records(page) => records.extend(page),
                            // A rejection mid-sequence ends the result; later
                            // pages are discarded so the sentinel stays trailing.
                            PageBody::Sentinel(sentinel) => {
                                warn!("API rejection part-way through pagination");
                                records.push(sentinel);
                                break;
                            }
                        }
                    }
                }
            }
        }

        // A supersession that raced with the last page still discards the
        // result; a cancelled query must never deliver records.
        if *cancel.borrow() {
            return Ok(FetchOutcome::Cancelled);
        }
        Ok(FetchOutcome::Complete(records))
    }

    /// Legacy termination: keep requesting pages until one comes back
    /// shorter than the requested size. A full-sized final page costs one
    /// extra (empty) request; accepted imprecision.
    async fn fetch_sequential(
        &self,
        owner: &str,
        repo: &str,
        window: &FetchWindow,
        per_page: usize,
        cancel: &mut watch::Receiver<bool>,
        records: &mut Vec<Value>,
    ) -> Result<()> {
        let mut page = 2;
        loop {
            let body = tokio::select! {
                _ = cancelled(cancel) => return Ok(()),
                body = self.commits_page_body(owner, repo, window, per_page, page) => body?,
            };
            match classify_body(body)? {
                PageBody::Sentinel(sentinel) => {
                    records.push(sentinel);
                    return Ok(());
                }
                PageBody::Records(batch) => {
                    let n = batch.len();
                    records.extend(batch);
                    if n < per_page {
                        return Ok(());
                    }
                }
            }
            page += 1;
        }
    }

    async fn commits_page(
        &self,
        owner: &str,
        repo: &str,
        window: &FetchWindow,
        per_page: usize,
        page: usize,
    ) -> Result<reqwest::Response> {
        let url = format!("{BASE}/repos/{owner}/{repo}/commits");
        debug!("GET {url} page {page}");
        let per_page = per_page.to_string();
        let page_number = page.to_string();
        self.client
            .get(&url)
            .query(&[
                ("since", window.since.as_str()),
                ("until", window.until.as_str()),
                ("per_page", per_page.as_str()),
                ("page", page_number.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to fetch commits page {page} from {url}"))
    }

    async fn commits_page_body(
        &self,
        owner: &str,
        repo: &str,
        window: &FetchWindow,
        per_page: usize,
        page: usize,
    ) -> Result<Value> {
        let resp = self.commits_page(owner, repo, window, per_page, page).await?;
        resp.json::<Value>()
            .await
            .with_context(|| format!("Failed to parse commits page {page} as JSON"))
    }
}

enum PageBody {
    Records(Vec<Value>),
    Sentinel(Value),
}

/// An array body contributes records; an object body is the API-level
/// rejection payload, kept as data rather than promoted to an error.
fn classify_body(body: Value) -> Result<PageBody> {
    match body {
        Value::Array(records) => Ok(PageBody::Records(records)),
        obj @ Value::Object(_) => Ok(PageBody::Sentinel(obj)),
        other => bail!("unexpected commits response shape: {other}"),
    }
}

/// Resolves once the query is superseded. Never resolves if the session is
/// simply dropped, so an orphaned fetch cannot cancel itself.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Owns the current credential and the in-flight cancellation handle.
/// Starting a new query always signals cancellation of the previous one
/// first, so only one fetch sequence can deliver results at a time.
pub struct QuerySession {
    client: GitHubClient,
    active: Option<watch::Sender<bool>>,
}

impl QuerySession {
    pub fn new(token: Option<&str>) -> Result<Self> {
        Ok(QuerySession {
            client: GitHubClient::new(token)?,
            active: None,
        })
    }

    /// Replaces the stored credential. In-flight requests keep the headers
    /// they were built with; every later request uses the new value.
    pub fn set_token(&mut self, token: Option<&str>) -> Result<()> {
        self.client = GitHubClient::new(token)?;
        Ok(())
    }

    pub fn cancel_active(&mut self) {
        if let Some(tx) = self.active.take() {
            let _ = tx.send(true);
        }
    }

    fn begin(&mut self) -> watch::Receiver<bool> {
        self.cancel_active();
        let (tx, rx) = watch::channel(false);
        self.active = Some(tx);
        rx
    }

    pub async fn fetch_window(
        &mut self,
        owner: &str,
        repo: &str,
        window: &FetchWindow,
        per_page: usize,
    ) -> Result<FetchOutcome> {
        let cancel = self.begin();
        let client = self.client.clone();
        client
            .fetch_commits(owner, repo, window, per_page, cancel)
            .await
    }
}

fn parse_last_page(link_header: &str) -> Option<usize> {
    // Look for the segment with rel="last", extract page=
    for part in link_header.split(',') {
        let part = part.trim();
        if part.contains("rel=\"last\"") {
            let start = part.find('<')?;
            let end = part.find('>')?;
            let url = &part[start + 1..end];
            let query = url.split('?').nth(1)?;
            for kv in query.split('&') {
                let mut it = kv.splitn(2, '=');
                let k = it.next()?;
                let v = it.next().unwrap_or("");
                if k == "page" {
                    if let Ok(n) = v.parse::<usize>() {
                        return Some(n);
                    }
                }
            }
        }
    }
    None
}
