//! In-memory directory
//!
//! A deterministic [`ConnectionFactory`] for tests. Search results are
//! registered per `(base DN, filter)` pair instead of evaluating filters, so a
//! test also pins the exact filter the provider computes. Every request is
//! recorded together with the id of the connection that issued it.

use crate::ldap::connection::{ConnectionFactory, DirectoryConnection, DirectoryResult};
use crate::ldap::types::{Entry, Modification, SearchRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use warden_core::{DialOptions, DirectoryError};

/// A request observed by the in-memory directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Dial { url: String },
    StartTls,
    Bind { dn: String },
    Search(SearchRequest),
    Modify { dn: String, changes: Vec<Modification> },
    Close,
}

#[derive(Default)]
struct State {
    credentials: HashMap<String, String>,
    results: HashMap<(String, String), Vec<Entry>>,
    search_failures: HashMap<String, DirectoryError>,
    dial_failure: Option<DirectoryError>,
    start_tls_failure: Option<DirectoryError>,
    modify_failure: Option<DirectoryError>,
    requests: Vec<(usize, Request)>,
    next_id: usize,
    dialed: usize,
    closed: usize,
    dropped: usize,
}

#[derive(Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<Mutex<State>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept simple binds of `dn` with `password`.
    pub fn with_credentials(self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.state.lock().credentials.insert(dn.into(), password.into());
        self
    }

    /// Answer searches under `base_dn` with exactly `filter` with `entries`.
    pub fn with_search_result(
        self,
        base_dn: impl Into<String>,
        filter: impl Into<String>,
        entries: Vec<Entry>,
    ) -> Self {
        self.state
            .lock()
            .results
            .insert((base_dn.into(), filter.into()), entries);
        self
    }

    pub fn fail_search(self, base_dn: impl Into<String>, error: DirectoryError) -> Self {
        self.state.lock().search_failures.insert(base_dn.into(), error);
        self
    }

    /// Fail the next dial only.
    pub fn fail_dial(self, error: DirectoryError) -> Self {
        self.state.lock().dial_failure = Some(error);
        self
    }

    pub fn fail_start_tls(self, error: DirectoryError) -> Self {
        self.state.lock().start_tls_failure = Some(error);
        self
    }

    pub fn fail_modify(self, error: DirectoryError) -> Self {
        self.state.lock().modify_failure = Some(error);
        self
    }

    /// Requests in arrival order, tagged with their connection id
    pub fn requests(&self) -> Vec<(usize, Request)> {
        self.state.lock().requests.clone()
    }

    pub fn searches(&self) -> Vec<SearchRequest> {
        self.requests()
            .into_iter()
            .filter_map(|(_, r)| match r {
                Request::Search(search) => Some(search),
                _ => None,
            })
            .collect()
    }

    pub fn modifications(&self) -> Vec<(String, Vec<Modification>)> {
        self.requests()
            .into_iter()
            .filter_map(|(_, r)| match r {
                Request::Modify { dn, changes } => Some((dn, changes)),
                _ => None,
            })
            .collect()
    }

    /// Binds as `(connection id, dn)`
    pub fn binds(&self) -> Vec<(usize, String)> {
        self.requests()
            .into_iter()
            .filter_map(|(id, r)| match r {
                Request::Bind { dn } => Some((id, dn)),
                _ => None,
            })
            .collect()
    }

    pub fn dialed(&self) -> usize {
        self.state.lock().dialed
    }

    /// Connections released through `close`
    pub fn closed(&self) -> usize {
        self.state.lock().closed
    }

    /// Connections still neither closed nor dropped
    pub fn open_connections(&self) -> usize {
        let state = self.state.lock();
        state.dialed - state.closed - state.dropped
    }
}

#[async_trait]
impl ConnectionFactory for MemoryDirectory {
    async fn dial(
        &self,
        url: &str,
        _options: &DialOptions,
    ) -> DirectoryResult<Box<dyn DirectoryConnection>> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.requests.push((id, Request::Dial { url: url.to_string() }));

        if let Some(err) = state.dial_failure.take() {
            return Err(err);
        }

        state.dialed += 1;
        Ok(Box::new(MemoryConnection {
            id,
            state: self.state.clone(),
            released: false,
        }))
    }
}

struct MemoryConnection {
    id: usize,
    state: Arc<Mutex<State>>,
    released: bool,
}

impl MemoryConnection {
    fn record(&self, request: Request) {
        self.state.lock().requests.push((self.id, request));
    }
}

#[async_trait]
impl DirectoryConnection for MemoryConnection {
    async fn start_tls(&mut self) -> DirectoryResult<()> {
        self.record(Request::StartTls);
        match self.state.lock().start_tls_failure.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn bind(&mut self, dn: &str, password: &str) -> DirectoryResult<()> {
        self.record(Request::Bind { dn: dn.to_string() });

        let state = self.state.lock();
        match state.credentials.get(dn) {
            Some(expected) if expected == password => Ok(()),
            _ => Err(DirectoryError::Result {
                code: DirectoryError::INVALID_CREDENTIALS,
                message: "Invalid Credentials".to_string(),
            }),
        }
    }

    async fn search(&mut self, request: SearchRequest) -> DirectoryResult<Vec<Entry>> {
        self.record(Request::Search(request.clone()));

        let state = self.state.lock();
        if let Some(err) = state.search_failures.get(&request.base_dn) {
            return Err(err.clone());
        }

        let mut entries = state
            .results
            .get(&(request.base_dn, request.filter))
            .cloned()
            .unwrap_or_default();

        if request.size_limit > 0 {
            entries.truncate(request.size_limit as usize);
        }

        Ok(entries)
    }

    async fn modify(&mut self, dn: &str, changes: Vec<Modification>) -> DirectoryResult<()> {
        self.record(Request::Modify {
            dn: dn.to_string(),
            changes,
        });

        match self.state.lock().modify_failure.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn close(&mut self) -> DirectoryResult<()> {
        if !self.released {
            self.released = true;
            let mut state = self.state.lock();
            state.requests.push((self.id, Request::Close));
            state.closed += 1;
        }
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if !self.released {
            self.state.lock().dropped += 1;
        }
    }
}
