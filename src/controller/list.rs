//! Contacts list screen: loading, debounced search, delete, search history.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::lock;
use crate::error::RepoError;
use crate::history::SearchHistory;
use crate::model::Contact;
use crate::repository::Repository;
use crate::resource::Resource;
use crate::search;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListState {
    pub contacts: Vec<Contact>,
    pub is_loading: bool,
    pub error: Option<RepoError>,
    pub search_query: String,
    pub search_history: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactsEvent {
    LoadContacts,
    SearchQuery(String),
    DeleteContact(String),
    Refresh,
    AddToHistory(String),
    RemoveFromHistory(String),
    ClearHistory,
    LoadHistory,
    DismissError,
}

pub struct ContactsController {
    inner: Arc<Inner>,
}

struct Inner {
    repo: Repository,
    history: SearchHistory,
    state: watch::Sender<ListState>,
    /// Ticket of the most recently issued load or search.
    latest: AtomicU64,
    debounce: Mutex<Option<JoinHandle<()>>>,
    debounce_delay: Duration,
}

impl ContactsController {
    /// Build the controller and kick off the initial load and history read.
    /// Must be called from within a tokio runtime.
    pub fn new(repo: Repository, history: SearchHistory, debounce_delay: Duration) -> Self {
        let (state, _) = watch::channel(ListState::default());
        let controller = Self {
            inner: Arc::new(Inner {
                repo,
                history,
                state,
                latest: AtomicU64::new(0),
                debounce: Mutex::new(None),
                debounce_delay,
            }),
        };
        controller.dispatch(ContactsEvent::LoadContacts);
        controller.dispatch(ContactsEvent::LoadHistory);
        controller
    }

    pub fn dispatch(&self, event: ContactsEvent) {
        debug!(?event, "contacts event");
        let inner = &self.inner;
        match event {
            ContactsEvent::LoadContacts | ContactsEvent::Refresh => inner.load(),
            ContactsEvent::SearchQuery(query) => inner.search_query(query),
            ContactsEvent::DeleteContact(id) => inner.delete(id),
            ContactsEvent::AddToHistory(query) => {
                if let Err(err) = inner.history.add(&query) {
                    warn!("failed to record search query: {err:#}");
                }
                inner.reload_history();
            }
            ContactsEvent::RemoveFromHistory(query) => {
                if let Err(err) = inner.history.remove(&query) {
                    warn!("failed to remove search query: {err:#}");
                }
                inner.reload_history();
            }
            ContactsEvent::ClearHistory => {
                if let Err(err) = inner.history.clear() {
                    warn!("failed to clear search history: {err:#}");
                }
                inner.reload_history();
            }
            ContactsEvent::LoadHistory => inner.reload_history(),
            ContactsEvent::DismissError => inner.update(|s| s.error = None),
        }
    }

    pub fn state(&self) -> ListState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListState> {
        self.inner.state.subscribe()
    }

    /// Wait for a pending debounced search to fire and for loading to finish.
    pub async fn settle(&self) -> ListState {
        let pending = lock(&self.inner.debounce).take();
        if let Some(handle) = pending {
            // A cancelled timer is as good as a finished one here
            let _ = handle.await;
        }
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|s| !s.is_loading).await;
        self.state()
    }
}

impl Drop for ContactsController {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.inner.debounce).take() {
            handle.abort();
        }
    }
}

impl Inner {
    fn update(&self, f: impl FnOnce(&mut ListState)) {
        self.state.send_modify(f);
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }

    fn load(self: &Arc<Self>) {
        self.start_fetch(self.repo.list_all());
    }

    /// Issue a new ticket, mark the screen busy and follow `stream` in the background.
    fn start_fetch(self: &Arc<Self>, stream: BoxStream<'static, Resource<Vec<Contact>>>) {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.update(|s| {
            s.is_loading = true;
            s.error = None;
        });
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.follow(ticket, stream).await });
    }

    async fn follow(&self, ticket: u64, mut stream: BoxStream<'static, Resource<Vec<Contact>>>) {
        while let Some(item) = stream.next().await {
            if !self.is_current(ticket) {
                debug!(ticket, "discarding stale contacts result");
                return;
            }
            match item {
                Resource::Loading => self.update(|s| {
                    s.is_loading = true;
                    s.error = None;
                }),
                Resource::Success(contacts) => self.update(|s| {
                    s.contacts = contacts;
                    s.is_loading = false;
                    s.error = None;
                }),
                Resource::Error(err) => {
                    warn!("loading contacts failed: {err}");
                    self.update(|s| {
                        s.error = Some(err);
                        s.is_loading = false;
                    });
                }
            }
        }
    }

    fn search_query(self: &Arc<Self>, query: String) {
        self.update(|s| s.search_query = query.clone());

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.debounce_delay).await;
            if search::is_blank(&query) {
                inner.load();
                return;
            }
            if let Err(err) = inner.history.add(&query) {
                warn!("failed to record search query: {err:#}");
            }
            inner.reload_history();
            // Runs as its own task: cancelling a later timer must not cancel this request
            inner.start_fetch(inner.repo.search(&query));
        });

        if let Some(previous) = lock(&self.debounce).replace(handle) {
            previous.abort();
        }
    }

    /// Delete takes a ticket too, so an earlier load landing mid-delete is dropped.
    fn delete(self: &Arc<Self>, id: String) {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.update(|s| {
            s.is_loading = true;
            s.error = None;
        });
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = inner.repo.delete(&id).await;
            if !inner.is_current(ticket) {
                debug!(%id, ticket, "discarding stale delete result");
                return;
            }
            match result {
                Ok(()) => inner.load(),
                Err(err) => {
                    warn!(%id, "delete failed: {err}");
                    inner.update(|s| {
                        s.error = Some(err);
                        s.is_loading = false;
                    });
                }
            }
        });
    }

    fn reload_history(&self) {
        let entries = self.history.get_all();
        self.update(|s| s.search_history = entries);
    }
}
