//! CRUD client for text items kept in a hosted record store.
//!
//! # Design
//! The operations themselves are plain async functions over a `RecordStore`
//! and a `RecordSchema`. `RecordStoreClient` exposes them twice:
//!
//! - as async methods that resolve in the caller's own task, and
//! - as `*_with` methods that run on the client's worker runtime and hand the
//!   result to a completion callback on the client's `ExecutionContext`.
//!
//! Each call resolves exactly once. Nothing is retried and nothing times out;
//! every store failure reaches the caller as `ClientError::RemoteFailure`.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::dispatch::ExecutionContext;
use crate::error::{ClientError, ClientResult};
use crate::item::Item;
use crate::remote::HttpRecordStore;
use crate::schema::RecordSchema;
use crate::store::RecordStore;
use crate::types::{Query, Record, RecordId, SortDescriptor};

/// Records buffered between the store and the forwarding task.
const RECORD_BUFFER: usize = 16;

pub struct RecordStoreClient<S> {
    store: Arc<S>,
    context: Arc<dyn ExecutionContext>,
    runtime: Handle,
    config: ClientConfig,
}

impl<S> Clone for RecordStoreClient<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            context: Arc::clone(&self.context),
            runtime: self.runtime.clone(),
            config: self.config.clone(),
        }
    }
}

impl RecordStoreClient<HttpRecordStore> {
    /// A client talking to the hosted store at `config.base_url`.
    pub fn over_http(config: ClientConfig, context: impl ExecutionContext, runtime: Handle) -> Self {
        let store = HttpRecordStore::new(&config.base_url);
        Self::new(store, context, runtime).with_config(config)
    }
}

impl<S: RecordStore> RecordStoreClient<S> {
    /// `runtime` does the store round-trips; `context` receives completions.
    pub fn new(store: S, context: impl ExecutionContext, runtime: Handle) -> Self {
        Self {
            store: Arc::new(store),
            context: Arc::new(context),
            runtime,
            config: ClientConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn create(&self, text: impl Into<String>) -> ClientResult<Item> {
        save_new(&*self.store, &Item::new(text)).await
    }

    /// Newest items first, at most `results_limit` unless cursors are followed.
    /// Nothing is sent to the store until the stream is first polled; call
    /// again to start over.
    pub fn fetch_all(&self) -> ItemStream {
        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        let runtime = self.runtime.clone();
        RecordStream::lazy(move || {
            let (tx, rx) = mpsc::channel(RECORD_BUFFER);
            runtime.spawn(run_query::<S, Item>(store, config, tx));
            rx
        })
    }

    pub async fn delete(&self, id: RecordId) -> ClientResult<RecordId> {
        delete(&*self.store, &id).await
    }

    pub async fn update(&self, item: Item) -> ClientResult<Item> {
        update(&*self.store, &item).await
    }

    pub fn create_with<F>(&self, text: impl Into<String>, completion: F)
    where
        F: FnOnce(ClientResult<Item>) + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let item = Item::new(text);
        self.spawn_with(async move { save_new(&*store, &item).await }, completion);
    }

    /// Delivers every item as `FetchEvent::Item`, then exactly one
    /// `FetchEvent::Finished`.
    pub fn fetch_all_with<F>(&self, on_event: F)
    where
        F: FnMut(FetchEvent) + Send + 'static,
    {
        let mut stream = self.fetch_all();
        let context = Arc::clone(&self.context);
        let handler = Arc::new(Mutex::new(on_event));
        self.runtime.spawn(async move {
            let outcome = loop {
                match stream.next().await {
                    Some(Ok(item)) => deliver(&*context, &handler, FetchEvent::Item(item)),
                    Some(Err(err)) => break Err(err),
                    None => break Ok(()),
                }
            };
            deliver(&*context, &handler, FetchEvent::Finished(outcome));
        });
    }

    pub fn delete_with<F>(&self, id: RecordId, completion: F)
    where
        F: FnOnce(ClientResult<RecordId>) + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        self.spawn_with(async move { delete(&*store, &id).await }, completion);
    }

    pub fn update_with<F>(&self, item: Item, completion: F)
    where
        F: FnOnce(ClientResult<Item>) + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        self.spawn_with(async move { update(&*store, &item).await }, completion);
    }

    fn spawn_with<T, Op, F>(&self, op: Op, completion: F)
    where
        T: Send + 'static,
        Op: Future<Output = T> + Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let context = Arc::clone(&self.context);
        self.runtime.spawn(async move {
            let result = op.await;
            context.execute(Box::new(move || completion(result)));
        });
    }
}

/// What `fetch_all_with` reports to its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    Item(Item),
    Finished(ClientResult<()>),
}

fn deliver<F>(context: &dyn ExecutionContext, handler: &Arc<Mutex<F>>, event: FetchEvent)
where
    F: FnMut(FetchEvent) + Send + 'static,
{
    let handler = Arc::clone(handler);
    context.execute(Box::new(move || {
        let mut handler = handler.lock().unwrap_or_else(PoisonError::into_inner);
        (*handler)(event);
    }));
}

/// A finite, lazily started sequence of values read from a query.
///
/// Yields `Ok` values in query order. A failure reported when the query
/// completes arrives as one trailing `Err`, after which the stream ends.
pub struct RecordStream<T> {
    state: StreamState<T>,
}

pub type ItemStream = RecordStream<Item>;

type Start<T> = Box<dyn FnOnce() -> mpsc::Receiver<ClientResult<T>> + Send>;

enum StreamState<T> {
    Idle(Start<T>),
    Running(mpsc::Receiver<ClientResult<T>>),
    Done,
}

impl<T> RecordStream<T> {
    fn lazy(start: impl FnOnce() -> mpsc::Receiver<ClientResult<T>> + Send + 'static) -> Self {
        Self {
            state: StreamState::Idle(Box::new(start)),
        }
    }

    pub fn is_started(&self) -> bool {
        !matches!(self.state, StreamState::Idle(_))
    }

    pub async fn next(&mut self) -> Option<ClientResult<T>> {
        if let StreamState::Idle(_) = self.state {
            if let StreamState::Idle(start) = std::mem::replace(&mut self.state, StreamState::Done) {
                self.state = StreamState::Running(start());
            }
        }
        let StreamState::Running(rx) = &mut self.state else {
            return None;
        };
        let next = rx.recv().await;
        if next.is_none() {
            self.state = StreamState::Done;
        }
        next
    }

    /// Drain the stream, failing on the trailing error if there is one.
    pub async fn try_collect(mut self) -> ClientResult<Vec<T>> {
        let mut values = Vec::new();
        while let Some(value) = self.next().await {
            values.push(value?);
        }
        Ok(values)
    }
}

async fn save_new<S: RecordStore, T: RecordSchema>(store: &S, value: &T) -> ClientResult<T> {
    debug!(record_type = T::RECORD_TYPE, "creating record");
    let saved = store
        .save_record(value.to_new_record())
        .await?
        .ok_or(ClientError::RecordMissing)?;
    T::from_record(&saved)
}

async fn delete<S: RecordStore>(store: &S, id: &RecordId) -> ClientResult<RecordId> {
    debug!(record_id = %id, "deleting record");
    store
        .delete_record(id)
        .await?
        .ok_or(ClientError::IdentifierMissing)
}

/// Fetch, overwrite, save back. Last write wins at the store.
async fn update<S: RecordStore, T: RecordSchema>(store: &S, value: &T) -> ClientResult<T> {
    let id = value.id().ok_or(ClientError::Unpersisted)?;
    debug!(record_id = %id, "updating record");
    let mut record = store
        .fetch_record(id)
        .await?
        .ok_or(ClientError::RecordMissing)?;
    record.record_id = Some(id.clone());
    value.write_fields(&mut record);
    let saved = store
        .save_record(record)
        .await?
        .ok_or(ClientError::RecordMissing)?;
    T::from_record(&saved)
}

async fn run_query<S, T>(store: Arc<S>, config: ClientConfig, out: mpsc::Sender<ClientResult<T>>)
where
    S: RecordStore,
    T: RecordSchema + Send + 'static,
{
    let mut cursor = None;
    loop {
        let query = Query::new(T::RECORD_TYPE, config.results_limit)
            .sorted_by(SortDescriptor::newest_first())
            .with_desired_keys(T::FIELDS)
            .with_cursor(cursor.take());
        debug!(record_type = T::RECORD_TYPE, limit = query.limit, "querying records");

        let (tx, rx) = mpsc::channel(RECORD_BUFFER);
        let (completion, consumer_alive) = tokio::join!(store.query(query, tx), forward(rx, &out));
        if !consumer_alive {
            return;
        }

        match completion {
            Ok(Some(next)) if config.follow_cursors => cursor = Some(next),
            Ok(Some(_)) => {
                debug!("more records available; cursor not followed");
                return;
            }
            Ok(None) => return,
            Err(err) => {
                let _ = out.send(Err(err.into())).await;
                return;
            }
        }
    }
}

/// Parse and pass on records until the store stops sending. Returns `false`
/// once the consumer has gone away.
async fn forward<T: RecordSchema>(
    mut records: mpsc::Receiver<Record>,
    out: &mpsc::Sender<ClientResult<T>>,
) -> bool {
    while let Some(record) = records.recv().await {
        match T::from_record(&record) {
            Ok(value) => {
                if out.send(Ok(value)).await.is_err() {
                    return false;
                }
            }
            Err(err) => {
                let id = record.record_id.as_ref().map(RecordId::as_str).unwrap_or("<none>");
                warn!(record_id = id, error = %err, "skipping unreadable record");
            }
        }
    }
    true
}
