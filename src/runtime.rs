//! Bounded worker pool for disambiguating batches of documents.
//!
//! Documents are independent units of work, so a single shared
//! [`Disambiguator`] serves every worker. Submission never blocks on a full
//! queue unless the caller asks for it: [`DisambiguationRuntime::submit`]
//! fails fast with `QueueFull`, while [`DisambiguationRuntime::run_batch`]
//! waits for room.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::disambiguation::Disambiguator;
use crate::document::{Document, DocumentId};
use crate::error::{ExecutionError, LinkError, LinkResult};
use crate::text::{DefaultSymbolClassifier, SymbolClassifier};

enum Job {
    Run {
        doc: Document,
        reply: Sender<Document>,
    },

    #[cfg(test)]
    Sleep {
        duration: Duration,
        reply: Sender<()>,
    },
}

struct WorkerPool {
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl WorkerPool {
    fn start<C>(config: RuntimeConfig, disambiguator: Arc<Disambiguator<C>>) -> LinkResult<Self>
    where
        C: SymbolClassifier + 'static,
    {
        let (tx, rx) = bounded::<Job>(config.queue_capacity);

        let mut pool = Self {
            tx: Some(tx),
            workers: Vec::with_capacity(config.workers),
            queue_capacity: config.queue_capacity,
        };
        for idx in 0..config.workers {
            let rx: Receiver<Job> = rx.clone();
            let disambiguator = Arc::clone(&disambiguator);
            let handle = thread::Builder::new()
                .name(format!("ontolink-worker-{idx}"))
                .spawn(move || loop {
                    match rx.recv() {
                        Ok(Job::Run { mut doc, reply }) => {
                            disambiguator.run(&mut doc);
                            let _ = reply.send(doc);
                        }
                        Err(_) => break,

                        #[cfg(test)]
                        Ok(Job::Sleep { duration, reply }) => {
                            thread::sleep(duration);
                            let _ = reply.send(());
                        }
                    }
                })?;
            pool.workers.push(handle);
        }
        Ok(pool)
    }

    fn sender(&self) -> LinkResult<&Sender<Job>> {
        self.tx
            .as_ref()
            .ok_or(LinkError::Execution(ExecutionError::Disconnected))
    }

    fn try_submit(&self, job: Job) -> LinkResult<()> {
        match self.sender()?.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(LinkError::Execution(ExecutionError::QueueFull {
                capacity: self.queue_capacity,
            })),
            Err(TrySendError::Disconnected(_)) => Err(LinkError::Execution(ExecutionError::Disconnected)),
        }
    }

    fn submit_blocking(&self, job: Job) -> LinkResult<()> {
        self.sender()?
            .send(job)
            .map_err(|_| LinkError::Execution(ExecutionError::Disconnected))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets workers drain queued jobs and exit.
        self.tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Handle to one submitted document.
#[derive(Debug)]
pub struct DocumentHandle {
    id: DocumentId,
    rx: Receiver<Document>,
}

impl DocumentHandle {
    /// Identifier of the submitted document.
    #[must_use]
    pub const fn id(&self) -> DocumentId {
        self.id
    }

    /// Waits for the disambiguated document.
    ///
    /// # Errors
    /// `Disconnected` if the worker pool shut down first.
    pub fn join(self) -> LinkResult<Document> {
        self.rx
            .recv()
            .map_err(|_| LinkError::Execution(ExecutionError::Disconnected))
    }

    /// Waits at most `timeout` for the disambiguated document.
    ///
    /// # Errors
    /// `Timeout` or `Disconnected`.
    pub fn join_timeout(self, timeout: Duration) -> LinkResult<Document> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => LinkError::Execution(ExecutionError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            RecvTimeoutError::Disconnected => LinkError::Execution(ExecutionError::Disconnected),
        })
    }
}

/// Outcome of [`DisambiguationRuntime::run_batch`].
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Disambiguated documents, in input order.
    pub processed: Vec<Document>,
    /// Documents that could not be processed.
    pub failed: Vec<(DocumentId, LinkError)>,
}

/// Runs a shared [`Disambiguator`] over documents on a bounded thread pool.
pub struct DisambiguationRuntime<C: SymbolClassifier + 'static = DefaultSymbolClassifier> {
    disambiguator: Arc<Disambiguator<C>>,
    pool: WorkerPool,
}

impl<C: SymbolClassifier + 'static> DisambiguationRuntime<C> {
    /// Starts `config.workers` worker threads.
    ///
    /// # Errors
    /// Invalid configuration, or a thread could not be spawned.
    pub fn new(disambiguator: Disambiguator<C>, config: RuntimeConfig) -> LinkResult<Self> {
        let config = config.validate()?;
        let disambiguator = Arc::new(disambiguator);
        let pool = WorkerPool::start(config, Arc::clone(&disambiguator))?;
        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "disambiguation runtime started"
        );
        Ok(Self { disambiguator, pool })
    }

    /// Queues `doc` without waiting for room.
    ///
    /// # Errors
    /// `QueueFull` if the queue is at capacity, `Disconnected` after shutdown.
    pub fn submit(&self, doc: Document) -> LinkResult<DocumentHandle> {
        let id = doc.id;
        let (reply, rx) = bounded::<Document>(1);
        self.pool.try_submit(Job::Run { doc, reply })?;
        Ok(DocumentHandle { id, rx })
    }

    /// Disambiguates `doc` on a worker and waits for it.
    ///
    /// # Errors
    /// See [`submit`](Self::submit) and [`DocumentHandle::join`].
    pub fn run(&self, doc: Document) -> LinkResult<Document> {
        self.submit(doc)?.join()
    }

    /// Disambiguates every document, waiting up to `timeout` for each
    /// result. Submission blocks while the queue is full.
    pub fn run_batch(&self, docs: Vec<Document>, timeout: Duration) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut handles = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = doc.id;
            let (reply, rx) = bounded::<Document>(1);
            match self.pool.submit_blocking(Job::Run { doc, reply }) {
                Ok(()) => handles.push(DocumentHandle { id, rx }),
                Err(err) => outcome.failed.push((id, err)),
            }
        }

        for handle in handles {
            let id = handle.id();
            match handle.join_timeout(timeout) {
                Ok(doc) => outcome.processed.push(doc),
                Err(err) => {
                    warn!(document = %id, error = %err, "document failed");
                    outcome.failed.push((id, err));
                }
            }
        }
        outcome
    }

    /// The shared disambiguator.
    #[must_use]
    pub fn disambiguator(&self) -> &Disambiguator<C> {
        &self.disambiguator
    }

    #[cfg(test)]
    fn submit_sleep(&self, duration: Duration) -> LinkResult<Receiver<()>> {
        let (reply, rx) = bounded::<()>(1);
        self.pool.try_submit(Job::Sleep { duration, reply })?;
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisambiguatorConfig;
    use crate::confidence::LinkRank;
    use crate::disambiguation::test_support::Fixture;
    use crate::document::{CharSpan, Entity, Hit, Section, SynonymData};

    fn runtime(config: RuntimeConfig) -> DisambiguationRuntime {
        let fx = Fixture::new();
        let disambiguator = Disambiguator::with_vectorizer(
            DisambiguatorConfig::default(),
            Arc::new(fx.synonyms),
            Arc::new(fx.metadata),
            fx.vectorizer,
        )
        .unwrap();
        DisambiguationRuntime::new(disambiguator, config).unwrap()
    }

    fn osimertinib_doc() -> Document {
        let mut section = Section::new("text", "Osimertinib");
        section.entities.push(
            Entity::new("ner", "Osimertinib", "drug", vec![CharSpan::new(0, 11)]).with_hits([Hit::new(
                "CHEMBL",
                "osimertinib",
                LinkRank::High,
                [SynonymData::single("CHEMBL3353410", "CHEMBL", "exact")],
            )]),
        );
        Document::new(vec![section])
    }

    #[test]
    fn rejects_zero_workers() {
        let fx = Fixture::new();
        let disambiguator = Disambiguator::with_vectorizer(
            DisambiguatorConfig::default(),
            Arc::new(fx.synonyms),
            Arc::new(fx.metadata),
            fx.vectorizer,
        )
        .unwrap();
        let err = DisambiguationRuntime::new(
            disambiguator,
            RuntimeConfig {
                workers: 0,
                queue_capacity: 1,
            },
        )
        .err()
        .unwrap();
        assert!(err.is_validation());
    }

    #[test]
    fn run_returns_disambiguated_document() {
        let rt = runtime(RuntimeConfig::default());
        let doc = rt.run(osimertinib_doc()).unwrap();
        let entity = &doc.sections[0].entities[0];
        assert_eq!(entity.mappings.len(), 1);
        assert_eq!(entity.mappings[0].idx, "CHEMBL3353410");
    }

    #[test]
    fn batch_preserves_input_order() {
        let rt = runtime(RuntimeConfig::default());
        let docs: Vec<Document> = (0..8).map(|_| osimertinib_doc()).collect();
        let ids: Vec<DocumentId> = docs.iter().map(|d| d.id).collect();

        let outcome = rt.run_batch(docs, Duration::from_secs(10));
        assert!(outcome.failed.is_empty());
        let out_ids: Vec<DocumentId> = outcome.processed.iter().map(|d| d.id).collect();
        assert_eq!(out_ids, ids);
    }

    #[test]
    fn full_queue_is_reported() {
        let rt = runtime(RuntimeConfig {
            workers: 1,
            queue_capacity: 1,
        });
        let busy = rt.submit_sleep(Duration::from_millis(200)).unwrap();
        // Wait until the worker has taken the sleep job off the queue.
        thread::sleep(Duration::from_millis(50));
        let _queued = rt.submit_sleep(Duration::from_millis(1)).unwrap();

        let err = rt.submit(osimertinib_doc()).unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(
            err,
            LinkError::Execution(ExecutionError::QueueFull { capacity: 1 })
        ));
        busy.recv().unwrap();
    }

    #[test]
    fn join_timeout_expires_behind_slow_job() {
        let rt = runtime(RuntimeConfig {
            workers: 1,
            queue_capacity: 4,
        });
        let busy = rt.submit_sleep(Duration::from_millis(300)).unwrap();
        let handle = rt.submit(osimertinib_doc()).unwrap();

        let err = handle.join_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, LinkError::Execution(ExecutionError::Timeout { .. })));
        busy.recv().unwrap();
    }
}
