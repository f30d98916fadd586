//! Core library for DS-bootstrap scanning: given a child zone and its
//! authoritative nameserver hostnames, decide whether the parent zone can
//! publish a DS record set, and if so, compute it. Also implements the
//! NSEC-walk discovery mode used to enumerate candidate child names under
//! a given ancestor's signaling subtree.

pub mod auths;
pub mod bootstrap;
pub mod config;
pub mod continuity;
pub mod error;
pub mod events;
mod net;
pub mod query;
pub mod rrset;
pub mod signaling;
pub mod walker;

use std::sync::Arc;

use tokio::sync::Semaphore;

pub use auths::AuthsCache;
pub use bootstrap::{scan, BootstrapResult, ScanJob};
pub use config::ScannerConfig;
pub use error::ScanError;
pub use events::{Event, EventSink};
pub use query::QueryContext;
pub use walker::{walk_ancestor, WalkCandidate};

/// Everything a single scan or walk needs, bundled for convenience: the
/// query context, the shared auths cache, and the event sink every scan
/// reports into.
#[derive(Clone)]
pub struct ScanContext {
    pub query: QueryContext,
    pub auths: AuthsCache,
    pub sink: EventSink,
    pub max_walk_steps: usize,
}

impl ScanContext {
    pub fn new(config: &ScannerConfig) -> Result<Self, ScanError> {
        Ok(ScanContext {
            query: config.query_context()?,
            auths: AuthsCache::new(),
            sink: EventSink::new(),
            max_walk_steps: config.max_walk_steps,
        })
    }
}

/// Bounded-concurrency runner for a batch of scan/walk jobs, modeled as a
/// counting semaphore rather than a fixed worker-thread pool: jobs are
/// spawned as tokio tasks and the semaphore caps how many run at once.
#[derive(Clone)]
pub struct ScanPool {
    context: ScanContext,
    permits: Arc<Semaphore>,
}

impl ScanPool {
    pub fn new(context: ScanContext, concurrency: usize) -> Self {
        ScanPool {
            context,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub fn context(&self) -> &ScanContext {
        &self.context
    }

    /// Run one bootstrap scan, waiting for a free slot if the pool is
    /// already at capacity.
    pub async fn scan(&self, job: &ScanJob) -> Option<BootstrapResult> {
        let _permit = self.permits.acquire().await.expect("semaphore never closed");
        scan(&self.context.query, &self.context.auths, &self.context.sink, job).await
    }

    /// Run one NSEC walk, waiting for a free slot if the pool is already
    /// at capacity.
    pub async fn walk(&self, ancestor: &hickory_proto::rr::Name, auths: &[hickory_proto::rr::Name]) -> Vec<WalkCandidate> {
        let _permit = self.permits.acquire().await.expect("semaphore never closed");
        walk_ancestor(
            &self.context.query,
            &self.context.auths,
            &self.context.sink,
            ancestor,
            auths,
            self.context.max_walk_steps,
        )
        .await
    }
}
