//! Background fetch + decode.
//!
//! Jobs go out over a channel to worker threads; finished jobs come back over
//! a second channel and are applied by the cache owner in
//! [`ImageCache::pump`](super::ImageCache::pump). Workers never touch the
//! cache map.

use super::decoded::DecodedImage;
use super::tier::SizeTier;
use crate::error::FetchError;
use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, warn};

/// Raw response from an [`ImageFetcher`]
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub bytes: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl FetchResponse {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Network layer. Called from worker threads; may block.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

impl<F> ImageFetcher for F
where
    F: Fn(&str) -> Result<FetchResponse, FetchError> + Send + Sync,
{
    fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self(url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// First fetch of a URL; yields the icon tier and the source id
    Base,
    /// Upgrade of an existing entry. `epoch` identifies the entry the job
    /// was issued for; `attempt` counts from 1.
    Tier {
        tier: SizeTier,
        epoch: u64,
        attempt: u32,
    },
}

#[derive(Debug, Clone)]
pub struct FetchJob {
    /// Cache key
    pub url: String,
    /// URL actually requested
    pub fetch_url: String,
    pub kind: FetchKind,
}

#[derive(Debug)]
pub struct FetchedImage {
    pub image: DecodedImage,
    pub source_id: Option<String>,
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub job: FetchJob,
    pub result: Result<FetchedImage, FetchError>,
}

/// Fetch, decode and extract the source id. Runs off the owner thread.
fn run_job(fetcher: &dyn ImageFetcher, source_id_header: &str, job: FetchJob) -> FetchOutcome {
    let result = fetcher.fetch(&job.fetch_url).and_then(|response| {
        let image = DecodedImage::decode(&response.bytes)?;
        Ok(FetchedImage {
            image,
            source_id: response.header(source_id_header).map(str::to_string),
        })
    });
    FetchOutcome { job, result }
}

enum Mode {
    /// Worker threads pull jobs from a shared queue
    Threaded {
        job_tx: Option<Sender<FetchJob>>,
        workers: Vec<thread::JoinHandle<()>>,
    },
    /// Jobs run synchronously inside `submit`
    Inline,
    /// Jobs wait until the host calls `run_queued`
    Deferred { queue: VecDeque<FetchJob> },
}

/// Executes fetch jobs and collects their outcomes.
pub struct FetchPool {
    fetcher: Arc<dyn ImageFetcher>,
    source_id_header: Arc<str>,
    mode: Mode,
    done_tx: Sender<FetchOutcome>,
    done_rx: Receiver<FetchOutcome>,
    submitted: u64,
}

impl FetchPool {
    /// Spawn `workers` fetch threads. Zero workers falls back to inline mode.
    pub fn threaded(fetcher: Arc<dyn ImageFetcher>, source_id_header: &str, workers: usize) -> Self {
        if workers == 0 {
            return Self::inline(fetcher, source_id_header);
        }

        let (done_tx, done_rx) = mpsc::channel::<FetchOutcome>();
        let (job_tx, job_rx) = mpsc::channel::<FetchJob>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let source_id_header: Arc<str> = Arc::from(source_id_header);

        let workers = (0..workers)
            .map(|i| {
                let job_rx = Arc::clone(&job_rx);
                let done_tx = done_tx.clone();
                let fetcher = Arc::clone(&fetcher);
                let header = Arc::clone(&source_id_header);
                thread::Builder::new()
                    .name(format!("image-fetch-{i}"))
                    .spawn(move || loop {
                        let job = {
                            let Ok(rx) = job_rx.lock() else { break };
                            match rx.recv() {
                                Ok(job) => job,
                                Err(_) => break, // pool dropped
                            }
                        };
                        if done_tx.send(run_job(fetcher.as_ref(), &header, job)).is_err() {
                            break;
                        }
                    })
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("failed to spawn fetch worker: {e}");
                    None
                }
            })
            .collect::<Vec<_>>();

        if workers.is_empty() {
            warn!("no fetch workers available, running fetches inline");
            return Self {
                fetcher,
                source_id_header,
                mode: Mode::Inline,
                done_tx,
                done_rx,
                submitted: 0,
            };
        }

        debug!("started {} fetch workers", workers.len());
        Self {
            fetcher,
            source_id_header,
            mode: Mode::Threaded {
                job_tx: Some(job_tx),
                workers,
            },
            done_tx,
            done_rx,
            submitted: 0,
        }
    }

    pub fn inline(fetcher: Arc<dyn ImageFetcher>, source_id_header: &str) -> Self {
        Self::with_mode(fetcher, source_id_header, Mode::Inline)
    }

    pub fn deferred(fetcher: Arc<dyn ImageFetcher>, source_id_header: &str) -> Self {
        Self::with_mode(
            fetcher,
            source_id_header,
            Mode::Deferred {
                queue: VecDeque::new(),
            },
        )
    }

    fn with_mode(fetcher: Arc<dyn ImageFetcher>, source_id_header: &str, mode: Mode) -> Self {
        let (done_tx, done_rx) = mpsc::channel();
        Self {
            fetcher,
            source_id_header: Arc::from(source_id_header),
            mode,
            done_tx,
            done_rx,
            submitted: 0,
        }
    }

    pub fn submit(&mut self, job: FetchJob) {
        self.submitted += 1;
        let job = match &mut self.mode {
            Mode::Threaded { job_tx: Some(tx), .. } => match tx.send(job) {
                Ok(()) => return,
                // Every worker has exited; finish the job here instead
                Err(mpsc::SendError(job)) => job,
            },
            Mode::Threaded { job_tx: None, .. } | Mode::Inline => job,
            Mode::Deferred { queue } => {
                queue.push_back(job);
                return;
            }
        };
        self.run_now(job);
    }

    fn run_now(&self, job: FetchJob) {
        let outcome = run_job(self.fetcher.as_ref(), &self.source_id_header, job);
        // The receiver lives in self, so this cannot fail
        let _ = self.done_tx.send(outcome);
    }

    /// Run every queued job of a deferred pool. Returns how many ran.
    pub fn run_queued(&mut self) -> usize {
        let Mode::Deferred { queue } = &mut self.mode else {
            return 0;
        };
        let jobs: Vec<FetchJob> = queue.drain(..).collect();
        let count = jobs.len();
        for job in jobs {
            self.run_now(job);
        }
        count
    }

    /// Jobs waiting in a deferred pool
    pub fn queued(&self) -> usize {
        match &self.mode {
            Mode::Deferred { queue } => queue.len(),
            _ => 0,
        }
    }

    /// Total jobs submitted over the pool's lifetime
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Take every outcome delivered so far without blocking
    pub fn drain(&self) -> Vec<FetchOutcome> {
        self.done_rx.try_iter().collect()
    }
}

impl Drop for FetchPool {
    fn drop(&mut self) {
        if let Mode::Threaded { job_tx, workers } = &mut self.mode {
            // Closing the job channel lets idle workers exit
            job_tx.take();
            for handle in workers.drain(..) {
                let _ = handle.join();
            }
        }
    }
}

impl std::fmt::Debug for FetchPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.mode {
            Mode::Threaded { workers, .. } => format!("threaded({})", workers.len()),
            Mode::Inline => "inline".to_string(),
            Mode::Deferred { queue } => format!("deferred({} queued)", queue.len()),
        };
        f.debug_struct("FetchPool")
            .field("mode", &mode)
            .field("submitted", &self.submitted)
            .finish()
    }
}
