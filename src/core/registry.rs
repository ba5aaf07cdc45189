//! Run registry
//!
//! The process-wide guard that makes "one Run at a time" true. The running
//! flag, the log handle, and the accumulated output live in a Run-scoped
//! context owned by a single mutex-guarded slot rather than in process
//! globals. A finished Run keeps its output readable until the next one
//! starts.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::BotApiClient;
use crate::config::AppConfig;
use crate::core::pipeline::TransferPipeline;
use crate::core::runlog::{OutputLine, RunLog};
use crate::core::selector::{DirectedSelector, PromptSelector};
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::OwnedGift;
use crate::utils::constants::API_BASE_URL;

/// How the Run picks its gift
pub enum RunMode {
    /// No input source; a Run that reaches selection terminates there
    Unattended,
    /// Caller-supplied gift id
    Directed(String),
}

/// Handle returned to the caller that started a Run
#[derive(Debug, Clone)]
pub struct StartedRun {
    pub job_id: String,
    pub log_file: String,
}

/// Snapshot for the status endpoint
#[derive(Debug, Clone)]
pub struct RunStatus {
    pub running: bool,
    pub output: Vec<OutputLine>,
}

struct ActiveRun {
    #[allow(dead_code)]
    job_id: String,
    log: RunLog,
    cancel: CancellationToken,
    finished: Arc<AtomicBool>,
}

/// One-Run-at-a-time registry
pub struct RunRegistry {
    api_base: String,
    active: Mutex<Option<ActiveRun>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::with_api_base(API_BASE_URL)
    }

    /// Point every spawned Run at a different API base (stub in tests)
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            active: Mutex::new(None),
        }
    }

    /// True while a Run is executing
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .map(|slot| {
                slot.as_ref()
                    .map(|run| !run.finished.load(Ordering::SeqCst))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// Start a Run. Rejects with a busy error while another is active;
    /// requests are refused, never queued.
    pub fn start(&self, config: AppConfig, mode: RunMode) -> AppResult<StartedRun> {
        config.validate()?;

        let mut slot = self
            .active
            .lock()
            .map_err(|_| AppError::new(ErrorCode::Unknown, "Registry lock poisoned"))?;

        if let Some(run) = slot.as_ref() {
            if !run.finished.load(Ordering::SeqCst) {
                return Err(AppError::busy());
            }
        }

        let log = RunLog::create(Path::new(&config.log_dir))?;
        let cancel = CancellationToken::new();
        let finished = Arc::new(AtomicBool::new(false));
        let job_id = Uuid::new_v4().to_string();

        let client = BotApiClient::new(&config)?.with_base_url(self.api_base.clone());
        let pipeline =
            TransferPipeline::from_parts(Arc::new(config), client, log.clone(), cancel.clone());

        let started = StartedRun {
            job_id: job_id.clone(),
            log_file: log.file_name(),
        };

        let finished_flag = finished.clone();
        tokio::spawn(async move {
            // The outcome is already in the Run's log; nothing to propagate.
            match mode {
                RunMode::Directed(gift_id) => {
                    let mut selector = DirectedSelector::new(gift_id);
                    let _ = pipeline.run(&mut selector).await;
                }
                RunMode::Unattended => {
                    let mut selector = PromptSelector::unattended();
                    let _ = pipeline.run(&mut selector).await;
                }
            }
            finished_flag.store(true, Ordering::SeqCst);
        });

        *slot = Some(ActiveRun {
            job_id,
            log,
            cancel,
            finished,
        });

        Ok(started)
    }

    /// Current status plus the accumulated output of the latest Run. Reading
    /// never consumes lines.
    pub fn status(&self) -> RunStatus {
        match self.active.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(run) => RunStatus {
                    running: !run.finished.load(Ordering::SeqCst),
                    output: run.log.lines(),
                },
                None => RunStatus {
                    running: false,
                    output: Vec::new(),
                },
            },
            Err(_) => RunStatus {
                running: false,
                output: Vec::new(),
            },
        }
    }

    /// Request cancellation of the active Run. The pipeline observes the
    /// token at its next step boundary or sleep and winds down without
    /// re-issuing any transfer.
    pub fn stop(&self) -> AppResult<()> {
        let slot = self
            .active
            .lock()
            .map_err(|_| AppError::new(ErrorCode::Unknown, "Registry lock poisoned"))?;

        match slot.as_ref() {
            Some(run) if !run.finished.load(Ordering::SeqCst) => {
                run.cancel.cancel();
                Ok(())
            }
            _ => Err(AppError::new(
                ErrorCode::JobNotRunning,
                "No process is currently running.",
            )),
        }
    }

    /// Log file of the latest Run, finished or not
    pub fn current_log_file(&self) -> Option<PathBuf> {
        self.active
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|run| run.log.path().to_path_buf()))
    }

    /// Read-only gift listing with the same busy policy as a Run, but no
    /// registered job: it spends nothing and finishes inline.
    pub async fn list_gifts(&self, config: AppConfig) -> AppResult<Vec<OwnedGift>> {
        config.validate()?;

        if self.is_running() {
            return Err(AppError::busy());
        }

        let log = RunLog::create(Path::new(&config.log_dir))?;
        let client = BotApiClient::new(&config)?.with_base_url(self.api_base.clone());
        let pipeline = TransferPipeline::from_parts(
            Arc::new(config),
            client,
            log,
            CancellationToken::new(),
        );
        pipeline.list_gifts().await
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}
