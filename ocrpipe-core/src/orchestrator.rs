//! Concurrent Orchestrator
//!
//! Runs the extraction pipeline for a batch of documents on a bounded worker
//! pool, isolates per-document failures, and emits results in submission
//! order.
//!
//! ## Run phases
//!
//! 1. **Pre-checks** (fatal): every input path, then the tool executables.
//! 2. **Capability**: resolved once, shared read-only with every worker.
//! 3. **Fan-out**: one pool task per document; each reports
//!    `(submission index, DocumentResult)` over a channel.
//! 4. **Fan-in**: after the scope barrier, results are slotted back into
//!    submission order.
//!
//! Nothing that happens after phase 2 can fail the run: tool errors, empty
//! output and even panics inside a task become that document's error record.

use crate::capability::CapabilityState;
use crate::config::OcrConfig;
use crate::error::{OcrError, Result};
use crate::extraction::{ExtractionOptions, PageExtractor};
use crate::process::{require_executables, CommandRunner, SystemRunner};
use crate::types::{DocumentRequest, DocumentResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::time::Instant;

pub struct BatchOrchestrator {
    config: OcrConfig,
    runner: Arc<dyn CommandRunner>,
    check_executables: bool,
}

impl BatchOrchestrator {
    /// Orchestrator that runs the real tools as child processes
    pub fn new(config: OcrConfig) -> Self {
        Self::with_runner(config, Arc::new(SystemRunner::new()))
    }

    /// Orchestrator with an injected runner
    pub fn with_runner(config: OcrConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            check_executables: true,
        }
    }

    /// Skip the PATH lookup for the tool executables. Only meaningful with an
    /// injected runner that does not spawn real processes.
    pub fn skip_executable_check(mut self) -> Self {
        self.check_executables = false;
        self
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    pub fn run_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<DocumentResult>> {
        let requests: Vec<DocumentRequest> = paths
            .iter()
            .map(|p| DocumentRequest::new(p.as_ref()))
            .collect();
        self.run(&requests)
    }

    /// Process every request and return one result per request, in order
    ///
    /// Fails only for conditions detected before any document is scheduled.
    pub fn run(&self, requests: &[DocumentRequest]) -> Result<Vec<DocumentResult>> {
        let start_time = Instant::now();

        self.config.validate()?;
        verify_inputs(requests)?;
        if self.check_executables {
            require_executables(&[self.config.rasterizer.as_str(), self.config.recognizer.as_str()])?;
        }

        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let capability = CapabilityState::resolve(
            self.config.capability,
            self.runner.as_ref(),
            &self.config.rasterizer,
            self.config.probe_timeout(),
        );
        let extractor = PageExtractor::new(self.runner.clone(), ExtractionOptions::from(&self.config));

        let workers = self.config.worker_count().clamp(1, requests.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ocrpipe-worker-{i}"))
            .build()
            .map_err(|e| OcrError::WorkerPool(e.to_string()))?;

        tracing::info!(
            "Processing {} document(s) with {} worker(s), {:?} strategy",
            requests.len(),
            workers,
            capability.strategy()
        );

        let (tx, rx) = mpsc::channel();
        pool.scope(|scope| {
            for (index, request) in requests.iter().enumerate() {
                let tx = tx.clone();
                let extractor = &extractor;
                let capability = &capability;
                scope.spawn(move |_| {
                    let result = process_document(extractor, capability, request);
                    // Receiver outlives the scope, so this cannot fail
                    let _ = tx.send((index, result));
                });
            }
        });
        drop(tx);

        let results = fan_in(requests, rx);

        let failed = results.iter().filter(|r| !r.is_success()).count();
        tracing::info!(
            "Finished {} document(s) ({} failed) in {:.3}s",
            results.len(),
            failed,
            start_time.elapsed().as_secs_f64()
        );
        Ok(results)
    }
}

/// Check every input before anything runs; report the first missing one
fn verify_inputs(requests: &[DocumentRequest]) -> Result<()> {
    let missing: Vec<&DocumentRequest> = requests.iter().filter(|r| !r.path().is_file()).collect();
    for request in &missing {
        tracing::error!("File not found: {}", request.path().display());
    }
    match missing.first() {
        Some(request) => Err(OcrError::InputNotFound {
            path: request.path.clone(),
        }),
        None => Ok(()),
    }
}

/// Task boundary: every outcome, including a panic, becomes a record
fn process_document(
    extractor: &PageExtractor,
    capability: &CapabilityState,
    request: &DocumentRequest,
) -> DocumentResult {
    let file = request.display_name();
    tracing::debug!("Starting {}", file);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(request.path(), capability)));
    match outcome {
        Ok(Ok(text)) => {
            tracing::debug!("Finished {}", file);
            DocumentResult::success(file, text)
        }
        Ok(Err(e)) => {
            tracing::error!("Error processing {}: {}", file, e);
            DocumentResult::failure(file, e.to_string())
        }
        Err(payload) => {
            let message = format!("internal error: {}", panic_message(payload.as_ref()));
            tracing::error!("Error processing {}: {}", file, message);
            DocumentResult::failure(file, message)
        }
    }
}

/// Re-emit completion-ordered results in submission order
fn fan_in(requests: &[DocumentRequest], rx: mpsc::Receiver<(usize, DocumentResult)>) -> Vec<DocumentResult> {
    let mut slots: Vec<Option<DocumentResult>> = vec![None; requests.len()];
    for (index, result) in rx {
        slots[index] = Some(result);
    }

    slots
        .into_iter()
        .zip(requests)
        .map(|(slot, request)| {
            slot.unwrap_or_else(|| {
                DocumentResult::failure(request.display_name(), "worker exited without reporting a result")
            })
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_in_restores_submission_order() {
        let requests: Vec<DocumentRequest> = ["a.pdf", "b.pdf", "c.pdf"].into_iter().map(DocumentRequest::from).collect();
        let (tx, rx) = mpsc::channel();
        tx.send((2, DocumentResult::success("c.pdf", "C"))).unwrap();
        tx.send((0, DocumentResult::success("a.pdf", "A"))).unwrap();
        tx.send((1, DocumentResult::failure("b.pdf", "boom"))).unwrap();
        drop(tx);

        let results = fan_in(&requests, rx);
        let files: Vec<_> = results.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(files, ["a.pdf", "b.pdf", "c.pdf"]);
        assert_eq!(results[1].error(), Some("boom"));
    }

    #[test]
    fn test_fan_in_fills_unreported_slots() {
        let requests = vec![DocumentRequest::from("a.pdf")];
        let (tx, rx) = mpsc::channel::<(usize, DocumentResult)>();
        drop(tx);
        let results = fan_in(&requests, rx);
        assert_eq!(results.len(), 1);
        assert!(!results[0].is_success());
    }

    #[test]
    fn test_verify_inputs_reports_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.pdf");
        std::fs::write(&present, b"%PDF").unwrap();
        let missing = dir.path().join("missing.pdf");

        let requests = vec![DocumentRequest::new(&present), DocumentRequest::new(&missing)];
        match verify_inputs(&requests).unwrap_err() {
            OcrError::InputNotFound { path } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
        assert!(verify_inputs(&requests[..1]).is_ok());
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("bad page");
        assert_eq!(panic_message(payload.as_ref()), "bad page");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
    }
}
