//! File classification: signature lookup plus heuristics, merged into one verdict.

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::{ScanReport, ScanStatus};
use crate::detection::database::{SignatureDatabase, SignatureStore};
use crate::detection::heuristic::{Finding, HeuristicAnalyzer};
use crate::detection::signature::HashAlgorithm;
use crate::utils::hash::HashCalculator;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use walkdir::WalkDir;

/// Upper bound on directory scan workers.
const MAX_WORKERS: usize = 8;

/// Threat label for a file flagged only by heuristics.
pub fn heuristic_label(findings: &[Finding]) -> String {
    let categories: Vec<&str> = findings.iter().map(|f| f.category.label()).collect();
    format!(
        "Heuristic.Suspicious ({} finding(s): {})",
        findings.len(),
        categories.join(", ")
    )
}

/// Error text including the underlying cause.
fn describe(err: &Error) -> String {
    match std::error::Error::source(err) {
        Some(source) => format!("{} ({})", err, source),
        None => err.to_string(),
    }
}

/// Turns paths into [`ScanReport`]s.
///
/// Cloning is cheap; clones share the store, the analyzer and the config.
#[derive(Clone)]
pub struct Classifier {
    config: Arc<Config>,
    store: Arc<SignatureStore>,
    heuristics: Arc<HeuristicAnalyzer>,
}

impl Classifier {
    /// Create a classifier using the configured heuristics.
    pub fn new(config: Arc<Config>, store: Arc<SignatureStore>) -> Self {
        let heuristics = HeuristicAnalyzer::new(&config.detection);
        Self::with_heuristics(config, store, heuristics)
    }

    /// Create a classifier with a prepared heuristic analyzer.
    pub fn with_heuristics(
        config: Arc<Config>,
        store: Arc<SignatureStore>,
        heuristics: HeuristicAnalyzer,
    ) -> Self {
        Self {
            config,
            store,
            heuristics: Arc::new(heuristics),
        }
    }

    pub fn store(&self) -> &Arc<SignatureStore> {
        &self.store
    }

    /// Classify one path against the current signature snapshot.
    pub fn scan_file(&self, path: &Path) -> ScanReport {
        match self.store.snapshot() {
            Ok(db) => self.scan_with_snapshot(path, &db),
            Err(e) => ScanReport::error(path, describe(&e)),
        }
    }

    /// Classify one path against a given snapshot.
    pub fn scan_with_snapshot(&self, path: &Path, db: &SignatureDatabase) -> ScanReport {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return ScanReport::not_found(path)
            }
            Err(e) => return ScanReport::error(path, describe(&Error::file_read(path, e))),
        };

        if !metadata.is_file() {
            return ScanReport::not_file(path);
        }

        let hashes = match HashCalculator::hash_file(path) {
            Ok(hashes) => hashes,
            Err(e) => {
                log::warn!("Could not hash {:?}: {}", path, e);
                return ScanReport::error(path, describe(&e));
            }
        };

        let threat = HashAlgorithm::ALL.iter().find_map(|&algorithm| {
            db.lookup(hashes.digest(algorithm), algorithm)
                .map(|name| (algorithm, name.to_string()))
        });

        let findings = if threat.is_none() || self.config.detection.heuristics_on_signature_hit {
            self.heuristics.analyze(path)
        } else {
            Vec::new()
        };
        let finding_texts: Vec<String> = findings.iter().map(ToString::to_string).collect();

        match threat {
            Some((algorithm, name)) => {
                log::info!("Threat detected: {} in {:?} ({} match)", name, path, algorithm);
                ScanReport::new(path, ScanStatus::Infected, Some(name), finding_texts)
            }
            None if !findings.is_empty() => {
                let label = heuristic_label(&findings);
                log::info!("Heuristic detection: {} in {:?}", label, path);
                ScanReport::new(path, ScanStatus::HeuristicDetected, Some(label), finding_texts)
            }
            None => ScanReport::new(path, ScanStatus::Clean, None, Vec::new()),
        }
    }

    /// Scan every regular file under `root` with a bounded worker pool.
    pub async fn scan_directory(&self, root: &Path) -> Result<HashMap<PathBuf, ScanReport>> {
        if !root.exists() {
            return Err(Error::PathNotFound(root.to_path_buf()));
        }

        // One snapshot for the whole scan; updates do not affect it
        let db = self.store.snapshot()?;

        let file_queue = Arc::new(Mutex::new(self.collect_files(root)));
        let total_files = file_queue
            .lock()
            .map_err(|_| Error::lock_poisoned("file queue (count)"))?
            .len();
        log::info!("Found {} files to scan under {:?}", total_files, root);

        let (tx, mut rx) = mpsc::channel::<(PathBuf, ScanReport)>(1000);

        let num_workers = self.config.scan.scan_threads.clamp(1, MAX_WORKERS);
        let mut handles = Vec::with_capacity(num_workers);

        for _ in 0..num_workers {
            let queue = Arc::clone(&file_queue);
            let db = Arc::clone(&db);
            let classifier = self.clone();
            let tx = tx.clone();

            handles.push(tokio::task::spawn_blocking(move || loop {
                let next = match queue.lock() {
                    Ok(mut q) => q.pop_front(),
                    Err(_) => {
                        log::error!("File queue lock poisoned in worker");
                        break;
                    }
                };

                let Some(path) = next else {
                    break; // Queue empty
                };

                let report = classifier.scan_with_snapshot(&path, &db);
                if tx.blocking_send((path, report)).is_err() {
                    log::error!("Result channel closed; stopping worker");
                    break;
                }
            }));
        }

        // Drop the sender so the channel closes when workers finish
        drop(tx);

        let mut results = HashMap::with_capacity(total_files);
        while let Some((path, report)) = rx.recv().await {
            results.insert(path, report);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                log::error!("Scan worker failed: {}", e);
            }
        }

        log::info!(
            "Scan of {:?} completed: {} files, {} detections",
            root,
            results.len(),
            results.values().filter(|r| r.status.is_detection()).count()
        );

        Ok(results)
    }

    /// Walk `root` and queue every regular file. Traversal errors are skipped.
    fn collect_files(&self, root: &Path) -> VecDeque<PathBuf> {
        let walker = WalkDir::new(root).follow_links(self.config.scan.follow_symlinks);
        let mut queue = VecDeque::new();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_file() {
                queue.push_back(entry.into_path());
            }
        }

        queue
    }
}
