//! Vigil: signature and heuristic file scanner.
//!
//! This is the main entry point for the CLI application.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use vigil::audit::{self, AuditSink, EventLevel, JsonLineAudit};
use vigil::core::config::Config;
use vigil::core::error::{Error, Result};
use vigil::core::types::{ScanReport, ScanTally};
use vigil::detection::{SignatureStore, UpdateCoordinator};
use vigil::quarantine::QuarantineVault;
use vigil::scanner::Classifier;
use vigil::ui::cli::{Cli, Commands, ConfigAction, OutputFormat, QuarantineAction};
use vigil::ui::Console;
use vigil::utils::logging::{init_logging, LogConfig};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.report_line());
            if let Some(hint) = e.suggestion() {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(Config::default_config_path);
    let config = Arc::new(Config::load_or_default_from(&config_path));

    // Initialize logging based on verbosity
    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::from_config(&config)
    };
    init_logging(log_config);

    log::debug!("Vigil v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Configuration loaded from {:?}", config_path);

    let console = Console::default();
    let audit: Arc<dyn AuditSink> = Arc::new(JsonLineAudit::from_config(&config.logging));

    let Some(command) = cli.command else {
        println!("Vigil - signature and heuristic file scanner");
        println!();
        println!("Use --help for usage information");
        println!();
        println!("Quick start:");
        println!("  vigil scan <path>            Scan a file or directory");
        println!("  vigil update                 Update signatures");
        println!("  vigil quarantine list        View quarantined items");
        println!("  vigil logs                   Show scan history");
        return Ok(());
    };

    match command {
        Commands::Scan {
            path,
            yes,
            no_action,
        } => {
            let store = open_store(&config)?;
            startup_update_check(&config, &store).await;
            run_scan(
                config, store, audit, console, &path, yes, no_action, cli.format,
            )
            .await
        }
        Commands::Update { force, import } => {
            let store = open_store(&config)?;
            run_update(&config, store, audit, console, force, import, cli.format).await
        }
        Commands::Quarantine { action } => run_quarantine(&config, audit, console, action, cli.format),
        Commands::Logs { limit } => run_logs(&config, console, limit, cli.format),
        Commands::Config { action } => run_config(action, &config, &config_path),
        Commands::Info => {
            let store = open_store(&config)?;
            startup_update_check(&config, &store).await;
            run_info(&config, &config_path, &store, cli.format)
        }
    }
}

/// Open the signature store and load its database.
fn open_store(config: &Config) -> Result<Arc<SignatureStore>> {
    let store = SignatureStore::open(config.signatures.clone())?;
    let info = store.info()?;
    log::info!("Signatures loaded: {}", info);
    Ok(Arc::new(store))
}

/// Non-forced update when the config asks for one at startup.
async fn startup_update_check(config: &Config, store: &Arc<SignatureStore>) {
    if !config.updates.check_on_startup {
        return;
    }

    match UpdateCoordinator::new(Arc::clone(store), &config.updates) {
        Ok(updater) => {
            if updater.update(false).await {
                log::info!("Signatures updated at startup");
            }
        }
        Err(e) => log::warn!("Skipping startup update check: {}", e),
    }
}

/// Scan a file or directory and act on detections.
#[allow(clippy::too_many_arguments)]
async fn run_scan(
    config: Arc<Config>,
    store: Arc<SignatureStore>,
    audit: Arc<dyn AuditSink>,
    console: Console,
    path: &Path,
    yes: bool,
    no_action: bool,
    format: OutputFormat,
) -> Result<()> {
    if !path.exists() {
        audit.record_event(
            EventLevel::Error,
            &format!("Scan target {} does not exist", path.display()),
        );
        return Err(Error::PathNotFound(path.to_path_buf()));
    }

    let classifier = Classifier::new(Arc::clone(&config), store);
    let start = Instant::now();

    if format == OutputFormat::Text {
        console.info(&format!("Starting scan of: {}", path.display()));
    }

    let reports: Vec<ScanReport> = if path.is_dir() {
        let mut reports: Vec<ScanReport> =
            classifier.scan_directory(path).await?.into_values().collect();
        reports.sort_by(|a, b| a.path.cmp(&b.path));
        reports
    } else {
        let target = path.to_path_buf();
        let report = tokio::task::spawn_blocking(move || classifier.scan_file(&target))
            .await
            .map_err(|e| Error::Internal(format!("Scan task failed: {}", e)))?;
        vec![report]
    };

    for report in &reports {
        audit.record_scan(report);
    }

    let tally = ScanTally::from_reports(&reports);
    let elapsed = start.elapsed();
    audit.record_event(
        EventLevel::Info,
        &format!(
            "Scan of {} finished: {} files, {} infected, {} heuristic, {} errors",
            path.display(),
            tally.scanned,
            tally.infected,
            tally.heuristic,
            tally.errors
        ),
    );

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "reports": reports,
                "summary": tally,
                "duration_secs": elapsed.as_secs_f64(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            for report in &reports {
                console.print_report(report);
            }
            console.print_summary(&tally);
            console.info(&format!("Scan finished in {:.2} seconds.", elapsed.as_secs_f64()));
        }
    }

    // Prompts would corrupt JSON output, so JSON mode only acts with --yes
    let interactive = format == OutputFormat::Text;
    if no_action || (!yes && !interactive) {
        return Ok(());
    }

    let detections: Vec<&ScanReport> = reports.iter().filter(|r| r.status.is_detection()).collect();
    if detections.is_empty() {
        return Ok(());
    }

    let vault = QuarantineVault::from_config(&config.quarantine)?;
    for report in detections {
        let question = format!("'{}' detected. Quarantine it?", report.path.display());
        if !yes && !console.ask_yes_no(&question) {
            continue;
        }

        match vault.quarantine(report) {
            Ok(item) => {
                if interactive {
                    console.success(&format!(
                        "Quarantined {} (id {})",
                        report.path.display(),
                        item.id
                    ));
                }
                audit.record_event(
                    EventLevel::Info,
                    &format!("Quarantined {} as {}", report.path.display(), item.id),
                );
            }
            Err(e) => {
                console.error(&format!("Failed to quarantine {}: {}", report.path.display(), e));
                audit.record_event(EventLevel::Error, &e.to_string());
            }
        }
    }

    Ok(())
}

/// Update signatures from the remote source or a local file.
async fn run_update(
    config: &Config,
    store: Arc<SignatureStore>,
    audit: Arc<dyn AuditSink>,
    console: Console,
    force: bool,
    import: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let updater = UpdateCoordinator::new(Arc::clone(&store), &config.updates)?;

    let updated = match import {
        Some(path) => match updater.import_file(&path, force) {
            Ok(updated) => updated,
            Err(e) => {
                audit.record_event(
                    EventLevel::Error,
                    &format!("Signature import from {} failed: {}", path.display(), e),
                );
                return Err(e);
            }
        },
        None => {
            if format == OutputFormat::Text {
                console.info(&format!("Checking {} for updates...", updater.url()));
            }
            updater.update(force).await
        }
    };

    let info = store.info()?;
    if updated {
        audit.record_event(
            EventLevel::Info,
            &format!("Definitions updated to version {}", info.version),
        );
    } else {
        audit.record_event(EventLevel::Warning, "Definitions not updated");
    }

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "updated": updated, "database": info });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            if updated {
                console.success("Signature definitions updated successfully!");
            } else {
                console.warning("No update applied (already current or update failed).");
            }
            println!("Database: {}", info);
        }
    }

    Ok(())
}

/// Manage quarantine.
fn run_quarantine(
    config: &Config,
    audit: Arc<dyn AuditSink>,
    console: Console,
    action: QuarantineAction,
    format: OutputFormat,
) -> Result<()> {
    let vault = QuarantineVault::from_config(&config.quarantine)?;

    match action {
        QuarantineAction::List => {
            let items = vault.list()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
                OutputFormat::Text if items.is_empty() => console.info("Quarantine is empty."),
                OutputFormat::Text => {
                    for item in &items {
                        console.print_quarantine_item(item);
                    }
                    println!();
                    println!("{} item(s), {} bytes", items.len(), vault.total_size()?);
                }
            }
        }
        QuarantineAction::Restore { id } => {
            let item = vault.restore(&id)?;
            audit.record_event(
                EventLevel::Info,
                &format!("Restored {} to {}", item.id, item.original_path.display()),
            );
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&item)?),
                OutputFormat::Text => {
                    console.success(&format!("Restored {}", item.original_path.display()))
                }
            }
        }
        QuarantineAction::Delete { id } => {
            let item = vault.delete(&id)?;
            audit.record_event(
                EventLevel::Info,
                &format!(
                    "Deleted quarantined item {} ({})",
                    item.id,
                    item.original_path.display()
                ),
            );
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&item)?),
                OutputFormat::Text => console.success(&format!("Deleted {}", item.id)),
            }
        }
    }
    Ok(())
}

/// Show scan history and system events.
fn run_logs(
    config: &Config,
    console: Console,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let log_dir = config.logging.log_dir();
    let mut scans = audit::read_scan_history(&log_dir.join(audit::SCAN_LOG_FILE))?;
    let mut events = audit::read_events(&log_dir.join(audit::EVENT_LOG_FILE))?;

    if let Some(limit) = limit {
        scans = scans.split_off(scans.len().saturating_sub(limit));
        events = events.split_off(events.len().saturating_sub(limit));
    }

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "scans": scans, "events": events });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            console.info("--- Recent Scan History ---");
            if scans.is_empty() {
                console.info("No scan history available.");
            }
            for entry in &scans {
                console.print_scan_entry(entry);
            }

            println!();
            console.info("--- Recent System Events ---");
            if events.is_empty() {
                console.info("No system events available.");
            }
            for entry in &events {
                console.print_event(entry);
            }
        }
    }
    Ok(())
}

/// Handle configuration commands.
fn run_config(action: ConfigAction, config: &Config, config_path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigAction::Reset => {
            log::info!("Resetting configuration to defaults...");
            Config::default().save(config_path)?;
            println!("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }
    Ok(())
}

/// Show application information.
fn run_info(
    config: &Config,
    config_path: &Path,
    store: &SignatureStore,
    format: OutputFormat,
) -> Result<()> {
    let info = store.info()?;

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "config_path": config_path,
            "data_dir": Config::data_dir(),
            "log_dir": config.logging.log_dir(),
            "quarantine_dir": config.quarantine.quarantine_dir(),
            "signature_cache": config.signatures.cache_file(),
            "database": info,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Vigil - signature and heuristic file scanner");
    println!();
    println!("Version:          {}", env!("CARGO_PKG_VERSION"));
    println!("Config Path:      {}", config_path.display());
    println!("Data Directory:   {}", Config::data_dir().display());
    println!("Log Directory:    {}", config.logging.log_dir().display());
    println!("Quarantine Path:  {}", config.quarantine.quarantine_dir().display());
    println!();
    println!("Signatures:");
    println!("  Version:        {}", info.version);
    println!("  Last Updated:   {}", info.last_updated);
    println!("  MD5:            {}", info.md5_count);
    println!("  SHA256:         {}", info.sha256_count);
    println!("  Cache:          {}", config.signatures.cache_file().display());
    println!("  Update URL:     {}", config.updates.update_url);
    println!();
    println!("Detection Settings:");
    println!("  Entropy:        > {:.2}", config.detection.entropy_threshold);
    println!("  Sniffer:        {:?}", config.detection.sniffer);
    println!("  Threads:        {}", config.scan.scan_threads);
    Ok(())
}
