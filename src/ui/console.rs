//! Console rendering of scan results, history and prompts.

use crate::audit::{EventEntry, EventLevel, ScanEntry};
use crate::core::types::{ScanReport, ScanStatus, ScanTally};
use crate::quarantine::QuarantineItem;
use std::io::{self, BufRead, Write};

/// ANSI colors used for console output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
}

impl Color {
    fn code(&self) -> &'static str {
        match self {
            Color::Red => "\x1b[31m",
            Color::Green => "\x1b[32m",
            Color::Yellow => "\x1b[33m",
            Color::Blue => "\x1b[34m",
            Color::Magenta => "\x1b[35m",
            Color::Cyan => "\x1b[36m",
        }
    }
}

const RESET: &str = "\x1b[0m";

/// Color for a verdict.
pub fn status_color(status: ScanStatus) -> Color {
    match status {
        ScanStatus::Infected | ScanStatus::Error => Color::Red,
        ScanStatus::HeuristicDetected => Color::Magenta,
        ScanStatus::Clean => Color::Green,
        ScanStatus::NotFound | ScanStatus::NotFile => Color::Yellow,
    }
}

/// One-line description of a report, without color.
pub fn format_report(report: &ScanReport) -> String {
    let path = report.path.display();
    match report.status {
        ScanStatus::Infected => format!(
            "[INFECTED] {} -> {}",
            path,
            report.threat_name.as_deref().unwrap_or("unknown")
        ),
        ScanStatus::HeuristicDetected => format!(
            "[HEURISTIC] {} -> {}",
            path,
            report.threat_name.as_deref().unwrap_or("suspicious")
        ),
        ScanStatus::Clean => format!("[CLEAN] {}", path),
        ScanStatus::NotFound => format!("[NOT FOUND] {}", path),
        ScanStatus::NotFile => format!("[SKIPPED] {} is not a regular file", path),
        ScanStatus::Error => format!(
            "[ERROR] {} -> {}",
            path,
            report.threat_name.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// One-line description of a scan history entry, without color.
pub fn format_scan_entry(entry: &ScanEntry) -> String {
    let mut line = format!(
        "[{}] {} -> {} ({})",
        entry.timestamp,
        entry.filepath,
        entry.status,
        entry.threat.as_deref().unwrap_or("N/A")
    );
    if !entry.heuristics.is_empty() {
        line.push_str(&format!(" (Heuristics: {})", entry.heuristics.join(", ")));
    }
    line
}

/// Interpret an answer to a yes/no prompt.
pub fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Colored console writer.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    color: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Console {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            format!("{}{}{}", color.code(), text, RESET)
        } else {
            text.to_string()
        }
    }

    pub fn info(&self, message: &str) {
        println!("{}", self.paint(message, Color::Blue));
    }

    pub fn success(&self, message: &str) {
        println!("{}", self.paint(message, Color::Green));
    }

    pub fn warning(&self, message: &str) {
        println!("{}", self.paint(message, Color::Yellow));
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", self.paint(message, Color::Red));
    }

    /// Print a single verdict with its heuristic findings.
    pub fn print_report(&self, report: &ScanReport) {
        println!(
            "{}",
            self.paint(&format_report(report), status_color(report.status))
        );
        for finding in &report.findings {
            println!("    - {}", finding);
        }
    }

    /// Print the totals of a scan.
    pub fn print_summary(&self, tally: &ScanTally) {
        println!();
        println!("=== Scan Complete ===");
        println!("Files scanned:   {}", tally.scanned);
        if tally.infected > 0 {
            self.error(&format!("Infected:        {}", tally.infected));
        }
        if tally.heuristic > 0 {
            println!(
                "{}",
                self.paint(
                    &format!("Heuristic hits:  {}", tally.heuristic),
                    Color::Magenta
                )
            );
        }
        if tally.errors > 0 {
            self.warning(&format!("Errors:          {}", tally.errors));
        }
        if tally.infected == 0 && tally.heuristic == 0 {
            self.success("No threats found.");
        }
    }

    pub fn print_scan_entry(&self, entry: &ScanEntry) {
        let color = match entry.status {
            ScanStatus::Infected => Color::Red,
            ScanStatus::HeuristicDetected => Color::Magenta,
            _ => Color::Cyan,
        };
        println!("{}", self.paint(&format_scan_entry(entry), color));
    }

    pub fn print_event(&self, entry: &EventEntry) {
        let color = match entry.level {
            EventLevel::Info => Color::Blue,
            EventLevel::Warning => Color::Yellow,
            EventLevel::Error => Color::Red,
        };
        let line = format!("[{}] [{}] {}", entry.timestamp, entry.level, entry.description);
        println!("{}", self.paint(&line, color));
    }

    pub fn print_quarantine_item(&self, item: &QuarantineItem) {
        println!("{}", self.paint(&item.id, Color::Cyan));
        println!("  Original path:  {}", item.original_path.display());
        println!("  Threat:         {}", item.threat_name);
        println!("  Size:           {} bytes", item.size);
        println!("  SHA256:         {}", item.sha256);
        println!(
            "  Quarantined:    {}",
            item.quarantined_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    /// Ask a yes/no question on stdin. End of input counts as "no".
    pub fn ask_yes_no(&self, prompt: &str) -> bool {
        let stdin = io::stdin();
        let stdout = io::stdout();
        ask_yes_no_with(prompt, &mut stdin.lock(), &mut stdout.lock())
    }
}

/// Prompt until a yes/no answer is read from `input`.
pub fn ask_yes_no_with<R: BufRead, W: Write>(prompt: &str, input: &mut R, output: &mut W) -> bool {
    loop {
        let _ = write!(output, "{} (y/n): ", prompt);
        let _ = output.flush();

        let mut answer = String::new();
        match input.read_line(&mut answer) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }

        match parse_yes_no(&answer) {
            Some(choice) => return choice,
            None => {
                let _ = writeln!(output, "Please answer 'y' or 'n'.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::EntryType;
    use std::io::Cursor;
    use std::path::Path;

    #[test]
    fn test_format_report() {
        let report = ScanReport::new(
            Path::new("/data/eicar.com"),
            ScanStatus::Infected,
            Some("EICAR-Test-File".to_string()),
            Vec::new(),
        );
        assert_eq!(format_report(&report), "[INFECTED] /data/eicar.com -> EICAR-Test-File");
        assert_eq!(
            format_report(&ScanReport::not_found(Path::new("/x"))),
            "[NOT FOUND] /x"
        );
        assert_eq!(status_color(ScanStatus::HeuristicDetected), Color::Magenta);
    }

    #[test]
    fn test_format_scan_entry() {
        let entry = ScanEntry {
            timestamp: "2024-01-01T00:00:00".to_string(),
            entry_type: EntryType::ScanResult,
            filepath: "/a.txt".to_string(),
            status: ScanStatus::HeuristicDetected,
            threat: Some("Heuristic.Suspicious (1 finding(s): keyword)".to_string()),
            heuristics: vec!["Suspicious keywords: curl ".to_string()],
        };
        assert_eq!(
            format_scan_entry(&entry),
            "[2024-01-01T00:00:00] /a.txt -> HEURISTIC_DETECTED (Heuristic.Suspicious (1 finding(s): keyword)) (Heuristics: Suspicious keywords: curl )"
        );
    }

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no("Y\n"), Some(true));
        assert_eq!(parse_yes_no(" no "), Some(false));
        assert_eq!(parse_yes_no("maybe"), None);
    }

    #[test]
    fn test_ask_yes_no_retries() {
        let mut input = Cursor::new("what\ny\n");
        let mut output = Vec::new();
        assert!(ask_yes_no_with("Quarantine?", &mut input, &mut output));
        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("Please answer"));
    }

    #[test]
    fn test_ask_yes_no_eof_is_no() {
        let mut input = Cursor::new("");
        let mut output = Vec::new();
        assert!(!ask_yes_no_with("Quarantine?", &mut input, &mut output));
    }

    #[test]
    fn test_paint() {
        assert_eq!(Console::new(false).paint("x", Color::Red), "x");
        assert_eq!(Console::new(true).paint("x", Color::Red), "\x1b[31mx\x1b[0m");
    }
}
