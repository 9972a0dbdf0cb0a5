//! Terminal display logic for the domain-lookup CLI.
//!
//! Colored result lines, record details, the bulk summary bar and a
//! spinner for long bulk runs. Uses only the `console` crate.

use console::{pad_str, style, Alignment, Term};
use domain_lookup_lib::{BulkResult, BulkSummary, Cached, ContactInfo, RegistrationRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DOMAIN_WIDTH: usize = 30;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner that writes to stderr so stdout stays clean.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    pub fn start(message: String) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = tokio::spawn(async move {
            let term = Term::stderr();
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let _ = term.clear_line();
                let _ = term.write_str(&format!("{} {}", style(frame).cyan(), message));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Single lookup ────────────────────────────────────────────────────────────

/// Print the outcome of a single resolver call.
pub fn print_lookup_result(
    domain: &str,
    record: Option<&Cached<RegistrationRecord>>,
    show_info: bool,
) {
    let padded = pad_str(domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));

    match record {
        None => println!("  {}  {}", style(&padded).white(), style("AVAILABLE").green().bold()),
        Some(record) => {
            println!(
                "  {}  {}  {}{}",
                style(&padded).white(),
                style("REGISTERED").red().bold(),
                style(format!("via {}", record.source)).dim(),
                if record.is_cached {
                    format!(" {}", style("(cached)").dim())
                } else {
                    String::new()
                },
            );
            if show_info {
                print_record_details(record);
            } else {
                println!("    {}", style(format_record_info(record)).dim());
            }
        }
    }
}

/// Multi-line view of every reported field.
pub fn print_record_details(record: &RegistrationRecord) {
    let label = |name: &str| style(format!("{:<12}", name)).dim().to_string();

    let optional = [
        ("Registrar", &record.registrar),
        ("Created", &record.creation_date),
        ("Expires", &record.expiration_date),
        ("Updated", &record.updated_date),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            println!("    {} {}", label(name), value);
        }
    }

    if !record.name_servers.is_empty() {
        println!("    {} {}", label("Nameservers"), record.name_servers.join(", "));
    }
    if !record.status.is_empty() {
        println!("    {} {}", label("Status"), record.status.join(", "));
    }
    if let Some(dnssec) = record.dnssec {
        println!("    {} {}", label("DNSSEC"), if dnssec { "signed" } else { "unsigned" });
    }

    let contacts = [
        ("Registrant", &record.registrant),
        ("Admin", &record.admin),
        ("Tech", &record.tech),
        ("Billing", &record.billing),
    ];
    for (name, contact) in contacts {
        if let Some(contact) = contact {
            println!("    {} {}", label(name), format_contact(contact));
        }
    }
}

// ── Bulk output ──────────────────────────────────────────────────────────────

/// Print one line of a bulk run.
pub fn print_bulk_result(result: &BulkResult, show_info: bool) {
    let padded = pad_str(&result.domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));
    let cached = if result.cache_hit == Some(true) {
        format!(" {}", style("(cached)").dim())
    } else {
        String::new()
    };

    match (result.success, result.available) {
        (true, Some(true)) => {
            println!("  {}  {}", style(&padded).white(), style("AVAILABLE").green().bold())
        }
        (true, _) => {
            let info = match (&result.record, show_info) {
                (Some(record), true) => format!("  {}", style(format_record_info(record)).dim()),
                _ => String::new(),
            };
            println!(
                "  {}  {}{}{}",
                style(&padded).white(),
                style("REGISTERED").red().bold(),
                cached,
                info
            );
        }
        (false, _) => println!(
            "  {}  {}  {}",
            style(&padded).white(),
            style("FAILED").yellow(),
            style(brief_error(result)).dim(),
        ),
    }
}

/// Print the final summary bar with colored counts.
pub fn print_summary(summary: &BulkSummary) {
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(summary.total).bold(),
        if summary.total == 1 { "" } else { "s" },
        Duration::from_millis(summary.processing_time_ms).as_secs_f64(),
        style("|").dim(),
        style(format!("{} available", summary.available_domains)).green(),
        style("|").dim(),
        style(format!("{} failed", summary.failed)).yellow(),
        style("|").dim(),
        style(format!("{} cached", summary.cache_hits)).dim(),
    );
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Format registrar and dates into a concise string.
pub fn format_record_info(record: &RegistrationRecord) -> String {
    let mut parts = Vec::new();
    if let Some(registrar) = &record.registrar {
        parts.push(format!("Registrar: {}", registrar));
    }
    if let Some(created) = &record.creation_date {
        parts.push(format!("Created: {}", created));
    }
    if let Some(expires) = &record.expiration_date {
        parts.push(format!("Expires: {}", expires));
    }
    if parts.is_empty() {
        "No info available".to_string()
    } else {
        parts.join(", ")
    }
}

fn format_contact(contact: &ContactInfo) -> String {
    [
        contact.name.as_deref(),
        contact.organization.as_deref(),
        contact.email.as_deref(),
        contact.phone.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" / ")
}

/// Short reason for a failed bulk item.
fn brief_error(result: &BulkResult) -> String {
    match &result.error {
        Some(msg) => {
            let m = msg.to_lowercase();
            if m.contains("timeout") || m.contains("timed out") {
                "(timeout)".to_string()
            } else if m.contains("invalid domain") {
                "(invalid domain)".to_string()
            } else if m.contains("network") || m.contains("dns") || m.contains("connect") {
                "(network error)".to_string()
            } else {
                format!("({})", msg)
            }
        }
        None => "(unknown error)".to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use domain_lookup_lib::RecordSource;

    fn failed(error: Option<&str>) -> BulkResult {
        BulkResult {
            error: error.map(String::from),
            ..BulkResult::failed("a.com", None, "", 0)
        }
    }

    #[test]
    fn test_brief_error_timeout() {
        assert_eq!(brief_error(&failed(Some("Timeout after 10s"))), "(timeout)");
    }

    #[test]
    fn test_brief_error_invalid_domain() {
        assert_eq!(
            brief_error(&failed(Some("Invalid domain format"))),
            "(invalid domain)"
        );
    }

    #[test]
    fn test_brief_error_passthrough_and_missing() {
        assert_eq!(brief_error(&failed(Some("boom"))), "(boom)");
        assert_eq!(brief_error(&failed(None)), "(unknown error)");
    }

    #[test]
    fn test_format_record_info_all_fields() {
        let mut record = RegistrationRecord::new("a.com", RecordSource::Rdap);
        record.registrar = Some("GoDaddy".to_string());
        record.creation_date = Some("2020-01-01".to_string());
        record.expiration_date = Some("2025-01-01".to_string());

        let formatted = format_record_info(&record);
        assert!(formatted.contains("Registrar: GoDaddy"));
        assert!(formatted.contains("Created: 2020-01-01"));
        assert!(formatted.contains("Expires: 2025-01-01"));
    }

    #[test]
    fn test_format_record_info_empty() {
        let record = RegistrationRecord::new("a.com", RecordSource::Whois);
        assert_eq!(format_record_info(&record), "No info available");
    }

    #[test]
    fn test_format_contact() {
        let contact = ContactInfo {
            name: Some("Jane Doe".to_string()),
            email: Some("jane@example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(format_contact(&contact), "Jane Doe / jane@example.com");
    }
}
