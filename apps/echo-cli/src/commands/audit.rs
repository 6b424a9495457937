// audit.rs — Audit subcommands: verify, tail.

use clap::Subcommand;
use echo_audit::{ActivityLog, ActivityRecord, AuditError, RecordKind};
use echo_authority::EchoConfig;

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Verify the activity log hash chain integrity.
    Verify {
        /// Path to activity log (defaults to .echo/activity.jsonl).
        #[arg(long)]
        log: Option<String>,
    },
    /// Show recent activity records.
    Tail {
        /// Path to activity log (defaults to .echo/activity.jsonl).
        #[arg(long)]
        log: Option<String>,
        /// Number of records to show.
        #[arg(short, default_value = "10")]
        n: usize,
    },
}

pub fn execute(cmd: &AuditCommands, config: &EchoConfig) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Verify { log } => {
            let path = log
                .as_ref()
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|| config.activity_log.clone());

            if !path.exists() {
                println!("No activity log found at {}", path.display());
                return Ok(());
            }

            match ActivityLog::verify_chain(&path) {
                Ok(count) => {
                    println!("Activity log verified: {} record(s), hash chain intact.", count);
                }
                Err(AuditError::IntegrityViolation {
                    line,
                    expected,
                    actual,
                }) => {
                    println!("INTEGRITY VIOLATION at line {}:", line);
                    println!("  Expected previous_hash: {}", expected);
                    println!("  Actual previous_hash:   {}", actual);
                    println!();
                    println!("The activity log may have been tampered with.");
                    anyhow::bail!("Activity log integrity check failed");
                }
                Err(e) => return Err(e.into()),
            }
        }

        AuditCommands::Tail { log, n } => {
            let path = log
                .as_ref()
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|| config.activity_log.clone());

            if !path.exists() {
                println!("No activity log found at {}", path.display());
                return Ok(());
            }

            let recent = ActivityLog::tail(&path, *n)?;
            if recent.is_empty() {
                println!("No activity records.");
                return Ok(());
            }

            println!("{:<20} {:<16} {:<11} DETAIL", "TIMESTAMP", "KIND", "STATUS");
            println!("{}", "-".repeat(80));

            for record in &recent {
                println!(
                    "{:<20} {:<16} {:<11} {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    kind_label(record.kind),
                    status_label(record),
                    detail(record),
                );
            }
        }
    }

    Ok(())
}

fn kind_label(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Decision => "decision",
        RecordKind::PolicySigned => "policy_signed",
        RecordKind::PolicyCleared => "policy_cleared",
        RecordKind::IdentityChanged => "identity_changed",
    }
}

fn status_label(record: &ActivityRecord) -> &'static str {
    match &record.event {
        Some(event) if event.is_authorized() => "authorized",
        Some(_) => "rejected",
        None => "-",
    }
}

fn detail(record: &ActivityRecord) -> String {
    match &record.event {
        Some(event) => {
            let mut line = format!("{} -> {}", event.action.purpose, event.action.target);
            if let Some(amount) = event.action.amount {
                line.push_str(&format!(" ({})", amount));
            }
            if let Some(rule) = event.violated_rule {
                line.push_str(&format!(" [{}]", rule));
            }
            line
        }
        None => record.detail.clone().unwrap_or_default(),
    }
}
