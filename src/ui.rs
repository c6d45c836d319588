use colored::Colorize;
use converge::{Outcome, ResourceReport, RunReport, RunStatus};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.len()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// One line per resource, in execution order.
pub fn resource_line(report: &ResourceReport) {
    let label = format!("{} '{}'", report.kind, report.id);
    match &report.outcome {
        Outcome::Applied => println!("{} {}", "✓".green(), label),
        Outcome::Unchanged => println!("{} {} {}", "○".dimmed(), label, "(unchanged)".dimmed()),
        Outcome::Skipped { reason } => {
            println!("{} {} {}", "⊘".yellow(), label, format!("({reason})").dimmed());
        }
    }
}

/// Final per-run summary.
pub fn run_summary(report: &RunReport) {
    match &report.status {
        RunStatus::PlatformSkipped { reason } => {
            warn(&format!("run skipped: {reason}"));
        }
        RunStatus::Converged => {
            println!();
            println!(
                "{} applied, {} unchanged, {} skipped",
                report.applied().to_string().green().bold(),
                report.unchanged(),
                report.skipped()
            );
        }
    }
}
