//! Change report display

use colored::{ColoredString, Colorize};
use declarative::{ChangeReport, FieldChange, Mode, Outcome, ReportEntry, ReportSummary};

/// Symbol and verb for one entry
fn describe(entry: &ReportEntry) -> (ColoredString, String) {
    let creates = entry.changes.is_empty();
    match &entry.outcome {
        Outcome::WouldApply if creates => ("+".green(), "will be created".to_string()),
        Outcome::WouldApply => ("~".yellow(), "will be updated".to_string()),
        Outcome::Applied if creates => ("✓".green(), "created".to_string()),
        Outcome::Applied => ("✓".green(), "updated".to_string()),
        Outcome::NoOp => ("○".dimmed(), "unchanged".to_string()),
        Outcome::Warned => ("⚠".yellow(), "differs, left unchanged".to_string()),
        Outcome::Skipped { because } => ("⊘".yellow(), format!("skipped ({because})")),
        Outcome::Failed { cause } => ("✗".red(), format!("failed: {cause}")),
    }
}

/// Render the report; unchanged tasks are listed only when `verbose`
pub fn display_report(report: &ChangeReport, verbose: bool) {
    let title = match report.mode() {
        Mode::Plan => "Plan",
        Mode::Apply => "Apply",
    };

    println!();
    println!("┌─ {} ─────────────────────────────────────────┐", title.bold());
    println!("│");

    let mut shown = 0;
    for entry in report.entries() {
        if matches!(entry.outcome, Outcome::NoOp) && !verbose {
            continue;
        }
        shown += 1;
        let (symbol, verb) = describe(entry);
        println!("│   {symbol} {:<50} {}", entry.key.to_string(), verb.dimmed());
        if entry.outcome.is_change() || matches!(entry.outcome, Outcome::Warned) {
            for change in &entry.changes {
                display_field_change(change);
            }
        }
    }
    if shown == 0 {
        println!("│   {} No changes needed", "✓".green());
    }

    println!("│");
    println!("├─────────────────────────────────────────────────────┤");
    println!("│ {}", summary_line(&report.summary(), report.mode()));
    println!("└─────────────────────────────────────────────────────┘");
}

fn summary_line(summary: &ReportSummary, mode: Mode) -> String {
    let changed = match mode {
        Mode::Plan => format!("{} to change", summary.would_apply),
        Mode::Apply => format!("{} changed", summary.applied),
    };
    let mut parts = vec![changed.bold().to_string(), format!("{} unchanged", summary.no_op)];
    if summary.warned > 0 {
        parts.push(format!("{} warned", summary.warned).yellow().to_string());
    }
    if summary.skipped > 0 {
        parts.push(format!("{} skipped", summary.skipped).yellow().to_string());
    }
    if summary.failed > 0 {
        parts.push(format!("{} failed", summary.failed).red().to_string());
    }
    parts.join(", ")
}

/// One field; multi-line values get a line diff
fn display_field_change(change: &FieldChange) {
    if !change.from.contains('\n') && !change.to.contains('\n') {
        println!(
            "│       {}: {} → {}",
            change.field,
            change.from.red(),
            change.to.green()
        );
        return;
    }

    println!("│       {}:", change.field);
    let diff = similar::TextDiff::from_lines(&change.from, &change.to);
    for line in diff.iter_all_changes() {
        let text = line.value().trim_end_matches('\n');
        match line.tag() {
            similar::ChangeTag::Delete => println!("│         {}", format!("- {text}").red()),
            similar::ChangeTag::Insert => println!("│         {}", format!("+ {text}").green()),
            similar::ChangeTag::Equal => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{SkipReason, TaskKey, TaskState};

    fn entry(outcome: Outcome, changes: Vec<FieldChange>) -> ReportEntry {
        ReportEntry {
            key: TaskKey::new("Subnet", "a.dev"),
            description: "Subnet a.dev".to_string(),
            outcome,
            changes,
            state: TaskState::Evaluated,
        }
    }

    #[test]
    fn test_create_vs_update() {
        let (_, verb) = describe(&entry(Outcome::WouldApply, Vec::new()));
        assert_eq!(verb, "will be created");

        let change = FieldChange::new("cidr", "10.0.1.0/24", "10.0.2.0/24");
        let (_, verb) = describe(&entry(Outcome::WouldApply, vec![change]));
        assert_eq!(verb, "will be updated");
    }

    #[test]
    fn test_skip_names_dependency() {
        let because = SkipReason::Dependency(TaskKey::new("Network", "dev"));
        let (_, verb) = describe(&entry(Outcome::Skipped { because }, Vec::new()));
        assert_eq!(verb, "skipped (dependency Network/dev did not converge)");
    }

    #[test]
    fn test_summary_line() {
        colored::control::set_override(false);
        let summary = ReportSummary {
            would_apply: 2,
            no_op: 1,
            failed: 1,
            ..ReportSummary::default()
        };
        assert_eq!(
            summary_line(&summary, Mode::Plan),
            "2 to change, 1 unchanged, 1 failed"
        );
    }
}
