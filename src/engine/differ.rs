//! Diff display - grouped by category, with value-level detail

use colored::Colorize;
use declarative::{Change, ChangeKind, ExecutionPlan};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

/// Values of this category are never printed
const HIDDEN_VALUES: &str = "secrets";

/// Longest inline rendering of an added value
const INLINE_LIMIT: usize = 60;

/// Pretty JSON, one element per line, so value diffs read line by line
fn pretty(value: &Value) -> String {
    let mut text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    text.push('\n');
    text
}

/// Changed lines between two values, prefixed with `-` or `+`
pub fn value_lines(current: &Value, new: &Value) -> Vec<(ChangeTag, String)> {
    let old_text = pretty(current);
    let new_text = pretty(new);
    let diff = TextDiff::from_lines(&old_text, &new_text);

    diff.iter_all_changes()
        .filter_map(|change| {
            let line = change.value().trim_end_matches('\n');
            match change.tag() {
                ChangeTag::Delete => Some((ChangeTag::Delete, format!("- {line}"))),
                ChangeTag::Insert => Some((ChangeTag::Insert, format!("+ {line}"))),
                ChangeTag::Equal => None,
            }
        })
        .collect()
}

/// Short summary shown next to the key
pub fn inline_detail(category: &str, change: &Change) -> String {
    if category == HIDDEN_VALUES {
        return match change.kind {
            ChangeKind::Remove => "(not automated)".to_string(),
            _ => "(value hidden)".to_string(),
        };
    }
    match (&change.kind, &change.new_value) {
        (ChangeKind::Add, Some(value)) => {
            let text = value.to_string();
            if text.chars().count() > INLINE_LIMIT {
                let cut: String = text.chars().take(INLINE_LIMIT).collect();
                format!("{cut}…")
            } else {
                text
            }
        }
        (ChangeKind::Remove, _) => "(not declared)".to_string(),
        _ => String::new(),
    }
}

fn symbol(kind: ChangeKind) -> colored::ColoredString {
    match kind {
        ChangeKind::Add => kind.symbol().green(),
        ChangeKind::Update => kind.symbol().yellow(),
        ChangeKind::Remove => kind.symbol().red(),
    }
}

/// Print a plan in a user-friendly format
pub fn display_plan(plan: &ExecutionPlan<'_>) {
    if plan.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Organization Diff".bold()
    );
    println!("│");

    for category in plan.categories.iter().filter(|c| !c.changes.is_empty()) {
        let name = category.category();
        println!("│ {}", name.bold());

        for change in &category.changes {
            println!(
                "│   {} {:<30} {}",
                symbol(change.kind),
                change.key,
                inline_detail(name, change).dimmed()
            );

            if change.kind == ChangeKind::Update
                && name != HIDDEN_VALUES
                && let (Some(current), Some(new)) = (&change.current_value, &change.new_value)
            {
                for (tag, line) in value_lines(current, new) {
                    let line = match tag {
                        ChangeTag::Delete => line.red(),
                        _ => line.green(),
                    };
                    println!("│       {line}");
                }
            }
        }
        println!("│");
    }

    let summary = plan.summary();
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} to add, {} to update, {} to remove)",
        summary.total().to_string().bold(),
        summary.additions.to_string().green(),
        summary.updates.to_string().yellow(),
        summary.removals.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}
