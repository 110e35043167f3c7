// Terse text formatter for MCP responses
//
// State tags: [not_found], [fetch_complete], [fetch_failed]
// Next hints: → next: tool1 | tool2

use storyworld::core::remote::BootstrapReport;

/// Format an unknown character code.
pub fn format_not_found(code: &str) -> String {
    let mut lines = Vec::new();
    lines.push(format!("[not_found] no description for character '{}'", code));
    lines.push("→ next: list_characters | fetch_characters".into());
    lines.join("\n")
}

/// Format a completed bulk fetch.
pub fn format_fetch_report(report: &BootstrapReport) -> String {
    let images = match report.images {
        Some(n) => format!("{} images", n),
        None => "images unavailable".to_string(),
    };
    let mut lines = Vec::new();
    lines.push(format!(
        "[fetch_complete] {} descriptions, {}",
        report.descriptions, images
    ));
    lines.push("→ next: list_characters | get_character_context <code>".into());
    lines.join("\n")
}

/// Format a failed bulk fetch.
pub fn format_fetch_failed(error: &str) -> String {
    let mut lines = Vec::new();
    lines.push(format!("[fetch_failed] {}", error));
    lines.push("? ask user: check network access and the configured repository".into());
    lines.join("\n")
}
