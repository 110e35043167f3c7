use owo_colors::OwoColorize;
use serde_json::Value;

use storyworld::core::assets::ImageAsset;
use storyworld::core::context::CharacterContext;
use storyworld::core::remote::BootstrapReport;
use storyworld::core::roster::RosterEntry;

/// Render a roster entry as a one-line summary for list output.
pub fn render_roster_line(entry: &RosterEntry) -> String {
    let age = entry
        .age
        .map(|a| a.to_string())
        .unwrap_or_else(|| "-".into());
    let mut line = format!(
        "  {:<8} {:<24} {:>4}",
        entry.code.cyan(),
        entry.name.bold(),
        age
    );
    if !entry.traits.is_empty() {
        line.push_str(&format!("  {}", entry.traits.join(", ").dimmed()));
    }
    line
}

pub fn render_image_line(asset: &ImageAsset) -> String {
    format!(
        "  {:<32} {}",
        asset.file_name,
        asset.mime_type().dimmed()
    )
}

/// Render a built character context: scalar fields first, then the image.
pub fn render_context(ctx: &CharacterContext) -> String {
    let mut lines = vec![format!("  {} {}", "character:".green().bold(), ctx.code)];

    for (key, value) in &ctx.content {
        let rendered = match value {
            Value::String(s) => s.replace('\n', " "),
            Value::Null => "-".into(),
            other => other.to_string(),
        };
        lines.push(format!("    {:<16} {}", key.bold(), truncate(&rendered, 96)));
    }

    match &ctx.image {
        Some(image) => lines.push(format!(
            "  {} {} ({}, {} bytes)",
            "image:".green().bold(),
            image.path.display(),
            image.mime_type,
            image.data.len()
        )),
        None => lines.push(format!("  {} none", "image:".yellow().bold())),
    }
    lines.join("\n")
}

pub fn render_report(report: &BootstrapReport) -> String {
    let images = match report.images {
        Some(n) => format!("{} images", n),
        None => format!("{}", "images unavailable".yellow()),
    };
    format!(
        "  {} {} descriptions, {}",
        "fetch:".green().bold(),
        report.descriptions,
        images
    )
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
