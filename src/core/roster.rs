use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use super::record::{CharacterRecord, description_files};

const MAX_TRAITS: usize = 8;

/// Summary line for one locally described character.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub code: String,
    pub name: String,
    pub age: Option<i64>,
    pub traits: Vec<String>,
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Roster {
    pub count: usize,
    pub characters: Vec<RosterEntry>,
}

/// Summarize every readable description under `root`, sorted by name
/// (case-insensitive). Unreadable files are skipped.
pub fn list_characters(root: &Path) -> Roster {
    let mut characters: Vec<RosterEntry> = description_files(root)
        .iter()
        .filter_map(|path| {
            let text = std::fs::read_to_string(path).ok()?;
            match CharacterRecord::parse(path, &text) {
                Ok(record) => Some(entry_for(path, &record)),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "skipping description");
                    None
                }
            }
        })
        .collect();
    characters.sort_by_key(|e| e.name.to_lowercase());

    Roster {
        count: characters.len(),
        characters,
    }
}

fn entry_for(path: &Path, record: &CharacterRecord) -> RosterEntry {
    let code = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| record.code.clone());
    let name = match record.get("name") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => code.clone(),
    };
    let personality = ["personality", "persona"]
        .iter()
        .filter_map(|k| record.get(k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or("");

    RosterEntry {
        code,
        name,
        age: record.get("age").and_then(parse_age),
        traits: extract_traits(personality),
        path: path.to_path_buf(),
    }
}

fn parse_age(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Pull up to eight traits from free-form personality text.
///
/// Recognizes `Positive:` / `Negative:` sections (inline or as headings); text
/// without sections is split on commas as a whole.
pub fn extract_traits(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut sections: Vec<(String, String)> = Vec::new();
    let mut current: Option<usize> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(heading) = line.strip_suffix(':').filter(|h| !h.contains(':')) {
            current = Some(upsert(&mut sections, heading, String::new()));
            continue;
        }
        if line.starts_with("Positive:") || line.starts_with("Negative:") {
            if let Some((key, rest)) = line.split_once(':') {
                current = Some(upsert(&mut sections, key.trim(), rest.trim().to_string()));
                continue;
            }
        }
        if let Some(idx) = current {
            let body = &mut sections[idx].1;
            body.push(' ');
            body.push_str(line);
        }
    }

    let mut traits: Vec<String> = ["Positive", "Negative"]
        .iter()
        .filter_map(|name| sections.iter().find(|(k, _)| k == name))
        .flat_map(|(_, body)| split_commas(body))
        .collect();

    if traits.is_empty() {
        traits = split_commas(&text.replace('\n', " "));
    }
    traits.truncate(MAX_TRAITS);
    traits
}

fn upsert(sections: &mut Vec<(String, String)>, key: &str, body: String) -> usize {
    match sections.iter().position(|(k, _)| k == key) {
        Some(idx) => {
            sections[idx].1 = body;
            idx
        }
        None => {
            sections.push((key.to_string(), body));
            sections.len() - 1
        }
    }
}

fn split_commas(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
