//! Guessing a destination path for a fenced block that names none.

use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use regex::Regex;

static DEFAULT_EXPORT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)export\s+default\s+(?:function\s+|class\s+)?([A-Z][A-Za-z0-9_]*)")
        .expect("valid export regex")
});

static DECLARED_COMPONENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:export\s+)?(?:function|const|class)\s+([A-Z][A-Za-z0-9_]*)")
        .expect("valid component regex")
});

static JSX_RETURN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:return|=>)\s*\(?\s*<[A-Za-z>]").expect("valid jsx regex")
});

fn component_extension(language: &str) -> Option<&'static str> {
    match language {
        "jsx" | "js" | "javascript" | "react" => Some("jsx"),
        "tsx" | "ts" | "typescript" => Some("tsx"),
        _ => None,
    }
}

fn is_package_manifest(code: &str) -> bool {
    code.contains("\"name\"")
        && ["\"dependencies\"", "\"devDependencies\"", "\"scripts\""]
            .iter()
            .any(|key| code.contains(key))
}

fn is_html_document(code: &str) -> bool {
    let head = code.trim_start().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Pick a path for `code` from its fence language and shape, or `None` if
/// nothing about it suggests a file.
pub(crate) fn infer_path(language: &str, code: &str) -> Option<String> {
    let language = language.to_ascii_lowercase();

    if language == "json" && is_package_manifest(code) {
        return Some("/package.json".to_string());
    }
    if language == "html" || is_html_document(code) {
        return Some("/index.html".to_string());
    }
    if language == "css" {
        return Some("/styles.css".to_string());
    }

    let ext = component_extension(&language)?;
    if !JSX_RETURN.is_match(code) {
        return None;
    }
    let name = DEFAULT_EXPORT_NAME
        .captures(code)
        .or_else(|| DECLARED_COMPONENT.captures(code))
        .map(|caps| caps[1].to_string());
    Some(match name.as_deref() {
        Some("App") => format!("/App.{ext}"),
        Some(name) => format!("/components/{name}.{ext}"),
        None => format!("/component-{}.{ext}", unix_millis()),
    })
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
