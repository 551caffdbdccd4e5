//! `bolt patch` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bolt_patch::{PatchOptions, apply_diff_patches_with};
use clap::Args;
use serde_json::json;

use crate::input::read_input;
use crate::opts::GlobalOpts;
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct PatchArgs {
    /// File to patch
    pub file: PathBuf,

    /// Text holding SEARCH/REPLACE blocks, or - for stdin
    #[arg(default_value = "-")]
    pub patch: String,

    /// Tolerate whitespace and quote differences when matching
    /// (env: BOLT_FUZZY_PATCH)
    #[arg(long, env = "BOLT_FUZZY_PATCH")]
    pub fuzzy: bool,

    /// Write the result back instead of printing it
    #[arg(long)]
    pub write: bool,
}

pub fn cmd_patch(opts: &GlobalOpts, args: &PatchArgs) -> Result<()> {
    let original = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read file: {}", args.file.display()))?;
    let patch = read_input(&args.patch)?;

    let result = apply_diff_patches_with(
        &original,
        &patch,
        PatchOptions {
            fuzzy_whitespace: args.fuzzy,
        },
    );

    let mut warnings = Vec::new();
    if !result.has_changes {
        warnings.push("no SEARCH/REPLACE block applied; file unchanged".to_string());
    } else if args.write {
        std::fs::write(&args.file, &result.modified_content)
            .with_context(|| format!("failed to write file: {}", args.file.display()))?;
    }

    let data = json!({
        "file": args.file,
        "has_changes": result.has_changes,
        "touched_line_ranges": result.touched_line_ranges,
        "written": args.write && result.has_changes,
    });
    let summary = if !args.write {
        result.modified_content
    } else if result.has_changes {
        let ranges: Vec<String> = result
            .touched_line_ranges
            .iter()
            .map(|(start, end)| format!("{start}-{end}"))
            .collect();
        format!("{}: lines {}", args.file.display(), ranges.join(", "))
    } else {
        String::new()
    };
    print_success(opts, data, summary, warnings)
}
