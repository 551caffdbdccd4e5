//! `bolt parse` command.

use std::fmt::Write;

use anyhow::Result;
use bolt_stream::{ActionKind, Artifact, ParserEvent, ParserRegistry};
use clap::Args;
use serde_json::json;

use crate::input::{prefixes, read_input};
use crate::opts::{GlobalOpts, StreamArgs};
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct ParseArgs {
    #[command(flatten)]
    pub stream: StreamArgs,

    /// Include every parser event, not only completed artifacts
    #[arg(long)]
    pub events: bool,
}

pub fn cmd_parse(opts: &GlobalOpts, args: &ParseArgs) -> Result<()> {
    let text = read_input(&args.stream.input)?;
    let mut registry = ParserRegistry::new();
    let mut events: Vec<ParserEvent> = Vec::new();
    let mut prose = String::new();
    for prefix in prefixes(&text, args.stream.chunk_size) {
        prose.push_str(&registry.parse(&args.stream.message_id, prefix, &mut events));
    }

    let mut warnings = Vec::new();
    let unclosed = registry
        .session(&args.stream.message_id)
        .and_then(|session| session.open_artifact());
    if let Some(open) = unclosed {
        warnings.push(format!("artifact `{}` was never closed", open.id));
    }
    prose.push_str(&registry.finish_session(&args.stream.message_id, &text, &mut events));

    let artifacts: Vec<&Artifact> = events.iter().filter_map(ParserEvent::completed_artifact).collect();
    let mut data = json!({
        "artifacts": artifacts,
        "prose": prose,
    });
    if args.events {
        data["events"] = serde_json::to_value(&events)?;
    }
    print_success(opts, data, summarize(&artifacts), warnings)
}

fn summarize(artifacts: &[&Artifact]) -> String {
    let mut out = String::new();
    for artifact in artifacts {
        let _ = writeln!(out, "artifact {} \"{}\"", artifact.id, artifact.title);
        for action in &artifact.actions {
            match action.kind {
                ActionKind::File => {
                    let path = action.file_path.as_deref().unwrap_or("<no path>");
                    let _ = writeln!(out, "  file  {path} ({} bytes)", action.content.len());
                }
                ActionKind::Shell => {
                    let _ = writeln!(out, "  shell {}", action.content);
                }
            }
        }
    }
    out
}
