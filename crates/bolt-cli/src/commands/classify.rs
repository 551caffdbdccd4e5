//! `bolt classify` command.

use std::fmt::Write;

use anyhow::Result;
use bolt_stream::{BlockClassifier, BlockKind, ClassifierOptions, ContentBlock};
use clap::Args;

use crate::input::{prefixes, read_input};
use crate::opts::{GlobalOpts, StreamArgs};
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub stream: StreamArgs,

    /// Also report prose between recognized blocks
    #[arg(long)]
    pub text: bool,
}

pub fn cmd_classify(opts: &GlobalOpts, args: &ClassifyArgs) -> Result<()> {
    let text = read_input(&args.stream.input)?;
    let mut classifier = BlockClassifier::with_options(ClassifierOptions {
        emit_text_blocks: args.text,
    });
    let mut blocks = Vec::new();
    for prefix in prefixes(&text, args.stream.chunk_size) {
        blocks.extend(classifier.parse(&args.stream.message_id, prefix));
    }
    blocks.extend(classifier.finish(&args.stream.message_id, &text));

    let summary = summarize(&blocks);
    print_success(opts, serde_json::to_value(&blocks)?, summary, Vec::new())
}

fn summarize(blocks: &[ContentBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        match block.kind {
            BlockKind::File => {
                let path = block.file_path.as_deref().unwrap_or("<no path>");
                let language = block.language.as_deref().unwrap_or("-");
                let _ = writeln!(out, "file    {path} [{language}]");
            }
            BlockKind::Command => {
                for command in block.commands() {
                    let _ = writeln!(out, "command {command}");
                }
            }
            BlockKind::Text => {
                let first = block.payload.lines().next().unwrap_or_default();
                let _ = writeln!(out, "text    {first}");
            }
        }
    }
    out
}
