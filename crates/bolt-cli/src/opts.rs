//! Global CLI options.

use clap::Args;

/// Options shared by every subcommand; most can be set via env vars.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// JSON output envelope
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output (implies --json)
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Suppress notices on stderr
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log filter used when RUST_LOG is unset (env: BOLT_LOG)
    #[arg(long, global = true, env = "BOLT_LOG", default_value = "warn")]
    pub log_level: String,
}

impl GlobalOpts {
    pub fn wants_json(&self) -> bool {
        self.json || self.pretty
    }
}

/// Where the text comes from and how it is streamed in.
#[derive(Args, Debug, Clone)]
pub struct StreamArgs {
    /// Input file, or - for stdin
    #[arg(default_value = "-")]
    pub input: String,

    /// Replay the input as growing prefixes of this many bytes; 0 feeds it
    /// whole (env: BOLT_CHUNK_SIZE)
    #[arg(long, env = "BOLT_CHUNK_SIZE", default_value_t = 0)]
    pub chunk_size: usize,

    /// Message id the input is parsed under
    #[arg(long, default_value = "message-1")]
    pub message_id: String,
}
