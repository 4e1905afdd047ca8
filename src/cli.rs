use clap::{Parser, Subcommand};

/// Venue-planning pipeline — turn a natural-language activity request into
/// a ranked, explained shortlist of real venues.
#[derive(Parser)]
#[command(name = "venue-flow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the HTTP/WebSocket planning API
    Api {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value = "8000")]
        port: u16,
    },

    /// Run the pipeline once for a prompt and print the shortlist
    Plan {
        /// The activity request, e.g. "cozy café in downtown Toronto for four"
        prompt: String,

        /// Group size hint
        #[arg(long)]
        group_size: Option<u32>,

        /// Budget hint, e.g. "low"
        #[arg(long)]
        budget: Option<String>,

        /// Location hint, e.g. "Toronto"
        #[arg(long)]
        location: Option<String>,

        /// Vibe hint, e.g. "cozy"
        #[arg(long)]
        vibe: Option<String>,

        /// Print the raw JSON response instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Output the JSON schema for plan requests and pipeline state
    Schema,
}
