//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros. Back-ends, models and
//! credentials come from the environment (see [`Settings`](crate::Settings)).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::pipeline::DEFAULT_RETRIEVAL_LIMIT;

/// ragrelay: rate-limited generation, embeddings and grounded answers.
#[derive(Parser, Debug)]
#[command(name = "ragrelay")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a completion for a prompt.
    #[command(after_help = r#"Examples:
  ragrelay generate "Summarize the admission rules"
  ragrelay generate "Translate to Arabic: hello" --temperature 0.2
  ragrelay generate "List three facts" --system "Answer in bullet points"
"#)]
    Generate {
        /// Prompt text.
        prompt: String,

        /// Optional system message sent before the prompt.
        #[arg(long)]
        system: Option<String>,

        /// Maximum output tokens (overrides RAGRELAY_GENERATION_MAX_OUTPUT_TOKENS).
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Sampling temperature (overrides RAGRELAY_GENERATION_TEMPERATURE).
        #[arg(long)]
        temperature: Option<f32>,
    },

    /// Embed texts, one per input line.
    ///
    /// Prints one vector per line, or `null` where embedding failed.
    #[command(after_help = r#"Examples:
  ragrelay embed --input chunks.txt
  echo "what are the fees?" | ragrelay embed --document-type query
  ragrelay --format json embed -i chunks.txt | jq '.embedded'
"#)]
    Embed {
        /// Input file (reads stdin if omitted).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Document type: document or query.
        #[arg(short, long, default_value = "document")]
        document_type: String,
    },

    /// Answer a question grounded on a document set.
    ///
    /// Documents are read from a JSON array of `{"text", "score"}` objects.
    #[command(after_help = r#"Examples:
  ragrelay ask "ما هي رسوم التسجيل؟" --documents docs.json
  ragrelay ask "What are the fees?" -d docs.json --language en -k 5
  ragrelay --format json ask "who are you" -d docs.json | jq '.full_prompt'
"#)]
    Ask {
        /// Question text.
        query: String,

        /// JSON file with the retrievable documents.
        #[arg(short, long)]
        documents: PathBuf,

        /// Project identifier the collection is named after.
        #[arg(short, long, default_value = "default")]
        project: String,

        /// Maximum documents to ground the answer on.
        #[arg(short = 'k', long, default_value_t = DEFAULT_RETRIEVAL_LIMIT)]
        limit: usize,

        /// Template and message language (defaults to PRIMARY_LANG).
        #[arg(short, long)]
        language: Option<String>,

        /// Reject answers whose share of Latin letters exceeds this ratio.
        #[arg(long)]
        latin_limit: Option<f64>,
    },

    /// Strip leaked document markers from an answer.
    ///
    /// Makes no network calls.
    #[command(after_help = r#"Examples:
  ragrelay sanitize --input answer.txt
  cat answer.txt | ragrelay sanitize --language en
"#)]
    Sanitize {
        /// Input file (reads stdin if omitted).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Language of the apology used when the answer cannot be cleaned.
        #[arg(short, long, default_value = "ar")]
        language: String,

        /// Reject answers whose share of Latin letters exceeds this ratio.
        #[arg(long)]
        latin_limit: Option<f64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_defaults() {
        let cli = Cli::try_parse_from(["ragrelay", "ask", "q", "--documents", "d.json"])
            .unwrap_or_else(|_| unreachable!());
        match cli.command {
            Commands::Ask {
                project,
                limit,
                language,
                ..
            } => {
                assert_eq!(project, "default");
                assert_eq!(limit, DEFAULT_RETRIEVAL_LIMIT);
                assert!(language.is_none());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["ragrelay", "sanitize", "--format", "json"])
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(cli.format, "json");
        assert!(!cli.verbose);
    }

    #[test]
    fn test_ask_requires_documents() {
        assert!(Cli::try_parse_from(["ragrelay", "ask", "q"]).is_err());
    }
}
