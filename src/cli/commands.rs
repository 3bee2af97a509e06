//! CLI command implementations.
//!
//! Each command returns its rendered output; printing is left to `main`.
//! Async work runs on a runtime built per command, with Ctrl-C wired to
//! the cancellation token handed to the provider layer.

use std::future::Future;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::output::{OutputFormat, format_answer, format_text_answer, format_vectors};
use crate::cli::parser::{Cli, Commands};
use crate::error::{ConfigError, Error, Result};
use crate::pipeline::{
    AnswerPipeline, FixedRetriever, PipelineMessages, Sanitizer, TemplateParser,
    collection_name,
};
use crate::provider::{DocumentType, GenerationOptions, ProviderClient, Role};
use crate::settings::Settings;

// ==================== Parameter Structs ====================

/// Parameters for the ask command.
#[derive(Debug, Clone)]
pub struct AskParams<'a> {
    /// Question text.
    pub query: &'a str,
    /// JSON document fixture.
    pub documents: &'a Path,
    /// Project identifier.
    pub project: &'a str,
    /// Maximum documents to retrieve.
    pub limit: usize,
    /// Requested language; `PRIMARY_LANG` when `None`.
    pub language: Option<&'a str>,
    /// Optional Latin-script guard for the sanitizer.
    pub latin_limit: Option<f64>,
}

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if configuration is incomplete, input cannot be read,
/// or a surfaced provider call fails.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Generate {
            prompt,
            system,
            max_tokens,
            temperature,
        } => {
            let options = GenerationOptions {
                max_output_tokens: *max_tokens,
                temperature: *temperature,
            };
            cmd_generate(prompt, system.as_deref(), options, format)
        }
        Commands::Embed {
            input,
            document_type,
        } => cmd_embed(
            input.as_deref(),
            DocumentType::parse(document_type),
            format,
        ),
        Commands::Ask {
            query,
            documents,
            project,
            limit,
            language,
            latin_limit,
        } => {
            let params = AskParams {
                query,
                documents,
                project,
                limit: *limit,
                language: language.as_deref(),
                latin_limit: *latin_limit,
            };
            cmd_ask(&params, format)
        }
        Commands::Sanitize {
            input,
            language,
            latin_limit,
        } => cmd_sanitize(input.as_deref(), language, *latin_limit, format),
    }
}

/// Runs `f` to completion on a fresh runtime, cancelling its token on Ctrl-C.
fn block_on<F, Fut>(f: F) -> Result<Fut::Output>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future,
{
    let rt = tokio::runtime::Runtime::new().map_err(|e| Error::Command {
        message: format!("failed to create async runtime: {e}"),
    })?;
    let cancel = CancellationToken::new();
    Ok(rt.block_on(async {
        let trigger = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, cancelling in-flight calls");
                trigger.cancel();
            }
        });
        f(cancel.clone()).await
    }))
}

/// Reads a whole file, or stdin when no path is given.
fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| Error::Command {
            message: format!("failed to read {}: {e}", path.display()),
        }),
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn cmd_generate(
    prompt: &str,
    system: Option<&str>,
    options: GenerationOptions,
    format: OutputFormat,
) -> Result<String> {
    let settings = Settings::from_env()?;
    let client = ProviderClient::for_generation(&settings)?;
    let history: Vec<_> = system
        .map(|s| client.construct_prompt(s, Role::System))
        .into_iter()
        .collect();

    let text = block_on(|cancel| async move {
        client
            .try_generate_text(prompt, &history, options, &cancel)
            .await
    })??;
    format_text_answer(&text, format)
}

fn cmd_embed(
    input: Option<&Path>,
    document_type: DocumentType,
    format: OutputFormat,
) -> Result<String> {
    let settings = Settings::from_env()?;
    if settings.embedding_model_id.is_none() || settings.embedding_model_size.is_none() {
        return Err(ConfigError::Invalid {
            field: "embedding_model_id",
            message: "set EMBEDDING_MODEL_ID and EMBEDDING_MODEL_SIZE".to_string(),
        }
        .into());
    }
    let client = ProviderClient::for_embedding(&settings)?;

    let text = read_input(input)?;
    let lines: Vec<&str> = text.lines().collect();
    // Blank lines keep their slot but are never sent.
    let (slots, texts): (Vec<usize>, Vec<String>) = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i, (*line).to_string()))
        .unzip();
    debug!(lines = lines.len(), texts = texts.len(), %document_type, "embedding input");

    let embedded = block_on(|cancel| async move {
        client.embed_texts(&texts, document_type, &cancel).await
    })?;

    let mut vectors = vec![None; lines.len()];
    for (slot, vector) in slots.into_iter().zip(embedded) {
        vectors[slot] = vector;
    }
    format_vectors(&vectors, format)
}

fn cmd_ask(params: &AskParams<'_>, format: OutputFormat) -> Result<String> {
    let settings = Settings::from_env()?;
    let retriever = FixedRetriever::from_path(params.documents)?;
    info!(documents = retriever.len(), path = %params.documents.display(), "loaded documents");

    let mut templates = TemplateParser::new(None, &settings.default_lang);
    if let Some(dir) = settings.template_dir.as_ref().filter(|dir| dir.is_dir()) {
        templates = templates.with_override_dir(dir.clone());
    }
    templates.set_language(params.language.unwrap_or(&settings.primary_lang));
    let messages = PipelineMessages::for_language(templates.language());

    let mut sanitizer = Sanitizer::new(messages.apology.clone());
    if let Some(limit) = params.latin_limit {
        sanitizer = sanitizer.with_latin_ratio_limit(limit);
    }

    let generation = Arc::new(ProviderClient::for_generation(&settings)?);
    let embedding = Arc::new(ProviderClient::for_embedding(&settings)?);
    let pipeline = AnswerPipeline::new(
        generation,
        embedding,
        Arc::new(retriever),
        Arc::new(templates),
    )
    .with_messages(messages)
    .with_sanitizer(sanitizer)
    .with_limit(params.limit);

    let collection = collection_name(params.project);
    let result = block_on(|cancel| async move {
        pipeline.answer(&collection, params.query, &cancel).await
    })?;
    format_answer(&result, format)
}

fn cmd_sanitize(
    input: Option<&Path>,
    language: &str,
    latin_limit: Option<f64>,
    format: OutputFormat,
) -> Result<String> {
    let text = read_input(input)?;
    let mut sanitizer = Sanitizer::new(PipelineMessages::for_language(language).apology);
    if let Some(limit) = latin_limit {
        sanitizer = sanitizer.with_latin_ratio_limit(limit);
    }
    format_text_answer(&sanitizer.sanitize(&text), format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_sanitize_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap_or_else(|_| unreachable!());
        assert!(writeln!(file, "## Document No: 1\nThe fee is 500.").is_ok());
        let path = file.path().to_string_lossy().to_string();

        let out = execute(&parse(&["ragrelay", "sanitize", "--input", &path]))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(out, "The fee is 500.\n");
    }

    #[test]
    fn test_sanitize_apology_language() {
        let mut file = tempfile::NamedTempFile::new().unwrap_or_else(|_| unreachable!());
        assert!(write!(file, "see the do#c").is_ok());
        let path = file.path().to_string_lossy().to_string();

        let out = execute(&parse(&[
            "ragrelay", "--format", "json", "sanitize", "-i", &path, "-l", "en",
        ]))
        .unwrap_or_else(|_| unreachable!());
        let value: serde_json::Value =
            serde_json::from_str(&out).unwrap_or_else(|_| unreachable!());
        assert_eq!(value["answer"], PipelineMessages::english().apology);
    }

    #[test]
    fn test_missing_input_file() {
        let result = execute(&parse(&[
            "ragrelay",
            "sanitize",
            "--input",
            "/nonexistent/answer.txt",
        ]));
        assert!(matches!(result, Err(Error::Command { .. })));
    }

    #[test]
    fn test_block_on_passes_live_token() {
        let cancelled = block_on(|cancel| async move { cancel.is_cancelled() })
            .unwrap_or_else(|_| unreachable!());
        assert!(!cancelled);
    }
}
