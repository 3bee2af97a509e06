//! Output formatting for CLI commands.

use serde::Serialize;
use std::fmt::Write as FmtWrite;

use crate::pipeline::AnswerResult;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name (case-insensitive). Unknown names select text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Serializes `value` as pretty JSON with a trailing newline.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> crate::Result<String> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}

/// Formats a plain text answer.
pub fn format_text_answer(answer: &str, format: OutputFormat) -> crate::Result<String> {
    match format {
        OutputFormat::Text => Ok(format!("{answer}\n")),
        OutputFormat::Json => to_json(&serde_json::json!({ "answer": answer })),
    }
}

/// Formats one vector per input line, `null` where embedding failed.
pub fn format_vectors(vectors: &[Option<Vec<f32>>], format: OutputFormat) -> crate::Result<String> {
    match format {
        OutputFormat::Text => {
            let mut out = String::new();
            for vector in vectors {
                let _ = writeln!(out, "{}", serde_json::to_string(vector)?);
            }
            Ok(out)
        }
        OutputFormat::Json => to_json(&serde_json::json!({
            "count": vectors.len(),
            "embedded": vectors.iter().filter(|v| v.is_some()).count(),
            "vectors": vectors,
        })),
    }
}

/// Formats a pipeline answer.
///
/// Text output shows only the answer; JSON also carries the prompt and history.
pub fn format_answer(result: &AnswerResult, format: OutputFormat) -> crate::Result<String> {
    match format {
        OutputFormat::Text => Ok(result.answer.as_deref().map_or_else(
            || "(no answer)\n".to_string(),
            |answer| format!("{answer}\n"),
        )),
        OutputFormat::Json => to_json(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("json", OutputFormat::Json ; "json")]
    #[test_case("JSON", OutputFormat::Json ; "uppercase")]
    #[test_case("text", OutputFormat::Text ; "text")]
    #[test_case("yaml", OutputFormat::Text ; "unknown")]
    fn test_parse(input: &str, expected: OutputFormat) {
        assert_eq!(OutputFormat::parse(input), expected);
    }

    #[test]
    fn test_vectors_text_uses_null_for_gaps() {
        let out = format_vectors(&[Some(vec![0.5, 1.0]), None], OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(out, "[0.5,1.0]\nnull\n");
    }

    #[test]
    fn test_vectors_json_counts() {
        let out = format_vectors(&[Some(vec![1.0]), None], OutputFormat::Json)
            .unwrap_or_else(|_| unreachable!());
        let value: serde_json::Value = serde_json::from_str(&out).unwrap_or_else(|_| unreachable!());
        assert_eq!(value["count"], 2);
        assert_eq!(value["embedded"], 1);
        assert!(value["vectors"][1].is_null());
    }

    #[test]
    fn test_answer_text() {
        let result = AnswerResult::fixed("hello");
        assert_eq!(
            format_answer(&result, OutputFormat::Text).unwrap_or_else(|_| unreachable!()),
            "hello\n"
        );
        assert_eq!(
            format_text_answer("hi", OutputFormat::Json).unwrap_or_else(|_| unreachable!()),
            "{\n  \"answer\": \"hi\"\n}\n"
        );
    }
}
