//! Prompt templates by language.
//!
//! Templates are addressed by `(group, key)` and rendered with `$name`,
//! `${name}` and `$$` substitution. Compiled-in `en` and `ar` locales cover
//! the `rag` group; an override directory laid out as
//! `<dir>/<lang>/<group>/<key>.txt` is consulted first. A missing template
//! in the active language falls back to the default language.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, warn};

/// Matches `$$`, `$name` and `${name}`.
static PLACEHOLDER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\$)|([A-Za-z_][A-Za-z0-9_]*)|\{([A-Za-z_][A-Za-z0-9_]*)\})").ok()
});

const EN_SYSTEM_PROMPT: &str = "You are an assistant to generate a response for the user.
You will be provided by a set of documents associated with the user's query.
You have to generate a response based on the documents provided.
Ignore the documents that are not relevant to the user's query.
You can apologize to the user if you are not able to generate a response.
You have to generate response in the same language as the user's query.
Be polite and respectful to the user.
Be precise and concise in your response. Avoid unnecessary information.";

const EN_DOCUMENT_PROMPT: &str = "## Document No: $doc_num
### Content: $chunk_text";

const EN_FOOTER_PROMPT: &str = "Based only on the above documents, please generate an answer for the user.
## Question:
$query

## Answer:";

const AR_SYSTEM_PROMPT: &str = "أنت مساعد لتوليد رد للمستخدم.
سيتم تزويدك بمجموعة من المستندات المرتبطة باستفسار المستخدم.
عليك توليد الرد بناءً على المستندات المقدمة فقط.
تجاهل المستندات غير المرتبطة باستفسار المستخدم.
يمكنك الاعتذار للمستخدم إذا لم تتمكن من توليد رد.
عليك الرد بنفس لغة استفسار المستخدم.
كن مهذباً ومحترماً مع المستخدم.
كن دقيقاً ومختصراً في ردك وتجنب المعلومات غير الضرورية.";

const AR_DOCUMENT_PROMPT: &str = "## المستند رقم: $doc_num
### المحتوى: $chunk_text";

const AR_FOOTER_PROMPT: &str = "بناءً على المستندات أعلاه فقط، يرجى توليد إجابة للمستخدم.
## السؤال:
$query

## الإجابة:";

/// Languages with compiled-in templates.
const BUILTIN_LANGUAGES: &[&str] = &["en", "ar"];

fn builtin(language: &str, group: &str, key: &str) -> Option<&'static str> {
    match (language, group, key) {
        ("en", "rag", "system_prompt") => Some(EN_SYSTEM_PROMPT),
        ("en", "rag", "document_prompt") => Some(EN_DOCUMENT_PROMPT),
        ("en", "rag", "footer_prompt") => Some(EN_FOOTER_PROMPT),
        ("ar", "rag", "system_prompt") => Some(AR_SYSTEM_PROMPT),
        ("ar", "rag", "document_prompt") => Some(AR_DOCUMENT_PROMPT),
        ("ar", "rag", "footer_prompt") => Some(AR_FOOTER_PROMPT),
        _ => None,
    }
}

/// Substitutes `$name`, `${name}` and `$$` in `template`.
///
/// Names missing from `vars` are left untouched.
#[must_use]
pub fn substitute(template: &str, vars: &HashMap<String, String>) -> String {
    let Some(re) = PLACEHOLDER.as_ref() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &Captures<'_>| {
        if caps.get(1).is_some() {
            return "$".to_string();
        }
        let name = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        vars.get(name)
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// Template collaborator consumed by the answer pipeline.
pub trait TemplateSource: Send + Sync {
    /// Renders `group`/`key` with `vars`, or `None` if no such template exists.
    fn render(&self, group: &str, key: &str, vars: &HashMap<String, String>) -> Option<String>;
}

/// Template lookup over compiled-in locales and an optional override directory.
#[derive(Debug, Clone)]
pub struct TemplateParser {
    language: String,
    default_language: String,
    override_dir: Option<PathBuf>,
}

impl TemplateParser {
    /// Creates a parser for `language`, falling back to `default_language`.
    ///
    /// An unknown or absent language selects the default.
    #[must_use]
    pub fn new(language: Option<&str>, default_language: &str) -> Self {
        let mut parser = Self {
            language: default_language.to_string(),
            default_language: default_language.to_string(),
            override_dir: None,
        };
        if let Some(language) = language {
            parser.set_language(language);
        }
        parser
    }

    /// Adds a directory of template overrides.
    ///
    /// Languages only present in the directory become selectable through
    /// [`set_language`](Self::set_language).
    #[must_use]
    pub fn with_override_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.override_dir = Some(dir.into());
        self
    }

    /// Switches to `language` if templates exist for it, else the default.
    pub fn set_language(&mut self, language: &str) {
        let language = language.trim().to_lowercase();
        self.language = if self.has_locale(&language) {
            language
        } else {
            debug!(requested = %language, fallback = %self.default_language, "unknown template language");
            self.default_language.clone()
        };
    }

    /// Active language.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    fn has_locale(&self, language: &str) -> bool {
        BUILTIN_LANGUAGES.contains(&language)
            || self
                .override_dir
                .as_ref()
                .is_some_and(|dir| !language.is_empty() && dir.join(language).is_dir())
    }

    fn override_path(dir: &Path, language: &str, group: &str, key: &str) -> PathBuf {
        dir.join(language).join(group).join(format!("{key}.txt"))
    }

    /// Raw template text for one language, overrides first.
    fn lookup(&self, language: &str, group: &str, key: &str) -> Option<String> {
        if let Some(dir) = &self.override_dir {
            let path = Self::override_path(dir, language, group, key);
            if path.is_file() {
                match std::fs::read_to_string(&path) {
                    Ok(text) => return Some(text.trim_end_matches('\n').to_string()),
                    Err(e) => warn!(path = %path.display(), error = %e, "failed to read template override"),
                }
            }
        }
        builtin(language, group, key).map(str::to_string)
    }
}

impl TemplateSource for TemplateParser {
    fn render(&self, group: &str, key: &str, vars: &HashMap<String, String>) -> Option<String> {
        if group.is_empty() || key.is_empty() {
            return None;
        }
        let template = self.lookup(&self.language, group, key).or_else(|| {
            (self.language != self.default_language)
                .then(|| self.lookup(&self.default_language, group, key))
                .flatten()
        })?;
        Some(substitute(&template, vars))
    }
}
