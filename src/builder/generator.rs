use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::GeneratorMode;
use crate::errors::GenerationError;
use crate::llm::TextGenerator;

use super::models::{CodeArtifactSet, ENTRY_POINT};

const GENERATOR_INSTRUCTIONS: &str = r#"You are an assistant that generates a minimal, functional HTML/CSS/JS web app
based on the following brief. Return the output as a JSON object with filenames
as keys and file contents as values.

Requirements:
- index.html must exist
- Include main.js and style.css if needed
- Include a README.md with: summary, setup, usage, and license
- Output as a JSON object where keys are filenames and values are contents
- Output strictly the JSON object, no markdown fences and no commentary
- Keep code minimal and functional
"#;

/// Extra request context folded into the generation prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub checks: Vec<String>,
    /// `(name, url)` pairs.
    pub attachments: Vec<(String, String)>,
}

/// Turns a brief into a filename-to-content mapping via a text backend.
///
/// Failures are returned as typed errors; choosing the fallback set is the
/// caller's decision.
pub struct CodeGenerator {
    backend: Arc<dyn TextGenerator>,
    mode: GeneratorMode,
}

impl CodeGenerator {
    pub fn new(backend: Arc<dyn TextGenerator>, mode: GeneratorMode) -> Self {
        Self { backend, mode }
    }

    pub fn mode(&self) -> GeneratorMode {
        self.mode
    }

    pub async fn generate(&self, brief: &str) -> Result<CodeArtifactSet, GenerationError> {
        self.generate_with(brief, &PromptContext::default()).await
    }

    pub async fn generate_with(
        &self,
        brief: &str,
        context: &PromptContext,
    ) -> Result<CodeArtifactSet, GenerationError> {
        if self.mode == GeneratorMode::Placeholder {
            return Ok(CodeArtifactSet::placeholder(brief));
        }
        let prompt = build_prompt(brief, context);
        let raw = self.backend.complete(&prompt).await?;
        parse_artifacts(&raw).inspect_err(|e| {
            tracing::debug!(
                error = %e,
                raw = %raw.chars().take(500).collect::<String>(),
                "unusable model output"
            );
        })
    }
}

pub fn build_prompt(brief: &str, context: &PromptContext) -> String {
    let mut prompt = format!("{}\nBrief:\n{}\n", GENERATOR_INSTRUCTIONS, brief);

    if !context.checks.is_empty() {
        prompt.push_str("\nThe app will be evaluated against these checks:\n");
        for check in &context.checks {
            prompt.push_str(&format!("- {}\n", check));
        }
    }

    if !context.attachments.is_empty() {
        prompt.push_str("\nAttachments available to the app:\n");
        for (name, url) in &context.attachments {
            let url = if url.starts_with("data:") {
                // Data URIs can be megabytes; the model only needs to know one exists.
                "(inline data URI)"
            } else {
                url.as_str()
            };
            prompt.push_str(&format!("- {} {}\n", name, url));
        }
    }

    prompt
}

/// Return the first balanced `{...}` span in `raw`, tolerating prose around it.
///
/// Braces inside JSON string literals are ignored.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in raw[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse raw model output into an artifact set that contains the entry point.
pub fn parse_artifacts(raw: &str) -> Result<CodeArtifactSet, GenerationError> {
    let json = extract_json_object(raw).ok_or(GenerationError::NoJsonObject)?;
    let files: BTreeMap<String, String> =
        serde_json::from_str(json).map_err(GenerationError::Malformed)?;
    let set = CodeArtifactSet::from_map(files);
    if !set.has_entry_point() {
        return Err(GenerationError::MissingEntryPoint(ENTRY_POINT));
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LlmError;
    use crate::fakes::ScriptedGenerator;

    #[test]
    fn test_extract_plain_object() {
        assert_eq!(extract_json_object(r#"{"a": "b"}"#), Some(r#"{"a": "b"}"#));
    }

    #[test]
    fn test_extract_with_markdown_wrapping() {
        let raw = "Here you go:\n```json\n{\"index.html\": \"<h1>x</h1>\"}\n```\nEnjoy {not json}";
        assert_eq!(
            extract_json_object(raw),
            Some("{\"index.html\": \"<h1>x</h1>\"}")
        );
    }

    #[test]
    fn test_extract_ignores_braces_in_strings() {
        let raw = r#"{"main.js": "function f() { return \"}\"; }"} trailing }"#;
        assert_eq!(
            extract_json_object(raw),
            Some(r#"{"main.js": "function f() { return \"}\"; }"}"#)
        );
    }

    #[test]
    fn test_extract_nested_objects() {
        let raw = r#"x {"a": {"b": {}}} {"c": 1}"#;
        assert_eq!(extract_json_object(raw), Some(r#"{"a": {"b": {}}}"#));
    }

    #[test]
    fn test_extract_unbalanced_or_missing() {
        assert_eq!(extract_json_object("no braces here"), None);
        assert_eq!(extract_json_object("{\"a\": \"b\""), None);
    }

    #[test]
    fn test_parse_artifacts_success() {
        let raw = r##"```json
{"index.html": "<!DOCTYPE html><h1>Hi</h1>", "README.md": "# App", "style.css": "h1{color:red}"}
```"##;
        let set = parse_artifacts(raw).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.get("style.css"), Some("h1{color:red}"));
    }

    #[test]
    fn test_parse_artifacts_missing_entry_point() {
        let err = parse_artifacts(r##"{"README.md": "# App"}"##).unwrap_err();
        assert!(matches!(err, GenerationError::MissingEntryPoint("index.html")));
    }

    #[test]
    fn test_parse_artifacts_non_string_values() {
        let err = parse_artifacts(r#"{"index.html": {"nested": true}}"#).unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)));
    }

    #[test]
    fn test_parse_artifacts_no_json() {
        let err = parse_artifacts("I cannot help with that.").unwrap_err();
        assert!(matches!(err, GenerationError::NoJsonObject));
    }

    #[test]
    fn test_prompt_includes_brief_checks_and_attachments() {
        let context = PromptContext {
            checks: vec!["Repo has MIT license".to_string()],
            attachments: vec![
                ("sample.png".to_string(), "data:image/png;base64,AAAA".to_string()),
                ("data.csv".to_string(), "https://example.com/data.csv".to_string()),
            ],
        };
        let prompt = build_prompt("Create a captcha solver", &context);
        assert!(prompt.contains("Brief:\nCreate a captcha solver"));
        assert!(prompt.contains("- Repo has MIT license"));
        assert!(prompt.contains("- sample.png (inline data URI)"));
        assert!(prompt.contains("- data.csv https://example.com/data.csv"));
        assert!(!prompt.contains("base64,AAAA"));
    }

    #[test]
    fn test_prompt_without_context_has_no_extra_sections() {
        let prompt = build_prompt("brief", &PromptContext::default());
        assert!(!prompt.contains("evaluated against"));
        assert!(!prompt.contains("Attachments"));
    }

    #[tokio::test]
    async fn test_generate_uses_backend_output() {
        let backend = Arc::new(ScriptedGenerator::replying(
            r#"Sure! {"index.html": "<h1>Captcha</h1>"}"#,
        ));
        let generator = CodeGenerator::new(backend.clone(), GeneratorMode::Model);
        let set = generator.generate("Create a captcha solver").await.unwrap();
        assert_eq!(set.get("index.html"), Some("<h1>Captcha</h1>"));
        assert_eq!(backend.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_propagates_backend_error() {
        let backend = Arc::new(ScriptedGenerator::failing());
        let generator = CodeGenerator::new(backend, GeneratorMode::Model);
        let err = generator.generate("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::Backend(LlmError::Status { .. })));
    }

    #[tokio::test]
    async fn test_placeholder_mode_skips_backend() {
        let backend = Arc::new(ScriptedGenerator::failing());
        let generator = CodeGenerator::new(backend.clone(), GeneratorMode::Placeholder);
        let set = generator.generate("Hello").await.unwrap();
        assert!(set.get("index.html").unwrap().contains("<h1>Hello</h1>"));
        assert!(backend.prompts().is_empty());
    }
}
