//! Prompt templates for research agents
//!
//! Loads prompt definitions from TOML files so the wording can be tuned
//! without recompiling. Templates use `{name}` placeholders.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Prompt loading errors
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Failed to parse prompt {name}: {message}")]
    Parse { name: String, message: String },

    #[error("Missing prompt template: {0}")]
    Missing(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A prompt definition loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplate {
    pub template: TemplateMetadata,
    pub prompt: PromptText,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub placeholders: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptText {
    pub system: String,
    pub user: String,
}

impl PromptTemplate {
    pub fn from_toml(name: &str, toml_str: &str) -> Result<Self, PromptError> {
        toml::from_str(toml_str).map_err(|e| PromptError::Parse {
            name: name.to_string(),
            message: e.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.template.id
    }

    pub fn system_prompt(&self) -> &str {
        self.prompt.system.trim()
    }

    /// Fill the user template. Substituted values are never re-scanned, so
    /// a summary that happens to contain `{topic}` is left intact.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        render_template(self.prompt.user.trim(), vars)
    }
}

fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// The four prompts a research run needs
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub query: PromptTemplate,
    pub summarize: PromptTemplate,
    pub reflect: PromptTemplate,
    pub report: PromptTemplate,
}

impl PromptSet {
    /// Load the prompts embedded from `prompts/`
    pub fn load_embedded() -> Result<Self, PromptError> {
        let embedded = [
            ("query.toml", include_str!("../prompts/query.toml")),
            ("summarize.toml", include_str!("../prompts/summarize.toml")),
            ("reflect.toml", include_str!("../prompts/reflect.toml")),
            ("report.toml", include_str!("../prompts/report.toml")),
        ];

        let mut templates = HashMap::new();
        for (name, toml_str) in embedded {
            let template = PromptTemplate::from_toml(name, toml_str)?;
            templates.insert(template.id().to_string(), template);
        }

        Self::from_map(templates)
    }

    /// Load embedded prompts, replacing any whose id matches a TOML file in `dir`
    pub fn load_with_overrides<P: AsRef<Path>>(dir: P) -> Result<Self, PromptError> {
        let mut set = Self::load_embedded()?;

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == "toml") {
                continue;
            }

            let content = std::fs::read_to_string(&path)?;
            let template = PromptTemplate::from_toml(&path.display().to_string(), &content)?;
            if !set.replace(template.clone()) {
                warn!("Ignoring prompt with unknown id '{}' in {}", template.id(), path.display());
            } else {
                debug!("Loaded prompt override '{}' from {}", template.id(), path.display());
            }
        }

        Ok(set)
    }

    fn from_map(mut templates: HashMap<String, PromptTemplate>) -> Result<Self, PromptError> {
        let mut take = |id: &'static str| templates.remove(id).ok_or(PromptError::Missing(id));
        Ok(Self {
            query: take("query")?,
            summarize: take("summarize")?,
            reflect: take("reflect")?,
            report: take("report")?,
        })
    }

    /// Swap in a template by id. Returns false for unknown ids.
    pub fn replace(&mut self, template: PromptTemplate) -> bool {
        let slot = match template.id() {
            "query" => &mut self.query,
            "summarize" => &mut self.summarize,
            "reflect" => &mut self.reflect,
            "report" => &mut self.report,
            _ => return false,
        };
        *slot = template;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_embedded_prompts() {
        let set = PromptSet::load_embedded().unwrap();
        assert_eq!(set.query.id(), "query");
        assert_eq!(set.summarize.id(), "summarize");
        assert_eq!(set.reflect.id(), "reflect");
        assert_eq!(set.report.id(), "report");
    }

    #[test]
    fn test_embedded_placeholders_present() {
        let set = PromptSet::load_embedded().unwrap();
        for template in [&set.query, &set.summarize, &set.reflect, &set.report] {
            for placeholder in &template.template.placeholders {
                assert!(
                    template.prompt.user.contains(&format!("{{{}}}", placeholder)),
                    "{} lacks {{{}}}",
                    template.id(),
                    placeholder
                );
            }
        }
    }

    #[test]
    fn test_report_prompt_has_no_citation_slot() {
        let set = PromptSet::load_embedded().unwrap();
        assert!(!set.report.prompt.user.contains("{sources}"));
    }

    #[test]
    fn test_render_single_pass() {
        let rendered = render_template(
            "Topic: {topic}\nSummary: {current_summary}\nKeep {unknown} and {",
            &[("topic", "rust"), ("current_summary", "mentions {topic} literally")],
        );
        assert_eq!(
            rendered,
            "Topic: rust\nSummary: mentions {topic} literally\nKeep {unknown} and {"
        );
    }

    #[test]
    fn test_overrides_from_dir() {
        let dir = std::env::temp_dir().join(format!("deepq-prompts-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("reflect.toml"),
            r#"
[template]
id = "reflect"
name = "Terse critic"

[prompt]
system = "Be terse."
user = "Critique: {current_summary}"
"#,
        )
        .unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let set = PromptSet::load_with_overrides(&dir).unwrap();
        assert_eq!(set.reflect.system_prompt(), "Be terse.");
        assert_eq!(set.query.id(), "query");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = PromptTemplate::from_toml("bad.toml", "not = [valid").unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
