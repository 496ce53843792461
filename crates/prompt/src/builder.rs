//! Prompt builder for rendering templates and injecting context.

use crate::defaults;
use crate::loader::load_prompt_or;
use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use docask_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;
use std::path::Path;

/// The system and user prompt definitions used for one answer session.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub system: PromptDefinition,
    pub user: PromptDefinition,
}

impl PromptSet {
    /// The built-in prompts, ignoring any workspace overrides.
    pub fn builtin() -> Self {
        Self {
            system: defaults::system_prompt(),
            user: defaults::user_prompt(),
        }
    }

    /// Load prompts for a workspace, preferring `.docask/prompts/<id>.yml`
    /// over the built-in definitions.
    pub fn load(workspace_path: &Path) -> AppResult<Self> {
        let system = load_prompt_or(
            workspace_path,
            defaults::SYSTEM_PROMPT_ID,
            defaults::system_prompt(),
        )?;
        let user = load_prompt_or(
            workspace_path,
            defaults::USER_PROMPT_ID,
            defaults::user_prompt(),
        )?;

        Ok(Self { system, user })
    }
}

/// Build the system and user messages for one completion round.
///
/// Template variables:
/// - `question` - the current question
/// - `conversationSummary` - compressed prior turns, empty when there are none
/// - `sources` - the assembled context block
///
/// # Example
/// ```no_run
/// use docask_prompt::{build_answer_prompt, PromptSet};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let built = build_answer_prompt(&PromptSet::builtin(), "What is the notice period?", "", "")?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_answer_prompt(
    prompts: &PromptSet,
    question: &str,
    conversation_summary: &str,
    sources: &str,
) -> AppResult<BuiltPrompt> {
    tracing::debug!(
        "Building prompt from {} / {}",
        prompts.system.id,
        prompts.user.id
    );

    let mut variables = HashMap::new();
    variables.insert("question".to_string(), question.to_string());
    variables.insert(
        "conversationSummary".to_string(),
        conversation_summary.to_string(),
    );
    variables.insert("sources".to_string(), sources.to_string());

    let system = render_template(&prompts.system.template, &variables)?;
    let user = render_template(&prompts.user.template, &variables)?;

    Ok(BuiltPrompt {
        system,
        user,
        metadata: BuiltPromptMetadata {
            source_prompt_ids: (prompts.system.id.clone(), prompts.user.id.clone()),
            history_included: !conversation_summary.is_empty(),
            resolved_variables: variables,
        },
    })
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_render_simple_template() {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "Hello, world!".to_string());

        let result = render_template("Question: {{question}}", &vars).unwrap();
        assert_eq!(result, "Question: Hello, world!");
    }

    #[test]
    fn test_render_does_not_escape() {
        let mut vars = HashMap::new();
        vars.insert("sources".to_string(), "[NEW TEXT a.pdf p1]\n<b> & \"x\"".to_string());

        let result = render_template("{{sources}}", &vars).unwrap();
        assert_eq!(result, "[NEW TEXT a.pdf p1]\n<b> & \"x\"");
    }

    #[test]
    fn test_render_template_missing_variable() {
        let vars = HashMap::new();
        let result = render_template("Question: {{missing}}", &vars).unwrap();
        assert_eq!(result, "Question: ");
    }

    #[test]
    fn test_build_answer_prompt_builtin() {
        let built = build_answer_prompt(
            &PromptSet::builtin(),
            "What is the notice period?",
            "",
            "[NEW TEXT contract p4]\nThirty days.",
        )
        .unwrap();

        assert!(built.system.contains("Status:"));
        assert!(built.user.contains("QUESTION: What is the notice period?"));
        assert!(built.user.contains("[NEW TEXT contract p4]\nThirty days."));
        assert!(!built.metadata.history_included);
        assert_eq!(
            built.metadata.source_prompt_ids,
            ("answer.system".to_string(), "answer.user".to_string())
        );
    }

    #[test]
    fn test_build_answer_prompt_with_history() {
        let summary = "=== Previous Conversation ===\nQ1: a\nA1: b\n=== End ===";
        let built = build_answer_prompt(&PromptSet::builtin(), "q", summary, "").unwrap();

        assert!(built.user.starts_with(summary));
        assert!(built.metadata.history_included);
    }

    #[test]
    fn test_prompt_set_uses_workspace_override() {
        let temp_dir = TempDir::new().unwrap();
        let prompts_dir = temp_dir.path().join(".docask/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(
            prompts_dir.join("answer.user.yml"),
            "id: answer.user\ntitle: Terse\napiVersion: \"1.0\"\ntemplate: \"Q={{question}}\"\n",
        )
        .unwrap();

        let set = PromptSet::load(temp_dir.path()).unwrap();
        assert_eq!(set.user.title, "Terse");
        assert_eq!(set.system.template, defaults::system_prompt().template);

        let built = build_answer_prompt(&set, "why", "", "").unwrap();
        assert_eq!(built.user, "Q=why");
    }
}
