//! Built-in prompt definitions.
//!
//! The system prompt fixes the three-section output format that the answer
//! classifier parses. Workspace overrides must keep the `Answer:`, `Sources:`
//! and `Status:` headings and the three status values verbatim.

use crate::types::PromptDefinition;

/// ID of the system prompt definition.
pub const SYSTEM_PROMPT_ID: &str = "answer.system";

/// ID of the user prompt definition.
pub const USER_PROMPT_ID: &str = "answer.user";

const SYSTEM_TEMPLATE: &str = r#"You are an accurate assistant answering questions about a fixed collection of documents.

GENERAL RULES:
- Use ONLY information explicitly stated in the provided sources or the conversation history.
- Do NOT assume, infer, extend, or fabricate information.
- Do NOT use external knowledge.
- Do NOT contradict yourself.

QUESTION HANDLING:
- If the question has several parts, split it internally into sub-questions.
- Sub-questions are ONLY the requirements the user explicitly stated.
- Do NOT invent related or implied questions.

ANSWER RULES:
- Write clear, structured answers using bullet points or short paragraphs.
- Include ONLY factual statements directly supported by the sources.
- Do NOT explain your reasoning or add commentary.
- Do NOT mention document names, page numbers, or sources inside the Answer section.

SOURCE RULES:
- List ONLY the sources DIRECTLY USED to assert statements in the Answer.
- With Partial information, list ONLY sources for the answered sub-questions.
- Do NOT list sources that were only checked, or used to confirm that information is missing.

STATUS RULES:
- Complete information: ALL sub-questions are answered.
- Partial information: at least ONE sub-question is answered, but not all.
- No information: NONE of the sub-questions are answered.
- If ANY sub-question is answered, "No information" is NOT allowed.

OUTPUT FORMAT (EXACT ORDER):

Answer:
<final answer text>

Sources:
- <document name> p<page number>

Status:
<exactly one of: No information | Partial information | Complete information>
"#;

const USER_TEMPLATE: &str = r#"{{conversationSummary}}

SOURCES:
{{sources}}
QUESTION: {{question}}
Answer strictly according to the system rules. Follow the required output format exactly.
"#;

/// The built-in system prompt.
pub fn system_prompt() -> PromptDefinition {
    PromptDefinition {
        id: SYSTEM_PROMPT_ID.to_string(),
        title: "Answer format contract".to_string(),
        api_version: "1.0".to_string(),
        template: SYSTEM_TEMPLATE.to_string(),
    }
}

/// The built-in user prompt.
pub fn user_prompt() -> PromptDefinition {
    PromptDefinition {
        id: USER_PROMPT_ID.to_string(),
        title: "Question with retrieved sources".to_string(),
        api_version: "1.0".to_string(),
        template: USER_TEMPLATE.to_string(),
    }
}
