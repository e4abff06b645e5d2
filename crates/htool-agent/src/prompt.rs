//! Prompt builder for the agent collaborator
//!
//! Wraps the user's description with the output contract the extractor
//! relies on: one complete HTML document inside one fenced `html` block.

use htool_core::GenerationRequest;

/// Prompt sent to a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPrompt {
    /// The user's description, as given
    pub description: String,
    /// Full prompt text including output instructions
    pub text: String,
}

impl AgentPrompt {
    /// Build the prompt for a generation request
    pub fn for_request(request: &GenerationRequest) -> Self {
        Self::from_description(request.description())
    }

    pub fn from_description(description: &str) -> Self {
        Self {
            description: description.to_string(),
            text: build_prompt(description),
        }
    }
}

fn build_prompt(description: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str("# SINGLE-FILE HTML TOOL\n\n");

    prompt.push_str("## TOOL DESCRIPTION\n\n");
    prompt.push_str(description);
    prompt.push_str("\n\n");

    prompt.push_str(output_instructions());
    prompt
}

/// Output contract given to the agent
pub fn output_instructions() -> &'static str {
    r#"## OUTPUT FORMAT

Build the tool as ONE self-contained HTML file:
- Start the document with <!DOCTYPE html>
- Inline all CSS in <style> and all JavaScript in <script>
- Libraries may only be loaded from a public CDN
- It must work when opened directly from disk

Return the complete file in exactly ONE fenced code block tagged `html`:

```html
<!DOCTYPE html>
<html lang="en">
...
</html>
```

Do not put any other fenced code blocks in your reply. A short explanation
before or after the block is fine.
"#
}
