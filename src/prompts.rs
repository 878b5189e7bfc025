//! Prompt templates for the generation steps.
//!
//! TOC and knowledge-base prompts carry a `{{documents}}` placeholder that
//! receives the `<documents>` XML built from the output directory. The
//! condensation prompt carries `{knowledge_base_content}`.

/// Placeholder replaced with the documents XML.
pub const DOCUMENTS_PLACEHOLDER: &str = "{{documents}}";

/// Placeholder replaced with the knowledge-base text.
pub const KB_CONTENT_PLACEHOLDER: &str = "{knowledge_base_content}";

/// Model requested when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gemini/gemini-2.5-pro-preview-03-25";

/// Table-of-contents prompt.
pub const TOC_PROMPT: &str = r#"You are a documentation indexing assistant. Create a comprehensive table of contents in markdown format based on the content of the provided documents.

Format the output as a nested markdown list with:
1. Top-level sections as # headers
2. Sub-sections properly indented
3. Links to the document paths

DOCUMENTS:
{{documents}}

Generate a clear, hierarchical, and well-structured table of contents that would help a user navigate the documentation."#;

/// Knowledge-base extraction prompt.
pub const KB_EXTRACTION_PROMPT: &str = r#"You are building a knowledge base that another assistant will use to answer questions about the documents below.

For every document:
- Identify the main topics, definitions, procedures and facts it contains
- Keep concrete details: names, numbers, commands, configuration values, caveats
- Note the document path each fact comes from

Then organise the result as Markdown:
1. One # section per major topic, ordered from general to specific
2. ## sub-sections for related details
3. Bullet points for individual facts, each ending with the source path in parentheses
4. A final ## Glossary section for terms that need definition

Do not invent information that is not present in the documents. Output ONLY the Markdown knowledge base.

DOCUMENTS:
{{documents}}"#;

/// Knowledge-base condensation prompt.
pub const CONDENSE_PROMPT: &str = r#"Review the knowledge base provided below and condense it down to just the key information the agent needs to know to help the user.

Instead of listing each article in its entirety, organize the content by meaningful topic, and then provide a extremely detailed summary of the topic content as taken from each article that discusses that topic. Where some of the existing content discusses the same topic, merge that content into the detailed summary. Where some of the existing content provides conflicting or different points of view on the same topic, include all points of view and indicate which author provided the point of view.

There is no token limit for the knowledge base.

--- KNOWLEDGE BASE CONTENT ---
{knowledge_base_content}"#;

/// Inject the documents XML into a TOC or KB template.
pub fn with_documents(template: &str, documents_xml: &str) -> String {
    template.replace(DOCUMENTS_PLACEHOLDER, documents_xml)
}

/// Inject the knowledge base into the condensation template.
pub fn with_knowledge_base(kb: &str) -> String {
    CONDENSE_PROMPT.replace(KB_CONTENT_PLACEHOLDER, kb)
}
