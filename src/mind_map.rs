//! Mermaid mind maps from a Learn Box section.
//!
//! The extraction heuristic is best effort: a model that ignores the fencing
//! instruction may still leave prose inside the returned diagram.

use crate::db::models::{ContentItem, ContentSection};
use crate::llm::{Content, GenerateRequest, Generator};

pub const ERROR_DIAGRAM: &str = "flowchart TD\n  A[Error]\n  B[Could not generate mind map]";

const FENCE_OPEN: &str = "```mermaid";
const FENCE_CLOSE: &str = "```";
const DIAGRAM_ROOT: &str = "flowchart TD";

/// One `Kind: payload` line per item. Images contribute a marker only.
pub fn digest(section: &ContentSection) -> String {
    section
        .items
        .iter()
        .map(|item| match item {
            ContentItem::Text { content, .. } => format!("Text: {content}"),
            ContentItem::Link { url, .. } => format!("Link: {url}"),
            ContentItem::File { name, .. } => format!("File: {name}"),
            ContentItem::Video { url, .. } => format!("Video: {url}"),
            ContentItem::Image { .. } => "Image: An image is present.".to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(section: &ContentSection) -> String {
    format!(
        "Analyze the following content from a study note section titled \"{title}\".\n\
         Identify the central topic, main sub-topics, and key relationships between concepts.\n\
         Based on this analysis, generate a visual mind map using Mermaid flowchart syntax ({DIAGRAM_ROOT}).\n\
         The central topic should be the root node. Sub-topics and key details should branch from it.\n\
         Keep the node text concise. Do not add any explanation before or after the Mermaid code block.\n\
         \n\
         Content:\n\
         ---\n\
         {content}\n\
         ---\n",
        title = section.title,
        content = digest(section),
    )
}

/// Fenced block, else everything from the root keyword on, else the raw text.
pub fn extract_diagram(raw: &str) -> String {
    if let Some(start) = raw.find(FENCE_OPEN) {
        let body = &raw[start + FENCE_OPEN.len()..];
        let end = body.find(FENCE_CLOSE).unwrap_or(body.len());
        return body[..end].trim().to_string();
    }
    if let Some(start) = raw.find(DIAGRAM_ROOT) {
        return raw[start..].trim().to_string();
    }
    raw.to_string()
}

pub struct MindMapService<G> {
    generator: G,
}

impl<G: Generator> MindMapService<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Never fails: any provider error yields [`ERROR_DIAGRAM`].
    pub async fn synthesize(&self, section: &ContentSection) -> String {
        let request = GenerateRequest {
            contents: vec![Content::user_text(build_prompt(section))],
            search_grounding: false,
        };
        match self.generator.generate(&request).await {
            Ok(response) => {
                let diagram = extract_diagram(&response.text);
                tracing::info!(section_id = %section.id, lines = diagram.lines().count(), "mind map generated");
                diagram
            }
            Err(e) => {
                tracing::warn!(section_id = %section.id, error = %e, "mind map generation failed");
                ERROR_DIAGRAM.to_string()
            }
        }
    }
}
