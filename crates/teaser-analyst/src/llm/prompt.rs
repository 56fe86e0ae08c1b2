//! Chat messages sent to the analysis model.

use serde::Serialize;

use crate::blocks::BuildingBlock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

const ANALYST_CONTEXT: &str = "Context: You are analyzing a private equity teaser document to inform an investment decision.\n\
Role: Act as a private equity expert with extensive knowledge of investment strategies, market trends and financial metrics.\n\
Audience: Investors and analysts evaluating the opportunity.\n\
Task: Deliver a thorough analysis covering implications, strengths, weaknesses and missing information. \
If the document lacks relevant details for a topic, say so clearly.";

const SECTION_FORMAT: &str = "Format your response precisely as follows:\n\n\
---SECTION: [Section Name]---\n\n\
[Your analysis for this section]\n\n\
---SECTION: [Next Section Name]---\n\n\
[Your analysis for next section]\n\n\
And so on for each section requested. Use the section names exactly as given.";

/// Messages for one request covering every block. The document text is sent
/// once, followed by the numbered section list.
pub fn batch_messages(text: &str, blocks: &[&BuildingBlock]) -> Vec<ChatMessage> {
    let mut sections = String::from("Please analyze the following sections:\n\n");
    for (i, block) in blocks.iter().enumerate() {
        sections.push_str(&format!(
            "{}. {}: {}\n",
            i + 1,
            block.display_name,
            block.description
        ));
    }

    vec![
        ChatMessage::system(format!("{}\n\n{}", ANALYST_CONTEXT, SECTION_FORMAT)),
        ChatMessage::user(format!(
            "Here is the teaser document to analyze:\n\n{}\n\nI'll now ask you to analyze specific sections of this document.",
            text
        )),
        ChatMessage::user(sections),
    ]
}

/// Messages for a single-block request.
pub fn block_messages(text: &str, block: &BuildingBlock) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!(
            "{}\n\nFocus only on '{}': {}. Reply with the analysis text for this topic, without headings.",
            ANALYST_CONTEXT, block.display_name, block.description
        )),
        ChatMessage::user(format!(
            "Here is the teaser document to analyze:\n\n{}",
            text
        )),
    ]
}
