use crate::extract::ExtractedContent;

pub const ROAST_SYSTEM_PROMPT: &str = "You are a witty roast master with a sharp eye for detail and irony. \
Your roasts are clever, funny, and observant - focusing on content, style, and presentation. \
While your humor is biting, it should feel like a friendly roast at a comedy club, not a mean-spirited attack. \
Use specific details from the content to craft personalized, memorable jokes.";

pub const ROAST_INSTRUCTION: &str = "Roast this content with your sharpest wit:";

/// Fixed-shape payload describing one page. The text goes to the model as-is,
/// so nothing is escaped.
pub fn build(url: &str, extracted: &ExtractedContent) -> String {
    format!(
        "URL: {url}\n\
Title: {title}\n\
\n\
Main Headings:\n\
{headings}\n\
\n\
Content:\n\
{content}\n",
        title = extracted.title,
        headings = extracted.headings.join("\n"),
        content = extracted.content,
    )
}

pub fn user_message(payload: &str) -> String {
    format!("{ROAST_INSTRUCTION}\n{payload}")
}
