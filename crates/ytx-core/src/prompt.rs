//! Prompt templates.
//!
//! Every generation template carries a single [`TRANSCRIPT_PLACEHOLDER`]
//! that callers substitute with the rendered transcript before the request
//! is dispatched.

use serde::{Deserialize, Serialize};

/// Token replaced with the transcript text.
pub const TRANSCRIPT_PLACEHOLDER: &str = "{transcript}";

const SUMMARY: &str = "Summarize the following video transcript.

## Output format

### Summary
Three to five sentences covering the main content.

### Key takeaways
Three to five takeaways, one sentence each, not repeating the summary.

### Details
Sections keyed by a single start timestamp:
[0:00] Section title - key point

Keep timestamps in the single-point form [m:ss], never ranges.

---
Transcript:
{transcript}";

const HTML: &str = "Turn the following video transcript into a self-contained HTML notes page.

Requirements:
1. Output complete HTML with inline <style>; do not wrap it in a code fence.
2. Include an overview, key points with [m:ss] timestamps, and sectioned details.
3. Responsive layout, max-width 800px, centered.

Transcript:
{transcript}";

const CARDS: &str = "Create study flashcards from the following video transcript.

Requirements:
1. Extract 10-20 key facts.
2. Each card has a front (question or term) and a back (answer or explanation).
3. Add the [m:ss] timestamp when one applies.
4. Output strictly this JSON shape and nothing else:
[{\"front\":\"question\",\"back\":\"answer\",\"time\":\"m:ss\"}]

Transcript:
{transcript}";

const MINDMAP: &str = "Build a mind map of the following video transcript as JSON.

Requirements:
1. Output one nested JSON object; the root is the video topic.
2. Node shape: {\"label\": \"text\", \"time\": \"m:ss\", \"children\": [...]}
3. `time` is optional; use an empty string when there is none.
4. At most four levels deep, labels under 30 characters.
5. Output strict JSON only, without code fences or commentary.

Transcript:
{transcript}";

const VOCAB: &str = "Extract about 50 words and phrases worth learning from the following English transcript.

Each transcript line has the form [m:ss] text.

Requirements:
1. Prefer advanced vocabulary, collocations, idioms and academic words; skip basic words.
2. Each entry has: word, phonetic, pos, meaning, example (the original line), time (copied from that line).
3. Output strictly this JSON shape and nothing else:
[{\"word\":\"elaborate\",\"phonetic\":\"/ɪˈlæb.ə.reɪt/\",\"pos\":\"v.\",\"meaning\":\"explain in detail\",\"example\":\"Can you elaborate on that point?\",\"time\":\"2:30\"}]

Transcript:
{transcript}";

/// A prompt with a `{transcript}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn summary() -> Self {
        Self::new(SUMMARY)
    }

    pub fn html() -> Self {
        Self::new(HTML)
    }

    pub fn cards() -> Self {
        Self::new(CARDS)
    }

    pub fn mindmap() -> Self {
        Self::new(MINDMAP)
    }

    pub fn vocab() -> Self {
        Self::new(VOCAB)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Replaces the first placeholder with `content`.
    ///
    /// A template without a placeholder gets the content appended on a new
    /// line so user-edited prompts never silently drop the transcript.
    pub fn render(&self, content: &str) -> String {
        if self.0.contains(TRANSCRIPT_PLACEHOLDER) {
            self.0.replacen(TRANSCRIPT_PLACEHOLDER, content, 1)
        } else {
            format!("{}\n\n{}", self.0, content)
        }
    }
}

/// System prompt for transcript-grounded chat.
pub fn chat_system_prompt(transcript: &str) -> String {
    format!(
        "You are a teaching assistant for the video the user is watching. \
         Answer using the transcript below.\n\
         1. Quote the video accurately and cite timestamps as [m:ss].\n\
         2. If a question goes beyond the video, say so.\n\
         3. Keep answers short and clear.\n\n\
         Transcript:\n{transcript}"
    )
}
