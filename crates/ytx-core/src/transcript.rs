use serde::{Deserialize, Serialize};

/// One timestamped transcript line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Start offset in seconds.
    pub start: u32,
    /// Spoken text.
    pub text: String,
}

/// An ordered list of transcript segments for one video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<Segment>,
}

impl Transcript {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Parses the `[m:ss] text` line format produced by [`Transcript::full`].
    ///
    /// Lines without a leading timestamp inherit the previous segment's start
    /// (or 0). Blank lines are skipped.
    pub fn from_lines(input: &str) -> Self {
        let mut segments = Vec::new();
        let mut last_start = 0;
        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (start, text) = match split_timestamp(line) {
                Some((start, text)) => (start, text),
                None => (last_start, line),
            };
            if text.is_empty() {
                continue;
            }
            last_start = start;
            segments.push(Segment {
                start,
                text: text.to_string(),
            });
        }
        Self { segments }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Renders one `[m:ss] text` line per segment.
    pub fn full(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("[{}] {}", fmt_time(s.start), s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn split_timestamp(line: &str) -> Option<(u32, &str)> {
    let rest = line.strip_prefix('[')?;
    let close = rest.find(']')?;
    let seconds = time_to_seconds(&rest[..close])?;
    Some((seconds, rest[close + 1..].trim()))
}

/// Formats seconds as `m:ss`. Minutes are not folded into hours.
pub fn fmt_time(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Parses `m:ss` or `h:mm:ss` into seconds.
pub fn time_to_seconds(value: &str) -> Option<u32> {
    let parts = value
        .trim()
        .split(':')
        .map(|p| p.trim().parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [m, s] => Some(m * 60 + s),
        [h, m, s] => Some(h * 3600 + m * 60 + s),
        _ => None,
    }
}
