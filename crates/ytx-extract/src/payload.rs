use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::extract::{extract_as, Container, ExtractError};

/// One study flashcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Card {
    /// Question or term.
    pub front: String,
    /// Answer or explanation.
    pub back: String,
    /// `m:ss` timestamp, empty when the card is not tied to a moment.
    #[serde(deserialize_with = "lenient_string")]
    pub time: String,
}

/// A mind map node; the root is the video topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MindmapNode {
    pub label: String,
    #[serde(deserialize_with = "lenient_string")]
    pub time: String,
    pub children: Vec<MindmapNode>,
}

impl MindmapNode {
    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(MindmapNode::node_count).sum::<usize>()
    }
}

/// A vocabulary entry lifted from the transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabEntry {
    pub word: String,
    pub phonetic: String,
    /// Part of speech, e.g. `v.` or `phr.`.
    pub pos: String,
    pub meaning: String,
    /// The transcript line the word appears in.
    pub example: String,
    #[serde(deserialize_with = "lenient_string")]
    pub time: String,
}

/// The structured generation features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuredKind {
    Cards,
    Mindmap,
    Vocab,
}

impl StructuredKind {
    /// The top-level JSON container the model is asked to produce.
    pub fn container(self) -> Container {
        match self {
            StructuredKind::Cards | StructuredKind::Vocab => Container::Array,
            StructuredKind::Mindmap => Container::Object,
        }
    }
}

/// A parsed structured result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StructuredPayload {
    Cards(Vec<Card>),
    Mindmap(MindmapNode),
    Vocab(Vec<VocabEntry>),
}

impl StructuredPayload {
    /// Number of top-level items (nodes for a mind map).
    pub fn len(&self) -> usize {
        match self {
            StructuredPayload::Cards(c) => c.len(),
            StructuredPayload::Mindmap(m) => m.node_count(),
            StructuredPayload::Vocab(v) => v.len(),
        }
    }

    /// `true` when the model produced no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Recovers the payload for `kind` from the accumulated model text.
pub fn parse_structured(kind: StructuredKind, text: &str) -> Result<StructuredPayload, ExtractError> {
    let container = kind.container();
    Ok(match kind {
        StructuredKind::Cards => StructuredPayload::Cards(extract_as(text, container)?),
        StructuredKind::Mindmap => StructuredPayload::Mindmap(extract_as(text, container)?),
        StructuredKind::Vocab => StructuredPayload::Vocab(extract_as(text, container)?),
    })
}

/// Accepts `"1:05"`, `65`, or `null` for timestamp fields.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cards_with_missing_fields() {
        let text = r#"[{"front":"Q1","back":"A1","time":"0:30"},{"front":"Q2","back":"A2"}]"#;
        let payload = parse_structured(StructuredKind::Cards, text).unwrap();
        match payload {
            StructuredPayload::Cards(cards) => {
                assert_eq!(cards.len(), 2);
                assert_eq!(cards[0].time, "0:30");
                assert_eq!(cards[1].time, "");
            }
            other => panic!("Expected Cards, got {other:?}"),
        }
    }

    #[test]
    fn test_numeric_and_null_time_accepted() {
        let text = r#"[{"word":"a","time":95},{"word":"b","time":null}]"#;
        let payload = parse_structured(StructuredKind::Vocab, text).unwrap();
        if let StructuredPayload::Vocab(v) = payload {
            assert_eq!(v[0].time, "95");
            assert_eq!(v[1].time, "");
        } else {
            panic!("Expected Vocab");
        }
    }

    #[test]
    fn test_parse_mindmap_counts_nodes() {
        let text = "```json\n{\"label\":\"Topic\",\"children\":[{\"label\":\"A\",\"time\":\"1:00\",\"children\":[{\"label\":\"A1\"}]},{\"label\":\"B\"}]}\n```";
        let payload = parse_structured(StructuredKind::Mindmap, text).unwrap();
        assert_eq!(payload.len(), 4);
        assert!(matches!(payload, StructuredPayload::Mindmap(ref m) if m.label == "Topic"));
    }

    #[test]
    fn test_array_requested_but_only_object_present() {
        let err = parse_structured(StructuredKind::Cards, "{\"front\":\"x\"}").unwrap_err();
        assert_eq!(err, ExtractError::NotFound("array"));
    }

    #[test]
    fn test_payload_serialization_is_tagged() {
        let payload = StructuredPayload::Cards(vec![Card {
            front: "f".into(),
            back: "b".into(),
            time: String::new(),
        }]);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "cards");
        assert_eq!(json["data"][0]["front"], "f");
    }

    #[test]
    fn test_kind_container() {
        assert_eq!(StructuredKind::Cards.container(), Container::Array);
        assert_eq!(StructuredKind::Mindmap.container(), Container::Object);
        assert_eq!(StructuredKind::Vocab.container(), Container::Array);
    }
}
