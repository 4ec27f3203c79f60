use serde::{Deserialize, Serialize};

/// A saved unit of source text plus its AI annotation. `analysis` is absent
/// on records written by older shells that stored raw text only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default)]
    pub sentences: Vec<Sentence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub trans: String,
    #[serde(flatten)]
    pub annotations: SentenceAnnotations,
}

/// The annotation container has changed shape across app iterations. Readers
/// accept every historical field name; writers only ever emit `Points`.
/// `Empty` must stay last: untagged deserialization tries variants in order
/// and `Empty` matches any leftover map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SentenceAnnotations {
    Points { points: Vec<ChunkNote> },
    Notes { notes: Vec<PhraseNote> },
    Tokens { tokens: Vec<TokenNote> },
    Grammar { grammar: Vec<GrammarNote> },
    Empty {},
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkNote {
    pub chunk: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseNote {
    pub phrase: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenNote {
    pub token: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarNote {
    pub point: String,
    #[serde(default)]
    pub explanation: String,
}

/// One annotation in shape-independent form: a phrase, a free-text category
/// tag, and an explanation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationView<'a> {
    pub phrase: &'a str,
    pub tag: &'a str,
    pub description: &'a str,
}

impl SentenceAnnotations {
    pub fn notes(&self) -> Vec<AnnotationView<'_>> {
        match self {
            Self::Points { points } => points
                .iter()
                .map(|p| AnnotationView {
                    phrase: &p.chunk,
                    tag: &p.kind,
                    description: &p.desc,
                })
                .collect(),
            Self::Notes { notes } => notes
                .iter()
                .map(|n| AnnotationView {
                    phrase: &n.phrase,
                    tag: &n.kind,
                    description: &n.note,
                })
                .collect(),
            Self::Tokens { tokens } => tokens
                .iter()
                .map(|t| AnnotationView {
                    phrase: &t.token,
                    tag: &t.kind,
                    description: &t.desc,
                })
                .collect(),
            Self::Grammar { grammar } => grammar
                .iter()
                .map(|g| AnnotationView {
                    phrase: &g.point,
                    tag: "语法",
                    description: &g.explanation,
                })
                .collect(),
            Self::Empty {} => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.notes().is_empty()
    }
}

impl Default for SentenceAnnotations {
    fn default() -> Self {
        Self::Empty {}
    }
}

/// A saved word with its contextual explanation. `lesson_id` is a weak
/// reference: deleting the lesson leaves the card in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabCard {
    pub id: i64,
    pub word: String,
    #[serde(default)]
    pub meaning: String,
    #[serde(default)]
    pub pronunciation: String,
    #[serde(default)]
    pub grammar_type: String,
    #[serde(default)]
    pub note: String,
    #[serde(rename = "contextSentence", default)]
    pub context_sentence: String,
    #[serde(rename = "lessonId", default)]
    pub lesson_id: Option<i64>,
    pub timestamp: i64,
    #[serde(rename = "reviewStage", default)]
    pub review_stage: u32,
    #[serde(rename = "lastReviewedAt", default)]
    pub last_reviewed_at: Option<i64>,
}

/// Response schema of the single-word lookup. The model occasionally drops a
/// field; everything defaults to empty rather than failing the whole lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordExplanation {
    #[serde(default)]
    pub meaning: String,
    #[serde(default)]
    pub pronunciation: String,
    #[serde(default)]
    pub grammar_type: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub perfect_sentence: String,
}
