use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};

pub const DEFAULT_TIME_LIMIT: i64 = 60;
pub const MAX_PASSAGES_PER_TEST: usize = 3;

/// Deserializes a field so that "absent" and "explicit null" stay distinct.
///
/// Use together with `#[serde(default)]`: a missing key yields `None`, `null`
/// yields `Some(None)` and a value yields `Some(Some(v))`.
pub fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Format name → number of questions authored for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionDistribution(pub BTreeMap<String, i64>);

impl QuestionDistribution {
    /// Summed in `i128` so no combination of `i64` counts can overflow.
    pub fn total(&self) -> i128 {
        self.0.values().map(|count| i128::from(*count)).sum()
    }

    /// A full test splits 40 questions 13/13/14; an empty distribution means
    /// content has not been authored yet.
    pub fn validate(&self) -> AppResult<()> {
        if let Some((name, count)) = self.0.iter().find(|(_, count)| **count < 0) {
            return Err(AppError::validation(format!(
                "question count for '{name}' must not be negative, got {count}"
            )));
        }

        let total = self.total();
        if total == 0 {
            return Ok(());
        }
        if total != 40 {
            return Err(AppError::validation(format!(
                "total questions must be 40, got {total}"
            )));
        }

        let mut values: Vec<i64> = self.0.values().copied().collect();
        values.sort_unstable();
        if values != [13, 13, 14] {
            return Err(AppError::validation(format!(
                "question distribution must be 13, 13, 14 questions per passage, got {values:?}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingTest {
    pub id: i64,
    pub title: String,
    pub passage_ids: Vec<i64>,
    pub question_distribution: QuestionDistribution,
    pub time_limit: i64,
    pub created_at: String,
    pub updated_at: String,
}

fn default_time_limit() -> i64 {
    DEFAULT_TIME_LIMIT
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReadingTest {
    pub title: String,
    #[serde(default)]
    pub question_distribution: QuestionDistribution,
    #[serde(default = "default_time_limit")]
    pub time_limit: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadingTestUpdate {
    pub title: Option<String>,
    pub question_distribution: Option<QuestionDistribution>,
    pub time_limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Passages and paragraphs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: i64,
    pub title: String,
    pub test_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// A passage with everything it owns, in rendering order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageDetail {
    #[serde(flatten)]
    pub passage: Passage,
    pub paragraphs: Vec<Paragraph>,
    pub question_packs: Vec<QuestionPackDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPassage {
    pub title: String,
    #[serde(default)]
    pub test_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PassageUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub test_id: Option<Option<i64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PassageAssignment {
    pub test_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub id: i64,
    pub passage_id: i64,
    pub text: String,
    pub order: i64,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewParagraph {
    pub text: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParagraphUpdate {
    pub text: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub label: Option<Option<String>>,
    pub order: Option<i64>,
}

/// Trims a paragraph label and upper-cases it; blank labels become `None`.
pub fn normalize_label(label: Option<&str>) -> AppResult<Option<String>> {
    let Some(raw) = label.map(str::trim).filter(|l| !l.is_empty()) else {
        return Ok(None);
    };
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_alphabetic() => Ok(Some(raw.to_uppercase())),
        _ => Err(AppError::validation(format!(
            "paragraph label must be a single letter, got '{raw}'"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Question packs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionFormat {
    TrueFalseNotGiven,
    YesNoNotGiven,
    SummaryCompletion,
    SentenceCompletion,
    ChooseFromBox,
    MultipleChoice,
    McqMultiple,
}

impl QuestionFormat {
    pub const ALL: [QuestionFormat; 7] = [
        QuestionFormat::TrueFalseNotGiven,
        QuestionFormat::YesNoNotGiven,
        QuestionFormat::SummaryCompletion,
        QuestionFormat::SentenceCompletion,
        QuestionFormat::ChooseFromBox,
        QuestionFormat::MultipleChoice,
        QuestionFormat::McqMultiple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionFormat::TrueFalseNotGiven => "TRUE_FALSE_NOT_GIVEN",
            QuestionFormat::YesNoNotGiven => "YES_NO_NOT_GIVEN",
            QuestionFormat::SummaryCompletion => "SUMMARY_COMPLETION",
            QuestionFormat::SentenceCompletion => "SENTENCE_COMPLETION",
            QuestionFormat::ChooseFromBox => "CHOOSE_FROM_BOX",
            QuestionFormat::MultipleChoice => "MULTIPLE_CHOICE",
            QuestionFormat::McqMultiple => "MCQ_MULTIPLE",
        }
    }

    pub fn is_completion(&self) -> bool {
        matches!(
            self,
            QuestionFormat::SummaryCompletion
                | QuestionFormat::SentenceCompletion
                | QuestionFormat::ChooseFromBox
        )
    }
}

impl fmt::Display for QuestionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionFormat {
    type Err = AppError;

    /// Only stored tags are parsed this way; request bodies go through serde.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        QuestionFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == value)
            .ok_or_else(|| {
                AppError::InvariantViolation(format!("unknown question pack type '{value}'"))
            })
    }
}

/// Inclusive range of question numbers covered by a pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionRange {
    pub start: i64,
    pub end: i64,
}

impl QuestionRange {
    pub fn new(start: i64, end: i64) -> AppResult<Self> {
        if start < 1 {
            return Err(AppError::validation(format!(
                "start_question must be at least 1, got {start}"
            )));
        }
        if end < start {
            return Err(AppError::validation(format!(
                "end_question ({end}) must be greater than or equal to start_question ({start})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn overlaps(&self, other: &QuestionRange) -> bool {
        !(self.end < other.start || self.start > other.end)
    }

    pub fn contains(&self, number: i64) -> bool {
        (self.start..=self.end).contains(&number)
    }

    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }
}

impl fmt::Display for QuestionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPack {
    pub id: i64,
    pub passage_id: i64,
    #[serde(rename = "type")]
    pub format: QuestionFormat,
    pub start_question: i64,
    pub end_question: i64,
}

impl QuestionPack {
    pub fn range(&self) -> QuestionRange {
        QuestionRange {
            start: self.start_question,
            end: self.end_question,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPackDetail {
    #[serde(flatten)]
    pub pack: QuestionPack,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestionPack {
    #[serde(rename = "type")]
    pub format: QuestionFormat,
    pub start_question: i64,
    pub end_question: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionPackUpdate {
    #[serde(rename = "type")]
    pub format: Option<QuestionFormat>,
    pub start_question: Option<i64>,
    pub end_question: Option<i64>,
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

pub type OptionMap = BTreeMap<String, String>;
pub type BlankAnswers = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TfngAnswer {
    True,
    False,
    NotGiven,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum YnngAnswer {
    Yes,
    No,
    NotGiven,
}

/// The validated, format-specific part of a question.
///
/// Each variant carries only the fields its format uses; MCQ_MULTIPLE has no
/// number at all because it spans the whole pack range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionBody {
    TrueFalseNotGiven {
        number: i64,
        correct_answer: TfngAnswer,
    },
    YesNoNotGiven {
        number: i64,
        correct_answer: YnngAnswer,
    },
    SummaryCompletion {
        number: i64,
        #[serde(default)]
        word_count: Option<u32>,
        #[serde(default)]
        number_count: Option<u32>,
        correct_answer: BlankAnswers,
    },
    SentenceCompletion {
        number: i64,
        #[serde(default)]
        word_count: Option<u32>,
        #[serde(default)]
        number_count: Option<u32>,
        correct_answer: BlankAnswers,
    },
    ChooseFromBox {
        number: i64,
        options: OptionMap,
        #[serde(default)]
        word_count: Option<u32>,
        #[serde(default)]
        number_count: Option<u32>,
        correct_answer: BlankAnswers,
    },
    MultipleChoice {
        number: i64,
        options: OptionMap,
        correct_answer: String,
    },
    McqMultiple {
        options: OptionMap,
        correct_answer: Vec<String>,
    },
}

impl QuestionBody {
    pub fn format(&self) -> QuestionFormat {
        match self {
            QuestionBody::TrueFalseNotGiven { .. } => QuestionFormat::TrueFalseNotGiven,
            QuestionBody::YesNoNotGiven { .. } => QuestionFormat::YesNoNotGiven,
            QuestionBody::SummaryCompletion { .. } => QuestionFormat::SummaryCompletion,
            QuestionBody::SentenceCompletion { .. } => QuestionFormat::SentenceCompletion,
            QuestionBody::ChooseFromBox { .. } => QuestionFormat::ChooseFromBox,
            QuestionBody::MultipleChoice { .. } => QuestionFormat::MultipleChoice,
            QuestionBody::McqMultiple { .. } => QuestionFormat::McqMultiple,
        }
    }

    pub fn number(&self) -> Option<i64> {
        match self {
            QuestionBody::TrueFalseNotGiven { number, .. }
            | QuestionBody::YesNoNotGiven { number, .. }
            | QuestionBody::SummaryCompletion { number, .. }
            | QuestionBody::SentenceCompletion { number, .. }
            | QuestionBody::ChooseFromBox { number, .. }
            | QuestionBody::MultipleChoice { number, .. } => Some(*number),
            QuestionBody::McqMultiple { .. } => None,
        }
    }

    pub fn options(&self) -> Option<&OptionMap> {
        match self {
            QuestionBody::ChooseFromBox { options, .. }
            | QuestionBody::MultipleChoice { options, .. }
            | QuestionBody::McqMultiple { options, .. } => Some(options),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub pack_id: i64,
    pub title: Option<String>,
    pub text: String,
    #[serde(flatten)]
    pub body: QuestionBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    #[serde(default)]
    pub number: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
    #[serde(default)]
    pub options: Option<OptionMap>,
    #[serde(default)]
    pub word_count: Option<u32>,
    #[serde(default)]
    pub number_count: Option<u32>,
    #[serde(default)]
    pub correct_answer: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionUpdate {
    #[serde(default, deserialize_with = "present")]
    pub number: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Option<String>>,
    pub text: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub options: Option<Option<OptionMap>>,
    #[serde(default, deserialize_with = "present")]
    pub word_count: Option<Option<u32>>,
    #[serde(default, deserialize_with = "present")]
    pub number_count: Option<Option<u32>>,
    pub correct_answer: Option<Value>,
}
