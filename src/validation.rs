//! Shape rules for questions, one per pack format.
//!
//! Everything here is pure: callers pass the pack, the candidate fields and
//! the numbers already taken in the pack, and get back a [`QuestionBody`]
//! or the first rule it breaks.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{
    BlankAnswers, NewQuestion, OptionMap, QuestionBody, QuestionFormat, QuestionPack,
    QuestionUpdate, TfngAnswer, YnngAnswer,
};

pub const MULTIPLE_CHOICE_KEYS: [&str; 4] = ["A", "B", "C", "D"];
pub const MCQ_MULTIPLE_KEYS: [&str; 10] = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"];
pub const MCQ_MULTIPLE_MIN_OPTIONS: usize = 2;

/// Raw, format-agnostic question fields before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionFields {
    pub number: Option<i64>,
    pub options: Option<OptionMap>,
    pub word_count: Option<u32>,
    pub number_count: Option<u32>,
    pub correct_answer: Option<Value>,
}

impl From<&NewQuestion> for QuestionFields {
    fn from(new: &NewQuestion) -> Self {
        Self {
            number: new.number,
            options: new.options.clone(),
            word_count: new.word_count,
            number_count: new.number_count,
            correct_answer: new.correct_answer.clone(),
        }
    }
}

impl QuestionFields {
    /// Decomposes a stored body so an update can be merged on top of it.
    pub fn from_body(body: &QuestionBody) -> AppResult<Self> {
        let fields = match body {
            QuestionBody::TrueFalseNotGiven {
                number,
                correct_answer,
            } => Self {
                number: Some(*number),
                correct_answer: Some(serde_json::to_value(correct_answer)?),
                ..Self::default()
            },
            QuestionBody::YesNoNotGiven {
                number,
                correct_answer,
            } => Self {
                number: Some(*number),
                correct_answer: Some(serde_json::to_value(correct_answer)?),
                ..Self::default()
            },
            QuestionBody::SummaryCompletion {
                number,
                word_count,
                number_count,
                correct_answer,
            }
            | QuestionBody::SentenceCompletion {
                number,
                word_count,
                number_count,
                correct_answer,
            } => Self {
                number: Some(*number),
                options: None,
                word_count: *word_count,
                number_count: *number_count,
                correct_answer: Some(serde_json::to_value(correct_answer)?),
            },
            QuestionBody::ChooseFromBox {
                number,
                options,
                word_count,
                number_count,
                correct_answer,
            } => Self {
                number: Some(*number),
                options: Some(options.clone()),
                word_count: *word_count,
                number_count: *number_count,
                correct_answer: Some(serde_json::to_value(correct_answer)?),
            },
            QuestionBody::MultipleChoice {
                number,
                options,
                correct_answer,
            } => Self {
                number: Some(*number),
                options: Some(options.clone()),
                correct_answer: Some(Value::String(correct_answer.clone())),
                ..Self::default()
            },
            QuestionBody::McqMultiple {
                options,
                correct_answer,
            } => Self {
                options: Some(options.clone()),
                correct_answer: Some(serde_json::to_value(correct_answer)?),
                ..Self::default()
            },
        };
        Ok(fields)
    }

    /// Overlays the fields an update actually carries.
    pub fn merge(&mut self, update: &QuestionUpdate) {
        if let Some(number) = update.number {
            self.number = number;
        }
        if let Some(options) = &update.options {
            self.options = options.clone();
        }
        if let Some(word_count) = update.word_count {
            self.word_count = word_count;
        }
        if let Some(number_count) = update.number_count {
            self.number_count = number_count;
        }
        if let Some(answer) = &update.correct_answer {
            self.correct_answer = Some(answer.clone());
        }
    }
}

/// Validates `fields` against `pack` and builds the typed body.
///
/// `taken` holds the numbers used by the pack's other questions.
pub fn build_body(
    pack: &QuestionPack,
    fields: QuestionFields,
    taken: &BTreeSet<i64>,
) -> AppResult<QuestionBody> {
    let format = pack.format;
    match format {
        QuestionFormat::TrueFalseNotGiven => {
            reject_options(format, &fields.options)?;
            let number = numbered(pack, fields.number, taken)?;
            let correct_answer = match &fields.correct_answer {
                Some(value) => parse_tfng(value)?,
                None => TfngAnswer::NotGiven,
            };
            Ok(QuestionBody::TrueFalseNotGiven {
                number,
                correct_answer,
            })
        }
        QuestionFormat::YesNoNotGiven => {
            reject_options(format, &fields.options)?;
            let number = numbered(pack, fields.number, taken)?;
            let correct_answer = match &fields.correct_answer {
                Some(value) => parse_ynng(value)?,
                None => YnngAnswer::NotGiven,
            };
            Ok(QuestionBody::YesNoNotGiven {
                number,
                correct_answer,
            })
        }
        QuestionFormat::SummaryCompletion => {
            reject_options(format, &fields.options)?;
            let number = numbered(pack, fields.number, taken)?;
            let correct_answer = match &fields.correct_answer {
                Some(value) => parse_blanks(format, value)?,
                None => BTreeMap::new(),
            };
            check_limits(&correct_answer, fields.word_count, fields.number_count)?;
            Ok(QuestionBody::SummaryCompletion {
                number,
                word_count: fields.word_count,
                number_count: fields.number_count,
                correct_answer,
            })
        }
        QuestionFormat::SentenceCompletion => {
            reject_options(format, &fields.options)?;
            let number = numbered(pack, fields.number, taken)?;
            let correct_answer = required_blanks(format, &fields.correct_answer)?;
            check_limits(&correct_answer, fields.word_count, fields.number_count)?;
            Ok(QuestionBody::SentenceCompletion {
                number,
                word_count: fields.word_count,
                number_count: fields.number_count,
                correct_answer,
            })
        }
        QuestionFormat::ChooseFromBox => {
            let number = numbered(pack, fields.number, taken)?;
            let options = word_box(fields.options)?;
            let correct_answer = required_blanks(format, &fields.correct_answer)?;
            for (blank, answer) in &correct_answer {
                let answer = answer.trim();
                let in_box = options.contains_key(answer) || options.values().any(|w| w == answer);
                if !in_box {
                    return Err(AppError::validation(format!(
                        "answer '{answer}' for blank '{blank}' is not in the word box"
                    )));
                }
            }
            check_limits(&correct_answer, fields.word_count, fields.number_count)?;
            Ok(QuestionBody::ChooseFromBox {
                number,
                options,
                word_count: fields.word_count,
                number_count: fields.number_count,
                correct_answer,
            })
        }
        QuestionFormat::MultipleChoice => {
            let number = numbered(pack, fields.number, taken)?;
            let options = multiple_choice_options(fields.options)?;
            let value = fields.correct_answer.as_ref().ok_or_else(|| {
                AppError::validation("correct_answer is required for MULTIPLE_CHOICE questions")
            })?;
            let letter = letter(value).ok_or_else(|| {
                AppError::validation(format!(
                    "correct_answer for MULTIPLE_CHOICE must be a single letter, got {value}"
                ))
            })?;
            if !options.contains_key(&letter) {
                return Err(AppError::validation(format!(
                    "correct_answer for MULTIPLE_CHOICE must be one of A, B, C, D, got '{letter}'"
                )));
            }
            Ok(QuestionBody::MultipleChoice {
                number,
                options,
                correct_answer: letter,
            })
        }
        QuestionFormat::McqMultiple => {
            let options = mcq_multiple_options(pack, fields.options)?;
            let correct_answer = mcq_multiple_answer(&options, &fields.correct_answer)?;
            Ok(QuestionBody::McqMultiple {
                options,
                correct_answer,
            })
        }
    }
}

/// Re-checks a stored body against a pack whose type or range is changing.
pub fn revalidate(pack: &QuestionPack, body: &QuestionBody) -> AppResult<QuestionBody> {
    if body.format() != pack.format {
        return Err(AppError::validation(format!(
            "pack {} holds {} questions and cannot change type to {}",
            pack.id,
            body.format(),
            pack.format
        )));
    }
    build_body(pack, QuestionFields::from_body(body)?, &BTreeSet::new())
}

fn numbered(pack: &QuestionPack, number: Option<i64>, taken: &BTreeSet<i64>) -> AppResult<i64> {
    let number = number.ok_or_else(|| {
        AppError::validation(format!(
            "question number is required for {} questions",
            pack.format
        ))
    })?;
    let range = pack.range();
    if !range.contains(number) {
        return Err(AppError::validation(format!(
            "question number {number} is outside pack range {range}"
        )));
    }
    if taken.contains(&number) {
        return Err(AppError::Conflict(format!(
            "question number {number} is already used in pack {}",
            pack.id
        )));
    }
    Ok(number)
}

fn reject_options(format: QuestionFormat, options: &Option<OptionMap>) -> AppResult<()> {
    match options {
        Some(options) if !options.is_empty() => Err(AppError::validation(format!(
            "{format} questions do not take options"
        ))),
        _ => Ok(()),
    }
}

fn normalized_word(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(|s| s.trim().to_uppercase().split_whitespace().collect::<Vec<_>>().join("_"))
}

fn parse_tfng(value: &Value) -> AppResult<TfngAnswer> {
    match normalized_word(value).as_deref() {
        Some("TRUE") => Ok(TfngAnswer::True),
        Some("FALSE") => Ok(TfngAnswer::False),
        Some("NOT_GIVEN") => Ok(TfngAnswer::NotGiven),
        _ => Err(AppError::validation(format!(
            "correct_answer for TRUE_FALSE_NOT_GIVEN must be one of TRUE, FALSE, NOT_GIVEN, got {value}"
        ))),
    }
}

fn parse_ynng(value: &Value) -> AppResult<YnngAnswer> {
    match normalized_word(value).as_deref() {
        Some("YES") => Ok(YnngAnswer::Yes),
        Some("NO") => Ok(YnngAnswer::No),
        Some("NOT_GIVEN") => Ok(YnngAnswer::NotGiven),
        _ => Err(AppError::validation(format!(
            "correct_answer for YES_NO_NOT_GIVEN must be one of YES, NO, NOT_GIVEN, got {value}"
        ))),
    }
}

fn parse_blanks(format: QuestionFormat, value: &Value) -> AppResult<BlankAnswers> {
    let object = value.as_object().ok_or_else(|| {
        AppError::validation(format!(
            "correct_answer for {format} must map blank labels to answers, got {value}"
        ))
    })?;

    let mut blanks = BTreeMap::new();
    for (blank, answer) in object {
        if blank.trim().is_empty() {
            return Err(AppError::validation(format!(
                "blank labels for {format} must not be empty"
            )));
        }
        let text = answer.as_str().map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return Err(AppError::validation(format!(
                "answer for blank '{blank}' must be non-empty text, got {answer}"
            )));
        }
        blanks.insert(blank.clone(), text.to_string());
    }
    Ok(blanks)
}

fn required_blanks(format: QuestionFormat, value: &Option<Value>) -> AppResult<BlankAnswers> {
    let value = value.as_ref().ok_or_else(|| {
        AppError::validation(format!("correct_answer is required for {format} questions"))
    })?;
    let blanks = parse_blanks(format, value)?;
    if blanks.is_empty() {
        return Err(AppError::validation(format!(
            "correct_answer for {format} must name at least one blank"
        )));
    }
    Ok(blanks)
}

fn is_numeric_token(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-' | '/' | ':'))
}

/// Enforces "no more than N words and/or M numbers" per blank.
fn check_limits(
    answers: &BlankAnswers,
    word_count: Option<u32>,
    number_count: Option<u32>,
) -> AppResult<()> {
    for (blank, answer) in answers {
        let (numbers, words): (Vec<&str>, Vec<&str>) =
            answer.split_whitespace().partition(|token| is_numeric_token(token));

        if let Some(limit) = word_count {
            if words.len() > limit as usize {
                return Err(AppError::validation(format!(
                    "answer for blank '{blank}' has {} words, limit is {limit}",
                    words.len()
                )));
            }
        }
        if let Some(limit) = number_count {
            if numbers.len() > limit as usize {
                return Err(AppError::validation(format!(
                    "answer for blank '{blank}' has {} numbers, limit is {limit}",
                    numbers.len()
                )));
            }
        }
    }
    Ok(())
}

fn word_box(options: Option<OptionMap>) -> AppResult<OptionMap> {
    match options {
        Some(options) if !options.is_empty() => {
            if let Some(key) = options.keys().find(|key| key.trim().is_empty()) {
                return Err(AppError::validation(format!(
                    "word box keys must not be empty, got '{key}'"
                )));
            }
            Ok(options)
        }
        _ => Err(AppError::validation(
            "CHOOSE_FROM_BOX questions need a non-empty word box in options",
        )),
    }
}

fn letter(value: &Value) -> Option<String> {
    let letter = value.as_str()?.trim().to_uppercase();
    let mut chars = letter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some(letter),
        _ => None,
    }
}

fn check_option_text(options: &OptionMap) -> AppResult<()> {
    if let Some((key, _)) = options.iter().find(|(_, text)| text.trim().is_empty()) {
        return Err(AppError::validation(format!("option {key} must have text")));
    }
    Ok(())
}

fn multiple_choice_options(options: Option<OptionMap>) -> AppResult<OptionMap> {
    let options = options.unwrap_or_default();
    let keys: Vec<&str> = options.keys().map(String::as_str).collect();
    if keys != MULTIPLE_CHOICE_KEYS {
        return Err(AppError::validation(format!(
            "MULTIPLE_CHOICE options must have exactly the keys A, B, C, D, got {keys:?}"
        )));
    }
    check_option_text(&options)?;
    Ok(options)
}

/// Largest option set an MCQ_MULTIPLE question in `pack` may offer.
pub fn mcq_multiple_max_options(pack: &QuestionPack) -> usize {
    let range_size = usize::try_from(pack.range().len()).unwrap_or(0);
    range_size.min(MCQ_MULTIPLE_KEYS.len())
}

fn mcq_multiple_options(pack: &QuestionPack, options: Option<OptionMap>) -> AppResult<OptionMap> {
    let options = options.unwrap_or_default();
    if let Some(key) = options
        .keys()
        .find(|key| !MCQ_MULTIPLE_KEYS.contains(&key.as_str()))
    {
        return Err(AppError::validation(format!(
            "MCQ_MULTIPLE option keys must be letters A to J, got '{key}'"
        )));
    }

    let max = mcq_multiple_max_options(pack);
    if options.len() < MCQ_MULTIPLE_MIN_OPTIONS || options.len() > max {
        return Err(AppError::validation(format!(
            "MCQ_MULTIPLE questions in pack range {} need between {MCQ_MULTIPLE_MIN_OPTIONS} and {max} options, got {}",
            pack.range(),
            options.len()
        )));
    }
    check_option_text(&options)?;
    Ok(options)
}

fn mcq_multiple_answer(options: &OptionMap, value: &Option<Value>) -> AppResult<Vec<String>> {
    let value = value.as_ref().ok_or_else(|| {
        AppError::validation("correct_answer is required for MCQ_MULTIPLE questions")
    })?;
    let items = value.as_array().ok_or_else(|| {
        AppError::validation(format!(
            "correct_answer for MCQ_MULTIPLE must be a list of letters, got {value}"
        ))
    })?;
    if items.is_empty() {
        return Err(AppError::validation(
            "correct_answer for MCQ_MULTIPLE must name at least one option",
        ));
    }

    let mut seen = BTreeSet::new();
    let mut answer = Vec::with_capacity(items.len());
    for item in items {
        let letter = letter(item).ok_or_else(|| {
            AppError::validation(format!(
                "correct_answer for MCQ_MULTIPLE must contain single letters, got {item}"
            ))
        })?;
        if !seen.insert(letter.clone()) {
            return Err(AppError::validation(format!(
                "correct_answer for MCQ_MULTIPLE lists '{letter}' more than once"
            )));
        }
        if !options.contains_key(&letter) {
            return Err(AppError::validation(format!(
                "correct_answer '{letter}' is not one of the options {:?}",
                options.keys().collect::<Vec<_>>()
            )));
        }
        answer.push(letter);
    }
    Ok(answer)
}
