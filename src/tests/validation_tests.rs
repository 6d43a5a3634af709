// Category 10: Question Shape Tests (validation.rs)
// Pure rule checks, no database involved

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};

use crate::error::AppError;
use crate::models::{QuestionBody, QuestionFormat, QuestionPack, TfngAnswer, YnngAnswer};
use crate::validation::{build_body, mcq_multiple_max_options, revalidate, QuestionFields};

fn pack(format: QuestionFormat, start: i64, end: i64) -> QuestionPack {
    QuestionPack {
        id: 1,
        passage_id: 1,
        format,
        start_question: start,
        end_question: end,
    }
}

fn options(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn fields(number: Option<i64>, answer: Option<Value>) -> QuestionFields {
    QuestionFields {
        number,
        correct_answer: answer,
        ..Default::default()
    }
}

fn none_taken() -> BTreeSet<i64> {
    BTreeSet::new()
}

fn expect_validation(result: Result<QuestionBody, AppError>, needle: &str) {
    match result {
        Err(AppError::Validation(message)) => {
            assert!(message.contains(needle), "'{message}' does not mention '{needle}'")
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
}

/// Test Case 10.1: TFNG pack [1,4] walkthrough
#[test]
fn test_tfng_scenario() {
    let p = pack(QuestionFormat::TrueFalseNotGiven, 1, 4);

    expect_validation(
        build_body(&p, fields(Some(3), Some(json!("MAYBE"))), &none_taken()),
        "TRUE, FALSE, NOT_GIVEN",
    );
    expect_validation(
        build_body(&p, fields(Some(5), Some(json!("TRUE"))), &none_taken()),
        "outside pack range [1, 4]",
    );

    let body = build_body(&p, fields(Some(3), Some(json!("TRUE"))), &none_taken()).unwrap();
    assert_eq!(
        body,
        QuestionBody::TrueFalseNotGiven {
            number: 3,
            correct_answer: TfngAnswer::True
        }
    );

    let taken: BTreeSet<i64> = [3].into_iter().collect();
    let err = build_body(&p, fields(Some(3), Some(json!("TRUE"))), &taken).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

/// Test Case 10.2: TF/YN answers are normalized and default to NOT_GIVEN
#[test]
fn test_tfng_ynng_normalization() {
    let tf = pack(QuestionFormat::TrueFalseNotGiven, 1, 4);
    let body = build_body(&tf, fields(Some(1), Some(json!(" not given "))), &none_taken()).unwrap();
    assert_eq!(
        body,
        QuestionBody::TrueFalseNotGiven {
            number: 1,
            correct_answer: TfngAnswer::NotGiven
        }
    );
    let body = build_body(&tf, fields(Some(2), None), &none_taken()).unwrap();
    assert!(matches!(
        body,
        QuestionBody::TrueFalseNotGiven {
            correct_answer: TfngAnswer::NotGiven,
            ..
        }
    ));

    let yn = pack(QuestionFormat::YesNoNotGiven, 1, 4);
    let body = build_body(&yn, fields(Some(1), Some(json!("yes"))), &none_taken()).unwrap();
    assert!(matches!(
        body,
        QuestionBody::YesNoNotGiven {
            correct_answer: YnngAnswer::Yes,
            ..
        }
    ));
    expect_validation(
        build_body(&yn, fields(Some(1), Some(json!("TRUE"))), &none_taken()),
        "YES, NO, NOT_GIVEN",
    );
}

/// Test Case 10.3: Number is required and options are refused for TF
#[test]
fn test_tfng_requires_number() {
    let p = pack(QuestionFormat::TrueFalseNotGiven, 1, 4);
    expect_validation(build_body(&p, fields(None, None), &none_taken()), "required");

    let with_options = QuestionFields {
        number: Some(1),
        options: Some(options(&[("A", "x")])),
        ..Default::default()
    };
    expect_validation(build_body(&p, with_options, &none_taken()), "do not take options");
}

/// Test Case 10.4: MULTIPLE_CHOICE accepts A-D and keeps options intact
#[test]
fn test_multiple_choice() {
    let p = pack(QuestionFormat::MultipleChoice, 1, 5);
    let abcd = options(&[("A", "x"), ("B", "y"), ("C", "z"), ("D", "w")]);

    let body = build_body(
        &p,
        QuestionFields {
            number: Some(2),
            options: Some(abcd.clone()),
            correct_answer: Some(json!("B")),
            ..Default::default()
        },
        &none_taken(),
    )
    .unwrap();
    assert_eq!(
        body,
        QuestionBody::MultipleChoice {
            number: 2,
            options: abcd.clone(),
            correct_answer: "B".into()
        }
    );

    expect_validation(
        build_body(
            &p,
            QuestionFields {
                number: Some(2),
                options: Some(abcd.clone()),
                correct_answer: Some(json!("E")),
                ..Default::default()
            },
            &none_taken(),
        ),
        "must be one of A, B, C, D",
    );

    expect_validation(
        build_body(
            &p,
            QuestionFields {
                number: Some(2),
                options: Some(options(&[("A", "x"), ("B", "y"), ("C", "z")])),
                correct_answer: Some(json!("A")),
                ..Default::default()
            },
            &none_taken(),
        ),
        "exactly the keys A, B, C, D",
    );

    expect_validation(
        build_body(
            &p,
            QuestionFields {
                number: Some(2),
                options: Some(abcd),
                correct_answer: None,
                ..Default::default()
            },
            &none_taken(),
        ),
        "required",
    );
}

/// Test Case 10.5: MCQ_MULTIPLE on pack [10,12] allows at most 3 options
#[test]
fn test_mcq_multiple_scenario() {
    let p = pack(QuestionFormat::McqMultiple, 10, 12);
    assert_eq!(mcq_multiple_max_options(&p), 3);

    let four = options(&[("A", "a"), ("B", "b"), ("C", "c"), ("D", "d")]);
    expect_validation(
        build_body(
            &p,
            QuestionFields {
                options: Some(four),
                correct_answer: Some(json!(["A"])),
                ..Default::default()
            },
            &none_taken(),
        ),
        "between 2 and 3 options",
    );

    let three = options(&[("A", "a"), ("B", "b"), ("C", "c")]);
    let body = build_body(
        &p,
        QuestionFields {
            options: Some(three.clone()),
            correct_answer: Some(json!(["a", "C"])),
            ..Default::default()
        },
        &none_taken(),
    )
    .unwrap();
    assert_eq!(
        body,
        QuestionBody::McqMultiple {
            options: three.clone(),
            correct_answer: vec!["A".into(), "C".into()]
        }
    );

    expect_validation(
        build_body(
            &p,
            QuestionFields {
                options: Some(three.clone()),
                correct_answer: Some(json!(["A", "A"])),
                ..Default::default()
            },
            &none_taken(),
        ),
        "more than once",
    );
    expect_validation(
        build_body(
            &p,
            QuestionFields {
                options: Some(three.clone()),
                correct_answer: Some(json!(["Z"])),
                ..Default::default()
            },
            &none_taken(),
        ),
        "not one of the options",
    );
    expect_validation(
        build_body(
            &p,
            QuestionFields {
                options: Some(three),
                correct_answer: Some(json!([])),
                ..Default::default()
            },
            &none_taken(),
        ),
        "at least one",
    );
}

/// Test Case 10.6: MCQ_MULTIPLE option count is capped at ten
#[test]
fn test_mcq_multiple_wide_pack() {
    let p = pack(QuestionFormat::McqMultiple, 1, 40);
    assert_eq!(mcq_multiple_max_options(&p), 10);

    expect_validation(
        build_body(
            &p,
            QuestionFields {
                options: Some(options(&[("A", "a"), ("K", "k")])),
                correct_answer: Some(json!(["A"])),
                ..Default::default()
            },
            &none_taken(),
        ),
        "A to J",
    );
    expect_validation(
        build_body(
            &p,
            QuestionFields {
                options: Some(options(&[("A", "a")])),
                correct_answer: Some(json!(["A"])),
                ..Default::default()
            },
            &none_taken(),
        ),
        "between 2 and 10",
    );
}

/// Test Case 10.7: SUMMARY_COMPLETION defaults to no answers and enforces limits
#[test]
fn test_summary_completion() {
    let p = pack(QuestionFormat::SummaryCompletion, 1, 6);

    let body = build_body(&p, fields(Some(1), None), &none_taken()).unwrap();
    assert_eq!(
        body,
        QuestionBody::SummaryCompletion {
            number: 1,
            word_count: None,
            number_count: None,
            correct_answer: BTreeMap::new()
        }
    );

    let limited = QuestionFields {
        number: Some(2),
        word_count: Some(2),
        number_count: Some(1),
        correct_answer: Some(json!({ "1": "cold dry winds", "2": "1850" })),
        ..Default::default()
    };
    expect_validation(build_body(&p, limited, &none_taken()), "3 words, limit is 2");

    let fits = QuestionFields {
        number: Some(2),
        word_count: Some(2),
        number_count: Some(1),
        correct_answer: Some(json!({ "1": "dry winds", "2": "1850 " })),
        ..Default::default()
    };
    let body = build_body(&p, fits, &none_taken()).unwrap();
    match body {
        QuestionBody::SummaryCompletion { correct_answer, .. } => {
            assert_eq!(correct_answer.get("2").map(String::as_str), Some("1850"))
        }
        other => panic!("Expected summary completion, got {:?}", other),
    }

    expect_validation(
        build_body(&p, fields(Some(3), Some(json!("not a map"))), &none_taken()),
        "map blank labels",
    );
}

/// Test Case 10.8: SENTENCE_COMPLETION requires answers
#[test]
fn test_sentence_completion() {
    let p = pack(QuestionFormat::SentenceCompletion, 1, 6);

    expect_validation(build_body(&p, fields(Some(1), None), &none_taken()), "required");
    expect_validation(
        build_body(&p, fields(Some(1), Some(json!({}))), &none_taken()),
        "at least one blank",
    );
    expect_validation(
        build_body(&p, fields(Some(1), Some(json!({ "1": "  " }))), &none_taken()),
        "non-empty",
    );
    assert!(build_body(&p, fields(Some(1), Some(json!({ "1": "glaciers" }))), &none_taken()).is_ok());
}

/// Test Case 10.9: CHOOSE_FROM_BOX answers must come from the box
#[test]
fn test_choose_from_box() {
    let p = pack(QuestionFormat::ChooseFromBox, 1, 6);
    let word_box = options(&[("A", "river"), ("B", "forest"), ("C", "desert")]);

    let by_key = QuestionFields {
        number: Some(1),
        options: Some(word_box.clone()),
        correct_answer: Some(json!({ "1": "B" })),
        ..Default::default()
    };
    assert!(build_body(&p, by_key, &none_taken()).is_ok());

    let by_word = QuestionFields {
        number: Some(1),
        options: Some(word_box.clone()),
        correct_answer: Some(json!({ "1": "desert" })),
        ..Default::default()
    };
    assert!(build_body(&p, by_word, &none_taken()).is_ok());

    let outside = QuestionFields {
        number: Some(1),
        options: Some(word_box),
        correct_answer: Some(json!({ "1": "ocean" })),
        ..Default::default()
    };
    expect_validation(build_body(&p, outside, &none_taken()), "not in the word box");

    let no_box = QuestionFields {
        number: Some(1),
        correct_answer: Some(json!({ "1": "river" })),
        ..Default::default()
    };
    expect_validation(build_body(&p, no_box, &none_taken()), "word box");
}

/// Test Case 10.10: Revalidation rejects a type change and a shrunk range
#[test]
fn test_revalidate() {
    let body = QuestionBody::TrueFalseNotGiven {
        number: 4,
        correct_answer: TfngAnswer::False,
    };

    assert_eq!(
        revalidate(&pack(QuestionFormat::TrueFalseNotGiven, 1, 6), &body).unwrap(),
        body
    );
    expect_validation(
        revalidate(&pack(QuestionFormat::YesNoNotGiven, 1, 6), &body),
        "cannot change type",
    );
    expect_validation(
        revalidate(&pack(QuestionFormat::TrueFalseNotGiven, 1, 3), &body),
        "outside pack range",
    );

    let mcq = QuestionBody::McqMultiple {
        options: options(&[("A", "a"), ("B", "b"), ("C", "c")]),
        correct_answer: vec!["B".into()],
    };
    expect_validation(
        revalidate(&pack(QuestionFormat::McqMultiple, 1, 2), &mcq),
        "between 2 and 2",
    );
}

/// Test Case 10.11: Stored bodies decompose back into the same fields
#[test]
fn test_fields_round_trip_through_body() {
    let p = pack(QuestionFormat::ChooseFromBox, 1, 6);
    let original = QuestionFields {
        number: Some(5),
        options: Some(options(&[("A", "river"), ("B", "forest")])),
        word_count: Some(1),
        number_count: None,
        correct_answer: Some(json!({ "5": "A" })),
    };

    let body = build_body(&p, original.clone(), &none_taken()).unwrap();
    let fields = QuestionFields::from_body(&body).unwrap();

    assert_eq!(fields, original);
    assert_eq!(build_body(&p, fields, &none_taken()).unwrap(), body);
}
