// Backend Test Suite
// Organized by module, one category per file

use tempfile::TempDir;

use crate::models::{
    NewPassage, NewQuestionPack, NewReadingTest, Passage, QuestionDistribution, QuestionFormat,
    QuestionPack, ReadingTest,
};
use crate::storage::ContentStore;

#[cfg(test)]
mod error_tests;






#[cfg(test)]
mod composition_tests;



#[cfg(test)]
mod validation_tests;



/// Helper to create a test store backed by a temp directory
pub(crate) fn create_test_store() -> (ContentStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = ContentStore::new(temp_dir.path()).expect("Failed to create store");
    (store, temp_dir)
}

pub(crate) fn add_test(store: &ContentStore, title: &str) -> ReadingTest {
    store
        .create_reading_test(NewReadingTest {
            title: title.to_string(),
            question_distribution: QuestionDistribution::default(),
            time_limit: 60,
        })
        .expect("Failed to create test")
}

pub(crate) fn add_passage(store: &ContentStore, title: &str, test_id: Option<i64>) -> Passage {
    store
        .create_passage(NewPassage {
            title: title.to_string(),
            test_id,
        })
        .expect("Failed to create passage")
}

pub(crate) fn add_pack(
    store: &ContentStore,
    passage_id: i64,
    format: QuestionFormat,
    start: i64,
    end: i64,
) -> QuestionPack {
    store
        .create_question_pack(
            passage_id,
            NewQuestionPack {
                format,
                start_question: start,
                end_question: end,
            },
        )
        .expect("Failed to create question pack")
}
