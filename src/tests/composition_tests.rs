// Category 7: Test Composition Tests (composition.rs, passages.rs)
// Both sides of the passage/test link must always agree

use super::{add_passage, add_test, create_test_store};
use crate::error::AppError;
use crate::models::{NewPassage, PassageUpdate};
use crate::storage::ContentStore;

/// Every passage's test_id matches exactly the tests whose list names it
fn assert_consistent(store: &ContentStore) {
    let tests = store.list_reading_tests().unwrap();
    let passages = store.list_passages().unwrap();

    for passage in &passages {
        let listed_in: Vec<i64> = tests
            .iter()
            .filter(|t| t.passage_ids.contains(&passage.id))
            .map(|t| t.id)
            .collect();
        match passage.test_id {
            Some(test_id) => assert_eq!(listed_in, vec![test_id], "passage {}", passage.id),
            None => assert!(listed_in.is_empty(), "passage {} listed in {:?}", passage.id, listed_in),
        }
    }
    for test in &tests {
        assert!(test.passage_ids.len() <= 3);
    }
}

/// Test Case 7.1: Creating with a test_id links both sides
#[test]
fn test_create_passage_with_test() {
    let (store, _temp) = create_test_store();
    let test = add_test(&store, "T");

    let passage = add_passage(&store, "P", Some(test.id));

    assert_eq!(passage.test_id, Some(test.id));
    assert_eq!(store.get_reading_test(test.id).unwrap().passage_ids, vec![passage.id]);
    assert_consistent(&store);
}

/// Test Case 7.2: Fourth passage is rejected and nothing is stored
#[test]
fn test_capacity_limit() {
    let (store, _temp) = create_test_store();
    let test = add_test(&store, "Full");
    for n in 1..=3 {
        add_passage(&store, &format!("P{n}"), Some(test.id));
    }

    let err = store
        .create_passage(NewPassage {
            title: "P4".into(),
            test_id: Some(test.id),
        })
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(store.list_passages().unwrap().len(), 3);
    assert_eq!(store.get_reading_test(test.id).unwrap().passage_ids.len(), 3);
    assert_consistent(&store);
}

/// Test Case 7.3: Assigning to a full test fails, re-assigning a member does not
#[test]
fn test_assign_to_full_test() {
    let (store, _temp) = create_test_store();
    let test = add_test(&store, "Full");
    let members: Vec<_> = (1..=3)
        .map(|n| add_passage(&store, &format!("P{n}"), Some(test.id)))
        .collect();
    let outsider = add_passage(&store, "Outsider", None);

    let err = store.assign_passage_to_test(outsider.id, test.id).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(store.get_passage(outsider.id).unwrap().passage.test_id, None);

    let same = store.assign_passage_to_test(members[0].id, test.id).unwrap();
    assert_eq!(same.test_id, Some(test.id));
    assert_eq!(store.get_reading_test(test.id).unwrap().passage_ids.len(), 3);
    assert_consistent(&store);
}

/// Test Case 7.4: Moving a passage updates old test, new test and the passage
#[test]
fn test_move_between_tests() {
    let (store, _temp) = create_test_store();
    let from = add_test(&store, "From");
    let to = add_test(&store, "To");
    let stays = add_passage(&store, "Stays", Some(from.id));
    let moves = add_passage(&store, "Moves", Some(from.id));

    let moved = store
        .update_passage(
            moves.id,
            PassageUpdate {
                test_id: Some(Some(to.id)),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(moved.test_id, Some(to.id));
    assert_eq!(store.get_reading_test(from.id).unwrap().passage_ids, vec![stays.id]);
    assert_eq!(store.get_reading_test(to.id).unwrap().passage_ids, vec![moves.id]);
    assert_consistent(&store);
}

/// Test Case 7.5: Clearing test_id removes the passage from the list
#[test]
fn test_unassign() {
    let (store, _temp) = create_test_store();
    let test = add_test(&store, "T");
    let a = add_passage(&store, "A", Some(test.id));
    let b = add_passage(&store, "B", Some(test.id));

    let cleared = store
        .update_passage(
            a.id,
            PassageUpdate {
                test_id: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(cleared.test_id, None);

    let unassigned = store.unassign_passage(b.id).unwrap();
    assert_eq!(unassigned.test_id, None);

    assert!(store.get_reading_test(test.id).unwrap().passage_ids.is_empty());
    assert_eq!(store.list_unassigned_passages().unwrap().len(), 2);
    assert_consistent(&store);
}

/// Test Case 7.6: Title-only update leaves membership alone
#[test]
fn test_title_update_keeps_assignment() {
    let (store, _temp) = create_test_store();
    let test = add_test(&store, "T");
    let passage = add_passage(&store, "Old", Some(test.id));

    let updated = store
        .update_passage(
            passage.id,
            PassageUpdate {
                title: Some("New".into()),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(updated.title, "New");
    assert_eq!(updated.test_id, Some(test.id));
    assert_consistent(&store);
}

/// Test Case 7.7: Assigning to a missing test is NotFound and changes nothing
#[test]
fn test_assign_to_missing_test() {
    let (store, _temp) = create_test_store();
    let test = add_test(&store, "T");
    let passage = add_passage(&store, "P", Some(test.id));

    let err = store.assign_passage_to_test(passage.id, 999).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(store.get_passage(passage.id).unwrap().passage.test_id, Some(test.id));

    let err = store
        .create_passage(NewPassage {
            title: "Orphan".into(),
            test_id: Some(999),
        })
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(store.list_passages().unwrap().len(), 1);
    assert_consistent(&store);
}

/// Test Case 7.8: Deleting a passage removes it from its test
#[test]
fn test_delete_passage_detaches() {
    let (store, _temp) = create_test_store();
    let test = add_test(&store, "T");
    let a = add_passage(&store, "A", Some(test.id));
    let b = add_passage(&store, "B", Some(test.id));

    store.delete_passage(a.id).unwrap();

    assert_eq!(store.get_reading_test(test.id).unwrap().passage_ids, vec![b.id]);
    assert!(matches!(store.delete_passage(a.id), Err(AppError::NotFound(_))));
    assert_consistent(&store);
}
