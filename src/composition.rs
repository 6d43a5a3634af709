//! Keeps `passages.test_id` and `reading_tests.passage_ids` in agreement.
//!
//! Nothing else writes either side. Callers hand in an open transaction so a
//! failure anywhere leaves both sides untouched.

use rusqlite::{params, Connection};

use crate::error::{AppError, AppResult};
use crate::models::{Passage, MAX_PASSAGES_PER_TEST};
use crate::passages::fetch_passage;
use crate::reading_test::{fetch_test, fetch_test_opt, store_passage_ids};
use crate::storage::{now, ContentStore};

/// Moves `passage_id` from `from` to `to`, updating both sides.
///
/// All checks run before the first write.
pub(crate) fn reassign(
    conn: &Connection,
    passage_id: i64,
    from: Option<i64>,
    to: Option<i64>,
) -> AppResult<()> {
    let target = match to {
        Some(test_id) => {
            let test = fetch_test(conn, test_id)?;
            let others = test
                .passage_ids
                .iter()
                .filter(|id| **id != passage_id)
                .count();
            if others >= MAX_PASSAGES_PER_TEST {
                return Err(AppError::validation(format!(
                    "test {test_id} already has {others} passages; a test may hold at most {MAX_PASSAGES_PER_TEST}"
                )));
            }
            Some(test)
        }
        None => None,
    };

    if let Some(old_id) = from.filter(|old_id| Some(*old_id) != to) {
        if let Some(old) = fetch_test_opt(conn, old_id)? {
            let remaining: Vec<i64> = old
                .passage_ids
                .into_iter()
                .filter(|id| *id != passage_id)
                .collect();
            store_passage_ids(conn, old_id, &remaining)?;
        }
    }

    if let Some(mut test) = target {
        if !test.passage_ids.contains(&passage_id) {
            test.passage_ids.push(passage_id);
            store_passage_ids(conn, test.id, &test.passage_ids)?;
        }
    }

    conn.execute(
        "UPDATE passages SET test_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![to, now(), passage_id],
    )?;

    tracing::info!(passage_id, ?from, ?to, "passage test assignment changed");
    Ok(())
}

/// Removes a passage from its test's list ahead of deleting the passage.
pub(crate) fn detach(conn: &Connection, passage_id: i64, test_id: Option<i64>) -> AppResult<()> {
    let Some(test_id) = test_id else {
        return Ok(());
    };
    if let Some(test) = fetch_test_opt(conn, test_id)? {
        let remaining: Vec<i64> = test
            .passage_ids
            .into_iter()
            .filter(|id| *id != passage_id)
            .collect();
        store_passage_ids(conn, test_id, &remaining)?;
    }
    Ok(())
}

impl ContentStore {
    pub fn assign_passage_to_test(&self, passage_id: i64, test_id: i64) -> AppResult<Passage> {
        self.write(|tx| {
            let passage = fetch_passage(tx, passage_id)?;
            reassign(tx, passage_id, passage.test_id, Some(test_id))?;
            fetch_passage(tx, passage_id)
        })
    }

    pub fn unassign_passage(&self, passage_id: i64) -> AppResult<Passage> {
        self.write(|tx| {
            let passage = fetch_passage(tx, passage_id)?;
            reassign(tx, passage_id, passage.test_id, None)?;
            fetch_passage(tx, passage_id)
        })
    }
}
