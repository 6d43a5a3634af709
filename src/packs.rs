//! Question packs: typed, non-overlapping question-number ranges per passage.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::{
    NewQuestionPack, QuestionPack, QuestionPackDetail, QuestionPackUpdate, QuestionRange,
};
use crate::passages::fetch_passage;
use crate::questions::fetch_questions;
use crate::storage::ContentStore;
use crate::validation::revalidate;

const PACK_COLUMNS: &str = "id, passage_id, format, start_question, end_question";

fn pack_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, i64, String, i64, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

/// Parses the stored format tag; an unknown tag is an invariant violation.
fn into_pack(raw: (i64, i64, String, i64, i64)) -> AppResult<QuestionPack> {
    let (id, passage_id, format, start_question, end_question) = raw;
    Ok(QuestionPack {
        id,
        passage_id,
        format: format.parse()?,
        start_question,
        end_question,
    })
}

pub(crate) fn fetch_packs(conn: &Connection, passage_id: i64) -> AppResult<Vec<QuestionPack>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PACK_COLUMNS} FROM question_packs WHERE passage_id = ?1 ORDER BY start_question, id"
    ))?;
    let rows = stmt
        .query_map(params![passage_id], pack_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(into_pack).collect()
}

pub(crate) fn fetch_pack(conn: &Connection, passage_id: i64, pack_id: i64) -> AppResult<QuestionPack> {
    fetch_passage(conn, passage_id)?;
    let raw = conn
        .query_row(
            &format!("SELECT {PACK_COLUMNS} FROM question_packs WHERE id = ?1 AND passage_id = ?2"),
            params![pack_id, passage_id],
            pack_from_row,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Question pack", pack_id))?;
    into_pack(raw)
}

/// Rejects `candidate` if it overlaps any other pack in the passage.
pub fn check_no_overlap(
    candidate: &QuestionRange,
    existing: &[QuestionPack],
    exclude: Option<i64>,
) -> AppResult<()> {
    let conflict = existing
        .iter()
        .filter(|pack| Some(pack.id) != exclude)
        .find(|pack| candidate.overlaps(&pack.range()));

    match conflict {
        Some(pack) => Err(AppError::validation(format!(
            "question range {candidate} overlaps pack {} with range {}",
            pack.id,
            pack.range()
        ))),
        None => Ok(()),
    }
}

impl ContentStore {
    pub fn list_question_packs(&self, passage_id: i64) -> AppResult<Vec<QuestionPack>> {
        self.read(|conn| {
            fetch_passage(conn, passage_id)?;
            fetch_packs(conn, passage_id)
        })
    }

    pub fn get_question_pack(&self, passage_id: i64, pack_id: i64) -> AppResult<QuestionPackDetail> {
        self.read(|conn| {
            let pack = fetch_pack(conn, passage_id, pack_id)?;
            let questions = fetch_questions(conn, pack_id)?;
            Ok(QuestionPackDetail { pack, questions })
        })
    }

    pub fn create_question_pack(&self, passage_id: i64, new: NewQuestionPack) -> AppResult<QuestionPack> {
        let range = QuestionRange::new(new.start_question, new.end_question)?;

        self.write(|tx| {
            fetch_passage(tx, passage_id)?;
            check_no_overlap(&range, &fetch_packs(tx, passage_id)?, None)?;

            tx.execute(
                "INSERT INTO question_packs (passage_id, format, start_question, end_question)
                 VALUES (?1, ?2, ?3, ?4)",
                params![passage_id, new.format.as_str(), range.start, range.end],
            )?;
            let pack_id = tx.last_insert_rowid();
            tracing::info!(passage_id, pack_id, format = %new.format, %range, "question pack created");
            fetch_pack(tx, passage_id, pack_id)
        })
    }

    /// Applies a partial update; range checks use the post-update bounds.
    pub fn update_question_pack(
        &self,
        passage_id: i64,
        pack_id: i64,
        update: QuestionPackUpdate,
    ) -> AppResult<QuestionPack> {
        self.write(|tx| {
            let current = fetch_pack(tx, passage_id, pack_id)?;
            let range = QuestionRange::new(
                update.start_question.unwrap_or(current.start_question),
                update.end_question.unwrap_or(current.end_question),
            )?;
            check_no_overlap(&range, &fetch_packs(tx, passage_id)?, Some(pack_id))?;

            let updated = QuestionPack {
                format: update.format.unwrap_or(current.format),
                start_question: range.start,
                end_question: range.end,
                ..current
            };
            for question in fetch_questions(tx, pack_id)? {
                revalidate(&updated, &question.body).map_err(|err| match err {
                    AppError::Validation(message) => AppError::Validation(format!(
                        "question {} would no longer fit the pack: {message}",
                        question.id
                    )),
                    other => other,
                })?;
            }

            tx.execute(
                "UPDATE question_packs SET format = ?1, start_question = ?2, end_question = ?3
                 WHERE id = ?4",
                params![updated.format.as_str(), range.start, range.end, pack_id],
            )?;
            tracing::info!(passage_id, pack_id, format = %updated.format, %range, "question pack updated");
            Ok(updated)
        })
    }

    /// Deletes a pack with its questions; other packs keep their ranges.
    pub fn delete_question_pack(&self, passage_id: i64, pack_id: i64) -> AppResult<()> {
        self.write(|tx| {
            fetch_pack(tx, passage_id, pack_id)?;
            tx.execute("DELETE FROM question_packs WHERE id = ?1", params![pack_id])?;
            tracing::info!(passage_id, pack_id, "question pack deleted");
            Ok(())
        })
    }
}
