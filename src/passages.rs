use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::composition::{detach, reassign};
use crate::error::{AppError, AppResult};
use crate::models::{NewPassage, Passage, PassageDetail, PassageUpdate, QuestionPackDetail};
use crate::packs::fetch_packs;
use crate::paragraphs::fetch_paragraphs;
use crate::questions::fetch_questions;
use crate::storage::{now, require_text, ContentStore};

pub(crate) const PASSAGE_COLUMNS: &str = "id, title, test_id, created_at, updated_at";

pub(crate) fn passage_from_row(row: &Row<'_>) -> rusqlite::Result<Passage> {
    Ok(Passage {
        id: row.get(0)?,
        title: row.get(1)?,
        test_id: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub(crate) fn fetch_passage_opt(conn: &Connection, passage_id: i64) -> AppResult<Option<Passage>> {
    let passage = conn
        .query_row(
            &format!("SELECT {PASSAGE_COLUMNS} FROM passages WHERE id = ?1"),
            params![passage_id],
            passage_from_row,
        )
        .optional()?;
    Ok(passage)
}

pub(crate) fn fetch_passage(conn: &Connection, passage_id: i64) -> AppResult<Passage> {
    fetch_passage_opt(conn, passage_id)?.ok_or_else(|| AppError::not_found("Passage", passage_id))
}

impl ContentStore {
    pub fn list_passages(&self) -> AppResult<Vec<Passage>> {
        self.read(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {PASSAGE_COLUMNS} FROM passages ORDER BY id"))?;
            let passages = stmt
                .query_map([], passage_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(passages)
        })
    }

    /// Loads a passage with its paragraphs, packs and questions.
    pub fn get_passage(&self, passage_id: i64) -> AppResult<PassageDetail> {
        self.read(|conn| {
            let passage = fetch_passage(conn, passage_id)?;
            let paragraphs = fetch_paragraphs(conn, passage_id)?;
            let question_packs = fetch_packs(conn, passage_id)?
                .into_iter()
                .map(|pack| {
                    let questions = fetch_questions(conn, pack.id)?;
                    Ok(QuestionPackDetail { pack, questions })
                })
                .collect::<AppResult<Vec<_>>>()?;
            Ok(PassageDetail {
                passage,
                paragraphs,
                question_packs,
            })
        })
    }

    pub fn create_passage(&self, new: NewPassage) -> AppResult<Passage> {
        require_text("title", &new.title)?;

        let passage = self.write(|tx| {
            let created_at = now();
            tx.execute(
                "INSERT INTO passages (title, test_id, created_at, updated_at)
                 VALUES (?1, NULL, ?2, ?2)",
                params![new.title, &created_at],
            )?;
            let passage_id = tx.last_insert_rowid();
            if new.test_id.is_some() {
                reassign(tx, passage_id, None, new.test_id)?;
            }
            fetch_passage(tx, passage_id)
        })?;

        tracing::info!(passage_id = passage.id, test_id = ?passage.test_id, "passage created");
        Ok(passage)
    }

    pub fn update_passage(&self, passage_id: i64, update: PassageUpdate) -> AppResult<Passage> {
        if let Some(title) = &update.title {
            require_text("title", title)?;
        }

        self.write(|tx| {
            let current = fetch_passage(tx, passage_id)?;

            if let Some(target) = update.test_id {
                reassign(tx, passage_id, current.test_id, target)?;
            }
            if let Some(title) = &update.title {
                tx.execute(
                    "UPDATE passages SET title = ?1, updated_at = ?2 WHERE id = ?3",
                    params![title, now(), passage_id],
                )?;
            }

            tracing::info!(passage_id, "passage updated");
            fetch_passage(tx, passage_id)
        })
    }

    /// Deletes a passage with its paragraphs, packs and questions.
    pub fn delete_passage(&self, passage_id: i64) -> AppResult<()> {
        self.write(|tx| {
            let passage = fetch_passage(tx, passage_id)?;
            detach(tx, passage_id, passage.test_id)?;
            tx.execute("DELETE FROM passages WHERE id = ?1", params![passage_id])?;
            tracing::info!(passage_id, test_id = ?passage.test_id, "passage deleted");
            Ok(())
        })
    }
}
