use std::collections::BTreeSet;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::{NewQuestion, Question, QuestionBody, QuestionPack, QuestionUpdate};
use crate::packs::fetch_pack;
use crate::storage::{json_column, require_text, ContentStore};
use crate::validation::{build_body, QuestionFields};

const QUESTION_COLUMNS: &str = "id, pack_id, title, text, body";

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<Question> {
    Ok(Question {
        id: row.get(0)?,
        pack_id: row.get(1)?,
        title: row.get(2)?,
        text: row.get(3)?,
        body: json_column(row, 4)?,
    })
}

pub(crate) fn fetch_questions(conn: &Connection, pack_id: i64) -> AppResult<Vec<Question>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions
         WHERE pack_id = ?1
         ORDER BY number IS NULL, number, id"
    ))?;
    let questions = stmt
        .query_map(params![pack_id], question_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(questions)
}

fn fetch_question(
    conn: &Connection,
    passage_id: i64,
    pack_id: i64,
    question_id: i64,
) -> AppResult<(QuestionPack, Question)> {
    let pack = fetch_pack(conn, passage_id, pack_id)?;
    let question = conn
        .query_row(
            &format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?1 AND pack_id = ?2"),
            params![question_id, pack_id],
            question_from_row,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Question", question_id))?;
    Ok((pack, question))
}

/// Numbers used in the pack, leaving out `exclude` so an update can keep its own.
fn taken_numbers(conn: &Connection, pack_id: i64, exclude: Option<i64>) -> AppResult<BTreeSet<i64>> {
    let mut stmt = conn.prepare(
        "SELECT number FROM questions
         WHERE pack_id = ?1 AND number IS NOT NULL AND id != ?2",
    )?;
    let numbers = stmt
        .query_map(params![pack_id, exclude.unwrap_or(-1)], |row| row.get::<_, i64>(0))?
        .collect::<Result<BTreeSet<i64>, _>>()?;
    Ok(numbers)
}

fn normalize_title(title: Option<String>) -> Option<String> {
    title.filter(|t| !t.trim().is_empty())
}

fn write_body(
    conn: &Connection,
    question_id: i64,
    title: &Option<String>,
    text: &str,
    body: &QuestionBody,
) -> AppResult<()> {
    conn.execute(
        "UPDATE questions SET format = ?1, number = ?2, title = ?3, text = ?4, body = ?5
         WHERE id = ?6",
        params![
            body.format().as_str(),
            body.number(),
            title,
            text,
            serde_json::to_string(body)?,
            question_id
        ],
    )?;
    Ok(())
}

impl ContentStore {
    pub fn list_questions(&self, passage_id: i64, pack_id: i64) -> AppResult<Vec<Question>> {
        self.read(|conn| {
            fetch_pack(conn, passage_id, pack_id)?;
            fetch_questions(conn, pack_id)
        })
    }

    pub fn get_question(&self, passage_id: i64, pack_id: i64, question_id: i64) -> AppResult<Question> {
        self.read(|conn| Ok(fetch_question(conn, passage_id, pack_id, question_id)?.1))
    }

    pub fn create_question(
        &self,
        passage_id: i64,
        pack_id: i64,
        new: NewQuestion,
    ) -> AppResult<Question> {
        require_text("question text", &new.text)?;

        self.write(|tx| {
            let pack = fetch_pack(tx, passage_id, pack_id)?;
            let taken = taken_numbers(tx, pack_id, None)?;
            let body = build_body(&pack, QuestionFields::from(&new), &taken)?;
            let title = normalize_title(new.title.clone());

            tx.execute(
                "INSERT INTO questions (pack_id, format, number, title, text, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    pack_id,
                    body.format().as_str(),
                    body.number(),
                    title,
                    new.text,
                    serde_json::to_string(&body)?
                ],
            )?;
            let question_id = tx.last_insert_rowid();
            tracing::info!(
                pack_id,
                question_id,
                format = %body.format(),
                number = ?body.number(),
                "question created"
            );
            Ok(fetch_question(tx, passage_id, pack_id, question_id)?.1)
        })
    }

    /// Merges the supplied fields onto the stored question and re-validates the result.
    pub fn update_question(
        &self,
        passage_id: i64,
        pack_id: i64,
        question_id: i64,
        update: QuestionUpdate,
    ) -> AppResult<Question> {
        if let Some(text) = &update.text {
            require_text("question text", text)?;
        }

        self.write(|tx| {
            let (pack, current) = fetch_question(tx, passage_id, pack_id, question_id)?;

            let mut fields = QuestionFields::from_body(&current.body)?;
            fields.merge(&update);
            let taken = taken_numbers(tx, pack_id, Some(question_id))?;
            let body = build_body(&pack, fields, &taken)?;

            let title = match &update.title {
                Some(title) => normalize_title(title.clone()),
                None => current.title,
            };
            let text = update.text.as_deref().unwrap_or(&current.text);

            write_body(tx, question_id, &title, text, &body)?;
            tracing::info!(pack_id, question_id, "question updated");
            Ok(fetch_question(tx, passage_id, pack_id, question_id)?.1)
        })
    }

    pub fn delete_question(&self, passage_id: i64, pack_id: i64, question_id: i64) -> AppResult<()> {
        self.write(|tx| {
            fetch_question(tx, passage_id, pack_id, question_id)?;
            tx.execute("DELETE FROM questions WHERE id = ?1", params![question_id])?;
            tracing::info!(pack_id, question_id, "question deleted");
            Ok(())
        })
    }
}
