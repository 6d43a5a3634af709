//! Paragraph ordering within a passage.
//!
//! Orders in a passage always form `1..=n`. Every insert, move and delete
//! shifts its neighbours in the same transaction to keep it that way.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::{normalize_label, NewParagraph, Paragraph, ParagraphUpdate};
use crate::passages::fetch_passage;
use crate::storage::{require_text, ContentStore};

const PARAGRAPH_COLUMNS: &str = "id, passage_id, text, position, label";

fn paragraph_from_row(row: &Row<'_>) -> rusqlite::Result<Paragraph> {
    Ok(Paragraph {
        id: row.get(0)?,
        passage_id: row.get(1)?,
        text: row.get(2)?,
        order: row.get(3)?,
        label: row.get(4)?,
    })
}

pub(crate) fn fetch_paragraphs(conn: &Connection, passage_id: i64) -> AppResult<Vec<Paragraph>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PARAGRAPH_COLUMNS} FROM paragraphs WHERE passage_id = ?1 ORDER BY position, id"
    ))?;
    let paragraphs = stmt
        .query_map(params![passage_id], paragraph_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(paragraphs)
}

fn fetch_paragraph(conn: &Connection, passage_id: i64, paragraph_id: i64) -> AppResult<Paragraph> {
    fetch_passage(conn, passage_id)?;
    conn.query_row(
        &format!("SELECT {PARAGRAPH_COLUMNS} FROM paragraphs WHERE id = ?1 AND passage_id = ?2"),
        params![paragraph_id, passage_id],
        paragraph_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Paragraph", paragraph_id))
}

/// Highest order in the passage, or 0 when it has no paragraphs.
fn max_order(conn: &Connection, passage_id: i64) -> AppResult<i64> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(position) FROM paragraphs WHERE passage_id = ?1",
        params![passage_id],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0))
}

fn check_position(order: i64, highest: i64) -> AppResult<()> {
    if order < 1 || order > highest {
        return Err(AppError::validation(format!(
            "paragraph order must be between 1 and {highest}, got {order}"
        )));
    }
    Ok(())
}

/// Shifts the neighbours of a paragraph moving from `old_order` to `new_order`
/// and places it there.
fn reposition(
    conn: &Connection,
    passage_id: i64,
    paragraph_id: i64,
    old_order: i64,
    new_order: i64,
) -> AppResult<()> {
    if new_order == old_order {
        return Ok(());
    }

    if new_order > old_order {
        conn.execute(
            "UPDATE paragraphs SET position = position - 1
             WHERE passage_id = ?1 AND position > ?2 AND position <= ?3 AND id != ?4",
            params![passage_id, old_order, new_order, paragraph_id],
        )?;
    } else {
        conn.execute(
            "UPDATE paragraphs SET position = position + 1
             WHERE passage_id = ?1 AND position >= ?2 AND position < ?3 AND id != ?4",
            params![passage_id, new_order, old_order, paragraph_id],
        )?;
    }

    conn.execute(
        "UPDATE paragraphs SET position = ?1 WHERE id = ?2",
        params![new_order, paragraph_id],
    )?;
    tracing::info!(passage_id, paragraph_id, old_order, new_order, "paragraph moved");
    Ok(())
}

impl ContentStore {
    pub fn list_paragraphs(&self, passage_id: i64) -> AppResult<Vec<Paragraph>> {
        self.read(|conn| {
            fetch_passage(conn, passage_id)?;
            fetch_paragraphs(conn, passage_id)
        })
    }

    /// Appends a paragraph, or inserts it at `order` shifting later ones down.
    pub fn create_paragraph(&self, passage_id: i64, new: NewParagraph) -> AppResult<Paragraph> {
        require_text("paragraph text", &new.text)?;
        let label = normalize_label(new.label.as_deref())?;

        self.write(|tx| {
            fetch_passage(tx, passage_id)?;
            let next = max_order(tx, passage_id)? + 1;
            let order = match new.order {
                Some(order) => {
                    check_position(order, next)?;
                    tx.execute(
                        "UPDATE paragraphs SET position = position + 1
                         WHERE passage_id = ?1 AND position >= ?2",
                        params![passage_id, order],
                    )?;
                    order
                }
                None => next,
            };

            tx.execute(
                "INSERT INTO paragraphs (passage_id, text, position, label) VALUES (?1, ?2, ?3, ?4)",
                params![passage_id, new.text, order, label],
            )?;
            let paragraph_id = tx.last_insert_rowid();
            tracing::info!(passage_id, paragraph_id, order, "paragraph created");
            fetch_paragraph(tx, passage_id, paragraph_id)
        })
    }

    /// Applies text and label changes; a supplied `order` goes through the move rule.
    pub fn update_paragraph(
        &self,
        passage_id: i64,
        paragraph_id: i64,
        update: ParagraphUpdate,
    ) -> AppResult<Paragraph> {
        if let Some(text) = &update.text {
            require_text("paragraph text", text)?;
        }
        let label = match &update.label {
            Some(label) => Some(normalize_label(label.as_deref())?),
            None => None,
        };

        self.write(|tx| {
            let current = fetch_paragraph(tx, passage_id, paragraph_id)?;
            if let Some(order) = update.order {
                check_position(order, max_order(tx, passage_id)?)?;
            }

            if let Some(text) = &update.text {
                tx.execute(
                    "UPDATE paragraphs SET text = ?1 WHERE id = ?2",
                    params![text, paragraph_id],
                )?;
            }
            if let Some(label) = &label {
                tx.execute(
                    "UPDATE paragraphs SET label = ?1 WHERE id = ?2",
                    params![label, paragraph_id],
                )?;
            }
            if let Some(order) = update.order {
                reposition(tx, passage_id, paragraph_id, current.order, order)?;
            }

            tracing::info!(passage_id, paragraph_id, "paragraph updated");
            fetch_paragraph(tx, passage_id, paragraph_id)
        })
    }

    pub fn move_paragraph(
        &self,
        passage_id: i64,
        paragraph_id: i64,
        new_order: i64,
    ) -> AppResult<Paragraph> {
        self.write(|tx| {
            let current = fetch_paragraph(tx, passage_id, paragraph_id)?;
            check_position(new_order, max_order(tx, passage_id)?)?;
            reposition(tx, passage_id, paragraph_id, current.order, new_order)?;
            fetch_paragraph(tx, passage_id, paragraph_id)
        })
    }

    /// Removes a paragraph and closes the gap it leaves.
    pub fn delete_paragraph(&self, passage_id: i64, paragraph_id: i64) -> AppResult<()> {
        self.write(|tx| {
            let current = fetch_paragraph(tx, passage_id, paragraph_id)?;
            tx.execute("DELETE FROM paragraphs WHERE id = ?1", params![paragraph_id])?;
            tx.execute(
                "UPDATE paragraphs SET position = position - 1
                 WHERE passage_id = ?1 AND position > ?2",
                params![passage_id, current.order],
            )?;
            tracing::info!(passage_id, paragraph_id, order = current.order, "paragraph deleted");
            Ok(())
        })
    }
}
