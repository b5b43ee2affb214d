use anyhow::{anyhow, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;

use crate::domain::post::Comment;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct CommentService {
    db: Db,
}

impl CommentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn add_comment(&self, post_id: i64, author_id: i64, text: &str) -> Result<Comment> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO comments (post_id, author_id, text, created) \
             VALUES (?1, ?2, ?3, ?4) \
             RETURNING id",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.db.pool())
        .await?;

        let row = sqlx::query(
            "SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.text, c.created \
             FROM comments c JOIN users u ON u.id = c.author_id \
             WHERE c.id = ?1",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref()
            .map(comment_from_row)
            .ok_or_else(|| anyhow!("comment {} vanished after insert", id))
    }

    /// Oldest first, the order a conversation reads in.
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.text, c.created \
             FROM comments c JOIN users u ON u.id = c.author_id \
             WHERE c.post_id = ?1 \
             ORDER BY c.created ASC, c.id ASC",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }
}

fn comment_from_row(row: &SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        text: row.get("text"),
        created: row.get("created"),
    }
}
