use anyhow::{anyhow, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use time::OffsetDateTime;

use crate::domain::group::Group;
use crate::domain::post::Post;
use crate::infra::db::Db;

const POST_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.author_id, p.image, \
            u.username AS author_username, \
            g.id AS group_id, g.title AS group_title, \
            g.description AS group_description, g.slug AS group_slug, \
            (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count \
     FROM posts p \
     JOIN users u ON u.id = p.author_id \
     LEFT JOIN post_groups g ON g.id = p.group_id";

/// Which posts a feed is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}

impl PostFilter {
    fn condition(&self) -> (&'static str, Option<i64>) {
        match *self {
            Self::All => ("", None),
            Self::Group(id) => ("WHERE p.group_id = ?", Some(id)),
            Self::Author(id) => ("WHERE p.author_id = ?", Some(id)),
            Self::FollowedBy(id) => (
                "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = ?)",
                Some(id),
            ),
        }
    }
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(
        &self,
        author_id: i64,
        text: &str,
        group_id: Option<i64>,
        image: Option<&str>,
    ) -> Result<Post> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO posts (text, pub_date, author_id, group_id, image) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             RETURNING id",
        )
        .bind(text)
        .bind(OffsetDateTime::now_utc())
        .bind(author_id)
        .bind(group_id)
        .bind(image)
        .fetch_one(self.db.pool())
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow!("post {} vanished after insert", id))
    }

    pub async fn get_by_id(&self, post_id: i64) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("{} WHERE p.id = ?1", POST_SELECT))
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    /// Looks a post up by its natural key: the author's username plus the id.
    pub async fn get_post(&self, username: &str, post_id: i64) -> Result<Option<Post>> {
        let row = sqlx::query(&format!(
            "{} WHERE p.id = ?1 AND u.username = ?2",
            POST_SELECT
        ))
        .bind(post_id)
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    /// Rewrites the editable fields in place; `pub_date` and author never change.
    pub async fn update_post(
        &self,
        post_id: i64,
        text: &str,
        group_id: Option<i64>,
        image: Option<&str>,
    ) -> Result<Option<Post>> {
        let result = sqlx::query(
            "UPDATE posts SET text = ?1, group_id = ?2, image = ?3 WHERE id = ?4",
        )
        .bind(text)
        .bind(group_id)
        .bind(image)
        .bind(post_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(post_id).await
    }

    pub async fn count(&self, filter: PostFilter) -> Result<i64> {
        let (condition, param) = filter.condition();
        let sql = format!("SELECT COUNT(*) FROM posts p {}", condition);
        let mut query = sqlx::query_scalar::<Sqlite, i64>(&sql);
        if let Some(param) = param {
            query = query.bind(param);
        }
        Ok(query.fetch_one(self.db.pool()).await?)
    }

    /// Newest first; `id` breaks ties between posts published in the same instant.
    pub async fn list(&self, filter: PostFilter, offset: i64, limit: i64) -> Result<Vec<Post>> {
        let (condition, param) = filter.condition();
        let sql = format!(
            "{} {} ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?",
            POST_SELECT, condition
        );
        let mut query = sqlx::query::<Sqlite>(&sql);
        if let Some(param) = param {
            query = query.bind(param);
        }
        let rows = query
            .bind(limit)
            .bind(offset)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }
}

fn post_from_row(row: &SqliteRow) -> Post {
    let group_id: Option<i64> = row.get("group_id");
    let group = group_id.map(|id| Group {
        id,
        title: row.get("group_title"),
        description: row.get("group_description"),
        slug: row.get("group_slug"),
    });

    Post {
        id: row.get("id"),
        text: row.get("text"),
        pub_date: row.get("pub_date"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        group,
        image: row.get("image"),
        comments_count: row.get("comments_count"),
    }
}
