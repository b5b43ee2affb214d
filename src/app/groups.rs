use anyhow::Result;
use sqlx::Row;

use crate::domain::group::Group;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct GroupService {
    db: Db,
}

impl GroupService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let row = sqlx::query(
            "SELECT id, title, description, slug FROM post_groups WHERE slug = ?1",
        )
        .bind(slug)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| Group {
            id: row.get("id"),
            title: row.get("title"),
            description: row.get("description"),
            slug: row.get("slug"),
        }))
    }

    /// All groups, in the order they are offered as form choices.
    pub async fn list(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query(
            "SELECT id, title, description, slug FROM post_groups ORDER BY title, id",
        )
        .fetch_all(self.db.pool())
        .await?;

        let groups = rows
            .into_iter()
            .map(|row| Group {
                id: row.get("id"),
                title: row.get("title"),
                description: row.get("description"),
                slug: row.get("slug"),
            })
            .collect();

        Ok(groups)
    }

    /// Creates a group. Returns `None` when the slug is already in use.
    pub async fn create(&self, title: &str, description: &str, slug: &str) -> Result<Option<Group>> {
        let row = sqlx::query(
            "INSERT INTO post_groups (title, description, slug) VALUES (?1, ?2, ?3) \
             ON CONFLICT (slug) DO NOTHING \
             RETURNING id, title, description, slug",
        )
        .bind(title)
        .bind(description)
        .bind(slug)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| Group {
            id: row.get("id"),
            title: row.get("title"),
            description: row.get("description"),
            slug: row.get("slug"),
        }))
    }

    /// Deletes the group; its posts stay, detached from any group.
    pub async fn delete_by_slug(&self, slug: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM post_groups WHERE slug = ?1")
            .bind(slug)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
