use anyhow::Result;
use sqlx::Row;

use crate::domain::user::{ProfileStats, User};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, created_at FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        let user = row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            created_at: row.get("created_at"),
        });

        Ok(user)
    }

    pub async fn profile_stats(&self, user_id: i64) -> Result<ProfileStats> {
        let row = sqlx::query(
            "SELECT \
                (SELECT COUNT(*) FROM posts WHERE author_id = ?1) AS posts_count, \
                (SELECT COUNT(*) FROM follows WHERE author_id = ?1) AS followers_count, \
                (SELECT COUNT(*) FROM follows WHERE user_id = ?1) AS following_count",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(ProfileStats {
            posts_count: row.get("posts_count"),
            followers_count: row.get("followers_count"),
            following_count: row.get("following_count"),
        })
    }

    /// Deletes the user. Their posts, comments and follow edges go with them.
    pub async fn delete_by_username(&self, username: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE username = ?1")
            .bind(username)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
