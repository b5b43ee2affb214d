use anyhow::Result;

use crate::domain::social_graph::Follow;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Subscribes `user_id` to `author_id`. Following yourself or an author
    /// you already follow is a no-op and returns `None`; the unique pair
    /// constraint settles concurrent duplicates.
    pub async fn follow(&self, user_id: i64, author_id: i64) -> Result<Option<Follow>> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO follows (user_id, author_id) \
             SELECT ?1, ?2 WHERE ?1 <> ?2",
        )
        .bind(user_id)
        .bind(author_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Follow { user_id, author_id }))
    }

    pub async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2")
            .bind(user_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = ?1 AND author_id = ?2)",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(exists)
    }
}
