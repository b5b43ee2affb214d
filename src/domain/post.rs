use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

use crate::domain::group::Group;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: i64,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    pub author_id: i64,
    pub author_username: String,
    pub group: Option<Group>,
    /// Storage key of the attached image, e.g. `posts/<hash>_cat.png`.
    pub image: Option<String>,
    pub comments_count: i64,
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.text.chars().take(15).collect();
        f.write_str(&short)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_displays_first_fifteen_chars() {
        let post = Post {
            id: 1,
            text: "Тестовый текст длиннее пятнадцати".into(),
            pub_date: OffsetDateTime::UNIX_EPOCH,
            author_id: 1,
            author_username: "testuser".into(),
            group: None,
            image: None,
            comments_count: 0,
        };
        assert_eq!(post.to_string(), "Тестовый текст ");
        assert_eq!(post.to_string().chars().count(), 15);
    }
}
