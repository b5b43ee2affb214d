use anyhow::Result;

use crate::app::pagination::{Page, Paginator, POSTS_PER_PAGE};
use crate::app::posts::{PostFilter, PostService};
use crate::domain::post::Post;
use crate::infra::db::Db;

/// Paginated, filtered views over posts: the index, group, profile and
/// follow feeds are all one of these.
#[derive(Clone)]
pub struct FeedService {
    posts: PostService,
}

impl FeedService {
    pub fn new(db: Db) -> Self {
        Self {
            posts: PostService::new(db),
        }
    }

    pub async fn page(&self, filter: PostFilter, raw_page: Option<&str>) -> Result<Page<Post>> {
        let count = self.posts.count(filter).await?;
        let paginator = Paginator::new(count, POSTS_PER_PAGE);
        let number = paginator.page_number(raw_page);
        let (offset, limit) = paginator.bounds(number);
        let items = self.posts.list(filter, offset, limit).await?;
        Ok(paginator.page(number, items))
    }
}
