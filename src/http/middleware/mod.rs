pub mod error_pages;
pub mod page_cache;

pub use error_pages::error_pages;
pub use page_cache::cache_index_page;
