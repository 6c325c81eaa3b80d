mod article;
mod feed;
mod result;

pub use article::{Article, DatedArticle, Digest};
pub use feed::{ParsedEntry, ParsedFeed};
pub use result::{AvatarOutcome, FetchFailure, FetchResult, FetchedArticle};
