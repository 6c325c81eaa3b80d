pub mod avatar;
pub mod fetcher;
pub mod parser;
pub mod pool;
pub mod retry;
pub mod sanitize;
pub mod time;

pub use avatar::AvatarResolver;
pub use fetcher::{FeedTask, FetchError, FetchSettings, HttpFetcher};
pub use parser::FeedRsParser;
pub use pool::run_all;
pub use retry::{RetryPolicy, TraceNotifier};
