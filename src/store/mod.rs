mod digest;
mod opml;
mod pinned;
mod sources;

pub use digest::DigestStore;
pub use pinned::load_pinned;
pub use sources::load_sources;
