pub mod fetcher;
pub mod parser;

pub use fetcher::{fetch, FetchError};
pub use parser::{parse, ParseError, RawFeed, RawItem};
