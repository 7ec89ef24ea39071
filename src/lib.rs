//! Turns a novel's release listing into a single EPUB.
//!
//! Listing pages -> [`consolidate`] picks one translation per chapter -> [`schedule`] fetches
//! them with a bounded worker pool -> [`book`] packs the result.

mod error;
#[doc(hidden)]
pub mod macros;

pub mod book;
pub mod consolidate;
pub mod novel;
pub mod page;
pub mod parse;
pub mod request;
pub mod schedule;
pub mod server;

pub use error::{Error, Result};

/// Number of fetches in flight at once, for listing pages and chapters alike.
pub const CONCURRENCY: usize = 4;
pub const FETCH_TIMEOUT_SECS: u64 = 30;
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
/// Every request writes its book into a fresh directory under this one.
pub const DATA_DIR: &str = "data";
pub const BIND_ADDR: &str = "0.0.0.0:5000";
/// Query parameter selecting a page of the release table.
pub const LISTING_PAGE_PARAM: &str = "pg";
/// Release dates look like `03/15/21`.
pub const RELEASE_DATE_FORMAT: &str = "%m/%d/%y";
