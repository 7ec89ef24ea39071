use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tokio::task::spawn_blocking;
use url::Url;

use crate::book::BookWriter;
use crate::consolidate::{consolidate, ListingRow};
use crate::page::Page;
use crate::parse::{parse_listing, parse_metadata, ListingPage, Metadata};
use crate::request::Fetch;
use crate::schedule::{retrieve_all, run_bounded};
use crate::{info_time, Error, Result, LISTING_PAGE_PARAM};

/// A novel's metadata and its canonical chapter sequence.
pub struct Novel {
    pub url: String,
    pub metadata: Metadata,
    chapters: Vec<Page>,
    fetcher: Arc<dyn Fetch>,
    concurrency: usize,
}

impl Novel {
    /// Reads the novel's landing page and every page of its release table,
    /// then picks one translation per chapter.
    pub async fn discover(url: &str, fetcher: Arc<dyn Fetch>, concurrency: usize) -> Result<Self> {
        let start_time = Local::now();
        info_time!("Discovering {}", url);

        let base = Url::parse(url).map_err(|e| Error::discovery(url, e))?;
        let first_html = fetcher
            .fetch(url)
            .await
            .map_err(|e| Error::discovery(url, e))?;

        let (metadata, first_page) = parse_off_thread(url, {
            let base = base.clone();
            move || -> Result<(Metadata, ListingPage)> {
                Ok((parse_metadata(&first_html)?, parse_listing(&first_html, &base)?))
            }
        })
        .await?;

        let page_urls = (2..=first_page.page_count)
            .map(|n| listing_page_url(&base, n))
            .collect::<Vec<_>>();
        let rest = run_bounded(page_urls, concurrency, |page_url| {
            let fetcher = fetcher.clone();
            let base = base.clone();
            async move {
                let html = fetcher.fetch(&page_url).await?;
                parse_off_thread(&page_url, move || parse_listing(&html, &base)).await
            }
        })
        .await
        .map_err(|e| Error::discovery(url, e))?;

        // The site lists newest first, page 1 being the newest.
        let mut rows = first_page.rows;
        rest.into_iter().for_each(|page| rows.extend(page.rows));
        rows.reverse();

        info_time!(
            start_time,
            "Discovered '{}': {} listing pages, {} releases",
            metadata.title,
            first_page.page_count,
            rows.len()
        );

        Ok(Self::from_listing(url, metadata, rows, fetcher, concurrency))
    }

    /// Builds a novel from an already scraped listing, `rows` oldest first.
    pub fn from_listing(
        url: &str,
        metadata: Metadata,
        rows: Vec<ListingRow>,
        fetcher: Arc<dyn Fetch>,
        concurrency: usize,
    ) -> Self {
        let pages = rows.into_iter().map(Page::from).collect();
        Self {
            url: url.to_string(),
            metadata,
            chapters: consolidate(pages),
            fetcher,
            concurrency,
        }
    }

    /// The canonical chapter sequence, in reading order.
    pub fn chapters(&self) -> &[Page] {
        &self.chapters
    }

    /// Fetches every chapter and writes the book into `dir`. Returns the file name.
    /// Nothing is written if any chapter can't be retrieved.
    pub async fn produce_book(
        &mut self,
        writer: &BookWriter,
        dir: &Path,
        force_refresh: bool,
    ) -> Result<String> {
        let chapters = retrieve_all(
            &mut self.chapters,
            self.fetcher.clone(),
            self.concurrency,
            force_refresh,
        )
        .await?;
        writer.write(&self.metadata, &chapters, dir).await
    }
}

/// Runs a parser on the blocking pool. A parser that fails or panics is a discovery failure.
async fn parse_off_thread<T, F>(url: &str, parse: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(parse)
        .await
        .map_err(|e| Error::discovery(url, e))?
        .map_err(|e| Error::discovery(url, e))
}

/// `base` with its page parameter replaced by `page`, other query pairs are kept.
fn listing_page_url(base: &Url, page: usize) -> String {
    let pairs = base
        .query_pairs()
        .filter(|(key, _)| *key != LISTING_PAGE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect::<Vec<_>>();

    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair(LISTING_PAGE_PARAM, &page.to_string());
    url.to_string()
}
