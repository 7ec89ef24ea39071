use chrono::NaiveDate;
use tokio::task::spawn_blocking;

use crate::consolidate::ListingRow;
use crate::parse::extract_text;
use crate::request::Fetch;
use crate::{Error, Result};

/// Text of one chapter, titled with the chapter's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    pub paragraphs: Vec<String>,
}

/// One translator's rendition of one chapter. Content is fetched lazily and cached
/// until a forced refetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub date: NaiveDate,
    pub translator: String,
    pub name: String,
    pub link: String,
    content: Option<Chapter>,
}

impl From<ListingRow> for Page {
    fn from(row: ListingRow) -> Self {
        Page {
            date: row.date,
            translator: row.translator,
            name: row.name,
            link: row.link,
            content: None,
        }
    }
}

impl Page {
    pub fn content(&self) -> Option<&Chapter> {
        self.content.as_ref()
    }

    /// Only the retrieval batch writes here, and only after the fetch succeeded.
    pub(crate) fn store(&mut self, chapter: Chapter) {
        self.content = Some(chapter);
    }

    /// Returns the cached chapter, fetching it first if there is none or `force_refresh` is set.
    /// A failed fetch leaves the previous content in place.
    pub async fn get(&mut self, fetcher: &dyn Fetch, force_refresh: bool) -> Result<&Chapter> {
        if force_refresh {
            return self.refresh(fetcher).await;
        }
        match self.content {
            Some(ref chapter) => Ok(chapter),
            None => self.refresh(fetcher).await,
        }
    }

    async fn refresh(&mut self, fetcher: &dyn Fetch) -> Result<&Chapter> {
        let chapter = fetch_chapter(fetcher, &self.link, &self.name).await?;
        Ok(self.content.insert(chapter))
    }
}

/// Downloads a chapter page and strips it down to its text.
pub async fn fetch_chapter(fetcher: &dyn Fetch, link: &str, name: &str) -> Result<Chapter> {
    let retrieval_err = |e: Error| Error::Retrieval {
        chapter: name.to_string(),
        link: link.to_string(),
        reason: e.to_string(),
    };

    let html = fetcher.fetch(link).await.map_err(retrieval_err)?;
    let paragraphs = spawn_blocking(move || extract_text(&html))
        .await?
        .map_err(retrieval_err)?;

    Ok(Chapter {
        title: name.to_string(),
        paragraphs,
    })
}
