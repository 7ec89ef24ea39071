use std::future::Future;
use std::sync::Arc;

use chrono::Local;
use tokio::{sync::Semaphore, task::JoinSet};

use crate::page::{fetch_chapter, Chapter, Page};
use crate::request::Fetch;
use crate::{info_time, Result};

/// Runs `op` over every input with at most `concurrency` of them in flight.
///
/// Every input is spawned onto a `JoinSet` up front and waits for a semaphore permit.
/// Results come back in input order no matter which task finished first.
/// The first failure is returned as is; dropping the `JoinSet` aborts whatever is still running.
pub async fn run_bounded<T, R, F, Fut>(inputs: Vec<T>, concurrency: usize, op: F) -> Result<Vec<R>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Send + 'static,
{
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut task_set = JoinSet::new();

    let len = inputs.len();
    for (idx, input) in inputs.into_iter().enumerate() {
        let permits = permits.clone();
        let task = op(input);
        task_set.spawn(async move {
            let _permit = permits.acquire_owned().await?;
            task.await.map(|res| (idx, res))
        });
    }

    let mut slots = (0..len).map(|_| None).collect::<Vec<Option<R>>>();
    while let Some(task) = task_set.join_next().await {
        let (idx, res) = task??;
        slots[idx] = Some(res);
    }
    Ok(slots.into_iter().flatten().collect())
}

/// Fetches the content of every page that isn't cached yet (every page with `force_refresh`)
/// and returns the chapters in page order.
///
/// The batch is all or nothing: pages are only updated once every fetch succeeded.
pub async fn retrieve_all(
    pages: &mut [Page],
    fetcher: Arc<dyn Fetch>,
    concurrency: usize,
    force_refresh: bool,
) -> Result<Vec<Chapter>> {
    let start_time = Local::now();
    let pending = pages
        .iter()
        .enumerate()
        .filter(|(_, page)| force_refresh || page.content().is_none())
        .map(|(idx, page)| (idx, page.link.clone(), page.name.clone()))
        .collect::<Vec<_>>();
    info_time!(
        "Retrieving {} chapters ({} cached), {} at a time",
        pending.len(),
        pages.len() - pending.len(),
        concurrency
    );

    let fetched = run_bounded(pending, concurrency, |(idx, link, name)| {
        let fetcher = fetcher.clone();
        async move {
            let chapter = fetch_chapter(fetcher.as_ref(), &link, &name).await?;
            Ok((idx, chapter))
        }
    })
    .await?;

    for (idx, chapter) in fetched {
        pages[idx].store(chapter);
    }
    info_time!(start_time, "Retrieved all {} chapters", pages.len());

    Ok(pages
        .iter()
        .filter_map(|page| page.content().cloned())
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;
    use crate::consolidate::ListingRow;
    use crate::request::tests::FakeSite;
    use crate::Error;

    fn chapter_pages(n: usize) -> Vec<Page> {
        (0..n)
            .map(|i| {
                Page::from(ListingRow {
                    date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
                    translator: "A".into(),
                    name: format!("Ch{i}"),
                    link: format!("http://a/{i}"),
                })
            })
            .collect()
    }

    /// Deterministic scrambled delays, so later inputs often finish first.
    fn jitter(i: usize) -> u64 {
        ((i * 7919 + 13) % 23) as u64
    }

    #[tokio::test]
    async fn output_follows_input_order() {
        let inputs = (0..40).collect::<Vec<usize>>();
        let out = run_bounded(inputs, 8, |i| async move {
            tokio::time::sleep(Duration::from_millis(jitter(i))).await;
            Ok(i * 10)
        })
        .await
        .unwrap();
        assert_eq!(out, (0..40).map(|i| i * 10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn never_exceeds_concurrency() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        run_bounded((0..20).collect::<Vec<usize>>(), 3, |i| {
            let running = running.clone();
            let peak = peak.clone();
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(jitter(i) + 1)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap();

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3 && peak > 0, "peak was {peak}");
    }

    #[tokio::test]
    async fn first_failure_fails_the_batch() {
        let res = run_bounded((0..10).collect::<Vec<usize>>(), 4, |i| async move {
            if i == 6 {
                return Err(Error::Fetch {
                    url: format!("http://a/{i}"),
                    reason: "503".into(),
                });
            }
            Ok(i)
        })
        .await;
        assert!(matches!(res, Err(Error::Fetch { .. })));
    }

    #[tokio::test]
    async fn empty_batch() {
        let out: Vec<usize> = run_bounded(Vec::<usize>::new(), 4, |i| async move { Ok(i) })
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    fn site_for(pages: &[Page]) -> FakeSite {
        pages.iter().enumerate().fold(FakeSite::default(), |site, (i, page)| {
            site.delayed(&page.link, &format!("<p>text {}</p>", page.name), jitter(i))
        })
    }

    #[tokio::test]
    async fn chapters_come_back_in_page_order_and_are_cached() {
        let mut pages = chapter_pages(12);
        let site = Arc::new(site_for(&pages));

        let chapters = retrieve_all(&mut pages, site.clone(), 4, false).await.unwrap();
        assert_eq!(
            chapters.iter().map(|c| c.title.as_str()).collect::<Vec<_>>(),
            pages.iter().map(|p| p.name.as_str()).collect::<Vec<_>>()
        );
        assert_eq!(chapters[5].paragraphs, vec!["text Ch5"]);
        assert!(pages.iter().all(|p| p.content().is_some()));
        assert_eq!(site.total_calls(), 12);

        retrieve_all(&mut pages, site.clone(), 4, false).await.unwrap();
        assert_eq!(site.total_calls(), 12);

        retrieve_all(&mut pages, site.clone(), 4, true).await.unwrap();
        assert_eq!(site.total_calls(), 24);
    }

    #[tokio::test]
    async fn failed_chapter_leaves_pages_untouched() {
        let mut pages = chapter_pages(6);
        let site = Arc::new(site_for(&pages[..5]));

        let err = retrieve_all(&mut pages, site, 2, false).await.unwrap_err();
        assert!(err.is_retrieval());
        assert!(pages.iter().all(|p| p.content().is_none()));
    }
}
