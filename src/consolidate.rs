//! Turns the overlapping multi-translator release listing into one reading order.
//!
//! Several groups may translate the same chapters. Groups are ranked by how many
//! chapters they released, bigger first, and every chapter name goes to the best
//! ranked group that has it. The survivors keep their position in the original,
//! oldest-first listing.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::page::Page;
use crate::{info_time, warn_time};

/// One row of the release table, as scraped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub date: NaiveDate,
    pub translator: String,
    pub name: String,
    pub link: String,
}

/// All pages of one translator, tagged with their chronological index.
struct Group<'a> {
    translator: &'a str,
    pages: Vec<usize>,
}

/// Deduplicates `pages` (oldest first) into the canonical chapter sequence.
///
/// Chapter names are compared verbatim, so "Chapter 1" and "chapter 1" are different chapters.
/// Groups of equal size are ranked by their earliest chapter, the one that started first wins.
pub fn consolidate(pages: Vec<Page>) -> Vec<Page> {
    let keep = claim_chapters(&pages);
    pages
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| keep.contains(idx))
        .map(|(_, page)| page)
        .collect()
}

/// Walks the ranked groups and returns the chronological indices of the pages that won their name.
fn claim_chapters(pages: &[Page]) -> HashSet<usize> {
    let groups = rank_groups(pages);

    let mut claimed: HashMap<&str, &str> = HashMap::with_capacity(pages.len());
    let mut keep = HashSet::with_capacity(pages.len());
    let mut collisions = 0;
    for group in &groups {
        for &idx in &group.pages {
            let name = pages[idx].name.as_str();
            match claimed.get(name) {
                None => {
                    claimed.insert(name, group.translator);
                    keep.insert(idx);
                }
                Some(owner) => {
                    collisions += 1;
                    warn_time!(
                        "Chapter '{}' translated by both '{}' and '{}', keeping '{}'",
                        name,
                        owner,
                        group.translator,
                        owner
                    );
                }
            }
        }
    }

    info_time!(
        "Consolidated {} releases from {} translators into {} chapters ({} duplicates dropped)",
        pages.len(),
        groups.len(),
        keep.len(),
        collisions
    );
    keep
}

/// Groups page indices by translator, biggest group first.
fn rank_groups(pages: &[Page]) -> Vec<Group<'_>> {
    let mut by_translator: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, page) in pages.iter().enumerate() {
        by_translator
            .entry(page.translator.as_str())
            .or_default()
            .push(idx);
    }

    let mut groups = by_translator
        .into_iter()
        .map(|(translator, pages)| Group { translator, pages })
        .collect::<Vec<_>>();
    // Indices were pushed in ascending order, so `pages[0]` is the group's earliest chapter.
    groups.sort_by(|a, b| {
        b.pages
            .len()
            .cmp(&a.pages.len())
            .then_with(|| a.pages[0].cmp(&b.pages[0]))
    });
    groups
}
