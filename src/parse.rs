use chrono::NaiveDate;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::consolidate::ListingRow;
use crate::{Error, Result, RELEASE_DATE_FORMAT};

/// Content under these elements never ends up in chapter text.
const STRIPPED_ELEMENTS: [&str; 8] = [
    "script", "style", "noscript", "img", "svg", "iframe", "head", "button",
];
/// Each of these starts a new paragraph.
const BLOCK_ELEMENTS: [&str; 13] = [
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "section", "article",
];

/// Everything the novel's landing page says about it, apart from chapters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub description: Vec<String>,
    pub authors: Vec<String>,
    pub artists: Vec<String>,
    pub genres: Vec<String>,
    pub languages: Vec<String>,
    pub licensed: bool,
    pub status: Option<String>,
}

/// One page of the release table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    /// Rows exactly as the site shows them, newest first.
    pub rows: Vec<ListingRow>,
    /// Number of listing pages, 1 when the site shows no pagination.
    pub page_count: usize,
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::InvalidSelector(sel_str.into()))
}

/// Trimmed text of an element with inner whitespace collapsed.
/// Inline markup inside a word (`Hel<b>lo</b>`) doesn't split it.
fn element_text(el: ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn select_texts(doc: &Html, sel_str: &str) -> Result<Vec<String>> {
    let selector = create_selector(sel_str)?;
    Ok(doc
        .select(&selector)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect())
}

fn select_text(doc: &Html, sel_str: &str) -> Result<Option<String>> {
    Ok(select_texts(doc, sel_str)?.into_iter().next())
}

/// Parses the series metadata of a novel's landing page. The title is the only required field.
pub fn parse_metadata(html: &str) -> Result<Metadata> {
    let doc = Html::parse_document(html);

    let title = select_text(&doc, "div.seriestitlenew")?
        .ok_or_else(|| Error::ParseMissingSelector("div.seriestitlenew".into()))?;
    let licensed = select_text(&doc, "#showlicensed")?
        .map(|t| t.eq_ignore_ascii_case("yes"))
        .unwrap_or(false);

    Ok(Metadata {
        title,
        description: select_texts(&doc, "#editdescription p")?,
        authors: select_texts(&doc, "#showauthors a")?,
        artists: select_texts(&doc, "#showartists a")?,
        genres: select_texts(&doc, "#seriesgenre a")?,
        languages: select_texts(&doc, "#showlang a")?,
        licensed,
        status: select_text(&doc, "#editstatus")?,
    })
}

/// Parses one page of the release table. Chapter links are resolved against `base`,
/// the site uses protocol relative links.
pub fn parse_listing(html: &str, base: &Url) -> Result<ListingPage> {
    let doc = Html::parse_document(html);

    let row_selector = create_selector("table#myTable tbody tr")?;
    let cell_selector = create_selector("td")?;
    let release_selector = create_selector("a.chp-release")?;
    let group_selector = create_selector("a")?;

    let mut rows = Vec::new();
    for row in doc.select(&row_selector) {
        let cells = row.select(&cell_selector).collect::<Vec<_>>();
        let &[date_cell, group_cell, release_cell, ..] = cells.as_slice() else {
            return Err(Error::ParseMissingSelector("table#myTable td".into()));
        };

        let date_text = element_text(date_cell);
        let date = NaiveDate::parse_from_str(&date_text, RELEASE_DATE_FORMAT)
            .map_err(|_| Error::ParseDate(date_text.clone()))?;

        let translator = group_cell
            .select(&group_selector)
            .next()
            .map(element_text)
            .unwrap_or_else(|| element_text(group_cell));

        let release = release_cell
            .select(&release_selector)
            .next()
            .ok_or_else(|| Error::ParseMissingSelector("a.chp-release".into()))?;
        let href = release
            .value()
            .attr("href")
            .ok_or_else(|| Error::ParseMissingSelector("a.chp-release[href]".into()))?;

        rows.push(ListingRow {
            date,
            translator,
            name: element_text(release),
            link: base.join(href)?.to_string(),
        });
    }

    Ok(ListingPage {
        rows,
        page_count: parse_page_count(&doc)?,
    })
}

/// The pagination block lists page numbers next to "prev"/"next" links;
/// the largest number is the last page.
fn parse_page_count(doc: &Html) -> Result<usize> {
    let selector = create_selector("div.digg_pagination a")?;
    Ok(doc
        .select(&selector)
        .filter_map(|a| element_text(a).parse::<usize>().ok())
        .max()
        .unwrap_or(1)
        .max(1))
}

fn element_named(node: &Node, names: &[&str]) -> bool {
    matches!(node, Node::Element(el) if names.contains(&el.name()))
}

/// Strips non-textual elements from a chapter page and returns its text,
/// one entry per block element.
pub fn extract_text(html: &str) -> Result<Vec<String>> {
    let doc = Html::parse_document(html);
    let body_selector = create_selector("body")?;
    let root = doc
        .select(&body_selector)
        .next()
        .unwrap_or_else(|| doc.root_element());

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut current_block = None;

    for node in root.descendants() {
        if node
            .ancestors()
            .any(|a| element_named(a.value(), &STRIPPED_ELEMENTS))
        {
            continue;
        }
        match node.value() {
            Node::Element(el) if el.name() == "br" => {
                flush_paragraph(&mut current, &mut paragraphs);
            }
            Node::Text(text) => {
                let block = node
                    .ancestors()
                    .find(|a| element_named(a.value(), &BLOCK_ELEMENTS))
                    .map(|a| a.id());
                if block != current_block {
                    flush_paragraph(&mut current, &mut paragraphs);
                    current_block = block;
                }
                current.push_str(text);
            }
            _ => {}
        }
    }
    flush_paragraph(&mut current, &mut paragraphs);

    Ok(paragraphs)
}

/// Raw text is collected per paragraph and only collapsed here.
fn flush_paragraph(current: &mut String, paragraphs: &mut Vec<String>) {
    let paragraph = collapse_whitespace(current);
    current.clear();
    if !paragraph.is_empty() {
        paragraphs.push(paragraph);
    }
}
