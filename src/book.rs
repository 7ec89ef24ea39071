use std::io::{Cursor, Write};
use std::path::Path;

use chrono::Local;
use encoding_rs::{Encoding, UTF_8};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::page::Chapter;
use crate::parse::Metadata;
use crate::{info_time, Error, Result};

const CONTAINER_XML: &str = r#"<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// Packs a novel into an EPUB 2 file.
///
/// The text encoding is part of the writer's configuration and every XML file
/// declares it, nothing depends on the platform's default encoding.
#[derive(Debug, Clone, Copy)]
pub struct BookWriter {
    encoding: &'static Encoding,
}

impl Default for BookWriter {
    fn default() -> Self {
        Self::new(UTF_8)
    }
}

impl BookWriter {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding: encoding.output_encoding(),
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Writes `metadata` and `chapters` (in reading order) to `<dir>/<title>.epub`
    /// and returns the file name.
    pub async fn write(
        &self,
        metadata: &Metadata,
        chapters: &[Chapter],
        dir: &Path,
    ) -> Result<String> {
        let start_time = Local::now();
        let file_name = format!("{}.epub", file_stem(&metadata.title));
        let bytes = self.pack(metadata, chapters)?;
        tokio::fs::write(dir.join(&file_name), bytes).await?;
        info_time!(
            start_time,
            "Wrote {} chapters to {}",
            chapters.len(),
            file_name
        );
        Ok(file_name)
    }

    /// Builds the whole archive in memory.
    pub fn pack(&self, metadata: &Metadata, chapters: &[Chapter]) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        // The mimetype has to be the first entry and uncompressed.
        zip.start_file("mimetype", file_options(CompressionMethod::Stored))?;
        zip.write_all(b"application/epub+zip")?;

        zip.start_file("META-INF/container.xml", file_options(CompressionMethod::Deflated))?;
        zip.write_all(&self.encode(&self.xml(CONTAINER_XML))?)?;

        zip.start_file("OEBPS/content.opf", file_options(CompressionMethod::Deflated))?;
        zip.write_all(&self.encode(&self.content_opf(metadata, chapters))?)?;

        zip.start_file("OEBPS/toc.ncx", file_options(CompressionMethod::Deflated))?;
        zip.write_all(&self.encode(&self.toc_ncx(metadata, chapters))?)?;

        for (idx, chapter) in chapters.iter().enumerate() {
            zip.start_file(format!("OEBPS/{}", chapter_file(idx)), file_options(CompressionMethod::Deflated))?;
            zip.write_all(&self.encode(&self.chapter_xhtml(chapter))?)?;
        }

        Ok(zip.finish()?.into_inner())
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let (bytes, _, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(Error::Encoding(self.encoding.name()));
        }
        Ok(bytes.into_owned())
    }

    fn xml(&self, body: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"{}\"?>\n{}",
            self.encoding.name(),
            body
        )
    }

    fn content_opf(&self, metadata: &Metadata, chapters: &[Chapter]) -> String {
        let mut meta = String::new();
        meta.push_str(&format!("    <dc:title>{}</dc:title>\n", escape(&metadata.title)));
        meta.push_str(&format!(
            "    <dc:identifier id=\"book-id\">urn:novel:{}</dc:identifier>\n",
            escape(&file_stem(&metadata.title))
        ));
        for author in &metadata.authors {
            meta.push_str(&format!(
                "    <dc:creator opf:role=\"aut\">{}</dc:creator>\n",
                escape(author)
            ));
        }
        for artist in &metadata.artists {
            meta.push_str(&format!(
                "    <dc:contributor opf:role=\"ill\">{}</dc:contributor>\n",
                escape(artist)
            ));
        }
        // EPUB needs at least one language.
        if metadata.languages.is_empty() {
            meta.push_str("    <dc:language>en</dc:language>\n");
        }
        for language in &metadata.languages {
            meta.push_str(&format!("    <dc:language>{}</dc:language>\n", escape(language)));
        }
        for genre in &metadata.genres {
            meta.push_str(&format!("    <dc:subject>{}</dc:subject>\n", escape(genre)));
        }
        if !metadata.description.is_empty() {
            meta.push_str(&format!(
                "    <dc:description>{}</dc:description>\n",
                escape(&metadata.description.join("\n"))
            ));
        }
        if metadata.licensed {
            meta.push_str("    <dc:rights>Licensed</dc:rights>\n");
        }

        let mut manifest = String::from(
            "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
        );
        let mut spine = String::new();
        for idx in 0..chapters.len() {
            manifest.push_str(&format!(
                "    <item id=\"chapter{idx}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
                chapter_file(idx)
            ));
            spine.push_str(&format!("    <itemref idref=\"chapter{idx}\"/>\n"));
        }

        self.xml(&format!(
            "<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"book-id\" version=\"2.0\">\n\
  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:opf=\"http://www.idpf.org/2007/opf\">\n\
{meta}  </metadata>\n\
  <manifest>\n\
{manifest}  </manifest>\n\
  <spine toc=\"ncx\">\n\
{spine}  </spine>\n\
</package>\n"
        ))
    }

    fn toc_ncx(&self, metadata: &Metadata, chapters: &[Chapter]) -> String {
        let mut nav = String::new();
        for (idx, chapter) in chapters.iter().enumerate() {
            nav.push_str(&format!(
                "    <navPoint id=\"nav{idx}\" playOrder=\"{}\">\n      <navLabel><text>{}</text></navLabel>\n      <content src=\"{}\"/>\n    </navPoint>\n",
                idx + 1,
                escape(&chapter.title),
                chapter_file(idx)
            ));
        }
        self.xml(&format!(
            "<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n\
  <head>\n    <meta name=\"dtb:uid\" content=\"urn:novel:{}\"/>\n  </head>\n\
  <docTitle><text>{}</text></docTitle>\n\
  <navMap>\n{nav}  </navMap>\n\
</ncx>\n",
            escape(&file_stem(&metadata.title)),
            escape(&metadata.title)
        ))
    }

    fn chapter_xhtml(&self, chapter: &Chapter) -> String {
        let title = escape(&chapter.title);
        let body = chapter
            .paragraphs
            .iter()
            .map(|p| format!("    <p>{}</p>\n", escape(p)))
            .collect::<String>();
        self.xml(&format!(
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\" \"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">\n\
<html xmlns=\"http://www.w3.org/1999/xhtml\">\n\
  <head><title>{title}</title></head>\n\
  <body>\n    <h1>{title}</h1>\n{body}  </body>\n\
</html>\n"
        ))
    }
}

fn file_options(method: CompressionMethod) -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(method)
}

fn chapter_file(idx: usize) -> String {
    format!("chapter_{:04}.xhtml", idx + 1)
}

/// File name safe version of a title.
fn file_stem(title: &str) -> String {
    let stem = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>();
    let stem = stem.trim().trim_matches('.');
    if stem.is_empty() {
        "novel".to_string()
    } else {
        stem.to_string()
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
