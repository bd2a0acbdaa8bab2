//! Fanfiction.net support.
//!
//! Stories live at `https://www.fanfiction.net/s/<id>/<chapter>[/<slug>]`,
//! with `https://m.fanfiction.net` serving the same content to mobile
//! browsers. Every story page carries the full metadata block, so one
//! chapter page is enough to rebuild the whole story description.

use std::{convert::TryFrom, sync::Arc};

use ficdl_common::Uri;
use ficdl_core::{
    AuthorFinder, ChapterFinder, Site, Status, StoryFinder, UniverseFinder,
};
use ficdl_parser::{Document, Element};

const MAIN_URL: &str = "https://www.fanfiction.net";

pub fn site() -> Arc<Site> {
    Arc::new(Site {
        name: "Fanfiction.net",
        canonical_url: Box::new(canonical_url),
        chapter_url: Box::new(chapter_url),
        author: AuthorFinder {
            find_url: Box::new(|doc| {
                let href = author_link(doc)?.attr("href")?;
                site_url(&href)
            }),
            find_name: Box::new(|doc| Some(author_link(doc)?.own_text())),
        },
        universe: UniverseFinder {
            find_url: Box::new(|doc| {
                let href = universe_link(doc)?.attr("href")?;
                site_url(&href)
            }),
            find_name: Box::new(|doc| Some(universe_link(doc)?.own_text())),
            find_crossover: Box::new(|doc| crossover_universe_link(doc).is_some()),
        },
        chapter: Arc::new(ChapterFinder {
            find_url: Box::new(find_canonical),
            find_title: Box::new(|doc| {
                let body = doc.body()?;
                let title = body
                    .select_first("option[selected]")
                    // Untitled chapters are allowed on the site, so the
                    // story title stands in, and failing that nothing.
                    .or_else(|| body.select_first("b.xcontrast_txt"))
                    .map(|link| link.own_text())
                    .unwrap_or_default();

                Some(title)
            }),
            find_content: Box::new(|doc| {
                Some(doc.body()?.select_first("div#storytext")?.html())
            }),
        }),
        story: StoryFinder {
            find_url: Box::new(|doc| chapter_url(&find_canonical(doc)?, 1)),
            find_title: Box::new(|doc| {
                Some(doc.body()?.select_first("b.xcontrast_txt")?.own_text())
            }),
            find_summary: Box::new(|doc| {
                let selected = doc
                    .body()?
                    .select_first("div.xcontrast_txt[style=\"margin-top:2px\"]")?;

                Some(selected.full_text())
            }),
            find_tokens: Box::new(|doc| {
                Some(doc.body()?.select_first("span.xgray.xcontrast_txt")?.full_text())
            }),
            chapter_count: Box::new(|tokens| find_int(tokens, "Chapters:")),
            word_count: Box::new(|tokens| find_int(tokens, "Words:")),
            language: Box::new(|tokens| {
                tokens.split('-').nth(1).map(|raw| raw.replace(' ', ""))
            }),
            status: Box::new(|tokens| {
                Some(if tokens.contains("- Status: Complete -") {
                    Status::Complete
                } else {
                    Status::InProgress
                })
            }),
        },
    })
}

/// Accepts both the desktop and the mobile host and rewrites the location
/// to the desktop first-chapter form.
fn canonical_url(url: &Uri) -> Option<Uri> {
    if !matches!(url.host(), Some("www.fanfiction.net") | Some("m.fanfiction.net")) {
        return None;
    }

    chapter_url(url, 1)
}

/// `https://www.fanfiction.net/s/<id>/<number>`, from any story location.
fn chapter_url(url: &Uri, number: usize) -> Option<Uri> {
    let mut parts = url.path().split('/').filter(|part| !part.is_empty());
    if parts.next()? != "s" {
        return None;
    }
    let id = parts.next()?;

    Uri::try_from(format!("{}/s/{}/{}", MAIN_URL, id, number).as_str()).ok()
}

fn site_url(path: &str) -> Option<Uri> {
    Uri::try_from(format!("{}{}", MAIN_URL, path).as_str()).ok()
}

/// The `<head>` carries a scheme-relative `link[rel="canonical"]`.
fn find_canonical(doc: &Document) -> Option<Uri> {
    let link = doc.head()?.select_first("link[rel=\"canonical\"]")?;
    let href = link.attr("href")?;

    Uri::try_from(format!("https:{}", href).as_str()).ok()
}

fn author_link(doc: &Document) -> Option<Element> {
    doc.body()?.select_first("a[href^=\"/u/\"]")
}

// A single-universe page marks the universe link with a chevron icon; a
// crossover page puts it after the crossover thumbnail.

fn single_universe_link(doc: &Document) -> Option<Element> {
    doc.body()?
        .select_first("span.xcontrast_txt.icon-chevron-right.xicon-section-arrow+a")
}

fn crossover_universe_link(doc: &Document) -> Option<Element> {
    doc.body()?.select_first("img[align=\"absmiddle\"]+a")
}

fn universe_link(doc: &Document) -> Option<Element> {
    single_universe_link(doc).or_else(|| crossover_universe_link(doc))
}

/// Pulls the number following `needle` out of a ` - `-separated metadata
/// blob, tolerating thousands separators.
fn find_int(tokens: &str, needle: &str) -> Option<usize> {
    let token = tokens.split('-').find(|token| token.contains(needle))?;

    token
        .replace(needle, "")
        .replace([' ', ','], "")
        .parse()
        .ok()
}
