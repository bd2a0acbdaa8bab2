use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use ficdl_common::{err, Report, Uri};
use ficdl_parser::Document;

use crate::{
    loader::PageLoader,
    site::ChapterFinder,
    state::{UpdateError, UpdateState},
};

/// One addressable unit of a story's content.
///
/// Equality and hashing consider `(url, title, content)`; the sync
/// timestamp and the extraction strategy are excluded.
#[derive(Clone)]
pub struct Chapter {
    url: Uri,
    title: String,
    content: String,
    last_synced_at: DateTime<Utc>,
    finder: Arc<ChapterFinder>,
}

impl Chapter {
    /// Builds a chapter from an already parsed document, all-or-nothing.
    ///
    /// The chapter keeps the finder around so it can refresh itself later.
    pub fn from_doc(doc: &Document, finder: Arc<ChapterFinder>) -> Result<Self, Report> {
        let url = (finder.find_url)(doc).ok_or_else(|| err!("unable to find the chapter url"))?;
        let title =
            (finder.find_title)(doc).ok_or_else(|| err!("unable to find the chapter title"))?;
        let content =
            (finder.find_content)(doc).ok_or_else(|| err!("unable to find the chapter content"))?;

        Ok(Self {
            url,
            title,
            content,
            // Stamped with the local construction time, never read from
            // the document.
            last_synced_at: Utc::now(),
            finder,
        })
    }

    /// Builds a chapter from a location; a loader failure is a
    /// construction failure.
    pub async fn from_url(
        url: &Uri,
        finder: Arc<ChapterFinder>,
        loader: &dyn PageLoader,
    ) -> Result<Self, Report> {
        let doc = loader.load(url).await?;

        Self::from_doc(&doc, finder)
    }

    /// Location of the chapter, as precise as the source allows.
    pub fn url(&self) -> &Uri {
        &self.url
    }

    /// Title of the chapter.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Content of the chapter: the main markup.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// When the chapter was last built or refreshed locally (not a
    /// source-side timestamp).
    pub fn last_synced_at(&self) -> DateTime<Utc> {
        self.last_synced_at
    }

    /// Refreshes this chapter from the live source.
    ///
    /// The chapter counts as changed iff its title or content changed;
    /// the url and the sync timestamp are ignored for classification.
    /// On failure the held value is left untouched.
    pub async fn update(&mut self, loader: &dyn PageLoader) -> UpdateState {
        let url = self.url.clone();

        let fresh = match Self::from_url(&url, Arc::clone(&self.finder), loader).await {
            Ok(chapter) => chapter,
            Err(_) => {
                return UpdateState::Failure(UpdateError::Chapter {
                    url: url.to_string(),
                })
            }
        };

        let changed = self.title != fresh.title || self.content != fresh.content;
        *self = fresh;

        if changed {
            UpdateState::Success
        } else {
            UpdateState::Unchanged
        }
    }
}

impl PartialEq for Chapter {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url && self.title == other.title && self.content == other.content
    }
}

impl Eq for Chapter {}

impl Hash for Chapter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.to_string().hash(state);
        self.title.hash(state);
        self.content.hash(state);
    }
}

impl fmt::Debug for Chapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chapter")
            .field("url", &self.url)
            .field("title", &self.title)
            .field("content", &self.content)
            .field("last_synced_at", &self.last_synced_at)
            .finish()
    }
}

impl fmt::Display for Chapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} - {}", self.title, self.last_synced_at, self.url)
    }
}
