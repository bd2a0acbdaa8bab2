use std::sync::Arc;

use ficdl_common::Uri;
use ficdl_parser::Document;

use crate::state::Status;

/// A pure, source-specific extraction function for one field.
///
/// Returning `None` means "this field could not be located in this
/// document"; a finder never fails any other way.
pub type Finder<T> = Box<dyn Fn(&Document) -> Option<T> + Send + Sync>;

/// A rule deriving one value from the raw metadata token blob.
pub type TokenRule<T> = Box<dyn Fn(&str) -> Option<T> + Send + Sync>;

/// Finds everything relevant about an author inside a document.
pub struct AuthorFinder {
    pub find_url: Finder<Uri>,
    pub find_name: Finder<String>,
}

/// Finds everything relevant about a universe inside a document.
pub struct UniverseFinder {
    pub find_url: Finder<Uri>,
    pub find_name: Finder<String>,
    /// Crossover-ness is binary; a site unable to tell reports `false`.
    pub find_crossover: Box<dyn Fn(&Document) -> bool + Send + Sync>,
}

/// Finds everything relevant about a chapter inside a document.
pub struct ChapterFinder {
    pub find_url: Finder<Uri>,
    pub find_title: Finder<String>,
    pub find_content: Finder<String>,
}

/// Finds the story-level fields inside a document, and derives the
/// secondary fields from the opaque token blob.
///
/// The token rules may return `None`; the story falls back to safe
/// defaults (one chapter, zero words, unknown language, in progress).
pub struct StoryFinder {
    pub find_url: Finder<Uri>,
    pub find_title: Finder<String>,
    pub find_summary: Finder<String>,
    pub find_tokens: Finder<String>,

    pub chapter_count: TokenRule<usize>,
    pub word_count: TokenRule<usize>,
    pub language: TokenRule<String>,
    pub status: TokenRule<Status>,
}

/// Everything the core needs to know about one concrete source.
///
/// A site is data handed to the generic engine, never a subclass of it:
/// the engine does not branch on which source is in play.
pub struct Site {
    /// Name of the site.
    pub name: &'static str,
    /// Derives the canonical first-chapter location from any same-source
    /// location; `None` when the location does not belong to this site.
    pub canonical_url: Box<dyn Fn(&Uri) -> Option<Uri> + Send + Sync>,
    /// Derives the location of chapter `n` from the canonical location.
    pub chapter_url: Box<dyn Fn(&Uri, usize) -> Option<Uri> + Send + Sync>,

    pub author: AuthorFinder,
    pub universe: UniverseFinder,
    pub chapter: Arc<ChapterFinder>,
    pub story: StoryFinder,
}
