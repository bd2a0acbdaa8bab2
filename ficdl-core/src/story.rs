use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use ficdl_common::{err, Context as _, Report, Uri};
use ficdl_parser::Document;

use crate::{
    chapter::Chapter,
    loader::PageLoader,
    site::Site,
    state::{Status, UpdateError, UpdateState},
    Author, Universe,
};

/// The top-level serialized work being tracked.
///
/// A correctly built story always holds **at least one chapter**; identity,
/// equality and hashing only consider `url`, the canonical location of the
/// first chapter.
#[derive(Clone)]
pub struct Story {
    url: Uri,
    title: String,
    summary: String,
    tokens: String,
    author: Author,
    universe: Universe,
    chapters: Vec<Chapter>,
    site: Arc<Site>,
}

/// Restore point for the fatal phases of an update.
struct Snapshot {
    title: String,
    summary: String,
    tokens: String,
    chapters: Vec<Chapter>,
}

impl Story {
    /// Builds a story from a location; a loader failure is a construction
    /// failure.
    #[tracing::instrument(skip(site, loader, url), err, fields(url = %url.to_string()))]
    pub async fn from_url(
        site: Arc<Site>,
        loader: &dyn PageLoader,
        url: &Uri,
    ) -> Result<Self, Report> {
        let doc = loader.load(url).await?;

        Self::from_doc(site, loader, &doc).await
    }

    /// Builds a story from an already parsed document, all-or-nothing:
    /// every required field and the full initial chapter list must resolve,
    /// or no story exists at all.
    pub async fn from_doc(
        site: Arc<Site>,
        loader: &dyn PageLoader,
        doc: &Document,
    ) -> Result<Self, Report> {
        let url = (site.story.find_url)(doc).ok_or_else(|| err!("unable to find the story url"))?;
        let title =
            (site.story.find_title)(doc).ok_or_else(|| err!("unable to find the story title"))?;
        let summary = (site.story.find_summary)(doc)
            .ok_or_else(|| err!("unable to find the story summary"))?;
        let tokens =
            (site.story.find_tokens)(doc).ok_or_else(|| err!("unable to find the story tokens"))?;

        let author = Author::from_doc(doc, &site.author).context("unable to build the author")?;
        let universe =
            Universe::from_doc(doc, &site.universe).context("unable to build the universe")?;

        let declared = (site.story.chapter_count)(&tokens).unwrap_or(1).max(1);

        let chapters = if declared > 1 {
            // The document in hand may describe any chapter, not
            // necessarily the first, so every chapter is fetched. For a
            // short story one page is downloaded twice; for longer ones
            // the cost is amortised.
            let mut chapters = Vec::with_capacity(declared);
            for number in 1..=declared {
                let chapter_url = (site.chapter_url)(&url, number)
                    .ok_or_else(|| err!("unable to derive the location of chapter {}", number))?;
                let chapter = Chapter::from_url(&chapter_url, Arc::clone(&site.chapter), loader)
                    .await
                    .with_context(|| format!("unable to build chapter {}", number))?;
                chapters.push(chapter);
            }
            chapters
        } else {
            vec![Chapter::from_doc(doc, Arc::clone(&site.chapter))?]
        };

        Ok(Self {
            url,
            title,
            summary,
            tokens,
            author,
            universe,
            chapters,
            site,
        })
    }

    /// Canonical location of the first chapter.
    pub fn url(&self) -> &Uri {
        &self.url
    }

    /// Title of the story, without author or universe decorations.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Summary of the story.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// The raw metadata blob the secondary fields derive from.
    pub fn tokens(&self) -> &str {
        &self.tokens
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// The chapters making up the story's content, in chapter-number
    /// order: slot `n - 1` holds chapter `n`.
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// The chapter count the source metadata declares; the held list may
    /// lag behind it until the next update.
    pub fn declared_chapter_count(&self) -> usize {
        (self.site.story.chapter_count)(&self.tokens)
            .unwrap_or(1)
            .max(1)
    }

    /// Number of words in the story, zero when the source does not say.
    pub fn word_count(&self) -> usize {
        (self.site.story.word_count)(&self.tokens).unwrap_or(0)
    }

    /// Language of the story, empty when the source does not say.
    pub fn language(&self) -> String {
        (self.site.story.language)(&self.tokens).unwrap_or_default()
    }

    /// Status of the story, in progress when the source does not say.
    pub fn status(&self) -> Status {
        (self.site.story.status)(&self.tokens).unwrap_or(Status::InProgress)
    }

    pub fn is_complete(&self) -> bool {
        self.status() == Status::Complete
    }

    pub fn is_crossover(&self) -> bool {
        self.universe.is_crossover()
    }

    /// Sync time of the chapter refreshed the longest ago.
    pub fn oldest_chapter_sync(&self) -> DateTime<Utc> {
        self.chapters
            .iter()
            .map(Chapter::last_synced_at)
            .min()
            .expect("a story always has at least one chapter")
    }

    /// Sync time of the chapter refreshed the most recently.
    pub fn newest_chapter_sync(&self) -> DateTime<Utc> {
        self.chapters
            .iter()
            .map(Chapter::last_synced_at)
            .max()
            .expect("a story always has at least one chapter")
    }

    /// Filesystem-friendly rendition of the title.
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.title.len());
        for c in self.title.to_lowercase().chars() {
            if c.is_alphanumeric() {
                slug.push(c);
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }

        slug.trim_end_matches('-').to_string()
    }

    /// Name of the generated file holding the story information page.
    pub fn info_filename(&self) -> String {
        format!("{}_infos.html", self.slug())
    }

    /// Refreshes the most recent known chapter, plus any new chapter the
    /// source declares.
    pub async fn update(&mut self, loader: &dyn PageLoader) -> (UpdateState, Vec<usize>) {
        let last = self.chapters.len();

        self.update_chapters(loader, &[last]).await
    }

    /// Refreshes the requested chapters (1-indexed) and appends any new
    /// chapter the source declares.
    ///
    /// All requested indices below the largest one are refreshed best
    /// effort: their failures are swallowed and their successes are kept
    /// even if the call as a whole later fails. Everything from the
    /// largest index on is fatal on failure and rolled back as a unit.
    ///
    /// Returns the overall result plus the ascending list of chapter
    /// indices that actually changed. The overall state only reflects
    /// what the source resolution found: appended chapters or changed
    /// story metadata make the call a success, while a refresh of an
    /// already held chapter surfaces through the index list alone.
    #[tracing::instrument(skip(self, loader))]
    pub async fn update_chapters(
        &mut self,
        loader: &dyn PageLoader,
        requested: &[usize],
    ) -> (UpdateState, Vec<usize>) {
        let mut wanted = requested.to_vec();
        wanted.sort_unstable();
        wanted.dedup();

        // Validation happens before any I/O and leaves the story untouched.
        let first = match wanted.first() {
            Some(&first) => first,
            None => return (UpdateState::Failure(UpdateError::NoChapters), Vec::new()),
        };
        if first == 0 {
            return (
                UpdateState::Failure(UpdateError::InvalidChapter(first)),
                Vec::new(),
            );
        }
        let max_idx = wanted[wanted.len() - 1];

        // Best-effort phase over the already held chapters.
        let mut updated = Vec::new();
        for idx in wanted {
            if idx >= max_idx || idx > self.chapters.len() {
                continue;
            }
            match self.chapters[idx - 1].update(loader).await {
                UpdateState::Success => updated.push(idx),
                UpdateState::Unchanged => {}
                UpdateState::Failure(error) => {
                    tracing::warn!(chapter = idx, error = %error, "keeping the held chapter");
                }
            }
        }

        // Restore point: everything before this line is kept on failure,
        // everything after it is rolled back.
        let snapshot = self.snapshot();

        match self.resolve(loader, max_idx).await {
            Ok((changed, promoted)) => {
                updated.extend(changed);
                updated.sort_unstable();
                updated.dedup();

                let state = if promoted {
                    UpdateState::Success
                } else {
                    UpdateState::Unchanged
                };

                (state, updated)
            }
            Err(error) => {
                self.restore(snapshot);
                updated.sort_unstable();

                (UpdateState::Failure(error), updated)
            }
        }
    }

    /// Refreshes or appends the chapter at `max_idx`, refreshes the story
    /// metadata from that chapter's page, then appends anything the
    /// refreshed metadata declares beyond what is held. Any failure here
    /// is fatal to the whole call.
    ///
    /// The returned flag is the overall classification: appends and
    /// metadata changes promote the call to a success, a refresh of an
    /// already held chapter does not.
    async fn resolve(
        &mut self,
        loader: &dyn PageLoader,
        max_idx: usize,
    ) -> Result<(Vec<usize>, bool), UpdateError> {
        let mut changed = Vec::new();
        let mut promoted = false;

        if max_idx <= self.chapters.len() {
            match self.chapters[max_idx - 1].update(loader).await {
                UpdateState::Success => changed.push(max_idx),
                UpdateState::Unchanged => {}
                UpdateState::Failure(error) => return Err(error),
            }
        } else {
            changed.extend(self.append_through(loader, max_idx).await?);
            promoted = true;
        }

        if self.refresh_infos(loader, max_idx).await? {
            promoted = true;
        }

        let declared = self.declared_chapter_count();
        if declared > self.chapters.len() {
            changed.extend(self.append_through(loader, declared).await?);
            promoted = true;
        }

        Ok((changed, promoted))
    }

    /// Fetches every chapter from the first missing one through `up_to`
    /// and appends them in index order, all or nothing.
    async fn append_through(
        &mut self,
        loader: &dyn PageLoader,
        up_to: usize,
    ) -> Result<Vec<usize>, UpdateError> {
        let start = self.chapters.len() + 1;
        let mut fresh = Vec::with_capacity(up_to + 1 - start);

        for number in start..=up_to {
            let url = match (self.site.chapter_url)(&self.url, number) {
                Some(url) => url,
                None => {
                    return Err(UpdateError::Chapter {
                        url: self.url.to_string(),
                    })
                }
            };

            match Chapter::from_url(&url, Arc::clone(&self.site.chapter), loader).await {
                Ok(chapter) => fresh.push(chapter),
                Err(_) => {
                    return Err(UpdateError::Chapter {
                        url: url.to_string(),
                    })
                }
            }
        }

        self.chapters.extend(fresh);

        Ok((start..=up_to).collect())
    }

    /// Re-fetches the page at `chapter`'s location and refreshes the
    /// story-level metadata from it.
    async fn refresh_infos(
        &mut self,
        loader: &dyn PageLoader,
        chapter: usize,
    ) -> Result<bool, UpdateError> {
        let url = (self.site.chapter_url)(&self.url, chapter).ok_or(UpdateError::Metadata)?;
        let doc = loader
            .load(&url)
            .await
            .map_err(|_| UpdateError::Metadata)?;

        let title = (self.site.story.find_title)(&doc).ok_or(UpdateError::Metadata)?;
        let summary = (self.site.story.find_summary)(&doc).ok_or(UpdateError::Metadata)?;
        let tokens = (self.site.story.find_tokens)(&doc).ok_or(UpdateError::Metadata)?;

        // Compared from the most to the least likely to have changed.
        let changed = self.tokens != tokens || self.summary != summary || self.title != title;

        self.title = title;
        self.summary = summary;
        self.tokens = tokens;

        Ok(changed)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            title: self.title.clone(),
            summary: self.summary.clone(),
            tokens: self.tokens.clone(),
            chapters: self.chapters.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.title = snapshot.title;
        self.summary = snapshot.summary;
        self.tokens = snapshot.tokens;
        self.chapters = snapshot.chapters;
    }
}

impl PartialEq for Story {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Story {}

impl Hash for Story {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.to_string().hash(state);
    }
}

impl fmt::Debug for Story {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Story")
            .field("url", &self.url)
            .field("title", &self.title)
            .field("chapters", &self.chapters.len())
            .field("site", &self.site.name)
            .finish()
    }
}

impl fmt::Display for Story {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "URL: {}", self.url)?;
        writeln!(f, "===============")?;
        writeln!(f, "Author: {}", self.author)?;
        writeln!(f)?;
        writeln!(f, "Universe: {}", self.universe)?;
        writeln!(f)?;
        writeln!(f, "Summary: {}", self.summary)?;
        writeln!(f)?;
        writeln!(f, "Language: {}", self.language())?;
        writeln!(f, "Status: {}", self.status())?;
        writeln!(f)?;
        writeln!(f, "Updates:")?;
        writeln!(f, "Oldest: {}", self.oldest_chapter_sync())?;
        writeln!(f, "Newest: {}", self.newest_chapter_sync())?;
        writeln!(f)?;
        writeln!(f, "{}", self.tokens)?;
        writeln!(f, "---------------")?;
        for chapter in &self.chapters {
            writeln!(f, "{}", chapter)?;
        }

        Ok(())
    }
}
