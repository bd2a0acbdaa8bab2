use std::{
    fmt,
    hash::{Hash, Hasher},
};

use ficdl_common::{err, Report, Uri};
use ficdl_parser::Document;

use crate::{loader::PageLoader, site::AuthorFinder};

/// An author of serialized works.
///
/// Equality and hashing only consider `url`.
#[derive(Debug, Clone)]
pub struct Author {
    url: Uri,
    name: String,
}

impl Author {
    pub fn new(url: Uri, name: String) -> Self {
        Self { url, name }
    }

    /// Builds an author from an already parsed document, all-or-nothing.
    pub fn from_doc(doc: &Document, finder: &AuthorFinder) -> Result<Self, Report> {
        let url = (finder.find_url)(doc).ok_or_else(|| err!("unable to find the author url"))?;
        let name = (finder.find_name)(doc).ok_or_else(|| err!("unable to find the author name"))?;

        Ok(Self::new(url, name))
    }

    /// Builds an author from a location; a loader failure is a
    /// construction failure.
    pub async fn from_url(
        url: &Uri,
        finder: &AuthorFinder,
        loader: &dyn PageLoader,
    ) -> Result<Self, Report> {
        let doc = loader.load(url).await?;

        Self::from_doc(&doc, finder)
    }

    /// Location of the author's page.
    pub fn url(&self) -> &Uri {
        &self.url
    }

    /// Name of the author.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Author {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Author {}

impl Hash for Author {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.to_string().hash(state);
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.url)
    }
}
