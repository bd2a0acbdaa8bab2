use std::{
    fmt,
    hash::{Hash, Hasher},
};

use ficdl_common::{err, Report, Uri};
use ficdl_parser::Document;

use crate::{loader::PageLoader, site::UniverseFinder};

/// A universe serialized works belong to.
///
/// Examples: *Harry Potter*, *Star Wars*, *Star Wars + Harry Potter*.
///
/// Equality and hashing only consider `url`.
#[derive(Debug, Clone)]
pub struct Universe {
    url: Uri,
    name: String,
    is_crossover: bool,
}

impl Universe {
    pub fn new(url: Uri, name: String, is_crossover: bool) -> Self {
        Self {
            url,
            name,
            is_crossover,
        }
    }

    /// Builds a universe from an already parsed document, all-or-nothing.
    ///
    /// `url` and `name` are required; crossover-ness is always resolved,
    /// defaulting to `false` when the document gives no determination.
    pub fn from_doc(doc: &Document, finder: &UniverseFinder) -> Result<Self, Report> {
        let url = (finder.find_url)(doc).ok_or_else(|| err!("unable to find the universe url"))?;
        let name =
            (finder.find_name)(doc).ok_or_else(|| err!("unable to find the universe name"))?;
        let is_crossover = (finder.find_crossover)(doc);

        Ok(Self::new(url, name, is_crossover))
    }

    /// Builds a universe from a location; a loader failure is a
    /// construction failure.
    pub async fn from_url(
        url: &Uri,
        finder: &UniverseFinder,
        loader: &dyn PageLoader,
    ) -> Result<Self, Report> {
        let doc = loader.load(url).await?;

        Self::from_doc(&doc, finder)
    }

    /// Location of the universe page.
    pub fn url(&self) -> &Uri {
        &self.url
    }

    /// Name of the universe.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the universe combines lore from two or more universes.
    pub fn is_crossover(&self) -> bool {
        self.is_crossover
    }
}

impl PartialEq for Universe {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Universe {}

impl Hash for Universe {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.to_string().hash(state);
    }
}

impl fmt::Display for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.url)
    }
}
