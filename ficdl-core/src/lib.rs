pub mod loader;
pub mod site;
pub mod state;

mod author;
mod chapter;
mod story;
mod universe;

pub use author::Author;
pub use chapter::Chapter;
pub use loader::{HttpLoader, PageLoader};
pub use site::{AuthorFinder, ChapterFinder, Finder, Site, StoryFinder, TokenRule, UniverseFinder};
pub use state::{Status, UpdateError, UpdateState};
pub use story::Story;
pub use universe::Universe;
