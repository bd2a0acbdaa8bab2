mod document;
mod selector;

pub use document::{Document, Element};
pub use selector::Selector;
