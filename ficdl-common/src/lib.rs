pub mod utils;

pub use color_eyre::{
    eyre::{bail, eyre as err, Context, Report},
    install,
};
pub use http::Uri;

#[twelf::config]
pub struct Conf {
    /// Directory where downloaded stories are written
    pub output: String,

    /// Upper bound, in seconds, for the randomized delay between page fetches
    pub delay: Option<u64>,
}
