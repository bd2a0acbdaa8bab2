//! `-v`/`-q` flags for tracing, in the spirit of
//! https://docs.rs/clap-verbosity-flag/1.0.0/clap_verbosity_flag/

use std::fmt;

use tracing::{level_filters::LevelFilter, Level};

/// Stacking verbosity flags, starting from warnings.
#[derive(clap::Args, Debug, Clone)]
pub struct Verbosity {
    #[clap(
        long,
        short = 'v',
        parse(from_occurrences),
        global = true,
        help = "More output per occurrence"
    )]
    verbose: i8,

    #[clap(
        long,
        short = 'q',
        parse(from_occurrences),
        global = true,
        help = "Less output per occurrence",
        conflicts_with = "verbose"
    )]
    quiet: i8,
}

impl Verbosity {
    pub fn log_level_filter(&self) -> LevelFilter {
        match self.verbosity() {
            i8::MIN..=-1 => LevelFilter::OFF,
            0 => LevelFilter::from_level(Level::ERROR),
            1 => LevelFilter::from_level(Level::WARN),
            2 => LevelFilter::from_level(Level::INFO),
            3 => LevelFilter::from_level(Level::DEBUG),
            4..=i8::MAX => LevelFilter::from_level(Level::TRACE),
        }
    }

    fn verbosity(&self) -> i8 {
        1 - self.quiet + self.verbose
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verbosity())
    }
}
