//! Read side: matcher translation, scan predicates and remote-read execution

mod predicate;
mod reader;
mod translator;

pub use predicate::{escape_param, Column, CompiledPredicate, Condition, Predicate, QueryParams};
pub use reader::{Reader, SeriesBuilder};
pub use translator::{IgnoreLabel, MatcherTranslator};
