pub mod defs;

pub use defs::{Article, Document, PublishOutcome, PublishRequest, PublishTarget, Summary};
