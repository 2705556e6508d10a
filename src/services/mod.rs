pub mod aggregator;
pub mod artifact;
pub mod droid;
pub mod extractor;
#[cfg(test)]
pub mod fake_session;
pub mod link_collector;
pub mod scroller;
pub mod staging_loader;

pub use aggregator::*;
pub use droid::*;
pub use extractor::*;
pub use link_collector::*;
pub use scroller::*;
pub use staging_loader::*;
