pub mod indicators;
pub mod extractor;


pub use indicators::*;
pub use extractor::*;
