//! HTTP protocol layer module
//!
//! Protocol-level helpers shared by the pipeline and the content handlers:
//! method numbering, validators, dates, ranges, content types and response
//! rendering.

pub mod cache;
pub mod date;
pub mod method;
pub mod mime;
pub mod range;
pub mod response;
pub mod uri;

// Re-export commonly used types
pub use method::{MethodMask, MethodNumber};
pub use range::{parse_range_header, ByteRange, RangeParseResult};
pub use response::{build_500_response, build_response};
