//! Test support utilities for the index workspace.
//!
//! This crate provides:
//! - Isolated temporary directories with matching configs and page stores
//! - Key and row fixtures for integer and text trees
//! - Property-based generators for keys and insert/delete workloads
//!
//! # Example Usage
//!
//! ```
//! use testsupport::prelude::*;
//! use storage::PageStore;
//!
//! let ctx = TestContext::with_page_size(256).unwrap();
//! let mut pages = ctx.create_file_store().unwrap();
//! assert_eq!(pages.assign_empty_page().unwrap(), 0);
//! ```

pub mod context;
pub mod fixtures;
pub mod proptest_generators;

/// Convenient re-exports for common testing patterns.
pub mod prelude {
    pub use crate::context::*;
    pub use crate::fixtures::*;
    pub use crate::proptest_generators::TreeOp;
}
