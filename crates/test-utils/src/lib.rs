//! Shared test utilities for the parcelviz workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Parcel, extent and source-config fixtures
//! - Stub layer adapters and a registry wiring them up
//! - Approximate equality assertions
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{square_parcel, stub_registry};
//! ```

pub mod fixtures;
pub mod stubs;

pub use fixtures::*;
pub use stubs::*;

/// Temporary output root, removed when dropped.
pub fn temp_output_root() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("parcelviz-outputs-")
        .tempdir()
        .expect("create temp dir")
}

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Approximate equality of two extents' bounds.
///
/// ```ignore
/// assert_extent_approx_eq!(extent, (min_x, min_y, max_x, max_y), 1e-6);
/// ```
#[macro_export]
macro_rules! assert_extent_approx_eq {
    ($extent:expr, ($min_x:expr, $min_y:expr, $max_x:expr, $max_y:expr), $epsilon:expr) => {{
        let extent = &$extent;
        $crate::assert_approx_eq!(extent.min_x(), $min_x, $epsilon);
        $crate::assert_approx_eq!(extent.min_y(), $min_y, $epsilon);
        $crate::assert_approx_eq!(extent.max_x(), $max_x, $epsilon);
        $crate::assert_approx_eq!(extent.max_y(), $max_y, $epsilon);
    }};
}
