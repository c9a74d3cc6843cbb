//! Shared test utilities for the pyramid coverage workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Tracing setup for tests
//! - Raster generators with verifiable sample patterns
//! - The two-mosaic reference dataset used across the suite
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
//! use test_utils::{fixtures, init_tracing};
//! ```

use std::sync::Once;

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

static TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Creates a temporary directory with a specific prefix.
pub fn temp_dataset_dir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temporary dataset directory")
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

/// Approximate equality of a `(min_x, min_y, max_x, max_y)` extent.
///
/// ```ignore
/// use test_utils::assert_extent_approx_eq;
///
/// assert_extent_approx_eq!((bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y), (-180.0, 70.0, -160.0, 90.0), 1e-9);
/// ```
#[macro_export]
macro_rules! assert_extent_approx_eq {
    (($a0:expr, $a1:expr, $a2:expr, $a3:expr), ($b0:expr, $b1:expr, $b2:expr, $b3:expr), $epsilon:expr) => {{
        $crate::assert_approx_eq!($a0, $b0, $epsilon);
        $crate::assert_approx_eq!($a1, $b1, $epsilon);
        $crate::assert_approx_eq!($a2, $b2, $epsilon);
        $crate::assert_approx_eq!($a3, $b3, $epsilon);
    }};
    ($a:expr, $b:expr, $epsilon:expr) => {{
        let (a0, a1, a2, a3) = $a;
        let (b0, b1, b2, b3) = $b;
        $crate::assert_extent_approx_eq!((a0, a1, a2, a3), (b0, b1, b2, b3), $epsilon);
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_extent_approx_eq_passes() {
        assert_extent_approx_eq!((1.0001, 2.0, 3.0, 4.0), (1.0, 2.0, 3.0, 4.0), 0.001);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        super::init_tracing();
        super::init_tracing();
    }
}
