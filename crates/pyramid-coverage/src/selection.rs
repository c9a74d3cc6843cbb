//! Mosaic and slice selection rules.
//!
//! Resolutions order lexicographically on `(x, y)`: smaller is finer.

use std::cmp::Ordering;

use crate::model::Mosaic;

/// Relative tolerance when comparing resolutions.
const RESOLUTION_TOLERANCE: f64 = 1e-9;

/// Finer resolutions sort first.
pub fn compare_resolution(a: (f64, f64), b: (f64, f64)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1))
}

/// Equal on both axes within the relative tolerance.
pub fn same_resolution(a: (f64, f64), b: (f64, f64)) -> bool {
    close(a.0, b.0) && close(a.1, b.1)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= RESOLUTION_TOLERANCE * a.abs().max(b.abs())
}

/// `candidate <= limit` within the relative tolerance.
fn at_most(candidate: f64, limit: f64) -> bool {
    candidate <= limit || close(candidate, limit)
}

/// The mosaic with the smallest resolution.
pub fn finest_mosaic(mosaics: &[Mosaic]) -> Option<&Mosaic> {
    mosaics
        .iter()
        .min_by(|a, b| compare_resolution(a.resolution(), b.resolution()))
}

/// Pick the mosaic to serve a read.
///
/// Without a requested resolution the finest mosaic wins. With one, the
/// coarsest mosaic whose resolution is at most the request on both axes
/// wins, and the finest is the fallback when none qualifies.
pub fn select_mosaic(mosaics: &[Mosaic], requested: Option<(f64, f64)>) -> Option<&Mosaic> {
    let Some((req_x, req_y)) = requested else {
        return finest_mosaic(mosaics);
    };

    mosaics
        .iter()
        .filter(|m| {
            let (rx, ry) = m.resolution();
            at_most(rx, req_x) && at_most(ry, req_y)
        })
        .max_by(|a, b| compare_resolution(a.resolution(), b.resolution()))
        .or_else(|| finest_mosaic(mosaics))
}

/// Whether every slice value falls inside its requested range, widened by
/// `tolerance` on both ends.
///
/// Axes without a requested range are unconstrained.
pub fn slice_in_ranges(slice: &[f64], ranges: &[(f64, f64)], tolerance: f64) -> bool {
    slice
        .iter()
        .zip(ranges.iter())
        .all(|(&value, &(lo, hi))| value >= lo - tolerance && value <= hi + tolerance)
}

/// Whether two slice positions are equal within `tolerance` on every axis.
pub fn same_slice(a: &[f64], b: &[f64], tolerance: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MosaicGeometry;

    fn mosaic(id: &str, res: (f64, f64)) -> Mosaic {
        Mosaic::new(
            id,
            "p",
            MosaicGeometry::new(vec![0.0, 0.0], (1, 1), (10, 10), res),
        )
    }

    fn levels() -> Vec<Mosaic> {
        vec![
            mosaic("r2", (2.0, 2.0)),
            mosaic("r05", (0.5, 0.5)),
            mosaic("r1", (1.0, 1.0)),
            mosaic("r4", (4.0, 4.0)),
        ]
    }

    #[test]
    fn test_default_is_finest() {
        assert_eq!(select_mosaic(&levels(), None).unwrap().id, "r05");
    }

    #[test]
    fn test_coarsest_at_or_below_request() {
        let levels = levels();
        assert_eq!(select_mosaic(&levels, Some((1.0, 1.0))).unwrap().id, "r1");
        assert_eq!(select_mosaic(&levels, Some((3.0, 3.0))).unwrap().id, "r2");
        assert_eq!(select_mosaic(&levels, Some((100.0, 100.0))).unwrap().id, "r4");
        // Rounding noise on an exact level still selects it
        assert_eq!(
            select_mosaic(&levels, Some((1.0 - 1e-12, 1.0 - 1e-12))).unwrap().id,
            "r1"
        );
    }

    #[test]
    fn test_both_axes_must_qualify() {
        let levels = levels();
        // x would allow r2 but y only allows r1
        assert_eq!(select_mosaic(&levels, Some((2.0, 1.5))).unwrap().id, "r1");
    }

    #[test]
    fn test_falls_back_to_finest() {
        assert_eq!(select_mosaic(&levels(), Some((0.1, 0.1))).unwrap().id, "r05");
        assert_eq!(
            select_mosaic(&levels(), Some((f64::NAN, 1.0))).unwrap().id,
            "r05"
        );
        assert!(select_mosaic(&[], None).is_none());
    }

    #[test]
    fn test_anisotropic_ordering() {
        let levels = vec![mosaic("a", (1.0, 4.0)), mosaic("b", (1.0, 2.0))];
        assert_eq!(finest_mosaic(&levels).unwrap().id, "b");
        assert_eq!(select_mosaic(&levels, Some((1.0, 5.0))).unwrap().id, "a");
    }

    #[test]
    fn test_same_resolution() {
        assert!(same_resolution((0.5, 0.5), (0.5 + 1e-15, 0.5)));
        assert!(!same_resolution((0.5, 0.5), (0.5, 0.25)));
    }

    #[test]
    fn test_slice_in_ranges() {
        assert!(slice_in_ranges(&[-15.0], &[(-20.0, 0.0)], 0.0));
        assert!(slice_in_ranges(&[-15.0], &[(-15.0, -15.0)], 0.0));
        assert!(slice_in_ranges(&[46.58], &[(46.58 + 1e-12, 50.0)], 1e-9));
        assert!(!slice_in_ranges(&[46.58], &[(-20.0, 0.0)], 1e-9));
        // No ranges: unconstrained
        assert!(slice_in_ranges(&[46.58], &[], 0.0));
    }

    #[test]
    fn test_same_slice() {
        assert!(same_slice(&[-15.0], &[-15.0 + 1e-12], 1e-9));
        assert!(!same_slice(&[-15.0], &[-14.0], 1e-9));
        assert!(!same_slice(&[-15.0], &[], 1e-9));
        assert!(same_slice(&[], &[], 0.0));
    }
}
