//! N-dimensional axis-aligned envelopes.
//!
//! Axis 0 and 1 are always the horizontal (x, y) axes; axes 2.. are the
//! extra axes declared by the dataset's [`ReferenceSystem`](crate::ReferenceSystem).

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::EnvelopeError;

/// Axis-aligned range over every axis of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Envelope {
    /// Build an envelope from per-axis lower and upper corners.
    ///
    /// Bounds are not validated beyond the dimension check: NaN or
    /// inverted ranges are left for the caller to clip or reject.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, EnvelopeError> {
        if lower.len() != upper.len() {
            return Err(EnvelopeError::DimensionMismatch {
                expected: lower.len(),
                actual: upper.len(),
            });
        }
        if lower.len() < 2 {
            return Err(EnvelopeError::TooFewDimensions(lower.len()));
        }
        Ok(Self { lower, upper })
    }

    /// A two-dimensional envelope covering `bbox`.
    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        Self {
            lower: vec![bbox.min_x, bbox.min_y],
            upper: vec![bbox.max_x, bbox.max_y],
        }
    }

    /// Horizontal footprint plus one `(min, max)` range per extra axis.
    pub fn from_bbox_and_ranges(bbox: &BoundingBox, ranges: &[(f64, f64)]) -> Self {
        let mut envelope = Self::from_bbox(bbox);
        for &(min, max) in ranges {
            envelope.lower.push(min);
            envelope.upper.push(max);
        }
        envelope
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn minimum(&self, axis: usize) -> f64 {
        self.lower[axis]
    }

    pub fn maximum(&self, axis: usize) -> f64 {
        self.upper[axis]
    }

    pub fn span(&self, axis: usize) -> f64 {
        self.upper[axis] - self.lower[axis]
    }

    /// The two spatial axes as a [`BoundingBox`].
    pub fn horizontal(&self) -> BoundingBox {
        BoundingBox::new(self.lower[0], self.lower[1], self.upper[0], self.upper[1])
    }

    /// Replace the two spatial axes, keeping extra axes untouched.
    pub fn with_horizontal(mut self, bbox: &BoundingBox) -> Self {
        self.lower[0] = bbox.min_x;
        self.lower[1] = bbox.min_y;
        self.upper[0] = bbox.max_x;
        self.upper[1] = bbox.max_y;
        self
    }

    /// Pad every extra axis by `margin` on both sides.
    pub fn widen_extra_axes(mut self, margin: f64) -> Self {
        for axis in 2..self.lower.len() {
            self.lower[axis] -= margin;
            self.upper[axis] += margin;
        }
        self
    }

    /// Number of extra (non-spatial) axes.
    pub fn extra_dimension(&self) -> usize {
        self.lower.len() - 2
    }

    /// Range on extra axis `index` (0 is the first axis after x/y).
    pub fn extra_range(&self, index: usize) -> Option<(f64, f64)> {
        let axis = index + 2;
        if axis < self.lower.len() {
            Some((self.lower[axis], self.upper[axis]))
        } else {
            None
        }
    }

    pub fn is_finite(&self) -> bool {
        self.lower.iter().chain(self.upper.iter()).all(|v| v.is_finite())
    }

    /// True when some axis has `min > max` (NaN bounds do not count).
    pub fn is_inverted(&self) -> bool {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .any(|(lo, hi)| lo > hi)
    }

    /// Grow this envelope to include `other`.
    pub fn expand_to_include(&mut self, other: &Envelope) -> Result<(), EnvelopeError> {
        self.check_dimension(other)?;
        for axis in 0..self.lower.len() {
            self.lower[axis] = self.lower[axis].min(other.lower[axis]);
            self.upper[axis] = self.upper[axis].max(other.upper[axis]);
        }
        Ok(())
    }

    /// Smallest envelope containing both.
    pub fn union(&self, other: &Envelope) -> Result<Envelope, EnvelopeError> {
        let mut result = self.clone();
        result.expand_to_include(other)?;
        Ok(result)
    }

    /// Clip every axis to `domain`.
    ///
    /// Uses `f64::max`/`f64::min`, which return the non-NaN operand, so a
    /// NaN or infinite request bound is replaced by the domain bound. The
    /// result may be inverted when the two envelopes are disjoint.
    pub fn clip_to(&self, domain: &Envelope) -> Result<Envelope, EnvelopeError> {
        self.check_dimension(domain)?;
        let lower = self
            .lower
            .iter()
            .zip(domain.lower.iter())
            .map(|(a, b)| a.max(*b))
            .collect();
        let upper = self
            .upper
            .iter()
            .zip(domain.upper.iter())
            .map(|(a, b)| a.min(*b))
            .collect();
        Ok(Envelope { lower, upper })
    }

    /// Closed intersection (touching ranges intersect), `None` when disjoint.
    pub fn intersection(&self, other: &Envelope) -> Result<Option<Envelope>, EnvelopeError> {
        let clipped = self.clip_to(other)?;
        if clipped.is_inverted() {
            Ok(None)
        } else {
            Ok(Some(clipped))
        }
    }

    fn check_dimension(&self, other: &Envelope) -> Result<(), EnvelopeError> {
        if self.lower.len() != other.lower.len() {
            return Err(EnvelopeError::DimensionMismatch {
                expected: self.lower.len(),
                actual: other.lower.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_dimensions() {
        assert!(Envelope::new(vec![0.0, 0.0], vec![1.0, 1.0]).is_ok());
        assert_eq!(
            Envelope::new(vec![0.0, 0.0, 0.0], vec![1.0, 1.0]).unwrap_err(),
            EnvelopeError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(
            Envelope::new(vec![0.0], vec![1.0]).unwrap_err(),
            EnvelopeError::TooFewDimensions(1)
        );
    }

    #[test]
    fn test_union_over_extra_axis() {
        let bbox = BoundingBox::new(-180.0, 70.0, -160.0, 90.0);
        let a = Envelope::from_bbox_and_ranges(&bbox, &[(-15.0, -15.0)]);
        let b = Envelope::from_bbox_and_ranges(&bbox, &[(46.58, 46.58)]);
        let union = a.union(&b).unwrap();
        assert_eq!(union.extra_range(0), Some((-15.0, 46.58)));
        assert_eq!(union.horizontal(), bbox);
    }

    #[test]
    fn test_clip_replaces_nan_and_infinity() {
        let domain = Envelope::new(vec![-180.0, 70.0], vec![-160.0, 90.0]).unwrap();
        let request = Envelope::new(vec![f64::NAN, f64::NEG_INFINITY], vec![-170.0, 80.0]).unwrap();
        let clipped = request.clip_to(&domain).unwrap();
        assert_eq!(clipped.lower(), &[-180.0, 70.0]);
        assert_eq!(clipped.upper(), &[-170.0, 80.0]);
        assert!(clipped.is_finite());
    }

    #[test]
    fn test_intersection_disjoint() {
        let a = Envelope::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        let b = Envelope::new(vec![2.0, 2.0], vec![3.0, 3.0]).unwrap();
        assert!(a.intersection(&b).unwrap().is_none());
    }

    #[test]
    fn test_point_range_intersects() {
        let a = Envelope::new(vec![0.0, 0.0, 5.0], vec![1.0, 1.0, 5.0]).unwrap();
        let b = Envelope::new(vec![0.0, 0.0, 0.0], vec![1.0, 1.0, 10.0]).unwrap();
        let inter = a.intersection(&b).unwrap().unwrap();
        assert_eq!(inter.extra_range(0), Some((5.0, 5.0)));
    }

    #[test]
    fn test_widen_extra_axes_keeps_horizontal() {
        let env = Envelope::new(vec![0.0, 0.0, 5.0], vec![1.0, 1.0, 5.0])
            .unwrap()
            .widen_extra_axes(0.5);
        assert_eq!(env.horizontal(), BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(env.extra_range(0), Some((4.5, 5.5)));
    }
}
