//! All pyramids of one coverage resource.

use std::collections::BTreeMap;

use coverage_common::{CrsTransform, Envelope, ReferenceSystem};

use crate::error::{CoverageError, Result};
use crate::model::pyramid::Pyramid;
use crate::selection::{same_slice, slice_in_ranges};

/// Pyramids keyed by id, all sharing one reference system.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidSet {
    reference_system: ReferenceSystem,
    pyramids: BTreeMap<String, Pyramid>,
}

impl PyramidSet {
    pub fn new(reference_system: ReferenceSystem) -> Self {
        Self {
            reference_system,
            pyramids: BTreeMap::new(),
        }
    }

    pub fn reference_system(&self) -> &ReferenceSystem {
        &self.reference_system
    }

    pub fn len(&self) -> usize {
        self.pyramids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pyramids.is_empty()
    }

    /// Pyramids in id order.
    pub fn pyramids(&self) -> impl Iterator<Item = &Pyramid> {
        self.pyramids.values()
    }

    pub fn get(&self, id: &str) -> Option<&Pyramid> {
        self.pyramids.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Pyramid> {
        self.pyramids.get_mut(id)
    }

    /// Add a pyramid. Its reference system must match the set's and its
    /// id must be new.
    pub fn insert(&mut self, pyramid: Pyramid) -> Result<()> {
        if !pyramid.reference_system.is_equivalent(&self.reference_system) {
            return Err(CoverageError::incompatible_crs(format!(
                "pyramid {} uses {} but the resource uses {}",
                pyramid.id, pyramid.reference_system, self.reference_system
            )));
        }
        if self.pyramids.contains_key(&pyramid.id) {
            return Err(CoverageError::DuplicatePyramid(format!(
                "id {} is already in use",
                pyramid.id
            )));
        }
        self.pyramids.insert(pyramid.id.clone(), pyramid);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Pyramid> {
        self.pyramids.remove(id)
    }

    /// First pyramid (by id) sitting at `slice`.
    pub fn pyramid_at(&self, slice: &[f64], tolerance: f64) -> Option<&Pyramid> {
        self.pyramids
            .values()
            .find(|p| same_slice(&p.slice, slice, tolerance))
    }

    /// Union of every mosaic extent of every pyramid.
    ///
    /// Coarse mosaics reaching past the fine ones widen the result. On
    /// extra axes the result spans the lowest to highest slice holding at
    /// least one mosaic. `None` when there are no mosaics at all.
    pub fn envelope(&self) -> Option<Envelope> {
        let mut envelopes = self.pyramids.values().filter_map(Pyramid::envelope);
        let mut envelope = envelopes.next()?;
        for other in envelopes {
            // Pyramids share the set's dimension, see `insert`.
            if envelope.expand_to_include(&other).is_err() {
                return None;
            }
        }
        Some(envelope)
    }

    /// Pyramids serving a request in `crs`, ordered by slice ascending
    /// (then id).
    ///
    /// A pyramid qualifies when its horizontal CRS equals the request's or
    /// `transform` can reproject into it, its extra axes match, and, when
    /// `slice_ranges` is given, every slice value lies inside its range
    /// widened by `tolerance`.
    pub fn pyramids_matching(
        &self,
        crs: &ReferenceSystem,
        transform: &dyn CrsTransform,
        slice_ranges: Option<&[(f64, f64)]>,
        tolerance: f64,
    ) -> Vec<&Pyramid> {
        let mut matching: Vec<&Pyramid> = self
            .pyramids
            .values()
            .filter(|p| {
                let horizontal = &p.reference_system.horizontal;
                horizontal == &crs.horizontal || transform.can_transform(&crs.horizontal, horizontal)
            })
            .filter(|p| p.reference_system.same_extra_axes(crs))
            .filter(|p| slice_ranges.map_or(true, |ranges| slice_in_ranges(&p.slice, ranges, tolerance)))
            .collect();

        matching.sort_by(|a, b| {
            a.slice
                .iter()
                .zip(b.slice.iter())
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matching
    }
}
