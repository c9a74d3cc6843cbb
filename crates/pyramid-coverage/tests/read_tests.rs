//! End-to-end reads over the two-mosaic reference dataset.

mod common;

use std::sync::Arc;

use common::*;
use coverage_common::{CrsCode, DimensionAxis, Envelope, ReferenceSystem, WebMercatorTransform};
use pyramid_coverage::{CoverageError, ReadRequest};
use test_utils::{assert_extent_approx_eq, bbox as extents, slices, tile_pattern_value, EXPECTED_ENVELOPE};
use tile_storage::MemoryTileStore;

fn full_request() -> ReadRequest {
    ReadRequest::horizontal(bbox(EXPECTED_ENVELOPE), CrsCode::Epsg4326)
}

fn fine_value(col: usize, row: usize) -> f32 {
    (col * 1000 + row) as f32
}

// =============================================================================
// Single slice
// =============================================================================

#[tokio::test]
async fn test_envelope_of_reference_dataset() {
    let (_, resource) = memory_resource().await;
    assert!(resource.reader().envelope().await.is_none());

    build_reference_pyramid(&resource.writer(), slices::LOWER, 0.0, &[]).await;

    let envelope = resource.reader().envelope().await.expect("envelope");
    let h = envelope.horizontal();
    let (e0, e1, e2, e3) = EXPECTED_ENVELOPE;
    assert_extent_approx_eq!((h.min_x, h.min_y, h.max_x, h.max_y), (e0, e1, e2, e3), 1e-9);
    assert_eq!(envelope.extra_range(0), Some((slices::LOWER, slices::LOWER)));
}

#[tokio::test]
async fn test_default_read_uses_finest_mosaic() {
    let (_, resource) = memory_resource().await;
    let ids = build_reference_pyramid(&resource.writer(), slices::LOWER, 0.0, &[]).await;

    let stack = resource.reader().read(&full_request()).await.expect("read");
    assert_eq!(stack.len(), 1);

    let coverage = stack.coverages().next().expect("coverage");
    assert_eq!(coverage.mosaic_id, ids.fine_id);
    assert_eq!((coverage.width(), coverage.height()), (40, 30));
    assert_eq!(coverage.missing_tiles, 0);
    assert_eq!(coverage.slice(), &[slices::LOWER]);

    for (x, y) in [(0, 0), (9, 9), (10, 0), (39, 29), (23, 17)] {
        assert_eq!(coverage.raster.get(x, y, 0), Some(fine_value(x, y)), "pixel ({}, {})", x, y);
    }

    let h = coverage.envelope.horizontal();
    assert_extent_approx_eq!((h.min_x, h.min_y, h.max_x, h.max_y), (-180.0, 75.0, -160.0, 90.0), 1e-9);
}

#[tokio::test]
async fn test_resolution_selects_mosaic() {
    let (_, resource) = memory_resource().await;
    let ids = build_reference_pyramid(&resource.writer(), slices::LOWER, 0.0, &[]).await;
    let reader = resource.reader();

    let stack = reader.read(&full_request().with_resolution(1.0, 1.0)).await.unwrap();
    let coverage = stack.coverages().next().unwrap();
    assert_eq!(coverage.mosaic_id, ids.coarse_id);
    assert_eq!((coverage.width(), coverage.height()), (20, 20));
    assert_eq!(coverage.raster.get(3, 4, 0), Some(fine_value(3, 4) + COARSE_OFFSET));

    // Coarsest mosaic that is still at least as fine as requested.
    let cases = [
        ((0.75, 0.75), &ids.fine_id),
        ((5.0, 5.0), &ids.coarse_id),
        ((1.0, 0.6), &ids.fine_id),
        // Nothing fine enough: fall back to the finest.
        ((0.1, 0.1), &ids.fine_id),
    ];
    for ((rx, ry), expected) in cases {
        let stack = reader.read(&full_request().with_resolution(rx, ry)).await.unwrap();
        assert_eq!(&stack.coverages().next().unwrap().mosaic_id, expected, "res ({}, {})", rx, ry);
    }
}

#[tokio::test]
async fn test_partial_read_fetches_covering_tiles() {
    let (_, resource) = memory_resource().await;
    build_reference_pyramid(&resource.writer(), slices::LOWER, 0.0, &[]).await;

    let request = ReadRequest::horizontal(bbox(extents::INSIDE), CrsCode::Epsg4326);
    let stack = resource.reader().read(&request).await.unwrap();
    let coverage = stack.coverages().next().unwrap();

    assert_eq!((coverage.tile_range.columns(), coverage.tile_range.rows()), (2, 2));
    assert_eq!((coverage.width(), coverage.height()), (20, 20));
    assert_eq!(coverage.raster.get(15, 12, 0), Some(fine_value(15, 12)));

    let h = coverage.envelope.horizontal();
    assert_extent_approx_eq!((h.min_x, h.min_y, h.max_x, h.max_y), (-180.0, 80.0, -170.0, 90.0), 1e-9);
}

#[tokio::test]
async fn test_covering_request_is_clipped() {
    let (_, resource) = memory_resource().await;
    build_reference_pyramid(&resource.writer(), slices::LOWER, 0.0, &[]).await;

    let request = ReadRequest::horizontal(bbox(extents::COVERING), CrsCode::Epsg4326);
    let stack = resource.reader().read(&request).await.unwrap();
    let coverage = stack.coverages().next().unwrap();
    assert_eq!((coverage.width(), coverage.height()), (40, 30));
}

#[tokio::test]
async fn test_nan_bounds_are_replaced_by_domain() {
    let (_, resource) = memory_resource().await;
    build_reference_pyramid(&resource.writer(), slices::LOWER, 0.0, &[]).await;

    let request = ReadRequest::horizontal(
        bbox((f64::NAN, 81.0, -172.0, f64::NAN)),
        CrsCode::Epsg4326,
    );
    let stack = resource.reader().read(&request).await.unwrap();
    let coverage = stack.coverages().next().unwrap();
    assert_eq!(coverage.tile_range.col_min, 0);
    assert_eq!(coverage.tile_range.row_min, 0);
    assert_eq!((coverage.width(), coverage.height()), (20, 20));
}

#[tokio::test]
async fn test_missing_tiles_use_background() {
    let (_, resource) = memory_resource().await;
    build_reference_pyramid(&resource.writer(), slices::LOWER, 0.0, &[(1, 1)]).await;
    let reader = resource.reader();

    let stack = reader.read(&full_request()).await.unwrap();
    let coverage = stack.coverages().next().unwrap();
    assert_eq!(coverage.missing_tiles, 1);
    assert!(coverage.raster.get(15, 15, 0).unwrap().is_nan());
    assert_eq!(coverage.raster.get(5, 5, 0), Some(fine_value(5, 5)));

    let stack = reader
        .read(&full_request().with_background(-9999.0))
        .await
        .unwrap();
    let coverage = stack.coverages().next().unwrap();
    assert_eq!(coverage.raster.get(15, 15, 0), Some(-9999.0));
}

// =============================================================================
// Multiple slices
// =============================================================================

#[tokio::test]
async fn test_stack_holds_one_coverage_per_slice() {
    let (_, resource) = memory_resource().await;
    let writer = resource.writer();
    // Created out of order; the stack is ordered by slice.
    let upper = build_reference_pyramid(&writer, slices::UPPER, UPPER_OFFSET, &[]).await;
    let lower = build_reference_pyramid(&writer, slices::LOWER, 0.0, &[]).await;

    let envelope = resource.reader().envelope().await.unwrap();
    assert_eq!(envelope.extra_range(0), Some((slices::LOWER, slices::UPPER)));

    let stack = resource.reader().read(&full_request()).await.unwrap();
    assert_eq!(stack.len(), 2);
    let order: Vec<f64> = stack.entries().iter().map(|e| e.slice[0]).collect();
    assert_eq!(order, slices::ALL.to_vec());

    let at_lower = stack.coverages_at(slices::LOWER);
    assert_eq!(at_lower.len(), 1);
    assert_eq!(at_lower[0].pyramid_id, lower.pyramid_id);
    assert_eq!(at_lower[0].mosaic_id, lower.fine_id);
    assert_eq!(at_lower[0].raster.get(7, 3, 0), Some(fine_value(7, 3)));

    let at_upper = stack.coverages_at(slices::UPPER);
    assert_eq!(at_upper.len(), 1);
    assert_eq!(at_upper[0].pyramid_id, upper.pyramid_id);
    assert_eq!(at_upper[0].mosaic_id, upper.fine_id);
    assert_eq!(at_upper[0].raster.get(7, 3, 0), Some(fine_value(7, 3) + UPPER_OFFSET));

    // Nearest slice wins.
    assert_eq!(stack.coverages_at(40.0)[0].pyramid_id, upper.pyramid_id);
}

#[tokio::test]
async fn test_elevation_range_selects_slices() {
    let (_, resource) = memory_resource().await;
    let writer = resource.writer();
    build_reference_pyramid(&writer, slices::UPPER, UPPER_OFFSET, &[]).await;
    let lower = build_reference_pyramid(&writer, slices::LOWER, 0.0, &[]).await;

    let envelope = Envelope::new(vec![-180.0, 70.0, -20.0], vec![-160.0, 90.0, 0.0]).unwrap();
    let request = ReadRequest::new(envelope, wgs84_elevation());
    let stack = resource.reader().read(&request).await.unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(stack.entries()[0].pyramid_id, lower.pyramid_id);

    // A point range selects exactly that slice.
    let envelope = Envelope::new(
        vec![-180.0, 70.0, slices::UPPER],
        vec![-160.0, 90.0, slices::UPPER],
    )
    .unwrap();
    let stack = resource
        .reader()
        .read(&ReadRequest::new(envelope, wgs84_elevation()))
        .await
        .unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(stack.entries()[0].slice, vec![slices::UPPER]);
}

#[tokio::test]
async fn test_slice_within_tolerance_of_domain_edge() {
    let (_, resource) = memory_resource().await;
    let writer = resource.writer();
    let lower = build_reference_pyramid(&writer, slices::LOWER, 0.0, &[]).await;
    let upper = build_reference_pyramid(&writer, slices::UPPER, UPPER_OFFSET, &[]).await;
    let half_tolerance = resource.config().slice_tolerance / 2.0;

    let point_read = |elevation: f64| {
        let envelope = Envelope::new(vec![-180.0, 70.0, elevation], vec![-160.0, 90.0, elevation]).unwrap();
        ReadRequest::new(envelope, wgs84_elevation())
    };

    // Just above the topmost slice and just below the lowest one.
    let stack = resource.reader().read(&point_read(slices::UPPER + half_tolerance)).await.unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(stack.entries()[0].pyramid_id, upper.pyramid_id);

    let stack = resource.reader().read(&point_read(slices::LOWER - half_tolerance)).await.unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(stack.entries()[0].pyramid_id, lower.pyramid_id);

    // Beyond tolerance is still outside the dataset.
    assert!(matches!(
        resource.reader().read(&point_read(slices::UPPER + 1.0)).await.unwrap_err(),
        CoverageError::DisjointDomain(_)
    ));
}

// =============================================================================
// Bands
// =============================================================================

#[tokio::test]
async fn test_band_selection_and_per_slice_failure() {
    let (_, resource) = memory_resource().await;
    let writer = resource.writer();
    let pyramid = writer.create_pyramid(&wgs84_elevation(), &[0.0]).await.unwrap();
    let mosaic = writer
        .create_mosaic(&pyramid, (1, 1), (4, 4), &[0.0, 4.0], (1.0, 1.0))
        .await
        .unwrap();
    let tile = pyramid_coverage::RasterBuffer::new(4, 4, 3, test_utils::create_multiband_grid(4, 4, 3)).unwrap();
    writer.write_raster(&pyramid, &mosaic, 0, 0, &tile).await.unwrap();

    let request = ReadRequest::horizontal(bbox((0.0, 0.0, 4.0, 4.0)), CrsCode::Epsg4326);
    let stack = resource
        .reader()
        .read(&request.clone().with_bands(vec![2, 0]))
        .await
        .unwrap();
    let coverage = stack.coverages().next().unwrap();
    assert_eq!(coverage.raster.bands(), 2);
    assert_eq!(
        coverage.raster.pixel(1, 2),
        Some(&[test_utils::multiband_value(1, 2, 2), test_utils::multiband_value(1, 2, 0)][..])
    );

    let stack = resource
        .reader()
        .read(&request.with_bands(vec![5]))
        .await
        .expect("slice errors stay in the stack");
    assert_eq!(stack.coverages().count(), 0);
    let (entry, err) = stack.failures().next().unwrap();
    assert_eq!(entry.pyramid_id, pyramid);
    assert!(matches!(err, CoverageError::InvalidBands(_)));
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_request_errors() {
    let (_, resource) = memory_resource().await;
    let reader = resource.reader();

    let err = reader.read(&full_request()).await.unwrap_err();
    assert!(matches!(err, CoverageError::DisjointDomain(_)), "empty dataset: {err}");

    build_reference_pyramid(&resource.writer(), slices::LOWER, 0.0, &[]).await;

    let inverted = ReadRequest::horizontal(bbox(extents::INVERTED), CrsCode::Epsg4326);
    assert!(matches!(
        reader.read(&inverted).await.unwrap_err(),
        CoverageError::InvalidEnvelope(_)
    ));

    let disjoint = ReadRequest::horizontal(bbox(extents::DISJOINT), CrsCode::Epsg4326);
    assert!(matches!(
        reader.read(&disjoint).await.unwrap_err(),
        CoverageError::DisjointDomain(_)
    ));

    let utm = CrsCode::parse(test_utils::crs::UNKNOWN).unwrap();
    let foreign = ReadRequest::horizontal(bbox(EXPECTED_ENVELOPE), utm);
    assert!(matches!(
        reader.read(&foreign).await.unwrap_err(),
        CoverageError::IncompatibleReferenceSystem(_)
    ));

    let timed = ReferenceSystem::horizontal(CrsCode::Epsg4326).with_axis(DimensionAxis::time());
    let envelope = Envelope::new(vec![-180.0, 70.0, 0.0], vec![-160.0, 90.0, 1.0]).unwrap();
    assert!(matches!(
        reader.read(&ReadRequest::new(envelope.clone(), timed)).await.unwrap_err(),
        CoverageError::IncompatibleReferenceSystem(_)
    ));

    // Three bounds for a two-dimensional CRS.
    let flat = ReferenceSystem::horizontal(CrsCode::Epsg4326);
    assert!(matches!(
        reader.read(&ReadRequest::new(envelope, flat)).await.unwrap_err(),
        CoverageError::InvalidEnvelope(_)
    ));

    // Outside the slices but inside the horizontal domain.
    let envelope = Envelope::new(vec![-180.0, 70.0, 100.0], vec![-160.0, 90.0, 200.0]).unwrap();
    assert!(matches!(
        reader.read(&ReadRequest::new(envelope, wgs84_elevation())).await.unwrap_err(),
        CoverageError::DisjointDomain(_)
    ));
}

// =============================================================================
// Point reads
// =============================================================================

#[tokio::test]
async fn test_read_point() {
    let (_, resource) = memory_resource().await;
    let writer = resource.writer();
    build_reference_pyramid(&writer, slices::LOWER, 0.0, &[(0, 0)]).await;
    build_reference_pyramid(&writer, slices::UPPER, UPPER_OFFSET, &[]).await;
    let reader = resource.reader();

    // Fine pixel (5, 2) of tile (0, 0).
    let (x, y) = (-177.25, 88.75);
    let value = reader.read_point(x, y, Some(&[slices::UPPER])).await.unwrap();
    assert_eq!(value, Some(vec![tile_pattern_value(0, 0, 10, 10, 5, 2, UPPER_OFFSET)]));

    // That tile is absent in the lower slice.
    assert_eq!(reader.read_point(x, y, Some(&[slices::LOWER])).await.unwrap(), None);

    assert_eq!(
        reader.read_point(-165.0, 80.0, Some(&[slices::LOWER])).await.unwrap(),
        Some(vec![fine_value(30, 20)])
    );
    assert_eq!(reader.read_point(0.0, 0.0, None).await.unwrap(), None);
    assert!(matches!(
        reader.read_point(f64::NAN, 0.0, None).await.unwrap_err(),
        CoverageError::InvalidEnvelope(_)
    ));
}

// =============================================================================
// Reprojection
// =============================================================================

#[tokio::test]
async fn test_web_mercator_request() {
    let resource = open_resource(
        Arc::new(MemoryTileStore::new()),
        Arc::new(WebMercatorTransform),
    )
    .await;
    build_reference_pyramid(&resource.writer(), slices::LOWER, 0.0, &[]).await;

    let (min_x, min_y) = WebMercatorTransform::forward(-178.0, 81.0);
    let (max_x, max_y) = WebMercatorTransform::forward(-172.0, 88.0);
    let request = ReadRequest::horizontal(bbox((min_x, min_y, max_x, max_y)), CrsCode::Epsg3857);

    let stack = resource.reader().read(&request).await.unwrap();
    let coverage = stack.coverages().next().unwrap();
    assert_eq!((coverage.tile_range.columns(), coverage.tile_range.rows()), (2, 2));
    assert_eq!(coverage.raster.get(12, 3, 0), Some(fine_value(12, 3)));

    // NAD83 is close enough to WGS84 to be read directly.
    let nad83 = CrsCode::parse(test_utils::crs::NAD83).unwrap();
    let request = ReadRequest::horizontal(bbox(extents::INSIDE), nad83);
    assert_eq!(resource.reader().read(&request).await.unwrap().len(), 1);
}
