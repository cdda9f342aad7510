use super::*;

/// 1x3x4 volume: label 5 on the top row, label 2 as an L in the lower rows.
fn sample() -> (Buffer3<f32>, Buffer3<u32>) {
    #[rustfmt::skip]
    let labels = Buffer3::new([1, 3, 4], vec![
        5, 5, 0, 0,
        0, 2, 0, 0,
        0, 2, 2, 2,
    ]);
    #[rustfmt::skip]
    let channel = Buffer3::new([1, 3, 4], vec![
        1.0, 3.0, 9.0, 9.0,
        9.0, 4.0, 9.0, 9.0,
        9.0, 2.0, 2.0, 8.0,
    ]);
    (channel, labels)
}

fn assert_close(actual: DVec3, expected: [f64; 3]) {
    let expected = DVec3::from_array(expected);
    assert!(
        actual.abs_diff_eq(expected, 1e-12),
        "{actual:?} != {expected:?}"
    );
}

#[test]
fn test_region_properties_in_ascending_label_order() {
    let (channel, labels) = sample();
    let props = region_properties(&channel, &labels).unwrap();
    assert_eq!(props.len(), 2);
    assert_eq!(props[0].label, 2);
    assert_eq!(props[1].label, 5);
}

#[test]
fn test_region_measurements() {
    let (channel, labels) = sample();
    let props = region_properties(&channel, &labels).unwrap();

    let l_shape = &props[0];
    assert_eq!(l_shape.area, 4);
    // Voxels (y, x): (1,1) (2,1) (2,2) (2,3)
    assert_close(l_shape.centroid, [0.0, 7.0 / 4.0, 7.0 / 4.0]);
    // Weights 4, 2, 2, 8 (sum 16)
    let wy = (1.0 * 4.0 + 2.0 * 2.0 + 2.0 * 2.0 + 2.0 * 8.0) / 16.0;
    let wx = (1.0 * 4.0 + 1.0 * 2.0 + 2.0 * 2.0 + 3.0 * 8.0) / 16.0;
    assert_close(l_shape.weighted_centroid, [0.0, wy, wx]);
    assert_eq!(l_shape.max_intensity, 8.0);
    assert_eq!(l_shape.min_intensity, 2.0);
    assert_eq!(l_shape.mean_intensity, 4.0);

    let top = &props[1];
    assert_eq!(top.area, 2);
    assert_close(top.centroid, [0.0, 0.0, 0.5]);
    assert_close(top.weighted_centroid, [0.0, 0.0, 0.75]);
    assert_eq!(top.mean_intensity, 2.0);
}

#[test]
fn test_shape_mismatch_is_reported() {
    let channel = Buffer3::new_filled([2, 3, 4], 0.0f32);
    let labels = Buffer3::new_filled([2, 3, 5], 0u32);
    let err = region_properties(&channel, &labels).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));

    let err = extract_channel_spots(&channel, &labels, &KeepAllRegions, None).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
}

#[test]
fn test_zero_mass_region_falls_back_to_centroid() {
    let labels = Buffer3::new([1, 1, 3], vec![0, 1, 1]);
    let channel = Buffer3::new([1, 1, 3], vec![5.0f32, 0.0, 0.0]);
    let props = region_properties(&channel, &labels).unwrap();
    assert_close(props[0].weighted_centroid, [0.0, 0.0, 1.5]);
}

#[test]
fn test_regions_spanning_planes() {
    let mut labels = Buffer3::new_filled([3, 2, 2], 0u32);
    labels[(0, 1, 1)] = 1;
    labels[(2, 1, 1)] = 1;
    let mut channel = Buffer3::new_filled([3, 2, 2], 0.0f32);
    channel[(0, 1, 1)] = 1.0;
    channel[(2, 1, 1)] = 3.0;
    let props = region_properties(&channel, &labels).unwrap();
    assert_eq!(props.len(), 1);
    assert_close(props[0].centroid, [1.0, 1.0, 1.0]);
    assert_close(props[0].weighted_centroid, [1.5, 1.0, 1.0]);
}

#[test]
fn test_center_cross_removes_largest_and_keeps_order() {
    let mut labels = Buffer3::new_filled([1, 1, 12], 0u32);
    // Label 1: 2 voxels, label 2: 4 voxels (largest), label 3: 1 voxel
    for x in [0, 1] {
        labels[(0, 0, x)] = 1;
    }
    for x in 3..7 {
        labels[(0, 0, x)] = 2;
    }
    labels[(0, 0, 9)] = 3;
    let channel = Buffer3::new_filled([1, 1, 12], 1.0f32);

    let all = extract_channel_spots(&channel, &labels, &KeepAllRegions, None).unwrap();
    let filtered = extract_channel_spots(&channel, &labels, &CenterCrossFilter, None).unwrap();

    assert_eq!(all.len(), 3);
    assert_eq!(filtered.len(), all.len() - 1);
    assert_eq!(filtered.positions.len(), filtered.properties.len());
    let kept: Vec<u32> = filtered.properties.iter().map(|p| p.label).collect();
    assert_eq!(kept, vec![1, 3]);
    assert_close(filtered.positions[0], [0.0, 0.0, 0.5]);
    assert_close(filtered.positions[1], [0.0, 0.0, 9.0]);
}

#[test]
fn test_pixel_size_scales_positions() {
    let (channel, labels) = sample();
    let spots =
        extract_channel_spots(&channel, &labels, &KeepAllRegions, Some(DVec3::new(0.5, 0.2, 0.1))).unwrap();
    for (p, pos) in spots.properties.iter().zip(&spots.positions) {
        let c = p.weighted_centroid;
        assert_close(*pos, [c.x * 0.5, c.y * 0.2, c.z * 0.1]);
    }
    // Properties stay in voxel units.
    assert_close(spots.properties[1].centroid, [0.0, 0.0, 0.5]);
}

#[test]
fn test_invalid_pixel_size_is_rejected() {
    let (channel, labels) = sample();
    let err =
        extract_channel_spots(&channel, &labels, &KeepAllRegions, Some(DVec3::new(1.0, -1.0, 1.0))).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn test_no_regions_with_center_cross() {
    let channel = Buffer3::new_filled([2, 4, 4], 3.0f32);
    let labels = Buffer3::new_filled([2, 4, 4], 0u32);
    let spots = extract_channel_spots(&channel, &labels, &CenterCrossFilter, None).unwrap();
    assert!(spots.is_empty());
    assert!(spots.positions.is_empty());
}

/// Selects a region past the end of the list alongside a valid one.
struct OverreachingFilter;

impl ArtifactFilter for OverreachingFilter {
    fn artifacts(&self, properties: &[SpotProperty]) -> Vec<usize> {
        vec![properties.len() + 3, 0]
    }

    fn name(&self) -> &'static str {
        "overreaching"
    }
}

#[test]
fn test_out_of_range_artifact_indices_are_ignored() {
    let (channel, labels) = sample();
    let spots = extract_channel_spots(&channel, &labels, &OverreachingFilter, None).unwrap();
    let kept: Vec<u32> = spots.properties.iter().map(|p| p.label).collect();
    assert_eq!(kept, vec![5]);
    assert_eq!(spots.positions.len(), 1);
}
