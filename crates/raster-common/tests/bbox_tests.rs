//! Tests for BoundingBox window arithmetic.

use raster_common::bbox::{BboxParseError, BoundingBox};

// ============================================================================
// Constructor tests
// ============================================================================

#[test]
fn test_bbox_new() {
    let bbox = BoundingBox::new(-180.0, -90.0, 180.0, 90.0);
    assert_eq!(bbox.min_x, -180.0);
    assert_eq!(bbox.min_y, -90.0);
    assert_eq!(bbox.max_x, 180.0);
    assert_eq!(bbox.max_y, 90.0);
    assert!(bbox.is_valid());
}

#[test]
fn test_from_corners_normalizes() {
    let a = BoundingBox::from_corners(10.0, 0.0, 0.0, 10.0);
    let b = BoundingBox::from_corners(0.0, 10.0, 10.0, 0.0);
    assert_eq!(a, b);
    assert_eq!(a, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
}

#[test]
fn test_rect_and_center_forms_agree() {
    // A 100x50 pixel window at 2.0 map units per pixel.
    let rect = BoundingBox::from_corners(300.0, 150.0, 100.0, 50.0);
    let (cx, cy) = rect.center();
    let centered = BoundingBox::from_center(cx, cy, 100, 50, 2.0, 2.0);
    assert_eq!(centered, rect);
}

#[test]
fn test_degenerate_bbox_is_invalid() {
    assert!(!BoundingBox::new(0.0, 0.0, 0.0, 10.0).is_valid());
    assert!(!BoundingBox::new(5.0, 5.0, 1.0, 1.0).is_valid());
}

// ============================================================================
// Parsing tests
// ============================================================================

#[test]
fn test_parse_with_spaces() {
    let bbox = BoundingBox::parse(" 1.5, 2.5 ,3.5,4.5").unwrap();
    assert_eq!(bbox, BoundingBox::new(1.5, 2.5, 3.5, 4.5));
}

#[test]
fn test_parse_wrong_arity() {
    match BoundingBox::parse("1,2,3") {
        Err(BboxParseError::InvalidFormat(_)) => {}
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_parse_bad_number() {
    match BoundingBox::parse("1,2,x,4") {
        Err(BboxParseError::InvalidNumber(n)) => assert_eq!(n, "x"),
        other => panic!("unexpected result: {:?}", other),
    }
}

// ============================================================================
// Set operations
// ============================================================================

#[test]
fn test_union_covers_both() {
    let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
    let b = BoundingBox::new(2.0, -1.0, 3.0, 0.5);
    let u = a.union(&b);
    assert_eq!(u, BoundingBox::new(0.0, -1.0, 3.0, 1.0));
    assert!(u.contains_point(0.0, 1.0));
    assert!(u.contains_point(3.0, -1.0));
}

#[test]
fn test_no_intersection_when_disjoint() {
    let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
    let b = BoundingBox::new(5.0, 5.0, 6.0, 6.0);
    assert!(a.intersection(&b).is_none());
    assert!(!a.touches(&b));
}
