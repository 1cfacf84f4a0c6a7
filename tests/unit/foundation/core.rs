use super::*;

#[test]
fn logical_sizes_round_up_to_whole_pixels() {
    let px = PixelSize::from_logical(Size::new(10.2, 20.0), 2.0).unwrap();
    assert_eq!(px, PixelSize::new(21, 40));

    let px = PixelSize::from_logical(Size::new(32.0, 32.0), 1.5).unwrap();
    assert_eq!(px, PixelSize::new(48, 48));
}

#[test]
fn logical_sizes_reject_non_finite_and_negative() {
    assert!(PixelSize::from_logical(Size::new(f64::NAN, 1.0), 1.0).is_err());
    assert!(PixelSize::from_logical(Size::new(1.0, f64::INFINITY), 1.0).is_err());
    assert!(PixelSize::from_logical(Size::new(-4.0, 1.0), 1.0).is_err());
    assert!(PixelSize::from_logical(Size::new(1e12, 1.0), 1.0).is_err());
}

#[test]
fn empty_and_area() {
    assert!(PixelSize::new(0, 10).is_empty());
    assert!(PixelSize::new(10, 0).is_empty());
    assert!(!PixelSize::new(1, 1).is_empty());
    assert_eq!(PixelSize::new(64, 32).area(), 2048);
    assert_eq!(PixelSize::new(3, 4).to_string(), "3x4");
}

#[test]
fn pixel_format_deserializes_snake_case() {
    let f: PixelFormat = serde_json::from_str("\"bgra8_premul\"").unwrap();
    assert_eq!(f, PixelFormat::Bgra8Premul);
    assert_eq!(f.bytes_per_pixel(), 4);
    assert_eq!(PixelFormat::default(), PixelFormat::Rgba8Premul);
}
