use super::*;
use crate::embedder::params::MutatorsStack;
use crate::foundation::core::BezPath;
use crate::render::target::SoftwareBuffer;

fn params(x: f64, y: f64, w: f64, h: f64) -> EmbeddedViewParams {
    EmbeddedViewParams::new(Point::new(x, y), Size::new(w, h))
}

#[test]
fn platform_view_bounds_scale_by_device_pixel_ratio() {
    let mut b = LayerBuilder::new(PixelSize::new(200, 200), 2.0, Affine::IDENTITY);
    b.push_platform_view_layer(ViewId(3), &params(10.0, 20.0, 30.0, 15.0));
    let layers = b.finish();

    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].offset, Point::new(10.0, 20.0));
    assert_eq!(layers[0].size, Size::new(60.0, 30.0));
    let LayerContent::PlatformView(pv) = &layers[0].content else {
        panic!("expected a platform view layer");
    };
    assert_eq!(pv.identifier, ViewId(3));
    assert!(pv.mutations.is_empty());
}

#[test]
fn trivial_mutations_are_dropped_and_path_clips_skipped() {
    let stack = MutatorsStack::new()
        .with(Mutator::Transform(Affine::IDENTITY))
        .with(Mutator::Opacity(1.0))
        .with(Mutator::ClipPath(BezPath::new()));
    let mut b = LayerBuilder::new(PixelSize::new(100, 100), 1.0, Affine::IDENTITY);
    b.push_platform_view_layer(ViewId(1), &params(0.0, 0.0, 10.0, 10.0).with_mutators(stack));
    let layers = b.finish();

    let LayerContent::PlatformView(pv) = &layers[0].content else {
        panic!("expected a platform view layer");
    };
    assert!(pv.mutations.is_empty());
}

#[test]
fn mutations_are_reversed_and_root_transform_comes_first() {
    let clip = Rect::new(0.0, 0.0, 5.0, 5.0);
    let stack = MutatorsStack::new()
        .with(Mutator::ClipRect(clip))
        .with(Mutator::Opacity(0.5));
    let root = Affine::translate((0.0, 10.0));

    let mut b = LayerBuilder::new(PixelSize::new(100, 100), 1.0, root);
    b.push_platform_view_layer(ViewId(1), &params(1.0, 2.0, 10.0, 10.0).with_mutators(stack));
    let layers = b.finish();

    let LayerContent::PlatformView(pv) = &layers[0].content else {
        panic!("expected a platform view layer");
    };
    assert_eq!(
        pv.mutations,
        vec![
            PlatformViewMutation::Transformation(root),
            PlatformViewMutation::Opacity(0.5),
            PlatformViewMutation::ClipRect(clip),
        ]
    );
    assert_eq!(layers[0].offset, Point::new(1.0, 12.0));
}

#[test]
fn backing_store_layers_cover_the_frame_and_overlays_their_view() {
    let background = BackingStore::Software(SoftwareBuffer::new(PixelSize::new(50, 40)).unwrap());
    let overlay = BackingStore::Software(SoftwareBuffer::new(PixelSize::new(8, 6)).unwrap());
    let p = params(4.0, 5.0, 4.0, 3.0);

    let mut b = LayerBuilder::new(PixelSize::new(50, 40), 2.0, Affine::IDENTITY);
    b.push_backing_store_layer(&background);
    b.push_platform_view_layer(ViewId(1), &p);
    b.push_overlay_layer(&overlay, &p);
    let layers = b.finish();

    assert_eq!(layers.len(), 3);
    assert_eq!(layers[0].bounds(), Rect::new(0.0, 0.0, 50.0, 40.0));
    assert!(matches!(layers[1].content, LayerContent::PlatformView(_)));
    assert_eq!(layers[2].bounds(), Rect::new(4.0, 5.0, 12.0, 11.0));
}

#[test]
fn stack_opacity_multiplies() {
    let stack = MutatorsStack::new()
        .with(Mutator::Opacity(0.5))
        .with(Mutator::ClipRect(Rect::ZERO))
        .with(Mutator::Opacity(0.5));
    assert!((stack.opacity() - 0.25).abs() < 1e-6);
    assert_eq!(MutatorsStack::new().opacity(), 1.0);
}

#[test]
fn zero_area_or_non_finite_views_are_rejected() {
    assert!(params(0.0, 0.0, 0.0, 10.0).pixel_size(1.0).is_err());
    assert!(params(f64::NAN, 0.0, 10.0, 10.0).pixel_size(1.0).is_err());
    assert_eq!(
        params(0.0, 0.0, 10.0, 10.0).pixel_size(1.5).unwrap(),
        PixelSize::new(15, 15)
    );
}
