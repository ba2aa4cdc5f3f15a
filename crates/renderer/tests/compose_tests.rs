//! End-to-end composition checks on decoded output files.

use image::RgbaImage;
use parcel_common::{CrsCode, Feature, FeatureCollection, Geometry, StyleMap};
use projection::{buffered_extent, Extent};
use renderer::{compose_placeholder, compose_raster, compose_vector, FigureSpec};
use serde_json::json;

fn parcel() -> Geometry {
    Geometry::polygon(vec![[0.0, 0.0], [0.0, 100.0], [100.0, 100.0], [100.0, 0.0], [0.0, 0.0]])
}

fn extent() -> Extent {
    buffered_extent(&parcel(), CrsCode(2264), CrsCode(2264), 50.0)
        .unwrap()
        .1
}

fn style(value: serde_json::Value) -> StyleMap {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_raster_fills_the_extent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aerial.png");
    let red = RgbaImage::from_pixel(8, 8, image::Rgba([255, 0, 0, 255]));

    // Square figure, square extent: the raster covers the whole map area.
    compose_raster(
        &path,
        &FigureSpec::new(200, 200, 100),
        &extent(),
        &parcel(),
        &red,
        &style(json!({"parcel_fill_alpha": 0.0})),
    )
    .unwrap();

    let img = image::open(&path).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (200, 200));
    // Between the extent edge and the parcel outline.
    let px = img.get_pixel(20, 20);
    assert!(px[0] > 200 && px[1] < 60 && px[2] < 60, "pixel {:?}", px);
    // Page padding stays white.
    assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);
}

#[test]
fn test_raster_opacity_blends_with_page() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aerial.png");
    let black = RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 0, 255]));

    compose_raster(
        &path,
        &FigureSpec::new(200, 200, 100),
        &extent(),
        &parcel(),
        &black,
        &style(json!({"opacity": 0.5, "parcel_fill_alpha": 0.0})),
    )
    .unwrap();

    let px = image::open(&path).unwrap().to_rgba8().get_pixel(20, 20).0;
    assert!(px[0] > 100 && px[0] < 155, "pixel {:?}", px);
}

#[test]
fn test_vector_features_are_drawn_under_parcel() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zoning.png");
    let features = FeatureCollection::new(vec![
        Feature::new(Geometry::polygon(vec![
            [-50.0, -50.0],
            [-50.0, 150.0],
            [150.0, 150.0],
            [150.0, -50.0],
            [-50.0, -50.0],
        ])),
        Feature {
            id: None,
            geometry: None,
            properties: None,
        },
    ]);

    compose_vector(
        &path,
        &FigureSpec::new(200, 200, 100),
        &extent(),
        &parcel(),
        &features,
        &style(json!({"fill_color": "#000000", "fill_alpha": 1.0})),
    )
    .unwrap();

    let img = image::open(&path).unwrap().to_rgba8();
    let px = img.get_pixel(20, 20).0;
    assert!(px[0] < 40 && px[1] < 40 && px[2] < 40, "pixel {:?}", px);
}

#[test]
fn test_placeholder_draws_message() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flood.png");

    compose_placeholder(
        &path,
        &FigureSpec::new(400, 300, 96).with_title("123 - flood"),
        "Layer 'flood' failed: Unknown layer type 'tiles'.",
    )
    .unwrap();

    let img = image::open(&path).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (400, 300));
    assert!(img.pixels().any(|p| p[0] < 128));
}

#[test]
fn test_placeholder_keeps_case_and_accents() {
    let dir = tempfile::tempdir().unwrap();
    let lower = dir.path().join("lower.png");
    let upper = dir.path().join("upper.png");
    let figure = FigureSpec::new(300, 120, 96);

    compose_placeholder(&lower, &figure, "Peñasco").unwrap();
    compose_placeholder(&upper, &figure, "PEÑASCO").unwrap();

    let lower = image::open(&lower).unwrap().to_rgba8();
    let upper = image::open(&upper).unwrap().to_rgba8();
    let band_ink = |img: &image::RgbaImage| {
        (40..80)
            .flat_map(|y| (0..300).map(move |x| (x, y)))
            .filter(|&(x, y)| img.get_pixel(x, y)[0] < 128)
            .count()
    };
    assert!(band_ink(&lower) > 0);
    assert!(band_ink(&upper) > 0);
    assert_ne!(lower, upper);
}

#[test]
fn test_unusable_figure_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.png");
    assert!(compose_placeholder(&path, &FigureSpec::new(0, 10, 96), "x").is_err());
    assert!(!path.exists());
}
