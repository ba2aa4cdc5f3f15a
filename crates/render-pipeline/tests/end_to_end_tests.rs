//! Full pipeline runs with the default adapters and resolver against mock services.

use httpmock::prelude::*;
use parcel_common::RenderRequest;
use render_pipeline::{AppSettings, RenderPipeline};
use serde_json::json;
use test_utils::{temp_output_root, write_sources};

fn solid_png(width: usize, height: usize) -> Vec<u8> {
    let pixels: Vec<u8> = [200u8, 40, 40, 255].repeat(width * height);
    renderer::png::create_png(&pixels, width, height, 72).unwrap()
}

#[tokio::test]
async fn test_render_against_mocked_services() {
    let server = MockServer::start_async().await;

    let parcel_query = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/Parcels/FeatureServer/0/query")
                .query_param("where", "PIN='0712-33-4455'")
                .query_param("outSR", "4326");
            then.status(200).json_body(json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[-78.64, 35.78], [-78.64, 35.781], [-78.639, 35.781], [-78.639, 35.78], [-78.64, 35.78]]]
                    },
                    "properties": {"PIN": "0712-33-4455", "SITE_ADDR": "100 MAIN ST", "COUNTY": "Wake"}
                }]
            }));
        })
        .await;

    let zoning_query = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/Zoning/FeatureServer/2/query")
                .query_param("f", "geojson")
                .query_param("outFields", "ZONE_CLASS");
            then.status(200).json_body(json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[-78.65, 35.77], [-78.65, 35.79], [-78.63, 35.79], [-78.63, 35.77], [-78.65, 35.77]]]
                    },
                    "properties": {"ZONE_CLASS": "R-4"}
                }]
            }));
        })
        .await;

    let get_map = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/wms")
                .query_param("request", "GetMap")
                .query_param("crs", "EPSG:3857")
                .query_param("width", "400")
                .query_param("height", "300");
            then.status(200)
                .header("content-type", "image/png")
                .body(solid_png(400, 300));
        })
        .await;

    let yaml = format!(
        r#"
parcels:
  url: {parcels}
  id_field: PIN
  address_field: SITE_ADDR
map:
  width_px: 400
  height_px: 300
layers:
  zoning:
    type: arcgis_feature
    title: Zoning
    url: {zoning}
    out_fields: ZONE_CLASS
  aerial:
    type: wms
    target_epsg: 3857
    url: {wms}
    layers: orthos
"#,
        parcels = server.url("/Parcels/FeatureServer/0"),
        zoning = server.url("/Zoning/FeatureServer/2"),
        wms = server.url("/wms"),
    );

    let root = temp_output_root();
    let settings = AppSettings {
        config_path: write_sources(root.path(), &yaml),
        output_root: root.path().join("outputs"),
        ..AppSettings::default()
    };
    let pipeline = RenderPipeline::from_settings(settings).unwrap();

    let mut request = RenderRequest::for_apn("0712-33-4455", &["zoning", "aerial"]);
    request.output_dpi = 150;
    let response = pipeline.render(request).await.unwrap();

    parcel_query.assert_async().await;
    zoning_query.assert_async().await;
    get_map.assert_async().await;

    assert!(response.warnings.is_empty(), "{:?}", response.warnings);
    assert_eq!(response.parcel.address.as_deref(), Some("100 MAIN ST"));
    assert_eq!(response.parcel.county.as_deref(), Some("Wake"));
    assert_eq!(
        response.images.get("zoning"),
        Some("/outputs/0712-33-4455/zoning.png")
    );
    assert_eq!(
        response.images.get("aerial"),
        Some("/outputs/0712-33-4455/aerial.png")
    );
    assert!(root.path().join("outputs/0712-33-4455/aerial.png").is_file());
}
