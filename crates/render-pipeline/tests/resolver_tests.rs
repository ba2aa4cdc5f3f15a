//! Parcel resolver backends against mock HTTP services.

use httpmock::prelude::*;
use parcel_common::{CrsCode, Geometry, ParcelVizError};
use render_pipeline::{GeocodeService, LightBoxClient, ParcelResolver, ParcelService};
use serde_json::json;

fn square() -> serde_json::Value {
    json!({
        "type": "Polygon",
        "coordinates": [[[-78.64, 35.78], [-78.64, 35.781], [-78.639, 35.781], [-78.639, 35.78], [-78.64, 35.78]]]
    })
}

fn parcel_service(server: &MockServer) -> ParcelService {
    ParcelService::new(
        &server.url("/arcgis/rest/services/Parcels/FeatureServer/0"),
        "PIN",
        Some("SITE_ADDR".to_string()),
        Some("parcel-token".to_string()),
        CrsCode::WGS84,
    )
    .unwrap()
}

#[tokio::test]
async fn test_lightbox_address_lookup() {
    let server = MockServer::start_async().await;
    let geocode = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/geocode")
                .header("authorization", "Bearer lb-key")
                .json_body(json!({"address": "100 Main St", "limit": 1}));
            then.status(200)
                .json_body(json!({"results": [{"parcelId": "LB-77"}, {"parcelId": "LB-78"}]}));
        })
        .await;
    let detail = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/parcels/LB-77")
                .header("authorization", "Bearer lb-key");
            then.status(200).json_body(json!({
                "apn": "0712-33-4455",
                "siteAddress": "100 MAIN ST",
                "county": "Wake",
                "geometry": square(),
            }));
        })
        .await;

    let client = LightBoxClient::new("lb-key", &server.base_url()).unwrap();
    let record = client.address_to_parcel("100 Main St").await.unwrap();

    geocode.assert_async().await;
    detail.assert_async().await;
    assert_eq!(record.apn(), "0712-33-4455");
    assert_eq!(record.address.as_deref(), Some("100 MAIN ST"));
    assert_eq!(record.county.as_deref(), Some("Wake"));
    assert_eq!(record.crs, CrsCode::WGS84);
    assert!(matches!(record.geometry, Geometry::Polygon { .. }));
}

#[tokio::test]
async fn test_lightbox_falls_back_to_parcel_id_and_input_address() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/geocode");
            then.status(200).json_body(json!({"results": [{"parcelId": 9001}]}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/parcels/9001");
            then.status(200).json_body(json!({"geometry": square()}));
        })
        .await;

    let client = LightBoxClient::new("lb-key", &server.base_url()).unwrap();
    let record = client.address_to_parcel("5 Oak Ave").await.unwrap();
    assert_eq!(record.apn(), "9001");
    assert_eq!(record.address.as_deref(), Some("5 Oak Ave"));
    assert_eq!(record.county, None);
}

#[tokio::test]
async fn test_lightbox_no_results() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/geocode");
            then.status(200).json_body(json!({"results": []}));
        })
        .await;

    let client = LightBoxClient::new("lb-key", &server.base_url()).unwrap();
    let err = client.address_to_parcel("nowhere").await.unwrap_err();
    assert!(matches!(err, ParcelVizError::ResolutionFailed(_)));
    assert_eq!(err.to_string(), "No results returned for address: nowhere");
}

#[tokio::test]
async fn test_lightbox_http_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/geocode");
            then.status(401).body("unauthorized");
        })
        .await;

    let client = LightBoxClient::new("bad-key", &server.base_url()).unwrap();
    let err = client.address_to_parcel("100 Main St").await.unwrap_err();
    assert!(matches!(err, ParcelVizError::ResolutionFailed(_)));
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_parcel_service_apn_lookup() {
    let server = MockServer::start_async().await;
    let query = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/arcgis/rest/services/Parcels/FeatureServer/0/query")
                .query_param("where", "PIN='123-456-789'")
                .query_param("outFields", "*")
                .query_param("f", "geojson")
                .query_param("outSR", "4326")
                .query_param("returnGeometry", "true")
                .query_param("token", "parcel-token");
            then.status(200).json_body(json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": square(),
                    "properties": {"PIN": "123-456-789", "SITE_ADDR": "100 MAIN ST", "COUNTY": "Wake"}
                }]
            }));
        })
        .await;

    let record = parcel_service(&server)
        .fetch_parcel_by_apn("123-456-789")
        .await
        .unwrap();

    query.assert_async().await;
    assert_eq!(record.apn(), "123-456-789");
    assert_eq!(record.address.as_deref(), Some("100 MAIN ST"));
    assert_eq!(record.county.as_deref(), Some("Wake"));
    assert_eq!(record.crs, CrsCode::WGS84);
}

#[tokio::test]
async fn test_parcel_service_no_match() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/arcgis/rest/services/Parcels/FeatureServer/0/query");
            then.status(200)
                .json_body(json!({"type": "FeatureCollection", "features": []}));
        })
        .await;

    let err = parcel_service(&server)
        .fetch_parcel_by_apn("000")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No parcel found for APN '000'.");
}

#[tokio::test]
async fn test_parcel_service_missing_geometry() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/arcgis/rest/services/Parcels/FeatureServer/0/query");
            then.status(200).json_body(json!({
                "features": [{"type": "Feature", "geometry": null, "properties": {"PIN": "1"}}]
            }));
        })
        .await;

    let err = parcel_service(&server)
        .fetch_parcel_by_apn("1")
        .await
        .unwrap_err();
    assert!(matches!(err, ParcelVizError::ResolutionFailed(_)));
}

#[tokio::test]
async fn test_identifier_takes_precedence() {
    let server = MockServer::start_async().await;
    let geocode = server
        .mock_async(|when, then| {
            when.method(POST).path("/geocode");
            then.status(500);
        })
        .await;
    let query = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/arcgis/rest/services/Parcels/FeatureServer/0/query");
            then.status(200).json_body(json!({
                "features": [{"type": "Feature", "geometry": square(), "properties": {}}]
            }));
        })
        .await;

    let service = GeocodeService::new(
        Some(LightBoxClient::new("lb-key", &server.base_url()).unwrap()),
        Some(parcel_service(&server)),
    );
    let record = service
        .resolve(Some("100 Main St"), Some(" 42-17 "))
        .await
        .unwrap();

    assert_eq!(record.apn(), "42-17");
    query.assert_async().await;
    assert_eq!(geocode.hits_async().await, 0);
}
