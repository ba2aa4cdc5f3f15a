//! Orchestrator behaviour against stub resolvers and adapters.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parcel_common::{ParcelRecord, ParcelVizError, ParcelVizResult, RenderRequest};
use render_pipeline::{AppSettings, LayerOutcome, ParcelResolver, RenderPipeline, SourceConfig};
use test_utils::{
    parcel_with_apn, stub_registry, stub_registry_with_log, temp_output_root, CompletionLog,
    SAMPLE_APN, SAMPLE_SOURCES_YAML,
};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Default)]
struct StubResolver {
    calls: AtomicUsize,
    fail: bool,
}

impl StubResolver {
    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ParcelResolver for StubResolver {
    async fn resolve(
        &self,
        _address: Option<&str>,
        apn: Option<&str>,
    ) -> ParcelVizResult<ParcelRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ParcelVizError::ResolutionFailed(
                "No parcel found for APN 'missing'.".to_string(),
            ));
        }
        Ok(parcel_with_apn(apn.unwrap_or(SAMPLE_APN)))
    }
}

fn pipeline_with(root: &Path, yaml: &str, resolver: Arc<StubResolver>) -> RenderPipeline {
    let settings = AppSettings {
        output_root: root.to_path_buf(),
        ..AppSettings::default()
    };
    let config = SourceConfig::from_yaml_str(yaml).unwrap();
    RenderPipeline::new(settings, config, stub_registry(), resolver)
}

fn pipeline(root: &Path) -> RenderPipeline {
    pipeline_with(root, SAMPLE_SOURCES_YAML, Arc::new(StubResolver::default()))
}

/// Width and height from a PNG's IHDR chunk.
fn png_size(path: &Path) -> (u32, u32) {
    let bytes = fs::read(path).unwrap();
    assert_eq!(bytes[..8], PNG_SIGNATURE, "{} is not a PNG", path.display());
    let width = u32::from_be_bytes(bytes[16..20].try_into().unwrap());
    let height = u32::from_be_bytes(bytes[20..24].try_into().unwrap());
    (width, height)
}

fn zoning_only(layer_type: &str) -> String {
    format!(
        "parcels:\n  url: https://gis.example.com/Parcels/FeatureServer/0\nmap:\n  width_px: 320\n  height_px: 240\nlayers:\n  zoning:\n    type: {}\n",
        layer_type
    )
}

#[tokio::test]
async fn test_missing_input_creates_nothing() {
    let root = temp_output_root();
    let resolver = Arc::new(StubResolver::default());
    let pipeline = pipeline_with(root.path(), SAMPLE_SOURCES_YAML, resolver.clone());

    let request = RenderRequest {
        address: Some("  ".into()),
        layers: vec!["buildings".into()],
        ..RenderRequest::default()
    };
    let err = pipeline.render(request).await.unwrap_err();

    assert!(matches!(err, ParcelVizError::MissingInput(_)));
    assert_eq!(resolver.calls(), 0);
    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_invalid_dpi_is_rejected_before_resolution() {
    let root = temp_output_root();
    let resolver = Arc::new(StubResolver::default());
    let pipeline = pipeline_with(root.path(), SAMPLE_SOURCES_YAML, resolver.clone());

    let mut request = RenderRequest::for_apn(SAMPLE_APN, &["buildings"]);
    request.output_dpi = 1200;
    let err = pipeline.render(request).await.unwrap_err();

    assert!(matches!(err, ParcelVizError::InvalidRequest(_)));
    assert!(err.is_client_error());
    assert_eq!(resolver.calls(), 0);
}

#[tokio::test]
async fn test_resolution_failure_aborts_request() {
    let root = temp_output_root();
    let resolver = Arc::new(StubResolver::failing());
    let pipeline = pipeline_with(root.path(), SAMPLE_SOURCES_YAML, resolver.clone());

    let err = pipeline
        .render(RenderRequest::for_apn("missing", &["buildings"]))
        .await
        .unwrap_err();

    assert!(matches!(err, ParcelVizError::ResolutionFailed(_)));
    assert_eq!(resolver.calls(), 1);
    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_every_valid_layer_gets_an_image() {
    let root = temp_output_root();
    let pipeline = pipeline(root.path());

    let response = pipeline
        .render(RenderRequest::for_apn(SAMPLE_APN, &["buildings", "aerial", "empty"]))
        .await
        .unwrap();

    assert_eq!(response.images.len(), 3);
    assert_eq!(
        response.images.keys().collect::<Vec<_>>(),
        vec!["buildings", "aerial", "empty"]
    );
    for name in ["buildings", "aerial", "empty"] {
        let url = response.images.get(name).unwrap();
        assert_eq!(url, format!("/outputs/{}/{}.png", SAMPLE_APN, name));
        let path = root.path().join(SAMPLE_APN).join(format!("{}.png", name));
        assert_eq!(png_size(&path), (320, 240));
    }

    assert_eq!(response.warnings, vec!["Layer 'empty': no features returned"]);
    assert_eq!(response.parcel.apn, SAMPLE_APN);
    assert_eq!(response.parcel.crs, "EPSG:4326");
    assert!(response.contact_sheet.is_none());
}

#[tokio::test]
async fn test_failing_layer_is_isolated() {
    let root = temp_output_root();
    let pipeline = pipeline(root.path());

    let run = pipeline
        .execute(RenderRequest::for_apn(SAMPLE_APN, &["buildings", "broken", "aerial"]))
        .await
        .unwrap();

    let names: Vec<&str> = run.outcomes.iter().map(LayerOutcome::layer_name).collect();
    assert_eq!(names, vec!["buildings", "broken", "aerial"]);
    assert!(matches!(run.outcomes[0], LayerOutcome::Rendered(_)));
    assert!(matches!(
        run.outcomes[1],
        LayerOutcome::Failed {
            error: ParcelVizError::AdapterResponse(_),
            ..
        }
    ));
    assert!(matches!(run.outcomes[2], LayerOutcome::Rendered(_)));

    let response = pipeline.aggregate(&run);
    assert_eq!(response.images.len(), 3);
    assert_eq!(response.warnings.len(), 1);
    assert_eq!(
        response.warnings[0],
        "Layer 'broken' failed: upstream service unavailable"
    );

    let placeholder = root.path().join(SAMPLE_APN).join("broken.png");
    assert_eq!(png_size(&placeholder), (320, 240));
}

#[tokio::test]
async fn test_unregistered_type_gets_placeholder() {
    let root = temp_output_root();
    let pipeline = pipeline_with(
        root.path(),
        &zoning_only("vector_tiles"),
        Arc::new(StubResolver::default()),
    );

    let request = RenderRequest {
        apn: Some(SAMPLE_APN.into()),
        layers: vec!["zoning".into()],
        buffer_feet: 250.0,
        output_dpi: 200,
        ..RenderRequest::default()
    };
    let run = pipeline.execute(request).await.unwrap();
    assert!(matches!(
        run.outcomes[0],
        LayerOutcome::Failed {
            error: ParcelVizError::UnregisteredLayerType(_),
            ..
        }
    ));

    let response = pipeline.aggregate(&run);
    assert_eq!(response.images.keys().collect::<Vec<_>>(), vec!["zoning"]);
    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].contains("zoning"));
    assert!(root.path().join(SAMPLE_APN).join("zoning.png").is_file());
}

#[tokio::test]
async fn test_zero_features_is_a_normal_render() {
    let root = temp_output_root();
    let pipeline = pipeline_with(
        root.path(),
        &zoning_only("stub_empty"),
        Arc::new(StubResolver::default()),
    );

    let request = RenderRequest {
        apn: Some(SAMPLE_APN.into()),
        layers: vec!["zoning".into()],
        buffer_feet: 250.0,
        output_dpi: 200,
        ..RenderRequest::default()
    };
    let run = pipeline.execute(request).await.unwrap();
    assert!(matches!(run.outcomes[0], LayerOutcome::Rendered(_)));

    let response = pipeline.aggregate(&run);
    assert_eq!(response.images.len(), 1);
    assert_eq!(response.warnings, vec!["Layer 'zoning': no features returned"]);
}

#[tokio::test]
async fn test_undefined_layer_is_skipped_silently() {
    let root = temp_output_root();
    let pipeline = pipeline(root.path());

    let run = pipeline
        .execute(RenderRequest::for_apn(SAMPLE_APN, &["flood", "buildings"]))
        .await
        .unwrap();
    assert!(matches!(
        &run.outcomes[0],
        LayerOutcome::Skipped { layer, .. } if layer == "flood"
    ));

    let response = pipeline.aggregate(&run);
    assert_eq!(response.images.keys().collect::<Vec<_>>(), vec!["buildings"]);
    assert!(response.warnings.is_empty());
    assert!(!root.path().join(SAMPLE_APN).join("flood.png").exists());
}

#[tokio::test]
async fn test_network_failure_is_isolated() {
    let root = temp_output_root();
    let pipeline = pipeline(root.path());

    let response = pipeline
        .render(RenderRequest::for_apn(SAMPLE_APN, &["zoning"]))
        .await
        .unwrap();

    assert_eq!(response.images.len(), 1);
    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].starts_with("Layer 'zoning' failed:"));
}

#[tokio::test]
async fn test_identifier_with_slash_is_sanitized() {
    let root = temp_output_root();
    let pipeline = pipeline(root.path());

    let response = pipeline
        .render(RenderRequest::for_apn("12/345", &["buildings"]))
        .await
        .unwrap();

    assert_eq!(
        response.images.get("buildings"),
        Some("/outputs/12_345/buildings.png")
    );
    assert!(root.path().join("12_345").join("buildings.png").is_file());
}

#[tokio::test]
async fn test_repeat_request_reuses_paths() {
    let root = temp_output_root();
    let pipeline = pipeline(root.path());
    let request = RenderRequest::for_apn(SAMPLE_APN, &["aerial", "buildings", "aerial"]);

    let first = pipeline.render(request.clone()).await.unwrap();
    let second = pipeline.render(request).await.unwrap();

    assert_eq!(first.images, second.images);
    assert_eq!(first.images.keys().collect::<Vec<_>>(), vec!["aerial", "buildings"]);
    let files = fs::read_dir(root.path().join(SAMPLE_APN)).unwrap().count();
    assert_eq!(files, 2);
}

#[tokio::test]
async fn test_placeholder_failure_adds_warning() {
    let root = temp_output_root();
    let pipeline = pipeline(root.path());
    // A directory where the image should go makes the final rename fail.
    fs::create_dir_all(root.path().join(SAMPLE_APN).join("broken.png")).unwrap();

    let response = pipeline
        .render(RenderRequest::for_apn(SAMPLE_APN, &["broken"]))
        .await
        .unwrap();

    assert_eq!(response.images.len(), 1);
    assert_eq!(response.warnings.len(), 2);
    assert!(response.warnings[0].starts_with("Layer 'broken' failed:"));
    assert!(response.warnings[1].contains("placeholder"));
}

#[tokio::test]
async fn test_single_worker_keeps_request_order() {
    let root = temp_output_root();
    let settings = AppSettings {
        output_root: root.path().to_path_buf(),
        max_concurrent_layers: 1,
        ..AppSettings::default()
    };
    let config = SourceConfig::from_yaml_str(SAMPLE_SOURCES_YAML).unwrap();
    let pipeline = RenderPipeline::new(
        settings,
        config,
        stub_registry(),
        Arc::new(StubResolver::default()),
    );

    let response = pipeline
        .render(RenderRequest::for_apn(SAMPLE_APN, &["empty", "aerial", "broken", "buildings"]))
        .await
        .unwrap();
    assert_eq!(
        response.images.keys().collect::<Vec<_>>(),
        vec!["empty", "aerial", "broken", "buildings"]
    );
    assert_eq!(
        response.warnings,
        vec![
            "Layer 'empty': no features returned".to_string(),
            "Layer 'broken' failed: upstream service unavailable".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_dot_identifier_stays_under_output_root() {
    let root = temp_output_root();
    let outputs = root.path().join("outputs");
    let pipeline = pipeline(&outputs);

    let response = pipeline
        .render(RenderRequest::for_apn("..", &["buildings"]))
        .await
        .unwrap();

    assert_eq!(response.parcel.apn, "..");
    assert_eq!(response.images.get("buildings"), Some("/outputs/__/buildings.png"));
    assert!(outputs.join("__").join("buildings.png").is_file());
    assert!(!root.path().join("buildings.png").exists());
}

fn assert_send<T: Send>(_: &T) {}

#[test]
fn test_render_future_is_send() {
    let root = temp_output_root();
    let pipeline = pipeline(root.path());
    let render = pipeline.render(RenderRequest::for_apn(SAMPLE_APN, &["buildings"]));
    assert_send(&render);
}

#[tokio::test]
async fn test_concurrent_layers_keep_request_order() {
    let root = temp_output_root();
    let settings = AppSettings {
        output_root: root.path().to_path_buf(),
        max_concurrent_layers: 4,
        ..AppSettings::default()
    };
    let yaml = "parcels:\n  url: https://gis.example.com/Parcels/FeatureServer/0\nmap:\n  width_px: 160\n  height_px: 120\nlayers:\n  slow:\n    type: stub_delayed\n    delay_ms: 400\n  medium:\n    type: stub_delayed\n    delay_ms: 200\n  fast:\n    type: stub_delayed\n    delay_ms: 0\n";
    let log = CompletionLog::default();
    let pipeline = RenderPipeline::new(
        settings,
        SourceConfig::from_yaml_str(yaml).unwrap(),
        stub_registry_with_log(log.clone()),
        Arc::new(StubResolver::default()),
    );

    // Runs on a spawned task, so the whole request must be Send + 'static.
    let response = tokio::spawn(async move {
        pipeline
            .render(RenderRequest::for_apn(SAMPLE_APN, &["slow", "medium", "fast"]))
            .await
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["fast", "medium", "slow"]);
    assert_eq!(
        response.images.keys().collect::<Vec<_>>(),
        vec!["slow", "medium", "fast"]
    );
    assert!(response.warnings.is_empty(), "{:?}", response.warnings);
}
