use std::collections::HashSet;

use od_core::{
    AspectRatioBounds, ErrorKind, ExtensionRegistry, MetricContext, StaticSchemaExtension, Strictness, UrlMetric,
    ViewportAspectRatioBounds,
};
use serde_json::{json, Value};
use uuid::Uuid;

fn rect(width: f64, height: f64) -> Value {
    json!({
        "width": width, "height": height,
        "x": 0, "y": 0, "top": 0, "right": width, "bottom": height, "left": 0
    })
}

fn element(xpath: &str, is_lcp: bool) -> Value {
    json!({
        "isLCP": is_lcp,
        "isLCPCandidate": true,
        "xpath": xpath,
        "intersectionRatio": 1.0,
        "intersectionRect": rect(300.0, 200.0),
        "boundingClientRect": rect(300.0, 200.0)
    })
}

fn sample() -> Value {
    json!({
        "uuid": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
        "url": "https://example.com/page",
        "timestamp": 1700000000.123,
        "viewport": {"width": 1280, "height": 800},
        "elements": [
            element("/*[1][self::HTML]/*[2][self::BODY]/*[1][self::IMG]", true),
            element("/HTML/BODY/DIV[1]/IMG[1]", false)
        ]
    })
}

fn without(mut value: Value, key: &str) -> Value {
    value.as_object_mut().unwrap().remove(key);
    value
}

#[test]
fn canonical_serialization_round_trips_input() {
    let metric = UrlMetric::new(sample(), &MetricContext::new()).unwrap();
    assert_eq!(metric.to_json(), sample());
    assert_eq!(serde_json::to_value(&metric).unwrap(), sample());
}

#[test]
fn round_trip_adds_only_the_generated_uuid() {
    let metric = UrlMetric::new(without(sample(), "uuid"), &MetricContext::new()).unwrap();
    let mut expected = sample();
    expected["uuid"] = json!(metric.uuid().to_string());
    assert_eq!(metric.to_json(), expected);
}

#[test]
fn reconstruction_from_canonical_data_is_idempotent() {
    let context = MetricContext::new();
    let mut raw = sample();
    raw["viewport"]["width"] = json!("1280");
    raw["elements"][0]["intersectionRatio"] = json!("1");
    let first = UrlMetric::new(raw, &context).unwrap();
    let second = UrlMetric::new(first.to_json(), &context).unwrap();
    assert_eq!(first, second);
}

#[test]
fn generated_uuids_are_v4_and_distinct() {
    let context = MetricContext::new();
    let mut seen = HashSet::new();
    for _ in 0..32 {
        let metric = UrlMetric::new(without(sample(), "uuid"), &context).unwrap();
        let id = metric.uuid();
        assert_eq!(id.get_version_num(), 4);
        assert_eq!(Uuid::parse_str(metric.get("uuid").unwrap().as_str().unwrap()).unwrap(), id);
        assert!(seen.insert(id));
    }
}

#[test]
fn aspect_ratio_bounds_are_inclusive() {
    let context = MetricContext::new().with_bounds(ViewportAspectRatioBounds::new(0.5, 2.0).unwrap());
    for (width, height, ok) in [
        (1000, 2000, true),
        (2000, 1000, true),
        (999, 2000, false),
        (2001, 1000, false),
        (0, 100, false),
    ] {
        let mut raw = sample();
        raw["viewport"] = json!({"width": width, "height": height});
        let result = UrlMetric::new(raw, &context);
        assert_eq!(result.is_ok(), ok, "{width}x{height}");
        if let Err(err) = result {
            assert_eq!(err.kind(), ErrorKind::DomainInvariant);
        }
    }
}

#[test]
fn zero_height_fails_deterministically() {
    let context = MetricContext::new();
    for _ in 0..3 {
        let mut raw = sample();
        raw["viewport"] = json!({"width": 1280, "height": 0});
        let err = UrlMetric::new(raw, &context).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DomainInvariant);
        assert_eq!(err.to_string(), "Viewport height must be greater than zero.");
    }
}

#[test]
fn full_hd_viewport_against_two_bound_sets() {
    let mut raw = sample();
    raw["viewport"] = json!({"width": 1920, "height": 1080});

    let wide = MetricContext::new().with_bounds(ViewportAspectRatioBounds::new(0.5, 3.0).unwrap());
    assert!(UrlMetric::new(raw.clone(), &wide).is_ok());

    let narrow = MetricContext::new().with_bounds(ViewportAspectRatioBounds::new(2.0, 3.0).unwrap());
    let err = UrlMetric::new(raw, &narrow).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DomainInvariant);
    let message = err.to_string();
    assert!(message.contains("1.778"), "{message}");
    assert!(message.contains("2.0"), "{message}");
    assert!(message.contains("3.0"), "{message}");
}

#[test]
fn structural_violations_are_rejected() {
    let context = MetricContext::new();
    let cases: Vec<(Value, &str)> = vec![
        ({ let mut v = sample(); v["elements"][0]["intersectionRatio"] = json!(1.01); v }, "elements[0][intersectionRatio] must be less than or equal to 1"),
        ({ let mut v = sample(); v["elements"][1]["intersectionRatio"] = json!(-0.1); v }, "elements[1][intersectionRatio] must be greater than or equal to 0"),
        ({ let mut v = sample(); v["elements"][0]["boundingClientRect"]["width"] = json!(-1); v }, "elements[0][boundingClientRect][width] must be greater than or equal to 0"),
        ({ let mut v = sample(); v["elements"][0]["intersectionRect"]["height"] = json!(-5); v }, "elements[0][intersectionRect][height] must be greater than or equal to 0"),
        ({ let mut v = sample(); v["url"] = json!("ftp://example.com/"); v }, "url does not match pattern ^https?://."),
        ({ let mut v = sample(); v["url"] = json!(""); v }, "url is not a valid uri."),
        ({ let mut v = sample(); v["uuid"] = json!("not-a-uuid"); v }, "uuid is not a valid uuid."),
        ({ let mut v = sample(); v["timestamp"] = json!(-1); v }, "timestamp must be greater than or equal to 0"),
        ({ let mut v = sample(); v["viewport"]["width"] = json!(12.5); v }, "viewport[width] is not of type integer."),
        ({ let mut v = sample(); v["elements"][0]["xpath"] = json!("BODY"); v }, "elements[0][xpath] does not match pattern"),
        (without(sample(), "url"), "url is a required property of value."),
        (without(sample(), "elements"), "elements is a required property of value."),
    ];
    for (raw, expected) in cases {
        let err = UrlMetric::new(raw, &context).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert!(err.to_string().starts_with(expected), "{err} vs {expected}");
    }
}

#[test]
fn empty_elements_are_allowed() {
    let mut raw = sample();
    raw["elements"] = json!([]);
    let metric = UrlMetric::new(raw, &MetricContext::new()).unwrap();
    assert!(metric.elements().is_empty());
    assert!(metric.lcp_element().is_none());
}

#[test]
fn unknown_properties_are_rejected_at_every_level() {
    let context = MetricContext::new();

    let mut root = sample();
    root["userAgent"] = json!("Mozilla/5.0");
    let err = UrlMetric::new(root, &context).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert_eq!(err.to_string(), "userAgent is not a valid property of Object.");

    let mut element = sample();
    element["elements"][1]["visibility"] = json!("hidden");
    let err = UrlMetric::new(element, &context).unwrap_err();
    assert_eq!(err.to_string(), "elements[1][visibility] is not a valid property of Object.");

    let mut viewport = sample();
    viewport["viewport"]["depth"] = json!(24);
    assert!(UrlMetric::new(viewport, &context).is_err());

    let mut rect = sample();
    rect["elements"][0]["intersectionRect"]["z"] = json!(0);
    let err = UrlMetric::new(rect, &context).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert_eq!(
        err.to_string(),
        "elements[0][intersectionRect][z] is not a valid property of Object."
    );
}

struct NanBounds;

impl AspectRatioBounds for NanBounds {
    fn minimum_viewport_aspect_ratio(&self) -> f64 {
        f64::NAN
    }

    fn maximum_viewport_aspect_ratio(&self) -> f64 {
        f64::NAN
    }
}

#[test]
fn nan_bounds_reject_every_ratio() {
    let context = MetricContext::new().with_bounds(NanBounds);
    for (width, height) in [(100000, 1), (1280, 800), (1, 1)] {
        let mut raw = sample();
        raw["viewport"] = json!({"width": width, "height": height});
        let err = UrlMetric::new(raw, &context).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DomainInvariant, "{width}x{height}");
    }
}

#[test]
fn stored_uuid_is_lowercase() {
    let mut raw = sample();
    raw["uuid"] = json!("3FA85F64-5717-4562-B3FC-2C963F66AFA6");
    let metric = UrlMetric::new(raw, &MetricContext::new()).unwrap();
    assert_eq!(metric.get("uuid"), Some(&json!("3fa85f64-5717-4562-b3fc-2c963f66afa6")));
    assert_eq!(metric.get("uuid"), Some(&json!(metric.uuid().to_string())));
    assert_eq!(metric.to_json(), sample());
}

#[test]
fn lenient_context_strips_unknown_properties() {
    let context = MetricContext::new().with_strictness(Strictness::Lenient);
    let mut raw = sample();
    raw["userAgent"] = json!("Mozilla/5.0");
    raw["elements"][0]["visibility"] = json!("hidden");
    let metric = UrlMetric::new(raw, &context).unwrap();
    assert_eq!(metric.get("userAgent"), None);
    assert_eq!(metric.elements()[0].get("visibility"), None);
    assert_eq!(metric.to_json(), sample());
}

#[test]
fn conflicting_extension_is_dropped_and_reported() {
    let registry = ExtensionRegistry::new().with(
        StaticSchemaExtension::new("hijacker").with_root_property("url", json!({"type": "integer"})),
    );
    let context = MetricContext::new().with_extensions(registry);
    assert_eq!(context.schema().diagnostics().len(), 1);
    assert_eq!(context.schema().diagnostics()[0].property(), "url");

    let metric = UrlMetric::new(sample(), &context).unwrap();
    assert_eq!(metric.url(), "https://example.com/page");
}

#[test]
fn required_extension_properties_are_optional() {
    let registry = ExtensionRegistry::new().with(
        StaticSchemaExtension::new("embeds")
            .with_root_property("userAgent", json!({"type": "string", "required": true}))
            .with_element_property("visibleFraction", json!({"type": "number", "minimum": 0, "required": true})),
    );
    let context = MetricContext::new().with_extensions(registry);
    assert_eq!(context.schema().diagnostics().len(), 2);

    let metric = UrlMetric::new(sample(), &context).unwrap();
    assert_eq!(metric.get("userAgent"), None);

    let mut raw = sample();
    raw["userAgent"] = json!("Mozilla/5.0");
    raw["elements"][0]["visibleFraction"] = json!("0.75");
    let metric = UrlMetric::new(raw, &context).unwrap();
    assert_eq!(metric.get("userAgent"), Some(&json!("Mozilla/5.0")));
    assert_eq!(metric.elements()[0].get("visibleFraction"), Some(&json!(0.75)));

    let mut bad = sample();
    bad["elements"][1]["visibleFraction"] = json!(-1);
    let err = UrlMetric::new(bad, &context).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
}

#[test]
fn extension_defaults_are_applied() {
    let registry = ExtensionRegistry::new().with(
        StaticSchemaExtension::new("mode").with_root_property(
            "colorScheme",
            json!({"type": "string", "enum": ["light", "dark"], "default": "light"}),
        ),
    );
    let context = MetricContext::new().with_extensions(registry);
    let metric = UrlMetric::new(sample(), &context).unwrap();
    assert_eq!(metric.get("colorScheme"), Some(&json!("light")));

    let mut expected = sample();
    expected["colorScheme"] = json!("light");
    assert_eq!(metric.to_json(), expected);

    let mut raw = sample();
    raw["colorScheme"] = json!("sepia");
    assert!(UrlMetric::new(raw, &context).is_err());
}

#[test]
fn malformed_extensions_never_break_schema_building() {
    let registry = ExtensionRegistry::new().with(
        StaticSchemaExtension::new("broken")
            .with_root_property("a", json!("string"))
            .with_root_property("b", json!({"minimum": 1}))
            .with_root_property("c", json!({"type": "string", "pattern": "("}))
            .with_element_property("isLCP", json!({"type": "string"})),
    );
    let context = MetricContext::new().with_extensions(registry);
    assert_eq!(context.schema().diagnostics().len(), 3);
    assert!(UrlMetric::new(sample(), &context).is_ok());
}
