//! Unit tests for the result normalizer's mapping table

use std::time::Duration;

use image_gen_hub::error::{AppError, ErrorBody};
use image_gen_hub::orchestrator::normalize::{normalize_failure, normalize_success};
use image_gen_hub::orchestrator::retry::UpstreamFailure;
use image_gen_hub::upstream::traits::{GenerationResult, ImageData, UpstreamError};

fn failure(error: UpstreamError) -> UpstreamFailure {
    UpstreamFailure { error, attempts: 3 }
}

#[test]
fn test_rate_limited_maps_to_resource_exhausted() {
    let err = normalize_failure(failure(UpstreamError::RateLimited {
        message: "too fast".into(),
        retry_after: Some(Duration::from_secs(2)),
    }));
    assert_eq!(err.status_code().as_u16(), 429);
    assert_eq!(err.error_code(), "RESOURCE_EXHAUSTED");
    assert!(err.to_string().contains("3 attempts"));
}

#[test]
fn test_quota_exhausted_maps_to_resource_exhausted() {
    let err = normalize_failure(failure(UpstreamError::QuotaExhausted {
        message: "quota spent".into(),
        retry_after: None,
    }));
    assert_eq!(err.status_code().as_u16(), 429);
    assert_eq!(err.error_code(), "RESOURCE_EXHAUSTED");
}

#[test]
fn test_invalid_argument_maps_to_400() {
    let err = normalize_failure(failure(UpstreamError::InvalidArgument("bad prompt".into())));
    assert_eq!(err.status_code().as_u16(), 400);
    assert_eq!(err.error_code(), "INVALID_ARGUMENT");
}

#[test]
fn test_permission_denied_maps_to_403() {
    let err = normalize_failure(failure(UpstreamError::PermissionDenied("no access".into())));
    assert_eq!(err.status_code().as_u16(), 403);
    assert_eq!(err.error_code(), "PERMISSION_DENIED");
}

#[test]
fn test_transient_and_unknown_map_to_502() {
    for error in [
        UpstreamError::Transient("hiccup".into()),
        UpstreamError::Unknown("???".into()),
    ] {
        let err = normalize_failure(failure(error));
        assert_eq!(err.status_code().as_u16(), 502);
        assert_eq!(err.error_code(), "UPSTREAM_ERROR");
    }
}

#[test]
fn test_empty_success_becomes_upstream_error() {
    let err = normalize_success(GenerationResult::default()).unwrap_err();
    assert!(matches!(err, AppError::EmptyOutput));
    let body = ErrorBody::from(&err);
    assert_eq!(body.status_code, 502);
    assert_eq!(body.error_code, "UPSTREAM_ERROR");
}

#[test]
fn test_success_preserves_order_and_encodes() {
    let result = GenerationResult {
        images: vec![
            ImageData {
                data: b"AAA".to_vec(),
                mime_type: "image/png".into(),
            },
            ImageData {
                data: b"BBB".to_vec(),
                mime_type: "image/png".into(),
            },
        ],
        texts: vec!["alpha".into(), "beta".into()],
    };
    let response = normalize_success(result).unwrap();
    assert_eq!(response.images, vec!["QUFB", "QkJC"]);
    assert_eq!(response.texts, vec!["alpha", "beta"]);
}

#[test]
fn test_text_only_success_is_valid() {
    let result = GenerationResult {
        images: vec![],
        texts: vec!["no image this time".into()],
    };
    assert!(normalize_success(result).is_ok());
}
