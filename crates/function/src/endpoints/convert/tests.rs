use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;

use crate::config::{FunctionState, MapSource, ServiceSettings};
use crate::endpoints::test_helpers::{
    body_bytes, call, configured_state, entry_count, random_secret, sign, unconfigured_state,
    CapturedLogs, MINIMAL_FO,
};

use super::handle_convert;

/// 正しい署名のFO文書がPDFとして返されることを確認
#[tokio::test]
async fn test_convert_success() {
    let root = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let secret = random_secret();
    let state = configured_state(root.path(), work.path(), &secret);

    let sig = sign(&secret, MINIMAL_FO.as_bytes());
    let response = call(&state, Some(&sig), MINIMAL_FO.as_bytes()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    let body = body_bytes(response).await;
    assert!(body.starts_with(b"%PDF-"));
    assert_eq!(entry_count(work.path()), 0);
}

/// 署名が未指定・空・不一致・大文字の場合に本文なしの403になることを確認
#[tokio::test]
async fn test_signature_mismatch_is_forbidden() {
    let root = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let secret = random_secret();
    let state = configured_state(root.path(), work.path(), &secret);

    let body = MINIMAL_FO.as_bytes();
    let correct = sign(&secret, body);
    let uppercase = correct.to_uppercase();
    let other_key = sign("another-secret", body);

    for sig in [None, Some(""), Some(other_key.as_str()), Some(uppercase.as_str())] {
        let response = call(&state, sig, body).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "sig={sig:?}");
        assert!(body_bytes(response).await.is_empty());
        assert_eq!(entry_count(work.path()), 0);
    }
}

/// 署名不一致時に期待値と指定値の両方がエラーレベルで記録されることを確認
#[tokio::test]
async fn test_signature_mismatch_logs_both_values() {
    let root = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let secret = random_secret();
    let state = configured_state(root.path(), work.path(), &secret);
    let (logs, _guard) = CapturedLogs::install();

    let body = MINIMAL_FO.as_bytes();
    let expected = sign(&secret, body);
    let supplied = sign("another-secret", body);
    let response = call(&state, Some(&supplied), body).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let errors = logs.lines_at("ERROR");
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains(&format!("expected={expected}")), "{}", errors[0]);
    assert!(errors[0].contains(&format!("sig={supplied}")), "{}", errors[0]);
    assert!(errors[0].contains("署名が一致しません"));
}

/// 別のボディに対する署名では拒否されることを確認
#[tokio::test]
async fn test_signature_bound_to_body() {
    let root = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let secret = random_secret();
    let state = configured_state(root.path(), work.path(), &secret);

    let sig = sign(&secret, b"<other/>");
    let response = call(&state, Some(&sig), MINIMAL_FO.as_bytes()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

/// 解釈できないクエリは署名なしとして403になることを確認
#[tokio::test]
async fn test_query_rejection_is_forbidden() {
    let root = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let state = configured_state(root.path(), work.path(), &random_secret());

    let rejection: Result<Query<fopfn_types::ConvertQuery>, QueryRejection> =
        Query::try_from_uri(&"http://localhost/api/Fop?sig=a&sig=b".parse().unwrap());
    assert!(rejection.is_err());

    let response = handle_convert(
        State(state),
        rejection,
        axum::body::Bytes::from_static(MINIMAL_FO.as_bytes()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

/// 不正なFO文書に正しい署名を付けた場合に本文付きの500になることを確認
#[tokio::test]
async fn test_malformed_body_is_server_error() {
    let root = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let secret = random_secret();
    let state = configured_state(root.path(), work.path(), &secret);

    for body in [&b"this is not xml"[..], &b"<html><body/></html>"[..], &b""[..]] {
        let sig = sign(&secret, body);
        let response = call(&state, Some(&sig), body).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body_bytes(response).await.is_empty());
        assert_eq!(entry_count(work.path()), 0);
    }
}

/// エンジン用の環境変数がない場合は署名にかかわらず500になることを確認
#[tokio::test]
async fn test_unconfigured_engine_is_server_error() {
    let work = tempfile::tempdir().unwrap();
    let state = unconfigured_state(work.path());

    let sig = sign("", MINIMAL_FO.as_bytes());
    let response = call(&state, Some(&sig), MINIMAL_FO.as_bytes()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(body.contains("FOP_CONFIG_PATH"));
    assert!(!state.engine.is_initialized());
}

/// エラーメッセージを伏せる設定では汎用メッセージが返ることを確認
#[tokio::test]
async fn test_redacted_errors() {
    let work = tempfile::tempdir().unwrap();
    let settings = ServiceSettings {
        temp_dir: work.path().to_path_buf(),
        expose_errors: false,
        ..ServiceSettings::default()
    };
    let state = std::sync::Arc::new(FunctionState::new(
        settings,
        std::sync::Arc::new(MapSource::default()),
    ));

    let response = call(&state, Some("abc"), b"<x/>").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(!body.is_empty());
    assert!(!body.contains("FOP_CONFIG_PATH"));
}

/// 一時ディレクトリが存在しない場合に500になることを確認
#[tokio::test]
async fn test_staging_failure_is_server_error() {
    let root = tempfile::tempdir().unwrap();
    let secret = random_secret();
    let state = configured_state(root.path(), &root.path().join("missing"), &secret);

    let sig = sign(&secret, MINIMAL_FO.as_bytes());
    let response = call(&state, Some(&sig), MINIMAL_FO.as_bytes()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

/// 異なるボディ・署名の同時リクエストがそれぞれ自身の結果を受け取ることを確認
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests() {
    let root = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let secret = random_secret();
    let state = configured_state(root.path(), work.path(), &secret);

    let handles: Vec<_> = (1..=6)
        .map(|pages| {
            let state = state.clone();
            let secret = secret.clone();
            tokio::spawn(async move {
                let body = document_with_pages(pages);
                let sig = sign(&secret, body.as_bytes());
                let response = call(&state, Some(&sig), body.as_bytes()).await;
                assert_eq!(response.status(), StatusCode::OK);
                (pages, body_bytes(response).await)
            })
        })
        .collect();

    for handle in handles {
        let (pages, pdf) = handle.await.unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
        assert_eq!(count_pages(&pdf), pages, "pages={pages}");
    }
    assert_eq!(entry_count(work.path()), 0);
}

/// 指定ページ数になるよう改ページを入れたFO文書
fn document_with_pages(pages: usize) -> String {
    let blocks: String = (0..pages)
        .map(|i| {
            let brk = if i == 0 { "" } else { r#" break-before="page""# };
            format!("<fo:block{brk}>page {i}</fo:block>")
        })
        .collect();
    format!(
        r#"<fo:root xmlns:fo="http://www.w3.org/1999/XSL/Format">
  <fo:layout-master-set><fo:simple-page-master master-name="p"><fo:region-body margin="1in"/></fo:simple-page-master></fo:layout-master-set>
  <fo:page-sequence master-reference="p"><fo:flow flow-name="xsl-region-body">{blocks}</fo:flow></fo:page-sequence>
</fo:root>"#
    )
}

fn count_pages(pdf: &[u8]) -> usize {
    lopdf::Document::load_mem(pdf).unwrap().get_pages().len()
}
