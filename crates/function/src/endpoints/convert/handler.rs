//! # 変換ハンドラ

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use fopfn_types::{ConvertQuery, MIME_PDF};
use tracing::Instrument;

use super::pipeline;
use crate::config::FunctionState;
use crate::error::FunctionError;

/// GET|POST /api/Fop: 署名を検証し、XSL-FO文書をPDFに変換する。
///
/// - 署名不一致（`sig` 未指定を含む）: 403、本文なし
/// - 変換成功: 200、`application/pdf`
/// - その他の失敗: 500、本文はエラーメッセージ
pub async fn handle_convert(
    State(state): State<Arc<FunctionState>>,
    query: Result<Query<ConvertQuery>, QueryRejection>,
    body: Bytes,
) -> Response {
    let invocation_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("fop", %invocation_id);

    // クエリが解釈できない場合は署名なしとして扱う
    let supplied = query.ok().and_then(|Query(q)| q.sig);

    async move {
        tracing::info!(body_bytes = body.len(), "変換リクエストを受信しました");

        match convert(&state, body, supplied).await {
            Ok(pdf) => ([(CONTENT_TYPE, MIME_PDF)], pdf).into_response(),
            Err(e) => {
                match &e {
                    FunctionError::SignatureMismatch { expected, supplied } => {
                        tracing::error!(
                            %expected,
                            sig = %supplied,
                            "署名が一致しません。リクエストを拒否します"
                        );
                    }
                    FunctionError::Conversion(message) => {
                        tracing::error!(error = %message, "変換に失敗しました");
                    }
                }
                if state.settings.expose_errors {
                    e.into_response()
                } else {
                    e.redacted().into_response()
                }
            }
        }
    }
    .instrument(span)
    .await
}

async fn convert(
    state: &FunctionState,
    body: Bytes,
    supplied: Option<String>,
) -> Result<Vec<u8>, FunctionError> {
    let runtime = state.engine.get().await?;
    let temp_dir = state.settings.temp_dir.clone();
    let span = tracing::Span::current();

    tokio::task::spawn_blocking(move || {
        span.in_scope(|| pipeline::convert(&runtime, &temp_dir, &body, supplied.as_deref()))
    })
    .await
    .map_err(|e| FunctionError::Conversion(format!("変換タスクが異常終了しました: {e}")))?
}
