//! 変換処理本体。CPUとファイルI/Oを使うため、ブロッキングスレッドで実行する。

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use fopfn_crypto::{hmac_sha1_hex_reader, verify_signature};
use fopfn_render::Renderer;
use fopfn_types::MIME_PDF;

use crate::engine::ConversionRuntime;
use crate::error::FunctionError;
use crate::staging::StagingArea;

/// ボディを一時ファイルに退避して署名を検証し、PDFに変換する。
///
/// 成否にかかわらず、作成した一時ファイルはすべて削除される。
pub(super) fn convert(
    runtime: &ConversionRuntime,
    temp_dir: &Path,
    body: &[u8],
    supplied: Option<&str>,
) -> Result<Vec<u8>, FunctionError> {
    let mut staging = StagingArea::new(temp_dir);
    let result = convert_staged(&mut staging, runtime, body, supplied);
    staging.release();
    result
}

fn convert_staged(
    staging: &mut StagingArea,
    runtime: &ConversionRuntime,
    body: &[u8],
    supplied: Option<&str>,
) -> Result<Vec<u8>, FunctionError> {
    let input_path = staging.stage_input(body)?;

    let expected = {
        let mut input = BufReader::new(File::open(&input_path)?);
        hmac_sha1_hex_reader(runtime.secret.as_bytes(), &mut input)?
    };
    tracing::debug!(signature = %expected, sig = supplied.unwrap_or_default(), "署名を計算しました");

    if verify_signature(&expected, supplied).is_err() {
        return Err(FunctionError::SignatureMismatch {
            expected,
            supplied: supplied.unwrap_or_default().to_string(),
        });
    }

    let (output, output_path) = staging.create_output()?;
    let mut writer = BufWriter::new(output);
    let mut input = BufReader::new(File::open(&input_path)?);

    let renderer = runtime.factory.new_renderer();
    let results = renderer.render(&mut input, MIME_PDF, &mut writer)?;
    writer.flush()?;
    drop(writer);

    for sequence in &results.page_sequences {
        tracing::info!(
            page_sequence = sequence.display_id(),
            page_count = sequence.page_count,
            "ページシーケンス {} で {} ページを生成しました",
            sequence.display_id(),
            sequence.page_count
        );
    }
    tracing::info!(
        page_count = results.page_count,
        "合計 {} ページを生成しました",
        results.page_count
    );

    Ok(std::fs::read(&output_path)?)
}
