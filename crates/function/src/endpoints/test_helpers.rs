//! # エンドポイントテスト用共通ヘルパー

use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::Response;
use fopfn_types::ConvertQuery;

use crate::config::{
    FunctionState, MapSource, ServiceSettings, ENV_CONFIG_PATH, ENV_FONT_CACHE_PATH,
    ENV_PASSWORD_KEY,
};
use crate::endpoints::handle_convert;

/// 1ページのFO文書
pub const MINIMAL_FO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<fo:root xmlns:fo="http://www.w3.org/1999/XSL/Format">
  <fo:layout-master-set>
    <fo:simple-page-master master-name="A4" page-width="210mm" page-height="297mm" margin="2cm">
      <fo:region-body/>
    </fo:simple-page-master>
  </fo:layout-master-set>
  <fo:page-sequence master-reference="A4" id="body">
    <fo:flow flow-name="xsl-region-body">
      <fo:block>Hello, world!</fo:block>
    </fo:flow>
  </fo:page-sequence>
</fo:root>"#;

/// テスト用のランダムなシークレットを生成する。
pub fn random_secret() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// ボディに対する正しい署名を計算する。
pub fn sign(secret: &str, body: &[u8]) -> String {
    fopfn_crypto::hmac_sha1_hex(secret.as_bytes(), body).unwrap()
}

/// エンジン設定ファイルを作成し、テスト用の共有状態を構築する。
///
/// 一時ファイルは `temp_dir` に作成される。
pub fn configured_state(root: &Path, temp_dir: &Path, secret: &str) -> Arc<FunctionState> {
    let config_path = root.join("fop.xconf");
    std::fs::write(&config_path, "<fop><strict-validation>false</strict-validation></fop>")
        .unwrap();
    let cache_path = root.join("fop-fonts.cache");

    let source = MapSource::from_pairs(&[
        (ENV_CONFIG_PATH, config_path.to_str().unwrap()),
        (ENV_FONT_CACHE_PATH, cache_path.to_str().unwrap()),
        (ENV_PASSWORD_KEY, secret),
    ]);
    state_with_source(temp_dir, source)
}

/// エンジン用の環境変数が一切ない共有状態を構築する。
pub fn unconfigured_state(temp_dir: &Path) -> Arc<FunctionState> {
    state_with_source(temp_dir, MapSource::default())
}

fn state_with_source(temp_dir: &Path, source: MapSource) -> Arc<FunctionState> {
    let settings = ServiceSettings {
        temp_dir: temp_dir.to_path_buf(),
        ..ServiceSettings::default()
    };
    Arc::new(FunctionState::new(settings, Arc::new(source)))
}

/// ハンドラを直接呼び出す。
pub async fn call(state: &Arc<FunctionState>, sig: Option<&str>, body: &[u8]) -> Response {
    handle_convert(
        State(state.clone()),
        Ok(Query(ConvertQuery {
            sig: sig.map(str::to_string),
        })),
        Bytes::copy_from_slice(body),
    )
    .await
}

/// レスポンス本文を読み出す。
pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// ディレクトリ内のエントリ数を返す。
pub fn entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

/// テスト中に出力されたログを保持するバッファ。
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// 現在のスレッドにログ収集用のサブスクライバーを設定する。
    ///
    /// 返されたガードが破棄されるまで有効。
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    /// 指定レベルで出力された行を返す。
    pub fn lines_at(&self, level: &str) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| line.split_whitespace().any(|word| word == level))
            .map(str::to_string)
            .collect()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
