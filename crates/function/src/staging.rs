//! # リクエスト単位の一時ファイル
//!
//! 1リクエストで作成した一時ファイルをすべて所有し、リクエスト終了時に削除する。
//! 削除の失敗はログに残すのみで、レスポンスには影響させない。

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

/// 入力FO文書の一時ファイル名の接頭辞
pub const INPUT_PREFIX: &str = "foinput";
/// 出力PDFの一時ファイル名の接頭辞
pub const OUTPUT_PREFIX: &str = "fop";
/// 一時ファイルの拡張子
pub const TEMP_SUFFIX: &str = ".tmp";

/// 一時ファイルの置き場。
///
/// `release()` を呼ばずに破棄された場合も `Drop` で削除される。
pub struct StagingArea {
    dir: PathBuf,
    files: Vec<NamedTempFile>,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
        }
    }

    /// 入力を書き込んだ一時ファイルを作成し、そのパスを返す。
    pub fn stage_input(&mut self, body: &[u8]) -> std::io::Result<PathBuf> {
        let mut file = self.create(INPUT_PREFIX)?;
        file.write_all(body)?;
        file.flush()?;
        let path = file.path().to_path_buf();
        self.files.push(file);
        Ok(path)
    }

    /// 出力用の空の一時ファイルを作成し、書き込みハンドルとパスを返す。
    pub fn create_output(&mut self) -> std::io::Result<(File, PathBuf)> {
        let file = self.create(OUTPUT_PREFIX)?;
        let handle = file.reopen()?;
        let path = file.path().to_path_buf();
        self.files.push(file);
        Ok((handle, path))
    }

    /// 全ての一時ファイルを削除する。
    pub fn release(mut self) {
        self.close_all();
    }

    fn create(&self, prefix: &str) -> std::io::Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix(prefix)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.dir)
    }

    fn close_all(&mut self) {
        for file in self.files.drain(..) {
            let path = file.path().to_path_buf();
            if let Err(e) = file.close() {
                tracing::warn!(path = %path.display(), error = %e, "一時ファイルの削除に失敗しました");
            }
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        self.close_all();
    }
}
