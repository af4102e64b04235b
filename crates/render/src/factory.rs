//! # エンジンファクトリとレンダラー
//!
//! `EngineFactory` はプロセスで一度だけ構築し、リクエストごとに
//! `new_renderer()` で使い捨てのレンダラーを生成する。

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use fopfn_types::{FormattingResults, PageSequenceResults, MIME_PDF};

use crate::config::EngineConfig;
use crate::error::{RenderError, Result};
use crate::fo::FoDocument;
use crate::layout::layout_sequence;
use crate::pdf::write_pdf;

/// FO文書を指定形式に変換するレンダラー。
///
/// 同期処理でCPUとI/Oを使うため、非同期ランタイム上では
/// ブロッキングスレッドから呼び出すこと。
pub trait Renderer: Send {
    /// `input` のFO文書を `mime` 形式で `output` に書き出し、ページ数の集計を返す。
    fn render(
        &self,
        input: &mut dyn Read,
        mime: &str,
        output: &mut dyn Write,
    ) -> Result<FormattingResults>;
}

/// レンダラーのファクトリ。構築後は読み取り専用で共有できる。
#[derive(Debug, Clone)]
pub struct EngineFactory {
    config: EngineConfig,
    font_cache_path: PathBuf,
}

impl EngineFactory {
    /// 設定ファイルを読み込んでファクトリを構築する。
    ///
    /// フォントキャッシュのパスは保持するのみで、ファイルは作成しない。
    pub fn new(config_path: impl AsRef<Path>, font_cache_path: impl Into<PathBuf>) -> Result<Self> {
        let config = EngineConfig::load(config_path.as_ref())?;
        Ok(Self::with_config(config, font_cache_path))
    }

    /// 解析済みの設定からファクトリを構築する。
    pub fn with_config(config: EngineConfig, font_cache_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            font_cache_path: font_cache_path.into(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn font_cache_path(&self) -> &Path {
        &self.font_cache_path
    }

    /// リクエスト単位のレンダラーを生成する。
    pub fn new_renderer(&self) -> FoRenderer {
        FoRenderer {
            config: self.config.clone(),
        }
    }
}

/// XSL-FOをPDFに変換するレンダラー。
#[derive(Debug)]
pub struct FoRenderer {
    config: EngineConfig,
}

impl Renderer for FoRenderer {
    fn render(
        &self,
        input: &mut dyn Read,
        mime: &str,
        output: &mut dyn Write,
    ) -> Result<FormattingResults> {
        if mime != MIME_PDF {
            return Err(RenderError::UnsupportedFormat(mime.to_string()));
        }

        let mut xml = Vec::new();
        input.read_to_end(&mut xml)?;

        let document = FoDocument::parse(&xml, &self.config)?;
        let laid_out = document
            .sequences
            .iter()
            .map(layout_sequence)
            .collect::<Result<Vec<_>>>()?;

        let mut pdf = Vec::new();
        write_pdf(&laid_out, &mut pdf)?;
        output.write_all(&pdf)?;
        output.flush()?;

        Ok(FormattingResults::from_sequences(
            laid_out
                .into_iter()
                .map(|seq| PageSequenceResults {
                    id: seq.id,
                    page_count: seq.pages.len(),
                })
                .collect(),
        ))
    }
}
