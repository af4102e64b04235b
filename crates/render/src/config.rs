//! # エンジン設定
//!
//! Apache FOP形式の設定ファイル（`fop.xconf`）から、本エンジンが解釈する
//! 項目だけを読み込む。未知の要素は無視する。
//!
//! ```xml
//! <fop version="1.0">
//!   <strict-validation>true</strict-validation>
//!   <default-page-settings height="11in" width="8.26in"/>
//! </fop>
//! ```

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{RenderError, Result};
use crate::units::parse_length;

/// 既定のページ幅（8.26in）
const DEFAULT_PAGE_WIDTH: f32 = 8.26 * 72.0;

/// 既定のページ高さ（11in）
const DEFAULT_PAGE_HEIGHT: f32 = 11.0 * 72.0;

/// レンダリングエンジンの設定。
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// 未知のFO要素をエラーとするか
    pub strict_validation: bool,
    /// `simple-page-master` がページサイズを指定しない場合の幅（pt）
    pub page_width: f32,
    /// `simple-page-master` がページサイズを指定しない場合の高さ（pt）
    pub page_height: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_validation: false,
            page_width: DEFAULT_PAGE_WIDTH,
            page_height: DEFAULT_PAGE_HEIGHT,
        }
    }
}

impl EngineConfig {
    /// 設定ファイルを読み込む。
    pub fn load(path: &Path) -> Result<Self> {
        let xml = std::fs::read(path).map_err(|e| {
            RenderError::Config(format!("{} を読み込めません: {e}", path.display()))
        })?;
        Self::parse(&xml)
    }

    /// 設定XMLを解析する。ルート要素は `fop` である必要がある。
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut config = Self::default();
        let mut stack: Vec<Vec<u8>> = Vec::new();
        let mut saw_root = false;
        let mut buf = Vec::new();

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                RenderError::Config(format!(
                    "XMLの構文エラー (位置 {}): {e}",
                    reader.buffer_position()
                ))
            })?;

            match event {
                Event::Start(e) => {
                    let name = e.local_name().as_ref().to_vec();
                    check_root(&mut saw_root, &stack, &name)?;
                    config.apply_element(&stack, &e)?;
                    stack.push(name);
                }
                Event::Empty(e) => {
                    let name = e.local_name().as_ref().to_vec();
                    check_root(&mut saw_root, &stack, &name)?;
                    config.apply_element(&stack, &e)?;
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| RenderError::Config(format!("テキストの解析に失敗: {e}")))?;
                    config.apply_text(&stack, &text)?;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !saw_root {
            return Err(RenderError::Config("fop要素がありません".to_string()));
        }
        if !stack.is_empty() {
            return Err(RenderError::Config(
                "閉じられていない要素があります".to_string(),
            ));
        }

        Ok(config)
    }

    /// `fop` 直下の要素の属性を反映する。
    fn apply_element(&mut self, stack: &[Vec<u8>], e: &BytesStart) -> Result<()> {
        if stack.len() != 1 || e.local_name().as_ref() != b"default-page-settings" {
            return Ok(());
        }

        for attr in e.attributes() {
            let attr =
                attr.map_err(|e| RenderError::Config(format!("属性の解析に失敗: {e}")))?;
            let value = attr
                .unescape_value()
                .map_err(|e| RenderError::Config(format!("属性値の解析に失敗: {e}")))?;
            match attr.key.local_name().as_ref() {
                b"width" => self.page_width = positive_length(&value)?,
                b"height" => self.page_height = positive_length(&value)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// `fop` 直下の要素のテキストを反映する。
    fn apply_text(&mut self, stack: &[Vec<u8>], text: &str) -> Result<()> {
        if stack.len() != 2 {
            return Ok(());
        }
        if stack[1] == b"strict-validation" {
            self.strict_validation = match text.trim() {
                "true" => true,
                "false" => false,
                other => {
                    return Err(RenderError::Config(format!(
                        "strict-validationはtrueまたはfalseである必要があります: {other}"
                    )))
                }
            };
        }
        Ok(())
    }
}

fn check_root(saw_root: &mut bool, stack: &[Vec<u8>], name: &[u8]) -> Result<()> {
    if !stack.is_empty() {
        return Ok(());
    }
    if *saw_root {
        return Err(RenderError::Config(
            "ルート要素の後に要素があります".to_string(),
        ));
    }
    if name != b"fop" {
        return Err(RenderError::Config(format!(
            "ルート要素はfopである必要があります: {}",
            String::from_utf8_lossy(name)
        )));
    }
    *saw_root = true;
    Ok(())
}

fn positive_length(value: &str) -> Result<f32> {
    let length = parse_length(value)?;
    if length <= 0.0 {
        return Err(RenderError::Config(format!(
            "ページサイズは正の値である必要があります: {value}"
        )));
    }
    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// FOP形式の設定からページサイズと厳格検証の設定を読み込めることを確認
    #[test]
    fn test_parse_fop_xconf() {
        let xml = br#"<?xml version="1.0"?>
<fop version="1.0">
  <strict-configuration>true</strict-configuration>
  <strict-validation>true</strict-validation>
  <base>./</base>
  <default-page-settings height="297mm" width="210mm"/>
  <renderers>
    <renderer mime="application/pdf">
      <fonts><auto-detect/></fonts>
    </renderer>
  </renderers>
</fop>"#;

        let config = EngineConfig::parse(xml).unwrap();
        assert!(config.strict_validation);
        assert!((config.page_width - 595.28).abs() < 0.01);
        assert!((config.page_height - 841.89).abs() < 0.01);
    }

    /// 最小構成の設定では既定値が使われることを確認
    #[test]
    fn test_parse_minimal_uses_defaults() {
        let config = EngineConfig::parse(b"<fop/>").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    /// fop以外のルート要素・空文書・不正XMLを拒否することを確認
    #[test]
    fn test_parse_rejects_invalid_documents() {
        assert!(EngineConfig::parse(b"").is_err());
        assert!(EngineConfig::parse(b"<config/>").is_err());
        assert!(EngineConfig::parse(b"<fop><base></fop>").is_err());
        assert!(EngineConfig::parse(b"<fop><strict-validation>yes</strict-validation></fop>").is_err());
        assert!(EngineConfig::parse(br#"<fop><default-page-settings width="0in"/></fop>"#).is_err());
    }

    /// 存在しないファイルの読み込みが設定エラーになることを確認
    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = EngineConfig::load(&dir.path().join("missing.xconf"));
        assert!(matches!(result, Err(RenderError::Config(_))));
    }

    /// ファイルから設定を読み込めることを確認
    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fop.xconf");
        std::fs::write(&path, "<fop><strict-validation>false</strict-validation></fop>").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert!(!config.strict_validation);
    }
}
