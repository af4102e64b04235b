//! # FOP Function レンダリングエンジン
//!
//! XSL-FO文書をページ分割されたPDFに変換する。
//!
//! ## 処理フロー
//! 1. FO文書を解析し、ページマスターと段落列を得る（`fo`）
//! 2. ページシーケンスごとに行を折り返してページへ割り付ける（`layout`）
//! 3. 全ページを一つのPDFとして書き出す（`pdf`）
//!
//! 対応するFO語彙はテキスト組版に必要なサブセットに限られる。
//! 画像・表の罫線・フォント埋め込みには対応しない。

pub mod config;
pub mod error;
pub mod factory;
pub mod fo;
pub mod layout;
pub mod pdf;
pub mod units;

pub use config::EngineConfig;
pub use error::{RenderError, Result};
pub use factory::{EngineFactory, FoRenderer, Renderer};
