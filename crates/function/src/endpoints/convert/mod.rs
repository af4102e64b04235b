//! # GET|POST /api/Fop
//!
//! 署名付きXSL-FO文書をPDFに変換する。
//!
//! ## モジュール構成
//! - `handler`: リクエスト受付・レスポンス生成
//! - `pipeline`: 一時ファイルへの退避・署名検証・レンダリング（ブロッキング処理）

mod handler;
mod pipeline;

pub use handler::handle_convert;

#[cfg(test)]
mod tests;
