//! # FOP Function 共有型定義
//!
//! 変換エンドポイント・レンダリングエンジン・クライアントの間で共有する
//! データ構造と定数を提供する。
//!
//! ## エンコーディング規則
//! - 署名: HMAC-SHA1 の16進小文字表記（40文字）
//! - リクエストボディ: XSL-FO文書の生バイト列（Content-Typeは問わない）

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// 定数
// ---------------------------------------------------------------------------

/// PDFのMIMEタイプ。変換結果のContent-Typeおよびレンダリング対象形式。
pub const MIME_PDF: &str = "application/pdf";

/// 署名を運ぶクエリパラメータ名。
pub const SIGNATURE_PARAM: &str = "sig";

/// IDを持たないページシーケンスのログ表示名。
pub const NO_ID_LABEL: &str = "<no id>";

// ---------------------------------------------------------------------------
// リクエスト
// ---------------------------------------------------------------------------

/// 変換エンドポイントのクエリパラメータ。
///
/// `sig` 以外のパラメータ（Azure Functionsの `code` 等）は無視する。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertQuery {
    /// リクエストボディに対するHMAC-SHA1署名（16進小文字）
    #[serde(default)]
    pub sig: Option<String>,
}

// ---------------------------------------------------------------------------
// レンダリング結果
// ---------------------------------------------------------------------------

/// ページシーケンス単位のレンダリング結果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSequenceResults {
    /// `fo:page-sequence` の `id` 属性（未指定なら空文字列）
    pub id: String,
    /// このシーケンスで生成されたページ数
    pub page_count: usize,
}

impl PageSequenceResults {
    /// ログ表示用のID。空の場合は `<no id>` を返す。
    pub fn display_id(&self) -> &str {
        if self.id.is_empty() {
            NO_ID_LABEL
        } else {
            &self.id
        }
    }
}

/// 文書全体のレンダリング結果。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattingResults {
    /// ページシーケンスごとの結果（文書内の出現順）
    pub page_sequences: Vec<PageSequenceResults>,
    /// 総ページ数
    pub page_count: usize,
}

impl FormattingResults {
    /// ページシーケンスの結果から総ページ数を集計して構築する。
    pub fn from_sequences(page_sequences: Vec<PageSequenceResults>) -> Self {
        let page_count = page_sequences.iter().map(|s| s.page_count).sum();
        Self {
            page_sequences,
            page_count,
        }
    }
}
