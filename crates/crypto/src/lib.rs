//! # FOP Function 署名処理
//!
//! 変換リクエストの真正性を確認するための署名を実装する。
//!
//! ## アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | 署名 | HMAC-SHA1（鍵 = 共有秘密、メッセージ = リクエストボディ） |
//! | 表記 | 16進小文字（40文字） |
//!
//! 署名の比較は通常の文字列比較で行う。定数時間比較ではないため、
//! 信頼できない呼び出し元に公開する場合はタイミング攻撃への対策が必要になる。

use std::io::Read;

use hmac::{Hmac, Mac};
use sha1::Sha1;

/// HMAC-SHA1
type HmacSha1 = Hmac<Sha1>;

/// ストリーム読み込み時のバッファサイズ
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// 署名処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// HMAC鍵の初期化に失敗
    #[error("HMAC鍵の初期化に失敗しました")]
    InvalidKey,
    /// 署名対象の読み込みに失敗
    #[error("署名対象の読み込みに失敗しました: {0}")]
    Io(#[from] std::io::Error),
    /// 署名が一致しない
    #[error("署名が一致しません")]
    SignatureMismatch,
}

fn new_mac(key: &[u8]) -> Result<HmacSha1, CryptoError> {
    HmacSha1::new_from_slice(key).map_err(|_| CryptoError::InvalidKey)
}

/// メッセージに対するHMAC-SHA1署名を16進小文字で返す。
pub fn hmac_sha1_hex(key: &[u8], message: &[u8]) -> Result<String, CryptoError> {
    let mut mac = new_mac(key)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// リーダーの内容全体に対するHMAC-SHA1署名を16進小文字で返す。
///
/// 一時ファイルに退避したリクエストボディをメモリに載せ直さずに署名する。
pub fn hmac_sha1_hex_reader<R: Read + ?Sized>(
    key: &[u8],
    reader: &mut R,
) -> Result<String, CryptoError> {
    let mut mac = new_mac(key)?;
    let mut buf = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        mac.update(&buf[..n]);
    }
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// 期待される署名と提示された署名を比較する。
///
/// 大文字小文字を区別する完全一致。署名が提示されていない場合は常に不一致。
pub fn verify_signature(expected: &str, supplied: Option<&str>) -> Result<(), CryptoError> {
    match supplied {
        Some(sig) if sig == expected => Ok(()),
        _ => Err(CryptoError::SignatureMismatch),
    }
}
