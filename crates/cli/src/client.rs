//! # FOP Function クライアント
//!
//! XSL-FO文書を検証・署名して変換エンドポイントに送信し、PDFを受け取る。

use fopfn_crypto::hmac_sha1_hex;
use fopfn_types::SIGNATURE_PARAM;
use quick_xml::events::Event;
use quick_xml::Reader;

/// クライアントのエラー型。
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// 入力が整形式のXMLではない
    #[error("入力は有効なXMLではありません: {0}")]
    InvalidXml(String),
    /// 署名の計算に失敗
    #[error("署名の計算に失敗: {0}")]
    Signature(#[from] fopfn_crypto::CryptoError),
    /// HTTP通信に失敗
    #[error("HTTP送信失敗: {0}")]
    Http(#[from] reqwest::Error),
    /// エンドポイントが成功以外のステータスを返した（本文をそのまま保持する）
    #[error("{0}")]
    Response(String),
}

/// 変換エンドポイントのクライアント。
pub struct FopClient {
    endpoint: String,
    secret: String,
    http_client: reqwest::Client,
}

impl FopClient {
    /// シークレット未指定の場合は空文字列で署名する。
    pub fn new(endpoint: impl Into<String>, secret: Option<String>) -> Self {
        Self::with_http_client(endpoint, secret, reqwest::Client::new())
    }

    pub fn with_http_client(
        endpoint: impl Into<String>,
        secret: Option<String>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            secret: secret.unwrap_or_default(),
            http_client,
        }
    }

    /// 入力に対する署名（HMAC-SHA1の16進小文字）を返す。
    pub fn sign(&self, input: &[u8]) -> Result<String, ClientError> {
        Ok(hmac_sha1_hex(self.secret.as_bytes(), input)?)
    }

    /// 入力を変換し、PDFのバイト列を返す。
    ///
    /// 整形式のXMLでない入力は送信せずにエラーとする。
    pub async fn convert(&self, input: &[u8]) -> Result<Vec<u8>, ClientError> {
        check_well_formed(input)?;

        let sig = self.sign(input)?;
        let url = format!("{}?{SIGNATURE_PARAM}={sig}", self.endpoint);

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(input.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            tracing::debug!(%status, "変換エンドポイントがエラーを返しました");
            return Err(ClientError::Response(body));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// 入力が単一のルート要素を持つ整形式のXML文書であることを確認する。
pub fn check_well_formed(input: &[u8]) -> Result<(), ClientError> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ClientError::InvalidXml(format!("位置 {}: {e}", reader.buffer_position())))?;

        match event {
            Event::Start(_) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Event::Empty(_) => {
                if depth == 0 {
                    roots += 1;
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(t) if depth == 0 => {
                let text = t
                    .unescape()
                    .map_err(|e| ClientError::InvalidXml(e.to_string()))?;
                if !text.trim().is_empty() {
                    return Err(ClientError::InvalidXml(
                        "ルート要素の外にテキストがあります".to_string(),
                    ));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        if roots > 1 {
            return Err(ClientError::InvalidXml(
                "ルート要素が複数あります".to_string(),
            ));
        }
        buf.clear();
    }

    if roots == 0 {
        return Err(ClientError::InvalidXml("ルート要素がありません".to_string()));
    }
    if depth != 0 {
        return Err(ClientError::InvalidXml(
            "閉じられていない要素があります".to_string(),
        ));
    }
    Ok(())
}
