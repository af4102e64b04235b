//! # FOP Function CLI
//!
//! XSL-FO文書に署名して変換エンドポイントへ送信し、PDFを保存する。
//!
//! ```text
//! fopfn-cli convert --endpoint https://example.azurewebsites.net/api/Fop input.fo -o out.pdf
//! fopfn-cli sign input.fo
//! ```
//!
//! シークレットは `--secret` または環境変数 `PASSWORD_KEY` で指定する。

mod client;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use client::FopClient;

#[derive(Parser, Debug)]
#[command(name = "fopfn-cli", version, about = "FOP Function client")]
struct Cli {
    /// リクエスト署名の共有シークレット
    #[arg(long, global = true, env = "PASSWORD_KEY", hide_env_values = true)]
    secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// XSL-FO文書をPDFに変換する
    Convert {
        /// 変換エンドポイントのURL（例: https://host/api/Fop）
        #[arg(long, env = "FOP_ENDPOINT")]
        endpoint: String,
        /// 入力XSL-FOファイル
        input: PathBuf,
        /// 出力PDFファイル
        #[arg(short, long)]
        output: PathBuf,
    },
    /// XSL-FO文書の署名を表示する
    Sign {
        /// 入力XSL-FOファイル
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            endpoint,
            input,
            output,
        } => {
            let document = tokio::fs::read(&input).await?;
            let client = FopClient::new(endpoint, cli.secret);
            let pdf = client.convert(&document).await?;
            tokio::fs::write(&output, &pdf).await?;
            tracing::info!(
                output = %output.display(),
                bytes = pdf.len(),
                "PDFを保存しました"
            );
        }
        Commands::Sign { input } => {
            let document = tokio::fs::read(&input).await?;
            client::check_well_formed(&document)?;
            // エンドポイントは署名に使わない
            let client = FopClient::new(String::new(), cli.secret);
            println!("{}", client.sign(&document)?);
        }
    }

    Ok(())
}
