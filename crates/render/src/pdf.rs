//! # PDF出力
//!
//! 割り付け済みのページをlopdfでPDFとして書き出す。
//! フォントは標準14フォントのHelvetica（WinAnsiEncoding）のみを使う。

use std::io::Write;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

use crate::error::{RenderError, Result};
use crate::layout::{LaidOutSequence, Page};

/// ページリソース上のフォント名
const FONT_NAME: &str = "F1";

/// PDFのProducer
const PRODUCER: &str = concat!("fopfn-render ", env!("CARGO_PKG_VERSION"));

/// 全シーケンスのページを一つのPDFに書き出す。
pub fn write_pdf<W: Write>(sequences: &[LaidOutSequence], out: &mut W) -> Result<()> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { FONT_NAME => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in sequences.iter().flat_map(|seq| seq.pages.iter()) {
        let content = page_content(page)
            .encode()
            .map_err(|e| RenderError::Pdf(format!("コンテンツストリームの生成に失敗: {e}")))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                page.width.into(),
                page.height.into(),
            ],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    doc.compress();
    doc.save_to(out)
        .map_err(|e| RenderError::Pdf(format!("PDFの書き出しに失敗: {e}")))?;
    Ok(())
}

fn page_content(page: &Page) -> Content {
    let mut operations = Vec::with_capacity(page.lines.len() * 5);
    for line in &page.lines {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![FONT_NAME.into(), line.font_size.into()],
        ));
        operations.push(Operation::new("Td", vec![line.x.into(), line.y.into()]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(encode_latin1(&line.text), StringFormat::Literal)],
        ));
        operations.push(Operation::new("ET", vec![]));
    }
    Content { operations }
}

/// WinAnsiEncodingで表現できない文字は `?` に置き換える。
fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ 0x20..=0x7e | code @ 0xa0..=0xff => code as u8,
            _ => b'?',
        })
        .collect()
}
