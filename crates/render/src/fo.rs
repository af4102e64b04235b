//! # XSL-FO文書の解析
//!
//! FO文書を読み取り、レイアウトに必要な情報（ページマスターと
//! ページシーケンスごとの段落列）に変換する。
//!
//! 対応する語彙は組版に影響する最小限のサブセットで、
//! `static-content` や外部グラフィック等は読み飛ばす。

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;

use crate::config::EngineConfig;
use crate::error::{RenderError, Result};
use crate::units::{parse_font_size, parse_length};

/// XSL-FOの名前空間URI
pub const FO_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Format";

/// `font-size` の初期値（pt）
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// 段落境界を作る要素
const BLOCK_ELEMENTS: &[&str] = &[
    "block",
    "block-container",
    "list-block",
    "list-item",
    "table-and-caption",
    "table-caption",
    "table",
    "table-header",
    "table-footer",
    "table-body",
    "table-row",
];

/// テキストを親の段落に流し込む要素
const INLINE_ELEMENTS: &[&str] = &[
    "inline",
    "inline-container",
    "wrapper",
    "basic-link",
    "page-number",
    "page-number-citation",
    "page-number-citation-last",
    "leader",
    "character",
    "footnote",
    "footnote-body",
    "list-item-label",
    "list-item-body",
    "table-cell",
    "table-column",
    "marker",
    "retrieve-marker",
    "float",
    "initial-property-set",
];

/// 内容ごと読み飛ばす要素
const SKIPPED_ELEMENTS: &[&str] = &[
    "static-content",
    "title",
    "declarations",
    "bookmark-tree",
    "instream-foreign-object",
    "external-graphic",
    "folio-prefix",
    "folio-suffix",
];

/// ページ構造を定義する要素（個別に処理しないもの）
const STRUCTURE_ELEMENTS: &[&str] = &[
    "layout-master-set",
    "repeatable-page-master-alternatives",
    "region-before",
    "region-after",
    "region-start",
    "region-end",
];

/// ページ四辺の余白（pt）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    fn add(self, other: Margins) -> Margins {
        Margins {
            top: self.top + other.top,
            right: self.right + other.right,
            bottom: self.bottom + other.bottom,
            left: self.left + other.left,
        }
    }
}

/// `fo:simple-page-master` から得たページの寸法。
///
/// `margins` はページマスターと `region-body` の余白の合計で、本文領域を表す。
#[derive(Debug, Clone, PartialEq)]
pub struct PageMaster {
    pub name: String,
    pub width: f32,
    pub height: f32,
    pub margins: Margins,
}

/// 行揃え
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextAlign {
    #[default]
    Start,
    Center,
    End,
    /// 両端揃え（最終行と同じく先頭揃えで配置する）
    Justify,
}

impl TextAlign {
    fn parse(value: &str, parent: TextAlign) -> TextAlign {
        match value.trim() {
            "center" => TextAlign::Center,
            "end" | "right" | "outside" => TextAlign::End,
            "justify" => TextAlign::Justify,
            "inherit" => parent,
            _ => TextAlign::Start,
        }
    }
}

/// 連続したテキストからなる段落。
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    /// 空白を正規化したテキスト
    pub text: String,
    pub font_size: f32,
    pub align: TextAlign,
}

/// フロー内の要素。
#[derive(Debug, Clone, PartialEq)]
pub enum FlowItem {
    Paragraph(Paragraph),
    /// 段落間の垂直方向の空き（pt）
    Space(f32),
    /// 強制改ページ
    PageBreak,
}

/// `fo:page-sequence` 一つ分の内容。
#[derive(Debug, Clone, PartialEq)]
pub struct PageSequence {
    /// `id` 属性（未指定なら空文字列）
    pub id: String,
    pub master: PageMaster,
    pub items: Vec<FlowItem>,
}

/// 解析済みのFO文書。
#[derive(Debug, Clone, PartialEq)]
pub struct FoDocument {
    pub sequences: Vec<PageSequence>,
}

impl FoDocument {
    /// FO文書を解析する。
    ///
    /// 整形式でないXML、`fo:root` 以外のルート要素、ページシーケンスの欠落、
    /// 未定義のページマスター参照はエラーとする。
    pub fn parse(xml: &[u8], config: &EngineConfig) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        let mut parser = FoParser::new(config);
        let mut buf = Vec::new();

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                RenderError::Fo(format!(
                    "XMLの構文エラー (位置 {}): {e}",
                    reader.buffer_position()
                ))
            })?;

            match event {
                Event::Start(e) => parser.start(&e)?,
                Event::Empty(e) => {
                    parser.start(&e)?;
                    parser.end(e.name())?;
                }
                Event::End(e) => parser.end(e.name())?,
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| RenderError::Fo(format!("テキストの解析に失敗: {e}")))?;
                    parser.text(&text)?;
                }
                Event::CData(c) => {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    parser.text(&text)?;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        parser.finish()
    }
}

// ---------------------------------------------------------------------------
// パーサー本体
// ---------------------------------------------------------------------------

/// 属性（修飾名, 値）の一覧
type Attributes = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootState {
    NotSeen,
    Open,
    Closed,
}

/// 解析中のページシーケンス
struct SequenceBuilder {
    id: String,
    master_reference: String,
    items: Vec<FlowItem>,
    /// `fo:flow` を既に開いたか
    flow_seen: bool,
}

/// 開いているブロックの書式と未確定のテキスト
struct BlockContext {
    font_size: f32,
    align: TextAlign,
    text: String,
    space_after: f32,
    break_after: bool,
}

struct FoParser<'a> {
    config: &'a EngineConfig,
    root: RootState,
    /// FO名前空間に束縛された接頭辞（既定名前空間なら `None`）
    fo_prefix: Option<Vec<u8>>,
    /// `fo:root` 内の要素の深さ
    depth: usize,
    /// 読み飛ばし中の要素の深さ（0なら読み飛ばしていない）
    skip_depth: usize,
    masters: HashMap<String, PageMaster>,
    /// `page-sequence-master` 名 → 最初に参照する `simple-page-master` 名
    sequence_masters: HashMap<String, String>,
    current_master: Option<PageMaster>,
    current_sequence_master: Option<(String, Option<String>)>,
    current_sequence: Option<SequenceBuilder>,
    blocks: Vec<BlockContext>,
    sequences: Vec<PageSequence>,
}

impl<'a> FoParser<'a> {
    fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            root: RootState::NotSeen,
            fo_prefix: None,
            depth: 0,
            skip_depth: 0,
            masters: HashMap::new(),
            sequence_masters: HashMap::new(),
            current_master: None,
            current_sequence_master: None,
            current_sequence: None,
            blocks: Vec::new(),
            sequences: Vec::new(),
        }
    }

    fn start(&mut self, e: &BytesStart) -> Result<()> {
        match self.root {
            RootState::NotSeen => return self.open_root(e),
            RootState::Closed => {
                return Err(RenderError::Fo(
                    "ルート要素の後に要素があります".to_string(),
                ))
            }
            RootState::Open => {}
        }

        self.depth += 1;
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return Ok(());
        }

        let (is_fo, local) = self.classify(e.name());
        if !is_fo {
            self.skip_depth = 1;
            return Ok(());
        }

        let attrs = read_attributes(e)?;
        self.open_fo(&local, &attrs)
    }

    fn end(&mut self, name: QName) -> Result<()> {
        if self.depth == 0 {
            self.root = RootState::Closed;
            return Ok(());
        }

        self.depth -= 1;
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return Ok(());
        }

        let (_, local) = self.classify(name);
        self.close_fo(&local)
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if self.root != RootState::Open {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(RenderError::Fo(
                "ルート要素の外にテキストがあります。文書がXMLではない可能性があります".to_string(),
            ));
        }
        if self.skip_depth > 0 {
            return Ok(());
        }
        if let Some(ctx) = self.blocks.last_mut() {
            ctx.text.push_str(text);
        }
        Ok(())
    }

    fn finish(self) -> Result<FoDocument> {
        match self.root {
            RootState::NotSeen => {
                return Err(RenderError::Fo("fo:root要素がありません".to_string()))
            }
            RootState::Open => {
                return Err(RenderError::Fo(
                    "閉じられていない要素があります".to_string(),
                ))
            }
            RootState::Closed => {}
        }
        if self.sequences.is_empty() {
            return Err(RenderError::Fo(
                "fo:page-sequenceが一つもありません".to_string(),
            ));
        }
        Ok(FoDocument {
            sequences: self.sequences,
        })
    }

    /// ルート要素を検証し、FO名前空間の接頭辞を確定する。
    fn open_root(&mut self, e: &BytesStart) -> Result<()> {
        let attrs = read_attributes(e)?;
        let name = e.name();
        let own_prefix = name.prefix().map(|p| p.as_ref().to_vec());

        let bound_to_fo = attrs.iter().any(|(key, value)| {
            let declared = if key == "xmlns" {
                Some(None)
            } else {
                key.strip_prefix("xmlns:").map(|p| Some(p.as_bytes().to_vec()))
            };
            value == FO_NAMESPACE && declared.as_ref() == Some(&own_prefix)
        });

        if name.local_name().as_ref() != b"root" || !bound_to_fo {
            return Err(RenderError::Fo(format!(
                "ルート要素はXSL-FO名前空間のfo:rootである必要があります: {}",
                String::from_utf8_lossy(name.as_ref())
            )));
        }

        self.fo_prefix = own_prefix;
        self.root = RootState::Open;
        Ok(())
    }

    /// 要素がFO名前空間に属するかとローカル名を返す。
    fn classify(&self, name: QName) -> (bool, String) {
        let prefix = name.prefix().map(|p| p.as_ref().to_vec());
        let local = String::from_utf8_lossy(name.local_name().as_ref()).into_owned();
        (prefix == self.fo_prefix, local)
    }

    fn open_fo(&mut self, local: &str, attrs: &Attributes) -> Result<()> {
        match local {
            "root" => {
                return Err(RenderError::Fo(
                    "fo:rootは入れ子にできません".to_string(),
                ))
            }
            "simple-page-master" => {
                let name = required(attrs, "master-name", local)?;
                let width = match attr(attrs, "page-width") {
                    Some(v) if v != "auto" && v != "indefinite" => parse_length(v)?,
                    _ => self.config.page_width,
                };
                let height = match attr(attrs, "page-height") {
                    Some(v) if v != "auto" && v != "indefinite" => parse_length(v)?,
                    _ => self.config.page_height,
                };
                self.current_master = Some(PageMaster {
                    name: name.to_string(),
                    width,
                    height,
                    margins: parse_margins(attrs)?,
                });
            }
            "region-body" => {
                let region = parse_margins(attrs)?;
                if let Some(master) = self.current_master.as_mut() {
                    master.margins = master.margins.add(region);
                }
            }
            "page-sequence-master" => {
                let name = required(attrs, "master-name", local)?;
                self.current_sequence_master = Some((name.to_string(), None));
            }
            "single-page-master-reference"
            | "repeatable-page-master-reference"
            | "conditional-page-master-reference" => {
                let reference = required(attrs, "master-reference", local)?;
                if let Some((_, first)) = self.current_sequence_master.as_mut() {
                    if first.is_none() {
                        *first = Some(reference.to_string());
                    }
                }
            }
            "page-sequence" => {
                if self.current_sequence.is_some() {
                    return Err(RenderError::Fo(
                        "fo:page-sequenceは入れ子にできません".to_string(),
                    ));
                }
                let master_reference = required(attrs, "master-reference", local)?;
                self.current_sequence = Some(SequenceBuilder {
                    id: attr(attrs, "id").unwrap_or_default().to_string(),
                    master_reference: master_reference.to_string(),
                    items: Vec::new(),
                    flow_seen: false,
                });
            }
            "flow" => {
                let Some(seq) = self.current_sequence.as_mut() else {
                    return Err(RenderError::Fo(
                        "fo:flowはfo:page-sequenceの中に置く必要があります".to_string(),
                    ));
                };
                if seq.flow_seen {
                    return Err(RenderError::Fo(
                        "fo:page-sequenceにfo:flowが複数あります".to_string(),
                    ));
                }
                seq.flow_seen = true;
                self.blocks.push(BlockContext {
                    font_size: DEFAULT_FONT_SIZE,
                    align: TextAlign::Start,
                    text: String::new(),
                    space_after: 0.0,
                    break_after: false,
                });
            }
            "character" => {
                if let Some(ctx) = self.blocks.last_mut() {
                    ctx.text.push_str(attr(attrs, "character").unwrap_or_default());
                }
            }
            "leader" | "table-cell" | "list-item-body" => {
                if let Some(ctx) = self.blocks.last_mut() {
                    ctx.text.push(' ');
                }
            }
            name if SKIPPED_ELEMENTS.contains(&name) => self.skip_depth = 1,
            name if BLOCK_ELEMENTS.contains(&name) => self.open_block(name, attrs)?,
            name if INLINE_ELEMENTS.contains(&name) || STRUCTURE_ELEMENTS.contains(&name) => {}
            other => {
                if self.config.strict_validation {
                    return Err(RenderError::Fo(format!("未知のFO要素です: fo:{other}")));
                }
            }
        }
        Ok(())
    }

    fn close_fo(&mut self, local: &str) -> Result<()> {
        match local {
            "simple-page-master" => {
                if let Some(master) = self.current_master.take() {
                    self.masters.insert(master.name.clone(), master);
                }
            }
            "page-sequence-master" => {
                if let Some((name, first)) = self.current_sequence_master.take() {
                    let first = first.ok_or_else(|| {
                        RenderError::Fo(format!(
                            "page-sequence-master {name} がページマスターを参照していません"
                        ))
                    })?;
                    self.sequence_masters.insert(name, first);
                }
            }
            "flow" => {
                self.flush_text();
                self.blocks.clear();
            }
            "page-sequence" => {
                if let Some(seq) = self.current_sequence.take() {
                    let master = self.resolve_master(&seq.master_reference)?;
                    self.sequences.push(PageSequence {
                        id: seq.id,
                        master,
                        items: seq.items,
                    });
                }
            }
            name if BLOCK_ELEMENTS.contains(&name) && self.blocks.len() > 1 => {
                self.close_block();
            }
            _ => {}
        }
        Ok(())
    }

    fn open_block(&mut self, name: &str, attrs: &Attributes) -> Result<()> {
        let Some(parent) = self.blocks.last() else {
            // フロー外のブロック（ページシーケンス外など）は配置しない
            if self.config.strict_validation {
                return Err(RenderError::Fo(format!(
                    "fo:{name}はfo:flowの中に置く必要があります"
                )));
            }
            self.skip_depth = 1;
            return Ok(());
        };

        let font_size = match attr(attrs, "font-size") {
            Some(v) => parse_font_size(v, parent.font_size)?,
            None => parent.font_size,
        };
        let align = match attr(attrs, "text-align") {
            Some(v) => TextAlign::parse(v, parent.align),
            None => parent.align,
        };
        let space_before = first_length(attrs, &["space-before", "space-before.optimum", "margin-top"])?;
        let space_after = first_length(attrs, &["space-after", "space-after.optimum", "margin-bottom"])?;
        let break_before = attr(attrs, "break-before").is_some_and(is_page_break);
        let break_after = attr(attrs, "break-after").is_some_and(is_page_break);

        self.flush_text();
        if break_before {
            self.push_item(FlowItem::PageBreak);
        }
        if space_before > 0.0 {
            self.push_item(FlowItem::Space(space_before));
        }

        self.blocks.push(BlockContext {
            font_size,
            align,
            text: String::new(),
            space_after,
            break_after,
        });
        Ok(())
    }

    fn close_block(&mut self) {
        self.flush_text();
        if let Some(ctx) = self.blocks.pop() {
            if ctx.space_after > 0.0 {
                self.push_item(FlowItem::Space(ctx.space_after));
            }
            if ctx.break_after {
                self.push_item(FlowItem::PageBreak);
            }
        }
    }

    /// 最内ブロックの未確定テキストを段落として確定する。
    fn flush_text(&mut self) {
        let Some(ctx) = self.blocks.last_mut() else {
            return;
        };
        let text = collapse_whitespace(&ctx.text);
        ctx.text.clear();
        if text.is_empty() {
            return;
        }
        let paragraph = Paragraph {
            text,
            font_size: ctx.font_size,
            align: ctx.align,
        };
        self.push_item(FlowItem::Paragraph(paragraph));
    }

    fn push_item(&mut self, item: FlowItem) {
        if let Some(seq) = self.current_sequence.as_mut() {
            seq.items.push(item);
        }
    }

    fn resolve_master(&self, reference: &str) -> Result<PageMaster> {
        let name = self
            .sequence_masters
            .get(reference)
            .map(String::as_str)
            .unwrap_or(reference);
        self.masters.get(name).cloned().ok_or_else(|| {
            RenderError::Fo(format!("ページマスター {reference} が定義されていません"))
        })
    }
}

// ---------------------------------------------------------------------------
// ユーティリティ
// ---------------------------------------------------------------------------

fn read_attributes(e: &BytesStart) -> Result<Attributes> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| RenderError::Fo(format!("属性の解析に失敗: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| RenderError::Fo(format!("属性値の解析に失敗: {e}")))?
            .into_owned();
        out.push((key, value));
    }
    Ok(out)
}

fn attr<'a>(attrs: &'a Attributes, name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn required<'a>(attrs: &'a Attributes, name: &str, element: &str) -> Result<&'a str> {
    attr(attrs, name).ok_or_else(|| {
        RenderError::Fo(format!("fo:{element}に{name}属性がありません"))
    })
}

fn first_length(attrs: &Attributes, names: &[&str]) -> Result<f32> {
    match names.iter().find_map(|name| attr(attrs, name)) {
        Some(value) => parse_length(value),
        None => Ok(0.0),
    }
}

fn is_page_break(value: &str) -> bool {
    matches!(value.trim(), "page" | "even-page" | "odd-page")
}

/// `margin` 一括指定（1〜4値）と `margin-*` 個別指定から余白を求める。
fn parse_margins(attrs: &Attributes) -> Result<Margins> {
    let mut margins = Margins::default();

    if let Some(shorthand) = attr(attrs, "margin") {
        let values = shorthand
            .split_whitespace()
            .map(parse_length)
            .collect::<Result<Vec<f32>>>()?;
        let (top, right, bottom, left) = match values.as_slice() {
            [all] => (*all, *all, *all, *all),
            [vertical, horizontal] => (*vertical, *horizontal, *vertical, *horizontal),
            [top, horizontal, bottom] => (*top, *horizontal, *bottom, *horizontal),
            [top, right, bottom, left] => (*top, *right, *bottom, *left),
            _ => return Err(RenderError::InvalidLength(shorthand.to_string())),
        };
        margins = Margins {
            top,
            right,
            bottom,
            left,
        };
    }

    if let Some(v) = attr(attrs, "margin-top") {
        margins.top = parse_length(v)?;
    }
    if let Some(v) = attr(attrs, "margin-right") {
        margins.right = parse_length(v)?;
    }
    if let Some(v) = attr(attrs, "margin-bottom") {
        margins.bottom = parse_length(v)?;
    }
    if let Some(v) = attr(attrs, "margin-left") {
        margins.left = parse_length(v)?;
    }

    Ok(margins)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
