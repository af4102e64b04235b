//! # ページレイアウト
//!
//! 段落を行に折り返し、本文領域に収まるようにページへ割り付ける。
//! 文字幅はHelveticaの近似値を用いる。

use crate::error::{RenderError, Result};
use crate::fo::{FlowItem, PageMaster, PageSequence, Paragraph, TextAlign};

/// 行送り（フォントサイズに対する倍率）
const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// ページ上の一行。座標はページ左下原点（pt）。
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub x: f32,
    /// ベースラインのy座標
    pub y: f32,
    pub font_size: f32,
    pub text: String,
}

/// 割り付け済みの一ページ。
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub width: f32,
    pub height: f32,
    pub lines: Vec<PlacedLine>,
}

/// 割り付け済みのページシーケンス。
#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutSequence {
    pub id: String,
    pub pages: Vec<Page>,
}

/// ページシーケンスを割り付ける。
///
/// 空のシーケンスでも1ページを出力する。
pub fn layout_sequence(seq: &PageSequence) -> Result<LaidOutSequence> {
    let mut pager = Pager::new(&seq.master)?;

    for item in &seq.items {
        match item {
            FlowItem::Paragraph(p) => pager.place_paragraph(p)?,
            FlowItem::Space(space) => pager.add_space(*space),
            FlowItem::PageBreak => pager.break_page(),
        }
    }

    Ok(LaidOutSequence {
        id: seq.id.clone(),
        pages: pager.finish(),
    })
}

/// 文字列の描画幅（pt）を求める。
pub fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(char_width).sum::<f32>() * font_size
}

/// Helveticaの字幅（em単位）の近似値
fn char_width(c: char) -> f32 {
    match c {
        ' ' | '!' | ',' | '.' | '/' | ':' | ';' | '[' | ']' | '\\' | 'f' | 't' => 0.278,
        'i' | 'j' | 'l' | '\'' | '|' => 0.222,
        'I' => 0.278,
        '(' | ')' | '-' | 'r' | '`' => 0.333,
        'm' | 'M' => 0.833,
        'w' => 0.722,
        'W' => 0.944,
        '@' => 1.015,
        '%' => 0.889,
        'A'..='Z' => 0.667,
        '0'..='9' | 'a'..='z' => 0.556,
        c if c.is_ascii() => 0.584,
        // 全角文字は1em
        c if c.len_utf8() >= 3 => 1.0,
        _ => 0.556,
    }
}

struct Pager {
    width: f32,
    height: f32,
    left: f32,
    body_width: f32,
    body_top: f32,
    body_height: f32,
    /// 現在ページで使用済みの高さ
    used: f32,
    current: Vec<PlacedLine>,
    pages: Vec<Page>,
}

impl Pager {
    fn new(master: &PageMaster) -> Result<Self> {
        let m = master.margins;
        let body_width = master.width - m.left - m.right;
        let body_height = master.height - m.top - m.bottom;
        if !(body_width.is_finite() && body_height.is_finite())
            || body_width <= 0.0
            || body_height <= 0.0
        {
            return Err(RenderError::Layout(format!(
                "ページマスター {} の本文領域が空です",
                master.name
            )));
        }

        Ok(Self {
            width: master.width,
            height: master.height,
            left: m.left,
            body_width,
            body_top: master.height - m.top,
            body_height,
            used: 0.0,
            current: Vec::new(),
            pages: Vec::new(),
        })
    }

    fn place_paragraph(&mut self, p: &Paragraph) -> Result<()> {
        let line_height = p.font_size * LINE_HEIGHT_FACTOR;
        if line_height > self.body_height {
            return Err(RenderError::Layout(format!(
                "フォントサイズ {}pt の行が本文領域に収まりません",
                p.font_size
            )));
        }

        for line in wrap_text(&p.text, p.font_size, self.body_width) {
            if self.used + line_height > self.body_height {
                self.break_page();
            }
            let width = text_width(&line, p.font_size);
            let offset = match p.align {
                TextAlign::Start | TextAlign::Justify => 0.0,
                TextAlign::Center => (self.body_width - width).max(0.0) / 2.0,
                TextAlign::End => (self.body_width - width).max(0.0),
            };
            self.current.push(PlacedLine {
                x: self.left + offset,
                y: self.body_top - self.used - p.font_size,
                font_size: p.font_size,
                text: line,
            });
            self.used += line_height;
        }
        Ok(())
    }

    fn add_space(&mut self, space: f32) {
        // ページ先頭の空きは捨てる
        if self.current.is_empty() {
            return;
        }
        self.used += space;
        if self.used > self.body_height {
            self.break_page();
        }
    }

    /// 改ページする。現在ページが空なら何もしない。
    fn break_page(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let lines = std::mem::take(&mut self.current);
        self.pages.push(Page {
            width: self.width,
            height: self.height,
            lines,
        });
        self.used = 0.0;
    }

    fn finish(mut self) -> Vec<Page> {
        if !self.current.is_empty() || self.pages.is_empty() {
            let lines = std::mem::take(&mut self.current);
            self.pages.push(Page {
                width: self.width,
                height: self.height,
                lines,
            });
        }
        self.pages
    }
}

/// 貪欲法で行を折り返す。行幅に収まらない単語は文字単位で分割する。
fn wrap_text(text: &str, font_size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let space = text_width(" ", font_size);
    let mut line_width = 0.0;

    for word in text.split_whitespace() {
        let word_width = text_width(word, font_size);

        if !line.is_empty() && line_width + space + word_width <= max_width {
            line.push(' ');
            line.push_str(word);
            line_width += space + word_width;
            continue;
        }
        if !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }

        if word_width <= max_width {
            line.push_str(word);
            line_width = word_width;
            continue;
        }

        // 長い単語の分割
        line_width = 0.0;
        for c in word.chars() {
            let w = char_width(c) * font_size;
            if !line.is_empty() && line_width + w > max_width {
                lines.push(std::mem::take(&mut line));
                line_width = 0.0;
            }
            line.push(c);
            line_width += w;
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fo::Margins;

    fn master(width: f32, height: f32, margin: f32) -> PageMaster {
        PageMaster {
            name: "test".to_string(),
            width,
            height,
            margins: Margins {
                top: margin,
                right: margin,
                bottom: margin,
                left: margin,
            },
        }
    }

    fn paragraph(text: &str, font_size: f32) -> FlowItem {
        FlowItem::Paragraph(Paragraph {
            text: text.to_string(),
            font_size,
            align: TextAlign::Start,
        })
    }

    fn sequence(master: PageMaster, items: Vec<FlowItem>) -> PageSequence {
        PageSequence {
            id: "seq".to_string(),
            master,
            items,
        }
    }

    /// 空のシーケンスでも1ページ出力されることを確認
    #[test]
    fn test_empty_sequence_has_one_page() {
        let out = layout_sequence(&sequence(master(200.0, 200.0, 10.0), vec![])).unwrap();
        assert_eq!(out.id, "seq");
        assert_eq!(out.pages.len(), 1);
        assert!(out.pages[0].lines.is_empty());
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "the quick brown fox jumps over the lazy dog ".repeat(10);
        let lines = wrap_text(&text, 12.0, 150.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, 12.0) <= 150.0, "line too wide: {line}");
        }
        let rejoined = lines.join(" ");
        assert_eq!(rejoined, text.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    /// 行幅を超える単語が文字単位で分割されることを確認
    #[test]
    fn test_wrap_splits_long_word() {
        let word = "m".repeat(40);
        let lines = wrap_text(&word, 10.0, 50.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
    }

    /// 本文領域を超える行数で自動改ページされることを確認
    #[test]
    fn test_overflow_creates_pages() {
        // 本文高さ 100pt、行送り 12pt → 1ページ8行
        let items = (0..20).map(|i| paragraph(&format!("line {i}"), 10.0)).collect();
        let out = layout_sequence(&sequence(master(300.0, 120.0, 10.0), items)).unwrap();

        assert_eq!(out.pages.len(), 3);
        assert_eq!(out.pages[0].lines.len(), 8);
        assert_eq!(out.pages[2].lines.len(), 4);
        assert_eq!(out.pages[1].lines[0].text, "line 8");
        // 各ページ先頭行は本文上端からフォントサイズ分下がったベースライン
        assert_eq!(out.pages[1].lines[0].y, 100.0);
    }

    /// 明示的な改ページでページが分かれ、先頭の改ページは無視されることを確認
    #[test]
    fn test_explicit_page_breaks() {
        let items = vec![
            FlowItem::PageBreak,
            paragraph("one", 12.0),
            FlowItem::PageBreak,
            FlowItem::PageBreak,
            paragraph("two", 12.0),
        ];
        let out = layout_sequence(&sequence(master(300.0, 300.0, 10.0), items)).unwrap();
        assert_eq!(out.pages.len(), 2);
        assert_eq!(out.pages[1].lines[0].text, "two");
    }

    #[test]
    fn test_alignment_offsets() {
        let mut seq = sequence(master(300.0, 300.0, 50.0), vec![]);
        for align in [TextAlign::Start, TextAlign::Center, TextAlign::End] {
            seq.items.push(FlowItem::Paragraph(Paragraph {
                text: "abc".to_string(),
                font_size: 10.0,
                align,
            }));
        }
        let out = layout_sequence(&seq).unwrap();
        let lines = &out.pages[0].lines;
        let width = text_width("abc", 10.0);

        assert_eq!(lines[0].x, 50.0);
        assert!((lines[1].x - (50.0 + (200.0 - width) / 2.0)).abs() < 0.001);
        assert!((lines[2].x - (250.0 - width)).abs() < 0.001);
    }

    /// 本文領域がない・行が収まらない場合にレイアウトエラーとなることを確認
    #[test]
    fn test_layout_errors() {
        let no_body = sequence(master(100.0, 100.0, 60.0), vec![]);
        assert!(matches!(layout_sequence(&no_body), Err(RenderError::Layout(_))));

        let huge = sequence(master(300.0, 100.0, 10.0), vec![paragraph("x", 200.0)]);
        assert!(matches!(layout_sequence(&huge), Err(RenderError::Layout(_))));

        let overflowing = sequence(master(300.0, 300.0, f32::MAX), vec![]);
        assert!(matches!(layout_sequence(&overflowing), Err(RenderError::Layout(_))));
    }
}
