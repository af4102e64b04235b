//! # 長さ・フォントサイズの解釈
//!
//! XSL-FOの長さ指定をポイント（1/72インチ）に変換する。

use crate::error::{RenderError, Result};

/// 1インチあたりのポイント数
const POINTS_PER_INCH: f32 = 72.0;

/// `medium` に相当するフォントサイズ（pt）
const MEDIUM_FONT_SIZE: f32 = 12.0;

/// 相対キーワード `larger` / `smaller` の倍率
const FONT_SCALE_STEP: f32 = 1.2;

/// 長さ指定をポイントに変換する。
///
/// 対応単位: `pt`, `px`, `pc`, `in`, `cm`, `mm`。単位なしはポイントとして扱う。
pub fn parse_length(value: &str) -> Result<f32> {
    let value = value.trim();
    let split = value
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);

    let number: f32 = number
        .trim()
        .parse()
        .map_err(|_| RenderError::InvalidLength(value.to_string()))?;
    if !number.is_finite() {
        return Err(RenderError::InvalidLength(value.to_string()));
    }

    let factor = match unit {
        "" | "pt" => 1.0,
        "px" => 0.75,
        "pc" => 12.0,
        "in" => POINTS_PER_INCH,
        "cm" => POINTS_PER_INCH / 2.54,
        "mm" => POINTS_PER_INCH / 25.4,
        _ => return Err(RenderError::InvalidLength(value.to_string())),
    };

    let points = number * factor;
    if !points.is_finite() {
        return Err(RenderError::InvalidLength(value.to_string()));
    }
    Ok(points)
}

/// `font-size` 属性をポイントに変換する。
///
/// 絶対キーワード、相対キーワード、`%`、`em` は親のフォントサイズを基準に解釈する。
pub fn parse_font_size(value: &str, parent: f32) -> Result<f32> {
    let value = value.trim();
    let size = match value {
        "xx-small" => MEDIUM_FONT_SIZE * 0.6,
        "x-small" => MEDIUM_FONT_SIZE * 0.75,
        "small" => MEDIUM_FONT_SIZE * 0.89,
        "medium" => MEDIUM_FONT_SIZE,
        "large" => MEDIUM_FONT_SIZE * FONT_SCALE_STEP,
        "x-large" => MEDIUM_FONT_SIZE * 1.5,
        "xx-large" => MEDIUM_FONT_SIZE * 2.0,
        "larger" => parent * FONT_SCALE_STEP,
        "smaller" => parent / FONT_SCALE_STEP,
        "inherit" => parent,
        _ => {
            if let Some(percent) = value.strip_suffix('%') {
                parent * parse_ratio(percent, value)? / 100.0
            } else if let Some(em) = value.strip_suffix("em") {
                parent * parse_ratio(em, value)?
            } else {
                parse_length(value)?
            }
        }
    };

    if size <= 0.0 {
        return Err(RenderError::InvalidLength(value.to_string()));
    }
    Ok(size)
}

fn parse_ratio(number: &str, original: &str) -> Result<f32> {
    number
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| RenderError::InvalidLength(original.to_string()))
}
