//! # 関数エンドポイント

pub mod convert;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use convert::handle_convert;
