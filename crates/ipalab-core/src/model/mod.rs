//! モデル定義
//!
//! ラボ記述ファイル（入力）と compose サービス（出力）のデータモデル。

mod deployment;
mod host;
mod lab;
mod network;
mod service;

// Re-exports
pub use deployment::*;
pub use host::*;
pub use lab::*;
pub use network::*;
pub use service::*;

use serde::{Deserialize, Deserializer};

/// 単一値またはリストを受け付ける
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

pub(crate) fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
        None => Vec::new(),
    })
}

/// "distro" または "distro:tag" を分解
pub fn split_distro(value: &str) -> (&str, Option<&str>) {
    match value.split_once(':') {
        Some((distro, tag)) if !tag.is_empty() => (distro, Some(tag)),
        Some((distro, _)) => (distro, None),
        None => (value, None),
    }
}
