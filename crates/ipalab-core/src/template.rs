//! テンプレート展開機能
//!
//! Teraを使用してロールが出力する設定ファイルを生成します。

use crate::error::Result;
use serde::Serialize;
use tera::{Context, Tera};

/// テンプレートプロセッサ
pub struct TemplateProcessor {
    tera: Tera,
    context: Context,
}

impl TemplateProcessor {
    /// 新しいテンプレートプロセッサを作成
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
            context: Context::new(),
        }
    }

    /// 変数を追加
    pub fn insert<T: Serialize + ?Sized>(&mut self, key: impl Into<String>, value: &T) {
        self.context.insert(key.into(), value);
    }

    /// 文字列テンプレートを展開
    pub fn render_str(&mut self, template: &str) -> Result<String> {
        Ok(self.tera.render_str(template, &self.context)?)
    }
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        Self::new()
    }
}
