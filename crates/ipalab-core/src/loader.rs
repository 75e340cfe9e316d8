//! ラボ記述ファイルのローダー
//!
//! ファイル読み込み、パース、CLI 上書きの適用

use crate::error::{LabError, Result};
use crate::model::{LabModel, split_distro};
use std::path::Path;
use tracing::{debug, info, instrument};

/// コマンドラインからの上書き設定
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// `distro` または `distro:tag`（ラボ側の指定がない場合の既定値）
    pub distro: Option<String>,
    /// 全ノードで /var/log をマウント
    pub mount_varlog: bool,
}

/// "distro[:tag]" を検証して分解
pub fn parse_distro(value: &str) -> Result<(String, Option<String>)> {
    let (distro, tag) = split_distro(value.trim());
    if distro.is_empty() || distro.contains('/') {
        return Err(LabError::InvalidDistro(value.to_string()));
    }
    Ok((distro.to_string(), tag.map(String::from)))
}

/// ラボ記述ファイルを読み込む
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_lab(path: &Path) -> Result<LabModel> {
    if !path.is_file() {
        return Err(LabError::ConfigNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| LabError::io(path, e))?;
    let lab = parse_lab(&content)?;
    info!(
        lab = %lab.lab_name,
        deployments = lab.ipa_deployments.len(),
        external_hosts = lab.external_hosts().len(),
        "Lab configuration loaded"
    );
    Ok(lab)
}

/// YAML 文字列からラボ定義をパース
///
/// `distro: name:tag` 形式は `distro` と `tag` に分解される。
pub fn parse_lab(content: &str) -> Result<LabModel> {
    let mut lab: LabModel = serde_yaml::from_str(content)?;
    if let Some(value) = lab.distro.take() {
        let (distro, tag) = parse_distro(&value)?;
        lab.distro = Some(distro);
        if lab.tag.is_none() {
            lab.tag = tag;
        }
    }
    Ok(lab)
}

/// 上書き設定を適用
///
/// ラボに `distro`/`tag` が書かれていればそちらを優先する。
pub fn apply_overrides(lab: &mut LabModel, overrides: &Overrides) -> Result<()> {
    if let Some(value) = &overrides.distro {
        let (distro, tag) = parse_distro(value)?;
        if lab.distro.is_none() {
            debug!(%distro, "Using distro from command line");
            lab.distro = Some(distro);
        }
        if lab.tag.is_none() && tag.is_some() {
            lab.tag = tag;
        }
    }
    if overrides.mount_varlog {
        lab.mount_varlog = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_distro() {
        assert_eq!(
            parse_distro("fedora").unwrap(),
            ("fedora".to_string(), None)
        );
        assert_eq!(
            parse_distro("c10s:stream").unwrap(),
            ("c10s".to_string(), Some("stream".to_string()))
        );
        assert!(matches!(parse_distro(""), Err(LabError::InvalidDistro(_))));
        assert!(matches!(parse_distro(":tag"), Err(LabError::InvalidDistro(_))));
    }

    #[test]
    fn test_load_lab() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "lab_name: demo\nipa_deployments: []").unwrap();
        let lab = load_lab(file.path()).unwrap();
        assert_eq!(lab.lab_name, "demo");
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_lab(Path::new("/nonexistent/lab.yaml"));
        assert!(matches!(result, Err(LabError::ConfigNotFound(_))));
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = parse_lab("ipa_deployments: {name: [");
        assert!(matches!(result, Err(LabError::Yaml(_))));
    }

    #[test]
    fn test_apply_overrides() {
        let mut lab = LabModel::default();
        let overrides = Overrides {
            distro: Some("c9s:stream9".to_string()),
            mount_varlog: true,
        };
        apply_overrides(&mut lab, &overrides).unwrap();
        assert_eq!(lab.distro(), "c9s");
        assert_eq!(lab.tag(), "stream9");
        assert!(lab.mount_varlog);

        let mut lab = parse_lab("distro: fedora\ntag: rawhide").unwrap();
        apply_overrides(&mut lab, &overrides).unwrap();
        assert_eq!(lab.distro(), "fedora");
        assert_eq!(lab.tag(), "rawhide");

        let lab = parse_lab("distro: c10s:stream10").unwrap();
        assert_eq!(lab.distro(), "c10s");
        assert_eq!(lab.tag(), "stream10");
    }
}
