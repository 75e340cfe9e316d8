//! 組み込みヘルパーファイル
//!
//! 出力ディレクトリへ展開されるコンテナ定義・プレイブックなど。

/// 組み込みファイル（パスはヘルパーディレクトリ名を含む相対パス）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedFile {
    pub path: &'static str,
    pub contents: &'static str,
}

macro_rules! embedded {
    ($path:literal) => {
        EmbeddedFile {
            path: $path,
            contents: include_str!(concat!("../data/", $path)),
        }
    };
}

const CONTAINERFILES: &[EmbeddedFile] = &[
    embedded!("containerfiles/fedora"),
    embedded!("containerfiles/c10s"),
    embedded!("containerfiles/c9s"),
    embedded!("containerfiles/external-nodes"),
];

const PLAYBOOKS: &[EmbeddedFile] = &[embedded!("playbooks/install-cluster.yml")];

const UNBOUND: &[EmbeddedFile] = &[
    embedded!("unbound/Containerfile"),
    embedded!("unbound/unbound.conf"),
];

const KEYCLOAK: &[EmbeddedFile] = &[embedded!("keycloak/Containerfile")];

/// Samba AD DC のデプロイ用プレイブック
pub const DEPLOY_ADDC_PLAYBOOK: &str = include_str!("../data/samba-addc/deploy_addc.yml");

/// 常に出力されるヘルパーディレクトリ
pub const DEFAULT_HELPERS: [&str; 2] = ["containerfiles", "playbooks"];

/// ヘルパーディレクトリ名から組み込みファイルを取得
pub fn helper_dir(name: &str) -> Option<&'static [EmbeddedFile]> {
    match name.trim_end_matches('/') {
        "containerfiles" => Some(CONTAINERFILES),
        "playbooks" => Some(PLAYBOOKS),
        "unbound" => Some(UNBOUND),
        "keycloak" => Some(KEYCLOAK),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_dirs() {
        for name in DEFAULT_HELPERS {
            let files = helper_dir(name).unwrap();
            assert!(!files.is_empty());
            assert!(files.iter().all(|file| file.path.starts_with(name)));
        }
        assert!(helper_dir("unbound/").is_some());
        assert!(helper_dir("missing").is_none());
    }

    #[test]
    fn test_default_containerfile_uses_tag() {
        let fedora = helper_dir("containerfiles")
            .unwrap()
            .iter()
            .find(|file| file.path == "containerfiles/fedora")
            .unwrap();
        assert!(fedora.contents.contains("ARG tag"));
        assert!(DEPLOY_ADDC_PLAYBOOK.contains("role_addc"));
    }
}
