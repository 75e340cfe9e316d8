//! ホスト名・コンテナ名の解決
//!
//! compose と inventory の両方から独立に呼ばれるため、
//! すべて入力のみに依存する純粋関数。

use crate::model::Host;

/// ドットを含まない名前をドメインで修飾する
pub fn ensure_fqdn(hostname: &str, domain: &str) -> String {
    if hostname.contains('.') {
        hostname.to_string()
    } else {
        format!("{}.{}", hostname, domain)
    }
}

/// ホストのFQDNを解決
///
/// 明示的な `hostname` があればそれを、なければ `fallback_name` を使う。
pub fn resolve_hostname(host: &Host, fallback_name: &str, domain: &str) -> String {
    let hostname = host.hostname.as_deref().unwrap_or(fallback_name);
    ensure_fqdn(hostname, domain)
}

/// コンテナ名を解決
pub fn resolve_container_name(host: &Host, domain: &str, container_fqdn: bool) -> String {
    if container_fqdn {
        resolve_hostname(host, &host.name, domain)
    } else {
        host.name.clone()
    }
}

/// デプロイメント名から inventory のグループ名を作る（`.` → `_`）
pub fn deployment_group_name(name: &str) -> String {
    name.replace('.', "_")
}

/// ラボ名から inventory の最上位グループ名を作る（`-` → `_`）
pub fn lab_group_name(name: &str) -> String {
    name.replace('-', "_")
}
