//! 成果物の書き出し

use anyhow::{Context, Result};
use ipalab_core::{Artifact, LabOutput, helper_dir};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 出力ディレクトリへの書き出し
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 生成結果をすべて書き出す（ロールの成果物は最後）
    pub fn write_output(&self, output: &LabOutput) -> Result<()> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                self.output_dir.display()
            )
        })?;
        self.write_file(Path::new("compose.yml"), &output.compose_yaml()?)?;
        self.write_file(Path::new("inventory.yml"), &output.inventory_yaml()?)?;
        self.write_file(Path::new("requirements.yml"), &output.requirements_yaml()?)?;
        self.write_file(Path::new("hosts"), &output.hosts)?;
        for artifact in &output.artifacts {
            self.write_artifact(artifact)?;
        }
        Ok(())
    }

    pub fn write_artifact(&self, artifact: &Artifact) -> Result<()> {
        match artifact {
            Artifact::File { path, contents } => self.write_file(path, contents),
            Artifact::Copy { source, dest_dir } => self.copy(source, dest_dir),
            Artifact::Helper(name) => self.write_helper(name),
            Artifact::Directory(path) => self.create_dir(path),
        }
    }

    fn target(&self, relative: &Path) -> PathBuf {
        self.output_dir.join(relative)
    }

    fn create_dir(&self, relative: &Path) -> Result<()> {
        let target = self.target(relative);
        fs::create_dir_all(&target)
            .with_context(|| format!("Failed to create directory {}", target.display()))
    }

    fn write_file(&self, relative: &Path, contents: &str) -> Result<()> {
        let target = self.target(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(&target, contents)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        debug!(path = %target.display(), "Wrote file");
        Ok(())
    }

    /// 組み込みヘルパーディレクトリを展開
    fn write_helper(&self, name: &str) -> Result<()> {
        let files = helper_dir(name)
            .with_context(|| format!("Unknown helper directory '{}'", name))?;
        for file in files {
            self.write_file(Path::new(file.path), file.contents)?;
        }
        Ok(())
    }

    /// ファイルは `dest_dir/<basename>` へ、ディレクトリは `dest_dir/<dirname>/` 以下へ再帰コピー
    fn copy(&self, source: &Path, dest_dir: &Path) -> Result<()> {
        let name = source
            .file_name()
            .with_context(|| format!("Invalid source path {}", source.display()))?;
        if source.is_dir() {
            let root = dest_dir.join(name);
            self.create_dir(&root)?;
            for file in find_files(source, &["**/*"])? {
                let relative = file.strip_prefix(source).with_context(|| {
                    format!("{} is not inside {}", file.display(), source.display())
                })?;
                self.copy_file(&file, &root.join(relative))?;
            }
            Ok(())
        } else {
            self.copy_file(source, &dest_dir.join(name))
        }
    }

    fn copy_file(&self, source: &Path, relative: &Path) -> Result<()> {
        let target = self.target(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::copy(source, &target).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                source.display(),
                target.display()
            )
        })?;
        debug!(source = %source.display(), target = %target.display(), "Copied file");
        Ok(())
    }

    /// Containerfile を `containerfiles/` へ追加
    pub fn add_containerfile(&self, path: &Path) -> Result<()> {
        self.copy(path, Path::new("containerfiles"))
    }

    /// プレイブックを `playbooks/` へ追加
    ///
    /// ディレクトリの場合は `.yml`/`.yaml` ファイルを再帰的に探して追加する。
    pub fn add_playbook(&self, path: &Path) -> Result<()> {
        let playbooks = Path::new("playbooks");
        if path.is_dir() {
            let files = find_files(path, &["**/*.yml", "**/*.yaml"])?;
            if files.is_empty() {
                warn!(path = %path.display(), "No playbooks found in directory");
            }
            for file in files {
                self.copy(&file, playbooks)?;
            }
            Ok(())
        } else {
            self.copy(path, playbooks)
        }
    }
}

/// ディレクトリ内のファイルを glob パターンで検索（パス順）
fn find_files(dir: &Path, patterns: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let pattern = dir.join(pattern);
        let pattern = pattern.to_string_lossy();
        for entry in glob::glob(&pattern)
            .with_context(|| format!("Invalid glob pattern {}", pattern))?
        {
            let path = entry.context("Failed to read directory entry")?;
            if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_helper_and_file() {
        let out = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(out.path());
        writer
            .write_artifact(&Artifact::Helper("containerfiles".to_string()))
            .unwrap();
        writer
            .write_artifact(&Artifact::file("unbound/domains", "private-domain: a\n"))
            .unwrap();

        assert!(out.path().join("containerfiles/fedora").is_file());
        assert_eq!(
            fs::read_to_string(out.path().join("unbound/domains")).unwrap(),
            "private-domain: a\n"
        );
    }

    #[test]
    fn test_copy_directory() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("data/nested")).unwrap();
        fs::write(src.path().join("data/a.txt"), "a").unwrap();
        fs::write(src.path().join("data/nested/b.txt"), "b").unwrap();

        let out = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(out.path());
        writer
            .write_artifact(&Artifact::Copy {
                source: src.path().join("data"),
                dest_dir: ".".into(),
            })
            .unwrap();

        assert!(out.path().join("data/a.txt").is_file());
        assert!(out.path().join("data/nested/b.txt").is_file());
    }

    #[test]
    fn test_add_playbook_directory() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("plays/sub")).unwrap();
        fs::write(src.path().join("plays/one.yml"), "---\n").unwrap();
        fs::write(src.path().join("plays/sub/two.yaml"), "---\n").unwrap();
        fs::write(src.path().join("plays/README.md"), "docs").unwrap();

        let out = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(out.path());
        writer.add_playbook(&src.path().join("plays")).unwrap();

        assert!(out.path().join("playbooks/one.yml").is_file());
        assert!(out.path().join("playbooks/two.yaml").is_file());
        assert!(!out.path().join("playbooks/README.md").exists());
    }

    #[test]
    fn test_missing_source_fails() {
        let out = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(out.path());
        assert!(writer.add_containerfile(Path::new("/nonexistent/rocky")).is_err());
    }
}
