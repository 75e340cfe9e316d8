mod writer;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use ipalab_core::{Overrides, apply_overrides, generate, load_lab};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;
use writer::ArtifactWriter;

#[derive(Parser)]
#[command(name = "ipalab-config")]
#[command(version)]
#[command(about = "Generate compose and inventory configuration for a FreeIPA lab.", long_about = None)]
struct Cli {
    /// ラボ記述ファイル（YAML）
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// 出力ディレクトリ（既定値はラボ名）
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// イメージ作成に使う Containerfile（複数指定可）
    #[arg(short = 'f', long = "file", value_name = "CONTAINERFILE")]
    containerfiles: Vec<PathBuf>,

    /// playbooks ディレクトリに追加するプレイブック（ディレクトリは .yml/.yaml を再帰検索）
    #[arg(short, long = "playbook", value_name = "PLAYBOOK")]
    playbooks: Vec<PathBuf>,

    /// 既定の distro（DISTRO または DISTRO:TAG）
    #[arg(short, long, value_name = "DISTRO", env = "IPALAB_DISTRO")]
    distro: Option<String>,

    /// 全ノードの /var/log をホストにマウント
    #[arg(short = 'l', long)]
    mount_varlog: bool,

    /// デバッグログを出力し、エラーを詳細表示
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<PathBuf> {
    let mut lab = load_lab(&cli.config)?;
    apply_overrides(
        &mut lab,
        &Overrides {
            distro: cli.distro.clone(),
            mount_varlog: cli.mount_varlog,
        },
    )?;

    let config_dir = cli
        .config
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let output = generate(&lab, config_dir)?;

    let output_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&lab.lab_name));
    let writer = ArtifactWriter::new(&output_dir);
    writer
        .write_output(&output)
        .with_context(|| format!("Failed to write lab '{}'", lab.lab_name))?;
    for containerfile in &cli.containerfiles {
        writer.add_containerfile(containerfile)?;
    }
    for playbook in &cli.playbooks {
        writer.add_playbook(playbook)?;
    }

    info!(
        output = %writer.output_dir().display(),
        services = output.compose.services.len(),
        "Lab configuration written"
    );
    Ok(output_dir)
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(&cli) {
        Ok(output_dir) => {
            println!(
                "{} {}",
                "✓".green(),
                format!("Lab configuration written to {}", output_dir.display()).bold()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if cli.debug => Err(e),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}
