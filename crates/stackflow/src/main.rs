mod commands;
mod project;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackflow")]
#[command(about = "プロジェクトファイルから CloudFormation スタックをプロビジョニング", long_about = None)]
struct Cli {
    /// プロジェクトファイル（省略時はカレントディレクトリから検索）
    #[arg(short, long, global = true, env = "STACKFLOW_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 宣言されたリソースを宣言順にプロビジョニング
    Up,
    /// プロジェクトファイルを検証し、各リソースを担当するプロビジョナーを表示
    Validate,
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let success = match cli.command {
        Commands::Version => {
            println!("stackflow {}", env!("CARGO_PKG_VERSION"));
            true
        }
        Commands::Validate => commands::validate::handle(cli.config.as_deref())?,
        Commands::Up => commands::up::handle(cli.config.as_deref()).await?,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
