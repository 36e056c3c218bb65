use crate::project;
use colored::Colorize;
use stackflow_cloud::{Resource, ResourceGraph};
use std::path::Path;

pub fn handle(config_path: Option<&Path>) -> anyhow::Result<bool> {
    println!("{}", "プロジェクトを検証中...".blue());

    let (path, config) = match project::load(config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ プロジェクトが不正です".red().bold());
            eprintln!("  {:#}", e);
            return Ok(false);
        }
    };
    println!("プロジェクトファイル: {}", path.display().to_string().cyan());

    let resources = match project::build_resources(&config) {
        Ok(resources) => resources,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ プロジェクトが不正です".red().bold());
            eprintln!("  {:#}", e);
            return Ok(false);
        }
    };
    let registry = project::registry(&config);
    let graph = ResourceGraph::build(resources);

    println!("{}", "✓ プロジェクトファイルは有効です".green().bold());
    println!();
    println!("名前空間: {}", config.namespace.cyan());
    println!("リソース数: {}", graph.len());

    let mut roots = 0;
    for root in graph.roots() {
        roots += 1;
        let provisioner = registry
            .resolve(root.kind())
            .map(|p| p.name().to_string())
            .unwrap_or_else(|| "なし（スキップ）".to_string());
        println!(
            "  - {} ({}) → {}",
            root.id().as_str().cyan(),
            root.kind(),
            provisioner
        );
        print_children(&graph, root, 2);
    }
    if roots == 0 {
        println!("  {}", "プロビジョニング対象がありません".yellow());
    }
    Ok(true)
}

fn print_children(graph: &ResourceGraph, parent: &Resource, depth: usize) {
    for child in graph.children_of(parent.id()) {
        println!(
            "{}- {} ({})",
            "  ".repeat(depth + 1),
            child.id().as_str().cyan(),
            child.kind()
        );
        print_children(graph, child, depth + 1);
    }
}
