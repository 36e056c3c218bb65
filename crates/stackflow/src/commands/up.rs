use crate::project;
use colored::Colorize;
use stackflow_cloud::{
    CancellationToken, Orchestrator, Resource, ResourceStatus, SnapshotStore, TracingSink,
};
use std::path::Path;
use std::sync::Arc;

pub async fn handle(config_path: Option<&Path>) -> anyhow::Result<bool> {
    let (path, config) = project::load(config_path)?;
    let resources = project::build_resources(&config)?;
    println!(
        "プロジェクト: {} (リソース {} 件)",
        path.display().to_string().cyan(),
        resources.len()
    );
    tracing::info!(project = %path.display(), resources = resources.len(), "Starting provisioning run");

    let registry = Arc::new(project::registry(&config));
    let sink = Arc::new(TracingSink::new(SnapshotStore::new()));
    let orchestrator = Orchestrator::new(registry, sink.clone());

    let cancel = CancellationToken::new();
    let handle = orchestrator.start(resources.clone(), cancel.clone()).await;

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling the run");
            eprintln!("{}", "中断しました。実行中の API 呼び出しの後に停止します...".yellow());
            cancel.cancel();
        }
    });
    let report = handle.join().await;
    interrupt.abort();
    let report = report?;

    println!();
    for resource in resources.iter().filter(|r| r.requires_provisioning()) {
        print_resource(resource, &sink);
    }
    println!();

    for failure in &report.failed {
        tracing::error!(resource = %failure.resource, error = %failure.error, "Resource failed to provision");
        eprintln!(
            "{} {}: {}",
            "✗".red(),
            failure.resource.as_str().bold(),
            failure.error
        );
    }

    tracing::info!(
        provisioned = report.provisioned.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Provisioning run finished"
    );
    if report.is_success() {
        println!("{} {}", "✓".green(), report);
    } else {
        println!("{} {}", "✗".red(), report);
    }
    Ok(report.is_success())
}

fn print_resource(resource: &Resource, sink: &TracingSink<SnapshotStore>) {
    let marker = match resource.status() {
        ResourceStatus::Running => "✓".green(),
        ResourceStatus::NoAction => "-".yellow(),
        ResourceStatus::FailedToProvision => "✗".red(),
        _ => "?".normal(),
    };
    let label = sink
        .inner()
        .snapshot(resource.id())
        .and_then(|s| s.label().map(str::to_string))
        .unwrap_or_default();
    println!("{} {} {}", marker, resource.id().as_str().bold(), label.dimmed());

    for output in resource.outputs() {
        println!("    {} = {}", output.key.cyan(), output.value);
    }
    if let Some(url) = sink
        .inner()
        .snapshot(resource.id())
        .and_then(|s| s.urls.first().cloned())
    {
        println!("    {}", url.url.dimmed());
    }
}
