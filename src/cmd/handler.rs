use crate::{
    cmd::command::RebalanceCommands,
    common::{BackendId, RebalanceConfig},
    metastore::{Catalog, MetastoreClient, RetryPolicy},
    rebalance::{RebalanceReport, Rebalancer, TableEntry},
    resolver::EndpointResolver,
};

pub async fn handle_command(command: RebalanceCommands, cfg: RebalanceConfig) -> anyhow::Result<()> {
    match command {
        RebalanceCommands::Inventory { stamp, dry_run } => {
            handle_inventory(&cfg, stamp, dry_run).await?;
        }
        RebalanceCommands::Plan => {
            handle_plan(&cfg).await?;
        }
        RebalanceCommands::Rebalance { dry_run } => {
            handle_rebalance(&cfg, dry_run).await?;
        }
    }
    Ok(())
}

async fn connect(cfg: &RebalanceConfig) -> anyhow::Result<MetastoreClient> {
    let resolver = EndpointResolver::from_config(&cfg.resolver);
    let addr = resolver.resolve_metastore(&cfg.metastore).await?;
    tracing::info!("Metastore {} resolved to {}", cfg.metastore.host, addr);
    let client = MetastoreClient::connect(
        addr,
        cfg.metastore.transport,
        RetryPolicy::from_config(&cfg.metastore),
    )
    .await?;
    Ok(client)
}

async fn close(client: &mut MetastoreClient) {
    if let Err(e) = client.close().await {
        tracing::warn!("Failed to close metastore connection: {}", e);
    }
}

async fn handle_inventory(cfg: &RebalanceConfig, stamp: bool, dry_run: bool) -> anyhow::Result<()> {
    let rebalancer = Rebalancer::from_config(cfg)?.with_dry_run(dry_run);
    let mut client = connect(cfg).await?;
    let result = async {
        let catalogs = client.list_catalogs().await?;
        println!("Catalogs: {}", catalogs.join(", "));
        let databases = client.list_databases().await?;
        println!("Databases: {}", databases.join(", "));
        for name in rebalancer.databases(&mut client).await? {
            let db = client.get_database(&name).await?;
            println!(
                "  {:<20} {:<50} {}",
                db.name,
                db.location_uri.as_deref().unwrap_or("-"),
                db.description.as_deref().unwrap_or("")
            );
        }

        let mut entries = rebalancer.collect(&mut client).await?;
        if stamp {
            let stamped = rebalancer.stamp(&mut client, &mut entries).await?;
            let verb = if dry_run { "Would stamp" } else { "Stamped" };
            println!(
                "{} {} on {} tables",
                verb,
                rebalancer.inventory().size_key(),
                stamped.len()
            );
        }
        print_tables(&rebalancer, &entries);
        anyhow::Ok(())
    }
    .await;
    close(&mut client).await;
    result
}

async fn handle_plan(cfg: &RebalanceConfig) -> anyhow::Result<()> {
    let rebalancer = Rebalancer::from_config(cfg)?;
    let mut client = connect(cfg).await?;
    let entries = rebalancer.collect(&mut client).await;
    close(&mut client).await;
    let entries = entries?;
    let plan = rebalancer.plan(&entries);

    println!(
        "{:<40} {:>15} {:<15} {:<15}",
        "Table", "Size", "Current", "Planned"
    );
    println!("{}", "-".repeat(88));
    for entry in &entries {
        let planned = plan
            .target(entry.id())
            .map(|b| rebalancer.backends().get(b).name.clone())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<40} {:>15} {:<15} {:<15}",
            entry.id().to_string(),
            size_column(entry),
            backend_column(&rebalancer, entry.backend),
            planned
        );
    }
    for (id, backend) in rebalancer.backends().iter() {
        println!("Planned load on {}: {} bytes", backend, plan.load(id));
    }
    println!("Imbalance: {} bytes", plan.imbalance());
    Ok(())
}

async fn handle_rebalance(cfg: &RebalanceConfig, dry_run: bool) -> anyhow::Result<()> {
    let rebalancer = Rebalancer::from_config(cfg)?.with_dry_run(dry_run);
    let mut client = connect(cfg).await?;
    let report = rebalancer.run(&mut client).await?;
    print_report(&rebalancer, &report);
    Ok(())
}

fn size_column(entry: &TableEntry) -> String {
    match entry.size {
        Some(size) => format!("{} ({})", size.bytes, size.source),
        None => "-".to_string(),
    }
}

fn backend_column(rebalancer: &Rebalancer, backend: Option<BackendId>) -> String {
    match backend {
        Some(id) => rebalancer.backends().get(id).name.clone(),
        None => "foreign".to_string(),
    }
}

fn print_tables(rebalancer: &Rebalancer, entries: &[TableEntry]) {
    if entries.is_empty() {
        println!("No tables found.");
        return;
    }
    println!(
        "{:<40} {:<15} {:>22} {}",
        "Table", "Backend", "Size", "Location"
    );
    println!("{}", "-".repeat(120));
    for entry in entries {
        println!(
            "{:<40} {:<15} {:>22} {}",
            entry.id().to_string(),
            backend_column(rebalancer, entry.backend),
            size_column(entry),
            entry.table.location().unwrap_or("-")
        );
    }
}

fn print_report(rebalancer: &Rebalancer, report: &RebalanceReport) {
    let verb = if report.dry_run { "Would move" } else { "Moved" };
    for table_move in &report.moved {
        println!("{} {}: {} -> {}", verb, table_move.id, table_move.from, table_move.to);
    }
    for (id, location) in &report.unrecognized {
        println!("Unrecognized location, left unchanged: {} ({})", id, location);
    }
    for (id, reason) in &report.skipped {
        println!("Skipped {}: {}", id, reason);
    }
    for (id, backend) in rebalancer.backends().iter() {
        println!("Load on {}: {} bytes", backend, report.plan.load(id));
    }
    println!(
        "{} moved, {} unchanged, {} skipped, {} unrecognized",
        report.moved.len(),
        report.unchanged,
        report.skipped.len(),
        report.unrecognized.len()
    );
}
