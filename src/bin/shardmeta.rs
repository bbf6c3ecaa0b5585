use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shardmeta::{
    CacheConfig, CatalogFixture, DistTableCacheEntry, InMemoryCatalog, MetadataCacheService,
    ShardId, ShardInterval, TableId,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "shardmeta")]
#[command(about = "Inspect distribution metadata loaded from a catalog fixture")]
struct Cli {
    /// JSON catalog fixture
    #[arg(long)]
    catalog: PathBuf,

    /// Optional JSON cache configuration
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the cached entry of a table
    Table { id: u32 },
    /// Show one shard by id
    Shard { id: u64 },
    /// List worker nodes
    Nodes,
    /// Print whether a table is distributed
    Distributed { id: u32 },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cache = open_cache(&cli.catalog, cli.config.as_deref())?;

    match cli.command {
        Command::Table { id } => {
            let entry = cache
                .lookup(TableId(id))
                .with_context(|| format!("Failed to load metadata for table {}", id))?;
            print_table(&entry);
        }
        Command::Shard { id } => {
            let shard = cache
                .load_shard_interval(ShardId(id))
                .with_context(|| format!("Failed to load shard {}", id))?;
            println!("{}", describe_shard(&shard));
        }
        Command::Nodes => {
            let nodes = cache.get_worker_nodes().context("Failed to load worker nodes")?;
            let mut nodes: Vec<_> = nodes.values().collect();
            nodes.sort_by_key(|node| node.node_id);

            for node in nodes {
                println!(
                    "{} {}:{} role={} group={} {}",
                    node.node_id,
                    node.name,
                    node.port,
                    node.role,
                    node.group_id,
                    if node.active { "active" } else { "inactive" }
                );
            }
            for warning in cache.worker_node_warnings() {
                eprintln!("warning: {:?}", warning);
            }
        }
        Command::Distributed { id } => {
            let distributed = cache
                .is_distributed(TableId(id))
                .with_context(|| format!("Failed to check table {}", id))?;
            println!("{}", distributed);
        }
    }

    Ok(())
}

fn open_cache(
    catalog_path: &Path,
    config_path: Option<&Path>,
) -> Result<MetadataCacheService<InMemoryCatalog>> {
    let config = match config_path {
        Some(path) => CacheConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?,
        None => CacheConfig::default(),
    };

    let fixture = CatalogFixture::from_json_file(catalog_path)
        .with_context(|| format!("Failed to read catalog fixture '{}'", catalog_path.display()))?;
    let catalog = InMemoryCatalog::from_fixture(fixture, config.relation_names.clone());

    Ok(MetadataCacheService::new(catalog, config))
}

fn print_table(entry: &DistTableCacheEntry) {
    let Some(distribution) = entry.distribution() else {
        println!("table {}: not distributed", entry.table_id());
        return;
    };

    println!(
        "table {}: {} distributed, owner={} cluster={}",
        entry.table_id(),
        distribution.partition_method,
        distribution.is_owner,
        distribution.is_cluster
    );
    println!(
        "partition column: {} (type {})",
        distribution.partition_column.column, distribution.partition_column.type_id
    );
    println!(
        "shards: {} uninitialized={} uniform_hash={}",
        entry.shard_count(),
        entry.has_uninitialized_shard_interval(),
        entry.has_uniform_hash_distribution()
    );
    for shard in entry.shard_intervals() {
        println!("  {}", describe_shard(shard));
    }
}

fn describe_shard(shard: &ShardInterval) -> String {
    match (shard.min_value(), shard.max_value()) {
        (Some(min), Some(max)) => format!(
            "shard {} of table {} [{}, {}]",
            shard.shard_id, shard.table_id, min, max
        ),
        _ => format!("shard {} of table {} unbounded", shard.shard_id, shard.table_id),
    }
}
