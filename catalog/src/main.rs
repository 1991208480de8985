mod import;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use materials_core::persist::{load_catalog, save_catalog, CatalogPaths};
use materials_core::recommend::DEFAULT_TOP_N;
use materials_core::{MaterialId, Recommender, RecommenderConfig};
use serde::Serialize;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Import material catalogs and query recommendations offline", long_about = None)]
struct Cli {
    /// Vocabulary size for the text index
    #[arg(long, global = true, default_value_t = materials_core::DEFAULT_MAX_FEATURES)]
    max_features: usize,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a catalog snapshot from JSON/JSONL files or a directory
    Import {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output catalog directory
        #[arg(long)]
        output: String,
    },
    /// Recommend materials for a project description
    Recommend {
        #[arg(long, default_value = "./catalog")]
        catalog: String,
        #[arg(long)]
        query: String,
        #[arg(long)]
        project_type: Option<String>,
        #[arg(long, default_value_t = DEFAULT_TOP_N)]
        top_n: usize,
    },
    /// Recommend materials that complement a selection
    Complementary {
        #[arg(long, default_value = "./catalog")]
        catalog: String,
        /// Comma-separated material ids
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<MaterialId>,
        #[arg(long, default_value_t = DEFAULT_TOP_N)]
        top_n: usize,
    },
    /// Price a lease with duration and quantity discounts
    Quote {
        #[arg(long, default_value = "./catalog")]
        catalog: String,
        #[arg(long)]
        material_id: MaterialId,
        #[arg(long)]
        days: u32,
        #[arg(long)]
        quantity: u32,
    },
}

#[derive(Serialize)]
struct Hit<'a> {
    id: MaterialId,
    name: &'a str,
    category: &'a str,
    score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let cli = Cli::parse();
    let config = RecommenderConfig { max_features: cli.max_features };

    match cli.command {
        Commands::Import { input, output } => import_catalog(&input, &output),
        Commands::Recommend { catalog, query, project_type, top_n } => {
            let rec = open(&catalog, config)?;
            let hits = rec.recommend_by_project(&query, project_type.as_deref(), top_n);
            let out: Vec<Hit> = hits
                .iter()
                .map(|c| Hit {
                    id: c.material.id,
                    name: &c.material.name,
                    category: &c.material.category,
                    score: c.score,
                    reason: Some(c.label().reason()),
                })
                .collect();
            print_json(&out)
        }
        Commands::Complementary { catalog, ids, top_n } => {
            let rec = open(&catalog, config)?;
            let hits = rec.recommend_complementary(&ids, top_n);
            let out: Vec<Hit> = hits
                .iter()
                .map(|c| Hit { id: c.material.id, name: &c.material.name, category: &c.material.category, score: c.score, reason: None })
                .collect();
            print_json(&out)
        }
        Commands::Quote { catalog, material_id, days, quantity } => {
            let rec = open(&catalog, config)?;
            let quote = rec
                .optimize_pricing(material_id, days, quantity)
                .ok_or_else(|| anyhow!("material {material_id} not found"))?;
            print_json(&quote)
        }
    }
}

fn import_catalog(input: &str, output: &str) -> Result<()> {
    let files = import::collect_files(Path::new(input));
    if files.is_empty() {
        return Err(anyhow!("no .json or .jsonl files under {input}"));
    }
    let drafts = import::read_drafts(&files)?;
    let records = import::into_records(drafts)?;
    let paths = CatalogPaths::new(output);
    // re-importing materials keeps the lease ledger already stored there
    let leases = load_catalog(&paths)?.leases;
    let meta = save_catalog(&paths, &records, &leases)?;
    tracing::info!(
        num_files = files.len(),
        num_materials = meta.num_materials,
        num_leases = meta.num_leases,
        output,
        "catalog import complete"
    );
    Ok(())
}

fn open(dir: &str, config: RecommenderConfig) -> Result<Recommender> {
    let snapshot = load_catalog(&CatalogPaths::new(dir))?;
    Ok(Recommender::fit(snapshot.materials, config))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
