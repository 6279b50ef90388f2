use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cascade_client::{ConnectionConfig, CsvSink, RestConnection};
use cascade_core::{
    AppError, ExtractOperation, NullSink, OperationContext, OperationDefinition, RecordMapper,
    RecordSink,
};

#[derive(Parser)]
#[command(
    name = "cascade",
    version,
    about = "Dependency-aware record extraction"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract records and everything they reference into CSV files
    Extract {
        /// Path to the JSON operation definition
        #[arg(short, long)]
        definition: PathBuf,

        /// Directory the CSV files are written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Run every query but write nothing
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Validate a definition offline and print the planned steps
    Check {
        /// Path to the JSON operation definition
        #[arg(short, long)]
        definition: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cascade=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            definition,
            output_dir,
            dry_run,
        } => cmd_extract(&definition, &output_dir, dry_run).await?,
        Commands::Check { definition } => cmd_check(&definition)?,
    }

    Ok(())
}

fn load_definition(path: &Path) -> Result<OperationDefinition> {
    OperationDefinition::load(path).map_err(|e| anyhow::anyhow!(e))
}

fn cmd_check(path: &Path) -> Result<()> {
    let definition = load_definition(path)?;

    println!("{} is valid. Planned steps:\n", path.display());
    for (i, step) in definition.operation.iter().enumerate() {
        let scope = match (&step.extract.query, &step.extract.ids) {
            (Some(query), _) => format!("where {query}"),
            (None, Some(ids)) => format!("{} selected records", ids.len()),
            (None, None) => "all records".to_string(),
        };
        println!(
            "  {}. {} ({scope}) -> {}",
            i + 1,
            step.sobject,
            step.output_file()
        );
        println!("     fields: {}", step.fields.join(", "));
    }

    Ok(())
}

async fn cmd_extract(path: &Path, output_dir: &Path, dry_run: bool) -> Result<()> {
    let definition = load_definition(path)?;

    let config = ConnectionConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(
        instance = %config.instance_url,
        api_version = %config.api_version,
        "Connecting"
    );
    let connection = RestConnection::new(&config).context("Failed to create HTTP client")?;

    if !dry_run {
        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory {}", output_dir.display())
        })?;
    }

    let mut context = OperationContext::new(connection, definition.sobjects());
    for step in &definition.operation {
        let sink: Box<dyn RecordSink> = if dry_run {
            Box::new(NullSink)
        } else {
            let columns = match &step.mapping {
                Some(mapper) => step.fields.iter().map(|f| mapper.transform_key(f)).collect(),
                None => step.fields.clone(),
            };
            let file = output_dir.join(step.output_file());
            Box::new(CsvSink::create(&file, columns).map_err(|e| anyhow::anyhow!(e))?)
        };
        context.set_sink(step.sobject.as_str(), sink);

        if let Some(mapper) = &step.mapping {
            context.set_mapper(step.sobject.as_str(), Box::new(mapper.clone()));
        }
    }

    let mut operation = ExtractOperation::new(context);
    for step in &definition.operation {
        let scope = step.scope().map_err(|e| anyhow::anyhow!(e))?;
        operation
            .add_step(step.sobject.as_str(), scope, step.fields.clone())
            .await
            .map_err(report)?;
    }

    let summary = operation.execute().await.map_err(report)?;

    println!("Extraction {} complete:\n", summary.run_id);
    for step in &summary.steps {
        println!("  {:<30} {:>8} records", step.sobject, step.records);
    }
    println!("\nTotal: {} records", summary.total_records());
    if dry_run {
        println!("(dry run, nothing written)");
    }

    Ok(())
}

fn report(e: AppError) -> anyhow::Error {
    if e.is_remote() {
        anyhow::anyhow!(e)
            .context("The remote service rejected a request; check credentials and API version")
    } else {
        anyhow::anyhow!(e)
    }
}
