/// f5xc - F5 Distributed Cloud API tooling
///
/// Inspect and manage configuration objects, check quotas, sweep leftover
/// acceptance-test objects and run a local mock of the API.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use f5xc::acctest::rate_limit::RateLimiter;
use f5xc::acctest::SweeperRegistry;
use f5xc::api::{F5xcClient, Resource};
use f5xc::config::ProviderConfig;
use f5xc::error::{ErrorCode, F5xcError};
use f5xc::mock::MockServer;
use f5xc::resources::{self, ResourceType};

#[derive(Parser)]
#[command(name = "f5xc")]
#[command(about = "Manage F5 Distributed Cloud configuration objects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "f5xc.yaml", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml, global = true)]
    output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate example configuration file
    Init,

    /// List supported resource types
    Resources,

    /// List namespaces
    Namespaces,

    /// Show one object
    Get {
        /// Resource type, e.g. origin_pool or f5xc_origin_pool
        kind: String,
        name: String,
        #[arg(short, long, default_value = "system")]
        namespace: String,
    },

    /// List objects of a type in a namespace
    List {
        kind: String,
        #[arg(short, long, default_value = "system")]
        namespace: String,
    },

    /// Create an object from a YAML or JSON file, updating it if it exists
    Apply {
        kind: String,
        /// File holding a `{metadata, spec}` document
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Delete an object
    Delete {
        kind: String,
        name: String,
        #[arg(short, long, default_value = "system")]
        namespace: String,
    },

    /// Show quota usage
    Quota {
        #[arg(short, long, default_value = "system")]
        namespace: String,
        /// Only this object type
        #[arg(long)]
        kind: Option<String>,
    },

    /// Delete leftover acceptance-test objects
    Sweep {
        /// Run only this sweeper (and its dependencies)
        #[arg(long)]
        sweeper: Option<String>,
    },

    /// Run the mock API server
    MockServer {
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: SocketAddr,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("f5xc={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match &cli.command {
        Commands::Init => init_config(&cli).await,
        Commands::Resources => list_resource_types(&cli),
        Commands::Namespaces => list_namespaces(&cli).await,
        Commands::Get {
            kind,
            name,
            namespace,
        } => get_object(&cli, kind, namespace, name).await,
        Commands::List { kind, namespace } => list_objects(&cli, kind, namespace).await,
        Commands::Apply { kind, file } => apply_object(&cli, kind, file).await,
        Commands::Delete {
            kind,
            name,
            namespace,
        } => delete_object(&cli, kind, namespace, name).await,
        Commands::Quota { namespace, kind } => show_quota(&cli, namespace, kind.as_deref()).await,
        Commands::Sweep { sweeper } => sweep(&cli, sweeper.as_deref()).await,
        Commands::MockServer { listen } => run_mock_server(*listen).await,
    };

    if let Err(e) = result {
        match e.chain().find_map(|c| c.downcast_ref::<F5xcError>()) {
            Some(api_error) => error!("Error: {}", api_error.summary()),
            None => error!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn print<T: Serialize>(cli: &Cli, value: &T) -> Result<()> {
    let text = match cli.output {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", text.trim_end());
    Ok(())
}

fn client(cli: &Cli) -> Result<F5xcClient> {
    ProviderConfig::load(&cli.config)
        .context("Failed to load configuration")?
        .build_client()
}

fn resource_type(kind: &str) -> Result<ResourceType> {
    resources::lookup(kind).with_context(|| {
        format!("Unknown resource type '{}' (see `f5xc resources`)", kind)
    })
}

/// Initialize example configuration file
async fn init_config(cli: &Cli) -> Result<()> {
    if cli.config.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}",
            cli.config.display()
        );
    }

    let yaml = serde_yaml::to_string(&ProviderConfig::example())?;
    tokio::fs::write(&cli.config, yaml)
        .await
        .context("Failed to write configuration file")?;

    info!("Example configuration created: {}", cli.config.display());
    info!("");
    info!("Next steps:");
    info!("  1. Set api_url to your tenant URL");
    info!("  2. Provide credentials, either an API token:");
    info!("     export F5XC_API_TOKEN=your-token-here");
    info!("     or a PEM certificate and key via cert_file / key_file");
    info!("  3. Check access:");
    info!("     f5xc namespaces");

    Ok(())
}

#[derive(Serialize)]
struct TypeRow {
    name: &'static str,
    terraform_type: String,
    api_path: &'static str,
    group: &'static str,
}

fn list_resource_types(cli: &Cli) -> Result<()> {
    let rows: Vec<TypeRow> = resources::registry::all()
        .map(|kind| TypeRow {
            name: kind.name,
            terraform_type: kind.terraform_type(),
            api_path: kind.api_path,
            group: kind.group.as_str(),
        })
        .collect();
    print(cli, &rows)
}

async fn list_namespaces(cli: &Cli) -> Result<()> {
    let names = client(cli)?.namespace_names().await?;
    print(cli, &names)
}

async fn get_object(cli: &Cli, kind: &str, namespace: &str, name: &str) -> Result<()> {
    let kind = resource_type(kind)?;
    let object = client(cli)?.resource(kind).get(namespace, name).await?;
    print(cli, &object)
}

async fn list_objects(cli: &Cli, kind: &str, namespace: &str) -> Result<()> {
    let kind = resource_type(kind)?;
    let objects = client(cli)?.resource(kind).list(namespace).await?;
    info!("Found {} {} objects in {}", objects.len(), kind, namespace);
    print(cli, &objects)
}

async fn apply_object(cli: &Cli, kind: &str, file: &Path) -> Result<()> {
    let kind = resource_type(kind)?;
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    // YAML is a superset of JSON
    let object: Resource = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let client = client(cli)?;
    let api = client.resource(kind);
    let applied = match api.create(&object).await {
        Err(e) if e.code == ErrorCode::Conflict => {
            info!("{} {} already exists, updating", kind, object.name());
            api.update(&object).await?
        }
        other => other?,
    };
    print(cli, &applied)
}

async fn delete_object(cli: &Cli, kind: &str, namespace: &str, name: &str) -> Result<()> {
    let kind = resource_type(kind)?;
    client(cli)?.resource(kind).delete(namespace, name).await?;
    info!("Deleted {} {}/{}", kind, namespace, name);
    Ok(())
}

async fn show_quota(cli: &Cli, namespace: &str, kind: Option<&str>) -> Result<()> {
    let client = client(cli)?;
    match kind {
        Some(kind) => print(cli, &client.quota_info(namespace, kind).await?),
        None => print(cli, &client.all_quota_info(namespace).await?),
    }
}

async fn sweep(cli: &Cli, only: Option<&str>) -> Result<()> {
    let client = client(cli)?;
    let reports = SweeperRegistry::with_defaults()
        .run(&client, RateLimiter::global(), only)
        .await?;

    let failed: usize = reports.iter().map(|r| r.errors.len()).sum();
    print(cli, &reports)?;
    if failed > 0 {
        anyhow::bail!("sweep finished with {} errors", failed);
    }
    Ok(())
}

async fn run_mock_server(listen: SocketAddr) -> Result<()> {
    let server = MockServer::bind(listen).await?;
    info!("Mock server running at {}", server.url());
    info!("  export F5XC_API_URL={}", server.url());
    info!("  export F5XC_API_TOKEN=mock-token");
    info!("Press Ctrl+C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutting down mock server");
    Ok(())
}
