//! CLI for pod operations

use clap::{Parser, Subcommand};
use podmanager::client::RespConnector;
use podmanager::common::AuditLogger;
use podmanager::ops::{self, WalkDepth};
use podmanager::pod::{Registry, SentinelConfRegistry};
use podmanager::{Config, Context, PodConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "podmanager")]
#[command(about = "Manage sentinel-monitored Redis pods")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Sentinel config file used as the pod registry
    #[arg(long, global = true)]
    sentinel_config: Option<PathBuf>,

    /// Echo audit entries to stderr
    #[arg(long, global = true)]
    audit_stderr: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display pod info
    Info {
        /// Pod name
        pod: String,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Initiate a failover through the first sentinel that accepts it
    Failover {
        /// Pod name
        pod: String,
    },

    /// Reset the pod on every sentinel
    Reset {
        /// Pod name
        pod: String,
    },

    /// Remove the pod from every sentinel
    Remove {
        /// Pod name
        pod: String,
    },

    /// Check live sentinels against the known list
    ValidateSentinels {
        /// Pod name
        pod: String,
    },

    /// Check the pod credential against master and reachable replicas
    CheckAuth {
        /// Pod name
        pod: String,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// List pods sharing node addresses with this pod
    Topology {
        /// Pod name
        pod: String,

        /// Hops to expand (default from config)
        #[arg(long, conflicts_with = "full")]
        depth: Option<usize>,

        /// Expand until no new pod is found
        #[arg(long)]
        full: bool,
    },

    /// Group every entangled pod in the registry
    Conflicts {
        /// Expand until no new pod is found
        #[arg(long)]
        full: bool,
    },

    /// Change the pod password on master, replicas and sentinels
    RotatePassword {
        /// Pod name
        pod: String,

        /// Current password
        #[arg(long)]
        old: String,

        /// New password
        #[arg(long)]
        new: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(path) = cli.sentinel_config {
        config.sentinel_config_file = path;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let registry = Arc::new(SentinelConfRegistry::new(&config.sentinel_config_file));
    let connector = Arc::new(RespConnector::from_config(&config));
    let audit = AuditLogger::new(config.audit_log.as_deref(), cli.audit_stderr);
    let ctx = Context::new(connector, registry.clone())
        .with_config(config)
        .with_audit(audit);

    match cli.command {
        Commands::Info { pod, json } => {
            let pod = registry.resolve_pod(&pod).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&pod)?);
            } else {
                print_pod_info(&pod);
            }
        }

        Commands::Failover { pod } => {
            let pod = registry.resolve_pod(&pod).await?;
            ops::failover(&ctx, &pod).await?;
            println!("Failover initiated");
        }

        Commands::Reset { pod } => {
            let pod = registry.resolve_pod(&pod).await?;
            ops::reset(&ctx, &pod).await?;
            println!("Reset initiated");
        }

        Commands::Remove { pod } => {
            let pod = registry.resolve_pod(&pod).await?;
            if ops::remove(&ctx, &pod).await? {
                println!("Pod {} removed from all sentinels", pod.name);
            }
        }

        Commands::ValidateSentinels { pod } => {
            let pod = registry.resolve_pod(&pod).await?;
            if ops::validate_sentinels(&ctx, &pod).await? {
                println!("Sentinels validated");
            } else {
                println!("Constellation state invalid for the pod");
            }
        }

        Commands::CheckAuth { pod, json } => {
            let pod = registry.resolve_pod(&pod).await?;
            let report = ops::check_auth(&ctx, &pod).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Auth check for {}:", pod.name);
                for (node, ok) in &report.results {
                    println!("  {:<24} {}", node, if *ok { "ok" } else { "FAILED" });
                }
            }
            report.verdict()?;
        }

        Commands::Topology { pod, depth, full } => {
            let pod = registry.resolve_pod(&pod).await?;
            let mut ctx = ctx;
            if full {
                ctx.config.topology.full_closure = true;
            } else if let Some(depth) = depth {
                ctx.config.topology.depth = depth;
            }
            ctx.config.validate()?;

            let entangled = ops::walk_topology(&ctx, &pod).await?;
            if entangled.is_empty() {
                println!("Pod {} is isolated", pod.name);
            } else {
                println!("Pod {} is entangled with:", pod.name);
                for other in &entangled {
                    println!("  {} (master {})", other.name, other.master);
                }
                std::process::exit(2);
            }
        }

        Commands::Conflicts { full } => {
            let pods = registry.all_pods().await?;
            let depth = if full {
                WalkDepth::Full
            } else {
                WalkDepth::from(&ctx.config.topology)
            };
            let groups = ops::audit_registry(&pods, depth);
            if groups.is_empty() {
                println!("All {} pods are isolated", pods.len());
            } else {
                println!("Conflict report:");
                for group in &groups {
                    println!("  {}", group.join(" <-> "));
                }
                std::process::exit(2);
            }
        }

        Commands::RotatePassword { pod, old, new } => {
            let mut pod = registry.resolve_pod(&pod).await?;
            let report = ops::rotate_credential(&ctx, &mut pod, &old, &new).await?;
            println!("Rotation report:");
            println!("  Replicas updated: {}", report.replicas);
            println!("  Sentinels updated: {}", report.sentinels);
            if let Some(e) = &report.sentinel_listing_error {
                println!("  Sentinel list unavailable: {}", e);
            }
            if !report.is_complete() {
                eprintln!(
                    "WARNING: sentinels not listed as updated still hold the old password; update them by hand"
                );
                for failure in &report.sentinels.failed {
                    eprintln!("  {}: {}", failure.addr, failure.reason);
                }
                std::process::exit(2);
            }
        }
    }

    Ok(())
}

fn print_pod_info(pod: &PodConfig) {
    println!("Pod:      {}", pod.name);
    println!("Master:   {}", pod.master);
    println!("Quorum:   {}", pod.quorum);
    println!("Auth:     {}", if pod.authpass.is_empty() { "none" } else { "set" });
    println!("Known slaves ({}):", pod.known_slaves.len());
    for slave in &pod.known_slaves {
        println!("  {}", slave);
    }
    println!("Known sentinels ({}):", pod.known_sentinels.len());
    for sentinel in &pod.known_sentinels {
        println!("  {}", sentinel);
    }
    if !pod.settings.is_empty() {
        println!("Settings:");
        for (key, value) in &pod.settings {
            println!("  {} = {}", key, value);
        }
    }
    let mut cli = format!("redis-cli -h {} -p {}", pod.master.host, pod.master.port);
    if !pod.authpass.is_empty() {
        cli.push_str(&format!(" -a {}", pod.authpass));
    }
    println!("cli string: {}", cli);
}
