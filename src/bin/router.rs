use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::info;

use lydian_core::podium::{Podium, DEFAULT_HOST_WAIT_TIME_SECS, DEFAULT_MAX_THREADS};
use lydian_traffic::Protocol;

#[derive(Parser)]
#[command(author, version, about = "Podium - multi-host traffic orchestrator", long_about = None)]
struct Args {
    /// Local sqlite database backing the orchestrator's rules cache.
    #[arg(long, default_value = "/var/lydian/podium.db")]
    db: PathBuf,

    /// RPC port every managed agent listens on.
    #[arg(long, default_value_t = 5649)]
    agent_port: u16,

    /// Bound on parallel per-host operations (`NODE_PREP_MAX_THREAD`).
    #[arg(long, default_value_t = DEFAULT_MAX_THREADS)]
    max_threads: usize,

    /// Seconds to wait for a newly-added host's RPC port (`HOST_WAIT_TIME`).
    #[arg(long, default_value_t = DEFAULT_HOST_WAIT_TIME_SECS)]
    host_wait_time_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Registers a running agent as `endpoint_ip=mgmt_ip`.
    AddHost { endpoint_ip: String, mgmt_ip: String },
    /// Drops hosts from the known endpoint map.
    CleanupHosts { endpoint_ips: Vec<String> },
    /// Registers every rule in a JSON file (an array of traffic rules).
    Register {
        rules_file: PathBuf,
        #[arg(long)]
        servers_first: bool,
    },
    Start { reqid: String },
    Stop { reqid: String },
    Unregister { reqid: String },
    Results { reqid: String },
    Stats { reqid: String },
    Latency { reqid: String },
    /// Generates an N×(N-1) full mesh of ping rules across `hosts`.
    MeshPing {
        hosts: Vec<String>,
        #[arg(long, default_value_t = 5649)]
        port: u16,
        #[arg(long, default_value = "tcp")]
        protocol: String,
    },
}

/// Prints one line per host outcome; a host-level failure never aborts the
/// command (§7 "Podium aggregates a {host -> result} map").
fn report_outcomes(op: &str, outcomes: &std::collections::HashMap<String, Result<(), lydian_core::podium::PodiumError>>) {
    for (host, outcome) in outcomes {
        match outcome {
            Ok(()) => info!(host, op, "ok"),
            Err(err) => tracing::warn!(host, op, %err, "host failed"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let podium = Podium::open(
        args.db.to_str().expect("db path must be valid utf-8"),
        args.agent_port,
        args.max_threads,
        Duration::from_secs(args.host_wait_time_secs),
    )
    .await?;

    match args.command {
        Command::AddHost { endpoint_ip, mgmt_ip } => {
            podium.add_host(endpoint_ip, mgmt_ip).await?;
            info!("host added");
        }
        Command::CleanupHosts { endpoint_ips } => {
            podium.cleanup_hosts(&endpoint_ips).await;
            info!("hosts cleaned up");
        }
        Command::Register { rules_file, servers_first } => {
            let contents = tokio::fs::read_to_string(&rules_file).await?;
            let rules = serde_json::from_str(&contents)?;
            let outcomes = podium.register_traffic(rules, servers_first).await?;
            report_outcomes("register", &outcomes);
        }
        Command::Start { reqid } => {
            let outcomes = podium.start_traffic(&reqid).await;
            report_outcomes("start", &outcomes);
        }
        Command::Stop { reqid } => {
            let outcomes = podium.stop_traffic(&reqid).await;
            report_outcomes("stop", &outcomes);
        }
        Command::Unregister { reqid } => {
            let outcomes = podium.unregister_traffic(&reqid).await?;
            report_outcomes("unregister", &outcomes);
        }
        Command::Results { reqid } => {
            let records = podium.get_results(&reqid).await;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Stats { reqid } => {
            let stats = podium.get_traffic_stats(&reqid).await;
            println!(
                "{}",
                serde_json::json!({
                    "count": stats.count,
                    "pass_count": stats.pass_count,
                    "fail_count": stats.fail_count,
                    "pass_percent": stats.pass_percent(),
                    "fail_percent": stats.fail_percent(),
                })
            );
        }
        Command::Latency { reqid } => match podium.get_latency(&reqid).await {
            Some(latency) => println!(
                "{}",
                serde_json::json!({
                    "count": latency.count,
                    "avg_latency": latency.avg_latency,
                    "min_latency": latency.min_latency,
                    "max_latency": latency.max_latency,
                })
            ),
            None => println!("{{}}"),
        },
        Command::MeshPing { hosts, port, protocol } => {
            let protocol: Protocol = protocol.parse().map_err(anyhow::Error::msg)?;
            let reqid = podium.run_mesh_ping(&hosts, port, protocol).await?;
            println!("{reqid}");
        }
    }

    podium.close().await;
    Ok(())
}
