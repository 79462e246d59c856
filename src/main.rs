use anyhow::Result;
use hydfs::files::FileService;
use hydfs::membership::service::TICK_INTERVAL;
use hydfs::membership::{FailureDetectionMode, MembershipService};
use hydfs::net::UdpTransport;
use hydfs::ring::{HashRing, RingAdapter};
use hydfs::router::Router;
use hydfs::storage::types::NodeId;
use hydfs::storage::{ClientWriteTracker, FileStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const DEFAULT_INTRODUCER_HOST: &str = "localhost";
const DEFAULT_INTRODUCER_PORT: u16 = 12345;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 && args.len() != 5 {
        eprintln!("usage: {} host port [introducer_host introducer_port]", args[0]);
        std::process::exit(1);
    }
    let host = args[1].clone();
    let port: u16 = match args[2].parse() {
        Ok(port) => port,
        Err(_) => {
            eprintln!("invalid port: {}", args[2]);
            std::process::exit(1);
        }
    };
    let introducer = if args.len() == 5 {
        let introducer_port: u16 = match args[4].parse() {
            Ok(p) => p,
            Err(_) => {
                eprintln!("invalid introducer port: {}", args[4]);
                std::process::exit(1);
            }
        };
        (args[3].clone(), introducer_port)
    } else {
        (DEFAULT_INTRODUCER_HOST.to_string(), DEFAULT_INTRODUCER_PORT)
    };

    let replication = std::env::var("HYDFS_REPLICATION_FACTOR")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(3);
    let drop_rate = std::env::var("HYDFS_DROP_RATE")
        .ok()
        .and_then(|v| v.parse::<f32>().ok())
        .unwrap_or(0.0);
    let storage_dir = std::env::var("HYDFS_STORAGE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(format!("hydfs_data/{host}_{port}")));
    let cache_dir = std::env::var("HYDFS_CACHE_DIR").unwrap_or_else(|_| "test_files".to_string());

    let transport = Arc::new(UdpTransport::bind(&format!("{host}:{port}"), drop_rate).await?);
    let local = NodeId::new(host.clone(), port);
    tracing::info!(
        "node {} listening on {} (ring position {})",
        local,
        transport.local_addr()?,
        HashRing::position_of(&local)
    );

    let ring = Arc::new(HashRing::new());
    let ring_view = RingAdapter::new(ring.clone());
    let store = FileStore::open(&storage_dir)?;
    let tracker = Arc::new(ClientWriteTracker::new());

    let membership = MembershipService::new(local.clone(), introducer, transport.clone(), ring_view);
    let files = FileService::new(
        local,
        replication,
        ring.clone(),
        store.clone(),
        tracker,
        transport.clone(),
        Some(PathBuf::from(cache_dir).as_path()),
    );

    let router = Router::new(membership.clone(), files.clone(), transport);
    tokio::spawn(router.run());

    let ticker = membership.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            ticker.tick().await;
        }
    });

    if membership.is_introducer() {
        tracing::info!("running as the introducer");
    }

    run_cli(membership, files, store).await
}

async fn run_cli(
    membership: Arc<MembershipService>,
    files: Arc<FileService>,
    store: Arc<FileStore>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [] => {}
            ["help"] => print_help(),
            ["create", local, hydfs] => {
                match files.create(local, hydfs).await {
                    Ok(true) => println!("created {hydfs}"),
                    Ok(false) => println!("create failed"),
                    Err(e) => println!("create failed: {e}"),
                };
            }
            ["get", hydfs, local] => {
                match files.get(hydfs, local).await {
                    Ok(true) => println!("fetched {hydfs} -> {local}"),
                    Ok(false) => println!("get failed"),
                    Err(e) => println!("get failed: {e}"),
                };
            }
            ["append", local, hydfs] => {
                match files.append(local, hydfs).await {
                    Ok(true) => println!("appended {local} to {hydfs}"),
                    Ok(false) => println!("append failed"),
                    Err(e) => println!("append failed: {e}"),
                };
            }
            ["merge", hydfs] => {
                match files.merge(hydfs).await {
                    Ok(true) => println!("merged {hydfs}"),
                    Ok(false) => println!("merge failed"),
                    Err(e) => println!("merge failed: {e}"),
                };
            }
            ["ls", hydfs] => {
                if let Err(e) = files.ls(hydfs).await {
                    println!("ls failed: {e}");
                }
            }
            ["store"] => {
                if let Err(e) = files.list_store().await {
                    println!("store failed: {e}");
                }
            }
            ["getfromreplica", address, hydfs, local] => {
                match files.get_from_replica(address, hydfs, local).await {
                    Ok(true) => println!("fetched {hydfs} from {address} -> {local}"),
                    Ok(false) => println!("getfromreplica failed"),
                    Err(e) => println!("getfromreplica failed: {e}"),
                };
            }
            ["join"] => {
                if membership.is_introducer() {
                    println!("this node is the introducer and cannot join itself");
                } else {
                    // A rejoining node must not serve state from its previous
                    // incarnation.
                    store.clear_all().await;
                    if let Err(e) = membership.join().await {
                        println!("join failed: {e}");
                    }
                }
            }
            ["leave"] => {
                membership.leave().await;
                store.sync().await;
                println!("left the cluster");
                break;
            }
            ["list_mem"] => {
                let mut members = membership.members_snapshot();
                members.sort_by(|a, b| a.node_id.to_string().cmp(&b.node_id.to_string()));
                println!("=== membership ({} nodes) ===", members.len());
                for member in members {
                    println!(
                        "  {} {} (incarnation {}, heartbeat {})",
                        member.node_id,
                        member.status.label(),
                        member.incarnation,
                        member.heartbeat
                    );
                }
            }
            ["list_mem_ids"] => {
                let mut members: Vec<_> = membership
                    .members_snapshot()
                    .into_iter()
                    .map(|m| (HashRing::position_of(&m.node_id), m))
                    .collect();
                members.sort_by_key(|(position, _)| *position);
                println!("=== membership with ring ids ({} nodes) ===", members.len());
                for (position, member) in members {
                    println!("  {:>20} {} {}", position, member.node_id, member.status.label());
                }
            }
            ["list_self"] => {
                println!(
                    "{} (ring position {})",
                    membership.local,
                    HashRing::position_of(&membership.local)
                );
            }
            ["switch", protocol, suspicion] => {
                let suspicion_enabled = match *suspicion {
                    "suspect" => true,
                    "nosuspect" => false,
                    _ => {
                        println!("usage: switch {{gossip|ping}} {{suspect|nosuspect}}");
                        continue;
                    }
                };
                let mode = match (*protocol, suspicion_enabled) {
                    ("gossip", true) => FailureDetectionMode::GossipWithSuspicion,
                    ("gossip", false) => FailureDetectionMode::Gossip,
                    ("ping", true) => FailureDetectionMode::PingAckWithSuspicion,
                    ("ping", false) => FailureDetectionMode::PingAck,
                    _ => {
                        println!("usage: switch {{gossip|ping}} {{suspect|nosuspect}}");
                        continue;
                    }
                };
                membership.switch_mode(mode).await;
                println!("switched to {}", mode.label());
            }
            _ => println!("invalid command (try 'help')"),
        }
    }
    Ok(())
}

fn print_help() {
    println!("\n=== HyDFS Commands ===\n");
    println!("File operations:");
    println!("  create <localfile> <hydfsfile>   - Create file in HyDFS from local file");
    println!("  get <hydfsfile> <localfile>      - Get file from HyDFS to local file");
    println!("  append <localfile> <hydfsfile>   - Append local file to HyDFS file");
    println!("  merge <hydfsfile>                - Merge all replicas of a file");
    println!("  ls <hydfsfile>                   - List all replicas storing the file");
    println!("  store                            - List files stored on this node");
    println!("  getfromreplica <host:port> <hydfsfile> <localfile>");
    println!("                                   - Get file from a specific replica");
    println!("\nMembership operations:");
    println!("  join                             - Join the cluster via the introducer");
    println!("  leave                            - Leave the cluster and exit");
    println!("  list_mem                         - List all members");
    println!("  list_mem_ids                     - List members with ring positions");
    println!("  list_self                        - Show this node's identity");
    println!("  switch {{gossip|ping}} {{suspect|nosuspect}}");
    println!("                                   - Switch failure detection mode");
    println!("\nOther:");
    println!("  help                             - Show this message\n");
}
