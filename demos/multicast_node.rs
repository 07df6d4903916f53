use clap::Parser;
use clap_derive::Parser;
use async_trait::async_trait;
use rmcast::config::MulticastConfig;
use rmcast::listeners::DataDispatcher;
use rmcast::peer::MulticastPeer;
use rmcast::sequence_number::SequenceNumber;
use rmcast::transport::MulticastTransport;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::time::sleep;
use tracing::{error, info, Level};

#[derive(Parser)]
struct Args {
    /// this node's peer id (hex)
    peer_id: String,

    #[clap(long, default_value = "224.0.0.128:49152")]
    group: String,

    /// send data to these listeners (hex peer ids), making this node the active side
    #[clap(long)]
    listener: Vec<String>,

    /// accept data from these senders (hex peer ids) without waiting for their SYN. Passive
    ///  best-effort nodes need this, since best-effort senders don't send SYNs.
    #[clap(long)]
    sender: Vec<String>,

    #[clap(long, default_value_t = false)]
    best_effort: bool,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

struct PrintingDispatcher;

#[async_trait]
impl DataDispatcher for PrintingDispatcher {
    async fn on_data(&self, source: MulticastPeer, sequence: SequenceNumber, payload: &[u8]) {
        info!("received #{} from {}: {}", sequence, source, String::from_utf8_lossy(payload));
    }
}

fn parse_peer(s: &str) -> anyhow::Result<MulticastPeer> {
    Ok(MulticastPeer::from_raw(u64::from_str_radix(s, 16)?))
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let mut listeners = Vec::new();
    for s in &args.listener {
        listeners.push(parse_peer(s)?);
    }
    let mut senders = Vec::new();
    for s in &args.sender {
        senders.push(parse_peer(s)?);
    }

    let group: SocketAddr = args.group.parse()?;
    let config = Arc::new(MulticastConfig {
        local_peer: Some(parse_peer(&args.peer_id)?),
        reliable: !args.best_effort,
        ..MulticastConfig::new(group)
    });

    let active = !listeners.is_empty();
    let transport = Arc::new(MulticastTransport::new(config, active, Arc::new(PrintingDispatcher)).await?);

    select! {
        _ = transport.recv_loop() => { Ok(()) }
        result = send_loop(transport.clone(), listeners, senders) => { result }
    }
}

async fn send_loop(transport: Arc<MulticastTransport>, listeners: Vec<MulticastPeer>, senders: Vec<MulticastPeer>) -> anyhow::Result<()> {
    if listeners.is_empty() {
        // passive nodes only listen
        for &sender in &senders {
            transport.associate(sender).await?;
        }
        return std::future::pending().await;
    }

    for &listener in &listeners {
        transport.associate(listener).await?;
    }
    for &listener in &listeners {
        if let Err(e) = transport.wait_for_association(listener, Duration::from_secs(30)).await {
            error!("{}", e);
        }
    }

    let mut counter = 0u64;
    loop {
        counter += 1;
        let seq = transport.send(format!("message {}", counter).as_bytes()).await?;
        info!("sent message {} as #{}", counter, seq);
        sleep(Duration::from_secs(1)).await;
    }
}
