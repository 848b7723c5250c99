//! The socket-owning layer the `Pool` doc comment describes as living
//! outside that crate: this module is the only place that touches a
//! `TcpStream`. Every connection gets a reader task (bytes -> `WireCodec`
//! -> `Payload`, handed to the actor over an mpsc channel) and relies on
//! an `UnboundedSender<Payload>` for the reverse direction, exactly the
//! shape `PeerHandle::sender` expects (design note §9 "cyclic
//! references" — the peer never holds a pool reference, only an id and
//! a sender).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};
use hsk_core::NetAddress;
use hsk_net::{DisconnectReason, Frame, Payload, WireCodec};
use hsk_pool::{Chain, Mempool, Pool, PoolAction, ProofVerifier};
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

const READ_BUF_SIZE: usize = 64 * 1024;

enum PoolEvent {
    Connected {
        addr: NetAddress,
        outbound: bool,
        sender: mpsc::UnboundedSender<Payload>,
        reply: tokio::sync::oneshot::Sender<u64>,
    },
    Packet(u64, Payload),
    Closed(u64),
    Tick,
}

/// Owns the `Pool` and the socket registry, and runs the single-threaded
/// event loop spec §5 describes: packets are delivered strictly in
/// receive order per peer (the reader task is one coroutine per
/// connection, so this falls out for free) and pool-level handling is
/// fully serialized because only this loop ever calls into `Pool`.
pub struct Node {
    pool: Pool,
    magic: u32,
    senders: HashMap<u64, mpsc::UnboundedSender<Payload>>,
    events_tx: mpsc::UnboundedSender<PoolEvent>,
    events_rx: mpsc::UnboundedReceiver<PoolEvent>,
}

impl Node {
    pub fn new(
        options: hsk_pool::PoolOptions,
        book: hsk_addrbook::AddrBook,
        chain: Arc<dyn Chain>,
        mempool: Arc<dyn Mempool>,
        proof_verifier: Arc<dyn ProofVerifier>,
        genesis: hsk_core::Hash,
    ) -> Node {
        let magic = options.network_magic;
        let now = Instant::now();
        let unix_now = unix_secs();
        let pool = Pool::new(options, book, chain, mempool, proof_verifier, genesis, now, unix_now);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Node { pool, magic, senders: HashMap::new(), events_tx, events_rx }
    }

    pub async fn run(mut self, listen_addr: Option<SocketAddr>, seed_addrs: Vec<NetAddress>) -> anyhow::Result<()> {
        if let Some(addr) = listen_addr {
            let listener = TcpListener::bind(addr).await?;
            info!(target: "pool", "listening on {addr}");
            let events_tx = self.events_tx.clone();
            let magic = self.magic;
            tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok((stream, peer_addr)) => {
                            spawn_connection(stream, peer_addr, false, magic, events_tx.clone());
                        }
                        Err(e) => {
                            warn!(target: "pool", "accept failed: {e}");
                        }
                    }
                }
            });
        }

        for addr in seed_addrs {
            self.dial(addr);
        }

        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.events_tx.send(PoolEvent::Tick).ok();
                }
                event = self.events_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => break,
                    }
                }
            }
        }
        Ok(())
    }

    fn dial(&mut self, addr: NetAddress) {
        let events_tx = self.events_tx.clone();
        let magic = self.magic;
        let socket_addr = SocketAddr::new(addr.ip(), addr.port);
        tokio::spawn(async move {
            match TcpStream::connect(socket_addr).await {
                Ok(stream) => spawn_connection(stream, socket_addr, true, magic, events_tx),
                Err(e) => {
                    debug!(target: "pool", "dial {socket_addr} failed: {e}");
                }
            }
        });
    }

    fn handle_event(&mut self, event: PoolEvent) {
        let now = Instant::now();
        let actions = match event {
            PoolEvent::Connected { addr, outbound, sender, reply } => {
                let unix_now = unix_secs();
                let (id, initial) = self.pool.register_peer(addr, outbound, sender.clone(), now, unix_now);
                self.senders.insert(id, sender.clone());
                for payload in initial {
                    sender.send(payload).ok();
                }
                reply.send(id).ok();
                Vec::new()
            }
            PoolEvent::Packet(id, payload) => self.pool.handle(id, payload, now),
            PoolEvent::Closed(id) => {
                self.senders.remove(&id);
                self.pool.remove_peer(id)
            }
            PoolEvent::Tick => self.pool.tick(now),
        };
        self.dispatch(actions);
    }

    fn dispatch(&mut self, actions: Vec<PoolAction>) {
        for action in actions {
            match action {
                PoolAction::Send(id, payload) => {
                    if let Some(sender) = self.senders.get(&id) {
                        sender.send(payload).ok();
                    }
                }
                PoolAction::Disconnect(id, reason) => {
                    debug!(target: "pool", "disconnecting peer {id}: {reason:?}");
                    self.senders.remove(&id);
                    let _: DisconnectReason = reason;
                }
                PoolAction::Connect(addr) => self.dial(addr),
            }
        }
    }
}

fn spawn_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    outbound: bool,
    magic: u32,
    events_tx: mpsc::UnboundedSender<PoolEvent>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Payload>();
    let addr = NetAddress::new(peer_addr.ip(), peer_addr.port());
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            let cmd = payload.packet_type() as u8;
            let frame = hsk_net::encode_frame(magic, cmd, &payload.encode());
            if writer.write_all(&frame).await.is_err() {
                break;
            }
        }
    });

    events_tx.send(PoolEvent::Connected { addr, outbound, sender: tx, reply: reply_tx }).ok();

    tokio::spawn(async move {
        // Registration always replies before any packet can be routed,
        // so the id is known for the whole lifetime of this task; a
        // closed reply channel just means the pool never came up.
        let Ok(peer_id) = reply_rx.await else { return };
        let mut codec = WireCodec::new(magic);
        let mut buf = BytesMut::with_capacity(READ_BUF_SIZE);
        loop {
            let n = match reader.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(_) => break,
            };
            let chunk: Bytes = buf.split_to(n).freeze();
            let frames = match codec.feed(chunk) {
                Ok(frames) => frames,
                Err(e) => {
                    warn!(target: "pool", "codec error from {peer_addr}: {e}");
                    break;
                }
            };
            for Frame { cmd, payload } in frames {
                let Some(ty) = hsk_core::PacketType::from_u8(cmd) else { continue };
                match Payload::decode(ty, &payload) {
                    Ok(payload) => {
                        events_tx.send(PoolEvent::Packet(peer_id, payload)).ok();
                    }
                    Err(e) => {
                        debug!(target: "pool", "payload decode error from {peer_addr}: {e}");
                    }
                }
            }
        }
        events_tx.send(PoolEvent::Closed(peer_id)).ok();
    });
}

fn unix_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

pub fn parse_seed(addr: &str, default_port: u16) -> Option<NetAddress> {
    if let Some(parsed) = hsk_core::parse_canonical_host(addr) {
        return Some(parsed);
    }
    let socket_addr: SocketAddr = addr.parse().ok().or_else(|| {
        format!("{addr}:{default_port}").parse().ok()
    })?;
    Some(NetAddress::new(socket_addr.ip(), socket_addr.port()))
}
