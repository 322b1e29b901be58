//! Command-line entry point for the STS chat client.
//!
//! Wires together the crates doing the real work: parses the CLI surface
//! (§6), loads operational configuration, performs the client↔server
//! handshake, then spawns the reader thread (NRL) and runs the interactive
//! command loop (TSC) on the main thread (§5).

mod config;
mod identity;

use std::io::{self, Write as _};
use std::net::TcpStream;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use chat_core::{
    run_initiator, validate_username, NetworkReader, PeerIdentityCheck, PeerLink, SecureChannel,
    TalkSessionController, ThreadBridge,
};
use chat_crypto::certs::CertificateStore;
use chat_crypto::keystore::KeyStore;

use config::Config;
use identity::{read_pem_der, FilesystemKeyStore};

/// The well-known username the server's own certificate is bound to.
const SERVER_USERNAME: &str = "server";

/// Command-line client for the two-party end-to-end encrypted chat protocol.
#[derive(Parser, Debug)]
#[command(name = "chat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Rendezvous server TCP port.
    port: u16,

    /// This client's username (must match a certified signing key).
    username: String,

    /// Present for CLI-surface compatibility; never used cryptographically
    /// (the server authenticates clients by their signing key, not a password).
    password: String,

    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _unused_password = Zeroizing::new(cli.password.clone());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "fatal error");
            eprintln!("chat: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    config.validate()?;

    init_logging(&config.logging.level);

    validate_username(&cli.username)?;

    let keystore = FilesystemKeyStore::new(config.keys.directory.clone());
    let my_signing_key = keystore
        .load_private(&cli.username)
        .map_err(|e| anyhow::anyhow!("loading private key for {}: {e}", cli.username))?;

    let ca_cert_der = read_pem_der(&config.keys.ca_cert)?;
    let crl_der = read_pem_der(&config.keys.crl)?;
    let ca_store = CertificateStore::new(&ca_cert_der, &crl_der)
        .map_err(|e| anyhow::anyhow!("loading CA trust material: {e}"))?;

    let handshake_deadline = Duration::from_secs(config.timeouts.handshake_secs);
    let control_reply_deadline = Duration::from_secs(config.timeouts.control_reply_secs);

    info!(host = %config.server.host, port = cli.port, username = %cli.username, "connecting");
    let mut stream = TcpStream::connect((config.server.host.as_str(), cli.port))?;

    let outcome = run_initiator(
        &mut stream,
        &cli.username,
        &my_signing_key,
        SERVER_USERNAME,
        PeerIdentityCheck::ViaCa(&ca_store),
        handshake_deadline,
    )
    .map_err(|e| anyhow::anyhow!("login handshake with server failed: {e}"))?;
    info!(peer = %outcome.peer_username, "login handshake complete");

    let channel = Arc::new(SecureChannel::new(stream, outcome.session_key)?);
    let bridge = Arc::new(ThreadBridge::new());
    let replies = Arc::new(chat_core::OneSlot::new());
    let peer_link = Arc::new(PeerLink::new());

    let reader = NetworkReader::new(
        Arc::clone(&channel),
        Arc::clone(&bridge),
        Arc::clone(&replies),
        Arc::clone(&peer_link),
    );
    let reader_thread = std::thread::spawn(move || reader.run());

    let controller = TalkSessionController::with_deadlines(
        channel,
        bridge,
        replies,
        peer_link,
        keystore,
        cli.username.clone(),
        my_signing_key,
        control_reply_deadline,
        handshake_deadline,
    );

    let result = command_loop(&controller);

    let _ = controller.exit();
    let _ = reader_thread.join();

    result
}

fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// How often the main loop wakes to check for an arrived chat line or a
/// newly pending talk request while no terminal input is ready.
const POLL_INTERVAL: Duration = Duration::from_millis(150);

/// Interactive command loop per §4.4: `show`, `talk <peer>`, `exit`, `:q`
/// (end talk), and, while in a talk, bare lines sent as chat.
///
/// Terminal input is read on its own long-lived thread and handed across an
/// `mpsc` channel, so this loop can alternate between polling that channel
/// and draining [`TalkSessionController::drain_talk_message`] — the input
/// thread plays the role of §5's input-slave, generalized to run for the
/// session's duration so incoming peer chat lines display even while the
/// operator hasn't pressed enter yet.
fn command_loop(controller: &TalkSessionController<FilesystemKeyStore>) -> anyhow::Result<()> {
    let (input_tx, input_rx) = mpsc::channel::<String>();
    std::thread::spawn(move || loop {
        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                if input_tx.send(line).is_err() {
                    break;
                }
            }
        }
    });

    let mut awaiting_decision: Option<String> = None;
    print!("> ");
    io::stdout().flush().ok();

    loop {
        while let Some(message) = controller.drain_talk_message(Duration::from_millis(0)) {
            println!("\n{message}");
        }

        if awaiting_decision.is_none() {
            if let Some(peer) = controller.peek_pending_request() {
                println!("\nincoming talk request from {peer} - accept? [y/n]");
                print!("> ");
                io::stdout().flush().ok();
                awaiting_decision = Some(peer);
            }
        }

        let line = match input_rx.recv_timeout(POLL_INTERVAL) {
            Ok(line) => line,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };
        let line = line.trim();

        if let Some(peer) = awaiting_decision.take() {
            handle_decision(controller, &peer, line);
        } else if !dispatch_command(controller, line) {
            break;
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}

/// Act on the operator's y/n answer to a pending peer-initiated talk request.
fn handle_decision(controller: &TalkSessionController<FilesystemKeyStore>, peer: &str, answer: &str) {
    if answer.eq_ignore_ascii_case("y") {
        match controller.accept_pending_request() {
            Ok(Some(confirmed)) => println!("now talking with {confirmed}"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, peer, "accepting talk request failed"),
        }
    } else if let Err(e) = controller.refuse_pending_request() {
        warn!(error = %e, peer, "refusing talk request failed");
    }
}

/// Dispatch one line of ordinary (non-accept-decision) input. Returns
/// `false` when the session should end.
fn dispatch_command(controller: &TalkSessionController<FilesystemKeyStore>, line: &str) -> bool {
    if controller.state() == chat_core::TalkState::Yes {
        if line == ":q" {
            if let Err(e) = controller.end_talk() {
                warn!(error = %e, "end_talk failed");
            }
        } else if !line.is_empty() {
            if let Err(e) = controller.send_line(line) {
                warn!(error = %e, "send_line failed");
            }
        }
        return true;
    }

    match line.split_once(' ') {
        Some(("talk", peer)) => match controller.talk(peer.trim()) {
            Ok(()) => println!("now talking with {}", peer.trim()),
            Err(e) => println!("talk failed: {e}"),
        },
        _ => match line {
            "show" => match controller.show() {
                Ok(listing) => print!("{listing}"),
                Err(e) => println!("show failed: {e}"),
            },
            "exit" => return false,
            "" => {}
            other => println!("unrecognized command: {other}"),
        },
    }
    true
}
