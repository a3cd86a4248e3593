//! Entry point for `rdt-chat`.
//!
//! A line-oriented chat over one of the reliable-data-transfer engines.
//! Lines typed on stdin are sent to the peer, except for the `help` and
//! `set ...` commands which inspect or reconfigure the session.  Delivered
//! payloads are printed to stdout.  `main.rs` owns only process setup
//! (logging, argument parsing, the stdin loop).

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use rdt_over_udp::{ChannelConfig, EndpointConfig, ProtocolKind, Session};

/// Chat over a reliable-data-transfer protocol on a lossy UDP channel.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Protocol: 1.0, 2.0, 2.1, 2.2, 3.0, gobackn or selectiverepeat.
    #[arg(short, long, default_value = "1.0")]
    protocol: ProtocolKind,

    #[arg(long, default_value = "127.0.0.1")]
    local_host: String,

    #[arg(long, default_value_t = 7777)]
    local_port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    remote_host: String,

    #[arg(long, default_value_t = 8888)]
    remote_port: u16,

    /// Window size for gobackn / selectiverepeat.
    #[arg(short, long, default_value_t = 10)]
    window: usize,

    /// Retransmission timeout (defaults depend on the protocol).
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Receive poll interval (defaults depend on the protocol).
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Probability that an inbound datagram is dropped.
    #[arg(long, default_value_t = 0.0)]
    loss: f64,

    /// Probability that an inbound datagram is not delayed.
    #[arg(long, default_value_t = 1.0)]
    in_time: f64,

    /// Probability that an inbound datagram is not damaged.
    #[arg(long, default_value_t = 0.5)]
    correct: f64,

    #[arg(long, default_value_t = 1000)]
    max_delay_ms: u64,

    /// Seed for a reproducible fault sequence.
    #[arg(long)]
    seed: Option<u64>,

    /// Bypass the fault-injecting channel entirely.
    #[arg(long)]
    reliable: bool,
}

impl Cli {
    fn endpoint_config(&self) -> EndpointConfig {
        let channel = (!self.reliable).then(|| ChannelConfig {
            loss_probability: self.loss,
            in_time_probability: self.in_time,
            correct_probability: self.correct,
            max_delay: Duration::from_millis(self.max_delay_ms),
            seed: self.seed,
        });
        EndpointConfig {
            protocol: self.protocol,
            local_host: self.local_host.clone(),
            local_port: self.local_port,
            remote_host: self.remote_host.clone(),
            remote_port: self.remote_port,
            window_size: self.window,
            retransmit_timeout: self.timeout_ms.map(Duration::from_millis),
            poll_interval: self.poll_ms.map(Duration::from_millis),
            channel,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Setting {
    Protocol(ProtocolKind),
    LocalHost(String),
    LocalPort(u16),
    RemoteHost(String),
    RemotePort(u16),
}

#[derive(Debug, PartialEq)]
enum Command {
    Help(Option<String>),
    Set(Setting),
    /// A `set` line that could not be parsed.
    Invalid(String),
    Send(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [help] if help.eq_ignore_ascii_case("help") => Self::Help(None),
            [help, topic] if help.eq_ignore_ascii_case("help") => {
                Self::Help(Some(topic.to_ascii_lowercase()))
            }
            [set, key, value] if set.eq_ignore_ascii_case("set") => {
                match Self::setting(&key.to_ascii_lowercase(), value) {
                    Ok(setting) => Self::Set(setting),
                    Err(reason) => Self::Invalid(reason),
                }
            }
            _ => Self::Send(line.to_string()),
        }
    }

    fn setting(key: &str, value: &str) -> Result<Setting, String> {
        let port = |value: &str| {
            value
                .parse::<u16>()
                .map_err(|e| format!("invalid port `{value}`: {e}"))
        };
        match key {
            "protocol" => value
                .parse()
                .map(Setting::Protocol)
                .map_err(|e| e.to_string()),
            "localhost" => Ok(Setting::LocalHost(value.to_string())),
            "localport" => port(value).map(Setting::LocalPort),
            "remotehost" => Ok(Setting::RemoteHost(value.to_string())),
            "remoteport" => port(value).map(Setting::RemotePort),
            other => Err(format!("unknown setting `{other}`")),
        }
    }
}

fn help_text(topic: Option<&str>) -> String {
    match topic {
        None => "commands:\n  help (protocol|localhost|localport|remotehost|remoteport)\n  \
                 set (protocol|localhost|localport|remotehost|remoteport) VALUE\n  \
                 anything else is sent to the peer"
            .to_string(),
        Some("protocol") => {
            "set protocol (1.0|2.0|2.1|2.2|3.0|gobackn|selectiverepeat)".to_string()
        }
        Some(topic @ ("localhost" | "remotehost")) => format!("set {topic} HOST"),
        Some(topic @ ("localport" | "remoteport")) => format!("set {topic} PORT"),
        Some(other) => format!("no help available for `{other}`"),
    }
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.endpoint_config();
    log::info!("starting chat with {:?}", config);

    let mut session = Session::new(config)
        .await
        .context("failed to open endpoint")?;
    session.add_receiver(|payload: &[u8]| {
        println!("{}", String::from_utf8_lossy(payload));
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match Command::parse(&line) {
            Command::Help(topic) => println!("{}", help_text(topic.as_deref())),
            Command::Set(setting) => {
                let result = match setting {
                    Setting::Protocol(kind) => session.switch(kind).await,
                    Setting::LocalHost(host) => session.reconfigure(|c| c.local_host = host).await,
                    Setting::LocalPort(port) => session.reconfigure(|c| c.local_port = port).await,
                    Setting::RemoteHost(host) => {
                        session.reconfigure(|c| c.remote_host = host).await
                    }
                    Setting::RemotePort(port) => {
                        session.reconfigure(|c| c.remote_port = port).await
                    }
                };
                if let Err(e) = result {
                    log::error!("reconfiguration failed: {e:#}");
                }
            }
            Command::Invalid(reason) => log::error!("{reason}"),
            Command::Send(text) => {
                if let Err(e) = session.send(text.as_bytes()).await {
                    log::error!("send failed: {e}");
                }
            }
        }
    }

    session.close().await;
    Ok(())
}
