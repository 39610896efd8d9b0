//! LeiA simulation binary.
//!
//! Runs two nodes over a seeded, fault-injecting bus and logs what happened.
//!
//! # Usage
//!
//! ```bash
//! # Reference configuration, perfect bus
//! leia-sim --messages 100
//!
//! # Lossy bus with retries and the strong MAC
//! leia-sim --messages 1000 --drop-rate 0.05 --tx-fail-rate 0.02 --retries 3 --mac hmac
//!
//! # Frame-level trace
//! RUST_LOG=leia_core=trace leia-sim --messages 4
//! ```

use clap::{Parser, ValueEnum};
use leia_core::{
    AdditiveMac, Channels, HmacSha256Mac, IntegrityFunction, NodeConfig, TransmitPolicy,
};
use leia_harness::{FaultConfig, SimWorld};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Integrity function selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MacKind {
    /// Wrapping sum (reference firmware, not secure)
    Additive,
    /// HMAC-SHA-256 truncated to 64 bits
    Hmac,
}

/// LeiA two-node simulation
#[derive(Parser, Debug)]
#[command(name = "leia-sim")]
#[command(about = "Simulate a LeiA authenticated exchange on a CAN bus")]
#[command(version)]
struct Args {
    /// Base id of the data channel
    #[arg(long, default_value = "256", value_parser = parse_id)]
    data_id: u16,

    /// Base id of the mac channel
    #[arg(long, default_value = "257", value_parser = parse_id)]
    mac_id: u16,

    /// Standard id of the Auth-Fail channel
    #[arg(long, default_value = "258", value_parser = parse_id)]
    fail_id: u16,

    /// Long-term shared key
    #[arg(long, default_value = "10")]
    shared_key: u64,

    /// Messages to send, alternating between the nodes
    #[arg(short, long, default_value = "100")]
    messages: u64,

    /// RNG seed for fault injection
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Probability a frame is lost on the wire
    #[arg(long, default_value = "0.0")]
    drop_rate: f64,

    /// Probability the controller rejects a transmission
    #[arg(long, default_value = "0.0")]
    tx_fail_rate: f64,

    /// Extra transmit attempts per frame (0 = best effort)
    #[arg(long, default_value = "0")]
    retries: u32,

    /// Frames delivered per message before the bus is flushed
    #[arg(long, default_value = "4096")]
    max_steps: usize,

    /// Integrity function
    #[arg(long, value_enum, default_value = "additive")]
    mac: MacKind,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Accept decimal or `0x`-prefixed hex.
fn parse_id(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid identifier {s:?}: {e}"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let channels = Channels::new(args.data_id, args.mac_id, args.fail_id)?;
    let policy = match args.retries {
        0 => TransmitPolicy::BestEffort,
        n => TransmitPolicy::Retry { max_attempts: n.saturating_add(1) },
    };
    let config = NodeConfig::new(channels, args.shared_key).with_transmit_policy(policy);
    let faults =
        FaultConfig { drop_rate: args.drop_rate, transmit_failure_rate: args.tx_fail_rate };

    tracing::info!(
        data = %channels.data(),
        mac = %channels.mac(),
        fail = %channels.fail(),
        messages = args.messages,
        seed = args.seed,
        ?faults,
        ?policy,
        "starting simulation"
    );

    match args.mac {
        MacKind::Additive => run(&args, &config, AdditiveMac, faults),
        MacKind::Hmac => run(&args, &config, HmacSha256Mac, faults),
    }

    Ok(())
}

fn run<M: IntegrityFunction>(args: &Args, config: &NodeConfig, mac: M, faults: FaultConfig) {
    let mut world = SimWorld::new(config, mac, args.seed, faults);
    let mut stalls = 0u64;

    for data in 0..args.messages {
        let from = usize::from(data % 2 == 1);
        if let Err(e) = world.submit(from, data) {
            tracing::debug!(from, data, error = %e, "submit failed");
        }
        if !world.deliver_pending(args.max_steps).quiescent {
            stalls += 1;
            tracing::warn!(from, data, "delivery budget exhausted, bus flushed");
        }
    }

    for index in 0..2 {
        let node = world.node(index);
        let stats = node.stats();
        let bus = world.bus(index);
        tracing::info!(
            node = index,
            epoch = node.session().epoch(),
            sequence = node.session().sequence(),
            pairs_sent = stats.pairs_sent,
            accepted = stats.messages_accepted,
            auth_fails_sent = stats.auth_fails_sent,
            epochs_announced = stats.epochs_announced,
            resyncs = stats.resyncs,
            transmit_failures = stats.transmit_failures,
            frames_dropped = bus.dropped(),
            "node summary"
        );
    }

    tracing::info!(stalls, synchronized = world.synchronized(), "simulation finished");
}
