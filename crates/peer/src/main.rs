mod config;
mod countdown;
mod driver;

use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;

use config::{PeerConfig, local_hardware_id};
use driver::PeerDriver;
use kartlink::{
    HardwareId, LoopbackNetwork, MAX_PLAYERS, PacketLossSimulation, Transport, UdpConfig,
    UdpTransport,
};

#[derive(Parser)]
#[command(name = "kartlink-peer")]
#[command(about = "Serverless LAN race peer")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = kartlink::DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value = "255.255.255.255")]
    broadcast: String,

    #[arg(long, help = "Hardware id as XX:XX:XX:XX:XX:XX (interface MAC if omitted)")]
    mac: Option<HardwareId>,

    #[arg(short, long, default_value_t = kartlink::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(long, default_value_t = 60, help = "Lobby ticks before marking ready")]
    ready_after: u32,

    #[arg(long, default_value_t = 180, help = "Countdown length in ticks")]
    countdown: u32,

    #[arg(long, default_value_t = 30)]
    race_secs: u32,

    #[arg(long, help = "Run this many peers on an in-process network instead of UDP")]
    simulate: Option<usize>,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100), simulation only")]
    loss_percent: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let base = PeerConfig::for_tick_rate(args.tick_rate)?;
    let config = PeerConfig {
        ready_after: args.ready_after,
        countdown_frames: args.countdown,
        race_ticks: args.race_secs * base.tick_rate,
        ..base
    };

    match args.simulate {
        Some(count) => run_simulated(count, args.loss_percent, config),
        None => run_udp(&args, config),
    }
}

fn run_udp(args: &Args, config: PeerConfig) -> Result<()> {
    let bind_addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .context("invalid bind address")?;
    let broadcast_addr: SocketAddr = format!("{}:{}", args.broadcast, args.port)
        .parse()
        .context("invalid broadcast address")?;
    if args.loss_percent > 0.0 {
        log::warn!("--loss-percent only applies with --simulate");
    }

    let udp = UdpConfig {
        bind_addr,
        broadcast_addr,
        hardware_id: args.mac.unwrap_or_else(local_hardware_id),
    };

    let tick_rate = config.tick_rate;
    let mut driver = PeerDriver::new(config);
    let id = driver.init(|| UdpTransport::open(&udp))?;
    log::info!(
        "Peer {} listening on {} (hardware id {})",
        id,
        bind_addr,
        udp.hardware_id
    );

    run_realtime(&mut driver, tick_rate);
    Ok(())
}

/// Fixed-timestep loop: catches up on missed ticks, sleeps between them.
fn run_realtime<T: Transport>(driver: &mut PeerDriver<T>, tick_rate: u32) {
    let tick_duration = Duration::from_secs_f64(1.0 / tick_rate as f64);
    let mut last_tick_time = Instant::now();
    let mut accumulator = Duration::ZERO;

    while !driver.is_finished() {
        let now = Instant::now();
        accumulator += now - last_tick_time;
        last_tick_time = now;

        while accumulator >= tick_duration && !driver.is_finished() {
            accumulator -= tick_duration;
            driver.tick();
        }
        thread::sleep(Duration::from_millis(1));
    }
}

fn run_simulated(count: usize, loss_percent: f32, config: PeerConfig) -> Result<()> {
    anyhow::ensure!(
        (2..=MAX_PLAYERS).contains(&count),
        "--simulate needs between 2 and {} peers",
        MAX_PLAYERS
    );

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1);
    let network = if loss_percent > 0.0 {
        LoopbackNetwork::with_loss(PacketLossSimulation::with_loss(loss_percent), seed)
    } else {
        LoopbackNetwork::new()
    };

    let mut drivers = Vec::with_capacity(count);
    for index in 0..count {
        let transport = network.attach(HardwareId([0x02, 0x00, 0x00, 0x00, 0x00, index as u8 + 1]));
        let mut driver = PeerDriver::new(config.clone());
        driver.init(|| Ok(transport))?;
        drivers.push(driver);
    }
    log::info!(
        "Simulating {} peers with {:.1}% packet loss",
        count,
        loss_percent
    );

    // Lobby, countdown and race, plus slack for a lossy discovery.
    let tick_budget =
        config.ready_after + config.countdown_frames + config.race_ticks + 60 * config.tick_rate;
    for _ in 0..tick_budget {
        if drivers.iter().all(PeerDriver::is_finished) {
            break;
        }
        for driver in &mut drivers {
            driver.tick();
        }
    }

    for driver in drivers.iter_mut().filter(|d| !d.is_finished()) {
        driver.abort();
    }
    log::info!("Simulation finished, {} packets lost", network.dropped());
    Ok(())
}
