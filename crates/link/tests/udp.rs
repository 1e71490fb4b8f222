use std::thread;
use std::time::{Duration, Instant};

use kartlink::{
    CarState, HardwareId, NetConfig, Packet, Payload, Session, Transport, UdpConfig, UdpTransport,
};

fn open(last: u8) -> UdpTransport {
    let config = UdpConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        hardware_id: HardwareId([0x02, 0x00, 0x00, 0x00, 0x00, last]),
        ..Default::default()
    };
    UdpTransport::open(&config).unwrap()
}

/// Two sockets that treat each other as the whole broadcast domain.
fn linked_pair() -> (UdpTransport, UdpTransport) {
    let mut a = open(1);
    let mut b = open(2);
    a.set_broadcast_addr(b.local_addr());
    b.set_broadcast_addr(a.local_addr());
    (a, b)
}

fn wait_for_datagram(transport: &mut UdpTransport, timeout_ms: u64) -> Option<Vec<u8>> {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        if let Some(data) = transport.try_recv() {
            return Some(data);
        }
        thread::sleep(Duration::from_millis(1));
    }
    None
}

#[test]
fn test_datagram_round_trip_over_udp() {
    let (mut a, mut b) = linked_pair();

    let mut packet = Packet::new(1, Payload::Ready { ready: true });
    packet.seq = 42;
    a.send(&packet.encode()).unwrap();

    let data = wait_for_datagram(&mut b, 500).expect("No datagram received");
    assert_eq!(data.len(), 32);
    assert_eq!(Packet::decode(&data).unwrap(), packet);
    assert!(b.try_recv().is_none());
}

#[test]
fn test_sessions_meet_over_udp() {
    let (a_transport, b_transport) = linked_pair();
    let config = NetConfig {
        disconnect_spacing: Duration::ZERO,
        ..NetConfig::default()
    };

    let mut a = Session::new(config.clone());
    let mut b = Session::new(config);
    assert_eq!(a.init(|| Ok(a_transport)).unwrap(), 1);
    assert_eq!(b.init(|| Ok(b_transport)).unwrap(), 2);

    a.join_lobby();
    b.join_lobby();
    a.set_ready(true);
    b.set_ready(true);

    let start = Instant::now();
    let mut ready = false;
    while start.elapsed() < Duration::from_secs(2) {
        let a_ready = a.update_lobby();
        let b_ready = b.update_lobby();
        if a_ready && b_ready {
            ready = true;
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    assert!(ready);

    a.start_race();
    b.start_race();
    a.send_car_state(&CarState {
        lap: 1,
        ..CarState::default()
    });

    let mut mirrors = [CarState::default(); 8];
    let start = Instant::now();
    while mirrors[1].lap == 0 && start.elapsed() < Duration::from_millis(500) {
        b.receive_car_states(&mut mirrors);
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(mirrors[1].lap, 1);

    a.nuke();
    let start = Instant::now();
    while b.is_player_connected(1) && start.elapsed() < Duration::from_millis(500) {
        b.receive_car_states(&mut mirrors);
        thread::sleep(Duration::from_millis(1));
    }
    assert!(!b.is_player_connected(1));
}
