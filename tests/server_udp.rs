use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use pixelvloed::protocol::encode;
use pixelvloed::{
    DiscoveryBeacon, FixedResolution, InMemorySink, Pacer, PacketReceiver, PixelUpdate,
    Server, ServerConfig, Shutdown, ingress_queue,
};

fn free_udp_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn listener() -> (UdpSocket, SocketAddr) {
    let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
    sock.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let addr = sock.local_addr().unwrap();
    (sock, addr)
}

fn loopback_config(bind_port: u16, discover_port: u16) -> ServerConfig {
    ServerConfig {
        bind_ip: "127.0.0.1".parse().unwrap(),
        bind_port,
        broadcast_ip: "127.0.0.1".parse().unwrap(),
        discover_port,
        width: Some(64),
        height: Some(32),
        ..ServerConfig::default()
    }
}

#[test]
fn receiver_queues_raw_datagrams_in_order() {
    let (tx, rx) = ingress_queue(16);
    let receiver = PacketReceiver::bind("127.0.0.1:0".parse().unwrap(), tx).unwrap();
    let addr = receiver.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = receiver.spawn(shutdown.clone()).unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client.send_to(&[0, 1, 2, 3], addr).unwrap();
    client.send_to(&[9], addr).unwrap();

    let mut got = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while got.len() < 2 && Instant::now() < deadline {
        match rx.try_pop() {
            Some(d) => got.push(d),
            None => thread::sleep(Duration::from_millis(5)),
        }
    }
    shutdown.trigger();
    handle.join().unwrap();

    assert_eq!(got, vec![vec![0, 1, 2, 3], vec![9]]);
    assert_eq!(rx.stats().received(), 2);
}

#[test]
fn pacer_announces_on_its_own_interval() {
    let (listen, listen_addr) = listener();
    let cfg = ServerConfig {
        beacon_interval_ms: 200,
        ..loopback_config(5005, listen_addr.port())
    }
    .resolve(&FixedResolution::default())
    .unwrap();

    let (_tx, rx) = ingress_queue(4);
    let beacon = DiscoveryBeacon::new(&cfg).unwrap();
    let mut pacer = Pacer::new(&cfg, rx, InMemorySink::new())
        .unwrap()
        .with_beacon(beacon);

    assert!(!pacer.tick().announced);
    thread::sleep(Duration::from_millis(250));
    let report = pacer.tick();
    assert!(report.announced);
    assert!(!report.presented);

    let mut buf = [0u8; 256];
    let (n, _) = listen.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"pixelvloed:1.000000 127.0.0.1:5005 64*32");
}

#[test]
fn end_to_end_paint_present_and_discover() {
    let (listen, listen_addr) = listener();
    let port = free_udp_port();
    let cfg = loopback_config(port, listen_addr.port())
        .resolve(&FixedResolution::default())
        .unwrap();

    let server = Server::bind(&cfg, InMemorySink::new()).unwrap();
    let addr = server.local_addr();
    let shutdown = server.shutdown_handle();
    let run = thread::spawn(move || server.run().unwrap());

    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    let packet = encode(
        false,
        1,
        &[
            PixelUpdate::opaque(10, 20, 255, 0, 0),
            PixelUpdate::opaque(500, 500, 0, 255, 0),
        ],
    );
    client.send_to(&packet, addr).unwrap();
    client.send_to(&[7], addr).unwrap();

    let mut buf = [0u8; 256];
    let (n, _) = listen.recv_from(&mut buf).unwrap();
    let announced = std::str::from_utf8(&buf[..n]).unwrap().to_string();

    shutdown.trigger();
    let sink = run.join().unwrap();

    assert_eq!(announced, format!("pixelvloed:1.000000 127.0.0.1:{port} 64*32"));
    let frame = sink.last().expect("a frame was presented");
    assert_eq!((frame.width, frame.height), (64, 32));
    assert_eq!(frame.cell(10, 20), Some(0xFF0000));
    assert_eq!(frame.cells.iter().filter(|&&c| c != 0).count(), 1);
}

#[test]
fn idle_server_never_presents() {
    let cfg = loopback_config(0, free_udp_port())
        .resolve(&FixedResolution::default())
        .unwrap();

    let server = Server::bind_with_beacon(&cfg, InMemorySink::new(), None).unwrap();
    let shutdown = server.shutdown_handle();
    let run = thread::spawn(move || server.run().unwrap());
    thread::sleep(Duration::from_millis(300));
    shutdown.trigger();

    let sink = run.join().unwrap();
    assert!(sink.frames().is_empty());
}
