use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use peershare::error::ResponseError;
use peershare::net::MessageServer;
use peershare::record::FileRecord;
use peershare::tracker::{Tracker, TrackerClient};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing_test::traced_test;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

async fn start_tracker() -> (TrackerClient, broadcast::Sender<()>) {
    let server = MessageServer::bind("127.0.0.1:0").await.unwrap();
    let tracker = TrackerClient::new(server.local_addr());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(server.run(Tracker::new(), shutdown_rx));
    (tracker, shutdown_tx)
}

/// Sends raw bytes, half-closes and returns whatever comes back.
async fn exchange_raw(addr: SocketAddr, frame: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(frame).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    response
}

fn is_rejected(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<ResponseError>(),
        Some(ResponseError::Rejected(_))
    )
}

#[tokio::test]
#[traced_test]
async fn test_untrusted_add_and_list_are_rejected() {
    let (tracker, _shutdown) = start_tracker().await;

    let error = tracker
        .add(&FileRecord::new("report.pdf", "abc123", 2048))
        .await
        .unwrap_err();
    assert!(is_rejected(&error), "unexpected error: {:#}", error);

    let error = tracker.list().await.unwrap_err();
    assert!(is_rejected(&error), "unexpected error: {:#}", error);

    // The rejected add left nothing behind
    tracker.connect().await.unwrap();
    assert!(tracker.list().await.unwrap().is_empty());
}

#[tokio::test]
#[traced_test]
async fn test_share_list_and_quit() {
    let (tracker, _shutdown) = start_tracker().await;
    tracker.connect().await.unwrap();

    let report = FileRecord::new("report.pdf", "abc123", 2048);
    let song = FileRecord::new("song.ogg", "ffee00", 4_000_000);
    tracker.add(&report).await.unwrap();
    tracker.add(&song).await.unwrap();
    // Registering the same record twice keeps one entry
    tracker.add(&report).await.unwrap();

    let listings = tracker.list().await.unwrap();
    assert_eq!(listings.len(), 2);
    assert_eq!(listings[0].record, report);
    assert_eq!(listings[0].owners, vec![LOCALHOST]);
    assert_eq!(listings[0].to_string(), "report.pdf\tabc123\t2048\t127.0.0.1");
    assert_eq!(listings[1].record, song);

    tracker.quit().await.unwrap();
    // quit has no response, give the tracker a moment to apply it
    tokio::time::sleep(Duration::from_millis(100)).await;

    let error = tracker.list().await.unwrap_err();
    assert!(is_rejected(&error), "quit should revoke trust");

    tracker.connect().await.unwrap();
    assert!(tracker.list().await.unwrap().is_empty());
}

#[tokio::test]
#[traced_test]
async fn test_bad_frames_get_no_response() {
    let (tracker, _shutdown) = start_tracker().await;
    let addr = tracker.addr();

    assert!(exchange_raw(addr, b"connect").await.is_empty());
    assert!(exchange_raw(addr, b"").await.is_empty());
    assert!(exchange_raw(addr, b"hello\n").await.is_empty());
    assert!(exchange_raw(addr, b"delete\nreport.pdf").await.is_empty());

    let mut oversized_header = vec![b'x'; 150];
    oversized_header.extend_from_slice(b"\nlist");
    assert!(exchange_raw(addr, &oversized_header).await.is_empty());

    // The tracker is still serving afterwards
    assert_eq!(exchange_raw(addr, b"connect\n").await, b"accept\n");
}

#[tokio::test]
#[traced_test]
async fn test_raw_wire_format() {
    let (tracker, _shutdown) = start_tracker().await;
    let addr = tracker.addr();

    assert_eq!(exchange_raw(addr, b"connect\n").await, b"accept\n");
    assert_eq!(
        exchange_raw(addr, b"add\nreport.pdf\tabc123\t2048").await,
        b"ok\n"
    );
    assert_eq!(
        exchange_raw(addr, b"list\n").await,
        b"ok\nreport.pdf\tabc123\t2048\t127.0.0.1"
    );

    let response = exchange_raw(addr, b"add\nreport.pdf\tabc123").await;
    assert!(response.starts_with(b"error\n"));
}
