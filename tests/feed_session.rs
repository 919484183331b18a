//! End-to-end session tests against an in-process feed server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use twentydepth_feed::book::DepthBook;
use twentydepth_feed::config::Config;
use twentydepth_feed::metrics::Metrics;
use twentydepth_feed::parser::{FRAME_LEN, HEADER_LEN, SLOT_LEN};
use twentydepth_feed::websocket::ConnectionManager;

type ServerStream = WebSocketStream<TcpStream>;

const WAIT: Duration = Duration::from_secs(5);

fn frame(feed_code: u8, levels: &[(f64, u32, u32)]) -> Vec<u8> {
    let mut buf = vec![0u8; FRAME_LEN];
    buf[0..2].copy_from_slice(&(FRAME_LEN as i16).to_le_bytes());
    buf[2] = feed_code;
    buf[4..8].copy_from_slice(&2885i32.to_le_bytes());
    for (i, (price, quantity, orders)) in levels.iter().enumerate() {
        let base = HEADER_LEN + i * SLOT_LEN;
        buf[base..base + 8].copy_from_slice(&price.to_le_bytes());
        buf[base + 8..base + 12].copy_from_slice(&quantity.to_le_bytes());
        buf[base + 12..base + 16].copy_from_slice(&orders.to_le_bytes());
    }
    buf
}

async fn spawn_config_server() -> String {
    let app = Router::new().route(
        "/config",
        get(|| async { Json(serde_json::json!({ "token": "tok-1", "clientId": "client-1" })) }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/config")
}

fn test_config(config_endpoint: String, ws_addr: SocketAddr, watchdog_timeout_ms: u64) -> Config {
    Config {
        config_endpoint,
        feed_endpoint: format!("ws://{ws_addr}/twentydepth"),
        exchange_segment: "NSE_EQ".to_string(),
        security_id: "2885".to_string(),
        reconnect_delay_ms: 100,
        watchdog_timeout_ms,
        subscribe_grace_ms: 50,
        http_bind: "127.0.0.1:0".to_string(),
        status_interval_secs: 30,
    }
}

async fn accept(listener: &TcpListener) -> ServerStream {
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

async fn expect_control(server: &mut ServerStream) -> serde_json::Value {
    loop {
        let message = timeout(WAIT, server.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_session_subscribes_applies_depth_and_reconnects() {
    let config_endpoint = spawn_config_server().await;
    let ws_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_addr = ws_listener.local_addr().unwrap();

    let config = Arc::new(test_config(config_endpoint, ws_addr, 60_000));
    let metrics = Arc::new(Metrics::new().unwrap());
    let book = Arc::new(RwLock::new(DepthBook::new()));
    let (manager, session, mut depth_rx) =
        ConnectionManager::new(config, book.clone(), metrics.clone());
    let session_task = tokio::spawn(manager.run());

    let mut server = accept(&ws_listener).await;

    // unsubscribe-all goes out first, the subscribe after the grace pause
    let unsubscribe = expect_control(&mut server).await;
    assert_eq!(unsubscribe["RequestCode"], 12);
    let sent_at = Instant::now();
    let subscribe = expect_control(&mut server).await;
    // receive-side timing, so allow a little scheduling slack on top of
    // the 50ms grace configured for the test
    assert!(sent_at.elapsed() >= Duration::from_millis(40));
    assert_eq!(subscribe["RequestCode"], 23);
    assert_eq!(subscribe["InstrumentCount"], 1);
    assert_eq!(subscribe["InstrumentList"][0]["SecurityId"], "2885");
    assert_eq!(subscribe["InstrumentList"][0]["Mode"], "20DEPTH");
    assert_eq!(subscribe["InstrumentList"][0]["BidAskBoth"], true);

    // bid frame and ask frame concatenated in one message
    let mut buffer = frame(41, &[(100.5, 10, 2), (100.0, 5, 1)]);
    buffer.extend(frame(51, &[(101.0, 8, 3), (101.5, 4, 1)]));
    server.send(Message::Binary(buffer)).await.unwrap();

    timeout(WAIT, depth_rx.changed()).await.unwrap().unwrap();
    let snapshot = depth_rx.borrow().clone();
    assert_eq!(snapshot.bids.len(), 2);
    assert_eq!(snapshot.offers.len(), 2);
    assert_eq!(snapshot.bids[0].price, 100.5);
    assert_eq!(snapshot.offers[0].price, 101.0);
    assert_eq!(snapshot.total_bid_quantity(), 15);
    assert_eq!(snapshot.total_offer_quantity(), 12);
    {
        let live = book.read().await.snapshot();
        assert_eq!(live.bids.len(), 2);
        assert_eq!(live.offers.len(), 2);
    }

    // the server drops the connection; the session must resubscribe on
    // a fresh socket
    drop(server);
    let mut server = accept(&ws_listener).await;
    let resubscribe = expect_control(&mut server).await;
    assert_eq!(resubscribe["RequestCode"], 12);
    assert!(metrics.reconnects.get() >= 1);

    session.disconnect().await;
    let result = timeout(WAIT, session_task).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_watchdog_closes_silent_connection_and_reconnects() {
    let config_endpoint = spawn_config_server().await;
    let ws_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_addr = ws_listener.local_addr().unwrap();

    let config = Arc::new(test_config(config_endpoint, ws_addr, 250));
    let metrics = Arc::new(Metrics::new().unwrap());
    let book = Arc::new(RwLock::new(DepthBook::new()));
    let (manager, session, _depth_rx) =
        ConnectionManager::new(config, book, metrics.clone());
    let session_task = tokio::spawn(manager.run());

    let mut server = accept(&ws_listener).await;
    expect_control(&mut server).await;
    expect_control(&mut server).await;

    // stay silent: the client must give up on the dead link by itself
    let silent_close = timeout(WAIT, async {
        loop {
            match server.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(silent_close.is_ok(), "client did not close the silent connection");
    assert!(metrics.watchdog_timeouts.get() >= 1);

    // a voluntary watchdog close still schedules the reconnect
    let mut server = accept(&ws_listener).await;
    let resubscribe = expect_control(&mut server).await;
    assert_eq!(resubscribe["RequestCode"], 12);

    session.disconnect().await;
    let result = timeout(WAIT, session_task).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_credential_failure_aborts_attempt_without_retry() {
    let app = Router::new().route("/config", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let ws_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_addr = ws_listener.local_addr().unwrap();

    let config = Arc::new(test_config(format!("http://{addr}/config"), ws_addr, 60_000));
    let metrics = Arc::new(Metrics::new().unwrap());
    let book = Arc::new(RwLock::new(DepthBook::new()));
    let (manager, session, _depth_rx) = ConnectionManager::new(config, book, metrics);
    let session_task = tokio::spawn(manager.run());

    // the attempt aborts without opening a socket and without retrying
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!session_task.is_finished());
    let no_connection = timeout(Duration::from_millis(200), ws_listener.accept()).await;
    assert!(no_connection.is_err(), "no socket should be opened without credentials");

    session.disconnect().await;
    let result = timeout(WAIT, session_task).await.unwrap().unwrap();
    assert!(result.is_ok());
}
