//! Connection accounting and drain behavior of the graceful listener.

use std::sync::Arc;
use std::time::{Duration, Instant};
use gateway::net::{ConnectionState, GracefulListener, ListenerError};

mod common;

use common::{ChannelAcceptor, CloseBehavior, TestStream};

#[tokio::test]
async fn accept_close_cycles_never_settle() {
    let (acceptor, incoming) = ChannelAcceptor::new();
    let listener = GracefulListener::new(acceptor, Duration::from_millis(100));

    let mut remotes = Vec::new();
    let mut conns = Vec::new();
    for _ in 0..10 {
        let (stream, remote) = TestStream::pair();
        remotes.push(remote);
        incoming.send(stream).unwrap();
        conns.push(listener.accept().await.unwrap());
    }
    assert_eq!(listener.open_connections(), 10);

    for conn in conns.iter_mut() {
        conn.close().await.unwrap();
    }

    assert_eq!(listener.open_connections(), 0);
    assert!(!listener.is_draining());
    assert_eq!(listener.drain_settles(), 0);
}

#[tokio::test]
async fn close_with_nothing_open_returns_immediately() {
    let (acceptor, _incoming) = ChannelAcceptor::new();
    let listener = GracefulListener::new(acceptor, Duration::from_secs(30));

    let started = Instant::now();
    listener.close().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(listener.drain_settles(), 1);
}

#[tokio::test]
async fn drain_waits_for_every_connection() {
    let (acceptor, incoming) = ChannelAcceptor::new();
    let listener = GracefulListener::new(acceptor, Duration::from_secs(2));

    let mut remotes = Vec::new();
    let mut closers = Vec::new();
    for i in 0..5u64 {
        let (stream, remote) = TestStream::pair();
        remotes.push(remote);
        incoming.send(stream).unwrap();
        let mut conn = listener.accept().await.unwrap();
        closers.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20 + i * 10)).await;
            conn.close().await.unwrap();
        }));
    }

    listener.close().await.unwrap();

    assert_eq!(listener.open_connections(), 0);
    assert_eq!(listener.drain_settles(), 1);
    for closer in closers {
        closer.await.unwrap();
    }
    assert_eq!(listener.drain_settles(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_close_racing_drain_settles_once() {
    for _ in 0..50 {
        let (acceptor, incoming) = ChannelAcceptor::new();
        let listener = Arc::new(GracefulListener::new(acceptor, Duration::from_secs(2)));

        let (stream, _remote) = TestStream::pair();
        incoming.send(stream).unwrap();
        let mut conn = listener.accept().await.unwrap();

        let closer = tokio::spawn(async move { conn.close().await });
        let drain = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.close().await })
        };

        closer.await.unwrap().unwrap();
        drain.await.unwrap().unwrap();
        assert_eq!(listener.drain_settles(), 1);
    }
}

#[tokio::test]
async fn drain_times_out_with_stragglers() {
    let (acceptor, incoming) = ChannelAcceptor::new();
    let listener = GracefulListener::new(acceptor, Duration::from_millis(100));

    let mut remotes = Vec::new();
    let mut conns = Vec::new();
    for _ in 0..3 {
        let (stream, remote) = TestStream::pair();
        remotes.push(remote);
        incoming.send(stream).unwrap();
        conns.push(listener.accept().await.unwrap());
    }
    conns[0].close().await.unwrap();

    let started = Instant::now();
    let err = listener.close().await.unwrap_err();
    let elapsed = started.elapsed();

    match err {
        ListenerError::DrainTimeout { max_wait, open } => {
            assert_eq!(max_wait, Duration::from_millis(100));
            assert_eq!(open, 2);
        }
        other => panic!("expected drain timeout, got {other:?}"),
    }
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(1));
    assert_eq!(listener.drain_settles(), 0);

    let (late, _late_remote) = TestStream::pair();
    incoming.send(late).unwrap();
    assert!(matches!(listener.accept().await, Err(ListenerError::Accept(_))));
    assert_eq!(listener.open_connections(), 2);
}

#[tokio::test]
async fn close_wakes_pending_accept() {
    let (acceptor, _incoming) = ChannelAcceptor::new();
    let listener = Arc::new(GracefulListener::new(acceptor, Duration::from_millis(100)));

    let pending = {
        let listener = Arc::clone(&listener);
        tokio::spawn(async move { listener.accept().await.map(|_| ()) })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    listener.close().await.unwrap();
    let accepted = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("pending accept should fail after close")
        .unwrap();
    assert!(matches!(accepted, Err(ListenerError::Accept(_))));
    assert_eq!(listener.open_connections(), 0);
}

#[tokio::test]
async fn failed_close_stays_counted_until_deadline() {
    let (acceptor, incoming) = ChannelAcceptor::new();
    let listener = GracefulListener::new(acceptor, Duration::from_millis(100));

    let (stream, _remote) = TestStream::failing_close();
    incoming.send(stream).unwrap();
    let mut conn = listener.accept().await.unwrap();

    assert!(conn.close().await.is_err());
    assert_eq!(conn.state(), ConnectionState::CloseFailed);
    assert_eq!(listener.open_connections(), 1);

    let started = Instant::now();
    let err = listener.close().await.unwrap_err();
    assert!(err.is_drain_timeout());
    assert!(started.elapsed() >= Duration::from_millis(100));

    drop(conn);
    assert_eq!(listener.open_connections(), 1);
    assert_eq!(listener.drain_settles(), 0);
}

#[tokio::test]
async fn dropped_connection_counts_as_closed() {
    let (acceptor, incoming) = ChannelAcceptor::new();
    let listener = GracefulListener::new(acceptor, Duration::from_secs(1));

    let (stream, _remote) = TestStream::pair();
    incoming.send(stream).unwrap();
    let conn = listener.accept().await.unwrap();
    assert_eq!(listener.open_connections(), 1);

    drop(conn);
    assert_eq!(listener.open_connections(), 0);
    listener.close().await.unwrap();
}

#[tokio::test]
async fn close_error_wins_but_drain_still_runs_when_blocked() {
    let (acceptor, incoming) = ChannelAcceptor::with_close(CloseBehavior::FailAfterBlocking);
    let listener = GracefulListener::new(acceptor, Duration::from_secs(1));

    let (stream, _remote) = TestStream::pair();
    incoming.send(stream).unwrap();
    let mut conn = listener.accept().await.unwrap();
    let closer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        conn.close().await.unwrap();
    });

    let err = listener.close().await.unwrap_err();
    assert!(matches!(err, ListenerError::Close(_)));
    assert!(listener.is_draining());
    assert_eq!(listener.drain_settles(), 1);
    closer.await.unwrap();
}

#[tokio::test]
async fn close_error_skips_drain_when_still_accepting() {
    let (acceptor, incoming) = ChannelAcceptor::with_close(CloseBehavior::FailStillOpen);
    let listener = GracefulListener::new(acceptor, Duration::from_secs(5));

    let (stream, _remote) = TestStream::pair();
    incoming.send(stream).unwrap();
    let _conn = listener.accept().await.unwrap();

    let started = Instant::now();
    let err = listener.close().await.unwrap_err();
    assert!(matches!(err, ListenerError::Close(_)));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!listener.is_draining());
}

#[tokio::test]
async fn accept_error_leaves_count_alone() {
    let (acceptor, incoming) = ChannelAcceptor::new();
    let listener = GracefulListener::new(acceptor, Duration::from_millis(100));

    drop(incoming);
    assert!(matches!(listener.accept().await, Err(ListenerError::Accept(_))));
    assert_eq!(listener.open_connections(), 0);
}
