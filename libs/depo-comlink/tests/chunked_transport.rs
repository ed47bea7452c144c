//! Chunked transfer ordering and failure behaviour

// Allow unwrap() in tests for cleaner test code
#![allow(clippy::disallowed_methods)]

use async_trait::async_trait;
use depo_comlink::{
    ChunkedTransport, ComLinkError, RegisterOp, RegisterSimulator, RegisterTransport,
};
use tokio_util::sync::CancellationToken;

/// Simulator front that cancels the token inside operation `at`
///
/// With `hang` set that operation then never completes, so only the token
/// can end the transfer.
struct CancelDuringOp {
    sim: RegisterSimulator,
    token: CancellationToken,
    at: usize,
    hang: bool,
    seen: usize,
}

impl CancelDuringOp {
    fn new(sim: &RegisterSimulator, token: &CancellationToken, at: usize, hang: bool) -> Self {
        Self {
            sim: sim.clone(),
            token: token.clone(),
            at,
            hang,
            seen: 0,
        }
    }

    async fn enter(&mut self) {
        let index = self.seen;
        self.seen += 1;
        if index == self.at {
            self.token.cancel();
            if self.hang {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[async_trait]
impl RegisterTransport for CancelDuringOp {
    async fn read_registers(&mut self, address: u16, count: u16) -> depo_comlink::Result<Vec<u16>> {
        self.enter().await;
        self.sim.read_registers(address, count).await
    }

    async fn write_registers(&mut self, address: u16, values: &[u16]) -> depo_comlink::Result<()> {
        self.enter().await;
        self.sim.write_registers(address, values).await
    }
}

fn payload(len: usize) -> Vec<u16> {
    (0..len).map(|i| (i * 7 % 65_536) as u16).collect()
}

#[tokio::test]
async fn test_300_registers_written_as_123_123_54() {
    let sim = RegisterSimulator::new();
    let mut link = ChunkedTransport::new(sim.clone());
    let data = payload(300);

    link.write_chunked(2000, &data, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        sim.operations(),
        vec![
            RegisterOp::Write { address: 2000, count: 123 },
            RegisterOp::Write { address: 2123, count: 123 },
            RegisterOp::Write { address: 2246, count: 54 },
        ]
    );
    assert_eq!(sim.registers(2000, 300), data);
}

#[tokio::test]
async fn test_failure_on_second_chunk_stops_sequence() {
    let sim = RegisterSimulator::new();
    sim.fail_at(1, ComLinkError::connection("link dropped"));
    let mut link = ChunkedTransport::new(sim.clone());
    let data = payload(300);

    let err = link
        .write_chunked(0, &data, &CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        ComLinkError::Chunk { index, address, count, .. } => {
            assert_eq!((*index, *address, *count), (1, 123, 123));
        },
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(err.root(), ComLinkError::Connection(_)));

    // The third chunk was never issued
    assert_eq!(sim.operations().len(), 2);
    // The first chunk stays written, nothing is rolled back
    assert_eq!(sim.registers(0, 123), data[..123]);
    assert_eq!(sim.registers(246, 54), vec![0; 54]);
}

#[tokio::test]
async fn test_cancel_between_chunks_leaves_written_chunks() {
    let sim = RegisterSimulator::new();
    let mut link = ChunkedTransport::with_chunk_size(sim.clone(), 10).unwrap();
    let token = CancellationToken::new();
    let data = payload(30);

    // Cancel once the first chunk has landed
    link.write_chunked(0, &data[..10], &token).await.unwrap();
    token.cancel();
    let err = link.write_chunked(10, &data[10..], &token).await.unwrap_err();

    assert!(matches!(err, ComLinkError::Cancelled));
    assert_eq!(sim.operations().len(), 1);
    assert_eq!(sim.registers(0, 10), data[..10]);
}

#[tokio::test]
async fn test_cancel_inside_multi_chunk_write_stops_after_first_chunk() {
    let sim = RegisterSimulator::new();
    let token = CancellationToken::new();
    let mut link = ChunkedTransport::new(CancelDuringOp::new(&sim, &token, 0, false));
    let data = payload(300);

    let err = link.write_chunked(0, &data, &token).await.unwrap_err();

    assert!(matches!(err.root(), ComLinkError::Cancelled));
    assert_eq!(
        sim.operations(),
        vec![RegisterOp::Write { address: 0, count: 123 }]
    );
    assert_eq!(sim.registers(0, 123), data[..123]);
    assert_eq!(sim.registers(123, 177), vec![0; 177]);
}

#[tokio::test]
async fn test_cancel_inside_multi_chunk_read_stops_after_first_chunk() {
    let sim = RegisterSimulator::new();
    sim.load(0, &payload(300));
    let token = CancellationToken::new();
    let mut link = ChunkedTransport::new(CancelDuringOp::new(&sim, &token, 0, false));

    let err = link.read_chunked(0, 300, &token).await.unwrap_err();

    assert!(matches!(err.root(), ComLinkError::Cancelled));
    assert_eq!(
        sim.operations(),
        vec![RegisterOp::Read { address: 0, count: 123 }]
    );
}

#[tokio::test]
async fn test_cancel_ends_a_stalled_write_chunk() {
    let sim = RegisterSimulator::new();
    let token = CancellationToken::new();
    let mut link = ChunkedTransport::new(CancelDuringOp::new(&sim, &token, 1, true));

    let err = link.write_chunked(0, &payload(300), &token).await.unwrap_err();

    assert!(matches!(err.root(), ComLinkError::Cancelled));
    assert_eq!(
        sim.operations(),
        vec![RegisterOp::Write { address: 0, count: 123 }]
    );
}

#[tokio::test]
async fn test_cancel_ends_a_stalled_read_chunk() {
    let sim = RegisterSimulator::new();
    let token = CancellationToken::new();
    let mut link = ChunkedTransport::new(CancelDuringOp::new(&sim, &token, 1, true));

    let err = link.read_chunked(0, 300, &token).await.unwrap_err();

    assert!(matches!(err.root(), ComLinkError::Cancelled));
    assert_eq!(sim.operations().len(), 1);
}

#[tokio::test]
async fn test_empty_transfer_issues_nothing() {
    let sim = RegisterSimulator::new();
    let mut link = ChunkedTransport::new(sim.clone());
    let token = CancellationToken::new();

    link.write_chunked(0, &[], &token).await.unwrap();
    assert!(link.read_chunked(0, 0, &token).await.unwrap().is_empty());
    assert!(sim.operations().is_empty());
}
