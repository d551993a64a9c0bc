//! In-memory doorbell and browser transport for integration tests
//!
//! Both fakes record every call so tests can assert on ordering.

#![allow(dead_code)]

use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use doorbell_gateway::{
    AudioFormat, AudioSession, ChannelInfo, DeviceError, DevicePort, FrameAssembler, MediaError,
    MediaPort,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Poll `check` until it holds or `limit` passes
pub async fn eventually(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    List,
    Open(String),
    Close(String),
    /// Every write attempt, including rejected ones
    Write(String, usize),
    /// Free-form marker written by a test
    Note(String),
}

type FrameResult = Result<Option<Bytes>, DeviceError>;

pub struct MemoryDevice {
    channels: Mutex<Vec<ChannelInfo>>,
    events: Mutex<Vec<DeviceEvent>>,
    frames_tx: mpsc::UnboundedSender<FrameResult>,
    frames_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<FrameResult>>,
    assembler: Mutex<FrameAssembler>,
    fail_list: AtomicBool,
    fail_writes: AtomicBool,
    fail_close: Mutex<HashSet<String>>,
    cancel_on_write: Mutex<Option<CancellationToken>>,
    reads_in_flight: AtomicUsize,
}

impl MemoryDevice {
    /// Channels as `(id, in_use)` in device order
    pub fn new(channels: &[(&str, bool)]) -> Arc<Self> {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            channels: Mutex::new(
                channels
                    .iter()
                    .map(|(id, in_use)| ChannelInfo::new(*id, *in_use))
                    .collect(),
            ),
            events: Mutex::new(Vec::new()),
            frames_tx,
            frames_rx: tokio::sync::Mutex::new(frames_rx),
            assembler: Mutex::new(FrameAssembler::new(AudioFormat::G711.frame_size)),
            fail_list: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_close: Mutex::new(HashSet::new()),
            cancel_on_write: Mutex::new(None),
            reads_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn as_port(self: &Arc<Self>) -> Arc<dyn DevicePort> {
        Arc::clone(self) as Arc<dyn DevicePort>
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DeviceEvent::Write(_, len) => Some(len),
                _ => None,
            })
            .collect()
    }

    pub fn closes(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DeviceEvent::Close(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn note(&self, marker: impl Into<String>) {
        self.record(DeviceEvent::Note(marker.into()));
    }

    pub fn in_use(&self, id: &str) -> bool {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .any(|ch| ch.id == id && ch.in_use)
    }

    pub fn open_count(&self) -> usize {
        self.channels.lock().unwrap().iter().filter(|ch| ch.in_use).count()
    }

    /// Mark a channel busy behind the gateway's back
    pub fn set_in_use(&self, id: &str, in_use: bool) {
        for ch in self.channels.lock().unwrap().iter_mut() {
            if ch.id == id {
                ch.in_use = in_use;
            }
        }
    }

    pub fn push_frame(&self, frame: Bytes) {
        let _ = self.frames_tx.send(Ok(Some(frame)));
    }

    /// Feed raw HTTP body bytes; complete frames become readable
    pub fn push_chunk(&self, chunk: &[u8]) {
        let mut assembler = self.assembler.lock().unwrap();
        assembler.push(chunk);
        while let Some(frame) = assembler.next_frame() {
            self.push_frame(frame);
        }
    }

    pub fn end_stream(&self) {
        let _ = self.frames_tx.send(Ok(None));
    }

    pub fn fail_stream(&self, err: DeviceError) {
        let _ = self.frames_tx.send(Err(err));
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_close(&self, id: &str) {
        self.fail_close.lock().unwrap().insert(id.to_string());
    }

    /// Cancel `token` while the next write is in flight; the write succeeds
    pub fn cancel_on_write(&self, token: CancellationToken) {
        *self.cancel_on_write.lock().unwrap() = Some(token);
    }

    pub fn reads_in_flight(&self) -> usize {
        self.reads_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, event: DeviceEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Decrements the in-flight read counter even when the read future is dropped
struct ReadGuard<'a>(&'a AtomicUsize);

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl DevicePort for MemoryDevice {
    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, DeviceError> {
        self.record(DeviceEvent::List);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(DeviceError::Transport("connection refused".into()));
        }
        Ok(self.channels.lock().unwrap().clone())
    }

    async fn open_channel(&self, channel_id: &str) -> Result<AudioSession, DeviceError> {
        self.record(DeviceEvent::Open(channel_id.to_string()));
        let mut channels = self.channels.lock().unwrap();
        let channel = channels
            .iter_mut()
            .find(|ch| ch.id == channel_id)
            .ok_or_else(|| DeviceError::UnknownChannel(channel_id.to_string()))?;
        if channel.in_use {
            return Err(DeviceError::Protocol(format!("channel {} busy", channel_id)));
        }
        channel.in_use = true;
        Ok(AudioSession::new(channel_id, Some(format!("token-{}", channel_id))))
    }

    async fn close_channel(&self, channel_id: &str) -> Result<(), DeviceError> {
        self.record(DeviceEvent::Close(channel_id.to_string()));
        if self.fail_close.lock().unwrap().contains(channel_id) {
            return Err(DeviceError::Transport("close timed out".into()));
        }
        let mut channels = self.channels.lock().unwrap();
        let channel = channels
            .iter_mut()
            .find(|ch| ch.id == channel_id)
            .ok_or_else(|| DeviceError::UnknownChannel(channel_id.to_string()))?;
        channel.in_use = false;
        Ok(())
    }

    async fn read_frame(&self, _session: &AudioSession) -> Result<Option<Bytes>, DeviceError> {
        self.reads_in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = ReadGuard(&self.reads_in_flight);

        let mut rx = self.frames_rx.lock().await;
        match rx.recv().await {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn write_chunk(&self, session: &AudioSession, chunk: Bytes) -> Result<(), DeviceError> {
        self.record(DeviceEvent::Write(session.channel_id.clone(), chunk.len()));
        if let Some(token) = self.cancel_on_write.lock().unwrap().take() {
            token.cancel();
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DeviceError::Transport("write rejected".into()));
        }
        Ok(())
    }
}

type PacketResult = Result<Option<Bytes>, MediaError>;

pub struct MemoryMedia {
    sent: Mutex<Vec<(Bytes, Duration)>>,
    inbound_tx: mpsc::UnboundedSender<PacketResult>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PacketResult>>,
    closed: CancellationToken,
    close_calls: AtomicUsize,
    fail_send: AtomicBool,
}

impl MemoryMedia {
    pub fn new() -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            closed: CancellationToken::new(),
            close_calls: AtomicUsize::new(0),
            fail_send: AtomicBool::new(false),
        })
    }

    pub fn as_port(self: &Arc<Self>) -> Arc<dyn MediaPort> {
        Arc::clone(self) as Arc<dyn MediaPort>
    }

    pub fn push_packet(&self, payload: Bytes) {
        let _ = self.inbound_tx.send(Ok(Some(payload)));
    }

    pub fn end_inbound(&self) {
        let _ = self.inbound_tx.send(Ok(None));
    }

    pub fn fail_inbound(&self, err: MediaError) {
        let _ = self.inbound_tx.send(Err(err));
    }

    pub fn fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(Bytes, Duration)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MediaPort for MemoryMedia {
    async fn send_frame(&self, frame: Bytes, duration: Duration) -> Result<(), MediaError> {
        if self.closed.is_cancelled() {
            return Err(MediaError::Closed);
        }
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(MediaError::Transport("peer connection failed".into()));
        }
        self.sent.lock().unwrap().push((frame, duration));
        Ok(())
    }

    async fn receive_packet(&self) -> Result<Option<Bytes>, MediaError> {
        let mut rx = self.inbound_rx.lock().await;
        tokio::select! {
            _ = self.closed.cancelled() => Err(MediaError::Closed),
            packet = rx.recv() => packet.unwrap_or(Ok(None)),
        }
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.cancel();
    }
}
