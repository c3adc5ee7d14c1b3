#![allow(dead_code)]

//! Stream session controller — drives one search from open to terminal state.
//!
//! `SessionCore` is the synchronous state machine: it owns the tracker and the
//! aggregator and turns typed events into notifications. `SessionDriver` runs it
//! on a tokio task against a transport. `SearchSession` is the caller's handle:
//! a notification queue, point-in-time snapshots, and cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::errors::{ParseError, SearchError, TransportError};
use crate::models::{JobListing, SearchRequest, Source};
use crate::stream::aggregator::ResultAggregator;
use crate::stream::event::{parse_frame, StreamEvent};
use crate::stream::frame::{FrameDecoder, DEFAULT_MAX_FRAME_BYTES};
use crate::stream::tracker::{SourceState, SourceTracker, Transition};
use crate::stream::transport::SearchTransport;

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(120);
pub const CLOSED_UNEXPECTEDLY: &str = "connection closed unexpectedly";

// ────────────────────────────────────────────────────────────────────────────
// Public data types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Completed,
    Aborted,
}

/// What the rendering layer is told, in event-arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchNotification {
    /// The server acknowledged these requested sources.
    SearchStarted { sources: Vec<Source> },
    /// A batch arrived. `source` is the wire name, which may be unknown to us.
    SourceProgressed {
        source: String,
        new_results: usize,
        total_results: usize,
        results: Vec<JobListing>,
    },
    /// A source delivered nothing within the per-source timeout.
    SourceTimedOut { source: Source },
    SearchCompleted { total_results: usize },
    SearchFailed { message: String },
}

impl SearchNotification {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchNotification::SearchCompleted { .. } | SearchNotification::SearchFailed { .. }
        )
    }
}

/// Consistent copy of a session's state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub sources: Vec<SourceState>,
    /// Sources still Pending or Streaming, in request order.
    pub outstanding: Vec<Source>,
    pub results: Vec<JobListing>,
    pub failure: Option<String>,
    pub malformed_frames: usize,
}

impl SessionSnapshot {
    pub fn source(&self, source: Source) -> Option<&SourceState> {
        self.sources.iter().find(|s| s.source == source)
    }

    /// True once every source is Done or Error.
    pub fn is_settled(&self) -> bool {
        self.outstanding.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How long a source may stay Pending after the stream opens. `None` waits forever.
    pub source_timeout: Option<Duration>,
    pub max_frame_bytes: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            source_timeout: Some(DEFAULT_SOURCE_TIMEOUT),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SessionCore — event folding, no I/O
// ────────────────────────────────────────────────────────────────────────────

pub struct SessionCore {
    id: Uuid,
    started_at: DateTime<Utc>,
    request: SearchRequest,
    tracker: SourceTracker,
    aggregator: ResultAggregator,
    status: SessionStatus,
    started: bool,
    failure: Option<String>,
    malformed_frames: usize,
}

impl SessionCore {
    pub fn new(request: SearchRequest) -> Self {
        let tracker = SourceTracker::new(&request.sources);
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            request,
            tracker,
            aggregator: ResultAggregator::new(),
            status: SessionStatus::Open,
            started: false,
            failure: None,
            malformed_frames: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            started_at: self.started_at,
            status: self.status,
            sources: self.tracker.states().to_vec(),
            outstanding: self.tracker.outstanding(),
            results: self.aggregator.snapshot(),
            failure: self.failure.clone(),
            malformed_frames: self.malformed_frames,
        }
    }

    /// Folds one event into the session.
    ///
    /// After `Done`, batches are still appended (the tracker logs them as
    /// anomalies) but produce no notification: `SearchCompleted` stays last.
    /// Every other event after a terminal state is dropped.
    pub fn apply(&mut self, event: StreamEvent) -> Vec<SearchNotification> {
        match (self.status, event) {
            (SessionStatus::Open, event) => self.apply_open(event),
            (
                SessionStatus::Completed,
                StreamEvent::Batch {
                    source,
                    results,
                    count,
                },
            ) => {
                self.on_batch(source, results, count);
                Vec::new()
            }
            (status, event) => {
                warn!(
                    event = event.type_name(),
                    ?status,
                    "ignoring event after session ended"
                );
                Vec::new()
            }
        }
    }

    fn apply_open(&mut self, event: StreamEvent) -> Vec<SearchNotification> {
        match event {
            StreamEvent::Start { sources } => self.on_start(sources),
            StreamEvent::Batch {
                source,
                results,
                count,
            } => self.on_batch(source, results, count),
            StreamEvent::Done => {
                self.tracker.complete_all();
                self.status = SessionStatus::Completed;
                info!(results = self.aggregator.len(), "search completed");
                vec![SearchNotification::SearchCompleted {
                    total_results: self.aggregator.len(),
                }]
            }
            StreamEvent::Error { message } => self.abort(message),
        }
    }

    fn on_start(&mut self, announced: Vec<String>) -> Vec<SearchNotification> {
        if self.started {
            warn!(?announced, "duplicate start event ignored");
            return Vec::new();
        }
        self.started = true;

        let mut acknowledged = Vec::new();
        for name in &announced {
            match name.parse::<Source>() {
                Ok(source) if self.tracker.contains(source) => {
                    if !acknowledged.contains(&source) {
                        acknowledged.push(source);
                    }
                }
                Ok(source) => warn!(source = %source, "server announced a source that was not requested"),
                Err(_) => warn!(source = %name, "server announced an unknown source"),
            }
        }
        for state in self.tracker.states() {
            if !acknowledged.contains(&state.source) {
                warn!(
                    source = %state.source,
                    "requested source missing from start event; it stays pending"
                );
            }
        }

        debug!(?acknowledged, "search started");
        vec![SearchNotification::SearchStarted {
            sources: acknowledged,
        }]
    }

    fn on_batch(
        &mut self,
        source: String,
        results: Vec<JobListing>,
        declared: Option<usize>,
    ) -> Vec<SearchNotification> {
        let received = results.len();
        if let Some(declared) = declared.filter(|&d| d != received) {
            warn!(
                source = %source,
                declared,
                received,
                "batch count does not match its records"
            );
        }

        let transition = source
            .parse::<Source>()
            .ok()
            .and_then(|s| self.tracker.record_batch(s, received));
        if transition.is_none() {
            warn!(source = %source, received, "batch for an untracked source appended as-is");
        }
        if transition == Some(Transition::Anomaly) {
            debug!(source = %source, "late batch appended");
        }

        self.aggregator.append(results.clone());
        debug!(source = %source, received, total = self.aggregator.len(), "batch aggregated");

        vec![SearchNotification::SourceProgressed {
            source,
            new_results: received,
            total_results: self.aggregator.len(),
            results,
        }]
    }

    fn abort(&mut self, message: String) -> Vec<SearchNotification> {
        warn!(error = %message, results = self.aggregator.len(), "search failed");
        self.status = SessionStatus::Aborted;
        self.failure = Some(message.clone());
        vec![SearchNotification::SearchFailed { message }]
    }

    /// Counts a frame that could not be parsed. The session carries on.
    pub fn record_malformed(&mut self, err: &ParseError) {
        self.malformed_frames += 1;
        warn!(error = %err, total = self.malformed_frames, "dropping malformed frame");
    }

    pub fn on_transport_error(&mut self, err: &TransportError) -> Vec<SearchNotification> {
        if !self.is_open() {
            return Vec::new();
        }
        self.abort(err.to_string())
    }

    /// The stream ended. Only an open session treats that as a failure.
    pub fn on_closed(&mut self) -> Vec<SearchNotification> {
        if !self.is_open() {
            return Vec::new();
        }
        self.abort(CLOSED_UNEXPECTEDLY.to_string())
    }

    /// Fails every source still Pending after `timeout`.
    pub fn on_source_timeout(&mut self, timeout: Duration) -> Vec<SearchNotification> {
        if !self.is_open() {
            return Vec::new();
        }
        let message = format!("no results within {}s", timeout.as_secs());
        self.tracker
            .expire_pending(&message)
            .into_iter()
            .map(|source| {
                warn!(source = %source, timeout_secs = timeout.as_secs(), "source timed out");
                SearchNotification::SourceTimedOut { source }
            })
            .collect()
    }

    /// Caller cancellation. Returns false if the session had already ended.
    pub fn cancel(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.status = SessionStatus::Aborted;
        self.failure = Some(SearchError::SessionAborted.to_string());
        info!(results = self.aggregator.len(), "search cancelled");
        true
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Controller and driver
// ────────────────────────────────────────────────────────────────────────────

/// Starts search sessions against one transport.
#[derive(Clone)]
pub struct SessionController {
    transport: Arc<dyn SearchTransport>,
    options: SessionOptions,
}

impl SessionController {
    pub fn new(transport: Arc<dyn SearchTransport>, options: SessionOptions) -> Self {
        Self { transport, options }
    }

    /// Validates `request` and spawns its session. Must run inside a tokio runtime.
    ///
    /// Only validation errors are returned here; everything after that,
    /// including a failed open, arrives as `SearchFailed`.
    pub fn start(&self, request: SearchRequest) -> Result<SearchSession, SearchError> {
        request.validate()?;

        let core = SessionCore::new(request);
        let id = core.id();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(core.snapshot());
        let cancel = CancellationToken::new();

        let driver = SessionDriver {
            core,
            transport: Arc::clone(&self.transport),
            options: self.options.clone(),
            notifications: notify_tx,
            snapshots: snapshot_tx,
            cancel: cancel.clone(),
        };
        let span = info_span!("search_session", session_id = %id);
        let task = tokio::spawn(driver.run().instrument(span));

        Ok(SearchSession {
            id,
            notifications: notify_rx,
            snapshots: snapshot_rx,
            cancel,
            aborted_by_cancel: false,
            task: Some(task),
        })
    }
}

struct SessionDriver {
    core: SessionCore,
    transport: Arc<dyn SearchTransport>,
    options: SessionOptions,
    notifications: mpsc::UnboundedSender<SearchNotification>,
    snapshots: watch::Sender<SessionSnapshot>,
    cancel: CancellationToken,
}

impl SessionDriver {
    async fn run(mut self) {
        let cancel = self.cancel.clone();
        let transport = Arc::clone(&self.transport);
        let request = self.core.request().clone();
        info!(query = %request.query, sources = ?request.sources, "search session opening");

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.cancelled();
                return;
            }
            opened = transport.open(&request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => {
                let notes = self.core.on_transport_error(&err);
                self.dispatch(notes);
                return;
            }
        };
        info!("search stream opened");

        let mut decoder = FrameDecoder::new(self.options.max_frame_bytes);
        let mut source_deadline = self
            .options
            .source_timeout
            .map(|timeout| (Instant::now() + timeout, timeout));

        loop {
            let deadline = source_deadline;
            let timer = async move {
                match deadline {
                    Some((at, _)) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.cancelled();
                    return;
                }
                _ = timer => {
                    if let Some((_, timeout)) = source_deadline.take() {
                        let notes = self.core.on_source_timeout(timeout);
                        self.dispatch(notes);
                    }
                }
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        decoder.push(&bytes);
                        if !self.drain_frames(&mut decoder) {
                            return;
                        }
                    }
                    Some(Err(err)) => {
                        let notes = self.core.on_transport_error(&err);
                        self.dispatch(notes);
                        return;
                    }
                    None => {
                        if let Some(rest) = decoder.finish() {
                            warn!(bytes = rest.len(), "discarding undelimited bytes at end of stream");
                        }
                        let notes = self.core.on_closed();
                        self.dispatch(notes);
                        return;
                    }
                },
            }
        }
    }

    /// Handles every complete frame in the decoder. Returns false once reading should stop.
    ///
    /// A completed session keeps reading so late batches still land in the
    /// results; only an aborted one stops. State is published once per call.
    fn drain_frames(&mut self, decoder: &mut FrameDecoder) -> bool {
        let mut notes = Vec::new();
        let mut changed = false;

        let keep_reading = loop {
            let frame = match decoder.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break true,
                Err(err) => {
                    notes.extend(self.core.on_transport_error(&TransportError::Frame(err)));
                    break false;
                }
            };

            match parse_frame(&frame) {
                Ok(Some(event)) => {
                    debug!(event = event.type_name(), bytes = frame.len(), "event received");
                    notes.extend(self.core.apply(event));
                    changed = true;
                }
                Ok(None) => debug!("heartbeat frame"),
                Err(err) => {
                    self.core.record_malformed(&err);
                    changed = true;
                }
            }

            if self.core.status() == SessionStatus::Aborted {
                break false;
            }
        };

        if changed || !notes.is_empty() {
            self.dispatch(notes);
        }
        keep_reading
    }

    /// Publishes the snapshot, then delivers `notes`, so a snapshot taken on
    /// receipt of a notification already reflects it.
    fn dispatch(&mut self, notes: Vec<SearchNotification>) {
        self.publish();
        for note in notes {
            // A dropped receiver means the handle is gone; the token stops the loop.
            let _ = self.notifications.send(note);
        }
    }

    /// Copies the whole result set into the watch channel. Called at most once
    /// per received chunk, so the cost is O(chunks × results).
    fn publish(&self) {
        self.snapshots.send_replace(self.core.snapshot());
    }

    fn cancelled(&mut self) {
        self.core.cancel();
        self.publish();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SearchSession — caller handle
// ────────────────────────────────────────────────────────────────────────────

/// Handle to one running search. Dropping it cancels the search.
pub struct SearchSession {
    id: Uuid,
    notifications: mpsc::UnboundedReceiver<SearchNotification>,
    snapshots: watch::Receiver<SessionSnapshot>,
    cancel: CancellationToken,
    aborted_by_cancel: bool,
    task: Option<JoinHandle<()>>,
}

impl SearchSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next notification, or `None` once the session has ended or been cancelled.
    pub async fn next(&mut self) -> Option<SearchNotification> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let note = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            note = self.notifications.recv() => note,
        };
        if self.cancel.is_cancelled() {
            None
        } else {
            note
        }
    }

    /// Stops the search. No notification is delivered after this returns.
    /// Idempotent; a session that already finished keeps its terminal status.
    pub fn cancel(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.aborted_by_cancel = self.snapshots.borrow().status == SessionStatus::Open;
        self.cancel.cancel();
        debug!(session_id = %self.id, "cancellation requested");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn status(&self) -> SessionStatus {
        if self.aborted_by_cancel {
            SessionStatus::Aborted
        } else {
            self.snapshots.borrow().status
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut snapshot = self.snapshots.borrow().clone();
        if self.aborted_by_cancel {
            snapshot.status = SessionStatus::Aborted;
        }
        snapshot
    }

    /// Drains remaining notifications, waits for the driver to stop and
    /// returns the final snapshot.
    pub async fn finish(mut self) -> SessionSnapshot {
        while self.next().await.is_some() {}
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.snapshot()
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
