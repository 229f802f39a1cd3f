//! Proxy Log Reader (§4.E): tails a JSONL file bind-mounted from inside a
//! container, surviving late creation and rotation, delivering LogEntry
//! values to a bounded sink.

use crate::model::{proxy_request_to_log_entry, LogEntry};
use crate::{CoreError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::VecDeque;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);
const DEFAULT_PENDING_CAPACITY: usize = 256;

struct TailState {
    file: Option<std::fs::File>,
    offset: u64,
    /// Entries that didn't fit in `sink` on their last send attempt, held
    /// here until the consumer drains room. Bounded at `pending_capacity`;
    /// pushing past that evicts the oldest entry so overflow always sheds
    /// the oldest, never the newest.
    pending: VecDeque<LogEntry>,
    pending_capacity: usize,
}

/// Tails `log_path` (expected to be written by a proxy sidecar and
/// bind-mounted to the host) and delivers parsed entries to `sink`. A
/// non-blocking send is tried first; if `sink` is full, the entry joins a
/// local bounded backlog instead of being discarded, and the backlog itself
/// evicts its oldest member on overflow. Net effect: under sustained
/// backpressure the newest entries always survive and the oldest are the
/// ones dropped.
pub struct ProxyLogReader {
    log_path: PathBuf,
    container_name: String,
    state: Mutex<TailState>,
}

impl ProxyLogReader {
    pub fn new(log_path: impl Into<PathBuf>, container_name: impl Into<String>) -> Self {
        Self {
            log_path: log_path.into(),
            container_name: container_name.into(),
            state: Mutex::new(TailState {
                file: None,
                offset: 0,
                pending: VecDeque::new(),
                pending_capacity: DEFAULT_PENDING_CAPACITY,
            }),
        }
    }

    /// Runs until `cancel` fires. Opens the file at EOF if it already
    /// exists (tail -f semantics, no historical replay).
    pub async fn start(&self, sink: mpsc::Sender<LogEntry>, cancel: CancellationToken) -> Result<()> {
        self.state.lock().unwrap().pending_capacity = sink.max_capacity();
        self.open_at_eof();

        let parent = self
            .log_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let (raw_tx, raw_rx) = std::sync::mpsc::channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = raw_tx.send(res);
            },
            notify::Config::default(),
        )
        .map_err(|e| CoreError::ProxyLogUnavailable(e.to_string()))?;
        watcher
            .watch(&parent, RecursiveMode::NonRecursive)
            .map_err(|e| CoreError::ProxyLogUnavailable(e.to_string()))?;

        // notify's watcher callback runs on its own thread via a std mpsc
        // channel; bridge it onto a tokio channel so it can share a select!
        // with the ticker and cancellation token.
        let (events_tx, mut events_rx) = mpsc::channel::<notify::Result<Event>>(64);
        std::thread::spawn(move || {
            while let Ok(event) = raw_rx.recv() {
                if events_tx.blocking_send(event).is_err() {
                    break;
                }
            }
        });

        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.close();
                    return Err(CoreError::Cancelled);
                }
                _ = ticker.tick() => {
                    self.poll_and_emit(&sink);
                }
                event = events_rx.recv() => {
                    if let Some(Ok(event)) = event {
                        self.handle_event(event, &sink);
                    }
                }
            }
        }
    }

    fn open_at_eof(&self) {
        let mut state = self.state.lock().unwrap();
        if let Ok(mut file) = std::fs::File::open(&self.log_path) {
            if let Ok(len) = file.seek(SeekFrom::End(0)) {
                state.offset = len;
            }
            state.file = Some(file);
        }
    }

    fn handle_event(&self, event: Event, sink: &mpsc::Sender<LogEntry>) {
        let touches_target = event.paths.iter().any(|p| p == &self.log_path);
        if !touches_target {
            return;
        }
        match event.kind {
            EventKind::Create(_) => {
                let mut state = self.state.lock().unwrap();
                if let Ok(file) = std::fs::File::open(&self.log_path) {
                    state.file = Some(file);
                    state.offset = 0;
                }
                drop(state);
                self.drain_new_content(sink);
            }
            EventKind::Modify(_) => {
                self.drain_new_content(sink);
            }
            EventKind::Remove(_) | EventKind::Any if matches!(event.kind, EventKind::Remove(_)) => {
                let mut state = self.state.lock().unwrap();
                state.file = None;
            }
            _ => {}
        }
    }

    fn poll_and_emit(&self, sink: &mpsc::Sender<LogEntry>) {
        {
            let state = self.state.lock().unwrap();
            if state.file.is_none() {
                drop(state);
                self.open_at_eof();
            }
        }
        self.drain_new_content(sink);
    }

    fn drain_new_content(&self, sink: &mpsc::Sender<LogEntry>) {
        self.flush_pending(sink);

        let mut state = self.state.lock().unwrap();
        let offset = state.offset;
        let Some(file) = state.file.as_mut() else {
            return;
        };

        let mut buf = String::new();
        if file.seek(SeekFrom::Start(offset)).is_err() {
            return;
        }
        if file.read_to_string(&mut buf).is_err() {
            return;
        }
        state.offset += buf.len() as u64;
        drop(state);

        for line in buf.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match crate::model::parse_proxy_request(line) {
                Ok(request) => {
                    let entry = proxy_request_to_log_entry(&request, &self.container_name);
                    self.send_or_buffer(sink, entry);
                }
                Err(e) => {
                    warn!(error = %e, "skipping malformed proxy log line");
                }
            }
        }
    }

    /// Tries a non-blocking send; on a full channel, the entry is pushed
    /// onto the pending backlog instead of being dropped. Pushing onto a
    /// backlog already at capacity evicts its oldest entry first.
    fn send_or_buffer(&self, sink: &mpsc::Sender<LogEntry>, entry: LogEntry) {
        match sink.try_send(entry) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(entry)) => {
                let mut state = self.state.lock().unwrap();
                if state.pending.len() >= state.pending_capacity.max(1) {
                    state.pending.pop_front();
                    debug!("proxy log backlog full, dropping oldest buffered entry");
                }
                state.pending.push_back(entry);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("proxy log sink closed, dropping entry");
            }
        }
    }

    /// Attempts to forward as many backlogged entries as the channel will
    /// currently accept, oldest first, leaving the rest buffered.
    fn flush_pending(&self, sink: &mpsc::Sender<LogEntry>) {
        loop {
            let next = {
                let mut state = self.state.lock().unwrap();
                state.pending.pop_front()
            };
            let Some(entry) = next else {
                return;
            };
            match sink.try_send(entry) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(entry)) => {
                    self.state.lock().unwrap().pending.push_front(entry);
                    return;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    return;
                }
            }
        }
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.file = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[tokio::test]
    async fn tails_appended_lines_after_late_file_creation() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("requests.jsonl");
        let reader = ProxyLogReader::new(&log_path, "p-1");

        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();

        let handle = tokio::spawn(async move {
            let _ = reader.start(tx, cancel2).await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let mut f = std::fs::File::create(&log_path).unwrap();
        writeln!(
            f,
            r#"{{"ts":1700000000.0,"method":"GET","url":"https://x","status":200,"duration_ms":5.0}}"#
        )
        .unwrap();
        drop(f);

        let entry = tokio::time::timeout(std::time::Duration::from_secs(6), rx.recv())
            .await
            .expect("entry within timeout")
            .expect("channel not closed");
        assert_eq!(entry.scope, "proxy.p-1");

        cancel.cancel();
        let _ = handle.await;
    }

    #[test]
    fn full_sink_buffers_entries_and_drops_oldest_on_backlog_overflow() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("requests.jsonl");
        std::fs::write(&log_path, "").unwrap();

        let reader = ProxyLogReader::new(&log_path, "p-1");
        reader.open_at_eof();
        {
            let mut state = reader.state.lock().unwrap();
            state.pending_capacity = 2;
        }

        let (tx, rx) = mpsc::channel(1);
        // Fill the channel itself so every subsequent send goes to the backlog.
        tx.try_send(LogEntry::new(crate::model::Severity::Info, "proxy.p-1", "filler"))
            .unwrap();

        for i in 0..4 {
            let entry = LogEntry::new(crate::model::Severity::Info, "proxy.p-1", format!("m{i}"));
            reader.send_or_buffer(&tx, entry);
        }

        let pending: Vec<_> = reader
            .state
            .lock()
            .unwrap()
            .pending
            .iter()
            .map(|e| e.message.clone())
            .collect();
        // Backlog capacity is 2; the two oldest of the four buffered entries
        // (m0, m1) must have been evicted, leaving only the newest.
        assert_eq!(pending, vec!["m2".to_string(), "m3".to_string()]);

        drop(rx);
    }

    #[test]
    fn malformed_lines_are_skipped_without_stopping_drain() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("requests.jsonl");
        std::fs::write(
            &log_path,
            "not json\n{\"ts\":1.0,\"method\":\"GET\",\"url\":\"https://x\",\"status\":200,\"duration_ms\":1.0}\n",
        )
        .unwrap();

        let reader = ProxyLogReader::new(&log_path, "p-1");
        reader.open_at_eof();
        {
            let mut state = reader.state.lock().unwrap();
            state.offset = 0;
        }

        let (tx, mut rx) = mpsc::channel(16);
        reader.drain_new_content(&tx);
        drop(tx);

        let mut received = Vec::new();
        while let Ok(entry) = rx.try_recv() {
            received.push(entry);
        }
        assert_eq!(received.len(), 1);
    }
}
