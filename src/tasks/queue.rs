use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::domain::QueuedMessage;

const MESSAGE_EXTENSION: &str = "json";

/// Directory-backed ingestion queue.
///
/// Each `*.json` file in the inbox is one queued notification and its file name
/// is the message identifier. Received messages stay in flight until they are
/// acknowledged (deleted) or released (receivable again, or moved to the
/// dead-letter directory once the receive limit is reached).
#[derive(Debug)]
pub struct SpoolQueue {
    inbox: PathBuf,
    dead_letter: PathBuf,
    max_receive_count: u32,
    state: Mutex<QueueState>,
}

#[derive(Debug, Default)]
struct QueueState {
    in_flight: HashSet<String>,
    receive_counts: HashMap<String, u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub in_flight: usize,
    pub tracked: usize,
}

impl SpoolQueue {
    pub fn new(inbox: PathBuf, dead_letter: PathBuf, max_receive_count: u32) -> Self {
        Self {
            inbox,
            dead_letter,
            max_receive_count,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Up to `max` messages that are not in flight, in identifier order.
    pub fn receive(&self, max: usize) -> Result<Vec<QueuedMessage>> {
        let mut candidates = self.list_inbox()?;
        candidates.sort();

        let mut selected = Vec::new();
        {
            let mut state = self.state.lock();
            for identifier in candidates {
                if selected.len() >= max {
                    break;
                }
                if state.in_flight.insert(identifier.clone()) {
                    *state.receive_counts.entry(identifier.clone()).or_insert(0) += 1;
                    selected.push(identifier);
                }
            }
        }

        Ok(self.read_selected(selected))
    }

    /// Reads bodies as raw bytes; decoding is the processor's concern. A message
    /// that cannot be read is released and left out of the batch.
    fn read_selected(&self, selected: Vec<String>) -> Vec<QueuedMessage> {
        let mut batch = Vec::with_capacity(selected.len());
        for identifier in selected {
            let path = self.inbox.join(&identifier);
            match fs::read(&path) {
                Ok(body) => batch.push(QueuedMessage::new(identifier, body)),
                Err(err) => {
                    tracing::warn!(
                        target: "queue",
                        identifier = %identifier,
                        error = %err,
                        "failed to read queued message"
                    );
                    if let Err(err) = self.release(&identifier) {
                        tracing::error!(
                            target: "queue",
                            identifier = %identifier,
                            error = %err,
                            "failed to release unreadable message"
                        );
                    }
                }
            }
        }
        batch
    }

    /// Consumes a message for good.
    pub fn ack(&self, identifier: &str) -> Result<()> {
        let path = self.inbox.join(identifier);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("failed to remove {}", path.display()))
            }
        }
        self.forget(identifier);
        Ok(())
    }

    /// Makes a message receivable again, or dead-letters it once it has been
    /// received `max_receive_count` times.
    pub fn release(&self, identifier: &str) -> Result<()> {
        let receive_count = {
            let mut state = self.state.lock();
            state.in_flight.remove(identifier);
            state.receive_counts.get(identifier).copied().unwrap_or(0)
        };

        if receive_count < self.max_receive_count {
            tracing::debug!(
                target: "queue",
                identifier,
                receive_count,
                "message released for redelivery"
            );
            return Ok(());
        }

        let from = self.inbox.join(identifier);
        let to = self.dead_letter.join(identifier);
        fs::rename(&from, &to).with_context(|| {
            format!("failed to move {} to {}", from.display(), to.display())
        })?;
        self.forget(identifier);
        tracing::warn!(
            target: "queue",
            identifier,
            receive_count,
            "message moved to dead-letter"
        );
        Ok(())
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock();
        QueueSnapshot {
            in_flight: state.in_flight.len(),
            tracked: state.receive_counts.len(),
        }
    }

    fn forget(&self, identifier: &str) {
        let mut state = self.state.lock();
        state.in_flight.remove(identifier);
        state.receive_counts.remove(identifier);
    }

    fn list_inbox(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.inbox)
            .with_context(|| format!("failed to read inbox {}", self.inbox.display()))?;
        let mut identifiers = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !is_message_file(&path) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                identifiers.push(name.to_string());
            }
        }
        Ok(identifiers)
    }
}

fn is_message_file(path: &Path) -> bool {
    path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some(MESSAGE_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(max_receive_count: u32) -> (tempfile::TempDir, SpoolQueue) {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("inbox");
        let dead_letter = dir.path().join("dead-letter");
        fs::create_dir_all(&inbox).unwrap();
        fs::create_dir_all(&dead_letter).unwrap();
        let queue = SpoolQueue::new(inbox, dead_letter, max_receive_count);
        (dir, queue)
    }

    fn enqueue(queue: &SpoolQueue, name: &str, body: &str) {
        fs::write(queue.inbox.join(name), body).unwrap();
    }

    #[test]
    fn receives_in_name_order_and_skips_other_files() {
        let (_dir, queue) = queue(3);
        enqueue(&queue, "002.json", "second");
        enqueue(&queue, "001.json", "first");
        enqueue(&queue, "notes.txt", "ignored");

        let batch = queue.receive(10).unwrap();
        let ids: Vec<_> = batch.iter().map(|m| m.identifier.as_str()).collect();
        assert_eq!(ids, vec!["001.json", "002.json"]);
        assert_eq!(batch[0].body, b"first");
    }

    #[test]
    fn in_flight_messages_are_not_received_twice() {
        let (_dir, queue) = queue(3);
        enqueue(&queue, "001.json", "a");
        enqueue(&queue, "002.json", "b");

        assert_eq!(queue.receive(1).unwrap().len(), 1);
        let second = queue.receive(10).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].identifier, "002.json");
        assert!(queue.receive(10).unwrap().is_empty());
        assert_eq!(queue.snapshot().in_flight, 2);
    }

    #[test]
    fn ack_removes_the_message() {
        let (_dir, queue) = queue(3);
        enqueue(&queue, "001.json", "a");

        let batch = queue.receive(10).unwrap();
        queue.ack(&batch[0].identifier).unwrap();

        assert!(!queue.inbox.join("001.json").exists());
        assert!(queue.receive(10).unwrap().is_empty());
        assert_eq!(queue.snapshot(), QueueSnapshot::default());
    }

    #[test]
    fn release_makes_message_receivable_again() {
        let (_dir, queue) = queue(3);
        enqueue(&queue, "001.json", "a");

        queue.receive(10).unwrap();
        queue.release("001.json").unwrap();

        let again = queue.receive(10).unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].identifier, "001.json");
    }

    #[test]
    fn receive_limit_moves_message_to_dead_letter() {
        let (_dir, queue) = queue(2);
        enqueue(&queue, "001.json", "a");

        queue.receive(10).unwrap();
        queue.release("001.json").unwrap();
        queue.receive(10).unwrap();
        queue.release("001.json").unwrap();

        assert!(!queue.inbox.join("001.json").exists());
        assert!(queue.dead_letter.join("001.json").exists());
        assert!(queue.receive(10).unwrap().is_empty());
    }

    #[test]
    fn unreadable_message_does_not_strand_the_rest() {
        let (_dir, queue) = queue(1);
        enqueue(&queue, "001.json", "a");
        enqueue(&queue, "002.json", "b");
        let selected: Vec<String> = ["000.json", "001.json", "002.json"]
            .iter()
            .map(|id| id.to_string())
            .collect();
        {
            let mut state = queue.state.lock();
            for identifier in &selected {
                state.in_flight.insert(identifier.clone());
                state.receive_counts.insert(identifier.clone(), 1);
            }
        }

        let batch = queue.read_selected(selected);

        let ids: Vec<_> = batch.iter().map(|m| m.identifier.as_str()).collect();
        assert_eq!(ids, vec!["001.json", "002.json"]);
        assert_eq!(queue.snapshot().in_flight, 2);
    }

    #[test]
    fn non_utf8_body_is_delivered_as_bytes() {
        let (_dir, queue) = queue(3);
        fs::write(queue.inbox.join("001.json"), [0xff, 0xfe, b'{']).unwrap();

        let batch = queue.receive(10).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, vec![0xff, 0xfe, b'{']);
    }
}
