// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dead-letter queue: list/get/purge over every endpoint's `failed/`
//! directory. Rejected or failed envelopes live on disk with a sidecar;
//! this component never holds its own state, it only walks the Maildir
//! tree through the registry.

use chrono::{DateTime, Utc};
use relay_envelope::DeadLetter;
use relay_maildir::MaildirError;
use relay_registry::EndpointRegistry;

/// Read-only view over dead letters across every registered endpoint.
pub struct DeadLetterQueue<'a> {
    endpoints: &'a EndpointRegistry,
}

impl<'a> DeadLetterQueue<'a> {
    /// Build a queue view rooted at `endpoints`' Maildir store.
    #[must_use]
    pub fn new(endpoints: &'a EndpointRegistry) -> Self {
        Self { endpoints }
    }

    /// Every dead letter filed under `endpoint_subject`'s mailbox.
    pub fn list(&self, endpoint_subject: &str) -> Result<Vec<(String, DeadLetter)>, MaildirError> {
        let Some(info) = self.endpoints.get(endpoint_subject) else {
            return Ok(Vec::new());
        };
        let mailbox = self.endpoints.maildir().mailbox(&info.hash);
        let mut out = Vec::new();
        for filename in mailbox.list_failed()? {
            let dead_letter = mailbox.read_dead_letter(&filename)?;
            out.push((filename, dead_letter));
        }
        Ok(out)
    }

    /// A single dead letter by endpoint subject and filename.
    pub fn get(&self, endpoint_subject: &str, filename: &str) -> Result<Option<DeadLetter>, MaildirError> {
        let Some(info) = self.endpoints.get(endpoint_subject) else {
            return Ok(None);
        };
        let mailbox = self.endpoints.maildir().mailbox(&info.hash);
        match mailbox.read_dead_letter(filename) {
            Ok(dead_letter) => Ok(Some(dead_letter)),
            Err(MaildirError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove every dead letter older than `cutoff`, across every
    /// registered endpoint. Returns the number of entries removed.
    pub fn purge(&self, cutoff: DateTime<Utc>) -> Result<usize, MaildirError> {
        let mut removed = 0usize;
        for info in self.endpoints.list() {
            let mailbox = self.endpoints.maildir().mailbox(&info.hash);
            for filename in mailbox.list_failed()? {
                if mailbox.purge_if_older_than(&filename, cutoff)? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
