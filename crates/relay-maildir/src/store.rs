// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`MaildirStore`] and [`Mailbox`] — the atomic-rename delivery lifecycle.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use relay_envelope::{DeadLetter, Envelope};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::error::MaildirError;

const SUBDIRS: [&str; 4] = ["tmp", "new", "cur", "failed"];

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// An envelope returned by [`Mailbox::claim`], paired with the filename it
/// was claimed under (the id used for `complete`/`fail`).
#[derive(Debug, Clone)]
pub struct ClaimedEnvelope {
    /// The per-delivery filename stem (a ULID), distinct from `envelope.id`.
    pub filename: String,
    /// The parsed envelope.
    pub envelope: Envelope,
}

/// Top-level directory containing one subdirectory per endpoint hash.
#[derive(Debug, Clone)]
pub struct MaildirStore {
    root: PathBuf,
}

impl MaildirStore {
    /// Open (without creating) a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory under which every endpoint's mailbox lives.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the four subdirectories for `endpoint_hash`, each owner-only
    /// (`0o700`). Idempotent: existing directories are left as-is.
    pub fn create_mailbox(&self, endpoint_hash: &str) -> Result<Mailbox, MaildirError> {
        let base = self.root.join(endpoint_hash);
        for sub in SUBDIRS {
            let dir = base.join(sub);
            fs::create_dir_all(&dir)?;
            set_dir_permissions(&dir)?;
        }
        debug!(target: "relay.maildir", endpoint_hash, path = %base.display(), "mailbox created");
        Ok(Mailbox { base })
    }

    /// Return a handle to `endpoint_hash`'s mailbox without creating it.
    #[must_use]
    pub fn mailbox(&self, endpoint_hash: &str) -> Mailbox {
        Mailbox {
            base: self.root.join(endpoint_hash),
        }
    }

    /// Delete an endpoint's entire directory tree. Cascades: the caller is
    /// expected to have already unregistered the endpoint.
    pub fn remove_mailbox(&self, endpoint_hash: &str) -> Result<(), MaildirError> {
        let base = self.root.join(endpoint_hash);
        if base.exists() {
            fs::remove_dir_all(&base)?;
        }
        Ok(())
    }

    /// Every endpoint hash with a mailbox directory under the store root.
    pub fn list_endpoint_hashes(&self) -> Result<Vec<String>, MaildirError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut hashes = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    hashes.push(name.to_string());
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }
}

/// A single endpoint's `tmp/new/cur/failed` directory tree.
#[derive(Debug, Clone)]
pub struct Mailbox {
    base: PathBuf,
}

impl Mailbox {
    fn dir(&self, sub: &str) -> PathBuf {
        self.base.join(sub)
    }

    /// Write `envelope` atomically: exclusive-create in `tmp/`, then rename
    /// into `new/`. Returns the per-delivery filename stem (a fresh ULID,
    /// independent of `envelope.id` so one envelope fanned out to several
    /// endpoints gets a distinct filename at each).
    pub fn deliver(&self, envelope: &Envelope) -> Result<String, MaildirError> {
        let filename = Ulid::new().to_string();
        let tmp_path = self.dir("tmp").join(format!("{filename}.json"));
        let new_path = self.dir("new").join(format!("{filename}.json"));

        let body = serde_json::to_vec_pretty(envelope)?;
        let write_result = (|| -> std::io::Result<()> {
            let mut f = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp_path)?;
            set_file_permissions(&tmp_path)?;
            f.write_all(&body)?;
            f.sync_all()
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(MaildirError::DeliveryFailed(e.to_string()));
        }

        if let Err(e) = fs::rename(&tmp_path, &new_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(MaildirError::DeliveryFailed(e.to_string()));
        }

        debug!(target: "relay.maildir", filename = %filename, path = %new_path.display(), "envelope delivered");
        Ok(filename)
    }

    /// Atomically claim `filename` by renaming `new/ -> cur/`. On POSIX
    /// exactly one concurrent claimer observes success; the rest get
    /// [`MaildirError::ClaimFailed`]. Parses and returns the envelope.
    pub fn claim(&self, filename: &str) -> Result<ClaimedEnvelope, MaildirError> {
        let new_path = self.dir("new").join(format!("{filename}.json"));
        let cur_path = self.dir("cur").join(format!("{filename}.json"));

        fs::rename(&new_path, &cur_path)
            .map_err(|e| MaildirError::ClaimFailed(format!("{filename}: {e}")))?;

        let body = fs::read(&cur_path)?;
        let envelope: Envelope = serde_json::from_slice(&body)?;
        Ok(ClaimedEnvelope {
            filename: filename.to_string(),
            envelope,
        })
    }

    /// Successful processing: unlink the `cur/` file.
    pub fn complete(&self, filename: &str) -> Result<(), MaildirError> {
        let cur_path = self.dir("cur").join(format!("{filename}.json"));
        fs::remove_file(&cur_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MaildirError::NotFound(filename.to_string())
            } else {
                MaildirError::Io(e)
            }
        })
    }

    /// Failed processing: rename `cur/ -> failed/` and write a sidecar
    /// `{filename}.reason.json` carrying [`DeadLetter`] metadata.
    pub fn fail(
        &self,
        filename: &str,
        envelope: &Envelope,
        reason: impl Into<String>,
        endpoint_hash: impl Into<String>,
    ) -> Result<(), MaildirError> {
        let cur_path = self.dir("cur").join(format!("{filename}.json"));
        let failed_path = self.dir("failed").join(format!("{filename}.json"));

        fs::rename(&cur_path, &failed_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MaildirError::NotFound(filename.to_string())
            } else {
                MaildirError::Io(e)
            }
        })?;

        self.write_sidecar(filename, envelope, reason, endpoint_hash)?;
        warn!(target: "relay.maildir", filename = %filename, "envelope moved to failed/");
        Ok(())
    }

    /// Pre-mailbox rejection: write the envelope straight into `failed/`
    /// with its sidecar, without ever touching `tmp/new/cur`.
    pub fn fail_direct(
        &self,
        envelope: &Envelope,
        reason: impl Into<String>,
        endpoint_hash: impl Into<String>,
    ) -> Result<String, MaildirError> {
        let filename = Ulid::new().to_string();
        let failed_path = self.dir("failed").join(format!("{filename}.json"));
        let body = serde_json::to_vec_pretty(envelope)?;
        fs::write(&failed_path, body)?;
        set_file_permissions(&failed_path)?;
        self.write_sidecar(&filename, envelope, reason, endpoint_hash)?;
        Ok(filename)
    }

    fn write_sidecar(
        &self,
        filename: &str,
        envelope: &Envelope,
        reason: impl Into<String>,
        endpoint_hash: impl Into<String>,
    ) -> Result<(), MaildirError> {
        let sidecar_path = self.dir("failed").join(format!("{filename}.reason.json"));
        let dead_letter = DeadLetter {
            envelope: envelope.clone(),
            reason: reason.into(),
            failed_at: Utc::now(),
            endpoint_hash: endpoint_hash.into(),
        };
        let body = serde_json::to_vec_pretty(&dead_letter)?;
        fs::write(&sidecar_path, body)?;
        set_file_permissions(&sidecar_path)?;
        Ok(())
    }

    /// Sorted filenames (ULID order, so insertion order) in `new/`. Missing
    /// directory returns an empty list rather than an error.
    pub fn list_new(&self) -> Result<Vec<String>, MaildirError> {
        self.list_dir("new")
    }

    /// Sorted filenames currently claimed (`cur/`).
    pub fn list_cur(&self) -> Result<Vec<String>, MaildirError> {
        self.list_dir("cur")
    }

    /// Sorted filenames under `failed/`, excluding `.reason.json` sidecars.
    pub fn list_failed(&self) -> Result<Vec<String>, MaildirError> {
        let mut names = self.list_dir("failed")?;
        names.retain(|n| !n.ends_with(".reason"));
        Ok(names)
    }

    /// Count of files in `new/`, used for backpressure pressure calculation.
    pub fn count_new(&self) -> Result<usize, MaildirError> {
        Ok(self.list_new()?.len())
    }

    fn list_dir(&self, sub: &str) -> Result<Vec<String>, MaildirError> {
        let dir = self.dir(sub);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Read and parse the dead letter sidecar for `filename` under `failed/`.
    pub fn read_dead_letter(&self, filename: &str) -> Result<DeadLetter, MaildirError> {
        let sidecar_path = self.dir("failed").join(format!("{filename}.reason.json"));
        let body = fs::read(&sidecar_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MaildirError::NotFound(filename.to_string())
            } else {
                MaildirError::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Remove a failed envelope and its sidecar if `failed_at` (from the
    /// sidecar) predates `cutoff`. Returns whether a file was removed, for
    /// the caller to accumulate a purge count.
    pub fn purge_if_older_than(
        &self,
        filename: &str,
        cutoff: chrono::DateTime<Utc>,
    ) -> Result<bool, MaildirError> {
        let dead_letter = self.read_dead_letter(filename)?;
        if dead_letter.failed_at >= cutoff {
            return Ok(false);
        }
        let failed_path = self.dir("failed").join(format!("{filename}.json"));
        let sidecar_path = self.dir("failed").join(format!("{filename}.reason.json"));
        let _ = fs::remove_file(&failed_path);
        fs::remove_file(&sidecar_path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_envelope::Budget;
    use tempfile::TempDir;

    fn store() -> (TempDir, MaildirStore) {
        let dir = TempDir::new().unwrap();
        let store = MaildirStore::new(dir.path());
        (dir, store)
    }

    fn envelope() -> Envelope {
        Envelope::new(
            "relay.agent.s1",
            "relay.human.cli",
            None,
            serde_json::json!("hi"),
            Budget::fresh(),
        )
    }

    #[test]
    fn create_mailbox_makes_four_subdirs() {
        let (_dir, store) = store();
        let mailbox = store.create_mailbox("abc123").unwrap();
        for sub in SUBDIRS {
            assert!(mailbox.dir(sub).is_dir());
        }
    }

    #[test]
    #[cfg(unix)]
    fn create_mailbox_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, store) = store();
        let mailbox = store.create_mailbox("abc123").unwrap();
        let mode = fs::metadata(mailbox.dir("new")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn deliver_then_claim_round_trips() {
        let (_dir, store) = store();
        let mailbox = store.create_mailbox("abc123").unwrap();
        let e = envelope();
        let filename = mailbox.deliver(&e).unwrap();

        assert_eq!(mailbox.list_new().unwrap(), vec![filename.clone()]);

        let claimed = mailbox.claim(&filename).unwrap();
        assert_eq!(claimed.envelope.id, e.id);
        assert_eq!(claimed.envelope.subject, e.subject);
        assert!(mailbox.list_new().unwrap().is_empty());
        assert_eq!(mailbox.list_cur().unwrap(), vec![filename]);
    }

    #[test]
    fn concurrent_claim_only_one_wins() {
        let (_dir, store) = store();
        let mailbox = store.create_mailbox("abc123").unwrap();
        let filename = mailbox.deliver(&envelope()).unwrap();

        let first = mailbox.claim(&filename);
        let second = mailbox.claim(&filename);
        assert!(first.is_ok());
        assert!(second.is_err());
        assert!(matches!(second.unwrap_err(), MaildirError::ClaimFailed(_)));
    }

    #[test]
    fn complete_unlinks_cur_file() {
        let (_dir, store) = store();
        let mailbox = store.create_mailbox("abc123").unwrap();
        let filename = mailbox.deliver(&envelope()).unwrap();
        mailbox.claim(&filename).unwrap();
        mailbox.complete(&filename).unwrap();
        assert!(mailbox.list_cur().unwrap().is_empty());
    }

    #[test]
    fn fail_moves_to_failed_with_sidecar() {
        let (_dir, store) = store();
        let mailbox = store.create_mailbox("abc123").unwrap();
        let e = envelope();
        let filename = mailbox.deliver(&e).unwrap();
        mailbox.claim(&filename).unwrap();
        mailbox
            .fail(&filename, &e, "handler panicked", "abc123")
            .unwrap();

        assert_eq!(mailbox.list_failed().unwrap(), vec![filename.clone()]);
        let dead_letter = mailbox.read_dead_letter(&filename).unwrap();
        assert_eq!(dead_letter.reason, "handler panicked");
        assert_eq!(dead_letter.envelope.id, e.id);
    }

    #[test]
    fn fail_direct_skips_tmp_new_cur() {
        let (_dir, store) = store();
        let mailbox = store.create_mailbox("abc123").unwrap();
        let e = envelope();
        let filename = mailbox.fail_direct(&e, "cycle detected", "abc123").unwrap();

        assert!(mailbox.list_new().unwrap().is_empty());
        assert!(mailbox.list_cur().unwrap().is_empty());
        assert_eq!(mailbox.list_failed().unwrap(), vec![filename]);
    }

    #[test]
    fn list_on_missing_directory_is_empty() {
        let (_dir, store) = store();
        let mailbox = store.mailbox("never-created");
        assert!(mailbox.list_new().unwrap().is_empty());
        assert!(mailbox.list_cur().unwrap().is_empty());
        assert!(mailbox.list_failed().unwrap().is_empty());
    }

    #[test]
    fn deliveries_sort_in_ulid_order() {
        let (_dir, store) = store();
        let mailbox = store.create_mailbox("abc123").unwrap();
        let mut filenames = Vec::new();
        for _ in 0..5 {
            filenames.push(mailbox.deliver(&envelope()).unwrap());
        }
        let mut sorted = filenames.clone();
        sorted.sort();
        assert_eq!(mailbox.list_new().unwrap(), sorted);
    }

    #[test]
    fn remove_mailbox_deletes_tree() {
        let (_dir, store) = store();
        store.create_mailbox("abc123").unwrap();
        store.remove_mailbox("abc123").unwrap();
        assert!(!store.root().join("abc123").exists());
    }

    #[test]
    fn remove_mailbox_missing_is_ok() {
        let (_dir, store) = store();
        assert!(store.remove_mailbox("never-existed").is_ok());
    }

    #[test]
    fn list_endpoint_hashes_sorted() {
        let (_dir, store) = store();
        store.create_mailbox("zzz").unwrap();
        store.create_mailbox("aaa").unwrap();
        assert_eq!(store.list_endpoint_hashes().unwrap(), vec!["aaa", "zzz"]);
    }

    #[test]
    fn purge_removes_only_entries_older_than_cutoff() {
        let (_dir, store) = store();
        let mailbox = store.create_mailbox("abc123").unwrap();
        let e = envelope();
        let filename = mailbox.fail_direct(&e, "rejected", "abc123").unwrap();

        let future_cutoff = Utc::now() + chrono::Duration::seconds(60);
        assert!(mailbox.purge_if_older_than(&filename, future_cutoff).unwrap());
        assert!(mailbox.list_failed().unwrap().is_empty());
    }

    #[test]
    fn purge_keeps_entries_newer_than_cutoff() {
        let (_dir, store) = store();
        let mailbox = store.create_mailbox("abc123").unwrap();
        let e = envelope();
        let filename = mailbox.fail_direct(&e, "rejected", "abc123").unwrap();

        let past_cutoff = Utc::now() - chrono::Duration::seconds(60);
        assert!(!mailbox.purge_if_older_than(&filename, past_cutoff).unwrap());
        assert_eq!(mailbox.list_failed().unwrap(), vec![filename]);
    }
}
