//! Sync engine
//!
//! Orchestrates the merge between the local store and the annotation
//! server, and carries the collaborator-facing API the viewer adapters
//! call into.
//!
//! Two entry points share the merge logic: [`SyncEngine::sync_annotations`]
//! (drain deletions, fetch, merge, push what the server is missing) and
//! [`SyncEngine::download_annotations`] (fetch and merge only).
//!
//! Network and parse failures never escape this boundary: every
//! [`ClientError`] is logged and treated as "nothing to merge this
//! round", so a sync is always safe to retry. Callers must not start a
//! second sync for the same document while one is in flight; that
//! single-flight discipline is the caller's, not enforced here.
//!
//! [`ClientError`]: crate::client::ClientError

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::client::{AnnotationService, LookupKey};
use crate::config::Config;
use crate::identity;
use crate::models::{Annotation, Highlight, NoteContent};
use crate::nav::{Cursor, NavIndex};
use crate::store::AnnotationStore;
use crate::storage::StoreResult;

/// Clock-skew tolerance for the last-writer-wins comparison, seconds
///
/// A remote copy wins only when it is strictly newer than the local one
/// by more than this window.
pub const MODIFIED_TOLERANCE_SECS: f64 = 10.0;

/// Colors handed to remote authors, in first-seen order
const REMOTE_PALETTE: [&str; 8] = [
    "#00588C,#00A0FF",
    "#8F00B5,#D900FF",
    "#00883D,#00EA11",
    "#AC6600,#FFC30A",
    "#9A5200,#FF8F00",
    "#005FE4,#BCCDFF",
    "#B20008,#FF2B34",
    "#5E008C,#A700FF",
];

/// Collaborator notified when a page's annotation set changes
pub trait PageObserver {
    fn page_updated(&mut self, page: u32);
}

/// Observer that ignores every notification
pub struct NullObserver;

impl PageObserver for NullObserver {
    fn page_updated(&mut self, _page: u32) {}
}

/// Counts of what one sync round did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    /// New remote annotations inserted locally
    pub inserted: usize,
    /// Local annotations overwritten by a newer remote copy
    pub updated: usize,
    /// Local annotations pushed to the server
    pub pushed: usize,
    /// Remote deletions the server accepted
    pub deleted: usize,
}

/// The annotation engine for one open document
pub struct SyncEngine<C> {
    store: AnnotationStore,
    client: C,
    nickname: String,
    user_color: String,
    /// Resolved server user id, empty until resolution succeeds
    user_id: String,
    /// Session colors for remote authors
    remote_colors: HashMap<String, String>,
    /// Session navigation cursor, never persisted
    cursor: Option<Cursor>,
}

impl<C: AnnotationService> SyncEngine<C> {
    /// Create the engine for an opened store
    pub fn new(store: AnnotationStore, client: C, config: &Config) -> Self {
        Self {
            store,
            client,
            nickname: config.nickname.clone(),
            user_color: config.user_color.clone(),
            user_id: String::new(),
            remote_colors: HashMap::new(),
            cursor: None,
        }
    }

    /// The underlying store (read access for collaborators)
    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    /// The resolved user id, empty while unresolved
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    // ==================== Collaborator-facing API ====================

    /// Create an annotation on a page and make it the current one
    pub fn add_annotation(&mut self, page: u32, note: &NoteContent) -> StoreResult<Annotation> {
        self.ensure_identity()?;
        let user_id = self.user_id.clone();
        let color = self.user_color.clone();
        let annotation = self.store.add_annotation(page, note, &user_id, &color)?;
        self.cursor = Some(Cursor {
            page,
            id: annotation.id,
        });
        Ok(annotation)
    }

    /// Edit an annotation in place; no write when nothing changed
    pub fn edit_annotation(&mut self, page: u32, note: &NoteContent, id: i64) -> StoreResult<bool> {
        let changed = self.store.edit_annotation(id, note)?;
        self.cursor = Some(Cursor { page, id });
        Ok(changed)
    }

    /// Delete an annotation, tombstoning or scheduling the remote delete
    pub fn delete_annotation(&mut self, page: u32, id: i64) -> StoreResult<()> {
        debug!("Deleting annotation {} on page {}", id, page);
        self.ensure_identity()?;
        let user_id = self.user_id.clone();
        self.store.delete_annotation(id, &user_id)?;
        if self.cursor.is_some_and(|c| c.id == id) {
            self.cursor = None;
        }
        Ok(())
    }

    /// Annotations on one page, in store order
    pub fn annotations_for_page(&self, page: u32) -> Vec<Annotation> {
        self.store.annotations_for_page(page)
    }

    /// Move to the previous annotation, cyclically
    pub fn prev_annotation(&mut self, page: u32) -> Option<Annotation> {
        let index = NavIndex::build(self.store.annotations());
        self.cursor = index.prev(page, self.cursor);
        self.current_annotation()
    }

    /// Move to the next annotation, cyclically
    pub fn next_annotation(&mut self, page: u32) -> Option<Annotation> {
        let index = NavIndex::build(self.store.annotations());
        self.cursor = index.next(page, self.cursor);
        self.current_annotation()
    }

    /// The annotation under the session cursor, if any
    pub fn current_annotation(&self) -> Option<Annotation> {
        self.cursor
            .and_then(|c| self.store.annotation_by_id(c.id))
            .cloned()
    }

    /// Highlights on one page
    pub fn highlights(&mut self, page: u32) -> Vec<Highlight> {
        self.store.highlights(page).to_vec()
    }

    /// Add a highlight to a page
    pub fn add_highlight(&mut self, page: u32, highlight: Highlight) -> StoreResult<()> {
        self.store.add_highlight(page, highlight)
    }

    /// Remove a highlight; an absent range is an error (caller bug)
    pub fn remove_highlight(&mut self, page: u32, highlight: Highlight) -> StoreResult<()> {
        self.store.remove_highlight(page, highlight)
    }

    // ==================== Sync ====================

    /// Full sync: drain deletions, fetch, merge, push local changes
    pub fn sync_annotations(&mut self, observer: &mut dyn PageObserver) -> StoreResult<SyncSummary> {
        self.run_sync(observer, true)
    }

    /// Download-only sync: fetch and merge, never push absent locals
    pub fn download_annotations(
        &mut self,
        observer: &mut dyn PageObserver,
    ) -> StoreResult<SyncSummary> {
        self.run_sync(observer, false)
    }

    fn run_sync(&mut self, observer: &mut dyn PageObserver, full: bool) -> StoreResult<SyncSummary> {
        let mut summary = SyncSummary::default();

        self.ensure_identity()?;

        let key = self.lookup_key();

        if full {
            self.drain_deletions(&key, &mut summary)?;
        }

        // A failed fetch ends the round; a successful fetch of zero
        // records does not — the push phase is what first publishes a
        // fresh document.
        let remote = match self.client.fetch(&key) {
            Ok(annotations) => annotations,
            Err(e) => {
                warn!("Annotation fetch failed, nothing to merge this round: {}", e);
                return Ok(summary);
            }
        };

        let tombstones = self.store.tombstoned_uuids()?;
        let mut remote_uuids: HashSet<String> = HashSet::new();

        for record in &remote {
            // Remote records without a uuid get one derived from their
            // own (creator, filehash, id), same as the other replicas do
            let mut record = record.clone();
            record.make_uuid();
            if record.uuid.is_empty() {
                debug!("Skipping remote annotation without derivable identity");
                continue;
            }
            remote_uuids.insert(record.uuid.clone());

            if tombstones.contains(&record.uuid) {
                debug!("Skipping tombstoned annotation {}", record.uuid);
                continue;
            }

            let local = self
                .store
                .annotations()
                .iter()
                .find(|l| !l.uuid.is_empty() && l.uuid == record.uuid)
                .cloned();

            match local {
                Some(local) => {
                    if local.modified < record.modified - MODIFIED_TOLERANCE_SECS {
                        debug!(
                            "Remote copy of {} is newer ({} < {})",
                            record.uuid, local.modified, record.modified
                        );
                        self.store.apply_remote_update(
                            local.id,
                            &record.title,
                            &record.body,
                            record.modified,
                        )?;
                        summary.updated += 1;
                    } else if !self.user_id.is_empty() && local.creator == self.user_id {
                        // Local wins and the server copy is stale
                        if self.push_annotation(local)? {
                            summary.pushed += 1;
                        }
                    }
                    // Not newer and not ours: leave both sides alone
                }
                None => {
                    record.color = self.remote_color(&record.creator);
                    self.store.insert_remote(&record)?;
                    observer.page_updated(record.page);
                    summary.inserted += 1;
                }
            }
        }

        if full {
            self.push_missing(&remote_uuids, &mut summary)?;
        }

        info!(
            "Sync complete: {} inserted, {} updated, {} pushed, {} deleted",
            summary.inserted, summary.updated, summary.pushed, summary.deleted
        );
        Ok(summary)
    }

    /// Resolve the user id once per session and adopt any annotations
    /// persisted before resolution completed
    ///
    /// Resolution failure leaves the id empty: annotations keep being
    /// created with degraded identity, never an error.
    fn ensure_identity(&mut self) -> StoreResult<()> {
        if !self.user_id.is_empty() {
            return Ok(());
        }

        let user_string = identity::user_string(&self.nickname);
        self.user_id = self.store.resolve_user_id(&user_string, &self.client)?;

        if self.user_id.is_empty() {
            debug!("User id unresolved, proceeding with degraded identity");
        } else {
            let user_id = self.user_id.clone();
            self.store.adopt_orphans(&user_id)?;
        }
        Ok(())
    }

    /// Request every queued remote deletion; failures stay queued
    fn drain_deletions(&mut self, key: &LookupKey, summary: &mut SyncSummary) -> StoreResult<()> {
        for uuid in self.store.pending_deletes()? {
            match self.client.delete(key, &uuid) {
                Ok(()) => {
                    self.store.confirm_remote_delete(&uuid)?;
                    summary.deleted += 1;
                }
                Err(e) => {
                    warn!("Delete request for {} failed, will retry: {}", uuid, e);
                }
            }
        }
        Ok(())
    }

    /// Push every locally-owned annotation the server does not have
    fn push_missing(
        &mut self,
        remote_uuids: &HashSet<String>,
        summary: &mut SyncSummary,
    ) -> StoreResult<()> {
        if self.user_id.is_empty() {
            return Ok(());
        }

        let candidates: Vec<Annotation> = self
            .store
            .annotations()
            .iter()
            .filter(|a| {
                !a.uuid.is_empty()
                    && a.creator == self.user_id
                    && !remote_uuids.contains(&a.uuid)
            })
            .cloned()
            .collect();

        for annotation in candidates {
            if self.push_annotation(annotation)? {
                summary.pushed += 1;
            }
        }
        Ok(())
    }

    /// Send one annotation; on success persist the URLs the server
    /// assigned. Client failures are absorbed (`false`), store failures
    /// propagate.
    fn push_annotation(&mut self, mut annotation: Annotation) -> StoreResult<bool> {
        match self.client.push(&annotation) {
            Ok(receipt) => {
                if !receipt.annotation_url.is_empty() {
                    annotation.annotation_url = receipt.annotation_url;
                }
                if !receipt.body_url.is_empty() {
                    annotation.body_url = receipt.body_url;
                }
                self.store.update_record(&annotation)?;
                Ok(true)
            }
            Err(e) => {
                warn!("Pushing annotation {} failed: {}", annotation.uuid, e);
                Ok(false)
            }
        }
    }

    /// Fetches and deletes are scoped by target when the document has
    /// one, else by content hash
    fn lookup_key(&self) -> LookupKey {
        let info = self.store.info();
        if info.target.is_empty() {
            LookupKey::Checksum(info.filehash.clone())
        } else {
            LookupKey::Target(info.target.clone())
        }
    }

    /// Session color for a remote author, allocated on first sight
    fn remote_color(&mut self, creator: &str) -> String {
        if let Some(color) = self.remote_colors.get(creator) {
            return color.clone();
        }
        let color = REMOTE_PALETTE[self.remote_colors.len() % REMOTE_PALETTE.len()].to_string();
        self.remote_colors.insert(creator.to_string(), color.clone());
        color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, ClientResult, PushReceipt};
    use crate::store::DocumentInfo;
    use crate::storage;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// In-memory stand-in for the annotation server
    #[derive(Default)]
    struct MockService {
        userid: Option<String>,
        remote: Vec<Annotation>,
        fail_fetch: bool,
        fail_delete: bool,
        fetches: RefCell<Vec<LookupKey>>,
        pushes: RefCell<Vec<Annotation>>,
        deletes: RefCell<Vec<(LookupKey, String)>>,
    }

    impl AnnotationService for MockService {
        fn resolve_user_id(&self, _user_string: &str) -> ClientResult<String> {
            match &self.userid {
                Some(id) => Ok(id.clone()),
                None => Err(ClientError::Status(503)),
            }
        }

        fn fetch(&self, key: &LookupKey) -> ClientResult<Vec<Annotation>> {
            self.fetches.borrow_mut().push(key.clone());
            if self.fail_fetch {
                return Err(ClientError::Status(500));
            }
            Ok(self.remote.clone())
        }

        fn push(&self, annotation: &Annotation) -> ClientResult<PushReceipt> {
            self.pushes.borrow_mut().push(annotation.clone());
            let receipt: PushReceipt = serde_json::from_str(&format!(
                r#"{{"annotationurl": "http://server/a/{id}", "bodyurl": "http://server/b/{id}"}}"#,
                id = annotation.id
            ))
            .unwrap();
            Ok(receipt)
        }

        fn delete(&self, key: &LookupKey, uuid: &str) -> ClientResult<()> {
            if self.fail_delete {
                return Err(ClientError::Status(500));
            }
            self.deletes
                .borrow_mut()
                .push((key.clone(), uuid.to_string()));
            Ok(())
        }
    }

    /// Observer recording which pages changed
    #[derive(Default)]
    struct RecordingObserver {
        pages: Vec<u32>,
    }

    impl PageObserver for RecordingObserver {
        fn page_updated(&mut self, page: u32) {
            self.pages.push(page);
        }
    }

    fn test_config(temp_dir: &TempDir) -> Config {
        let seed = temp_dir.path().join("seed.db");
        storage::create_seed(&seed).unwrap();
        Config {
            data_dir: temp_dir.path().join("data"),
            nickname: "kiwi".to_string(),
            seed_path: Some(seed),
            ..Config::default()
        }
    }

    fn doc_info() -> DocumentInfo {
        DocumentInfo {
            filehash: "doc1".to_string(),
            mimetype: "application/pdf".to_string(),
            target: String::new(),
            text_title: String::new(),
            text_creator: String::new(),
        }
    }

    fn engine_with(temp_dir: &TempDir, service: MockService) -> SyncEngine<MockService> {
        let config = test_config(temp_dir);
        let store = AnnotationStore::open(&config, doc_info()).unwrap();
        SyncEngine::new(store, service, &config)
    }

    fn remote_annotation(uuid: &str, creator: &str, page: u32, modified: f64) -> Annotation {
        Annotation {
            id: 1,
            filehash: "doc1".to_string(),
            page,
            title: "remote title".to_string(),
            body: "remote body".to_string(),
            body_url: String::new(),
            text_title: String::new(),
            text_creator: String::new(),
            created: modified,
            modified,
            creator: creator.to_string(),
            annotates: String::new(),
            color: String::new(),
            local: true,
            mimetype: "application/pdf".to_string(),
            uuid: uuid.to_string(),
            annotation_url: String::new(),
        }
    }

    #[test]
    fn test_push_only_scenario() {
        let temp_dir = TempDir::new().unwrap();
        let mut engine = engine_with(
            &temp_dir,
            MockService {
                userid: Some("u1".to_string()),
                // The server has one foreign annotation we already hold,
                // so merge has nothing to do and only the push phase acts
                remote: vec![remote_annotation("urn:sugaruuid:u2-doc1-0", "u2", 3, 500.0)],
                ..MockService::default()
            },
        );

        // Pre-seed the foreign annotation so merge is a no-op for it
        let mut foreign = remote_annotation("urn:sugaruuid:u2-doc1-0", "u2", 3, 500.0);
        foreign.color = "#00588C,#00A0FF".to_string();
        engine.store.insert_remote(&foreign).unwrap();

        let ours = engine
            .add_annotation(2, &NoteContent::new("mine", "body"))
            .unwrap();
        assert_eq!(ours.creator, "u1");

        let mut observer = NullObserver;
        let summary = engine.sync_annotations(&mut observer).unwrap();

        assert_eq!(summary.pushed, 1);
        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.updated, 0);

        let pushes = engine.client.pushes.borrow();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].uuid, ours.uuid);

        // The receipt URLs were persisted
        let stored = engine.store.annotation_by_id(ours.id).unwrap();
        assert_eq!(stored.annotation_url, format!("http://server/a/{}", ours.id));
        assert_eq!(stored.body_url, format!("http://server/b/{}", ours.id));
    }

    #[test]
    fn test_new_remote_insert_scenario() {
        let temp_dir = TempDir::new().unwrap();
        let mut engine = engine_with(
            &temp_dir,
            MockService {
                userid: Some("u1".to_string()),
                remote: vec![remote_annotation("urn:sugaruuid:u2-doc1-4", "u2", 7, 500.0)],
                ..MockService::default()
            },
        );

        let mut observer = RecordingObserver::default();
        let summary = engine.sync_annotations(&mut observer).unwrap();

        assert_eq!(summary.inserted, 1);
        assert_eq!(observer.pages, vec![7]);

        let on_page = engine.annotations_for_page(7);
        assert_eq!(on_page.len(), 1);
        assert_eq!(on_page[0].uuid, "urn:sugaruuid:u2-doc1-4");
        // First remote author gets the first palette color
        assert_eq!(on_page[0].color, REMOTE_PALETTE[0]);
    }

    #[test]
    fn test_remote_author_colors_are_stable_within_session() {
        let temp_dir = TempDir::new().unwrap();
        let mut engine = engine_with(
            &temp_dir,
            MockService {
                userid: Some("u1".to_string()),
                remote: vec![
                    remote_annotation("urn:sugaruuid:u2-doc1-1", "u2", 1, 500.0),
                    remote_annotation("urn:sugaruuid:u3-doc1-2", "u3", 2, 500.0),
                    remote_annotation("urn:sugaruuid:u2-doc1-3", "u2", 3, 500.0),
                ],
                ..MockService::default()
            },
        );

        engine.sync_annotations(&mut NullObserver).unwrap();

        let a = &engine.annotations_for_page(1)[0];
        let b = &engine.annotations_for_page(2)[0];
        let c = &engine.annotations_for_page(3)[0];
        assert_eq!(a.color, REMOTE_PALETTE[0]);
        assert_eq!(b.color, REMOTE_PALETTE[1]);
        assert_eq!(c.color, REMOTE_PALETTE[0]);
    }

    #[test]
    fn test_tolerance_tie_break() {
        let temp_dir = TempDir::new().unwrap();
        let t = 1_000.0;
        let mut engine = engine_with(
            &temp_dir,
            MockService {
                userid: Some("u1".to_string()),
                remote: vec![
                    // Within tolerance: must not overwrite
                    remote_annotation("urn:sugaruuid:u2-doc1-0", "u2", 1, t + 5.0),
                    // Beyond tolerance: must overwrite
                    remote_annotation("urn:sugaruuid:u3-doc1-1", "u3", 2, t + 11.0),
                ],
                ..MockService::default()
            },
        );

        let mut near = remote_annotation("urn:sugaruuid:u2-doc1-0", "u2", 1, t);
        near.body = "local near".to_string();
        engine.store.insert_remote(&near).unwrap();

        let mut far = remote_annotation("urn:sugaruuid:u3-doc1-1", "u3", 2, t);
        far.body = "local far".to_string();
        engine.store.insert_remote(&far).unwrap();

        let summary = engine.sync_annotations(&mut NullObserver).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.inserted, 0);

        assert_eq!(engine.annotations_for_page(1)[0].body, "local near");
        let overwritten = &engine.annotations_for_page(2)[0];
        assert_eq!(overwritten.body, "remote body");
        assert_eq!(overwritten.modified, t + 11.0);
    }

    #[test]
    fn test_stale_remote_copy_of_ours_is_pushed() {
        let temp_dir = TempDir::new().unwrap();
        let t = 1_000.0;
        let mut engine = engine_with(
            &temp_dir,
            MockService {
                userid: Some("u1".to_string()),
                remote: vec![remote_annotation("urn:sugaruuid:u1-doc1-0", "u1", 1, t - 100.0)],
                ..MockService::default()
            },
        );

        let ours = remote_annotation("urn:sugaruuid:u1-doc1-0", "u1", 1, t);
        engine.store.insert_remote(&ours).unwrap();

        let summary = engine.sync_annotations(&mut NullObserver).unwrap();
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.pushed, 1);
        assert_eq!(engine.client.pushes.borrow().len(), 1);
    }

    #[test]
    fn test_tombstone_non_resurrection() {
        let temp_dir = TempDir::new().unwrap();
        let mut engine = engine_with(
            &temp_dir,
            MockService {
                userid: Some("u1".to_string()),
                remote: vec![remote_annotation("urn:sugaruuid:u2-doc1-0", "u2", 3, 500.0)],
                ..MockService::default()
            },
        );

        // First sync brings the annotation in
        engine.sync_annotations(&mut NullObserver).unwrap();
        let id = engine.annotations_for_page(3)[0].id;

        // Deleting a foreign annotation tombstones it
        engine.delete_annotation(3, id).unwrap();
        assert!(engine.annotations_for_page(3).is_empty());

        // Any later merge carrying that uuid must not resurrect it
        let summary = engine.sync_annotations(&mut NullObserver).unwrap();
        assert_eq!(summary.inserted, 0);
        assert!(engine.annotations_for_page(3).is_empty());
    }

    #[test]
    fn test_download_only_skips_push_phase() {
        let temp_dir = TempDir::new().unwrap();
        let mut engine = engine_with(
            &temp_dir,
            MockService {
                userid: Some("u1".to_string()),
                remote: vec![remote_annotation("urn:sugaruuid:u2-doc1-9", "u2", 1, 500.0)],
                ..MockService::default()
            },
        );

        engine
            .add_annotation(2, &NoteContent::new("mine", "body"))
            .unwrap();

        let summary = engine.download_annotations(&mut NullObserver).unwrap();
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.pushed, 0);
        assert!(engine.client.pushes.borrow().is_empty());

        // The full sync pushes it
        let summary = engine.sync_annotations(&mut NullObserver).unwrap();
        assert_eq!(summary.pushed, 1);
    }

    #[test]
    fn test_fetch_failure_merges_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut engine = engine_with(
            &temp_dir,
            MockService {
                userid: Some("u1".to_string()),
                fail_fetch: true,
                ..MockService::default()
            },
        );

        engine
            .add_annotation(0, &NoteContent::new("t", "b"))
            .unwrap();

        let summary = engine.sync_annotations(&mut NullObserver).unwrap();
        assert_eq!(summary, SyncSummary::default());
        assert_eq!(engine.annotations_for_page(0).len(), 1);
    }

    #[test]
    fn test_deletion_queue_drains_on_success() {
        let temp_dir = TempDir::new().unwrap();
        let mut engine = engine_with(
            &temp_dir,
            MockService {
                userid: Some("u1".to_string()),
                ..MockService::default()
            },
        );

        let ours = engine
            .add_annotation(0, &NoteContent::new("t", "b"))
            .unwrap();
        engine.delete_annotation(0, ours.id).unwrap();
        assert_eq!(
            engine.store.pending_deletes().unwrap(),
            vec![ours.uuid.clone()]
        );

        let summary = engine.sync_annotations(&mut NullObserver).unwrap();
        assert_eq!(summary.deleted, 1);
        assert!(engine.store.pending_deletes().unwrap().is_empty());

        let deletes = engine.client.deletes.borrow();
        assert_eq!(
            deletes[0],
            (LookupKey::Checksum("doc1".to_string()), ours.uuid)
        );
    }

    #[test]
    fn test_deletion_stays_queued_on_failure() {
        let temp_dir = TempDir::new().unwrap();
        let mut engine = engine_with(
            &temp_dir,
            MockService {
                userid: Some("u1".to_string()),
                fail_delete: true,
                ..MockService::default()
            },
        );

        let ours = engine
            .add_annotation(0, &NoteContent::new("t", "b"))
            .unwrap();
        engine.delete_annotation(0, ours.id).unwrap();

        engine.sync_annotations(&mut NullObserver).unwrap();
        assert_eq!(engine.store.pending_deletes().unwrap(), vec![ours.uuid]);
    }

    #[test]
    fn test_own_deletion_drains_in_later_session() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        // One session creates and deletes an owned annotation, then
        // exits without ever syncing
        let uuid = {
            let store = AnnotationStore::open(&config, doc_info()).unwrap();
            let mut engine = SyncEngine::new(
                store,
                MockService {
                    userid: Some("u1".to_string()),
                    ..MockService::default()
                },
                &config,
            );
            let ours = engine
                .add_annotation(0, &NoteContent::new("t", "b"))
                .unwrap();
            engine.delete_annotation(0, ours.id).unwrap();
            ours.uuid
        };

        // A later session's sync sends the delete request
        let store = AnnotationStore::open(&config, doc_info()).unwrap();
        let mut engine = SyncEngine::new(
            store,
            MockService {
                userid: Some("u1".to_string()),
                ..MockService::default()
            },
            &config,
        );
        let summary = engine.sync_annotations(&mut NullObserver).unwrap();

        assert_eq!(summary.deleted, 1);
        let deletes = engine.client.deletes.borrow();
        assert_eq!(deletes[0], (LookupKey::Checksum("doc1".to_string()), uuid));
        assert!(engine.store.pending_deletes().unwrap().is_empty());
        assert!(engine.store.annotations().is_empty());
    }

    #[test]
    fn test_target_scopes_requests() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let info = DocumentInfo {
            target: "http://example.org/book".to_string(),
            ..doc_info()
        };
        let store = AnnotationStore::open(&config, info).unwrap();
        let mut engine = SyncEngine::new(
            store,
            MockService {
                userid: Some("u1".to_string()),
                ..MockService::default()
            },
            &config,
        );

        engine.sync_annotations(&mut NullObserver).unwrap();

        let fetches = engine.client.fetches.borrow();
        assert_eq!(
            fetches[0],
            LookupKey::Target("http://example.org/book".to_string())
        );
    }

    #[test]
    fn test_identity_failure_degrades_then_recovers() {
        let temp_dir = TempDir::new().unwrap();
        let mut engine = engine_with(&temp_dir, MockService::default());

        // Resolution fails: annotation is still created, unattributable
        let orphan = engine
            .add_annotation(1, &NoteContent::new("t", "b"))
            .unwrap();
        assert!(orphan.creator.is_empty());
        assert!(orphan.uuid.is_empty());

        // Identity comes back: the orphan is adopted and pushed
        engine.client.userid = Some("u1".to_string());
        let summary = engine.sync_annotations(&mut NullObserver).unwrap();
        assert_eq!(summary.pushed, 1);

        let adopted = engine.store.annotation_by_id(orphan.id).unwrap();
        assert_eq!(adopted.creator, "u1");
        assert_eq!(adopted.uuid, format!("urn:sugaruuid:u1-doc1-{}", orphan.id));
    }

    #[test]
    fn test_fresh_document_first_sync_publishes() {
        let temp_dir = TempDir::new().unwrap();
        let mut engine = engine_with(
            &temp_dir,
            MockService {
                userid: Some("u1".to_string()),
                ..MockService::default()
            },
        );

        let ours = engine
            .add_annotation(3, &NoteContent::new("first", "note"))
            .unwrap();

        // The server knows nothing about this document yet; the push
        // phase must still run
        let summary = engine.sync_annotations(&mut NullObserver).unwrap();
        assert_eq!(summary.pushed, 1);

        let pushes = engine.client.pushes.borrow();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].uuid, ours.uuid);
    }

    #[test]
    fn test_navigation_through_engine() {
        let temp_dir = TempDir::new().unwrap();
        let mut engine = engine_with(
            &temp_dir,
            MockService {
                userid: Some("u1".to_string()),
                ..MockService::default()
            },
        );

        let a = engine.add_annotation(2, &NoteContent::new("a", "")).unwrap();
        let b = engine.add_annotation(5, &NoteContent::new("b", "")).unwrap();
        let c = engine.add_annotation(9, &NoteContent::new("c", "")).unwrap();

        // Adding set the cursor to the last added annotation
        assert_eq!(engine.current_annotation().unwrap().id, c.id);

        // Cyclic wrap from the last annotation back to the first page
        assert_eq!(engine.next_annotation(9).unwrap().id, a.id);
        assert_eq!(engine.next_annotation(2).unwrap().id, b.id);
        assert_eq!(engine.prev_annotation(5).unwrap().id, a.id);

        // Deleting the current annotation clears the cursor
        engine.delete_annotation(2, a.id).unwrap();
        assert!(engine.current_annotation().is_none());
    }
}
