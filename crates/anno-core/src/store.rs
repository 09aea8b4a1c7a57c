//! Local annotation store
//!
//! One `AnnotationStore` per open document. It owns all durable state:
//! the annotations table, the per-page highlights, the nickname→userid
//! cache, the tombstones for deletions, and the queue of owned deletions
//! awaiting a remote delete request. The in-memory annotation collection
//! is a cache of the persisted table for one filehash and is invalidated
//! and repopulated after every write.

use std::collections::{HashMap, HashSet};

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use crate::client::AnnotationService;
use crate::config::Config;
use crate::models::{epoch_now, Annotation, Highlight, NoteContent};
use crate::storage::{self, StoreError, StoreResult};

/// Descriptor of the document a store is scoped to
#[derive(Debug, Clone, Default)]
pub struct DocumentInfo {
    /// Content hash, the identity partition key
    pub filehash: String,
    /// Mime type of the source document
    pub mimetype: String,
    /// External target URL, empty when unknown
    pub target: String,
    /// Title of the document
    pub text_title: String,
    /// Author of the document
    pub text_creator: String,
}

/// Persistent, content-hash-scoped store of annotations and highlights
pub struct AnnotationStore {
    conn: Connection,
    info: DocumentInfo,
    /// Cached annotations for this filehash, ordered by page then id
    annotations: Vec<Annotation>,
    /// Page-keyed highlight cache
    highlights: HashMap<u32, Vec<Highlight>>,
}

impl AnnotationStore {
    /// Open the store for one document
    ///
    /// Provisions the database (installing the bundled seed if needed)
    /// and populates the caches. Fails with
    /// [`StoreError::MissingDatabase`] when neither the database nor a
    /// seed exists.
    pub fn open(config: &Config, info: DocumentInfo) -> StoreResult<Self> {
        let conn = storage::provision(&config.db_path(), config.seed_path.as_deref())?;

        let mut store = Self {
            conn,
            info,
            annotations: Vec::new(),
            highlights: HashMap::new(),
        };
        store.resync_cache()?;
        store.populate_highlights()?;
        Ok(store)
    }

    /// The document this store is scoped to
    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    /// All cached annotations for this document, ordered by page then id
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Annotations on one page, in cache order
    pub fn annotations_for_page(&self, page: u32) -> Vec<Annotation> {
        self.annotations
            .iter()
            .filter(|a| a.belongs_to_page(page))
            .cloned()
            .collect()
    }

    /// Look up a cached annotation by local id
    pub fn annotation_by_id(&self, id: i64) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    /// Next free local id: max existing id across all documents, plus one
    ///
    /// The counter deliberately spans every filehash in the table (the
    /// id space stays sparse per document, which old replicas observe).
    /// Scoping it per document would only require changing this method.
    pub fn next_id(&self) -> StoreResult<i64> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT id FROM annotations ORDER BY id DESC LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(max.map_or(0, |id| id + 1))
    }

    /// Create and persist a new locally-authored annotation
    ///
    /// `creator` may be empty when identity resolution has not completed;
    /// the uuid stays unassigned until [`adopt_orphans`] runs.
    ///
    /// [`adopt_orphans`]: AnnotationStore::adopt_orphans
    pub fn add_annotation(
        &mut self,
        page: u32,
        note: &NoteContent,
        creator: &str,
        color: &str,
    ) -> StoreResult<Annotation> {
        let now = epoch_now();
        let mut annotation = Annotation {
            id: self.next_id()?,
            filehash: self.info.filehash.clone(),
            page,
            title: note.title.clone(),
            body: note.body.clone(),
            body_url: String::new(),
            text_title: self.info.text_title.clone(),
            text_creator: self.info.text_creator.clone(),
            created: now,
            modified: now,
            creator: creator.to_string(),
            annotates: self.info.target.clone(),
            color: color.to_string(),
            local: true,
            mimetype: self.info.mimetype.clone(),
            uuid: String::new(),
            annotation_url: String::new(),
        };
        annotation.make_uuid();

        self.insert_row(&annotation)?;
        self.resync_cache()?;
        debug!("Added annotation {} on page {}", annotation.id, page);
        Ok(annotation)
    }

    /// Update title/body of an annotation, only if they actually changed
    ///
    /// Returns whether a write happened; `modified` is bumped only on an
    /// actual change.
    pub fn edit_annotation(&mut self, id: i64, note: &NoteContent) -> StoreResult<bool> {
        let current = self
            .annotation_by_id(id)
            .ok_or(StoreError::AnnotationNotFound { id })?;

        if current.title == note.title && current.body == note.body {
            return Ok(false);
        }

        self.conn.execute(
            "UPDATE annotations SET title = ?1, content = ?2, modified = ?3 WHERE id = ?4",
            params![note.title, note.body, epoch_now(), id],
        )?;
        self.resync_cache()?;
        Ok(true)
    }

    /// Delete an annotation from the local table
    ///
    /// Owned by the current user: the uuid is queued durably for a remote
    /// delete request on a later sync, which may run in another process;
    /// the tombstone will be written by the other replicas that see the
    /// delete arrive. Foreign: a tombstone is written immediately so a
    /// later sync cannot resurrect it. The local row goes away in both
    /// branches.
    pub fn delete_annotation(&mut self, id: i64, current_user: &str) -> StoreResult<()> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT uuid, creator FROM annotations WHERE md5 = ?1 AND id = ?2",
                params![self.info.filehash, id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (uuid, creator) = row.ok_or(StoreError::AnnotationNotFound { id })?;

        if !current_user.is_empty() && creator == current_user {
            if uuid.is_empty() {
                // Never pushed and never will be; nothing to tell the server
                debug!("Deleting unsynced annotation {}", id);
            } else {
                debug!("Scheduling annotation {} for remote deletion", uuid);
                self.conn.execute(
                    "INSERT OR IGNORE INTO pending_deletes (uuid) VALUES (?1)",
                    [&uuid],
                )?;
            }
        } else if !uuid.is_empty() {
            self.conn.execute(
                "INSERT INTO deleted_annotations (uuid) VALUES (?1)",
                [&uuid],
            )?;
        }

        self.conn.execute(
            "DELETE FROM annotations WHERE md5 = ?1 AND id = ?2",
            params![self.info.filehash, id],
        )?;
        self.resync_cache()?;
        Ok(())
    }

    /// Uuids that were deleted locally and must not resurrect
    pub fn tombstoned_uuids(&self) -> StoreResult<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT uuid FROM deleted_annotations")?;
        let uuids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(uuids)
    }

    /// Uuids awaiting a remote delete request
    ///
    /// The queue is durable: deletions issued in one process are drained
    /// by whichever later sync gets to them.
    pub fn pending_deletes(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT uuid FROM pending_deletes ORDER BY rowid")?;
        let uuids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(uuids)
    }

    /// Drop a uuid from the deletion queue after the server accepted it
    pub fn confirm_remote_delete(&mut self, uuid: &str) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM pending_deletes WHERE uuid = ?1", [uuid])?;
        Ok(())
    }

    /// Resolve the server user id for an opaque user string
    ///
    /// Consults the local cache first; on a miss (or an empty cached
    /// value) asks the remote client and caches the answer with
    /// insert-or-update semantics. A failed remote call leaves the id
    /// empty: the caller proceeds with degraded identity, never fails.
    pub fn resolve_user_id(
        &mut self,
        user_string: &str,
        client: &dyn AnnotationService,
    ) -> StoreResult<String> {
        let cached: Option<String> = self
            .conn
            .query_row(
                "SELECT userid FROM annuserid WHERE username = ?1",
                [user_string],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(ref userid) = cached {
            if !userid.is_empty() {
                debug!("User id found in cache");
                return Ok(userid.clone());
            }
        }

        let userid = match client.resolve_user_id(user_string) {
            Ok(id) => id,
            Err(e) => {
                warn!("User id resolution failed: {}", e);
                String::new()
            }
        };

        match cached {
            Some(_) => {
                self.conn.execute(
                    "UPDATE annuserid SET userid = ?1 WHERE username = ?2",
                    params![userid, user_string],
                )?;
            }
            None => {
                self.conn.execute(
                    "INSERT INTO annuserid (username, userid) VALUES (?1, ?2)",
                    params![user_string, userid],
                )?;
            }
        }
        Ok(userid)
    }

    /// Adopt annotations persisted before identity resolution completed
    ///
    /// Sets the creator and derives the uuid for every local annotation
    /// of this document that still has an empty creator. Returns how many
    /// rows were adopted.
    pub fn adopt_orphans(&mut self, user_id: &str) -> StoreResult<usize> {
        if user_id.is_empty() {
            return Ok(0);
        }

        let orphans: Vec<Annotation> = self
            .annotations
            .iter()
            .filter(|a| a.creator.is_empty())
            .cloned()
            .collect();

        for orphan in &orphans {
            let mut annotation = orphan.clone();
            annotation.creator = user_id.to_string();
            annotation.make_uuid();
            self.update_record(&annotation)?;
        }

        if !orphans.is_empty() {
            debug!("Adopted {} orphan annotations", orphans.len());
        }
        Ok(orphans.len())
    }

    /// Insert an annotation received from the remote store
    ///
    /// Assigns a fresh local id (the remote one is meaningless here) and
    /// returns it.
    pub fn insert_remote(&mut self, annotation: &Annotation) -> StoreResult<i64> {
        let mut record = annotation.clone();
        record.id = self.next_id()?;
        self.insert_row(&record)?;
        self.resync_cache()?;
        Ok(record.id)
    }

    /// Overwrite title/body/modified from a newer remote copy
    pub fn apply_remote_update(
        &mut self,
        id: i64,
        title: &str,
        body: &str,
        modified: f64,
    ) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE annotations SET title = ?1, content = ?2, modified = ?3 WHERE id = ?4",
            params![title, body, modified, id],
        )?;
        self.resync_cache()?;
        Ok(())
    }

    /// Persist a full annotation record by local id
    pub fn update_record(&mut self, annotation: &Annotation) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE annotations SET md5 = ?1, page = ?2, title = ?3, content = ?4, \
             bodyurl = ?5, texttitle = ?6, textcreator = ?7, created = ?8, \
             modified = ?9, creator = ?10, annotates = ?11, color = ?12, \
             local = ?13, mimetype = ?14, uuid = ?15, annotationurl = ?16 \
             WHERE id = ?17",
            params![
                annotation.filehash,
                annotation.page,
                annotation.title,
                annotation.body,
                annotation.body_url,
                annotation.text_title,
                annotation.text_creator,
                annotation.created,
                annotation.modified,
                annotation.creator,
                annotation.annotates,
                annotation.color,
                annotation.local as i64,
                annotation.mimetype,
                annotation.uuid,
                annotation.annotation_url,
                annotation.id,
            ],
        )?;
        self.resync_cache()?;
        Ok(())
    }

    // ==================== Highlights ====================

    /// Highlights on one page, lazily initializing an empty list
    pub fn highlights(&mut self, page: u32) -> &[Highlight] {
        self.highlights.entry(page).or_default()
    }

    /// Add a highlight to a page
    pub fn add_highlight(&mut self, page: u32, highlight: Highlight) -> StoreResult<()> {
        debug!("Adding highlight ({}, {}) on page {}", highlight.start, highlight.end, page);
        self.highlights.entry(page).or_default().push(highlight);
        self.conn.execute(
            "INSERT INTO highlights (md5, page, init_pos, end_pos) VALUES (?1, ?2, ?3, ?4)",
            params![self.info.filehash, page, highlight.start, highlight.end],
        )?;
        Ok(())
    }

    /// Remove a highlight by value equality on `(start, end)`
    ///
    /// An absent tuple is a caller bug (UI/state desync) and surfaces as
    /// [`StoreError::HighlightNotFound`].
    pub fn remove_highlight(&mut self, page: u32, highlight: Highlight) -> StoreResult<()> {
        let list = self.highlights.entry(page).or_default();
        let pos = list.iter().position(|h| *h == highlight).ok_or({
            StoreError::HighlightNotFound {
                page,
                start: highlight.start,
                end: highlight.end,
            }
        })?;
        list.remove(pos);

        self.conn.execute(
            "DELETE FROM highlights WHERE md5 = ?1 AND page = ?2 AND init_pos = ?3 \
             AND end_pos = ?4",
            params![self.info.filehash, page, highlight.start, highlight.end],
        )?;
        Ok(())
    }

    // ==================== Internal ====================

    fn insert_row(&self, annotation: &Annotation) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO annotations (id, md5, page, title, content, bodyurl, texttitle, \
             textcreator, created, modified, creator, annotates, color, local, mimetype, \
             uuid, annotationurl) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
             ?16, ?17)",
            params![
                annotation.id,
                annotation.filehash,
                annotation.page,
                annotation.title,
                annotation.body,
                annotation.body_url,
                annotation.text_title,
                annotation.text_creator,
                annotation.created,
                annotation.modified,
                annotation.creator,
                annotation.annotates,
                annotation.color,
                annotation.local as i64,
                annotation.mimetype,
                annotation.uuid,
                annotation.annotation_url,
            ],
        )?;
        Ok(())
    }

    /// Drop and repopulate the in-memory annotation cache
    fn resync_cache(&mut self) -> StoreResult<()> {
        let mut stmt = self.conn.prepare(
            "SELECT id, md5, page, title, content, bodyurl, texttitle, textcreator, \
             created, modified, creator, annotates, color, local, mimetype, uuid, \
             annotationurl FROM annotations WHERE md5 = ?1 ORDER BY page, id",
        )?;
        let annotations = stmt
            .query_map([&self.info.filehash], row_to_annotation)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        self.annotations = annotations;
        Ok(())
    }

    fn populate_highlights(&mut self) -> StoreResult<()> {
        let mut stmt = self.conn.prepare(
            "SELECT page, init_pos, end_pos FROM highlights WHERE md5 = ?1 ORDER BY page",
        )?;
        let rows = stmt
            .query_map([&self.info.filehash], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    Highlight::new(row.get(1)?, row.get(2)?),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        for (page, highlight) in rows {
            self.highlights.entry(page).or_default().push(highlight);
        }
        Ok(())
    }
}

fn row_to_annotation(row: &Row<'_>) -> rusqlite::Result<Annotation> {
    Ok(Annotation {
        id: row.get(0)?,
        filehash: row.get(1)?,
        page: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        body_url: row.get(5)?,
        text_title: row.get(6)?,
        text_creator: row.get(7)?,
        created: row.get(8)?,
        modified: row.get(9)?,
        creator: row.get(10)?,
        annotates: row.get(11)?,
        color: row.get(12)?,
        local: row.get::<_, i64>(13)? != 0,
        mimetype: row.get(14)?,
        uuid: row.get(15)?,
        annotation_url: row.get(16)?,
    })
}
