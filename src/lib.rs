pub mod model;
pub mod error;
pub mod server;
pub mod parser;
pub mod manager;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use chrono::{DateTime, Datelike, FixedOffset};
use crate::error::StoreError;
use crate::model::Face;

struct Inner {
    faces: HashMap<u64, Face>,
    next_id: u64,
}

/// In-memory face store. Safe to share between request handlers.
///
/// One mutex covers both the face map and the id counter, so every method is
/// a single atomic step relative to all others. Reads hand out clones.
pub struct FaceStore {
    inner: Mutex<Inner>,
}

impl fmt::Debug for FaceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("FaceStore")
        .field("face_count", &inner.faces.len())
        .field("next_id", &inner.next_id)
        .finish()
    }
}

impl Default for FaceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                faces: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    // Critical sections never leave `Inner` half-written, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a new face and returns its id. Ids are never reissued.
    pub fn create(&self, text: &str, tags: &[String], due: DateTime<FixedOffset>) -> u64 {
        let mut inner = self.lock();

        let id = inner.next_id;
        let face = Face {
            id,
            text: text.to_string(),
            tags: tags.to_vec(),
            due,
        };
        inner.faces.insert(id, face);
        inner.next_id += 1;

        tracing::debug!(id, "face created");
        id
    }

    pub fn get(&self, id: u64) -> Result<Face, StoreError> {
        let inner = self.lock();
        inner.faces.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    pub fn delete(&self, id: u64) -> Result<(), StoreError> {
        let mut inner = self.lock();
        match inner.faces.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id)),
        }
    }

    /// Drops every face. The id counter keeps going.
    pub fn delete_all(&self) {
        let mut inner = self.lock();
        let dropped = inner.faces.len();
        inner.faces = HashMap::new();
        tracing::debug!(dropped, "all faces deleted");
    }

    /// All faces, in arbitrary order.
    pub fn list_all(&self) -> Vec<Face> {
        let inner = self.lock();
        inner.faces.values().cloned().collect()
    }

    /// Faces carrying `tag` (exact, case-sensitive), in arbitrary order.
    pub fn list_by_tag(&self, tag: &str) -> Vec<Face> {
        let inner = self.lock();
        inner
        .faces
        .values()
        .filter(|face| face.tags.iter().any(|t| t == tag))
        .cloned()
        .collect()
    }

    /// Faces due on the given calendar day, in arbitrary order.
    ///
    /// The date is read in each face's own offset; nothing is converted to UTC.
    pub fn list_by_due_date(&self, year: i32, month: u32, day: u32) -> Vec<Face> {
        let inner = self.lock();
        inner
        .faces
        .values()
        .filter(|face| {
            let date = face.due.date_naive();
            date.year() == year && date.month() == month && date.day() == day
        })
        .cloned()
        .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
