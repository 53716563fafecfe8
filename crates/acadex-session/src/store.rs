//! The authoritative store seam.
//!
//! All consistency in Acadex rests here: clients run independent timers and
//! hold push subscriptions, and nothing coordinates them except the store's
//! transactional guarantees.
//!
//! - **Active slot**: a partial unique index `institute → active session`.
//!   `start_session` deactivates the previous holder and inserts the new
//!   session in one transaction, so concurrent starts for the same
//!   institute serialize.
//! - **Attendance**: a unique index on `(session, student)`. A second insert
//!   fails with [`StoreError::UniqueViolation`] no matter how the callers
//!   interleave.
//! - **Change log**: every committed write appends a [`StoreChange`] with a
//!   strictly increasing revision, emitted while the transaction still holds
//!   the writer lock, so every subscriber sees the same total order.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use acadex_protocol::{
    AttendanceRecord, FeedItem, GeoPoint, InstituteId, Session, SessionId, StudentId, TeacherId,
    Topic,
};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};

use crate::StoreError;

/// Fields for a session about to be started.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub institute_id: InstituteId,
    pub teacher_id: TeacherId,
    pub teacher_name: Option<String>,
    pub subject: String,
    pub department: String,
    pub geofence: GeoPoint,
    pub started_at: DateTime<Utc>,
}

/// Result of a committed `start_session` transaction.
#[derive(Debug, Clone)]
pub struct SessionStart {
    /// The new, active session.
    pub session: Session,
    /// The institute's previously active session, now deactivated.
    pub superseded: Option<Session>,
}

/// Result of `end_session`.
#[derive(Debug, Clone, PartialEq)]
pub enum EndOutcome {
    /// The session was active and has been closed.
    Ended(Session),
    /// The session was already inactive; nothing changed.
    AlreadyInactive(Session),
}

impl EndOutcome {
    pub fn session(&self) -> &Session {
        match self {
            Self::Ended(s) | Self::AlreadyInactive(s) => s,
        }
    }
}

/// What a committed write changed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    SessionActivated(Session),
    /// Ended explicitly or superseded by a newer session.
    SessionDeactivated(Session),
    AttendanceAdded(AttendanceRecord),
}

/// One entry of the ordered change log.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub revision: u64,
    pub kind: ChangeKind,
}

/// The documents of a topic as of `revision`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub revision: u64,
    pub items: Vec<FeedItem>,
}

/// Persistence for sessions and attendance.
///
/// Implementations must provide the two unique indexes and the ordered
/// change log described in the module docs. Methods return `Send` futures
/// so callers can hold a store inside spawned tasks.
pub trait AttendanceStore: Send + Sync + 'static {
    /// Atomically supersede the institute's active session (if any) and
    /// insert `new` as the active one. Also bumps the institute's class
    /// counter for the session's department.
    fn start_session(
        &self,
        new: NewSession,
    ) -> impl Future<Output = Result<SessionStart, StoreError>> + Send;

    /// Mark a session inactive.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no such session exists.
    fn end_session(
        &self,
        session_id: SessionId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<EndOutcome, StoreError>> + Send;

    fn session(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    fn active_session(
        &self,
        institute_id: &InstituteId,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Insert a record if its session is still active and the
    /// `(session, student)` key is free. Both checks run inside the write.
    fn insert_attendance(
        &self,
        record: AttendanceRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Records of one session in insertion order.
    fn session_attendance(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<Vec<AttendanceRecord>, StoreError>> + Send;

    /// A student's records within an institute, newest first.
    fn student_attendance(
        &self,
        institute_id: &InstituteId,
        student_id: &StudentId,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<AttendanceRecord>, StoreError>> + Send;

    /// How many sessions have been started for a department.
    fn class_count(
        &self,
        institute_id: &InstituteId,
        department: &str,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Current documents of `topic` and the revision they reflect.
    fn snapshot(
        &self,
        topic: &Topic,
    ) -> impl Future<Output = Result<Snapshot, StoreError>> + Send;

    /// Every change committed after this call, in revision order.
    fn subscribe_changes(
        &self,
    ) -> impl Future<Output = mpsc::UnboundedReceiver<StoreChange>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    sessions: HashMap<SessionId, Session>,
    /// Partial unique index: only sessions with `is_active = true`.
    active_by_institute: HashMap<InstituteId, SessionId>,
    records: HashMap<SessionId, Vec<AttendanceRecord>>,
    /// Unique index on `(session_id, student_id)`.
    attendance_keys: HashSet<(SessionId, StudentId)>,
    class_counts: HashMap<(InstituteId, String), u64>,
    revision: u64,
    watchers: Vec<mpsc::UnboundedSender<StoreChange>>,
}

impl Tables {
    fn emit(&mut self, kind: ChangeKind) {
        self.revision += 1;
        let change = StoreChange {
            revision: self.revision,
            kind,
        };
        self.watchers.retain(|tx| tx.send(change.clone()).is_ok());
    }

    fn active_count(&self, institute_id: &InstituteId) -> usize {
        self.sessions
            .values()
            .filter(|s| s.is_active && &s.institute_id == institute_id)
            .count()
    }
}

/// An in-memory [`AttendanceStore`].
///
/// A single `tokio::sync::Mutex` is the writer lock: each method body is one
/// transaction. Reads go through the same lock, so an `end_session` is
/// visible to the very next `session` call.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while set, every call fails with
    /// [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store offline".into()))
        } else {
            Ok(())
        }
    }
}

fn invariant_violation(detail: String) -> StoreError {
    tracing::error!(critical = true, %detail, "store invariant violated");
    StoreError::InvariantViolation(detail)
}

impl AttendanceStore for MemoryStore {
    async fn start_session(&self, new: NewSession) -> Result<SessionStart, StoreError> {
        self.check_online()?;
        let mut t = self.tables.lock().await;

        let superseded = match t.active_by_institute.remove(&new.institute_id) {
            Some(prev_id) => {
                let prev = t.sessions.get_mut(&prev_id).ok_or_else(|| {
                    invariant_violation(format!("active index points at missing session {prev_id}"))
                })?;
                if !prev.is_active {
                    return Err(invariant_violation(format!(
                        "active index points at inactive session {prev_id}"
                    )));
                }
                prev.is_active = false;
                prev.ended_at = Some(new.started_at);
                Some(prev.clone())
            }
            None => None,
        };

        let leftover = t.active_count(&new.institute_id);
        if leftover > 0 {
            return Err(invariant_violation(format!(
                "{leftover} active session(s) outside the index for institute {}",
                new.institute_id
            )));
        }

        let session = Session {
            id: SessionId::new(),
            institute_id: new.institute_id,
            teacher_id: new.teacher_id,
            teacher_name: new.teacher_name,
            subject: new.subject,
            department: new.department,
            started_at: new.started_at,
            ended_at: None,
            is_active: true,
            geofence: new.geofence,
        };

        t.sessions.insert(session.id, session.clone());
        t.active_by_institute
            .insert(session.institute_id.clone(), session.id);
        *t.class_counts
            .entry((session.institute_id.clone(), session.department.clone()))
            .or_default() += 1;

        if let Some(prev) = &superseded {
            t.emit(ChangeKind::SessionDeactivated(prev.clone()));
        }
        t.emit(ChangeKind::SessionActivated(session.clone()));

        Ok(SessionStart {
            session,
            superseded,
        })
    }

    async fn end_session(
        &self,
        session_id: SessionId,
        at: DateTime<Utc>,
    ) -> Result<EndOutcome, StoreError> {
        self.check_online()?;
        let mut t = self.tables.lock().await;

        let session = t
            .sessions
            .get_mut(&session_id)
            .ok_or(StoreError::NotFound(session_id))?;
        if !session.is_active {
            return Ok(EndOutcome::AlreadyInactive(session.clone()));
        }
        session.is_active = false;
        session.ended_at = Some(at);
        let ended = session.clone();

        if t.active_by_institute.get(&ended.institute_id) == Some(&session_id) {
            t.active_by_institute.remove(&ended.institute_id);
        }
        t.emit(ChangeKind::SessionDeactivated(ended.clone()));

        Ok(EndOutcome::Ended(ended))
    }

    async fn session(&self, session_id: SessionId) -> Result<Option<Session>, StoreError> {
        self.check_online()?;
        Ok(self.tables.lock().await.sessions.get(&session_id).cloned())
    }

    async fn active_session(
        &self,
        institute_id: &InstituteId,
    ) -> Result<Option<Session>, StoreError> {
        self.check_online()?;
        let t = self.tables.lock().await;
        Ok(t.active_by_institute
            .get(institute_id)
            .and_then(|id| t.sessions.get(id))
            .cloned())
    }

    async fn insert_attendance(&self, record: AttendanceRecord) -> Result<(), StoreError> {
        self.check_online()?;
        let mut t = self.tables.lock().await;

        let session = t
            .sessions
            .get(&record.session_id)
            .ok_or(StoreError::NotFound(record.session_id))?;
        if !session.is_active {
            return Err(StoreError::Inactive(record.session_id));
        }

        let key = (record.session_id, record.student_id.clone());
        if !t.attendance_keys.insert(key) {
            return Err(StoreError::UniqueViolation {
                session_id: record.session_id,
                student_id: record.student_id,
            });
        }

        t.records
            .entry(record.session_id)
            .or_default()
            .push(record.clone());
        t.emit(ChangeKind::AttendanceAdded(record));
        Ok(())
    }

    async fn session_attendance(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.check_online()?;
        let t = self.tables.lock().await;
        Ok(t.records.get(&session_id).cloned().unwrap_or_default())
    }

    async fn student_attendance(
        &self,
        institute_id: &InstituteId,
        student_id: &StudentId,
        limit: Option<usize>,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.check_online()?;
        let t = self.tables.lock().await;
        let mut found: Vec<AttendanceRecord> = t
            .records
            .values()
            .flatten()
            .filter(|r| &r.institute_id == institute_id && &r.student_id == student_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.marked_at.cmp(&a.marked_at));
        if let Some(limit) = limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn class_count(
        &self,
        institute_id: &InstituteId,
        department: &str,
    ) -> Result<u64, StoreError> {
        self.check_online()?;
        let t = self.tables.lock().await;
        Ok(t.class_counts
            .get(&(institute_id.clone(), department.to_owned()))
            .copied()
            .unwrap_or(0))
    }

    async fn snapshot(&self, topic: &Topic) -> Result<Snapshot, StoreError> {
        self.check_online()?;
        let t = self.tables.lock().await;
        let items = match topic {
            Topic::ActiveSession { institute_id } => t
                .active_by_institute
                .get(institute_id)
                .and_then(|id| t.sessions.get(id))
                .map(|s| vec![FeedItem::Session(s.clone())])
                .unwrap_or_default(),
            Topic::Attendance { session_id } => t
                .records
                .get(session_id)
                .map(|rs| rs.iter().cloned().map(FeedItem::Attendance).collect())
                .unwrap_or_default(),
        };
        Ok(Snapshot {
            revision: t.revision,
            items,
        })
    }

    async fn subscribe_changes(&self) -> mpsc::UnboundedReceiver<StoreChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tables.lock().await.watchers.push(tx);
        rx
    }
}
