#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rostersync::adapters::booking::{ManifestLine, Ticket};
use rostersync::adapters::hr::{RemoteArea, RemoteEmployee, RemoteRoster};
use rostersync::adapters::{
    AdapterError, AdapterResult, Created, FetchFilter, ScheduleBuilder, SourceAdapter,
    SourceRecord, UpdateOutcome,
};
use rostersync::db::pool::DbPool;
use rostersync::errors::AppResult;
use rostersync::models::Roster;
use rostersync::utils::date::DateRange;
use std::env;
use std::fs;
use std::path::PathBuf;

pub fn rsync() -> Command {
    cargo_bin_cmd!("rostersync")
}

/// Create a unique test DB path inside the system temp dir and remove any existing file
pub fn setup_test_db(name: &str) -> String {
    let mut path: PathBuf = env::temp_dir();
    path.push(format!("{}_rostersync.sqlite", name));
    let db_path = path.to_string_lossy().to_string();
    fs::remove_file(&db_path).ok();
    db_path
}

/// Write `content` to a temp file and return its path
pub fn temp_file(name: &str, content: &str) -> String {
    let mut path: PathBuf = env::temp_dir();
    path.push(format!("{}_rostersync.json", name));
    fs::write(&path, content).expect("write temp file");
    path.to_string_lossy().to_string()
}

pub fn memory_db() -> DbPool {
    DbPool::open_in_memory().expect("in-memory db")
}

pub fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn range(from: NaiveDate, to: NaiveDate) -> DateRange {
    DateRange::new(from, to).unwrap()
}

// ---------------------------
// Fake HR system
// ---------------------------

/// Remote rows the fake HR system can store.
pub trait FakeRow: SourceRecord + Clone {
    fn row_id(&self) -> Option<String>;
    fn set_row_id(&mut self, id: String);
    fn scratch_value(&self) -> Option<String> {
        None
    }
}

impl FakeRow for RemoteArea {
    fn row_id(&self) -> Option<String> {
        self.id.clone()
    }
    fn set_row_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl FakeRow for RemoteEmployee {
    fn row_id(&self) -> Option<String> {
        Some(self.id.clone())
    }
    fn set_row_id(&mut self, id: String) {
        self.id = id;
    }
}

impl FakeRow for RemoteRoster {
    fn row_id(&self) -> Option<String> {
        self.id.clone()
    }
    fn set_row_id(&mut self, id: String) {
        self.id = Some(id);
    }
    fn scratch_value(&self) -> Option<String> {
        Some(self.comment.clone())
    }
}

/// In-memory HR system. Records every push it receives.
pub struct FakeHr<R> {
    pub rows: Vec<R>,
    pub created: Vec<R>,
    pub updated: Vec<R>,
    pub deleted: Vec<String>,
    pub fail_fetch: bool,
    pub fail_creates: bool,
    pub fail_updates: bool,
    next_id: usize,
}

impl<R: FakeRow> FakeHr<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Self {
            rows,
            created: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            fail_fetch: false,
            fail_creates: false,
            fail_updates: false,
            next_id: 0,
        }
    }

    pub fn pushes(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

impl<R: FakeRow> SourceAdapter for FakeHr<R> {
    type Record = R;

    fn name(&self) -> &str {
        "fake_hr"
    }

    fn fetch_collection(&mut self, filter: &FetchFilter) -> AdapterResult<Vec<R>> {
        if self.fail_fetch {
            return Err(AdapterError::Network("connection refused".into()));
        }
        Ok(self
            .rows
            .iter()
            .filter(|r| filter.accepts(r.record_date()))
            .cloned()
            .collect())
    }

    fn push_create(&mut self, records: &[R]) -> AdapterResult<Vec<Result<Created, String>>> {
        let mut out = Vec::new();
        for r in records {
            if self.fail_creates {
                out.push(Err("rejected".to_string()));
                continue;
            }
            self.next_id += 1;
            let id = format!("new-{}", self.next_id);
            let mut stored = r.clone();
            stored.set_row_id(id.clone());
            self.rows.push(stored.clone());
            self.created.push(stored);
            out.push(Ok(Created {
                id,
                scratch: r.scratch_value(),
            }));
        }
        Ok(out)
    }

    fn push_update(&mut self, records: &[R]) -> AdapterResult<UpdateOutcome> {
        let mut outcome = UpdateOutcome::default();
        for r in records {
            let id = r.row_id().unwrap_or_default();
            let pos = self.rows.iter().position(|x| x.row_id() == r.row_id());
            match pos {
                Some(i) if !self.fail_updates => {
                    self.rows[i] = r.clone();
                    self.updated.push(r.clone());
                    outcome.succeeded.push(id);
                }
                _ => outcome.failed.push(id),
            }
        }
        Ok(outcome)
    }

    fn push_delete(&mut self, ids: &[String]) -> AdapterResult<Vec<String>> {
        let mut done = Vec::new();
        for id in ids {
            let before = self.rows.len();
            self.rows.retain(|r| r.row_id().as_deref() != Some(id.as_str()));
            if self.rows.len() < before {
                self.deleted.push(id.clone());
                done.push(id.clone());
            }
        }
        Ok(done)
    }
}

/// Read-only source returning fixed rows.
pub struct FixedSource<R> {
    pub rows: Vec<R>,
    pub fail: bool,
}

impl<R> FixedSource<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Self { rows, fail: false }
    }
}

impl<R: SourceRecord + Clone> SourceAdapter for FixedSource<R> {
    type Record = R;

    fn name(&self) -> &str {
        "fixed"
    }

    fn fetch_collection(&mut self, filter: &FetchFilter) -> AdapterResult<Vec<R>> {
        if self.fail {
            return Err(AdapterError::Network("timeout".into()));
        }
        Ok(self
            .rows
            .iter()
            .filter(|r| filter.accepts(r.record_date()))
            .cloned()
            .collect())
    }
}

/// Desired rosters handed over as-is.
pub struct FixedSchedule(pub Vec<Roster>);

impl ScheduleBuilder for FixedSchedule {
    fn desired_rosters(&self, range: &DateRange) -> AppResult<Vec<Roster>> {
        Ok(self
            .0
            .iter()
            .filter(|r| range.contains_time(r.time_start.get()))
            .cloned()
            .collect())
    }
}

// ---------------------------
// Raw record builders
// ---------------------------

pub fn remote_area(id: &str, name: &str, sort_order: i64, modified: DateTime<Utc>) -> RemoteArea {
    RemoteArea {
        id: Some(id.to_string()),
        name: name.to_string(),
        colour: None,
        sort_order,
        modified,
    }
}

pub fn employee(id: &str, first: &str, last: &str, active: bool) -> RemoteEmployee {
    RemoteEmployee {
        id: id.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        display_name: None,
        active,
        mobile: None,
        email: None,
        modified: None,
    }
}

pub fn remote_roster(id: &str, employee_id: &str, area_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> RemoteRoster {
    RemoteRoster {
        id: Some(id.to_string()),
        employee_id: Some(employee_id.to_string()),
        area_id: Some(area_id.to_string()),
        start,
        end,
        breaks: Vec::new(),
        meal_break_mins: 0,
        open_shift: false,
        published: false,
        comment: String::new(),
        confirmed: true,
        warning: String::new(),
        creator_id: Some("integration".to_string()),
        modified: None,
    }
}

pub fn manifest_line(order: &str, item: Option<&str>, session: &str, start: DateTime<Utc>) -> ManifestLine {
    ManifestLine {
        order_number: order.to_string(),
        order_item_id: item.map(str::to_string),
        session_id: session.to_string(),
        session_type: "City Tour".to_string(),
        session_note: String::new(),
        start,
        end: start + chrono::Duration::hours(2),
        product: "City Tour".to_string(),
        pickup_location: "Central Station".to_string(),
        booking_name: "Jane Doe".to_string(),
        participants: "Jane Doe\nJohn Doe".to_string(),
        phone: "+1 555 0100".to_string(),
        quantity: "1 Couple".to_string(),
        notes: Vec::new(),
    }
}

pub fn ticket(performance: &str, customer: &str, start: DateTime<Utc>) -> Ticket {
    Ticket {
        performance_id: performance.to_string(),
        event_title: "Night Ride".to_string(),
        performance_start: start,
        customer_name: customer.to_string(),
        access_information: None,
    }
}
