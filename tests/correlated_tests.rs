use rostersync::adapters::correlated::{CreateOutcome, create_correlated};
use rostersync::adapters::hr::RemoteRoster;
use rostersync::adapters::{
    AdapterError, AdapterResult, Created, FetchFilter, SourceAdapter, UpdateOutcome,
};

mod common;
use common::{FakeHr, remote_roster, ts};

/// HR fake whose bulk create answers out of order or short.
struct Unruly {
    hr: FakeHr<RemoteRoster>,
    reverse: bool,
    keep: Option<usize>,
    restore_call_fails: bool,
}

impl Unruly {
    fn new() -> Self {
        Self {
            hr: FakeHr::new(Vec::new()),
            reverse: false,
            keep: None,
            restore_call_fails: false,
        }
    }

    fn comment_of(&self, id: &str) -> String {
        self.hr
            .rows
            .iter()
            .find(|r| r.id.as_deref() == Some(id))
            .map(|r| r.comment.clone())
            .expect("row present")
    }
}

impl SourceAdapter for Unruly {
    type Record = RemoteRoster;

    fn name(&self) -> &str {
        "unruly_hr"
    }

    fn fetch_collection(&mut self, filter: &FetchFilter) -> AdapterResult<Vec<RemoteRoster>> {
        self.hr.fetch_collection(filter)
    }

    fn push_create(&mut self, records: &[RemoteRoster]) -> AdapterResult<Vec<Result<Created, String>>> {
        let mut results = self.hr.push_create(records)?;
        if self.reverse {
            results.reverse();
        }
        if let Some(n) = self.keep {
            results.truncate(n);
        }
        Ok(results)
    }

    fn push_update(&mut self, records: &[RemoteRoster]) -> AdapterResult<UpdateOutcome> {
        if self.restore_call_fails {
            return Err(AdapterError::Network("timeout".into()));
        }
        self.hr.push_update(records)
    }
}

fn shifts(comments: &[&str]) -> Vec<RemoteRoster> {
    comments
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let hour = 8 + i as u32;
            let mut r = remote_roster("", "emp-1", "area-1", ts(2030, 1, 10, hour, 0), ts(2030, 1, 10, hour + 2, 0));
            r.id = None;
            r.comment = c.to_string();
            r
        })
        .collect()
}

fn created(id: &str) -> CreateOutcome {
    CreateOutcome::Created { id: id.to_string() }
}

#[test]
fn reversed_results_are_matched_by_token() {
    let mut hr = Unruly::new();
    hr.reverse = true;

    let outcomes = create_correlated(&mut hr, &shifts(&["first", "second", "third"])).unwrap();
    assert_eq!(outcomes, vec![created("new-1"), created("new-2"), created("new-3")]);

    assert_eq!(hr.comment_of("new-1"), "first");
    assert_eq!(hr.comment_of("new-3"), "third");
}

#[test]
fn missing_results_fail_only_their_records() {
    let mut hr = Unruly::new();
    hr.reverse = true;
    hr.keep = Some(2);

    let outcomes = create_correlated(&mut hr, &shifts(&["first", "second", "third"])).unwrap();
    assert!(matches!(outcomes[0], CreateOutcome::Failed(_)));
    assert_eq!(outcomes[1], created("new-2"));
    assert_eq!(outcomes[2], created("new-3"));
    assert_eq!(hr.comment_of("new-2"), "second");
}

#[test]
fn rejected_restore_leaves_rows_unrestored() {
    let mut hr = Unruly::new();
    hr.hr.fail_updates = true;

    let outcomes = create_correlated(&mut hr, &shifts(&["first", "second"])).unwrap();
    assert!(outcomes.iter().all(|o| matches!(o, CreateOutcome::CreatedUnrestored { .. })));
    assert_eq!(outcomes[0].id(), Some("new-1"));
    assert_ne!(hr.comment_of("new-1"), "first");
}

#[test]
fn failed_restore_call_keeps_the_new_ids() {
    let mut hr = Unruly::new();
    hr.restore_call_fails = true;

    let outcomes = create_correlated(&mut hr, &shifts(&["first"])).unwrap();
    match &outcomes[0] {
        CreateOutcome::CreatedUnrestored { id, reason } => {
            assert_eq!(id, "new-1");
            assert!(reason.contains("timeout"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn empty_batch_makes_no_calls() {
    let mut hr = Unruly::new();
    assert!(create_correlated(&mut hr, &[]).unwrap().is_empty());
    assert_eq!(hr.hr.pushes(), 0);
}
