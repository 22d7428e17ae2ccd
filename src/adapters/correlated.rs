//! Correlated bulk create.
//!
//! The HR bulk API does not reliably echo caller identifiers, so each record
//! is created with a random token in its scratch field. Results are matched
//! back by token (by position only when the counts agree), then a second call
//! restores the real scratch value on the newly assigned ids.

use super::{AdapterResult, SourceAdapter};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::HashMap;
use tracing::{debug, warn};

const TOKEN_PREFIX: &str = "sync-token:";
const TOKEN_LEN: usize = 20;

/// A raw record with a free-text field that can carry a correlation token.
pub trait Correlated: Clone {
    fn scratch(&self) -> &str;
    fn set_scratch(&mut self, value: String);
    fn set_external_id(&mut self, id: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created { id: String },
    /// Created, but the scratch field still holds the token.
    CreatedUnrestored { id: String, reason: String },
    Failed(String),
}

impl CreateOutcome {
    pub fn id(&self) -> Option<&str> {
        match self {
            CreateOutcome::Created { id } | CreateOutcome::CreatedUnrestored { id, .. } => {
                Some(id)
            }
            CreateOutcome::Failed(_) => None,
        }
    }
}

fn new_token() -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect();
    format!("{TOKEN_PREFIX}{token}")
}

/// Create `records` remotely. Returns one outcome per record, in order.
/// Only a failure of the create call itself is an `Err`.
pub fn create_correlated<A>(adapter: &mut A, records: &[A::Record]) -> AdapterResult<Vec<CreateOutcome>>
where
    A: SourceAdapter,
    A::Record: Correlated,
{
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let tokens: Vec<String> = records.iter().map(|_| new_token()).collect();
    let tokenized: Vec<A::Record> = records
        .iter()
        .zip(&tokens)
        .map(|(r, t)| {
            let mut r = r.clone();
            r.set_scratch(t.clone());
            r
        })
        .collect();

    let results = adapter.push_create(&tokenized)?;

    // 1) correlate results back to submitted records
    let by_token: HashMap<&str, usize> = tokens
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_str(), i))
        .collect();
    let positional = results.len() == records.len();
    if !positional {
        warn!(
            adapter = adapter.name(),
            submitted = records.len(),
            returned = results.len(),
            "bulk create returned a different row count, matching by token only"
        );
    }

    let mut outcomes: Vec<Option<CreateOutcome>> = vec![None; records.len()];
    for (pos, result) in results.into_iter().enumerate() {
        match result {
            Ok(created) => {
                let index = created
                    .scratch
                    .as_deref()
                    .and_then(|s| by_token.get(s).copied())
                    .or(positional.then_some(pos));
                match index {
                    Some(i) if outcomes[i].is_none() => {
                        outcomes[i] = Some(CreateOutcome::Created { id: created.id });
                    }
                    _ => warn!(id = %created.id, "created row could not be correlated"),
                }
            }
            Err(reason) => {
                if positional && outcomes[pos].is_none() {
                    outcomes[pos] = Some(CreateOutcome::Failed(reason));
                } else {
                    warn!(%reason, "create failure could not be correlated");
                }
            }
        }
    }

    // 2) restore the real scratch value on every created row
    let restores: Vec<A::Record> = outcomes
        .iter()
        .zip(records)
        .filter_map(|(o, r)| match o {
            Some(CreateOutcome::Created { id }) => {
                let mut r = r.clone();
                r.set_external_id(id);
                Some(r)
            }
            _ => None,
        })
        .collect();

    if !restores.is_empty() {
        debug!(count = restores.len(), "restoring scratch field on created rows");
        match adapter.push_update(&restores) {
            Ok(update) => {
                for o in outcomes.iter_mut() {
                    if let Some(CreateOutcome::Created { id }) = o
                        && update.failed.contains(id)
                    {
                        let id = id.clone();
                        *o = Some(CreateOutcome::CreatedUnrestored {
                            id,
                            reason: "restore update failed".into(),
                        });
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "restore update failed");
                for o in outcomes.iter_mut() {
                    if let Some(CreateOutcome::Created { id }) = o {
                        let id = id.clone();
                        *o = Some(CreateOutcome::CreatedUnrestored {
                            id,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    Ok(outcomes
        .into_iter()
        .map(|o| o.unwrap_or_else(|| CreateOutcome::Failed("no matching create result".into())))
        .collect())
}
