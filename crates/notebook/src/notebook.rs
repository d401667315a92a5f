use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use ledgerkit_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, Event, ValueObject,
};

/// Notebook identifier (aggregate id).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotebookId(pub AggregateId);

impl NotebookId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for NotebookId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Write windows for the follow-up fields, both anchored at the instant the
/// name was registered.
///
/// Kept configurable so tests can compress the windows instead of relying on
/// the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePolicy {
    pub cause_window: Duration,
    pub details_window: Duration,
}

impl WritePolicy {
    pub const CAUSE_WINDOW_MS: i64 = 40;
    pub const DETAILS_WINDOW_MS: i64 = 6_040;
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            cause_window: Duration::milliseconds(Self::CAUSE_WINDOW_MS),
            details_window: Duration::milliseconds(Self::DETAILS_WINDOW_MS),
        }
    }
}

impl ValueObject for WritePolicy {}

/// One notebook record: a registered name plus its follow-up fields.
///
/// `cause` and `details` stay `None` until a successful in-window write;
/// readers see the defaults through [`Notebook::cause`] and
/// [`Notebook::details`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookEntry {
    pub registered_at: DateTime<Utc>,
    pub cause: Option<String>,
    pub cause_recorded_at: Option<DateTime<Utc>>,
    pub details: Option<String>,
    pub details_recorded_at: Option<DateTime<Utc>>,
}

impl NotebookEntry {
    fn new(registered_at: DateTime<Utc>) -> Self {
        Self {
            registered_at,
            cause: None,
            cause_recorded_at: None,
            details: None,
            details_recorded_at: None,
        }
    }
}

/// Aggregate root: a notebook of write-once entries.
///
/// Every name is registered at most once. Each entry's cause and details
/// accept a single write, valid only while the matching window (measured
/// from registration) is still open. A missed window is permanent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notebook {
    id: NotebookId,
    policy: WritePolicy,
    entries: BTreeMap<String, NotebookEntry>,
    version: u64,
}

impl Notebook {
    /// Cause reported for entries whose cause was never recorded in time.
    pub const DEFAULT_CAUSE: &'static str = "heart attack";
    /// Details reported for entries whose details were never recorded in time.
    pub const DEFAULT_DETAILS: &'static str = "";

    /// The notebook's rules, looked up 1-based via [`Notebook::rule`].
    pub const RULES: &'static [&'static str] = &[
        "The human whose name is written in this note shall die.",
        "If the cause of death is written within 40 milliseconds of writing the person's name, \
         it will happen.",
        "If the cause of death is not specified, the person will simply die of a heart attack.",
        "After writing the cause of death, details of the death should be written in the next \
         6 seconds and 40 milliseconds.",
    ];

    /// Create a notebook with the default write windows.
    pub fn new(id: NotebookId) -> Self {
        Self::with_policy(id, WritePolicy::default())
    }

    /// Create a notebook with an explicit write policy.
    pub fn with_policy(id: NotebookId, policy: WritePolicy) -> Self {
        Self {
            id,
            policy,
            entries: BTreeMap::new(),
            version: 0,
        }
    }

    /// Look up a rule by its 1-based number.
    pub fn rule(number: i32) -> DomainResult<&'static str> {
        if number == 0 {
            return Err(DomainError::invalid_argument(
                "Rule 0 doesn't exist, Rule's list starts from 1",
            ));
        }
        if number < 0 {
            return Err(DomainError::invalid_argument(
                "Rules number can't be a negative number or zero, Rule's list starts from 1",
            ));
        }
        Self::RULES.get(number as usize - 1).copied().ok_or_else(|| {
            DomainError::invalid_argument(format!(
                "Rule {number} doesn't exist, Rule's list ends at {}",
                Self::RULES.len()
            ))
        })
    }

    pub fn id_typed(&self) -> NotebookId {
        self.id
    }

    pub fn policy(&self) -> &WritePolicy {
        &self.policy
    }

    /// The full record for `name`, if registered.
    pub fn entry(&self, name: &str) -> Option<&NotebookEntry> {
        self.entries.get(name)
    }

    /// Whether `name` has been registered. Always false for the empty
    /// string, which can never register.
    pub fn is_name_written(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// The recorded cause for `name`, or the default when none was recorded
    /// in time. Unregistered names read as the default too.
    pub fn cause(&self, name: &str) -> &str {
        self.entries
            .get(name)
            .and_then(|entry| entry.cause.as_deref())
            .unwrap_or(Self::DEFAULT_CAUSE)
    }

    /// The recorded details for `name`, or the default empty string.
    pub fn details(&self, name: &str) -> &str {
        self.entries
            .get(name)
            .and_then(|entry| entry.details.as_deref())
            .unwrap_or(Self::DEFAULT_DETAILS)
    }
}

impl AggregateRoot for Notebook {
    type Id = NotebookId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterName.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterName {
    pub notebook_id: NotebookId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordCause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCause {
    pub notebook_id: NotebookId,
    pub name: String,
    pub cause: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordDetails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDetails {
    pub notebook_id: NotebookId,
    pub name: String,
    pub details: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotebookCommand {
    RegisterName(RegisterName),
    RecordCause(RecordCause),
    RecordDetails(RecordDetails),
}

/// Event: NameRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRegistered {
    pub notebook_id: NotebookId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CauseRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauseRecorded {
    pub notebook_id: NotebookId,
    pub name: String,
    pub cause: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DetailsRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailsRecorded {
    pub notebook_id: NotebookId,
    pub name: String,
    pub details: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotebookEvent {
    NameRegistered(NameRegistered),
    CauseRecorded(CauseRecorded),
    DetailsRecorded(DetailsRecorded),
}

impl Event for NotebookEvent {
    fn event_type(&self) -> &'static str {
        match self {
            NotebookEvent::NameRegistered(_) => "notebook.entry.registered",
            NotebookEvent::CauseRecorded(_) => "notebook.entry.cause_recorded",
            NotebookEvent::DetailsRecorded(_) => "notebook.entry.details_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            NotebookEvent::NameRegistered(e) => e.occurred_at,
            NotebookEvent::CauseRecorded(e) => e.occurred_at,
            NotebookEvent::DetailsRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Notebook {
    type Command = NotebookCommand;
    type Event = NotebookEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            NotebookEvent::NameRegistered(e) => {
                self.entries
                    .insert(e.name.clone(), NotebookEntry::new(e.occurred_at));
            }
            NotebookEvent::CauseRecorded(e) => {
                if let Some(entry) = self.entries.get_mut(&e.name) {
                    entry.cause = Some(e.cause.clone());
                    entry.cause_recorded_at = Some(e.occurred_at);
                }
            }
            NotebookEvent::DetailsRecorded(e) => {
                if let Some(entry) = self.entries.get_mut(&e.name) {
                    entry.details = Some(e.details.clone());
                    entry.details_recorded_at = Some(e.occurred_at);
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            NotebookCommand::RegisterName(cmd) => self.handle_register(cmd),
            NotebookCommand::RecordCause(cmd) => self.handle_record_cause(cmd),
            NotebookCommand::RecordDetails(cmd) => self.handle_record_details(cmd),
        }
    }
}

impl Notebook {
    fn ensure_notebook_id(&self, notebook_id: NotebookId) -> Result<(), DomainError> {
        if self.id != notebook_id {
            return Err(DomainError::invalid_argument("notebook_id mismatch"));
        }
        Ok(())
    }

    /// Target lookup shared by the follow-up writes.
    ///
    /// An entirely empty notebook keeps its historical message; a non-empty
    /// notebook with an unknown target is its own failure.
    fn target_entry(&self, name: &str) -> Result<&NotebookEntry, DomainError> {
        if self.entries.is_empty() {
            return Err(DomainError::invalid_state(
                "No name written in the deathnote yet!",
            ));
        }
        self.entries
            .get(name)
            .ok_or_else(|| DomainError::invalid_state(format!("name is not written: {name}")))
    }

    fn handle_register(&self, cmd: &RegisterName) -> Result<Vec<NotebookEvent>, DomainError> {
        self.ensure_notebook_id(cmd.notebook_id)?;

        if cmd.name.trim().is_empty() {
            return Err(DomainError::invalid_argument("name cannot be empty"));
        }
        if self.entries.contains_key(&cmd.name) {
            return Err(DomainError::invalid_state("name already written"));
        }

        Ok(vec![NotebookEvent::NameRegistered(NameRegistered {
            notebook_id: cmd.notebook_id,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_cause(&self, cmd: &RecordCause) -> Result<Vec<NotebookEvent>, DomainError> {
        self.ensure_notebook_id(cmd.notebook_id)?;
        let entry = self.target_entry(&cmd.name)?;

        // Frozen once set; a missed window is a no-op decision, not an error.
        if entry.cause.is_some() {
            return Ok(vec![]);
        }
        if cmd.occurred_at - entry.registered_at > self.policy.cause_window {
            return Ok(vec![]);
        }

        Ok(vec![NotebookEvent::CauseRecorded(CauseRecorded {
            notebook_id: cmd.notebook_id,
            name: cmd.name.clone(),
            cause: cmd.cause.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_details(
        &self,
        cmd: &RecordDetails,
    ) -> Result<Vec<NotebookEvent>, DomainError> {
        self.ensure_notebook_id(cmd.notebook_id)?;
        let entry = self.target_entry(&cmd.name)?;

        if entry.details.is_some() {
            return Ok(vec![]);
        }
        if cmd.occurred_at - entry.registered_at > self.policy.details_window {
            return Ok(vec![]);
        }

        Ok(vec![NotebookEvent::DetailsRecorded(DetailsRecorded {
            notebook_id: cmd.notebook_id,
            name: cmd.name.clone(),
            details: cmd.details.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

impl Notebook {
    fn execute(&mut self, command: &NotebookCommand) -> DomainResult<Vec<NotebookEvent>> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }

    /// Register `name` with `at` as its registration instant.
    pub fn register_name(
        &mut self,
        name: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let name = name.into();
        self.execute(&NotebookCommand::RegisterName(RegisterName {
            notebook_id: self.id,
            name: name.clone(),
            occurred_at: at,
        }))?;
        tracing::debug!(notebook_id = %self.id, name = %name, "name registered");
        Ok(())
    }

    /// Try to record the cause for `name` at instant `at`.
    ///
    /// Returns false (and changes nothing) when the cause is already set or
    /// its window has passed.
    pub fn record_cause(
        &mut self,
        name: &str,
        cause: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let events = self.execute(&NotebookCommand::RecordCause(RecordCause {
            notebook_id: self.id,
            name: name.to_string(),
            cause: cause.into(),
            occurred_at: at,
        }))?;
        let recorded = !events.is_empty();
        tracing::debug!(notebook_id = %self.id, name = %name, recorded, "cause write attempted");
        Ok(recorded)
    }

    /// Try to record the details for `name` at instant `at`.
    ///
    /// Returns false (and changes nothing) when the details are already set
    /// or their window has passed.
    pub fn record_details(
        &mut self,
        name: &str,
        details: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let events = self.execute(&NotebookCommand::RecordDetails(RecordDetails {
            notebook_id: self.id,
            name: name.to_string(),
            details: details.into(),
            occurred_at: at,
        }))?;
        let recorded = !events.is_empty();
        tracing::debug!(notebook_id = %self.id, name = %name, recorded, "details write attempted");
        Ok(recorded)
    }
}
