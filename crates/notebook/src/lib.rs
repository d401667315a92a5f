//! Notebook domain module (write-once named entries, event-sourced).
//!
//! This crate contains business rules for a notebook of write-once entries
//! whose follow-up fields (cause, details) accept a single write each, only
//! within a fixed window after the name is registered. Pure deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod notebook;

pub use notebook::{
    CauseRecorded, DetailsRecorded, NameRegistered, Notebook, NotebookCommand, NotebookEntry,
    NotebookEvent, NotebookId, RecordCause, RecordDetails, RegisterName, WritePolicy,
};
