//! Pure routing decisions shared by the handlers, kept free of any transport
//! type so they can be tested directly.

use crate::session::{ContentItem, SessionError};

/// What a compile request may do with the current queue snapshot.
#[derive(Debug, PartialEq)]
pub enum CompileGate {
    /// No active session; the user must `/start` first.
    NoSession,
    /// The queue is empty; the pipeline must not be invoked.
    NoItems,
    /// Run compilation over these items.
    Run(Vec<ContentItem>),
}

/// Decide whether a compile request may proceed. The pipeline is only ever
/// invoked through the `Run` arm, so an empty queue short-circuits here.
pub fn gate_compilation(snapshot: Result<Vec<ContentItem>, SessionError>) -> CompileGate {
    match snapshot {
        Err(_) => CompileGate::NoSession,
        Ok(items) if items.is_empty() => CompileGate::NoItems,
        Ok(items) => CompileGate::Run(items),
    }
}

/// A compiled document may only be delivered within the size cap. On a
/// rejection the caller keeps the queue untouched so the user can remove
/// items and retry.
pub fn within_size_cap(document_len: usize, cap: u64) -> bool {
    document_len as u64 <= cap
}

#[derive(Debug, PartialEq, Eq)]
pub enum AdminAccess {
    Granted,
    /// Refused without any feedback, so the panel cannot be probed for.
    SilentlyRefused,
}

/// Gate every admin entry point on an exact identity match.
pub fn admin_access(user_id: u64, admin_id: u64) -> AdminAccess {
    if user_id == admin_id {
        AdminAccess::Granted
    } else {
        AdminAccess::SilentlyRefused
    }
}
