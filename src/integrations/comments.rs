//! Positional comment reconciliation shared by the tracker clients
//!
//! Trackers only offer per-comment edit and append, so a desired comment list
//! is applied by position: comment `i` of the tracker corresponds to entry `i`
//! of the desired list.

/// A single comment write against a tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentOp<'a, Id> {
    /// Replace the body of an existing comment
    Edit { id: Id, body: &'a str },
    /// Append a new comment
    Add { body: &'a str },
}

/// Plan the writes that turn `existing` (id, body) comments into `desired`.
///
/// Unchanged positions produce no op. Surplus existing comments are left in
/// place; comments are never deleted.
pub fn plan_comment_sync<'a, Id: Clone>(
    existing: &[(Id, String)],
    desired: &'a [String],
) -> Vec<CommentOp<'a, Id>> {
    let mut ops = Vec::new();

    for (index, body) in desired.iter().enumerate() {
        match existing.get(index) {
            Some((_, current)) if current == body => {}
            Some((id, _)) => ops.push(CommentOp::Edit {
                id: id.clone(),
                body: body.as_str(),
            }),
            None => ops.push(CommentOp::Add {
                body: body.as_str(),
            }),
        }
    }

    if existing.len() > desired.len() {
        tracing::debug!(
            surplus = existing.len() - desired.len(),
            "Tracker has more comments than desired, leaving surplus untouched"
        );
    }

    ops
}
