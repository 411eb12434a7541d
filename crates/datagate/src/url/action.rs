use std::fmt;

/// What a request does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Insert,
    Upsert,
    Update,
    Patch,
    Delete,
    Move,
    GetAll,
    Search,
    GetOne,
    Changes,
    Wipe,
    Check,
    Summary,
    Inspect,
    Schema,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::Insert => "insert",
            Action::Upsert => "upsert",
            Action::Update => "update",
            Action::Patch => "patch",
            Action::Delete => "delete",
            Action::Move => "move",
            Action::GetAll => "getall",
            Action::Search => "search",
            Action::GetOne => "getone",
            Action::Changes => "changes",
            Action::Wipe => "wipe",
            Action::Check => "check",
            Action::Summary => "summary",
            Action::Inspect => "inspect",
            Action::Schema => "schema",
        }
    }

    /// Action named by the `_op` field of a write payload.
    pub fn from_op(op: &str) -> Option<Action> {
        Some(match op {
            "insert" => Action::Insert,
            "upsert" => Action::Upsert,
            "update" => Action::Update,
            "patch" => Action::Patch,
            "delete" => Action::Delete,
            "move" => Action::Move,
            _ => return None,
        })
    }

    /// The action part of scope names; `None` for actions that no scope
    /// grants.
    pub fn scope(self) -> Option<&'static str> {
        match self {
            Action::Summary => Some("search"),
            Action::Inspect | Action::Schema => None,
            action => Some(action.name()),
        }
    }

    pub fn is_read(self) -> bool {
        matches!(
            self,
            Action::GetAll | Action::Search | Action::GetOne | Action::Changes | Action::Summary
        )
    }

    /// Actions handled by the write stream.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Action::Insert
                | Action::Upsert
                | Action::Update
                | Action::Patch
                | Action::Delete
                | Action::Move
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
