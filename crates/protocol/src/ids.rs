use uuid::Uuid;

/// Source of fresh document ids.
pub trait IdSource {
    fn next_id(&mut self) -> String;
}

/// Random v4 UUIDs in hyphenated form. Used for everything that is persisted.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn next_id(&mut self) -> String {
        new_id()
    }
}

/// Predictable ids (`{prefix}-1`, `{prefix}-2`, ...) for fixtures and dry runs.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self) -> String {
        let id = format!("{}-{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
