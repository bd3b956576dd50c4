use artidash_protocol::{Bank, Character};
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything the client currently knows. Owned by the
/// [`Reconciler`](crate::Reconciler); consumers only ever see it behind an
/// `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Bumped once per apply step that changed something.
    #[serde(rename = "Rev")]
    pub rev: u64,
    #[serde(rename = "Characters")]
    pub characters: BTreeMap<String, Character>,
    /// `None` until the first bank-bearing message.
    #[serde(rename = "Bank")]
    pub bank: Option<Bank>,
}

impl Snapshot {
    pub fn character(&self, name: &str) -> Option<&Character> {
        self.characters.get(name)
    }

    /// Names in display order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.characters.keys().map(String::as_str)
    }

    pub fn bank(&self) -> Option<&Bank> {
        self.bank.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty() && self.bank.is_none()
    }
}
