use std::collections::HashSet;

use chrono::{DateTime, Utc};
use shared::{
    domain::{MessageId, Role},
    protocol::Source,
};

pub const WELCOME_MESSAGE: &str =
    "Hi! Ask me about your documents or upload new ones to get started.";

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub sources: Vec<Source>,
    /// Position in the timeline, assigned on append.
    pub created_order: u64,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), Vec::new())
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self::new(Role::Assistant, content.into(), sources)
    }

    fn new(role: Role, content: String, sources: Vec<Source>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            sources,
            created_order: 0,
            created_at: Utc::now(),
        }
    }
}

/// Append-only, ordered log of conversation turns.
#[derive(Debug, Clone)]
pub struct Timeline {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl Timeline {
    /// A fresh conversation containing only the welcome message.
    pub fn new() -> Self {
        let mut timeline = Self {
            messages: Vec::new(),
            ids: HashSet::new(),
        };
        timeline.append(Message::assistant(WELCOME_MESSAGE, Vec::new()));
        timeline
    }

    /// Appends `message` and returns the new length. A message whose id is
    /// already present is given a fresh one.
    pub fn append(&mut self, mut message: Message) -> usize {
        while !self.ids.insert(message.id) {
            message.id = MessageId::new();
        }
        message.created_order = self.messages.len() as u64;
        self.messages.push(message);
        self.messages.len()
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_welcome_message() {
        let timeline = Timeline::new();
        assert_eq!(timeline.len(), 1);
        let welcome = &timeline.all()[0];
        assert_eq!(welcome.role, Role::Assistant);
        assert_eq!(welcome.content, WELCOME_MESSAGE);
        assert!(welcome.sources.is_empty());
        assert_eq!(welcome.created_order, 0);
    }

    #[test]
    fn append_preserves_order_and_assigns_positions() {
        let mut timeline = Timeline::new();
        assert_eq!(timeline.append(Message::user("first")), 2);
        assert_eq!(timeline.append(Message::assistant("second", Vec::new())), 3);

        let contents: Vec<_> = timeline.all().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![WELCOME_MESSAGE, "first", "second"]);
        let orders: Vec<_> = timeline.all().iter().map(|m| m.created_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn duplicate_ids_are_replaced() {
        let mut timeline = Timeline::new();
        let message = Message::user("again");
        timeline.append(message.clone());
        timeline.append(message.clone());

        let ids: HashSet<_> = timeline.all().iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), timeline.len());
        assert_eq!(timeline.last().map(|m| m.content.as_str()), Some("again"));
    }
}
