// SPDX-License-Identifier: MIT

//! Conversation memory for prompt augmentation

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryEntry {
    pub role: String,
    pub content: String,
}

/// Plain transcript kept by the caller and folded into the next prompt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationMemory {
    history: Vec<MemoryEntry>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.history.push(MemoryEntry {
            role: role.into(),
            content: content.into(),
        });
    }

    pub fn history(&self) -> &[MemoryEntry] {
        &self.history
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// `role: content` lines
    pub fn transcript(&self) -> String {
        self.history
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Wrap `user_input` with the transcript; unchanged when memory is empty
    pub fn augment(&self, user_input: &str) -> String {
        if self.is_empty() {
            return user_input.to_string();
        }
        format!(
            "Previous conversation:\n{}\n\nCurrent user input: {}\n\nPlease respond to the current input while considering the conversation history.",
            self.transcript(),
            user_input
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_memory_passes_input_through() {
        let memory = ConversationMemory::new();
        assert_eq!(memory.augment("What's my name?"), "What's my name?");
    }

    #[test]
    fn test_augment_includes_transcript() {
        let mut memory = ConversationMemory::new();
        memory.add_message("user", "My name is Alice.");
        memory.add_message("assistant", "Nice to meet you, Alice!");

        let prompt = memory.augment("What's my name?");
        assert!(prompt.starts_with("Previous conversation:\nuser: My name is Alice.\nassistant: Nice to meet you, Alice!"));
        assert!(prompt.contains("Current user input: What's my name?"));
    }
}
