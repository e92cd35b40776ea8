use std::collections::HashMap;

use crate::models::{Conversation, TranscriptRow};

/// Groups rows into one conversation per `conversation_id`, in first-seen order.
///
/// Utterances and responses are newline-joined in row order. `bot_name` and
/// `timestamp` come from the first row of each conversation; later rows are
/// not checked against them.
pub fn group_conversations(rows: &[TranscriptRow]) -> Vec<Conversation> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut conversations: Vec<Conversation> = Vec::new();

    for row in rows {
        match positions.get(row.conversation_id.as_str()) {
            Some(&index) => {
                let entry = &mut conversations[index];
                entry.utterance_text.push('\n');
                entry.utterance_text.push_str(&row.utterance);
                entry.response_text.push('\n');
                entry.response_text.push_str(&row.response);
            }
            None => {
                positions.insert(row.conversation_id.as_str(), conversations.len());
                conversations.push(Conversation {
                    conversation_id: row.conversation_id.clone(),
                    bot_name: row.bot_name.clone(),
                    timestamp: row.timestamp,
                    utterance_text: row.utterance.clone(),
                    response_text: row.response.clone(),
                });
            }
        }
    }

    conversations
}
