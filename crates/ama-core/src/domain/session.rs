//! Dialogue sessions and the input formats they are loaded from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{AmaError, Result};

/// User id used when neither the caller nor the input supplies one.
pub const DEFAULT_USER_ID: &str = "test_user";

/// Session id used when neither the caller nor the input supplies one.
pub const DEFAULT_SESSION_ID: &str = "session_1";

/// One speaker-tagged line of a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub speaker: Option<String>,
    pub content: String,
}

impl TranscriptLine {
    pub fn new(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            speaker: Some(speaker.into()),
            content: content.into(),
        }
    }

    /// Parse `speaker: content`. Lines without a plausible speaker prefix
    /// keep their full text as content.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if let Some((prefix, rest)) = line.split_once(':') {
            let speaker = prefix.trim();
            let is_speaker = !speaker.is_empty()
                && speaker.chars().count() <= 32
                && speaker
                    .chars()
                    .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.'))
                && (rest.is_empty() || rest.starts_with(char::is_whitespace));
            if is_speaker {
                return Self::new(speaker, rest.trim());
            }
        }
        Self {
            speaker: None,
            content: line.to_string(),
        }
    }

    pub fn render(&self) -> String {
        match &self.speaker {
            Some(speaker) => format!("{}: {}", speaker, self.content),
            None => self.content.clone(),
        }
    }
}

/// One dialogue session to evaluate. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueSession {
    pub user_id: String,
    pub session_id: String,
    pub transcript: Vec<TranscriptLine>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl DialogueSession {
    /// Build a session from newline-separated transcript text. Blank lines
    /// are dropped.
    pub fn from_text(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        text: &str,
    ) -> Result<Self> {
        let transcript: Vec<TranscriptLine> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(TranscriptLine::parse)
            .collect();
        if transcript.is_empty() {
            return Err(AmaError::InvalidDialogue("transcript is empty".to_string()));
        }
        Ok(Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            transcript,
            metadata: Map::new(),
        })
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// The transcript as newline-joined `speaker: content` lines.
    pub fn text(&self) -> String {
        self.transcript
            .iter()
            .map(TranscriptLine::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn line_count(&self) -> usize {
        self.transcript.len()
    }
}

/// Dialogue input as found on disk or inline, before ids are resolved.
///
/// Accepted shapes:
/// - a JSON array of turns, each with `role`|`speaker` and `content`|`text`
/// - a JSON object with a `session_dialogue` string, optionally carrying
///   `user_id`, `session_id` and `metadata`
/// - anything else, taken as plain transcript text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DialogueInput {
    pub transcript: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub metadata: Map<String, Value>,
}

impl DialogueInput {
    pub fn parse(raw: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(turns)) => Self::from_turns(&turns),
            Ok(Value::Object(obj)) if obj.contains_key("session_dialogue") => {
                Self::from_object(obj)
            }
            _ => Ok(Self {
                transcript: raw.to_string(),
                ..Self::default()
            }),
        }
    }

    fn from_turns(turns: &[Value]) -> Result<Self> {
        let mut lines = Vec::with_capacity(turns.len());
        for (idx, turn) in turns.iter().enumerate() {
            let Some(turn) = turn.as_object() else {
                return Err(AmaError::InvalidDialogue(format!(
                    "turn {idx} is not an object"
                )));
            };
            let field = |a: &str, b: &str| {
                turn.get(a)
                    .or_else(|| turn.get(b))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            let speaker = field("role", "speaker").unwrap_or_else(|| "user".to_string());
            let content = field("content", "text").unwrap_or_default();
            lines.push(format!("{speaker}: {content}"));
        }
        Ok(Self {
            transcript: lines.join("\n"),
            ..Self::default()
        })
    }

    fn from_object(mut obj: Map<String, Value>) -> Result<Self> {
        let transcript = match obj.remove("session_dialogue") {
            Some(Value::String(s)) => s,
            _ => {
                return Err(AmaError::InvalidDialogue(
                    "session_dialogue must be a string".to_string(),
                ))
            }
        };
        let text = |v: Option<Value>| match v {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
            _ => None,
        };
        let user_id = text(obj.remove("user_id"));
        let session_id = text(obj.remove("session_id"));
        let metadata = match obj.remove("metadata") {
            Some(Value::Object(m)) => m,
            _ => Map::new(),
        };
        Ok(Self {
            transcript,
            user_id,
            session_id,
            metadata,
        })
    }

    /// Resolve ids (explicit > embedded > default) and build the session.
    pub fn into_session(
        self,
        user_id: Option<String>,
        session_id: Option<String>,
    ) -> Result<DialogueSession> {
        let user_id = user_id
            .or(self.user_id)
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string());
        let session_id = session_id
            .or(self.session_id)
            .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());
        Ok(DialogueSession::from_text(user_id, session_id, &self.transcript)?
            .with_metadata(self.metadata))
    }
}
