//! Core models for the rebloom library
//!
//! This module contains the core data types and transition logic for the
//! gamification model: tasks, user stats, and the chat transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// Re-export the garden stage derivation from the garden module
pub use crate::garden::{stage_for, GardenStage};

/// Opening message seeded into every fresh transcript.
pub const WELCOME_MESSAGE: &str = "Hello! How has your day been? If anything feels \
heavy or is weighing on your mind, tell me about it. I'm here to listen.";

/// Task categories a micro-habit can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[clap(rename_all = "lowercase")]
pub enum Category {
    Study,
    Life,
    Social,
    Health,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Category::Study => "study",
            Category::Life => "life",
            Category::Social => "social",
            Category::Health => "health",
        };
        write!(f, "{}", label)
    }
}

/// Task difficulty, the sole determinant of a task's XP value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[clap(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// XP awarded for completing a task of this difficulty. Fixed table,
    /// never stored on the task itself.
    pub fn xp_value(&self) -> u32 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 20,
            Difficulty::Hard => 30,
        }
    }

    /// Sanitizes an untrusted difficulty tag from a generation result.
    /// Anything outside the known set is coerced to `Easy` before a task
    /// record is constructed.
    pub fn coerce(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "medium" => Difficulty::Medium,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Easy,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        write!(f, "{}", label)
    }
}

/// A single user-facing micro-action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    id: String,
    text: String,
    category: Category,
    difficulty: Difficulty,
    completed: bool,
}

impl Task {
    /// Creates a new incomplete task with a fresh id
    pub fn new(text: String, category: Category, difficulty: Difficulty) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            category,
            difficulty,
            completed: false,
        }
    }

    /// Gets the task's stable identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets the task description
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Gets the task category
    pub fn category(&self) -> Category {
        self.category
    }

    /// Gets the task difficulty
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Checks if this task is completed
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Flips the completion flag, returning the new state
    pub(crate) fn toggle(&mut self) -> bool {
        self.completed = !self.completed;
        self.completed
    }
}

/// Progression counters for the single user session.
///
/// Invariant: `level >= 1` and `0 <= xp < level * 100` after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    level: u32,
    xp: u32,
    streak: u32,
    tasks_completed: u32,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            streak: 0,
            tasks_completed: 0,
        }
    }
}

impl UserStats {
    /// Gets the current level (monotonically non-decreasing)
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Gets the XP accumulated within the current level
    pub fn xp(&self) -> u32 {
        self.xp
    }

    /// XP required to reach the next level
    pub fn next_level_xp(&self) -> u32 {
        self.level * 100
    }

    /// Gets the externally maintained streak counter
    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Gets the running count of completed tasks
    pub fn tasks_completed(&self) -> u32 {
        self.tasks_completed
    }

    /// Applies an XP delta.
    ///
    /// Positive deltas process at most one level-up per call, subtracting the
    /// pre-increment level's threshold. This is safe because a single task is
    /// worth at most 30 XP against a threshold of at least 100, so a toggle
    /// can never cross two thresholds at once.
    ///
    /// Negative deltas clamp at 0 and never demote: leveling is a one-way
    /// ratchet, and an undone completion only refunds XP within the current
    /// level.
    pub(crate) fn apply_xp(&mut self, delta: i64) {
        let raw = i64::from(self.xp) + delta;
        if delta > 0 {
            let threshold = i64::from(self.level) * 100;
            if raw >= threshold {
                self.level += 1;
                self.xp = (raw - threshold) as u32;
            } else {
                self.xp = raw as u32;
            }
        } else {
            self.xp = raw.max(0) as u32;
        }
    }

    /// Records a task completion: awards XP and bumps the counter
    pub(crate) fn record_completion(&mut self, xp: u32) {
        self.apply_xp(i64::from(xp));
        self.tasks_completed += 1;
    }

    /// Records an undone completion: refunds XP (within the current level)
    /// and decrements the counter, floored at 0
    pub(crate) fn record_uncompletion(&mut self, xp: u32) {
        self.apply_xp(-i64::from(xp));
        self.tasks_completed = self.tasks_completed.saturating_sub(1);
    }

    /// Sets the externally maintained streak counter
    pub(crate) fn set_streak(&mut self, days: u32) {
        self.streak = days;
    }

    #[cfg(test)]
    pub(crate) fn with(level: u32, xp: u32, streak: u32, tasks_completed: u32) -> Self {
        Self {
            level,
            xp,
            streak,
            tasks_completed,
        }
    }
}

/// Who authored a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// A single entry in the append-only chat transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    id: String,
    role: Role,
    text: String,
    timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub(crate) fn new(role: Role, text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text,
            timestamp: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// A `{role, text}` projection of a chat message, forwarded to the coaching
/// provider as conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl From<&ChatMessage> for ChatTurn {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role,
            text: msg.text.clone(),
        }
    }
}

/// Represents a single state transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub details: Option<String>,
}

impl TransitionLogEntry {
    pub fn new(action: String, details: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            details,
        }
    }
}

// Define the maximum size for the transition log buffer
const MAX_HISTORY_SIZE: usize = 20;

/// The single user session: task store, stats, and chat transcript.
///
/// All mutation goes through the transition methods; callers hold read-only
/// views of everything else.
pub struct Session {
    tasks: Vec<Task>,
    stats: UserStats,
    transcript: Vec<ChatMessage>,
    history: VecDeque<TransitionLogEntry>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates a fresh session with empty stores and a seeded welcome message
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            stats: UserStats::default(),
            transcript: vec![ChatMessage::new(Role::Model, WELCOME_MESSAGE.to_string())],
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    /// Logs a state transition, maintaining the history buffer size.
    fn log_transition(&mut self, action: String, details: Option<String>) {
        if self.history.len() == MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history
            .push_back(TransitionLogEntry::new(action, details));
    }

    // Task transitions

    /// Toggles the completion flag of the task with the given id and applies
    /// the resulting XP delta to the stats.
    ///
    /// Returns `Some(new_completed_state)` on success. An unknown id is a
    /// silent no-op: `None`, no state change, no error signaled.
    pub fn toggle_task(&mut self, id: &str) -> SessionResponse<Option<bool>> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id() == id) else {
            tracing::debug!(task_id = id, "toggle ignored: unknown task id");
            return SessionResponse::of(None, &self.stats);
        };

        let completed = task.toggle();
        let xp = task.difficulty().xp_value();
        if completed {
            self.stats.record_completion(xp);
        } else {
            self.stats.record_uncompletion(xp);
        }

        self.log_transition(
            "toggle_task".to_string(),
            Some(format!(
                "Task {} now {} ({}{} XP)",
                id,
                if completed { "completed" } else { "incomplete" },
                if completed { "+" } else { "-" },
                xp
            )),
        );

        SessionResponse::of(Some(completed), &self.stats)
    }

    /// Appends a batch of tasks to the end of the store, preserving insertion
    /// order. No deduplication.
    pub fn add_tasks(&mut self, new_tasks: Vec<Task>) -> SessionResponse<usize> {
        let added = new_tasks.len();
        self.log_transition(
            "add_tasks".to_string(),
            Some(format!("Appended {} task(s)", added)),
        );
        self.tasks.extend(new_tasks);
        SessionResponse::of(added, &self.stats)
    }

    // Transcript transitions

    /// Appends a message to the transcript, returning a clone of the stored
    /// record. The transcript is append-only; messages are never mutated.
    pub fn append_message(&mut self, role: Role, text: String) -> SessionResponse<ChatMessage> {
        let message = ChatMessage::new(role, text);
        self.log_transition(
            "append_message".to_string(),
            Some(format!("{:?} message {}", role, message.id())),
        );
        self.transcript.push(message.clone());
        SessionResponse::of(message, &self.stats)
    }

    /// Sets the externally maintained streak counter
    pub fn set_streak(&mut self, days: u32) -> SessionResponse<()> {
        self.stats.set_streak(days);
        self.log_transition("set_streak".to_string(), Some(format!("{} day(s)", days)));
        SessionResponse::of((), &self.stats)
    }

    // Read-only views

    /// Gets the ordered task store
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Gets the current stats
    pub fn stats(&self) -> &UserStats {
        &self.stats
    }

    /// Gets the chat transcript in append order
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Projects the transcript into `{role, text}` turns for the coaching
    /// provider
    pub fn chat_turns(&self) -> Vec<ChatTurn> {
        self.transcript.iter().map(ChatTurn::from).collect()
    }

    /// Gets the recent transition log (oldest first)
    pub fn history(&self) -> Vec<TransitionLogEntry> {
        self.history.iter().cloned().collect()
    }
}

/// Envelope returned by every session transition: the operation result plus a
/// stats snapshot and the derived garden stage, so callers can re-render
/// without taking a second lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse<T> {
    pub res: T,
    pub stats: UserStats,
    pub garden_stage: GardenStage,
}

impl<T> SessionResponse<T> {
    fn of(res: T, stats: &UserStats) -> Self {
        Self {
            res,
            stats: stats.clone(),
            garden_stage: stage_for(stats.level()),
        }
    }

    pub fn inner(&self) -> &T {
        &self.res
    }

    pub fn into_inner(self) -> T {
        self.res
    }
}

/// Shared, cloneable handle to the session. Observers can subscribe to a
/// broadcast channel that fires after every transition (drives UI refresh).
#[derive(Clone)]
pub struct Core {
    inner: Arc<Mutex<Session>>,
    update_tx: Arc<tokio::sync::broadcast::Sender<()>>,
}

impl Core {
    pub fn new(session: Session) -> Self {
        // Create a broadcast channel with capacity for 100 messages
        let (tx, _rx) = tokio::sync::broadcast::channel(100);

        Self {
            inner: Arc::new(Mutex::new(session)),
            update_tx: Arc::new(tx),
        }
    }

    // Helper method to safely access the session and notify observers about
    // state changes
    fn with_session<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut session = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let result = f(&mut session);

        // Notify observers about state changes
        let _ = self.update_tx.send(());

        result
    }

    // Read-only access; does not notify observers
    fn read_session<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Session) -> R,
    {
        let session = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&session)
    }

    pub fn toggle_task(&self, id: &str) -> SessionResponse<Option<bool>> {
        self.with_session(|session| session.toggle_task(id))
    }

    pub fn add_tasks(&self, new_tasks: Vec<Task>) -> SessionResponse<usize> {
        self.with_session(|session| session.add_tasks(new_tasks))
    }

    pub fn append_message(&self, role: Role, text: String) -> SessionResponse<ChatMessage> {
        self.with_session(|session| session.append_message(role, text))
    }

    pub fn set_streak(&self, days: u32) -> SessionResponse<()> {
        self.with_session(|session| session.set_streak(days))
    }

    pub fn tasks(&self) -> SessionResponse<Vec<Task>> {
        self.read_session(|session| SessionResponse::of(session.tasks().to_vec(), session.stats()))
    }

    pub fn transcript(&self) -> SessionResponse<Vec<ChatMessage>> {
        self.read_session(|session| {
            SessionResponse::of(session.transcript().to_vec(), session.stats())
        })
    }

    pub fn stats(&self) -> SessionResponse<()> {
        self.read_session(|session| SessionResponse::of((), session.stats()))
    }

    pub fn chat_turns(&self) -> Vec<ChatTurn> {
        self.read_session(|session| session.chat_turns())
    }

    pub fn history(&self) -> Vec<TransitionLogEntry> {
        self.read_session(|session| session.history())
    }

    // Subscribe to state updates
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.update_tx.subscribe()
    }
}
