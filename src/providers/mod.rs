//! External model providers
//!
//! The content and coaching providers are the only parts of the system that
//! talk to the network. Both are fallible by contract; the service layer owns
//! the canned fallbacks so a dead provider never breaks the core loop.

mod gemini;
mod traits;
mod types;

pub use gemini::{GeminiProvider, DEFAULT_MODEL};
pub use traits::{CoachProvider, ContentProvider, ProviderError, TaskCandidate};

use lazy_static::lazy_static;
use reqwest::Client;
use std::time::Duration;

/// Canned reply when the coach provider fails outright.
pub const FALLBACK_REPLY: &str =
    "The connection is a bit shaky. Let's rest for a moment and talk again soon.";

/// Canned reply when the coach returns successfully but with nothing to say.
pub const EMPTY_REPLY: &str =
    "Sorry, my thoughts won't quite come together right now. Please talk to me again in a moment.";

lazy_static! {
    /// Stand-in tasks when the content provider fails. All easy, so the user
    /// still gets something doable.
    pub static ref FALLBACK_TASKS: Vec<TaskCandidate> = vec![
        TaskCandidate {
            text: "Open a window and take three deep breaths".to_string(),
            difficulty: "easy".to_string(),
        },
        TaskCandidate {
            text: "Tidy your desk for just one minute".to_string(),
            difficulty: "easy".to_string(),
        },
        TaskCandidate {
            text: "Drink a glass of water".to_string(),
            difficulty: "easy".to_string(),
        },
    ];
}

pub(crate) fn build_provider_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Strips a leading/trailing markdown code fence from model output.
///
/// JSON mode usually returns bare JSON, but some models still wrap the body
/// in ```json fences; parse would choke on those.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}
