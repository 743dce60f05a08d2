//! The Sage assistant core: from a user message to a grounded reply.
//!
//! A turn flows through:
//!
//! 1. **Session** lookup (bounded history, serialized per session id)
//! 2. **Web search** for the message (degrades to nothing on failure)
//! 3. **Prompt assembly** (knowledge base + search results + history + message)
//! 4. **Completion** via the configured backend
//! 5. **History update** with the new exchange
//!
//! Everything is constructed explicitly at startup and passed in; there is
//! no module-level state.

pub mod greeting;
pub mod knowledge;
pub mod pipeline;
pub mod prompt;
pub mod session;

pub use greeting::is_greeting;
pub use knowledge::{KnowledgeBase, load_knowledge_base};
pub use pipeline::{ChatPipeline, ChatTurn, PipelineSettings, Stage};
pub use prompt::PromptAssembler;
pub use session::{InMemorySessionStore, Session, SessionGuard, SessionStore};
