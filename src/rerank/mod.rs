//! Completion-provider reranking with strict schema enforcement and blended scoring.

pub mod completer;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod payload;
pub mod provider;
pub mod schema;
pub mod validator;

#[cfg(test)]
mod tests;

pub use completer::GenaiCompleter;
pub use error::{RerankError, RerankResult};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockCompleter, MockReply, ranking_json};
pub use provider::{ChatRole, ChatTurn, CompletionProvider, CompletionRequest};
pub use schema::{RANK_RESPONSE_SCHEMA, RankedEntry, parse_rank_response, strip_code_fences};
pub use validator::{RerankOutcome, RerankValidator, blend};
