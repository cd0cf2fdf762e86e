pub mod fields;
pub mod keyword;
pub mod llm;

use async_trait::async_trait;

use crate::error::ParseError;

pub use fields::{parse_amount, parse_transaction_time, TransactionFields, TIME_FORMAT};
pub use keyword::KeywordParser;
pub use llm::{ChatCompletionParser, LlmOptions};

/// Turns extracted bill text into transaction fields.
///
/// Implementations report backend failures as [`ParseError`]; domain
/// validation of the returned fields is left to the caller.
#[async_trait]
pub trait StructuredParser: Send + Sync {
    async fn parse(&self, text: &str) -> Result<TransactionFields, ParseError>;

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Rejects text whose trimmed length is below `minimum` characters.
pub(crate) fn check_text_length(text: &str, minimum: usize) -> Result<(), ParseError> {
    let length = text.trim().chars().count();
    if length < minimum {
        return Err(ParseError::TextTooShort { length, minimum });
    }
    Ok(())
}
