//! Wire and persisted data types.

mod chunk;
mod function_call;
mod message;
mod response;

pub use chunk::{ChatChunk, ChunkChoice, Delta, DeltaFunctionCall};
pub use function_call::FunctionCall;
pub use message::{Message, MessageBody, Role};
pub use response::{ChatResponse, ResponseChoice, ResponseMessage, Usage};
