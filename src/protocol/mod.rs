//! Protocol types shared by the codec, the pipeline and handlers.

mod error;
mod headers;
mod request;
mod response;

pub use error::{HttpError, ParseError, SendError};
pub use headers::{CookieStore, HeaderStore};
pub use request::{BodyInput, Request, RequestTag};
pub use response::{CookieOptions, Output, reason_phrase};
