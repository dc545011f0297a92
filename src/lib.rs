mod client;
mod detect;
mod diff;
mod error;
mod logger;
mod parse;
mod text;
mod types;
mod variant;

pub use client::{
    CallOptions, Config, HTTP_TIMEOUT, MAX_RECOVERIES, Method, PageResponse, ProtexialClient,
    ProtexialClientBuilder, Target,
};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use parse::{parse_challenge_card, parse_elements, parse_status};
pub use text::{filter_ascii, fix_mojibake, is_challenge};
pub use types::*;
pub use variant::{
    ELEMENT_PAGES, Form, MAX_LOGIN_ATTEMPTS, NOT_AUTHORIZED, Page, SESSION_ALREADY_OPEN, Selector,
    UNKNOWN_PARAMETER, Variant, WRONG_CODE, WRONG_CREDENTIALS,
};
