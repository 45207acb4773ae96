//! Ready-made modifications.
//!
//! - **`request`**: header edits and referrer spoofing for the request stage
//! - **`outline`**: readable-outline distillation for the response stage

pub mod outline;
pub mod request;

pub use outline::ReadableOutline;
pub use request::{
    baidu_link_token, delete_request_header, set_request_header, spoof_referrer,
    spoof_referrer_from_baidu_search, spoof_referrer_from_google_search,
    spoof_referrer_from_twitter_post,
};
