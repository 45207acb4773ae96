//! Request-stage modifications: header edits and referrer spoofing.

use std::sync::{LazyLock, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::ModificationError;
use crate::http::headers::{is_valid_name, is_valid_value};
use crate::proxy::{ModificationRef, modification};

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const HEX: &[u8] = b"0123456789abcdef";

/// Seeded once per process; every token draws from the same generator.
static TOKEN_RNG: LazyLock<Mutex<StdRng>> = LazyLock::new(|| Mutex::new(StdRng::from_entropy()));

/// Sets an outgoing header, replacing any existing values.
pub fn set_request_header(name: impl Into<String>, value: impl Into<String>) -> ModificationRef {
    let name = name.into();
    let value = value.into();
    modification(move |chain| {
        if !is_valid_name(&name) {
            return Err(ModificationError::invalid_header(format!("bad name {name:?}")));
        }
        if !is_valid_value(&value) {
            return Err(ModificationError::invalid_header(format!("bad value for {name}")));
        }
        chain.request.headers.set(name.as_str(), value.as_str());
        Ok(())
    })
}

/// Removes every value of an outgoing header.
pub fn delete_request_header(name: impl Into<String>) -> ModificationRef {
    let name = name.into();
    modification(move |chain| {
        chain.request.headers.remove(&name);
        Ok(())
    })
}

/// Sets the `Referer` header.
pub fn spoof_referrer(url: impl Into<String>) -> ModificationRef {
    set_request_header("Referer", url)
}

/// Queues a fixed referrer plus the `sec-fetch-*` headers a browser sends
/// when following a cross-site link.
fn cross_site_referrer(referrer: String) -> [ModificationRef; 4] {
    [
        spoof_referrer(referrer),
        set_request_header("sec-fetch-site", "cross-site"),
        set_request_header("sec-fetch-dest", "document"),
        set_request_header("sec-fetch-mode", "navigate"),
    ]
}

/// Pretends the visit came from a Google search result.
///
/// The target URL does not influence the headers.
pub fn spoof_referrer_from_google_search(_url: &str) -> ModificationRef {
    modification(|chain| {
        chain.add_request_modifications(cross_site_referrer("https://www.google.com/".to_string()));
        Ok(())
    })
}

/// Pretends the visit came from a link in a Twitter post.
pub fn spoof_referrer_from_twitter_post(_url: &str) -> ModificationRef {
    modification(|chain| {
        chain.add_request_modifications(cross_site_referrer("https://t.co/".to_string()));
        Ok(())
    })
}

/// Pretends the visit came from a Baidu search result link.
///
/// A fresh link token is generated on every invocation.
pub fn spoof_referrer_from_baidu_search(_url: &str) -> ModificationRef {
    modification(|chain| {
        let referrer = format!("https://baidu.com/link?url={}", baidu_link_token());
        chain.add_request_modifications(cross_site_referrer(referrer));
        Ok(())
    })
}

/// Token shaped like Baidu's redirect ids:
/// 30 alphanumerics, `-&wd=&eqid=`, 16 lowercase hex digits.
pub fn baidu_link_token() -> String {
    // A poisoned lock still holds a usable generator.
    let mut rng = TOKEN_RNG.lock().unwrap_or_else(|e| e.into_inner());
    let alnum = random_string(&mut *rng, ALPHANUMERIC, 30);
    let hex = random_string(&mut *rng, HEX, 16);
    format!("{alnum}-&wd=&eqid={hex}")
}

fn random_string<R: Rng>(rng: &mut R, charset: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect()
}
