//! Firmware detection: probe each known variant's pages without logging in.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::bounded;
use crate::parse::{declared_charset, select_text};
use crate::text::{decode, encoding_for, is_challenge};
use crate::types::ApiVariant;
use crate::variant::{Page, Selector, Variant};
use crate::{Error, Result};

/// Fetches a page without following redirects. `None` means "not this
/// firmware"; a 302 means the panel is busy or rebooting.
async fn guess_get(
    probe: &reqwest::Client,
    base_url: &str,
    path: &str,
    variant: &Variant,
    timeout: Duration,
) -> Result<Option<String>> {
    let url = format!("{base_url}{path}");
    debug!(url = %url, "guess");

    let (status, body) = bounded(timeout, &url, async {
        let resp = probe.get(&url).send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        Ok::<_, reqwest::Error>((status, body))
    })
    .await?;

    match status {
        200 => Ok(Some(decode(&body, encoding_for(variant.text_encoding())))),
        302 => Err(Error::TemporarilyUnavailable),
        other => {
            debug!(url = %url, status = other, "looks like another model");
            Ok(None)
        }
    }
}

fn check_charset(variant: &Variant, login_page: &str) {
    match declared_charset(login_page, variant.selector(Selector::ContentType)) {
        Ok(Some(charset)) if encoding_for(&charset) != encoding_for(variant.text_encoding()) => {
            warn!(
                variant = %variant.api,
                declared = %charset,
                expected = variant.text_encoding(),
                "login page declares an unexpected charset"
            );
        }
        Ok(_) => {}
        Err(e) => debug!("charset check skipped: {e}"),
    }
}

/// First candidate whose version page (if any) answers and whose login page
/// shows a well-formed challenge.
pub(crate) async fn detect(
    probe: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
    candidates: &[ApiVariant],
) -> Result<ApiVariant> {
    for &api in candidates {
        let variant = api.profile();

        if let Some(version_page) = variant.page(Page::Version)
            && guess_get(probe, base_url, version_page, variant, timeout).await?.is_none()
        {
            continue;
        }

        let Some(login_page) = variant.page(Page::Login) else {
            continue;
        };
        let Some(body) = guess_get(probe, base_url, login_page, variant, timeout).await? else {
            continue;
        };

        match select_text(&body, variant.selector(Selector::LoginChallenge))? {
            Some(challenge) if is_challenge(&challenge) => {
                check_charset(variant, &body);
                info!(variant = %api, "detected panel variant");
                return Ok(api);
            }
            Some(challenge) => debug!(variant = %api, challenge = %challenge, "challenge not recognized"),
            None => debug!(variant = %api, "no challenge on login page"),
        }
    }
    Err(Error::DetectionFailed)
}
