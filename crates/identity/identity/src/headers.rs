use http::HeaderMap;
use http::header::{HeaderName, InvalidHeaderName};
use portier_core::{IdentityCodec, UserAccount, UserIdentity};
use tracing::debug;

use crate::error::IdentityError;

pub const DEFAULT_ANONYMOUS_HEADER: &str = "x-anonymous-consumer";
pub const DEFAULT_USERNAME_HEADER: &str = "x-consumer-username";
pub const DEFAULT_CUSTOM_ID_HEADER: &str = "x-consumer-custom-id";

/// Names of the identity headers the gateway injects into proxied requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedHeaders {
    pub anonymous: HeaderName,
    pub username: HeaderName,
    pub custom_id: HeaderName,
}

impl Default for TrustedHeaders {
    fn default() -> Self {
        Self {
            anonymous: HeaderName::from_static(DEFAULT_ANONYMOUS_HEADER),
            username: HeaderName::from_static(DEFAULT_USERNAME_HEADER),
            custom_id: HeaderName::from_static(DEFAULT_CUSTOM_ID_HEADER),
        }
    }
}

impl TrustedHeaders {
    /// Build from configured names. Names are case-insensitive.
    pub fn from_names(
        anonymous: &str,
        username: &str,
        custom_id: &str,
    ) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            anonymous: HeaderName::try_from(anonymous)?,
            username: HeaderName::try_from(username)?,
            custom_id: HeaderName::try_from(custom_id)?,
        })
    }

    /// Whether the gateway marked the request as anonymous (`true`, in any
    /// case, or `1`).
    pub fn is_anonymous(&self, headers: &HeaderMap) -> bool {
        headers
            .get(&self.anonymous)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
    }

    /// Resolve the caller from the gateway's headers.
    ///
    /// An anonymous request wins over any other header. A request without a
    /// username, or whose custom id does not decode under `codec`, is not one
    /// of ours and is treated as anonymous. Only header values that are not
    /// valid text are an error.
    pub fn identify(
        &self,
        headers: &HeaderMap,
        codec: &IdentityCodec,
    ) -> Result<UserIdentity, IdentityError> {
        if self.is_anonymous(headers) {
            return Ok(UserIdentity::Anonymous);
        }

        let Some(username) = header_str(headers, &self.username)?.filter(|u| !u.is_empty())
        else {
            debug!(header = %self.username, "no username header; treating caller as anonymous");
            return Ok(UserIdentity::Anonymous);
        };
        let custom_id = header_str(headers, &self.custom_id)?;
        let Some(id) = codec.decode(custom_id) else {
            debug!(
                header = %self.custom_id,
                prefix = codec.prefix(),
                "custom id outside namespace; treating caller as anonymous"
            );
            return Ok(UserIdentity::Anonymous);
        };

        Ok(UserAccount::new(id, username).into())
    }
}

fn header_str<'a>(
    headers: &'a HeaderMap,
    name: &HeaderName,
) -> Result<Option<&'a str>, IdentityError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map_err(|_| IdentityError::Validation(format!("{name} header is not valid text")))
        })
        .transpose()
}
