//! Authentication helpers: `Login`/`Logoff` actions
//!
//! These are ordinary users of [`AmiClient::publish`] with no privileged
//! access to the protocol engine. Secrets are never logged.

use crate::client::AmiClient;
use crate::error::{AmiError, AmiResult};
use crate::headers::AmiHeader;
use crate::message::AmiMessage;
use tracing::{debug, info};

/// `hex(md5(challenge + secret))`, the key for AMI challenge login.
fn challenge_key(challenge: &str, secret: &str) -> String {
    format!("{:x}", md5::compute(format!("{challenge}{secret}")))
}

fn auth_failure(response: &AmiMessage) -> AmiError {
    AmiError::auth_failed(
        response
            .message()
            .unwrap_or("authentication failed"),
    )
}

impl AmiClient {
    /// Authenticate with the MD5 challenge exchange.
    ///
    /// Publishes `Challenge` to obtain a nonce, answers with `Login` carrying
    /// `Key: hex(md5(challenge + secret))`, and succeeds iff the final
    /// `Response` is `Success` (case-insensitive). The secret itself never
    /// crosses the wire.
    pub async fn login(&self, username: &str, secret: &str) -> AmiResult<()> {
        debug!(username, "requesting MD5 challenge");
        let mut challenge_request = AmiMessage::action("Challenge")?;
        challenge_request.set(AmiHeader::AuthType, "MD5")?;
        let response = self
            .publish(challenge_request)
            .await?;
        if !response.is_success() {
            return Err(auth_failure(&response));
        }
        let challenge = response
            .get(AmiHeader::Challenge)
            .ok_or_else(|| AmiError::malformed("challenge response missing Challenge header"))?;
        let key = challenge_key(challenge, secret);

        let mut login = AmiMessage::action("Login")?;
        login.set(AmiHeader::AuthType, "MD5")?;
        login.set(AmiHeader::Username, username)?;
        login.set(AmiHeader::Key, key)?;
        let response = self
            .publish(login)
            .await?;
        if !response.is_success() {
            return Err(auth_failure(&response));
        }
        info!(username, "authenticated");
        Ok(())
    }

    /// Authenticate with the plaintext `Secret` field.
    ///
    /// Prefer [`login`](AmiClient::login); this variant sends the secret over
    /// the wire and exists for servers with challenge support disabled.
    pub async fn login_plain(&self, username: &str, secret: &str) -> AmiResult<()> {
        let mut login = AmiMessage::action("Login")?;
        login.set(AmiHeader::Username, username)?;
        login.set(AmiHeader::Secret, secret)?;
        let response = self
            .publish(login)
            .await?;
        if !response.is_success() {
            return Err(auth_failure(&response));
        }
        info!(username, "authenticated");
        Ok(())
    }

    /// End the session with `Logoff`.
    ///
    /// Succeeds iff the server answers `Response: Goodbye`
    /// (case-insensitive). The server closes the connection afterwards; the
    /// client then stops on clean EOF.
    pub async fn logoff(&self) -> AmiResult<()> {
        let response = self
            .publish(AmiMessage::action("Logoff")?)
            .await?;
        let goodbye = response
            .response()
            .is_some_and(|r| r.eq_ignore_ascii_case("Goodbye"));
        if !goodbye {
            return Err(auth_failure(&response));
        }
        debug!("logged off");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_key_is_hex_md5_of_concatenation() {
        // md5("foobar") — challenge "foo", secret "bar"
        assert_eq!(
            challenge_key("foo", "bar"),
            "3858f62230ac3c915f300c664312c63f"
        );
    }

    #[test]
    fn challenge_key_is_lowercase_hex() {
        let key = challenge_key("112233", "secret");
        assert_eq!(key.len(), 32);
        assert!(key
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
