//! Stand-in for the external identity provider's login page

use donation_client::identity::{ed25519_der, Delegation};
use donation_client::principal::Principal;
use donation_client::rpc::envelope::now_nanos;
use donation_client::session::Presenter;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use std::sync::Arc;
use url::Url;

/// What the simulated user does on the login page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginBehaviour {
    /// Approve and redirect back with a delegation
    Approve,
    /// Cancel and redirect back with an error
    Deny,
    /// Never come back
    Abandon,
}

pub struct MockIdentityProvider {
    user_key: SigningKey,
    behaviour: LoginBehaviour,
}

impl MockIdentityProvider {
    pub fn new(behaviour: LoginBehaviour) -> Arc<Self> {
        Arc::new(Self {
            user_key: SigningKey::generate(&mut OsRng),
            behaviour,
        })
    }

    /// Principal a successful login resolves to
    pub fn user_principal(&self) -> Principal {
        Principal::self_authenticating(&self.user_der())
    }

    /// A presenter that "opens" the authorize URL by completing the login
    /// in a background task
    pub fn presenter(self: &Arc<Self>) -> Presenter {
        let provider = Arc::clone(self);
        Box::new(move |url: &str| {
            let provider = Arc::clone(&provider);
            let url = url.to_string();
            tokio::spawn(async move {
                let _ = provider.complete(&url).await;
            });
        })
    }

    /// Act on an authorize URL the way the login page would
    pub async fn complete(&self, authorize_url: &str) -> Result<(), reqwest::Error> {
        let request = parse_authorize_url(authorize_url);
        let mut callback = request.callback;
        match self.behaviour {
            LoginBehaviour::Abandon => return Ok(()),
            LoginBehaviour::Deny => {
                callback
                    .query_pairs_mut()
                    .append_pair("error", "UserInterrupt");
            }
            LoginBehaviour::Approve => {
                let expiration = now_nanos().saturating_add(request.max_time_to_live);
                let message = Delegation::signing_message(&request.session_key, expiration);
                let signature = self.user_key.sign(&message);
                callback
                    .query_pairs_mut()
                    .append_pair("user_key", &hex::encode(self.user_der()))
                    .append_pair("expiration", &expiration.to_string())
                    .append_pair("signature", &hex::encode(signature.to_bytes()));
            }
        }
        // The callback is on loopback; never route it through a proxy.
        let client = reqwest::Client::builder().no_proxy().build()?;
        client.get(callback).send().await?;
        Ok(())
    }

    fn user_der(&self) -> Vec<u8> {
        ed25519_der(&self.user_key.verifying_key().to_bytes())
    }
}

struct AuthorizeRequest {
    session_key: Vec<u8>,
    callback: Url,
    max_time_to_live: u64,
}

fn parse_authorize_url(text: &str) -> AuthorizeRequest {
    let url = Url::parse(text).expect("authorize URL");
    let fragment = url.fragment().expect("authorize fragment");
    let query = fragment
        .strip_prefix("authorize?")
        .expect("authorize fragment prefix");

    let mut session_key = None;
    let mut callback = None;
    let mut max_time_to_live = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "session_key" => session_key = Some(hex::decode(value.as_ref()).expect("session key hex")),
            "callback" => callback = Some(Url::parse(&value).expect("callback URL")),
            "max_time_to_live" => max_time_to_live = Some(value.parse().expect("ttl")),
            _ => {}
        }
    }
    AuthorizeRequest {
        session_key: session_key.expect("session_key"),
        callback: callback.expect("callback"),
        max_time_to_live: max_time_to_live.expect("max_time_to_live"),
    }
}
