//! Email gate in front of the calculator.
//!
//! Submission flow: validate the address shape, persist it under the fixed
//! store key, fire the access notification without awaiting it, and report
//! the unlocked address. A failed notification is logged and swallowed; the
//! gate must never block legitimate use on a flaky channel.

mod notify;
mod store;

pub use notify::{EMAILJS_SEND_URL, EmailNotifier, NotifyConfig, NotifyError};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StoreError, UNLOCK_KEY};

use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `local@domain.tld` shape: one `@` splitting non-empty halves, no
/// whitespace, and a domain dot with text on both sides.
pub fn validate_email(raw: &str) -> bool {
    if raw.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((name, tld)) => !name.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub struct Gate {
    store: Box<dyn KeyValueStore>,
    notifier: Option<Arc<EmailNotifier>>,
    unlocked: RwLock<Option<String>>,
}

impl Gate {
    /// The one startup read: whatever address the store holds is the unlock
    /// state of record for the process lifetime.
    pub fn open(
        store: Box<dyn KeyValueStore>,
        notifier: Option<EmailNotifier>,
    ) -> Result<Self, GateError> {
        let unlocked = store.get(UNLOCK_KEY)?;
        Ok(Self {
            store,
            notifier: notifier.map(Arc::new),
            unlocked: RwLock::new(unlocked),
        })
    }

    pub fn stored_email(&self) -> Option<String> {
        self.unlocked.read().expect("gate lock poisoned").clone()
    }

    /// Validate, persist, notify-and-forget, unlock. At most one outbound
    /// notification per submission; its outcome only reaches the log.
    pub fn submit(&self, email: &str) -> Result<String, GateError> {
        let email = email.trim();
        if !validate_email(email) {
            return Err(GateError::InvalidEmail);
        }

        self.store.set(UNLOCK_KEY, email)?;
        *self.unlocked.write().expect("gate lock poisoned") = Some(email.to_string());
        info!(email, "calculator unlocked");

        if let Some(notifier) = &self.notifier {
            let notifier = Arc::clone(notifier);
            let address = email.to_string();
            tokio::spawn(async move {
                match notifier.send_access_request(&address).await {
                    Ok(()) => debug!(email = address.as_str(), "access notification delivered"),
                    Err(e) => warn!(
                        email = address.as_str(),
                        error = %e,
                        "access notification failed; unlocking anyway"
                    ),
                }
            });
        }

        Ok(email.to_string())
    }
}
