use tokio::sync::watch;

use crate::models::user::Identity;

/// Source of the currently signed-in user.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<Identity>;
}

/// In-process session holder for the single signed-in user.
pub struct SessionIdentity {
    tx: watch::Sender<Option<Identity>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn sign_in(&self, identity: Identity) {
        self.tx.send_replace(Some(identity));
    }

    pub fn sign_out(&self) -> Option<Identity> {
        self.tx.send_replace(None)
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for SessionIdentity {
    fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }
}
