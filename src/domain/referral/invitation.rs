//! ReferralInvitation entity and its status state machine.
//!
//! ```text
//! Pending --(registration matches email & code)--> Converted (terminal)
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    Email, InvitationId, ReferralCodeId, StateMachine, Timestamp, UserId, ValidationError,
};

/// Lifecycle of an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Converted,
}

impl StateMachine for InvitationStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!((self, target), (InvitationStatus::Pending, InvitationStatus::Converted))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            InvitationStatus::Pending => vec![InvitationStatus::Converted],
            InvitationStatus::Converted => vec![],
        }
    }
}

/// An invitation sent by a referrer to one email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralInvitation {
    pub id: InvitationId,
    pub referral_code_id: ReferralCodeId,
    pub referrer: UserId,
    pub email: Email,
    pub invited_at: Timestamp,
    pub registered_at: Option<Timestamp>,
    pub invitee_user_id: Option<UserId>,
    pub status: InvitationStatus,
}

impl ReferralInvitation {
    /// Creates a pending invitation.
    pub fn new(
        referral_code_id: ReferralCodeId,
        referrer: UserId,
        email: Email,
        invited_at: Timestamp,
    ) -> Self {
        Self {
            id: InvitationId::new(),
            referral_code_id,
            referrer,
            email,
            invited_at,
            registered_at: None,
            invitee_user_id: None,
            status: InvitationStatus::Pending,
        }
    }

    /// True once the invitee has registered.
    pub fn is_converted(&self) -> bool {
        self.status == InvitationStatus::Converted
    }

    /// Marks the invitation converted by `invitee`.
    ///
    /// # Errors
    ///
    /// Fails if the invitation is already converted; conversion happens once.
    pub fn convert(&mut self, invitee: UserId, now: Timestamp) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(InvitationStatus::Converted)?;
        self.registered_at = Some(now);
        self.invitee_user_id = Some(invitee);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invitation() -> ReferralInvitation {
        ReferralInvitation::new(
            ReferralCodeId::new(),
            UserId::new("referrer").unwrap(),
            Email::try_new("friend@example.com").unwrap(),
            Timestamp::now(),
        )
    }

    #[test]
    fn new_invitation_is_pending() {
        let inv = invitation();
        assert_eq!(inv.status, InvitationStatus::Pending);
        assert!(inv.registered_at.is_none());
    }

    #[test]
    fn convert_stamps_registration() {
        let mut inv = invitation();
        let now = Timestamp::now();
        inv.convert(UserId::new("friend").unwrap(), now).unwrap();
        assert!(inv.is_converted());
        assert_eq!(inv.registered_at, Some(now));
        assert_eq!(inv.invitee_user_id, Some(UserId::new("friend").unwrap()));
    }

    #[test]
    fn convert_twice_fails() {
        let mut inv = invitation();
        inv.convert(UserId::new("friend").unwrap(), Timestamp::now()).unwrap();
        assert!(inv
            .convert(UserId::new("other").unwrap(), Timestamp::now())
            .is_err());
        assert_eq!(inv.invitee_user_id, Some(UserId::new("friend").unwrap()));
    }

    #[test]
    fn converted_is_terminal() {
        assert!(InvitationStatus::Converted.is_terminal());
        assert!(InvitationStatus::Converted
            .transition_to(InvitationStatus::Pending)
            .is_err());
    }
}
