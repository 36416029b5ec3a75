//! Who may read and write which channel

use super::errors::{ChatError, ChatResult};
use super::types::{Nation, Nations};

/// Read and send rules for one game, derived from its variant roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityPolicy {
    roster: Nations,
}

impl VisibilityPolicy {
    pub fn new(roster: impl IntoIterator<Item = Nation>) -> Self {
        VisibilityPolicy {
            roster: Nations::new(roster),
        }
    }

    /// Member set of the public channel: every nation of the variant
    pub fn public_channel(&self) -> &Nations {
        &self.roster
    }

    pub fn is_public(&self, members: &Nations) -> bool {
        *members == self.roster
    }

    /// Members read their own channels; everybody, observers included,
    /// reads the public one.
    pub fn can_read(&self, viewer: Option<&Nation>, members: &Nations) -> bool {
        viewer.is_some_and(|nation| members.includes(nation)) || self.is_public(members)
    }

    /// Checks a send before anything is written and returns the sender.
    ///
    /// Observers and non-members get `Forbidden`. Destinations naming a
    /// nation outside the roster, or the same nation twice, are rejected as
    /// invalid.
    pub fn check_send<'a>(
        &self,
        sender: Option<&'a Nation>,
        members: &Nations,
    ) -> ChatResult<&'a Nation> {
        let sender = match sender {
            Some(nation) if members.includes(nation) => nation,
            Some(nation) => {
                return Err(ChatError::Forbidden(format!(
                    "{} can only send messages to channels it is a member of",
                    nation
                )))
            }
            None => {
                return Err(ChatError::Forbidden(
                    "observers cannot send messages".to_string(),
                ))
            }
        };

        if let Some(unknown) = members.iter().find(|member| !self.roster.includes(member)) {
            return Err(ChatError::InvalidArgument(format!(
                "unknown channel member {}",
                unknown
            )));
        }

        if let Some(repeated) = members.duplicate() {
            return Err(ChatError::InvalidArgument(format!(
                "channel member {} listed more than once",
                repeated
            )));
        }

        Ok(sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> VisibilityPolicy {
        VisibilityPolicy::new(vec![
            Nation::from("Germany"),
            Nation::from("England"),
            Nation::from("France"),
        ])
    }

    fn set(s: &str) -> Nations {
        s.parse().unwrap()
    }

    #[test]
    fn test_public_channel_is_sorted_roster() {
        let policy = policy();
        assert_eq!(policy.public_channel().to_string(), "England,France,Germany");
        assert!(policy.is_public(&set("Germany,France,England")));
        assert!(!policy.is_public(&set("England,France")));
    }

    #[test]
    fn test_members_read_own_channels() {
        let policy = policy();
        let england = Nation::from("England");
        let germany = Nation::from("Germany");

        assert!(policy.can_read(Some(&england), &set("England,France")));
        assert!(!policy.can_read(Some(&germany), &set("England,France")));
    }

    #[test]
    fn test_public_channel_readable_by_everyone() {
        let policy = policy();
        let everyone = set("England,France,Germany");

        assert!(policy.can_read(None, &everyone));
        assert!(policy.can_read(Some(&Nation::from("Germany")), &everyone));
        assert!(!policy.can_read(None, &set("England,France")));
    }

    #[test]
    fn test_check_send() {
        let policy = policy();
        let england = Nation::from("England");

        assert_eq!(policy.check_send(Some(&england), &set("England,France")).unwrap(), &england);

        assert!(matches!(
            policy.check_send(Some(&Nation::from("Germany")), &set("England,France")),
            Err(ChatError::Forbidden(_))
        ));
        assert!(matches!(
            policy.check_send(None, &set("England,France,Germany")),
            Err(ChatError::Forbidden(_))
        ));
        assert!(matches!(
            policy.check_send(Some(&england), &set("England,Atlantis")),
            Err(ChatError::InvalidArgument(_))
        ));
        assert!(matches!(
            policy.check_send(Some(&england), &set("England,England")),
            Err(ChatError::InvalidArgument(_))
        ));
    }
}
