//! Role model and the single authorization check every mutating operation
//! goes through.
//!
//! A [`Policy`] is evaluated against an actor and the owner of the resource
//! being touched and yields an [`Access`] verdict. Route handlers never
//! compare roles or owner ids themselves.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Recruiter,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Recruiter => "recruiter",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "recruiter" => Ok(Role::Recruiter),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(value.to_string())),
        }
    }
}

/// Who is acting: the resolved identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Forbidden(&'static str),
}

impl Access {
    pub fn is_allowed(self) -> bool {
        matches!(self, Access::Allowed)
    }

    pub fn ensure(self) -> AppResult<()> {
        match self {
            Access::Allowed => Ok(()),
            Access::Forbidden(reason) => Err(AppError::forbidden(reason)),
        }
    }
}

/// Route-level capabilities derived from the caller's role alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Authenticated,
    AdminOnly,
    AdminOrRecruiter,
}

impl Capability {
    pub fn check(self, role: Role) -> Access {
        match (self, role) {
            (Capability::Authenticated, _) => Access::Allowed,
            (Capability::AdminOnly, Role::Admin) => Access::Allowed,
            (Capability::AdminOnly, _) => Access::Forbidden("admin only"),
            (Capability::AdminOrRecruiter, Role::Admin | Role::Recruiter) => Access::Allowed,
            (Capability::AdminOrRecruiter, Role::User) => {
                Access::Forbidden("not enough permissions")
            }
        }
    }
}

/// Ownership-scoped mutation rule, parameterized by the roles that may act
/// and whether admins bypass the ownership comparison.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub roles: &'static [Role],
    pub admin_override: bool,
    pub denial: &'static str,
}

impl Policy {
    pub fn evaluate(&self, actor: &Actor, owner_id: Option<Uuid>) -> Access {
        if !self.roles.contains(&actor.role) {
            return Access::Forbidden("not enough permissions");
        }
        if self.admin_override && actor.role == Role::Admin {
            return Access::Allowed;
        }
        match owner_id {
            Some(owner) if owner == actor.user_id => Access::Allowed,
            _ => Access::Forbidden(self.denial),
        }
    }
}

/// Companies and jobs: admins edit anything, recruiters what they created.
pub const CATALOG_MUTATION: Policy = Policy {
    roles: &[Role::Admin, Role::Recruiter],
    admin_override: true,
    denial: "not enough permissions",
};

/// Profiles: any role may edit its own profile; admins edit all.
pub const PROFILE_MUTATION: Policy = Policy {
    roles: &[Role::Admin, Role::Recruiter, Role::User],
    admin_override: true,
    denial: "not enough permissions",
};

/// Profile contact fields (email, phone, account email) are readable by the
/// profile's owner and by admins only. Companies see them through a match.
pub const PROFILE_CONTACT: Policy = Policy {
    roles: &[Role::Admin, Role::Recruiter, Role::User],
    admin_override: true,
    denial: "contact details are private",
};

/// Matching is reserved to the owner of the company, admins included.
pub const APPLICATION_MATCH: Policy = Policy {
    roles: &[Role::Admin, Role::Recruiter],
    admin_override: false,
    denial: "application belongs to another company",
};

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn parses_roles_case_insensitively() {
        assert_eq!("Recruiter".parse::<Role>(), Ok(Role::Recruiter));
        assert_eq!(" admin ".parse::<Role>(), Ok(Role::Admin));
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn capabilities_follow_role() {
        assert!(Capability::Authenticated.check(Role::User).is_allowed());
        assert!(Capability::AdminOnly.check(Role::Admin).is_allowed());
        assert!(!Capability::AdminOnly.check(Role::Recruiter).is_allowed());
        assert!(Capability::AdminOrRecruiter.check(Role::Recruiter).is_allowed());
        assert!(!Capability::AdminOrRecruiter.check(Role::User).is_allowed());
    }

    #[test]
    fn catalog_mutation_allows_admin_and_owner_only() {
        let admin = actor(Role::Admin);
        let owner = actor(Role::Recruiter);
        let other = actor(Role::Recruiter);
        let candidate = actor(Role::User);

        assert!(CATALOG_MUTATION.evaluate(&admin, Some(owner.user_id)).is_allowed());
        assert!(CATALOG_MUTATION.evaluate(&admin, None).is_allowed());
        assert!(CATALOG_MUTATION.evaluate(&owner, Some(owner.user_id)).is_allowed());
        assert!(!CATALOG_MUTATION.evaluate(&other, Some(owner.user_id)).is_allowed());
        assert!(!CATALOG_MUTATION.evaluate(&other, None).is_allowed());
        assert!(!CATALOG_MUTATION
            .evaluate(&candidate, Some(candidate.user_id))
            .is_allowed());
    }

    #[test]
    fn profile_mutation_lets_users_edit_their_own() {
        let candidate = actor(Role::User);
        let stranger = actor(Role::User);
        assert!(PROFILE_MUTATION
            .evaluate(&candidate, Some(candidate.user_id))
            .is_allowed());
        assert!(!PROFILE_MUTATION
            .evaluate(&stranger, Some(candidate.user_id))
            .is_allowed());
    }

    #[test]
    fn profile_contact_is_private_to_owner_and_admins() {
        let candidate = actor(Role::User);
        let recruiter = actor(Role::Recruiter);
        let admin = actor(Role::Admin);
        assert!(PROFILE_CONTACT
            .evaluate(&candidate, Some(candidate.user_id))
            .is_allowed());
        assert!(PROFILE_CONTACT
            .evaluate(&admin, Some(candidate.user_id))
            .is_allowed());
        assert_eq!(
            PROFILE_CONTACT.evaluate(&recruiter, Some(candidate.user_id)),
            Access::Forbidden("contact details are private")
        );
        assert!(!PROFILE_CONTACT.evaluate(&recruiter, None).is_allowed());
    }

    #[test]
    fn match_policy_has_no_admin_override() {
        let admin = actor(Role::Admin);
        let owner = actor(Role::Recruiter);
        assert_eq!(
            APPLICATION_MATCH.evaluate(&admin, Some(owner.user_id)),
            Access::Forbidden("application belongs to another company")
        );
        assert!(APPLICATION_MATCH.evaluate(&admin, Some(admin.user_id)).is_allowed());
        assert!(APPLICATION_MATCH.evaluate(&owner, Some(owner.user_id)).is_allowed());
    }
}
