use std::fmt;

use serde::{Deserialize, Serialize};

/// Reviewer roles, declared in canonical stage order. The derived `Ord` is
/// relied on to decide which approval slots sit upstream or downstream of a
/// given stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Head,
    ParentHead,
    Admin,
    Comptroller,
    Hr,
    Vp,
    Vp2,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Head,
        Role::ParentHead,
        Role::Admin,
        Role::Comptroller,
        Role::Hr,
        Role::Vp,
        Role::Vp2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::ParentHead => "parentHead",
            Self::Admin => "admin",
            Self::Comptroller => "comptroller",
            Self::Hr => "hr",
            Self::Vp => "vp",
            Self::Vp2 => "vp2",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "head" => Some(Self::Head),
            "parentHead" | "parent_head" => Some(Self::ParentHead),
            "admin" => Some(Self::Admin),
            "comptroller" => Some(Self::Comptroller),
            "hr" => Some(Self::Hr),
            "vp" => Some(Self::Vp),
            "vp2" => Some(Self::Vp2),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Head => "Department Head",
            Self::ParentHead => "Parent Department Head",
            Self::Admin => "Administrator",
            Self::Comptroller => "Comptroller",
            Self::Hr => "Human Resources",
            Self::Vp => "Vice President",
            Self::Vp2 => "Second Vice President",
        }
    }

    pub fn is_vp(&self) -> bool {
        matches!(self, Self::Vp | Self::Vp2)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed an action: the requester, or a reviewer acting in a role.
///
/// Serialized as a flat string (`requester`, `head`, `parentHead`, ...) so it
/// shares the wire vocabulary of [`Role`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ActorRole {
    Requester,
    Reviewer(Role),
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requester => "requester",
            Self::Reviewer(role) => role.as_str(),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        if value.trim() == "requester" {
            return Some(Self::Requester);
        }
        Role::parse(value).map(Self::Reviewer)
    }

    pub fn reviewer_role(&self) -> Option<Role> {
        match self {
            Self::Requester => None,
            Self::Reviewer(role) => Some(*role),
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ActorRole> for String {
    fn from(value: ActorRole) -> Self {
        value.as_str().to_string()
    }
}

impl TryFrom<String> for ActorRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown actor role `{value}`"))
    }
}

impl From<Role> for ActorRole {
    fn from(value: Role) -> Self {
        Self::Reviewer(value)
    }
}

/// The identity threaded through every entry point in place of ambient
/// session state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn requester(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), role: ActorRole::Requester }
    }

    pub fn reviewer(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), name: name.into(), role: ActorRole::Reviewer(role) }
    }
}

#[cfg(test)]
mod tests {
    use super::{ActorRole, Role};

    #[test]
    fn role_wire_names_are_stable() {
        let names: Vec<&str> = Role::ALL.iter().map(Role::as_str).collect();
        assert_eq!(names, vec!["head", "parentHead", "admin", "comptroller", "hr", "vp", "vp2"]);

        let json = serde_json::to_string(&Role::ParentHead).expect("serialize role");
        assert_eq!(json, "\"parentHead\"");
    }

    #[test]
    fn actor_role_serializes_as_flat_string() {
        let json = serde_json::to_string(&ActorRole::Reviewer(Role::Comptroller))
            .expect("serialize actor role");
        assert_eq!(json, "\"comptroller\"");

        let parsed: ActorRole = serde_json::from_str("\"requester\"").expect("parse requester");
        assert_eq!(parsed, ActorRole::Requester);

        let unknown = serde_json::from_str::<ActorRole>("\"president\"");
        assert!(unknown.is_err());
    }

    #[test]
    fn stage_order_follows_declaration() {
        assert!(Role::Head < Role::Admin);
        assert!(Role::Comptroller < Role::Hr);
        assert!(Role::Vp < Role::Vp2);
    }
}
