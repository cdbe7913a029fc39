use crate::meta::named;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use serde::{Deserialize, Serialize};

/// A user known to the cluster. Users are created on first login or explicitly by an
/// administrator.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

openshift_object!(
    User,
    group = "user.openshift.io",
    version = "v1",
    kind = "User",
    plural = "users",
    scope = ClusterResourceScope,
);

impl User {
    pub fn new(name: &str) -> Self {
        Self {
            types: Some(Self::type_meta()),
            metadata: named(name),
            ..Default::default()
        }
    }
}

/// A named set of users. Membership is held by the group, not the user.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub users: Option<Vec<String>>,
}

openshift_object!(
    Group,
    group = "user.openshift.io",
    version = "v1",
    kind = "Group",
    plural = "groups",
    scope = ClusterResourceScope,
);

impl Group {
    pub fn new(name: &str) -> Self {
        Self {
            types: Some(Self::type_meta()),
            metadata: named(name),
            users: Some(Vec::new()),
        }
    }

    pub fn has_member(&self, user: &str) -> bool {
        self.users
            .as_ref()
            .map(|users| users.iter().any(|u| u == user))
            .unwrap_or(false)
    }

    /// Adds `user` unless it is already a member. Returns `true` if the group changed.
    pub fn add_member(&mut self, user: &str) -> bool {
        if self.has_member(user) {
            return false;
        }
        self.users.get_or_insert_with(Vec::new).push(user.to_string());
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn group_members_from_null() {
        let json = r#"{
            "apiVersion": "user.openshift.io/v1",
            "kind": "Group",
            "metadata": {"name": "ns-group"},
            "users": null
        }"#;
        let mut group: Group = serde_json::from_str(json).unwrap();
        assert!(!group.has_member("alice"));
        assert!(group.add_member("alice"));
        assert!(!group.add_member("alice"));
        assert_eq!(group.users, Some(vec!["alice".to_string()]));
    }

    #[test]
    fn new_user_serializes_kind() {
        let value = serde_json::to_value(User::new("bob")).unwrap();
        assert_eq!(value["kind"], "User");
        assert_eq!(value["apiVersion"], "user.openshift.io/v1");
        assert!(value.get("identities").is_none());
    }
}
