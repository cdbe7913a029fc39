use crate::users::subject;
use anyhow::Result;
use core::fmt::Debug;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Client, Resource};
use log::{debug, info};
use model::clients::{AllowNotFound, ObjectClient};
use model::constants::{CLUSTER_ROLE_KIND, GROUP_KIND, RBAC_API_GROUP, USER_KIND};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;

/// Grants or revokes a role for a set of users and groups, the way `oc adm policy add-role-to-user`
/// does. With a `binding_namespace` the role is bound through role bindings in that namespace,
/// otherwise through cluster role bindings.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RoleModification {
    pub binding_namespace: Option<String>,
    pub role_name: String,
    /// `ClusterRole` or `Role`.
    pub role_kind: String,
    pub users: Vec<String>,
    pub groups: Vec<String>,
}

impl RoleModification {
    pub fn namespaced(namespace: &str, role_name: &str) -> Self {
        Self {
            binding_namespace: Some(namespace.to_string()),
            ..Self::cluster(role_name)
        }
    }

    pub fn cluster(role_name: &str) -> Self {
        Self {
            binding_namespace: None,
            role_name: role_name.to_string(),
            role_kind: CLUSTER_ROLE_KIND.to_string(),
            users: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn role_kind(mut self, role_kind: &str) -> Self {
        self.role_kind = role_kind.to_string();
        self
    }

    pub fn users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users.extend(users.into_iter().map(Into::into));
        self
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Adds the subjects to the first existing binding for the role, or creates a binding named
    /// after the role.
    pub async fn add_role(&self, client: &Client) -> Result<()> {
        match &self.binding_namespace {
            Some(namespace) => {
                self.add_to(ObjectClient::<RoleBinding>::namespaced(
                    client.clone(),
                    namespace,
                ))
                .await
            }
            None => {
                self.add_to(ObjectClient::<ClusterRoleBinding>::cluster(client.clone()))
                    .await
            }
        }
    }

    /// Removes the subjects from every binding for the role. Bindings left without subjects are
    /// deleted.
    pub async fn remove_role(&self, client: &Client) -> Result<()> {
        match &self.binding_namespace {
            Some(namespace) => {
                self.remove_from(ObjectClient::<RoleBinding>::namespaced(
                    client.clone(),
                    namespace,
                ))
                .await
            }
            None => {
                self.remove_from(ObjectClient::<ClusterRoleBinding>::cluster(client.clone()))
                    .await
            }
        }
    }

    fn role_ref(&self) -> RoleRef {
        RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: self.role_kind.clone(),
            name: self.role_name.clone(),
        }
    }

    fn subjects(&self) -> Vec<Subject> {
        self.users
            .iter()
            .map(|user| subject(USER_KIND, user))
            .chain(self.groups.iter().map(|group| subject(GROUP_KIND, group)))
            .collect()
    }

    async fn add_to<B: Binding>(&self, bindings: ObjectClient<B>) -> Result<()> {
        let role_ref = self.role_ref();
        let existing = bindings.list().await?;
        if let Some(mut binding) = existing
            .iter()
            .find(|b| b.role_ref() == &role_ref)
            .cloned()
        {
            if add_subjects(binding.subjects_mut(), self.subjects()) {
                bindings.replace(&binding).await?;
                info!(
                    "added subjects to {} '{}'",
                    bindings.kind(),
                    binding.meta().name.as_deref().unwrap_or_default()
                );
            }
            return Ok(());
        }

        let names: HashSet<&str> = existing
            .iter()
            .filter_map(|b| b.meta().name.as_deref())
            .collect();
        let name = unique_name(&self.role_name, &names);
        let metadata = ObjectMeta {
            name: Some(name.clone()),
            namespace: self.binding_namespace.clone(),
            ..Default::default()
        };
        let mut binding = B::new(metadata, role_ref);
        *binding.subjects_mut() = Some(self.subjects());
        bindings.create(&binding).await?;
        info!("created {} '{}'", bindings.kind(), name);
        Ok(())
    }

    async fn remove_from<B: Binding>(&self, bindings: ObjectClient<B>) -> Result<()> {
        let role_ref = self.role_ref();
        let subjects = self.subjects();
        for mut binding in bindings.list().await? {
            if binding.role_ref() != &role_ref {
                continue;
            }
            let name = binding.meta().name.clone().unwrap_or_default();
            if !remove_subjects(binding.subjects_mut(), &subjects) {
                continue;
            }
            if binding.subjects_mut().as_ref().map_or(true, Vec::is_empty) {
                bindings.delete(&name).await.allow_not_found()?;
                debug!("deleted {} '{}'", bindings.kind(), name);
            } else {
                bindings.replace(&binding).await.allow_not_found()?;
                debug!("removed subjects from {} '{}'", bindings.kind(), name);
            }
        }
        Ok(())
    }
}

/// Role bindings and cluster role bindings share a shape but not a type.
trait Binding:
    Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug + Send + Sync
{
    fn new(metadata: ObjectMeta, role_ref: RoleRef) -> Self;
    fn role_ref(&self) -> &RoleRef;
    fn subjects_mut(&mut self) -> &mut Option<Vec<Subject>>;
}

impl Binding for RoleBinding {
    fn new(metadata: ObjectMeta, role_ref: RoleRef) -> Self {
        Self {
            metadata,
            role_ref,
            subjects: None,
        }
    }

    fn role_ref(&self) -> &RoleRef {
        &self.role_ref
    }

    fn subjects_mut(&mut self) -> &mut Option<Vec<Subject>> {
        &mut self.subjects
    }
}

impl Binding for ClusterRoleBinding {
    fn new(mut metadata: ObjectMeta, role_ref: RoleRef) -> Self {
        metadata.namespace = None;
        Self {
            metadata,
            role_ref,
            subjects: None,
        }
    }

    fn role_ref(&self) -> &RoleRef {
        &self.role_ref
    }

    fn subjects_mut(&mut self) -> &mut Option<Vec<Subject>> {
        &mut self.subjects
    }
}

fn same_subject(a: &Subject, b: &Subject) -> bool {
    a.kind == b.kind && a.name == b.name && a.namespace == b.namespace
}

/// Appends the subjects not already present. Returns `true` if anything was added.
fn add_subjects(existing: &mut Option<Vec<Subject>>, subjects: Vec<Subject>) -> bool {
    let existing = existing.get_or_insert_with(Vec::new);
    let mut changed = false;
    for subject in subjects {
        if !existing.iter().any(|e| same_subject(e, &subject)) {
            existing.push(subject);
            changed = true;
        }
    }
    changed
}

/// Drops the given subjects. Returns `true` if anything was removed.
fn remove_subjects(existing: &mut Option<Vec<Subject>>, subjects: &[Subject]) -> bool {
    match existing {
        Some(existing) => {
            let before = existing.len();
            existing.retain(|e| !subjects.iter().any(|s| same_subject(e, s)));
            existing.len() != before
        }
        None => false,
    }
}

/// `base`, or `base-N` for the first `N` not taken.
fn unique_name(base: &str, taken: &HashSet<&str>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (0..)
        .map(|i| format!("{}-{}", base, i))
        .find(|name| !taken.contains(name.as_str()))
        .unwrap_or_else(|| base.to_string())
}
