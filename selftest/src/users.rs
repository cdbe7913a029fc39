use crate::poll::retry_on_conflict;
use crate::Cluster;
use anyhow::{ensure, Context, Result};
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::config::AuthInfo;
use kube::{Client, Config};
use log::{debug, info};
use model::clients::{AllowAlreadyExists, AllowNotFound, ObjectClient};
use model::constants::{
    CLUSTER_ROLE_KIND, GROUP_KIND, INTEGRATION_OAUTH_CLIENT, OAUTH_MIN_TOKEN_LENGTH,
    RBAC_API_GROUP, SCOPE_USER_FULL, SERVICE_ACCOUNT_KIND, USER_KIND,
};
use model::{Group, OAuthAccessToken, OAuthClient, User};
use secrecy::SecretString;
use std::convert::TryFrom;

/// A client authenticating as a specific user with an OAuth access token.
#[derive(Clone)]
pub struct UserClient {
    pub client: Client,
    pub config: Config,
    pub user: User,
    token: String,
}

impl UserClient {
    /// The bearer token this client sends.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn username(&self) -> &str {
        self.user.metadata.name.as_deref().unwrap_or_default()
    }
}

/// Returns a client for `username` holding a token with full access. The user is created if it
/// does not exist.
pub async fn client_for_user(cluster: &Cluster, username: &str) -> Result<UserClient> {
    scoped_client_for_user(cluster, username, &[SCOPE_USER_FULL]).await
}

/// Returns a client for `username` holding a token limited to `scopes`.
pub async fn scoped_client_for_user<S>(
    cluster: &Cluster,
    username: &str,
    scopes: &[S],
) -> Result<UserClient>
where
    S: AsRef<str>,
{
    let admin = cluster.admin_client();
    let user = ensure_user(&admin, username).await?;
    ensure_integration_oauth_client(&admin).await?;

    let token = new_token_name();
    ensure!(
        token.len() >= OAUTH_MIN_TOKEN_LENGTH,
        "token '{}' is shorter than {} characters",
        token,
        OAUTH_MIN_TOKEN_LENGTH
    );
    let access_token = OAuthAccessToken::new(
        &token,
        INTEGRATION_OAUTH_CLIENT,
        username,
        user.metadata.uid.as_deref().unwrap_or_default(),
        scopes.iter().map(|s| s.as_ref().to_string()),
    );
    ObjectClient::<OAuthAccessToken>::cluster(admin)
        .create(&access_token)
        .await
        .with_context(|| format!("unable to create access token for user '{}'", username))?;
    debug!("created access token for user '{}'", username);

    let config = token_config(cluster.admin_config(), &token);
    let client = Client::try_from(config.clone())?;
    Ok(UserClient {
        client,
        config,
        user,
        token,
    })
}

/// Copies `admin_config` without any credentials and authenticates with `token` instead.
pub fn token_config(admin_config: &Config, token: &str) -> Config {
    let mut config = admin_config.clone();
    config.auth_info = AuthInfo {
        token: Some(SecretString::new(token.to_string())),
        ..Default::default()
    };
    config
}

/// Access token names double as the bearer token. A hyphen-less v4 uuid is 32 characters.
fn new_token_name() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

async fn ensure_user(admin: &Client, username: &str) -> Result<User> {
    let users = ObjectClient::<User>::cluster(admin.clone());
    if let Some(user) = users.get_opt(username).await? {
        return Ok(user);
    }
    match users.create(&User::new(username)).await.allow_already_exists()? {
        Some(user) => Ok(user),
        None => Ok(users.get(username).await?),
    }
}

async fn ensure_integration_oauth_client(admin: &Client) -> Result<()> {
    ObjectClient::<OAuthClient>::cluster(admin.clone())
        .create(&OAuthClient::auto_grant(INTEGRATION_OAUTH_CLIENT))
        .await
        .allow_already_exists()?;
    Ok(())
}

/// Creates the user `<namespace>-<name>`. When `role` is given, the user is bound to that cluster
/// role within `namespace`.
pub async fn create_user(
    admin: &Client,
    namespace: &str,
    name: &str,
    role: Option<&str>,
) -> Result<User> {
    let username = format!("{}-{}", namespace, name);
    let user = ObjectClient::<User>::cluster(admin.clone())
        .create(&User::new(&username))
        .await
        .with_context(|| format!("unable to create user '{}'", username))?;
    if let Some(role) = role {
        bind_role(admin, namespace, role, USER_KIND, &username).await?;
    }
    info!("created user '{}'", username);
    Ok(user)
}

/// Creates the group `<namespace>-<name>`. When `role` is given, the group is bound to that
/// cluster role within `namespace`.
pub async fn create_group(
    admin: &Client,
    namespace: &str,
    name: &str,
    role: Option<&str>,
) -> Result<Group> {
    let group_name = format!("{}-{}", namespace, name);
    let group = ObjectClient::<Group>::cluster(admin.clone())
        .create(&Group::new(&group_name))
        .await
        .with_context(|| format!("unable to create group '{}'", group_name))?;
    if let Some(role) = role {
        bind_role(admin, namespace, role, GROUP_KIND, &group_name).await?;
    }
    info!("created group '{}'", group_name);
    Ok(group)
}

/// Creates the role binding `<subject>-<role>-binding`.
async fn bind_role(
    admin: &Client,
    namespace: &str,
    role: &str,
    subject_kind: &str,
    subject_name: &str,
) -> Result<RoleBinding> {
    let binding = fixture_role_binding(namespace, role, subject_kind, subject_name);
    Ok(ObjectClient::<RoleBinding>::namespaced(admin.clone(), namespace)
        .create(&binding)
        .await?)
}

fn fixture_role_binding(
    namespace: &str,
    role: &str,
    subject_kind: &str,
    subject_name: &str,
) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(format!("{}-{}-binding", subject_name, role)),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: CLUSTER_ROLE_KIND.to_string(),
            name: role.to_string(),
        },
        subjects: Some(vec![subject(subject_kind, subject_name)]),
    }
}

/// A binding subject. Users and groups belong to the RBAC API group, service accounts to the core
/// group.
pub fn subject(kind: &str, name: &str) -> Subject {
    Subject {
        api_group: if kind == SERVICE_ACCOUNT_KIND {
            None
        } else {
            Some(RBAC_API_GROUP.to_string())
        },
        kind: kind.to_string(),
        name: name.to_string(),
        namespace: None,
    }
}

/// Adds the user to the group. A conflicting write to the group is retried a few times before it
/// is reported.
pub async fn add_user_to_group(admin: &Client, user: &User, group_name: &str) -> Result<Group> {
    let username = user.metadata.name.as_deref().unwrap_or_default();
    let groups = &ObjectClient::<Group>::cluster(admin.clone());
    let what = format!("group '{}'", group_name);
    let group = retry_on_conflict(&what, move || async move {
        let mut group = groups.get(group_name).await?;
        if !group.add_member(username) {
            return Ok(group);
        }
        groups.replace(&group).await
    })
    .await?;
    debug!("added user '{}' to group '{}'", username, group_name);
    Ok(group)
}

pub async fn delete_user(admin: &Client, name: &str) -> Result<()> {
    ObjectClient::<User>::cluster(admin.clone())
        .delete(name)
        .await
        .allow_not_found()?;
    Ok(())
}

pub async fn delete_group(admin: &Client, name: &str) -> Result<()> {
    ObjectClient::<Group>::cluster(admin.clone())
        .delete(name)
        .await
        .allow_not_found()?;
    Ok(())
}
