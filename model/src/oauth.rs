use crate::constants::{OAUTH_TOKEN_EXPIRES_IN, OAUTH_TOKEN_REDIRECT_URI};
use crate::meta::named;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantHandlerType {
    /// Grants are approved without asking the user.
    Auto,
    Prompt,
    Deny,
}

/// A registered OAuth client. Tokens minted for a user name the client they were issued to.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthClient {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_secrets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub respond_with_challenges: bool,
    #[serde(default, rename = "redirectURIs", skip_serializing_if = "Option::is_none")]
    pub redirect_uris: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_method: Option<GrantHandlerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_max_age_seconds: Option<i32>,
}

openshift_object!(
    OAuthClient,
    group = "oauth.openshift.io",
    version = "v1",
    kind = "OAuthClient",
    plural = "oauthclients",
    scope = ClusterResourceScope,
);

impl OAuthClient {
    /// A client whose grants are approved automatically.
    pub fn auto_grant(name: &str) -> Self {
        Self {
            types: Some(Self::type_meta()),
            metadata: named(name),
            grant_method: Some(GrantHandlerType::Auto),
            ..Default::default()
        }
    }
}

/// An access token. The object's name is the bearer token itself.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthAccessToken {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, rename = "redirectURI", skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, rename = "userUID", skip_serializing_if = "Option::is_none")]
    pub user_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorize_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

openshift_object!(
    OAuthAccessToken,
    group = "oauth.openshift.io",
    version = "v1",
    kind = "OAuthAccessToken",
    plural = "oauthaccesstokens",
    scope = ClusterResourceScope,
);

impl OAuthAccessToken {
    /// A token named `token` issued by `client` to the user with the given name and uid.
    pub fn new<S>(token: &str, client: &str, user_name: &str, user_uid: &str, scopes: S) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            types: Some(Self::type_meta()),
            metadata: named(token),
            client_name: Some(client.to_string()),
            expires_in: Some(OAUTH_TOKEN_EXPIRES_IN),
            scopes: Some(scopes.into_iter().map(Into::into).collect()),
            redirect_uri: Some(OAUTH_TOKEN_REDIRECT_URI.to_string()),
            user_name: Some(user_name.to_string()),
            user_uid: Some(user_uid.to_string()),
            ..Default::default()
        }
    }
}
