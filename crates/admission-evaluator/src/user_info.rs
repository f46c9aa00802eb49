use k8s_openapi::api::authentication::v1::UserInfo;
use serde::{Deserialize, Serialize};

/// The submitter identity stored inside of the `yunikorn.apache.org/user.info`
/// annotation. The scheduler enforces the queue ACLs against it.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct UserGroupInfo {
    pub user: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl UserGroupInfo {
    pub fn from_annotation(value: &str) -> serde_json::Result<Self> {
        serde_json::from_str(value)
    }

    pub fn to_annotation(&self) -> String {
        // a struct made only of strings always serializes
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Drop the groups, keep only the user name
    pub fn stripped(&self) -> Self {
        UserGroupInfo {
            user: self.user.clone(),
            groups: Vec::new(),
        }
    }
}

impl From<&UserInfo> for UserGroupInfo {
    fn from(user_info: &UserInfo) -> Self {
        let mut groups: Vec<String> = Vec::new();
        for group in user_info.groups.iter().flatten() {
            if !groups.contains(group) {
                groups.push(group.clone());
            }
        }
        UserGroupInfo {
            user: user_info.username.clone().unwrap_or_default(),
            groups,
        }
    }
}
