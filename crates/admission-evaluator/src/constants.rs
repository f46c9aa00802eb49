pub const SCHEDULER_NAME: &str = "yunikorn";

pub const AUTOGEN_APP_PREFIX: &str = "yunikorn";
pub const AUTOGEN_APP_SUFFIX: &str = "autogen";
pub const DEFAULT_NAMESPACE: &str = "default";

/// Pods carrying `app=yunikorn` belong to the scheduler itself
pub const LABEL_APP: &str = "app";
pub const LABEL_APP_VALUE_YUNIKORN: &str = "yunikorn";

pub const CANONICAL_LABEL_APPLICATION_ID: &str = "yunikorn.apache.org/app-id";
pub const LABEL_APPLICATION_ID: &str = "applicationId";
pub const CANONICAL_LABEL_QUEUE_NAME: &str = "yunikorn.apache.org/queue";
pub const LABEL_QUEUE_NAME: &str = "queue";

pub const ANNOTATION_USER_INFO: &str = "yunikorn.apache.org/user.info";
pub const ANNOTATION_ALLOW_PREEMPTION: &str = "yunikorn.apache.org/allow-preemption";
pub const ANNOTATION_NAMESPACE_ENABLE_YUNIKORN: &str =
    "yunikorn.apache.org/namespace.enableYuniKorn";
pub const ANNOTATION_NAMESPACE_GENERATE_APP_ID: &str =
    "yunikorn.apache.org/namespace.generateAppId";

pub const PATCH_PATH_SCHEDULER_NAME: &str = "/spec/schedulerName";
pub const PATCH_PATH_LABELS: &str = "/metadata/labels";

pub const CONFIG_MAP_NAME: &str = "yunikorn-configs";
pub const CONFIG_MAP_QUEUES_KEY: &str = "queues.yaml";
pub const VALIDATE_CONF_PATH: &str = "/ws/v1/validate-conf";
