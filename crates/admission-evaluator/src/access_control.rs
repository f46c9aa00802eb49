use k8s_openapi::api::authentication::v1::UserInfo;
use tracing::debug;

use crate::config::AdmissionConfig;
use crate::constants::ANNOTATION_USER_INFO;
use crate::errors::AccessControlError;
use crate::user_info::UserGroupInfo;

/// What has to happen to the user info annotation of an admitted object
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnnotationDecision {
    /// Leave the annotation as it is, or absent
    Keep,
    /// Set the annotation to the given value
    Set(String),
}

/// The user info annotation carried by an object, together with the value
/// it had before the operation (update requests only).
#[derive(Clone, Copy, Debug, Default)]
pub struct AnnotationReview<'a> {
    pub current: Option<&'a str>,
    pub baseline: Option<&'a str>,
    /// Stamp the submitter identity when the object carries no annotation
    pub generate_if_missing: bool,
}

/// Guards the user info annotation.
///
/// Controllers running inside of the cluster are trusted to propagate the
/// annotation they find on their parent object. Everybody else can assert an
/// identity only when listed among the external users or groups, unless the
/// authentication checks are bypassed altogether.
pub struct AccessControlEngine<'a> {
    config: &'a AdmissionConfig,
}

impl<'a> AccessControlEngine<'a> {
    pub fn new(config: &'a AdmissionConfig) -> Self {
        AccessControlEngine { config }
    }

    /// A system user (or a member of a system group) submitting while
    /// controllers are trusted. Only the identity is considered, never the
    /// namespace of the request.
    pub fn is_trusted_controller(&self, submitter: &UserInfo) -> bool {
        if !self.config.trust_controllers() {
            return false;
        }
        let system_users = self.config.system_users();
        username(submitter).is_some_and(|user| system_users.matches_any(user))
            || groups(submitter).any(|group| system_users.matches_any(group))
    }

    /// A submitter allowed to set the user info annotation on its own
    pub fn is_external_user(&self, submitter: &UserInfo) -> bool {
        username(submitter).is_some_and(|user| self.config.external_users().matches_any(user))
            || groups(submitter).any(|group| self.config.external_groups().matches_any(group))
    }

    pub fn review(
        &self,
        review: AnnotationReview<'_>,
        submitter: &UserInfo,
    ) -> Result<AnnotationDecision, AccessControlError> {
        if self.is_trusted_controller(submitter) {
            if let Some(value) = review.current {
                decode(value)?;
            }
            debug!(
                user = username(submitter).unwrap_or_default(),
                "trusted controller, user info annotation left untouched"
            );
            return Ok(AnnotationDecision::Keep);
        }

        if self.config.bypass_auth() {
            return match review.current {
                None => Ok(AnnotationDecision::Keep),
                Some(value) => {
                    let stripped = decode(value)?.stripped().to_annotation();
                    if stripped == value {
                        Ok(AnnotationDecision::Keep)
                    } else {
                        Ok(AnnotationDecision::Set(stripped))
                    }
                }
            };
        }

        match review.current {
            Some(value) => {
                let asserted = decode(value)?;
                // an unparsable baseline never matches
                let unchanged = review
                    .baseline
                    .and_then(|baseline| UserGroupInfo::from_annotation(baseline).ok())
                    .is_some_and(|baseline| baseline == asserted);
                if !unchanged && !self.is_external_user(submitter) {
                    return Err(AccessControlError::NotAllowed {
                        user: username(submitter).unwrap_or_default().to_owned(),
                        groups: groups(submitter).collect::<Vec<_>>().join(","),
                        annotation: ANNOTATION_USER_INFO,
                    });
                }
                Ok(AnnotationDecision::Keep)
            }
            None if review.generate_if_missing => Ok(AnnotationDecision::Set(
                UserGroupInfo::from(submitter).to_annotation(),
            )),
            None => Ok(AnnotationDecision::Keep),
        }
    }
}

fn decode(value: &str) -> Result<UserGroupInfo, AccessControlError> {
    UserGroupInfo::from_annotation(value).map_err(AccessControlError::InvalidAnnotation)
}

fn username(submitter: &UserInfo) -> Option<&str> {
    submitter.username.as_deref()
}

fn groups(submitter: &UserInfo) -> impl Iterator<Item = &str> {
    submitter.groups.iter().flatten().map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{admission_config, user, VALID_USER_INFO_ANNOTATION};
    use rstest::rstest;

    const DEPLOYMENT_CONTROLLER: &str = "system:serviceaccount:kube-system:deployment-controller";

    fn create(current: Option<&str>) -> AnnotationReview<'_> {
        AnnotationReview {
            current,
            baseline: None,
            generate_if_missing: true,
        }
    }

    #[rstest]
    #[case::user_match(DEPLOYMENT_CONTROLLER, &[], true, true)]
    #[case::group_match("someone", &["system:serviceaccount:kube-system:job-controller"], true, true)]
    #[case::not_trusted(DEPLOYMENT_CONTROLLER, &[], false, false)]
    #[case::no_match("testExtUser", &["dev"], true, false)]
    fn trusted_controller(
        #[case] name: &str,
        #[case] user_groups: &[&str],
        #[case] trust_controllers: bool,
        #[case] expected: bool,
    ) {
        let config = admission_config(false, trust_controllers);
        let engine = AccessControlEngine::new(&config);

        assert_eq!(
            engine.is_trusted_controller(&user(name, user_groups)),
            expected
        );
    }

    #[rstest]
    #[case::user("testExtUser", &[], true)]
    #[case::group("someone", &["dev", "testExtGroup"], true)]
    #[case::nobody("test", &["dev"], false)]
    fn external_user(#[case] name: &str, #[case] user_groups: &[&str], #[case] expected: bool) {
        let config = admission_config(false, true);
        let engine = AccessControlEngine::new(&config);

        assert_eq!(engine.is_external_user(&user(name, user_groups)), expected);
    }

    #[test]
    fn trusted_controller_keeps_existing_annotation() {
        let config = admission_config(false, true);
        let engine = AccessControlEngine::new(&config);

        let decision = engine
            .review(
                create(Some(VALID_USER_INFO_ANNOTATION)),
                &user(DEPLOYMENT_CONTROLLER, &["system:serviceaccounts"]),
            )
            .unwrap();
        assert_eq!(decision, AnnotationDecision::Keep);
    }

    #[test]
    fn trusted_controller_is_not_stamped() {
        let config = admission_config(false, true);
        let engine = AccessControlEngine::new(&config);

        let decision = engine
            .review(create(None), &user(DEPLOYMENT_CONTROLLER, &[]))
            .unwrap();
        assert_eq!(decision, AnnotationDecision::Keep);
    }

    #[test]
    fn trusted_controller_with_malformed_annotation() {
        let config = admission_config(false, true);
        let engine = AccessControlEngine::new(&config);

        let err = engine
            .review(create(Some("xyzxyz")), &user(DEPLOYMENT_CONTROLLER, &[]))
            .unwrap_err();
        assert!(matches!(err, AccessControlError::InvalidAnnotation(_)));
    }

    #[test]
    fn untrusted_controller_needs_whitelisting() {
        let config = admission_config(false, false);
        let engine = AccessControlEngine::new(&config);

        let err = engine
            .review(
                create(Some(VALID_USER_INFO_ANNOTATION)),
                &user(DEPLOYMENT_CONTROLLER, &[]),
            )
            .unwrap_err();
        assert!(err.to_string().contains("not allowed to set user annotation"));
    }

    #[rstest]
    #[case::strip_groups(Some(VALID_USER_INFO_ANNOTATION), AnnotationDecision::Set(r#"{"user":"test"}"#.to_owned()))]
    #[case::already_stripped(Some(r#"{"user":"test"}"#), AnnotationDecision::Keep)]
    #[case::normalized_formatting(Some(r#"{ "user": "test" }"#), AnnotationDecision::Set(r#"{"user":"test"}"#.to_owned()))]
    #[case::missing(None, AnnotationDecision::Keep)]
    fn bypass_auth(#[case] current: Option<&str>, #[case] expected: AnnotationDecision) {
        let config = admission_config(true, true);
        let engine = AccessControlEngine::new(&config);

        let decision = engine.review(create(current), &user("test", &["dev"])).unwrap();
        assert_eq!(decision, expected);
    }

    #[test]
    fn bypass_auth_with_malformed_annotation() {
        let config = admission_config(true, true);
        let engine = AccessControlEngine::new(&config);

        let err = engine
            .review(create(Some("xyzxyz")), &user("test", &[]))
            .unwrap_err();
        assert!(err.to_string().contains("invalid user info annotation"));
    }

    #[test]
    fn untrusted_submitter_cannot_set_annotation() {
        let config = admission_config(false, true);
        let engine = AccessControlEngine::new(&config);

        let err = engine
            .review(
                create(Some(VALID_USER_INFO_ANNOTATION)),
                &user("test", &["dev"]),
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "user test with groups [dev] is not allowed to set user annotation yunikorn.apache.org/user.info"
        );
    }

    #[test]
    fn external_submitter_can_set_annotation() {
        let config = admission_config(false, true);
        let engine = AccessControlEngine::new(&config);

        let decision = engine
            .review(
                create(Some(VALID_USER_INFO_ANNOTATION)),
                &user("testExtUser", &["dev"]),
            )
            .unwrap();
        assert_eq!(decision, AnnotationDecision::Keep);
    }

    #[test]
    fn external_submitter_with_malformed_annotation() {
        let config = admission_config(false, true);
        let engine = AccessControlEngine::new(&config);

        let err = engine
            .review(create(Some("xyzxyz")), &user("testExtUser", &[]))
            .unwrap_err();
        assert!(err.to_string().contains("expected value"));
    }

    #[test]
    fn unchanged_annotation_is_not_a_new_assertion() {
        let config = admission_config(false, true);
        let engine = AccessControlEngine::new(&config);

        let decision = engine
            .review(
                AnnotationReview {
                    current: Some(VALID_USER_INFO_ANNOTATION),
                    baseline: Some(VALID_USER_INFO_ANNOTATION),
                    generate_if_missing: true,
                },
                &user("test", &["dev"]),
            )
            .unwrap();
        assert_eq!(decision, AnnotationDecision::Keep);
    }

    #[test]
    fn untrusted_submitter_with_malformed_annotation() {
        let config = admission_config(false, true);
        let engine = AccessControlEngine::new(&config);

        let err = engine
            .review(create(Some("xyzxyz")), &user("test", &["dev"]))
            .unwrap_err();
        assert!(matches!(err, AccessControlError::InvalidAnnotation(_)));
        assert!(err.to_string().starts_with("invalid user info annotation"));
    }

    #[test]
    fn reformatted_annotation_is_not_a_new_assertion() {
        let config = admission_config(false, true);
        let engine = AccessControlEngine::new(&config);

        let decision = engine
            .review(
                AnnotationReview {
                    current: Some(r#"{ "user": "test", "groups": ["dev"] }"#),
                    baseline: Some(r#"{"user":"test","groups":["dev"]}"#),
                    generate_if_missing: true,
                },
                &user("test", &["dev"]),
            )
            .unwrap();
        assert_eq!(decision, AnnotationDecision::Keep);
    }

    #[test]
    fn unparsable_baseline_needs_whitelisting() {
        let config = admission_config(false, true);
        let engine = AccessControlEngine::new(&config);

        let result = engine.review(
            AnnotationReview {
                current: Some(VALID_USER_INFO_ANNOTATION),
                baseline: Some("xyzxyz"),
                generate_if_missing: true,
            },
            &user("test", &["dev"]),
        );
        assert!(matches!(result, Err(AccessControlError::NotAllowed { .. })));
    }

    #[test]
    fn changed_annotation_needs_whitelisting() {
        let config = admission_config(false, true);
        let engine = AccessControlEngine::new(&config);

        let result = engine.review(
            AnnotationReview {
                current: Some(r#"{"user":"someone-else"}"#),
                baseline: Some(VALID_USER_INFO_ANNOTATION),
                generate_if_missing: true,
            },
            &user("test", &["dev"]),
        );
        assert!(matches!(result, Err(AccessControlError::NotAllowed { .. })));
    }

    #[rstest]
    #[case::generated(true, AnnotationDecision::Set(r#"{"user":"test","groups":["dev"]}"#.to_owned()))]
    #[case::not_generated(false, AnnotationDecision::Keep)]
    fn missing_annotation(#[case] generate_if_missing: bool, #[case] expected: AnnotationDecision) {
        let config = admission_config(false, true);
        let engine = AccessControlEngine::new(&config);

        let decision = engine
            .review(
                AnnotationReview {
                    current: None,
                    baseline: None,
                    generate_if_missing,
                },
                &user("test", &["dev"]),
            )
            .unwrap();
        assert_eq!(decision, expected);
    }
}
