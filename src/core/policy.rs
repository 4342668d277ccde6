//! Per-joint compression policies.
//!
//! A [`PolicySet`] maps joint names to a [`JointPolicy`] through ordered
//! wildcard rules. Each joint policy says, per channel, whether the channel
//! may be deleted and how much error decimation may introduce.

use serde::{Deserialize, Serialize};

use super::clip::ChannelKind;
use super::skeleton::SkeletonProvider;
use crate::util::{Error, Result};

/// Whether a whole channel may be dropped.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Drop the channel regardless of content.
    Always,
    /// Keep the channel regardless of content.
    Never,
    /// Drop when every sample is within `tolerance` of the reference value.
    Auto { tolerance: f32 },
}

/// Settings for one channel of a joint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelPolicy {
    pub delete: DeletePolicy,
    /// Decimation tolerance: radians for rotation, metres or scale units otherwise.
    pub tolerance: f32,
}

impl ChannelPolicy {
    pub const fn new(delete: DeletePolicy, tolerance: f32) -> Self {
        Self { delete, tolerance }
    }

    fn default_rotation() -> Self {
        Self::new(DeletePolicy::Auto { tolerance: 1e-4 }, 5e-4)
    }

    fn default_position() -> Self {
        Self::new(DeletePolicy::Auto { tolerance: 1e-4 }, 1e-4)
    }
}

impl Default for ChannelPolicy {
    fn default() -> Self {
        Self::default_position()
    }
}

/// Policies for all channels of one joint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointPolicy {
    pub rotation: ChannelPolicy,
    pub position: ChannelPolicy,
    pub scale: ChannelPolicy,
}

impl JointPolicy {
    #[inline]
    pub fn channel(&self, kind: ChannelKind) -> &ChannelPolicy {
        match kind {
            ChannelKind::Rotation => &self.rotation,
            ChannelKind::Position => &self.position,
            ChannelKind::Scale => &self.scale,
        }
    }

    /// Same delete policy on every channel.
    pub fn with_delete(mut self, delete: DeletePolicy) -> Self {
        self.rotation.delete = delete;
        self.position.delete = delete;
        self.scale.delete = delete;
        self
    }
}

impl Default for JointPolicy {
    fn default() -> Self {
        Self {
            rotation: ChannelPolicy::default_rotation(),
            position: ChannelPolicy::default_position(),
            scale: ChannelPolicy::default_position(),
        }
    }
}

/// Joint name pattern and the policy it selects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Case-insensitive pattern; `*` matches any run, `?` one character.
    pub pattern: String,
    pub policy: JointPolicy,
}

/// Source of per-joint policies.
pub trait PolicyProvider {
    fn policy_for(&self, joint_name: &str) -> &JointPolicy;
}

/// Ordered rules with a fallback; the first matching rule wins.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySet {
    pub default: JointPolicy,
    pub rules: Vec<PolicyRule>,
}

impl PolicySet {
    pub fn new(default: JointPolicy) -> Self {
        Self { default, rules: Vec::new() }
    }

    pub fn with_rule(mut self, pattern: impl Into<String>, policy: JointPolicy) -> Self {
        self.rules.push(PolicyRule { pattern: pattern.into(), policy });
        self
    }

    /// Describe every rule that matches no joint of `skeleton`.
    pub fn unmatched_rules(&self, skeleton: &dyn SkeletonProvider) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| {
                !(0..skeleton.joint_count())
                    .filter_map(|i| skeleton.joint_name(i))
                    .any(|name| wildcard_match(&rule.pattern, name))
            })
            .map(|rule| format!("policy pattern '{}' matches no joint", rule.pattern))
            .collect()
    }

    /// Every tolerance must be finite and non-negative.
    pub fn check_tolerances(&self) -> Result<()> {
        let policies = std::iter::once(("default", &self.default))
            .chain(self.rules.iter().map(|r| (r.pattern.as_str(), &r.policy)));
        for (label, policy) in policies {
            for kind in ChannelKind::ALL {
                let ch = policy.channel(kind);
                let delete_tol = match ch.delete {
                    DeletePolicy::Auto { tolerance } => tolerance,
                    _ => 0.0,
                };
                for t in [ch.tolerance, delete_tol] {
                    if !t.is_finite() || t < 0.0 {
                        return Err(Error::config(format!(
                            "policy '{label}' has invalid {kind} tolerance {t}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl PolicyProvider for PolicySet {
    fn policy_for(&self, joint_name: &str) -> &JointPolicy {
        self.rules
            .iter()
            .find(|rule| wildcard_match(&rule.pattern, joint_name))
            .map_or(&self.default, |rule| &rule.policy)
    }
}

/// Case-insensitive glob match supporting `*` and `?`.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().flat_map(char::to_lowercase).collect();
    let n: Vec<char> = name.chars().flat_map(char::to_lowercase).collect();

    let (mut pi, mut ni) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ni));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ni = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Skeleton;
    use crate::util::Transform;

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("Bip01 *", "bip01 spine"));
        assert!(wildcard_match("*finger?", "Bip01 R Finger2"));
        assert!(!wildcard_match("*finger?", "Bip01 R Finger21"));
        assert!(wildcard_match("b*p*1", "Bip01"));
        assert!(!wildcard_match("hand", "hands"));
        assert!(wildcard_match("**pelvis", "Bip01 Pelvis"));
    }

    #[test]
    fn test_first_rule_wins() {
        let keep = JointPolicy::default().with_delete(DeletePolicy::Never);
        let drop = JointPolicy::default().with_delete(DeletePolicy::Always);
        let set = PolicySet::default()
            .with_rule("*Finger*", drop)
            .with_rule("*", keep);

        assert_eq!(set.policy_for("Bip01 L Finger0").rotation.delete, DeletePolicy::Always);
        assert_eq!(set.policy_for("Bip01 Head").rotation.delete, DeletePolicy::Never);
        assert_eq!(PolicySet::default().policy_for("x"), &JointPolicy::default());
    }

    #[test]
    fn test_unmatched_rules() {
        let mut skel = Skeleton::new();
        skel.add_joint("Bip01", None, Transform::IDENTITY).unwrap();
        let set = PolicySet::default()
            .with_rule("bip*", JointPolicy::default())
            .with_rule("tail*", JointPolicy::default());
        let warnings = set.unmatched_rules(&skel);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("tail*"));
    }

    #[test]
    fn test_check_tolerances() {
        let mut policy = JointPolicy::default();
        assert!(PolicySet::new(policy).check_tolerances().is_ok());
        policy.scale.delete = DeletePolicy::Auto { tolerance: -1.0 };
        assert!(PolicySet::new(policy).check_tolerances().is_err());
    }

    #[test]
    fn test_policy_json() {
        let json = r#"{
            "default": { "rotation": { "delete": { "mode": "never" }, "tolerance": 0.001 } },
            "rules": [ { "pattern": "*Twist*", "policy": { "position": { "delete": { "mode": "always" } } } } ]
        }"#;
        let set: PolicySet = serde_json::from_str(json).unwrap();
        assert_eq!(set.default.rotation.delete, DeletePolicy::Never);
        assert_eq!(set.default.rotation.tolerance, 0.001);
        assert_eq!(set.rules[0].policy.position.delete, DeletePolicy::Always);
        // unspecified fields fall back to defaults
        assert_eq!(set.rules[0].policy.rotation, JointPolicy::default().rotation);
    }
}
