//! Status conditions
//!
//! A [`ConditionedStatus`] holds at most one [`Condition`] per
//! [`ConditionType`]. Controllers record facts through
//! [`ConditionedStatus::set_conditions`], which replaces a stored condition
//! only when it actually changed, so re-asserting an unchanged fact keeps its
//! `lastTransitionTime` and produces no status diff.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::Error;
use crate::reference::ObjectRef;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
        #[serde(transparent)]
        pub struct $name(Cow<'static, str>);

        impl $name {
            /// Builds a value from a static string without allocating
            pub const fn from_static(s: &'static str) -> Self {
                Self(Cow::Borrowed(s))
            }

            /// The underlying string
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True for the empty string
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(Cow::Owned(s.to_string()))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(Cow::Owned(s))
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

string_newtype!(
    /// The kind of fact a condition records.
    ///
    /// Any string is a valid type; controllers add their own next to the
    /// built-in ones.
    ConditionType
);

impl ConditionType {
    /// Whether the resource has been successfully and completely processed
    pub const READY: Self = Self::from_static("Ready");

    /// Whether the resource is in sync with what its controller last wrote
    pub const SYNCED: Self = Self::from_static("Synced");

    /// Whether every object the resource references exists
    pub const REFERENCES_VALID: Self = Self::from_static("ReferencesValid");
}

string_newtype!(
    /// Short CamelCase cause code for a condition's current status.
    ConditionReason
);

impl ConditionReason {
    /// Ready: the resource is available for use
    pub const AVAILABLE: Self = Self::from_static("Available");
    /// Ready: the resource should be available but is not
    pub const UNAVAILABLE: Self = Self::from_static("Unavailable");
    /// Ready: the resource is being created
    pub const CREATING: Self = Self::from_static("Creating");
    /// Ready: the resource is being deleted
    pub const DELETING: Self = Self::from_static("Deleting");

    /// Synced: the last reconcile succeeded
    pub const RECONCILE_SUCCESS: Self = Self::from_static("ReconcileSuccess");
    /// Synced: the last reconcile failed
    pub const RECONCILE_ERROR: Self = Self::from_static("ReconcileError");

    /// ReferencesValid: every referenced object exists
    pub const REFERENCED_OBJECTS_EXIST: Self = Self::from_static("ReferencedObjectsExist");
}

/// Status of a condition
///
/// `Unset` is the zero value and reads and writes as `""`, the way an
/// uninitialised status appears on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    /// The condition holds
    True,
    /// The condition does not hold
    False,
    /// The controller cannot tell whether the condition holds
    Unknown,
    /// No status has been set
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl ConditionStatus {
    /// Wire form of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
            Self::Unset => "",
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "True" => Ok(Self::True),
            "False" => Ok(Self::False),
            "Unknown" => Ok(Self::Unknown),
            "" => Ok(Self::Unset),
            _ => Err(Error::InvalidConditionStatus(s.to_string())),
        }
    }
}

/// A condition that may apply to a resource.
///
/// The derived `PartialEq` compares every field; use [`Condition::equal`]
/// to compare facts regardless of when they were recorded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of this condition. At most one of each type applies to a resource.
    pub r#type: ConditionType,

    /// Is the condition True, False, or Unknown? Empty when never set.
    pub status: ConditionStatus,

    /// The `metadata.generation` this condition was computed against.
    /// A value lower than the live generation means the condition is stale.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub observed_generation: i64,

    /// Last time the condition transitioned from one status to another
    #[serde(default, with = "rfc3339")]
    #[schemars(with = "DateTime<Utc>")]
    pub last_transition_time: DateTime<Utc>,

    /// Reason for the last transition
    pub reason: ConditionReason,

    /// Details about the last transition, if any
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

impl Condition {
    /// Same fact as `other`, ignoring `last_transition_time`
    pub fn equal(&self, other: &Condition) -> bool {
        self.r#type == other.r#type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
            && self.observed_generation == other.observed_generation
    }

    /// Returns this condition with `message` replacing the existing one
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Returns this condition stamped with the generation it was computed against
    #[must_use]
    pub fn with_observed_generation(mut self, generation: i64) -> Self {
        self.observed_generation = generation;
        self
    }

    /// True when nothing has been set.
    ///
    /// Distinct from the absence sentinel returned by
    /// [`ConditionedStatus::get_condition`], which carries its type and an
    /// `Unknown` status.
    pub fn is_empty(&self) -> bool {
        self.r#type.is_empty()
            && self.status == ConditionStatus::Unset
            && self.reason.is_empty()
            && self.message.is_empty()
    }

    /// True when the condition was computed against an older generation than `generation`
    pub fn is_stale(&self, generation: i64) -> bool {
        self.observed_generation < generation
    }
}

/// Observed status of a resource as a list of conditions, one per type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConditionedStatus {
    /// Conditions of the resource
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl ConditionedStatus {
    /// Status with the supplied conditions merged in order
    pub fn new(conditions: impl IntoIterator<Item = Condition>) -> Self {
        let mut status = Self::default();
        status.set_conditions(conditions);
        status
    }

    /// Stored conditions in insertion order
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// True when no condition is stored
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Stored condition of type `ct`.
    ///
    /// When none is stored, returns `Condition { type: ct, status: Unknown }`
    /// with every other field at its zero value.
    pub fn get_condition(&self, ct: &ConditionType) -> Condition {
        self.conditions
            .iter()
            .find(|c| &c.r#type == ct)
            .cloned()
            .unwrap_or_else(|| Condition {
                r#type: ct.clone(),
                status: ConditionStatus::Unknown,
                ..Default::default()
            })
    }

    /// Merges `conditions` into the status, in order.
    ///
    /// A condition whose type is not stored yet is appended. One whose type is
    /// stored replaces the stored entry unless the two are [`Condition::equal`],
    /// in which case the stored entry and its transition time are kept.
    pub fn set_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        for new in conditions {
            match self.conditions.iter().position(|c| c.r#type == new.r#type) {
                Some(i) if self.conditions[i].equal(&new) => {
                    trace!("Condition {} unchanged ({})", new.r#type, new.status);
                }
                Some(i) => {
                    let old = &self.conditions[i];
                    debug!(
                        "Condition {} changed: {}/{} -> {}/{}",
                        new.r#type, old.status, old.reason, new.status, new.reason
                    );
                    self.conditions[i] = new;
                }
                None => {
                    debug!("Condition {} added: {}/{}", new.r#type, new.status, new.reason);
                    self.conditions.push(new);
                }
            }
        }
    }

    /// Same conditions as `other`, ignoring order and transition times
    pub fn equal(&self, other: &ConditionedStatus) -> bool {
        if self.conditions.len() != other.conditions.len() {
            return false;
        }

        let mut sc = self.conditions.clone();
        let mut oc = other.conditions.clone();
        sc.sort_by(|a, b| a.r#type.cmp(&b.r#type));
        oc.sort_by(|a, b| a.r#type.cmp(&b.r#type));

        sc.iter().zip(&oc).all(|(a, b)| a.equal(b))
    }
}

/// Compares two optional statuses: both absent, or both present and [`ConditionedStatus::equal`].
pub fn status_equal(a: Option<&ConditionedStatus>, b: Option<&ConditionedStatus>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.equal(b),
        _ => false,
    }
}

fn new_condition(
    r#type: ConditionType,
    status: ConditionStatus,
    reason: ConditionReason,
    message: String,
) -> Condition {
    Condition {
        r#type,
        status,
        observed_generation: 0,
        last_transition_time: Utc::now(),
        reason,
        message,
    }
}

/// The resource is currently being created.
pub fn creating() -> Condition {
    new_condition(
        ConditionType::READY,
        ConditionStatus::False,
        ConditionReason::CREATING,
        String::new(),
    )
}

/// The resource is currently being deleted.
pub fn deleting() -> Condition {
    new_condition(
        ConditionType::READY,
        ConditionStatus::False,
        ConditionReason::DELETING,
        String::new(),
    )
}

/// The resource is observed to be available for use.
pub fn available() -> Condition {
    new_condition(
        ConditionType::READY,
        ConditionStatus::True,
        ConditionReason::AVAILABLE,
        String::new(),
    )
}

/// The resource is expected to be available but is known not to be,
/// for example because its API reports it unhealthy.
pub fn unavailable() -> Condition {
    new_condition(
        ConditionType::READY,
        ConditionStatus::False,
        ConditionReason::UNAVAILABLE,
        String::new(),
    )
}

/// The most recent reconciliation of the resource completed.
pub fn reconcile_success() -> Condition {
    new_condition(
        ConditionType::SYNCED,
        ConditionStatus::True,
        ConditionReason::RECONCILE_SUCCESS,
        String::new(),
    )
}

/// Reconciling the resource failed with `err`.
pub fn reconcile_error(err: impl fmt::Display) -> Condition {
    new_condition(
        ConditionType::SYNCED,
        ConditionStatus::False,
        ConditionReason::RECONCILE_ERROR,
        err.to_string(),
    )
}

/// Every referenced object exists.
pub fn references_valid() -> Condition {
    new_condition(
        ConditionType::REFERENCES_VALID,
        ConditionStatus::True,
        ConditionReason::REFERENCED_OBJECTS_EXIST,
        "All object references are valid.".to_string(),
    )
}

/// Some referenced objects do not exist.
pub fn references_invalid(reason: impl Into<ConditionReason>, missing_refs: &[ObjectRef]) -> Condition {
    let missing = missing_refs
        .iter()
        .map(|r| r.object_key().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    new_condition(
        ConditionType::REFERENCES_VALID,
        ConditionStatus::False,
        reason.into(),
        format!("Referenced objects are not found: {}", missing),
    )
}

/// `lastTransitionTime` in the Kubernetes wire format: RFC 3339, whole seconds, `Z` suffix.
mod rfc3339 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    // The API server writes a zero time as null. Null and "" read as the epoch.

    pub fn serialize<S: Serializer>(t: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let Some(s) = Option::<String>::deserialize(d)? else {
            return Ok(DateTime::default());
        };
        if s.is_empty() {
            return Ok(DateTime::default());
        }
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    fn cond(ty: &str, status: ConditionStatus, reason: &str) -> Condition {
        Condition {
            r#type: ty.into(),
            status,
            reason: reason.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_set_on_empty_status() {
        let c = available();
        let mut status = ConditionedStatus::default();
        status.set_conditions([c.clone()]);
        assert_eq!(status.conditions(), &[c]);
    }

    #[test]
    fn test_equal_condition_keeps_transition_time() {
        let first = cond("Ready", ConditionStatus::True, "Available");
        let c1 = Condition { last_transition_time: at(100), ..first.clone() };
        let c2 = Condition { last_transition_time: at(200), ..first };
        assert!(c1.equal(&c2), "Conditions differing only in time should be equal");

        let mut status = ConditionedStatus::new([c1]);
        status.set_conditions([c2]);

        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].last_transition_time, at(100));
    }

    #[test]
    fn test_changed_condition_replaces_existing() {
        let c1 = cond("Ready", ConditionStatus::False, "Creating");
        let c2 = cond("Ready", ConditionStatus::True, "Available");

        let mut status = ConditionedStatus::new([c1]);
        status.set_conditions([c2.clone()]);

        assert_eq!(status.conditions, vec![c2]);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut status = ConditionedStatus::new([
            cond("Ready", ConditionStatus::False, "Creating"),
            cond("Synced", ConditionStatus::True, "ReconcileSuccess"),
        ]);
        status.set_conditions([cond("Ready", ConditionStatus::True, "Available")]);

        let types: Vec<&str> = status.conditions.iter().map(|c| c.r#type.as_str()).collect();
        assert_eq!(types, vec!["Ready", "Synced"]);
        assert_eq!(status.conditions[0].reason, "Available");
    }

    #[test]
    fn test_last_of_same_type_wins() {
        let status = ConditionedStatus::new([
            cond("Ready", ConditionStatus::False, "Creating"),
            cond("Ready", ConditionStatus::False, "Unavailable"),
            cond("Ready", ConditionStatus::True, "Available"),
        ]);
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].reason, ConditionReason::AVAILABLE);
    }

    #[test]
    fn test_set_conditions_idempotent() {
        let c = reconcile_error("boom");
        let mut once = ConditionedStatus::default();
        once.set_conditions([c.clone()]);

        let mut twice = once.clone();
        twice.set_conditions([c]);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_observed_generation_change_replaces() {
        let c1 = available().with_observed_generation(1);
        let c2 = c1.clone().with_observed_generation(2);
        assert!(!c1.equal(&c2));

        let mut status = ConditionedStatus::new([c1]);
        status.set_conditions([c2]);
        assert_eq!(status.get_condition(&ConditionType::READY).observed_generation, 2);
    }

    #[test]
    fn test_get_condition_absent_sentinel() {
        let status = ConditionedStatus::default();
        let c = status.get_condition(&ConditionType::SYNCED);

        assert_eq!(c.r#type, ConditionType::SYNCED);
        assert_eq!(c.status, ConditionStatus::Unknown);
        assert!(c.reason.is_empty());
        assert!(c.message.is_empty());
        assert!(!c.is_empty(), "Sentinel carries its type and is not empty");
        assert!(Condition::default().is_empty());
    }

    #[test]
    fn test_is_empty_considers_every_set_field() {
        assert!(!cond("", ConditionStatus::True, "").is_empty());
        assert!(!Condition::default().with_message("x").is_empty());
    }

    #[test]
    fn test_unknown_status_is_not_empty() {
        let c = Condition {
            status: ConditionStatus::Unknown,
            ..Default::default()
        };
        assert!(!c.is_empty(), "Unknown is a real status, not an unset one");
        assert!(Condition::default().is_empty());
        assert_eq!(Condition::default().status, ConditionStatus::Unset);
    }

    #[test]
    fn test_creating_then_reconcile_success() {
        let mut status = ConditionedStatus::new([creating()]);
        status.set_conditions([reconcile_success()]);

        let got: Vec<(&str, ConditionStatus, &str)> = status
            .conditions
            .iter()
            .map(|c| (c.r#type.as_str(), c.status, c.reason.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("Ready", ConditionStatus::False, "Creating"),
                ("Synced", ConditionStatus::True, "ReconcileSuccess"),
            ]
        );
    }

    #[test]
    fn test_constructors() {
        let table = [
            (creating(), "Ready", ConditionStatus::False, "Creating"),
            (deleting(), "Ready", ConditionStatus::False, "Deleting"),
            (available(), "Ready", ConditionStatus::True, "Available"),
            (unavailable(), "Ready", ConditionStatus::False, "Unavailable"),
            (reconcile_success(), "Synced", ConditionStatus::True, "ReconcileSuccess"),
            (references_valid(), "ReferencesValid", ConditionStatus::True, "ReferencedObjectsExist"),
        ];
        for (c, ty, status, reason) in table {
            assert_eq!(c.r#type, ty);
            assert_eq!(c.status, status, "status of {}", ty);
            assert_eq!(c.reason, reason);
            assert_eq!(c.observed_generation, 0);
        }
        assert_eq!(references_valid().message, "All object references are valid.");
    }

    #[test]
    fn test_reconcile_error_message() {
        let c = reconcile_error(Error::MissingField("name"));
        assert_eq!(c.r#type, ConditionType::SYNCED);
        assert_eq!(c.status, ConditionStatus::False);
        assert_eq!(c.reason, ConditionReason::RECONCILE_ERROR);
        assert_eq!(c.message, "Missing required field: name");

        assert_eq!(reconcile_error("").message, "");
    }

    #[test]
    fn test_references_invalid_message() {
        let c = references_invalid(
            "MissingDeps",
            &[ObjectRef::new("ns1", "foo"), ObjectRef::new("ns1", "bar")],
        );
        assert_eq!(c.r#type, ConditionType::REFERENCES_VALID);
        assert_eq!(c.status, ConditionStatus::False);
        assert_eq!(c.reason, "MissingDeps");
        assert_eq!(c.message, "Referenced objects are not found: ns1/foo, ns1/bar");
    }

    #[test]
    fn test_status_equal_ignores_order_and_time() {
        let ready = cond("Ready", ConditionStatus::True, "Available");
        let synced = cond("Synced", ConditionStatus::True, "ReconcileSuccess");

        let a = ConditionedStatus::new([ready.clone(), synced.clone()]);
        let b = ConditionedStatus::new([
            Condition { last_transition_time: at(42), ..synced },
            ready,
        ]);

        assert!(a.equal(&a));
        assert!(a.equal(&b));
        assert!(b.equal(&a));
        assert_eq!(a.conditions[0].r#type, "Ready", "Comparison must not reorder inputs");
    }

    #[test]
    fn test_status_equal_detects_differences() {
        let a = ConditionedStatus::new([available()]);
        let b = ConditionedStatus::new([unavailable()]);
        let c = ConditionedStatus::new([available(), reconcile_success()]);

        assert!(!a.equal(&b));
        assert!(!a.equal(&c));
        assert!(!c.equal(&a));
    }

    #[test]
    fn test_status_equal_optional() {
        let s = ConditionedStatus::new([available()]);
        assert!(status_equal(None, None));
        assert!(!status_equal(Some(&s), None));
        assert!(!status_equal(None, Some(&s)));
        assert!(status_equal(Some(&s), Some(&s.clone())));
    }

    #[test]
    fn test_is_stale() {
        let c = available().with_observed_generation(3);
        assert!(c.is_stale(4));
        assert!(!c.is_stale(3));
    }

    #[test]
    fn test_condition_status_parse() {
        assert_eq!("True".parse::<ConditionStatus>(), Ok(ConditionStatus::True));
        assert_eq!("Unknown".parse::<ConditionStatus>(), Ok(ConditionStatus::Unknown));
        assert_eq!(
            "true".parse::<ConditionStatus>(),
            Err(Error::InvalidConditionStatus("true".to_string()))
        );
        assert_eq!(ConditionStatus::False.to_string(), "False");
        assert_eq!("".parse::<ConditionStatus>(), Ok(ConditionStatus::Unset));
        assert_eq!(ConditionStatus::Unset.to_string(), "");
    }

    #[test]
    fn test_custom_condition_type() {
        let ty = ConditionType::from("BackupComplete");
        let mut status = ConditionedStatus::new([available()]);
        status.set_conditions([cond("BackupComplete", ConditionStatus::True, "Done")]);

        assert_eq!(status.get_condition(&ty).reason, "Done");
        assert_eq!(ty.to_string(), "BackupComplete");
    }
}
