//! Kubernetes object references
//!
//! Value types that point at other objects by coordinates (name, namespace,
//! cluster, group/version/kind) without depending on their schemas.
//! Nothing here resolves a reference; lookups are the reconciler's job.

use std::fmt;

use k8s_openapi::api::core::v1::ObjectReference;
use kube::core::GroupVersionKind;
use kube::Resource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator used in canonical string forms
pub const SEPARATOR: char = '/';

/// Namespace/name coordinate used to look an object up in a store.
///
/// Displays as `namespace/name`. The separator is always written, so a
/// cluster-scoped key renders as `/name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Namespace of the object, empty for cluster-scoped objects
    pub namespace: String,

    /// Name of the object
    pub name: String,
}

impl ObjectKey {
    /// Key for `name` in `namespace`; pass an empty namespace for cluster-scoped objects
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, SEPARATOR, self.name)
    }
}

/// References a namespace-scoped object by name and namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    /// Name of the object
    pub name: String,

    /// Namespace of the object
    pub namespace: String,
}

impl ObjectRef {
    /// Reference to `name` in `namespace`
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Reference to any addressable object.
    ///
    /// Never fails: an unnamed object or a cluster-scoped one yields empty
    /// strings for the missing coordinates.
    pub fn from_object<K: Resource>(obj: &K) -> Self {
        let meta = obj.meta();
        Self {
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone().unwrap_or_default(),
        }
    }

    /// Namespace and name of the referenced object
    pub fn object_key(&self) -> ObjectKey {
        ObjectKey::new(&*self.namespace, &*self.name)
    }
}

impl From<ObjectRef> for ObjectKey {
    fn from(r: ObjectRef) -> Self {
        Self {
            namespace: r.namespace,
            name: r.name,
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.object_key(), f)
    }
}

/// References an object by name, namespace and cluster.
///
/// Used by multi-cluster APIs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ClusterObjectRef {
    /// Name of the object
    pub name: String,

    /// Namespace of the object
    pub namespace: String,

    /// ID of the cluster the object lives in
    pub cluster_id: String,
}

impl ClusterObjectRef {
    /// Namespace and name of the referenced object
    pub fn object_key(&self) -> ObjectKey {
        ObjectKey::new(&*self.namespace, &*self.name)
    }
}

impl fmt::Display for ClusterObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.cluster_id,
            self.namespace,
            self.name,
            sep = SEPARATOR
        )
    }
}

/// References an object by group, version, kind, name and namespace.
///
/// A reference may carry full type identity before it addresses an instance
/// (a template, for example); see [`TypedObjectRef::object_key_not_set`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct TypedObjectRef {
    /// API group of the object, empty for the core group
    pub group: String,

    /// API version of the object
    pub version: String,

    /// Kind of the object
    pub kind: String,

    /// Name of the object
    pub name: String,

    /// Namespace of the object
    pub namespace: String,
}

impl TypedObjectRef {
    /// Reference to a statically typed object, taking group/version/kind from its type
    pub fn for_object<K>(obj: &K) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        let meta = obj.meta();
        Self {
            group: K::group(&()).into_owned(),
            version: K::version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone().unwrap_or_default(),
        }
    }

    /// Group, version and kind of the referenced object
    pub fn group_version_kind(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }

    /// Namespace and name of the referenced object
    pub fn object_key(&self) -> ObjectKey {
        ObjectKey::new(&*self.namespace, &*self.name)
    }

    /// True when no instance is addressed. Group, version and kind are not considered.
    pub fn object_key_not_set(&self) -> bool {
        self.name.is_empty() && self.namespace.is_empty()
    }

    /// `version` for the core group, `group/version` otherwise
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}{}{}", self.group, SEPARATOR, self.version)
        }
    }

    /// Projects to a core/v1 `ObjectReference` with kind, name, namespace and apiVersion populated.
    pub fn to_core_object_reference(&self) -> ObjectReference {
        ObjectReference {
            api_version: Some(self.api_version()),
            kind: Some(self.kind.clone()),
            name: Some(self.name.clone()),
            namespace: Some(self.namespace.clone()),
            ..Default::default()
        }
    }
}

impl fmt::Display for TypedObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}, Kind={}: {}",
            self.group,
            SEPARATOR,
            self.version,
            self.kind,
            self.object_key()
        )
    }
}

impl TryFrom<&ObjectReference> for TypedObjectRef {
    type Error = Error;

    fn try_from(r: &ObjectReference) -> Result<Self> {
        let api_version = r
            .api_version
            .as_deref()
            .ok_or(Error::MissingField("apiVersion"))?;
        let (group, version) = split_api_version(api_version)?;
        let kind = r.kind.clone().ok_or(Error::MissingField("kind"))?;
        let name = r.name.clone().ok_or(Error::MissingField("name"))?;

        Ok(Self {
            group: group.to_string(),
            version: version.to_string(),
            kind,
            name,
            namespace: r.namespace.clone().unwrap_or_default(),
        })
    }
}

fn split_api_version(api_version: &str) -> Result<(&str, &str)> {
    let (group, version) = match api_version.split_once(SEPARATOR) {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    };
    let empty_group = group.is_empty() && api_version.contains(SEPARATOR);
    if version.is_empty() || version.contains(SEPARATOR) || empty_group {
        return Err(Error::InvalidApiVersion(api_version.to_string()));
    }
    Ok((group, version))
}

/// References an object by name and optionally by namespace.
///
/// Defaulting of an absent namespace is decided by the API embedding this type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct NamedObjectRef {
    /// Name of the object
    pub name: String,

    /// Namespace of the object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl NamedObjectRef {
    /// Key for this reference, falling back to `default_namespace` when none is set
    pub fn object_key_or(&self, default_namespace: &str) -> ObjectKey {
        let namespace = self.namespace.as_deref().unwrap_or(default_namespace);
        ObjectKey::new(namespace, &*self.name)
    }
}
