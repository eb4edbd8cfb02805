//! Capabilities a resource exposes to FSM controllers
//!
//! A controller does not care about a resource's concrete schema, only that
//! it is addressable ([`kube::Resource`]), carries conditions
//! ([`Conditioned`]) and, depending on the controller, tracks child objects
//! ([`ResourceManager`]) or takes part in a claim pairing
//! ([`ClaimResource`] / [`ClaimedResource`]). The composite traits below are
//! implemented automatically for any type with the right capabilities.

use kube::Resource;
use tracing::debug;

use crate::condition::{Condition, ConditionType, ConditionedStatus};
use crate::reference::TypedObjectRef;

/// A resource whose status carries conditions.
pub trait Conditioned {
    /// `metadata.generation` of the resource the conditions live on
    fn generation(&self) -> i64;

    /// The resource's conditions, `None` while it has no status yet
    fn conditioned_status(&self) -> Option<&ConditionedStatus>;

    /// The resource's conditions, creating an empty status if needed
    fn conditioned_status_mut(&mut self) -> &mut ConditionedStatus;

    /// Stored conditions, empty while the resource has no status
    fn conditions(&self) -> &[Condition] {
        self.conditioned_status()
            .map(ConditionedStatus::conditions)
            .unwrap_or_default()
    }

    /// Stored condition of type `ct`, or an `Unknown` condition of that type
    fn get_condition(&self, ct: &ConditionType) -> Condition {
        match self.conditioned_status() {
            Some(status) => status.get_condition(ct),
            None => ConditionedStatus::default().get_condition(ct),
        }
    }

    /// Merges `conditions` into the status; see [`ConditionedStatus::set_conditions`]
    fn set_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>)
    where
        Self: Sized,
    {
        self.conditioned_status_mut().set_conditions(conditions);
    }

    /// Like [`Conditioned::set_conditions`], stamping each condition with the
    /// current generation first
    fn set_observed_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>)
    where
        Self: Sized,
    {
        let generation = self.generation();
        self.conditioned_status_mut().set_conditions(
            conditions
                .into_iter()
                .map(|c| c.with_observed_generation(generation)),
        );
    }
}

/// A resource that manages a set of child resources.
pub trait ResourceManager {
    /// References to the child resources managed by the controller
    fn managed_resources(&self) -> &[TypedObjectRef];

    /// Replaces the child references
    fn set_managed_resources(&mut self, refs: Vec<TypedObjectRef>);
}

/// A resource that can be claimed; it points back at its claim.
pub trait ClaimedResource {
    /// Reference to the claim that created this resource
    fn claim_ref(&self) -> Option<&TypedObjectRef>;

    /// Records or clears the claim reference
    fn set_claim_ref(&mut self, claim_ref: Option<TypedObjectRef>);
}

/// A claim; it points at the resource it claimed.
pub trait ClaimResource {
    /// Reference to the resource claimed by this claim
    fn claimed_ref(&self) -> Option<&TypedObjectRef>;

    /// Records or clears the claimed-resource reference
    fn set_claimed_ref(&mut self, claimed_ref: Option<TypedObjectRef>);
}

/// Addressable and conditioned.
pub trait ConditionedResource: Resource + Conditioned {}

impl<T: Resource + Conditioned> ConditionedResource for T {}

/// Conditioned resource that also tracks its children.
pub trait FsmResource: ConditionedResource + ResourceManager {}

impl<T: ConditionedResource + ResourceManager> FsmResource for T {}

/// FSM resource acting as the claimed side of a pairing.
pub trait ClaimedType: FsmResource + ClaimedResource {}

impl<T: FsmResource + ClaimedResource> ClaimedType for T {}

/// Conditioned resource acting as the claim side of a pairing.
pub trait ClaimType: ConditionedResource + ClaimResource {}

impl<T: ConditionedResource + ClaimResource> ClaimType for T {}

/// Points `claim` and `claimed` at each other.
pub fn bind_claim<C, D>(claim: &mut C, claimed: &mut D)
where
    C: ClaimType + Resource<DynamicType = ()>,
    D: ClaimedType + Resource<DynamicType = ()>,
{
    let claim_ref = TypedObjectRef::for_object(&*claim);
    let claimed_ref = TypedObjectRef::for_object(&*claimed);
    debug!("Binding claim {} to {}", claim_ref, claimed_ref);

    claim.set_claimed_ref(Some(claimed_ref));
    claimed.set_claim_ref(Some(claim_ref));
}

/// True when `claim` and `claimed` reference each other.
pub fn is_bound<C, D>(claim: &C, claimed: &D) -> bool
where
    C: ClaimType + Resource<DynamicType = ()>,
    D: ClaimedType + Resource<DynamicType = ()>,
{
    claim.claimed_ref() == Some(&TypedObjectRef::for_object(claimed))
        && claimed.claim_ref() == Some(&TypedObjectRef::for_object(claim))
}
