//! Controller ownership checks.
//!
//! Only an owner reference with `controller: true` hands deletion authority
//! to another component. Advisory references (controller unset or false) do
//! not, since nothing guarantees their owner will clean the object up.

use kubesweep_core::{Metadata, OwnerReference};

/// Returns the controlling owner reference, if any.
#[must_use]
pub fn controller_owner<M: Metadata + ?Sized>(object: &M) -> Option<&OwnerReference> {
    object
        .owner_references()
        .iter()
        .find(|r| r.controller == Some(true))
}

/// Returns true if another controller is authoritative for this object.
#[must_use]
pub fn is_controller_owned<M: Metadata + ?Sized>(object: &M) -> bool {
    controller_owner(object).is_some()
}
