//! Stock [`VariableBuilder`](super::VariableBuilder)s for the identifier variable.
use crate::variable::{ComposedVariable, DefaultValue};

use super::PathRegistration;

/// Leaves the registration untouched.
pub fn basic(registration: PathRegistration<'_>) -> PathRegistration<'_> {
    registration
}

/// Applies the declaration's identifier attributes: a declared
/// `identifier_default` is used when the tag slot is missing.
pub fn attributed(mut registration: PathRegistration<'_>) -> PathRegistration<'_> {
    if let Some(default) = &registration.decl.identifier_default {
        let value = default.to_json();
        registration.variable = Box::new(ComposedVariable::new(registration.variable, DefaultValue { value }));
    }
    registration
}
