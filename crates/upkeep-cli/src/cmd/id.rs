//! List the IDs of every built-in provider.

use upkeep_core::catalog;

/// Print `Name: id1, id2` per provider. Exclusions do not apply.
pub fn id() {
    for provider in catalog::providers() {
        println!("{}: {}", provider.known_info().name, provider.ids().join(", "));
    }
}
