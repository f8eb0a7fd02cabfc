use std::collections::HashSet;

use super::Activity;

/// Activities in `current` whose id is absent from `previous`, in `current` order.
pub fn detect_new<'a>(previous: &[Activity], current: &'a [Activity]) -> Vec<&'a Activity> {
    let seen: HashSet<&str> = previous.iter().map(|a| a.id.as_str()).collect();
    current
        .iter()
        .filter(|a| !seen.contains(a.id.as_str()))
        .collect()
}
