/// Multi-select toggle used by the onboarding form.
///
/// Toggling a present key removes it, toggling an absent key appends it. When
/// the result exceeds `max_selections` the oldest picks are evicted so the
/// newest one always survives. A cap of `0` means unlimited.
pub fn compute_next_selection<T: PartialEq + Clone>(
    current: &[T],
    key: T,
    max_selections: usize,
) -> Vec<T> {
    if current.contains(&key) {
        return current.iter().filter(|item| **item != key).cloned().collect();
    }

    let mut next = current.to_vec();
    next.push(key);
    if max_selections > 0 && next.len() > max_selections {
        let overflow = next.len() - max_selections;
        next.drain(..overflow);
    }
    next
}
