use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum Component<'a> {
    Number(u64),
    Word(&'a str),
}

fn components(version: &str) -> Vec<Component<'_>> {
    version
        .split(&['.', '-', '_', '+'][..])
        .filter(|part| !part.is_empty())
        .map(|part| match part.parse::<u64>() {
            Ok(n) => Component::Number(n),
            Err(_) => Component::Word(part),
        })
        .collect()
}

/// Compares two fixture versions component by component.
///
/// Numbers compare numerically and rank above words, words compare
/// lexicographically, and a missing trailing component ranks lowest.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = components(a);
    let right = components(b);
    for (l, r) in left.iter().zip(right.iter()) {
        let ordering = match (l, r) {
            (Component::Number(x), Component::Number(y)) => x.cmp(y),
            (Component::Number(_), Component::Word(_)) => Ordering::Greater,
            (Component::Word(_), Component::Number(_)) => Ordering::Less,
            (Component::Word(x), Component::Word(y)) => x.cmp(y),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}
