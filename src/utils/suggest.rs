fn normalize_token(value: &str) -> Vec<char> {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn edit_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn score(input: &[char], candidate: &str) -> Option<usize> {
    let other = normalize_token(candidate);
    if input.is_empty() || other.is_empty() {
        return None;
    }
    if input == other.as_slice() {
        return Some(0);
    }
    let a: String = input.iter().collect();
    let b: String = other.iter().collect();
    if a.contains(&b) || b.contains(&a) {
        return Some(1);
    }
    Some(edit_distance(input, &other))
}

fn max_allowed_distance(len: usize) -> usize {
    match len {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        _ => ((len as f32) * 0.35).floor().max(3.0) as usize,
    }
}

/// Ranks `candidates` by closeness to `input` ("did you mean").
pub fn suggest(input: &str, candidates: &[String], limit: usize) -> Vec<String> {
    let needle = normalize_token(input);
    if needle.is_empty() || candidates.is_empty() {
        return Vec::new();
    }
    let allowed = max_allowed_distance(needle.len());
    let mut scored: Vec<(&String, usize)> = candidates
        .iter()
        .filter_map(|c| score(&needle, c).filter(|s| *s <= allowed).map(|s| (c, s)))
        .collect();
    scored.sort_by(|a, b| {
        a.1.cmp(&b.1)
            .then_with(|| a.0.len().cmp(&b.0.len()))
            .then_with(|| a.0.cmp(b.0))
    });
    let mut out: Vec<String> = Vec::new();
    for (cand, _) in scored {
        if !out.contains(cand) {
            out.push(cand.clone());
        }
        if out.len() >= limit.max(1) {
            break;
        }
    }
    out
}
