// Test selection - narrows a list of `Class/method` identifiers

/// Selection spec that keeps every identifier
pub const SELECT_ALL: &str = "All";
/// Selection spec that keeps nothing
pub const SELECT_NONE: &str = "None";

/// Filter `all` by `spec`.
///
/// `spec` is `All`, `None`, or a comma-separated list of `ClassName` and `ClassName/methodName`
/// tokens. A bare class name matches every method of that class; tokens that match nothing
/// contribute nothing. With `invert` the complement within `all` is returned. The result keeps
/// the order of `all`.
pub fn select(all: &[String], spec: &str, invert: bool) -> Vec<String> {
    let spec = spec.trim();
    let tokens: Vec<&str> = match spec {
        SELECT_ALL => return if invert { Vec::new() } else { all.to_vec() },
        SELECT_NONE => return if invert { all.to_vec() } else { Vec::new() },
        _ => spec
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .collect(),
    };

    all.iter()
        .filter(|identifier| tokens.iter().any(|token| matches(identifier, token)) != invert)
        .cloned()
        .collect()
}

fn matches(identifier: &str, token: &str) -> bool {
    if token.contains('/') {
        return identifier == token;
    }
    let class = identifier
        .split_once('/')
        .map(|(class, _)| class)
        .unwrap_or(identifier);
    class == token
}

/// Parse a newline-separated test list, skipping blank lines and `#` comments
pub fn parse_test_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
