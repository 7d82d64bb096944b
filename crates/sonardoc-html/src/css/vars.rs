use std::collections::HashMap;

/// Custom properties declared on `:root`, name (with the leading `--`) to raw value.
pub type VarTable = HashMap<String, String>;

/// Default number of `var()` substitution passes before a value is given up on.
pub const DEFAULT_MAX_VAR_DEPTH: usize = 8;

/// Substitute `var(--name[, fallback])` references until none remain, at most
/// `max_depth` passes. Returns `None` if references are still present after
/// the last pass, which is what cyclic definitions end up as.
pub fn resolve_var_refs(raw: &str, vars: &VarTable, max_depth: usize) -> Option<String> {
    let mut current = raw.trim().to_string();
    for _ in 0..max_depth {
        if !contains_var(&current) {
            return Some(current);
        }
        current = substitute_once(&current, vars);
    }
    if contains_var(&current) {
        None
    } else {
        Some(current)
    }
}

fn contains_var(value: &str) -> bool {
    find_var_call(value).is_some()
}

fn find_var_call(value: &str) -> Option<usize> {
    value.to_ascii_lowercase().find("var(")
}

fn substitute_once(raw: &str, vars: &VarTable) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = find_var_call(rest) {
        out.push_str(&rest[..start]);
        let after = &rest[start + 4..];
        let Some(close) = matching_paren(after) else {
            // Unbalanced: leave the remainder untouched so the caller sees `var(`.
            out.push_str(&rest[start..]);
            return out;
        };
        let inner = after[..close].trim();
        let (name, fallback) = match inner.split_once(',') {
            Some((name, fallback)) => (name.trim(), Some(fallback.trim())),
            None => (inner, None),
        };
        if let Some(value) = vars.get(name) {
            out.push_str(value.trim());
        } else if let Some(fallback) = fallback {
            out.push_str(fallback);
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Byte offset of the `)` closing an already-opened parenthesis.
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 1i32;
    for (idx, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> VarTable {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn resolves_chains_and_fallbacks() {
        let vars = table(&[("--a", "var(--b)"), ("--b", " #123456 ")]);
        assert_eq!(
            resolve_var_refs("var(--a)", &vars, DEFAULT_MAX_VAR_DEPTH).as_deref(),
            Some("#123456")
        );
        assert_eq!(
            resolve_var_refs("var(--missing, var(--b))", &vars, DEFAULT_MAX_VAR_DEPTH).as_deref(),
            Some("#123456")
        );
        assert_eq!(
            resolve_var_refs("1px solid VAR(--b)", &vars, DEFAULT_MAX_VAR_DEPTH).as_deref(),
            Some("1px solid #123456")
        );
    }

    #[test]
    fn cyclic_references_give_up() {
        let vars = table(&[("--a", "var(--b)"), ("--b", "var(--a)")]);
        assert_eq!(
            resolve_var_refs("var(--a)", &vars, DEFAULT_MAX_VAR_DEPTH),
            None
        );
        let selfref = table(&[("--x", "var(--x)")]);
        assert_eq!(resolve_var_refs("var(--x)", &selfref, 3), None);
    }

    #[test]
    fn missing_without_fallback_is_empty() {
        let vars = VarTable::new();
        assert_eq!(
            resolve_var_refs("var(--nope)", &vars, DEFAULT_MAX_VAR_DEPTH).as_deref(),
            Some("")
        );
    }

    #[test]
    fn unbalanced_call_is_unresolved() {
        let vars = table(&[("--a", "red")]);
        assert_eq!(
            resolve_var_refs("var(--a", &vars, DEFAULT_MAX_VAR_DEPTH),
            None
        );
    }

    #[test]
    fn plain_values_pass_through() {
        let vars = VarTable::new();
        assert_eq!(resolve_var_refs("#fff", &vars, 0).as_deref(), Some("#fff"));
    }
}
