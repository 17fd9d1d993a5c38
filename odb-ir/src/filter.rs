use crate::types::OdbDatabase;

/// Keep only the datablocks whose name matches `pattern`.
///
/// Patterns are case-insensitive globs: `*` matches any run of characters,
/// `?` matches exactly one. Several patterns may be given separated by `,`;
/// a block is kept if any of them matches.
pub fn filter_by_pattern(db: &mut OdbDatabase, pattern: &str) {
    db.blocks.retain(|b| matches_pattern(pattern, &b.name));
}

/// Copy of the database restricted to blocks matching `pattern`.
pub fn select(db: &OdbDatabase, pattern: &str) -> OdbDatabase {
    OdbDatabase {
        blocks: db
            .blocks
            .iter()
            .filter(|b| matches_pattern(pattern, &b.name))
            .cloned()
            .collect(),
    }
}

/// True if `name` matches any of the comma-separated globs in `pattern`.
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    let name: Vec<char> = name.to_ascii_lowercase().chars().collect();
    pattern
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .any(|p| {
            let glob: Vec<char> = p.to_ascii_lowercase().chars().collect();
            glob_match(&glob, &name)
        })
}

// Iterative wildcard match with single-star backtracking.
fn glob_match(glob: &[char], name: &[char]) -> bool {
    let (mut g, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        match glob.get(g) {
            Some('*') => {
                star = Some((g, n));
                g += 1;
            }
            Some(&c) if c == '?' || c == name[n] => {
                g += 1;
                n += 1;
            }
            _ => match star {
                Some((sg, sn)) => {
                    g = sg + 1;
                    n = sn + 1;
                    star = Some((sg, sn + 1));
                }
                None => return false,
            },
        }
    }

    glob[g..].iter().all(|&c| c == '*')
}
