/// Canonical form for tree keys: a leading `/`, no trailing `/`, no empty,
/// `.` segments. `..` pops a segment but never climbs above the root.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Prefix that every descendant of `folder` starts with.
pub(crate) fn child_prefix(folder: &str) -> String {
    if folder == "/" {
        "/".to_string()
    } else {
        format!("{folder}/")
    }
}

/// Every proper ancestor of `path`, excluding the root.
pub(crate) fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/')
        .map(|(i, _)| i)
        .filter(|&i| i > 0)
        .map(move |i| &path[..i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators_and_dots() {
        assert_eq!(normalize_path("src/App.jsx"), "/src/App.jsx");
        assert_eq!(normalize_path("/src//components/./Button.jsx/"), "/src/components/Button.jsx");
        assert_eq!(normalize_path("src\\lib\\..\\main.rs"), "/src/main.rs");
        assert_eq!(normalize_path("../../etc"), "/etc");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn lists_ancestors_outermost_first() {
        let found: Vec<&str> = ancestors("/a/b/c.txt").collect();
        assert_eq!(found, ["/a", "/a/b"]);
        assert_eq!(ancestors("/top.txt").count(), 0);
    }
}
