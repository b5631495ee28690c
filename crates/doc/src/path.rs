//! Field paths: dotted strings with `[]` marking sequence descent and `*`
//! wildcard segments standing for "any key here" (used by the dynamic-key
//! subsystem once a path is promoted to Dynamic).

use std::fmt;

/// A parsed, dotted field path. The empty path denotes the document root.
///
/// `FieldPath` is stored canonically as its rendered string so that it can be
/// used directly as a key in a sorted map supporting both point lookup and
/// prefix scans (see the dynamic-key accumulator), per the "mutable path
/// statistics during streaming" design note.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath(String);

impl FieldPath {
    /// The distinguished root path. Never eligible for promotion to Dynamic.
    pub fn root() -> Self {
        FieldPath(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final segment's literal name: the object-property key (or `*`
    /// for a dynamic-key wildcard) this path ends in, with any array
    /// markers stripped. Used wherever a path needs to be matched back
    /// against a field name, e.g. the semantic detector catalog (§4.3),
    /// which matches on name rather than path.
    pub fn leaf_name(&self) -> &str {
        self.0.rsplit(['.', '*']).next().unwrap_or(self.0.as_str())
    }

    /// Returns the path obtained by descending into object property `key`.
    pub fn push_key(&self, key: &str) -> Self {
        if self.0.is_empty() {
            FieldPath(key.to_string())
        } else {
            FieldPath(format!("{}.{}", self.0, key))
        }
    }

    /// Returns the path obtained by descending into a Dynamic object's
    /// wildcard property.
    pub fn push_wildcard(&self) -> Self {
        self.push_key("*")
    }

    /// Returns the path obtained by descending into an array's elements.
    /// All elements of an array share one path: arrays are homogeneous from
    /// the schema's point of view.
    pub fn push_array(&self) -> Self {
        FieldPath(format!("{}[]", self.0))
    }

    /// True if this path is a direct child of `parent`: exactly one more
    /// segment (key, wildcard, or array marker) than `parent`.
    pub fn is_direct_child_of(&self, parent: &str) -> bool {
        match self.0.strip_prefix(parent) {
            Some(rest) if !rest.is_empty() => {
                // A non-root parent only matches at a real segment
                // boundary: `"username"` is not a direct child of `"user"`
                // just because the literal prefix matches, and neither is
                // `"tags"` of `"tag"`. Require the stripped remainder to
                // start with the `.` or `[` that actually introduces a new
                // segment.
                if !parent.is_empty() && !(rest.starts_with('.') || rest.starts_with('[')) {
                    return false;
                }
                let rest = rest.strip_prefix('.').unwrap_or(rest);
                // A direct child's remaining suffix has no further `.` or
                // `[` boundary (beyond the one immediately marking an array,
                // which we allow as part of the same segment).
                let rest = rest.strip_suffix("[]").unwrap_or(rest);
                !rest.is_empty() && !rest.contains('.') && !rest.contains('[')
            }
            _ => false,
        }
    }

    /// Rewrites this path's first segment below `parent` to `*`, used when
    /// migrating statistics during promotion. Panics if `self` is not a
    /// descendant of `parent`.
    pub fn rewrite_first_child_to_wildcard(&self, parent: &str) -> FieldPath {
        let prefix_len = if parent.is_empty() {
            0
        } else {
            parent.len() + 1
        };
        let rest = &self.0[prefix_len..];
        let end = rest.find(['.', '[']).unwrap_or(rest.len());
        let tail = &rest[end..];
        if parent.is_empty() {
            FieldPath(format!("*{tail}"))
        } else {
            FieldPath(format!("{parent}.*{tail}"))
        }
    }

    pub fn child_prefix(&self) -> String {
        if self.0.is_empty() {
            String::new()
        } else {
            format!("{}.", self.0)
        }
    }

    /// The path one level up: the object field holding an array's elements
    /// for an array-marker path, or the segment before the last `.` for
    /// anything else. The root path has no parent.
    pub fn parent(&self) -> Option<FieldPath> {
        if self.0.is_empty() {
            return None;
        }
        if let Some(stripped) = self.0.strip_suffix("[]") {
            return Some(FieldPath(stripped.to_string()));
        }
        match self.0.rfind('.') {
            Some(idx) => Some(FieldPath(self.0[..idx].to_string())),
            None => Some(FieldPath::root()),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldPath {
    fn from(s: &str) -> Self {
        FieldPath(s.to_string())
    }
}

impl From<String> for FieldPath {
    fn from(s: String) -> Self {
        FieldPath(s)
    }
}

impl std::borrow::Borrow<str> for FieldPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_empty_and_never_promoted() {
        let root = FieldPath::root();
        assert!(root.is_root());
        assert_eq!(root.as_str(), "");
    }

    #[test]
    fn push_key_and_array() {
        let p = FieldPath::root().push_key("tags").push_array();
        assert_eq!(p.as_str(), "tags[]");

        let p = FieldPath::root().push_key("byId").push_wildcard().push_key("name");
        assert_eq!(p.as_str(), "byId.*.name");
    }

    #[test]
    fn rewrite_first_child_to_wildcard() {
        let parent = FieldPath::root().push_key("byId");
        let child = parent.push_key("abc123").push_key("nested");
        let rewritten = child.rewrite_first_child_to_wildcard(parent.as_str());
        assert_eq!(rewritten.as_str(), "byId.*.nested");

        let child_arr = parent.push_key("abc123").push_array();
        assert_eq!(
            child_arr
                .rewrite_first_child_to_wildcard(parent.as_str())
                .as_str(),
            "byId.*[]"
        );
    }

    #[test]
    fn parent_strips_one_segment() {
        assert_eq!(FieldPath::from("tags[]").parent().unwrap().as_str(), "tags");
        assert_eq!(FieldPath::from("tags").parent().unwrap().as_str(), "");
        assert_eq!(
            FieldPath::from("byId.*.name").parent().unwrap().as_str(),
            "byId.*"
        );
        assert_eq!(FieldPath::from("byId.*").parent().unwrap().as_str(), "byId");
        assert_eq!(FieldPath::root().parent(), None);
    }

    #[test]
    fn direct_child_detection() {
        let parent = "byId";
        assert!(FieldPath::from("byId.abc").is_direct_child_of(parent));
        assert!(FieldPath::from("byId.abc[]").is_direct_child_of(parent));
        assert!(!FieldPath::from("byId.abc.nested").is_direct_child_of(parent));
        assert!(!FieldPath::from("byId.abc[].nested").is_direct_child_of(parent));
        assert!(!FieldPath::from("other").is_direct_child_of(parent));
    }

    #[test]
    fn direct_child_requires_a_real_segment_boundary() {
        // A literal-prefix match that isn't actually a sibling under a
        // `.`/`[` boundary must not count as a direct child.
        assert!(!FieldPath::from("username").is_direct_child_of("user"));
        assert!(!FieldPath::from("tags").is_direct_child_of("tag"));
        assert!(!FieldPath::from("addressVerified").is_direct_child_of("address"));
        assert!(FieldPath::from("user.name").is_direct_child_of("user"));
    }
}
