//! Canonical package names.
//!
//! Every name that becomes a store key or a dependency entry passes through
//! [`normalize`]. Dependency specifiers from `requires_dist` are reduced to the
//! bare project name by [`strip_version`] first.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Normalize a package name according to PEP 503.
///
/// Lower-cases the name and collapses every run of `-`, `_` and `.` into a
/// single `-`.
///
/// ```
/// # use pydeps_crawler::normalize::normalize;
/// assert_eq!(normalize("Foo_Bar.Baz"), "foo-bar-baz");
/// assert_eq!(normalize("A--B"), "a-b");
/// ```
pub fn normalize(name: &str) -> String {
    static SEPARATOR_RUNS: OnceLock<Regex> = OnceLock::new();
    let re = SEPARATOR_RUNS.get_or_init(|| {
        Regex::new(r"[-_.]+").unwrap_or_else(|e| {
            panic!("Failed to compile package name normalization regex: {e}")
        })
    });
    re.replace_all(&name.to_lowercase(), "-").into_owned()
}

fn is_specifier_delimiter(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '[' | ';' | ',' | '<' | '>' | '=' | '!' | '~' | '(' | '@'
        )
}

/// Reduce a `requires_dist` specifier to the canonical name it refers to.
///
/// Everything from the first extras bracket, marker separator, version
/// operator, parenthesis, direct-reference `@` or whitespace onwards is
/// dropped. A specifier that starts with a delimiter, leading whitespace
/// included, has no name and yields an empty string, which callers filter out.
///
/// ```
/// # use pydeps_crawler::normalize::strip_version;
/// assert_eq!(strip_version("Requests>=2.0; extra=='test'"), "requests");
/// assert_eq!(strip_version("  "), "");
/// assert_eq!(strip_version(" numpy"), "");
/// ```
pub fn strip_version(specifier: &str) -> String {
    let end = specifier
        .find(is_specifier_delimiter)
        .unwrap_or(specifier.len());
    normalize(&specifier[..end])
}

/// Turn raw specifiers into the sorted, de-duplicated dependency list stored
/// for a package.
pub fn normalize_dependencies<I, S>(specifiers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    specifiers
        .into_iter()
        .map(|spec| strip_version(spec.as_ref()))
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Foo_Bar.Baz"), "foo-bar-baz");
        assert_eq!(normalize("A--B"), "a-b");
        assert_eq!(normalize("Django-REST-framework"), "django-rest-framework");
        assert_eq!(normalize("zope.interface"), "zope-interface");
        assert_eq!(normalize("a_-._b"), "a-b");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "Foo_Bar.Baz",
            "A--B",
            "--leading",
            "trailing..",
            "MiXeD_case.Name-1",
            "ünïcode_Name",
            "",
            "___",
            "already-normal",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_strip_version_operators() {
        assert_eq!(strip_version("Requests>=2.0; extra=='test'"), "requests");
        assert_eq!(strip_version("urllib3<3,>=1.21.1"), "urllib3");
        assert_eq!(strip_version("idna!=3.0"), "idna");
        assert_eq!(strip_version("certifi~=2023.7"), "certifi");
        assert_eq!(strip_version("charset_normalizer==3.*"), "charset-normalizer");
    }

    #[test]
    fn test_strip_version_extras_and_markers() {
        assert_eq!(strip_version("PySocks[socks]>=1.5.6"), "pysocks");
        assert_eq!(strip_version("colorama; platform_system == 'Windows'"), "colorama");
        assert_eq!(strip_version("zope.interface (>=3.6)"), "zope-interface");
        assert_eq!(strip_version("zope.interface(>=3.6)"), "zope-interface");
        assert_eq!(
            strip_version("pip @ https://github.com/pypa/pip/archive/1.3.1.zip"),
            "pip"
        );
    }

    #[test]
    fn test_strip_version_without_constraints() {
        assert_eq!(strip_version("six"), "six");
        assert_eq!(strip_version("Flask_SQLAlchemy"), "flask-sqlalchemy");
    }

    #[test]
    fn test_strip_version_degenerate_input() {
        assert_eq!(strip_version("  "), "");
        assert_eq!(strip_version(""), "");
        assert_eq!(strip_version(">=1.0"), "");
        assert_eq!(strip_version("; python_version < '3.8'"), "");
        assert_eq!(strip_version("  numpy"), "");
    }

    #[test]
    fn test_normalize_dependencies_sorted_unique() {
        let deps = normalize_dependencies([
            "urllib3<3,>=1.21.1",
            "Requests>=2.0",
            "requests[security]; extra == 'secure'",
            "",
            "  ",
            "certifi>=2017.4.17",
        ]);
        assert_eq!(deps, vec!["certifi", "requests", "urllib3"]);
    }
}
