//! Package specifier parsing
//!
//! Accepts `name`, `name@version`, `name@tag` and scoped `@scope/name@...`.
//! Version ranges are recognized and rejected.

use crate::error::{PkgcacheError, PkgcacheResult};
use semver::{Version, VersionReq};
use std::fmt;

/// What part of the packument a specifier selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Exact version
    Version(Version),
    /// Named dist-tag (`latest` when no selector is given)
    Tag(String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version(v) => write!(f, "{}", v),
            Self::Tag(t) => f.write_str(t),
        }
    }
}

/// A parsed package specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub selector: Selector,
}

impl PackageSpec {
    pub fn parse(raw: &str) -> PkgcacheResult<Self> {
        let raw = raw.trim();
        let unsupported = |reason: &str| PkgcacheError::UnsupportedSpec {
            spec: raw.to_string(),
            reason: reason.to_string(),
        };

        // Skip the scope's leading '@' when looking for the selector separator
        let split_at = raw
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == '@')
            .map(|(i, _)| i);
        let (name, selector) = match split_at {
            Some(i) => (&raw[..i], &raw[i + 1..]),
            None => (raw, ""),
        };

        validate_name(name).map_err(|reason| unsupported(&reason))?;

        let selector = selector.trim();
        let selector = if selector.is_empty() {
            Selector::Tag("latest".to_string())
        } else if let Ok(version) = Version::parse(selector.trim_start_matches(['v', '='])) {
            Selector::Version(version)
        } else if VersionReq::parse(selector).is_ok() || selector.contains("||") {
            return Err(unsupported("version ranges are not resolved"));
        } else if selector
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            Selector::Tag(selector.to_string())
        } else {
            return Err(unsupported("not a version or dist-tag"));
        };

        Ok(Self {
            name: name.to_string(),
            selector,
        })
    }

    /// Name as it appears in a registry URL path
    pub fn escaped_name(&self) -> String {
        self.name.replacen('/', "%2f", 1)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.selector)
    }
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty package name".to_string());
    }
    if name.chars().any(|c| c.is_whitespace()) {
        return Err("package name contains whitespace".to_string());
    }
    if let Some(scoped) = name.strip_prefix('@') {
        match scoped.split_once('/') {
            Some((scope, pkg)) if !scope.is_empty() && !pkg.is_empty() && !pkg.contains('/') => {}
            _ => return Err("scoped names look like @scope/name".to_string()),
        }
    } else if name.contains('/') {
        return Err("unscoped names cannot contain '/'".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_version() {
        let spec = PackageSpec::parse("foo@1.0.0").unwrap();
        assert_eq!(spec.name, "foo");
        assert_eq!(spec.selector, Selector::Version(Version::new(1, 0, 0)));
        assert_eq!(spec.to_string(), "foo@1.0.0");
    }

    #[test]
    fn bare_name_means_latest() {
        let spec = PackageSpec::parse("foo").unwrap();
        assert_eq!(spec.selector, Selector::Tag("latest".to_string()));
    }

    #[test]
    fn dist_tag() {
        let spec = PackageSpec::parse("foo@lts").unwrap();
        assert_eq!(spec.selector, Selector::Tag("lts".to_string()));
    }

    #[test]
    fn scoped_package() {
        let spec = PackageSpec::parse("@scope/pkg@2.1.0").unwrap();
        assert_eq!(spec.name, "@scope/pkg");
        assert_eq!(spec.escaped_name(), "@scope%2fpkg");

        let bare = PackageSpec::parse("@scope/pkg").unwrap();
        assert_eq!(bare.selector, Selector::Tag("latest".to_string()));
    }

    #[test]
    fn leading_v_is_a_version() {
        let spec = PackageSpec::parse("foo@v1.2.3").unwrap();
        assert_eq!(spec.selector, Selector::Version(Version::new(1, 2, 3)));
    }

    #[test]
    fn ranges_are_rejected() {
        for raw in ["foo@^1.0.0", "foo@~1.2", "foo@>=1", "foo@1", "foo@1.x", "foo@1 || 2"] {
            let err = PackageSpec::parse(raw).unwrap_err();
            assert!(
                matches!(err, PkgcacheError::UnsupportedSpec { .. }),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn bad_names_are_rejected() {
        for raw in ["", "@1.0.0", "@scope", "a/b@1.0.0", "foo bar@1.0.0"] {
            assert!(PackageSpec::parse(raw).is_err(), "{} should be rejected", raw);
        }
    }
}
