//! Composite identifiers
//!
//! Remote objects are addressed through their parent hierarchy
//! (`organization/team`, `organization/project/alert`). The host only keeps
//! the encoded string between runs, so encoding must be exactly reversible.

use crate::error::{Error, Result};
use std::fmt;

/// Separator between identifier segments.
pub const SEPARATOR: char = '/';

/// Join segments into a composite identifier.
///
/// Fails with [`Error::InvalidSegment`] if a segment is empty or contains
/// [`SEPARATOR`].
pub fn encode<S: AsRef<str>>(segments: &[S]) -> Result<String> {
    let mut id = String::new();
    for (i, segment) in segments.iter().enumerate() {
        let segment = segment.as_ref();
        check_segment(segment)?;
        if i > 0 {
            id.push(SEPARATOR);
        }
        id.push_str(segment);
    }
    Ok(id)
}

/// Split a composite identifier into exactly `arity` segments.
pub fn decode(id: &str, arity: usize) -> Result<Vec<String>> {
    if id.is_empty() {
        return Err(Error::EmptyId);
    }

    let segments: Vec<String> = id.split(SEPARATOR).map(str::to_string).collect();
    if segments.len() != arity {
        return Err(Error::MalformedId {
            id: id.to_string(),
            expected: arity,
            found: segments.len(),
        });
    }

    for segment in &segments {
        check_segment(segment)?;
    }

    Ok(segments)
}

fn check_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(Error::InvalidSegment {
            segment: segment.to_string(),
            reason: "segment is empty",
        });
    }
    if segment.contains(SEPARATOR) {
        return Err(Error::InvalidSegment {
            segment: segment.to_string(),
            reason: "segment contains the separator",
        });
    }
    Ok(())
}

/// A typed composite identifier with a fixed number of segments.
pub trait CompositeKey: Sized + Clone + fmt::Debug + Send + Sync {
    /// Number of segments in the encoded form.
    const ARITY: usize;

    /// Segments in encoding order.
    fn segments(&self) -> Vec<&str>;

    /// Build the key from exactly [`Self::ARITY`] validated segments.
    fn from_segments(segments: Vec<String>) -> Self;

    /// Encode into the durable identifier string.
    fn encode(&self) -> Result<String> {
        encode(&self.segments())
    }

    /// Decode a durable identifier string.
    fn decode(id: &str) -> Result<Self> {
        decode(id, Self::ARITY).map(Self::from_segments)
    }
}

/// Key of an organization: `org`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrgKey {
    pub organization: String,
}

impl OrgKey {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
        }
    }
}

impl CompositeKey for OrgKey {
    const ARITY: usize = 1;

    fn segments(&self) -> Vec<&str> {
        vec![self.organization.as_str()]
    }

    fn from_segments(mut segments: Vec<String>) -> Self {
        Self {
            organization: segments.remove(0),
        }
    }
}

/// Key of an object owned by an organization: `org/key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrgScopedKey {
    pub organization: String,
    pub key: String,
}

impl OrgScopedKey {
    pub fn new(organization: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            key: key.into(),
        }
    }

    /// The owning organization.
    pub fn org(&self) -> OrgKey {
        OrgKey::new(self.organization.clone())
    }
}

impl CompositeKey for OrgScopedKey {
    const ARITY: usize = 2;

    fn segments(&self) -> Vec<&str> {
        vec![self.organization.as_str(), self.key.as_str()]
    }

    fn from_segments(segments: Vec<String>) -> Self {
        let mut it = segments.into_iter();
        Self {
            organization: it.next().unwrap_or_default(),
            key: it.next().unwrap_or_default(),
        }
    }
}

/// Key of an object owned by a project: `org/project/key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectScopedKey {
    pub organization: String,
    pub project: String,
    pub key: String,
}

impl ProjectScopedKey {
    pub fn new(
        organization: impl Into<String>,
        project: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            project: project.into(),
            key: key.into(),
        }
    }

    /// The owning project.
    pub fn project(&self) -> OrgScopedKey {
        OrgScopedKey::new(self.organization.clone(), self.project.clone())
    }
}

impl CompositeKey for ProjectScopedKey {
    const ARITY: usize = 3;

    fn segments(&self) -> Vec<&str> {
        vec![
            self.organization.as_str(),
            self.project.as_str(),
            self.key.as_str(),
        ]
    }

    fn from_segments(segments: Vec<String>) -> Self {
        let mut it = segments.into_iter();
        Self {
            organization: it.next().unwrap_or_default(),
            project: it.next().unwrap_or_default(),
            key: it.next().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_joins_segments() {
        assert_eq!(encode(&["acme", "core-team"]).unwrap(), "acme/core-team");
        assert_eq!(encode(&["acme"]).unwrap(), "acme");
    }

    #[test]
    fn test_encode_rejects_separator_and_empty() {
        assert!(matches!(
            encode(&["acme", "a/b"]),
            Err(Error::InvalidSegment { .. })
        ));
        assert!(matches!(
            encode(&["acme", ""]),
            Err(Error::InvalidSegment { .. })
        ));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode("", 2), Err(Error::EmptyId)));
        assert!(matches!(
            decode("acme", 2),
            Err(Error::MalformedId {
                expected: 2,
                found: 1,
                ..
            })
        ));
        assert!(matches!(
            decode("acme/web/1/extra", 3),
            Err(Error::MalformedId { found: 4, .. })
        ));
        assert!(matches!(
            decode("acme//1", 3),
            Err(Error::InvalidSegment { .. })
        ));
    }

    #[test]
    fn test_round_trip() {
        let cases: &[&[&str]] = &[
            &["acme"],
            &["acme", "core-team"],
            &["acme", "web", "42"],
            &["a b", "ü", "x:y", "-_."],
        ];
        for segments in cases {
            let id = encode(segments).unwrap();
            assert_eq!(decode(&id, segments.len()).unwrap(), *segments);
        }
    }

    #[test]
    fn test_typed_keys() {
        let key = OrgScopedKey::new("acme", "core-team");
        assert_eq!(key.encode().unwrap(), "acme/core-team");
        assert_eq!(OrgScopedKey::decode("acme/core-team").unwrap(), key);
        assert_eq!(key.org(), OrgKey::new("acme"));

        let alert = ProjectScopedKey::decode("acme/web/12").unwrap();
        assert_eq!(alert.key, "12");
        assert_eq!(alert.project(), OrgScopedKey::new("acme", "web"));

        assert!(ProjectScopedKey::decode("acme/web").is_err());
        assert!(OrgKey::decode("acme/web").is_err());
    }
}
