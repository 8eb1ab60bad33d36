use std::fmt::{Display, Formatter};
use std::str::FromStr;

use aclgraph_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::{EntityRef, PermissionId};

/// HTTP verb a permission governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
    /// Wildcard matching every verb.
    Any,
}

impl HttpVerb {
    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Any => "ANY",
        }
    }

    /// Returns whether a permission declared with `self` covers `requested`.
    #[must_use]
    pub fn covers(&self, requested: HttpVerb) -> bool {
        *self == Self::Any || *self == requested
    }
}

impl Display for HttpVerb {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for HttpVerb {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "ANY" | "*" => Ok(Self::Any),
            _ => Err(AppError::Validation(format!("unknown http verb '{value}'"))),
        }
    }
}

/// Access-control scheme a permission belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionScheme {
    /// HTTP API endpoints.
    Api,
    /// User interface surfaces.
    Ui,
    /// File system paths.
    File,
    /// Database objects.
    Database,
}

impl PermissionScheme {
    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Ui => "ui",
            Self::File => "file",
            Self::Database => "database",
        }
    }
}

impl Display for PermissionScheme {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for PermissionScheme {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "ui" => Ok(Self::Ui),
            "file" => Ok(Self::File),
            "database" | "db" => Ok(Self::Database),
            _ => Err(AppError::Validation(format!(
                "unknown permission scheme '{value}'"
            ))),
        }
    }
}

/// Resource URI that may contain pattern segments.
///
/// Segments are separated by `/`. A `*` or `{name}` segment matches exactly one
/// concrete segment and a trailing `**` matches any remaining suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourcePattern(String);

impl ResourcePattern {
    /// Creates a validated resource pattern.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "resource uri must not be empty".to_owned(),
            ));
        }

        let segments: Vec<&str> = split_segments(trimmed).collect();
        if let Some(position) = segments.iter().position(|segment| *segment == "**")
            && position + 1 != segments.len()
        {
            return Err(AppError::Validation(format!(
                "resource uri '{trimmed}' may only use '**' as its last segment"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns whether the concrete `uri` is matched by this pattern.
    #[must_use]
    pub fn matches(&self, uri: &str) -> bool {
        let mut pattern = split_segments(self.0.as_str());
        let mut concrete = split_segments(uri.trim());

        loop {
            match (pattern.next(), concrete.next()) {
                (Some("**"), _) => return true,
                (Some(expected), Some(actual)) => {
                    if !segment_matches(expected, actual) {
                        return false;
                    }
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

impl TryFrom<String> for ResourcePattern {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourcePattern> for String {
    fn from(value: ResourcePattern) -> Self {
        value.0
    }
}

impl Display for ResourcePattern {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

fn split_segments(value: &str) -> impl Iterator<Item = &str> {
    value.split('/').filter(|segment| !segment.is_empty())
}

fn segment_matches(expected: &str, actual: &str) -> bool {
    expected == "*" || (expected.starts_with('{') && expected.ends_with('}')) || expected == actual
}

/// Grant/deny polarity of one permission row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Allows access.
    Grant,
    /// Refuses access, overriding any grant.
    Deny,
}

/// A grant or deny of one verb on one resource, held by exactly one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    id: PermissionId,
    holder: EntityRef,
    resource: ResourcePattern,
    verb: HttpVerb,
    scheme: PermissionScheme,
    grant: bool,
    deny: bool,
}

impl Permission {
    /// Creates a permission with explicit grant and deny flags.
    pub fn new(
        id: PermissionId,
        holder: EntityRef,
        resource: ResourcePattern,
        verb: HttpVerb,
        scheme: PermissionScheme,
        grant: bool,
        deny: bool,
    ) -> AppResult<Self> {
        if !grant && !deny {
            return Err(AppError::Validation(format!(
                "permission {id} must set grant or deny"
            )));
        }

        Ok(Self {
            id,
            holder,
            resource,
            verb,
            scheme,
            grant,
            deny,
        })
    }

    /// Creates a permission with a single polarity.
    #[must_use]
    pub fn with_polarity(
        id: PermissionId,
        holder: EntityRef,
        resource: ResourcePattern,
        verb: HttpVerb,
        scheme: PermissionScheme,
        polarity: Polarity,
    ) -> Self {
        Self {
            id,
            holder,
            resource,
            verb,
            scheme,
            grant: polarity == Polarity::Grant,
            deny: polarity == Polarity::Deny,
        }
    }

    /// Returns the permission identifier.
    #[must_use]
    pub fn id(&self) -> PermissionId {
        self.id
    }

    /// Returns the entity holding the permission.
    #[must_use]
    pub fn holder(&self) -> EntityRef {
        self.holder
    }

    /// Returns the resource pattern.
    #[must_use]
    pub fn resource(&self) -> &ResourcePattern {
        &self.resource
    }

    /// Returns the governed verb.
    #[must_use]
    pub fn verb(&self) -> HttpVerb {
        self.verb
    }

    /// Returns the permission scheme.
    #[must_use]
    pub fn scheme(&self) -> PermissionScheme {
        self.scheme
    }

    /// Returns the grant flag.
    #[must_use]
    pub fn is_grant(&self) -> bool {
        self.grant
    }

    /// Returns the deny flag.
    #[must_use]
    pub fn is_deny(&self) -> bool {
        self.deny
    }

    /// Returns whether this permission applies to the requested uri and verb.
    #[must_use]
    pub fn applies_to(&self, uri: &str, verb: HttpVerb) -> bool {
        self.verb.covers(verb) && self.resource.matches(uri)
    }

    /// Returns whether `self` occupies the same (holder, resource, verb, scheme) slot.
    #[must_use]
    pub fn same_slot(
        &self,
        holder: EntityRef,
        resource: &ResourcePattern,
        verb: HttpVerb,
        scheme: PermissionScheme,
    ) -> bool {
        self.holder == holder
            && &self.resource == resource
            && self.verb == verb
            && self.scheme == scheme
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{HttpVerb, PermissionScheme, ResourcePattern};

    fn pattern(value: &str) -> ResourcePattern {
        ResourcePattern::new(value).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn exact_resource_matches_only_itself() {
        let resource = pattern("/api/x");
        assert!(resource.matches("/api/x"));
        assert!(resource.matches("api/x/"));
        assert!(!resource.matches("/api/y"));
        assert!(!resource.matches("/api/x/1"));
    }

    #[test]
    fn single_segment_wildcards_match_one_segment() {
        let resource = pattern("/api/users/{id}/profile");
        assert!(resource.matches("/api/users/42/profile"));
        assert!(!resource.matches("/api/users/profile"));

        let star = pattern("/api/*");
        assert!(star.matches("/api/orders"));
        assert!(!star.matches("/api/orders/1"));
    }

    #[test]
    fn trailing_double_star_matches_suffix() {
        let resource = pattern("/files/**");
        assert!(resource.matches("/files"));
        assert!(resource.matches("/files/a/b/c"));
        assert!(!resource.matches("/other/a"));
    }

    #[test]
    fn double_star_must_be_last() {
        assert!(ResourcePattern::new("/files/**/x").is_err());
        assert!(ResourcePattern::new("   ").is_err());
    }

    #[test]
    fn any_verb_covers_every_verb() {
        assert!(HttpVerb::Any.covers(HttpVerb::Delete));
        assert!(HttpVerb::Get.covers(HttpVerb::Get));
        assert!(!HttpVerb::Get.covers(HttpVerb::Post));
    }

    #[test]
    fn transport_values_parse() {
        assert_eq!(HttpVerb::from_str("patch"), Ok(HttpVerb::Patch));
        assert!(HttpVerb::from_str("FETCH").is_err());
        assert_eq!(
            PermissionScheme::from_str("Database"),
            Ok(PermissionScheme::Database)
        );
        assert!(PermissionScheme::from_str("ldap").is_err());
    }
}
