//! Pull specification helpers.
//!
//! Just the two pieces of reference surgery the preparation pipeline
//! needs: the image name portion used when pinning a digest, and the
//! registry hostname used when scoping credentials.

/// Default registry when a pull spec carries no hostname.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// The image name portion of a pull spec.
///
/// Everything before the `@` for digest references, otherwise
/// everything before the last `:`. A spec with neither is returned
/// unchanged.
pub fn image_name(pull_spec: &str) -> &str {
    if let Some(at) = pull_spec.find('@') {
        &pull_spec[..at]
    } else if let Some(colon) = pull_spec.rfind(':') {
        &pull_spec[..colon]
    } else {
        pull_spec
    }
}

/// The registry hostname of a pull spec.
///
/// The first path component counts as a hostname when it contains a
/// dot or a colon, or is `localhost`; otherwise the default registry
/// is assumed.
pub fn registry_host(pull_spec: &str) -> &str {
    let first = match pull_spec.split_once('/') {
        Some((first, _)) => first,
        None => return DEFAULT_REGISTRY,
    };
    if first.contains('.') || first.contains(':') || first == "localhost" {
        first
    } else {
        DEFAULT_REGISTRY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_name_from_digest_ref() {
        assert_eq!(
            image_name("quay.io/ns/bundle@sha256:abcdef"),
            "quay.io/ns/bundle"
        );
    }

    #[test]
    fn test_image_name_from_tag_ref() {
        assert_eq!(image_name("quay.io/ns/bundle:v1.0"), "quay.io/ns/bundle");
    }

    #[test]
    fn test_image_name_digest_wins_over_tag() {
        assert_eq!(
            image_name("quay.io/ns/bundle:v1.0@sha256:abcdef"),
            "quay.io/ns/bundle"
        );
    }

    #[test]
    fn test_image_name_bare() {
        assert_eq!(image_name("quay.io/ns/bundle"), "quay.io/ns/bundle");
    }

    #[test]
    fn test_registry_host_with_hostname() {
        assert_eq!(registry_host("quay.io/ns/repo:v1"), "quay.io");
    }

    #[test]
    fn test_registry_host_with_port() {
        assert_eq!(
            registry_host("registry.example.com:8443/ns/repo:v1"),
            "registry.example.com:8443"
        );
    }

    #[test]
    fn test_registry_host_localhost() {
        assert_eq!(registry_host("localhost/repo:v1"), "localhost");
    }

    #[test]
    fn test_registry_host_defaults() {
        assert_eq!(registry_host("ns/repo:v1"), DEFAULT_REGISTRY);
        assert_eq!(registry_host("repo"), DEFAULT_REGISTRY);
    }
}
