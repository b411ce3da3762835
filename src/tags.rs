//! Converges the tags of a remote resource to a desired set.

use itertools::Itertools;
use tracing::{info, instrument};

use crate::service::{FunctionService, ServiceError, Tags};

/// Keys present in `current` but missing from `desired`. Values are
/// not compared.
pub fn removed_keys(current: &Tags, desired: &Tags) -> Vec<String> {
    current
        .keys()
        .filter(|key| !desired.contains_key(*key))
        .cloned()
        .collect()
}

/// Make the tags of `arn` exactly `desired`: untag what's not wanted,
/// then apply the whole desired set. Nothing is done when `desired`
/// is absent.
#[instrument(skip(service))]
pub async fn reconcile_tags<S>(
    service: &S,
    arn: &str,
    desired: Option<&Tags>,
) -> Result<(), ServiceError>
where
    S: FunctionService + ?Sized,
{
    let desired = match desired {
        Some(desired) => desired,
        None => return Ok(()),
    };
    let current = service.list_tags(arn).await?;

    let removed = removed_keys(&current, desired);
    if !removed.is_empty() {
        service.untag_resource(arn, &removed).await?;
        info!("Removed tags [{}] from {}", removed.iter().join(", "), arn);
    }

    // Tags already present with the same value are applied again
    if !desired.is_empty() {
        service.tag_resource(arn, desired).await?;
        info!("Update Lambda function tags requested: {}", arn);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_removed_keys_ignores_values() {
        let current = tags(&[("a", "1"), ("b", "2")]);
        let desired = tags(&[("b", "3"), ("c", "4")]);
        assert_eq!(removed_keys(&current, &desired), vec!["a".to_string()]);
    }

    #[test]
    fn test_removed_keys_empty_desired() {
        let current = tags(&[("a", "1"), ("b", "2")]);
        assert_eq!(
            removed_keys(&current, &Tags::new()),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_removed_keys_nothing_current() {
        let desired = tags(&[("a", "1")]);
        assert!(removed_keys(&Tags::new(), &desired).is_empty());
    }
}
