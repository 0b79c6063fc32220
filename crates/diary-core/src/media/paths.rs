//! Remote object naming for diary photos.

use crate::util::sanitize_token;
use crate::{Error, Result};

const IMAGE_PREFIX: &str = "images";
const DEFAULT_STEM: &str = "image";
const DEFAULT_EXTENSION: &str = "jpg";

/// Build the object path a freshly picked photo is uploaded to.
///
/// Layout is `images/{user}/{stem}-{now_ms}.{ext}`, namespaced by the
/// signed-in user so one user's objects never collide with another's.
pub fn build_remote_path(user_id: &str, local_source: &str, now_ms: i64) -> Result<String> {
    let user = user_id.trim();
    if user.is_empty() || user.contains('/') {
        return Err(Error::InvalidInput(format!(
            "Invalid user id for remote path: {user_id:?}"
        )));
    }

    let (stem, extension) = split_file_name(local_source);
    let stem = Some(sanitize_token(stem))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| DEFAULT_STEM.to_string());
    let extension = extension
        .map(sanitize_token)
        .filter(|ext| !ext.is_empty() && !ext.contains('-'))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    Ok(format!("{IMAGE_PREFIX}/{user}/{stem}-{now_ms}.{extension}"))
}

/// Last path segment of a local reference, split at its final dot.
fn split_file_name(local_source: &str) -> (&str, Option<&str>) {
    let trimmed = local_source.trim();
    let trimmed = trimmed.strip_prefix("file://").unwrap_or(trimmed);
    let name = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_namespaced_by_user_and_time() {
        assert_eq!(
            build_remote_path("u1", "/photos/Foo.JPG", 123).unwrap(),
            "images/u1/foo-123.jpg"
        );
    }

    #[test]
    fn file_uri_and_odd_names_are_sanitised() {
        assert_eq!(
            build_remote_path("u1", "file:///sdcard/DCIM/My Trip (2).png", 7).unwrap(),
            "images/u1/my-trip-2-7.png"
        );
        assert_eq!(
            build_remote_path("u1", "/tmp/.hidden", 7).unwrap(),
            "images/u1/hidden-7.jpg"
        );
        assert_eq!(
            build_remote_path("u1", "content://media/external/42", 7).unwrap(),
            "images/u1/42-7.jpg"
        );
    }

    #[test]
    fn empty_user_is_rejected() {
        assert!(build_remote_path(" ", "/a.jpg", 1).is_err());
        assert!(build_remote_path("a/b", "/a.jpg", 1).is_err());
    }
}
