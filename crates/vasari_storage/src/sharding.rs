//! Nested directory layout for large flat namespaces.
//!
//! Directories slow down once they hold many thousands of entries. Each
//! character of a name's stem becomes one directory level, so names that share
//! a prefix nest together and the fan-out of any directory is bounded by the
//! characters that occur at that position, not by the number of assets.
//!
//! ```text
//! abc.jpg        ->  a/b/c/abc.jpg
//! my photo.png   ->  m/y/_/p/h/o/t/o/my photo.png
//! ```

use percent_encoding::percent_decode_str;
use std::borrow::Cow;

/// Character written in place of anything unsafe in a directory name.
pub const PLACEHOLDER: char = '_';

/// Double-encoded space produced by some upstream URL builders.
const DOUBLE_ENCODED_SPACE: &str = "%2520";

/// Decode a stored name the way the sharding layout sees it.
///
/// Returns `None` if the decoded name cannot name a file.
pub fn decode_name(name: &str) -> Option<String> {
    let name: Cow<'_, str> = if name.contains(DOUBLE_ENCODED_SPACE) {
        Cow::Owned(name.replace(DOUBLE_ENCODED_SPACE, "%20"))
    } else {
        Cow::Borrowed(name)
    };

    let decoded = percent_decode_str(&name).decode_utf8_lossy().into_owned();
    match decoded.as_str() {
        "" | "." | ".." => None,
        _ => Some(decoded),
    }
}

/// Relative sharded path for a name, using `/` separators.
///
/// The output is allocated once at its exact final size.
///
/// ```
/// use vasari_storage::shard_path;
///
/// assert_eq!(shard_path("abc.jpg").as_deref(), Some("a/b/c/abc.jpg"));
/// assert_eq!(shard_path("my%2520photo.png").as_deref(), Some("m/y/_/p/h/o/t/o/my photo.png"));
/// assert_eq!(shard_path(".."), None);
/// ```
pub fn shard_path(name: &str) -> Option<String> {
    let name = decode_name(name)?;
    let stem = stem(&name);

    let length = stem
        .chars()
        .map(|c| directory_char(c).len_utf8() + 1)
        .sum::<usize>()
        + name.chars().map(|c| file_char(c).len_utf8()).sum::<usize>();

    let mut path = String::with_capacity(length);
    for c in stem.chars() {
        path.push(directory_char(c));
        path.push('/');
    }
    path.extend(name.chars().map(file_char));

    debug_assert_eq!(path.len(), length);
    Some(path)
}

/// Name without its final extension.
fn stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(index) => &name[..index],
        None => name,
    }
}

fn directory_char(c: char) -> char {
    match c {
        '\0' | '/' | '\\' | '+' | ' ' | '.' | ':' => PLACEHOLDER,
        c if c.is_control() => PLACEHOLDER,
        c => c,
    }
}

fn file_char(c: char) -> char {
    match c {
        '\0' | '/' | '\\' => PLACEHOLDER,
        c => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_stem_character_is_a_directory() {
        assert_eq!(shard_path("abc.jpg").unwrap(), "a/b/c/abc.jpg");
        assert_eq!(shard_path("abc").unwrap(), "a/b/c/abc");
    }

    #[test]
    fn only_final_extension_is_dropped() {
        assert_eq!(shard_path("a.b.png").unwrap(), "a/_/b/a.b.png");
    }

    #[test]
    fn unsafe_characters_are_replaced() {
        assert_eq!(shard_path("a+b c.gif").unwrap(), "a/_/b/_/c/a+b c.gif");
        assert_eq!(shard_path("x:y.gif").unwrap(), "x/_/y/x:y.gif");
        assert_eq!(shard_path("x%00y.gif").unwrap(), "x/_/y/x_y.gif");
    }

    #[test]
    fn slashes_never_escape_the_final_component() {
        assert_eq!(shard_path("../x.png").unwrap(), "_/_/_/x/.._x.png");
        assert_eq!(shard_path("a%2Fb.png").unwrap(), "a/_/b/a_b.png");
    }

    #[test]
    fn double_encoded_space_is_folded() {
        assert_eq!(shard_path("a%2520b.jpg").unwrap(), "a/_/b/a b.jpg");
        assert_eq!(shard_path("a%20b.jpg").unwrap(), "a/_/b/a b.jpg");
    }

    #[test]
    fn multibyte_characters_are_single_directories() {
        assert_eq!(shard_path("ünï.png").unwrap(), "ü/n/ï/ünï.png");
    }

    #[test]
    fn degenerate_names_are_rejected() {
        for name in ["", ".", "..", "%2E", "%2e%2E"] {
            assert_eq!(shard_path(name), None, "accepted {:?}", name);
        }
    }

    #[test]
    fn dot_file_has_no_directories() {
        assert_eq!(shard_path(".hidden").unwrap(), ".hidden");
    }
}
