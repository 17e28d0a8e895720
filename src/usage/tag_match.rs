// ABOUTME: Matching of model image tags across simple and extended formats.
// ABOUTME: `<modelId>-<version>` must match `<modelId>-<version>-<timestamp>_<unique>`.

/// First two `-`-separated parts of a model tag, or the whole tag.
pub fn model_tag_prefix(tag: &str) -> &str {
    match tag.match_indices('-').nth(1) {
        Some((pos, _)) => &tag[..pos],
        None => tag,
    }
}

/// Whether a registry tag and a recorded model tag refer to the same build.
pub fn model_tags_match(registry_tag: &str, stored_tag: &str) -> bool {
    if registry_tag == stored_tag {
        return true;
    }
    if registry_tag
        .strip_prefix(stored_tag)
        .is_some_and(|rest| rest.starts_with('-'))
    {
        return true;
    }

    let prefix = model_tag_prefix(registry_tag);
    stored_tag == prefix
        || stored_tag
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('-'))
}
