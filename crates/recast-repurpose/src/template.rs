// ABOUTME: Placeholder substitution for user snippet templates
// ABOUTME: Renders {{title}}, {{content}} and {{tags}} and formats tags as hashtags
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use crate::rules::SourceContent;

/// Placeholder replaced by the content title
pub const TITLE_PLACEHOLDER: &str = "{{title}}";
/// Placeholder replaced by the generated or original text
pub const CONTENT_PLACEHOLDER: &str = "{{content}}";
/// Placeholder replaced by hashtags built from the content tags
pub const TAGS_PLACEHOLDER: &str = "{{tags}}";

/// Render a template body. A body without `{{content}}` gets the content appended.
///
/// Placeholders are substituted in a single pass over the template, so
/// placeholder text inside the title, tags or content is kept literally.
#[must_use]
pub fn render_template(body: &str, source: &SourceContent<'_>, content: &str) -> String {
    let tags = hashtags(source.tags);
    let mut rendered = String::with_capacity(body.len() + content.len());
    let mut saw_content = false;
    let mut rest = body;

    while let Some(start) = rest.find("{{") {
        rendered.push_str(&rest[..start]);
        let tail = &rest[start..];
        let (value, len) = if tail.starts_with(TITLE_PLACEHOLDER) {
            (source.title.trim(), TITLE_PLACEHOLDER.len())
        } else if tail.starts_with(CONTENT_PLACEHOLDER) {
            saw_content = true;
            (content, CONTENT_PLACEHOLDER.len())
        } else if tail.starts_with(TAGS_PLACEHOLDER) {
            (tags.as_str(), TAGS_PLACEHOLDER.len())
        } else {
            ("{{", 2)
        };
        rendered.push_str(value);
        rest = &tail[len..];
    }
    rendered.push_str(rest);

    if !saw_content {
        rendered.push_str("\n\n");
        rendered.push_str(content);
    }
    rendered.trim().to_owned()
}

/// Space-separated hashtags; tags with no alphanumeric characters are skipped
#[must_use]
pub fn hashtags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| tag.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|tag| !tag.is_empty())
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a template body mentions at least one known placeholder
#[must_use]
pub fn has_placeholders(body: &str) -> bool {
    [TITLE_PLACEHOLDER, CONTENT_PLACEHOLDER, TAGS_PLACEHOLDER]
        .iter()
        .any(|p| body.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_placeholders() {
        let tags = vec!["Rust".to_owned(), "open source".to_owned()];
        let source = SourceContent {
            title: " Ship it ",
            text: "ignored",
            tags: &tags,
        };
        let out = render_template("{{title}}\n{{content}}\n{{tags}}", &source, "Body.");
        assert_eq!(out, "Ship it\nBody.\n#Rust #opensource");
    }

    #[test]
    fn test_render_appends_content_without_placeholder() {
        let source = SourceContent {
            title: "T",
            text: "",
            tags: &[],
        };
        assert_eq!(render_template("Intro line", &source, "Body."), "Intro line\n\nBody.");
        assert!(!has_placeholders("Intro line"));
        assert!(has_placeholders("{{tags}}"));
    }

    #[test]
    fn test_render_keeps_placeholders_inside_values_literal() {
        let tags = vec!["rust".to_owned()];
        let source = SourceContent {
            title: "Why {{content}} matters",
            text: "",
            tags: &tags,
        };
        let out = render_template(
            "{{title}}: {{content}} {{unknown}} {{tags}}",
            &source,
            "see {{title}} and {{tags}}",
        );
        assert_eq!(
            out,
            "Why {{content}} matters: see {{title}} and {{tags}} {{unknown}} #rust"
        );
    }

    #[test]
    fn test_render_appends_content_when_only_a_value_mentions_it() {
        let source = SourceContent {
            title: "{{content}}",
            text: "",
            tags: &[],
        };
        assert_eq!(render_template("{{title}}", &source, "Body."), "{{content}}\n\nBody.");
    }
}
