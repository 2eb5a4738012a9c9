//! Media reference resolution.
//!
//! A render request names its background clip loosely: a bare id (`"3"`,
//! `"template3"`), a path, a full URL, or nothing at all, sometimes with an
//! explicit URL next to it. [`resolve_media_url`] maps that into exactly one
//! canonical URL. Resolution is pure and never fails; unusable input degrades
//! to [`MediaSettings::default_template`].

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Literal prefix stripped from template ids (`"template3"` -> `"3"`).
const TEMPLATE_ID_PREFIX: &str = "template";

/// Where template media is served from and what to fall back to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    /// Server-rooted path under which template clips are served.
    pub prefix: String,
    /// Reference used when nothing usable was supplied.
    pub default_template: String,
    /// Extension appended to template names that have none.
    pub default_extension: String,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            prefix: "/videos/templates".to_string(),
            default_template: "/videos/templates/1.mp4".to_string(),
            default_extension: "mp4".to_string(),
        }
    }
}

/// A template reference, classified once at the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    /// A bare identifier such as `"3"` or `"template3"`.
    ById(String),
    /// A relative or server-rooted path such as `"/videos/templates/3.mp4"`.
    ByPath(String),
    /// An absolute `http(s)` URL.
    ByUrl(String),
    Unspecified,
}

impl TemplateRef {
    /// Classify a raw template string.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return TemplateRef::Unspecified;
        };

        if is_absolute_url(raw) {
            TemplateRef::ByUrl(raw.to_string())
        } else if raw.contains('/') {
            TemplateRef::ByPath(raw.to_string())
        } else {
            TemplateRef::ById(raw.to_string())
        }
    }

    /// The raw text this reference was built from, if any.
    pub fn raw(&self) -> Option<&str> {
        match self {
            TemplateRef::ById(s) | TemplateRef::ByPath(s) | TemplateRef::ByUrl(s) => Some(s),
            TemplateRef::Unspecified => None,
        }
    }

    pub fn is_specified(&self) -> bool {
        !matches!(self, TemplateRef::Unspecified)
    }
}

/// Resolve a template reference plus optional explicit URL into one canonical URL.
///
/// First match wins:
/// 1. explicit absolute `http(s)` URL, verbatim
/// 2. explicit path already under the media prefix, verbatim
/// 3. id or path template, normalized to `<prefix>/<filename>`
/// 4. URL template, verbatim
/// 5. any other explicit URL, re-rooted under the prefix by filename
/// 6. template text used as a filename without prefix stripping
/// 7. the configured default
pub fn resolve_media_url(
    template: &TemplateRef,
    explicit_url: Option<&str>,
    settings: &MediaSettings,
) -> String {
    let explicit = explicit_url.map(str::trim).filter(|u| !u.is_empty());
    let prefix = settings.prefix.trim_end_matches('/');
    let ext = settings.default_extension.as_str();

    if let Some(url) = explicit {
        if is_absolute_url(url) {
            return url.to_string();
        }
        if url.starts_with(&format!("{prefix}/")) {
            return url.to_string();
        }
    }

    match template {
        TemplateRef::ById(raw) | TemplateRef::ByPath(raw) => {
            if let Some(name) = template_filename(raw, true, ext) {
                return format!("{prefix}/{name}");
            }
        }
        TemplateRef::ByUrl(url) => return url.clone(),
        TemplateRef::Unspecified => {}
    }

    if let Some(name) = explicit.and_then(last_segment) {
        return format!("{prefix}/{name}");
    }

    if let Some(name) = template.raw().and_then(|raw| template_filename(raw, false, ext)) {
        return format!("{prefix}/{name}");
    }

    settings.default_template.clone()
}

pub fn is_absolute_url(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Final non-empty path segment, ignoring `.` and `..`.
fn last_segment(path: &str) -> Option<&str> {
    path.split(['/', '\\'])
        .map(str::trim)
        .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .last()
}

fn template_filename(raw: &str, strip_prefix: bool, ext: &str) -> Option<String> {
    let name = last_segment(raw)?;
    let name = if strip_prefix {
        name.strip_prefix(TEMPLATE_ID_PREFIX)
            .map(|rest| rest.trim_start_matches(['-', '_']))
            .unwrap_or(name)
    } else {
        name
    };

    if name.is_empty() {
        return None;
    }

    if Path::new(name).extension().is_some() {
        Some(name.to_string())
    } else {
        Some(format!("{name}.{ext}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(template: Option<&str>, url: Option<&str>) -> String {
        resolve_media_url(&TemplateRef::parse(template), url, &MediaSettings::default())
    }

    #[test]
    fn parse_classifies_references() {
        assert_eq!(TemplateRef::parse(None), TemplateRef::Unspecified);
        assert_eq!(TemplateRef::parse(Some("   ")), TemplateRef::Unspecified);
        assert_eq!(
            TemplateRef::parse(Some("template3")),
            TemplateRef::ById("template3".into())
        );
        assert_eq!(
            TemplateRef::parse(Some("/videos/templates/3.mp4")),
            TemplateRef::ByPath("/videos/templates/3.mp4".into())
        );
        assert_eq!(
            TemplateRef::parse(Some("HTTPS://cdn.example.com/a.mp4")),
            TemplateRef::ByUrl("HTTPS://cdn.example.com/a.mp4".into())
        );
    }

    #[test]
    fn resolution_table() {
        let cases: &[(Option<&str>, Option<&str>, &str)] = &[
            (Some("template3"), None, "/videos/templates/3.mp4"),
            (Some("9"), None, "/videos/templates/9.mp4"),
            (Some("template-4"), None, "/videos/templates/4.mp4"),
            (Some("7.webm"), None, "/videos/templates/7.webm"),
            (None, Some("http://x/y.mp4"), "http://x/y.mp4"),
            (Some("template3"), Some("https://cdn/z.mp4"), "https://cdn/z.mp4"),
            (Some("template3"), Some("/videos/templates/5.mp4"), "/videos/templates/5.mp4"),
            (Some("https://cdn/t.mp4"), None, "https://cdn/t.mp4"),
            (Some("/uploads/clips/6.mp4"), None, "/videos/templates/6.mp4"),
            (None, Some("videos/templates/8.mp4"), "/videos/templates/8.mp4"),
            (None, Some("./other/dir/2.mov"), "/videos/templates/2.mov"),
            (None, None, "/videos/templates/1.mp4"),
        ];

        for (template, url, expected) in cases {
            assert_eq!(
                &resolve(*template, *url),
                expected,
                "template={template:?} url={url:?}"
            );
        }
    }

    #[test]
    fn template_rule_beats_rerooted_explicit_url() {
        assert_eq!(
            resolve(Some("template2"), Some("somewhere/else.mp4")),
            "/videos/templates/2.mp4"
        );
    }

    #[test]
    fn bare_prefix_falls_back_to_unstripped_name() {
        assert_eq!(resolve(Some("template"), None), "/videos/templates/template.mp4");
    }

    #[test]
    fn unusable_input_degrades_to_default() {
        assert_eq!(resolve(Some("/"), Some("..")), "/videos/templates/1.mp4");
    }

    #[test]
    fn custom_settings_are_honored() {
        let settings = MediaSettings {
            prefix: "/media/".to_string(),
            default_template: "/media/intro.webm".to_string(),
            default_extension: "webm".to_string(),
        };
        let url = resolve_media_url(&TemplateRef::parse(Some("template12")), None, &settings);
        assert_eq!(url, "/media/12.webm");
        let url = resolve_media_url(&TemplateRef::Unspecified, None, &settings);
        assert_eq!(url, "/media/intro.webm");
    }
}
