// MCP resources: character://{code}/profile and character://{code}/profile_image
//
// Both are enumerated for every local description file. Profiles are served
// as JSON text, profile images as base64 blobs with their MIME type.

use std::path::Path;

use rmcp::ErrorData as McpError;
use rmcp::model::{RawResource, Resource, ResourceContents};

use storyworld::core::context::{ContextBuilder, ImagePayload};
use storyworld::core::record::description_files;
use storyworld::error::StoryworldError;

const SCHEME: &str = "character://";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Profile,
    ProfileImage,
}

impl ResourceKind {
    fn suffix(self) -> &'static str {
        match self {
            ResourceKind::Profile => "profile",
            ResourceKind::ProfileImage => "profile_image",
        }
    }
}

pub fn resource_uri(code: &str, kind: ResourceKind) -> String {
    format!("{}{}/{}", SCHEME, code, kind.suffix())
}

/// Split a `character://` URI into its code and resource kind.
pub fn parse_uri(uri: &str) -> Option<(String, ResourceKind)> {
    let rest = uri.strip_prefix(SCHEME)?;
    let (code, suffix) = rest.split_once('/')?;
    if code.is_empty() {
        return None;
    }
    let kind = match suffix {
        "profile" => ResourceKind::Profile,
        "profile_image" => ResourceKind::ProfileImage,
        _ => return None,
    };
    Some((code.to_string(), kind))
}

/// Both resources for every description file under `descriptions`.
pub fn list_character_resources(descriptions: &Path) -> Vec<Resource> {
    let mut resources = Vec::new();
    for path in description_files(descriptions) {
        let Some(code) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };

        let mut profile = RawResource::new(
            resource_uri(&code, ResourceKind::Profile),
            format!("{} profile", code),
        );
        profile.mime_type = Some("application/json".into());
        profile.description = Some(format!("Description record for character {}", code));
        resources.push(Resource::new(profile, None));

        let mut image = RawResource::new(
            resource_uri(&code, ResourceKind::ProfileImage),
            format!("{} profile image", code),
        );
        image.description = Some(format!("Selected profile image for character {}", code));
        resources.push(Resource::new(image, None));
    }
    resources
}

/// Resolve one resource URI against local files. No remote completion.
pub fn read_character_resource(
    builder: &ContextBuilder,
    uri: &str,
) -> Result<ResourceContents, McpError> {
    let Some((code, kind)) = parse_uri(uri) else {
        return Err(McpError::invalid_params(
            format!("unknown resource uri: {}", uri),
            None,
        ));
    };

    match kind {
        ResourceKind::Profile => {
            let record = builder.load_record(&code).map_err(|e| to_mcp(uri, e))?;
            let text = serde_json::to_string_pretty(&record.fields)
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;
            Ok(ResourceContents::TextResourceContents {
                uri: uri.to_string(),
                mime_type: Some("application/json".into()),
                text,
                meta: None,
            })
        }
        ResourceKind::ProfileImage => {
            let selection = builder
                .local_selection(&code)
                .map_err(|e| to_mcp(uri, e))?
                .ok_or_else(|| {
                    McpError::resource_not_found(format!("no image for character {}", code), None)
                })?;
            let payload = ImagePayload::read(&selection.path)
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;
            Ok(ResourceContents::BlobResourceContents {
                uri: uri.to_string(),
                mime_type: Some(payload.mime_type.to_string()),
                blob: payload.base64(),
                meta: None,
            })
        }
    }
}

fn to_mcp(uri: &str, e: StoryworldError) -> McpError {
    match e {
        StoryworldError::CharacterNotFound(_) => {
            McpError::resource_not_found(format!("{}: {}", uri, e), None)
        }
        other => McpError::internal_error(other.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use storyworld::config::types::ResolvedPaths;

    fn builder(root: &Path) -> ContextBuilder {
        ContextBuilder::new(ResolvedPaths {
            descriptions: root.join("descriptions"),
            images: root.join("images"),
            public_images: root.join("public"),
        })
    }

    #[test]
    fn parses_both_kinds() {
        assert_eq!(
            parse_uri("character://0000g/profile"),
            Some(("0000g".into(), ResourceKind::Profile))
        );
        assert_eq!(
            parse_uri("character://0000g/profile_image"),
            Some(("0000g".into(), ResourceKind::ProfileImage))
        );
        assert_eq!(parse_uri("character:///profile"), None);
        assert_eq!(parse_uri("character://0000g/other"), None);
        assert_eq!(parse_uri("file:///etc/passwd"), None);
    }

    #[test]
    fn lists_two_resources_per_description() {
        let dir = tempfile::tempdir().unwrap();
        let desc = dir.path().join("descriptions");
        fs::create_dir_all(&desc).unwrap();
        fs::write(desc.join("0000g.yaml"), "name: Zoe\n").unwrap();
        fs::write(desc.join("0001a.yaml"), "name: Adam\n").unwrap();

        let uris: Vec<String> = list_character_resources(&desc)
            .into_iter()
            .map(|r| r.raw.uri)
            .collect();
        assert_eq!(
            uris,
            [
                "character://0000g/profile",
                "character://0000g/profile_image",
                "character://0001a/profile",
                "character://0001a/profile_image",
            ]
        );
    }

    #[test]
    fn reads_profile_and_image() {
        let dir = tempfile::tempdir().unwrap();
        let b = builder(dir.path());
        fs::create_dir_all(&b.paths().descriptions).unwrap();
        fs::write(b.paths().descriptions.join("0000g.yaml"), "name: Zoe\nage: 21\n").unwrap();
        let img_dir = b.paths().images.join("0000g");
        fs::create_dir_all(&img_dir).unwrap();
        fs::write(img_dir.join("a.png"), b"png").unwrap();

        match read_character_resource(&b, "character://0000g/profile").unwrap() {
            ResourceContents::TextResourceContents { text, mime_type, .. } => {
                assert_eq!(mime_type.as_deref(), Some("application/json"));
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["name"], "Zoe");
                assert_eq!(value["age"], 21);
            }
            other => panic!("expected text, got {:?}", other),
        }

        match read_character_resource(&b, "character://0000g/profile_image").unwrap() {
            ResourceContents::BlobResourceContents { blob, mime_type, .. } => {
                assert_eq!(mime_type.as_deref(), Some("image/png"));
                assert_eq!(blob, "cG5n");
            }
            other => panic!("expected blob, got {:?}", other),
        }
    }

    #[test]
    fn unknown_character_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let b = builder(dir.path());
        assert!(read_character_resource(&b, "character://nobody/profile").is_err());
        assert!(read_character_resource(&b, "character://nobody/profile_image").is_err());
        assert!(read_character_resource(&b, "bogus").is_err());
    }
}
