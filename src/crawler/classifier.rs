//! Post classifier
//!
//! Maps one raw post from either dialect to a `PostRecord`. Classification is
//! pure: the same raw post and image preference always yield an equal record.
//!
//! Common fields (id, type, timestamp, tags) are read for every post. Fields
//! that only some post types carry are added in `type_specific_fields`; photo
//! posts are the only type with extra fields today. Type-specific fields are
//! decoded leniently: a bad photo size is dropped, never the post.

use crate::crawler::parser::{lenient_opt_i64, lenient_opt_u64, RawPost, XmlPhoto, XmlPost};
use crate::model::{epoch, local_time_from_epoch, ImageSize, PhotoVariant, PostId, PostRecord, PostType};
use serde::Deserialize;
use std::collections::BTreeSet;
use thiserror::Error;

/// Reasons a single post is skipped
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("post has no id")]
    MissingId,

    #[error("malformed post: {0}")]
    Malformed(String),
}

/// Dialect-neutral view of one post's common fields
struct PostPayload {
    id: Option<String>,
    kind: Option<String>,
    timestamp: Option<i64>,
    tags: Vec<String>,
}

/// One photo with its available sizes
///
/// Alternates carry the nominal width used for matching the size preference
/// alongside the variant itself.
struct PhotoPayload {
    original: Option<PhotoVariant>,
    alternates: Vec<(u32, PhotoVariant)>,
}

#[derive(Deserialize)]
struct JsonPost {
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    id: Option<u64>,
    #[serde(default)]
    id_string: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    timestamp: Option<i64>,
    #[serde(default)]
    tags: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct JsonPhoto {
    #[serde(default)]
    original_size: Option<serde_json::Value>,
    #[serde(default)]
    alt_sizes: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct JsonVariant {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    width: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    height: Option<u64>,
}

impl JsonVariant {
    /// `None` when the size has no usable URL
    fn into_variant(self) -> Option<PhotoVariant> {
        let url = self.url.filter(|url| !url.trim().is_empty())?;
        Some(PhotoVariant {
            url,
            width: dimension(self.width),
            height: dimension(self.height),
        })
    }
}

fn dimension(value: Option<u64>) -> u32 {
    value
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

/// Classifies one raw post
///
/// Missing tags become an empty set and a missing timestamp becomes the epoch.
/// A post without an id cannot be keyed and is rejected.
pub fn classify_post(raw: &RawPost, image_size: ImageSize) -> Result<PostRecord, ClassifyError> {
    let payload = match raw {
        RawPost::Json(value) => json_payload(value)?,
        RawPost::Xml(post) => xml_payload(post),
    };

    let id = payload
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(PostId::from)
        .ok_or(ClassifyError::MissingId)?;

    let post_type = payload
        .kind
        .as_deref()
        .map(PostType::from_api_str)
        .unwrap_or(PostType::Unknown);

    let timestamp = payload.timestamp.map(local_time_from_epoch).unwrap_or_else(epoch);

    let tags: BTreeSet<String> = payload
        .tags
        .iter()
        .filter(|t| !t.trim().is_empty())
        .cloned()
        .collect();

    Ok(PostRecord {
        id,
        post_type,
        timestamp,
        tags,
        photo_variants: type_specific_fields(post_type, raw, image_size),
    })
}

fn type_specific_fields(
    post_type: PostType,
    raw: &RawPost,
    image_size: ImageSize,
) -> Option<Vec<PhotoVariant>> {
    match post_type {
        PostType::Photo => {
            let photos = match raw {
                RawPost::Json(value) => json_photos(value),
                RawPost::Xml(post) => post.photos.iter().map(xml_photo).collect(),
            };
            Some(
                photos
                    .iter()
                    .filter_map(|photo| select_variant(photo, image_size))
                    .collect(),
            )
        }
        _ => None,
    }
}

/// Picks the variant matching the preference, else the original, else the largest
fn select_variant(photo: &PhotoPayload, image_size: ImageSize) -> Option<PhotoVariant> {
    let preferred = image_size.preferred_width().and_then(|width| {
        photo
            .alternates
            .iter()
            .find(|(nominal, _)| *nominal == width)
            .map(|(_, variant)| variant.clone())
    });

    preferred
        .or_else(|| photo.original.clone())
        .or_else(|| {
            photo
                .alternates
                .iter()
                .max_by_key(|(nominal, _)| *nominal)
                .map(|(_, variant)| variant.clone())
        })
}

fn json_payload(value: &serde_json::Value) -> Result<PostPayload, ClassifyError> {
    let post = JsonPost::deserialize(value).map_err(|e| ClassifyError::Malformed(e.to_string()))?;

    let id = post
        .id_string
        .filter(|s| !s.trim().is_empty())
        .or_else(|| post.id.map(|id| id.to_string()));

    Ok(PostPayload {
        id,
        kind: post.kind,
        timestamp: post.timestamp,
        tags: json_tags(post.tags),
    })
}

/// Tags as a list of strings; non-string entries are ignored
fn json_tags(tags: Option<serde_json::Value>) -> Vec<String> {
    json_array(tags)
        .into_iter()
        .filter_map(|item| match item {
            serde_json::Value::String(tag) => Some(tag),
            _ => None,
        })
        .collect()
}

fn json_variant(value: serde_json::Value) -> Option<PhotoVariant> {
    JsonVariant::deserialize(value).ok()?.into_variant()
}

/// Elements of a JSON array field; any other shape reads as empty
fn json_array(value: Option<serde_json::Value>) -> Vec<serde_json::Value> {
    match value {
        Some(serde_json::Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Photos of a JSON photo post, skipping entries that are not photo objects
fn json_photos(value: &serde_json::Value) -> Vec<PhotoPayload> {
    json_array(value.get("photos").cloned())
        .into_iter()
        .filter_map(|photo| JsonPhoto::deserialize(photo).ok())
        .map(|photo| PhotoPayload {
            original: photo.original_size.and_then(json_variant),
            alternates: json_array(photo.alt_sizes)
                .into_iter()
                .filter_map(json_variant)
                .map(|variant| (variant.width, variant))
                .collect(),
        })
        .collect()
}

fn xml_payload(post: &XmlPost) -> PostPayload {
    PostPayload {
        id: post.id.clone(),
        kind: post.post_type.clone(),
        timestamp: post.unix_timestamp,
        tags: post.tags.clone(),
    }
}

/// Sizes a `max-width` rendition of an XML photo
///
/// The rendition is never wider than the upload; height scales with width when
/// the upload's dimensions are known.
fn scaled_variant(photo: &XmlPhoto, max_width: u32, url: &str) -> PhotoVariant {
    let (width, height) = match (photo.width, photo.height) {
        (Some(w), Some(h)) if w > 0 => {
            let width = w.min(max_width);
            let height = (u64::from(h) * u64::from(width) / u64::from(w)) as u32;
            (width, height)
        }
        _ => (max_width, 0),
    };

    PhotoVariant {
        url: url.to_string(),
        width,
        height,
    }
}

fn xml_photo(photo: &XmlPhoto) -> PhotoPayload {
    let alternates: Vec<(u32, PhotoVariant)> = photo
        .sizes
        .iter()
        .map(|(max_width, url)| (*max_width, scaled_variant(photo, *max_width, url)))
        .collect();

    let original = alternates
        .iter()
        .max_by_key(|(nominal, _)| *nominal)
        .map(|(_, variant)| variant.clone());

    PhotoPayload {
        original,
        alternates,
    }
}
