//! The CMS's standard asset types

use crate::asset_type::{AssetType, AssetTypeRegistry, RegistryBuilder, StyleSpec};
use crate::processing::THUMBNAIL_PROCESSOR;

pub const IMAGE_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/x-png",
    "image/jpeg",
    "image/pjpeg",
    "image/jpg",
    "image/gif",
];

pub const VIDEO_MIME_TYPES: &[&str] = &[
    "application/x-mp4",
    "video/mpeg",
    "video/quicktime",
    "video/x-la-asf",
    "video/x-ms-asf",
    "video/x-msvideo",
    "video/x-sgi-movie",
    "video/x-flv",
    "flv-application/octet-stream",
    "video/3gpp",
    "video/3gpp2",
    "video/3gpp-tt",
    "video/BMPEG",
    "video/BT656",
    "video/CelB",
    "video/DV",
    "video/H261",
    "video/H263",
    "video/H263-1998",
    "video/H263-2000",
    "video/H264",
    "video/JPEG",
    "video/MJ2",
    "video/MP1S",
    "video/MP2P",
    "video/MP2T",
    "video/mp4",
    "video/MP4V-ES",
    "video/MPV",
    "video/mpeg4",
    "video/mpeg4-generic",
    "video/nv",
    "video/parityfec",
    "video/pointer",
    "video/raw",
    "video/rtx",
    "video/ogg",
    "video/webm",
    "video/x-ms-wmv",
];

pub const AUDIO_MIME_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mpg",
    "audio/ogg",
    "application/ogg",
    "audio/x-ms-wma",
    "audio/vnd.rn-realaudio",
    "audio/x-wav",
];

pub const SWF_MIME_TYPES: &[&str] = &["application/x-shockwave-flash"];

pub const PDF_MIME_TYPES: &[&str] = &["application/pdf", "application/x-pdf"];

/// Builder preloaded with image, video, audio, swf, pdf, movie and other.
///
/// `movie` declares the video and swf MIME types again; those stay classified
/// as `video`/`swf`, but filtering by `movie` selects both.
pub fn standard_types() -> RegistryBuilder {
    let movie_mimes = VIDEO_MIME_TYPES.iter().chain(SWF_MIME_TYPES).copied();

    AssetTypeRegistry::builder()
        .register(
            AssetType::new("image")
                .mime_types(IMAGE_MIME_TYPES.iter().copied())
                .processor(THUMBNAIL_PROCESSOR)
                .style("icon", StyleSpec::new("42x42#").format("png"))
                .style("thumbnail", StyleSpec::new("100x100#").format("png")),
        )
        .register(AssetType::new("video").mime_types(VIDEO_MIME_TYPES.iter().copied()))
        .register(AssetType::new("audio").mime_types(AUDIO_MIME_TYPES.iter().copied()))
        .register(AssetType::new("swf").mime_types(SWF_MIME_TYPES.iter().copied()))
        .register(AssetType::new("pdf").mime_types(PDF_MIME_TYPES.iter().copied()))
        .register(AssetType::new("movie").mime_types(movie_mimes))
        .register(AssetType::new("other"))
}

pub fn standard_registry() -> AssetTypeRegistry {
    standard_types().build()
}
