use crate::form::UploadedFile;
use actix_web::http::{header::ContentType, StatusCode};
use actix_web::{web, HttpResponse, ResponseError};
use chrono::Utc;
use image::error::{ImageError, LimitError, LimitErrorKind};
use image::io::{Limits, Reader};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Width in pixels every article title image is scaled to.
pub const ARTICLE_AVATAR_WIDTH: u32 = 480;

/// Largest width or height accepted on upload, and produced by a resize.
pub const MAX_IMAGE_SIDE: u32 = 8192;

/// Decoder allocation ceiling for a single upload.
const MAX_DECODE_ALLOC: u64 = 256 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("upload is not a supported image: {0}")]
    Decode(image::ImageError),
    #[error("image could not be encoded: {0}")]
    Encode(image::ImageError),
    #[error("media file could not be written: {0}")]
    Io(#[from] std::io::Error),
    #[error("media worker was cancelled")]
    Blocking,
}

impl ResponseError for MediaError {
    fn status_code(&self) -> StatusCode {
        match self {
            MediaError::Decode(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            MediaError::Decode(_) => "The uploaded file is not a valid image.",
            _ => {
                log::error!("MediaError: {}", self);
                "The uploaded file could not be stored."
            }
        };

        HttpResponse::build(self.status_code())
            .content_type(ContentType::plaintext())
            .body(body)
    }
}

/// Uploaded media on local disk, served back under `/media/`.
#[derive(Clone, Debug)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores an article title image scaled to `ARTICLE_AVATAR_WIDTH`.
    /// Returns the path relative to the media root.
    pub async fn save_article_avatar(&self, upload: UploadedFile) -> Result<String, MediaError> {
        self.store("article", upload, Some(ARTICLE_AVATAR_WIDTH)).await
    }

    /// Stores a profile picture unchanged, once it is known to decode.
    pub async fn save_user_avatar(&self, upload: UploadedFile) -> Result<String, MediaError> {
        self.store("avatar", upload, None).await
    }

    async fn store(
        &self,
        folder: &'static str,
        upload: UploadedFile,
        width: Option<u32>,
    ) -> Result<String, MediaError> {
        let root = self.root.to_owned();
        log::debug!("MediaStore::store: {} ({} bytes)", upload.filename, upload.data.len());

        web::block(move || store_image(&root, folder, &upload.data, width))
            .await
            .map_err(|_| MediaError::Blocking)?
    }
}

pub fn get_file_url_by_filename(filename: &str) -> String {
    format!("/media/{}", filename)
}

fn too_large() -> MediaError {
    MediaError::Decode(ImageError::Limits(LimitError::from_kind(
        LimitErrorKind::DimensionError,
    )))
}

/// Scales to a fixed width, keeping the aspect ratio. Height is truncated.
/// Tall, narrow images whose scaled height would pass `MAX_IMAGE_SIDE` are
/// rejected.
pub fn resize_to_width(img: &DynamicImage, width: u32) -> Result<DynamicImage, MediaError> {
    let (x, y) = img.dimensions();
    if x == 0 {
        return Ok(img.to_owned());
    }

    let height = width as u64 * y as u64 / x as u64;
    if height > MAX_IMAGE_SIDE as u64 {
        return Err(too_large());
    }

    Ok(img.resize_exact(width, (height as u32).max(1), FilterType::Lanczos3))
}

fn decode(data: &[u8], format: image::ImageFormat) -> Result<DynamicImage, MediaError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_SIDE);
    limits.max_image_height = Some(MAX_IMAGE_SIDE);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);

    let mut reader = Reader::with_format(Cursor::new(data), format);
    reader.limits(limits);
    reader.decode().map_err(MediaError::Decode)
}

fn store_image(
    root: &Path,
    folder: &str,
    data: &[u8],
    width: Option<u32>,
) -> Result<String, MediaError> {
    let format = image::guess_format(data).map_err(MediaError::Decode)?;
    let img = decode(data, format)?;

    let bytes = match width {
        Some(width) => {
            let mut buf: Vec<u8> = Vec::with_capacity(data.len());
            resize_to_width(&img, width)?
                .write_to(&mut Cursor::new(&mut buf), format)
                .map_err(MediaError::Encode)?;
            buf
        }
        None => data.to_vec(),
    };

    // Content addressed, so re-uploading the same picture reuses one file.
    let extension = format.extensions_str().first().copied().unwrap_or("img");
    let relative = format!(
        "{}/{}/{}.{}",
        folder,
        Utc::now().format("%Y%m%d"),
        blake3::hash(&bytes).to_hex(),
        extension
    );

    let path = root.join(&relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &bytes)?;

    log::info!("store_image: wrote {}", relative);
    Ok(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("rublog-media-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn resize_keeps_aspect_ratio() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(960, 480));
        assert_eq!(resize_to_width(&img, 480).unwrap().dimensions(), (480, 240));

        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 333));
        assert_eq!(resize_to_width(&img, 480).unwrap().dimensions(), (480, 1598));
    }

    #[test]
    fn resize_refuses_runaway_height() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(1, 20));
        assert!(matches!(
            resize_to_width(&img, 480),
            Err(MediaError::Decode(ImageError::Limits(_)))
        ));
    }

    #[test]
    fn store_image_rejects_oversized_uploads() {
        let root = temp_root();

        // Passes decoding, but would scale to 480x9600.
        let res = store_image(&root, "article", &png_bytes(1, 20), Some(480));
        assert!(matches!(res, Err(MediaError::Decode(_))));

        let res = store_image(&root, "avatar", &png_bytes(1, MAX_IMAGE_SIDE + 1), None);
        assert!(matches!(res, Err(MediaError::Decode(_))));

        assert!(!root.exists());
    }

    #[test]
    fn store_image_scales_and_writes() {
        let root = temp_root();
        let relative = store_image(&root, "article", &png_bytes(960, 720), Some(480)).unwrap();

        assert!(relative.starts_with("article/"));
        assert!(relative.ends_with(".png"));

        let written = image::open(root.join(&relative)).unwrap();
        assert_eq!(written.dimensions(), (480, 360));

        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn store_image_rejects_garbage() {
        let root = temp_root();
        let res = store_image(&root, "avatar", b"definitely not a picture", None);
        assert!(matches!(res, Err(MediaError::Decode(_))));
        assert!(!root.exists());
    }
}
