//! Post forms carrying an image.
//!
//! The post form is sent as `multipart/form-data` so that it can carry an image file. Images are
//! stored below the media directory under a generated name; only that relative path ends up in
//! the database.
use gotham::state::{FromState, State};
use http::header::{HeaderMap, CONTENT_TYPE};
use multipart::server::Multipart;
use rand::Rng;

use std::fs;
use std::io::{self, Cursor, Read};
use std::path::Path;

use crate::{error::BlogError, form::PostForm};

/// Largest image accepted, in bytes
const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Directory below the media directory that holds post images
pub const IMAGE_DIR: &str = "post_images";

/// An image file sent with a post form.
#[derive(Clone, Debug, PartialEq)]
pub struct Upload {
    /// Name of the file on the author's machine
    pub filename: String,
    pub data: Vec<u8>,
}

impl Upload {
    /// The lower-cased extension of an accepted image type.
    fn extension(&self) -> Option<String> {
        let extension = Path::new(&self.filename)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Some(extension)
        } else {
            None
        }
    }

    /// Checks the file and picks the path it will be stored at, relative to the media directory.
    ///
    /// The error is meant for the image field of the form.
    pub fn check(&self) -> Result<String, &'static str> {
        if self.data.len() as u64 > MAX_IMAGE_BYTES {
            return Err("The image may be at most 5 MB large.");
        }
        let extension = self
            .extension()
            .ok_or("Upload a JPEG, PNG, GIF or WebP image.")?;
        let name: u64 = rand::thread_rng().gen();
        Ok(format!("{}/{:016x}.{}", IMAGE_DIR, name, extension))
    }

    /// Writes the file to `path` below `media_dir`.
    pub fn save(&self, media_dir: &Path, path: &str) -> io::Result<()> {
        let target = media_dir.join(path);
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&target, &self.data)?;
        log::info!("Stored image {}", target.display());
        Ok(())
    }
}

/// Reads a submitted post form along with the image sent with it, if any.
///
/// Plain url-encoded forms are accepted too, they just never carry an image.
pub fn read_post_form(
    state: &State,
    body: &[u8],
) -> Result<(PostForm, Option<Upload>), failure::Error> {
    match boundary(HeaderMap::borrow_from(state)) {
        Some(boundary) => read_multipart(body, boundary)
            .map_err(|e| BlogError::BadRequest(format!("malformed form data: {}", e)).into()),
        None => Ok((serde_urlencoded::from_bytes(body)?, None)),
    }
}

/// The multipart boundary, if the request body is `multipart/form-data`.
fn boundary(headers: &HeaderMap) -> Option<String> {
    let content_type: mime::Mime = headers.get(CONTENT_TYPE)?.to_str().ok()?.parse().ok()?;
    if content_type.type_() != mime::MULTIPART || content_type.subtype() != mime::FORM_DATA {
        return None;
    }
    content_type
        .get_param(mime::BOUNDARY)
        .map(|boundary| boundary.as_str().to_owned())
}

fn read_multipart(
    body: &[u8],
    boundary: String,
) -> Result<(PostForm, Option<Upload>), failure::Error> {
    let mut multipart = Multipart::with_body(Cursor::new(body), boundary);
    let mut fields = Vec::new();
    let mut upload = None;

    while let Some(mut field) = multipart.read_entry()? {
        let name = field.headers.name.to_string();
        match field.headers.filename.clone() {
            Some(filename) => {
                let mut data = Vec::new();
                // One byte over the limit is enough to reject the file.
                (&mut field.data)
                    .take(MAX_IMAGE_BYTES + 1)
                    .read_to_end(&mut data)?;
                // Browsers send an empty file part when no file was picked.
                if name == "image" && !filename.is_empty() && !data.is_empty() {
                    upload = Some(Upload { filename, data });
                }
            }
            None => {
                let mut value = String::new();
                field.data.read_to_string(&mut value)?;
                fields.push((name, value));
            }
        }
    }

    // The text fields go through the same lenient decoding as url-encoded forms.
    let encoded = serde_urlencoded::to_string(&fields)?;
    Ok((serde_urlencoded::from_str(&encoded)?, upload))
}

#[cfg(test)]
mod tests {
    use http::header::HeaderValue;

    use super::*;

    const BOUNDARY: &str = "----blogicum0123";

    fn part(name: &str, value: &str) -> String {
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            BOUNDARY, name, value
        )
    }

    fn file_part(filename: &str, data: &str) -> String {
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{}\r\n",
            BOUNDARY, filename, data
        )
    }

    fn body(parts: &[String]) -> Vec<u8> {
        let mut body = parts.concat();
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        body.into_bytes()
    }

    #[test]
    fn multipart_content_type() {
        let mut headers = HeaderMap::new();
        assert_eq!(boundary(&headers), None);

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        assert_eq!(boundary(&headers), None);

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=----blogicum0123"),
        );
        assert_eq!(boundary(&headers).as_deref(), Some(BOUNDARY));
    }

    #[test]
    fn reads_fields_and_image() {
        let body = body(&[
            part("title", "Harbour"),
            part("text", "Boats & gulls"),
            part("pub_date", "2020-07-01T10:00:00"),
            part("category", "3"),
            part("is_published", "on"),
            file_part("Harbour.JPG", "not really a jpeg"),
        ]);
        let (form, upload) = read_multipart(&body, BOUNDARY.to_owned()).unwrap();
        assert_eq!(form.title, "Harbour");
        assert_eq!(form.text, "Boats & gulls");
        assert_eq!(form.category, "3");
        assert!(form.is_published);

        let upload = upload.unwrap();
        assert_eq!(upload.filename, "Harbour.JPG");
        assert_eq!(upload.data, b"not really a jpeg");
    }

    #[test]
    fn empty_file_input_is_no_upload() {
        let body = body(&[part("title", "No picture"), file_part("", "")]);
        let (form, upload) = read_multipart(&body, BOUNDARY.to_owned()).unwrap();
        assert_eq!(form.title, "No picture");
        assert!(!form.is_published);
        assert_eq!(upload, None);
    }

    #[test]
    fn accepted_images() {
        let upload = Upload {
            filename: String::from("sea.PNG"),
            data: vec![1, 2, 3],
        };
        let path = upload.check().unwrap();
        assert!(path.starts_with("post_images/"));
        assert!(path.ends_with(".png"));
        assert_ne!(upload.check().unwrap(), path);

        let script = Upload {
            filename: String::from("sea.png.sh"),
            data: vec![1],
        };
        assert_eq!(
            script.check().unwrap_err(),
            "Upload a JPEG, PNG, GIF or WebP image."
        );

        let huge = Upload {
            filename: String::from("huge.jpg"),
            data: vec![0; MAX_IMAGE_BYTES as usize + 1],
        };
        assert!(huge.check().is_err());
    }

    #[test]
    fn saves_below_media_dir() {
        let media_dir = std::env::temp_dir().join(format!(
            "blogicum-media-{:x}",
            rand::thread_rng().gen::<u64>()
        ));
        let upload = Upload {
            filename: String::from("sea.jpg"),
            data: b"jpeg bytes".to_vec(),
        };
        let path = upload.check().unwrap();
        upload.save(&media_dir, &path).unwrap();
        assert_eq!(fs::read(media_dir.join(&path)).unwrap(), b"jpeg bytes");
        fs::remove_dir_all(&media_dir).unwrap();
    }
}
