use actix_multipart::Multipart;
use actix_web::{error, Error};
use futures::{StreamExt, TryStreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;

pub const MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;
pub const TITLE_MAX_CHARS: usize = 100;
pub const USERNAME_MAX_CHARS: usize = 150;
pub const PHONE_MAX_CHARS: usize = 20;
pub const BIO_MAX_CHARS: usize = 500;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// A file part of a multipart submission, held in memory.
#[derive(Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Text fields and files of a `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, Error> {
        let mut form = Self::default();

        while let Some(mut field) = multipart.try_next().await.map_err(|e| {
            log::debug!("MultipartForm::read: {}", e);
            error::ErrorBadRequest("The form upload is malformed.")
        })? {
            let disposition = field.content_disposition();
            let name = match disposition.get_name() {
                Some(name) => name.to_owned(),
                None => continue,
            };
            let filename = disposition.get_filename().map(|f| f.to_owned());

            let mut buf: Vec<u8> = Vec::with_capacity(1024);
            while let Some(chunk) = field.next().await {
                let bytes = chunk.map_err(|e| {
                    log::debug!("MultipartForm::read: field {}: {}", name, e);
                    error::ErrorBadRequest("The form upload is malformed.")
                })?;
                if buf.len() + bytes.len() > MAX_UPLOAD_BYTES {
                    return Err(error::ErrorPayloadTooLarge("The upload is too large."));
                }
                buf.extend_from_slice(&bytes);
            }

            match filename {
                // Browsers send an empty, unnamed part for a file input left blank.
                Some(filename) => {
                    if !filename.is_empty() && !buf.is_empty() {
                        form.files.insert(name, UploadedFile { filename, data: buf });
                    }
                }
                None => {
                    let value = String::from_utf8(buf)
                        .map_err(|_| error::ErrorBadRequest("Form fields must be UTF-8."))?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Returns the named text field, or "" when absent.
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

/// Which column an article form selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnChoice {
    None,
    Id(i32),
}

/// Validated article create/update submission.
#[derive(Debug)]
pub struct ArticlePostForm {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub column: ColumnChoice,
    pub avatar: Option<UploadedFile>,
}

impl ArticlePostForm {
    pub fn from_multipart(mut form: MultipartForm) -> Result<Self, Error> {
        let title = form.text("title").trim().to_owned();
        let body = form.text("body").trim().to_owned();

        if title.is_empty() {
            return Err(error::ErrorBadRequest("An article must have a title."));
        }
        if title.chars().count() > TITLE_MAX_CHARS {
            return Err(error::ErrorBadRequest(format!(
                "Titles are limited to {} characters.",
                TITLE_MAX_CHARS
            )));
        }
        if body.is_empty() {
            return Err(error::ErrorBadRequest("An article must have a body."));
        }

        Ok(Self {
            tags: parse_tags(form.text("tags")),
            column: parse_column(form.text("column"))?,
            avatar: form.take_file("avatar"),
            title,
            body,
        })
    }
}

/// Splits a comma separated tag list, dropping blanks and repeats.
pub fn parse_tags(input: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_owned());
        }
    }
    tags
}

/// `none` (or nothing) means no column, otherwise a column id.
pub fn parse_column(input: &str) -> Result<ColumnChoice, Error> {
    match input.trim() {
        "" | "none" => Ok(ColumnChoice::None),
        id => id
            .parse::<i32>()
            .map(ColumnChoice::Id)
            .map_err(|_| error::ErrorBadRequest("The selected column is invalid.")),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginFormData {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

pub fn validate_login_form(form: LoginFormData) -> Result<LoginFormData, Error> {
    if form.username.trim().is_empty() || form.password.is_empty() {
        return Err(error::ErrorBadRequest(
            "Username and password are both required.",
        ));
    }

    Ok(LoginFormData {
        username: form.username.trim().to_owned(),
        ..form
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterFormData {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
}

pub fn validate_register_form(form: RegisterFormData) -> Result<RegisterFormData, Error> {
    let username = form.username.trim().to_owned();
    let email = form.email.trim().to_owned();

    if username.is_empty() {
        return Err(error::ErrorBadRequest("A username is required."));
    }
    if username.chars().count() > USERNAME_MAX_CHARS || !USERNAME_RE.is_match(&username) {
        return Err(error::ErrorBadRequest(
            "Usernames may only contain letters, digits and @/./+/-/_ characters.",
        ));
    }
    if !email.is_empty() && !EMAIL_RE.is_match(&email) {
        return Err(error::ErrorBadRequest("The email address is invalid."));
    }
    if form.password.is_empty() {
        return Err(error::ErrorBadRequest("A password is required."));
    }
    if form.password != form.password2 {
        return Err(error::ErrorBadRequest(
            "The two passwords do not match, please enter them again.",
        ));
    }

    Ok(RegisterFormData {
        username,
        email,
        ..form
    })
}

/// Validated profile edit submission.
#[derive(Debug)]
pub struct ProfileForm {
    pub phone: String,
    pub bio: String,
    pub avatar: Option<UploadedFile>,
}

impl ProfileForm {
    pub fn from_multipart(mut form: MultipartForm) -> Result<Self, Error> {
        let phone = form.text("phone").trim().to_owned();
        let bio = form.text("bio").trim().to_owned();

        if phone.chars().count() > PHONE_MAX_CHARS {
            return Err(error::ErrorBadRequest(format!(
                "Phone numbers are limited to {} characters.",
                PHONE_MAX_CHARS
            )));
        }
        if bio.chars().count() > BIO_MAX_CHARS {
            return Err(error::ErrorBadRequest(format!(
                "Bios are limited to {} characters.",
                BIO_MAX_CHARS
            )));
        }

        Ok(Self {
            phone,
            bio,
            avatar: form.take_file("avatar"),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentFormData {
    #[serde(default)]
    pub body: String,
}

pub fn validate_comment_form(form: CommentFormData) -> Result<String, Error> {
    let body = form.body.trim();
    if body.is_empty() {
        return Err(error::ErrorBadRequest("A comment cannot be empty."));
    }
    Ok(body.to_owned())
}

/// Accepts only local absolute paths as post-login redirect targets.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}
