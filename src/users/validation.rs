use lazy_static::lazy_static;
use regex::Regex;

use crate::error::FieldErrors;

pub const NAME_MAX: usize = 50;
pub const EMAIL_MAX: usize = 255;
pub const PASSWORD_MIN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"(?i-u)^[\w+\-.]+@[a-z\d\-.]+\.[a-z]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_name(errors: &mut FieldErrors, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        errors.add("name", "can't be blank");
    } else if name.chars().count() > NAME_MAX {
        errors.add("name", format!("is too long (maximum is {NAME_MAX} characters)"));
    }
}

pub fn validate_email(errors: &mut FieldErrors, email: &str) {
    let email = email.trim();
    if email.is_empty() {
        errors.add("email", "can't be blank");
        return;
    }
    if email.chars().count() > EMAIL_MAX {
        errors.add("email", format!("is too long (maximum is {EMAIL_MAX} characters)"));
    }
    if !is_valid_email(email) {
        errors.add("email", "is invalid");
    }
}

pub fn validate_password(errors: &mut FieldErrors, password: &str, confirmation: &str) {
    if password.is_empty() {
        errors.add("password", "can't be blank");
    } else if password.chars().count() < PASSWORD_MIN {
        errors.add("password", format!("is too short (minimum is {PASSWORD_MIN} characters)"));
    }
    if password != confirmation {
        errors.add("passwordConfirmation", "doesn't match Password");
    }
}
