//! Input validation for request bodies and query strings.
//!
//! Each `validate_*` function either returns a fully typed record or every
//! problem it found, one [`FieldError`] per offending field.

use std::sync::LazyLock;

use email_address::EmailAddress;
use regex::Regex;
use serde::Serialize;

use crate::api::{ListingRequest, ListingSearchParams, RegisterRequest, UpdateProfileRequest};
use crate::models::{
    AgeRange, Category, Condition, ListingStatus, Location, MAX_IMAGES_PER_LISTING,
};
use crate::price::Price;

const MIN_LISTING_CENTS: i64 = 100;
const MAX_LISTING_CENTS: i64 = 1_000_000;

static SWISS_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\+41|0041|0)?\s?[1-9]\d{1,2}\s?\d{3}\s?\d{2}\s?\d{2}$")
        .expect("phone pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// A partial update to one optional column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Keep,
    Clear,
    Set(T),
}

// -- Listings --

#[derive(Debug, Clone, PartialEq)]
pub struct ValidListing {
    pub title: String,
    pub description: String,
    pub price: Price,
    pub category: Category,
    pub condition: Condition,
    pub location: Location,
    pub age_range: Option<AgeRange>,
    pub brand: Option<String>,
    pub size: Option<String>,
    pub images: Vec<String>,
    /// Only honoured on update; new listings always start active.
    pub status: Option<ListingStatus>,
    pub admin_number: Option<String>,
    pub admin_place: Option<String>,
}

impl ValidListing {
    /// Drop the admin-only fields, for callers who may not set them.
    pub fn without_admin_fields(mut self) -> Self {
        self.admin_number = None;
        self.admin_place = None;
        self
    }
}

pub fn validate_listing(req: &ListingRequest) -> Result<ValidListing, Vec<FieldError>> {
    let mut errors = Vec::new();

    let title = required_text(&mut errors, "title", req.title.as_deref(), 5, 100);
    let description = required_text(&mut errors, "description", req.description.as_deref(), 20, 2000);

    let price = match &req.price {
        None | Some(serde_json::Value::Null) => {
            errors.push(FieldError::new("price", "Price is required"));
            None
        }
        Some(value) => match price_from_json(value) {
            Ok(price) if price.cents() < MIN_LISTING_CENTS => {
                errors.push(FieldError::new("price", "Price must be at least 1 CHF"));
                None
            }
            Ok(price) if price.cents() > MAX_LISTING_CENTS => {
                errors.push(FieldError::new("price", "Price must be at most 10,000 CHF"));
                None
            }
            Ok(price) => Some(price),
            Err(message) => {
                errors.push(FieldError::new("price", message));
                None
            }
        },
    };

    let category = required_enum::<Category>(&mut errors, "category", req.category.as_deref(), "Please select a valid category");
    let condition = required_enum::<Condition>(&mut errors, "condition", req.condition.as_deref(), "Please select a valid condition");
    let location = required_enum::<Location>(&mut errors, "location", req.location.as_deref(), "Please select a valid location");

    let age_range = match non_empty(req.age_range.as_deref()) {
        None => None,
        Some(raw) => match raw.parse::<AgeRange>() {
            Ok(range) => Some(range),
            Err(_) => {
                errors.push(FieldError::new("ageRange", "Please select a valid age range"));
                None
            }
        },
    };

    let brand = optional_text(&mut errors, "brand", req.brand.as_deref(), 50);
    let size = optional_text(&mut errors, "size", req.size.as_deref(), 30);

    let images = match &req.images {
        None => {
            errors.push(FieldError::new("images", "Please upload at least 1 image"));
            Vec::new()
        }
        Some(images) => {
            if images.is_empty() {
                errors.push(FieldError::new("images", "Please upload at least 1 image"));
            } else if images.len() > MAX_IMAGES_PER_LISTING {
                errors.push(FieldError::new(
                    "images",
                    format!("Maximum {} images allowed", MAX_IMAGES_PER_LISTING),
                ));
            } else if images.iter().any(|u| !is_web_url(u)) {
                errors.push(FieldError::new("images", "Invalid image URL"));
            }
            images.clone()
        }
    };

    let status = match non_empty(req.status.as_deref()) {
        None => None,
        Some(raw) => match raw.parse::<ListingStatus>() {
            Ok(ListingStatus::Deleted) | Err(_) => {
                errors.push(FieldError::new("status", "Status must be 'active' or 'sold'"));
                None
            }
            Ok(status) => Some(status),
        },
    };

    let admin_number = optional_text(&mut errors, "adminNumber", req.admin_number.as_deref(), 100);
    let admin_place = optional_text(&mut errors, "adminPlace", req.admin_place.as_deref(), 100);

    match (title, description, price, category, condition, location) {
        (Some(title), Some(description), Some(price), Some(category), Some(condition), Some(location))
            if errors.is_empty() =>
        {
            Ok(ValidListing {
                title,
                description,
                price,
                category,
                condition,
                location,
                age_range,
                brand,
                size,
                images,
                status,
                admin_number,
                admin_place,
            })
        }
        _ => Err(errors),
    }
}

fn price_from_json(value: &serde_json::Value) -> Result<Price, String> {
    let parsed = match value {
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(v) => Price::from_f64(v),
            None => return Err("Price must be a number".to_string()),
        },
        serde_json::Value::String(s) => s.parse(),
        _ => return Err("Price must be a number".to_string()),
    };
    parsed.map_err(|e| format!("Invalid price: {}", e))
}

// -- Search --

/// Parsed `GET /listings` filters. Empty strings in the query are treated
/// as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilters {
    pub search: Option<String>,
    pub category: Option<Category>,
    pub condition: Option<Condition>,
    pub location: Option<Location>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub admin_number: Option<String>,
    pub admin_place: Option<String>,
}

impl ListingFilters {
    pub fn without_admin_fields(mut self) -> Self {
        self.admin_number = None;
        self.admin_place = None;
        self
    }
}

pub fn validate_search(params: &ListingSearchParams) -> Result<ListingFilters, Vec<FieldError>> {
    let mut errors = Vec::new();

    let category = optional_enum::<Category>(&mut errors, "category", params.category.as_deref());
    let condition = optional_enum::<Condition>(&mut errors, "condition", params.condition.as_deref());
    let location = optional_enum::<Location>(&mut errors, "location", params.location.as_deref());
    let min_price = optional_price(&mut errors, "minPrice", params.min_price.as_deref());
    let max_price = optional_price(&mut errors, "maxPrice", params.max_price.as_deref());

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ListingFilters {
        search: non_empty(params.search.as_deref()).map(str::to_string),
        category,
        condition,
        location,
        min_price,
        max_price,
        admin_number: non_empty(params.admin_number.as_deref()).map(str::to_string),
        admin_place: non_empty(params.admin_place.as_deref()).map(str::to_string),
    })
}

fn optional_price(errors: &mut Vec<FieldError>, field: &'static str, raw: Option<&str>) -> Option<Price> {
    let raw = non_empty(raw)?;
    match raw.parse::<Price>() {
        Ok(price) => Some(price),
        Err(e) => {
            errors.push(FieldError::new(field, e.to_string()));
            None
        }
    }
}

// -- Profile --

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProfile {
    pub name: Patch<String>,
    pub phone: Patch<String>,
    pub location: Patch<Location>,
    pub image: Patch<String>,
}

/// Absent (or null) fields are left untouched, empty strings clear the field.
pub fn validate_profile(req: &UpdateProfileRequest) -> Result<ValidProfile, Vec<FieldError>> {
    let mut errors = Vec::new();

    let name = match patch_of(req.name.as_deref()) {
        Patch::Set(name) => {
            let len = name.chars().count();
            if len < 2 {
                errors.push(FieldError::new("name", "Name must be at least 2 characters"));
            } else if len > 50 {
                errors.push(FieldError::new("name", "Name must be less than 50 characters"));
            }
            Patch::Set(name.to_string())
        }
        Patch::Clear => Patch::Clear,
        Patch::Keep => Patch::Keep,
    };

    let phone = match patch_of(req.phone.as_deref()) {
        Patch::Set(phone) => {
            if !SWISS_PHONE.is_match(phone) {
                errors.push(FieldError::new("phone", "Please enter a valid Swiss phone number"));
            }
            Patch::Set(phone.to_string())
        }
        Patch::Clear => Patch::Clear,
        Patch::Keep => Patch::Keep,
    };

    let location = match patch_of(req.location.as_deref()) {
        Patch::Set(raw) => match raw.parse::<Location>() {
            Ok(location) => Patch::Set(location),
            Err(_) => {
                errors.push(FieldError::new("location", "Please select a valid location"));
                Patch::Keep
            }
        },
        Patch::Clear => Patch::Clear,
        Patch::Keep => Patch::Keep,
    };

    let image = match patch_of(req.image.as_deref()) {
        Patch::Set(image) => {
            if !is_web_url(image) {
                errors.push(FieldError::new("image", "Invalid image URL"));
            }
            Patch::Set(image.to_string())
        }
        Patch::Clear => Patch::Clear,
        Patch::Keep => Patch::Keep,
    };

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(ValidProfile {
        name,
        phone,
        location,
        image,
    })
}

fn patch_of(raw: Option<&str>) -> Patch<&str> {
    match raw.map(str::trim) {
        None => Patch::Keep,
        Some("") => Patch::Clear,
        Some(value) => Patch::Set(value),
    }
}

// -- Auth --

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRegistration {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

pub fn validate_registration(req: &RegisterRequest) -> Result<ValidRegistration, Vec<FieldError>> {
    let mut errors = Vec::new();

    let email = normalize_email(&req.email);
    if !EmailAddress::is_valid(&email) {
        errors.push(FieldError::new("email", "Please enter a valid email address"));
    }
    if req.password.chars().count() < 8 {
        errors.push(FieldError::new("password", "Password must be at least 8 characters"));
    }
    let name = optional_text(&mut errors, "name", req.name.as_deref(), 50);
    if name.as_ref().is_some_and(|n| n.chars().count() < 2) {
        errors.push(FieldError::new("name", "Name must be at least 2 characters"));
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(ValidRegistration {
        email,
        password: req.password.clone(),
        name,
    })
}

/// Emails are compared case-insensitively everywhere.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// -- Helpers --

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn is_web_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

fn required_text(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    raw: Option<&str>,
    min: usize,
    max: usize,
) -> Option<String> {
    let label = capitalize(field);
    let Some(value) = non_empty(raw) else {
        errors.push(FieldError::new(field, format!("{} is required", label)));
        return None;
    };
    let len = value.chars().count();
    if len < min {
        errors.push(FieldError::new(field, format!("{} must be at least {} characters", label, min)));
        return None;
    }
    if len > max {
        errors.push(FieldError::new(field, format!("{} must be at most {} characters", label, max)));
        return None;
    }
    Some(value.to_string())
}

fn optional_text(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    raw: Option<&str>,
    max: usize,
) -> Option<String> {
    let value = non_empty(raw)?;
    if value.chars().count() > max {
        errors.push(FieldError::new(
            field,
            format!("{} must be at most {} characters", capitalize(field), max),
        ));
        return None;
    }
    Some(value.to_string())
}

fn required_enum<T: std::str::FromStr>(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    raw: Option<&str>,
    message: &str,
) -> Option<T> {
    match non_empty(raw).map(str::parse::<T>) {
        Some(Ok(value)) => Some(value),
        _ => {
            errors.push(FieldError::new(field, message));
            None
        }
    }
}

fn optional_enum<T: std::str::FromStr>(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    raw: Option<&str>,
) -> Option<T> {
    let raw = non_empty(raw)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(FieldError::new(field, format!("Unknown {} '{}'", field, raw)));
            None
        }
    }
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stroller() -> ListingRequest {
        ListingRequest {
            title: Some("Premium Baby Stroller".into()),
            description: Some("Lightweight jogging stroller in excellent condition.".into()),
            price: Some(json!(120)),
            category: Some("strollers".into()),
            condition: Some("like-new".into()),
            location: Some("Geneva".into()),
            age_range: Some("0-6 months".into()),
            brand: Some("Bugaboo".into()),
            size: Some(String::new()),
            images: Some(vec!["https://images.example.com/stroller.jpg".into()]),
            ..Default::default()
        }
    }

    fn fields(errors: &[FieldError]) -> Vec<&'static str> {
        errors.iter().map(|e| e.field).collect()
    }

    #[test]
    fn valid_listing_is_typed() {
        let listing = validate_listing(&stroller()).unwrap();
        assert_eq!(listing.price.cents(), 12_000);
        assert_eq!(listing.category, Category::Strollers);
        assert_eq!(listing.condition, Condition::LikeNew);
        assert_eq!(listing.age_range, Some(AgeRange::ZeroToSixMonths));
        assert_eq!(listing.size, None);
        assert_eq!(listing.status, None);
    }

    #[test]
    fn listing_reports_every_bad_field() {
        let req = ListingRequest {
            title: Some("Hi".into()),
            description: None,
            price: Some(json!(0.5)),
            category: Some("spaceships".into()),
            images: Some(vec!["not a url".into()]),
            ..stroller()
        };
        let errors = validate_listing(&req).unwrap_err();
        assert_eq!(
            fields(&errors),
            vec!["title", "description", "price", "category", "images"]
        );
    }

    #[test]
    fn listing_price_bounds_are_inclusive() {
        for ok in [json!(1), json!("10000.00"), json!(9999.99)] {
            let req = ListingRequest { price: Some(ok.clone()), ..stroller() };
            assert!(validate_listing(&req).is_ok(), "{} should be accepted", ok);
        }
        for bad in [json!(0.99), json!(10000.01), json!("free"), json!(true)] {
            let req = ListingRequest { price: Some(bad.clone()), ..stroller() };
            assert!(validate_listing(&req).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn listing_image_count_is_capped() {
        let images = (0..9).map(|i| format!("https://img.example.com/{}.jpg", i)).collect();
        let req = ListingRequest { images: Some(images), ..stroller() };
        assert_eq!(fields(&validate_listing(&req).unwrap_err()), vec!["images"]);

        let req = ListingRequest { images: Some(vec![]), ..stroller() };
        assert_eq!(fields(&validate_listing(&req).unwrap_err()), vec!["images"]);
    }

    #[test]
    fn listing_status_cannot_be_deleted() {
        let req = ListingRequest { status: Some("sold".into()), ..stroller() };
        assert_eq!(validate_listing(&req).unwrap().status, Some(ListingStatus::Sold));

        let req = ListingRequest { status: Some("deleted".into()), ..stroller() };
        assert_eq!(fields(&validate_listing(&req).unwrap_err()), vec!["status"]);
    }

    #[test]
    fn search_treats_empty_values_as_absent() {
        let params = ListingSearchParams {
            search: Some("  ".into()),
            category: Some(String::new()),
            min_price: Some("50".into()),
            max_price: Some("100".into()),
            ..Default::default()
        };
        let filters = validate_search(&params).unwrap();
        assert_eq!(filters.search, None);
        assert_eq!(filters.category, None);
        assert_eq!(filters.min_price.map(Price::cents), Some(5_000));
        assert_eq!(filters.max_price.map(Price::cents), Some(10_000));
    }

    #[test]
    fn search_rejects_garbage_prices_and_enums() {
        let params = ListingSearchParams {
            condition: Some("mint".into()),
            min_price: Some("cheap".into()),
            ..Default::default()
        };
        assert_eq!(fields(&validate_search(&params).unwrap_err()), vec!["condition", "minPrice"]);
    }

    #[test]
    fn profile_patch_semantics() {
        let req = UpdateProfileRequest {
            name: Some("Alice Johnson".into()),
            phone: Some(String::new()),
            location: None,
            image: Some("https://cdn.example.com/alice.png".into()),
        };
        let profile = validate_profile(&req).unwrap();
        assert_eq!(profile.name, Patch::Set("Alice Johnson".into()));
        assert_eq!(profile.phone, Patch::Clear);
        assert_eq!(profile.location, Patch::Keep);
    }

    #[test]
    fn swiss_phone_numbers() {
        for phone in ["+41 79 123 45 67", "079 123 45 67", "0041791234567", "+41791234567"] {
            let req = UpdateProfileRequest { phone: Some(phone.into()), ..Default::default() };
            assert!(validate_profile(&req).is_ok(), "{} should be accepted", phone);
        }
        for phone in ["12345", "+1 555 123 4567", "079 123 45 6"] {
            let req = UpdateProfileRequest { phone: Some(phone.into()), ..Default::default() };
            assert!(validate_profile(&req).is_err(), "{} should be rejected", phone);
        }
    }

    #[test]
    fn registration_normalizes_email() {
        let req = RegisterRequest {
            email: "  Alice@Example.COM ".into(),
            password: "correct horse".into(),
            name: None,
        };
        assert_eq!(validate_registration(&req).unwrap().email, "alice@example.com");

        let req = RegisterRequest {
            email: "alice".into(),
            password: "short".into(),
            name: Some("A".into()),
        };
        assert_eq!(
            fields(&validate_registration(&req).unwrap_err()),
            vec!["email", "password", "name"]
        );
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for email in ["a@b..c", "@example.com", "alice@", "al ice@example.com", "a@@example.com"] {
            let req = RegisterRequest {
                email: email.into(),
                password: "correct horse".into(),
                name: None,
            };
            assert_eq!(
                fields(&validate_registration(&req).unwrap_err()),
                vec!["email"],
                "{} should be rejected",
                email
            );
        }
    }
}
